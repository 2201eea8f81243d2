//! Remote sync configuration.

use serde::{Deserialize, Serialize};

use coopledger_common::{AccessKey, Error, Result};

/// Table records are appended to when none is configured.
pub const DEFAULT_TABLE_NAME: &str = "Records";

/// Endpoint identity and switch for pushing records to the remote table.
///
/// Persisted as a single document and replaced wholesale when edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSyncConfig {
    /// Remote application identifier.
    #[serde(default)]
    pub app_id: String,
    /// Access credential sent with every request.
    #[serde(default)]
    pub access_key: AccessKey,
    /// Target table name (escaped when placed in the URL).
    #[serde(default = "default_table_name")]
    pub table_name: String,
    /// Whether new records attempt an automatic push.
    #[serde(rename = "isEnabled", default = "default_enabled")]
    pub enabled: bool,
}

fn default_table_name() -> String {
    DEFAULT_TABLE_NAME.to_string()
}

fn default_enabled() -> bool {
    true
}

impl RemoteSyncConfig {
    /// Create a config with credentials filled in.
    pub fn new(
        app_id: impl Into<String>,
        access_key: AccessKey,
        table_name: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            access_key,
            table_name: table_name.into(),
            enabled: true,
        }
    }

    /// Whether both the application id and the access key are present.
    pub fn has_credentials(&self) -> bool {
        !self.app_id.trim().is_empty() && !self.access_key.is_empty()
    }

    /// Fail fast unless the config can address the remote table.
    ///
    /// # Errors
    /// - `ConfigMissing` naming the absent fields (a blank table name counts)
    pub fn ensure_complete(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.app_id.trim().is_empty() {
            missing.push("application id");
        }
        if self.access_key.is_empty() {
            missing.push("access key");
        }
        if self.table_name.trim().is_empty() {
            missing.push("table name");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::ConfigMissing(format!("missing {}", missing.join(" and "))))
        }
    }

    /// Whether record creation should attempt a push.
    pub fn should_auto_push(&self) -> bool {
        self.enabled && self.ensure_complete().is_ok()
    }
}

impl Default for RemoteSyncConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            access_key: AccessKey::default(),
            table_name: default_table_name(),
            enabled: default_enabled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_inert() {
        let config = RemoteSyncConfig::default();
        assert_eq!(config.table_name, "Records");
        assert!(!config.has_credentials());
        assert!(!config.should_auto_push());
        assert!(matches!(config.ensure_complete(), Err(Error::ConfigMissing(_))));
    }

    #[test]
    fn test_complete_config() {
        let config = RemoteSyncConfig::new("app-123", AccessKey::new("key"), "Daily");
        assert!(config.ensure_complete().is_ok());
        assert!(config.should_auto_push());
    }

    #[test]
    fn test_disabled_config_does_not_auto_push() {
        let mut config = RemoteSyncConfig::new("app-123", AccessKey::new("key"), "Daily");
        config.enabled = false;
        assert!(!config.should_auto_push());
        // Manual sync only needs credentials
        assert!(config.ensure_complete().is_ok());
    }

    #[test]
    fn test_missing_fields_are_named() {
        let config = RemoteSyncConfig::new("", AccessKey::new(" "), "Daily");
        let err = config.ensure_complete().unwrap_err().to_string();
        assert!(err.contains("application id"));
        assert!(err.contains("access key"));
    }

    #[test]
    fn test_blank_table_name_is_incomplete() {
        let config = RemoteSyncConfig::new("app", AccessKey::new("k"), " ");
        assert!(config.has_credentials());
        assert!(!config.should_auto_push());
        let err = config.ensure_complete().unwrap_err();
        assert!(matches!(err, Error::ConfigMissing(ref msg) if msg.contains("table name")));
    }

    #[test]
    fn test_persisted_shape() {
        let json = r#"{"appId":"a","accessKey":"k","tableName":"Registros","isEnabled":false}"#;
        let config: RemoteSyncConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.app_id, "a");
        assert_eq!(config.access_key.expose(), "k");
        assert!(!config.enabled);

        let partial: RemoteSyncConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(partial, RemoteSyncConfig::default());
    }
}
