//! Transport settings for the remote table client.

use std::time::Duration;
use url::Url;

use coopledger_common::{Error, Result};

/// Public AppSheet API root.
pub const DEFAULT_BASE_URL: &str = "https://api.appsheet.com/api/v2";
const DEFAULT_LOCALE: &str = "pt-BR";
const DEFAULT_TIMEZONE: &str = "E. South America Standard Time";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How to reach the remote table and how to describe rows to it.
#[derive(Debug, Clone)]
pub struct AppSheetSettings {
    /// API root; `apps/{app}/tables/{table}/Action` is appended to it.
    pub base_url: String,
    /// Locale the remote uses to parse dates and decimals.
    pub locale: String,
    /// Timezone the remote applies to dates.
    pub timezone: String,
    /// Per-request timeout. A timeout counts as an ordinary push failure.
    pub timeout: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl AppSheetSettings {
    /// Settings for the public API.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            locale: DEFAULT_LOCALE.to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("coopledger/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Point at a different API root.
    ///
    /// # Errors
    /// - `InvalidInput` if `base_url` is not an absolute http(s) URL
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        let url = Url::parse(base_url)
            .map_err(|e| Error::InvalidInput(format!("Invalid API base URL '{}': {}", base_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidInput(format!(
                "API base URL must be http or https, got '{}'",
                url.scheme()
            )));
        }
        self.base_url = url.into();
        Ok(self)
    }

    /// Set the locale property.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    /// Set the timezone property.
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// API root without a trailing slash.
    pub(crate) fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

impl Default for AppSheetSettings {
    fn default() -> Self {
        Self::new()
    }
}
