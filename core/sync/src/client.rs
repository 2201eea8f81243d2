//! HTTP client for the remote table API.

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{header, Client};
use tracing::debug;

use coopledger_common::{Error, RemoteRowId, Result};
use coopledger_ledger::{Record, RemoteSyncConfig, RemoteTable};

use crate::settings::AppSheetSettings;
use crate::wire::{interpret_response, ActionRequest};

/// Header carrying the application access key.
const ACCESS_KEY_HEADER: &str = "ApplicationAccessKey";

/// Characters escaped in a path segment: everything except `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Remote table client that appends rows with the `Add` action.
pub struct AppSheetClient {
    http: Client,
    settings: AppSheetSettings,
}

impl AppSheetClient {
    /// Create a new client.
    ///
    /// # Errors
    /// - `Sync` if the HTTP client cannot be built
    pub fn new(settings: AppSheetSettings) -> Result<Self> {
        let http = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(settings.timeout)
            .build()
            .map_err(|e| Error::Sync(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http, settings })
    }

    /// Get the transport settings.
    pub fn settings(&self) -> &AppSheetSettings {
        &self.settings
    }

    /// Action endpoint for the configured application and table.
    pub fn action_url(&self, config: &RemoteSyncConfig) -> String {
        format!(
            "{}/apps/{}/tables/{}/Action",
            self.settings.base(),
            utf8_percent_encode(config.app_id.trim(), SEGMENT),
            utf8_percent_encode(&config.table_name, SEGMENT),
        )
    }

    /// Send one `Add` action for `record`.
    async fn add_row(&self, record: &Record, config: &RemoteSyncConfig) -> Result<RemoteRowId> {
        let url = self.action_url(config);
        let body = ActionRequest::add(record, &self.settings.locale, &self.settings.timezone);

        debug!("Appending record {} to {}", record.id(), config.table_name);

        let response = self
            .http
            .post(&url)
            .header(ACCESS_KEY_HEADER, config.access_key.expose())
            .header(header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Sync(format!(
                        "Request timed out after {}s",
                        self.settings.timeout.as_secs()
                    ))
                } else {
                    Error::Sync(format!("Failed to reach remote table: {}", e))
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Sync(format!("Failed to read response: {}", e)))?;

        interpret_response(status, &text, record.id().as_str())
    }
}

#[async_trait]
impl RemoteTable for AppSheetClient {
    fn name(&self) -> &str {
        "appsheet"
    }

    async fn append_row(&self, record: &Record, config: &RemoteSyncConfig) -> Result<RemoteRowId> {
        config.ensure_complete()?;
        self.add_row(record, config).await
    }
}
