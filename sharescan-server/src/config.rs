use std::path::PathBuf;

use sharescan_core::client::CredentialContext;
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Tenant URL must use http or https")]
    InvalidTenantUrl,

    #[error("Client id cannot be empty")]
    EmptyClientId,

    #[error("Access token cannot be empty")]
    EmptyAccessToken,
}

/// Validated server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub tenant_url: Url,
    pub client_id: Option<String>,
    pub access_token: Option<String>,
    pub token_cache: Option<PathBuf>,
    /// Non-interactive credential acquisition only; no sign-in prompt is ever
    /// attempted.
    pub headless: bool,
}

impl Config {
    /// Create a new config with validation
    pub fn try_new(
        tenant_url: Url,
        client_id: Option<String>,
        access_token: Option<String>,
        token_cache: Option<PathBuf>,
        headless: bool,
    ) -> Result<Self, ConfigError> {
        if !matches!(tenant_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidTenantUrl);
        }

        if client_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
            return Err(ConfigError::EmptyClientId);
        }

        if access_token
            .as_deref()
            .is_some_and(|token| token.trim().is_empty())
        {
            return Err(ConfigError::EmptyAccessToken);
        }

        Ok(Self {
            tenant_url,
            client_id,
            access_token,
            token_cache,
            headless,
        })
    }

    /// Credential material to forward into a worker, or `None` when nothing
    /// usable is configured (the dispatching request then fails with 400).
    pub fn credential_context(&self) -> Option<CredentialContext> {
        if self.client_id.is_none() && self.access_token.is_none() {
            return None;
        }

        Some(CredentialContext {
            tenant_url: self.tenant_url.clone(),
            access_token: self.access_token.clone(),
            client_id: self.client_id.clone(),
        })
    }

    /// 400 response body for requests arriving without usable credentials.
    pub fn missing_credential_message(&self) -> &'static str {
        if self.headless {
            "No credential configured; set --access-token or --client-id"
        } else {
            "No credential configured and interactive sign-in is not available through the API; \
             set --access-token or --client-id"
        }
    }
}
