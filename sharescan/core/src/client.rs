//! Tenant client abstraction and its HTTP implementation.
//!
//! The scan operations only ever talk to the tenant through the
//! [`TenantClient`] trait, and sessions are only ever created through a
//! [`TenantConnector`]. This keeps the worker's credential forwarding testable
//! and keeps a session scoped to exactly one operation.

use std::{collections::HashMap, path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tracing::debug;
use url::Url;

use crate::model::{ExternalUser, PermissionEntry, SharingLink, SiteInfo};
use crate::{Error, Result};

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Credential material captured from the dispatching request's configuration.
///
/// Ephemeral: owned by the worker for the duration of one operation, never
/// persisted and never part of the shared operation state.
#[derive(Debug, Clone)]
pub struct CredentialContext {
    pub tenant_url: Url,
    pub access_token: Option<String>,
    pub client_id: Option<String>,
}

/// Read access to the tenant admin API.
#[async_trait]
pub trait TenantClient: Send + Sync {
    /// Enumerate all site collections in the tenant.
    async fn list_sites(&self) -> Result<Vec<SiteInfo>>;

    /// Permission grants for one site.
    async fn site_permissions(&self, site_url: &str) -> Result<Vec<PermissionEntry>>;

    /// Sharing links active on one site.
    async fn sharing_links(&self, site_url: &str) -> Result<Vec<SharingLink>>;

    /// All external (guest) users known to the tenant.
    async fn external_users(&self) -> Result<Vec<ExternalUser>>;

    /// Detailed record for a single external user.
    async fn user_details(&self, login: &str) -> Result<ExternalUser>;
}

/// An authenticated session against the tenant service.
pub type TenantSession = Arc<dyn TenantClient>;

/// Creates tenant sessions from forwarded credentials.
///
/// Two strategies, tried by the worker in order: silent re-authentication from
/// a local token cache keyed by client id, then direct reuse of the forwarded
/// access token.
#[async_trait]
pub trait TenantConnector: Send + Sync {
    async fn connect_silent(&self, tenant_url: &Url, client_id: &str) -> Result<TenantSession>;

    async fn connect_with_token(&self, tenant_url: &Url, access_token: &str)
        -> Result<TenantSession>;
}

/// [`TenantConnector`] backed by the tenant admin REST API.
pub struct HttpTenantConnector {
    token_cache: Option<PathBuf>,
}

impl HttpTenantConnector {
    pub fn new(token_cache: Option<PathBuf>) -> Self {
        Self { token_cache }
    }

    fn cached_token(&self, client_id: &str) -> Result<String> {
        let path = self
            .token_cache
            .as_ref()
            .ok_or_else(|| Error::Auth("no token cache configured".to_string()))?;

        let raw = std::fs::read_to_string(path)?;
        let cache: HashMap<String, String> = serde_json::from_str(&raw)?;

        cache.get(client_id).cloned().ok_or_else(|| {
            Error::Auth(format!("no cached token for client id '{client_id}'"))
        })
    }
}

#[async_trait]
impl TenantConnector for HttpTenantConnector {
    async fn connect_silent(&self, tenant_url: &Url, client_id: &str) -> Result<TenantSession> {
        let token = self.cached_token(client_id)?;
        debug!(client_id, "Found cached token, verifying session");

        let client = HttpTenantClient::try_new(tenant_url, &token)?;
        client.verify().await?;
        Ok(Arc::new(client))
    }

    async fn connect_with_token(
        &self,
        tenant_url: &Url,
        access_token: &str,
    ) -> Result<TenantSession> {
        let client = HttpTenantClient::try_new(tenant_url, access_token)?;
        client.verify().await?;
        Ok(Arc::new(client))
    }
}

/// [`TenantClient`] implementation over HTTP with bearer-token auth.
#[derive(Debug)]
pub struct HttpTenantClient {
    http: reqwest::Client,
    base: Url,
}

impl HttpTenantClient {
    pub fn try_new(tenant_url: &Url, access_token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {access_token}"))
            .map_err(|_| Error::Auth("access token contains invalid characters".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        // Url::join drops the last path segment without a trailing slash
        let mut base = tenant_url.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }

        Ok(Self { http, base })
    }

    /// Cheap authenticated call used to validate a session before handing it
    /// to a worker.
    pub async fn verify(&self) -> Result<()> {
        let url = self.endpoint("api/v1/me", &[])?;
        let response = self.http.get(url).send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::Auth(format!(
                "token rejected by tenant service ({})",
                response.status()
            )))
        }
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self
            .base
            .join(path)
            .map_err(|e| Error::Auth(format!("invalid tenant URL: {e}")))?;
        for (key, value) in query {
            url.query_pairs_mut().append_pair(key, value);
        }
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = self.endpoint(path, query)?;
        let response = self.http.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl TenantClient for HttpTenantClient {
    async fn list_sites(&self) -> Result<Vec<SiteInfo>> {
        self.get_json("api/v1/sites", &[]).await
    }

    async fn site_permissions(&self, site_url: &str) -> Result<Vec<PermissionEntry>> {
        self.get_json("api/v1/permissions", &[("site", site_url)])
            .await
    }

    async fn sharing_links(&self, site_url: &str) -> Result<Vec<SharingLink>> {
        self.get_json("api/v1/sharing-links", &[("site", site_url)])
            .await
    }

    async fn external_users(&self) -> Result<Vec<ExternalUser>> {
        self.get_json("api/v1/users/external", &[]).await
    }

    async fn user_details(&self, login: &str) -> Result<ExternalUser> {
        self.get_json("api/v1/users/details", &[("login", login)])
            .await
    }
}
