//! Data model for tenant scan results.
//!
//! All wire-facing structs serialize with camelCase field names, matching what
//! the dashboard consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A site collection inside the tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteInfo {
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_used_mb: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub external_sharing_enabled: bool,
}

/// Who a permission is granted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrincipalType {
    User,
    Group,
    SharingLink,
}

/// Effective role of a permission grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionRole {
    Read,
    Contribute,
    Edit,
    FullControl,
}

impl PermissionRole {
    /// Whether this role allows modifying content.
    pub fn allows_write(self) -> bool {
        !matches!(self, PermissionRole::Read)
    }
}

/// One permission grant discovered on a site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionEntry {
    pub site_url: String,
    pub principal: String,
    pub principal_type: PrincipalType,
    pub role: PermissionRole,
    /// Inherited from the parent rather than granted directly.
    #[serde(default)]
    pub inherited: bool,
    /// Principal is from outside the tenant.
    #[serde(default)]
    pub external: bool,
}

/// Audience of a sharing link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LinkScope {
    /// Anyone with the link, no sign-in required.
    Anonymous,
    /// Anyone signed in to the tenant.
    Organization,
    /// Named recipients only.
    Specific,
}

/// A sharing link discovered on a site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharingLink {
    pub site_url: String,
    pub scope: LinkScope,
    pub allows_edit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

/// An external (guest) user known to the tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalUser {
    pub login: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invited_by: Option<String>,
    #[serde(default)]
    pub accepted: bool,
}

impl ExternalUser {
    /// Mail domain of the login, if one can be derived.
    pub fn domain(&self) -> Option<&str> {
        self.login.rsplit_once('@').map(|(_, domain)| domain)
    }
}

/// Outcome of an external-user enrichment run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentSummary {
    pub total_external_users: usize,
    pub enriched: usize,
    pub failed: usize,
    /// Distinct mail domains seen across external users, sorted.
    pub domains: Vec<String>,
}

/// Aggregate of everything the scans have collected so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub generated_at: DateTime<Utc>,
    pub sites: Vec<SiteInfo>,
    pub permissions: Vec<PermissionEntry>,
    pub sharing_links: Vec<SharingLink>,
    pub external_users: Vec<ExternalUser>,
}

impl Default for ScanReport {
    fn default() -> Self {
        Self {
            generated_at: Utc::now(),
            sites: Vec::new(),
            permissions: Vec::new(),
            sharing_links: Vec::new(),
            external_users: Vec::new(),
        }
    }
}
