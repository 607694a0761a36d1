use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use sharescan_core::model::{ExternalUser, PermissionEntry, ScanReport, SharingLink, SiteInfo};
use tracing::warn;

/// Latest collected scan data, written by work units and read by the report
/// and export endpoints. Not persisted across restarts.
#[derive(Default)]
pub struct ReportStore {
    inner: Mutex<ScanReport>,
}

impl ReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ScanReport> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("Report store lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn set_sites(&self, sites: Vec<SiteInfo>) {
        let mut report = self.lock();
        report.sites = sites;
        report.generated_at = Utc::now();
    }

    /// Replace the permission data for one site, keeping other sites' data.
    pub fn set_site_permissions(
        &self,
        site_url: &str,
        permissions: Vec<PermissionEntry>,
        links: Vec<SharingLink>,
    ) {
        let mut report = self.lock();
        report.permissions.retain(|p| p.site_url != site_url);
        report.permissions.extend(permissions);
        report.sharing_links.retain(|l| l.site_url != site_url);
        report.sharing_links.extend(links);
        report.generated_at = Utc::now();
    }

    pub fn set_external_users(&self, users: Vec<ExternalUser>) {
        let mut report = self.lock();
        report.external_users = users;
        report.generated_at = Utc::now();
    }

    pub fn report(&self) -> ScanReport {
        self.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sharescan_core::model::{PermissionRole, PrincipalType};

    fn permission(site_url: &str, principal: &str) -> PermissionEntry {
        PermissionEntry {
            site_url: site_url.to_string(),
            principal: principal.to_string(),
            principal_type: PrincipalType::User,
            role: PermissionRole::Read,
            inherited: false,
            external: false,
        }
    }

    #[test]
    fn site_permissions_replace_only_that_site() {
        let store = ReportStore::new();
        store.set_site_permissions(
            "https://tenant.example/sites/hr",
            vec![permission("https://tenant.example/sites/hr", "alice")],
            vec![],
        );
        store.set_site_permissions(
            "https://tenant.example/sites/eng",
            vec![permission("https://tenant.example/sites/eng", "bob")],
            vec![],
        );

        // re-scan of hr replaces alice with carol, eng untouched
        store.set_site_permissions(
            "https://tenant.example/sites/hr",
            vec![permission("https://tenant.example/sites/hr", "carol")],
            vec![],
        );

        let report = store.report();
        let principals: Vec<&str> = report
            .permissions
            .iter()
            .map(|p| p.principal.as_str())
            .collect();
        assert_eq!(principals, vec!["bob", "carol"]);
    }

    #[test]
    fn set_sites_refreshes_timestamp() {
        let store = ReportStore::new();
        let before = store.report().generated_at;
        store.set_sites(vec![]);
        assert!(store.report().generated_at >= before);
    }
}
