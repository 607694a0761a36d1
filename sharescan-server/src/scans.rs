//! Work-unit builders for the three scan operations.
//!
//! Each builder captures everything its operation needs up front and returns
//! a [`WorkUnit`] for the coordinator to dispatch. Progress is reported solely
//! by appending to the operation log.

use std::collections::BTreeSet;
use std::sync::Arc;

use sharescan_core::model::EnrichmentSummary;
use sharescan_core::Error;

use crate::operations::WorkUnit;
use crate::reports::ReportStore;

/// Enumerate all site collections in the tenant.
pub fn site_scan(reports: Arc<ReportStore>) -> WorkUnit {
    Box::new(move |log, session| {
        Box::pin(async move {
            let session = session.ok_or(Error::NotConnected)?;

            log.append("Starting site enumeration");
            let sites = session.list_sites().await?;
            log.append(format!("Retrieved {} sites", sites.len()));

            let sharing_enabled = sites.iter().filter(|s| s.external_sharing_enabled).count();
            if sharing_enabled > 0 {
                log.append(format!(
                    "{sharing_enabled} sites allow external sharing"
                ));
            }

            reports.set_sites(sites);
            log.append("Sites loaded successfully");
            Ok(None)
        })
    })
}

/// Analyze permissions and sharing links for one site.
pub fn permission_scan(reports: Arc<ReportStore>, site_url: String) -> WorkUnit {
    Box::new(move |log, session| {
        Box::pin(async move {
            let session = session.ok_or(Error::NotConnected)?;

            log.append(format!("Analyzing permissions for {site_url}"));
            let permissions = session.site_permissions(&site_url).await?;
            log.append(format!("Found {} permission entries", permissions.len()));

            let links = session.sharing_links(&site_url).await?;
            log.append(format!("Found {} sharing links", links.len()));

            reports.set_site_permissions(&site_url, permissions, links);
            log.append(format!("Permission analysis complete for {site_url}"));
            Ok(None)
        })
    })
}

/// Enrich the external-user list with per-user details and summarize it.
pub fn enrichment(reports: Arc<ReportStore>) -> WorkUnit {
    Box::new(move |log, session| {
        Box::pin(async move {
            let session = session.ok_or(Error::NotConnected)?;

            log.append("Starting external user enrichment");
            let users = session.external_users().await?;
            log.append(format!("Found {} external users", users.len()));

            let total = users.len();
            let mut enriched = 0usize;
            let mut failed = 0usize;
            let mut resolved = Vec::with_capacity(total);

            for user in users {
                match session.user_details(&user.login).await {
                    Ok(details) => {
                        enriched += 1;
                        resolved.push(details);
                    }
                    Err(err) => {
                        failed += 1;
                        log.append(format!("Could not enrich {}: {err}", user.login));
                        resolved.push(user);
                    }
                }
            }

            let domains: BTreeSet<String> = resolved
                .iter()
                .filter_map(|u| u.domain().map(str::to_string))
                .collect();

            reports.set_external_users(resolved);

            let summary = EnrichmentSummary {
                total_external_users: total,
                enriched,
                failed,
                domains: domains.into_iter().collect(),
            };
            log.append(format!(
                "External user enrichment complete ({enriched} enriched, {failed} failed)"
            ));
            Ok(Some(summary))
        })
    })
}
