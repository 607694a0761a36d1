//! Risk-rule evaluation over collected permissions and sharing links.

use serde::{Deserialize, Serialize};

use crate::model::{LinkScope, PermissionEntry, ScanReport, SharingLink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// One flagged exposure in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFinding {
    pub site_url: String,
    pub subject: String,
    pub level: RiskLevel,
    pub reason: String,
}

/// Score a single permission grant.
pub fn assess_permission(entry: &PermissionEntry) -> RiskLevel {
    match (entry.external, entry.role.allows_write()) {
        (true, true) => RiskLevel::High,
        (true, false) => RiskLevel::Medium,
        (false, true) if !entry.inherited => RiskLevel::Medium,
        _ => RiskLevel::Low,
    }
}

/// Score a single sharing link.
pub fn assess_link(link: &SharingLink) -> RiskLevel {
    match (link.scope, link.allows_edit) {
        (LinkScope::Anonymous, _) => RiskLevel::High,
        (LinkScope::Organization, true) => RiskLevel::Medium,
        (LinkScope::Organization, false) => RiskLevel::Low,
        (LinkScope::Specific, true) => RiskLevel::Medium,
        (LinkScope::Specific, false) => RiskLevel::Low,
    }
}

/// Evaluate the whole report, returning findings at Medium or above, highest
/// risk first.
pub fn evaluate(report: &ScanReport) -> Vec<RiskFinding> {
    let mut findings = Vec::new();

    for entry in &report.permissions {
        let level = assess_permission(entry);
        if level > RiskLevel::Low {
            findings.push(RiskFinding {
                site_url: entry.site_url.clone(),
                subject: entry.principal.clone(),
                level,
                reason: format!(
                    "{}{:?} access granted to {}",
                    if entry.external { "external " } else { "" },
                    entry.role,
                    entry.principal
                ),
            });
        }
    }

    for link in &report.sharing_links {
        let level = assess_link(link);
        if level > RiskLevel::Low {
            let audience = match link.scope {
                LinkScope::Anonymous => "anyone with the link",
                LinkScope::Organization => "everyone in the organization",
                LinkScope::Specific => "named recipients",
            };
            findings.push(RiskFinding {
                site_url: link.site_url.clone(),
                subject: audience.to_string(),
                level,
                reason: format!(
                    "{} sharing link usable by {audience}",
                    if link.allows_edit { "Edit" } else { "View" }
                ),
            });
        }
    }

    findings.sort_by(|a, b| b.level.cmp(&a.level));
    findings
}
