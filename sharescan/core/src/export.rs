//! CSV and JSON rendering of scan reports.

use crate::model::{LinkScope, ScanReport};
use crate::risk::{self, RiskFinding};
use crate::Result;

/// Quote a CSV field per RFC 4180 when it contains a separator, quote or
/// newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_row(fields: &[&str]) -> String {
    fields
        .iter()
        .map(|f| csv_field(f))
        .collect::<Vec<_>>()
        .join(",")
}

/// Render the full report as CSV, one section per collection.
pub fn report_to_csv(report: &ScanReport) -> String {
    let mut out = String::new();

    out.push_str("section,siteUrl,subject,detail,flag\n");

    for site in &report.sites {
        out.push_str(&csv_row(&[
            "site",
            &site.url,
            &site.title,
            site.template.as_deref().unwrap_or(""),
            if site.external_sharing_enabled {
                "externalSharingEnabled"
            } else {
                ""
            },
        ]));
        out.push('\n');
    }

    for entry in &report.permissions {
        out.push_str(&csv_row(&[
            "permission",
            &entry.site_url,
            &entry.principal,
            &format!("{:?}", entry.role),
            if entry.external { "external" } else { "" },
        ]));
        out.push('\n');
    }

    for link in &report.sharing_links {
        let scope = match link.scope {
            LinkScope::Anonymous => "anonymous",
            LinkScope::Organization => "organization",
            LinkScope::Specific => "specific",
        };
        out.push_str(&csv_row(&[
            "sharingLink",
            &link.site_url,
            link.created_by.as_deref().unwrap_or(""),
            scope,
            if link.allows_edit { "edit" } else { "view" },
        ]));
        out.push('\n');
    }

    for user in &report.external_users {
        out.push_str(&csv_row(&[
            "externalUser",
            "",
            &user.login,
            user.display_name.as_deref().unwrap_or(""),
            if user.accepted { "accepted" } else { "pending" },
        ]));
        out.push('\n');
    }

    for finding in &risk::evaluate(report) {
        out.push_str(&csv_row(&[
            "finding",
            &finding.site_url,
            &finding.subject,
            &finding.reason,
            &format!("{:?}", finding.level),
        ]));
        out.push('\n');
    }

    out
}

/// Render the report plus its risk findings as a single JSON document.
pub fn report_to_json(report: &ScanReport) -> Result<String> {
    #[derive(serde::Serialize)]
    #[serde(rename_all = "camelCase")]
    struct ExportDocument<'a> {
        #[serde(flatten)]
        report: &'a ScanReport,
        findings: Vec<RiskFinding>,
    }

    let document = ExportDocument {
        report,
        findings: risk::evaluate(report),
    };

    Ok(serde_json::to_string_pretty(&document)?)
}
