use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::header,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sharescan_core::export;
use sharescan_core::model::ScanReport;
use tracing::info;

use crate::error::ApiError;
use crate::operations::{OperationSnapshot, StartOutcome};
use crate::scans;
use crate::ApiContextRef;

/// Response for accepted long-running operations; `started:true` tells the
/// client to poll `/api/progress` rather than expect a synchronous result.
#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub success: bool,
    pub started: bool,
    pub message: String,
}

impl StartResponse {
    fn started(message: impl Into<String>) -> Self {
        Self {
            success: true,
            started: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionScanRequest {
    pub site_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ShutdownResponse {
    pub success: bool,
    pub message: String,
}

/// Embedded dashboard page; all rendering happens client-side against the
/// JSON API.
pub async fn dashboard() -> Html<&'static str> {
    Html(include_str!("../../assets/index.html"))
}

/// Handler for starting site enumeration
pub async fn start_site_scan(
    State(context): State<ApiContextRef>,
) -> Result<Json<StartResponse>, ApiError> {
    let credentials = context.config.credential_context().ok_or_else(|| {
        ApiError::MissingInput(context.config.missing_credential_message().to_string())
    })?;

    let work = scans::site_scan(Arc::clone(&context.reports));
    match context.coordinator.try_start("sites", credentials, None, work) {
        StartOutcome::Accepted => Ok(Json(StartResponse::started(
            "Site scan started; poll /api/progress for updates",
        ))),
        StartOutcome::Busy => Err(ApiError::OperationRunning),
    }
}

/// Handler for starting permission analysis of one site
pub async fn start_permission_scan(
    State(context): State<ApiContextRef>,
    body: Bytes,
) -> Result<Json<StartResponse>, ApiError> {
    let request: PermissionScanRequest = serde_json::from_slice(&body).unwrap_or_default();
    let site_url = request
        .site_url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| ApiError::MissingInput("siteUrl is required".to_string()))?;

    let credentials = context.config.credential_context().ok_or_else(|| {
        ApiError::MissingInput(context.config.missing_credential_message().to_string())
    })?;

    let work = scans::permission_scan(Arc::clone(&context.reports), site_url.clone());
    match context
        .coordinator
        .try_start("permissions", credentials, Some(site_url), work)
    {
        StartOutcome::Accepted => Ok(Json(StartResponse::started(
            "Permission analysis started; poll /api/progress for updates",
        ))),
        StartOutcome::Busy => Err(ApiError::OperationRunning),
    }
}

/// Handler for starting external-user enrichment
pub async fn start_enrichment(
    State(context): State<ApiContextRef>,
) -> Result<Json<StartResponse>, ApiError> {
    let credentials = context.config.credential_context().ok_or_else(|| {
        ApiError::MissingInput(context.config.missing_credential_message().to_string())
    })?;

    let work = scans::enrichment(Arc::clone(&context.reports));
    match context
        .coordinator
        .try_start("enrich", credentials, None, work)
    {
        StartOutcome::Accepted => Ok(Json(StartResponse::started(
            "External user enrichment started (live mode); poll /api/progress for updates",
        ))),
        StartOutcome::Busy => Err(ApiError::OperationRunning),
    }
}

/// Pure read of the shared operation state; always 200.
pub async fn get_progress(State(context): State<ApiContextRef>) -> Json<OperationSnapshot> {
    Json(context.coordinator.state().snapshot())
}

pub async fn get_report(State(context): State<ApiContextRef>) -> Json<ScanReport> {
    Json(context.reports.report())
}

/// Export the latest report as CSV or JSON.
pub async fn export_report(
    State(context): State<ApiContextRef>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let report = context.reports.report();

    match query.format.as_deref().unwrap_or("json") {
        "csv" => Ok((
            [(header::CONTENT_TYPE, "text/csv")],
            export::report_to_csv(&report),
        )
            .into_response()),
        "json" => {
            let body =
                export::report_to_json(&report).map_err(|e| ApiError::Internal(e.into()))?;
            Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
        }
        other => Err(ApiError::MissingInput(format!(
            "unsupported export format '{other}'"
        ))),
    }
}

/// Begin graceful shutdown after the response is sent.
pub async fn shutdown(State(context): State<ApiContextRef>) -> Json<ShutdownResponse> {
    info!("Shutdown requested via API");
    context.shutdown.cancel();
    Json(ShutdownResponse {
        success: true,
        message: "Shutting down".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::operations::test_support::{StubClient, StubConnector};
    use crate::operations::OperationCoordinator;
    use crate::reports::ReportStore;
    use crate::ApiContext;
    use axum::{
        body::Body,
        http::{self, Request, StatusCode},
        Router,
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use sharescan_core::model::SiteInfo;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;
    use url::Url;

    fn test_config(with_credentials: bool) -> Config {
        Config::try_new(
            Url::parse("https://tenant.example.com").unwrap(),
            with_credentials.then(|| "test-client-id".to_string()),
            None,
            None,
            true,
        )
        .unwrap()
    }

    fn test_site(url: &str) -> SiteInfo {
        SiteInfo {
            url: url.to_string(),
            title: "Test".to_string(),
            template: None,
            storage_used_mb: None,
            last_modified: None,
            external_sharing_enabled: false,
        }
    }

    fn test_context(client: StubClient, with_credentials: bool) -> ApiContextRef {
        let connector = StubConnector::new(true, true, client);
        Arc::new(ApiContext {
            config: test_config(with_credentials),
            coordinator: OperationCoordinator::new(Arc::new(connector)),
            reports: Arc::new(ReportStore::new()),
            shutdown: CancellationToken::new(),
        })
    }

    fn create_test_app(context: ApiContextRef) -> Router {
        Router::new().merge(crate::api::router()).with_state(context)
    }

    fn create_request(method: &http::Method, uri: &str, body: Body) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if method == http::Method::POST {
            builder = builder.header(http::header::CONTENT_TYPE, "application/json");
        }
        builder.body(body).unwrap()
    }

    async fn extract_json_body(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn poll_until_complete(app: &Router) -> Value {
        for _ in 0..200 {
            let response = app
                .clone()
                .oneshot(create_request(
                    &http::Method::GET,
                    "/api/progress",
                    Body::empty(),
                ))
                .await
                .unwrap();
            let progress = extract_json_body(response).await;
            if progress["complete"] == json!(true) {
                return progress;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("operation did not complete in time");
    }

    #[tokio::test]
    async fn progress_before_any_operation_is_idle() {
        let app = create_test_app(test_context(StubClient::default(), true));

        let response = app
            .oneshot(create_request(
                &http::Method::GET,
                "/api/progress",
                Body::empty(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let progress = extract_json_body(response).await;
        assert_eq!(progress["messages"], json!([]));
        assert_eq!(progress["running"], json!(false));
        assert_eq!(progress["complete"], json!(true));
        assert!(progress.get("error").is_none());
        assert!(progress.get("enrichmentResult").is_none());
    }

    #[tokio::test]
    async fn site_scan_runs_to_completion() {
        let client = StubClient {
            sites: vec![test_site("https://tenant.example/sites/hr")],
            ..Default::default()
        };
        let context = test_context(client, true);
        let app = create_test_app(Arc::clone(&context));

        let response = app
            .clone()
            .oneshot(create_request(
                &http::Method::POST,
                "/api/sites",
                Body::empty(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = extract_json_body(response).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["started"], json!(true));

        let progress = poll_until_complete(&app).await;
        assert!(progress.get("error").is_none(), "got {progress}");
        let messages = progress["messages"].as_array().unwrap();
        assert_eq!(
            messages.last().unwrap(),
            &json!("Sites loaded successfully")
        );
        assert_eq!(context.reports.report().sites.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_start_is_rejected_with_409() {
        let client = StubClient {
            delay: Some(Duration::from_millis(500)),
            ..Default::default()
        };
        let app = create_test_app(test_context(client, true));

        let first = app
            .clone()
            .oneshot(create_request(
                &http::Method::POST,
                "/api/sites",
                Body::empty(),
            ))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .clone()
            .oneshot(create_request(
                &http::Method::POST,
                "/api/permissions",
                Body::from(json!({"siteUrl": "https://tenant.example/sites/hr"}).to_string()),
            ))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
        let body = extract_json_body(second).await;
        assert_eq!(body["success"], json!(false));
        assert_eq!(
            body["message"],
            json!("Another operation is already running")
        );
    }

    #[tokio::test]
    async fn permission_scan_requires_site_url() {
        let app = create_test_app(test_context(StubClient::default(), true));

        let response = app
            .oneshot(create_request(
                &http::Method::POST,
                "/api/permissions",
                Body::from(json!({}).to_string()),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = extract_json_body(response).await;
        assert_eq!(body["success"], json!(false));
        assert!(body["message"].as_str().unwrap().contains("siteUrl"));
    }

    #[tokio::test]
    async fn missing_credential_is_a_400() {
        let app = create_test_app(test_context(StubClient::default(), false));

        let response = app
            .oneshot(create_request(
                &http::Method::POST,
                "/api/sites",
                Body::empty(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = extract_json_body(response).await;
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("No credential configured"));
    }

    #[tokio::test]
    async fn failed_operation_reports_error_through_progress() {
        let client = StubClient {
            fail_with: Some("rate limited".to_string()),
            ..Default::default()
        };
        let app = create_test_app(test_context(client, true));

        let response = app
            .clone()
            .oneshot(create_request(
                &http::Method::POST,
                "/api/sites",
                Body::empty(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let progress = poll_until_complete(&app).await;
        assert!(progress["error"].as_str().unwrap().contains("rate limited"));
        let messages = progress["messages"].as_array().unwrap();
        assert!(messages
            .last()
            .unwrap()
            .as_str()
            .unwrap()
            .starts_with("Error: "));

        // the request loop keeps serving after a failure
        let after = app
            .oneshot(create_request(
                &http::Method::GET,
                "/api/progress",
                Body::empty(),
            ))
            .await
            .unwrap();
        assert_eq!(after.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn enrichment_publishes_result_in_progress() {
        let client = StubClient {
            users: vec![sharescan_core::model::ExternalUser {
                login: "guest@partner.example".to_string(),
                display_name: None,
                invited_by: None,
                accepted: true,
            }],
            ..Default::default()
        };
        let app = create_test_app(test_context(client, true));

        let response = app
            .clone()
            .oneshot(create_request(
                &http::Method::POST,
                "/api/enrich",
                Body::empty(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let progress = poll_until_complete(&app).await;
        let result = &progress["enrichmentResult"];
        assert_eq!(result["totalExternalUsers"], json!(1));
        assert_eq!(result["domains"], json!(["partner.example"]));
    }

    #[tokio::test]
    async fn export_returns_csv_content_type() {
        let app = create_test_app(test_context(StubClient::default(), true));

        let response = app
            .oneshot(create_request(
                &http::Method::GET,
                "/api/export?format=csv",
                Body::empty(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/csv"
        );
    }

    #[tokio::test]
    async fn shutdown_cancels_the_token_after_responding() {
        let context = test_context(StubClient::default(), true);
        let app = create_test_app(Arc::clone(&context));

        let response = app
            .oneshot(create_request(
                &http::Method::POST,
                "/api/shutdown",
                Body::empty(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = extract_json_body(response).await;
        assert_eq!(body["success"], json!(true));
        assert!(context.shutdown.is_cancelled());
    }
}
