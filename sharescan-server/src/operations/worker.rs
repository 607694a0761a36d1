use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use sharescan_core::client::{CredentialContext, TenantConnector, TenantSession};
use tracing::{debug, error, info, warn};

use super::{ProgressLog, SharedOperationState, WorkUnit};

/// Execute one accepted operation to completion on the worker task.
///
/// Nothing is allowed to propagate out of this function: every outcome —
/// success, work-unit error, panic — becomes a write on the shared state.
pub(crate) async fn run_operation(
    state: SharedOperationState,
    connector: Arc<dyn TenantConnector>,
    credentials: CredentialContext,
    work: WorkUnit,
) {
    let session = establish_session(&state, connector.as_ref(), &credentials).await;
    let log = ProgressLog::new(state.clone());

    let outcome = AssertUnwindSafe(async move { work(log, session).await })
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(result)) => {
            info!("Operation completed successfully");
            state.finish(result);
        }
        Ok(Err(err)) => {
            error!(error = %err, "Operation failed");
            state.fail(err.to_string());
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(panic = message, "Operation panicked");
            state.fail(format!("operation panicked: {message}"));
        }
    }
}

/// Re-establish an authenticated tenant session for the worker.
///
/// The worker runs outside the original request context and cannot inherit
/// its session, so one is built from the forwarded credentials: silent
/// re-authentication via the client id and local token cache first (works even
/// for an expired forwarded token), then direct reuse of the forwarded access
/// token. If both fail the operation proceeds without a session and the
/// work unit's own calls surface the concrete downstream error.
async fn establish_session(
    state: &SharedOperationState,
    connector: &dyn TenantConnector,
    credentials: &CredentialContext,
) -> Option<TenantSession> {
    if let Some(client_id) = &credentials.client_id {
        match connector.connect_silent(&credentials.tenant_url, client_id).await {
            Ok(session) => {
                debug!("Tenant session established via silent re-authentication");
                return Some(session);
            }
            Err(err) => {
                warn!(error = %err, "Silent re-authentication failed, falling back to forwarded token");
            }
        }
    }

    if let Some(token) = &credentials.access_token {
        match connector
            .connect_with_token(&credentials.tenant_url, token)
            .await
        {
            Ok(session) => {
                debug!("Tenant session established from forwarded access token");
                return Some(session);
            }
            Err(err) => {
                warn!(error = %err, "Forwarded access token was rejected");
            }
        }
    }

    state.append("Warning: could not re-establish a tenant session; continuing without authentication");
    None
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
