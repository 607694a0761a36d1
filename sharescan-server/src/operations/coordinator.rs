use std::sync::Arc;

use sharescan_core::client::{CredentialContext, TenantConnector};
use tracing::{info, Instrument};
use uuid::Uuid;

use super::worker::run_operation;
use super::{SharedOperationState, WorkUnit};

/// Outcome of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The operation was dispatched; poll for progress.
    Accepted,
    /// Another operation is already running; no state was mutated.
    Busy,
}

/// Single-flight gatekeeper for background operations.
pub struct OperationCoordinator {
    state: SharedOperationState,
    connector: Arc<dyn TenantConnector>,
}

impl OperationCoordinator {
    pub fn new(connector: Arc<dyn TenantConnector>) -> Self {
        Self {
            state: SharedOperationState::new(),
            connector,
        }
    }

    /// Shared state, for the polling endpoint.
    pub fn state(&self) -> &SharedOperationState {
        &self.state
    }

    /// Accept the work unit unless an operation is already running.
    ///
    /// The busy check and the state reset happen inside one critical section,
    /// so there is no window in which two concurrent calls can both be
    /// accepted. On acceptance the worker is spawned and this call returns
    /// immediately; the caller's response is sent before the work completes.
    pub fn try_start(
        &self,
        label: &str,
        credentials: CredentialContext,
        context_param: Option<String>,
        work: WorkUnit,
    ) -> StartOutcome {
        if !self.state.begin(context_param) {
            info!(operation = label, "Operation rejected, another is running");
            return StartOutcome::Busy;
        }

        let operation_id = Uuid::new_v4();
        info!(operation = label, operation_id = %operation_id, "Operation accepted");

        let state = self.state.clone();
        let connector = Arc::clone(&self.connector);
        tokio::spawn(
            run_operation(state, connector, credentials, work).instrument(
                tracing::info_span!("operation", operation = label, operation_id = %operation_id),
            ),
        );

        StartOutcome::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{credentials, StubClient, StubConnector};
    use super::*;
    use std::time::Duration;

    fn coordinator_with(connector: StubConnector) -> OperationCoordinator {
        OperationCoordinator::new(Arc::new(connector))
    }

    fn idle_coordinator() -> OperationCoordinator {
        coordinator_with(StubConnector::new(true, true, StubClient::default()))
    }

    async fn wait_until_complete(coordinator: &OperationCoordinator) {
        for _ in 0..200 {
            if coordinator.state().snapshot().complete {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("operation did not complete in time");
    }

    #[tokio::test]
    async fn second_start_is_rejected_while_running() {
        let coordinator = idle_coordinator();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let outcome = coordinator.try_start(
            "first",
            credentials(),
            None,
            Box::new(move |_log, _session| {
                Box::pin(async move {
                    let _ = release_rx.await;
                    Ok(None)
                })
            }),
        );
        assert_eq!(outcome, StartOutcome::Accepted);

        let second = coordinator.try_start(
            "second",
            credentials(),
            None,
            Box::new(|_log, _session| Box::pin(async { Ok(None) })),
        );
        assert_eq!(second, StartOutcome::Busy);

        release_tx.send(()).unwrap();
        wait_until_complete(&coordinator).await;
    }

    #[tokio::test]
    async fn start_is_accepted_again_after_completion() {
        let coordinator = idle_coordinator();

        for _ in 0..3 {
            let outcome = coordinator.try_start(
                "noop",
                credentials(),
                None,
                Box::new(|_log, _session| Box::pin(async { Ok(None) })),
            );
            assert_eq!(outcome, StartOutcome::Accepted);
            wait_until_complete(&coordinator).await;
        }
    }

    #[tokio::test]
    async fn work_unit_error_is_contained_and_published() {
        let coordinator = idle_coordinator();

        coordinator.try_start(
            "failing",
            credentials(),
            None,
            Box::new(|log, _session| {
                Box::pin(async move {
                    log.append("about to fail");
                    Err(sharescan_core::Error::Api {
                        status: 429,
                        message: "rate limited".to_string(),
                    })
                })
            }),
        );
        wait_until_complete(&coordinator).await;

        let snapshot = coordinator.state().snapshot();
        assert!(!snapshot.running);
        assert!(snapshot.complete);
        let error = snapshot.error.unwrap();
        assert!(error.contains("rate limited"), "got {error}");
        assert!(snapshot.messages.last().unwrap().starts_with("Error: "));
        assert_eq!(snapshot.messages[0], "about to fail");
    }

    #[tokio::test]
    async fn work_unit_panic_is_contained() {
        let coordinator = idle_coordinator();

        coordinator.try_start(
            "panicking",
            credentials(),
            None,
            Box::new(|_log, _session| Box::pin(async { panic!("boom") })),
        );
        wait_until_complete(&coordinator).await;

        let snapshot = coordinator.state().snapshot();
        assert!(snapshot.complete);
        assert!(snapshot.error.unwrap().contains("boom"));

        // the coordinator still accepts new work afterwards
        let outcome = coordinator.try_start(
            "after-panic",
            credentials(),
            None,
            Box::new(|_log, _session| Box::pin(async { Ok(None) })),
        );
        assert_eq!(outcome, StartOutcome::Accepted);
        wait_until_complete(&coordinator).await;
    }

    #[tokio::test]
    async fn new_operation_clears_previous_error() {
        let coordinator = idle_coordinator();

        coordinator.try_start(
            "failing",
            credentials(),
            None,
            Box::new(|_log, _session| {
                Box::pin(async { Err(sharescan_core::Error::NotConnected) })
            }),
        );
        wait_until_complete(&coordinator).await;
        assert!(coordinator.state().snapshot().error.is_some());

        coordinator.try_start(
            "succeeding",
            credentials(),
            Some("https://tenant.example/sites/hr".to_string()),
            Box::new(|log, _session| {
                Box::pin(async move {
                    log.append("fresh start");
                    Ok(None)
                })
            }),
        );
        wait_until_complete(&coordinator).await;

        let snapshot = coordinator.state().snapshot();
        assert!(snapshot.error.is_none());
        assert_eq!(snapshot.messages.last().unwrap(), "fresh start");
    }
}
