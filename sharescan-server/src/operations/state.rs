use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use sharescan_core::model::EnrichmentSummary;
use tracing::warn;

/// The one record shared between the request loop and the background worker.
///
/// Every read and write goes through the single mutex in
/// [`SharedOperationState`]; the struct itself owns no logic.
#[derive(Debug)]
pub struct OperationState {
    pub running: bool,
    pub complete: bool,
    /// Append-only while an operation runs; cleared only when the next
    /// operation is accepted.
    pub log: Vec<String>,
    pub error: Option<String>,
    pub result: Option<EnrichmentSummary>,
    /// Operation-specific input (e.g. a target site URL), set by the
    /// dispatching request before the worker starts.
    pub context_param: Option<String>,
}

impl Default for OperationState {
    fn default() -> Self {
        // Initial state reads as idle/terminal to pollers
        Self {
            running: false,
            complete: true,
            log: Vec::new(),
            error: None,
            result: None,
            context_param: None,
        }
    }
}

/// Consistent point-in-time view returned to pollers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSnapshot {
    pub messages: Vec<String>,
    pub running: bool,
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrichment_result: Option<EnrichmentSummary>,
}

/// Cloneable handle to the mutex-guarded [`OperationState`].
#[derive(Clone, Default)]
pub struct SharedOperationState {
    inner: Arc<Mutex<OperationState>>,
}

impl SharedOperationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The completion path must never fail, so a poisoned lock is recovered
    /// rather than propagated.
    fn lock(&self) -> MutexGuard<'_, OperationState> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("Operation state lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Single-lock consistent snapshot for the polling protocol. Never
    /// mutates; safe to call concurrently with an active worker.
    pub fn snapshot(&self) -> OperationSnapshot {
        let state = self.lock();
        OperationSnapshot {
            messages: state.log.clone(),
            running: state.running,
            complete: state.complete,
            error: state.error.clone(),
            enrichment_result: state.result.clone(),
        }
    }

    /// Append one progress message.
    pub fn append(&self, message: impl Into<String>) {
        self.lock().log.push(message.into());
    }

    pub fn context_param(&self) -> Option<String> {
        self.lock().context_param.clone()
    }

    /// The coordinator's critical section: rejects if an operation is running,
    /// otherwise resets the record for the new operation in the same lock
    /// acquisition. Returns whether the operation was accepted.
    pub(crate) fn begin(&self, context_param: Option<String>) -> bool {
        let mut state = self.lock();
        if state.running {
            return false;
        }

        state.log.clear();
        state.error = None;
        state.result = None;
        state.context_param = context_param;
        state.running = true;
        state.complete = false;
        true
    }

    /// Publish the result (if any) and mark the operation complete, in one
    /// lock acquisition so pollers never see `complete` with a stale result.
    pub(crate) fn finish(&self, result: Option<EnrichmentSummary>) {
        let mut state = self.lock();
        state.result = result;
        state.running = false;
        state.complete = true;
    }

    /// Record a failure and mark the operation complete. The error also
    /// becomes the final log line so partial progress is never hidden.
    pub(crate) fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        let mut state = self.lock();
        state.log.push(format!("Error: {message}"));
        state.error = Some(message);
        state.running = false;
        state.complete = true;
    }
}

/// Append-only view of the state handed to work units.
///
/// Appending to the log is the only progress-reporting side channel an
/// operation has.
#[derive(Clone)]
pub struct ProgressLog {
    state: SharedOperationState,
}

impl ProgressLog {
    pub(crate) fn new(state: SharedOperationState) -> Self {
        Self { state }
    }

    pub fn append(&self, message: impl Into<String>) {
        self.state.append(message);
    }
}
