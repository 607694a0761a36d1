//! The operations module is the asynchronous heart of the server.
//!
//! It lets the request loop accept short HTTP requests while a single
//! long-running scan executes on an isolated task, observed by the browser
//! through polling.
//!
//! The main components are:
//! - `SharedOperationState`: the one mutex-guarded record shared between the
//!   request loop and the background worker
//! - `OperationCoordinator`: the single-flight gatekeeper that accepts or
//!   rejects new work
//! - `run_operation`: the worker that forwards credentials, executes a
//!   [`WorkUnit`] and translates its outcome into state writes
//!
//! # Threading and concurrency
//!
//! At most one worker task exists at a time; the accept/reject decision and
//! the state reset happen inside a single critical section, so a concurrent
//! second start request is always rejected deterministically. Pollers take one
//! lock acquisition per snapshot and never block on the worker.

use futures::future::BoxFuture;
use sharescan_core::client::TenantSession;
use sharescan_core::model::EnrichmentSummary;

mod coordinator;
mod state;
mod worker;

pub use coordinator::{OperationCoordinator, StartOutcome};
pub use state::{OperationSnapshot, ProgressLog, SharedOperationState};

/// What a work unit produces: an optional typed result payload, or the error
/// that failed the operation.
pub type WorkResult = Result<Option<EnrichmentSummary>, sharescan_core::Error>;

/// One operation's unit of work.
///
/// Created per API call with all inputs already resolved, consumed exactly
/// once by the worker. It receives the append-only progress log and the
/// tenant session the worker managed to establish (`None` when credential
/// forwarding failed; downstream calls are then expected to fail and surface
/// through the normal error path).
pub type WorkUnit =
    Box<dyn FnOnce(ProgressLog, Option<TenantSession>) -> BoxFuture<'static, WorkResult> + Send>;
