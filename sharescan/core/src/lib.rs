//! Core library for the sharescan tenant exposure reporting tool.
//!
//! Contains everything that is independent of the dashboard server:
//! the tenant data model, the [`client::TenantClient`] abstraction over the
//! tenant admin REST API, risk-rule evaluation and report export.

pub mod client;
pub mod error;
pub mod export;
pub mod model;
pub mod risk;

pub use error::Error;

pub type Result<T> = core::result::Result<T, error::Error>;
