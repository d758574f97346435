//! longbox-core library.
//!
//! Keeps a flat-file comic issue database in step with a paginated remote
//! catalog:
//!
//! - [`snapshot`]: read and write the `.mcl` snapshot format.
//! - [`reconcile`]: merge the remote feed into the entity set, surviving
//!   faulting pages.
//! - [`report`]: counters for the end-of-run summary.
//! - [`files`]: output naming, atomic writes, and input retirement.
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums in the library, `anyhow::Result` at
//!   the edges.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod config;
pub mod error;
pub mod files;
pub mod model;
pub mod reconcile;
pub mod report;
pub mod snapshot;

pub use model::{EntitySet, IssueEntry, MergeOutcome, RemoteIssue};
pub use reconcile::{ReconcileConfig, ReconcileOutcome, Reconciler};
pub use report::{PoisonedRecord, RunReport};
