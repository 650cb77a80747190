//! Synchronization passes.
//!
//! # Module Structure
//! - `aggregate`: error collection across concurrent tasks
//! - `orchestrator`: the two-phase pass of one service
//! - `registry`: resource type to service dispatch

mod aggregate;
mod orchestrator;
mod registry;

pub use aggregate::{AggregatedError, ErrorCollector};
pub use orchestrator::{FetchOutcome, ServiceFetcher};
pub use registry::ServiceRegistry;
