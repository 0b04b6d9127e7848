//! Reconciliation engine
//!
//! Brings a cached thread collection up to date against freshly listed
//! headers, re-fetching only what changed.

mod reconcile;

pub use reconcile::{ReconcileOutcome, changed_thread_ids, reconcile};
