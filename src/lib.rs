//! Remote mailbox synchronization engine
//!
//! Reconciles a locally cached view of mail threads against the remote
//! provider using versioned change tokens, so re-fetch cost tracks the
//! number of changed threads rather than the mailbox size. Provides:
//! - OAuth credential lifecycle: one-time code upgrade, silent refresh,
//!   and persistence
//! - Typed request wrappers over the provider endpoints, with a tolerated
//!   race in push-notification registration
//! - The reconciliation pass: diff against the cache by history id,
//!   fan-out fetch of changed threads, order-preserving merge
//! - A credential-free fallback that summarizes the legacy unread feed
//!
//! The thread cache is owned by the caller and replaced wholesale with each
//! pass's output; the engine never mutates it. This crate has no UI or
//! storage dependencies.

pub mod config;
pub mod error;
pub mod feed;
pub mod gmail;
pub mod models;
pub mod sync;

pub use config::GmailCredentials;
pub use error::{Error, Result};
pub use feed::{AtomFeedAdapter, AtomThreadSummary, UnreadSummary};
pub use gmail::{CredentialManager, GmailClient, ListThreadsOptions, TokenExchange};
pub use models::{
    Credential, KnownThreadCache, MessageSummary, ThreadHeader, ThreadId, ThreadSummary,
};
pub use sync::{ReconcileOutcome, changed_thread_ids, reconcile};
