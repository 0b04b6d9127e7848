//! Error taxonomy for the sync engine
//!
//! Four failure classes cover every engine operation. Per-thread fetch
//! failures inside a reconciliation pass are not represented here; they are
//! collected into `ReconcileOutcome::failed_ids` instead of aborting the pass.

use thiserror::Error;

/// Errors produced by the sync engine
#[derive(Debug, Error)]
pub enum Error {
    /// The operation required a credential and none was usable.
    ///
    /// Returned before any network request is issued.
    #[error("no usable credential: {0}")]
    MissingCredential(&'static str),

    /// Transport-level failure reaching the provider (DNS, TLS, timeout,
    /// or an undecodable response body).
    #[error("provider unreachable")]
    UpstreamUnreachable(#[from] ureq::Error),

    /// The provider answered with a non-success HTTP status.
    #[error("provider rejected request with status {status}")]
    UpstreamRejected {
        status: u16,
        /// Raw response body, kept verbatim for diagnostics.
        body: String,
    },

    /// The unread feed was unusable at the feed level: unparseable XML,
    /// an unsuccessful fetch, or a missing `fullcount` when a count was
    /// explicitly requested. Entry-level defects never produce this.
    #[error("malformed feed: {0}")]
    MalformedFeed(String),
}

pub type Result<T> = std::result::Result<T, Error>;
