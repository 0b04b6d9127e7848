//! Legacy unread-feed fallback
//!
//! Used when full API credentials are unavailable: a cookie-authenticated
//! markup feed supplies unread counts and degraded thread summaries.

mod atom;

pub use atom::{AtomFeedAdapter, AtomThreadSummary, UnreadSummary};
