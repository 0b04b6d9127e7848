//! Thread models: headers, resolved summaries, and the caller-owned cache

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Unique identifier for a thread (provider-assigned, immutable)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ThreadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lightweight thread identity as returned by a listing call.
///
/// Carries no message content. The `history_id` is the provider's opaque
/// version token; it changes whenever the thread's content or label state
/// changes, and is the sole signal used to decide whether a cached summary
/// is still current.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadHeader {
    pub id: ThreadId,
    pub history_id: String,
}

impl ThreadHeader {
    pub fn new(id: impl Into<ThreadId>, history_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            history_id: history_id.into(),
        }
    }
}

/// Condensed view of a thread's most recent message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSummary {
    pub id: Option<String>,
    pub history_id: Option<String>,
    /// Sender display string, e.g. `Ada Lovelace <ada@example.com>`
    pub from: String,
    pub to: Option<String>,
    pub subject: String,
    pub snippet: String,
    /// Provider-internal timestamp, milliseconds since the Unix epoch
    pub internal_date: i64,
}

/// A fully resolved thread as of one `history_id`.
///
/// Created fresh per synchronization cycle and never mutated in place; a
/// changed thread yields a new summary, and the content always matches the
/// version named by `history_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub id: ThreadId,
    pub history_id: String,
    pub message_count: usize,
    pub latest_message: MessageSummary,
}

impl ThreadSummary {
    /// Projection onto the identity fields a listing call would return
    pub fn header(&self) -> ThreadHeader {
        ThreadHeader::new(self.id.clone(), self.history_id.clone())
    }
}

/// Last-resolved summaries keyed by thread id.
///
/// Owned by the caller; the engine only reads it during a reconciliation
/// pass and hands back a superseding snapshot to replace it wholesale.
pub type KnownThreadCache = HashMap<ThreadId, ThreadSummary>;
