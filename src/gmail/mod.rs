//! Gmail provider integration
//!
//! This module provides:
//! - OAuth2 credential lifecycle (code upgrade, silent refresh, persistence)
//! - Typed request wrappers over the Gmail REST endpoints
//! - Projection of raw thread payloads into domain summaries

mod auth;
mod client;
mod normalize;

pub use auth::{CredentialManager, TokenExchange};
pub use client::{GmailClient, ListThreadsOptions};
pub use normalize::summarize_thread;

/// Gmail API response types.
///
/// Payloads are duck-typed JSON on the wire; they are parsed into these
/// structural types at the client boundary and never propagated raw.
pub mod api {
    use serde::Deserialize;

    use crate::models::ThreadHeader;

    /// OAuth2 userinfo response (basic identity metadata)
    #[derive(Debug, Deserialize)]
    pub struct UserInfo {
        pub id: Option<String>,
        pub email: Option<String>,
        pub name: Option<String>,
        pub picture: Option<String>,
    }

    /// Mailbox-level profile (`users/me/profile`)
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MailboxProfile {
        pub email_address: Option<String>,
        pub messages_total: Option<u64>,
        pub threads_total: Option<u64>,
        pub history_id: Option<String>,
    }

    /// Single label metadata, used as a cheap "has anything changed" probe
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Label {
        pub id: String,
        pub name: Option<String>,
        pub messages_total: Option<u64>,
        pub messages_unread: Option<u64>,
        pub threads_total: Option<u64>,
        pub threads_unread: Option<u64>,
    }

    /// Reference to a message (identity fields only)
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageRef {
        pub id: String,
        pub thread_id: Option<String>,
    }

    /// One change record from the history listing
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct HistoryRecord {
        pub id: String,
        pub messages: Option<Vec<MessageRef>>,
    }

    /// Response from listing changes since a history id
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct HistoryResponse {
        pub history: Option<Vec<HistoryRecord>>,
        pub history_id: Option<String>,
        pub next_page_token: Option<String>,
    }

    /// Response from listing threads; provider order is meaningful
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ListThreadsResponse {
        pub threads: Option<Vec<ThreadHeader>>,
        pub next_page_token: Option<String>,
        pub result_size_estimate: Option<u32>,
    }

    /// Full thread payload (`users/me/threads/{id}`)
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GmailThread {
        pub id: String,
        pub history_id: String,
        pub messages: Option<Vec<GmailMessage>>,
    }

    /// A message within a full thread payload
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GmailMessage {
        pub id: String,
        pub thread_id: Option<String>,
        pub history_id: Option<String>,
        pub label_ids: Option<Vec<String>>,
        pub snippet: Option<String>,
        pub internal_date: Option<String>,
        pub payload: Option<MessagePayload>,
    }

    /// Message payload containing RFC 822 headers
    #[derive(Debug, Deserialize)]
    pub struct MessagePayload {
        pub headers: Option<Vec<Header>>,
    }

    /// Email header (name-value pair)
    #[derive(Debug, Deserialize)]
    pub struct Header {
        pub name: String,
        pub value: String,
    }

    /// Response from registering a push-notification watch.
    ///
    /// Empty by construction when the registration was tolerated because
    /// another session already holds it.
    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct WatchResponse {
        pub history_id: Option<String>,
        pub expiration: Option<String>,
    }

    /// Standard Google error envelope
    #[derive(Debug, Deserialize)]
    pub struct ErrorEnvelope {
        pub error: Option<ErrorBody>,
    }

    #[derive(Debug, Deserialize)]
    pub struct ErrorBody {
        pub code: Option<u16>,
        pub message: Option<String>,
    }
}
