//! Thread payload normalization
//!
//! Projects a raw provider thread into the domain [`ThreadSummary`], keyed
//! on the latest message. Raw payloads never travel past this point.

use super::api::{GmailMessage, GmailThread, MessagePayload};
use crate::models::{MessageSummary, ThreadId, ThreadSummary};

/// Condense a full thread payload into a resolved summary.
///
/// Returns `None` for a thread with no messages; the reconciler treats
/// such a thread as unresolved rather than failing the pass.
pub fn summarize_thread(thread: GmailThread) -> Option<ThreadSummary> {
    let messages = thread.messages.unwrap_or_default();
    let latest = messages.iter().max_by_key(|m| internal_date(m))?;

    let latest_message = MessageSummary {
        id: Some(latest.id.clone()),
        history_id: latest.history_id.clone(),
        from: header_value(latest, "From").unwrap_or_default(),
        to: header_value(latest, "To"),
        subject: header_value(latest, "Subject").unwrap_or_default(),
        snippet: latest
            .snippet
            .as_deref()
            .map(decode_html_entities)
            .unwrap_or_default(),
        internal_date: internal_date(latest),
    };

    Some(ThreadSummary {
        id: ThreadId::new(thread.id),
        history_id: thread.history_id,
        message_count: messages.len(),
        latest_message,
    })
}

/// Internal timestamp in milliseconds; unparseable values sort first
fn internal_date(message: &GmailMessage) -> i64 {
    message
        .internal_date
        .as_deref()
        .and_then(|d| d.parse().ok())
        .unwrap_or(0)
}

/// Extract a header value by name, case-insensitively
fn header_value(message: &GmailMessage, name: &str) -> Option<String> {
    let payload: &MessagePayload = message.payload.as_ref()?;
    payload.headers.as_ref()?.iter().find_map(|h| {
        if h.name.eq_ignore_ascii_case(name) {
            Some(h.value.clone())
        } else {
            None
        }
    })
}

/// Decode HTML entities in snippet text
fn decode_html_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}
