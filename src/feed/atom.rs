//! Atom unread-feed parsing
//!
//! The provider's legacy feed is semi-structured markup; every entry-level
//! field is extracted through a defaulting helper so one bad entry can
//! never abort the whole parse. Only feed-level defects (unparseable XML,
//! a failed fetch, a missing `fullcount` when a count was asked for)
//! surface as errors.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use ureq::Agent;
use url::Url;

use crate::error::{Error, Result};
use crate::models::MessageSummary;

/// A degraded thread summary synthesized from feed markup.
///
/// Its `history_id` is a millisecond timestamp string derived from the
/// entry's modification time, not a provider version token. It is a
/// distinct type from [`crate::models::ThreadSummary`] precisely so the
/// two can never end up in the same cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomThreadSummary {
    pub id: String,
    pub history_id: String,
    pub latest_message: MessageSummary,
}

/// Parsed unread feed
#[derive(Debug, Clone)]
pub struct UnreadSummary {
    /// Entries in feed order
    pub threads: Vec<AtomThreadSummary>,
    /// Feed-level unread count
    pub count: u32,
    /// Feed-level modification time, milliseconds since the Unix epoch
    pub timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct FeedDoc {
    fullcount: Option<String>,
    modified: Option<String>,
    #[serde(default, rename = "entry")]
    entries: Vec<EntryDoc>,
}

#[derive(Debug, Deserialize)]
struct EntryDoc {
    title: Option<String>,
    summary: Option<String>,
    modified: Option<String>,
    id: Option<String>,
    author: Option<AuthorDoc>,
    #[serde(default, rename = "link")]
    links: Vec<LinkDoc>,
}

#[derive(Debug, Deserialize)]
struct AuthorDoc {
    name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LinkDoc {
    #[serde(rename = "@rel")]
    rel: Option<String>,
    #[serde(rename = "@href")]
    href: Option<String>,
}

/// Credential-free feed access over isolated cookie sessions.
///
/// Each partition id owns one HTTP agent and therefore one cookie jar;
/// requests through different partitions never share session state.
pub struct AtomFeedAdapter {
    partitions: Mutex<HashMap<String, Agent>>,
}

impl AtomFeedAdapter {
    pub fn new() -> Self {
        Self {
            partitions: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the feed-level unread count.
    ///
    /// Unlike summary parsing, a missing or non-numeric `fullcount` is a
    /// hard error here: the count was the whole point of the call.
    pub fn fetch_unread_count(&self, partition: &str, url: &str) -> Result<u32> {
        let feed = parse_feed(&self.fetch_feed(partition, url)?)?;
        feed.fullcount
            .as_deref()
            .and_then(|c| c.trim().parse().ok())
            .ok_or_else(|| Error::MalformedFeed("fullcount missing or non-numeric".to_string()))
    }

    /// Fetch and parse the full unread feed into degraded thread summaries
    pub fn fetch_unread_summary(&self, partition: &str, url: &str) -> Result<UnreadSummary> {
        let feed = parse_feed(&self.fetch_feed(partition, url)?)?;
        Ok(summarize(feed, Utc::now().timestamp_millis()))
    }

    /// GET through the partition's agent, with its cookie jar attached
    fn fetch_feed(&self, partition: &str, url: &str) -> Result<String> {
        let agent = self.partition_agent(partition);
        let mut response = agent.get(url).call()?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Err(Error::MalformedFeed(format!(
                "feed fetch returned status {}",
                status
            )));
        }
        Ok(response.body_mut().read_to_string()?)
    }

    fn partition_agent(&self, partition: &str) -> Agent {
        let mut partitions = self.partitions.lock().expect("partition map poisoned");
        partitions
            .entry(partition.to_string())
            .or_insert_with(|| {
                log::debug!("creating feed session for partition {}", partition);
                Agent::config_builder()
                    .http_status_as_error(false)
                    .timeout_global(Some(Duration::from_secs(30)))
                    .build()
                    .new_agent()
            })
            .clone()
    }
}

impl Default for AtomFeedAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_feed(xml: &str) -> Result<FeedDoc> {
    quick_xml::de::from_str(xml).map_err(|e| Error::MalformedFeed(e.to_string()))
}

/// Map a parsed feed to summaries; `now_millis` backs every timestamp
/// default so one parse run yields consistent fallbacks
fn summarize(feed: FeedDoc, now_millis: i64) -> UnreadSummary {
    UnreadSummary {
        threads: feed
            .entries
            .iter()
            .map(|entry| entry_summary(entry, now_millis))
            .collect(),
        count: feed
            .fullcount
            .as_deref()
            .and_then(|c| c.trim().parse().ok())
            .unwrap_or(0),
        timestamp: millis_or(feed.modified.as_deref(), now_millis),
    }
}

fn entry_summary(entry: &EntryDoc, now_millis: i64) -> AtomThreadSummary {
    let modified_millis = millis_or(entry.modified.as_deref(), now_millis);
    let history_id = modified_millis.to_string();

    AtomThreadSummary {
        id: entry.id.clone().unwrap_or_default(),
        history_id: history_id.clone(),
        latest_message: MessageSummary {
            id: alternate_link_param(&entry.links, "message_id"),
            history_id: Some(history_id),
            from: author_display(entry.author.as_ref()),
            to: alternate_link_param(&entry.links, "account_id"),
            subject: entry.title.clone().unwrap_or_default(),
            snippet: entry.summary.clone().unwrap_or_default(),
            internal_date: modified_millis,
        },
    }
}

/// Author display string: name, then `<email>` when present, space-joined
/// with empty parts omitted
fn author_display(author: Option<&AuthorDoc>) -> String {
    let Some(author) = author else {
        return String::new();
    };
    let mut parts = Vec::new();
    if let Some(name) = author.name.as_deref().filter(|n| !n.is_empty()) {
        parts.push(name.to_string());
    }
    if let Some(email) = author.email.as_deref().filter(|e| !e.is_empty()) {
        parts.push(format!("<{}>", email));
    }
    parts.join(" ")
}

/// Modification timestamp in milliseconds, falling back when absent or
/// unparseable
fn millis_or(modified: Option<&str>, fallback: i64) -> i64 {
    modified
        .and_then(|m| DateTime::parse_from_rfc3339(m.trim()).ok())
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(fallback)
}

/// A query parameter of the entry's `rel="alternate"` link, when both exist
fn alternate_link_param(links: &[LinkDoc], param: &str) -> Option<String> {
    let href = links
        .iter()
        .find(|link| link.rel.as_deref() == Some("alternate"))?
        .href
        .as_deref()?;
    let url = Url::parse(href).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == param)
        .map(|(_, value)| value.into_owned())
}
