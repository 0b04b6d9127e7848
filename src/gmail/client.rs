//! Gmail API HTTP client
//!
//! Thin request wrappers over the provider endpoints. Uses synchronous
//! HTTP (ureq) to be executor-agnostic. Every operation follows the same
//! contract: gate on the credential, issue one request, treat any non-200
//! status as a rejection, otherwise return the typed payload.

use std::time::Duration;

use serde::de::DeserializeOwned;
use ureq::Agent;

use super::api;
use crate::error::{Error, Result};
use crate::models::{Credential, ThreadId};

/// Literal prefix Gmail uses when another session already holds the push
/// registration. Wording-dependent by necessity; kept in one place so a
/// provider change only touches this predicate.
const DUPLICATE_WATCH_PREFIX: &str =
    "Only one user push notification client allowed per developer";

/// Filters for a thread listing call
#[derive(Debug, Clone)]
pub struct ListThreadsOptions {
    /// Provider search query (same syntax as the mailbox search box)
    pub query: Option<String>,
    /// Restrict to threads carrying all of these labels
    pub label_ids: Vec<String>,
    /// Maximum number of headers to return
    pub limit: usize,
    pub page_token: Option<String>,
}

impl Default for ListThreadsOptions {
    fn default() -> Self {
        Self {
            query: None,
            label_ids: Vec::new(),
            limit: 25,
            page_token: None,
        }
    }
}

/// Gmail API client
pub struct GmailClient {
    api_base: String,
    userinfo_url: String,
    agent: Agent,
}

impl GmailClient {
    const API_BASE: &'static str = "https://gmail.googleapis.com/gmail/v1";
    const USERINFO_URL: &'static str = "https://www.googleapis.com/oauth2/v1/userinfo";

    pub fn new() -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(Duration::from_secs(30)))
            .build()
            .new_agent();

        Self {
            api_base: Self::API_BASE.to_string(),
            userinfo_url: Self::USERINFO_URL.to_string(),
            agent,
        }
    }

    /// Override the API base URL (tests)
    pub fn with_api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into();
        self
    }

    /// Override the userinfo endpoint (tests)
    pub fn with_userinfo_url(mut self, url: impl Into<String>) -> Self {
        self.userinfo_url = url.into();
        self
    }

    /// Basic identity metadata for the authorized user
    pub fn fetch_profile(&self, credential: Option<&Credential>) -> Result<api::UserInfo> {
        let url = self.userinfo_url.clone();
        self.get_json(credential, &url)
    }

    /// Mailbox-level profile: address, totals, and the current history id
    pub fn fetch_mailbox_profile(
        &self,
        credential: Option<&Credential>,
    ) -> Result<api::MailboxProfile> {
        let url = format!("{}/users/me/profile", self.api_base);
        self.get_json(credential, &url)
    }

    /// Cheap single-label metadata, usable as a change probe before a full
    /// listing
    pub fn fetch_label(
        &self,
        credential: Option<&Credential>,
        label_id: &str,
    ) -> Result<api::Label> {
        let url = format!("{}/users/me/labels/{}", self.api_base, label_id);
        self.get_json(credential, &url)
    }

    /// List change records since a given history id
    pub fn fetch_history(
        &self,
        credential: Option<&Credential>,
        from_history_id: &str,
    ) -> Result<api::HistoryResponse> {
        let credential = require(credential)?;
        let url = format!("{}/users/me/history", self.api_base);
        let response = self
            .agent
            .get(&url)
            .query("startHistoryId", from_history_id)
            .header("Authorization", &bearer(credential))
            .call()?;
        read_payload(response)
    }

    /// List current thread headers.
    ///
    /// The provider's order is semantically meaningful (most recent first)
    /// and is preserved verbatim; callers must not re-sort.
    pub fn list_thread_headers(
        &self,
        credential: Option<&Credential>,
        options: &ListThreadsOptions,
    ) -> Result<api::ListThreadsResponse> {
        let credential = require(credential)?;
        let url = format!("{}/users/me/threads", self.api_base);

        let mut request = self
            .agent
            .get(&url)
            .query("maxResults", &options.limit.to_string())
            .header("Authorization", &bearer(credential));
        if let Some(query) = &options.query {
            request = request.query("q", query);
        }
        for label_id in &options.label_ids {
            request = request.query("labelIds", label_id);
        }
        if let Some(token) = &options.page_token {
            request = request.query("pageToken", token);
        }

        read_payload(request.call()?)
    }

    /// Fetch one full thread by id
    pub fn fetch_thread(
        &self,
        credential: Option<&Credential>,
        thread_id: &ThreadId,
    ) -> Result<api::GmailThread> {
        let url = format!("{}/users/me/threads/{}", self.api_base, thread_id.as_str());
        self.get_json(credential, &url)
    }

    /// Register for push notifications on the account.
    ///
    /// Tolerates exactly one rejection: the provider's "only one push
    /// client per developer" answer, which means another session already
    /// holds the registration and is remapped to an empty success. Any
    /// other rejection propagates.
    pub fn register_watch(
        &self,
        credential: Option<&Credential>,
        topic_name: &str,
    ) -> Result<api::WatchResponse> {
        let credential = require(credential)?;
        let url = format!("{}/users/me/watch", self.api_base);
        let mut response = self
            .agent
            .post(&url)
            .header("Authorization", &bearer(credential))
            .send_json(serde_json::json!({ "topicName": topic_name }))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.body_mut().read_to_string().unwrap_or_default();
            if is_duplicate_watch_rejection(&body) {
                log::debug!("watch already registered by another session");
                return Ok(api::WatchResponse::default());
            }
            return Err(Error::UpstreamRejected { status, body });
        }

        Ok(response.body_mut().read_json()?)
    }

    /// GET a credential-gated endpoint and parse its JSON payload
    fn get_json<T: DeserializeOwned>(
        &self,
        credential: Option<&Credential>,
        url: &str,
    ) -> Result<T> {
        let credential = require(credential)?;
        let response = self
            .agent
            .get(url)
            .header("Authorization", &bearer(credential))
            .call()?;
        read_payload(response)
    }
}

impl Default for GmailClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Reject absent or token-less credentials before any request is issued
fn require(credential: Option<&Credential>) -> Result<&Credential> {
    match credential {
        Some(credential) if credential.is_usable() => Ok(credential),
        Some(_) => Err(Error::MissingCredential("credential has no token pair")),
        None => Err(Error::MissingCredential("no credential supplied")),
    }
}

fn bearer(credential: &Credential) -> String {
    format!("Bearer {}", credential.access_token)
}

/// Apply the common response contract: 200 parses, anything else rejects
fn read_payload<T: DeserializeOwned>(
    mut response: ureq::http::Response<ureq::Body>,
) -> Result<T> {
    let status = response.status().as_u16();
    if status != 200 {
        return Err(Error::UpstreamRejected {
            status,
            body: response.body_mut().read_to_string().unwrap_or_default(),
        });
    }
    Ok(response.body_mut().read_json()?)
}

/// The single place the provider's duplicate-watch wording is matched
fn is_duplicate_watch_rejection(body: &str) -> bool {
    if let Ok(envelope) = serde_json::from_str::<api::ErrorEnvelope>(body)
        && let Some(message) = envelope.error.and_then(|e| e.message)
    {
        return message.starts_with(DUPLICATE_WATCH_PREFIX);
    }
    body.trim_start().starts_with(DUPLICATE_WATCH_PREFIX)
}
