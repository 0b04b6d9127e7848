//! Integration tests for the sync engine against a mock provider
//!
//! Fetch-count properties (diff correctness, credential gating) are
//! asserted by replaying the mock server's request log.


use chrono::Utc;
use mailsync::{
    Credential, CredentialManager, Error, GmailClient, GmailCredentials, KnownThreadCache,
    ListThreadsOptions, MessageSummary, ThreadHeader, ThreadId, ThreadSummary,
    feed::AtomFeedAdapter, reconcile,
};
use mock_gmail::MockGmailServer;

fn credential() -> Credential {
    Credential::new("test-access", "test-refresh", i64::MAX)
}

fn manager(server: &MockGmailServer) -> CredentialManager {
    CredentialManager::new(GmailCredentials {
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
    })
    .with_token_url(format!("{}/token", server.url()))
}

fn client(server: &MockGmailServer) -> GmailClient {
    GmailClient::new()
        .with_api_base(server.url())
        .with_userinfo_url(format!("{}/userinfo", server.url()))
}

fn known_summary(id: &str, history_id: &str, subject: &str) -> ThreadSummary {
    ThreadSummary {
        id: ThreadId::new(id),
        history_id: history_id.to_string(),
        message_count: 1,
        latest_message: MessageSummary {
            subject: subject.to_string(),
            ..MessageSummary::default()
        },
    }
}

fn thread_json(id: &str, history_id: &str, from: &str, subject: &str) -> String {
    serde_json::json!({
        "id": id,
        "historyId": history_id,
        "messages": [{
            "id": format!("{}-m1", id),
            "historyId": history_id,
            "snippet": format!("snippet of {}", id),
            "internalDate": "1711360068000",
            "payload": {
                "headers": [
                    {"name": "From", "value": from},
                    {"name": "Subject", "value": subject}
                ]
            }
        }]
    })
    .to_string()
}

// === Credential lifecycle ===

#[test]
fn test_token_upgrade_round_trip() {
    let server = MockGmailServer::start();
    server.route(
        "POST",
        "/token",
        200,
        r#"{"access_token": "a", "refresh_token": "r", "expires_in": 3600}"#,
    );

    let before = Utc::now().timestamp();
    let exchange = manager(&server)
        .upgrade_authorization_code("one-time-code", "http://localhost:8080/cb")
        .unwrap();
    let after = Utc::now().timestamp();

    assert_eq!(exchange.access_token, "a");
    assert_eq!(exchange.refresh_token.as_deref(), Some("r"));
    assert!(exchange.captured_at >= before && exchange.captured_at <= after);

    let credential = CredentialManager::credential_from_upgrade_response(&exchange);
    assert_eq!(credential.expires_at, exchange.captured_at + 3600);
    assert!(credential.is_usable());
}

#[test]
fn test_token_upgrade_rejection_carries_raw_body() {
    let server = MockGmailServer::start();
    server.route("POST", "/token", 400, r#"{"error": "invalid_grant"}"#);

    let err = manager(&server)
        .upgrade_authorization_code("stale-code", "http://localhost:8080/cb")
        .unwrap_err();
    match err {
        Error::UpstreamRejected { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("invalid_grant"));
        }
        other => panic!("expected UpstreamRejected, got {:?}", other),
    }
}

#[test]
fn test_refresh_preserves_refresh_token_when_omitted() {
    let server = MockGmailServer::start();
    server.route(
        "POST",
        "/token",
        200,
        r#"{"access_token": "fresh", "expires_in": 3600}"#,
    );

    let refreshed = manager(&server)
        .refresh(&Credential::new("stale", "durable-refresh", 0))
        .unwrap();
    assert_eq!(refreshed.access_token, "fresh");
    assert_eq!(refreshed.refresh_token, "durable-refresh");
}

#[test]
fn test_ensure_fresh_passes_through_valid_and_refreshes_near_expiry() {
    let server = MockGmailServer::start();
    server.route(
        "POST",
        "/token",
        200,
        r#"{"access_token": "fresh", "refresh_token": "r2", "expires_in": 3600}"#,
    );
    let manager = manager(&server);
    let now = Utc::now().timestamp();

    // Comfortably ahead of the refresh buffer: returned unchanged, no
    // token-endpoint traffic.
    let valid = Credential::new("a", "r", now + 3_600);
    assert_eq!(manager.ensure_fresh(&valid).unwrap(), valid);
    assert!(server.requests().is_empty());

    // Within the buffer: exactly one refresh POST, new pair returned.
    let near_expiry = Credential::new("a", "r", now + 60);
    let refreshed = manager.ensure_fresh(&near_expiry).unwrap();
    assert_eq!(refreshed.access_token, "fresh");
    assert_eq!(refreshed.refresh_token, "r2");
    assert_eq!(server.request_count("POST /token"), 1);
}

// === Client operations ===

#[test]
fn test_credential_gating_issues_no_request() {
    let server = MockGmailServer::start();
    let client = client(&server);

    assert!(matches!(
        client.fetch_profile(None),
        Err(Error::MissingCredential(_))
    ));
    assert!(matches!(
        client.fetch_mailbox_profile(None),
        Err(Error::MissingCredential(_))
    ));
    assert!(matches!(
        client.fetch_label(None, "INBOX"),
        Err(Error::MissingCredential(_))
    ));
    assert!(matches!(
        client.fetch_history(None, "100"),
        Err(Error::MissingCredential(_))
    ));
    assert!(matches!(
        client.list_thread_headers(None, &ListThreadsOptions::default()),
        Err(Error::MissingCredential(_))
    ));
    assert!(matches!(
        client.fetch_thread(None, &ThreadId::new("t1")),
        Err(Error::MissingCredential(_))
    ));
    assert!(matches!(
        client.register_watch(None, "projects/p/topics/t"),
        Err(Error::MissingCredential(_))
    ));

    let empty = Credential::new("", "", 0);
    assert!(matches!(
        client.fetch_label(Some(&empty), "INBOX"),
        Err(Error::MissingCredential(_))
    ));

    assert!(server.requests().is_empty(), "no request may be issued");
}

#[test]
fn test_fetch_profile_and_mailbox_profile() {
    let server = MockGmailServer::start();
    server.route(
        "GET",
        "/userinfo",
        200,
        r#"{"id": "1", "email": "ada@example.com", "name": "Ada"}"#,
    );
    server.route(
        "GET",
        "/users/me/profile",
        200,
        r#"{"emailAddress": "ada@example.com", "messagesTotal": 52, "threadsTotal": 9, "historyId": "8675"}"#,
    );
    let client = client(&server);
    let cred = credential();

    let profile = client.fetch_profile(Some(&cred)).unwrap();
    assert_eq!(profile.email.as_deref(), Some("ada@example.com"));

    let mailbox = client.fetch_mailbox_profile(Some(&cred)).unwrap();
    assert_eq!(mailbox.history_id.as_deref(), Some("8675"));
    assert_eq!(mailbox.threads_total, Some(9));
}

#[test]
fn test_fetch_label_and_history() {
    let server = MockGmailServer::start();
    server.route(
        "GET",
        "/users/me/labels/INBOX",
        200,
        r#"{"id": "INBOX", "name": "INBOX", "threadsUnread": 2, "threadsTotal": 14}"#,
    );
    server.route(
        "GET",
        "/users/me/history",
        200,
        r#"{"historyId": "200", "history": [{"id": "150", "messages": [{"id": "m9", "threadId": "t9"}]}]}"#,
    );
    let client = client(&server);
    let cred = credential();

    let label = client.fetch_label(Some(&cred), "INBOX").unwrap();
    assert_eq!(label.threads_unread, Some(2));

    let history = client.fetch_history(Some(&cred), "100").unwrap();
    assert_eq!(history.history_id.as_deref(), Some("200"));
    assert_eq!(history.history.unwrap().len(), 1);
    let history_request = &server.requests()[1];
    assert!(history_request.contains("startHistoryId=100"));
}

#[test]
fn test_rejected_status_propagates() {
    let server = MockGmailServer::start();
    server.route(
        "GET",
        "/users/me/labels/INBOX",
        403,
        r#"{"error": {"code": 403, "message": "Insufficient Permission"}}"#,
    );

    let err = client(&server)
        .fetch_label(Some(&credential()), "INBOX")
        .unwrap_err();
    match err {
        Error::UpstreamRejected { status, body } => {
            assert_eq!(status, 403);
            assert!(body.contains("Insufficient Permission"));
        }
        other => panic!("expected UpstreamRejected, got {:?}", other),
    }
}

#[test]
fn test_list_thread_headers_preserves_provider_order() {
    let server = MockGmailServer::start();
    server.route(
        "GET",
        "/users/me/threads",
        200,
        r#"{"threads": [
            {"id": "zeta", "historyId": "3"},
            {"id": "alpha", "historyId": "1"},
            {"id": "mid", "historyId": "2"}
        ], "resultSizeEstimate": 3}"#,
    );

    let response = client(&server)
        .list_thread_headers(
            Some(&credential()),
            &ListThreadsOptions {
                query: Some("is:unread".to_string()),
                label_ids: vec!["INBOX".to_string()],
                page_token: Some("page-2".to_string()),
                ..ListThreadsOptions::default()
            },
        )
        .unwrap();

    let headers = response.threads.unwrap();
    let ids: Vec<&str> = headers.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["zeta", "alpha", "mid"]);

    let request = &server.requests()[0];
    assert!(request.contains("maxResults=25"));
    assert!(request.contains("labelIds=INBOX"));
    assert!(request.contains("pageToken=page-2"));
}

#[test]
fn test_watch_duplicate_rejection_is_tolerated() {
    let server = MockGmailServer::start();
    server.route(
        "POST",
        "/users/me/watch",
        400,
        r#"{"error": {"code": 400, "message": "Only one user push notification client allowed per developer project-123"}}"#,
    );

    let response = client(&server)
        .register_watch(Some(&credential()), "projects/p/topics/t")
        .unwrap();
    assert!(response.history_id.is_none());
    assert!(response.expiration.is_none());
}

#[test]
fn test_watch_other_rejection_propagates() {
    let server = MockGmailServer::start();
    server.route(
        "POST",
        "/users/me/watch",
        403,
        r#"{"error": {"code": 403, "message": "Insufficient Permission"}}"#,
    );

    let err = client(&server)
        .register_watch(Some(&credential()), "projects/p/topics/t")
        .unwrap_err();
    assert!(matches!(err, Error::UpstreamRejected { status: 403, .. }));
}

#[test]
fn test_watch_success_parses_payload() {
    let server = MockGmailServer::start();
    server.route(
        "POST",
        "/users/me/watch",
        200,
        r#"{"historyId": "424242", "expiration": "1712000000000"}"#,
    );

    let response = client(&server)
        .register_watch(Some(&credential()), "projects/p/topics/t")
        .unwrap();
    assert_eq!(response.history_id.as_deref(), Some("424242"));
}

// === Reconciliation ===

#[test]
fn test_reconcile_fetches_only_changed_threads() {
    let server = MockGmailServer::start();
    server.route(
        "GET",
        "/users/me/threads/B",
        200,
        &thread_json("B", "5", "Bob <bob@example.com>", "Fresh thread"),
    );

    let mut known = KnownThreadCache::new();
    known.insert(ThreadId::new("A"), known_summary("A", "1", "Cached thread"));

    let headers = vec![ThreadHeader::new("A", "1"), ThreadHeader::new("B", "5")];
    let cred = credential();
    let outcome = reconcile(&client(&server), Some(&cred), &known, &headers, None).unwrap();

    assert!(outcome.failed_ids.is_empty());
    assert_eq!(outcome.threads.len(), 2);
    assert_eq!(outcome.threads[0].id.as_str(), "A");
    assert_eq!(outcome.threads[0].latest_message.subject, "Cached thread");
    assert_eq!(outcome.threads[1].id.as_str(), "B");
    assert_eq!(outcome.threads[1].history_id, "5");
    assert_eq!(outcome.threads[1].latest_message.subject, "Fresh thread");

    assert_eq!(server.request_count("GET /users/me/threads/A"), 0);
    assert_eq!(server.request_count("GET /users/me/threads/B"), 1);
}

#[test]
fn test_reconcile_unchanged_cache_makes_no_fetches() {
    let server = MockGmailServer::start();

    let mut known = KnownThreadCache::new();
    known.insert(ThreadId::new("A"), known_summary("A", "1", "a"));
    known.insert(ThreadId::new("B"), known_summary("B", "2", "b"));

    // A fresh listing that agrees with the cache projects to the same
    // identity fields the summaries already carry.
    let headers = vec![
        known[&ThreadId::new("B")].header(),
        known[&ThreadId::new("A")].header(),
    ];
    let cred = credential();
    let outcome = reconcile(&client(&server), Some(&cred), &known, &headers, None).unwrap();

    assert!(server.requests().is_empty());
    assert!(outcome.failed_ids.is_empty());
    // Output follows header order, not cache order.
    let ids: Vec<&str> = outcome.threads.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["B", "A"]);
}

#[test]
fn test_reconcile_partial_failure_keeps_stale_and_drops_uncached() {
    let server = MockGmailServer::start();
    server.route(
        "GET",
        "/users/me/threads/A",
        500,
        r#"{"error": {"code": 500, "message": "backend error"}}"#,
    );
    // No route for C: the mock answers 404.

    let mut known = KnownThreadCache::new();
    known.insert(ThreadId::new("A"), known_summary("A", "1", "Stale but present"));

    let headers = vec![ThreadHeader::new("A", "2"), ThreadHeader::new("C", "9")];
    let cred = credential();
    let outcome = reconcile(&client(&server), Some(&cred), &known, &headers, None).unwrap();

    // A fell back to its prior summary at its original position; C had no
    // prior entry and is gone from the output.
    assert_eq!(outcome.threads.len(), 1);
    assert_eq!(outcome.threads[0].id.as_str(), "A");
    assert_eq!(outcome.threads[0].history_id, "1");
    assert_eq!(outcome.threads[0].latest_message.subject, "Stale but present");

    let mut failed: Vec<&str> = outcome.failed_ids.iter().map(|id| id.as_str()).collect();
    failed.sort_unstable();
    assert_eq!(failed, vec!["A", "C"]);
}

#[test]
fn test_reconcile_applies_post_process_to_fresh_threads_only() {
    let server = MockGmailServer::start();
    server.route(
        "GET",
        "/users/me/threads/B",
        200,
        &thread_json("B", "5", "Bob <bob@example.com>", "fresh"),
    );

    let mut known = KnownThreadCache::new();
    known.insert(ThreadId::new("A"), known_summary("A", "1", "cached"));

    let headers = vec![ThreadHeader::new("A", "1"), ThreadHeader::new("B", "5")];
    let post_process: &dyn Fn(ThreadSummary) -> ThreadSummary = &|mut summary| {
        summary.latest_message.subject = summary.latest_message.subject.to_uppercase();
        summary
    };
    let cred = credential();
    let outcome = reconcile(
        &client(&server),
        Some(&cred),
        &known,
        &headers,
        Some(post_process),
    )
    .unwrap();

    assert_eq!(outcome.threads[0].latest_message.subject, "cached");
    assert_eq!(outcome.threads[1].latest_message.subject, "FRESH");
    // Identity fields survived the post-process.
    assert_eq!(outcome.threads[1].id.as_str(), "B");
    assert_eq!(outcome.threads[1].history_id, "5");
}

// === Unread feed fallback ===

const FEED_BODY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed version="0.3" xmlns="http://purl.org/atom/ns#">
  <title>Inbox for ada@example.com</title>
  <fullcount>2</fullcount>
  <modified>2024-03-25T10:47:48Z</modified>
  <entry>
    <title>Quarterly report</title>
    <summary>The numbers are in</summary>
    <link rel="alternate" href="https://mail.example.com/mail?account_id=ada@example.com&amp;message_id=18f2a9&amp;view=conv" type="text/html"/>
    <modified>2024-03-25T10:47:48Z</modified>
    <id>tag:mail.example.com,2004:1425</id>
    <author><name>Grace Hopper</name><email>grace@example.com</email></author>
  </entry>
</feed>"#;

#[test]
fn test_feed_unread_count_and_summary() {
    let server = MockGmailServer::start();
    server.route("GET", "/feed/atom", 200, FEED_BODY);
    let url = format!("{}/feed/atom", server.url());
    let adapter = AtomFeedAdapter::new();

    assert_eq!(adapter.fetch_unread_count("partition-1", &url).unwrap(), 2);

    let summary = adapter.fetch_unread_summary("partition-1", &url).unwrap();
    assert_eq!(summary.count, 2);
    assert_eq!(summary.threads.len(), 1);
    let thread = &summary.threads[0];
    assert_eq!(thread.id, "tag:mail.example.com,2004:1425");
    assert_eq!(thread.latest_message.from, "Grace Hopper <grace@example.com>");
    assert_eq!(thread.latest_message.id.as_deref(), Some("18f2a9"));
    assert_eq!(thread.latest_message.to.as_deref(), Some("ada@example.com"));
}

#[test]
fn test_feed_http_failure_is_malformed_feed() {
    let server = MockGmailServer::start();
    server.route("GET", "/feed/atom", 403, "<html>denied</html>");
    let url = format!("{}/feed/atom", server.url());

    let err = AtomFeedAdapter::new()
        .fetch_unread_count("partition-1", &url)
        .unwrap_err();
    assert!(matches!(err, Error::MalformedFeed(_)));
}

#[test]
fn test_feed_missing_fullcount_fails_count_but_not_summary() {
    let server = MockGmailServer::start();
    server.route(
        "GET",
        "/feed/atom",
        200,
        r#"<feed xmlns="http://purl.org/atom/ns#"><modified>2024-03-25T10:47:48Z</modified></feed>"#,
    );
    let url = format!("{}/feed/atom", server.url());
    let adapter = AtomFeedAdapter::new();

    assert!(matches!(
        adapter.fetch_unread_count("p", &url),
        Err(Error::MalformedFeed(_))
    ));

    // The summary path defaults instead of raising.
    let summary = adapter.fetch_unread_summary("p", &url).unwrap();
    assert_eq!(summary.count, 0);
    assert!(summary.threads.is_empty());
}
