//! Integration tests for `refresh-failing` against a mock Miniflux server.
//!
//! Retry delays are zero so the suite stays fast; the retry policy itself is
//! unaffected by the delay length.

use miniflux_janitor::client::MinifluxClient;
use miniflux_janitor::secrets::Credentials;
use miniflux_janitor::tasks::{refresh_failing, RefreshStatus};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> MinifluxClient {
    let creds = Credentials::new(&server.uri(), SecretString::from("t0ken".to_string())).unwrap();
    MinifluxClient::new(creds).unwrap()
}

async fn mount_feeds(server: &MockServer, feeds: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/v1/feeds"))
        .and(header("X-Auth-Token", "t0ken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(feeds))
        .mount(server)
        .await;
}

// ============================================================================
// Selection
// ============================================================================

#[tokio::test]
async fn test_only_failing_feed_is_refreshed() {
    let server = MockServer::start().await;
    mount_feeds(
        &server,
        serde_json::json!([
            {"id": 546, "title": "Broken", "parsing_error_count": 3, "parsing_error_message": "timeout"},
            {"id": 547, "title": "Healthy", "parsing_error_count": 0, "parsing_error_message": ""}
        ]),
    )
    .await;
    Mock::given(method("PUT"))
        .and(path("/v1/feeds/546/refresh"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/feeds/547/refresh"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let summary = refresh_failing(&client_for(&server), Duration::ZERO, false)
        .await
        .unwrap();

    assert_eq!(summary.outcomes.len(), 1);
    assert_eq!(summary.outcomes[0].feed_id, 546);
    assert_eq!(summary.outcomes[0].status, RefreshStatus::Success);
    assert_eq!(summary.succeeded(), 1);
    assert_eq!(summary.failed(), 0);
}

#[tokio::test]
async fn test_message_only_counts_as_failing() {
    let server = MockServer::start().await;
    mount_feeds(
        &server,
        serde_json::json!([
            {"id": 9, "parsing_error_count": 0, "parsing_error_message": "bad xml"},
            {"id": 10, "parsing_error_count": 0, "parsing_error_message": "   "}
        ]),
    )
    .await;
    Mock::given(method("PUT"))
        .and(path("/v1/feeds/9/refresh"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/feeds/10/refresh"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let summary = refresh_failing(&client_for(&server), Duration::ZERO, false)
        .await
        .unwrap();
    assert_eq!(summary.outcomes.len(), 1);
}

#[tokio::test]
async fn test_dry_run_lists_failing_feeds_without_refreshing() {
    let server = MockServer::start().await;
    mount_feeds(
        &server,
        serde_json::json!([
            {"id": 546, "title": "Broken", "parsing_error_count": 1},
            {"id": 547, "title": "Healthy", "parsing_error_count": 0}
        ]),
    )
    .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let summary = refresh_failing(&client_for(&server), Duration::ZERO, true)
        .await
        .unwrap();

    assert!(summary.outcomes.is_empty());
    assert_eq!(summary.succeeded(), 0);
    assert_eq!(summary.would_refresh, vec![(546, "Broken".to_string())]);
}

#[tokio::test]
async fn test_no_failing_feeds_sends_no_refresh() {
    let server = MockServer::start().await;
    mount_feeds(
        &server,
        serde_json::json!([{"id": 1, "parsing_error_count": 0}]),
    )
    .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let summary = refresh_failing(&client_for(&server), Duration::ZERO, false)
        .await
        .unwrap();
    assert!(summary.outcomes.is_empty());
}

// ============================================================================
// Retry policy
// ============================================================================

#[tokio::test]
async fn test_server_error_then_success() {
    let server = MockServer::start().await;
    mount_feeds(
        &server,
        serde_json::json!([{"id": 3, "title": "Flaky", "parsing_error_count": 1}]),
    )
    .await;
    Mock::given(method("PUT"))
        .and(path("/v1/feeds/3/refresh"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/feeds/3/refresh"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let summary = refresh_failing(&client_for(&server), Duration::ZERO, false)
        .await
        .unwrap();

    let outcome = &summary.outcomes[0];
    assert_eq!(outcome.status, RefreshStatus::Success);
    assert_eq!(outcome.http_code, Some(204));
    assert_eq!(outcome.attempts, 2);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start().await;
    mount_feeds(
        &server,
        serde_json::json!([{"id": 4, "parsing_error_count": 2}]),
    )
    .await;
    Mock::given(method("PUT"))
        .and(path("/v1/feeds/4/refresh"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let summary = refresh_failing(&client_for(&server), Duration::ZERO, false)
        .await
        .unwrap();

    let outcome = &summary.outcomes[0];
    assert_eq!(outcome.status, RefreshStatus::NotFound);
    assert_eq!(outcome.http_code, Some(404));
    assert_eq!(outcome.attempts, 1);
}

#[tokio::test]
async fn test_rate_limited_twice_gives_up() {
    let server = MockServer::start().await;
    mount_feeds(
        &server,
        serde_json::json!([{"id": 5, "parsing_error_count": 1}]),
    )
    .await;
    Mock::given(method("PUT"))
        .and(path("/v1/feeds/5/refresh"))
        .respond_with(ResponseTemplate::new(429))
        .expect(2)
        .mount(&server)
        .await;

    let summary = refresh_failing(&client_for(&server), Duration::ZERO, false)
        .await
        .unwrap();

    let outcome = &summary.outcomes[0];
    assert_eq!(outcome.status, RefreshStatus::Transient);
    assert_eq!(outcome.http_code, Some(429));
    assert_eq!(outcome.attempts, 2);
    assert_eq!(summary.failed(), 1);
}

#[tokio::test]
async fn test_one_failure_does_not_stop_the_run() {
    let server = MockServer::start().await;
    mount_feeds(
        &server,
        serde_json::json!([
            {"id": 1, "title": "Gone", "parsing_error_count": 1},
            {"id": 2, "title": "Locked", "parsing_error_count": 1},
            {"id": 3, "title": "Fine", "parsing_error_count": 1}
        ]),
    )
    .await;
    Mock::given(method("PUT"))
        .and(path("/v1/feeds/1/refresh"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/feeds/2/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/feeds/3/refresh"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let summary = refresh_failing(&client_for(&server), Duration::ZERO, false)
        .await
        .unwrap();

    let statuses: Vec<(i64, RefreshStatus)> = summary
        .outcomes
        .iter()
        .map(|o| (o.feed_id, o.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            (1, RefreshStatus::NotFound),
            (2, RefreshStatus::Unauthorized),
            (3, RefreshStatus::Success),
        ]
    );
    assert_eq!(summary.failures().count(), 2);
}

#[tokio::test]
async fn test_feed_listing_failure_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/feeds"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = refresh_failing(&client_for(&server), Duration::ZERO, false).await;
    assert!(result.is_err());
}
