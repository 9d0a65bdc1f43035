//! Integration tests for the leecher
//!
//! These tests use wiremock to stand in for the login and search endpoints and
//! drive full sessions end-to-end.

use serde_json::json;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zoomeye_leecher::config::Config;
use zoomeye_leecher::leech::{PageBatch, Session, StopReason};
use zoomeye_leecher::{AuthError, LeechError, SessionState};

const TOKEN: &str = "test-token";

/// Points a default configuration at the mock server
fn create_test_config(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.api.login_url = format!("{}/user/login", server.uri());
    config.api.search_url = format!("{}/host/search", server.uri());
    config.api.request_timeout_secs = 5;
    config
}

fn create_test_session(server: &MockServer) -> Session {
    Session::new(create_test_config(server), "user@example.com", "secret")
        .expect("Failed to create session")
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/user/login"))
        .and(body_json(json!({"username": "user@example.com", "password": "secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": TOKEN})))
        .expect(1)
        .mount(server)
        .await;
}

/// A search response with `count` distinct matches for `page`
fn page_body(page: u32, count: usize) -> serde_json::Value {
    let matches: Vec<_> = (0..count)
        .map(|i| json!({"ip": format!("10.0.{}.{}", page, i), "page": page}))
        .collect();
    json!({"matches": matches, "total": 100})
}

async fn mount_page(server: &MockServer, query: &str, page: u32, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/host/search"))
        .and(header("Authorization", "JWT test-token"))
        .and(query_param("query", query))
        .and(query_param("page", page.to_string().as_str()))
        .respond_with(response)
        .expect(1)
        .mount(server)
        .await;
}

/// Serves one match for every page, after `delay`
async fn mount_any_page(server: &MockServer, delay: Duration) {
    Mock::given(method("GET"))
        .and(path("/host/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page_body(0, 1))
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

/// Page numbers the server actually saw, in arrival order
async fn requested_pages(server: &MockServer) -> Vec<u32> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == "/host/search")
        .filter_map(|r| {
            r.url
                .query_pairs()
                .find(|(k, _)| k == "page")
                .and_then(|(_, v)| v.parse().ok())
        })
        .collect()
}

fn rejected(page: u32, status: u16) -> StopReason {
    StopReason::Rejected { page, status }
}

fn assert_no_duplicates(pages: &[u32]) {
    let unique: HashSet<u32> = pages.iter().copied().collect();
    assert_eq!(unique.len(), pages.len(), "page requested twice: {:?}", pages);
}

/// Drains a batch receiver into a vector
async fn collect_batches(mut rx: mpsc::Receiver<PageBatch>) -> Vec<PageBatch> {
    let mut batches = Vec::new();
    while let Some(batch) = rx.recv().await {
        batches.push(batch);
    }
    batches
}

#[tokio::test]
async fn test_bulk_collects_every_match() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    let counts = [3, 2, 0, 4, 1];
    for (i, count) in counts.iter().enumerate() {
        let page = i as u32 + 1;
        mount_page(
            &server,
            "webcam",
            page,
            ResponseTemplate::new(200).set_body_json(page_body(page, *count)),
        )
        .await;
    }

    let session = create_test_session(&server);
    let report = session.collect("webcam", 4, 5).await.expect("Run failed");

    assert_eq!(report.matches.len(), 10);
    assert_eq!(report.match_count, 10);

    let ips: HashSet<String> = report
        .matches
        .iter()
        .map(|m| m["ip"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ips.len(), 10, "duplicate matches in aggregate");
    for (i, count) in counts.iter().enumerate() {
        for j in 0..*count {
            assert!(ips.contains(&format!("10.0.{}.{}", i + 1, j)));
        }
    }

    assert_eq!(report.pages_requested(), vec![1, 2, 3, 4, 5]);
    assert_eq!(report.workers.len(), 4);
    assert!(report
        .workers
        .iter()
        .all(|w| w.stop_reason == StopReason::Exhausted));
    assert!(!report.cancelled);
    assert_eq!(session.state(), SessionState::Stopped);
}

#[tokio::test]
async fn test_bulk_requests_each_page_at_most_once() {
    for (connections, ceiling) in [(1, 3), (4, 4), (8, 3), (3, 12)] {
        let server = MockServer::start().await;
        mount_login(&server).await;
        for page in 1..=ceiling {
            mount_page(
                &server,
                "webcam",
                page,
                ResponseTemplate::new(200).set_body_json(page_body(page, 1)),
            )
            .await;
        }

        let session = create_test_session(&server);
        let report = session
            .collect("webcam", connections, ceiling)
            .await
            .expect("Run failed");

        let mut seen = requested_pages(&server).await;
        assert_no_duplicates(&seen);
        seen.sort_unstable();
        assert_eq!(seen, (1..=ceiling).collect::<Vec<_>>());
        assert_eq!(report.pages_requested(), seen);
        assert_eq!(report.matches.len(), ceiling as usize);
    }
}

#[tokio::test]
async fn test_login_failure_prevents_page_fetches() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/user/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "bad credentials"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/host/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(1, 1)))
        .expect(0)
        .mount(&server)
        .await;

    let session = create_test_session(&server);
    let result = session.collect("webcam", 4, 5).await;

    assert!(matches!(
        result,
        Err(LeechError::Auth(AuthError::Rejected { status: 401 }))
    ));
    assert_eq!(session.state(), SessionState::Stopped);
    assert!(requested_pages(&server).await.is_empty());
}

#[tokio::test]
async fn test_login_without_token_is_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/user/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let session = create_test_session(&server);
    let (tx, _rx) = mpsc::channel(4);
    let result = session.stream("webcam", 2, 3, tx).await;

    assert!(matches!(
        result,
        Err(LeechError::Auth(AuthError::MalformedBody(_)))
    ));
    assert!(requested_pages(&server).await.is_empty());
}

#[tokio::test]
async fn test_authenticate_is_cached() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    let session = create_test_session(&server);
    let first = session.authenticate().await.expect("Login failed");
    let second = session.authenticate().await.expect("Login failed");

    assert_eq!(first, second);
    assert_eq!(first.as_str(), TOKEN);
    assert_eq!(session.state(), SessionState::Authenticated);
}

#[tokio::test]
async fn test_concurrent_authenticate_logs_in_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": TOKEN}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let session = create_test_session(&server);
    let (first, second) = tokio::join!(session.authenticate(), session.authenticate());

    assert_eq!(first.expect("Login failed").as_str(), TOKEN);
    assert_eq!(second.expect("Login failed").as_str(), TOKEN);
    assert_eq!(session.state(), SessionState::Authenticated);
}

#[tokio::test]
async fn test_concurrent_authenticate_after_rejected_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user/login"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(200)))
        .expect(1)
        .mount(&server)
        .await;

    let session = create_test_session(&server);
    let (first, second) = tokio::join!(session.authenticate(), session.authenticate());

    let results = [first, second];
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(LeechError::Auth(AuthError::Rejected { status: 401 }))))
        .count();
    let invalid = results
        .iter()
        .filter(|r| matches!(r, Err(LeechError::InvalidTransition { .. })))
        .count();
    assert_eq!((rejected, invalid), (1, 1));
    assert_eq!(session.state(), SessionState::Stopped);
}

#[tokio::test]
async fn test_server_error_halts_only_that_worker() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    for page in [1, 3, 4, 5] {
        mount_page(
            &server,
            "webcam",
            page,
            ResponseTemplate::new(200)
                .set_body_json(page_body(page, 1))
                .set_delay(Duration::from_millis(20)),
        )
        .await;
    }
    mount_page(&server, "webcam", 2, ResponseTemplate::new(500)).await;

    let session = create_test_session(&server);
    let report = session.collect("webcam", 2, 5).await.expect("Run failed");

    // The surviving worker drains the rest of the queue.
    assert_eq!(report.pages_requested(), vec![1, 2, 3, 4, 5]);
    assert_eq!(report.matches.len(), 4);

    let failures: Vec<_> = report.failures().cloned().collect();
    assert_eq!(failures, vec![rejected(2, 500)]);
    assert_eq!(
        report
            .workers
            .iter()
            .filter(|w| w.stop_reason == StopReason::Exhausted)
            .count(),
        1
    );
}

#[tokio::test]
async fn test_every_page_failing_yields_empty_result() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/host/search"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let session = create_test_session(&server);
    let report = session.collect("webcam", 3, 10).await.expect("Run failed");

    assert!(report.is_empty());
    assert_eq!(report.pages_succeeded(), 0);
    assert_eq!(report.failures().count(), 3);
    assert_no_duplicates(&requested_pages(&server).await);
}

#[tokio::test]
async fn test_malformed_page_stops_worker() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_page(
        &server,
        "webcam",
        1,
        ResponseTemplate::new(200).set_body_string("definitely not json"),
    )
    .await;

    let session = create_test_session(&server);
    let report = session.collect("webcam", 1, 1).await.expect("Run failed");

    assert!(report.is_empty());
    assert!(matches!(
        report.workers[0].stop_reason,
        StopReason::Malformed { page: 1, .. }
    ));
}

#[tokio::test]
async fn test_query_is_url_encoded() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    let query = "port:80 country:\"DE\" && app:nginx";
    mount_page(
        &server,
        query,
        1,
        ResponseTemplate::new(200).set_body_json(page_body(1, 2)),
    )
    .await;

    let session = create_test_session(&server);
    let report = session.collect(query, 1, 1).await.expect("Run failed");

    assert_eq!(report.matches.len(), 2);
}

#[tokio::test]
async fn test_stream_forbidden_page_never_refetched() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    for page in [1, 3] {
        mount_page(
            &server,
            "webcam",
            page,
            ResponseTemplate::new(200)
                .set_body_json(page_body(page, 2))
                .set_delay(Duration::from_millis(20)),
        )
        .await;
    }
    mount_page(&server, "webcam", 2, ResponseTemplate::new(403)).await;

    let session = create_test_session(&server);
    let (tx, rx) = mpsc::channel(8);
    let (report, batches) = tokio::join!(
        session.stream("webcam", 2, 3, tx),
        collect_batches(rx)
    );
    let report = report.expect("Run failed");

    let seen = requested_pages(&server).await;
    assert_no_duplicates(&seen);
    assert_eq!(report.pages_requested(), vec![1, 2, 3]);

    let failures: Vec<_> = report.failures().cloned().collect();
    assert_eq!(failures, vec![rejected(2, 403)]);

    let streamed: HashSet<u32> = batches.iter().map(|b| b.page).collect();
    assert_eq!(streamed, HashSet::from([1, 3]));
    assert_eq!(report.match_count, 4);
    assert!(report.matches.is_empty());
}

#[tokio::test]
async fn test_stream_covers_limit_without_gaps() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_any_page(&server, Duration::from_millis(5)).await;

    let session = create_test_session(&server);
    let (tx, rx) = mpsc::channel(4);
    let (report, batches) = tokio::join!(
        session.stream("webcam", 8, 20, tx),
        collect_batches(rx)
    );
    let report = report.expect("Run failed");

    let mut seen = requested_pages(&server).await;
    assert_no_duplicates(&seen);
    seen.sort_unstable();
    assert_eq!(seen, (1..=20).collect::<Vec<_>>());

    let mut streamed: Vec<u32> = batches.iter().map(|b| b.page).collect();
    streamed.sort_unstable();
    assert_eq!(streamed, (1..=20).collect::<Vec<_>>());
    assert_eq!(report.match_count, 20);
}

#[tokio::test]
async fn test_stop_lets_in_flight_pages_finish() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_any_page(&server, Duration::from_millis(200)).await;

    let session = create_test_session(&server);
    let stop = session.stop_handle();
    let (tx, rx) = mpsc::channel(16);

    let (report, batches, ()) = tokio::join!(
        session.stream("webcam", 3, 1000, tx),
        collect_batches(rx),
        async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            stop.stop();
        }
    );
    let report = report.expect("Run failed");

    assert!(report.cancelled);
    assert!(report
        .workers
        .iter()
        .all(|w| w.stop_reason == StopReason::Cancelled));

    let requested = report.pages_requested();
    assert!(!requested.is_empty());
    assert!(requested.len() < 1000);
    // Nothing in flight was abandoned.
    assert_eq!(report.pages_succeeded() as usize, requested.len());
    assert_eq!(batches.len(), requested.len());

    let seen = requested_pages(&server).await;
    assert_eq!(seen.len(), requested.len());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(requested_pages(&server).await.len(), seen.len());
    assert_eq!(session.state(), SessionState::Stopped);
}

#[tokio::test]
async fn test_stop_during_login_launches_no_workers() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/user/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": TOKEN}))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/host/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(1, 1)))
        .expect(0)
        .mount(&server)
        .await;

    let session = create_test_session(&server);
    let stop = session.stop_handle();

    let (report, ()) = tokio::join!(session.collect("webcam", 4, 5), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop.stop();
    });
    let report = report.expect("Run failed");

    assert!(report.cancelled);
    assert!(report.workers.is_empty());
    assert_eq!(session.state(), SessionState::Stopped);
}

#[tokio::test]
async fn test_stop_before_run_returns_cancelled_report() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": TOKEN})))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/host/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(1, 1)))
        .expect(0)
        .mount(&server)
        .await;

    let session = create_test_session(&server);
    session.stop_handle().stop();
    assert_eq!(session.state(), SessionState::Unauthenticated);

    let (tx, rx) = mpsc::channel(4);
    let report = session.stream("webcam", 4, 10, tx).await.expect("Run failed");

    assert!(report.cancelled);
    assert!(report.workers.is_empty());
    assert!(collect_batches(rx).await.is_empty());
    assert_eq!(session.state(), SessionState::Stopped);
}

#[tokio::test]
async fn test_concurrent_run_is_rejected() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_any_page(&server, Duration::from_millis(100)).await;

    let session = create_test_session(&server);
    let (first, second) = tokio::join!(
        session.collect("webcam", 1, 2),
        session.collect("webcam", 1, 2)
    );

    assert!(first.is_ok());
    assert!(matches!(second, Err(LeechError::AlreadyRunning)));

    // A finished session cannot be restarted.
    let third = session.collect("webcam", 1, 2).await;
    assert!(matches!(
        third,
        Err(LeechError::InvalidTransition {
            from: SessionState::Stopped,
            ..
        })
    ));
}

#[tokio::test]
async fn test_dropped_receiver_stops_streaming() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_any_page(&server, Duration::ZERO).await;

    let session = create_test_session(&server);
    let (tx, rx) = mpsc::channel(1);
    drop(rx);

    let report = session.stream("webcam", 1, 5, tx).await.expect("Run failed");

    assert_eq!(report.pages_requested(), vec![1]);
    assert_eq!(
        report.workers[0].stop_reason,
        StopReason::SinkClosed { page: 1 }
    );
}

#[tokio::test]
async fn test_slow_page_times_out() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_any_page(&server, Duration::from_secs(3)).await;

    let mut config = create_test_config(&server);
    config.api.request_timeout_secs = 1;
    let session =
        Session::new(config, "user@example.com", "secret").expect("Failed to create session");

    let report = session.collect("webcam", 1, 3).await.expect("Run failed");

    assert!(report.is_empty());
    assert!(matches!(
        report.workers[0].stop_reason,
        StopReason::Transport { page: 1, .. }
    ));
}
