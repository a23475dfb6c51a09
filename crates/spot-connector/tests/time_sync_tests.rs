/*
[INPUT]:  Mock server time endpoint with controlled latency
[OUTPUT]: Test results for server time offset synchronization
[POS]:    Integration tests - clock offset synchronizer over HTTP
[UPDATE]: When sync policy or probe endpoint changes
*/

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    FrozenClock, config_for, requests_to, setup_mock_server, signature_is_valid, test_credentials,
};
use reqwest::Method;
use spot_connector::{
    ConnectorError, Params, RetryPolicy, SpotClient, SyncOutcome, TimeSyncConfig,
};
use tokio_test::assert_ok;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_server_time(server: &MockServer, server_time: i64, delay: Duration) {
    Mock::given(method("GET"))
        .and(path("/api/v3/time"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "serverTime": server_time }))
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

async fn wait_for_requests(server: &MockServer, path: &str, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while requests_to(server, path).await.len() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("expected requests not received in time");
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_construction_starts_initial_sync() {
    let server = setup_mock_server().await;
    mount_server_time(&server, 5_000_250, Duration::ZERO).await;

    let client = assert_ok!(SpotClient::with_clock(
        Some(test_credentials()),
        config_for(&server).with_server_time_offset(true),
        FrozenClock::at(5_000_000),
    ));

    wait_until(|| client.time_offset().is_synced()).await;
    assert_eq!(client.time_offset().offset_ms, 250);
    assert_eq!(client.time_offset().last_sync_ms, Some(5_000_000));
    assert_eq!(requests_to(&server, "/api/v3/time").await.len(), 1);
}

#[tokio::test]
async fn test_overlapping_syncs_issue_one_probe() {
    let server = setup_mock_server().await;
    mount_server_time(&server, 1_000, Duration::from_millis(300)).await;

    let client = Arc::new(assert_ok!(SpotClient::with_credentials(
        test_credentials(),
        config_for(&server).with_server_time_offset(true),
    )));

    // construction already started a probe
    wait_until(|| client.synchronizer().is_sync_in_progress()).await;
    let synchronizer = client.synchronizer();
    assert_eq!(assert_ok!(synchronizer.sync().await), SyncOutcome::InProgress);
    assert_eq!(assert_ok!(synchronizer.sync().await), SyncOutcome::InProgress);

    // waits for the in-flight probe instead of starting another one
    assert_eq!(assert_ok!(client.sync_time().await), SyncOutcome::Fresh);
    assert!(client.time_offset().is_synced());
    assert_eq!(requests_to(&server, "/api/v3/time").await.len(), 1);

    // a fresh offset is reused
    assert_eq!(assert_ok!(client.sync_time().await), SyncOutcome::Fresh);
    assert_eq!(requests_to(&server, "/api/v3/time").await.len(), 1);
}

#[tokio::test]
async fn test_refresh_after_interval_probes_again() {
    let server = setup_mock_server().await;
    mount_server_time(&server, 2_000, Duration::ZERO).await;

    let clock = FrozenClock::at(1_000);
    let client = assert_ok!(SpotClient::with_clock(
        Some(test_credentials()),
        config_for(&server).with_server_time_offset(true),
        clock.clone(),
    ));
    wait_until(|| client.time_offset().is_synced()).await;

    clock.advance(10_000);
    assert_eq!(assert_ok!(client.sync_time().await), SyncOutcome::Fresh);

    clock.advance(20_000);
    assert_eq!(
        assert_ok!(client.sync_time().await),
        SyncOutcome::Synced {
            offset_ms: 2_000 - 31_000,
            round_trip_ms: 0,
        }
    );
    assert_eq!(requests_to(&server, "/api/v3/time").await.len(), 2);
}

#[tokio::test]
async fn test_slow_probes_are_retried_then_abandoned() {
    let server = setup_mock_server().await;
    mount_server_time(&server, 1_000, Duration::from_millis(150)).await;

    let time_sync = TimeSyncConfig {
        trust_threshold: Duration::from_millis(50),
        retry: RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        },
        ..TimeSyncConfig::enabled()
    };
    let client = assert_ok!(SpotClient::new(config_for(&server).with_time_sync(time_sync)));

    // claims the guard before the construction-time sync gets to run
    assert_eq!(assert_ok!(client.sync_time().await), SyncOutcome::Abandoned { attempts: 3 });

    assert_eq!(requests_to(&server, "/api/v3/time").await.len(), 3);
    assert!(!client.time_offset().is_synced());
    assert_eq!(client.time_offset().offset_ms, 0);
}

#[tokio::test]
async fn test_failed_probe_does_not_wedge_sync() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/time"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/time"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "serverTime": 9_000,
        })))
        .mount(&server)
        .await;

    let client = assert_ok!(SpotClient::with_clock(
        None,
        config_for(&server).with_server_time_offset(true),
        FrozenClock::at(8_000),
    ));
    // claims the guard before the construction-time sync gets to run
    let err = client.sync_time().await.unwrap_err();
    assert!(matches!(err, ConnectorError::Api { code: 503, .. }));
    assert!(!client.synchronizer().is_sync_in_progress());

    assert_eq!(
        assert_ok!(client.sync_time().await),
        SyncOutcome::Synced {
            offset_ms: 1_000,
            round_trip_ms: 0,
        }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sync_time_waits_for_initial_sync() {
    let server = setup_mock_server().await;
    mount_server_time(&server, 1_700_000_000_000, Duration::from_millis(100)).await;
    Mock::given(method("GET"))
        .and(path("/api/v3/account"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "canTrade": true,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = assert_ok!(SpotClient::with_credentials(
        test_credentials(),
        config_for(&server).with_server_time_offset(true),
    ));
    // let the construction-time sync claim the guard first
    tokio::time::sleep(Duration::from_millis(5)).await;

    let outcome = assert_ok!(client.sync_time().await);
    assert!(
        matches!(outcome, SyncOutcome::Fresh | SyncOutcome::Synced { .. }),
        "unexpected outcome {outcome:?}"
    );
    assert!(client.time_offset().is_synced());

    let account: serde_json::Value = assert_ok!(
        client
            .sign_request(Method::GET, "/api/v3/account", &Params::new())
            .await
    );
    assert_eq!(account["canTrade"], true);
    assert_eq!(requests_to(&server, "/api/v3/time").await.len(), 1);
}

#[tokio::test]
async fn test_stale_offset_refreshes_in_background_on_sign() {
    let server = setup_mock_server().await;
    mount_server_time(&server, 61_000, Duration::ZERO).await;

    let clock = FrozenClock::at(1_000);
    let client = assert_ok!(SpotClient::with_clock(
        Some(test_credentials()),
        config_for(&server).with_server_time_offset(true),
        clock.clone(),
    ));
    assert!(matches!(
        assert_ok!(client.sync_time().await),
        SyncOutcome::Synced { offset_ms: 60_000, .. }
    ));
    assert_eq!(requests_to(&server, "/api/v3/time").await.len(), 1);

    clock.advance(31_000);
    let request = assert_ok!(client.prepare_signed(Method::GET, "/api/v3/account", &Params::new()));

    // signed with the offset committed before the refresh
    let query = request.query().expect("signed request has a query");
    assert!(query.starts_with("timestamp=92000&signature="), "query was {query}");
    assert!(signature_is_valid(query));

    wait_for_requests(&server, "/api/v3/time", 2).await;
    wait_until(|| client.time_offset().last_sync_ms == Some(32_000)).await;
    assert_eq!(client.time_offset().offset_ms, 61_000 - 32_000);
}
