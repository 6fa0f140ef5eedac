//! speedtest.net backend tests against a mock HTTP server

use super::*;
use crate::logging::Logger;
use std::time::Duration;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string_contains, header, method, path},
};

/// Provider settings pointing every endpoint at the mock server
fn mock_settings(server: &MockServer) -> ProviderSettings {
    ProviderSettings {
        servers_url: format!("{}/api/js/servers", server.uri()),
        share_url: format!("{}/api/api.php", server.uri()),
        download_sizes: vec![350],
        upload_sizes: vec![1000],
        requests_per_size: 2,
        parallel_requests: 2,
        latency_probes: 2,
        timeout_seconds: 5,
        ..ProviderSettings::default()
    }
}

fn server_list(server: &MockServer) -> serde_json::Value {
    serde_json::json!([
        {
            "url": format!("{}/speedtest/upload.php", server.uri()),
            "name": "Near",
            "country": "Testland",
            "sponsor": "Fast ISP",
            "id": "1",
            "host": "near.example.net:8080",
            "distance": 5.0
        },
        {
            "url": format!("{}/other/upload.php", server.uri()),
            "name": "Far",
            "country": "Testland",
            "sponsor": "Slow ISP",
            "id": "2",
            "host": "far.example.net:8080",
            "distance": 10.0
        }
    ])
}

async fn mount_server_list(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/js/servers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(server_list(server)))
        .mount(server)
        .await;
}

async fn mount_latency(server: &MockServer, dir: &str, delay_ms: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/{}/latency.txt", dir)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("test=test\n")
                .set_delay(Duration::from_millis(delay_ms)),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_speed_test_against_mock_server() {
    let server = MockServer::start().await;
    mount_server_list(&server).await;
    mount_latency(&server, "speedtest", 0).await;
    mount_latency(&server, "other", 200).await;

    Mock::given(method("GET"))
        .and(path("/speedtest/random350x350.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 4096]))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/speedtest/upload.php"))
        .and(body_string_contains("content1="))
        .respond_with(ResponseTemplate::new(200).set_body_string("size=1000"))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/api.php"))
        .and(header("referer", "http://c.speedtest.net/flash/speedtest.swf"))
        .and(body_string_contains("serverid=1"))
        .and(body_string_contains("hash="))
        .and(body_string_contains("bytesreceived=8192"))
        .and(body_string_contains("bytessent=2000"))
        .respond_with(ResponseTemplate::new(200).set_body_string("resultid=987654&date=10%2F15%2F2026&time=8%3A30+AM&rating=0"))
        .expect(1)
        .mount(&server)
        .await;

    let client = SpeedtestNetClient::new(&mock_settings(&server)).unwrap();
    let report = run_speed_test(&client, &SpeedTestPlan::default(), &Logger::disabled()).await.unwrap();

    assert_eq!(report.server.id, "1");
    assert_eq!(report.server.sponsor, "Fast ISP");
    assert!(report.raw.download_bps > 0.0);
    assert!(report.raw.upload_bps > 0.0);
    assert!(report.raw.latency_ms >= 0.0);
    assert_eq!(report.raw.share_token, "http://www.speedtest.net/result/987654.png");
}

#[tokio::test]
async fn test_server_list_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/js/servers"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = SpeedtestNetClient::new(&mock_settings(&server)).unwrap();
    let err = client.servers().await.unwrap_err();

    assert!(matches!(err, MeasurementFailure::InvalidResponse(ref msg) if msg.contains("503")));
}

#[tokio::test]
async fn test_server_list_malformed_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/js/servers"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<settings></settings>"))
        .mount(&server)
        .await;

    let client = SpeedtestNetClient::new(&mock_settings(&server)).unwrap();
    let err = client.servers().await.unwrap_err();

    assert!(matches!(err, MeasurementFailure::InvalidResponse(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_server_list_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/js/servers"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let settings = ProviderSettings { timeout_seconds: 1, ..mock_settings(&server) };
    let client = SpeedtestNetClient::new(&settings).unwrap();
    let err = client.servers().await.unwrap_err();

    assert_eq!(err, MeasurementFailure::Timeout("server list".to_string()));
}

#[tokio::test]
async fn test_connection_refused_is_network_failure() {
    let settings = ProviderSettings {
        servers_url: "http://127.0.0.1:1/api/js/servers".to_string(),
        timeout_seconds: 2,
        ..ProviderSettings::default()
    };
    let client = SpeedtestNetClient::new(&settings).unwrap();
    let err = client.servers().await.unwrap_err();

    assert!(err.is_transient());
}

#[tokio::test]
async fn test_unexpected_latency_body_aborts_run() {
    let server = MockServer::start().await;
    mount_server_list(&server).await;
    for dir in ["speedtest", "other"] {
        Mock::given(method("GET"))
            .and(path(format!("/{}/latency.txt", dir)))
            .respond_with(ResponseTemplate::new(200).set_body_string("maintenance"))
            .mount(&server)
            .await;
    }

    let client = SpeedtestNetClient::new(&mock_settings(&server)).unwrap();
    let err = run_speed_test(&client, &SpeedTestPlan::default(), &Logger::disabled()).await.unwrap_err();

    assert!(matches!(err, MeasurementFailure::InvalidResponse(ref msg) if msg.contains("maintenance")));
}

#[tokio::test]
async fn test_share_without_result_id() {
    let server = MockServer::start().await;
    mount_server_list(&server).await;
    mount_latency(&server, "speedtest", 0).await;
    mount_latency(&server, "other", 0).await;

    Mock::given(method("POST"))
        .and(path("/api/api.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("error=invalid hash"))
        .mount(&server)
        .await;

    let client = SpeedtestNetClient::new(&mock_settings(&server)).unwrap();
    let plan = SpeedTestPlan { download: false, upload: false, ..SpeedTestPlan::default() };
    let err = run_speed_test(&client, &plan, &Logger::disabled()).await.unwrap_err();

    assert!(matches!(err, MeasurementFailure::InvalidResponse(ref msg) if msg.contains("result id")));
}

#[tokio::test]
async fn test_share_skipped_makes_no_share_request() {
    let server = MockServer::start().await;
    mount_server_list(&server).await;
    mount_latency(&server, "speedtest", 0).await;
    mount_latency(&server, "other", 0).await;

    Mock::given(method("POST"))
        .and(path("/api/api.php"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = SpeedtestNetClient::new(&mock_settings(&server)).unwrap();
    let plan = SpeedTestPlan { download: false, upload: false, share: false, ..SpeedTestPlan::default() };
    let report = run_speed_test(&client, &plan, &Logger::disabled()).await.unwrap();

    assert_eq!(report.raw.share_token, SHARE_NOT_REQUESTED);
}
