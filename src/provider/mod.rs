//! Speed measurement provider abstraction and test orchestration
//!
//! A [`SpeedTestBackend`] exposes the individual protocol steps (server
//! list, latency probe, download, upload, share). [`run_speed_test`] drives
//! them in order and turns the results into a [`RawMeasurement`].

pub mod speedtest_net;

#[cfg(test)]
mod integration_tests;

pub use speedtest_net::SpeedtestNetClient;

use crate::{
    logging::Logger,
    models::{config::ProviderSettings, RawMeasurement, ServerInfo},
};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Share token recorded when the share step is switched off
pub const SHARE_NOT_REQUESTED: &str = "not requested";

/// Typed provider failure. Any of these aborts the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeasurementFailure {
    #[error("network error: {0}")]
    Network(String),

    #[error("no speed test servers available")]
    NoServers,

    #[error("timed out during {0}")]
    Timeout(String),

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl MeasurementFailure {
    /// Failures that may go away on a later run
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }

    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::Network(_) => "Check your internet connection and try again.",
            Self::NoServers => "Remove or change the SERVER_IDS restriction, or check that the server list URL is reachable.",
            Self::Timeout(_) => "Increase PROVIDER_TIMEOUT_SECONDS or reduce the transfer sizes.",
            Self::InvalidResponse(_) => "The speed test service answered unexpectedly. Try another server or retry later.",
        }
    }
}

/// Result alias for provider operations
pub type MeasureResult<T> = std::result::Result<T, MeasurementFailure>;

/// Bytes moved by one transfer phase and how long it took
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransferStats {
    pub bytes: u64,
    pub elapsed: Duration,
}

impl TransferStats {
    pub fn bytes_per_sec(&self) -> f64 {
        if self.bytes == 0 {
            return 0.0;
        }
        self.bytes as f64 / self.elapsed.as_secs_f64().max(1e-6)
    }
}

/// Figures submitted to the share endpoint
#[derive(Debug, Clone)]
pub struct ShareRequest<'a> {
    pub server: &'a ServerInfo,
    pub latency_ms: f64,
    pub download: TransferStats,
    pub upload: TransferStats,
}

/// One speed measurement provider
#[async_trait]
pub trait SpeedTestBackend: Send + Sync {
    /// Candidate servers, in no particular order
    async fn servers(&self) -> MeasureResult<Vec<ServerInfo>>;

    /// Round trip of one latency probe against `server`
    async fn latency(&self, server: &ServerInfo) -> MeasureResult<Duration>;

    async fn download(&self, server: &ServerInfo) -> MeasureResult<TransferStats>;

    async fn upload(&self, server: &ServerInfo) -> MeasureResult<TransferStats>;

    /// Submit the results and return the shareable result identifier
    async fn share(&self, request: &ShareRequest<'_>) -> MeasureResult<String>;
}

/// Which steps a speed test runs
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedTestPlan {
    pub download: bool,
    pub upload: bool,
    pub share: bool,
    /// Only consider these server IDs (empty = any)
    pub server_ids: Vec<u32>,
    pub candidate_servers: usize,
    pub latency_probes: u32,
}

impl SpeedTestPlan {
    pub fn from_settings(settings: &ProviderSettings, download: bool, upload: bool, share: bool) -> Self {
        Self {
            download,
            upload,
            share,
            server_ids: settings.server_ids.clone(),
            candidate_servers: settings.candidate_servers.max(1),
            latency_probes: settings.latency_probes.max(1),
        }
    }
}

impl Default for SpeedTestPlan {
    fn default() -> Self {
        Self::from_settings(&ProviderSettings::default(), true, true, true)
    }
}

/// Outcome of a completed speed test
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedTestReport {
    pub server: ServerInfo,
    pub raw: RawMeasurement,
}

/// Run a full speed test against `backend`
pub async fn run_speed_test<B>(backend: &B, plan: &SpeedTestPlan, logger: &Logger) -> MeasureResult<SpeedTestReport>
where
    B: SpeedTestBackend + ?Sized,
{
    logger.debug("Retrieving speed test server list").log().await;
    let servers = backend.servers().await?;
    logger.debug("Server list retrieved")
        .field("server_count", servers.len())
        .log()
        .await;

    let candidates = select_candidates(servers, plan);
    if candidates.is_empty() {
        return Err(MeasurementFailure::NoServers);
    }

    let (server, latency) = pick_best_server(backend, candidates, plan.latency_probes, logger).await?;
    let latency_ms = latency.as_secs_f64() * 1000.0;
    logger.debug(&format!("Selected server {}", server))
        .field("server_id", &server.id)
        .field("latency_ms", latency_ms)
        .log()
        .await;

    let download = if plan.download {
        logger.debug("Running download test").log().await;
        backend.download(&server).await?
    } else {
        logger.debug("Download test skipped").log().await;
        TransferStats::default()
    };

    let upload = if plan.upload {
        logger.debug("Running upload test").log().await;
        backend.upload(&server).await?
    } else {
        logger.debug("Upload test skipped").log().await;
        TransferStats::default()
    };

    let share_token = if plan.share {
        logger.debug("Requesting share image").log().await;
        backend.share(&ShareRequest { server: &server, latency_ms, download, upload }).await?
    } else {
        SHARE_NOT_REQUESTED.to_string()
    };

    Ok(SpeedTestReport {
        raw: RawMeasurement {
            download_bps: download.bytes_per_sec(),
            upload_bps: upload.bytes_per_sec(),
            latency_ms,
            share_token,
        },
        server,
    })
}

/// Apply the server ID restriction and keep the closest candidates
fn select_candidates(mut servers: Vec<ServerInfo>, plan: &SpeedTestPlan) -> Vec<ServerInfo> {
    if !plan.server_ids.is_empty() {
        servers.retain(|s| plan.server_ids.iter().any(|id| id.to_string() == s.id));
    }
    servers.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    servers.truncate(plan.candidate_servers);
    servers
}

/// Probe every candidate and keep the one with the lowest mean latency.
/// A candidate with any failed probe is dropped.
async fn pick_best_server<B>(
    backend: &B,
    candidates: Vec<ServerInfo>,
    probes: u32,
    logger: &Logger,
) -> MeasureResult<(ServerInfo, Duration)>
where
    B: SpeedTestBackend + ?Sized,
{
    let mut best: Option<(ServerInfo, Duration)> = None;
    let mut last_failure = None;

    'candidates: for server in candidates {
        let mut total = Duration::ZERO;
        for _ in 0..probes {
            match backend.latency(&server).await {
                Ok(rtt) => total += rtt,
                Err(failure) => {
                    logger.warn(&format!("Latency probe failed for server {}", server.id))
                        .field("error", failure.to_string())
                        .log()
                        .await;
                    last_failure = Some(failure);
                    continue 'candidates;
                }
            }
        }

        let mean = total / probes;
        if best.as_ref().map_or(true, |(_, current)| mean < *current) {
            best = Some((server, mean));
        }
    }

    best.ok_or_else(|| last_failure.unwrap_or(MeasurementFailure::NoServers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogLevel;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn server(id: &str, distance_km: f64) -> ServerInfo {
        ServerInfo {
            id: id.to_string(),
            name: format!("City {}", id),
            sponsor: "Sponsor".to_string(),
            country: "Country".to_string(),
            host: format!("speedtest{}.example.net:8080", id),
            url: format!("http://speedtest{}.example.net:8080/speedtest/upload.php", id),
            distance_km,
        }
    }

    /// Scripted backend recording which steps ran
    struct FakeBackend {
        servers: MeasureResult<Vec<ServerInfo>>,
        latencies: HashMap<String, MeasureResult<Duration>>,
        download: MeasureResult<TransferStats>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeBackend {
        fn new(servers: Vec<ServerInfo>) -> Self {
            let latencies = servers.iter()
                .map(|s| (s.id.clone(), Ok(Duration::from_millis(50))))
                .collect();
            Self {
                servers: Ok(servers),
                latencies,
                download: Ok(TransferStats { bytes: 2_000_000, elapsed: Duration::from_secs(2) }),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SpeedTestBackend for FakeBackend {
        async fn servers(&self) -> MeasureResult<Vec<ServerInfo>> {
            self.record("servers".to_string());
            self.servers.clone()
        }

        async fn latency(&self, server: &ServerInfo) -> MeasureResult<Duration> {
            self.record(format!("latency:{}", server.id));
            self.latencies.get(&server.id).cloned().unwrap_or(Ok(Duration::from_millis(100)))
        }

        async fn download(&self, server: &ServerInfo) -> MeasureResult<TransferStats> {
            self.record(format!("download:{}", server.id));
            self.download.clone()
        }

        async fn upload(&self, server: &ServerInfo) -> MeasureResult<TransferStats> {
            self.record(format!("upload:{}", server.id));
            Ok(TransferStats { bytes: 500_000, elapsed: Duration::from_secs(1) })
        }

        async fn share(&self, request: &ShareRequest<'_>) -> MeasureResult<String> {
            self.record(format!("share:{}", request.server.id));
            Ok(format!("http://www.speedtest.net/result/{}.png", request.server.id))
        }
    }

    #[tokio::test]
    async fn test_full_run_picks_lowest_latency_server() {
        let mut backend = FakeBackend::new(vec![server("1", 10.0), server("2", 20.0), server("3", 30.0)]);
        backend.latencies.insert("2".to_string(), Ok(Duration::from_millis(12)));

        let report = run_speed_test(&backend, &SpeedTestPlan::default(), &Logger::disabled()).await.unwrap();

        assert_eq!(report.server.id, "2");
        assert_eq!(report.raw.download_bps, 1_000_000.0);
        assert_eq!(report.raw.upload_bps, 500_000.0);
        assert!((report.raw.latency_ms - 12.0).abs() < 1e-9);
        assert_eq!(report.raw.share_token, "http://www.speedtest.net/result/2.png");

        let calls = backend.calls();
        assert_eq!(calls.iter().filter(|c| c.starts_with("latency:")).count(), 9);
        assert!(calls.ends_with(&["download:2".to_string(), "upload:2".to_string(), "share:2".to_string()]));
    }

    #[tokio::test]
    async fn test_server_id_restriction() {
        let backend = FakeBackend::new(vec![server("1", 10.0), server("7", 90.0)]);
        let plan = SpeedTestPlan { server_ids: vec![7], ..SpeedTestPlan::default() };

        let report = run_speed_test(&backend, &plan, &Logger::disabled()).await.unwrap();
        assert_eq!(report.server.id, "7");
        assert!(!backend.calls().contains(&"latency:1".to_string()));
    }

    #[tokio::test]
    async fn test_no_matching_servers() {
        let backend = FakeBackend::new(vec![server("1", 10.0)]);
        let plan = SpeedTestPlan { server_ids: vec![99], ..SpeedTestPlan::default() };

        let err = run_speed_test(&backend, &plan, &Logger::disabled()).await.unwrap_err();
        assert_eq!(err, MeasurementFailure::NoServers);
        assert_eq!(backend.calls(), vec!["servers".to_string()]);
    }

    #[tokio::test]
    async fn test_candidates_limited_to_closest() {
        let servers = (1..=8).map(|i| server(&i.to_string(), 100.0 - i as f64)).collect();
        let backend = FakeBackend::new(servers);
        let plan = SpeedTestPlan { candidate_servers: 2, latency_probes: 1, ..SpeedTestPlan::default() };

        run_speed_test(&backend, &plan, &Logger::disabled()).await.unwrap();

        let probed: Vec<String> = backend.calls().into_iter().filter(|c| c.starts_with("latency:")).collect();
        assert_eq!(probed, vec!["latency:8".to_string(), "latency:7".to_string()]);
    }

    #[tokio::test]
    async fn test_skipped_phases() {
        let backend = FakeBackend::new(vec![server("1", 10.0)]);
        let plan = SpeedTestPlan { download: false, upload: false, share: false, ..SpeedTestPlan::default() };

        let report = run_speed_test(&backend, &plan, &Logger::disabled()).await.unwrap();

        assert_eq!(report.raw.download_bps, 0.0);
        assert_eq!(report.raw.upload_bps, 0.0);
        assert_eq!(report.raw.share_token, SHARE_NOT_REQUESTED);
        assert!(backend.calls().iter().all(|c| !c.starts_with("download") && !c.starts_with("upload")));
    }

    #[tokio::test]
    async fn test_failed_latency_probe_drops_candidate() {
        let mut backend = FakeBackend::new(vec![server("1", 10.0), server("2", 20.0)]);
        backend.latencies.insert("1".to_string(), Err(MeasurementFailure::Timeout("latency probe".to_string())));
        let (logger, capture) = Logger::captured("TEST", LogLevel::Debug);

        let report = run_speed_test(&backend, &SpeedTestPlan::default(), &logger).await.unwrap();

        assert_eq!(report.server.id, "2");
        assert_eq!(capture.at_level(LogLevel::Warn).len(), 1);
    }

    #[tokio::test]
    async fn test_all_latency_probes_fail() {
        let mut backend = FakeBackend::new(vec![server("1", 10.0)]);
        backend.latencies.insert("1".to_string(), Err(MeasurementFailure::Network("refused".to_string())));

        let err = run_speed_test(&backend, &SpeedTestPlan::default(), &Logger::disabled()).await.unwrap_err();
        assert_eq!(err, MeasurementFailure::Network("refused".to_string()));
    }

    #[tokio::test]
    async fn test_download_failure_aborts_before_upload() {
        let mut backend = FakeBackend::new(vec![server("1", 10.0)]);
        backend.download = Err(MeasurementFailure::Timeout("download".to_string()));

        let err = run_speed_test(&backend, &SpeedTestPlan::default(), &Logger::disabled()).await.unwrap_err();

        assert!(err.is_transient());
        assert!(!backend.calls().iter().any(|c| c.starts_with("upload") || c.starts_with("share")));
    }

    #[test]
    fn test_transfer_rate() {
        let stats = TransferStats { bytes: 3_000, elapsed: Duration::from_millis(1500) };
        assert_eq!(stats.bytes_per_sec(), 2_000.0);
        assert_eq!(TransferStats::default().bytes_per_sec(), 0.0);
    }
}
