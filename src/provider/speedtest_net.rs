//! speedtest.net HTTP backend
//!
//! Speaks the legacy HTTP test protocol: a JSON server list, `latency.txt`
//! probes, `random{N}x{N}.jpg` downloads, `upload.php` posts and the
//! `api.php` share endpoint.

use super::{MeasureResult, MeasurementFailure, ShareRequest, SpeedTestBackend, TransferStats};
use crate::{
    error::{AppError, Result},
    models::{config::ProviderSettings, ServerInfo},
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use md5::{Digest, Md5};
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::{Duration, Instant};

/// Key mixed into the share request hash
const SHARE_HASH_KEY: &str = "297aae72";

const SHARE_REFERER: &str = "http://c.speedtest.net/flash/speedtest.swf";

const RESULT_IMAGE_BASE: &str = "http://www.speedtest.net/result";

const PAYLOAD_CHARS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Server entry as returned by the server list endpoint
#[derive(Debug, Deserialize)]
struct ServerEntry {
    url: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    sponsor: String,
    id: serde_json::Value,
    #[serde(default)]
    host: String,
    #[serde(default)]
    distance: f64,
}

impl ServerEntry {
    fn into_server(self) -> MeasureResult<ServerInfo> {
        let id = match self.id {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            other => return Err(MeasurementFailure::InvalidResponse(format!("unexpected server id {}", other))),
        };

        Ok(ServerInfo {
            id,
            name: self.name,
            sponsor: self.sponsor,
            country: self.country,
            host: self.host,
            url: self.url,
            distance_km: self.distance,
        })
    }
}

/// reqwest-based speedtest.net client
pub struct SpeedtestNetClient {
    client: Client,
    settings: ProviderSettings,
}

impl SpeedtestNetClient {
    pub fn new(settings: &ProviderSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .user_agent(format!("speedtest-monitor/{}", crate::VERSION))
            .build()
            .map_err(|e| AppError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            settings: settings.clone(),
        })
    }

    /// Resolve a file living next to the server's upload endpoint
    fn server_file(server: &ServerInfo, file: &str) -> MeasureResult<Url> {
        let base = Url::parse(&server.url)
            .map_err(|e| MeasurementFailure::InvalidResponse(format!("bad server url '{}': {}", server.url, e)))?;
        base.join(file)
            .map_err(|e| MeasurementFailure::InvalidResponse(format!("bad server url '{}': {}", server.url, e)))
    }

    /// Fetch `url` and count the body bytes without keeping them
    async fn fetch_counting(&self, url: Url) -> MeasureResult<u64> {
        let response = self.client.get(url).send().await
            .map_err(|e| request_failure("download", e))?;
        let response = check_status(response, "download")?;

        let mut body = response.bytes_stream();
        let mut bytes = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| request_failure("download", e))?;
            bytes += chunk.len() as u64;
        }
        Ok(bytes)
    }

    async fn post_payload(&self, url: Url, size: usize) -> MeasureResult<u64> {
        let payload = upload_payload(size);
        let sent = payload.len() as u64;

        let response = self.client.post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(payload)
            .send()
            .await
            .map_err(|e| request_failure("upload", e))?;
        check_status(response, "upload")?;
        Ok(sent)
    }

    fn parallelism(&self) -> usize {
        self.settings.parallel_requests.max(1)
    }

    fn repeat<T: Clone>(&self, sizes: &[T]) -> Vec<T> {
        sizes.iter()
            .flat_map(|s| std::iter::repeat(s.clone()).take(self.settings.requests_per_size as usize))
            .collect()
    }
}

#[async_trait]
impl SpeedTestBackend for SpeedtestNetClient {
    async fn servers(&self) -> MeasureResult<Vec<ServerInfo>> {
        let response = self.client.get(&self.settings.servers_url).send().await
            .map_err(|e| request_failure("server list", e))?;
        let response = check_status(response, "server list")?;

        let entries: Vec<ServerEntry> = response.json().await
            .map_err(|e| MeasurementFailure::InvalidResponse(format!("server list: {}", e)))?;

        entries.into_iter().map(ServerEntry::into_server).collect()
    }

    async fn latency(&self, server: &ServerInfo) -> MeasureResult<Duration> {
        let mut url = Self::server_file(server, "latency.txt")?;
        url.query_pairs_mut()
            .append_pair("x", &chrono::Utc::now().timestamp_millis().to_string());

        let start = Instant::now();
        let response = self.client.get(url).send().await
            .map_err(|e| request_failure("latency probe", e))?;
        let response = check_status(response, "latency probe")?;
        let text = response.text().await
            .map_err(|e| request_failure("latency probe", e))?;
        let elapsed = start.elapsed();

        if text.trim() != "test=test" {
            return Err(MeasurementFailure::InvalidResponse(format!(
                "latency probe returned '{}'", text.trim()
            )));
        }
        Ok(elapsed)
    }

    async fn download(&self, server: &ServerInfo) -> MeasureResult<TransferStats> {
        let urls = self.repeat(&self.settings.download_sizes)
            .into_iter()
            .map(|size| Self::server_file(server, &format!("random{}x{}.jpg", size, size)))
            .collect::<MeasureResult<Vec<Url>>>()?;

        let start = Instant::now();
        let bytes = stream::iter(urls)
            .map(|url| self.fetch_counting(url))
            .buffer_unordered(self.parallelism())
            .try_fold(0u64, |total, n| async move { Ok(total + n) })
            .await?;

        Ok(TransferStats { bytes, elapsed: start.elapsed() })
    }

    async fn upload(&self, server: &ServerInfo) -> MeasureResult<TransferStats> {
        let url = Url::parse(&server.url)
            .map_err(|e| MeasurementFailure::InvalidResponse(format!("bad server url '{}': {}", server.url, e)))?;
        let sizes = self.repeat(&self.settings.upload_sizes);

        let start = Instant::now();
        let bytes = stream::iter(sizes)
            .map(|size| self.post_payload(url.clone(), size))
            .buffer_unordered(self.parallelism())
            .try_fold(0u64, |total, n| async move { Ok(total + n) })
            .await?;

        Ok(TransferStats { bytes, elapsed: start.elapsed() })
    }

    async fn share(&self, request: &ShareRequest<'_>) -> MeasureResult<String> {
        let form = share_form(request);

        let response = self.client.post(&self.settings.share_url)
            .header(reqwest::header::REFERER, SHARE_REFERER)
            .form(&form)
            .send()
            .await
            .map_err(|e| request_failure("share", e))?;
        let response = check_status(response, "share")?;
        let text = response.text().await
            .map_err(|e| request_failure("share", e))?;

        let result_id = parse_result_id(&text)
            .ok_or_else(|| MeasurementFailure::InvalidResponse(format!("share response without result id: '{}'", text.trim())))?;

        Ok(format!("{}/{}.png", RESULT_IMAGE_BASE, result_id))
    }
}

fn request_failure(step: &str, error: reqwest::Error) -> MeasurementFailure {
    if error.is_timeout() {
        MeasurementFailure::Timeout(step.to_string())
    } else if error.is_decode() || error.is_body() {
        MeasurementFailure::InvalidResponse(format!("{}: {}", step, error))
    } else {
        MeasurementFailure::Network(format!("{}: {}", step, error))
    }
}

fn check_status(response: reqwest::Response, step: &str) -> MeasureResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(MeasurementFailure::InvalidResponse(format!("{} returned HTTP {}", step, status.as_u16())))
    }
}

/// Form-encoded upload body of exactly `size` bytes (at least the field name)
pub(crate) fn upload_payload(size: usize) -> Vec<u8> {
    let prefix = b"content1=";
    let filler = size.saturating_sub(prefix.len());

    let mut payload = Vec::with_capacity(prefix.len() + filler);
    payload.extend_from_slice(prefix);
    payload.extend(PAYLOAD_CHARS.iter().cycle().take(filler));
    payload
}

/// Kilobits per second, as the share API expects
fn kbps(bytes_per_sec: f64) -> u64 {
    (bytes_per_sec * 8.0 / 1000.0).round() as u64
}

pub(crate) fn share_hash(ping: u64, upload_kbps: u64, download_kbps: u64) -> String {
    let digest = Md5::digest(format!("{}-{}-{}-{}", ping, upload_kbps, download_kbps, SHARE_HASH_KEY).as_bytes());
    format!("{:x}", digest)
}

fn share_form(request: &ShareRequest<'_>) -> Vec<(&'static str, String)> {
    let ping = request.latency_ms.round() as u64;
    let download = kbps(request.download.bytes_per_sec());
    let upload = kbps(request.upload.bytes_per_sec());

    vec![
        ("recommendedserverid", request.server.id.clone()),
        ("ping", ping.to_string()),
        ("screenresolution", String::new()),
        ("promo", String::new()),
        ("download", download.to_string()),
        ("screendpi", String::new()),
        ("upload", upload.to_string()),
        ("testmethod", "http".to_string()),
        ("hash", share_hash(ping, upload, download)),
        ("touchscreen", "none".to_string()),
        ("startmode", "pingselect".to_string()),
        ("accuracy", "1".to_string()),
        ("bytesreceived", request.download.bytes.to_string()),
        ("bytessent", request.upload.bytes.to_string()),
        ("serverid", request.server.id.clone()),
    ]
}

fn parse_result_id(body: &str) -> Option<String> {
    url::form_urlencoded::parse(body.trim().as_bytes())
        .find(|(key, _)| key == "resultid")
        .map(|(_, value)| value.into_owned())
        .filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_payload_size() {
        let payload = upload_payload(100);
        assert_eq!(payload.len(), 100);
        assert!(payload.starts_with(b"content1=0123456789ABC"));

        assert_eq!(upload_payload(0), b"content1=".to_vec());
    }

    #[test]
    fn test_share_hash() {
        let hash = share_hash(15, 10000, 80000);
        assert_eq!(hash, "192740d49626f88005d3a68b10c92083");
        assert_ne!(hash, share_hash(16, 10000, 80000));
    }

    #[test]
    fn test_kbps() {
        assert_eq!(kbps(1_000_000.0), 8_000);
        assert_eq!(kbps(0.0), 0);
    }

    #[test]
    fn test_parse_result_id() {
        assert_eq!(parse_result_id("resultid=12345&date=1/1/2026&time=1:00 AM&rating=0"), Some("12345".to_string()));
        assert_eq!(parse_result_id("resultid=&date=x"), None);
        assert_eq!(parse_result_id("<html>error</html>"), None);
    }

    #[test]
    fn test_server_entry_ids() {
        let entries: Vec<ServerEntry> = serde_json::from_str(r#"[
            {"url": "http://a/speedtest/upload.php", "id": "42", "distance": 3.5},
            {"url": "http://b/speedtest/upload.php", "id": 7}
        ]"#).unwrap();
        let servers: Vec<ServerInfo> = entries.into_iter().map(|e| e.into_server().unwrap()).collect();
        assert_eq!(servers[0].id, "42");
        assert_eq!(servers[0].distance_km, 3.5);
        assert_eq!(servers[1].id, "7");
    }

    #[test]
    fn test_server_file_resolution() {
        let server = ServerInfo {
            id: "1".to_string(),
            name: String::new(),
            sponsor: String::new(),
            country: String::new(),
            host: String::new(),
            url: "http://host:8080/speedtest/upload.php".to_string(),
            distance_km: 0.0,
        };
        let url = SpeedtestNetClient::server_file(&server, "random350x350.jpg").unwrap();
        assert_eq!(url.as_str(), "http://host:8080/speedtest/random350x350.jpg");
    }
}
