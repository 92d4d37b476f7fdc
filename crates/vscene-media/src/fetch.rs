//! HTTP source download with a hard size limit.
//!
//! The limit is enforced twice: a `HEAD` pre-check rejects sources that
//! announce an oversize `Content-Length`, and the streaming loop aborts as
//! soon as the byte counter passes the limit. Interrupted transfers resume
//! from the `.part` file with a `Range` request.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, RANGE};
use reqwest::{Client, Response, StatusCode};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};

/// Default maximum source size (500 MiB).
pub const DEFAULT_MAX_SOURCE_BYTES: u64 = 524_288_000;

/// Downloads a remote source to a local file.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Download `url` to `dest`, returning the number of bytes written.
    async fn fetch(&self, url: &str, dest: &Path) -> MediaResult<u64>;
}

/// reqwest based fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    max_bytes: u64,
    max_attempts: u32,
    base_delay: Duration,
    read_timeout: Duration,
}

impl HttpFetcher {
    /// Create a fetcher enforcing `max_bytes`.
    pub fn new(max_bytes: u64) -> MediaResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("vscene/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                MediaError::download_failed(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            max_bytes,
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            read_timeout: Duration::from_secs(300),
        })
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, max_attempts: u32, base_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.base_delay = base_delay;
        self
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Reject sources that announce an oversize body or a text payload.
    /// Servers that refuse `HEAD` are checked during the transfer instead.
    async fn preflight(&self, url: &str) -> MediaResult<()> {
        let response = match self.client.head(url).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                debug!("HEAD {} returned {}, skipping preflight", url, r.status());
                return Ok(());
            }
            Err(e) => {
                debug!("HEAD {} failed, skipping preflight: {}", url, e);
                return Ok(());
            }
        };

        check_content_type(&response)?;
        if let Some(len) = content_length(&response) {
            if len > self.max_bytes {
                return Err(MediaError::SourceTooLarge {
                    limit: self.max_bytes,
                });
            }
        }
        Ok(())
    }

    /// One transfer attempt into `part`, resuming when it already holds data.
    async fn attempt(&self, url: &str, part: &Path) -> MediaResult<u64> {
        let existing = tokio::fs::metadata(part)
            .await
            .map(|m| m.len())
            .unwrap_or(0);

        let mut request = self.client.get(url);
        if existing > 0 {
            request = request.header(RANGE, format!("bytes={}-", existing));
        }

        let response = request
            .send()
            .await
            .map_err(|e| MediaError::download_transient(format!("Request failed: {}", e)))?;

        let status = response.status();
        let resume = match status {
            StatusCode::PARTIAL_CONTENT if existing > 0 => true,
            StatusCode::RANGE_NOT_SATISFIABLE if existing > 0 => return Ok(existing),
            s if s.is_success() => false,
            s if s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error() => {
                return Err(MediaError::download_transient(format!("Server returned {}", s)));
            }
            s => return Err(MediaError::download_failed(format!("Server returned {}", s))),
        };

        check_content_type(&response)?;

        let offset = if resume { existing } else { 0 };
        if let Some(len) = content_length(&response) {
            if offset + len > self.max_bytes {
                return Err(MediaError::SourceTooLarge {
                    limit: self.max_bytes,
                });
            }
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(resume)
            .truncate(!resume)
            .open(part)
            .await?;

        let mut written = offset;
        let mut stream = response.bytes_stream();
        loop {
            let next = tokio::time::timeout(self.read_timeout, stream.next())
                .await
                .map_err(|_| MediaError::download_transient("Timed out waiting for data"))?;
            let Some(chunk) = next else { break };
            let chunk = chunk.map_err(|e| {
                MediaError::download_transient(format!("Stream interrupted: {}", e))
            })?;

            written += chunk.len() as u64;
            if written > self.max_bytes {
                return Err(MediaError::SourceTooLarge {
                    limit: self.max_bytes,
                });
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok(written)
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> MediaResult<u64> {
        let started = Instant::now();
        let part = part_path(dest);

        self.preflight(url).await?;

        let mut attempt = 1u32;
        let bytes = loop {
            match self.attempt(url, &part).await {
                Ok(bytes) => break bytes,
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = self.base_delay.saturating_mul(2u32.saturating_pow(attempt - 1));
                    warn!(
                        "Download attempt {}/{} for {} failed, retrying in {:?}: {}",
                        attempt, self.max_attempts, url, delay, e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    let _ = tokio::fs::remove_file(&part).await;
                    return Err(e);
                }
            }
        };

        if bytes == 0 {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(MediaError::download_failed("Downloaded file is empty"));
        }

        tokio::fs::rename(&part, dest).await?;

        let elapsed = started.elapsed().as_secs_f64();
        metrics::histogram!("vscene_download_duration_seconds").record(elapsed);
        info!(
            "Downloaded {} ({} bytes) in {:.1}s",
            url, bytes, elapsed
        );
        Ok(bytes)
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Announced body length. Read from the header because the body size hint
/// is zero for `HEAD` responses.
fn content_length(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|len| *len > 0)
}

fn check_content_type(response: &Response) -> MediaResult<()> {
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("text/") {
        return Err(MediaError::UnsupportedContent(content_type));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(max_bytes: u64) -> HttpFetcher {
        HttpFetcher::new(max_bytes)
            .unwrap()
            .with_retry(3, Duration::from_millis(1))
    }

    fn video(bytes: usize) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "video/mp4")
            .set_body_bytes(vec![7u8; bytes])
    }

    #[tokio::test]
    async fn test_downloads_to_destination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/clip.mp4"))
            .respond_with(video(4096))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("source.mp4");
        let bytes = fetcher(1 << 20)
            .fetch(&format!("{}/clip.mp4", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(bytes, 4096);
        assert_eq!(std::fs::metadata(&dest).unwrap().len(), 4096);
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_head_rejects_oversize_source_before_download() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/big.mp4"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "video/mp4")
                    .insert_header("content-length", "999999999"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/big.mp4"))
            .respond_with(video(16))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = fetcher(1024)
            .fetch(&format!("{}/big.mp4", server.uri()), &dir.path().join("s.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::SourceTooLarge { limit: 1024 }));
    }

    #[tokio::test]
    async fn test_stream_limit_when_head_is_unsupported() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/big.mp4"))
            .respond_with(video(4096))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("s.mp4");
        let err = fetcher(1024)
            .fetch(&format!("{}/big.mp4", server.uri()), &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::SourceTooLarge { .. }));
        assert!(!dest.exists());
        assert!(!part_path(&dest).exists());
    }

    async fn seed_part(dest: &Path, bytes: &[u8]) {
        tokio::fs::write(part_path(dest), bytes).await.unwrap();
    }

    #[tokio::test]
    async fn test_resumes_partial_file_with_range() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/clip.mp4"))
            .and(header("range", "bytes=100-"))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header("content-type", "video/mp4")
                    .set_body_bytes(vec![2u8; 50]),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("source.mp4");
        seed_part(&dest, &[1u8; 100]).await;

        let bytes = fetcher(1 << 20)
            .fetch(&format!("{}/clip.mp4", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(bytes, 150);
        let body = std::fs::read(&dest).unwrap();
        assert_eq!(&body[..100], &[1u8; 100][..]);
        assert_eq!(&body[100..], &[2u8; 50][..]);
    }

    #[tokio::test]
    async fn test_restarts_when_range_is_ignored() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/clip.mp4"))
            .respond_with(video(64))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("source.mp4");
        seed_part(&dest, &[9u8; 100]).await;

        let bytes = fetcher(1 << 20)
            .fetch(&format!("{}/clip.mp4", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(bytes, 64);
        assert_eq!(std::fs::read(&dest).unwrap(), vec![7u8; 64]);
    }

    #[tokio::test]
    async fn test_unsatisfiable_range_keeps_complete_part() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("range", "bytes=80-"))
            .respond_with(ResponseTemplate::new(416))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("source.mp4");
        seed_part(&dest, &[5u8; 80]).await;

        let bytes = fetcher(1 << 20)
            .fetch(&format!("{}/clip.mp4", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(bytes, 80);
        assert_eq!(std::fs::metadata(&dest).unwrap().len(), 80);
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_rejects_html_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_string("<html></html>"),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = fetcher(1 << 20)
            .fetch(&format!("{}/watch", server.uri()), &dir.path().join("s.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedContent(_)));
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(video(128))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let bytes = fetcher(1 << 20)
            .fetch(&format!("{}/flaky.mp4", server.uri()), &dir.path().join("s.mp4"))
            .await
            .unwrap();
        assert_eq!(bytes, 128);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = fetcher(1 << 20)
            .fetch(&format!("{}/missing.mp4", server.uri()), &dir.path().join("s.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::DownloadFailed { transient: false, .. }));
    }
}
