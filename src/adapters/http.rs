use crate::utils::error::{EtlError, Result};
use futures_util::StreamExt;
use reqwest::Client;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

const JSON_TIMEOUT: Duration = Duration::from_secs(30);
// Downloads are bounded by inactivity, not total time: catalog dumps run to
// hundreds of megabytes.
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);
const IMAGE_TIMEOUT: Duration = Duration::from_secs(60);

/// Why a JSON request produced no document. Never fatal to a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestFailure {
    Http(String),
    Timeout,
    JsonDecode(String),
}

impl fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestFailure::Http(_) => write!(f, "HTTPError"),
            RequestFailure::Timeout => write!(f, "Timeout"),
            RequestFailure::JsonDecode(_) => write!(f, "JSONDecodeError"),
        }
    }
}

impl RequestFailure {
    pub fn detail(&self) -> &str {
        match self {
            RequestFailure::Http(detail) | RequestFailure::JsonDecode(detail) => detail,
            RequestFailure::Timeout => "request timed out",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The file already existed and was left alone.
    Skipped,
    Downloaded { bytes: u64 },
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(IDLE_TIMEOUT)
            .read_timeout(IDLE_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });
        Self { client }
    }

    pub async fn json_request(&self, url: &str) -> std::result::Result<serde_json::Value, RequestFailure> {
        tracing::debug!("Making API request to: {}", url);
        let response = self
            .client
            .get(url)
            .timeout(JSON_TIMEOUT)
            .send()
            .await
            .map_err(classify)?;

        tracing::debug!("API response status: {}", response.status());
        let response = response.error_for_status().map_err(classify)?;

        let body = response.bytes().await.map_err(classify)?;
        serde_json::from_slice(&body).map_err(|e| RequestFailure::JsonDecode(e.to_string()))
    }

    /// Streams `url` into `path`. The body goes to a `.part` file first so an
    /// interrupted transfer never looks like a finished download.
    pub async fn download(&self, url: &str, path: &Path, overwrite: bool) -> Result<DownloadOutcome> {
        if path.is_file() && !overwrite {
            tracing::debug!("{} already exists.", path.display());
            return Ok(DownloadOutcome::Skipped);
        }
        tracing::debug!("Downloading file from {}...", url);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let response = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?;

        let part_path = part_path(path);
        let mut file = tokio::fs::File::create(&part_path).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        let copied: Result<()> = async {
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok(())
        }
        .await;

        if let Err(e) = copied {
            drop(file);
            let _ = tokio::fs::remove_file(&part_path).await;
            return Err(e);
        }

        drop(file);
        tokio::fs::rename(&part_path, path).await?;
        tracing::debug!("Downloaded {} ({} bytes)", url, written);
        Ok(DownloadOutcome::Downloaded { bytes: written })
    }

    /// Fetches a whole response body into memory, for images that are
    /// decoded and re-encoded rather than saved as-is.
    pub async fn download_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .timeout(IMAGE_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(EtlError::processing(format!("Empty response body from {}", url)));
        }
        Ok(body.to_vec())
    }
}

fn classify(error: reqwest::Error) -> RequestFailure {
    if error.is_timeout() {
        RequestFailure::Timeout
    } else if error.is_decode() {
        RequestFailure::JsonDecode(error.to_string())
    } else {
        RequestFailure::Http(error.to_string())
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_json_request_success_and_failures() {
        let server = MockServer::start();
        let ok = server.mock(|when, then| {
            when.method(GET).path("/item").query_param("fo", "json");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({"page": []}));
        });
        let broken = server.mock(|when, then| {
            when.method(GET).path("/broken");
            then.status(200).body("<html>not json</html>");
        });
        let missing = server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404);
        });

        let client = HttpClient::new();
        let doc = client.json_request(&server.url("/item?fo=json")).await.unwrap();
        assert!(doc.get("page").is_some());

        let err = client.json_request(&server.url("/broken")).await.unwrap_err();
        assert_eq!(err.to_string(), "JSONDecodeError");

        let err = client.json_request(&server.url("/missing")).await.unwrap_err();
        assert_eq!(err.to_string(), "HTTPError");

        ok.assert();
        broken.assert();
        missing.assert();
    }

    #[tokio::test]
    async fn test_download_skips_existing_and_rejects_errors() {
        let server = MockServer::start();
        let file_mock = server.mock(|when, then| {
            when.method(GET).path("/index.txt");
            then.status(200).body("https://example.com/a.txt\n");
        });
        let gone = server.mock(|when, then| {
            when.method(GET).path("/gone.txt");
            then.status(500).body("server error page");
        });

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache/index.txt");
        let client = HttpClient::new();

        let outcome = client.download(&server.url("/index.txt"), &path, false).await.unwrap();
        assert_eq!(outcome, DownloadOutcome::Downloaded { bytes: 26 });
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "https://example.com/a.txt\n");

        let outcome = client.download(&server.url("/index.txt"), &path, false).await.unwrap();
        assert_eq!(outcome, DownloadOutcome::Skipped);
        file_mock.assert_hits(1);

        let failed = dir.path().join("gone.txt");
        assert!(client.download(&server.url("/gone.txt"), &failed, false).await.is_err());
        assert!(!failed.exists());
        assert!(!part_path(&failed).exists());
        gone.assert();
    }
}
