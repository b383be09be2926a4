//! Download transport used by the provisioner.

use std::time::Duration;

/// Errors produced while fetching a dependency archive.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The server answered with a non-2xx status.
    #[error("GET {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The request could not be completed.
    #[error("GET {url} failed: {message}")]
    Transport { url: String, message: String },
}

/// Fetches the raw bytes behind a URL.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Blocking HTTP(S) fetcher backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .user_agent(concat!("forgepack/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {e}");
                reqwest::blocking::Client::new()
            });
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        tracing::info!("Downloading {url}");
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self.client.get(url).send().map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().map_err(transport)?;
        tracing::debug!("Downloaded {} bytes from {url}", bytes.len());
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_display() {
        let err = FetchError::Status {
            url: "https://example.com/ffmpeg.zip".into(),
            status: 404,
        };
        assert_eq!(
            err.to_string(),
            "GET https://example.com/ffmpeg.zip returned HTTP 404"
        );
    }

    #[test]
    fn unreachable_host_is_transport_error() {
        let fetcher = HttpFetcher::new();
        let err = fetcher.fetch("http://127.0.0.1:1/never").unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
    }
}
