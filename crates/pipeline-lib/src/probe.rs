//! HTTP probe for the application under test

use crate::error::PipelineResult;
use reqwest::Client;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// Default per-request timeout
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Response captured by a single probe
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status: u16,
    pub body: String,
    /// Parsed body, present only when the body is valid JSON
    pub json: Option<serde_json::Value>,
    pub elapsed: Duration,
}

impl ProbeResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// String value of a top-level JSON field
    pub fn json_str(&self, field: &str) -> Option<&str> {
        self.json.as_ref()?.get(field)?.as_str()
    }

    /// Whether the JSON body has a top-level field
    pub fn has_field(&self, field: &str) -> bool {
        self.json
            .as_ref()
            .and_then(|v| v.get(field))
            .is_some()
    }
}

/// HTTP GET prober bound to a base URL
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    base_url: Url,
}

impl HttpProbe {
    /// Create a probe with the default request timeout
    pub fn new(base_url: &str) -> PipelineResult<Self> {
        Self::with_timeout(base_url, DEFAULT_PROBE_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> PipelineResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve `path` under the base URL, keeping any path prefix the base has
    pub fn url_for(&self, path: &str) -> PipelineResult<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Issue a GET against `path`, relative to the base URL
    pub async fn get(&self, path: &str) -> PipelineResult<ProbeResponse> {
        let url = self.url_for(path)?;

        let start = Instant::now();
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        let elapsed = start.elapsed();

        let json = serde_json::from_str(&body).ok();

        Ok(ProbeResponse {
            status,
            body,
            json,
            elapsed,
        })
    }
}
