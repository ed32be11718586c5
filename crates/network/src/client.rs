// crates/network/src/client.rs
//! HTTP client wrapper with resilience

use crate::error::{NetworkError, NetworkResult};
use log::debug;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::{Client as ReqwestClient, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use syncwatch_resilience::{with_retry, RetryPolicy};

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server root, e.g. `http://127.0.0.1:8787`
    pub base_url: String,
    /// Request timeout (not applied to event streams)
    pub timeout: Duration,
    /// Connect timeout, applied to every request including streams
    pub connect_timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Maximum redirects to follow
    pub max_redirects: usize,
    /// Retry policy for idempotent reads
    pub retry_policy: Option<RetryPolicy>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8787".to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("SyncWatch/{}", env!("CARGO_PKG_VERSION")),
            max_redirects: 10,
            retry_policy: Some(RetryPolicy::new(3).with_initial_delay(Duration::from_millis(250))),
        }
    }
}

/// HTTP client bound to one server
#[derive(Clone)]
pub struct Client {
    inner: ReqwestClient,
    streaming: ReqwestClient,
    base: String,
    config: ClientConfig,
}

impl Client {
    /// Creates a new client with default configuration
    pub fn new() -> NetworkResult<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Creates a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> NetworkResult<Self> {
        let base = config.base_url.trim_end_matches('/').to_string();
        let parsed = Url::parse(&base)
            .map_err(|e| NetworkError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(NetworkError::InvalidUrl(format!(
                "{}: scheme must be http or https",
                config.base_url
            )));
        }

        let inner = ReqwestClient::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(NetworkError::Http)?;

        // Event streams stay open indefinitely, so no overall timeout here
        let streaming = ReqwestClient::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(NetworkError::Http)?;

        Ok(Self {
            inner,
            streaming,
            base,
            config,
        })
    }

    /// Absolute URL for a server path
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base, path)
        } else {
            format!("{}/{}", self.base, path)
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// GET a JSON resource, retrying transport failures and 5xx answers
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> NetworkResult<T> {
        let url = self.url(path);
        let url = url.as_str();

        match &self.config.retry_policy {
            Some(policy) => {
                with_retry(
                    policy,
                    move || self.fetch_json(url),
                    NetworkError::is_retryable,
                )
                .await
            }
            None => self.fetch_json(url).await,
        }
    }

    /// POST a JSON body and decode the JSON answer
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> NetworkResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        debug!("POST {}", url);
        let response = self.inner.post(&url).json(body).send().await?;
        decode_json(check_status(response)?).await
    }

    /// POST without a body and decode the JSON answer
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> NetworkResult<T> {
        let url = self.url(path);
        debug!("POST {}", url);
        let response = self.inner.post(&url).send().await?;
        decode_json(check_status(response)?).await
    }

    /// DELETE a resource; any non-2xx answer is an error
    pub async fn delete(&self, path: &str) -> NetworkResult<()> {
        let url = self.url(path);
        debug!("DELETE {}", url);
        let response = self.inner.delete(&url).send().await?;
        check_status(response).map(|_| ())
    }

    /// Opens a server-sent event stream
    pub async fn open_event_stream(
        &self,
        path: &str,
        last_event_id: Option<&str>,
    ) -> NetworkResult<Response> {
        let url = self.url(path);
        let mut request = self
            .streaming
            .get(&url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(id) = last_event_id {
            request = request.header("Last-Event-ID", id);
        }
        debug!("Opening event stream {}", url);
        let response = request.send().await?;
        check_status(response)
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> NetworkResult<T> {
        debug!("GET {}", url);
        let response = self.inner.get(url).send().await?;
        decode_json(check_status(response)?).await
    }
}

fn check_status(response: Response) -> NetworkResult<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(NetworkError::from_status(status))
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> NetworkResult<T> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| NetworkError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_redirects, 10);
        assert!(config.retry_policy.is_some());
    }

    #[test]
    fn test_client_creation() {
        let client = Client::new();
        assert!(client.is_ok());
    }

    #[test]
    fn test_url_joining() {
        let client = Client::with_config(ClientConfig {
            base_url: "http://localhost:8787/".to_string(),
            ..ClientConfig::default()
        })
        .expect("valid config");

        assert_eq!(client.base_url(), "http://localhost:8787");
        assert_eq!(client.url("/api/status"), "http://localhost:8787/api/status");
        assert_eq!(client.url("api/status"), "http://localhost:8787/api/status");
    }

    #[test]
    fn test_invalid_base_url() {
        for base_url in ["not a url", "ftp://example.com"] {
            let result = Client::with_config(ClientConfig {
                base_url: base_url.to_string(),
                ..ClientConfig::default()
            });
            assert!(matches!(result, Err(NetworkError::InvalidUrl(_))));
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let client = Client::with_config(ClientConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            retry_policy: None,
            connect_timeout: Duration::from_millis(500),
            ..ClientConfig::default()
        })
        .expect("valid config");

        let result: NetworkResult<serde_json::Value> = client.get_json("/api/status").await;
        let err = result.unwrap_err();
        assert_eq!(err.kind(), syncwatch_core::FailureKind::Transport);
    }
}
