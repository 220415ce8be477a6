//! HTTP client for the document backend
//!
//! Endpoints:
//! - `GET  {base}/api/processed-documents/` - document snapshot
//! - `GET|PUT|DELETE {base}/api/documents/{id}` - single document

use super::{DocumentBody, DocumentListBody, DocumentStore};
use crate::config::BackendConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::models::{DocumentRecord, DocumentUpdate};
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoffBuilder};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Base delay for exponential backoff
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Document store backed by the processing backend's REST API
pub struct HttpDocumentStore {
    client: reqwest::Client,
    base_url: Option<Url>,
    timeout: Duration,
    max_retries: u32,
}

impl HttpDocumentStore {
    /// Create a new backend client.
    ///
    /// A missing base URL is not an error here; every call then fails with
    /// `BackendNotConfigured` so the gateway can still start and report it.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(|url| {
                Url::parse(url).map_err(|e| AppError::Configuration {
                    message: format!("Invalid backend base URL '{}': {}", url, e),
                })
            })
            .transpose()?;

        if base_url.as_ref().is_some_and(Url::cannot_be_a_base) {
            return Err(AppError::Configuration {
                message: "Backend base URL cannot carry a path".to_string(),
            });
        }

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url,
            timeout,
            max_retries: config.max_retries,
        })
    }

    /// Build `{base}/{segments...}`, percent-encoding each segment
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone().ok_or(AppError::BackendNotConfigured)?;
        {
            let mut path = url.path_segments_mut().map_err(|_| AppError::Configuration {
                message: "Backend base URL cannot carry a path".to_string(),
            })?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    fn document_url(&self, id: &str) -> Result<Url> {
        self.url(&["api", "documents", id])
    }

    /// Send a request, mapping transport failures
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        request.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::UpstreamTimeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                }
            } else {
                AppError::HttpClient(e)
            }
        })
    }

    /// Map non-success statuses; a 404 on a document route means the id is unknown
    async fn check(response: Response, document_id: Option<&str>) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::NOT_FOUND {
            if let Some(id) = document_id {
                return Err(AppError::DocumentNotFound { id: id.to_string() });
            }
        }

        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            format!("Status {}", status.as_u16())
        } else {
            body
        };
        Err(AppError::Upstream {
            status: status.as_u16(),
            message,
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status().as_u16();
        response.json::<T>().await.map_err(|e| AppError::Upstream {
            status,
            message: format!("Invalid response body: {}", e),
        })
    }

    /// Total time a retried call may take: one full timeout per attempt
    fn retry_budget(&self) -> Duration {
        self.timeout.saturating_mul(self.max_retries.saturating_add(1))
    }

    /// Retry transient failures of an idempotent call with exponential backoff
    async fn with_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(RETRY_BASE_DELAY)
            .with_max_elapsed_time(Some(self.retry_budget()))
            .build();
        let max_retries = self.max_retries;
        let mut attempt = 0u32;

        retry(policy, || {
            attempt += 1;
            let current = attempt;
            let fut = call();
            async move {
                fut.await.map_err(|e| {
                    if e.is_transient() && current <= max_retries {
                        warn!(
                            operation,
                            attempt = current,
                            max_retries,
                            error = %e,
                            "Backend request failed, retrying"
                        );
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        })
        .await
    }

    /// Run a call and record its outcome
    async fn observed<T>(&self, operation: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        let start = Instant::now();
        let result = fut.await;
        metrics::record_backend(start.elapsed().as_secs_f64(), operation, result.is_ok());
        result
    }

    async fn fetch_list(&self) -> Result<Vec<DocumentRecord>> {
        let url = self.url(&["api", "processed-documents", ""])?;
        let response = self.send(self.client.get(url)).await?;
        let response = Self::check(response, None).await?;
        Ok(Self::decode::<DocumentListBody>(response).await?.into_documents())
    }

    async fn fetch_one(&self, id: &str) -> Result<DocumentRecord> {
        let url = self.document_url(id)?;
        let response = self.send(self.client.get(url)).await?;
        let response = Self::check(response, Some(id)).await?;
        Ok(Self::decode::<DocumentBody>(response).await?.into_document())
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn list(&self) -> Result<Vec<DocumentRecord>> {
        let documents = self
            .observed("list", self.with_retry("list", || self.fetch_list()))
            .await?;
        debug!(count = documents.len(), "Fetched document snapshot");
        Ok(documents)
    }

    async fn get(&self, id: &str) -> Result<DocumentRecord> {
        self.observed("get", self.with_retry("get", || self.fetch_one(id)))
            .await
    }

    async fn update(&self, id: &str, update: &DocumentUpdate) -> Result<DocumentRecord> {
        self.observed("update", async {
            let url = self.document_url(id)?;
            let response = self.send(self.client.put(url).json(update)).await?;
            let response = Self::check(response, Some(id)).await?;
            Ok(Self::decode::<DocumentBody>(response).await?.into_document())
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.observed("delete", async {
            let url = self.document_url(id)?;
            let response = self.send(self.client.delete(url)).await?;
            Self::check(response, Some(id)).await?;
            Ok(())
        })
        .await
    }

    async fn ping(&self) -> Result<()> {
        // Any HTTP answer means the backend is reachable
        let url = self.url(&[])?;
        self.send(self.client.get(url)).await.map(|_| ())
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(base_url: Option<&str>) -> HttpDocumentStore {
        HttpDocumentStore::new(&BackendConfig {
            base_url: base_url.map(str::to_string),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_urls() {
        let store = store(Some("http://backend:8000/"));
        assert_eq!(
            store.url(&["api", "processed-documents", ""]).unwrap().as_str(),
            "http://backend:8000/api/processed-documents/"
        );
        assert_eq!(
            store.document_url("doc 1/2").unwrap().as_str(),
            "http://backend:8000/api/documents/doc%201%2F2"
        );
    }

    #[test]
    fn test_url_keeps_base_path() {
        let store = store(Some("https://example.com/backend"));
        assert_eq!(
            store.document_url("42").unwrap().as_str(),
            "https://example.com/backend/api/documents/42"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let result = HttpDocumentStore::new(&BackendConfig {
            base_url: Some("not a url".to_string()),
            ..Default::default()
        });
        assert!(matches!(result, Err(AppError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_unconfigured_backend() {
        let store = store(None);
        assert!(matches!(store.list().await, Err(AppError::BackendNotConfigured)));
        assert!(matches!(
            store.update("1", &DocumentUpdate::tag_msa("MSA-1")).await,
            Err(AppError::BackendNotConfigured)
        ));
        assert!(matches!(store.delete("1").await, Err(AppError::BackendNotConfigured)));
    }

    #[tokio::test]
    async fn test_retry_stops_on_permanent_error() {
        let store = store(Some("http://backend:8000"));
        let mut calls = 0;
        let result: Result<()> = store
            .with_retry("test", || {
                calls += 1;
                async {
                    Err(AppError::Upstream {
                        status: 400,
                        message: "bad".into(),
                    })
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_error() {
        let store = store(Some("http://backend:8000"));
        let mut calls = 0;
        let result = store
            .with_retry("test", || {
                calls += 1;
                let current = calls;
                async move {
                    if current < 3 {
                        Err(AppError::Upstream {
                            status: 503,
                            message: "busy".into(),
                        })
                    } else {
                        Ok(current)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_retry_budget_covers_every_attempt() {
        let store = HttpDocumentStore::new(&BackendConfig {
            base_url: Some("http://backend:8000".to_string()),
            timeout_secs: 30,
            max_retries: 3,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(store.retry_budget(), Duration::from_secs(120));
    }

    #[tokio::test]
    async fn test_timed_out_read_is_retried() {
        let store = HttpDocumentStore::new(&BackendConfig {
            base_url: Some("http://backend:8000".to_string()),
            timeout_secs: 1,
            max_retries: 2,
            ..Default::default()
        })
        .unwrap();
        let mut calls = 0;
        let result = store
            .with_retry("test", || {
                calls += 1;
                let current = calls;
                async move {
                    if current == 1 {
                        // The first attempt burns its whole timeout
                        tokio::time::sleep(Duration::from_millis(1100)).await;
                        Err(AppError::UpstreamTimeout { timeout_ms: 1000 })
                    } else {
                        Ok(current)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_retry_budget_is_bounded() {
        let store = HttpDocumentStore::new(&BackendConfig {
            base_url: Some("http://backend:8000".to_string()),
            max_retries: 1,
            ..Default::default()
        })
        .unwrap();
        let mut calls = 0;
        let result: Result<()> = store
            .with_retry("test", || {
                calls += 1;
                async { Err(AppError::UpstreamTimeout { timeout_ms: 10 }) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls, 2);
    }
}
