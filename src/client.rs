//! Typed HTTP client for the ingestion backend.
//!
//! [`DashboardApi`] is the seam between the dashboard and the network: views
//! and the [`App`](crate::app::App) only ever talk to the trait, so tests can
//! substitute an in-memory backend. [`ApiClient`] is the reqwest-backed
//! implementation.
//!
//! # Endpoints
//!
//! All paths are relative to the configured base URL (`/api/v1` in the
//! default deployment), except health which lives at the server root.
//!
//! | Method | Path | Response |
//! |--------|------|----------|
//! | `GET`  | `/sources` | `Source[]` |
//! | `POST` | `/sources` | `Source` |
//! | `POST` | `/sources/{id}/scan` | `Job` |
//! | `GET`  | `/jobs` | `Job[]` |
//! | `GET`  | `/jobs/{id}` | `Job` |
//! | `GET`  | `/documents?source_id=` | `Document[]` |
//! | `GET`  | `/documents/{id}` | `Document` |
//! | `GET`  | `/documents/{id}/chunks` | `Chunk[]` |
//! | `POST` | `/search` | `SearchResult[]` |
//! | `GET`  | `/health` (root) | `Health` |
//!
//! Every failure becomes a [`RequestFailed`]. No request is retried.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::time::Instant;
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::RequestFailed;
use crate::models::{
    Chunk, CreateSource, Document, Health, Job, SearchRequest, SearchResult, Source,
};

pub type ApiResult<T> = std::result::Result<T, RequestFailed>;

/// Operations the dashboard performs against the backend.
#[async_trait]
pub trait DashboardApi: Send + Sync {
    async fn fetch_sources(&self) -> ApiResult<Vec<Source>>;

    /// `name` and `path` are required; the caller enforces that before calling.
    async fn create_source(&self, req: &CreateSource) -> ApiResult<Source>;

    /// Starts backend-side scanning and returns the new job (pending or running).
    async fn scan_source(&self, source_id: &str) -> ApiResult<Job>;

    /// Ordering is whatever the backend returns.
    async fn fetch_jobs(&self) -> ApiResult<Vec<Job>>;

    async fn fetch_job(&self, job_id: &str) -> ApiResult<Job>;

    async fn fetch_documents(&self, source_id: Option<&str>) -> ApiResult<Vec<Document>>;

    async fn fetch_document(&self, doc_id: &str) -> ApiResult<Document>;

    async fn fetch_document_chunks(&self, doc_id: &str) -> ApiResult<Vec<Chunk>>;

    /// Ranked results, possibly empty.
    async fn search(&self, query: &str, top_k: u32) -> ApiResult<Vec<SearchResult>>;

    async fn health(&self) -> ApiResult<Health>;
}

/// reqwest implementation of [`DashboardApi`].
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid API base URL: {}", config.base_url))?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL with `segments` appended as percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        self.http.request(method, self.endpoint(segments))
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> ApiResult<T> {
        let req = req
            .build()
            .map_err(|e| RequestFailed::from_transport(&e))?;
        let method = req.method().clone();
        let url = req.url().clone();
        let started = Instant::now();
        debug!(%method, %url, "request");

        let resp = self
            .http
            .execute(req)
            .await
            .map_err(|e| RequestFailed::from_transport(&e))?;

        let status = resp.status();
        debug!(
            %method,
            %url,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "response"
        );

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RequestFailed::from_status(status.as_u16(), body));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| RequestFailed::from_transport(&e))?;
        serde_json::from_slice(&bytes).map_err(|e| RequestFailed::decode(status.as_u16(), e))
    }
}

#[async_trait]
impl DashboardApi for ApiClient {
    async fn fetch_sources(&self) -> ApiResult<Vec<Source>> {
        self.send(self.request(Method::GET, &["sources"])).await
    }

    async fn create_source(&self, req: &CreateSource) -> ApiResult<Source> {
        self.send(self.request(Method::POST, &["sources"]).json(req))
            .await
    }

    async fn scan_source(&self, source_id: &str) -> ApiResult<Job> {
        self.send(self.request(Method::POST, &["sources", source_id, "scan"]))
            .await
    }

    async fn fetch_jobs(&self) -> ApiResult<Vec<Job>> {
        self.send(self.request(Method::GET, &["jobs"])).await
    }

    async fn fetch_job(&self, job_id: &str) -> ApiResult<Job> {
        self.send(self.request(Method::GET, &["jobs", job_id])).await
    }

    async fn fetch_documents(&self, source_id: Option<&str>) -> ApiResult<Vec<Document>> {
        let mut req = self.request(Method::GET, &["documents"]);
        if let Some(id) = source_id {
            req = req.query(&[("source_id", id)]);
        }
        self.send(req).await
    }

    async fn fetch_document(&self, doc_id: &str) -> ApiResult<Document> {
        self.send(self.request(Method::GET, &["documents", doc_id]))
            .await
    }

    async fn fetch_document_chunks(&self, doc_id: &str) -> ApiResult<Vec<Chunk>> {
        self.send(self.request(Method::GET, &["documents", doc_id, "chunks"]))
            .await
    }

    async fn search(&self, query: &str, top_k: u32) -> ApiResult<Vec<SearchResult>> {
        let body = SearchRequest {
            query: query.to_string(),
            top_k,
        };
        self.send(self.request(Method::POST, &["search"]).json(&body))
            .await
    }

    async fn health(&self) -> ApiResult<Health> {
        let url = self
            .base_url
            .join("/health")
            .map_err(|e| RequestFailed::decode(0, e))?;
        self.send(self.http.get(url)).await
    }
}
