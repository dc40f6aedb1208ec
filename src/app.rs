//! Application shell: one API client, one query cache, and the mount and
//! mutation operations the views use.
//!
//! Reads go through the cache (`mount_*`), writes go straight to the API and
//! then invalidate the keys they affect:
//!
//! | Mutation | Invalidates |
//! |----------|-------------|
//! | [`App::create_source`] | `["sources"]` |
//! | [`App::scan_source`] | `["jobs"]` |
//!
//! Search is not cached; it lives in [`SearchView`] local state.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{QueryCache, QueryKey, QueryObserver};
use crate::client::{ApiClient, DashboardApi};
use crate::config::Config;
use crate::error::RequestFailed;
use crate::models::{Chunk, Document, Job, Source};
use crate::poll::PolledQuery;
use crate::views::{SearchView, SourceForm, Submission};

pub struct App {
    api: Arc<dyn DashboardApi>,
    cache: QueryCache,
    config: Config,
}

impl App {
    /// Builds the HTTP client from `config` and starts a fresh cache.
    pub fn start(config: Config) -> Result<Self> {
        let client = ApiClient::new(&config.api)?;
        info!(base_url = %client.base_url(), "dashboard started");
        Ok(Self::with_api(config, Arc::new(client)))
    }

    /// Same as [`App::start`] with a caller-supplied backend.
    pub fn with_api(config: Config, api: Arc<dyn DashboardApi>) -> Self {
        let cache = QueryCache::new(config.cache.stale_time());
        Self { api, cache, config }
    }

    pub fn api(&self) -> &Arc<dyn DashboardApi> {
        &self.api
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mount_sources(&self) -> QueryObserver<Vec<Source>> {
        let api = Arc::clone(&self.api);
        self.cache.observe(QueryKey::sources(), move || {
            let api = Arc::clone(&api);
            async move { api.fetch_sources().await }
        })
    }

    pub fn mount_documents(&self, source_id: Option<String>) -> QueryObserver<Vec<Document>> {
        let api = Arc::clone(&self.api);
        let key = QueryKey::documents(source_id.as_deref());
        self.cache.observe(key, move || {
            let api = Arc::clone(&api);
            let source_id = source_id.clone();
            async move { api.fetch_documents(source_id.as_deref()).await }
        })
    }

    /// Jobs list, refetched every `polling.jobs_interval_ms` while mounted.
    pub fn mount_jobs(&self) -> PolledQuery<Vec<Job>> {
        let api = Arc::clone(&self.api);
        PolledQuery::mount(
            &self.cache,
            QueryKey::jobs(),
            move || {
                let api = Arc::clone(&api);
                async move { api.fetch_jobs().await }
            },
            self.config.polling.jobs_interval(),
        )
    }

    pub fn mount_job(&self, job_id: &str) -> QueryObserver<Job> {
        let api = Arc::clone(&self.api);
        let job_id = job_id.to_string();
        self.cache.observe(QueryKey::job(&job_id), move || {
            let api = Arc::clone(&api);
            let job_id = job_id.clone();
            async move { api.fetch_job(&job_id).await }
        })
    }

    pub fn mount_document(&self, doc_id: &str) -> QueryObserver<Document> {
        let api = Arc::clone(&self.api);
        let doc_id = doc_id.to_string();
        self.cache.observe(QueryKey::document(&doc_id), move || {
            let api = Arc::clone(&api);
            let doc_id = doc_id.clone();
            async move { api.fetch_document(&doc_id).await }
        })
    }

    pub fn mount_document_chunks(&self, doc_id: &str) -> QueryObserver<Vec<Chunk>> {
        let api = Arc::clone(&self.api);
        let doc_id = doc_id.to_string();
        self.cache.observe(QueryKey::document_chunks(&doc_id), move || {
            let api = Arc::clone(&api);
            let doc_id = doc_id.clone();
            async move { api.fetch_document_chunks(&doc_id).await }
        })
    }

    /// Submits the form. On success the sources list is invalidated and the
    /// form is cleared; on failure the form keeps its values.
    pub async fn create_source(&self, form: &mut SourceForm) -> Result<Source, RequestFailed> {
        let source = self.api.create_source(&form.to_request()).await?;
        info!(id = %source.id, name = %source.name, "source created");
        self.cache.invalidate(&QueryKey::sources());
        form.reset();
        Ok(source)
    }

    /// Triggers a scan. A failure is logged and otherwise ignored.
    pub async fn scan_source(&self, source_id: &str) -> Option<Job> {
        match self.api.scan_source(source_id).await {
            Ok(job) => {
                info!(source_id, job_id = %job.id, status = %job.status, "scan started");
                self.cache.invalidate(&QueryKey::jobs());
                Some(job)
            }
            Err(err) => {
                warn!(source_id, error = %err, "scan request failed");
                None
            }
        }
    }

    /// Runs `view`'s current query with the configured `top_k` unless one is given.
    pub async fn search(
        &self,
        view: &mut SearchView,
        top_k: Option<u32>,
    ) -> Result<Submission, RequestFailed> {
        let top_k = top_k.unwrap_or(self.config.search.top_k);
        view.submit(self.api.as_ref(), top_k).await
    }

    /// Stops all fetch work and drops cached state.
    pub fn shutdown(&self) {
        self.cache.shutdown();
        info!("dashboard stopped");
    }
}
