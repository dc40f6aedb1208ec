//! Library-level tests against a mock ingestion backend: the typed client,
//! and the cache/poller behavior seen through `App`.

mod common;

use common::{spawn_backend, Backend, SEED_JOB_ID, SEED_SOURCE_ID};
use ingest_console::client::{ApiClient, DashboardApi};
use ingest_console::config::Config;
use ingest_console::models::{CreateSource, JobStatus};
use ingest_console::views::{SearchView, SourceForm, Submission};
use ingest_console::App;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn test_config(base_url: &str) -> Config {
    let mut config = Config::minimal();
    config.api.base_url = base_url.to_string();
    // Long enough that no timer tick lands inside a test unless it asks for one.
    config.polling.jobs_interval_ms = 60_000;
    config
}

async fn start() -> (Arc<Backend>, App) {
    let backend = Backend::seeded();
    let url = spawn_backend(Arc::clone(&backend)).await;
    let app = App::start(test_config(&url)).unwrap();
    (backend, app)
}

#[tokio::test]
async fn test_client_reads_every_endpoint() {
    let backend = Backend::seeded();
    let url = spawn_backend(Arc::clone(&backend)).await;
    let client = ApiClient::new(&test_config(&url).api).unwrap();

    let sources = client.fetch_sources().await.unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].name, "Research");

    let jobs = client.fetch_jobs().await.unwrap();
    assert_eq!(jobs[0].job_type, "scan_source");
    assert_eq!(jobs[0].status, JobStatus::Pending);

    let job = client.fetch_job(SEED_JOB_ID).await.unwrap();
    assert_eq!(job.id, SEED_JOB_ID);

    let all = client.fetch_documents(None).await.unwrap();
    assert_eq!(all.len(), 2);
    let filtered = client.fetch_documents(Some(SEED_SOURCE_ID)).await.unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].size_bytes, Some(2_097_152));

    let doc = client.fetch_document("doc-2").await.unwrap();
    assert_eq!(doc.title, None);
    let chunks = client.fetch_document_chunks("doc-1").await.unwrap();
    assert_eq!(chunks[0].doc_id, "doc-1");

    let hits = client.search("revenue", 5).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].display_title(), Some("Quarterly Revenue"));

    let health = client.health().await.unwrap();
    assert_eq!(health.status, "ok");
    assert!(health.config_loaded);
}

#[tokio::test]
async fn test_client_create_and_scan() {
    let backend = Backend::seeded();
    let url = spawn_backend(Arc::clone(&backend)).await;
    let client = ApiClient::new(&test_config(&url).api).unwrap();

    let mut config = serde_json::Map::new();
    config.insert("recursive".into(), serde_json::json!(true));
    let created = client
        .create_source(&CreateSource {
            name: "Scans".into(),
            path: "/srv/scans".into(),
            config: Some(config),
        })
        .await
        .unwrap();
    assert_eq!(created.name, "Scans");
    assert_eq!(created.config["recursive"], serde_json::json!(true));

    let job = client.scan_source(&created.id).await.unwrap();
    assert_eq!(job.payload["source_id"], serde_json::json!(created.id));
    assert_eq!(backend.jobs.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_client_error_carries_status_and_body() {
    let backend = Backend::seeded();
    let url = spawn_backend(Arc::clone(&backend)).await;
    let client = ApiClient::new(&test_config(&url).api).unwrap();

    let err = client.fetch_job("missing").await.unwrap_err();
    assert_eq!(err.status, Some(404));
    assert!(err.is_not_found());
    assert!(err.body.as_deref().unwrap().contains("Job not found"));

    backend.fail_reads.store(true, Ordering::SeqCst);
    let err = client.fetch_sources().await.unwrap_err();
    assert_eq!(err.status, Some(500));
    assert!(err.message.contains("500"));
}

#[tokio::test]
async fn test_create_source_refreshes_mounted_list() {
    let (backend, app) = start().await;

    let mut sources = app.mount_sources();
    let before = sources.settled().await;
    assert_eq!(before.data().unwrap().len(), 1);

    let mut form = SourceForm::new("Scans", "/srv/scans");
    let created = app.create_source(&mut form).await.unwrap();
    assert_eq!(form, SourceForm::default());

    let after = sources.settled().await;
    let names: Vec<&str> = after
        .data()
        .unwrap()
        .iter()
        .map(|s| s.name.as_str())
        .collect();
    assert_eq!(names, vec!["Research", "Scans"]);
    assert!(after.data().unwrap().iter().any(|s| s.id == created.id));
    assert_eq!(backend.hits("sources"), 2);
}

#[tokio::test]
async fn test_failed_create_keeps_form() {
    let backend = Backend::empty();
    let url = spawn_backend(Arc::clone(&backend)).await;
    let mut config = test_config(&url);
    config.api.base_url = format!("{}/wrong-prefix", url);
    let app = App::start(config).unwrap();

    let mut form = SourceForm::new("Scans", "/srv/scans");
    let err = app.create_source(&mut form).await.unwrap_err();
    assert_eq!(err.status, Some(404));
    assert_eq!(form.name, "Scans");
    assert_eq!(form.path, "/srv/scans");
}

#[tokio::test]
async fn test_scan_invalidates_polled_jobs() {
    let (backend, app) = start().await;

    let mut jobs = app.mount_jobs();
    assert_eq!(jobs.settled().await.data().unwrap().len(), 1);

    let job = app.scan_source(SEED_SOURCE_ID).await.unwrap();
    let state = jobs.settled().await;
    let listed = state.data().unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().any(|j| j.id == job.id));
    assert_eq!(backend.hits("jobs"), 2);
    jobs.stop();
}

#[tokio::test]
async fn test_failed_scan_is_ignored() {
    let (backend, app) = start().await;

    let mut jobs = app.mount_jobs();
    jobs.settled().await;

    assert!(app.scan_source("no-such-source").await.is_none());
    assert_eq!(backend.hits("scan"), 1);
    assert!(!app.cache().is_fetching(&ingest_console::QueryKey::jobs()));
    assert_eq!(backend.hits("jobs"), 1);
}

#[tokio::test]
async fn test_two_job_views_share_one_read() {
    let (backend, app) = start().await;

    let mut first = app.mount_jobs();
    let mut second = app.mount_jobs();
    first.settled().await;
    second.settled().await;

    assert_eq!(backend.hits("jobs"), 1);
    assert_eq!(first.state().data(), second.state().data());
}

#[tokio::test]
async fn test_polling_follows_job_to_completion() {
    let backend = Backend::seeded();
    let url = spawn_backend(Arc::clone(&backend)).await;
    let mut config = test_config(&url);
    config.polling.jobs_interval_ms = 50;
    let app = App::start(config).unwrap();

    let mut jobs = app.mount_jobs();
    let done = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let state = jobs.settled().await;
            if let Some(list) = state.data() {
                if list.iter().all(|j| j.status == JobStatus::Done) {
                    return list[0].progress;
                }
            }
            if !jobs.changed().await {
                panic!("cache closed while polling");
            }
        }
    })
    .await
    .expect("job never reached done");

    assert_eq!(done, 1.0);
    assert!(backend.hits("jobs") >= 3);
    assert!(jobs.is_polling());
    jobs.stop();
}

#[tokio::test]
async fn test_read_failure_then_recovery() {
    let (backend, app) = start().await;
    backend.fail_reads.store(true, Ordering::SeqCst);

    let mut docs = app.mount_documents(None);
    let state = docs.settled().await;
    assert!(state.is_error());

    backend.fail_reads.store(false, Ordering::SeqCst);
    assert!(docs.refetch());
    let state = docs.settled().await;
    assert_eq!(state.data().unwrap().len(), 2);
}

#[tokio::test]
async fn test_search_uses_configured_top_k() {
    let (backend, app) = start().await;

    let mut view = SearchView::new();
    view.set_query("  ");
    assert_eq!(app.search(&mut view, None).await.unwrap(), Submission::Skipped);
    assert_eq!(backend.hits("search"), 0);

    view.set_query("quarterly");
    assert_eq!(app.search(&mut view, None).await.unwrap(), Submission::Completed);
    assert_eq!(view.results().len(), 1);
    assert!(view.render().contains("91%"));
}

#[tokio::test]
async fn test_shutdown_ends_subscriptions() {
    let (_backend, app) = start().await;
    let mut sources = app.mount_sources();
    sources.settled().await;

    app.shutdown();
    assert!(!sources.changed().await);
}

#[tokio::test]
async fn test_failed_poll_keeps_jobs_on_screen() {
    let (backend, app) = start().await;

    let mut jobs = app.mount_jobs();
    assert_eq!(jobs.settled().await.data().unwrap().len(), 1);

    backend.fail_reads.store(true, Ordering::SeqCst);
    assert!(app.cache().refetch(&ingest_console::QueryKey::jobs()));
    let state = jobs.settled().await;
    assert!(!state.is_error());
    assert_eq!(state.data().unwrap()[0].id, SEED_JOB_ID);
    assert_eq!(backend.hits("jobs"), 2);

    let rendered = ingest_console::views::render_jobs(&state);
    assert!(rendered.contains("Scan Source"));
    assert!(!rendered.contains("Failed to load"));

    let err = app
        .cache()
        .last_error(&ingest_console::QueryKey::jobs())
        .unwrap();
    assert_eq!(err.status, Some(500));
    jobs.stop();
}
