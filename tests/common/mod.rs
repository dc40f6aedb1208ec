//! In-process stand-in for the ingestion REST API, shared by the
//! integration test binaries.

#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const SEED_SOURCE_ID: &str = "7f9c2b1e-0000-4000-8000-000000000001";
pub const SEED_JOB_ID: &str = "7f9c2b1e-0000-4000-8000-0000000000aa";

type Reply = Result<Json<Value>, (StatusCode, Json<Value>)>;

#[derive(Default)]
pub struct Backend {
    pub sources: Mutex<Vec<Value>>,
    pub jobs: Mutex<Vec<Value>>,
    pub documents: Mutex<Vec<Value>>,
    /// When set, every GET answers 500.
    pub fail_reads: AtomicBool,
    hits: Mutex<HashMap<&'static str, usize>>,
}

impl Backend {
    /// One source, two documents, one pending scan job.
    pub fn seeded() -> Arc<Self> {
        let backend = Self::default();
        backend.sources.lock().unwrap().push(json!({
            "id": SEED_SOURCE_ID,
            "name": "Research",
            "path": "/srv/research",
            "config": {},
            "created_at": "2024-05-01T10:00:00",
            "updated_at": "2024-05-01T10:00:00"
        }));
        backend.documents.lock().unwrap().extend([
            json!({
                "id": "doc-1",
                "source_id": SEED_SOURCE_ID,
                "uri": "/srv/research/quarterly-revenue.pdf",
                "title": "Quarterly Revenue",
                "mime_type": "application/pdf",
                "size_bytes": 2_097_152,
                "status": "indexed",
                "created_at": "2024-05-02T09:30:00"
            }),
            json!({
                "id": "doc-2",
                "source_id": "other-source",
                "uri": "/srv/other/notes.txt",
                "mime_type": "text/plain",
                "status": "indexed",
                "created_at": "2024-05-03T11:00:00+00:00"
            }),
        ]);
        backend.jobs.lock().unwrap().push(job_json(SEED_JOB_ID, SEED_SOURCE_ID));
        Arc::new(backend)
    }

    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn hits(&self, route: &str) -> usize {
        self.hits.lock().unwrap().get(route).copied().unwrap_or(0)
    }

    fn hit(&self, route: &'static str) {
        *self.hits.lock().unwrap().entry(route).or_insert(0) += 1;
    }

    fn check_reads(&self) -> Result<(), (StatusCode, Json<Value>)> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"detail": "internal error"})),
            ));
        }
        Ok(())
    }
}

fn job_json(id: &str, source_id: &str) -> Value {
    json!({
        "id": id,
        "type": "scan_source",
        "status": "pending",
        "progress": 0.0,
        "error": null,
        "payload": {"source_id": source_id},
        "created_at": "2024-05-02T09:00:00",
        "updated_at": "2024-05-02T09:00:00"
    })
}

fn not_found(what: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"detail": format!("{} not found", what)})),
    )
}

/// Moves every unfinished job one step: pending -> running(0.5) -> done(1.0).
fn advance(job: &mut Value) {
    let (status, progress) = match job["status"].as_str() {
        Some("pending") => ("running", 0.5),
        Some("running") => ("done", 1.0),
        _ => return,
    };
    job["status"] = json!(status);
    job["progress"] = json!(progress);
}

async fn list_sources(State(b): State<Arc<Backend>>) -> Reply {
    b.hit("sources");
    b.check_reads()?;
    Ok(Json(Value::Array(b.sources.lock().unwrap().clone())))
}

async fn create_source(State(b): State<Arc<Backend>>, Json(body): Json<Value>) -> Reply {
    b.hit("create_source");
    let source = json!({
        "id": uuid::Uuid::new_v4().to_string(),
        "name": body["name"],
        "path": body["path"],
        "config": body.get("config").cloned().unwrap_or_else(|| json!({})),
        "created_at": "2024-05-04T08:00:00",
        "updated_at": "2024-05-04T08:00:00"
    });
    b.sources.lock().unwrap().push(source.clone());
    Ok(Json(source))
}

async fn scan_source(State(b): State<Arc<Backend>>, Path(id): Path<String>) -> Reply {
    b.hit("scan");
    let known = b.sources.lock().unwrap().iter().any(|s| s["id"] == id);
    if !known {
        return Err(not_found("Source"));
    }
    let job = job_json(&uuid::Uuid::new_v4().to_string(), &id);
    b.jobs.lock().unwrap().push(job.clone());
    Ok(Json(job))
}

async fn list_jobs(State(b): State<Arc<Backend>>) -> Reply {
    b.hit("jobs");
    b.check_reads()?;
    let mut jobs = b.jobs.lock().unwrap();
    let snapshot = Value::Array(jobs.clone());
    jobs.iter_mut().for_each(advance);
    Ok(Json(snapshot))
}

async fn get_job(State(b): State<Arc<Backend>>, Path(id): Path<String>) -> Reply {
    b.hit("job");
    b.check_reads()?;
    let jobs = b.jobs.lock().unwrap();
    jobs.iter()
        .find(|j| j["id"] == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| not_found("Job"))
}

async fn list_documents(
    State(b): State<Arc<Backend>>,
    Query(params): Query<HashMap<String, String>>,
) -> Reply {
    b.hit("documents");
    b.check_reads()?;
    let docs = b.documents.lock().unwrap();
    let filtered: Vec<Value> = docs
        .iter()
        .filter(|d| match params.get("source_id") {
            Some(source_id) => d["source_id"] == source_id.as_str(),
            None => true,
        })
        .cloned()
        .collect();
    Ok(Json(Value::Array(filtered)))
}

async fn get_document(State(b): State<Arc<Backend>>, Path(id): Path<String>) -> Reply {
    b.hit("document");
    b.check_reads()?;
    let docs = b.documents.lock().unwrap();
    docs.iter()
        .find(|d| d["id"] == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| not_found("Document"))
}

async fn document_chunks(State(b): State<Arc<Backend>>, Path(id): Path<String>) -> Reply {
    b.hit("chunks");
    b.check_reads()?;
    Ok(Json(json!([
        {
            "id": format!("{}-c0", id),
            "doc_id": id,
            "chunk_index": 0,
            "text": "Revenue grew eleven percent quarter over quarter.",
            "start_offset": 0,
            "end_offset": 49
        }
    ])))
}

async fn search(State(b): State<Arc<Backend>>, Json(body): Json<Value>) -> Reply {
    b.hit("search");
    let query = body["query"].as_str().unwrap_or_default().to_lowercase();
    let top_k = body["top_k"].as_u64().unwrap_or(10) as usize;
    let docs = b.documents.lock().unwrap();
    let results: Vec<Value> = docs
        .iter()
        .filter(|d| {
            d["title"]
                .as_str()
                .is_some_and(|t| t.to_lowercase().contains(&query))
        })
        .take(top_k)
        .map(|d| {
            json!({
                "doc_id": d["id"],
                "chunk_id": format!("{}-c0", d["id"].as_str().unwrap_or_default()),
                "score": 0.912,
                "text": "Revenue grew eleven percent quarter over quarter.",
                "metadata": {"title": d["title"], "uri": d["uri"]}
            })
        })
        .collect();
    Ok(Json(Value::Array(results)))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok", "config_loaded": true}))
}

pub fn router(backend: Arc<Backend>) -> Router {
    let api = Router::new()
        .route("/sources", get(list_sources).post(create_source))
        .route("/sources/{id}/scan", post(scan_source))
        .route("/jobs", get(list_jobs))
        .route("/jobs/{id}", get(get_job))
        .route("/documents", get(list_documents))
        .route("/documents/{id}", get(get_document))
        .route("/documents/{id}/chunks", get(document_chunks))
        .route("/search", post(search));

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(health))
        .with_state(backend)
}

/// Serves `backend` on an ephemeral port and returns its `/api/v1` base URL.
pub async fn spawn_backend(backend: Arc<Backend>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(backend)).await.unwrap();
    });
    format!("http://{}/api/v1", addr)
}
