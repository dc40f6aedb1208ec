//! # Ingest Console
//!
//! A terminal dashboard and typed client for a local document-ingestion and
//! search service. The backend (scanning, OCR, indexing, ranking) lives
//! behind a REST API; this crate issues the calls, caches the answers, and
//! renders them.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌────────────┐   ┌──────────┐
//! │  Views   │◀──│ Query cache  │◀──│ API client │──▶│ REST API │
//! │ (text)   │   │ dedup/invalid│   │ (reqwest)  │   │ /api/v1  │
//! └──────────┘   └──────▲───────┘   └────────────┘   └──────────┘
//!                       │
//!                 ┌─────┴─────┐
//!                 │  Poller   │  jobs: every 2 s while mounted
//!                 └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ingest sources add --name Research --path /home/me/research
//! ingest sources scan <source-id>
//! ingest jobs --watch
//! ingest search "quarterly revenue"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Wire types |
//! | [`client`] | Typed REST client |
//! | [`error`] | `RequestFailed` |
//! | [`cache`] | Query cache with dedup and invalidation |
//! | [`poll`] | Fixed-interval refetch |
//! | [`format`] | Field display rules |
//! | [`views`] | Text renderers |
//! | [`app`] | Mounts and mutations |

pub mod app;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub mod models;
pub mod poll;
pub mod views;

pub use app::App;
pub use cache::{QueryCache, QueryKey, QueryObserver, QueryState};
pub use client::{ApiClient, DashboardApi};
pub use error::RequestFailed;

/// Initialize logging on stderr, honoring `RUST_LOG` over the config level.
pub fn init_logging(config: &config::LoggingConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = fmt().with_env_filter(filter).with_writer(std::io::stderr);

    let _ = if config.format == "json" {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
