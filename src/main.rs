//! # Ingest Console CLI (`ingest`)
//!
//! Terminal front end for the document-ingestion service. Every command
//! mounts the same views the library exposes, waits for their data, and
//! prints the rendering on stdout. Logs go to stderr.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ingest sources` | List configured sources |
//! | `ingest sources add --name N --path P` | Register a new source |
//! | `ingest sources scan <id>` | Start a scan job for a source |
//! | `ingest jobs [--watch]` | List jobs, optionally refreshing until Ctrl-C |
//! | `ingest job <id>` | Show one job |
//! | `ingest documents [--source ID]` | List documents |
//! | `ingest document <id> [--chunks]` | Show one document |
//! | `ingest search "<query>"` | Search indexed documents |
//! | `ingest dashboard` | Recent documents and quick actions |
//! | `ingest health` | Backend health check |
//! | `ingest completions <shell>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! ingest --api-url http://127.0.0.1:8000/api/v1 sources
//! ingest sources add --name Scans --path /srv/scans --set recursive=true
//! ingest jobs --watch
//! ingest search "invoice total" --top-k 5
//! ```

use anyhow::{bail, Result};
use clap::{CommandFactory, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

use ingest_console::cache::QueryState;
use ingest_console::config::{self, Config};
use ingest_console::models::JsonMap;
use ingest_console::views::{self, SearchView, SourceForm, Submission};
use ingest_console::App;

/// Ingest Console: terminal dashboard for a local document-ingestion and
/// search service.
#[derive(Parser)]
#[command(
    name = "ingest",
    about = "Ingest Console: terminal dashboard for a document-ingestion and search service",
    version,
    long_about = "Ingest Console lists sources, documents and jobs, triggers scans, and runs \
    searches against the ingestion service's REST API. The jobs view can follow progress live."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/ingest.toml`. When the file does not exist the
    /// built-in defaults are used.
    #[arg(long, global = true, default_value = "./config/ingest.toml")]
    config: PathBuf,

    /// Override `[api].base_url`, e.g. `http://127.0.0.1:8000/api/v1`.
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// List, add, or scan sources.
    ///
    /// Without a subcommand, lists all sources.
    Sources {
        #[command(subcommand)]
        action: Option<SourceAction>,
    },

    /// List jobs.
    Jobs {
        /// Keep the list on screen and refresh it at the polling interval
        /// until interrupted.
        #[arg(long)]
        watch: bool,
    },

    /// Show one job by id.
    Job { id: String },

    /// List documents.
    Documents {
        /// Only documents belonging to this source.
        #[arg(long)]
        source: Option<String>,
    },

    /// Show one document by id.
    Document {
        id: String,

        /// Also list the document's chunks.
        #[arg(long)]
        chunks: bool,
    },

    /// Search indexed documents.
    ///
    /// A blank query sends no request.
    Search {
        query: String,

        /// Maximum number of results (defaults to `[search].top_k`).
        #[arg(long)]
        top_k: Option<u32>,
    },

    /// Recent documents and quick actions.
    Dashboard,

    /// Check that the backend is reachable.
    Health,

    /// Print shell completions to stdout.
    Completions { shell: clap_complete::Shell },
}

/// Source subcommands.
#[derive(Subcommand)]
enum SourceAction {
    /// Register a folder to be indexed.
    Add {
        #[arg(long)]
        name: String,

        #[arg(long)]
        path: String,

        /// Extra source config as `key=value`. Values that parse as JSON
        /// (`true`, `3`, `["a"]`) are sent as such, anything else as a string.
        #[arg(long = "set", value_parser = parse_key_val)]
        set: Vec<(String, String)>,
    },

    /// Start a background scan of a source.
    Scan { id: String },
}

/// Parse a `key=value` pair for `--set` arguments.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn to_config_map(pairs: Vec<(String, String)>) -> JsonMap {
    pairs
        .into_iter()
        .map(|(k, v)| {
            let value = serde_json::from_str(&v).unwrap_or(serde_json::Value::String(v));
            (k, value)
        })
        .collect()
}

fn load(cli: &Cli) -> Result<Config> {
    let mut cfg = config::load_or_default(&cli.config)?;
    if let Some(url) = &cli.api_url {
        cfg.api.base_url = url.clone();
    }
    cfg.validate()?;
    Ok(cfg)
}

/// Prints a rendered view and reports whether the underlying read failed.
fn emit<T>(state: &QueryState<T>, rendered: String) -> bool {
    print!("{}", rendered);
    let _ = std::io::stdout().flush();
    state.is_error()
}

async fn watch_jobs(app: &App) -> bool {
    let interval = app.config().polling.jobs_interval_ms;
    let mut jobs = app.mount_jobs();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let redraw = |state: &QueryState<Vec<ingest_console::models::Job>>| {
        print!("\x1b[2J\x1b[H");
        println!(
            "Jobs (refreshing every {} ms, Ctrl-C to exit)\n",
            interval
        );
        print!("{}", views::render_jobs(state));
        let _ = std::io::stdout().flush();
    };

    redraw(&jobs.settled().await);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = jobs.changed() => {
                if !changed {
                    break;
                }
                redraw(&jobs.state());
            }
        }
    }
    let failed = jobs.state().is_error();
    jobs.stop();
    failed
}

async fn run(app: &App, command: Commands) -> Result<bool> {
    let failed = match command {
        Commands::Sources { action: None } => {
            let mut sources = app.mount_sources();
            let state = sources.settled().await;
            emit(&state, views::render_sources(&state))
        }
        Commands::Sources {
            action: Some(SourceAction::Add { name, path, set }),
        } => {
            let mut form = SourceForm::new(name, path);
            form.config = to_config_map(set);
            let missing = form.missing_fields();
            if !missing.is_empty() {
                bail!("missing required field(s): {}", missing.join(", "));
            }

            let mut sources = app.mount_sources();
            sources.settled().await;
            let created = app.create_source(&mut form).await?;
            println!("Created source {} ({})\n", created.name, created.id);

            let state = sources.settled().await;
            emit(&state, views::render_sources(&state))
        }
        Commands::Sources {
            action: Some(SourceAction::Scan { id }),
        } => {
            if let Some(job) = app.scan_source(&id).await {
                println!("Scan started: job {} ({})", job.id, job.status);
            }
            false
        }
        Commands::Jobs { watch: true } => watch_jobs(app).await,
        Commands::Jobs { watch: false } => {
            let mut jobs = app.mount_jobs();
            let state = jobs.settled().await;
            jobs.stop();
            emit(&state, views::render_jobs(&state))
        }
        Commands::Job { id } => {
            let mut job = app.mount_job(&id);
            let state = job.settled().await;
            let rendered = match &state {
                QueryState::Success { data, .. } => views::render_job(data),
                QueryState::Error(e) => format!("Failed to load job {}: {}\n", id, e.message),
                QueryState::Loading => String::new(),
            };
            emit(&state, rendered)
        }
        Commands::Documents { source } => {
            let mut docs = app.mount_documents(source);
            let state = docs.settled().await;
            emit(&state, views::render_documents(&state))
        }
        Commands::Document { id, chunks } => {
            let mut doc = app.mount_document(&id);
            let mut chunk_list = chunks.then(|| app.mount_document_chunks(&id));

            let state = doc.settled().await;
            let chunk_state = match chunk_list.as_mut() {
                Some(observer) => Some(observer.settled().await),
                None => None,
            };

            let chunk_data = chunk_state.as_ref().and_then(|s| s.data());
            let rendered = match &state {
                QueryState::Success { data, .. } => {
                    views::render_document(data, chunk_data.map(|c| c.as_slice()))
                }
                QueryState::Error(e) => {
                    format!("Failed to load document {}: {}\n", id, e.message)
                }
                QueryState::Loading => String::new(),
            };
            let chunks_failed = chunk_state.as_ref().is_some_and(|s| s.is_error());
            emit(&state, rendered) || chunks_failed
        }
        Commands::Search { query, top_k } => {
            let mut view = SearchView::new();
            view.set_query(query);
            match app.search(&mut view, top_k).await {
                Ok(Submission::Skipped) => {
                    tracing::debug!("blank query, nothing sent");
                    false
                }
                Ok(Submission::Completed) => {
                    print!("{}", view.render());
                    false
                }
                Err(e) => {
                    eprintln!("Search failed: {}", e);
                    true
                }
            }
        }
        Commands::Dashboard => {
            let mut docs = app.mount_documents(None);
            let state = docs.settled().await;
            emit(&state, views::render_dashboard(&state))
        }
        Commands::Health => match app.api().health().await {
            Ok(health) => {
                println!(
                    "status: {}  config_loaded: {}",
                    health.status, health.config_loaded
                );
                false
            }
            Err(e) => {
                eprintln!("Backend unreachable: {}", e);
                true
            }
        },
        Commands::Completions { .. } => unreachable!(),
    };
    Ok(failed)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "ingest", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = load(&cli)?;
    ingest_console::init_logging(&cfg.logging);

    let app = App::start(cfg)?;
    let result = run(&app, cli.command).await;
    app.shutdown();

    if result? {
        std::process::exit(1);
    }
    Ok(())
}
