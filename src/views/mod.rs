//! Text renderings of the dashboard pages.
//!
//! Every list view follows the same contract over a [`QueryState`]:
//!
//! | State | Output |
//! |-------|--------|
//! | `Loading` | a centered spinner line, nothing else |
//! | `Success([])` | an empty-state message naming the entity |
//! | `Success(data)` | one row or card per entity |
//! | `Error` | a single failure line |
//!
//! Renderers return a `String` so the binary decides where it goes and the
//! tests can assert on it.

mod dashboard;
mod documents;
mod jobs;
mod search;
mod sources;

pub use dashboard::render_dashboard;
pub use documents::{render_document, render_documents};
pub use jobs::{render_job, render_jobs};
pub use search::{SearchView, Submission};
pub use sources::{render_sources, SourceForm};

use crate::cache::QueryState;

/// Width used to center spinner and empty-state lines.
pub const VIEW_WIDTH: usize = 80;

pub const SPINNER: &str = "⟳ Loading...";

pub(crate) fn centered(text: &str) -> String {
    let line = format!("{:^width$}", text, width = VIEW_WIDTH);
    format!("{}\n", line.trim_end())
}

/// Shared three-way dispatch. `populated` is only called with a non-empty slice.
pub(crate) fn render_list<T>(
    state: &QueryState<Vec<T>>,
    entity: &str,
    empty_message: &str,
    populated: impl FnOnce(&[T]) -> String,
) -> String {
    match state {
        QueryState::Loading => centered(SPINNER),
        QueryState::Error(err) => format!("Failed to load {}: {}\n", entity, err.message),
        QueryState::Success { data, .. } if data.is_empty() => centered(empty_message),
        QueryState::Success { data, .. } => populated(data),
    }
}
