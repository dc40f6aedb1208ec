use std::fmt::Write;

use crate::client::DashboardApi;
use crate::error::RequestFailed;
use crate::format;
use crate::models::SearchResult;

/// Outcome of [`SearchView::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// The query was blank; no request was sent.
    Skipped,
    /// The backend answered; results were replaced.
    Completed,
}

/// Local state of the search page.
///
/// Lives outside the query cache. Results change only when a search
/// succeeds: editing the query or a failed search leaves the previous
/// results on screen.
#[derive(Debug, Clone, Default)]
pub struct SearchView {
    query: String,
    results: Vec<SearchResult>,
    submitted: Option<String>,
    succeeded: bool,
}

impl SearchView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    pub fn results(&self) -> &[SearchResult] {
        &self.results
    }

    pub fn can_submit(&self) -> bool {
        !self.query.trim().is_empty()
    }

    /// Sends the current query unless it is blank.
    pub async fn submit(
        &mut self,
        api: &dyn DashboardApi,
        top_k: u32,
    ) -> Result<Submission, RequestFailed> {
        if !self.can_submit() {
            return Ok(Submission::Skipped);
        }

        let query = self.query.clone();
        match api.search(&query, top_k).await {
            Ok(results) => {
                tracing::debug!(query = %query, hits = results.len(), "search completed");
                self.results = results;
                self.submitted = Some(query);
                self.succeeded = true;
                Ok(Submission::Completed)
            }
            Err(err) => {
                self.succeeded = false;
                Err(err)
            }
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for result in &self.results {
            let title = result.display_title().unwrap_or("(untitled)");
            let _ = writeln!(
                out,
                "{:<72} {:>5}",
                format::truncate(title, 72),
                format::score_percent(result.score)
            );
            let _ = writeln!(out, "  {}", result.text.trim());
            if let Some(link) = result.link() {
                let _ = writeln!(out, "  → {}", link);
            }
            let _ = writeln!(out);
        }

        if self.succeeded && self.results.is_empty() {
            let submitted = self.submitted.as_deref().unwrap_or(&self.query);
            out.push_str(&super::centered(&format!(
                "No results found for \"{}\"",
                submitted
            )));
        }
        out
    }
}
