use std::fmt::Write;

use crate::cache::QueryState;
use crate::format;
use crate::models::{CreateSource, JsonMap, Source};

use super::render_list;

pub const EMPTY_SOURCES: &str = "No sources found. Add one to get started.";

/// Source cards, each with the command that triggers its scan.
pub fn render_sources(state: &QueryState<Vec<Source>>) -> String {
    render_list(state, "sources", EMPTY_SOURCES, |sources| {
        let mut out = String::new();
        for source in sources {
            let _ = writeln!(out, "{}", source.name);
            let _ = writeln!(out, "  path:    {}", source.path);
            let _ = writeln!(out, "  id:      {}", source.id);
            if !source.config.is_empty() {
                let _ = writeln!(out, "  config:  {}", format::compact_json(&source.config));
            }
            let _ = writeln!(out, "  added:   {}", format::format_date(&source.created_at));
            let _ = writeln!(out, "  scan:    ingest sources scan {}", source.id);
            let _ = writeln!(out);
        }
        out
    })
}

/// State of the "Add Source" form. Both fields are required; nothing else
/// is validated before submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceForm {
    pub name: String,
    pub path: String,
    pub config: JsonMap,
}

impl SourceForm {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            config: JsonMap::new(),
        }
    }

    /// Names of required fields that are still blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        if self.path.trim().is_empty() {
            missing.push("path");
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    pub fn to_request(&self) -> CreateSource {
        CreateSource {
            name: self.name.clone(),
            path: self.path.clone(),
            config: (!self.config.is_empty()).then(|| self.config.clone()),
        }
    }

    /// Clears the fields after a successful submission.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
