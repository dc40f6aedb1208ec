//! Field display rules shared by every view.
//!
//! Sizes are bytes / 1024 / 1024 in MB (one decimal on cards, two in
//! tables). Progress is a `[0, 1]` fraction shown as a percentage. Missing
//! values render as fixed placeholders, never as numeric artifacts.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::models::{Document, JsonMap};

/// Size placeholder on dashboard cards.
pub const UNKNOWN_SIZE_CARD: &str = "Unknown Size";
/// Size placeholder in the documents table.
pub const UNKNOWN_SIZE_TABLE: &str = "-";
/// Type shown when a document has no usable MIME type.
pub const DEFAULT_FILE_TYPE: &str = "FILE";

fn size_mb(bytes: Option<u64>, decimals: usize, placeholder: &str) -> String {
    match bytes {
        Some(b) if b > 0 => format!("{:.*} MB", decimals, b as f64 / 1024.0 / 1024.0),
        _ => placeholder.to_string(),
    }
}

pub fn size_card(bytes: Option<u64>) -> String {
    size_mb(bytes, 1, UNKNOWN_SIZE_CARD)
}

pub fn size_table(bytes: Option<u64>) -> String {
    size_mb(bytes, 2, UNKNOWN_SIZE_TABLE)
}

/// Uppercased MIME subtype, e.g. `application/pdf` -> `PDF`.
pub fn file_type(mime: Option<&str>) -> String {
    mime.and_then(|m| m.split('/').nth(1))
        .map(|sub| sub.split(';').next().unwrap_or(sub).trim())
        .filter(|sub| !sub.is_empty())
        .map(|sub| sub.to_uppercase())
        .unwrap_or_else(|| DEFAULT_FILE_TYPE.to_string())
}

/// Document title, or the last `/`-separated segment of its URI.
pub fn display_name(doc: &Document) -> &str {
    match doc.title.as_deref() {
        Some(t) if !t.is_empty() => t,
        _ => doc.uri.rsplit('/').next().unwrap_or(&doc.uri),
    }
}

pub fn progress_fraction(progress: f64) -> f64 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    }
}

/// `clamp(progress, 0, 1) * 100` as a CSS-style width, e.g. `42.5%`.
pub fn progress_width(progress: f64) -> String {
    let pct = progress_fraction(progress) * 100.0;
    let s = format!("{:.2}", pct);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    format!("{}%", s)
}

/// Fixed-width text bar, e.g. `[#####.....]`.
pub fn progress_bar(progress: f64, cells: usize) -> String {
    let filled = (progress_fraction(progress) * cells as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(cells - filled))
}

/// Relevance score as a rounded percentage, e.g. `0.876` -> `88%`.
pub fn score_percent(score: f64) -> String {
    format!("{}%", (score * 100.0).round() as i64)
}

/// Uppercases the first letter of every whitespace-separated word.
pub fn capitalize_words(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `scan_source` -> `Scan Source`. Only the first underscore is replaced.
pub fn job_type_label(job_type: &str) -> String {
    capitalize_words(&job_type.replacen('_', " ", 1))
}

/// Accepts RFC 3339 or a naive ISO-8601 timestamp (taken as UTC).
pub fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn format_date(ts: &str) -> String {
    parse_timestamp(ts)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| ts.to_string())
}

pub fn format_datetime(ts: &str) -> String {
    parse_timestamp(ts)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Cuts `s` to at most `max` characters, marking the cut with `…`.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(1);
    let mut out: String = s.chars().take(keep).collect();
    out.push('…');
    out
}

pub fn compact_json(map: &JsonMap) -> String {
    serde_json::to_string(map).unwrap_or_else(|_| "{}".to_string())
}
