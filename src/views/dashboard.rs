use std::fmt::Write;

use crate::cache::QueryState;
use crate::format;
use crate::models::Document;

use super::centered;

pub const EMPTY_RECENT: &str = "No recent documents found.";

/// How many documents the dashboard shows.
pub const RECENT_LIMIT: usize = 3;

fn card(out: &mut String, doc: &Document) {
    let _ = writeln!(out, "┌ {}", format::truncate(format::display_name(doc), 60));
    let _ = writeln!(
        out,
        "│ {} · {}",
        format::file_type(doc.mime_type.as_deref()),
        format::size_card(doc.size_bytes)
    );
    let _ = writeln!(
        out,
        "└ Processed: {}   Completed",
        format::format_date(&doc.created_at)
    );
}

/// Landing page: quick links plus the first three documents as cards.
///
/// Shares the `["documents"]` key with the documents table. While loading
/// and on error the recent list shows the empty message, same as the page
/// this mirrors.
pub fn render_dashboard(state: &QueryState<Vec<Document>>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Quick actions");
    let _ = writeln!(out, "  ingest sources add   add a folder to index");
    let _ = writeln!(out, "  ingest jobs --watch  follow processing history");
    let _ = writeln!(out, "  ingest search <q>    search indexed documents");
    let _ = writeln!(out);
    let _ = writeln!(out, "Recent Documents");

    let recent: &[Document] = match state {
        QueryState::Success { data, .. } => &data[..data.len().min(RECENT_LIMIT)],
        _ => &[],
    };

    if recent.is_empty() {
        out.push_str(&centered(EMPTY_RECENT));
    } else {
        for doc in recent {
            card(&mut out, doc);
        }
    }
    out
}
