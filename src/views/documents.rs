use std::fmt::Write;

use crate::cache::QueryState;
use crate::format;
use crate::models::{Chunk, Document};

use super::render_list;

pub const EMPTY_DOCUMENTS: &str = "No documents found. Upload some to get started.";

/// "My Documents" table.
pub fn render_documents(state: &QueryState<Vec<Document>>) -> String {
    render_list(state, "documents", EMPTY_DOCUMENTS, |docs| {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<36} {:<8} {:>10}  {:<10} {:<10}",
            "NAME", "TYPE", "SIZE", "STATUS", "DATE"
        );
        for doc in docs {
            let status = if doc.status.is_empty() {
                "Indexed".to_string()
            } else {
                format::capitalize_words(&doc.status)
            };
            let _ = writeln!(
                out,
                "{:<36} {:<8} {:>10}  {:<10} {:<10}",
                format::truncate(format::display_name(doc), 36),
                format::truncate(&format::file_type(doc.mime_type.as_deref()), 8),
                format::size_table(doc.size_bytes),
                status,
                format::format_date(&doc.created_at),
            );
        }
        out
    })
}

/// Detail view of one document, with its chunks when they were fetched.
pub fn render_document(doc: &Document, chunks: Option<&[Chunk]>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "--- Document ---");
    let _ = writeln!(out, "id:         {}", doc.id);
    let _ = writeln!(out, "name:       {}", format::display_name(doc));
    let _ = writeln!(out, "uri:        {}", doc.uri);
    let _ = writeln!(out, "source_id:  {}", doc.source_id);
    let _ = writeln!(
        out,
        "type:       {}",
        format::file_type(doc.mime_type.as_deref())
    );
    let _ = writeln!(out, "size:       {}", format::size_table(doc.size_bytes));
    let _ = writeln!(out, "status:     {}", doc.status);
    let _ = writeln!(out, "created_at: {}", format::format_datetime(&doc.created_at));
    if let Some(hash) = &doc.doc_hash {
        let _ = writeln!(out, "hash:       {}", hash);
    }

    if let Some(chunks) = chunks {
        let _ = writeln!(out);
        let _ = writeln!(out, "--- Chunks ({}) ---", chunks.len());
        for chunk in chunks {
            let _ = writeln!(
                out,
                "[chunk {}] {}..{}",
                chunk.chunk_index, chunk.start_offset, chunk.end_offset
            );
            let _ = writeln!(out, "{}", chunk.text);
            let _ = writeln!(out);
        }
    }
    out
}
