use std::fmt::Write;

use crate::cache::QueryState;
use crate::format;
use crate::models::{Job, JobStatus};

use super::render_list;

pub const EMPTY_JOBS: &str = "No jobs found.";

const BAR_CELLS: usize = 10;

fn status_icon(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Done => "✓",
        JobStatus::Failed => "✗",
        JobStatus::Running => "⟳",
        JobStatus::Pending => "…",
    }
}

fn details(job: &Job) -> String {
    match &job.error {
        Some(err) => format!("error: {}", err),
        None => format::compact_json(&job.payload),
    }
}

/// Jobs ("History") table.
pub fn render_jobs(state: &QueryState<Vec<Job>>) -> String {
    render_list(state, "jobs", EMPTY_JOBS, |jobs| {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<10} {:<14} {:<32} {:<19} CREATED",
            "STATUS", "TYPE", "DETAILS", "PROGRESS"
        );
        for job in jobs {
            let progress = format!(
                "{} {}",
                format::progress_bar(job.progress, BAR_CELLS),
                format::progress_width(job.progress)
            );
            let _ = writeln!(
                out,
                "{} {:<8} {:<14} {:<32} {:<19} {}",
                status_icon(job.status),
                format::capitalize_words(job.status.as_str()),
                format::truncate(&format::job_type_label(&job.job_type), 14),
                format::truncate(&details(job), 32),
                progress,
                format::format_datetime(&job.created_at),
            );
        }
        out
    })
}

/// Detail view of one job.
pub fn render_job(job: &Job) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "--- Job ---");
    let _ = writeln!(out, "id:         {}", job.id);
    let _ = writeln!(out, "type:       {}", format::job_type_label(&job.job_type));
    let _ = writeln!(
        out,
        "status:     {} {}",
        status_icon(job.status),
        job.status
    );
    let _ = writeln!(
        out,
        "progress:   {} {}",
        format::progress_bar(job.progress, BAR_CELLS),
        format::progress_width(job.progress)
    );
    if let Some(err) = &job.error {
        let _ = writeln!(out, "error:      {}", err);
    }
    let _ = writeln!(out, "payload:    {}", format::compact_json(&job.payload));
    let _ = writeln!(out, "created_at: {}", format::format_datetime(&job.created_at));
    let _ = writeln!(out, "updated_at: {}", format::format_datetime(&job.updated_at));
    out
}
