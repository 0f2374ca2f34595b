//! End-of-run summary: one compact `RUN-SUMMARY` log line plus a bordered
//! table for the console.

use std::time::Duration;

use tracing::{debug, info};

use super::models::JobResult;
use super::progress::LineSink;

const BORDER_WIDTH: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub summary: String,
    pub lines: Vec<String>,
}

/// Returns `None` for an empty run.
pub fn build(results: &[JobResult]) -> Option<Report> {
    if results.is_empty() {
        return None;
    }

    let border = "=".repeat(BORDER_WIDTH);
    let separator = "-".repeat(BORDER_WIDTH);
    let mut lines = vec![border.clone(), center("JOB EXECUTION SUMMARY"), border.clone()];

    for job in results {
        let marker = if job.interrupted { " (interrupted)" } else { "" };
        lines.push(center(&format!(
            "JOB: {}{marker} | Duration: {} | Success: {} | Fail: {}",
            job.job_name,
            format_duration(job.duration),
            job.total_success(),
            job.total_failures()
        )));
        lines.push(separator.clone());

        for folder in &job.folder_results {
            lines.push(center(&format!("Folder: {}", folder.folder)));
            lines.push(center(&format!(
                "Total: {} | Success: {} | Fail: {} | Duration: {}",
                folder.total_candidates,
                folder.success_count,
                folder.failure_count,
                format_duration(folder.duration)
            )));
            if !folder.failed_files.is_empty() {
                lines.push(center("Failed Files:"));
                for failed in &folder.failed_files {
                    lines.push(center(&format!(" - {failed}")));
                }
            }
            lines.push(separator.clone());
        }
    }
    lines.push(border);

    Some(Report {
        summary: summary_line(results),
        lines,
    })
}

/// Logs the compact line and writes the table to `sink`.
pub fn print(results: &[JobResult], sink: &mut dyn LineSink) {
    let Some(report) = build(results) else {
        return;
    };
    info!("{}", report.summary);
    for line in &report.lines {
        sink.line(line);
        if !line.trim().is_empty() {
            debug!(target: "report", "{}", line.trim_end());
        }
    }
}

fn summary_line(results: &[JobResult]) -> String {
    let success: usize = results.iter().map(JobResult::total_success).sum();
    let failure: usize = results.iter().map(JobResult::total_failures).sum();
    let mut line = format!("RUN-SUMMARY total:succ={success},fail={failure}");
    for job in results {
        line.push_str(&format!(
            " | {}:succ={},fail={},dur={}",
            job.job_name,
            job.total_success(),
            job.total_failures(),
            format_duration(job.duration)
        ));
    }
    line
}

/// `HH:MM:SS`; hours keep counting past 24.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, secs % 3600 / 60, secs % 60)
}

/// Left-pads to center within the border. Blank input yields an empty line.
fn center(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }
    let width = text.chars().count();
    if width >= BORDER_WIDTH {
        return text.to_string();
    }
    format!("{}{text}", " ".repeat((BORDER_WIDTH - width) / 2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::models::FolderResult;

    fn sample() -> Vec<JobResult> {
        let mut ok = FolderResult::new("/in");
        ok.total_candidates = 3;
        ok.success_count = 3;
        ok.duration = Duration::from_secs(5);

        let mut bad = FolderResult::new("/in2");
        bad.total_candidates = 2;
        bad.success_count = 1;
        bad.failure_count = 1;
        bad.failed_files.push("/in2/x.dat".to_string());

        let mut invoices = JobResult::new("invoices");
        invoices.duration = Duration::from_secs(3725);
        invoices.folder_results = vec![ok, bad];

        let mut empty = JobResult::new("orders");
        empty.duration = Duration::from_secs(1);
        vec![invoices, empty]
    }

    #[test]
    fn empty_input_is_a_noop() {
        assert!(build(&[]).is_none());
        let mut lines: Vec<String> = Vec::new();
        print(&[], &mut lines);
        assert!(lines.is_empty());
    }

    #[test]
    fn summary_line_lists_totals_then_jobs() {
        let report = build(&sample()).unwrap();
        assert_eq!(
            report.summary,
            "RUN-SUMMARY total:succ=4,fail=1 | invoices:succ=4,fail=1,dur=01:02:05 | orders:succ=0,fail=0,dur=00:00:01"
        );
    }

    #[test]
    fn table_has_borders_folders_and_failed_files() {
        let report = build(&sample()).unwrap();
        let lines = &report.lines;
        let border = "=".repeat(80);

        assert_eq!(lines[0], border);
        assert_eq!(lines[1].trim(), "JOB EXECUTION SUMMARY");
        assert_eq!(lines.last(), Some(&border));
        assert!(lines.iter().all(|l| l.chars().count() <= 80));

        let trimmed: Vec<&str> = lines.iter().map(|l| l.trim()).collect();
        assert!(trimmed.contains(&"JOB: invoices | Duration: 01:02:05 | Success: 4 | Fail: 1"));
        assert!(trimmed.contains(&"Folder: /in2"));
        assert!(trimmed.contains(&"Total: 2 | Success: 1 | Fail: 1 | Duration: 00:00:00"));
        assert!(trimmed.contains(&"- /in2/x.dat"));
        assert_eq!(trimmed.iter().filter(|l| **l == "Failed Files:").count(), 1);
    }

    #[test]
    fn interrupted_jobs_are_marked() {
        let mut results = sample();
        results[1].interrupted = true;
        let report = build(&results).unwrap();
        assert!(
            report
                .lines
                .iter()
                .any(|l| l.trim().starts_with("JOB: orders (interrupted) |"))
        );
    }

    #[test]
    fn centering() {
        assert_eq!(center("ab"), format!("{}ab", " ".repeat(39)));
        assert_eq!(center("   "), "");
        let long = "x".repeat(90);
        assert_eq!(center(&long), long);
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::ZERO), "00:00:00");
        assert_eq!(format_duration(Duration::from_millis(59_999)), "00:00:59");
        assert_eq!(format_duration(Duration::from_secs(90_061)), "25:01:01");
    }

    #[test]
    fn print_writes_every_line() {
        let results = sample();
        let mut lines: Vec<String> = Vec::new();
        print(&results, &mut lines);
        assert_eq!(lines, build(&results).unwrap().lines);
    }
}
