//! Sampled per-folder progress lines and the sink they are written to.

use tracing::debug;

/// Destination for user-facing text lines (progress and the final report).
pub trait LineSink {
    fn line(&mut self, text: &str);
}

/// Writes to stdout.
pub struct ConsoleSink;

impl LineSink for ConsoleSink {
    fn line(&mut self, text: &str) {
        println!("{text}");
    }
}

impl LineSink for Vec<String> {
    fn line(&mut self, text: &str) {
        self.push(text.to_string());
    }
}

const MAX_EMISSIONS: usize = 10;

/// Limits a folder to at most ten progress lines (about one per 10% of
/// candidates), always including the line for the last candidate.
pub struct ProgressSampler {
    label: String,
    total: usize,
    target: usize,
    emitted: usize,
}

impl ProgressSampler {
    pub fn new(label: impl Into<String>, total: usize) -> Self {
        let target = if total == 0 {
            0
        } else {
            total.div_ceil(10).clamp(1, MAX_EMISSIONS)
        };
        Self {
            label: label.into(),
            total,
            target,
            emitted: 0,
        }
    }

    pub fn target_emissions(&self) -> usize {
        self.target
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Returns the progress line to print for this item, if any.
    pub fn sample(&mut self, processed: usize, success: usize, failure: usize) -> Option<String> {
        if self.total == 0 || self.target == 0 || self.emitted >= self.target {
            return None;
        }

        let processed = processed.min(self.total);
        let is_final = processed == self.total;
        // processed / total >= (emitted + 1) / target, without floats
        let reached = processed * self.target >= (self.emitted + 1) * self.total;
        if !is_final && !reached {
            return None;
        }

        self.emitted = (self.emitted + 1).min(self.target);
        Some(format!(
            "{} progress {}/{} (~{}%) | Success {} | Fail {}",
            self.label,
            processed,
            self.total,
            percent(processed, self.total),
            success,
            failure
        ))
    }

    /// Writes the line to `sink`. The log receives it at DEBUG only.
    pub fn emit(&mut self, processed: usize, success: usize, failure: usize, sink: &mut dyn LineSink) {
        if let Some(line) = self.sample(processed, success, failure) {
            debug!(target: "progress", "{line}");
            sink.line(&line);
        }
    }
}

/// Rounded (half away from zero) percentage, clamped to 0..=100.
pub fn percent(done: usize, total: usize) -> usize {
    if total == 0 {
        return 0;
    }
    ((done * 200 + total) / (total * 2)).min(100)
}

/// `current/total (~pct%)` tag used in per-file log lines.
pub fn format_position(index: usize, total: usize) -> String {
    if total == 0 {
        return "0/0 (~0%)".to_string();
    }
    let current = index + 1;
    format!("{current}/{total} (~{}%)", percent(current, total))
}
