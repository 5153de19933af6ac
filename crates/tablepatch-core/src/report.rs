//! Append-only run report
//!
//! One human-readable line per transform decision, written out exactly once
//! at the end of a successful run.

use chrono::{DateTime, Utc};

/// Ordered, append-only sequence of report lines
#[derive(Debug, Clone)]
pub struct ReportLog {
    started: DateTime<Utc>,
    lines: Vec<String>,
}

impl ReportLog {
    pub fn new() -> Self {
        Self {
            started: Utc::now(),
            lines: Vec::new(),
        }
    }

    /// When the run began
    pub fn started(&self) -> DateTime<Utc> {
        self.started
    }

    /// Append one line
    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Newline-joined plain text, lines in execution order
    pub fn to_text(&self) -> String {
        let mut text = self.lines.join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        text
    }
}

impl Default for ReportLog {
    fn default() -> Self {
        Self::new()
    }
}
