//! Rolling step journal.
//!
//! The journal is a read-only view over the step history; it is rebuilt for
//! every decision request and never stored.

use std::fmt;

use visicrawl_protocols::{ScreenId, StepError, StepRecord};

/// Number of recent steps shown to the decision provider.
pub const JOURNAL_WINDOW: usize = 15;

/// Compact rendering of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub step: u32,
    pub screen_id: Option<ScreenId>,
    /// Executed actions, e.g. `tap #3; back`.
    pub actions: String,
    pub outcome: String,
    pub rationale: String,
}

impl JournalEntry {
    pub fn from_record(record: &StepRecord) -> Self {
        let executed = &record.actions[..record.results.len().min(record.actions.len())];
        let actions = if executed.is_empty() {
            "-".to_string()
        } else {
            executed
                .iter()
                .map(|a| a.compact())
                .collect::<Vec<_>>()
                .join("; ")
        };

        let rationale = record
            .reasoning
            .clone()
            .or_else(|| {
                record
                    .actions
                    .iter()
                    .map(|a| a.rationale.trim())
                    .find(|r| !r.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_default();

        Self {
            step: record.step,
            screen_id: record.source_screen_id,
            actions,
            outcome: outcome(record),
            rationale,
        }
    }
}

impl fmt::Display for JournalEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let screen = self
            .screen_id
            .map(|id| format!("screen {}", id))
            .unwrap_or_else(|| "screen ?".to_string());
        write!(f, "step {} [{}] {} => {}", self.step, screen, self.actions, self.outcome)?;
        if !self.rationale.is_empty() {
            write!(f, " ({})", self.rationale)?;
        }
        Ok(())
    }
}

fn outcome(record: &StepRecord) -> String {
    match &record.error {
        Some(StepError::ActionFailed { index, error }) => {
            format!("failed at action {}/{}: {}", index + 1, record.actions.len(), error)
        }
        Some(other) => other.to_string(),
        None if record.results.is_empty() => "no actions".to_string(),
        None => {
            let navigated = if record.terminal_navigated() {
                ", navigated"
            } else {
                ""
            };
            format!("ok {}/{}{}", record.results.len(), record.actions.len(), navigated)
        }
    }
}

/// Journal entries for the most recent [`JOURNAL_WINDOW`] records, oldest first.
pub fn journal_window(records: &[StepRecord]) -> Vec<JournalEntry> {
    let start = records.len().saturating_sub(JOURNAL_WINDOW);
    records[start..].iter().map(JournalEntry::from_record).collect()
}
