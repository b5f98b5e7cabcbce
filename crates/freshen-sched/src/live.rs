use std::collections::HashMap;

use freshen_policy::{Status, StatusRecord};
use serde::{Deserialize, Serialize};

/// Outcome of a whole batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub done: u64,
    pub skipped: u64,
    pub errors: u64,
    /// Final merged record per path, in first-seen order.
    pub records: Vec<StatusRecord>,
}

impl BatchSummary {
    pub fn is_success(&self) -> bool {
        self.errors == 0
    }

    pub fn total(&self) -> u64 {
        self.done + self.skipped + self.errors
    }
}

/// Per-path merge of the status feed, plus running outcome counters.
#[derive(Debug, Default)]
pub struct LiveView {
    index: HashMap<String, usize>,
    records: Vec<StatusRecord>,
    done: u64,
    skipped: u64,
    errors: u64,
}

impl LiveView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `record` into its path's view and returns the merged view.
    /// Terminal records bump the batch counters, which are stamped on the
    /// returned view as `errors`/`skipped`.
    pub fn apply(&mut self, record: &StatusRecord) -> &StatusRecord {
        let key = record.path.clone().unwrap_or_default();
        let slot = match self.index.get(&key) {
            Some(slot) => *slot,
            None => {
                self.records.push(StatusRecord::new());
                self.index.insert(key, self.records.len() - 1);
                self.records.len() - 1
            }
        };

        match record.status {
            Some(Status::Done) => self.done += 1,
            Some(Status::Skipped) => self.skipped += 1,
            Some(Status::Error) => self.errors += 1,
            None => {}
        }

        let view = &mut self.records[slot];
        view.merge(record);
        if record.is_terminal() {
            view.errors = Some(self.errors);
            view.skipped = Some(self.skipped);
        }
        view
    }

    pub fn get(&self, path: &str) -> Option<&StatusRecord> {
        self.index.get(path).map(|slot| &self.records[*slot])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn summary(self) -> BatchSummary {
        BatchSummary {
            done: self.done,
            skipped: self.skipped,
            errors: self.errors,
            records: self.records,
        }
    }
}
