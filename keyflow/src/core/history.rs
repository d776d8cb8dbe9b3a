//! Bounded log of navigation destinations.
//!
//! History is observational: every successful move (forward, back,
//! cross-document) is appended, and nothing here is consulted for back
//! navigation.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::link::Location;

/// Maximum number of retained history entries.
pub const HISTORY_CAP: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub location: Location,
    pub context: String,
    pub ts: DateTime<Utc>,
}

/// FIFO of navigation entries capped at [`HISTORY_CAP`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<HistoryEntry>", into = "Vec<HistoryEntry>")]
pub struct History {
    entries: VecDeque<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, location: Location, context: impl Into<String>) {
        self.record_at(location, context, Utc::now());
    }

    pub fn record_at(&mut self, location: Location, context: impl Into<String>, ts: DateTime<Utc>) {
        self.entries.push_back(HistoryEntry {
            location,
            context: context.into(),
            ts,
        });
        while self.entries.len() > HISTORY_CAP {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }
}

impl From<Vec<HistoryEntry>> for History {
    fn from(entries: Vec<HistoryEntry>) -> Self {
        let skip = entries.len().saturating_sub(HISTORY_CAP);
        Self {
            entries: entries.into_iter().skip(skip).collect(),
        }
    }
}

impl From<History> for Vec<HistoryEntry> {
    fn from(history: History) -> Self {
        history.entries.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn loc(n: usize) -> Location {
        Location::new("/doc", format!("B{n}"))
    }

    #[test]
    fn evicts_oldest_entries_first() {
        let mut history = History::new();
        for n in 0..60 {
            history.record(loc(n), "link");
        }
        assert_eq!(history.len(), HISTORY_CAP);
        let first = history.iter().next().expect("first entry");
        assert_eq!(first.location, loc(10));
        assert_eq!(history.last().expect("last").location, loc(59));
    }

    #[test]
    fn records_duplicates() {
        let mut history = History::new();
        history.record(loc(1), "link");
        history.record(loc(1), "back");
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn deserializing_an_oversized_log_keeps_the_newest() {
        let entries: Vec<HistoryEntry> = (0..70)
            .map(|n| HistoryEntry {
                location: loc(n),
                context: "jump".to_string(),
                ts: Utc::now(),
            })
            .collect();
        let json = serde_json::to_string(&entries).expect("serialize");
        let history: History = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(history.len(), HISTORY_CAP);
        assert_eq!(history.iter().next().expect("first").location, loc(20));
    }

    proptest! {
        #[test]
        fn never_exceeds_cap(count in 0usize..200) {
            let mut history = History::new();
            for n in 0..count {
                history.record(loc(n), "link");
                prop_assert!(history.len() <= HISTORY_CAP);
            }
            prop_assert_eq!(history.len(), count.min(HISTORY_CAP));
            if count > 0 {
                prop_assert_eq!(&history.last().expect("last").location, &loc(count - 1));
            }
        }
    }
}
