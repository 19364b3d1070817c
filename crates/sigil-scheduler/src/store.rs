//! File-based schedule store.
//! The whole table is written as one pretty-printed JSON document keyed by
//! workspace id. Callers serialize writes; `Scheduler` saves while holding its
//! table lock.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use sigil_core::{PersistenceError, WorkspaceId};

use crate::entry::ScheduleEntry;

/// Every persisted entry, grouped by workspace.
pub type ScheduleTable = BTreeMap<WorkspaceId, Vec<ScheduleEntry>>;

pub struct ScheduleStore {
    path: PathBuf,
}

impl ScheduleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the file with `table`.
    pub fn save(&self, table: &ScheduleTable) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(table)?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| self.io_error(source))?;
        }
        std::fs::write(&self.path, json).map_err(|source| self.io_error(source))?;
        let count: usize = table.values().map(Vec::len).sum();
        tracing::debug!("💾 Saved {count} scheduled entries to {}", self.path.display());
        Ok(())
    }

    /// Load the table. Missing or unreadable files yield an empty table.
    pub fn load(&self) -> ScheduleTable {
        if !self.path.exists() {
            return ScheduleTable::new();
        }
        match std::fs::read_to_string(&self.path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!("⚠️ Failed to parse {}: {e}", self.path.display());
                ScheduleTable::new()
            }),
            Err(e) => {
                tracing::warn!("⚠️ Failed to read {}: {e}", self.path.display());
                ScheduleTable::new()
            }
        }
    }

    fn io_error(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sigil_core::{Caller, CommandDataOption, OptionValue};

    fn scratch() -> PathBuf {
        std::env::temp_dir().join(format!("sigil-store-{}", uuid::Uuid::new_v4()))
    }

    fn entry(workspace: WorkspaceId, n: i64) -> ScheduleEntry {
        ScheduleEntry {
            id: uuid::Uuid::new_v4().to_string(),
            workspace_id: workspace,
            start: Utc::now(),
            frequency_secs: 60 * (n as u64 + 1),
            delete_previous: n % 2 == 0,
            scheduled_by: Caller {
                id: 7,
                name: "alice".into(),
                roles: vec![1, 2],
            },
            channel_id: 3,
            command: "counter".into(),
            args: vec![CommandDataOption::new("start", OptionValue::Integer(n))],
            display_timestamp: None,
            last_run: (n > 0).then(Utc::now),
            previous_output: (n > 1).then_some(n as u64),
        }
    }

    #[test]
    fn test_round_trip() {
        let dir = scratch();
        let store = ScheduleStore::new(dir.join("nested").join("events.json"));

        let mut table = ScheduleTable::new();
        table.insert(1, (0..3).map(|n| entry(1, n)).collect());
        table.insert(2, vec![entry(2, 5)]);
        store.save(&table).unwrap();

        let loaded = store.load();
        assert_eq!(loaded, table);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let store = ScheduleStore::new(scratch().join("absent.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let dir = scratch();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("events.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(ScheduleStore::new(&path).load().is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_file_is_pretty_printed_by_workspace() {
        let dir = scratch();
        let store = ScheduleStore::new(dir.join("events.json"));
        let mut table = ScheduleTable::new();
        table.insert(42, vec![entry(42, 0)]);
        store.save(&table).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["42"][0]["command"], "counter");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
