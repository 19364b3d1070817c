//! Schedule entry: the persisted record of one recurring invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sigil_core::{Caller, ChannelId, CommandDataOption, MessageId, WorkspaceId};

/// A recurring command invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Unique entry ID.
    pub id: String,
    pub workspace_id: WorkspaceId,
    /// First fire time.
    pub start: DateTime<Utc>,
    /// Seconds between fires.
    pub frequency_secs: u64,
    /// Delete the message produced by the previous fire before firing again.
    #[serde(default)]
    pub delete_previous: bool,
    /// The user who scheduled it. Invocations run under this identity.
    pub scheduled_by: Caller,
    pub channel_id: ChannelId,
    /// Top-level command name.
    pub command: String,
    #[serde(default)]
    pub args: Vec<CommandDataOption>,
    /// Timestamp the command should display, relative to `start`.
    #[serde(default)]
    pub display_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
    /// Message produced by the last fire.
    #[serde(default)]
    pub previous_output: Option<MessageId>,
}

impl ScheduleEntry {
    pub fn frequency(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.frequency_secs)
    }

    /// `None` when the frequency does not fit a calendar duration.
    pub(crate) fn frequency_delta(&self) -> Option<chrono::TimeDelta> {
        i64::try_from(self.frequency_secs)
            .ok()
            .and_then(chrono::TimeDelta::try_seconds)
    }

    /// Display timestamp for a fire at `now`: keeps the original distance
    /// between `start` and the requested display time.
    pub fn display_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let display = self.display_timestamp?;
        let offset = (display - self.start).abs();
        Some(now + offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry() -> ScheduleEntry {
        ScheduleEntry {
            id: "e1".into(),
            workspace_id: 1,
            start: Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap(),
            frequency_secs: 3600,
            delete_previous: true,
            scheduled_by: Caller {
                id: 9,
                name: "alice".into(),
                roles: vec![],
            },
            channel_id: 2,
            command: "counter".into(),
            args: vec![],
            display_timestamp: None,
            last_run: None,
            previous_output: None,
        }
    }

    #[test]
    fn test_display_keeps_offset_from_start() {
        let mut e = entry();
        assert_eq!(e.display_at(Utc::now()), None);

        e.display_timestamp = Some(e.start + chrono::TimeDelta::minutes(30));
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        assert_eq!(e.display_at(now), Some(now + chrono::TimeDelta::minutes(30)));

        // Display before start still shifts forward.
        e.display_timestamp = Some(e.start - chrono::TimeDelta::minutes(10));
        assert_eq!(e.display_at(now), Some(now + chrono::TimeDelta::minutes(10)));
    }

    #[test]
    fn test_optional_fields_default_when_absent() {
        let raw = r#"{
            "id": "x",
            "workspace_id": 1,
            "start": "2026-01-01T12:00:00Z",
            "frequency_secs": 60,
            "scheduled_by": {"id": 3},
            "channel_id": 4,
            "command": "ping"
        }"#;
        let e: ScheduleEntry = serde_json::from_str(raw).unwrap();
        assert!(!e.delete_previous);
        assert!(e.args.is_empty());
        assert_eq!(e.last_run, None);
        assert_eq!(e.frequency(), std::time::Duration::from_secs(60));
    }
}
