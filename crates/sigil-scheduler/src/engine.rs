//! Scheduler engine: owns the schedule table, one timer per entry, and the
//! fire sequence that turns an entry into a dispatched command.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sigil_commands::{Dispatcher, ScheduledInvocation};
use sigil_core::{
    Caller, ChannelId, CommandDataOption, EditFn, MessageId, Platform, Reply, Responder,
    SigilError, WorkspaceId,
};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::entry::ScheduleEntry;
use crate::store::{ScheduleStore, ScheduleTable};
use crate::timing;

/// Parameters for a new recurring entry.
#[derive(Debug, Clone)]
pub struct RecurringRequest {
    pub workspace_id: WorkspaceId,
    pub channel_id: ChannelId,
    pub scheduled_by: Caller,
    pub command: String,
    pub args: Vec<CommandDataOption>,
    pub start: DateTime<Utc>,
    pub frequency: std::time::Duration,
    pub delete_previous: bool,
    pub display_timestamp: Option<DateTime<Utc>>,
}

/// Persistent recurring scheduler.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

/// A running timer, tagged so an exiting task only forgets its own handle.
struct Timer {
    generation: u64,
    handle: JoinHandle<()>,
}

// Lock order: `table` before `timers`.
struct Inner {
    table: Mutex<ScheduleTable>,
    timers: Mutex<HashMap<String, Timer>>,
    generation: AtomicU64,
    store: ScheduleStore,
    dispatcher: Dispatcher,
    platform: Arc<dyn Platform>,
}

impl Scheduler {
    pub fn new(store: ScheduleStore, dispatcher: Dispatcher, platform: Arc<dyn Platform>) -> Self {
        Self {
            inner: Arc::new(Inner {
                table: Mutex::new(ScheduleTable::new()),
                timers: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                store,
                dispatcher,
                platform,
            }),
        }
    }

    /// Load persisted entries and start timers for every workspace the
    /// platform can still reach. Returns the number of timers started.
    pub async fn start(&self) -> usize {
        let loaded = self.inner.store.load();
        let mut table = self.inner.table.lock().await;
        *table = loaded;

        let mut started = 0;
        for (workspace, entries) in table.iter() {
            if !self.inner.platform.workspace_available(*workspace) {
                tracing::info!(
                    "⏭️ Skipping {} scheduled entries for unavailable workspace {workspace}",
                    entries.len()
                );
                continue;
            }
            for entry in entries {
                if entry.frequency_secs == 0 || entry.frequency_delta().is_none() {
                    tracing::warn!("⚠️ Scheduled entry {} has no usable frequency, not starting", entry.id);
                    continue;
                }
                start_timer(&self.inner, entry).await;
                started += 1;
            }
        }
        tracing::info!("⏰ Scheduler started {started} timers");
        started
    }

    /// Validate and persist a new entry, then start its timer.
    pub async fn add_recurring(&self, request: RecurringRequest) -> sigil_core::Result<String> {
        let registry = self.inner.dispatcher.registry();
        let Some(descriptor) = registry.command(&request.command) else {
            return Err(SigilError::Scheduler(format!(
                "Unknown command '{}'",
                request.command
            )));
        };
        if !descriptor.schedulable {
            return Err(SigilError::Scheduler(format!(
                "Command '{}' cannot be scheduled",
                request.command
            )));
        }
        let frequency_secs = request.frequency.as_secs();
        if frequency_secs == 0 {
            return Err(SigilError::Scheduler(
                "Frequency must be at least one second".into(),
            ));
        }

        let entry = ScheduleEntry {
            id: uuid::Uuid::new_v4().to_string(),
            workspace_id: request.workspace_id,
            start: request.start,
            frequency_secs,
            delete_previous: request.delete_previous,
            scheduled_by: request.scheduled_by,
            channel_id: request.channel_id,
            command: request.command,
            args: request.args,
            display_timestamp: request.display_timestamp,
            last_run: None,
            previous_output: None,
        };
        if entry.frequency_delta().is_none() {
            return Err(SigilError::Scheduler("Frequency is too large".into()));
        }

        // Timer is registered before the table lock drops.
        let mut table = self.inner.table.lock().await;
        table.entry(entry.workspace_id).or_default().push(entry.clone());
        self.inner.persist(&table);
        tracing::info!(
            "📅 Scheduled '{}' every {}s in workspace {} ({})",
            entry.command,
            entry.frequency_secs,
            entry.workspace_id,
            entry.id
        );
        start_timer(&self.inner, &entry).await;
        Ok(entry.id)
    }

    /// Cancel and delete an entry. Returns false if it does not exist.
    pub async fn remove(&self, workspace: WorkspaceId, id: &str) -> bool {
        let mut table = self.inner.table.lock().await;
        let Some(entries) = table.get_mut(&workspace) else {
            return false;
        };
        let Some(pos) = entries.iter().position(|e| e.id == id) else {
            return false;
        };
        let removed = entries.remove(pos);
        if entries.is_empty() {
            table.remove(&workspace);
        }
        self.inner.persist(&table);

        if let Some(timer) = self.inner.timers.lock().await.remove(id) {
            timer.handle.abort();
        }
        drop(table);
        tracing::info!("🗑️ Removed scheduled '{}' ({id})", removed.command);
        true
    }

    /// Entries of one workspace, in insertion order.
    pub async fn entries(&self, workspace: WorkspaceId) -> Vec<ScheduleEntry> {
        self.inner
            .table
            .lock()
            .await
            .get(&workspace)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn running_timers(&self) -> usize {
        self.inner.timers.lock().await.len()
    }

    /// Abort every timer. Entries stay persisted.
    pub async fn shutdown(&self) {
        let mut timers = self.inner.timers.lock().await;
        for (_, timer) in timers.drain() {
            timer.handle.abort();
        }
        tracing::info!("⏹️ Scheduler stopped");
    }
}

impl Inner {
    async fn forget_timer(&self, id: &str, generation: u64) {
        let mut timers = self.timers.lock().await;
        if timers.get(id).is_some_and(|t| t.generation == generation) {
            timers.remove(id);
        }
    }

    fn persist(&self, table: &ScheduleTable) {
        if let Err(e) = self.store.save(table) {
            tracing::error!("❌ Failed to save schedule: {e}");
        }
    }

    /// Run one fire of `id`. Returns false when the entry no longer exists.
    async fn fire(&self, workspace: WorkspaceId, id: &str) -> bool {
        let now = Utc::now();
        let (entry, previous) = {
            let mut table = self.table.lock().await;
            let Some(entry) = find_mut(&mut table, workspace, id) else {
                return false;
            };
            let previous = entry.previous_output.take();
            entry.last_run = Some(now);
            (entry.clone(), previous)
        };
        tracing::debug!("🔔 Scheduled '{}' fired ({id})", entry.command);

        if let Some(message) = previous.filter(|_| entry.delete_previous) {
            if let Err(e) = self.platform.delete_message(entry.channel_id, message).await {
                tracing::warn!("⚠️ Failed to delete previous output {message}: {e}");
            }
        }

        let responder = Arc::new(ScheduledResponder::new(
            Arc::clone(&self.platform),
            entry.channel_id,
        ));
        let invocation = ScheduledInvocation {
            workspace_id: entry.workspace_id,
            channel_id: entry.channel_id,
            caller: entry.scheduled_by.clone(),
            command: entry.command.clone(),
            options: entry.args.clone(),
            display_timestamp: entry.display_at(now),
        };
        let outcome = self
            .dispatcher
            .dispatch_scheduled(invocation, responder.clone())
            .await;
        tracing::debug!("Scheduled '{}' finished: {outcome:?}", entry.command);

        let mut table = self.table.lock().await;
        match find_mut(&mut table, workspace, id) {
            Some(current) => {
                current.previous_output = responder.last_message().await;
                self.persist(&table);
                true
            }
            None => false,
        }
    }
}

fn find_mut<'a>(table: &'a mut ScheduleTable, workspace: WorkspaceId, id: &str) -> Option<&'a mut ScheduleEntry> {
    table.get_mut(&workspace)?.iter_mut().find(|e| e.id == id)
}

/// Spawn the timer for `entry` and register it. Callers hold the table lock.
async fn start_timer(inner: &Arc<Inner>, entry: &ScheduleEntry) {
    let delay = timing::time_until_next_fire(entry, Utc::now());
    let period = entry.frequency();
    let first = Instant::now()
        .checked_add(delay)
        .unwrap_or_else(|| Instant::now() + period);
    let weak: Weak<Inner> = Arc::downgrade(inner);
    let workspace = entry.workspace_id;
    let id = entry.id.clone();

    tracing::info!(
        "⏳ Timer for '{}' ({}) first fires in {}s",
        entry.command,
        entry.id,
        delay.as_secs()
    );

    let generation = inner.generation.fetch_add(1, Ordering::Relaxed);
    let mut timers = inner.timers.lock().await;
    let task_id = id.clone();
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(first, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if !inner.fire(workspace, &task_id).await {
                tracing::debug!("Timer for {task_id} stopping, entry is gone");
                inner.forget_timer(&task_id, generation).await;
                return;
            }
        }
    });

    if let Some(previous) = timers.insert(id, Timer { generation, handle }) {
        previous.handle.abort();
    }
}

/// Routes a scheduled command's replies to its channel as new messages and
/// remembers the last one produced.
struct ScheduledResponder {
    platform: Arc<dyn Platform>,
    channel: ChannelId,
    last: Mutex<Option<MessageId>>,
}

impl ScheduledResponder {
    fn new(platform: Arc<dyn Platform>, channel: ChannelId) -> Self {
        Self {
            platform,
            channel,
            last: Mutex::new(None),
        }
    }

    async fn last_message(&self) -> Option<MessageId> {
        *self.last.lock().await
    }
}

#[async_trait]
impl Responder for ScheduledResponder {
    async fn respond(&self, reply: Reply) -> sigil_core::Result<Option<MessageId>> {
        let id = self.platform.send_message(self.channel, reply).await?;
        *self.last.lock().await = Some(id);
        Ok(Some(id))
    }

    async fn defer(&self, _ephemeral: bool) -> sigil_core::Result<()> {
        Ok(())
    }

    async fn update(&self, resource: MessageId, _edit: EditFn) -> sigil_core::Result<()> {
        Err(SigilError::Platform(format!(
            "scheduled invocations cannot edit message {resource}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigil_commands::{
        AuthorizationGate, CommandContext, CommandHandler, CommandSpec, OptionDescriptor, Registry,
    };
    use sigil_core::{OptionType, OptionValue};
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct FakePlatform {
        next_id: AtomicU64,
        unavailable: HashSet<WorkspaceId>,
        sent: StdMutex<Vec<(ChannelId, MessageId, Reply)>>,
        deleted: StdMutex<Vec<MessageId>>,
    }

    impl FakePlatform {
        fn sent(&self) -> Vec<(ChannelId, MessageId, Reply)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Platform for FakePlatform {
        fn workspace_available(&self, workspace: WorkspaceId) -> bool {
            !self.unavailable.contains(&workspace)
        }

        async fn send_message(&self, channel: ChannelId, reply: Reply) -> sigil_core::Result<MessageId> {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 100;
            self.sent.lock().unwrap().push((channel, id, reply));
            Ok(id)
        }

        async fn delete_message(&self, _channel: ChannelId, message: MessageId) -> sigil_core::Result<()> {
            self.deleted.lock().unwrap().push(message);
            Ok(())
        }
    }

    struct Say {
        text: String,
    }

    #[async_trait]
    impl CommandHandler for Say {
        fn bind(&mut self, options: &sigil_commands::BoundOptions) -> Result<(), sigil_core::DispatchError> {
            self.text = options.text("text").unwrap_or_default();
            Ok(())
        }

        async fn handle(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
            assert!(ctx.scheduled);
            ctx.reply(format!("{} by {}", self.text, ctx.caller.name)).await?;
            Ok(())
        }
    }

    fn dispatcher() -> Dispatcher {
        let registry = Registry::builder()
            .command(
                CommandSpec::new("say", "Say something", || {
                    Box::new(Say {
                        text: String::new(),
                    })
                })
                .option(OptionDescriptor::optional("text", "Text", OptionType::Text))
                .schedulable(),
            )
            .command(CommandSpec::new("once", "Not schedulable", || {
                Box::new(Say {
                    text: String::new(),
                })
            }))
            .build()
            .unwrap();
        Dispatcher::new(Arc::new(registry), AuthorizationGate::open())
    }

    fn scratch() -> PathBuf {
        std::env::temp_dir()
            .join(format!("sigil-scheduler-{}", uuid::Uuid::new_v4()))
            .join("events.json")
    }

    fn request(command: &str, start: DateTime<Utc>, secs: u64) -> RecurringRequest {
        RecurringRequest {
            workspace_id: 1,
            channel_id: 2,
            scheduled_by: Caller {
                id: 3,
                name: "alice".into(),
                roles: vec![],
            },
            command: command.into(),
            args: vec![CommandDataOption::new("text", OptionValue::Text("hello".into()))],
            start,
            frequency: Duration::from_secs(secs),
            delete_previous: true,
            display_timestamp: None,
        }
    }

    async fn wait_for(mut check: impl FnMut() -> bool) {
        for _ in 0..100 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    fn cleanup(path: &std::path::Path) {
        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[tokio::test]
    async fn test_add_rejects_invalid_requests() {
        let path = scratch();
        let platform = Arc::new(FakePlatform::default());
        let scheduler = Scheduler::new(ScheduleStore::new(&path), dispatcher(), platform);

        assert!(scheduler.add_recurring(request("missing", Utc::now(), 60)).await.is_err());
        assert!(scheduler.add_recurring(request("once", Utc::now(), 60)).await.is_err());
        assert!(scheduler.add_recurring(request("say", Utc::now(), 0)).await.is_err());
        assert!(scheduler.entries(1).await.is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_add_fires_persists_and_records_output() {
        let path = scratch();
        let platform = Arc::new(FakePlatform::default());
        let scheduler = Scheduler::new(ScheduleStore::new(&path), dispatcher(), platform.clone());

        let start = Utc::now() - chrono::TimeDelta::hours(1);
        let id = scheduler.add_recurring(request("say", start, 3600)).await.unwrap();

        wait_for(|| !platform.sent().is_empty()).await;
        let sent = platform.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].2.text.as_deref(), Some("hello by alice"));

        // previous_output is written back after the handler finishes.
        let mut entry = None;
        for _ in 0..100 {
            let current = scheduler.entries(1).await;
            if current[0].previous_output.is_some() {
                entry = Some(current[0].clone());
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let entry = entry.expect("output recorded");
        assert_eq!(entry.id, id);
        assert_eq!(entry.previous_output, Some(sent[0].1));
        assert!(entry.last_run.is_some());

        let persisted = ScheduleStore::new(&path).load();
        assert_eq!(persisted[&1][0].previous_output, Some(sent[0].1));

        scheduler.shutdown().await;
        cleanup(&path);
    }

    #[tokio::test]
    async fn test_repeat_fire_deletes_previous_output() {
        let path = scratch();
        let platform = Arc::new(FakePlatform::default());
        let scheduler = Scheduler::new(ScheduleStore::new(&path), dispatcher(), platform.clone());

        scheduler
            .add_recurring(request("say", Utc::now() - chrono::TimeDelta::hours(1), 1))
            .await
            .unwrap();

        wait_for(|| platform.sent().len() >= 2).await;
        scheduler.shutdown().await;

        let sent = platform.sent();
        assert!(sent.len() >= 2);
        let deleted = platform.deleted.lock().unwrap().clone();
        assert_eq!(deleted[0], sent[0].1);
        cleanup(&path);
    }

    #[tokio::test]
    async fn test_remove_cancels_and_persists() {
        let path = scratch();
        let platform = Arc::new(FakePlatform::default());
        let scheduler = Scheduler::new(ScheduleStore::new(&path), dispatcher(), platform.clone());

        let future = Utc::now() + chrono::TimeDelta::hours(1);
        let id = scheduler.add_recurring(request("say", future, 60)).await.unwrap();
        assert_eq!(scheduler.running_timers().await, 1);

        assert!(scheduler.remove(1, &id).await);
        assert!(!scheduler.remove(1, &id).await);
        assert_eq!(scheduler.running_timers().await, 0);
        assert!(scheduler.entries(1).await.is_empty());
        assert!(ScheduleStore::new(&path).load().is_empty());
        cleanup(&path);
    }

    fn stored_entry(id: &str, frequency_secs: u64, last_run_ago: chrono::TimeDelta) -> ScheduleEntry {
        let now = Utc::now();
        ScheduleEntry {
            id: id.into(),
            workspace_id: 1,
            start: now - chrono::TimeDelta::days(1),
            frequency_secs,
            delete_previous: false,
            scheduled_by: Caller {
                id: 3,
                name: "alice".into(),
                roles: vec![],
            },
            channel_id: 2,
            command: "say".into(),
            args: vec![],
            display_timestamp: None,
            last_run: Some(now - last_run_ago),
            previous_output: None,
        }
    }

    async fn settle() {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_frequency_entries_not_started() {
        let path = scratch();
        let mut table = ScheduleTable::new();
        table.insert(
            1,
            vec![
                stored_entry("broken", 0, chrono::TimeDelta::hours(2)),
                stored_entry("fine", 3600, chrono::TimeDelta::minutes(10)),
            ],
        );
        ScheduleStore::new(&path).save(&table).unwrap();

        let platform = Arc::new(FakePlatform::default());
        let scheduler = Scheduler::new(ScheduleStore::new(&path), dispatcher(), platform.clone());
        assert_eq!(scheduler.start().await, 1);
        assert_eq!(scheduler.running_timers().await, 1);
        assert!(scheduler.inner.timers.lock().await.contains_key("fine"));
        // Skipped, not dropped.
        assert_eq!(scheduler.entries(1).await.len(), 2);

        settle().await;
        assert!(platform.sent().is_empty());

        scheduler.shutdown().await;
        cleanup(&path);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovered_entry_keeps_cadence_after_catch_up() {
        let path = scratch();
        let mut table = ScheduleTable::new();
        table.insert(1, vec![stored_entry("late", 3600, chrono::TimeDelta::hours(2))]);
        ScheduleStore::new(&path).save(&table).unwrap();

        let platform = Arc::new(FakePlatform::default());
        let scheduler = Scheduler::new(ScheduleStore::new(&path), dispatcher(), platform.clone());
        assert_eq!(scheduler.start().await, 1);

        // Missed slot: one catch-up fire, not one per missed hour.
        settle().await;
        assert_eq!(platform.sent().len(), 1);

        tokio::time::advance(Duration::from_secs(59 * 60)).await;
        settle().await;
        assert_eq!(platform.sent().len(), 1);

        tokio::time::advance(Duration::from_secs(2 * 60)).await;
        settle().await;
        assert_eq!(platform.sent().len(), 2);

        tokio::time::advance(Duration::from_secs(60 * 60)).await;
        settle().await;
        assert_eq!(platform.sent().len(), 3);

        scheduler.shutdown().await;
        cleanup(&path);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_forgets_itself_when_entry_vanishes() {
        let path = scratch();
        let platform = Arc::new(FakePlatform::default());
        let scheduler = Scheduler::new(ScheduleStore::new(&path), dispatcher(), platform.clone());

        let start = Utc::now() + chrono::TimeDelta::minutes(10);
        scheduler.add_recurring(request("say", start, 60)).await.unwrap();
        assert_eq!(scheduler.running_timers().await, 1);

        scheduler.inner.table.lock().await.clear();
        tokio::time::advance(Duration::from_secs(11 * 60)).await;
        settle().await;

        assert_eq!(scheduler.running_timers().await, 0);
        assert!(platform.sent().is_empty());
        cleanup(&path);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_racing_add_leaves_no_timer() {
        let path = scratch();
        let platform = Arc::new(FakePlatform::default());
        let scheduler = Scheduler::new(ScheduleStore::new(&path), dispatcher(), platform.clone());

        let start = Utc::now() + chrono::TimeDelta::minutes(10);
        let remover = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move {
                loop {
                    if let Some(entry) = scheduler.entries(1).await.first() {
                        return scheduler.remove(1, &entry.id).await;
                    }
                    tokio::task::yield_now().await;
                }
            })
        };
        scheduler.add_recurring(request("say", start, 60)).await.unwrap();
        assert!(remover.await.unwrap());

        assert_eq!(scheduler.running_timers().await, 0);
        assert!(scheduler.entries(1).await.is_empty());

        tokio::time::advance(Duration::from_secs(20 * 60)).await;
        settle().await;
        assert!(platform.sent().is_empty());
        cleanup(&path);
    }

    #[tokio::test]
    async fn test_start_restores_only_available_workspaces() {
        let path = scratch();
        let base = ScheduleEntry {
            id: "keep".into(),
            workspace_id: 1,
            start: Utc::now() - chrono::TimeDelta::hours(3),
            frequency_secs: 3600,
            delete_previous: false,
            scheduled_by: Caller {
                id: 3,
                name: "alice".into(),
                roles: vec![],
            },
            channel_id: 2,
            command: "say".into(),
            args: vec![],
            display_timestamp: None,
            last_run: Some(Utc::now() - chrono::TimeDelta::hours(2)),
            previous_output: None,
        };
        let gone = ScheduleEntry {
            id: "gone".into(),
            workspace_id: 9,
            ..base.clone()
        };
        let mut table = ScheduleTable::new();
        table.insert(1, vec![base]);
        table.insert(9, vec![gone]);
        ScheduleStore::new(&path).save(&table).unwrap();

        let platform = Arc::new(FakePlatform {
            unavailable: HashSet::from([9]),
            ..Default::default()
        });
        let scheduler = Scheduler::new(ScheduleStore::new(&path), dispatcher(), platform.clone());
        assert_eq!(scheduler.start().await, 1);

        // Missed its slot while down: fires promptly.
        wait_for(|| !platform.sent().is_empty()).await;
        assert_eq!(platform.sent().len(), 1);
        assert_eq!(platform.sent()[0].0, 2);
        assert_eq!(scheduler.entries(9).await.len(), 1);

        scheduler.shutdown().await;
        cleanup(&path);
    }
}
