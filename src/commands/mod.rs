//! Built-in commands.

use std::sync::{Arc, OnceLock};

use sigil_commands::RegistryBuilder;
use sigil_scheduler::Scheduler;

pub mod counter;
pub mod ping;
pub mod schedule;

/// The scheduler is built after the registry; handlers reach it through
/// this slot once `serve` has filled it.
pub type SchedulerSlot = Arc<OnceLock<Scheduler>>;

/// Add every built-in command to `builder`.
pub fn register(builder: RegistryBuilder, scheduler: &SchedulerSlot) -> RegistryBuilder {
    let builder = ping::register(builder);
    let builder = counter::register(builder);
    schedule::register(builder, scheduler)
}
