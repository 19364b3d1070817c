//! # Sigil Scheduler
//!
//! Recurring command invocations that survive restarts.
//!
//! ## Architecture
//! ```text
//! Scheduler
//!   ├── ScheduleTable (tokio Mutex) ──save──▶ ScheduleStore (pretty JSON, whole-file overwrite)
//!   └── one tokio timer per entry
//!         └── fire ─▶ delete previous output? ─▶ Dispatcher::dispatch_scheduled
//!                     ─▶ record produced message id ─▶ save
//! ```
//!
//! Next-fire times are computed from the persisted `start`, `frequency` and
//! `last_run`, so an entry that missed its slot while the process was down
//! fires once promptly on restart instead of drifting.

pub mod engine;
pub mod entry;
pub mod store;
pub mod timing;

pub use engine::{RecurringRequest, Scheduler};
pub use entry::ScheduleEntry;
pub use store::{ScheduleStore, ScheduleTable};
pub use timing::{next_fire_at, time_until_next_fire};
