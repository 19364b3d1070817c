//! # Sigil Commands
//!
//! Declarative command/action registry and the dispatch pipeline.
//!
//! ## Pipeline
//! ```text
//! Interaction
//!   ├── Command ─▶ Registry lookup ─▶ AuthorizationGate ─▶ resolver (deepest subcommand)
//!   │                                 ─▶ binder (typed options) ─▶ handler.handle()
//!   └── Action  ─▶ Registry lookup ─▶ AuthorizationGate ─▶ spawn {
//!                    parse `name_tok1_tok2` ─▶ ResourceGuard(resource) ─▶ handler.handle() }
//! ```
//!
//! Failures inside a handler (errors and panics) are caught at the
//! [`Dispatcher`] boundary, logged, and reported back as a bounded diagnostic.

pub mod binder;
pub mod dispatch;
pub mod gate;
pub mod guard;
pub mod handler;
pub mod registry;
pub mod resolver;

pub use binder::{ActionArg, ActionArgs, BoundOptions};
pub use dispatch::{Dispatched, Dispatcher, ScheduledInvocation, Stage, render_options};
pub use gate::{AuthorizationGate, FileRoleSource, RoleSource, StaticRoleSource};
pub use guard::ResourceGuard;
pub use handler::{ActionContext, ActionHandler, CommandContext, CommandHandler};
pub use registry::{
    ActionDescriptor, ActionParam, ActionParamType, ActionSpec, Choice, CommandDefinition,
    CommandDescriptor, CommandSpec, DefaultPermission, OptionDescriptor, Registry,
    RegistryBuilder, SubcommandSpec,
};
