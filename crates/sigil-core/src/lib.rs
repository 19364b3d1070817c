//! # Sigil Core
//!
//! Shared vocabulary for the command server: identifiers, inbound interaction
//! payloads, outbound replies, the collaborator traits the platform client
//! implements, the error taxonomy and configuration.
//!
//! ## Architecture
//! ```text
//! Platform client (external)
//!   ├── Interaction { Command | Action } ──▶ sigil-commands::Dispatcher
//!   │                                          ├── AuthorizationGate (RoleSource)
//!   │                                          ├── resolver + binder
//!   │                                          └── ResourceGuard ─▶ handler
//!   ├── Responder  ◀── respond / defer / update
//!   └── Platform   ◀── send / delete (sigil-scheduler timers)
//! ```

pub mod access;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use access::AccessConfig;
pub use error::{DispatchError, PersistenceError, RegistrationError, Result, SigilError};
pub use traits::{EditFn, Platform, Responder};
pub use types::{
    Button, Caller, ChannelId, CommandDataOption, Embed, Interaction, InteractionKind, MessageEdit,
    MessageId, OptionType, OptionValue, Reply, RoleId, UserId, WorkspaceId,
};
