//! Error taxonomy.
//!
//! Only [`RegistrationError`] is allowed to escape to `main`. Everything the
//! dispatcher or scheduler produces at runtime is caught at their boundary.

use thiserror::Error;

use crate::types::{OptionType, RoleId};

/// Result alias used across the Sigil crates.
pub type Result<T> = std::result::Result<T, SigilError>;

/// Top-level error.
#[derive(Debug, Error)]
pub enum SigilError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Startup-only failures while building the descriptor registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("Tried to register duplicate command: {0}")]
    DuplicateCommand(String),

    #[error("Tried to register duplicate action: {0}")]
    DuplicateAction(String),

    #[error("Tried to register duplicate subcommand '{name}' under '{parent}'")]
    DuplicateSubcommand { parent: String, name: String },

    #[error("Parent '{parent}' of subcommand '{name}' is not a registered command or subcommand")]
    UnknownParent { name: String, parent: String },

    #[error("Invalid option type {kind} on option '{option}' of '{owner}'")]
    UnsupportedOptionType {
        owner: String,
        option: String,
        kind: OptionType,
    },

    #[error("Option '{option}' declared twice on '{owner}'")]
    DuplicateOption { owner: String, option: String },

    #[error("Command '{command}' lists unregistered action '{action}'")]
    UnknownAction { command: String, action: String },

    #[error("Action '{action}' is claimed by both '{first}' and '{second}'")]
    ActionClaimedTwice {
        action: String,
        first: String,
        second: String,
    },

    #[error("Action name '{0}' must not contain the '_' token delimiter")]
    InvalidActionName(String),

    #[error("The command registry has already been installed")]
    AlreadyInstalled,
}

/// Recoverable failures for a single interaction.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Caller holds none of the configured roles.
    #[error("{}", unauthorized_message(.subject, .required))]
    Unauthorized {
        subject: String,
        required: Vec<RoleId>,
    },

    /// Role configuration could not be read; checks fail closed.
    #[error("Access configuration unavailable: {0}")]
    AccessUnavailable(String),

    #[error("Missing required arguments for command {command}: {}", .missing.join(","))]
    MissingArguments {
        command: String,
        missing: Vec<String>,
    },

    #[error("Option '{option}' expects {expected}, got {got}")]
    OptionType {
        option: String,
        expected: OptionType,
        got: OptionType,
    },

    #[error("Unhandled SubCommand: {name}, Parent: {parent}")]
    UnhandledSubcommand { parent: String, name: String },

    #[error("Action option mismatch. Got {got}, expected {expected}")]
    ActionArity { expected: usize, got: usize },

    #[error("Action option '{option}' could not parse token '{token}'")]
    ActionToken { option: String, token: String },

    /// Raised by a handler to signal bad user input.
    #[error("{0}")]
    InvalidArgument(String),

    /// Anything else a handler body failed with.
    #[error("{0:#}")]
    Handler(anyhow::Error),
}

impl DispatchError {
    /// Shorthand for handler code rejecting user input.
    pub fn invalid(msg: impl Into<String>) -> Self {
        DispatchError::InvalidArgument(msg.into())
    }
}

fn unauthorized_message(subject: &str, required: &[RoleId]) -> String {
    let roles: Vec<String> = required.iter().map(|r| format!("<@&{r}>")).collect();
    format!(
        "You must have one of the following roles to use {subject}: {}.",
        roles.join(", ")
    )
}

/// Schedule store failures. Logged; the in-memory table stays authoritative.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize schedule table: {0}")]
    Serialize(#[from] serde_json::Error),
}
