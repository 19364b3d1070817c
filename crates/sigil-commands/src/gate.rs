//! Authorization gate: per-workspace role checks for commands and actions.
//!
//! Roles are read from a [`RoleSource`] on every check, so edits to the access
//! document take effect without a restart. A command or action with no
//! configured roles (or an empty list) is open to everyone.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use sigil_core::{AccessConfig, Caller, DispatchError, RoleId, SigilError, WorkspaceId};

/// Supplies the current role configuration.
pub trait RoleSource: Send + Sync {
    fn load(&self) -> sigil_core::Result<AccessConfig>;
}

/// Reads the access document from disk on every call.
pub struct FileRoleSource {
    path: PathBuf,
}

impl FileRoleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RoleSource for FileRoleSource {
    fn load(&self) -> sigil_core::Result<AccessConfig> {
        if !self.path.exists() {
            return Ok(AccessConfig::default());
        }
        AccessConfig::load_from(&self.path)
    }
}

/// In-memory role configuration, replaceable at runtime.
#[derive(Default)]
pub struct StaticRoleSource {
    config: RwLock<AccessConfig>,
}

impl StaticRoleSource {
    pub fn new(config: AccessConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    pub fn replace(&self, config: AccessConfig) {
        match self.config.write() {
            Ok(mut guard) => *guard = config,
            Err(poisoned) => *poisoned.into_inner() = config,
        }
    }
}

impl RoleSource for StaticRoleSource {
    fn load(&self) -> sigil_core::Result<AccessConfig> {
        self.config
            .read()
            .map(|c| c.clone())
            .map_err(|_| SigilError::Config("role configuration lock poisoned".into()))
    }
}

/// Role checks in front of the dispatcher.
#[derive(Clone)]
pub struct AuthorizationGate {
    source: Arc<dyn RoleSource>,
}

impl AuthorizationGate {
    pub fn new(source: Arc<dyn RoleSource>) -> Self {
        Self { source }
    }

    /// A gate that lets everything through.
    pub fn open() -> Self {
        Self::new(Arc::new(StaticRoleSource::default()))
    }

    fn config(&self) -> Result<AccessConfig, DispatchError> {
        self.source.load().map_err(|e| {
            tracing::error!("❌ Role configuration unavailable: {e}");
            DispatchError::AccessUnavailable(e.to_string())
        })
    }

    /// Check the roles configured for top-level command `command`.
    pub fn check_command(
        &self,
        workspace: WorkspaceId,
        caller: &Caller,
        command: &str,
    ) -> Result<(), DispatchError> {
        let config = self.config()?;
        check(caller, config.command_roles(workspace, command), "this command")
    }

    /// Check the roles configured for `action` under its owner's top-level
    /// command `owner_root`.
    pub fn check_action(
        &self,
        workspace: WorkspaceId,
        caller: &Caller,
        owner_root: &str,
        action: &str,
    ) -> Result<(), DispatchError> {
        let config = self.config()?;
        check(
            caller,
            config.action_roles(workspace, owner_root, action),
            "this button",
        )
    }
}

fn check(caller: &Caller, required: Option<&[RoleId]>, subject: &str) -> Result<(), DispatchError> {
    match required {
        Some(roles) if !roles.is_empty() && !caller.has_any_role(roles) => {
            tracing::info!("🚫 {} ({}) denied {subject}", caller.name, caller.id);
            Err(DispatchError::Unauthorized {
                subject: subject.to_string(),
                required: roles.to_vec(),
            })
        }
        _ => Ok(()),
    }
}
