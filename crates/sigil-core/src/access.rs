//! Role access document: which roles may run which command or action, per
//! workspace.
//!
//! ```toml
//! [workspaces."773757083904114689".commands.host-pvm]
//! roles = [5]
//!
//! [workspaces."773757083904114689".commands.host-pvm.action_roles]
//! pvm-quit-signup = [7, 8]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{Result, SigilError};
use crate::types::{RoleId, WorkspaceId};

/// Root of the access document. Workspace ids are string keys so the file
/// stays valid TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessConfig {
    #[serde(default)]
    pub workspaces: HashMap<String, WorkspaceAccess>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceAccess {
    #[serde(default)]
    pub commands: HashMap<String, CommandAccess>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandAccess {
    #[serde(default)]
    pub roles: Vec<RoleId>,
    #[serde(default)]
    pub action_roles: HashMap<String, Vec<RoleId>>,
}

impl AccessConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SigilError::Config(format!("Failed to read {}: {e}", path.display())))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| SigilError::Config(format!("Failed to parse access config: {e}")))
    }

    fn command(&self, workspace: WorkspaceId, command: &str) -> Option<&CommandAccess> {
        self.workspaces
            .get(&workspace.to_string())?
            .commands
            .get(command)
    }

    /// Roles required for a command; `None` when nothing is configured.
    pub fn command_roles(&self, workspace: WorkspaceId, command: &str) -> Option<&[RoleId]> {
        self.command(workspace, command).map(|c| c.roles.as_slice())
    }

    /// Roles required for an action owned by `command`.
    pub fn action_roles(
        &self,
        workspace: WorkspaceId,
        command: &str,
        action: &str,
    ) -> Option<&[RoleId]> {
        self.command(workspace, command)?
            .action_roles
            .get(action)
            .map(|r| r.as_slice())
    }

    /// Set the roles for a command, creating the workspace entry as needed.
    pub fn set_command_roles(&mut self, workspace: WorkspaceId, command: &str, roles: Vec<RoleId>) {
        self.workspaces
            .entry(workspace.to_string())
            .or_default()
            .commands
            .entry(command.to_string())
            .or_default()
            .roles = roles;
    }

    /// Set the roles for an action owned by `command`.
    pub fn set_action_roles(
        &mut self,
        workspace: WorkspaceId,
        command: &str,
        action: &str,
        roles: Vec<RoleId>,
    ) {
        self.workspaces
            .entry(workspace.to_string())
            .or_default()
            .commands
            .entry(command.to_string())
            .or_default()
            .action_roles
            .insert(action.to_string(), roles);
    }
}
