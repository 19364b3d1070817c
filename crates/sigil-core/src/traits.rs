//! Collaborator traits implemented by the platform client.
//!
//! The core never talks to a chat network directly. Everything it needs to
//! say goes through a [`Responder`] bound to one interaction, or through the
//! [`Platform`] for messages that have no interaction behind them.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChannelId, MessageEdit, MessageId, Reply, WorkspaceId};

/// Mutator applied to an existing message by [`Responder::update`].
pub type EditFn = Box<dyn FnOnce(&mut MessageEdit) + Send>;

/// Reply capability for a single interaction.
///
/// Platforms that must acknowledge within a deadline call `defer` themselves
/// or let handlers do it; `respond` after a `defer` edits the deferred reply.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Send a reply. Returns the id of the produced message when the
    /// platform exposes one (ephemeral replies usually do not).
    async fn respond(&self, reply: Reply) -> Result<Option<MessageId>>;

    /// Acknowledge now, respond later.
    async fn defer(&self, ephemeral: bool) -> Result<()>;

    /// Edit an existing message in place.
    async fn update(&self, resource: MessageId, edit: EditFn) -> Result<()>;
}

/// Workspace-level operations that do not belong to any interaction.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Whether the workspace still exists and is reachable.
    fn workspace_available(&self, workspace: WorkspaceId) -> bool;

    /// Post a new message to a channel.
    async fn send_message(&self, channel: ChannelId, reply: Reply) -> Result<MessageId>;

    /// Delete a message from a channel.
    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> Result<()>;
}
