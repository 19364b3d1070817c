//! Handler traits and the contexts handlers run with.
//!
//! A fresh handler instance is built from its registered factory for every
//! invocation. The dispatcher feeds it typed options through `bind` and then
//! calls `handle`; instances never outlive one interaction.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sigil_core::traits::EditFn;
use sigil_core::{
    Caller, ChannelId, CommandDataOption, DispatchError, MessageEdit, MessageId, Reply, Responder,
    WorkspaceId,
};

use crate::binder::{ActionArgs, BoundOptions};

/// Builds a new command handler instance.
pub type CommandFactory = Arc<dyn Fn() -> Box<dyn CommandHandler> + Send + Sync>;

/// Builds a new action handler instance.
pub type ActionFactory = Arc<dyn Fn() -> Box<dyn ActionHandler> + Send + Sync>;

/// A command or subcommand body.
#[async_trait]
pub trait CommandHandler: Send {
    /// Copy bound option values onto the instance.
    fn bind(&mut self, _options: &BoundOptions) -> Result<(), DispatchError> {
        Ok(())
    }

    /// Run the command.
    async fn handle(&mut self, ctx: &CommandContext) -> anyhow::Result<()>;

    /// Called instead of `bind` + `handle` when the payload names a nested
    /// subcommand that was never registered and the descriptor opted in to
    /// dynamic subcommands. `options` is the raw, unresolved list.
    async fn handle_subcommand(
        &mut self,
        ctx: &CommandContext,
        options: &[CommandDataOption],
    ) -> anyhow::Result<()> {
        let name = options.first().map(|o| o.name.clone()).unwrap_or_default();
        Err(DispatchError::UnhandledSubcommand {
            parent: ctx.command.clone(),
            name,
        }
        .into())
    }
}

/// An action body, triggered from a control element on an existing message.
#[async_trait]
pub trait ActionHandler: Send {
    /// Copy positional arguments decoded from the action id onto the instance.
    fn bind(&mut self, _args: &ActionArgs) -> Result<(), DispatchError> {
        Ok(())
    }

    async fn handle(&mut self, ctx: &ActionContext) -> anyhow::Result<()>;
}

/// Everything a command handler can see about its invocation.
#[derive(Clone)]
pub struct CommandContext {
    pub workspace_id: WorkspaceId,
    pub channel_id: ChannelId,
    pub caller: Caller,
    /// Space-separated path of the resolved command, e.g. `schedule add`.
    pub command: String,
    /// True when the invocation was synthesized by the scheduler.
    pub scheduled: bool,
    /// Timestamp a scheduled command should display instead of "now".
    pub display_timestamp: Option<DateTime<Utc>>,
    responder: Arc<dyn Responder>,
}

impl CommandContext {
    pub fn new(
        workspace_id: WorkspaceId,
        channel_id: ChannelId,
        caller: Caller,
        command: impl Into<String>,
        responder: Arc<dyn Responder>,
    ) -> Self {
        Self {
            workspace_id,
            channel_id,
            caller,
            command: command.into(),
            scheduled: false,
            display_timestamp: None,
            responder,
        }
    }

    pub fn responder(&self) -> &Arc<dyn Responder> {
        &self.responder
    }

    /// Send a reply; returns the produced message id if the platform has one.
    pub async fn respond(&self, reply: Reply) -> sigil_core::Result<Option<MessageId>> {
        self.responder.respond(reply).await
    }

    pub async fn reply(&self, text: impl Into<String> + Send) -> sigil_core::Result<Option<MessageId>> {
        self.responder.respond(Reply::text(text)).await
    }

    pub async fn reply_ephemeral(&self, text: impl Into<String> + Send) -> sigil_core::Result<()> {
        self.responder.respond(Reply::text(text).ephemeral()).await?;
        Ok(())
    }

    pub async fn defer(&self, ephemeral: bool) -> sigil_core::Result<()> {
        self.responder.defer(ephemeral).await
    }
}

/// Everything an action handler can see about its invocation.
#[derive(Clone)]
pub struct ActionContext {
    pub workspace_id: WorkspaceId,
    pub channel_id: ChannelId,
    pub caller: Caller,
    pub action: String,
    /// Path of the command that owns the action.
    pub owner: String,
    /// The message the action was triggered from.
    pub resource_id: MessageId,
    responder: Arc<dyn Responder>,
}

impl ActionContext {
    pub fn new(
        workspace_id: WorkspaceId,
        channel_id: ChannelId,
        caller: Caller,
        action: impl Into<String>,
        owner: impl Into<String>,
        resource_id: MessageId,
        responder: Arc<dyn Responder>,
    ) -> Self {
        Self {
            workspace_id,
            channel_id,
            caller,
            action: action.into(),
            owner: owner.into(),
            resource_id,
            responder,
        }
    }

    pub fn responder(&self) -> &Arc<dyn Responder> {
        &self.responder
    }

    pub async fn respond(&self, reply: Reply) -> sigil_core::Result<Option<MessageId>> {
        self.responder.respond(reply).await
    }

    pub async fn reply_ephemeral(&self, text: impl Into<String> + Send) -> sigil_core::Result<()> {
        self.responder.respond(Reply::text(text).ephemeral()).await?;
        Ok(())
    }

    /// Edit the message the action was triggered from.
    pub async fn update<F>(&self, mutator: F) -> sigil_core::Result<()>
    where
        F: FnOnce(&mut MessageEdit) + Send + 'static,
    {
        let edit: EditFn = Box::new(mutator);
        self.responder.update(self.resource_id, edit).await
    }
}
