//! Dispatch engine.
//!
//! Turns one inbound [`Interaction`] into at most one handler invocation.
//! Every failure below this point is caught here and turned into a reply:
//! rejections (authorization, binding) go back ephemerally to the caller,
//! handler errors and panics are logged and reported to the channel as a
//! bounded diagnostic embed. Nothing propagates back to the intake loop.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use sigil_core::{
    Caller, ChannelId, CommandDataOption, DispatchError, Embed, Interaction, InteractionKind,
    MessageId, Reply, Responder, WorkspaceId,
};
use tokio::task::JoinHandle;

use crate::binder::{bind_options, parse_action_tokens};
use crate::gate::AuthorizationGate;
use crate::guard::ResourceGuard;
use crate::handler::{ActionContext, CommandContext};
use crate::registry::{ACTION_DELIMITER, ActionDescriptor, CommandDescriptor, Registry};
use crate::resolver;

/// Upper bound on the diagnostic text sent back after a handler failure.
pub const DIAGNOSTIC_LIMIT: usize = 4096;

const DIAGNOSTIC_COLOR: u32 = 0xE7_4C_3C;

/// Where an interaction is in its lifecycle. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Resolved,
    Authorized,
    Bound,
    Executing,
    Completed,
    Failed,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Outcome of one dispatch call.
#[derive(Debug)]
pub enum Dispatched {
    /// Nothing is registered under the requested name.
    Ignored,
    /// Refused before the handler ran; the caller got an ephemeral reply.
    Rejected(String),
    Completed,
    /// The handler failed; a diagnostic was posted.
    Failed(String),
    /// An action was handed to a background task.
    Spawned(JoinHandle<Dispatched>),
}

impl Dispatched {
    /// Wait for a spawned action; other outcomes are returned as is.
    pub async fn settle(self) -> Dispatched {
        match self {
            Dispatched::Spawned(handle) => match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Dispatched::Failed(format!("action task aborted: {e}")),
            },
            other => other,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Dispatched::Completed)
    }
}

/// A command invocation synthesized by the scheduler.
#[derive(Debug, Clone)]
pub struct ScheduledInvocation {
    pub workspace_id: WorkspaceId,
    pub channel_id: ChannelId,
    /// The user who created the schedule entry.
    pub caller: Caller,
    /// Top-level command name.
    pub command: String,
    pub options: Vec<CommandDataOption>,
    pub display_timestamp: Option<DateTime<Utc>>,
}

/// Routes interactions through registry lookup, the authorization gate,
/// subcommand resolution and option binding into handlers.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    gate: AuthorizationGate,
    guard: Arc<ResourceGuard>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, gate: AuthorizationGate) -> Self {
        Self {
            registry,
            gate,
            guard: Arc::new(ResourceGuard::new()),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn guard(&self) -> &Arc<ResourceGuard> {
        &self.guard
    }

    /// Handle one inbound interaction.
    ///
    /// Commands run to completion before this returns. Actions are spawned and
    /// come back as [`Dispatched::Spawned`].
    pub async fn dispatch(&self, interaction: Interaction, responder: Arc<dyn Responder>) -> Dispatched {
        let Interaction {
            workspace_id,
            channel_id,
            caller,
            kind,
        } = interaction;

        match kind {
            InteractionKind::Command { name, options } => {
                let options = options.unwrap_or_default();
                tracing::debug!("{} command '{name}' from {}", Stage::Received, caller.id);
                let Some(root) = self.registry.command(&name) else {
                    tracing::debug!("Ignoring unknown command '{name}'");
                    return Dispatched::Ignored;
                };
                if let Err(e) = self.gate.check_command(workspace_id, &caller, &root.name) {
                    return reject(&responder, e).await;
                }
                tracing::debug!("{} {}", Stage::Authorized, root.name);
                let ctx = CommandContext::new(workspace_id, channel_id, caller, root.path.clone(), responder);
                self.execute(root, &options, ctx).await
            }
            InteractionKind::Action {
                custom_id,
                resource_id,
            } => {
                tracing::debug!("{} action '{custom_id}' from {}", Stage::Received, caller.id);
                self.dispatch_action(workspace_id, channel_id, caller, custom_id, resource_id, responder)
                    .await
            }
        }
    }

    /// Run a scheduler-synthesized command. The schedule request was already
    /// authorized, so the gate is skipped.
    pub async fn dispatch_scheduled(
        &self,
        invocation: ScheduledInvocation,
        responder: Arc<dyn Responder>,
    ) -> Dispatched {
        let Some(root) = self.registry.command(&invocation.command) else {
            tracing::warn!(
                "⚠️ Scheduled command '{}' is no longer registered",
                invocation.command
            );
            return Dispatched::Ignored;
        };
        let mut ctx = CommandContext::new(
            invocation.workspace_id,
            invocation.channel_id,
            invocation.caller,
            root.path.clone(),
            responder,
        );
        ctx.scheduled = true;
        ctx.display_timestamp = invocation.display_timestamp;
        self.execute(root, &invocation.options, ctx).await
    }

    async fn execute(
        &self,
        root: &CommandDescriptor,
        options: &[CommandDataOption],
        mut ctx: CommandContext,
    ) -> Dispatched {
        let (descriptor, remaining) = resolver::resolve(&self.registry, root, options);
        ctx.command = descriptor.path.clone();
        tracing::debug!("{} {}", Stage::Resolved, ctx.command);

        let args = render_options(options);
        let mut handler = match std::panic::catch_unwind(AssertUnwindSafe(|| descriptor.instantiate())) {
            Ok(handler) => handler,
            Err(panic) => {
                let outcome = Outcome::Failed(panic_message(panic.as_ref()));
                return finish(outcome, ctx.responder(), &ctx.caller, &ctx.command, &args).await;
            }
        };
        let unregistered_sub = remaining.len() == 1 && remaining[0].is_sub_command();

        let result = if unregistered_sub {
            if descriptor.dynamic_subcommands {
                tracing::debug!("{} {} (dynamic subcommand)", Stage::Executing, ctx.command);
                AssertUnwindSafe(handler.handle_subcommand(&ctx, remaining))
                    .catch_unwind()
                    .await
            } else {
                Ok(Err(DispatchError::UnhandledSubcommand {
                    parent: descriptor.path.clone(),
                    name: remaining[0].name.clone(),
                }
                .into()))
            }
        } else {
            let bound = std::panic::catch_unwind(AssertUnwindSafe(|| {
                bind_options(descriptor, remaining).and_then(|b| handler.bind(&b))
            }));
            match bound {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return reject(ctx.responder(), e).await,
                Err(panic) => {
                    let outcome = Outcome::Failed(panic_message(panic.as_ref()));
                    return finish(outcome, ctx.responder(), &ctx.caller, &ctx.command, &args).await;
                }
            }
            tracing::debug!("{} {}", Stage::Bound, ctx.command);
            tracing::debug!("{} {}", Stage::Executing, ctx.command);
            AssertUnwindSafe(handler.handle(&ctx)).catch_unwind().await
        };

        finish(classify(result), ctx.responder(), &ctx.caller, &ctx.command, &args).await
    }

    async fn dispatch_action(
        &self,
        workspace_id: WorkspaceId,
        channel_id: ChannelId,
        caller: Caller,
        custom_id: String,
        resource_id: MessageId,
        responder: Arc<dyn Responder>,
    ) -> Dispatched {
        let name = custom_id.split(ACTION_DELIMITER).next().unwrap_or_default();
        let Some(action) = self.registry.action(name).cloned() else {
            tracing::debug!("Ignoring unknown action '{name}'");
            return Dispatched::Ignored;
        };
        if let Err(e) = self
            .gate
            .check_action(workspace_id, &caller, &action.owner_root, &action.name)
        {
            return reject(&responder, e).await;
        }
        tracing::debug!("{} {}", Stage::Authorized, action.name);

        let ctx = ActionContext::new(
            workspace_id,
            channel_id,
            caller,
            action.name.clone(),
            action.owner.clone(),
            resource_id,
            responder,
        );
        let guard = Arc::clone(&self.guard);
        Dispatched::Spawned(tokio::spawn(run_action(action, custom_id, ctx, guard)))
    }
}

async fn run_action(
    action: Arc<ActionDescriptor>,
    custom_id: String,
    ctx: ActionContext,
    guard: Arc<ResourceGuard>,
) -> Dispatched {
    let mut handler = match std::panic::catch_unwind(AssertUnwindSafe(|| action.instantiate())) {
        Ok(handler) => handler,
        Err(panic) => {
            let outcome = Outcome::Failed(panic_message(panic.as_ref()));
            return finish(outcome, ctx.responder(), &ctx.caller, &action.name, &custom_id).await;
        }
    };

    let prepared = parse_action_tokens(&action, &custom_id).and_then(|args| handler.bind(&args));
    if let Err(e) = prepared {
        let outcome = Outcome::Failed(format!("{e:?}"));
        return finish(outcome, ctx.responder(), &ctx.caller, &action.name, &custom_id).await;
    }
    tracing::debug!("{} {}", Stage::Bound, action.name);

    let _held = guard.acquire(ctx.resource_id).await;
    tracing::debug!("{} {} on {}", Stage::Executing, action.name, ctx.resource_id);
    let result = AssertUnwindSafe(handler.handle(&ctx)).catch_unwind().await;
    finish(classify(result), ctx.responder(), &ctx.caller, &action.name, &custom_id).await
}

enum Outcome {
    Completed,
    Invalid(String),
    Failed(String),
}

fn classify(result: std::thread::Result<anyhow::Result<()>>) -> Outcome {
    match result {
        Ok(Ok(())) => Outcome::Completed,
        Ok(Err(err)) => match err.downcast_ref::<DispatchError>() {
            Some(DispatchError::InvalidArgument(msg)) => Outcome::Invalid(msg.clone()),
            _ => Outcome::Failed(format!("{err:?}")),
        },
        Err(panic) => Outcome::Failed(panic_message(panic.as_ref())),
    }
}

async fn finish(
    outcome: Outcome,
    responder: &Arc<dyn Responder>,
    caller: &Caller,
    subject: &str,
    args: &str,
) -> Dispatched {
    match outcome {
        Outcome::Completed => {
            tracing::debug!("{} {subject}", Stage::Completed);
            Dispatched::Completed
        }
        Outcome::Invalid(msg) => {
            let text = format!("Invalid Command Argument: {msg}");
            if let Err(e) = responder.respond(Reply::text(&text).ephemeral()).await {
                tracing::warn!("Failed to send argument error for {subject}: {e}");
            }
            Dispatched::Rejected(text)
        }
        Outcome::Failed(detail) => {
            tracing::error!(
                caller = %caller.name,
                caller_id = caller.id,
                args = %args,
                "❌ {} {subject}: {detail}",
                Stage::Failed
            );
            let embed = Embed::new("Something went wrong")
                .description(bounded(&detail, DIAGNOSTIC_LIMIT))
                .author(caller.name.clone())
                .color(DIAGNOSTIC_COLOR)
                .field("Command", subject, true)
                .field("Arguments", if args.is_empty() { "-" } else { args }, true);
            if let Err(e) = responder.respond(Reply::embed(embed)).await {
                tracing::warn!("Failed to send diagnostic for {subject}: {e}");
            }
            Dispatched::Failed(detail)
        }
    }
}

async fn reject(responder: &Arc<dyn Responder>, err: DispatchError) -> Dispatched {
    let msg = err.to_string();
    tracing::debug!("Rejected: {msg}");
    if let Err(e) = responder.respond(Reply::text(&msg).ephemeral()).await {
        tracing::warn!("Failed to send rejection: {e}");
    }
    Dispatched::Rejected(msg)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("handler panicked: {s}")
    } else {
        "handler panicked".to_string()
    }
}

/// Truncate to at most `max` characters, marking the cut with `...`.
fn bounded(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

/// Render an option tree as `name:value sub name:value` for logs.
pub fn render_options(options: &[CommandDataOption]) -> String {
    let mut parts = Vec::new();
    render_into(options, &mut parts);
    parts.join(" ")
}

fn render_into(options: &[CommandDataOption], parts: &mut Vec<String>) {
    for option in options {
        match option.value.nested() {
            Some(nested) => {
                parts.push(option.name.clone());
                render_into(nested, parts);
            }
            None => parts.push(format!("{}:{}", option.name, option.value)),
        }
    }
}
