//! `schedule add|list|remove`: manage recurring command invocations.

use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use sigil_commands::{
    BoundOptions, Choice, CommandContext, CommandDescriptor, CommandHandler, CommandSpec,
    OptionDescriptor, Registry, RegistryBuilder, SubcommandSpec,
};
use sigil_core::{CommandDataOption, DispatchError, Embed, OptionType, OptionValue, Reply};
use sigil_scheduler::{RecurringRequest, Scheduler, next_fire_at};

use super::SchedulerSlot;

fn scheduler(slot: &SchedulerSlot) -> anyhow::Result<&Scheduler> {
    slot.get().ok_or_else(|| anyhow!("scheduler is not running"))
}

/// Schedulable commands, offered as choices for `schedule add command:`.
fn schedulable_commands() -> Vec<Choice> {
    Registry::global()
        .map(|registry| {
            registry
                .commands()
                .into_iter()
                .filter(|c| c.schedulable)
                .map(|c| Choice::new(c.name.clone(), OptionValue::Text(c.name.clone())))
                .collect()
        })
        .unwrap_or_default()
}

/// Parse `name=value` pairs against the declared options of `target`.
pub fn parse_args(target: &CommandDescriptor, raw: &str) -> Result<Vec<CommandDataOption>, DispatchError> {
    raw.split_whitespace()
        .map(|pair| {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| DispatchError::invalid(format!("Expected name=value, got '{pair}'")))?;
            let declared = target.option(name).ok_or_else(|| {
                DispatchError::invalid(format!("'{}' has no option '{name}'", target.name))
            })?;
            let bad = || {
                DispatchError::invalid(format!("'{value}' is not a valid {} for '{name}'", declared.kind))
            };
            let value = match declared.kind {
                OptionType::Text => OptionValue::Text(value.to_string()),
                OptionType::Integer => OptionValue::Integer(value.parse().map_err(|_| bad())?),
                OptionType::Boolean => OptionValue::Boolean(value.parse().map_err(|_| bad())?),
                OptionType::Real => OptionValue::Real(value.parse().map_err(|_| bad())?),
                OptionType::User => OptionValue::User(value.parse().map_err(|_| bad())?),
                OptionType::Channel => OptionValue::Channel(value.parse().map_err(|_| bad())?),
                OptionType::Role => OptionValue::Role(value.parse().map_err(|_| bad())?),
                OptionType::SubCommand | OptionType::SubCommandGroup => return Err(bad()),
            };
            Ok(CommandDataOption::new(name, value))
        })
        .collect()
}

struct Usage;

#[async_trait]
impl CommandHandler for Usage {
    async fn handle(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        ctx.reply_ephemeral("Usage: /schedule add | list | remove").await?;
        Ok(())
    }
}

struct Add {
    slot: SchedulerSlot,
    command: String,
    every: i64,
    delay: i64,
    args: String,
    delete_previous: bool,
}

#[async_trait]
impl CommandHandler for Add {
    fn bind(&mut self, options: &BoundOptions) -> Result<(), DispatchError> {
        self.command = options.required_text("command")?;
        self.every = options.required_integer("every")?;
        self.delay = options.integer("delay").unwrap_or(0);
        self.args = options.text("args").unwrap_or_default();
        self.delete_previous = options.boolean("delete_previous").unwrap_or(false);
        Ok(())
    }

    async fn handle(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        let frequency = u64::try_from(self.every)
            .ok()
            .filter(|m| *m > 0)
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
            .ok_or_else(|| DispatchError::invalid("every must be a positive number of minutes"))?;
        let delay = (self.delay >= 0)
            .then(|| TimeDelta::try_minutes(self.delay))
            .flatten()
            .ok_or_else(|| DispatchError::invalid("delay must be zero or more minutes"))?;

        let registry = Registry::global().ok_or_else(|| anyhow!("registry is not installed"))?;
        let target = registry
            .command(&self.command)
            .ok_or_else(|| DispatchError::invalid(format!("Unknown command '{}'", self.command)))?;
        if !target.schedulable {
            return Err(DispatchError::invalid(format!("'{}' cannot be scheduled", self.command)).into());
        }
        let args = parse_args(target, &self.args)?;

        let request = RecurringRequest {
            workspace_id: ctx.workspace_id,
            channel_id: ctx.channel_id,
            scheduled_by: ctx.caller.clone(),
            command: self.command.clone(),
            args,
            start: Utc::now() + delay,
            frequency,
            delete_previous: self.delete_previous,
            display_timestamp: None,
        };
        let id = scheduler(&self.slot)?
            .add_recurring(request)
            .await
            .map_err(|e| DispatchError::invalid(e.to_string()))?;

        ctx.reply_ephemeral(format!(
            "📅 Scheduled `{}` every {} minutes (id `{id}`)",
            self.command, self.every
        ))
        .await?;
        Ok(())
    }
}

struct List {
    slot: SchedulerSlot,
}

#[async_trait]
impl CommandHandler for List {
    async fn handle(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        let entries = scheduler(&self.slot)?.entries(ctx.workspace_id).await;
        if entries.is_empty() {
            ctx.reply_ephemeral("No scheduled commands.").await?;
            return Ok(());
        }

        let now = Utc::now();
        let mut embed = Embed::new("Scheduled commands");
        for entry in &entries {
            let next = next_fire_at(entry, now);
            embed = embed.field(
                entry.command.clone(),
                format!(
                    "id `{}`\nevery {} min\nnext <t:{}:R>\nby {}",
                    entry.id,
                    entry.frequency_secs / 60,
                    next.timestamp(),
                    entry.scheduled_by.name
                ),
                false,
            );
        }
        ctx.respond(Reply::embed(embed).ephemeral()).await?;
        Ok(())
    }
}

struct Remove {
    slot: SchedulerSlot,
    id: String,
}

#[async_trait]
impl CommandHandler for Remove {
    fn bind(&mut self, options: &BoundOptions) -> Result<(), DispatchError> {
        self.id = options.required_text("id")?;
        Ok(())
    }

    async fn handle(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        if !scheduler(&self.slot)?.remove(ctx.workspace_id, &self.id).await {
            return Err(DispatchError::invalid(format!("No scheduled command with id '{}'", self.id)).into());
        }
        ctx.reply_ephemeral(format!("🗑️ Removed `{}`", self.id)).await?;
        Ok(())
    }
}

pub fn register(builder: RegistryBuilder, slot: &SchedulerSlot) -> RegistryBuilder {
    let (add, list, remove) = (slot.clone(), slot.clone(), slot.clone());
    builder
        .command(
            CommandSpec::new("schedule", "Manage recurring commands", || Box::new(Usage))
                .admin_only(),
        )
        .subcommand(
            SubcommandSpec::new("schedule", "add", "Run a command on a recurring schedule", move || {
                Box::new(Add {
                    slot: add.clone(),
                    command: String::new(),
                    every: 0,
                    delay: 0,
                    args: String::new(),
                    delete_previous: false,
                })
            })
            .option(
                OptionDescriptor::required("command", "Command to run", OptionType::Text)
                    .with_choices(schedulable_commands),
            )
            .option(OptionDescriptor::required("every", "Minutes between runs", OptionType::Integer))
            .option(OptionDescriptor::optional("delay", "Minutes until the first run", OptionType::Integer))
            .option(OptionDescriptor::optional(
                "args",
                "Options for the command as name=value pairs",
                OptionType::Text,
            ))
            .option(OptionDescriptor::optional(
                "delete_previous",
                "Delete the previous output before each run",
                OptionType::Boolean,
            )),
        )
        .subcommand(SubcommandSpec::new(
            "schedule",
            "list",
            "List this workspace's scheduled commands",
            move || Box::new(List { slot: list.clone() }),
        ))
        .subcommand(
            SubcommandSpec::new("schedule", "remove", "Remove a scheduled command", move || {
                Box::new(Remove {
                    slot: remove.clone(),
                    id: String::new(),
                })
            })
            .option(OptionDescriptor::required("id", "Id shown by /schedule list", OptionType::Text)),
        )
}
