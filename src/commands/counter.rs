//! `counter`: posts a count with a button that bumps it in place.

use async_trait::async_trait;
use sigil_commands::{
    ActionArgs, ActionContext, ActionHandler, ActionParamType, ActionSpec, BoundOptions,
    CommandContext, CommandHandler, CommandSpec, OptionDescriptor, RegistryBuilder,
};
use sigil_core::{DispatchError, MessageEdit, OptionType, Reply};

pub const BUMP_ACTION: &str = "counter-bump";

const PREFIX: &str = "Count: ";

struct Counter {
    start: i64,
    step: i64,
}

#[async_trait]
impl CommandHandler for Counter {
    fn bind(&mut self, options: &BoundOptions) -> Result<(), DispatchError> {
        self.start = options.integer("start").unwrap_or(0);
        self.step = options.integer("step").unwrap_or(1);
        if self.step == 0 {
            return Err(DispatchError::invalid("step must not be zero"));
        }
        Ok(())
    }

    async fn handle(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        let mut text = render(self.start);
        if let Some(ts) = ctx.display_timestamp {
            text.push_str(&format!(" (as of <t:{}>)", ts.timestamp()));
        }
        let reply = Reply::text(text).button(format!("{:+}", self.step), bump_id(self.step));
        ctx.respond(reply).await?;
        Ok(())
    }
}

struct Bump {
    step: i64,
}

#[async_trait]
impl ActionHandler for Bump {
    fn bind(&mut self, args: &ActionArgs) -> Result<(), DispatchError> {
        self.step = args
            .integer("step")
            .ok_or_else(|| DispatchError::invalid("missing step"))?;
        Ok(())
    }

    async fn handle(&mut self, ctx: &ActionContext) -> anyhow::Result<()> {
        let step = self.step;
        ctx.update(move |message| apply_bump(message, step)).await?;
        Ok(())
    }
}

fn bump_id(step: i64) -> String {
    format!("{BUMP_ACTION}_{step}")
}

fn render(count: i64) -> String {
    format!("{PREFIX}{count}")
}

fn parse_count(text: &str) -> Option<i64> {
    text.strip_prefix(PREFIX)?.split_whitespace().next()?.parse().ok()
}

fn apply_bump(message: &mut MessageEdit, step: i64) {
    let current = message.text.as_deref().and_then(parse_count).unwrap_or(0);
    message.text = Some(render(current.saturating_add(step)));
}

pub fn register(builder: RegistryBuilder) -> RegistryBuilder {
    builder
        .command(
            CommandSpec::new("counter", "Post a counter with a bump button", || {
                Box::new(Counter { start: 0, step: 1 })
            })
            .option(OptionDescriptor::optional("start", "Initial count", OptionType::Integer))
            .option(OptionDescriptor::optional("step", "Amount each press adds", OptionType::Integer))
            .action(BUMP_ACTION)
            .schedulable(),
        )
        .action(
            ActionSpec::new(BUMP_ACTION, || Box::new(Bump { step: 1 }))
                .param("step", ActionParamType::Integer),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bump_adds_step() {
        let mut message = MessageEdit {
            text: Some(render(4)),
            ..Default::default()
        };
        apply_bump(&mut message, 3);
        assert_eq!(message.text.as_deref(), Some("Count: 7"));
        apply_bump(&mut message, -10);
        assert_eq!(message.text.as_deref(), Some("Count: -3"));
    }

    #[test]
    fn test_bump_ignores_timestamp_suffix() {
        let mut message = MessageEdit {
            text: Some("Count: 2 (as of <t:1700000000>)".into()),
            ..Default::default()
        };
        apply_bump(&mut message, 1);
        assert_eq!(message.text.as_deref(), Some("Count: 3"));
    }

    #[test]
    fn test_bump_id_round_trips_through_registry() {
        let registry = register(RegistryBuilder::new()).build().unwrap();
        let action = registry.action(BUMP_ACTION).unwrap();
        assert_eq!(action.owner, "counter");
        assert!(registry.command("counter").unwrap().schedulable);
        assert_eq!(bump_id(-2), "counter-bump_-2");
    }
}
