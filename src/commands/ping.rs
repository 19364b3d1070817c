use async_trait::async_trait;
use sigil_commands::{CommandContext, CommandHandler, CommandSpec, RegistryBuilder};

struct Ping;

#[async_trait]
impl CommandHandler for Ping {
    async fn handle(&mut self, ctx: &CommandContext) -> anyhow::Result<()> {
        ctx.reply("🏓 Pong!").await?;
        Ok(())
    }
}

pub fn register(builder: RegistryBuilder) -> RegistryBuilder {
    builder.command(CommandSpec::new(
        "ping",
        "Check that the server is responding",
        || Box::new(Ping),
    ))
}
