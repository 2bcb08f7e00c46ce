//! Echo plugin - replies with what it was sent

use crate::application::errors::{BotResult, HandlerResult};
use crate::application::messaging::Reply;
use crate::application::Bot;
use crate::domain::entities::{CommandContext, CommandDefinition};
use crate::plugins::Plugin;

pub struct EchoPlugin;

impl Plugin for EchoPlugin {
    fn description(&self) -> &str {
        "echo back received text"
    }

    fn init(&self, bot: &Bot) -> BotResult<()> {
        bot.commands().register(
            CommandDefinition::new("/echo", "echo back received text.", cmd_echo)
                .with_params(["payload", "replies"]),
        )?;
        Ok(())
    }
}

fn cmd_echo(ctx: &mut CommandContext<'_>) -> HandlerResult {
    let payload = ctx.payload()?;
    let text = if payload.is_empty() { "echo" } else { payload };
    ctx.replies()?.add(Reply::text(text))?;
    Ok(())
}
