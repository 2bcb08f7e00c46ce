//! /ban and /unban for administrators

use tracing::info;

use crate::application::errors::{BotResult, HandlerError, HandlerResult};
use crate::application::messaging::Reply;
use crate::application::Bot;
use crate::domain::entities::{CommandContext, CommandDefinition};
use crate::plugins::Plugin;

/// Banned addresses formatted for a reply or the CLI.
pub fn banned_list(bot: &Bot) -> String {
    let banned = bot.banned();
    let list = if banned.is_empty() {
        "(Empty list)".to_string()
    } else {
        banned.join("\n")
    };
    format!("Banned addresses:\n{}", list)
}

pub struct AdminPlugin;

impl Plugin for AdminPlugin {
    fn description(&self) -> &str {
        "ban and unban contacts"
    }

    fn init(&self, bot: &Bot) -> BotResult<()> {
        bot.commands().register(
            CommandDefinition::new(
                "/ban",
                "Ban the given address or list banned addresses if no address is given.\n\n\
                 Examples:\n/ban foo@example.com\n/ban",
                cmd_ban,
            )
            .with_admin(true)
            .with_params(["bot", "payload", "replies"]),
        )?;
        bot.commands().register(
            CommandDefinition::new(
                "/unban",
                "Unban the given address.\n\nExamples:\n/unban foo@example.com",
                cmd_unban,
            )
            .with_admin(true)
            .with_params(["bot", "payload", "replies"]),
        )?;
        info!("admin commands registered");
        Ok(())
    }
}

fn cmd_ban(ctx: &mut CommandContext<'_>) -> HandlerResult {
    let bot = ctx.bot()?;
    let address = ctx.payload()?.trim();
    let text = if address.contains('@') {
        if address == bot.self_contact().address {
            return Err(HandlerError::failed("refusing to ban the bot itself"));
        }
        bot.ban(address)?;
        format!("Banned: {}", address)
    } else {
        banned_list(bot)
    };
    ctx.replies()?.add(Reply::text(text))?;
    Ok(())
}

fn cmd_unban(ctx: &mut CommandContext<'_>) -> HandlerResult {
    let bot = ctx.bot()?;
    let address = ctx.payload()?.trim();
    let text = match bot.unban(address) {
        Ok(()) => format!("Unbanned: {}", address),
        Err(e) => format!("Not unbanned: {}", e),
    };
    ctx.replies()?.add(Reply::text(text))?;
    Ok(())
}
