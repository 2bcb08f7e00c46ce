//! /set - per-sender settings

use crate::application::errors::{BotResult, HandlerResult};
use crate::application::messaging::Reply;
use crate::application::Bot;
use crate::domain::entities::{CommandContext, CommandDefinition, SettingKey, SCOPE_SEPARATOR};
use crate::plugins::Plugin;

pub struct SettingsPlugin;

impl Plugin for SettingsPlugin {
    fn description(&self) -> &str {
        "per-sender settings"
    }

    fn init(&self, bot: &Bot) -> BotResult<()> {
        bot.commands().register(
            CommandDefinition::new(
                "/set",
                "show all/one per-peer settings or set a value for a setting.\n\n\
                 Examples:\n\n\
                 # show all settings\n/set\n\n\
                 # show value for one setting\n/set name\n\n\
                 # set one setting\n/set name=value",
                cmd_set,
            )
            .with_params(["bot", "message", "payload", "args", "replies"]),
        )?;
        Ok(())
    }
}

fn cmd_set(ctx: &mut CommandContext<'_>) -> HandlerResult {
    let bot = ctx.bot()?;
    let scope = ctx.message()?.sender.address.as_str();
    let payload = ctx.payload()?;

    let text = if scope.contains(SCOPE_SEPARATOR) {
        format!("cannot store settings for address {:?}", scope)
    } else if payload.trim().is_empty() {
        dump_settings(bot, scope)?
    } else if let Some((name, value)) = payload.split_once('=') {
        let (name, value) = (name.trim(), value.trim());
        if name.is_empty() || name.contains(SCOPE_SEPARATOR) {
            format!("invalid setting name {:?}", name)
        } else {
            let old = bot.set_setting(&SettingKey::new(scope, name), value)?;
            let old = old.map_or_else(|| "None".to_string(), |v| format!("{:?}", v));
            format!("old: {}={}\nnew: {}={:?}", name, old, name, value)
        }
    } else {
        let name = ctx.args()?.first().map(String::as_str).unwrap_or_default();
        if name.contains(SCOPE_SEPARATOR) {
            format!("invalid setting name {:?}", name)
        } else {
            let value = bot.get_setting(&SettingKey::new(scope, name))?;
            format!("{}={}", name, value.as_deref().unwrap_or("None"))
        }
    };

    ctx.replies()?.add(Reply::text(text))?;
    Ok(())
}

fn dump_settings(bot: &Bot, scope: &str) -> HandlerResult<String> {
    let settings = bot.settings().list(Some(scope))?;
    if settings.is_empty() {
        return Ok("no settings".to_string());
    }
    Ok(settings
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("\n"))
}
