use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, error, info, warn};

use crate::application::errors::{BotResult, HandlerResult, RegistrationError};
use crate::application::messaging::parser::CommandLine;
use crate::application::messaging::{Replies, Reply};
use crate::application::Bot;
use crate::domain::entities::{
    CommandContext, CommandDefinition, IncomingCommand, IncomingMessage, WORD_SEPARATOR,
};
use crate::plugins::Plugin;

/// Name and every `_` shortened form of it, longest first.
fn underscore_subparts(name: &str) -> impl Iterator<Item = &str> {
    let mut next = Some(name);
    std::iter::from_fn(move || {
        let current = next?;
        next = current.rsplit_once(WORD_SEPARATOR).map(|(head, _)| head);
        Some(current)
    })
}

/// Registered '/commands' and the dispatch of command messages to them.
///
/// Clones share the same command table.
#[derive(Clone, Default)]
pub struct CommandRouter {
    commands: Arc<RwLock<Vec<Arc<CommandDefinition>>>>,
}

impl CommandRouter {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<CommandDefinition>>> {
        self.commands.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<CommandDefinition>>> {
        self.commands.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a command.
    ///
    /// Fails when the name, or any shorter `_` form of it, is taken, or when
    /// a registered name extends this one with `_`.
    pub fn register(&self, mut definition: CommandDefinition) -> Result<(), RegistrationError> {
        definition.prepare()?;
        let name = definition.name.clone();
        let mut commands = self.write();

        let taken = underscore_subparts(&name)
            .find(|candidate| commands.iter().any(|c| c.name == *candidate))
            .map(str::to_string);
        if let Some(existing) = taken {
            return Err(RegistrationError::Conflict { name, existing });
        }

        let extended = format!("{}{}", name, WORD_SEPARATOR);
        if let Some(existing) = commands.iter().find(|c| c.name.starts_with(&extended)) {
            return Err(RegistrationError::Conflict {
                name,
                existing: existing.name.clone(),
            });
        }

        commands.push(Arc::new(definition));
        debug!("registered new command {:?}", name);
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> Option<Arc<CommandDefinition>> {
        let mut commands = self.write();
        let pos = commands.iter().position(|c| c.name == name)?;
        debug!("unregistered command {:?}", name);
        Some(commands.remove(pos))
    }

    pub fn get(&self, name: &str) -> Option<Arc<CommandDefinition>> {
        self.read().iter().find(|c| c.name == name).cloned()
    }

    /// Commands in registration order
    pub fn list(&self) -> Vec<Arc<CommandDefinition>> {
        self.read().clone()
    }

    /// Handle a message if it is a command. Every text starting with the
    /// command marker is consumed, matched or not.
    pub fn dispatch(
        &self,
        bot: &Bot,
        message: &IncomingMessage,
        replies: &mut Replies,
    ) -> HandlerResult<bool> {
        let Some(mut line) = CommandLine::parse(&message.text) else {
            return Ok(false);
        };

        if !line.strip_mention(&bot.self_contact().address) {
            debug!("ignoring {:?}, addressed to another bot", line.name);
            return Ok(true);
        }

        let requested = line.name.clone();
        let definition = loop {
            if let Some(definition) = self.get(&line.name) {
                break Some(definition);
            }
            if !line.shorten() {
                break None;
            }
        };

        let allowed = match &definition {
            Some(definition) => !definition.admin || bot.is_admin(&message.sender.address)?,
            None => false,
        };
        let Some(definition) = definition.filter(|_| allowed) else {
            let reply = format!("unknown command {:?}", requested);
            warn!("{}", reply);
            if !message.chat.is_group {
                replies.add(Reply::text(reply))?;
            }
            return Ok(true);
        };

        let command = IncomingCommand {
            definition: definition.clone(),
            args: line.args,
            payload: line.payload,
            message: message.clone(),
        };
        info!("processing command {}", command);

        let mut ctx = CommandContext::new(bot, &command, replies);
        if let Err(e) = definition.call(&mut ctx) {
            error!(
                "command {} failed on message id={}: {}",
                definition.name, message.id, e
            );
        }
        Ok(true)
    }
}

impl Plugin for CommandRouter {
    fn description(&self) -> &str {
        "dispatches '/commands' to their handlers"
    }

    fn init(&self, _bot: &Bot) -> BotResult<()> {
        self.register(
            CommandDefinition::new(
                "/help",
                "reply with help message about available commands.",
                command_help,
            )
            .with_params(["bot", "message", "replies"]),
        )?;
        Ok(())
    }

    fn incoming_message(
        &self,
        bot: &Bot,
        message: &IncomingMessage,
        replies: &mut Replies,
    ) -> HandlerResult<bool> {
        self.dispatch(bot, message, replies)
    }
}

fn command_help(ctx: &mut CommandContext<'_>) -> HandlerResult {
    let bot = ctx.bot()?;
    let is_admin = bot.is_admin(&ctx.message()?.sender.address)?;

    let mut lines = vec!["Commands:".to_string()];
    for command in bot.commands().list() {
        if command.hidden || (command.admin && !is_admin) {
            continue;
        }
        lines.push(format!("{}: {}", command.name, command.short()));
    }

    let filters = bot.filters().list();
    if !filters.is_empty() {
        lines.push(String::new());
        lines.push("Filters:".to_string());
        for filter in filters {
            lines.push(format!("{}: {}", filter.name, filter.short()));
        }
    }

    lines.push(String::new());
    lines.push("Enabled Plugins:".to_string());
    lines.extend(bot.plugins().names());

    ctx.replies()?.add(Reply::text(lines.join("\n")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut CommandContext<'_>) -> HandlerResult {
        Ok(())
    }

    fn def(name: &str) -> CommandDefinition {
        CommandDefinition::new(name, "test command", noop)
    }

    #[test]
    fn test_subparts() {
        let parts: Vec<_> = underscore_subparts("/some_group_thing").collect();
        assert_eq!(parts, vec!["/some_group_thing", "/some_group", "/some"]);
    }

    #[test]
    fn test_conflict_with_shorter() {
        let router = CommandRouter::new();
        router.register(def("/some_group")).unwrap();
        let err = router.register(def("/some_group_thing")).unwrap_err();
        assert_eq!(
            err,
            RegistrationError::Conflict {
                name: "/some_group_thing".to_string(),
                existing: "/some_group".to_string(),
            }
        );
    }

    #[test]
    fn test_conflict_with_longer() {
        let router = CommandRouter::new();
        router.register(def("/some_group_thing")).unwrap();
        assert!(matches!(
            router.register(def("/some_group")),
            Err(RegistrationError::Conflict { .. })
        ));
        assert!(matches!(
            router.register(def("/some")),
            Err(RegistrationError::Conflict { .. })
        ));
    }

    #[test]
    fn test_no_conflict_without_separator() {
        let router = CommandRouter::new();
        router.register(def("/exec")).unwrap();
        router.register(def("/execute")).unwrap();
        assert!(matches!(
            router.register(def("/exec")),
            Err(RegistrationError::Conflict { .. })
        ));
        assert_eq!(router.list().len(), 2);
    }

    #[test]
    fn test_unregister() {
        let router = CommandRouter::new();
        router.register(def("/a")).unwrap();
        assert!(router.unregister("/a").is_some());
        assert!(router.get("/a").is_none());
        router.register(def("/a_b")).unwrap();
    }
}
