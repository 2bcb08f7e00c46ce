use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::application::errors::{HandlerError, HandlerResult, RegistrationError};
use crate::application::messaging::Replies;
use crate::application::Bot;

use super::IncomingMessage;

/// Marker character every command name starts with
pub const COMMAND_PREFIX: char = '/';

/// Separator for multi-word command names
pub const WORD_SEPARATOR: char = '_';

/// A value a handler may ask to receive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Param {
    Message,
    Payload,
    Args,
    Bot,
    Command,
    Replies,
}

impl Param {
    /// Parameters a command handler may declare.
    pub const COMMAND: &'static [Param] = &[
        Param::Message,
        Param::Payload,
        Param::Args,
        Param::Bot,
        Param::Command,
        Param::Replies,
    ];

    /// Parameters a filter handler may declare.
    pub const FILTER: &'static [Param] = &[Param::Message, Param::Replies, Param::Bot];

    pub fn as_str(&self) -> &'static str {
        match self {
            Param::Message => "message",
            Param::Payload => "payload",
            Param::Args => "args",
            Param::Bot => "bot",
            Param::Command => "command",
            Param::Replies => "replies",
        }
    }
}

impl FromStr for Param {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message" => Ok(Param::Message),
            "payload" => Ok(Param::Payload),
            "args" => Ok(Param::Args),
            "bot" => Ok(Param::Bot),
            "command" => Ok(Param::Command),
            "replies" => Ok(Param::Replies),
            other => Err(other.to_string()),
        }
    }
}

/// Ordering rank of a filter or plugin hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Priority {
    TryFirst = -1,
    #[default]
    Normal = 0,
    TryLast = 1,
}

impl Priority {
    pub fn key(self) -> i8 {
        self as i8
    }
}

/// Control flow signal returned by a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterFlow {
    Continue,
    /// Skip every filter after this one for the current message.
    StopChain,
}

/// Command handler function type
pub type CommandFn = Arc<dyn Fn(&mut CommandContext<'_>) -> HandlerResult + Send + Sync>;

/// Filter handler function type
pub type FilterFn = Arc<dyn Fn(&mut FilterContext<'_>) -> HandlerResult<FilterFlow> + Send + Sync>;

/// Split a description into its first line and the remaining body.
fn split_description(description: &str) -> (&str, &str) {
    let description = description.trim();
    match description.split_once('\n') {
        Some((short, long)) => (short.trim(), long.trim()),
        None => (description, ""),
    }
}

/// Check declared parameter names against the allowed set. No declaration
/// means the handler receives everything that is allowed.
fn resolve_params(
    name: &str,
    declared: Option<&[String]>,
    allowed: &[Param],
) -> Result<BTreeSet<Param>, RegistrationError> {
    let Some(declared) = declared else {
        return Ok(allowed.iter().copied().collect());
    };

    let valid = || {
        allowed
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut params = BTreeSet::new();
    for raw in declared {
        match raw.parse::<Param>() {
            Ok(param) if allowed.contains(&param) => {
                params.insert(param);
            }
            _ => {
                return Err(RegistrationError::InvalidParam {
                    name: name.to_string(),
                    param: raw.clone(),
                    valid: valid(),
                })
            }
        }
    }
    Ok(params)
}

/// Definition of a '/COMMAND' and its handler
#[derive(Clone)]
pub struct CommandDefinition {
    pub name: String,
    pub admin: bool,
    pub hidden: bool,
    description: String,
    declared: Option<Vec<String>>,
    params: BTreeSet<Param>,
    handler: CommandFn,
}

impl CommandDefinition {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut CommandContext<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            admin: false,
            hidden: false,
            description: description.into(),
            declared: None,
            params: BTreeSet::new(),
            handler: Arc::new(handler),
        }
    }

    /// Only available to bot administrators.
    pub fn with_admin(mut self, admin: bool) -> Self {
        self.admin = admin;
        self
    }

    /// Left out of the help listing.
    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Declare the parameters the handler reads, by name.
    pub fn with_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declared = Some(params.into_iter().map(Into::into).collect());
        self
    }

    pub fn short(&self) -> &str {
        split_description(&self.description).0
    }

    pub fn long(&self) -> &str {
        split_description(&self.description).1
    }

    pub fn params(&self) -> &BTreeSet<Param> {
        &self.params
    }

    /// Validate name, description and declared parameters.
    pub(crate) fn prepare(&mut self) -> Result<(), RegistrationError> {
        let invalid = |reason: &str| RegistrationError::InvalidName {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        if !self.name.starts_with(COMMAND_PREFIX) {
            return Err(invalid(&format!("must start with {:?}", COMMAND_PREFIX)));
        }
        if self.name.len() == COMMAND_PREFIX.len_utf8() {
            return Err(invalid("empty command name"));
        }
        if self.name.contains(char::is_whitespace) || self.name.contains('@') {
            return Err(invalid("must not contain whitespace or '@'"));
        }
        if self.short().is_empty() {
            return Err(RegistrationError::MissingDescription {
                name: self.name.clone(),
            });
        }
        self.params = resolve_params(&self.name, self.declared.as_deref(), Param::COMMAND)?;
        Ok(())
    }

    pub(crate) fn call(&self, ctx: &mut CommandContext<'_>) -> HandlerResult {
        (self.handler)(ctx)
    }
}

impl fmt::Debug for CommandDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDefinition")
            .field("name", &self.name)
            .field("admin", &self.admin)
            .field("hidden", &self.hidden)
            .field("short", &self.short())
            .field("params", &self.params)
            .finish()
    }
}

/// Definition of a filter that acts on incoming messages
#[derive(Clone)]
pub struct FilterDefinition {
    pub name: String,
    pub priority: Priority,
    description: String,
    declared: Option<Vec<String>>,
    params: BTreeSet<Param>,
    handler: FilterFn,
}

impl FilterDefinition {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut FilterContext<'_>) -> HandlerResult<FilterFlow> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            priority: Priority::Normal,
            description: description.into(),
            declared: None,
            params: BTreeSet::new(),
            handler: Arc::new(handler),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn tryfirst(self) -> Self {
        self.with_priority(Priority::TryFirst)
    }

    pub fn trylast(self) -> Self {
        self.with_priority(Priority::TryLast)
    }

    pub fn with_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declared = Some(params.into_iter().map(Into::into).collect());
        self
    }

    pub fn short(&self) -> &str {
        split_description(&self.description).0
    }

    pub fn long(&self) -> &str {
        split_description(&self.description).1
    }

    pub fn params(&self) -> &BTreeSet<Param> {
        &self.params
    }

    pub(crate) fn prepare(&mut self) -> Result<(), RegistrationError> {
        if self.name.trim().is_empty() {
            return Err(RegistrationError::InvalidName {
                name: self.name.clone(),
                reason: "empty filter name".to_string(),
            });
        }
        if self.short().is_empty() {
            return Err(RegistrationError::MissingDescription {
                name: self.name.clone(),
            });
        }
        self.params = resolve_params(&self.name, self.declared.as_deref(), Param::FILTER)?;
        Ok(())
    }

    pub(crate) fn call(&self, ctx: &mut FilterContext<'_>) -> HandlerResult<FilterFlow> {
        (self.handler)(ctx)
    }
}

impl fmt::Debug for FilterDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterDefinition")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("short", &self.short())
            .field("params", &self.params)
            .finish()
    }
}

/// Incoming command request, built for one dispatch
#[derive(Debug, Clone)]
pub struct IncomingCommand {
    pub definition: Arc<CommandDefinition>,
    pub args: Vec<String>,
    pub payload: String,
    pub message: IncomingMessage,
}

impl fmt::Display for IncomingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<IncomingCommand {} payload={:?} msg={}>",
            self.definition.name, self.payload, self.message.id
        )
    }
}

/// What a command handler gets to see. Accessors fail for parameters the
/// handler did not declare.
pub struct CommandContext<'a> {
    bot: &'a Bot,
    command: &'a IncomingCommand,
    replies: &'a mut Replies,
}

impl<'a> CommandContext<'a> {
    pub(crate) fn new(bot: &'a Bot, command: &'a IncomingCommand, replies: &'a mut Replies) -> Self {
        Self {
            bot,
            command,
            replies,
        }
    }

    fn require(&self, param: Param) -> HandlerResult {
        if self.command.definition.params.contains(&param) {
            Ok(())
        } else {
            Err(HandlerError::Undeclared(param))
        }
    }

    pub fn bot(&self) -> HandlerResult<&'a Bot> {
        self.require(Param::Bot)?;
        Ok(self.bot)
    }

    pub fn command(&self) -> HandlerResult<&'a IncomingCommand> {
        self.require(Param::Command)?;
        Ok(self.command)
    }

    pub fn message(&self) -> HandlerResult<&'a IncomingMessage> {
        self.require(Param::Message)?;
        Ok(&self.command.message)
    }

    pub fn payload(&self) -> HandlerResult<&'a str> {
        self.require(Param::Payload)?;
        Ok(&self.command.payload)
    }

    pub fn args(&self) -> HandlerResult<&'a [String]> {
        self.require(Param::Args)?;
        Ok(&self.command.args)
    }

    pub fn replies(&mut self) -> HandlerResult<&mut Replies> {
        self.require(Param::Replies)?;
        Ok(self.replies)
    }
}

/// What a filter handler gets to see
pub struct FilterContext<'a> {
    bot: &'a Bot,
    filter: &'a FilterDefinition,
    message: &'a IncomingMessage,
    replies: &'a mut Replies,
}

impl<'a> FilterContext<'a> {
    pub(crate) fn new(
        bot: &'a Bot,
        filter: &'a FilterDefinition,
        message: &'a IncomingMessage,
        replies: &'a mut Replies,
    ) -> Self {
        Self {
            bot,
            filter,
            message,
            replies,
        }
    }

    fn require(&self, param: Param) -> HandlerResult {
        if self.filter.params.contains(&param) {
            Ok(())
        } else {
            Err(HandlerError::Undeclared(param))
        }
    }

    pub fn bot(&self) -> HandlerResult<&'a Bot> {
        self.require(Param::Bot)?;
        Ok(self.bot)
    }

    pub fn message(&self) -> HandlerResult<&'a IncomingMessage> {
        self.require(Param::Message)?;
        Ok(self.message)
    }

    pub fn replies(&mut self) -> HandlerResult<&mut Replies> {
        self.require(Param::Replies)?;
        Ok(self.replies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut CommandContext<'_>) -> HandlerResult {
        Ok(())
    }

    #[test]
    fn test_description_split() {
        let def = CommandDefinition::new("/x", "short description.\n\n  long description.\n", noop);
        assert_eq!(def.short(), "short description.");
        assert_eq!(def.long(), "long description.");
    }

    #[test]
    fn test_missing_description_rejected() {
        let mut def = CommandDefinition::new("/x", "   ", noop);
        assert!(matches!(
            def.prepare(),
            Err(RegistrationError::MissingDescription { .. })
        ));
    }

    #[test]
    fn test_partial_params_accepted() {
        let mut def = CommandDefinition::new("/example", "only replies", noop).with_params(["replies"]);
        def.prepare().unwrap();
        assert_eq!(def.params().len(), 1);
        assert!(def.params().contains(&Param::Replies));
    }

    #[test]
    fn test_unknown_param_rejected() {
        let mut def = CommandDefinition::new("/example", "invalid", noop).with_params(["unknown_arg"]);
        let err = def.prepare().unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidParam { ref param, .. } if param == "unknown_arg"));
    }

    #[test]
    fn test_filter_rejects_command_only_param() {
        let mut def = FilterDefinition::new("f", "a filter", |_| Ok(FilterFlow::Continue))
            .with_params(["message", "payload"]);
        assert!(def.prepare().is_err());
    }

    #[test]
    fn test_name_must_carry_prefix() {
        let mut def = CommandDefinition::new("help", "no marker", noop);
        assert!(matches!(def.prepare(), Err(RegistrationError::InvalidName { .. })));
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::TryFirst < Priority::Normal);
        assert!(Priority::Normal < Priority::TryLast);
        assert_eq!(Priority::TryFirst.key(), -1);
        assert_eq!(Priority::TryLast.key(), 1);
    }
}
