use std::fmt;

use super::{MessageId, StatusUpdate};

/// Separator between scope and name in a stored key
pub const SCOPE_SEPARATOR: char = '/';

/// Default settings scope
pub const GLOBAL_SCOPE: &str = "global";

/// Composite `scope/name` key of a persistent setting.
///
/// Neither part may contain [`SCOPE_SEPARATOR`]; constructing such a key is a
/// programming error and panics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SettingKey {
    scope: String,
    name: String,
}

impl SettingKey {
    pub fn new(scope: impl Into<String>, name: impl Into<String>) -> Self {
        let scope = scope.into();
        let name = name.into();
        assert!(
            !scope.contains(SCOPE_SEPARATOR),
            "setting scope {:?} contains {:?}",
            scope,
            SCOPE_SEPARATOR
        );
        assert!(
            !name.contains(SCOPE_SEPARATOR),
            "setting name {:?} contains {:?}",
            name,
            SCOPE_SEPARATOR
        );
        Self { scope, name }
    }

    pub fn global(name: impl Into<String>) -> Self {
        Self::new(GLOBAL_SCOPE, name)
    }

    /// Parse user input of the form `scope/name`.
    pub fn parse(qualified: &str) -> Result<Self, String> {
        let (scope, name) = qualified
            .split_once(SCOPE_SEPARATOR)
            .ok_or_else(|| format!("key {:?} does not contain a '/' scope delimiter", qualified))?;
        if name.contains(SCOPE_SEPARATOR) {
            return Err(format!("key {:?} has more than one '/' delimiter", qualified));
        }
        Ok(Self::new(scope, name))
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.scope, SCOPE_SEPARATOR, self.name)
    }
}

/// A setting write taken over by a plugin, with the value it replaced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredSetting {
    pub previous: Option<String>,
}

/// Work item waiting in the durable inbox queue
#[derive(Debug, Clone, PartialEq)]
pub enum PendingEvent {
    Message(MessageId),
    StatusUpdate(StatusUpdate),
}

impl PendingEvent {
    pub fn msg_id(&self) -> MessageId {
        match self {
            PendingEvent::Message(id) => *id,
            PendingEvent::StatusUpdate(update) => update.msg_id,
        }
    }
}

/// A pending event together with its queue row id
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedEvent {
    pub id: i64,
    pub event: PendingEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_joins_with_separator() {
        let key = SettingKey::new("alice@example.org", "lang");
        assert_eq!(key.to_string(), "alice@example.org/lang");
        assert_eq!(SettingKey::global("x").to_string(), "global/x");
    }

    #[test]
    fn test_parse() {
        let key = SettingKey::parse("other/hello").unwrap();
        assert_eq!(key.scope(), "other");
        assert_eq!(key.name(), "hello");
        assert!(SettingKey::parse("noscope").is_err());
        assert!(SettingKey::parse("a/b/c").is_err());
    }

    #[test]
    #[should_panic]
    fn test_separator_in_name_panics() {
        SettingKey::new("global", "a/b");
    }

    #[test]
    #[should_panic]
    fn test_separator_in_scope_panics() {
        SettingKey::new("a/b", "name");
    }
}
