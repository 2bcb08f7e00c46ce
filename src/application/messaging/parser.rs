//! Message parser - command lines and protocol system messages

use once_cell::sync::Lazy;
use regex_lite::Regex;

use crate::domain::entities::{COMMAND_PREFIX, WORD_SEPARATOR};

/// A '/command' line split into name, arguments and payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub name: String,
    pub args: Vec<String>,
    /// Everything after the name, with leading whitespace removed.
    pub payload: String,
}

impl CommandLine {
    /// Split a message text. Returns `None` unless it starts with the
    /// command marker.
    pub fn parse(text: &str) -> Option<Self> {
        if !text.starts_with(COMMAND_PREFIX) {
            return None;
        }
        let mut words = text.split_whitespace();
        let name = words.next()?.to_string();
        let args = words.map(str::to_string).collect();
        let payload = match text.split_once(char::is_whitespace) {
            Some((_, rest)) => rest.trim_start().to_string(),
            None => String::new(),
        };
        Some(Self {
            name,
            args,
            payload,
        })
    }

    /// Remove a trailing `@address` mention. Returns `false` if the command
    /// is addressed to somebody else.
    pub fn strip_mention(&mut self, self_addr: &str) -> bool {
        if !self.name.contains('@') {
            return true;
        }
        let suffix = format!("@{}", self_addr);
        match self.name.strip_suffix(&suffix) {
            Some(name) => {
                self.name = name.to_string();
                true
            }
            None => false,
        }
    }

    /// Move the last `_` separated segment of the name to the front of the
    /// arguments and payload. Returns `false` once nothing is left to move.
    pub fn shorten(&mut self) -> bool {
        let Some((head, segment)) = self.name.rsplit_once(WORD_SEPARATOR) else {
            return false;
        };
        self.args.insert(0, segment.to_string());
        self.payload = format!("{} {}", segment, self.payload)
            .trim_end()
            .to_string();
        self.name = head.to_string();
        true
    }
}

/// A group change announced through a system message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemEvent {
    MemberAdded {
        contact: String,
        /// `None` when the bot itself made the change.
        actor: Option<String>,
    },
    MemberRemoved {
        contact: String,
        actor: Option<String>,
    },
    TitleChanged {
        old: String,
        new: String,
        actor: Option<String>,
    },
    ImageChanged {
        deleted: bool,
        actor: Option<String>,
    },
}

static MEMBER_BY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^member (.+) (removed|added) by (.+)$").expect("member pattern")
});
static MEMBER_BY_SELF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^you (removed|added) member (.+)$").expect("own member pattern")
});
static GROUP_LEFT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^group left by (.+)$").expect("group left pattern"));
static TITLE_CHANGED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)^group name changed from "(.*)" to "(.*)"(?: by (.+))?$"#)
        .expect("title pattern")
});
static IMAGE_CHANGED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^group image (changed|deleted)(?: by (.+))?$").expect("image pattern")
});
static ADDR_IN_PARENS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([^()]+@[^()]+)\)").expect("address pattern"));

/// Pull the address out of `Display Name (addr@host).` style text.
fn extract_addr(text: &str) -> String {
    let text = text.trim();
    let addr = ADDR_IN_PARENS
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text);
    addr.trim_end_matches('.').trim().to_lowercase()
}

fn actor(text: Option<&str>) -> Option<String> {
    let addr = extract_addr(text?);
    match addr.as_str() {
        "" | "me" | "you" => None,
        _ => Some(addr),
    }
}

/// Recognize a system message text. Unknown templates give `None`.
pub fn parse_system_message(text: &str) -> Option<SystemEvent> {
    let text = text.trim().trim_end_matches('.');

    if let Some(caps) = MEMBER_BY.captures(text) {
        let contact = extract_addr(caps.get(1)?.as_str());
        let actor = actor(caps.get(3).map(|m| m.as_str()));
        return Some(if caps.get(2)?.as_str().eq_ignore_ascii_case("added") {
            SystemEvent::MemberAdded { contact, actor }
        } else {
            SystemEvent::MemberRemoved { contact, actor }
        });
    }

    if let Some(caps) = MEMBER_BY_SELF.captures(text) {
        let contact = extract_addr(caps.get(2)?.as_str());
        return Some(if caps.get(1)?.as_str().eq_ignore_ascii_case("added") {
            SystemEvent::MemberAdded {
                contact,
                actor: None,
            }
        } else {
            SystemEvent::MemberRemoved {
                contact,
                actor: None,
            }
        });
    }

    if let Some(caps) = GROUP_LEFT.captures(text) {
        let contact = extract_addr(caps.get(1)?.as_str());
        if contact.is_empty() {
            return None;
        }
        return Some(SystemEvent::MemberRemoved {
            actor: Some(contact.clone()),
            contact,
        });
    }

    if let Some(caps) = TITLE_CHANGED.captures(text) {
        return Some(SystemEvent::TitleChanged {
            old: caps.get(1)?.as_str().to_string(),
            new: caps.get(2)?.as_str().to_string(),
            actor: actor(caps.get(3).map(|m| m.as_str())),
        });
    }

    if let Some(caps) = IMAGE_CHANGED.captures(text) {
        return Some(SystemEvent::ImageChanged {
            deleted: caps.get(1)?.as_str().eq_ignore_ascii_case("deleted"),
            actor: actor(caps.get(2).map(|m| m.as_str())),
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_patterns_compile() {
        for pattern in [
            &MEMBER_BY,
            &MEMBER_BY_SELF,
            &GROUP_LEFT,
            &TITLE_CHANGED,
            &IMAGE_CHANGED,
            &ADDR_IN_PARENS,
        ] {
            Lazy::force(pattern);
        }
    }

    #[test]
    fn test_parse_command_line() {
        let line = CommandLine::parse("/echo  hello   world ").unwrap();
        assert_eq!(line.name, "/echo");
        assert_eq!(line.args, vec!["hello", "world"]);
        assert_eq!(line.payload, "hello   world ");

        let line = CommandLine::parse("/echo").unwrap();
        assert!(line.args.is_empty());
        assert_eq!(line.payload, "");

        assert!(CommandLine::parse("hello /echo").is_none());
    }

    #[test]
    fn test_shorten_moves_segments() {
        let mut line = CommandLine::parse("/some_group_123_456").unwrap();
        assert!(line.shorten());
        assert_eq!(line.name, "/some_group_123");
        assert_eq!(line.payload, "456");
        assert!(line.shorten());
        assert_eq!(line.name, "/some_group");
        assert_eq!(line.args, vec!["123", "456"]);
        assert_eq!(line.payload, "123 456");
    }

    #[test]
    fn test_shorten_keeps_payload_after_segments() {
        let mut line = CommandLine::parse("/vote_yes please").unwrap();
        assert!(line.shorten());
        assert_eq!(line.name, "/vote");
        assert_eq!(line.args, vec!["yes", "please"]);
        assert_eq!(line.payload, "yes please");
        assert!(!line.shorten());
    }

    #[test]
    fn test_mention() {
        let mut line = CommandLine::parse("/help@bot@example.org").unwrap();
        assert!(line.strip_mention("bot@example.org"));
        assert_eq!(line.name, "/help");

        let mut line = CommandLine::parse("/help@other@example.org").unwrap();
        assert!(!line.strip_mention("bot@example.org"));

        let mut line = CommandLine::parse("/help").unwrap();
        assert!(line.strip_mention("bot@example.org"));
    }

    #[test]
    fn test_member_added_by() {
        assert_eq!(
            parse_system_message("Member Alice (Alice@x.org) added by Bob (bob@x.org)."),
            Some(SystemEvent::MemberAdded {
                contact: "alice@x.org".to_string(),
                actor: Some("bob@x.org".to_string()),
            })
        );
        assert_eq!(
            parse_system_message("Member x@y.org removed by me."),
            Some(SystemEvent::MemberRemoved {
                contact: "x@y.org".to_string(),
                actor: None,
            })
        );
    }

    #[test]
    fn test_self_and_left() {
        assert_eq!(
            parse_system_message("You added member tmp1@x.org."),
            Some(SystemEvent::MemberAdded {
                contact: "tmp1@x.org".to_string(),
                actor: None,
            })
        );
        assert_eq!(
            parse_system_message("Group left by some one (tmp1@x.org)."),
            Some(SystemEvent::MemberRemoved {
                contact: "tmp1@x.org".to_string(),
                actor: Some("tmp1@x.org".to_string()),
            })
        );
    }

    #[test]
    fn test_title_and_image() {
        assert_eq!(
            parse_system_message(r#"Group name changed from "Old" to "New Name" by a@x.org."#),
            Some(SystemEvent::TitleChanged {
                old: "Old".to_string(),
                new: "New Name".to_string(),
                actor: Some("a@x.org".to_string()),
            })
        );
        assert_eq!(
            parse_system_message("Group image deleted by me."),
            Some(SystemEvent::ImageChanged {
                deleted: true,
                actor: None,
            })
        );
        assert_eq!(
            parse_system_message("Group image changed."),
            Some(SystemEvent::ImageChanged {
                deleted: false,
                actor: None,
            })
        );
    }

    #[test]
    fn test_unknown_template() {
        assert_eq!(parse_system_message("Messages are end-to-end encrypted."), None);
    }
}
