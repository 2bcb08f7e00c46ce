use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Contact;

/// Transport-assigned message identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub u32);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport-assigned chat identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChatId(pub u32);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A one-to-one or group chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    pub id: ChatId,
    pub name: String,
    pub is_group: bool,
}

impl Chat {
    pub fn direct(id: ChatId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            is_group: false,
        }
    }

    pub fn group(id: ChatId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            is_group: true,
        }
    }
}

/// Type of message content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewType {
    #[default]
    Text,
    File,
    Image,
    Gif,
    Audio,
    Voice,
    Video,
    Sticker,
}

impl ViewType {
    pub fn as_str(&self) -> &str {
        match self {
            ViewType::Text => "text",
            ViewType::File => "file",
            ViewType::Image => "image",
            ViewType::Gif => "gif",
            ViewType::Audio => "audio",
            ViewType::Voice => "voice",
            ViewType::Video => "video",
            ViewType::Sticker => "sticker",
        }
    }
}

impl FromStr for ViewType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(ViewType::Text),
            "file" => Ok(ViewType::File),
            "image" => Ok(ViewType::Image),
            "gif" => Ok(ViewType::Gif),
            "audio" => Ok(ViewType::Audio),
            "voice" => Ok(ViewType::Voice),
            "video" => Ok(ViewType::Video),
            "sticker" => Ok(ViewType::Sticker),
            other => Err(format!("unknown view type: {}", other)),
        }
    }
}

/// A message received from the transport
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub id: MessageId,
    pub chat: Chat,
    pub sender: Contact,
    pub text: String,
    pub html: Option<String>,
    pub filename: Option<PathBuf>,
    pub view_type: ViewType,
    /// End-to-end encrypted.
    pub encrypted: bool,
    /// Carries the chat protocol marker header, i.e. was not sent by a
    /// plain mail client.
    pub chat_marker: bool,
    /// Protocol-level notification (member added, title changed, ...).
    pub system: bool,
    pub quote: Option<MessageId>,
    pub timestamp: DateTime<Utc>,
}

impl IncomingMessage {
    pub fn new(chat: Chat, sender: Contact, text: impl Into<String>) -> Self {
        Self {
            id: MessageId(0),
            chat,
            sender,
            text: text.into(),
            html: None,
            filename: None,
            view_type: ViewType::Text,
            encrypted: false,
            chat_marker: true,
            system: false,
            quote: None,
            timestamp: Utc::now(),
        }
    }

    /// A protocol notification with the given template text.
    pub fn system(chat: Chat, sender: Contact, text: impl Into<String>) -> Self {
        let mut msg = Self::new(chat, sender, text);
        msg.system = true;
        msg
    }

    pub fn with_id(mut self, id: MessageId) -> Self {
        self.id = id;
        self
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    pub fn with_file(mut self, filename: impl Into<PathBuf>, view_type: ViewType) -> Self {
        self.filename = Some(filename.into());
        self.view_type = view_type;
        self
    }

    pub fn with_quote(mut self, quote: MessageId) -> Self {
        self.quote = Some(quote);
        self
    }

    pub fn with_encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }

    pub fn with_chat_marker(mut self, marker: bool) -> Self {
        self.chat_marker = marker;
        self
    }

    /// Plain mail without marker or encryption is not processed.
    pub fn is_eligible(&self) -> bool {
        self.chat_marker || self.encrypted
    }

    /// First `max` characters of the text, for log lines.
    pub fn preview(&self, max: usize) -> String {
        self.text.chars().take(max).collect()
    }
}

/// A composed message ready to be sent into a chat
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: Option<String>,
    pub html: Option<String>,
    pub view_type: ViewType,
    pub file: Option<PathBuf>,
    pub override_sender_name: Option<String>,
    pub quote: Option<MessageId>,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

/// Application-specific status update attached to a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub msg_id: MessageId,
    pub serial: u64,
    pub payload: serde_json::Value,
}

/// A member was added to or removed from a group
#[derive(Debug, Clone)]
pub struct MemberEvent {
    pub chat: Chat,
    pub contact: Contact,
    /// `None` when the bot itself performed the change.
    pub actor: Option<Contact>,
    pub message: IncomingMessage,
}

/// The group title was changed
#[derive(Debug, Clone)]
pub struct TitleChange {
    pub chat: Chat,
    pub old: String,
    pub new: String,
    pub actor: Option<Contact>,
    pub message: IncomingMessage,
}

/// The group image was replaced or deleted
#[derive(Debug, Clone)]
pub struct ImageChange {
    pub chat: Chat,
    pub deleted: bool,
    pub actor: Option<Contact>,
    pub message: IncomingMessage,
}
