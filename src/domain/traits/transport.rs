use std::path::PathBuf;

use crate::application::errors::TransportError;
use crate::domain::entities::{ChatId, Contact, IncomingMessage, MessageId, OutgoingMessage};

/// Transport trait - abstraction over the chat protocol client library.
///
/// The transport owns connections, encryption and the chat/contact object
/// model. The bot only looks messages up by id and sends composed messages
/// back.
pub trait Transport: Send + Sync {
    /// This account's own contact.
    fn self_contact(&self) -> Contact;

    /// Whether the account has been set up and can serve.
    fn is_configured(&self) -> bool;

    /// Look up a received message.
    fn message(&self, id: MessageId) -> Result<Option<IncomingMessage>, TransportError>;

    /// Accept the chat a message arrived in, so contact requests need no
    /// manual approval.
    fn accept_chat(&self, id: MessageId) -> Result<(), TransportError>;

    /// Send a composed message into a chat, returning the new message id.
    fn send(&self, chat: ChatId, message: OutgoingMessage) -> Result<MessageId, TransportError>;

    fn block_contact(&self, address: &str) -> Result<(), TransportError>;

    fn unblock_contact(&self, address: &str) -> Result<(), TransportError>;

    fn is_blocked(&self, address: &str) -> bool;

    fn blocked_contacts(&self) -> Vec<String>;

    /// Low level account configuration.
    fn get_config(&self, key: &str) -> Option<String>;

    fn set_config(&self, key: &str, value: &str) -> Result<(), TransportError>;

    /// Key/value summary of the account for display.
    fn info(&self) -> Vec<(String, String)>;

    /// Directory where attachments can be staged before sending.
    fn blob_dir(&self) -> Option<PathBuf> {
        None
    }

    /// Start network I/O.
    fn start(&self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Stop network I/O and release resources.
    fn shutdown(&self) {}
}
