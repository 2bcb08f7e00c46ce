//! Console adapter for development/testing
//!
//! Lines typed on stdin arrive as messages from one fixed sender in a direct
//! chat; replies are printed. Account config and the blocked list live in
//! the settings store so one-shot CLI commands and `serve` share them. The
//! blocked list is read from the store on every lookup.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{error, info};

use crate::application::errors::{StorageError, TransportError};
use crate::application::services::Settings;
use crate::domain::entities::{
    Chat, ChatId, Contact, IncomingMessage, MessageId, OutgoingMessage, SettingKey,
    SCOPE_SEPARATOR,
};
use crate::domain::traits::Transport;
use crate::infrastructure::adapters::memory::MemoryTransport;

/// Settings scope holding the account config
pub const ACCOUNT_SCOPE: &str = "account";

const BLOCKED_KEY: &str = "blocked-contacts";

/// Chat id of the single console conversation
pub const CONSOLE_CHAT: ChatId = ChatId(1);

pub struct ConsoleAdapter {
    inner: MemoryTransport,
    settings: Settings,
    sender: Contact,
}

impl ConsoleAdapter {
    /// Load the persisted account into a fresh adapter.
    pub fn new(settings: Settings, sender: Contact) -> Result<Self, StorageError> {
        let inner = MemoryTransport::unconfigured();

        let config: BTreeMap<String, String> = settings
            .list(Some(ACCOUNT_SCOPE))?
            .into_iter()
            .filter(|(key, _)| key != BLOCKED_KEY)
            .collect();
        inner.set_configs(config);

        Ok(Self {
            inner,
            settings,
            sender,
        })
    }

    pub fn with_blob_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.inner = self.inner.with_blob_dir(dir);
        self
    }

    fn blocked_key() -> SettingKey {
        SettingKey::new(ACCOUNT_SCOPE, BLOCKED_KEY)
    }

    fn load_blocked(&self) -> Vec<String> {
        match self.settings.get_list(&Self::blocked_key()) {
            Ok(blocked) => blocked.unwrap_or_default(),
            Err(e) => {
                error!("failed to read blocked contacts: {}", e);
                Vec::new()
            }
        }
    }

    /// Feed one typed line in as an incoming message.
    pub fn receive(&self, text: &str) -> MessageId {
        let chat = Chat::direct(CONSOLE_CHAT, self.sender.display_name());
        self.inner
            .deliver(IncomingMessage::new(chat, self.sender.clone(), text.trim_end()))
    }

    pub fn sender(&self) -> &Contact {
        &self.sender
    }
}

impl Transport for ConsoleAdapter {
    fn self_contact(&self) -> Contact {
        self.inner.self_contact()
    }

    fn is_configured(&self) -> bool {
        self.inner.is_configured()
    }

    fn message(&self, id: MessageId) -> Result<Option<IncomingMessage>, TransportError> {
        self.inner.message(id)
    }

    fn accept_chat(&self, id: MessageId) -> Result<(), TransportError> {
        self.inner.accept_chat(id)
    }

    fn send(&self, chat: ChatId, message: OutgoingMessage) -> Result<MessageId, TransportError> {
        let prefix = match &message.override_sender_name {
            Some(name) => format!("[BOT as {}]", name),
            None => "[BOT]".to_string(),
        };
        if let Some(text) = &message.text {
            println!("{} {}", prefix, text);
        }
        if let Some(file) = &message.file {
            println!("{} [{}] {}", prefix, message.view_type.as_str(), file.display());
        }
        self.inner.send(chat, message)
    }

    fn block_contact(&self, address: &str) -> Result<(), TransportError> {
        self.settings
            .update_list(&Self::blocked_key(), &[], |blocked| {
                if blocked.iter().any(|a| a == address) {
                    return false;
                }
                blocked.push(address.to_string());
                true
            })?;
        Ok(())
    }

    fn unblock_contact(&self, address: &str) -> Result<(), TransportError> {
        self.settings
            .update_list(&Self::blocked_key(), &[], |blocked| {
                let before = blocked.len();
                blocked.retain(|a| a != address);
                blocked.len() != before
            })?;
        Ok(())
    }

    fn is_blocked(&self, address: &str) -> bool {
        self.load_blocked().iter().any(|a| a == address)
    }

    fn blocked_contacts(&self) -> Vec<String> {
        self.load_blocked()
    }

    fn get_config(&self, key: &str) -> Option<String> {
        self.inner.get_config(key)
    }

    fn set_config(&self, key: &str, value: &str) -> Result<(), TransportError> {
        if key.is_empty() || key.contains(SCOPE_SEPARATOR) || key == BLOCKED_KEY {
            return Err(TransportError::InvalidConfigKey(key.to_string()));
        }
        self.settings
            .set(&SettingKey::new(ACCOUNT_SCOPE, key), value)?;
        self.inner.set_config(key, value)
    }

    fn info(&self) -> Vec<(String, String)> {
        let mut info = self.inner.info();
        info.push(("transport".to_string(), "console".to_string()));
        info
    }

    fn blob_dir(&self) -> Option<PathBuf> {
        self.inner.blob_dir()
    }

    fn start(&self) -> Result<(), TransportError> {
        if !self.is_configured() {
            return Err(TransportError::NotConfigured);
        }
        info!("Starting console bot (dev mode)");
        Ok(())
    }

    fn shutdown(&self) {
        info!("console transport closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::Database;
    use std::sync::Arc;

    fn settings() -> Settings {
        Settings::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    #[test]
    fn test_config_and_blocked_persist() {
        let settings = settings();
        {
            let adapter = ConsoleAdapter::new(settings.clone(), Contact::new("me@local")).unwrap();
            assert!(!adapter.is_configured());
            adapter.set_config("addr", "bot@example.org").unwrap();
            adapter.block_contact("spam@example.org").unwrap();
        }

        let adapter = ConsoleAdapter::new(settings, Contact::new("me@local")).unwrap();
        assert!(adapter.is_configured());
        assert_eq!(adapter.self_contact().address, "bot@example.org");
        assert!(adapter.is_blocked("spam@example.org"));
        assert_eq!(adapter.get_config(BLOCKED_KEY), None);

        adapter.unblock_contact("spam@example.org").unwrap();
        assert!(adapter.blocked_contacts().is_empty());
    }

    #[test]
    fn test_blocked_list_shared_between_adapters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.db");
        let open = || {
            let db = Arc::new(Database::new(&path).unwrap());
            ConsoleAdapter::new(Settings::new(db), Contact::new("me@local")).unwrap()
        };
        let serving = open();
        let cli = open();

        cli.block_contact("spam@example.org").unwrap();
        assert!(serving.is_blocked("spam@example.org"));

        serving.block_contact("junk@example.org").unwrap();
        cli.block_contact("more@example.org").unwrap();
        assert_eq!(
            serving.blocked_contacts(),
            vec!["spam@example.org", "junk@example.org", "more@example.org"]
        );

        cli.unblock_contact("spam@example.org").unwrap();
        assert!(!serving.is_blocked("spam@example.org"));
        assert_eq!(cli.blocked_contacts().len(), 2);
    }

    #[test]
    fn test_invalid_config_key() {
        let adapter = ConsoleAdapter::new(settings(), Contact::new("me@local")).unwrap();
        assert!(matches!(
            adapter.set_config("a/b", "x"),
            Err(TransportError::InvalidConfigKey(_))
        ));
    }

    #[test]
    fn test_receive_delivers_direct_message() {
        let adapter = ConsoleAdapter::new(settings(), Contact::new("me@local")).unwrap();
        let id = adapter.receive("/help\n");
        let msg = adapter.message(id).unwrap().unwrap();
        assert_eq!(msg.text, "/help");
        assert_eq!(msg.sender.address, "me@local");
        assert!(!msg.chat.is_group);
    }
}
