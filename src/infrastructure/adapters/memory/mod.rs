//! In-process transport, used by tests and as the console adapter's core

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::application::errors::TransportError;
use crate::domain::entities::{ChatId, Contact, IncomingMessage, MessageId, OutgoingMessage};
use crate::domain::traits::Transport;

/// A message handed to [`MemoryTransport::send`]
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub id: MessageId,
    pub chat: ChatId,
    pub message: OutgoingMessage,
    /// Attachment content, read when the message was sent.
    pub attachment: Option<Vec<u8>>,
}

#[derive(Default)]
struct MemoryState {
    messages: BTreeMap<MessageId, IncomingMessage>,
    sent: Vec<SentMessage>,
    accepted: Vec<MessageId>,
    blocked: BTreeSet<String>,
    config: BTreeMap<String, String>,
    next_id: u32,
    fail_after: Option<usize>,
}

/// Transport keeping everything in memory
#[derive(Clone)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
    blob_dir: Option<PathBuf>,
}

impl MemoryTransport {
    pub fn new(address: impl Into<String>) -> Self {
        let mut state = MemoryState::default();
        state.config.insert("addr".to_string(), address.into());
        Self {
            state: Arc::new(Mutex::new(state)),
            blob_dir: None,
        }
    }

    /// Transport without an account address yet.
    pub fn unconfigured() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            blob_dir: None,
        }
    }

    pub fn with_blob_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.blob_dir = Some(dir.into());
        self
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_id(state: &mut MemoryState) -> MessageId {
        state.next_id += 1;
        MessageId(state.next_id)
    }

    /// Store a received message under a fresh id and return that id.
    pub fn deliver(&self, mut message: IncomingMessage) -> MessageId {
        let mut state = self.state();
        let id = Self::next_id(&mut state);
        message.id = id;
        state.messages.insert(id, message);
        id
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.state().sent.clone()
    }

    pub fn take_sent(&self) -> Vec<SentMessage> {
        std::mem::take(&mut self.state().sent)
    }

    /// Messages whose chat was accepted
    pub fn accepted(&self) -> Vec<MessageId> {
        self.state().accepted.clone()
    }

    /// Fail every send once `count` messages have been sent in total.
    pub fn fail_after(&self, count: usize) {
        self.state().fail_after = Some(count);
    }

    pub fn restore(&self) {
        self.state().fail_after = None;
    }

    /// Replace the account config, e.g. with a persisted one.
    pub fn set_configs(&self, config: BTreeMap<String, String>) {
        self.state().config = config;
    }
}

impl Transport for MemoryTransport {
    fn self_contact(&self) -> Contact {
        let state = self.state();
        let address = state.config.get("addr").cloned().unwrap_or_default();
        match state.config.get("displayname") {
            Some(name) => Contact::new(address).with_name(name.clone()),
            None => Contact::new(address),
        }
    }

    fn is_configured(&self) -> bool {
        self.state()
            .config
            .get("addr")
            .map(|addr| !addr.is_empty())
            .unwrap_or(false)
    }

    fn message(&self, id: MessageId) -> Result<Option<IncomingMessage>, TransportError> {
        Ok(self.state().messages.get(&id).cloned())
    }

    fn accept_chat(&self, id: MessageId) -> Result<(), TransportError> {
        let mut state = self.state();
        if !state.messages.contains_key(&id) {
            return Err(TransportError::UnknownMessage(id));
        }
        state.accepted.push(id);
        Ok(())
    }

    fn send(&self, chat: ChatId, message: OutgoingMessage) -> Result<MessageId, TransportError> {
        let mut state = self.state();
        if let Some(limit) = state.fail_after {
            if state.sent.len() >= limit {
                return Err(TransportError::Send(format!(
                    "transport unavailable after {} messages",
                    limit
                )));
            }
        }

        let attachment = match &message.file {
            Some(path) => Some(std::fs::read(path)?),
            None => None,
        };
        let id = Self::next_id(&mut state);
        state.sent.push(SentMessage {
            id,
            chat,
            message,
            attachment,
        });
        Ok(id)
    }

    fn block_contact(&self, address: &str) -> Result<(), TransportError> {
        self.state().blocked.insert(address.to_string());
        Ok(())
    }

    fn unblock_contact(&self, address: &str) -> Result<(), TransportError> {
        self.state().blocked.remove(address);
        Ok(())
    }

    fn is_blocked(&self, address: &str) -> bool {
        self.state().blocked.contains(address)
    }

    fn blocked_contacts(&self) -> Vec<String> {
        self.state().blocked.iter().cloned().collect()
    }

    fn get_config(&self, key: &str) -> Option<String> {
        self.state().config.get(key).cloned()
    }

    fn set_config(&self, key: &str, value: &str) -> Result<(), TransportError> {
        self.state()
            .config
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn info(&self) -> Vec<(String, String)> {
        let state = self.state();
        let mut info: Vec<(String, String)> = state
            .config
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        info.push(("messages".to_string(), state.messages.len().to_string()));
        info.push(("sent".to_string(), state.sent.len().to_string()));
        info.push(("blocked".to_string(), state.blocked.len().to_string()));
        info
    }

    fn blob_dir(&self) -> Option<PathBuf> {
        self.blob_dir.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Chat;

    #[test]
    fn test_deliver_assigns_ids() {
        let transport = MemoryTransport::new("bot@example.org");
        let msg = IncomingMessage::new(Chat::direct(ChatId(1), "a"), Contact::new("a@x.org"), "hi");
        let first = transport.deliver(msg.clone());
        let second = transport.deliver(msg);
        assert_ne!(first, second);
        assert_eq!(transport.message(second).unwrap().unwrap().id, second);
        assert!(transport.message(MessageId(77)).unwrap().is_none());
    }

    #[test]
    fn test_outage() {
        let transport = MemoryTransport::new("bot@example.org");
        transport.fail_after(1);
        transport.send(ChatId(1), OutgoingMessage::text("a")).unwrap();
        assert!(transport.send(ChatId(1), OutgoingMessage::text("b")).is_err());
        transport.restore();
        transport.send(ChatId(1), OutgoingMessage::text("c")).unwrap();
        assert_eq!(transport.take_sent().len(), 2);
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_configured() {
        assert!(MemoryTransport::new("bot@example.org").is_configured());
        let transport = MemoryTransport::unconfigured();
        assert!(!transport.is_configured());
        transport.set_config("addr", "bot@example.org").unwrap();
        assert_eq!(transport.self_contact().address, "bot@example.org");
    }
}
