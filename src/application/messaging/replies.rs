//! Reply collector - buffers outgoing messages for one incoming event

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::application::errors::{BotError, ReplyError, TransportError};
use crate::domain::entities::{ChatId, MessageId, OutgoingMessage, ViewType};
use crate::domain::traits::Transport;

/// One scheduled outgoing message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub text: Option<String>,
    pub html: Option<String>,
    pub view_type: Option<ViewType>,
    /// A path to send, or the basename to give `bytes`.
    pub filename: Option<String>,
    pub bytes: Option<Vec<u8>>,
    /// Display name to send under instead of the bot's own.
    pub sender: Option<String>,
    pub quote: Option<MessageId>,
    /// Destination chat, defaults to the chat the event came from.
    pub chat: Option<ChatId>,
}

impl Reply {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    pub fn with_view_type(mut self, view_type: ViewType) -> Self {
        self.view_type = Some(view_type);
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_bytes(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.bytes = Some(bytes.into());
        self
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn with_quote(mut self, quote: MessageId) -> Self {
        self.quote = Some(quote);
        self
    }

    pub fn with_chat(mut self, chat: ChatId) -> Self {
        self.chat = Some(chat);
        self
    }

    fn validate(&self) -> Result<(), ReplyError> {
        if self.bytes.is_none() {
            return Ok(());
        }
        let filename = self.filename.as_deref().ok_or(ReplyError::MissingFilename)?;
        let is_basename = Path::new(filename)
            .file_name()
            .map(|name| name == filename)
            .unwrap_or(false);
        if !is_basename || filename.contains(['/', '\\']) {
            return Err(ReplyError::NotBasename(filename.to_string()));
        }
        Ok(())
    }
}

/// Ordered buffer of replies for one incoming message or event
#[derive(Debug)]
pub struct Replies {
    chat: ChatId,
    pending: Vec<Reply>,
}

impl Replies {
    /// A collector sending into `chat` unless a reply names another one.
    pub fn new(chat: ChatId) -> Self {
        Self {
            chat,
            pending: Vec::new(),
        }
    }

    /// Schedule a reply. Attachment bytes need a plain basename.
    pub fn add(&mut self, reply: Reply) -> Result<(), ReplyError> {
        reply.validate()?;
        self.pending.push(reply);
        Ok(())
    }

    pub fn has_replies(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> &[Reply] {
        &self.pending
    }

    /// Send every buffered reply in order and clear the buffer.
    ///
    /// Replies already sent stay sent when a later one fails; the rest of
    /// the batch is dropped.
    pub fn send(&mut self, transport: &dyn Transport) -> Result<Vec<MessageId>, BotError> {
        let batch = std::mem::take(&mut self.pending);
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let staging = if batch.iter().any(|r| r.bytes.is_some()) {
            Some(staging_dir(transport.blob_dir().as_deref())?)
        } else {
            None
        };

        let mut sent = Vec::with_capacity(batch.len());
        for (index, reply) in batch.into_iter().enumerate() {
            let chat = reply.chat.unwrap_or(self.chat);
            let preview: String = reply.text.as_deref().unwrap_or("").chars().take(50).collect();

            let result = compose(reply, staging.as_ref().map(|d| d.path()))
                .and_then(|msg| transport.send(chat, msg).map_err(BotError::from));
            match result {
                Ok(id) => {
                    info!("reply id={} chat={} sent with text: {:?}", id, chat, preview);
                    sent.push(id);
                }
                Err(e) => {
                    error!(
                        "sending reply {} to chat={} failed, {} sent before: {}",
                        index + 1,
                        chat,
                        sent.len(),
                        e
                    );
                    return Err(e);
                }
            }
        }
        Ok(sent)
    }
}

fn compose(reply: Reply, staging: Option<&Path>) -> Result<OutgoingMessage, BotError> {
    let file = match (reply.bytes, reply.filename) {
        (Some(bytes), Some(name)) => {
            let dir = staging
                .ok_or_else(|| TransportError::Send("no staging directory".to_string()))?;
            let path = dir.join(&name);
            std::fs::write(&path, bytes).map_err(TransportError::from)?;
            Some(path)
        }
        (Some(_), None) => return Err(ReplyError::MissingFilename.into()),
        (None, name) => name.map(PathBuf::from),
    };

    let view_type = match (reply.view_type, &file) {
        (Some(view_type), _) => view_type,
        (None, Some(_)) => ViewType::File,
        (None, None) => ViewType::Text,
    };

    Ok(OutgoingMessage {
        text: reply.text,
        html: reply.html,
        view_type,
        file,
        override_sender_name: reply.sender,
        quote: reply.quote,
    })
}

fn staging_dir(blob_dir: Option<&Path>) -> Result<tempfile::TempDir, BotError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("replies-");
    let dir = match blob_dir {
        Some(parent) => builder.tempdir_in(parent),
        None => builder.tempdir(),
    };
    dir.map_err(|e| BotError::Transport(TransportError::Io(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::memory::MemoryTransport;

    #[test]
    fn test_bytes_need_filename() {
        let mut replies = Replies::new(ChatId(1));
        let err = replies
            .add(Reply::new().with_bytes(b"content".to_vec()))
            .unwrap_err();
        assert_eq!(err, ReplyError::MissingFilename);
        assert!(!replies.has_replies());
    }

    #[test]
    fn test_bytes_need_basename() {
        let mut replies = Replies::new(ChatId(1));
        let err = replies
            .add(
                Reply::new()
                    .with_filename("dir/file.txt")
                    .with_bytes(b"content".to_vec()),
            )
            .unwrap_err();
        assert!(matches!(err, ReplyError::NotBasename(_)));
    }

    #[test]
    fn test_sent_in_order_and_cleared() {
        let transport = MemoryTransport::new("bot@example.org");
        let mut replies = Replies::new(ChatId(3));
        replies.add(Reply::text("hi")).unwrap();
        replies.add(Reply::text("bye")).unwrap();
        assert_eq!(replies.len(), 2);

        let ids = replies.send(&transport).unwrap();
        assert_eq!(ids.len(), 2);
        assert!(!replies.has_replies());

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].message.text.as_deref(), Some("hi"));
        assert_eq!(sent[1].message.text.as_deref(), Some("bye"));
        assert!(sent.iter().all(|s| s.chat == ChatId(3)));
    }

    #[test]
    fn test_attachment_staged_as_file() {
        let transport = MemoryTransport::new("bot@example.org");
        let mut replies = Replies::new(ChatId(3));
        replies
            .add(
                Reply::text("here")
                    .with_filename("notes.txt")
                    .with_bytes(b"hello".to_vec())
                    .with_chat(ChatId(9)),
            )
            .unwrap();
        replies.send(&transport).unwrap();

        let sent = transport.sent();
        assert_eq!(sent[0].chat, ChatId(9));
        assert_eq!(sent[0].message.view_type, ViewType::File);
        assert_eq!(sent[0].attachment.as_deref(), Some(&b"hello"[..]));
        let staged = sent[0].message.file.as_ref().unwrap();
        assert_eq!(staged.file_name().unwrap(), "notes.txt");
        assert!(!staged.exists());
    }

    #[test]
    fn test_partial_send_keeps_earlier_replies() {
        let transport = MemoryTransport::new("bot@example.org");
        transport.fail_after(1);
        let mut replies = Replies::new(ChatId(1));
        for text in ["one", "two", "three"] {
            replies.add(Reply::text(text)).unwrap();
        }

        assert!(replies.send(&transport).is_err());
        assert!(!replies.has_replies());
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message.text.as_deref(), Some("one"));
    }
}
