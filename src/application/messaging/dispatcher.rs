//! Event dispatcher - durable inbox queue and the worker draining it

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::application::errors::{BotError, BotResult, TransportError};
use crate::application::Bot;
use crate::domain::entities::{
    Contact, ImageChange, IncomingMessage, MemberEvent, MessageId, PendingEvent, StatusUpdate,
    TitleChange,
};
use crate::domain::traits::Transport;
use crate::infrastructure::database::Database;

use super::parser::{parse_system_message, SystemEvent};
use super::Replies;

/// Name of the worker thread
pub const WORKER_THREAD: &str = "bot-event-handler";

/// Default bound on waiting for the worker to stop
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Auto-reset wake-up flag for the worker
pub struct Signal {
    flag: Mutex<bool>,
    cond: Condvar,
}

impl Signal {
    /// Starts set so the first wait drains whatever is already queued.
    pub fn new() -> Self {
        Self {
            flag: Mutex::new(true),
            cond: Condvar::new(),
        }
    }

    pub fn notify(&self) {
        let mut flag = self.flag.lock().unwrap_or_else(|e| e.into_inner());
        *flag = true;
        self.cond.notify_all();
    }

    /// Block until notified, then clear the flag.
    pub fn wait(&self) {
        let mut flag = self.flag.lock().unwrap_or_else(|e| e.into_inner());
        while !*flag {
            flag = self.cond.wait(flag).unwrap_or_else(|e| e.into_inner());
        }
        *flag = false;
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer side of the inbox: transport callbacks enqueue and signal,
/// they never run handlers.
#[derive(Clone)]
pub struct Inbox {
    transport: Arc<dyn Transport>,
    db: Arc<Database>,
    signal: Arc<Signal>,
}

impl Inbox {
    pub(crate) fn new(transport: Arc<dyn Transport>, db: Arc<Database>, signal: Arc<Signal>) -> Self {
        Self {
            transport,
            db,
            signal,
        }
    }

    /// A new message arrived.
    pub fn incoming_message(&self, id: MessageId) -> BotResult<()> {
        self.transport.accept_chat(id)?;
        if let Some(message) = self.transport.message(id)? {
            info!(
                "incoming message from {} id={} chat={} text={:?}",
                message.sender.address,
                id,
                message.chat.id,
                message.preview(50)
            );
        }
        self.enqueue(PendingEvent::Message(id))
    }

    pub fn member_added(&self, id: MessageId) -> BotResult<()> {
        self.enqueue(PendingEvent::Message(id))
    }

    pub fn member_removed(&self, id: MessageId) -> BotResult<()> {
        self.enqueue(PendingEvent::Message(id))
    }

    pub fn message_delivered(&self, id: MessageId) {
        info!("message delivered id={}", id);
    }

    /// An application status update arrived for message `id`.
    pub fn status_update(
        &self,
        id: MessageId,
        serial: u64,
        payload: serde_json::Value,
    ) -> BotResult<()> {
        self.enqueue(PendingEvent::StatusUpdate(StatusUpdate {
            msg_id: id,
            serial,
            payload,
        }))
    }

    fn enqueue(&self, event: PendingEvent) -> BotResult<()> {
        if !self.db.put_event(&event)? {
            debug!("event for message id={} already queued", event.msg_id());
        }
        self.signal.notify();
        Ok(())
    }
}

/// Drain the inbox queue once, oldest first. Every entry is removed after
/// its processing attempt, whatever the outcome. Returns how many entries
/// were processed.
pub fn process_pending(bot: &Bot) -> usize {
    let events = match bot.database().pending_events() {
        Ok(events) => events,
        Err(e) => {
            error!("reading inbox queue failed: {}", e);
            return 0;
        }
    };
    if events.is_empty() {
        return 0;
    }

    info!("inbox drain start, {} pending", events.len());
    let count = events.len();
    for queued in events {
        let id = queued.event.msg_id();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| process_event(bot, &queued.event)));
        match outcome {
            Ok(Ok(())) => info!("processing message id={} FINISHED", id),
            Ok(Err(e)) => error!("processing message={} failed: {}", id, e),
            Err(_) => error!("processing message={} panicked", id),
        }
        if let Err(e) = bot.database().pop_event(queued.id) {
            error!("removing message={} from inbox failed: {}", id, e);
        }
    }
    info!("inbox drain finish");
    count
}

fn process_event(bot: &Bot, event: &PendingEvent) -> BotResult<()> {
    let id = event.msg_id();
    let message = bot
        .transport()
        .message(id)?
        .ok_or(TransportError::UnknownMessage(id))?;

    if !message.is_eligible() {
        debug!("ignoring classic email id={}", id);
        return Ok(());
    }

    let mut replies = Replies::new(message.chat.id);
    match event {
        PendingEvent::StatusUpdate(update) => {
            info!(
                "processing status update serial={} for message id={}",
                update.serial, id
            );
            bot.plugins().call_all("status_update", |p| {
                p.status_update(bot, &message, update, &mut replies)
            });
        }
        PendingEvent::Message(_) if message.system => {
            handle_system_message(bot, &message, &mut replies);
        }
        PendingEvent::Message(_) => {
            if bot.transport().is_blocked(&message.sender.address) {
                info!(
                    "ignoring message id={} from banned sender {}",
                    id, message.sender.address
                );
            } else {
                info!("processing incoming fresh message id={}", id);
                let consumed = bot.plugins().first_result("incoming_message", |p| {
                    Ok(p.incoming_message(bot, &message, &mut replies)?.then_some(()))
                })?;
                if let Some((plugin, ())) = consumed {
                    debug!("message id={} consumed by plugin {}", id, plugin);
                }
            }
        }
    }

    replies.send(bot.transport())?;
    Ok(())
}

fn handle_system_message(bot: &Bot, message: &IncomingMessage, replies: &mut Replies) {
    let Some(event) = parse_system_message(&message.text) else {
        info!(
            "ignoring system message id={} text: {}",
            message.id, message.text
        );
        return;
    };

    let plugins = bot.plugins();
    match event {
        SystemEvent::MemberAdded { contact, actor } => {
            let event = member_event(message, contact, actor);
            info!("calling hook member_added");
            plugins.call_all("member_added", |p| p.member_added(bot, &event, replies));
        }
        SystemEvent::MemberRemoved { contact, actor } => {
            let event = member_event(message, contact, actor);
            info!("calling hook member_removed");
            plugins.call_all("member_removed", |p| p.member_removed(bot, &event, replies));
        }
        SystemEvent::TitleChanged { old, new, actor } => {
            let event = TitleChange {
                chat: message.chat.clone(),
                old,
                new,
                actor: actor.map(Contact::new),
                message: message.clone(),
            };
            info!("calling hook title_changed");
            plugins.call_all("title_changed", |p| p.title_changed(bot, &event, replies));
        }
        SystemEvent::ImageChanged { deleted, actor } => {
            let event = ImageChange {
                chat: message.chat.clone(),
                deleted,
                actor: actor.map(Contact::new),
                message: message.clone(),
            };
            info!("calling hook image_changed");
            plugins.call_all("image_changed", |p| p.image_changed(bot, &event, replies));
        }
    }
}

fn member_event(message: &IncomingMessage, contact: String, actor: Option<String>) -> MemberEvent {
    MemberEvent {
        chat: message.chat.clone(),
        contact: Contact::new(contact),
        actor: actor.map(Contact::new),
        message: message.clone(),
    }
}

/// The single thread draining the inbox
pub struct InboxWorker {
    running: Arc<AtomicBool>,
    signal: Arc<Signal>,
    handle: Option<JoinHandle<()>>,
    done: mpsc::Receiver<()>,
    timeout: Duration,
}

impl InboxWorker {
    /// Spawn the worker. `timeout` bounds how long [`InboxWorker::stop`]
    /// waits for it.
    pub fn start(bot: Arc<Bot>, timeout: Duration) -> BotResult<Self> {
        info!("starting {} THREAD", WORKER_THREAD);
        let running = Arc::new(AtomicBool::new(true));
        let signal = bot.signal().clone();
        let (done_tx, done) = mpsc::channel();

        let handle = thread::Builder::new()
            .name(WORKER_THREAD.to_string())
            .spawn({
                let running = running.clone();
                let signal = signal.clone();
                move || {
                    debug!("event-worker startup");
                    while running.load(Ordering::SeqCst) {
                        signal.wait();
                        process_pending(&bot);
                    }
                    debug!("event-worker exit");
                    let _ = done_tx.send(());
                }
            })
            .map_err(|e| BotError::Transport(TransportError::Io(e)))?;

        Ok(Self {
            running,
            signal,
            handle: Some(handle),
            done,
            timeout,
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some() && self.running.load(Ordering::SeqCst)
    }

    /// Ask the worker to finish its current drain and exit. Returns `false`
    /// if it did not stop within the timeout.
    pub fn stop(&mut self) -> bool {
        let Some(handle) = self.handle.take() else {
            return true;
        };
        self.running.store(false, Ordering::SeqCst);
        self.signal.notify();

        match self.done.recv_timeout(self.timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    error!("{} thread panicked", WORKER_THREAD);
                }
                info!("{} stopped", WORKER_THREAD);
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "{} did not stop within {:?}, leaving it behind",
                    WORKER_THREAD, self.timeout
                );
                false
            }
        }
    }
}

impl Drop for InboxWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Chat, ChatId};
    use crate::infrastructure::adapters::memory::MemoryTransport;

    fn bot() -> (Arc<MemoryTransport>, Arc<Bot>) {
        let transport = Arc::new(MemoryTransport::new("bot@example.org"));
        let db = Arc::new(Database::open_in_memory().unwrap());
        let bot = Bot::builder(transport.clone(), db).build().unwrap();
        (transport, bot)
    }

    fn text(body: &str) -> IncomingMessage {
        IncomingMessage::new(
            Chat::direct(ChatId(1), "alice"),
            Contact::new("alice@example.org"),
            body,
        )
    }

    #[test]
    fn test_signal_starts_set_and_resets() {
        let signal = Signal::new();
        signal.wait();
        signal.notify();
        signal.wait();
        assert!(!*signal.flag.lock().unwrap());
    }

    #[test]
    fn test_classic_email_ignored_and_dequeued() {
        let (transport, bot) = bot();
        let id = transport.deliver(text("/help").with_chat_marker(false));
        bot.inbox().incoming_message(id).unwrap();

        assert_eq!(process_pending(&bot), 1);
        assert!(transport.sent().is_empty());
        assert!(bot.database().pending_events().unwrap().is_empty());
    }

    #[test]
    fn test_encrypted_without_marker_processed() {
        let (transport, bot) = bot();
        let msg = text("/nonexistent").with_chat_marker(false).with_encrypted(true);
        let id = transport.deliver(msg);
        bot.inbox().incoming_message(id).unwrap();
        process_pending(&bot);
        assert_eq!(transport.sent().len(), 1);
    }

    #[test]
    fn test_unknown_message_dequeued() {
        let (_transport, bot) = bot();
        bot.inbox().member_added(MessageId(999)).unwrap();
        assert_eq!(process_pending(&bot), 1);
        assert!(bot.database().pending_events().unwrap().is_empty());
    }

    #[test]
    fn test_incoming_accepts_chat() {
        let (transport, bot) = bot();
        let id = transport.deliver(text("hello"));
        bot.inbox().incoming_message(id).unwrap();
        assert!(transport.accepted().contains(&id));
        assert_eq!(bot.database().pending_events().unwrap().len(), 1);
    }

    #[test]
    fn test_worker_drains_and_stops() {
        let (transport, bot) = bot();
        let mut worker = InboxWorker::start(bot.clone(), Duration::from_secs(5)).unwrap();
        assert!(worker.is_running());

        let id = transport.deliver(text("/help"));
        bot.inbox().incoming_message(id).unwrap();

        let mut waited = 0;
        while transport.sent().is_empty() && waited < 200 {
            thread::sleep(Duration::from_millis(10));
            waited += 1;
        }
        assert!(worker.stop());
        assert!(!worker.is_running());
        assert_eq!(transport.sent().len(), 1);
    }
}
