//! Message handling - inbox queue, parsing and reply collection

pub mod dispatcher;
pub mod parser;
pub mod replies;

pub use dispatcher::{process_pending, Inbox, InboxWorker};
pub use parser::{CommandLine, SystemEvent};
pub use replies::{Replies, Reply};
