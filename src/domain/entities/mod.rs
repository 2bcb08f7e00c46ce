//! Domain entities - Core business objects

pub mod command;
pub mod message;
pub mod setting;
pub mod user;

pub use command::{
    CommandContext, CommandDefinition, CommandFn, FilterContext, FilterDefinition, FilterFlow,
    FilterFn, IncomingCommand, Param, Priority, COMMAND_PREFIX, WORD_SEPARATOR,
};
pub use message::{
    Chat, ChatId, ImageChange, IncomingMessage, MemberEvent, MessageId, OutgoingMessage,
    StatusUpdate, TitleChange, ViewType,
};
pub use setting::{
    PendingEvent, QueuedEvent, SettingKey, StoredSetting, GLOBAL_SCOPE, SCOPE_SEPARATOR,
};
pub use user::Contact;
