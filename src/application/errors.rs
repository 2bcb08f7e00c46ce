//! Application layer errors

use thiserror::Error;

use crate::domain::entities::{MessageId, Param};

/// General bot errors
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    #[error("Reply error: {0}")]
    Reply(#[from] ReplyError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Plugin error: {0}")]
    Plugin(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Errors raised synchronously while registering commands, filters or plugins
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("command {name:?} fails to register, conflicts with: {existing:?}")]
    Conflict { name: String, existing: String },

    #[error("{kind} {name:?} already registered")]
    Duplicate { kind: &'static str, name: String },

    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("{name:?} needs to have a description")]
    MissingDescription { name: String },

    #[error("{name:?} requests an invalid argument: {param:?}, valid arguments: {valid}")]
    InvalidParam {
        name: String,
        param: String,
        valid: String,
    },
}

/// Errors raised from inside a command, filter or hook handler
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("parameter {0:?} was not declared by this handler")]
    Undeclared(Param),

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Reply(#[from] ReplyError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Bot(Box<BotError>),
}

impl HandlerError {
    pub fn failed(msg: impl Into<String>) -> Self {
        HandlerError::Failed(msg.into())
    }
}

impl From<BotError> for HandlerError {
    fn from(err: BotError) -> Self {
        HandlerError::Bot(Box::new(err))
    }
}

/// Reply directive validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplyError {
    #[error("missing filename suggestion, needed with attachment bytes")]
    MissingFilename,

    #[error("if attachment bytes are given, filename must be a basename, not a path: {0:?}")]
    NotBasename(String),
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database lock poisoned")]
    Poisoned,
}

/// Errors reported by the chat transport
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("message {0} not found")]
    UnknownMessage(MessageId),

    #[error("failed to send message: {0}")]
    Send(String),

    #[error("account not configured")]
    NotConfigured,

    #[error("invalid config key: {0:?}")]
    InvalidConfigKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type BotResult<T> = Result<T, BotError>;

pub type HandlerResult<T = ()> = Result<T, HandlerError>;
