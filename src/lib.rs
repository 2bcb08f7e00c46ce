//! plugbot - a plugin-oriented chat bot framework
//!
//! A [`Bot`] owns a settings store, an administrator registry, a command
//! router, a filter chain and a plugin registry. Transport callbacks feed the
//! durable inbox; a single worker thread drains it and dispatches each event
//! to the registered hooks.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod plugins;

pub use application::errors::{BotError, BotResult, HandlerError, HandlerResult};
pub use application::{Bot, BotBuilder};
pub use plugins::{Plugin, PluginRegistry};
