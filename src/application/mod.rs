//! Application layer - Use cases and business logic
//!
//! This layer contains:
//! - Bot: the assembled instance owning registries and settings
//! - Services: settings, administrators, command router, filter chain
//! - Messaging: inbox worker, parsing, reply collection
//! - Errors: error types for every layer

pub mod bot;
pub mod errors;
pub mod messaging;
pub mod services;

pub use bot::{Bot, BotBuilder};
