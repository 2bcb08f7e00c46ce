//! Domain layer - Core business objects and boundaries
//!
//! This layer contains:
//! - Entities: messages, contacts, command and filter definitions, settings keys
//! - Traits: the transport boundary to the chat protocol library

pub mod entities;
pub mod traits;
