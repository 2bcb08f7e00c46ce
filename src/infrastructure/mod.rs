//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: Configuration loading
//! - Database: SQLite persistence for settings and the inbox queue
//! - Adapters: Transport implementations (console, in-memory)

pub mod adapters;
pub mod config;
pub mod database;
