//! Application services - settings, administrators, commands and filters

pub mod admin_service;
pub mod command_service;
pub mod filter_service;
pub mod settings_service;

pub use admin_service::Admins;
pub use command_service::CommandRouter;
pub use filter_service::FilterChain;
pub use settings_service::Settings;
