//! Plugins every bot carries

pub mod admin;
pub mod settings;

use std::sync::Arc;

use crate::plugins::Plugin;

pub use admin::AdminPlugin;
pub use settings::SettingsPlugin;

/// Built-in plugins with the names they register under
pub fn plugins() -> Vec<(&'static str, Arc<dyn Plugin>)> {
    let admin: Arc<dyn Plugin> = Arc::new(AdminPlugin);
    let settings: Arc<dyn Plugin> = Arc::new(SettingsPlugin);
    vec![("admin", admin), ("settings", settings)]
}
