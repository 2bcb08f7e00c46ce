//! Plugin system for the bot
//!
//! Plugins implement [`Plugin`] and register under a unique name in the
//! [`PluginRegistry`]. Bundled plugins are enabled by name, either from the
//! config file or with `plugin --add`.

pub mod builtin;
pub mod echo;
pub mod manager;
pub mod trait_def;

use std::sync::Arc;

use crate::application::errors::{BotError, BotResult};
use crate::application::services::Settings;
use crate::domain::entities::SettingKey;

pub use echo::EchoPlugin;
pub use manager::PluginRegistry;
pub use trait_def::Plugin;

/// Setting holding the newline separated names of enabled bundled plugins
pub const ENABLED_PLUGINS_KEY: &str = "enabled-plugins";

/// Names of the plugins shipped with the binary
pub const BUNDLED: &[&str] = &["echo"];

/// Look up a bundled plugin by name
pub fn bundled(name: &str) -> Option<Arc<dyn Plugin>> {
    match name {
        "echo" => Some(Arc::new(EchoPlugin)),
        _ => None,
    }
}

fn enabled_key() -> SettingKey {
    SettingKey::global(ENABLED_PLUGINS_KEY)
}

/// Enabled plugin names; `defaults` apply until the list is first changed.
pub fn enabled(settings: &Settings, defaults: &[String]) -> BotResult<Vec<String>> {
    Ok(settings
        .get_list(&enabled_key())?
        .unwrap_or_else(|| defaults.to_vec()))
}

/// Enable a bundled plugin. Returns `false` if it already was.
pub fn enable(settings: &Settings, defaults: &[String], name: &str) -> BotResult<bool> {
    if bundled(name).is_none() {
        return Err(BotError::NotFound(format!("bundled plugin {:?}", name)));
    }
    Ok(settings.update_list(&enabled_key(), defaults, |names| {
        if names.iter().any(|n| n == name) {
            return false;
        }
        names.push(name.to_string());
        true
    })?)
}

/// Disable a plugin. Returns `false` if it was not enabled.
pub fn disable(settings: &Settings, defaults: &[String], name: &str) -> BotResult<bool> {
    Ok(settings.update_list(&enabled_key(), defaults, |names| {
        let before = names.len();
        names.retain(|n| n != name);
        names.len() != before
    })?)
}
