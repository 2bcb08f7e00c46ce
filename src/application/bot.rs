//! The bot instance - owns its registries, settings and transport handle

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::application::errors::{BotError, BotResult, HandlerResult};
use crate::application::messaging::dispatcher::{Inbox, Signal};
use crate::application::services::{Admins, CommandRouter, FilterChain, Settings};
use crate::domain::entities::{Contact, SettingKey};
use crate::domain::traits::Transport;
use crate::infrastructure::database::Database;
use crate::plugins::{builtin, Plugin, PluginRegistry};

/// Plugin names the command router and filter chain register under.
pub const COMMANDS_PLUGIN: &str = "commands";
pub const FILTERS_PLUGIN: &str = "filters";

pub struct Bot {
    transport: Arc<dyn Transport>,
    db: Arc<Database>,
    settings: Settings,
    admins: Admins,
    plugins: PluginRegistry,
    commands: CommandRouter,
    filters: FilterChain,
    signal: Arc<Signal>,
}

impl Bot {
    pub fn builder(transport: Arc<dyn Transport>, db: Arc<Database>) -> BotBuilder {
        BotBuilder::new(transport, db)
    }

    // Administration

    pub fn is_admin(&self, address: &str) -> BotResult<bool> {
        self.admins.is_admin(address)
    }

    pub fn add_admin(&self, address: &str) -> BotResult<()> {
        self.admins.add(address)
    }

    pub fn del_admin(&self, address: &str) -> BotResult<()> {
        self.admins.remove(address)
    }

    pub fn admins(&self) -> BotResult<Vec<String>> {
        self.admins.list()
    }

    /// Block a contact at the transport and notify plugins.
    pub fn ban(&self, address: &str) -> BotResult<()> {
        let address = address.trim();
        if address.is_empty() {
            return Err(BotError::InvalidAddress(address.to_string()));
        }
        self.transport.block_contact(address)?;
        info!("banned {}", address);
        let contact = Contact::new(address);
        self.plugins.call_all("ban", |p| p.ban(self, &contact));
        Ok(())
    }

    pub fn unban(&self, address: &str) -> BotResult<()> {
        let address = address.trim();
        if !self.transport.is_blocked(address) {
            return Err(BotError::NotFound(format!("banned contact {}", address)));
        }
        self.transport.unblock_contact(address)?;
        info!("unbanned {}", address);
        let contact = Contact::new(address);
        self.plugins.call_all("unban", |p| p.unban(self, &contact));
        Ok(())
    }

    pub fn banned(&self) -> Vec<String> {
        self.transport.blocked_contacts()
    }

    // Settings

    /// Look a setting up through the `get_setting` hook, falling back to the
    /// database.
    pub fn get_setting(&self, key: &SettingKey) -> HandlerResult<Option<String>> {
        if let Some((plugin, value)) = self
            .plugins
            .first_result("get_setting", |p| p.get_setting(self, key))?
        {
            debug!("setting {} answered by plugin {}", key, plugin);
            return Ok(Some(value));
        }
        Ok(self.settings.get(key)?)
    }

    /// Store a setting through the `set_setting` hook, falling back to the
    /// database. Returns the previous value.
    pub fn set_setting(&self, key: &SettingKey, value: &str) -> HandlerResult<Option<String>> {
        if let Some((plugin, stored)) = self
            .plugins
            .first_result("set_setting", |p| p.set_setting(self, key, value))?
        {
            debug!("setting {} stored by plugin {}", key, plugin);
            return Ok(stored.previous);
        }
        Ok(self.settings.set(key, value)?)
    }

    // Accessors

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn self_contact(&self) -> Contact {
        self.transport.self_contact()
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn commands(&self) -> &CommandRouter {
        &self.commands
    }

    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// Handle for feeding transport events into the inbox queue.
    pub fn inbox(&self) -> Inbox {
        Inbox::new(self.transport.clone(), self.db.clone(), self.signal.clone())
    }

    pub(crate) fn signal(&self) -> &Arc<Signal> {
        &self.signal
    }

    // Plugins

    /// Register a plugin. If `init` already fired the plugin gets it now.
    pub fn add_plugin(&self, name: &str, plugin: Arc<dyn Plugin>) -> BotResult<()> {
        self.plugins.register(name, plugin)?;
        self.replay_init();
        if !self.plugins.contains(name) {
            return Err(BotError::Plugin(format!(
                "plugin {:?} failed to initialize",
                name
            )));
        }
        Ok(())
    }

    pub fn remove_plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.unregister(name)
    }

    /// Fire `init` on every registered plugin.
    pub fn init(&self) {
        for (name, plugin) in self.plugins.fire_init() {
            self.init_plugin(&name, plugin.as_ref());
        }
        self.replay_init();
    }

    /// Fire `init` on plugins that registered after it was fired.
    pub fn replay_init(&self) {
        loop {
            let pending = self.plugins.take_pending_init();
            if pending.is_empty() {
                break;
            }
            for (name, plugin) in pending {
                self.init_plugin(&name, plugin.as_ref());
            }
        }
    }

    fn init_plugin(&self, name: &str, plugin: &dyn Plugin) {
        if let Err(e) = plugin.init(self) {
            error!("plugin {:?} failed to initialize, removing it: {}", name, e);
            self.plugins.unregister(name);
        }
    }

    // Lifecycle

    pub fn start(&self) -> BotResult<()> {
        self.plugins.call_all("start", |p| p.start(self));
        self.transport.start()?;
        info!("bot listening at: {}", self.self_contact().address);
        Ok(())
    }

    pub fn shutdown(&self) {
        self.plugins.call_all("shutdown", |p| p.shutdown(self));
        self.transport.shutdown();
        info!("bot shut down");
    }
}

/// Assembles a [`Bot`] with its core and user plugins
pub struct BotBuilder {
    transport: Arc<dyn Transport>,
    db: Arc<Database>,
    plugins: Vec<(String, Arc<dyn Plugin>)>,
    builtins: bool,
}

impl BotBuilder {
    pub fn new(transport: Arc<dyn Transport>, db: Arc<Database>) -> Self {
        Self {
            transport,
            db,
            plugins: Vec::new(),
            builtins: true,
        }
    }

    pub fn plugin(mut self, name: impl Into<String>, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push((name.into(), plugin));
        self
    }

    /// Leave out the built-in admin and settings plugins.
    pub fn without_builtins(mut self) -> Self {
        self.builtins = false;
        self
    }

    /// Register every plugin and fire `init`.
    pub fn build(self) -> BotResult<Arc<Bot>> {
        let settings = Settings::new(self.db.clone());
        let bot = Arc::new(Bot {
            transport: self.transport,
            admins: Admins::new(settings.clone()),
            settings,
            db: self.db,
            plugins: PluginRegistry::new(),
            commands: CommandRouter::new(),
            filters: FilterChain::new(),
            signal: Arc::new(Signal::new()),
        });

        bot.plugins
            .register(COMMANDS_PLUGIN, Arc::new(bot.commands.clone()))?;
        bot.plugins
            .register(FILTERS_PLUGIN, Arc::new(bot.filters.clone()))?;

        if self.builtins {
            for (name, plugin) in builtin::plugins() {
                bot.plugins.register(name, plugin)?;
            }
        }

        for (name, plugin) in self.plugins {
            if let Err(e) = bot.plugins.register(name.as_str(), plugin) {
                warn!("skipping plugin {:?}: {}", name, e);
            }
        }

        bot.init();
        Ok(bot)
    }
}
