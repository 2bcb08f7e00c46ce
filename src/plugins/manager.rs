//! Plugin manager - named plugin registration and hook dispatch

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, error, info};

use crate::application::errors::{HandlerResult, RegistrationError};
use crate::domain::entities::Priority;
use crate::plugins::trait_def::Plugin;

struct Entry {
    name: String,
    priority: Priority,
    plugin: Arc<dyn Plugin>,
}

#[derive(Default)]
struct Inner {
    entries: Vec<Entry>,
    init_fired: bool,
    /// Plugins registered after `init` fired that have not seen it yet.
    pending_init: Vec<String>,
}

/// Registered plugins in hook-call order.
///
/// Plugins are ordered by priority, then by registration order. Cloning
/// gives another handle on the same registry.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a plugin under a unique name
    pub fn register(
        &self,
        name: impl Into<String>,
        plugin: Arc<dyn Plugin>,
    ) -> Result<(), RegistrationError> {
        let name = name.into();
        let mut inner = self.write();

        if inner.entries.iter().any(|e| e.name == name) {
            return Err(RegistrationError::Duplicate {
                kind: "plugin",
                name,
            });
        }

        let priority = plugin.priority();
        let pos = inner
            .entries
            .iter()
            .position(|e| e.priority > priority)
            .unwrap_or(inner.entries.len());
        inner.entries.insert(
            pos,
            Entry {
                name: name.clone(),
                priority,
                plugin,
            },
        );
        if inner.init_fired {
            inner.pending_init.push(name.clone());
        }

        info!("registered plugin: {}", name);
        Ok(())
    }

    /// Remove a plugin. Unknown names are ignored.
    pub fn unregister(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        let mut inner = self.write();
        inner.pending_init.retain(|n| n != name);
        let pos = inner.entries.iter().position(|e| e.name == name)?;
        let entry = inner.entries.remove(pos);
        info!("unregistered plugin: {}", name);
        Some(entry.plugin)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().entries.iter().any(|e| e.name == name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.read()
            .entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.plugin.clone())
    }

    /// Plugin names in hook-call order
    pub fn names(&self) -> Vec<String> {
        self.read().entries.iter().map(|e| e.name.clone()).collect()
    }

    /// `(name, description)` of every plugin
    pub fn list(&self) -> Vec<(String, String)> {
        self.read()
            .entries
            .iter()
            .map(|e| (e.name.clone(), e.plugin.description().to_string()))
            .collect()
    }

    fn snapshot(&self) -> Vec<(String, Arc<dyn Plugin>)> {
        self.read()
            .entries
            .iter()
            .map(|e| (e.name.clone(), e.plugin.clone()))
            .collect()
    }

    /// Call a hook on every plugin. A failing plugin is logged and the
    /// rest still run.
    pub fn call_all<F>(&self, hook: &str, mut call: F)
    where
        F: FnMut(&dyn Plugin) -> HandlerResult,
    {
        for (name, plugin) in self.snapshot() {
            debug!("calling hook {} on plugin {}", hook, name);
            if let Err(e) = call(plugin.as_ref()) {
                error!("plugin {:?} failed in hook {}: {}", name, hook, e);
            }
        }
    }

    /// Call a hook on each plugin until one returns a result, giving back
    /// the name of that plugin with its result. An error stops dispatch.
    pub fn first_result<T, F>(&self, hook: &str, mut call: F) -> HandlerResult<Option<(String, T)>>
    where
        F: FnMut(&dyn Plugin) -> HandlerResult<Option<T>>,
    {
        for (name, plugin) in self.snapshot() {
            debug!("calling hook {} on plugin {}", hook, name);
            if let Some(result) = call(plugin.as_ref())? {
                return Ok(Some((name, result)));
            }
        }
        Ok(None)
    }

    /// Mark `init` as fired and return every plugin it has to reach.
    pub(crate) fn fire_init(&self) -> Vec<(String, Arc<dyn Plugin>)> {
        let mut inner = self.write();
        inner.init_fired = true;
        inner.pending_init.clear();
        drop(inner);
        self.snapshot()
    }

    pub fn init_fired(&self) -> bool {
        self.read().init_fired
    }

    /// Plugins registered since `init` fired, in registration order.
    pub(crate) fn take_pending_init(&self) -> Vec<(String, Arc<dyn Plugin>)> {
        let mut inner = self.write();
        let pending = std::mem::take(&mut inner.pending_init);
        pending
            .into_iter()
            .filter_map(|name| {
                let plugin = inner.entries.iter().find(|e| e.name == name)?.plugin.clone();
                Some((name, plugin))
            })
            .collect()
    }
}
