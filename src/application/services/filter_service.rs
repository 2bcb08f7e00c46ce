use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, error};

use crate::application::errors::{HandlerResult, RegistrationError};
use crate::application::messaging::Replies;
use crate::application::Bot;
use crate::domain::entities::{FilterContext, FilterDefinition, FilterFlow, IncomingMessage, Priority};
use crate::plugins::Plugin;

/// Filters run over every message no command consumed, in priority order.
///
/// Clones share the same filter list.
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Arc<RwLock<Vec<Arc<FilterDefinition>>>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<FilterDefinition>>> {
        self.filters.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<FilterDefinition>>> {
        self.filters.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a filter; ties in priority keep registration order.
    pub fn register(&self, mut definition: FilterDefinition) -> Result<(), RegistrationError> {
        definition.prepare()?;
        let mut filters = self.write();
        if filters.iter().any(|f| f.name == definition.name) {
            return Err(RegistrationError::Duplicate {
                kind: "filter",
                name: definition.name,
            });
        }

        let pos = filters
            .iter()
            .position(|f| f.priority > definition.priority)
            .unwrap_or(filters.len());
        debug!("registered new filter {:?}", definition.name);
        filters.insert(pos, Arc::new(definition));
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> Option<Arc<FilterDefinition>> {
        let mut filters = self.write();
        let pos = filters.iter().position(|f| f.name == name)?;
        debug!("unregistered filter {:?}", name);
        Some(filters.remove(pos))
    }

    pub fn get(&self, name: &str) -> Option<Arc<FilterDefinition>> {
        self.read().iter().find(|f| f.name == name).cloned()
    }

    /// Filters in the order they run
    pub fn list(&self) -> Vec<Arc<FilterDefinition>> {
        self.read().clone()
    }

    /// Run the chain over one message, returning how many filters ran.
    /// A failing filter is logged and the chain goes on; `StopChain` ends it.
    pub fn run(&self, bot: &Bot, message: &IncomingMessage, replies: &mut Replies) -> usize {
        let mut ran = 0;
        for filter in self.list() {
            debug!("calling filter {:?} on message id={}", filter.name, message.id);
            ran += 1;
            let mut ctx = FilterContext::new(bot, &filter, message, replies);
            match filter.call(&mut ctx) {
                Ok(FilterFlow::Continue) => {}
                Ok(FilterFlow::StopChain) => {
                    debug!("filter {:?} stopped the chain", filter.name);
                    break;
                }
                Err(e) => {
                    error!(
                        "filter {:?} failed on message id={}: {}",
                        filter.name, message.id, e
                    );
                }
            }
        }
        ran
    }
}

impl Plugin for FilterChain {
    fn description(&self) -> &str {
        "runs message filters"
    }

    fn priority(&self) -> Priority {
        Priority::TryLast
    }

    fn incoming_message(
        &self,
        bot: &Bot,
        message: &IncomingMessage,
        replies: &mut Replies,
    ) -> HandlerResult<bool> {
        self.run(bot, message, replies);
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(name: &str) -> FilterDefinition {
        FilterDefinition::new(name, "test filter", |_| Ok(FilterFlow::Continue))
    }

    #[test]
    fn test_priority_order() {
        let chain = FilterChain::new();
        chain.register(filter("normal1")).unwrap();
        chain.register(filter("last").trylast()).unwrap();
        chain.register(filter("first").tryfirst()).unwrap();
        chain.register(filter("normal2")).unwrap();

        let names: Vec<_> = chain.list().iter().map(|f| f.name.clone()).collect();
        assert_eq!(names, vec!["first", "normal1", "normal2", "last"]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let chain = FilterChain::new();
        chain.register(filter("f")).unwrap();
        assert!(matches!(
            chain.register(filter("f").tryfirst()),
            Err(RegistrationError::Duplicate { kind: "filter", .. })
        ));
    }

    #[test]
    fn test_unregister() {
        let chain = FilterChain::new();
        chain.register(filter("f")).unwrap();
        assert!(chain.unregister("f").is_some());
        assert!(chain.unregister("f").is_none());
        assert!(chain.get("f").is_none());
    }
}
