use tracing::info;

use crate::application::errors::{BotError, BotResult};
use crate::domain::entities::SettingKey;

use super::Settings;

/// Setting holding the newline separated administrator addresses.
pub const ADMINS_KEY: &str = "administrators";

/// Administrator list stored as a single global setting
#[derive(Clone)]
pub struct Admins {
    settings: Settings,
}

impl Admins {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    fn key() -> SettingKey {
        SettingKey::global(ADMINS_KEY)
    }

    pub fn list(&self) -> BotResult<Vec<String>> {
        Ok(self.settings.get_list(&Self::key())?.unwrap_or_default())
    }

    pub fn is_admin(&self, address: &str) -> BotResult<bool> {
        Ok(self.list()?.iter().any(|a| a == address))
    }

    pub fn add(&self, address: &str) -> BotResult<()> {
        let address = address.trim();
        if address.is_empty() || address.contains(',') || address.contains('\n') {
            return Err(BotError::InvalidAddress(address.to_string()));
        }

        let added = self.settings.update_list(&Self::key(), &[], |admins| {
            if admins.iter().any(|a| a == address) {
                return false;
            }
            admins.push(address.to_string());
            true
        })?;
        if added {
            info!("granted administrator rights to {}", address);
        }
        Ok(())
    }

    pub fn remove(&self, address: &str) -> BotResult<()> {
        let removed = self.settings.update_list(&Self::key(), &[], |admins| {
            let before = admins.len();
            admins.retain(|a| a != address);
            admins.len() != before
        })?;
        if !removed {
            return Err(BotError::NotFound(format!("administrator {}", address)));
        }
        info!("revoked administrator rights from {}", address);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::Database;
    use std::sync::Arc;

    fn admins() -> Admins {
        Admins::new(Settings::new(Arc::new(Database::open_in_memory().unwrap())))
    }

    #[test]
    fn test_add_check_remove() {
        let admins = admins();
        assert!(!admins.is_admin("a@example.org").unwrap());

        admins.add("a@example.org").unwrap();
        admins.add("b@example.org").unwrap();
        admins.add("a@example.org").unwrap();
        assert_eq!(admins.list().unwrap(), vec!["a@example.org", "b@example.org"]);
        assert!(admins.is_admin("a@example.org").unwrap());

        admins.remove("a@example.org").unwrap();
        assert!(!admins.is_admin("a@example.org").unwrap());
        assert!(admins.is_admin("b@example.org").unwrap());
    }

    #[test]
    fn test_comma_rejected() {
        let err = admins().add("a@x.org,b@x.org").unwrap_err();
        assert!(matches!(err, BotError::InvalidAddress(_)));
    }

    #[test]
    fn test_two_handles_keep_both_additions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.db");
        let open = || Admins::new(Settings::new(Arc::new(Database::new(&path).unwrap())));
        let first = open();
        let second = open();

        first.add("a@example.org").unwrap();
        second.add("b@example.org").unwrap();
        first.add("c@example.org").unwrap();
        assert_eq!(
            second.list().unwrap(),
            vec!["a@example.org", "b@example.org", "c@example.org"]
        );

        second.remove("a@example.org").unwrap();
        assert_eq!(first.list().unwrap(), vec!["b@example.org", "c@example.org"]);
    }

    #[test]
    fn test_remove_unknown() {
        assert!(matches!(
            admins().remove("nobody@x.org"),
            Err(BotError::NotFound(_))
        ));
    }
}
