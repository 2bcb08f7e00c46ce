use std::sync::Arc;

use tracing::debug;

use crate::application::errors::StorageError;
use crate::domain::entities::{SettingKey, SCOPE_SEPARATOR};
use crate::infrastructure::database::Database;

/// Scoped key/value settings backed by the database
#[derive(Clone)]
pub struct Settings {
    db: Arc<Database>,
}

impl Settings {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store a setting, returning the previous value.
    pub fn set(&self, key: &SettingKey, value: &str) -> Result<Option<String>, StorageError> {
        debug!("storing setting {}", key);
        self.db.replace_setting(&key.to_string(), Some(value))
    }

    /// Remove a setting, returning the value it had.
    pub fn delete(&self, key: &SettingKey) -> Result<Option<String>, StorageError> {
        debug!("deleting setting {}", key);
        self.db.replace_setting(&key.to_string(), None)
    }

    pub fn get(&self, key: &SettingKey) -> Result<Option<String>, StorageError> {
        self.db.get_setting(&key.to_string())
    }

    pub fn get_or(&self, key: &SettingKey, default: &str) -> Result<String, StorageError> {
        Ok(self.get(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// Read a newline separated list setting. `None` if the key is unset.
    pub fn get_list(&self, key: &SettingKey) -> Result<Option<Vec<String>>, StorageError> {
        Ok(self.get(key)?.as_deref().map(split_list))
    }

    /// Edit a newline separated list setting in one transaction.
    ///
    /// `seed` stands in for an unset key. The list is written back only when
    /// `edit` returns `true`, and that value is returned.
    pub fn update_list<F>(
        &self,
        key: &SettingKey,
        seed: &[String],
        edit: F,
    ) -> Result<bool, StorageError>
    where
        F: FnOnce(&mut Vec<String>) -> bool,
    {
        let mut changed = false;
        self.db.update_setting(&key.to_string(), |old| {
            let mut items = old.map(split_list).unwrap_or_else(|| seed.to_vec());
            changed = edit(&mut items);
            if changed {
                Some(items.join("\n"))
            } else {
                old.map(str::to_string)
            }
        })?;
        if changed {
            debug!("updated list setting {}", key);
        }
        Ok(changed)
    }

    /// List settings. Without a scope every `(scope/name, value)` pair is
    /// returned; with one, only that scope's pairs with the prefix stripped.
    pub fn list(&self, scope: Option<&str>) -> Result<Vec<(String, String)>, StorageError> {
        let all = self.db.list_settings()?;
        let Some(scope) = scope else {
            return Ok(all);
        };
        assert!(
            !scope.contains(SCOPE_SEPARATOR),
            "setting scope {:?} contains {:?}",
            scope,
            SCOPE_SEPARATOR
        );

        let prefix = format!("{}{}", scope, SCOPE_SEPARATOR);
        Ok(all
            .into_iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(&prefix)
                    .map(|name| (name.to_string(), value))
            })
            .collect())
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    #[test]
    fn test_set_get_overwrite() {
        let s = settings();
        let key = SettingKey::global("k");
        assert_eq!(s.set(&key, "v").unwrap(), None);
        assert_eq!(s.get(&key).unwrap().as_deref(), Some("v"));
        assert_eq!(s.set(&key, "v2").unwrap().as_deref(), Some("v"));
        assert_eq!(s.get(&key).unwrap().as_deref(), Some("v2"));
    }

    #[test]
    fn test_delete_then_default() {
        let s = settings();
        let key = SettingKey::global("k");
        s.set(&key, "v").unwrap();
        s.delete(&key).unwrap();
        assert_eq!(s.get_or(&key, "d").unwrap(), "d");
    }

    #[test]
    fn test_scopes_do_not_interfere() {
        let s = settings();
        s.set(&SettingKey::new("s1", "k"), "a").unwrap();
        s.set(&SettingKey::new("s2", "k"), "b").unwrap();

        assert_eq!(s.get(&SettingKey::new("s1", "k")).unwrap().as_deref(), Some("a"));
        assert_eq!(s.get(&SettingKey::new("s2", "k")).unwrap().as_deref(), Some("b"));
        assert_eq!(
            s.list(Some("s1")).unwrap(),
            vec![("k".to_string(), "a".to_string())]
        );
        assert_eq!(s.list(None).unwrap().len(), 2);
        assert!(s.list(Some("s3")).unwrap().is_empty());
    }

    #[test]
    fn test_scope_prefix_is_exact() {
        let s = settings();
        s.set(&SettingKey::new("s1", "k"), "a").unwrap();
        s.set(&SettingKey::new("s10", "k"), "b").unwrap();
        assert_eq!(s.list(Some("s1")).unwrap().len(), 1);
    }

    #[test]
    fn test_update_list_writes_only_on_change() {
        let s = settings();
        let key = SettingKey::global("names");
        let seed = vec!["a".to_string()];

        assert!(!s.update_list(&key, &seed, |_| false).unwrap());
        assert_eq!(s.get(&key).unwrap(), None);

        assert!(s
            .update_list(&key, &seed, |items| {
                items.push("b".to_string());
                true
            })
            .unwrap());
        assert_eq!(s.get(&key).unwrap().as_deref(), Some("a\nb"));
        assert_eq!(s.get_list(&key).unwrap().unwrap(), vec!["a", "b"]);

        // the stored list wins over the seed from now on
        s.update_list(&key, &[], |items| {
            items.retain(|i| i != "a");
            true
        })
        .unwrap();
        assert_eq!(s.get_list(&key).unwrap().unwrap(), vec!["b"]);
        assert_eq!(s.get_list(&SettingKey::global("unset")).unwrap(), None);
    }

    #[test]
    #[should_panic]
    fn test_list_scope_with_separator_panics() {
        let _ = settings().list(Some("a/b"));
    }
}
