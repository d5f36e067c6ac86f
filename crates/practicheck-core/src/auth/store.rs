//! Persistent cache of the server-issued token and user.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::storage::Storage;
use crate::models::User;

/// Key names for the token and user entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageNamespace {
    /// `token` / `user`, used by every dashboard
    Default,
    /// `hirerToken` / `hirerUser`, used by the internship hirer pages
    Hirer,
}

impl Default for StorageNamespace {
    fn default() -> Self {
        StorageNamespace::Default
    }
}

impl StorageNamespace {
    pub fn token_key(&self) -> &'static str {
        match self {
            StorageNamespace::Default => "token",
            StorageNamespace::Hirer => "hirerToken",
        }
    }

    pub fn user_key(&self) -> &'static str {
        match self {
            StorageNamespace::Default => "user",
            StorageNamespace::Hirer => "hirerUser",
        }
    }
}

/// A token together with the user it was issued for.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSession {
    pub token: String,
    pub user: User,
}

/// Cheap to clone; all clones share one storage backend.
///
/// No validation of the token is done locally. `load` only ever returns a
/// complete token/user pair.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn Storage>,
    namespace: StorageNamespace,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn Storage>, namespace: StorageNamespace) -> Self {
        Self { storage, namespace }
    }

    /// Write both entries. If either write fails the store is cleared, so a
    /// new token is never left next to the previous user.
    pub fn save(&self, token: &str, user: &User) -> Result<()> {
        let user_json = serde_json::to_string(user).context("Failed to serialize user")?;
        let written = self
            .storage
            .set(self.namespace.token_key(), token)
            .and_then(|_| self.storage.set(self.namespace.user_key(), &user_json));

        if let Err(e) = written {
            if let Err(clear_err) = self.clear() {
                warn!(error = %clear_err, "Failed to clear session after partial save");
            }
            return Err(e.context("Failed to save session"));
        }
        debug!(user_id = %user.id, role = %user.role, "Session saved");
        Ok(())
    }

    pub fn load(&self) -> Result<Option<StoredSession>> {
        let token = self.storage.get(self.namespace.token_key())?;
        let user_json = self.storage.get(self.namespace.user_key())?;

        match (token, user_json) {
            (Some(token), Some(user_json)) => match serde_json::from_str::<User>(&user_json) {
                Ok(user) => Ok(Some(StoredSession { token, user })),
                Err(e) => {
                    warn!(error = %e, "Stored user is unreadable, discarding session");
                    self.clear()?;
                    Ok(None)
                }
            },
            (None, None) => Ok(None),
            (token, _) => {
                warn!(
                    has_token = token.is_some(),
                    "Found half a session in storage, discarding it"
                );
                self.clear()?;
                Ok(None)
            }
        }
    }

    /// Token only; what the request wrapper reads on every call.
    pub fn token(&self) -> Result<Option<String>> {
        Ok(self.load()?.map(|s| s.token))
    }

    pub fn clear(&self) -> Result<()> {
        self.storage.remove(self.namespace.token_key())?;
        self.storage.remove(self.namespace.user_key())?;
        debug!("Session cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::storage::{FileStorage, MemoryStorage};
    use crate::models::Role;
    use serde_json::{json, Map};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Memory storage whose writes to one key can be made to fail.
    struct FlakyStorage {
        inner: MemoryStorage,
        fail_key: &'static str,
        failing: AtomicBool,
    }

    impl FlakyStorage {
        fn new(fail_key: &'static str) -> Self {
            Self {
                inner: MemoryStorage::new(),
                fail_key,
                failing: AtomicBool::new(false),
            }
        }
    }

    impl Storage for FlakyStorage {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            if key == self.fail_key && self.failing.load(Ordering::SeqCst) {
                anyhow::bail!("disk full");
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }
    }

    fn user(id: &str, name: &str, role: Role) -> User {
        User {
            id: id.to_string(),
            name: name.to_string(),
            email: None,
            role,
            profile: None,
            extra: Map::new(),
        }
    }

    fn memory_store() -> (Arc<MemoryStorage>, TokenStore) {
        let storage = Arc::new(MemoryStorage::new());
        let store = TokenStore::new(storage.clone(), StorageNamespace::Default);
        (storage, store)
    }

    #[test]
    fn test_load_after_save_returns_same_pair() {
        let (_, store) = memory_store();
        let mut u = user("1", "A", Role::Student);
        u.profile = Some(json!({"student_id": "S100", "year_of_study": 3}));
        u.extra.insert("tenant_id".into(), json!("t-9"));

        store.save("tok1", &u).unwrap();
        let loaded = store.load().unwrap().unwrap();

        assert_eq!(loaded.token, "tok1");
        assert_eq!(loaded.user, u);
    }

    #[test]
    fn test_clear_then_load_is_absent() {
        let (storage, store) = memory_store();
        store.save("tok1", &user("1", "A", Role::Student)).unwrap();

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        assert!(storage.is_empty());
    }

    #[test]
    fn test_save_overwrites_previous_session() {
        let (_, store) = memory_store();
        store.save("old", &user("1", "A", Role::Student)).unwrap();
        store.save("new", &user("2", "B", Role::Lecturer)).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.token, "new");
        assert_eq!(loaded.user.id, "2");
    }

    #[test]
    fn test_failed_user_write_never_pairs_new_token_with_old_user() {
        let storage = Arc::new(FlakyStorage::new("user"));
        let store = TokenStore::new(storage.clone(), StorageNamespace::Default);
        store.save("old-tok", &user("1", "Old", Role::Student)).unwrap();

        storage.failing.store(true, Ordering::SeqCst);
        let err = store.save("new-tok", &user("2", "New", Role::Lecturer)).unwrap_err();

        assert!(format!("{:#}", err).contains("disk full"));
        assert_eq!(store.load().unwrap(), None);
        assert_eq!(storage.get("token").unwrap(), None);
    }

    #[test]
    fn test_failed_token_write_leaves_nothing_behind() {
        let storage = Arc::new(FlakyStorage::new("token"));
        let store = TokenStore::new(storage.clone(), StorageNamespace::Default);
        store.save("old-tok", &user("1", "Old", Role::Student)).unwrap();

        storage.failing.store(true, Ordering::SeqCst);
        assert!(store.save("new-tok", &user("2", "New", Role::Lecturer)).is_err());
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_corrupt_session_file_reads_as_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(FileStorage::in_dir(dir.path()));
        std::fs::write(storage.path(), "{\"token\": \"abc\"").unwrap();
        let store = TokenStore::new(storage.clone(), StorageNamespace::Default);

        assert_eq!(store.load().unwrap(), None);
        store.clear().unwrap();
        assert!(!storage.path().exists());

        std::fs::write(storage.path(), "garbage").unwrap();
        let u = user("1", "A", Role::Student);
        store.save("tok1", &u).unwrap();
        assert_eq!(store.load().unwrap().unwrap().user, u);
    }

    #[test]
    fn test_token_without_user_is_absent_and_removed() {
        let (storage, store) = memory_store();
        storage.set("token", "orphan").unwrap();

        assert_eq!(store.load().unwrap(), None);
        assert_eq!(storage.get("token").unwrap(), None);
    }

    #[test]
    fn test_user_without_token_is_absent() {
        let (storage, store) = memory_store();
        storage.set("user", r#"{"id":"1","name":"A","role":"student"}"#).unwrap();

        assert_eq!(store.load().unwrap(), None);
        assert!(storage.is_empty());
    }

    #[test]
    fn test_corrupt_user_is_absent() {
        let (storage, store) = memory_store();
        storage.set("token", "tok").unwrap();
        storage.set("user", "not json").unwrap();

        assert_eq!(store.load().unwrap(), None);
        assert!(storage.is_empty());
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let storage = Arc::new(MemoryStorage::new());
        let main = TokenStore::new(storage.clone(), StorageNamespace::Default);
        let hirer = TokenStore::new(storage.clone(), StorageNamespace::Hirer);

        hirer.save("hirer-tok", &user("7", "H", Role::Other("hirer".into()))).unwrap();

        assert_eq!(main.load().unwrap(), None);
        assert_eq!(hirer.token().unwrap().as_deref(), Some("hirer-tok"));
        assert_eq!(storage.get("hirerToken").unwrap().as_deref(), Some("hirer-tok"));
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let u = user("1", "A", Role::Student);

        TokenStore::new(Arc::new(FileStorage::in_dir(dir.path())), StorageNamespace::Default)
            .save("tok1", &u)
            .unwrap();

        let reopened =
            TokenStore::new(Arc::new(FileStorage::in_dir(dir.path())), StorageNamespace::Default);
        assert_eq!(reopened.load().unwrap().unwrap().user, u);
    }
}
