//! Token persistence.
//!
//! This module provides:
//! - `Storage`: durable key/value backends (file, OS keychain, memory)
//! - `TokenStore`: save/load/clear of the `token` + `user` pair
//!
//! The store is a dumb cache of what the auth service issued; expiry is
//! decided by the idle timer in `session`, not here.

pub mod storage;
pub mod store;

pub use storage::{FileStorage, KeyringStorage, MemoryStorage, Storage};
pub use store::{StorageNamespace, StoredSession, TokenStore};
