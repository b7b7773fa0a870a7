//! The persistence gateway: an opaque string key-value store plus typed
//! accessors for everything the session needs back after a restart. The
//! storage keys are part of the on-disk contract and never change.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

pub mod certificates;
pub mod groups;
pub mod profile;

pub const KEY_PRIVATE_KEY: &str = "my_k_priv";
pub const KEY_PUBLIC_KEY: &str = "my_k_pub";
pub const KEY_CERTIFICATES: &str = "my_certs";
pub const KEY_GROUPS: &str = "my_groups";
pub const KEY_CURRENT_GROUP: &str = "my_cur_group";

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum DatabaseError {
    #[error("stored data under `{0}` is corrupted or unexpected")]
    CorruptedData(&'static str),
}

/// Whatever the host environment offers for persistence. The core treats it
/// as a string-to-string map and nothing more.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
    fn remove(&mut self, key: &str);
}

/// In-memory store, used by tests and as the fallback when the host gives
/// us nothing durable.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

/// Lets a store be shared between a session and whoever needs to look at it
/// afterwards (tests, a host-side flush hook).
impl KeyValueStore for Arc<Mutex<MemoryStore>> {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().expect("Mutex poisoning is safe").get(key)
    }

    fn set(&mut self, key: &str, value: &str) {
        self.lock().expect("Mutex poisoning is safe").set(key, value);
    }

    fn remove(&mut self, key: &str) {
        self.lock().expect("Mutex poisoning is safe").remove(key);
    }
}

/// Typed access over the opaque store. The accessors live in the sibling
/// modules, grouped the way the data is grouped.
#[derive(Debug)]
pub struct Database<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> Database<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}
