use lib::group::{GroupData, GroupRegistry};

use super::{Database, DatabaseError, KeyValueStore, KEY_CURRENT_GROUP, KEY_GROUPS};

impl<S: KeyValueStore> Database<S> {
    /// Persists the flat generation list and the current-selection pointer.
    /// The pointer is stored as a full record, so a store inspected on its
    /// own still shows which key was active.
    pub fn set_groups(&mut self, registry: &GroupRegistry) {
        let json = serde_json::to_string(registry.records())
            .expect("group records always serialize");
        self.store_mut().set(KEY_GROUPS, &json);

        match registry.current() {
            Some(current) => {
                let json = serde_json::to_string(current)
                    .expect("group records always serialize");
                self.store_mut().set(KEY_CURRENT_GROUP, &json);
            }
            None => self.store_mut().remove(KEY_CURRENT_GROUP),
        }
    }

    /// Rebuilds the registry from the stored flat list; the indices are
    /// derived on load.
    pub fn groups(&self, prefix_len: usize) -> Result<GroupRegistry, DatabaseError> {
        let records: Vec<GroupData> = match self.store().get(KEY_GROUPS) {
            Some(json) => serde_json::from_str(&json)
                .map_err(|_| DatabaseError::CorruptedData(KEY_GROUPS))?,
            None => Vec::new(),
        };

        let current = match self.store().get(KEY_CURRENT_GROUP) {
            Some(json) => {
                let record: GroupData = serde_json::from_str(&json)
                    .map_err(|_| DatabaseError::CorruptedData(KEY_CURRENT_GROUP))?;
                Some(record.ver)
            }
            None => None,
        };

        Ok(GroupRegistry::from_records(records, current, prefix_len))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use lib::{constants::VERSION_PREFIX_LEN, identifiers::Identity, util::time::UnixMillis};

    use super::*;
    use crate::database::MemoryStore;

    #[test]
    fn registry_roundtrip_with_current_pointer() {
        let mut registry = GroupRegistry::new();
        let g0 = registry.create_group(
            Identity::new("alice"),
            "team",
            BTreeSet::new(),
            UnixMillis::from_millis(100),
        );
        let g1 = registry
            .modify_group(&Identity::new("alice"), g0.members.clone(), UnixMillis::from_millis(200))
            .expect("owner can rotate");

        let mut db = Database::new(MemoryStore::new());
        db.set_groups(&registry);

        let loaded = db.groups(VERSION_PREFIX_LEN).expect("stored groups load");
        assert_eq!(loaded.records(), registry.records());
        assert_eq!(
            loaded.current().map(|gd| gd.ver.clone()),
            Some(g1.ver),
            "the current pointer survives the roundtrip"
        );
    }

    #[test]
    fn missing_keys_mean_an_empty_registry() {
        let db = Database::new(MemoryStore::new());
        let loaded = db.groups(VERSION_PREFIX_LEN).expect("empty store is fine");

        assert!(loaded.is_empty());
        assert!(loaded.current().is_none());
    }

    #[test]
    fn key_bytes_survive_the_json_encoding() {
        // The symmetric key must come back bit-identical, not mangled by the
        // string encoding.
        let mut registry = GroupRegistry::new();
        let gd = registry.create_group(
            Identity::new("alice"),
            "team",
            BTreeSet::new(),
            UnixMillis::from_millis(100),
        );

        let mut db = Database::new(MemoryStore::new());
        db.set_groups(&registry);

        let loaded = db.groups(VERSION_PREFIX_LEN).expect("stored groups load");
        let stored = loaded
            .find_by_prefix(gd.ver.as_bytes())
            .expect("generation is present");
        assert_eq!(stored.key, gd.key);
    }

    #[test]
    fn corrupted_group_list_is_an_error() {
        let mut store = MemoryStore::new();
        store.set(KEY_GROUPS, "[{\"broken\": true}]");

        let db = Database::new(store);
        assert_eq!(
            db.groups(VERSION_PREFIX_LEN).err(),
            Some(DatabaseError::CorruptedData(KEY_GROUPS))
        );
    }
}
