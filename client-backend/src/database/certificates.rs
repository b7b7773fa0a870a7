use lib::crypto::certificates::CertificateStore;

use super::{Database, DatabaseError, KeyValueStore, KEY_CERTIFICATES};

impl<S: KeyValueStore> Database<S> {
    /// Persists the store as a JSON array of PEM strings.
    pub fn set_certificates(&mut self, certificates: &CertificateStore) {
        let pems = certificates.to_pem_list();
        let json =
            serde_json::to_string(&pems).expect("a list of strings always serializes");

        self.store_mut().set(KEY_CERTIFICATES, &json);
    }

    /// An empty store when nothing was persisted yet. Entries that no longer
    /// parse are dropped with a warning rather than failing the load.
    pub fn certificates(&self) -> Result<CertificateStore, DatabaseError> {
        let Some(json) = self.store().get(KEY_CERTIFICATES) else {
            return Ok(CertificateStore::new());
        };

        let pems: Vec<String> = serde_json::from_str(&json)
            .map_err(|_| DatabaseError::CorruptedData(KEY_CERTIFICATES))?;

        let store = CertificateStore::from_pem_list(pems.iter().map(String::as_str));
        if store.len() < pems.len() {
            log::warn!(
                "dropped {} unparsable stored certificate(s)",
                pems.len() - store.len()
            );
        }

        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use lib::{
        crypto::{certificates::Certificate, keys::IdentityKeyPair},
        identifiers::Identity,
        util::time::UnixMillis,
    };

    use super::*;
    use crate::database::MemoryStore;

    #[test]
    fn certificate_set_roundtrip() {
        let mut db = Database::new(MemoryStore::new());
        assert!(db.certificates().expect("empty store is fine").is_empty());

        let keys = IdentityKeyPair::generate().expect("keygen works");
        let cert = Certificate::issue(&keys, Identity::new("alice"), UnixMillis::now());

        let mut certs = CertificateStore::new();
        certs.insert(cert.clone());
        db.set_certificates(&certs);

        let loaded = db.certificates().expect("stored certificates load");
        assert_eq!(loaded.latest_for(&Identity::new("alice")), Some(&cert));
    }

    #[test]
    fn unparsable_entries_are_dropped_not_fatal() {
        let mut store = MemoryStore::new();
        store.set(
            KEY_CERTIFICATES,
            "[\"-----BEGIN SHROUD CERTIFICATE-----\\nAAAA\\n-----END SHROUD CERTIFICATE-----\"]",
        );

        let db = Database::new(store);
        assert!(db.certificates().expect("load succeeds").is_empty());
    }

    #[test]
    fn non_json_payload_is_corrupted_data() {
        let mut store = MemoryStore::new();
        store.set(KEY_CERTIFICATES, "not json");

        let db = Database::new(store);
        assert_eq!(
            db.certificates().err(),
            Some(DatabaseError::CorruptedData(KEY_CERTIFICATES))
        );
    }
}
