use lib::crypto::keys::IdentityKeyPair;

use super::{Database, DatabaseError, KeyValueStore, KEY_PRIVATE_KEY, KEY_PUBLIC_KEY};

impl<S: KeyValueStore> Database<S> {
    /// Persists both PEM halves. The public half is informational — loading
    /// re-derives it from the private one.
    pub fn set_keypair(&mut self, keys: &IdentityKeyPair) {
        let private_pem = keys.to_pem_private();
        let public_pem = keys.to_pem_public();

        self.store_mut().set(KEY_PRIVATE_KEY, &private_pem);
        self.store_mut().set(KEY_PUBLIC_KEY, &public_pem);
    }

    /// `Ok(None)` when no keypair was ever stored; an error only when stored
    /// material no longer decodes.
    pub fn keypair(&self) -> Result<Option<IdentityKeyPair>, DatabaseError> {
        let Some(pem) = self.store().get(KEY_PRIVATE_KEY) else {
            return Ok(None);
        };

        IdentityKeyPair::from_pem_private(&pem)
            .map(Some)
            .map_err(|_| DatabaseError::CorruptedData(KEY_PRIVATE_KEY))
    }
}
