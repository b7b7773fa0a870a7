//! Self-signed identity certificates and the per-issuer store.
//!
//! There is no CA and no revocation list: a certificate binds an identity
//! string to a signing key and a sealing key, on the word of that key alone.
//! The store's one rule is that it keeps at most one certificate per issuer,
//! always the latest-expiring.

use std::collections::HashMap;

use ed25519_dalek::{Signature, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::{
    constants::{CERTIFICATE_PEM_LABEL, CERTIFICATE_VALIDITY_MILLIS},
    crypto::{
        keys::{IdentityKeyPair, SealingKem, SealingPublicKey},
        pem,
    },
    identifiers::Identity,
    util::{base64::Base64String, time::UnixMillis},
};

use hpke::{Deserializable, Kem};

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum CertificateError {
    #[error("the certificate could not be parsed")]
    Malformed,
    #[error("the certificate's self-signature does not verify")]
    InvalidSignature,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Certificate {
    issuer: Identity,
    not_before: UnixMillis,
    not_after: UnixMillis,
    verifying_key: VerifyingKey,
    sealing_key: [u8; 32],
    signature: Signature,
    // The armor we parsed or produced, kept so re-announcing or persisting
    // a certificate never re-encodes it.
    pem: String,
}

/// The armor body. Key and signature fields are Base64 inside the JSON so
/// the record stays printable end to end.
#[derive(Serialize, Deserialize)]
struct CertRecord {
    iss: Identity,
    nbf: UnixMillis,
    exp: UnixMillis,
    vk: String,
    ek: String,
    sig: String,
}

/// The byte string the self-signature covers.
fn signed_bytes(
    issuer: &Identity,
    not_before: UnixMillis,
    not_after: UnixMillis,
    verifying_key: &VerifyingKey,
    sealing_key: &[u8; 32],
) -> Vec<u8> {
    let mut bytes: Vec<u8> = issuer.as_str().as_bytes().to_vec();
    bytes.extend_from_slice(&not_before.as_millis().to_be_bytes());
    bytes.extend_from_slice(&not_after.as_millis().to_be_bytes());
    bytes.extend_from_slice(&verifying_key.to_bytes());
    bytes.extend_from_slice(sealing_key);

    bytes
}

impl Certificate {
    /// Issues a self-signed certificate: issuer == subject, one year of
    /// validity from `now`.
    pub fn issue(keys: &IdentityKeyPair, issuer: Identity, now: UnixMillis) -> Self {
        let not_before = now;
        let not_after = now.saturating_add(CERTIFICATE_VALIDITY_MILLIS);
        let verifying_key = keys.verifying_key();
        let sealing_key = keys.sealing_public_bytes();

        let signature = keys.sign(&signed_bytes(
            &issuer,
            not_before,
            not_after,
            &verifying_key,
            &sealing_key,
        ));

        let record = CertRecord {
            iss: issuer.clone(),
            nbf: not_before,
            exp: not_after,
            vk: Base64String::from_bytes(verifying_key.to_bytes()).to_string(),
            ek: Base64String::from_bytes(sealing_key).to_string(),
            sig: Base64String::from_bytes(signature.to_bytes()).to_string(),
        };
        let body = serde_json::to_vec(&record).expect("certificate record always serializes");
        let pem = pem::encode(CERTIFICATE_PEM_LABEL, &body);

        Self {
            issuer,
            not_before,
            not_after,
            verifying_key,
            sealing_key,
            signature,
            pem,
        }
    }

    /// Parses armor and verifies the self-signature. Structural problems are
    /// `Malformed`; a well-formed record whose signature does not check out
    /// is `InvalidSignature`.
    pub fn from_pem(pem_str: &str) -> Result<Self, CertificateError> {
        let body = pem::decode(CERTIFICATE_PEM_LABEL, pem_str)
            .ok_or(CertificateError::Malformed)?;
        let record: CertRecord =
            serde_json::from_slice(&body).map_err(|_| CertificateError::Malformed)?;

        let vk_bytes: [u8; 32] = Base64String::from_base64_str(&record.vk)
            .ok_or(CertificateError::Malformed)?
            .to_vec()
            .try_into()
            .map_err(|_| CertificateError::Malformed)?;
        let verifying_key =
            VerifyingKey::from_bytes(&vk_bytes).map_err(|_| CertificateError::Malformed)?;

        let sealing_key: [u8; 32] = Base64String::from_base64_str(&record.ek)
            .ok_or(CertificateError::Malformed)?
            .to_vec()
            .try_into()
            .map_err(|_| CertificateError::Malformed)?;

        let sig_bytes = Base64String::from_base64_str(&record.sig)
            .ok_or(CertificateError::Malformed)?
            .to_vec();
        let signature =
            Signature::from_slice(&sig_bytes).map_err(|_| CertificateError::Malformed)?;

        verifying_key
            .verify_strict(
                &signed_bytes(
                    &record.iss,
                    record.nbf,
                    record.exp,
                    &verifying_key,
                    &sealing_key,
                ),
                &signature,
            )
            .map_err(|_| CertificateError::InvalidSignature)?;

        Ok(Self {
            issuer: record.iss,
            not_before: record.nbf,
            not_after: record.exp,
            verifying_key,
            sealing_key,
            signature,
            pem: pem_str.trim().to_string(),
        })
    }

    pub fn issuer(&self) -> &Identity {
        &self.issuer
    }

    pub fn not_before(&self) -> UnixMillis {
        self.not_before
    }

    pub fn not_after(&self) -> UnixMillis {
        self.not_after
    }

    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// The x25519 key group data gets sealed under for this holder.
    pub fn sealing_public(&self) -> Result<SealingPublicKey, CertificateError> {
        <SealingKem as Kem>::PublicKey::from_bytes(&self.sealing_key)
            .map_err(|_| CertificateError::Malformed)
    }
}

/// Latest-valid certificate per issuer.
#[derive(Debug, Default)]
pub struct CertificateStore {
    by_issuer: HashMap<Identity, Certificate>,
}

impl CertificateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `cert` under the latest-expiry rule: a stored certificate is
    /// replaced only by one that expires strictly later. Returns whether the
    /// store changed.
    pub fn insert(&mut self, cert: Certificate) -> bool {
        match self.by_issuer.get(cert.issuer()) {
            Some(stored) if cert.not_after() <= stored.not_after() => false,
            _ => {
                self.by_issuer.insert(cert.issuer().clone(), cert);
                true
            }
        }
    }

    /// Parses and validates `pem_str`, then applies the replacement rule.
    pub fn register(&mut self, pem_str: &str) -> Result<bool, CertificateError> {
        let cert = Certificate::from_pem(pem_str)?;
        Ok(self.insert(cert))
    }

    pub fn latest_for(&self, issuer: &Identity) -> Option<&Certificate> {
        self.by_issuer.get(issuer)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Certificate> {
        self.by_issuer.values()
    }

    pub fn len(&self) -> usize {
        self.by_issuer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_issuer.is_empty()
    }

    /// The persisted form: just the armor strings.
    pub fn to_pem_list(&self) -> Vec<String> {
        self.by_issuer.values().map(|c| c.pem().to_string()).collect()
    }

    /// Rebuilds a store from persisted armor strings. Entries that no longer
    /// parse are skipped; the caller can compare lengths to notice.
    pub fn from_pem_list<'a>(pems: impl IntoIterator<Item = &'a str>) -> Self {
        let mut store = Self::new();
        for pem_str in pems {
            if let Ok(cert) = Certificate::from_pem(pem_str) {
                store.insert(cert);
            }
        }

        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cert(issuer: &str, now: UnixMillis) -> (IdentityKeyPair, Certificate) {
        let keys = IdentityKeyPair::generate().expect("keygen works");
        let cert = Certificate::issue(&keys, Identity::new(issuer), now);

        (keys, cert)
    }

    #[test]
    fn issue_and_parse_roundtrip() {
        let now = UnixMillis::from_millis(1_700_000_000_000);
        let (_, cert) = test_cert("alice", now);

        let parsed = Certificate::from_pem(cert.pem()).expect("own certificate parses");

        assert_eq!(parsed, cert);
        assert_eq!(parsed.issuer().as_str(), "alice");
        assert_eq!(
            parsed.not_after(),
            now.saturating_add(CERTIFICATE_VALIDITY_MILLIS)
        );
    }

    #[test]
    fn garbage_is_malformed() {
        assert_eq!(
            Certificate::from_pem("-----BEGIN SHROUD CERTIFICATE-----\nAAAA\n-----END SHROUD CERTIFICATE-----").err(),
            Some(CertificateError::Malformed)
        );
        assert_eq!(
            Certificate::from_pem("not a certificate at all").err(),
            Some(CertificateError::Malformed)
        );
    }

    #[test]
    fn forged_issuer_fails_signature_check() {
        let now = UnixMillis::from_millis(1_700_000_000_000);
        let (_, cert) = test_cert("alice", now);

        // Re-arm the record with a different issuer but the original signature.
        let body = pem::decode(CERTIFICATE_PEM_LABEL, cert.pem()).expect("armor decodes");
        let tampered = String::from_utf8(body)
            .expect("record is json")
            .replace("\"alice\"", "\"mallory\"");
        let forged = pem::encode(CERTIFICATE_PEM_LABEL, tampered.as_bytes());

        assert_eq!(
            Certificate::from_pem(&forged).err(),
            Some(CertificateError::InvalidSignature)
        );
    }

    #[test]
    fn later_expiry_replaces_earlier_never_the_reverse() {
        let early = UnixMillis::from_millis(1_000_000);
        let late = early.saturating_add(60_000);

        let keys = IdentityKeyPair::generate().expect("keygen works");
        let old_cert = Certificate::issue(&keys, Identity::new("alice"), early);
        let new_cert = Certificate::issue(&keys, Identity::new("alice"), late);

        let mut store = CertificateStore::new();

        assert!(store.insert(old_cert.clone()), "first insert changes store");
        assert!(store.insert(new_cert.clone()), "later expiry replaces");
        assert!(
            !store.insert(old_cert),
            "earlier expiry must not replace a later one"
        );
        assert_eq!(store.latest_for(&Identity::new("alice")), Some(&new_cert));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn equal_expiry_does_not_replace() {
        let now = UnixMillis::from_millis(5_000_000);
        let (_, cert) = test_cert("bob", now);

        let mut store = CertificateStore::new();
        assert!(store.insert(cert.clone()));
        assert!(!store.insert(cert), "identical expiry is not strictly later");
    }

    #[test]
    fn register_parses_and_applies_the_replacement_rule() {
        let now = UnixMillis::from_millis(3_000_000);
        let (_, cert) = test_cert("dana", now);

        let mut store = CertificateStore::new();
        assert_eq!(store.register(cert.pem()), Ok(true));
        assert_eq!(store.register(cert.pem()), Ok(false), "same expiry, no change");
        assert_eq!(
            store.register("garbage").err(),
            Some(CertificateError::Malformed)
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn pem_list_roundtrip() {
        let now = UnixMillis::from_millis(9_000_000);
        let (_, alice) = test_cert("alice", now);
        let (_, bob) = test_cert("bob", now);

        let mut store = CertificateStore::new();
        store.insert(alice);
        store.insert(bob);

        let pems = store.to_pem_list();
        let restored = CertificateStore::from_pem_list(pems.iter().map(String::as_str));

        assert_eq!(restored.len(), 2);
        assert!(restored.latest_for(&Identity::new("alice")).is_some());
        assert!(restored.latest_for(&Identity::new("bob")).is_some());
    }
}
