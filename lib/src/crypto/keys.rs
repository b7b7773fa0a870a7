//! The local user's long-term keypair: an ed25519 half for certificate
//! signatures and an x25519 half for unsealing group keys addressed to us.
//! Generated once, persisted as PEM, never transmitted.

use std::fmt::Debug;

use ed25519_dalek::{ed25519::signature::Signer, Signature, SigningKey, VerifyingKey};
use hpke::{kem::X25519HkdfSha256, Deserializable, Kem, Serializable};

use crate::{
    constants::{PRIVATE_KEY_PEM_LABEL, PUBLIC_KEY_PEM_LABEL},
    crypto::{pem, rng::try_random_array},
};

pub type SealingKem = X25519HkdfSha256;
pub type SealingPrivateKey = <SealingKem as Kem>::PrivateKey;
pub type SealingPublicKey = <SealingKem as Kem>::PublicKey;

/// Both curve keys are 32 bytes, concatenated in the PEM body.
const HALF_LEN: usize = 32;

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum KeyGenerationError {
    #[error("the entropy backend failed to produce key material")]
    Entropy,
    #[error("stored key material could not be decoded")]
    InvalidEncoding,
}

pub struct IdentityKeyPair {
    signing: SigningKey,
    sealing: SealingPrivateKey,
    sealing_pub: SealingPublicKey,
}

impl Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityKeyPair")
            .field("verifying_key", &self.signing.verifying_key())
            .finish_non_exhaustive()
    }
}

impl IdentityKeyPair {
    /// Generates a fresh keypair. Fails only if the OS entropy source does.
    pub fn generate() -> Result<Self, KeyGenerationError> {
        let seed = try_random_array::<HALF_LEN>().map_err(|_| KeyGenerationError::Entropy)?;
        let signing = SigningKey::from_bytes(&seed);

        let ikm = try_random_array::<HALF_LEN>().map_err(|_| KeyGenerationError::Entropy)?;
        let (sealing, sealing_pub) = SealingKem::derive_keypair(&ikm);

        Ok(Self {
            signing,
            sealing,
            sealing_pub,
        })
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    pub fn sealing_public_bytes(&self) -> [u8; HALF_LEN] {
        let mut bytes = [0u8; HALF_LEN];
        bytes.copy_from_slice(&self.sealing_pub.to_bytes());

        bytes
    }

    pub(crate) fn sealing_private(&self) -> &SealingPrivateKey {
        &self.sealing
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing.sign(message)
    }

    /// Serializes the secret halves: ed25519 seed, then x25519 scalar.
    pub fn to_pem_private(&self) -> String {
        let mut bytes = self.signing.to_bytes().to_vec();
        bytes.extend_from_slice(&self.sealing.to_bytes());

        pem::encode(PRIVATE_KEY_PEM_LABEL, &bytes)
    }

    pub fn to_pem_public(&self) -> String {
        let mut bytes = self.signing.verifying_key().to_bytes().to_vec();
        bytes.extend_from_slice(&self.sealing_pub.to_bytes());

        pem::encode(PUBLIC_KEY_PEM_LABEL, &bytes)
    }

    /// Rebuilds the keypair from its private PEM. The public halves are
    /// derived, so the public PEM is informational only.
    pub fn from_pem_private(pem_str: &str) -> Result<Self, KeyGenerationError> {
        let bytes = pem::decode(PRIVATE_KEY_PEM_LABEL, pem_str)
            .ok_or(KeyGenerationError::InvalidEncoding)?;

        if bytes.len() != 2 * HALF_LEN {
            return Err(KeyGenerationError::InvalidEncoding);
        }

        let seed: [u8; HALF_LEN] = bytes[..HALF_LEN]
            .try_into()
            .map_err(|_| KeyGenerationError::InvalidEncoding)?;
        let signing = SigningKey::from_bytes(&seed);

        let sealing = SealingPrivateKey::from_bytes(&bytes[HALF_LEN..])
            .map_err(|_| KeyGenerationError::InvalidEncoding)?;
        let sealing_pub = SealingKem::sk_to_pk(&sealing);

        Ok(Self {
            signing,
            sealing,
            sealing_pub,
        })
    }
}
