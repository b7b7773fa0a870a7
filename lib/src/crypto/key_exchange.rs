//! Sealing group data to a certificate holder.
//!
//! The generation record is JSON-serialized and sealed under the
//! recipient's x25519 key (HPKE base mode, fresh encapsulation per seal, so
//! two seals of the same record never look alike). On the wire the result is
//! Base64 of `encapsulated-key || ciphertext`, framed by the caller with the
//! key-exchange sentinel.
//!
//! Opening is deliberately quiet: most sealed blobs in a busy channel are
//! addressed to someone else, so every failure — wrong recipient, corrupt
//! Base64, bad JSON — collapses to `None` rather than an error.
//!
//! These blobs are not signed by the sender's identity key. A peer holding a
//! certificate we trust can inject group keys; that gap is recorded in
//! DESIGN.md, pending a protocol revision.

use hpke::{aead::AesGcm128, kdf::HkdfSha256, Deserializable, Kem, OpModeR, OpModeS, Serializable};

use crate::{
    crypto::{
        certificates::Certificate,
        keys::{IdentityKeyPair, SealingKem},
        rng::get_rng,
    },
    group::GroupData,
    util::base64::Base64String,
};

/// X25519 encapsulated keys are 32 bytes on the wire.
const ENCAPPED_KEY_LEN: usize = 32;

/// Domain separation for the HPKE context.
const INFO: &[u8] = b"shroud group data v1";

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum KeyExchangeError {
    #[error("the recipient certificate carries an unusable sealing key")]
    BadRecipientKey,
    #[error("the group data record could not be sealed")]
    SealFailed,
}

/// Seals `group` so that only the holder of `recipient`'s certificate key
/// can open it.
pub fn seal_group_data_for(
    recipient: &Certificate,
    group: &GroupData,
) -> Result<String, KeyExchangeError> {
    let recipient_key = recipient
        .sealing_public()
        .map_err(|_| KeyExchangeError::BadRecipientKey)?;

    let record =
        serde_json::to_vec(group).map_err(|_| KeyExchangeError::SealFailed)?;

    let (encapped, ciphertext) = hpke::single_shot_seal::<AesGcm128, HkdfSha256, SealingKem, _>(
        &OpModeS::Base,
        &recipient_key,
        INFO,
        &record,
        b"",
        &mut get_rng(),
    )
    .map_err(|_| KeyExchangeError::SealFailed)?;

    let mut bytes = encapped.to_bytes().to_vec();
    bytes.extend_from_slice(&ciphertext);

    Ok(Base64String::from_bytes(&bytes).to_string())
}

/// Tries to open a sealed group-data blob with our keypair. `None` means
/// "not ours or not valid" — an expected, recoverable outcome.
pub fn open_group_data(keys: &IdentityKeyPair, blob: &str) -> Option<GroupData> {
    let bytes = Base64String::from_base64_str(blob)?.to_vec();
    if bytes.len() <= ENCAPPED_KEY_LEN {
        return None;
    }

    let encapped =
        <SealingKem as Kem>::EncappedKey::from_bytes(&bytes[..ENCAPPED_KEY_LEN]).ok()?;

    let record = hpke::single_shot_open::<AesGcm128, HkdfSha256, SealingKem>(
        &OpModeR::Base,
        keys.sealing_private(),
        &encapped,
        INFO,
        &bytes[ENCAPPED_KEY_LEN..],
        b"",
    )
    .ok()?;

    serde_json::from_slice(&record).ok()
}
