//! The symmetric wire envelope: text messages under AES-128-GCM, image
//! pixel buffers under AES-128-CTR.
//!
//! A text envelope is four colon-delimited Base64 fields:
//! `version-prefix : iv : ciphertext : tag`. The version prefix lets a
//! receiver pick the right generation without trial-decrypting everything it
//! knows. Image payloads keep the same shape but carry only
//! `version-prefix : iv` as metadata; the encrypted pixels travel out of
//! band and keep their exact size, which is why the image path runs an
//! unauthenticated keystream — a weaker mode this design accepts for
//! attachments only.

use aes_gcm::{
    aead::AeadInPlace,
    Aes128Gcm, KeyInit, Nonce, Tag,
};
use ctr::cipher::{KeyIvInit, StreamCipher};

use crate::{
    constants::{IMAGE_IV_LEN, TAG_LEN, TEXT_IV_LEN},
    crypto::rng::random_array,
    group::{GroupData, GroupRegistry, VersionPrefix},
    util::base64::{decode_field, Base64String},
};

type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("the envelope is not well formed")]
    Malformed,
    #[error("no known group generation matches the envelope's version prefix")]
    UnknownGeneration,
    #[error("the ciphertext failed authentication")]
    AuthenticationFailed,
    #[error("the payload could not be sealed")]
    SealFailed,
}

/// A successfully opened text envelope: the plaintext plus the generation
/// that decrypted it, so the caller can check for stale-key use.
#[derive(Debug)]
pub struct DecryptedText<'a> {
    pub plaintext: String,
    pub generation: &'a GroupData,
}

/// Encrypts `plaintext` under the group's key with a fresh random IV.
pub fn encrypt_text(group: &GroupData, plaintext: &str) -> Result<String, EnvelopeError> {
    let iv = random_array::<TEXT_IV_LEN>();

    let cipher = Aes128Gcm::new_from_slice(group.key.as_bytes())
        .map_err(|_| EnvelopeError::SealFailed)?;

    let mut buf = plaintext.as_bytes().to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&iv), b"", &mut buf)
        .map_err(|_| EnvelopeError::SealFailed)?;

    Ok(format!(
        "{}:{}:{}:{}",
        group.ver.to_base64(),
        Base64String::from_bytes(iv),
        Base64String::from_bytes(&buf),
        Base64String::from_bytes(tag.as_slice()),
    ))
}

/// Parses an envelope, resolves its generation, checks the tag, and returns
/// the plaintext. Both "not our message" outcomes — unknown generation and
/// failed authentication — are errors the caller is expected to swallow.
pub fn decrypt_text<'a>(
    registry: &'a GroupRegistry,
    envelope: &str,
) -> Result<DecryptedText<'a>, EnvelopeError> {
    let fields: Vec<&str> = envelope.split(':').collect();
    let [ver, iv, ciphertext, tag] = fields.as_slice() else {
        return Err(EnvelopeError::Malformed);
    };

    let ver = decode_field(ver).ok_or(EnvelopeError::Malformed)?;
    let iv = decode_field(iv).ok_or(EnvelopeError::Malformed)?;
    let ciphertext = decode_field(ciphertext).ok_or(EnvelopeError::Malformed)?;
    let tag = decode_field(tag).ok_or(EnvelopeError::Malformed)?;

    if iv.len() != TEXT_IV_LEN || tag.len() != TAG_LEN {
        return Err(EnvelopeError::Malformed);
    }

    let generation = registry
        .find_by_prefix(&ver)
        .ok_or(EnvelopeError::UnknownGeneration)?;

    let cipher = Aes128Gcm::new_from_slice(generation.key.as_bytes())
        .map_err(|_| EnvelopeError::Malformed)?;

    let mut buf = ciphertext;
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(&iv),
            b"",
            &mut buf,
            Tag::from_slice(&tag),
        )
        .map_err(|_| EnvelopeError::AuthenticationFailed)?;

    let plaintext = String::from_utf8(buf).map_err(|_| EnvelopeError::Malformed)?;

    Ok(DecryptedText {
        plaintext,
        generation,
    })
}

/// The out-of-band metadata for one encrypted attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMeta {
    pub ver: VersionPrefix,
    pub iv: [u8; IMAGE_IV_LEN],
}

impl std::fmt::Display for ImageMeta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}",
            self.ver.to_base64(),
            Base64String::from_bytes(self.iv)
        )
    }
}

impl ImageMeta {
    pub fn parse(s: &str) -> Result<Self, EnvelopeError> {
        let (ver, iv) = s.split_once(':').ok_or(EnvelopeError::Malformed)?;

        let ver = decode_field(ver).ok_or(EnvelopeError::Malformed)?;
        let iv: [u8; IMAGE_IV_LEN] = decode_field(iv)
            .ok_or(EnvelopeError::Malformed)?
            .try_into()
            .map_err(|_| EnvelopeError::Malformed)?;

        Ok(Self {
            ver: VersionPrefix::from_bytes(&ver),
            iv,
        })
    }
}

/// Encrypts a pixel buffer in place. The buffer keeps its exact length, so
/// the caller can re-encode an image of identical dimensions.
pub fn encrypt_image(group: &GroupData, pixels: &mut [u8]) -> Result<ImageMeta, EnvelopeError> {
    let iv = random_array::<IMAGE_IV_LEN>();

    let mut cipher = Aes128Ctr::new_from_slices(group.key.as_bytes(), &iv)
        .map_err(|_| EnvelopeError::SealFailed)?;
    cipher.apply_keystream(pixels);

    Ok(ImageMeta {
        ver: group.ver.clone(),
        iv,
    })
}

/// Reverses [`encrypt_image`] in place and returns the generation used.
/// There is no tag on this path: a wrong key yields noise, not an error.
pub fn decrypt_image<'a>(
    registry: &'a GroupRegistry,
    meta: &ImageMeta,
    pixels: &mut [u8],
) -> Result<&'a GroupData, EnvelopeError> {
    let generation = registry
        .find_by_prefix(meta.ver.as_bytes())
        .ok_or(EnvelopeError::UnknownGeneration)?;

    let mut cipher = Aes128Ctr::new_from_slices(generation.key.as_bytes(), &meta.iv)
        .map_err(|_| EnvelopeError::Malformed)?;
    cipher.apply_keystream(pixels);

    Ok(generation)
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashSet};

    use crate::{identifiers::Identity, util::time::UnixMillis};

    use super::*;

    fn registry_with_group() -> (GroupRegistry, GroupData) {
        let mut registry = GroupRegistry::new();
        let gd = registry.create_group(
            Identity::new("alice"),
            "team",
            BTreeSet::new(),
            UnixMillis::from_millis(1_000),
        );

        (registry, gd)
    }

    #[test]
    fn text_roundtrip() {
        let (registry, gd) = registry_with_group();

        let envelope = encrypt_text(&gd, "hello world").expect("sealing works");
        let opened = decrypt_text(&registry, &envelope).expect("own envelope opens");

        assert_eq!(opened.plaintext, "hello world");
        assert_eq!(opened.generation.ver, gd.ver);
    }

    #[test]
    fn empty_and_unicode_plaintexts_roundtrip() {
        let (registry, gd) = registry_with_group();

        for msg in ["", "héllo wörld 🙂", ":::", "a|b|c"] {
            let envelope = encrypt_text(&gd, msg).expect("sealing works");
            assert_eq!(
                decrypt_text(&registry, &envelope)
                    .expect("own envelope opens")
                    .plaintext,
                msg
            );
        }
    }

    #[test]
    fn ivs_never_repeat_under_one_key() {
        let (_, gd) = registry_with_group();

        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let envelope = encrypt_text(&gd, "m").expect("sealing works");
            let iv_field = envelope.split(':').nth(1).expect("envelope has 4 fields");

            assert!(
                seen.insert(iv_field.to_string()),
                "an IV repeated within 10k messages under the same key"
            );
        }
    }

    #[test]
    fn any_flipped_ciphertext_or_tag_byte_fails_authentication() {
        let (registry, gd) = registry_with_group();

        let envelope = encrypt_text(&gd, "attack at dawn").expect("sealing works");
        let fields: Vec<&str> = envelope.split(':').collect();

        // Flip every byte of the ciphertext and tag fields in turn.
        for field_idx in [2usize, 3] {
            let bytes = decode_field(fields[field_idx]).expect("field decodes");
            for byte_idx in 0..bytes.len() {
                let mut tampered = bytes.clone();
                tampered[byte_idx] ^= 0x01;

                let mut rebuilt: Vec<String> =
                    fields.iter().map(|f| (*f).to_string()).collect();
                rebuilt[field_idx] = Base64String::from_bytes(&tampered).to_string();

                assert_eq!(
                    decrypt_text(&registry, &rebuilt.join(":")).err(),
                    Some(EnvelopeError::AuthenticationFailed),
                    "tampering must never yield plaintext silently"
                );
            }
        }
    }

    #[test]
    fn unknown_generation_is_reported() {
        let (registry, _) = registry_with_group();

        let other = GroupData::create(
            Identity::new("stranger"),
            "elsewhere",
            BTreeSet::new(),
            UnixMillis::from_millis(5),
            8,
        );
        let envelope = encrypt_text(&other, "not for you").expect("sealing works");

        assert_eq!(
            decrypt_text(&registry, &envelope).err(),
            Some(EnvelopeError::UnknownGeneration)
        );
    }

    #[test]
    fn malformed_envelopes_are_rejected_without_panicking() {
        let (registry, _) = registry_with_group();

        for bad in [
            "",
            "a:b",
            "only three:fields:here",
            "one:two:three:four:five",
            "!!!:AAAA:AAAA:AAAA",
            "AAAA:AAAA:AAAA:AAAA", // wrong iv/tag lengths
        ] {
            assert_eq!(
                decrypt_text(&registry, bad).err(),
                Some(EnvelopeError::Malformed),
                "input {bad:?} should be malformed"
            );
        }
    }

    #[test]
    fn image_roundtrip_preserves_buffer_size() {
        let (registry, gd) = registry_with_group();

        let original: Vec<u8> = (0u8..=255).cycle().take(4 * 64 * 64).collect();
        let mut pixels = original.clone();

        let meta = encrypt_image(&gd, &mut pixels).expect("sealing works");
        assert_eq!(pixels.len(), original.len());
        assert_ne!(pixels, original, "encryption must change the pixels");

        let generation =
            decrypt_image(&registry, &meta, &mut pixels).expect("own image opens");
        assert_eq!(pixels, original);
        assert_eq!(generation.ver, gd.ver);
    }

    #[test]
    fn image_meta_string_roundtrip() {
        let (_, gd) = registry_with_group();

        let mut pixels = vec![7u8; 32];
        let meta = encrypt_image(&gd, &mut pixels).expect("sealing works");

        let parsed = ImageMeta::parse(&meta.to_string()).expect("meta parses");
        assert_eq!(parsed, meta);

        assert_eq!(
            ImageMeta::parse("nocolon").err(),
            Some(EnvelopeError::Malformed)
        );
    }

    #[test]
    fn image_under_unknown_generation_is_reported() {
        let (registry, _) = registry_with_group();

        let meta = ImageMeta {
            ver: VersionPrefix::from_bytes(&[1, 2, 3, 4, 5, 6, 7, 8]),
            iv: [0u8; IMAGE_IV_LEN],
        };
        let mut pixels = vec![0u8; 16];

        assert_eq!(
            decrypt_image(&registry, &meta, &mut pixels).err(),
            Some(EnvelopeError::UnknownGeneration)
        );
    }
}
