//! The inbound pipeline. Every message the adapter unwraps lands in
//! [`Session::receive`], gets classified once, and comes back as a
//! [`DisplayState`]. Nothing in here is allowed to take the render path
//! down: unknown keys, bad tags, garbage blobs and malformed certificates
//! all degrade to an ignorable outcome.

use lib::{
    crypto::{
        certificates::Certificate,
        envelope::{self, DecryptedText, EnvelopeError, ImageMeta},
        key_exchange,
    },
    group::IngestOutcome,
    util::time::UnixMillis,
    wire::{self, Inbound},
};

use crate::{database::KeyValueStore, manager::Session};

use super::{DisplayState, MessageDispatch};

impl<S: KeyValueStore, D: MessageDispatch> Session<S, D> {
    /// Handles one inbound message. `received_at` is the host's (approximate)
    /// delivery timestamp; it drives stale-key detection.
    pub fn receive(&mut self, text: &str, received_at: UnixMillis) -> DisplayState {
        match wire::classify(text) {
            Inbound::Certificate(pem) => self.receive_certificate(pem),
            Inbound::KeyExchange(blob) => self.receive_key_exchange(blob),
            Inbound::Ciphertext { envelope, .. } => {
                self.receive_ciphertext(envelope, received_at)
            }
            Inbound::Plaintext(_) => DisplayState::Raw,
        }
    }

    /// Decrypts one attachment's pixel buffer in place, using the metadata
    /// block that arrived with the message. Returns whether the sender used
    /// an already-revoked key.
    pub fn decrypt_attachment(
        &self,
        meta: &str,
        pixels: &mut [u8],
        received_at: UnixMillis,
    ) -> Result<bool, EnvelopeError> {
        let meta = ImageMeta::parse(meta)?;
        let generation = envelope::decrypt_image(self.groups(), &meta, pixels)?;

        Ok(self.groups().is_stale_use(&generation.ver, received_at))
    }

    fn receive_certificate(&mut self, pem: &str) -> DisplayState {
        match Certificate::from_pem(pem) {
            Ok(cert) => {
                let issuer = cert.issuer().clone();

                if self.certificates_mut().insert(cert) {
                    self.persist_certificates();
                    DisplayState::Control {
                        summary: format!("stored certificate for {issuer}"),
                    }
                } else {
                    log::debug!("certificate for {issuer} does not extend the stored one");
                    DisplayState::Ignored
                }
            }
            Err(err) => {
                // Recoverable by design: a bad certificate is just skipped.
                log::warn!("ignoring certificate: {err}");
                DisplayState::Ignored
            }
        }
    }

    fn receive_key_exchange(&mut self, blob: &str) -> DisplayState {
        let Some(keys) = self.keypair() else {
            log::debug!("received a key exchange but we have no keypair yet");
            return DisplayState::Ignored;
        };

        // Most sealed blobs in a busy channel are for somebody else.
        let Some(gd) = key_exchange::open_group_data(keys, blob) else {
            return DisplayState::Ignored;
        };

        let members: Vec<&str> = gd.members.iter().map(|m| m.as_str()).collect();
        let summary = format!("added to group ({})", members.join(", "));

        match self.groups_mut().ingest(gd) {
            IngestOutcome::Accepted => {
                self.persist_groups();
                DisplayState::Control { summary }
            }
            IngestOutcome::DuplicateIgnored => {
                log::debug!("ignoring group key we already hold");
                DisplayState::Ignored
            }
            IngestOutcome::Rejected(reason) => {
                // Audit trail for what may be an injection attempt.
                log::warn!("rejected incoming group key: {reason}");
                DisplayState::Ignored
            }
        }
    }

    fn receive_ciphertext(&self, envelope: &str, received_at: UnixMillis) -> DisplayState {
        match envelope::decrypt_text(self.groups(), envelope) {
            Ok(DecryptedText {
                plaintext,
                generation,
            }) => {
                let used_revoked_key = self.groups().is_stale_use(&generation.ver, received_at);
                if used_revoked_key {
                    log::warn!(
                        "message decrypted with generation {} after its revocation",
                        generation.ver
                    );
                }

                DisplayState::Decrypted {
                    body: plaintext,
                    used_revoked_key,
                }
            }
            Err(err) => {
                // "Not decryptable by us" is an expected outcome; the UI
                // shows the raw text.
                log::debug!("cannot decrypt envelope, rendering raw: {err}");
                DisplayState::Raw
            }
        }
    }
}
