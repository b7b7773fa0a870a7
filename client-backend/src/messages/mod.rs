//! The boundary with the transport adapter: what we hand it to send, and
//! what the render pipeline gets back for everything it delivers to us.

use lib::{
    crypto::envelope::{self, EnvelopeError, ImageMeta},
    wire,
};

use crate::{database::KeyValueStore, manager::Session};

pub mod receive;

/// Outbound half of the transport adapter. Fire-and-forget: delivery,
/// retries and timeouts are the host platform's problem.
pub trait MessageDispatch {
    fn send(&self, text: &str);
}

/// What the UI renderer should do with one received message. Decryption
/// failures never escape as errors; they collapse to [`DisplayState::Raw`].
#[derive(Debug, PartialEq, Eq)]
pub enum DisplayState {
    /// One of ours: show the plaintext. `used_revoked_key` asks the UI to
    /// warn that the sender encrypted with a key that was already rotated
    /// out when the message was written.
    Decrypted {
        body: String,
        used_revoked_key: bool,
    },
    /// A protocol control message worth a short status line.
    Control { summary: String },
    /// A protocol control message with nothing to show (duplicate key,
    /// someone else's key exchange, an ignored certificate).
    Ignored,
    /// Not ours, or not decryptable by us: render the original text as-is.
    Raw,
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum SendError {
    #[error("no group is selected; warn instead of sending plaintext")]
    NoActiveGroup,
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

impl<S: KeyValueStore, D: MessageDispatch> Session<S, D> {
    /// Encrypts `input` under the current group key and hands the envelope
    /// to the transport. `NoActiveGroup` is the caller's cue to show the
    /// "no group selected" warning instead of silently sending plaintext.
    pub fn send_text(&self, input: &str) -> Result<(), SendError> {
        self.send_with_attachments(input, &[])
    }

    /// Like [`send_text`](Session::send_text), with attachment metadata
    /// blocks appended to the envelope. The encrypted pixel data itself is
    /// uploaded out of band by the adapter.
    pub fn send_with_attachments(
        &self,
        input: &str,
        attachments: &[ImageMeta],
    ) -> Result<(), SendError> {
        let group = self.current_group().ok_or(SendError::NoActiveGroup)?;

        let envelope = envelope::encrypt_text(group, input)?;
        self.dispatch.send(&wire::frame_attachments(envelope, attachments));

        Ok(())
    }

    /// Encrypts an image's pixel buffer in place under the current group
    /// key. The buffer keeps its dimensions; the returned metadata travels
    /// in the message that references the upload.
    pub fn encrypt_attachment(&self, pixels: &mut [u8]) -> Result<ImageMeta, SendError> {
        let group = self.current_group().ok_or(SendError::NoActiveGroup)?;

        Ok(envelope::encrypt_image(group, pixels)?)
    }
}
