//! Classification of everything the transport adapter hands us.
//!
//! The host platform's own framing is already stripped by the adapter; what
//! arrives here is the inner payload. One function decides what it is, so no
//! prefix-sniffing leaks into the rest of the pipeline.

use crate::{
    constants::{ATTACHMENT_SEPARATOR, KEY_EXCHANGE_SENTINEL, PEM_BEGIN},
    crypto::envelope::ImageMeta,
    util::base64::looks_like_base64,
};

/// Every inbound message is exactly one of these.
#[derive(Debug, PartialEq, Eq)]
pub enum Inbound<'a> {
    /// PEM armor; registered into the certificate store.
    Certificate(&'a str),
    /// A sealed group-data blob (sentinel already stripped).
    KeyExchange(&'a str),
    /// A text envelope, possibly followed by attachment metadata blocks.
    Ciphertext {
        envelope: &'a str,
        attachments: Vec<&'a str>,
    },
    /// Anything else: not ours, rendered as-is.
    Plaintext(&'a str),
}

pub fn classify(text: &str) -> Inbound<'_> {
    let trimmed = text.trim();

    if trimmed.starts_with(PEM_BEGIN) {
        return Inbound::Certificate(trimmed);
    }

    if let Some(blob) = trimmed.strip_prefix(KEY_EXCHANGE_SENTINEL) {
        return Inbound::KeyExchange(blob);
    }

    let mut blocks = trimmed.split(ATTACHMENT_SEPARATOR);
    let first = blocks.next().unwrap_or_default();
    if looks_like_text_envelope(first) {
        return Inbound::Ciphertext {
            envelope: first,
            attachments: blocks.collect(),
        };
    }

    Inbound::Plaintext(text)
}

/// Four colon-delimited Base64 fields. A syntactic check only; real parsing
/// (and failure handling) belongs to the envelope codec.
fn looks_like_text_envelope(s: &str) -> bool {
    let fields: Vec<&str> = s.split(':').collect();

    fields.len() == 4 && fields.iter().all(|f| looks_like_base64(f))
}

/// Appends attachment metadata blocks to an outgoing text envelope.
pub fn frame_attachments(envelope: String, attachments: &[ImageMeta]) -> String {
    let mut out = envelope;
    for meta in attachments {
        out.push(ATTACHMENT_SEPARATOR);
        out.push_str(&meta.to_string());
    }

    out
}
