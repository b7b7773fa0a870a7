//! Minimal PEM-style armor. The payload is our own serialization, not DER;
//! the armor exists so key material and certificates survive being pasted
//! through a chat platform as plain text.

use base64ct::{Base64, Encoding};

const LINE_WIDTH: usize = 64;

pub fn encode(label: &str, bytes: &[u8]) -> String {
    let body = Base64::encode_string(bytes);

    let mut out = format!("-----BEGIN {label}-----\n");
    for chunk in body.as_bytes().chunks(LINE_WIDTH) {
        // PANIC SAFETY: chunks of an ASCII string are valid UTF-8.
        out.push_str(std::str::from_utf8(chunk).expect("base64 is ascii"));
        out.push('\n');
    }
    out.push_str(&format!("-----END {label}-----"));

    out
}

/// Strips the armor for `label` and decodes the body. Returns `None` on any
/// structural mismatch; callers map that to their own error type.
pub fn decode(label: &str, pem: &str) -> Option<Vec<u8>> {
    let begin = format!("-----BEGIN {label}-----");
    let end = format!("-----END {label}-----");

    let rest = pem.trim().strip_prefix(&begin)?;
    let body = rest.trim_end().strip_suffix(&end)?;

    let compact: String = body.split_whitespace().collect();
    Base64::decode_vec(&compact).ok()
}
