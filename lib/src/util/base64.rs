use std::fmt::Display;

use base64ct::{Base64, Encoding};

/// A string that is guaranteed to be well-formed standard (padded) Base64.
///
/// Every field of the wire envelope travels as one of these, so decoding
/// after construction cannot fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64String(String);

impl Display for Base64String {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Base64String {
    pub fn inner_str(&self) -> &str {
        &self.0
    }

    /// Validates `s` and wraps it. Returns `None` if `s` is not Base64.
    pub fn from_base64_str(s: &str) -> Option<Self> {
        Base64::decode_vec(s)
            .ok()
            .map(|_| Base64String(s.to_string()))
    }

    pub fn from_bytes<Bytes: AsRef<[u8]>>(bytes: Bytes) -> Self {
        Base64String(Base64::encode_string(bytes.as_ref()))
    }

    pub fn to_vec(&self) -> Vec<u8> {
        Base64::decode_vec(&self.0).expect("Base64String type is guaranteed to be well formed")
    }
}

/// Decodes one Base64 field of a colon-delimited envelope.
pub fn decode_field(s: &str) -> Option<Vec<u8>> {
    Base64::decode_vec(s).ok()
}

/// Whether `s` could be a Base64 envelope field. A cheap syntactic check,
/// used by message classification before any real parsing happens.
pub fn looks_like_base64(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'=')
}
