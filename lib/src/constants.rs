//! Protocol-wide constants. Wire-visible values live here so the codecs and
//! the classifier cannot drift apart.

/// Leading character marking a message as a sealed group-key payload.
pub const KEY_EXCHANGE_SENTINEL: char = '_';

/// Certificates are classified by this prefix alone, like any PEM blob.
pub const PEM_BEGIN: &str = "-----BEGIN";

pub const CERTIFICATE_PEM_LABEL: &str = "SHROUD CERTIFICATE";
pub const PRIVATE_KEY_PEM_LABEL: &str = "SHROUD PRIVATE KEY";
pub const PUBLIC_KEY_PEM_LABEL: &str = "SHROUD PUBLIC KEY";

/// Self-signed certificates are valid for one year from issuance.
pub const CERTIFICATE_VALIDITY_MILLIS: u64 = 365 * 24 * 60 * 60 * 1000;

/// Group keys are 128-bit AES keys.
pub const GROUP_KEY_LEN: usize = 16;

/// GCM nonce length for the text path. Fresh random per message.
pub const TEXT_IV_LEN: usize = 12;

/// GCM authentication tag length.
pub const TAG_LEN: usize = 16;

/// CTR needs a full block of IV for the image path.
pub const IMAGE_IV_LEN: usize = 16;

/// Default truncation of the key-hash version identifier, in bytes.
/// 8 bytes keeps collisions negligible within one conversation's lifetime.
pub const VERSION_PREFIX_LEN: usize = 8;

/// Shortest truncation the registry will accept. 4 bytes matches the most
/// compact historical wire format; collision behavior at this length is
/// deliberate and covered by tests.
pub const MIN_VERSION_PREFIX_LEN: usize = 4;

/// Attachment metadata blocks are appended to a text envelope with this
/// separator.
pub const ATTACHMENT_SEPARATOR: char = '|';
