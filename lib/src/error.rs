use crate::{
    crypto::{
        certificates::CertificateError, envelope::EnvelopeError,
        key_exchange::KeyExchangeError, keys::KeyGenerationError,
    },
    group::GroupError,
};

/// Umbrella error for callers that do not care which layer failed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("key generation error: {0}")]
    KeyGeneration(#[from] KeyGenerationError),
    #[error("certificate error: {0}")]
    Certificate(#[from] CertificateError),
    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),
    #[error("key exchange error: {0}")]
    KeyExchange(#[from] KeyExchangeError),
    #[error("group lifecycle error: {0}")]
    Group(#[from] GroupError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_errors_convert_and_keep_their_message() {
        let err: Error = EnvelopeError::AuthenticationFailed.into();

        assert!(matches!(err, Error::Envelope(_)));
        assert!(err.to_string().contains("failed authentication"));
    }
}

