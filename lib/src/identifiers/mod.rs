//! Identifiers for people and groups. Identities are the display names the
//! host platform reports; there is no server-assigned account id to lean on.
pub mod group;

pub use group::{ChainId, GroupName};

use serde::{Deserialize, Serialize};

/// The identity string a certificate speaks for and a group member is listed
/// under. Taken verbatim from the host platform's notion of a username.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(name: impl Into<String>) -> Self {
        Identity(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Identity(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_serializes_as_bare_string() {
        let alice = Identity::new("alice");
        let json = serde_json::to_string(&alice).expect("serialization works");

        assert_eq!(json, "\"alice\"");
    }
}
