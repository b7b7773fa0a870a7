use serde::{Deserialize, Deserializer, Serialize};

use super::Identity;

/// A group name, normalized so it can serve as a stable key component:
/// every run of whitespace becomes a single hyphen.
///
/// Normalization happens on construction *and* on deserialization, so a
/// record written by a peer with a raw name still indexes consistently.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct GroupName(String);

impl GroupName {
    pub fn new(raw: &str) -> Self {
        GroupName(raw.split_whitespace().collect::<Vec<_>>().join("-"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for GroupName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(GroupName::new(&raw))
    }
}

impl std::fmt::Display for GroupName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What ties the generations of one group together: the identity that owns
/// the group plus its normalized name. All generations sharing a `ChainId`
/// form one revocation chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainId {
    pub owner: Identity,
    pub name: GroupName,
}

impl std::fmt::Display for ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_becomes_hyphens() {
        assert_eq!(GroupName::new("my cool  group").as_str(), "my-cool-group");
        assert_eq!(GroupName::new("\tspaced\nout ").as_str(), "spaced-out");
        assert_eq!(GroupName::new("already-stable").as_str(), "already-stable");
    }

    #[test]
    fn deserialization_normalizes() {
        let name: GroupName = serde_json::from_str("\"two words\"").expect("valid json");
        assert_eq!(name.as_str(), "two-words");
    }
}
