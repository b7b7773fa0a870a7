//! Group key generations ("group data"). One generation is a symmetric key
//! plus the membership it was cut for; rotations chain generations together
//! through their `prev` pointers, and the registry in [`registry`] turns the
//! flat list of generations into revocation chains.

pub mod registry;

pub use registry::{GroupError, GroupRegistry, IngestOutcome, RejectReason};

use std::collections::BTreeSet;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::{
    constants::{GROUP_KEY_LEN, MIN_VERSION_PREFIX_LEN},
    crypto::rng::random_array,
    identifiers::{ChainId, GroupName, Identity},
    util::{base64::Base64String, time::UnixMillis},
};

/// A 128-bit symmetric group key.
#[derive(Clone, PartialEq, Eq)]
pub struct GroupKey([u8; GROUP_KEY_LEN]);

impl std::fmt::Debug for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never leak key bytes into logs.
        f.write_str("GroupKey(..)")
    }
}

impl GroupKey {
    pub fn generate() -> Self {
        GroupKey(random_array())
    }

    pub const fn from_bytes(bytes: [u8; GROUP_KEY_LEN]) -> Self {
        GroupKey(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; GROUP_KEY_LEN] {
        &self.0
    }
}

impl Serialize for GroupKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(Base64String::from_bytes(self.0).inner_str())
    }
}

impl<'de> Deserialize<'de> for GroupKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes: [u8; GROUP_KEY_LEN] = Base64String::from_base64_str(&s)
            .ok_or_else(|| de::Error::custom("group key is not base64"))?
            .to_vec()
            .try_into()
            .map_err(|_| de::Error::custom("group key has the wrong length"))?;

        Ok(GroupKey(bytes))
    }
}

/// The on-wire identifier of a generation: a truncated SHA-256 of its key.
///
/// Truncation trades collision resistance for wire compactness; the length
/// is a parameter so the historical short form stays reproducible. Collision
/// handling is the registry's problem, documented there.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionPrefix(Vec<u8>);

impl VersionPrefix {
    pub fn derive(key: &GroupKey, len: usize) -> Self {
        let len = len.clamp(MIN_VERSION_PREFIX_LEN, Sha256::output_size());
        let digest = Sha256::digest(key.as_bytes());

        VersionPrefix(digest[..len].to_vec())
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        VersionPrefix(bytes.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64(&self) -> Base64String {
        Base64String::from_bytes(&self.0)
    }
}

impl std::fmt::Display for VersionPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_base64())
    }
}

impl Serialize for VersionPrefix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.to_base64().inner_str())
    }
}

impl<'de> Deserialize<'de> for VersionPrefix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = Base64String::from_base64_str(&s)
            .ok_or_else(|| de::Error::custom("version prefix is not base64"))?
            .to_vec();

        Ok(VersionPrefix(bytes))
    }
}

/// One group key generation. Field names stay short in JSON because the
/// whole record travels sealed inside a key-exchange envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupData {
    pub key: GroupKey,
    pub ver: VersionPrefix,
    #[serde(rename = "own")]
    pub owner: Identity,
    pub name: GroupName,
    #[serde(rename = "mem")]
    pub members: BTreeSet<Identity>,
    #[serde(rename = "ts")]
    pub created_at: UnixMillis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<VersionPrefix>,
    #[serde(rename = "rev", default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<UnixMillis>,
}

impl GroupData {
    /// Starts a new chain. The owner is always a member of their own group.
    pub fn create(
        owner: Identity,
        name: &str,
        members: BTreeSet<Identity>,
        now: UnixMillis,
        prefix_len: usize,
    ) -> Self {
        let key = GroupKey::generate();
        let ver = VersionPrefix::derive(&key, prefix_len);

        let mut members = members;
        members.insert(owner.clone());

        Self {
            key,
            ver,
            owner,
            name: GroupName::new(name),
            members,
            created_at: now,
            prev: None,
            revoked_at: None,
        }
    }

    /// Cuts the next generation of this chain with a fresh key and the given
    /// membership, linked back to `self` through `prev`.
    pub fn successor(&self, members: BTreeSet<Identity>, now: UnixMillis, prefix_len: usize) -> Self {
        let key = GroupKey::generate();
        let ver = VersionPrefix::derive(&key, prefix_len);

        let mut members = members;
        members.insert(self.owner.clone());

        Self {
            key,
            ver,
            owner: self.owner.clone(),
            name: self.name.clone(),
            members,
            created_at: now,
            prev: Some(self.ver.clone()),
            revoked_at: None,
        }
    }

    pub fn chain_id(&self) -> ChainId {
        ChainId {
            owner: self.owner.clone(),
            name: self.name.clone(),
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}
