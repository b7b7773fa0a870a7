//! The group key lifecycle state machine.
//!
//! The flat generation list is the single source of truth; the `by_ver` and
//! `by_chain` indices are derived from it and rebuilt behind the one
//! mutation entry point ([`GroupRegistry::ingest`]). Lifecycle violations
//! come back as [`IngestOutcome`] values so the message pipeline stays live
//! no matter what a peer sends us.

use std::collections::{BTreeSet, HashMap};

use crate::{
    constants::VERSION_PREFIX_LEN,
    identifiers::{ChainId, Identity},
    util::time::UnixMillis,
};

use super::{GroupData, VersionPrefix};

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum GroupError {
    #[error("only the group owner can change its membership")]
    NotOwner,
    #[error("no group is currently selected")]
    NoActiveGroup,
    #[error("no generation with this version is known")]
    UnknownGeneration,
}

/// Why an incoming generation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The candidate claims to supersede a generation that was already
    /// revoked when it arrived. Honoring it would let an attacker splice a
    /// stale chain back to life.
    RollbackRejected,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::RollbackRejected => {
                f.write_str("predecessor generation was already revoked")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Accepted,
    DuplicateIgnored,
    Rejected(RejectReason),
}

#[derive(Debug, Default)]
pub struct GroupRegistry {
    prefix_len: usize,
    /// Source of truth. Everything else in here is derived.
    generations: Vec<GroupData>,
    /// Outgoing encryption uses this generation.
    current: Option<VersionPrefix>,
    /// First occurrence in list order wins on prefix collision.
    by_ver: HashMap<Vec<u8>, usize>,
    /// Chain members as list indices, sorted by creation time.
    by_chain: HashMap<ChainId, Vec<usize>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::with_prefix_len(VERSION_PREFIX_LEN)
    }

    /// A registry cutting new generations with the given version-prefix
    /// truncation. Short prefixes reproduce the historical compact wire
    /// format together with its collision risk.
    pub fn with_prefix_len(prefix_len: usize) -> Self {
        Self {
            prefix_len,
            ..Self::default()
        }
    }

    /// Rebuilds a registry from persisted records. The records keep whatever
    /// revocation state they were stored with.
    pub fn from_records(
        records: Vec<GroupData>,
        current: Option<VersionPrefix>,
        prefix_len: usize,
    ) -> Self {
        let mut registry = Self {
            prefix_len,
            generations: records,
            current: None,
            by_ver: HashMap::new(),
            by_chain: HashMap::new(),
        };
        registry.rebuild_indices();

        // A dangling pointer from storage is dropped rather than trusted.
        registry.current =
            current.filter(|ver| registry.by_ver.contains_key(ver.as_bytes()));

        registry
    }

    pub fn records(&self) -> &[GroupData] {
        &self.generations
    }

    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }

    pub fn current(&self) -> Option<&GroupData> {
        self.current
            .as_ref()
            .and_then(|ver| self.find_by_prefix(ver.as_bytes()))
    }

    /// All chains we know at least one generation of.
    pub fn chains(&self) -> impl Iterator<Item = &ChainId> {
        self.by_chain.keys()
    }

    /// Points outgoing encryption at a specific known generation.
    pub fn select(&mut self, ver: &VersionPrefix) -> Result<&GroupData, GroupError> {
        let idx = *self
            .by_ver
            .get(ver.as_bytes())
            .ok_or(GroupError::UnknownGeneration)?;
        self.current = Some(ver.clone());

        Ok(&self.generations[idx])
    }

    /// Points outgoing encryption at the newest generation of a chain.
    pub fn select_latest(&mut self, chain: &ChainId) -> Result<&GroupData, GroupError> {
        let ver = self
            .newest_of(chain)
            .map(|gd| gd.ver.clone())
            .ok_or(GroupError::UnknownGeneration)?;

        self.select(&ver)
    }

    /// Starts a new chain owned by `owner` and selects it for sending.
    pub fn create_group(
        &mut self,
        owner: Identity,
        name: &str,
        members: BTreeSet<Identity>,
        now: UnixMillis,
    ) -> GroupData {
        let gd = GroupData::create(owner, name, members, now, self.prefix_len);

        self.ingest(gd.clone());
        self.current = Some(gd.ver.clone());

        gd
    }

    /// Cuts the next generation of the currently selected chain with new
    /// membership. Only the chain's owner may do this; the caller still has
    /// to distribute the result to every member.
    pub fn modify_group(
        &mut self,
        caller: &Identity,
        members: BTreeSet<Identity>,
        now: UnixMillis,
    ) -> Result<GroupData, GroupError> {
        let current = self.current().ok_or(GroupError::NoActiveGroup)?;
        if current.owner != *caller {
            return Err(GroupError::NotOwner);
        }

        // Rotation always chains from the newest generation, even when the
        // selection points at an older one.
        let chain = current.chain_id();
        let base = self.newest_of(&chain).unwrap_or(current);

        // Wall clocks tick coarsely; the chain must still be strictly
        // ordered even when two rotations land in the same millisecond.
        let now = if now > base.created_at {
            now
        } else {
            base.created_at.saturating_add(1)
        };

        let gd = base.successor(members, now, self.prefix_len);

        self.ingest(gd.clone());
        self.current = Some(gd.ver.clone());

        Ok(gd)
    }

    /// The one mutation entry point. Deduplicates by version, guards against
    /// stale-chain injection, then re-derives revocation state and indices
    /// from the updated flat list.
    pub fn ingest(&mut self, candidate: GroupData) -> IngestOutcome {
        if self.by_ver.contains_key(candidate.ver.as_bytes()) {
            return IngestOutcome::DuplicateIgnored;
        }

        if let Some(prev) = &candidate.prev {
            if self
                .find_by_prefix(prev.as_bytes())
                .is_some_and(GroupData::is_revoked)
            {
                return IngestOutcome::Rejected(RejectReason::RollbackRejected);
            }
        }

        let chain = candidate.chain_id();
        let ver = candidate.ver.clone();
        let created_at = candidate.created_at;

        // Revocation state is ours to derive; whatever the sender claimed
        // does not survive ingestion.
        let mut candidate = candidate;
        candidate.revoked_at = None;

        let previously_current = self.current().map(|gd| (gd.chain_id(), gd.created_at));

        self.generations.push(candidate);
        self.normalize_chain(&chain);
        self.rebuild_indices();

        match previously_current {
            None => self.current = Some(ver),
            Some((current_chain, current_created)) => {
                if current_chain == chain && created_at > current_created {
                    self.current = Some(ver);
                }
            }
        }

        IngestOutcome::Accepted
    }

    /// Generation lookup for the envelope codec. On a truncated-prefix
    /// collision the first generation in list order wins; messages under the
    /// shadowed key will fail authentication. That is the documented cost of
    /// short prefixes.
    pub fn find_by_prefix(&self, prefix: &[u8]) -> Option<&GroupData> {
        self.by_ver.get(prefix).map(|&idx| &self.generations[idx])
    }

    pub fn newest_of(&self, chain: &ChainId) -> Option<&GroupData> {
        self.by_chain
            .get(chain)
            .and_then(|indices| indices.last())
            .map(|&idx| &self.generations[idx])
    }

    /// Whether decrypting a message stamped `message_ts` under the
    /// generation `ver` means a revoked key was still in use after its
    /// revocation point.
    pub fn is_stale_use(&self, ver: &VersionPrefix, message_ts: UnixMillis) -> bool {
        self.find_by_prefix(ver.as_bytes())
            .and_then(|gd| gd.revoked_at)
            .is_some_and(|revoked_at| message_ts > revoked_at)
    }

    /// Re-derives the revocation chain invariant for one chain: ordered by
    /// creation time, every generation except the newest carries the
    /// creation time of its immediate successor as its revocation time.
    fn normalize_chain(&mut self, chain: &ChainId) {
        let mut indices: Vec<usize> = self
            .generations
            .iter()
            .enumerate()
            .filter(|(_, gd)| gd.chain_id() == *chain)
            .map(|(idx, _)| idx)
            .collect();
        indices.sort_by_key(|&idx| self.generations[idx].created_at);

        for pair in indices.windows(2) {
            let successor_created = self.generations[pair[1]].created_at;
            self.generations[pair[0]].revoked_at = Some(successor_created);
        }
        if let Some(&newest) = indices.last() {
            self.generations[newest].revoked_at = None;
        }
    }

    fn rebuild_indices(&mut self) {
        self.by_ver.clear();
        self.by_chain.clear();

        for (idx, gd) in self.generations.iter().enumerate() {
            self.by_ver.entry(gd.ver.as_bytes().to_vec()).or_insert(idx);
            self.by_chain.entry(gd.chain_id()).or_default().push(idx);
        }

        for indices in self.by_chain.values_mut() {
            indices.sort_by_key(|&idx| self.generations[idx].created_at);
        }
    }
}
