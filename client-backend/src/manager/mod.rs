pub mod account;
pub mod groups;

use anyhow::Result;
use lib::{
    constants::VERSION_PREFIX_LEN,
    crypto::{certificates::CertificateStore, keys::IdentityKeyPair},
    group::{GroupData, GroupRegistry},
    identifiers::Identity,
};

use crate::{
    database::{Database, KeyValueStore},
    messages::MessageDispatch,
};

/// One user's session: their identity keypair, the certificates of everyone
/// they have heard from, and every group key generation they know.
///
/// There are no ambient globals; whoever owns the `Session` owns all mutable
/// state, and every mutation takes `&mut self`, which serializes events by
/// construction. A host embedding this on a multi-threaded runtime wraps the
/// session in its own lock.
pub struct Session<S: KeyValueStore, D: MessageDispatch> {
    identity: Identity,
    keypair: Option<IdentityKeyPair>,
    certificates: CertificateStore,
    groups: GroupRegistry,
    pub(crate) database: Database<S>,
    pub(crate) dispatch: D,
}

impl<S: KeyValueStore, D: MessageDispatch> std::fmt::Debug for Session<S, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("has_identity", &self.keypair.is_some())
            .finish_non_exhaustive()
    }
}

impl<S: KeyValueStore, D: MessageDispatch> Session<S, D> {
    /// Loads all persisted state from `store`. A fresh store yields an empty
    /// session with no keypair; call
    /// [`ensure_identity`](Session::ensure_identity) before doing anything
    /// that needs one.
    pub fn open(identity: Identity, store: S, dispatch: D) -> Result<Self> {
        log::info!("opening session for {identity}: loading stored state");

        let database = Database::new(store);
        let keypair = database.keypair()?;
        let certificates = database.certificates()?;
        let groups = database.groups(VERSION_PREFIX_LEN)?;

        if keypair.is_some() {
            log::info!("loaded identity keypair for {identity}");
        }

        Ok(Self {
            identity,
            keypair,
            certificates,
            groups,
            database,
            dispatch,
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn has_identity(&self) -> bool {
        self.keypair.is_some()
    }

    pub(crate) fn keypair(&self) -> Option<&IdentityKeyPair> {
        self.keypair.as_ref()
    }

    pub(crate) fn set_keypair(&mut self, keys: IdentityKeyPair) {
        self.database.set_keypair(&keys);
        self.keypair = Some(keys);
    }

    pub fn certificates(&self) -> &CertificateStore {
        &self.certificates
    }

    pub(crate) fn certificates_mut(&mut self) -> &mut CertificateStore {
        &mut self.certificates
    }

    pub fn groups(&self) -> &GroupRegistry {
        &self.groups
    }

    pub(crate) fn groups_mut(&mut self) -> &mut GroupRegistry {
        &mut self.groups
    }

    pub fn current_group(&self) -> Option<&GroupData> {
        self.groups.current()
    }

    /// Flushes certificate state after a mutation.
    pub(crate) fn persist_certificates(&mut self) {
        self.database.set_certificates(&self.certificates);
    }

    /// Flushes group state after a mutation.
    pub(crate) fn persist_groups(&mut self) {
        self.database.set_groups(&self.groups);
    }
}
