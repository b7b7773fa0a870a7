//! Group membership operations: create, rotate, switch. Every membership
//! change cuts a new key generation and re-distributes it, because the whole
//! point of a rotation is that removed members stop being able to read.

use std::collections::BTreeSet;

use lib::{
    constants::KEY_EXCHANGE_SENTINEL,
    crypto::key_exchange,
    group::{GroupData, GroupError},
    identifiers::{ChainId, GroupName, Identity},
    util::time::UnixMillis,
};

use crate::{database::KeyValueStore, messages::MessageDispatch};

use super::Session;

impl<S: KeyValueStore, D: MessageDispatch> Session<S, D> {
    /// Starts a new group chain owned by us, selects it for sending, and
    /// distributes the key to every listed member we have a certificate for.
    pub fn create_group(
        &mut self,
        name: &str,
        members: impl IntoIterator<Item = Identity>,
    ) -> GroupData {
        let members: BTreeSet<Identity> = members.into_iter().collect();
        let identity = self.identity().clone();

        let gd = self
            .groups_mut()
            .create_group(identity, name, members, UnixMillis::now());
        self.persist_groups();

        log::info!("created group {} with {} member(s)", gd.chain_id(), gd.members.len());
        self.distribute(&gd);

        gd
    }

    /// Adds members to the currently selected group by cutting the next
    /// generation of its chain.
    pub fn add_members(
        &mut self,
        additions: impl IntoIterator<Item = Identity>,
    ) -> Result<GroupData, GroupError> {
        let members = {
            let current = self.current_group().ok_or(GroupError::NoActiveGroup)?;
            let mut members = current.members.clone();
            members.extend(additions);
            members
        };

        self.rotate_current(members)
    }

    /// Removes members from the currently selected group. The fresh key is
    /// only distributed to those who remain.
    pub fn remove_members(
        &mut self,
        removals: impl IntoIterator<Item = Identity>,
    ) -> Result<GroupData, GroupError> {
        let removals: BTreeSet<Identity> = removals.into_iter().collect();
        let members = {
            let current = self.current_group().ok_or(GroupError::NoActiveGroup)?;
            current
                .members
                .iter()
                .filter(|member| !removals.contains(member))
                .cloned()
                .collect()
        };

        self.rotate_current(members)
    }

    /// Points outgoing encryption at the newest generation of a known group.
    pub fn select_group(&mut self, owner: &Identity, name: &str) -> Result<GroupData, GroupError> {
        let chain = ChainId {
            owner: owner.clone(),
            name: GroupName::new(name),
        };

        let gd = self.groups_mut().select_latest(&chain)?.clone();
        self.persist_groups();

        Ok(gd)
    }

    fn rotate_current(&mut self, members: BTreeSet<Identity>) -> Result<GroupData, GroupError> {
        let identity = self.identity().clone();
        let gd = self
            .groups_mut()
            .modify_group(&identity, members, UnixMillis::now())?;
        self.persist_groups();

        log::info!(
            "rotated group {} to generation {}",
            gd.chain_id(),
            gd.ver
        );
        self.distribute(&gd);

        Ok(gd)
    }

    /// Seals `gd` to every member with a known certificate. Members without
    /// one are skipped with a warning — they can be re-added once their
    /// certificate shows up. We never seal to ourselves.
    fn distribute(&self, gd: &GroupData) {
        for member in &gd.members {
            if member == self.identity() {
                continue;
            }

            let Some(cert) = self.certificates().latest_for(member) else {
                log::warn!("no certificate for {member}, skipping key distribution");
                continue;
            };

            match key_exchange::seal_group_data_for(cert, gd) {
                Ok(blob) => {
                    self.dispatch.send(&format!("{KEY_EXCHANGE_SENTINEL}{blob}"));
                }
                Err(err) => {
                    log::error!("could not seal group data for {member}: {err}");
                }
            }
        }
    }
}
