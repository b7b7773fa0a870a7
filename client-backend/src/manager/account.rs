//! Identity lifecycle: keypair generation and certificate announcement.

use anyhow::{Context, Result};
use lib::{
    crypto::{certificates::Certificate, keys::IdentityKeyPair},
    util::time::UnixMillis,
};

use crate::{database::KeyValueStore, messages::MessageDispatch};

use super::Session;

impl<S: KeyValueStore, D: MessageDispatch> Session<S, D> {
    /// Loads-or-generates the identity keypair. Generation is offloaded to a
    /// blocking worker so inbound messages keep flowing while it runs; the
    /// completion re-enters the session through `&mut self`.
    pub async fn ensure_identity(&mut self) -> Result<()> {
        if self.has_identity() {
            return Ok(());
        }

        self.generate_identity().await
    }

    /// Unconditionally generates and persists a fresh keypair, replacing any
    /// existing one. Peers keep sealing to the old certificate until a new
    /// one is announced.
    pub async fn generate_identity(&mut self) -> Result<()> {
        log::info!("generating identity keypair for {}", self.identity());

        let keys = tokio::task::spawn_blocking(IdentityKeyPair::generate)
            .await
            .context("key generation task died")?
            .context("key generation failed")?;

        self.set_keypair(keys);
        log::info!("identity keypair ready for {}", self.identity());

        Ok(())
    }

    /// Issues a self-signed certificate over the current keypair, valid for
    /// a year from now.
    pub fn issue_certificate(&self) -> Result<Certificate> {
        let keys = self
            .keypair()
            .context("no identity keypair; generate one first")?;

        Ok(Certificate::issue(
            keys,
            self.identity().clone(),
            UnixMillis::now(),
        ))
    }

    /// Issues a certificate and broadcasts its armor over the transport so
    /// peers can start sealing group keys to us. Our own copy comes back
    /// through the channel like everyone else's.
    pub fn announce_certificate(&self) -> Result<Certificate> {
        let cert = self.issue_certificate()?;
        self.dispatch.send(cert.pem());

        Ok(cert)
    }
}
