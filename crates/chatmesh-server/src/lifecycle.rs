//! Joining and leaving a directory.
//!
//! An instance first attaches to a directory (or creates one), then opens
//! its mailbox and claims a server slot. Detaching drops every client the
//! instance serves; the last instance to leave destroys the directory.

use tracing::{info, warn};

use crate::error::ServerError;
use crate::ipc::DirectoryId;
use crate::server::{Attachment, Connection, Instance};

impl Instance {
    /// Allocate a brand-new directory and attach to it.
    pub(crate) fn create(&mut self) -> Result<(), ServerError> {
        info!("creating new directory");
        let (id, directory) = self.ipc.create_directory(self.limits)?;
        self.attachment = Some(Attachment { id, directory });
        Ok(())
    }

    /// Attach to directory `id`, creating a new one if it cannot be opened.
    pub(crate) async fn attach(&mut self, id: DirectoryId) -> Result<(), ServerError> {
        if self.attachment.is_some() {
            self.detach().await;
        }
        match self.ipc.open_directory(id) {
            Ok(directory) => {
                info!(directory = %id, "attached to directory");
                self.limits = directory.limits();
                self.attachment = Some(Attachment { id, directory });
                Ok(())
            }
            Err(e) => {
                warn!(directory = %id, error = %e, "could not attach to directory");
                self.create()
            }
        }
    }

    /// Open this instance's mailbox and claim a server slot. A full
    /// directory is abandoned for a fresh one.
    pub(crate) async fn connection_setup(&mut self) -> Result<(), ServerError> {
        if let Some(old) = self.connection.take() {
            self.ipc.remove_mailbox(old.mailbox.address());
        }
        let mailbox = self.ipc.create_mailbox()?;
        let address = mailbox.address();

        let directory = self
            .attachment
            .as_ref()
            .ok_or(ServerError::NotAttached)?
            .directory
            .clone();
        let claimed = directory.servers().await.claim_first_free(address);

        let slot = match claimed {
            Some(slot) => slot,
            None => {
                warn!(%address, "no free server slot, starting a new directory");
                self.detach().await;
                self.create()?;
                let directory = &self.attachment.as_ref().ok_or(ServerError::NotAttached)?.directory;
                directory.servers().await.force_claim(0, address);
                0
            }
        };
        self.connection = Some(Connection { mailbox, slot });

        let id = self.attachment.as_ref().map(|a| a.id).ok_or(ServerError::NotAttached)?;
        info!(directory = %id, %address, slot, "alive and kicking");
        info!("connect more servers to {id}");
        info!("connect clients to {address}");
        Ok(())
    }

    /// Leave the directory. Frees this instance's server slot, deregisters
    /// its clients and destroys its mailbox; the last instance out also
    /// destroys the directory.
    pub(crate) async fn detach(&mut self) {
        let me = self.connection.as_ref().map(|c| c.mailbox.address());

        if let Some(attachment) = self.attachment.take() {
            info!(directory = %attachment.id, "detaching from directory");

            let remaining = {
                let mut servers = attachment.directory.servers().await;
                if let Some(me) = me {
                    servers.remove(me);
                }
                servers.len()
            };

            if let Some(me) = me {
                let dropped = attachment.directory.clients().await.deregister_owned_by(me);
                for client in dropped {
                    info!(name = %client.name, address = %client.address, room = %client.room, "client deregistered");
                }
            }

            if remaining == 0 {
                info!(directory = %attachment.id, "no servers left, removing directory");
                self.ipc.remove_directory(attachment.id);
            }
        }

        if let Some(me) = me {
            self.ipc.remove_mailbox(me);
        }
        self.connection = None;
        self.liveness.clear();
    }

    /// Rejoin after a peer evicted this instance. Every local client is
    /// lost: detaching deregisters them.
    pub(crate) async fn recover(&mut self) -> Result<(), ServerError> {
        let id = self.attachment.as_ref().map(|a| a.id).ok_or(ServerError::NotAttached)?;
        self.detach().await;
        self.attach(id).await?;
        self.connection_setup().await
    }
}
