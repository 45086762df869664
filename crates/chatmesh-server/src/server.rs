//! Server instance handle and run loop.

use std::future::Future;
use std::sync::Arc;

use chatmesh_core::{Address, Limits, Mailbox, Message};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::directory::Directory;
use crate::error::ServerError;
use crate::heartbeat::HeartbeatReport;
use crate::ipc::{DirectoryId, Ipc};
use crate::liveness::Liveness;

/// A running chat server instance.
///
/// The dispatcher and the heartbeat monitor are two activities over the
/// same instance-local state; each takes the instance lock for one cycle.
pub struct Server {
    config: ServerConfig,
    instance: Mutex<Instance>,
}

/// State owned by one instance: its place in the directory, its mailbox and
/// the liveness of whatever it pings.
pub(crate) struct Instance {
    pub(crate) ipc: Ipc,
    pub(crate) limits: Limits,
    pub(crate) attachment: Option<Attachment>,
    pub(crate) connection: Option<Connection>,
    pub(crate) liveness: Liveness,
}

pub(crate) struct Attachment {
    pub(crate) id: DirectoryId,
    pub(crate) directory: Arc<Directory>,
}

pub(crate) struct Connection {
    pub(crate) mailbox: Mailbox,
    /// Server-table slot this instance claimed.
    pub(crate) slot: usize,
}

impl Server {
    /// Join the configured directory (or create one) and claim a server slot.
    pub async fn start(ipc: Ipc, config: ServerConfig) -> Result<Self, ServerError> {
        let mut instance = Instance::new(ipc, config.limits);
        match config.directory {
            Some(id) => instance.attach(id).await?,
            None => instance.create()?,
        }
        instance.connection_setup().await?;
        Ok(Self {
            config,
            instance: Mutex::new(instance),
        })
    }

    /// This instance's mailbox address, if connected.
    pub async fn address(&self) -> Option<Address> {
        let instance = self.instance.lock().await;
        instance.connection.as_ref().map(|c| c.mailbox.address())
    }

    /// Identifier of the directory this instance is attached to.
    pub async fn directory_id(&self) -> Option<DirectoryId> {
        let instance = self.instance.lock().await;
        instance.attachment.as_ref().map(|a| a.id)
    }

    pub async fn directory(&self) -> Option<Arc<Directory>> {
        let instance = self.instance.lock().await;
        instance.attachment.as_ref().map(|a| a.directory.clone())
    }

    /// Run one dispatcher cycle. Returns the number of messages handled.
    pub async fn dispatch_once(&self) -> Result<usize, ServerError> {
        self.instance.lock().await.dispatch_once().await
    }

    /// Run one heartbeat monitor cycle.
    pub async fn heartbeat_once(&self) -> Result<HeartbeatReport, ServerError> {
        self.instance.lock().await.heartbeat_once().await
    }

    /// Leave the directory, dropping every client this instance serves.
    pub async fn shutdown(&self) {
        self.instance.lock().await.detach().await;
    }

    /// Drive the dispatcher and the heartbeat monitor until `shutdown`
    /// resolves or either activity fails, then detach.
    pub async fn run<F>(self: Arc<Self>, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let mut dispatcher = tokio::spawn(self.clone().dispatch_loop());
        let mut monitor = tokio::spawn(self.clone().monitor_loop());

        let outcome = tokio::select! {
            joined = &mut dispatcher => joined.map_err(ServerError::from).and_then(|r| r),
            joined = &mut monitor => joined.map_err(ServerError::from).and_then(|r| r),
            _ = shutdown => {
                info!("shutdown requested");
                Ok(())
            }
        };

        dispatcher.abort();
        monitor.abort();
        if let Err(e) = &outcome {
            error!(error = %e, "server activity failed");
        }
        self.shutdown().await;
        outcome
    }

    async fn dispatch_loop(self: Arc<Self>) -> Result<(), ServerError> {
        let idle = self.config.idle_poll();
        loop {
            if self.dispatch_once().await? == 0 {
                tokio::time::sleep(idle).await;
            }
        }
    }

    async fn monitor_loop(self: Arc<Self>) -> Result<(), ServerError> {
        let mut interval = tokio::time::interval(self.config.heartbeat_interval());
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            self.heartbeat_once().await?;
        }
    }
}

impl Instance {
    pub(crate) fn new(ipc: Ipc, limits: Limits) -> Self {
        Self {
            ipc,
            limits,
            attachment: None,
            connection: None,
            liveness: Liveness::new(),
        }
    }

    /// The attached directory and this instance's own address.
    pub(crate) fn context(&self) -> Result<(Arc<Directory>, Address), ServerError> {
        let attachment = self.attachment.as_ref().ok_or(ServerError::NotAttached)?;
        let connection = self.connection.as_ref().ok_or(ServerError::NotConnected)?;
        Ok((attachment.directory.clone(), connection.mailbox.address()))
    }

    /// Best-effort delivery. Failures are dropped.
    pub(crate) fn deliver(&self, to: Address, message: Message) {
        if let Err(e) = self.ipc.send(to, message) {
            debug!(%to, error = %e, "delivery dropped");
        }
    }
}
