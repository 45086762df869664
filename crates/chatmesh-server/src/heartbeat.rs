//! The heartbeat monitor: one cycle of pings and evictions.
//!
//! The peers pass runs under the server-table lock and the clients pass
//! under the client-table lock. Clients of an evicted peer are dropped
//! right after the server-table lock is released.

use chatmesh_core::{Address, Message};
use tracing::{debug, info, warn};

use crate::directory::{ClientEntry, Directory};
use crate::error::ServerError;
use crate::liveness::Verdict;
use crate::server::Instance;

/// What a monitor cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeartbeatReport {
    pub pinged_peers: Vec<Address>,
    pub evicted_peers: Vec<Address>,
    /// Clients dropped because their server was evicted.
    pub orphaned_clients: Vec<ClientEntry>,
    pub pinged_clients: Vec<Address>,
    pub evicted_clients: Vec<ClientEntry>,
}

impl Instance {
    pub(crate) async fn heartbeat_once(&mut self) -> Result<HeartbeatReport, ServerError> {
        let (directory, me) = self.context()?;
        let mut report = HeartbeatReport::default();
        self.check_peers(&directory, me, &mut report).await;
        self.check_clients(&directory, me, &mut report).await;
        debug!(
            peers = report.pinged_peers.len(),
            clients = report.pinged_clients.len(),
            "heartbeat cycle"
        );
        Ok(report)
    }

    async fn check_peers(&mut self, directory: &Directory, me: Address, report: &mut HeartbeatReport) {
        {
            let mut servers = directory.servers().await;
            let peers = servers.peers(me);
            self.liveness.retain_peers(&peers);
            for peer in peers {
                match self.liveness.peer_tick(peer) {
                    Verdict::Evict => {
                        servers.remove(peer);
                        warn!(%peer, "server does not respond to heartbeats, removed");
                        report.evicted_peers.push(peer);
                    }
                    Verdict::Ping => report.pinged_peers.push(peer),
                }
            }
        }

        if !report.evicted_peers.is_empty() {
            let mut clients = directory.clients().await;
            for peer in &report.evicted_peers {
                for client in clients.deregister_owned_by(*peer) {
                    info!(name = %client.name, address = %client.address, server = %peer, "client of dead server deregistered");
                    report.orphaned_clients.push(client);
                }
            }
        }

        for peer in &report.pinged_peers {
            self.deliver(*peer, Message::HeartbeatPeer { origin: me });
        }
    }

    async fn check_clients(&mut self, directory: &Directory, me: Address, report: &mut HeartbeatReport) {
        {
            let mut clients = directory.clients().await;
            let owned = clients.owned_slots(me);
            let served: Vec<Address> = owned.iter().map(|(_, address)| *address).collect();
            self.liveness.retain_clients(&served);
            for (slot, address) in owned {
                match self.liveness.client_tick(address) {
                    Verdict::Evict => {
                        if let Some(client) = clients.deregister(slot) {
                            warn!(name = %client.name, %address, "client does not respond to heartbeats, removed");
                            report.evicted_clients.push(client);
                        }
                    }
                    Verdict::Ping => report.pinged_clients.push(address),
                }
            }
        }

        for address in &report.pinged_clients {
            self.deliver(*address, Message::Heartbeat { origin: me });
        }
    }
}
