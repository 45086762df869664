//! Per-instance liveness bookkeeping.
//!
//! Each instance tracks only the peers and clients it pings itself, so this
//! state is never shared. Peers are evicted after three consecutive
//! unanswered cycles, clients after one.

use std::collections::HashMap;

use chatmesh_core::Address;

/// Unanswered cycles after which a peer is declared dead.
pub const PEER_MISS_LIMIT: u32 = 3;

/// Liveness of a peer server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerLiveness {
    /// Heard from since the last ping.
    Alive,
    /// Pinged `missed` times without hearing back.
    Awaiting { missed: u32 },
}

/// Liveness of a locally served client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientLiveness {
    Alive,
    Awaiting,
}

/// What a monitor cycle should do with an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ping,
    Evict,
}

/// Liveness of everything this instance pings. Unknown entries count as
/// alive.
#[derive(Debug, Default)]
pub struct Liveness {
    clients: HashMap<Address, ClientLiveness>,
    peers: HashMap<Address, PeerLiveness>,
}

impl Liveness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a heartbeat from a client.
    pub fn client_seen(&mut self, client: Address) {
        self.clients.insert(client, ClientLiveness::Alive);
    }

    /// Record a heartbeat from a peer.
    pub fn peer_seen(&mut self, peer: Address) {
        self.peers.insert(peer, PeerLiveness::Alive);
    }

    pub fn client(&self, client: Address) -> ClientLiveness {
        self.clients.get(&client).copied().unwrap_or(ClientLiveness::Alive)
    }

    pub fn peer(&self, peer: Address) -> PeerLiveness {
        self.peers.get(&peer).copied().unwrap_or(PeerLiveness::Alive)
    }

    /// Advance a client by one monitor cycle.
    pub fn client_tick(&mut self, client: Address) -> Verdict {
        match self.client(client) {
            ClientLiveness::Awaiting => {
                self.clients.remove(&client);
                Verdict::Evict
            }
            ClientLiveness::Alive => {
                self.clients.insert(client, ClientLiveness::Awaiting);
                Verdict::Ping
            }
        }
    }

    /// Advance a peer by one monitor cycle.
    pub fn peer_tick(&mut self, peer: Address) -> Verdict {
        let missed = match self.peer(peer) {
            PeerLiveness::Alive => 0,
            PeerLiveness::Awaiting { missed } => missed,
        };
        if missed >= PEER_MISS_LIMIT {
            self.peers.remove(&peer);
            Verdict::Evict
        } else {
            self.peers.insert(peer, PeerLiveness::Awaiting { missed: missed + 1 });
            Verdict::Ping
        }
    }

    pub fn forget_client(&mut self, client: Address) {
        self.clients.remove(&client);
    }

    /// Whether any state is held for `address`, as a client or a peer.
    pub fn is_tracked(&self, address: Address) -> bool {
        self.clients.contains_key(&address) || self.peers.contains_key(&address)
    }

    /// Drop client state for addresses no longer served here.
    pub fn retain_clients(&mut self, served: &[Address]) {
        self.clients.retain(|address, _| served.contains(address));
    }

    /// Drop peer state for servers no longer in the directory.
    pub fn retain_peers(&mut self, peers: &[Address]) {
        self.peers.retain(|address, _| peers.contains(address));
    }

    pub fn clear(&mut self) {
        self.clients.clear();
        self.peers.clear();
    }
}
