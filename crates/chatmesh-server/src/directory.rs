//! The shared directory of clients and server instances.
//!
//! Two tables, each behind its own lock. Callers never hold both locks at
//! once and never send while holding either: collect what is needed under
//! the lock, drop the guard, then deliver.

use chatmesh_core::{Address, Limits, Name, RegisterError, RoomName};
use tokio::sync::{Mutex, MutexGuard};

/// A registered client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEntry {
    /// The client's own mailbox.
    pub address: Address,
    /// Mailbox of the server instance that serves this client.
    pub owner: Address,
    pub name: Name,
    pub room: RoomName,
}

/// Shared registry of clients and server instances.
#[derive(Debug)]
pub struct Directory {
    limits: Limits,
    clients: Mutex<ClientTable>,
    servers: Mutex<ServerTable>,
}

impl Directory {
    /// Create a directory with every slot free.
    pub fn new(limits: Limits) -> Self {
        Self {
            limits,
            clients: Mutex::new(ClientTable::new(limits)),
            servers: Mutex::new(ServerTable::new(limits.max_servers)),
        }
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Acquire the client-table lock.
    pub async fn clients(&self) -> MutexGuard<'_, ClientTable> {
        self.clients.lock().await
    }

    /// Acquire the server-table lock.
    pub async fn servers(&self) -> MutexGuard<'_, ServerTable> {
        self.servers.lock().await
    }
}

/// Fixed-capacity table of client slots. `None` marks a free slot.
#[derive(Debug)]
pub struct ClientTable {
    slots: Vec<Option<ClientEntry>>,
    max_per_server: usize,
}

impl ClientTable {
    fn new(limits: Limits) -> Self {
        Self {
            slots: vec![None; limits.client_capacity()],
            max_per_server: limits.max_clients_per_server,
        }
    }

    /// Register a client served by `owner` in the first free slot, placed in
    /// the global room.
    pub fn register(
        &mut self,
        owner: Address,
        address: Address,
        name: Name,
    ) -> Result<usize, RegisterError> {
        if self.owned_by(owner).count() >= self.max_per_server {
            return Err(RegisterError::ServerFull);
        }
        if self.find_by_name(name.as_str()).is_some() {
            return Err(RegisterError::NameExists);
        }
        if self.find_by_address(address).is_some() {
            return Err(RegisterError::AddressInUse);
        }
        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(RegisterError::DirectoryFull)?;
        self.slots[slot] = Some(ClientEntry {
            address,
            owner,
            name,
            room: RoomName::global(),
        });
        Ok(slot)
    }

    /// Free a slot, returning what it held.
    pub fn deregister(&mut self, slot: usize) -> Option<ClientEntry> {
        self.slots.get_mut(slot).and_then(Option::take)
    }

    /// Free every slot owned by `owner`.
    pub fn deregister_owned_by(&mut self, owner: Address) -> Vec<ClientEntry> {
        self.slots
            .iter_mut()
            .filter_map(|slot| {
                if slot.as_ref().is_some_and(|c| c.owner == owner) {
                    slot.take()
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn get(&self, slot: usize) -> Option<&ClientEntry> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn find_by_address(&self, address: Address) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|c| c.address == address))
    }

    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|c| c.name == *name))
    }

    /// Move the client in `slot` to `room`. Returns false for a free slot.
    pub fn set_room(&mut self, slot: usize, room: RoomName) -> bool {
        match self.slots.get_mut(slot).and_then(Option::as_mut) {
            Some(client) => {
                client.room = room;
                true
            }
            None => false,
        }
    }

    /// Names of every client in `room`, whichever server owns them, in slot
    /// order and at most `limit` long.
    pub fn room_roster(&self, room: &RoomName, limit: usize) -> Vec<Name> {
        self.occupied()
            .filter(|c| c.room == *room)
            .take(limit)
            .map(|c| c.name.clone())
            .collect()
    }

    /// Mailboxes of the clients served by `owner` that sit in `room`, except
    /// the one named `exclude`.
    pub fn local_room_members(&self, owner: Address, room: &RoomName, exclude: &Name) -> Vec<Address> {
        self.owned_by(owner)
            .filter(|c| c.room == *room && c.name != *exclude)
            .map(|c| c.address)
            .collect()
    }

    /// `(slot, address)` of every client served by `owner`.
    pub fn owned_slots(&self, owner: Address) -> Vec<(usize, Address)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().filter(|c| c.owner == owner).map(|c| (i, c.address)))
            .collect()
    }

    pub fn owned_by(&self, owner: Address) -> impl Iterator<Item = &ClientEntry> {
        self.occupied().filter(move |c| c.owner == owner)
    }

    pub fn occupied(&self) -> impl Iterator<Item = &ClientEntry> {
        self.slots.iter().flatten()
    }

    /// Number of registered clients.
    pub fn len(&self) -> usize {
        self.occupied().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fixed-capacity table of server instance slots. `None` marks a free slot.
#[derive(Debug)]
pub struct ServerTable {
    slots: Vec<Option<Address>>,
}

impl ServerTable {
    fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    /// Put `address` in the first free slot.
    pub fn claim_first_free(&mut self, address: Address) -> Option<usize> {
        let slot = self.slots.iter().position(Option::is_none)?;
        self.slots[slot] = Some(address);
        Some(slot)
    }

    /// Put `address` in `slot`, replacing whatever was there.
    pub fn force_claim(&mut self, slot: usize, address: Address) {
        if let Some(entry) = self.slots.get_mut(slot) {
            *entry = Some(address);
        }
    }

    /// Free the slot held by `address`. Returns true if it was present.
    pub fn remove(&mut self, address: Address) -> bool {
        match self.position(address) {
            Some(slot) => {
                self.slots[slot] = None;
                true
            }
            None => false,
        }
    }

    pub fn occupant(&self, slot: usize) -> Option<Address> {
        self.slots.get(slot).copied().flatten()
    }

    pub fn position(&self, address: Address) -> Option<usize> {
        self.slots.iter().position(|s| *s == Some(address))
    }

    /// Every registered server other than `me`.
    pub fn peers(&self, me: Address) -> Vec<Address> {
        self.slots
            .iter()
            .flatten()
            .copied()
            .filter(|a| *a != me)
            .collect()
    }

    /// Number of registered servers.
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
