//! Core types for chatmesh.
//!
//! This crate provides the protocol shared by chat servers and their
//! clients: addresses, bounded strings, message kinds and the typed mailbox
//! transport. The routing engine lives in `chatmesh-server`.

mod mailbox;
mod message;
mod name;

pub use mailbox::{DEFAULT_CAPACITY, Mailbox, MailboxSender, SendError, mailbox};
pub use message::{Kind, Message, PrivateMessage, RegisterError, Relayed, RoomMessage, STATUS_OK};
pub use name::{BODY_MAX, Body, Bounded, GLOBAL_ROOM, NAME_MAX, Name, NameError, ROOM_MAX, RoomName};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a mailbox. Clients and server instances each own one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub u32);

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Capacities of a directory. Fixed when the directory is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Server slots in the directory.
    pub max_servers: usize,
    /// Clients a single server may own.
    pub max_clients_per_server: usize,
    /// Longest roster returned for a list request.
    pub max_list_len: usize,
}

impl Limits {
    /// Client slots in the directory.
    pub fn client_capacity(&self) -> usize {
        self.max_servers * self.max_clients_per_server
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_servers: 10,
            max_clients_per_server: 20,
            max_list_len: 50,
        }
    }
}
