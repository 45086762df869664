//! Protocol messages.
//!
//! Every message has a [`Kind`]; a mailbox is drained one kind at a time,
//! so replies reuse the kind of the request they answer.

use crate::{Address, Body, Name, RoomName};
use serde::{Deserialize, Serialize};

/// Message kinds, in the order the dispatcher drains them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Register,
    Unregister,
    Join,
    Leave,
    List,
    Room,
    Private,
    Heartbeat,
    HeartbeatPeer,
    PeerEnvelope,
}

impl Kind {
    /// All kinds in dispatch priority order.
    pub const ALL: [Kind; 10] = [
        Kind::Register,
        Kind::Unregister,
        Kind::Join,
        Kind::Leave,
        Kind::List,
        Kind::Room,
        Kind::Private,
        Kind::Heartbeat,
        Kind::HeartbeatPeer,
        Kind::PeerEnvelope,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn index(self) -> usize {
        self as usize
    }
}

/// A message addressed to every member of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMessage {
    pub sender: Name,
    pub room: RoomName,
    pub body: Body,
}

/// A message addressed to a single client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateMessage {
    pub sender: Name,
    pub recipient: Name,
    pub body: Body,
}

/// Chat traffic carried between servers inside a peer envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Relayed {
    Room(RoomMessage),
    Private(PrivateMessage),
}

/// Everything that travels through a mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    // Client -> Server
    Register {
        sender: Name,
        requester: Address,
    },
    Unregister {
        requester: Address,
    },
    Join {
        sender: Name,
        room: RoomName,
        correlation_id: u32,
    },
    Leave {
        requester: Address,
    },
    List {
        requester: Address,
        sender: Name,
        correlation_id: u32,
    },
    Room(RoomMessage),
    Private(PrivateMessage),
    /// Liveness signal from a client, or a ping from a server to a client.
    Heartbeat {
        origin: Address,
    },

    // Server -> Server
    HeartbeatPeer {
        origin: Address,
    },
    PeerEnvelope {
        inner: Relayed,
    },

    // Server -> Client
    /// Outcome of a register, join or leave request.
    Status {
        kind: Kind,
        correlation_id: u32,
        status: i32,
    },
    /// Names of the clients in the requester's room.
    Roster {
        correlation_id: u32,
        names: Vec<Name>,
    },
}

impl Message {
    pub fn kind(&self) -> Kind {
        match self {
            Message::Register { .. } => Kind::Register,
            Message::Unregister { .. } => Kind::Unregister,
            Message::Join { .. } => Kind::Join,
            Message::Leave { .. } => Kind::Leave,
            Message::List { .. } | Message::Roster { .. } => Kind::List,
            Message::Room(_) => Kind::Room,
            Message::Private(_) => Kind::Private,
            Message::Heartbeat { .. } => Kind::Heartbeat,
            Message::HeartbeatPeer { .. } => Kind::HeartbeatPeer,
            Message::PeerEnvelope { .. } => Kind::PeerEnvelope,
            Message::Status { kind, .. } => *kind,
        }
    }
}

/// Status code for an accepted request.
pub const STATUS_OK: i32 = 0;

/// Why a registration was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegisterError {
    #[error("name already taken")]
    NameExists,
    #[error("server is full")]
    ServerFull,
    #[error("directory is full")]
    DirectoryFull,
    #[error("address already registered")]
    AddressInUse,
}

impl RegisterError {
    /// Wire status code reported to the requester.
    pub fn code(self) -> i32 {
        match self {
            RegisterError::NameExists => -1,
            RegisterError::ServerFull => -2,
            RegisterError::DirectoryFull => -3,
            RegisterError::AddressInUse => -4,
        }
    }
}
