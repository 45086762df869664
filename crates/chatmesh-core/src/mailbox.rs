//! Addressed, typed mailboxes.
//!
//! A mailbox keeps one bounded FIFO queue per [`Kind`]. Receiving never
//! blocks: the owner asks for the next message of a given kind and gets
//! `None` when there is none. Sending is best effort and fails instead of
//! waiting when the queue is full.

use crate::{Address, Kind, Message};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

/// Default number of queued messages per kind.
pub const DEFAULT_CAPACITY: usize = 64;

/// Create a mailbox for `address` holding up to `capacity` messages per kind.
pub fn mailbox(address: Address, capacity: usize) -> (MailboxSender, Mailbox) {
    let capacity = capacity.max(1);
    let (senders, receivers): (Vec<_>, Vec<_>) =
        (0..Kind::COUNT).map(|_| mpsc::channel(capacity)).unzip();
    (
        MailboxSender {
            address,
            queues: senders.into(),
        },
        Mailbox {
            address,
            queues: receivers,
        },
    )
}

/// Sending half of a mailbox. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MailboxSender {
    address: Address,
    queues: Arc<[mpsc::Sender<Message>]>,
}

impl MailboxSender {
    pub fn address(&self) -> Address {
        self.address
    }

    /// Enqueue a message without waiting.
    pub fn send(&self, message: Message) -> Result<(), SendError> {
        self.queues[message.kind().index()]
            .try_send(message)
            .map_err(|e| match e {
                TrySendError::Full(_) => SendError::Full(self.address),
                TrySendError::Closed(_) => SendError::Closed(self.address),
            })
    }
}

/// Receiving half of a mailbox, owned by a single participant.
#[derive(Debug)]
pub struct Mailbox {
    address: Address,
    queues: Vec<mpsc::Receiver<Message>>,
}

impl Mailbox {
    pub fn address(&self) -> Address {
        self.address
    }

    /// Take the oldest queued message of `kind`, if any.
    pub fn try_recv(&mut self, kind: Kind) -> Option<Message> {
        match self.queues[kind.index()].try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Take every queued message of `kind`.
    pub fn drain(&mut self, kind: Kind) -> Vec<Message> {
        std::iter::from_fn(|| self.try_recv(kind)).collect()
    }
}

/// Error delivering to a mailbox.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("mailbox {0} does not exist")]
    NoSuchMailbox(Address),
    #[error("mailbox {0} is full")]
    Full(Address),
    #[error("mailbox {0} is closed")]
    Closed(Address),
}
