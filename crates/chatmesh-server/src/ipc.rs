//! In-process namespace of directories and mailboxes.
//!
//! Directories and mailboxes are looked up by numeric identifiers that are
//! probed upward from a fixed base until an unused one is found, so every
//! handle can be written down and handed to another instance or client.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chatmesh_core::{Address, Limits, Mailbox, MailboxSender, Message, SendError, mailbox};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::directory::Directory;
use crate::error::IpcError;

/// First identifier probed for a new directory.
pub const FIRST_DIRECTORY_ID: u32 = 1024;
/// First address probed for a new mailbox.
pub const FIRST_MAILBOX_ADDRESS: u32 = 2048;

/// Identifier of a shared directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectoryId(pub u32);

impl fmt::Display for DirectoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DirectoryId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(DirectoryId)
    }
}

/// Handle to the namespace. Clones share the same registries.
#[derive(Clone)]
pub struct Ipc {
    inner: Arc<Inner>,
}

struct Inner {
    directories: Mutex<HashMap<DirectoryId, Arc<Directory>>>,
    mailboxes: Mutex<HashMap<Address, MailboxSender>>,
    mailbox_capacity: usize,
}

impl Ipc {
    /// Create an empty namespace whose mailboxes hold `mailbox_capacity`
    /// messages per kind.
    pub fn new(mailbox_capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                directories: Mutex::new(HashMap::new()),
                mailboxes: Mutex::new(HashMap::new()),
                mailbox_capacity,
            }),
        }
    }

    /// Allocate a fresh, empty directory under an unused identifier.
    pub fn create_directory(&self, limits: Limits) -> Result<(DirectoryId, Arc<Directory>), IpcError> {
        let mut directories = lock(&self.inner.directories);
        let id = (FIRST_DIRECTORY_ID..=u32::MAX)
            .map(DirectoryId)
            .find(|id| !directories.contains_key(id))
            .ok_or(IpcError::Exhausted("directory"))?;
        let directory = Arc::new(Directory::new(limits));
        directories.insert(id, directory.clone());
        debug!(directory = %id, "directory allocated");
        Ok((id, directory))
    }

    /// Look up an existing directory.
    pub fn open_directory(&self, id: DirectoryId) -> Result<Arc<Directory>, IpcError> {
        lock(&self.inner.directories)
            .get(&id)
            .cloned()
            .ok_or(IpcError::NoSuchDirectory(id))
    }

    /// Destroy a directory. Returns true if it existed.
    pub fn remove_directory(&self, id: DirectoryId) -> bool {
        let existed = lock(&self.inner.directories).remove(&id).is_some();
        if existed {
            debug!(directory = %id, "directory removed");
        }
        existed
    }

    /// Allocate a mailbox under an unused address.
    pub fn create_mailbox(&self) -> Result<Mailbox, IpcError> {
        let mut mailboxes = lock(&self.inner.mailboxes);
        let address = (FIRST_MAILBOX_ADDRESS..=u32::MAX)
            .map(Address)
            .find(|address| !mailboxes.contains_key(address))
            .ok_or(IpcError::Exhausted("mailbox"))?;
        let (sender, receiver) = mailbox(address, self.inner.mailbox_capacity);
        mailboxes.insert(address, sender);
        debug!(%address, "mailbox allocated");
        Ok(receiver)
    }

    /// Destroy a mailbox. Returns true if it existed.
    pub fn remove_mailbox(&self, address: Address) -> bool {
        lock(&self.inner.mailboxes).remove(&address).is_some()
    }

    /// Deliver a message to the mailbox at `to` without waiting.
    pub fn send(&self, to: Address, message: Message) -> Result<(), SendError> {
        let sender = lock(&self.inner.mailboxes)
            .get(&to)
            .cloned()
            .ok_or(SendError::NoSuchMailbox(to))?;
        sender.send(message)
    }
}

impl Default for Ipc {
    fn default() -> Self {
        Self::new(chatmesh_core::DEFAULT_CAPACITY)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
