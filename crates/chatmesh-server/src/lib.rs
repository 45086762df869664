//! Federated chat router.
//!
//! Several server instances share one [`Directory`] of clients and servers.
//! Each instance owns a mailbox, routes room and private messages for the
//! clients it serves (relaying to peers where needed) and pings its peers
//! and clients to evict the ones that stop answering.
//!
//! # Architecture
//!
//! ```text
//! Server
//!   ├── Lifecycle   attach / create, claim server slot, detach, recover
//!   ├── Dispatcher  one message per kind per cycle, routed by kind
//!   └── Heartbeat   peers: evict after 3 missed cycles
//!                   clients: evict after 1 missed cycle
//!
//! Ipc (namespace)
//!   ├── Directory   client table + server table, one lock each
//!   └── Mailboxes   addressed, one queue per message kind
//! ```
//!
//! An instance that finds itself evicted by a peer rejoins on its next
//! dispatcher cycle. Rejoining goes through a full detach, so every client
//! it served is deregistered and has to register again.

pub mod config;
pub mod directory;
pub mod error;
pub mod heartbeat;
pub mod ipc;
pub mod liveness;
pub mod logging;

mod dispatcher;
mod lifecycle;
mod server;

pub use config::ServerConfig;
pub use directory::{ClientEntry, ClientTable, Directory, ServerTable};
pub use error::{ConfigError, IpcError, ServerError};
pub use heartbeat::HeartbeatReport;
pub use ipc::{DirectoryId, Ipc};
pub use server::Server;
