#![allow(dead_code)]

use chatmesh_core::{Address, Kind, Limits, Mailbox, Message, Name, PrivateMessage, RoomMessage, RoomName};
use chatmesh_server::{DirectoryId, Ipc, Server, ServerConfig};

/// A chat client driven by hand: sends requests to its server's mailbox and
/// reads replies from its own.
pub struct TestClient {
    ipc: Ipc,
    pub server: Address,
    pub mailbox: Mailbox,
    pub name: Name,
}

impl TestClient {
    pub fn new(ipc: &Ipc, server: Address, name: &str) -> Self {
        Self {
            ipc: ipc.clone(),
            server,
            mailbox: ipc.create_mailbox().unwrap(),
            name: name.parse().unwrap(),
        }
    }

    pub fn address(&self) -> Address {
        self.mailbox.address()
    }

    pub fn send(&self, message: Message) {
        self.ipc.send(self.server, message).unwrap();
    }

    pub fn register(&self) {
        self.send(Message::Register {
            sender: self.name.clone(),
            requester: self.address(),
        });
    }

    pub fn unregister(&self) {
        self.send(Message::Unregister {
            requester: self.address(),
        });
    }

    pub fn join(&self, room: &str, correlation_id: u32) {
        self.send(Message::Join {
            sender: self.name.clone(),
            room: room.parse().unwrap(),
            correlation_id,
        });
    }

    pub fn leave(&self) {
        self.send(Message::Leave {
            requester: self.address(),
        });
    }

    pub fn list(&self, correlation_id: u32) {
        self.send(Message::List {
            requester: self.address(),
            sender: self.name.clone(),
            correlation_id,
        });
    }

    pub fn heartbeat(&self) {
        self.send(Message::Heartbeat {
            origin: self.address(),
        });
    }

    pub fn say(&self, room: &str, body: &str) -> RoomMessage {
        let message = RoomMessage {
            sender: self.name.clone(),
            room: room.parse().unwrap(),
            body: body.parse().unwrap(),
        };
        self.send(Message::Room(message.clone()));
        message
    }

    pub fn whisper(&self, recipient: &str, body: &str) -> PrivateMessage {
        let message = PrivateMessage {
            sender: self.name.clone(),
            recipient: recipient.parse().unwrap(),
            body: body.parse().unwrap(),
        };
        self.send(Message::Private(message.clone()));
        message
    }

    pub fn recv(&mut self, kind: Kind) -> Option<Message> {
        self.mailbox.try_recv(kind)
    }

    pub fn drain(&mut self, kind: Kind) -> Vec<Message> {
        self.mailbox.drain(kind)
    }

    /// Status code of the next reply of `kind`.
    pub fn status(&mut self, kind: Kind) -> Option<i32> {
        match self.recv(kind)? {
            Message::Status { status, .. } => Some(status),
            other => panic!("expected a status reply, got {other:?}"),
        }
    }

    /// Names in the next roster reply.
    pub fn roster(&mut self) -> Option<Vec<String>> {
        match self.recv(Kind::List)? {
            Message::Roster { names, .. } => {
                Some(names.into_iter().map(String::from).collect())
            }
            other => panic!("expected a roster, got {other:?}"),
        }
    }
}

pub fn config(directory: Option<DirectoryId>, limits: Limits) -> ServerConfig {
    ServerConfig {
        directory,
        limits,
        ..ServerConfig::default()
    }
}

pub async fn start(ipc: &Ipc, directory: Option<DirectoryId>) -> Server {
    Server::start(ipc.clone(), config(directory, Limits::default()))
        .await
        .unwrap()
}

pub async fn address(server: &Server) -> Address {
    server.address().await.unwrap()
}

/// Register `name` on `server` and consume the welcome traffic.
pub async fn register(ipc: &Ipc, server: &Server, name: &str) -> TestClient {
    let mut client = TestClient::new(ipc, address(server).await, name);
    client.register();
    server.dispatch_once().await.unwrap();
    assert_eq!(client.status(Kind::Register), Some(0));
    assert!(matches!(
        client.recv(Kind::Heartbeat),
        Some(Message::Heartbeat { .. })
    ));
    client
}

pub fn room(name: &str) -> RoomName {
    name.parse().unwrap()
}
