//! The dispatcher: one pass over the instance's mailbox.
//!
//! Every cycle first checks that this instance still holds its server slot
//! (a peer may have evicted it) and rejoins if not. It then takes at most
//! one message of each kind, in [`Kind::ALL`] order, and routes it.

use chatmesh_core::{
    Address, Kind, Message, Name, PrivateMessage, RegisterError, Relayed, RoomMessage, RoomName,
    STATUS_OK,
};
use tracing::{debug, info, warn};

use crate::directory::Directory;
use crate::error::ServerError;
use crate::server::Instance;

impl Instance {
    pub(crate) async fn dispatch_once(&mut self) -> Result<usize, ServerError> {
        self.verify_membership().await?;

        let mut handled = 0;
        for kind in Kind::ALL {
            let connection = self.connection.as_mut().ok_or(ServerError::NotConnected)?;
            let Some(message) = connection.mailbox.try_recv(kind) else {
                continue;
            };
            self.route(message).await?;
            handled += 1;
        }
        Ok(handled)
    }

    async fn verify_membership(&mut self) -> Result<(), ServerError> {
        let (directory, me) = self.context()?;
        let slot = self.connection.as_ref().ok_or(ServerError::NotConnected)?.slot;
        let occupant = directory.servers().await.occupant(slot);
        if occupant != Some(me) {
            warn!(address = %me, slot, "removed from the directory, rejoining");
            self.recover().await?;
        }
        Ok(())
    }

    async fn route(&mut self, message: Message) -> Result<(), ServerError> {
        let (directory, me) = self.context()?;
        match message {
            Message::Register { sender, requester } => {
                self.register(&directory, me, sender, requester).await
            }
            Message::Unregister { requester } => self.unregister(&directory, requester).await,
            Message::Join {
                sender,
                room,
                correlation_id,
            } => self.join(&directory, sender, room, correlation_id).await,
            Message::Leave { requester } => self.leave(&directory, requester).await,
            Message::List {
                requester,
                sender,
                correlation_id,
            } => self.list(&directory, requester, sender, correlation_id).await,
            Message::Room(message) => self.room(&directory, me, message).await,
            Message::Private(message) => self.private(&directory, me, message).await,
            Message::Heartbeat { origin } => {
                let owned = {
                    let clients = directory.clients().await;
                    clients
                        .find_by_address(origin)
                        .and_then(|slot| clients.get(slot))
                        .is_some_and(|c| c.owner == me)
                };
                if owned {
                    self.liveness.client_seen(origin);
                } else {
                    debug!(%origin, "heartbeat from a client this server does not serve");
                }
            }
            Message::HeartbeatPeer { origin } => {
                if directory.servers().await.position(origin).is_some() {
                    self.liveness.peer_seen(origin);
                } else {
                    debug!(%origin, "heartbeat from unknown server");
                }
            }
            Message::PeerEnvelope { inner } => self.relayed(&directory, me, inner).await,
            other => debug!(kind = ?other.kind(), "ignoring reply sent to a server"),
        }
        Ok(())
    }

    async fn register(&mut self, directory: &Directory, me: Address, sender: Name, requester: Address) {
        info!(name = %sender, %requester, "register request");
        let server_address = directory.servers().await.position(requester).is_some();
        let outcome = if server_address {
            Err(RegisterError::AddressInUse)
        } else {
            directory.clients().await.register(me, requester, sender.clone())
        };

        let status = match outcome {
            Ok(slot) => {
                info!(name = %sender, %requester, slot, "client registered");
                STATUS_OK
            }
            Err(e) => {
                warn!(name = %sender, %requester, reason = %e, "registration refused");
                e.code()
            }
        };
        self.deliver(
            requester,
            Message::Status {
                kind: Kind::Register,
                correlation_id: 0,
                status,
            },
        );

        if outcome.is_ok() {
            // The first ping doubles as the welcome.
            self.liveness.client_seen(requester);
            self.deliver(requester, Message::Heartbeat { origin: me });
        }
    }

    async fn unregister(&mut self, directory: &Directory, requester: Address) {
        let removed = {
            let mut clients = directory.clients().await;
            clients
                .find_by_address(requester)
                .and_then(|slot| clients.deregister(slot))
        };
        match removed {
            Some(client) => {
                self.liveness.forget_client(requester);
                info!(name = %client.name, %requester, room = %client.room, "client deregistered");
            }
            None => warn!(%requester, "deregister request from unknown client"),
        }
    }

    async fn join(&mut self, directory: &Directory, sender: Name, room: RoomName, correlation_id: u32) {
        let address = {
            let mut clients = directory.clients().await;
            clients.find_by_name(sender.as_str()).and_then(|slot| {
                clients.set_room(slot, room.clone());
                clients.get(slot).map(|c| c.address)
            })
        };
        match address {
            Some(address) => {
                info!(name = %sender, %room, "client joined room");
                self.deliver(
                    address,
                    Message::Status {
                        kind: Kind::Join,
                        correlation_id,
                        status: STATUS_OK,
                    },
                );
            }
            None => warn!(name = %sender, %room, "join request from unknown client"),
        }
    }

    async fn leave(&mut self, directory: &Directory, requester: Address) {
        let left = {
            let mut clients = directory.clients().await;
            clients
                .find_by_address(requester)
                .is_some_and(|slot| clients.set_room(slot, RoomName::global()))
        };
        if left {
            info!(%requester, "client returned to the global room");
            self.deliver(
                requester,
                Message::Status {
                    kind: Kind::Leave,
                    correlation_id: 0,
                    status: STATUS_OK,
                },
            );
        } else {
            warn!(%requester, "leave request from unknown client");
        }
    }

    async fn list(&mut self, directory: &Directory, requester: Address, sender: Name, correlation_id: u32) {
        let limit = directory.limits().max_list_len;
        let roster = {
            let clients = directory.clients().await;
            clients
                .find_by_address(requester)
                .or_else(|| clients.find_by_name(sender.as_str()))
                .and_then(|slot| clients.get(slot))
                .map(|client| client.room.clone())
                .map(|room| clients.room_roster(&room, limit))
        };
        match roster {
            Some(names) => {
                debug!(%requester, count = names.len(), "sending roster");
                self.deliver(
                    requester,
                    Message::Roster {
                        correlation_id,
                        names,
                    },
                );
            }
            None => warn!(%requester, name = %sender, "list request from unknown client"),
        }
    }

    async fn room(&mut self, directory: &Directory, me: Address, message: RoomMessage) {
        let members = {
            let clients = directory.clients().await;
            clients
                .find_by_name(message.sender.as_str())
                .map(|_| clients.local_room_members(me, &message.room, &message.sender))
        };
        let Some(members) = members else {
            warn!(sender = %message.sender, room = %message.room, "room message from unregistered client");
            return;
        };

        info!(room = %message.room, sender = %message.sender, local = members.len(), "room message");
        for member in members {
            self.deliver(member, Message::Room(message.clone()));
        }

        let peers = directory.servers().await.peers(me);
        let envelope = Message::PeerEnvelope {
            inner: Relayed::Room(message),
        };
        for peer in peers {
            self.deliver(peer, envelope.clone());
        }
    }

    async fn private(&mut self, directory: &Directory, me: Address, message: PrivateMessage) {
        let target = {
            let clients = directory.clients().await;
            let sender_known = clients.find_by_name(message.sender.as_str()).is_some();
            clients
                .find_by_name(message.recipient.as_str())
                .and_then(|slot| clients.get(slot))
                .filter(|_| sender_known)
                .map(|c| (c.address, c.owner))
        };

        match target {
            Some((address, owner)) if owner == me => {
                info!(sender = %message.sender, recipient = %message.recipient, "private message");
                self.deliver(address, Message::Private(message));
            }
            Some((_, owner)) => {
                info!(
                    sender = %message.sender,
                    recipient = %message.recipient,
                    server = %owner,
                    "relaying private message"
                );
                self.deliver(
                    owner,
                    Message::PeerEnvelope {
                        inner: Relayed::Private(message),
                    },
                );
            }
            None => warn!(
                sender = %message.sender,
                recipient = %message.recipient,
                "could not route private message"
            ),
        }
    }

    /// Deliver chat traffic relayed by a peer to local clients only.
    async fn relayed(&mut self, directory: &Directory, me: Address, inner: Relayed) {
        match inner {
            Relayed::Private(message) => {
                let address = {
                    let clients = directory.clients().await;
                    clients
                        .find_by_name(message.recipient.as_str())
                        .and_then(|slot| clients.get(slot))
                        .filter(|c| c.owner == me)
                        .map(|c| c.address)
                };
                match address {
                    Some(address) => {
                        info!(sender = %message.sender, recipient = %message.recipient, "private message from peer");
                        self.deliver(address, Message::Private(message));
                    }
                    None => warn!(recipient = %message.recipient, "relayed private message for absent recipient"),
                }
            }
            Relayed::Room(message) => {
                let members = directory
                    .clients()
                    .await
                    .local_room_members(me, &message.room, &message.sender);
                debug!(room = %message.room, local = members.len(), "room message from peer");
                for member in members {
                    self.deliver(member, Message::Room(message.clone()));
                }
            }
        }
    }
}
