//! Attaching, detaching and recovering from eviction.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chatmesh_core::{Kind, Limits, Message};
use chatmesh_server::{Ipc, Server};
use common::*;
use tokio::sync::oneshot;
use tokio::time::timeout;

#[tokio::test]
async fn last_instance_out_removes_the_directory() {
    let ipc = Ipc::default();
    let s1 = start(&ipc, None).await;
    let id = s1.directory_id().await.unwrap();
    let s2 = start(&ipc, Some(id)).await;

    s1.shutdown().await;
    assert!(ipc.open_directory(id).is_ok());
    assert_eq!(s1.directory_id().await, None);

    s2.shutdown().await;
    assert!(ipc.open_directory(id).is_err());
}

#[tokio::test]
async fn detach_drops_only_own_clients() {
    let ipc = Ipc::default();
    let s1 = start(&ipc, None).await;
    let s2 = start(&ipc, s1.directory_id().await).await;
    let directory = s1.directory().await.unwrap();

    register(&ipc, &s1, "alice").await;
    register(&ipc, &s1, "carol").await;
    register(&ipc, &s2, "bob").await;

    s1.shutdown().await;

    let clients = directory.clients().await;
    assert_eq!(clients.len(), 1);
    assert!(clients.find_by_name("bob").is_some());
    drop(clients);
    assert_eq!(directory.servers().await.len(), 1);
}

#[tokio::test]
async fn evicted_instance_rejoins_without_its_clients() {
    let ipc = Ipc::default();
    let s1 = start(&ipc, None).await;
    let id = s1.directory_id().await.unwrap();
    let s2 = start(&ipc, Some(id)).await;
    let directory = s1.directory().await.unwrap();

    let mut bob = register(&ipc, &s2, "bob").await;
    let evicted = address(&s2).await;
    assert!(directory.servers().await.remove(evicted));

    s2.dispatch_once().await.unwrap();

    assert_eq!(s2.directory_id().await, Some(id));
    let rejoined = address(&s2).await;
    assert!(directory.servers().await.position(rejoined).is_some());
    assert!(directory.clients().await.find_by_name("bob").is_none());

    // Bob has to register again, with the new mailbox.
    bob.server = rejoined;
    bob.register();
    s2.dispatch_once().await.unwrap();
    assert_eq!(bob.status(Kind::Register), Some(0));
    assert!(matches!(bob.recv(Kind::Heartbeat), Some(Message::Heartbeat { .. })));
}

#[tokio::test]
async fn full_directory_sends_newcomer_to_a_fresh_one() {
    let ipc = Ipc::default();
    let limits = Limits {
        max_servers: 1,
        ..Limits::default()
    };
    let s1 = Server::start(ipc.clone(), config(None, limits)).await.unwrap();
    let first = s1.directory_id().await.unwrap();
    let s2 = Server::start(ipc.clone(), config(Some(first), limits))
        .await
        .unwrap();
    let second = s2.directory_id().await.unwrap();

    assert_ne!(first, second);
    assert!(ipc.open_directory(first).is_ok());
    let directory = s2.directory().await.unwrap();
    assert_eq!(
        directory.servers().await.occupant(0),
        Some(address(&s2).await)
    );
    assert_eq!(s1.directory().await.unwrap().servers().await.len(), 1);
}

#[tokio::test]
async fn missing_directory_is_replaced() {
    let ipc = Ipc::default();
    let s1 = start(&ipc, Some(chatmesh_server::DirectoryId(9999))).await;
    let id = s1.directory_id().await.unwrap();
    assert_ne!(id.0, 9999);
    assert!(ipc.open_directory(id).is_ok());
}

#[tokio::test]
async fn run_stops_on_shutdown_and_detaches() {
    let ipc = Ipc::default();
    let server = Arc::new(start(&ipc, None).await);
    let id = server.directory_id().await.unwrap();
    let mut alice = register(&ipc, &server, "alice").await;

    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(server.clone().run(async move {
        let _ = stopped.await;
    }));

    // The running dispatcher answers without a manual cycle.
    alice.join("lobby", 3);
    let reply = timeout(Duration::from_secs(5), async {
        loop {
            if let Some(reply) = alice.recv(Kind::Join) {
                break reply;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("dispatcher did not answer");
    assert!(matches!(reply, Message::Status { correlation_id: 3, status: 0, .. }));

    stop.send(()).unwrap();
    task.await.unwrap().unwrap();

    assert!(ipc.open_directory(id).is_err());
    assert_eq!(server.address().await, None);
}
