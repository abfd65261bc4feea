//! End-to-end tests across sessions, the hub, and the relay.

use noteroom_protocol::{ClientMessage, ServerMessage, SyncStatus};
use noteroom_server::{
    AllowAllLimiter, Broker, BrokerError, BrokerResult, BrokerSubscription, ChannelIo,
    ConnectionHub, FanoutRelay, LoopbackBroker, RelayListener, ServerConfig, Session,
    SessionClose, SessionContext, StaticRoom, StaticRoomValidator,
};
use noteroom_store::{DocumentStore, MemoryStore, RoomId, Version};
use noteroom_sync::{SyncConfig, SyncCoordinator};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const ROOM: &str = "room-1";
const CREDENTIAL: &str = "123456";

/// One simulated process instance: its own hub and relay, shared store.
struct Node {
    hub: Arc<ConnectionHub>,
    relay: Arc<FanoutRelay>,
    ctx: SessionContext,
}

fn node(store: &MemoryStore, broker: Option<Arc<dyn Broker>>) -> Node {
    let hub = Arc::new(ConnectionHub::new());
    let relay = Arc::new(FanoutRelay::new(Arc::clone(&hub), broker));
    let validator = StaticRoomValidator::new();
    validator.add_room(StaticRoom {
        room_id: RoomId::new(ROOM),
        owner_id: "owner-1".into(),
        credential: CREDENTIAL.into(),
        retention_days: 30,
    });
    let ctx = SessionContext {
        hub: Arc::clone(&hub),
        relay: Arc::clone(&relay),
        coordinator: SyncCoordinator::new(Arc::new(store.clone()), SyncConfig::new()),
        validator: Arc::new(validator),
        limiter: Arc::new(AllowAllLimiter),
    };
    Node { hub, relay, ctx }
}

fn save_frame(content: &str, version: Version, base: &str) -> String {
    serde_json::to_string(&ClientMessage::Save {
        content: content.into(),
        last_known_version: Some(version),
        base_content: Some(base.into()),
    })
    .unwrap()
}

async fn next_frame(client: &mut noteroom_server::ClientEnd) -> ServerMessage {
    timeout(Duration::from_secs(1), client.frames.recv())
        .await
        .expect("timed out waiting for frame")
        .expect("session dropped its transport")
}

async fn attach(node: &Node) -> (tokio::task::JoinHandle<SessionClose>, noteroom_server::ClientEnd, Version) {
    let (io, mut client) = ChannelIo::pair();
    let session = Session::new(node.ctx.clone(), io, "10.0.0.1");
    let task = tokio::spawn(session.run(RoomId::new(ROOM), CREDENTIAL));
    let ServerMessage::Init { version, .. } = next_frame(&mut client).await else {
        panic!("expected init frame");
    };
    (task, client, version)
}

#[tokio::test]
async fn saves_broadcast_to_peers_but_not_the_sender() {
    let store = MemoryStore::new();
    let n = node(&store, None);
    let (task_a, mut a, version) = attach(&n).await;
    let (task_b, mut b, _) = attach(&n).await;

    a.input.send(save_frame("hello", version, "")).unwrap();

    let ServerMessage::Ack(ack) = next_frame(&mut a).await else {
        panic!("expected ack for the sender");
    };
    assert_eq!(ack.status, SyncStatus::Ok);

    let ServerMessage::Update(update) = next_frame(&mut b).await else {
        panic!("expected update for the peer");
    };
    assert_eq!(update.content, "hello");
    assert_eq!(update.status, SyncStatus::Ok);

    // The sender got its ack and nothing else.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(a.frames.try_recv().is_err());

    drop(a.input);
    drop(b.input);
    assert_eq!(task_a.await.unwrap(), SessionClose::ClientDisconnect);
    assert_eq!(task_b.await.unwrap(), SessionClose::ClientDisconnect);
}

#[tokio::test]
async fn disconnecting_empties_the_room() {
    let store = MemoryStore::new();
    let n = node(&store, None);
    let room = RoomId::new(ROOM);

    let (task_a, a, _) = attach(&n).await;
    let (task_b, b, _) = attach(&n).await;
    assert_eq!(n.hub.room_size(&room), 2);

    drop(a.input);
    task_a.await.unwrap();
    assert_eq!(n.hub.room_size(&room), 1);

    drop(b.input);
    task_b.await.unwrap();
    assert!(!n.hub.contains_room(&room));
}

#[tokio::test]
async fn updates_cross_instances_without_echo() {
    let store = MemoryStore::new();
    let broker: Arc<dyn Broker> = Arc::new(LoopbackBroker::new());

    let n1 = node(&store, Some(Arc::clone(&broker)));
    let n2 = node(&store, Some(Arc::clone(&broker)));
    let config = ServerConfig::new().with_relay_restart_delay(Duration::from_millis(10));
    let l1 = RelayListener::spawn(Arc::clone(&n1.relay), &config);
    let l2 = RelayListener::spawn(Arc::clone(&n2.relay), &config);
    // Let both listeners subscribe before publishing.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let (task_a, mut a, version) = attach(&n1).await;
    let (task_b, mut b, _) = attach(&n1).await;
    let (task_c, mut c, _) = attach(&n2).await;

    a.input.send(save_frame("shared", version, "")).unwrap();

    let ServerMessage::Ack(_) = next_frame(&mut a).await else {
        panic!("expected ack");
    };
    // Local peer: one update through the hub, and none relayed back.
    let ServerMessage::Update(local) = next_frame(&mut b).await else {
        panic!("expected local update");
    };
    assert_eq!(local.content, "shared");
    // Remote peer: one update through the broker.
    let ServerMessage::Update(remote) = next_frame(&mut c).await else {
        panic!("expected remote update");
    };
    assert_eq!(remote.content, "shared");

    // No duplicates anywhere once the relay settles.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(a.frames.try_recv().is_err());
    assert!(b.frames.try_recv().is_err());
    assert!(c.frames.try_recv().is_err());

    drop(a.input);
    drop(b.input);
    drop(c.input);
    task_a.await.unwrap();
    task_b.await.unwrap();
    task_c.await.unwrap();
    l1.shutdown().await;
    l2.shutdown().await;
}

/// A broker that is permanently down.
struct DeadBroker;

#[async_trait::async_trait]
impl Broker for DeadBroker {
    async fn publish(&self, _channel: &str, _payload: &str) -> BrokerResult<()> {
        Err(BrokerError::Unavailable("connection refused".into()))
    }

    async fn subscribe(&self, _prefix: &str) -> BrokerResult<BrokerSubscription> {
        Err(BrokerError::Unavailable("connection refused".into()))
    }
}

#[tokio::test]
async fn broker_outage_degrades_fanout_without_failing_writes() {
    let store = MemoryStore::new();
    let n = node(&store, Some(Arc::new(DeadBroker)));
    let config = ServerConfig::new().with_relay_restart_delay(Duration::from_millis(10));
    let listener = RelayListener::spawn(Arc::clone(&n.relay), &config);

    let (task_a, mut a, version) = attach(&n).await;
    let (task_b, mut b, _) = attach(&n).await;

    a.input.send(save_frame("still works", version, "")).unwrap();

    let ServerMessage::Ack(ack) = next_frame(&mut a).await else {
        panic!("expected ack");
    };
    assert_eq!(ack.status, SyncStatus::Ok);

    // Local fanout is unaffected by the dead broker.
    let ServerMessage::Update(update) = next_frame(&mut b).await else {
        panic!("expected update");
    };
    assert_eq!(update.content, "still works");
    assert_eq!(store.read(&RoomId::new(ROOM)).await.unwrap().content, "still works");

    drop(a.input);
    drop(b.input);
    task_a.await.unwrap();
    task_b.await.unwrap();
    listener.shutdown().await;
}

#[tokio::test]
async fn conflicting_save_acks_conflict_and_broadcasts_nothing() {
    let store = MemoryStore::new();
    let n = node(&store, None);
    let (task_a, mut a, version) = attach(&n).await;
    let (task_b, mut b, _) = attach(&n).await;

    // A lands "ab"; B consumes the update.
    a.input.send(save_frame("ab", version, "")).unwrap();
    let ServerMessage::Ack(_) = next_frame(&mut a).await else {
        panic!("expected ack");
    };
    let ServerMessage::Update(first) = next_frame(&mut b).await else {
        panic!("expected update");
    };

    // A overwrites the same region; B's stale overlapping edit conflicts.
    a.input.send(save_frame("ac", first.version, "ab")).unwrap();
    let ServerMessage::Ack(_) = next_frame(&mut a).await else {
        panic!("expected ack");
    };
    let ServerMessage::Update(_) = next_frame(&mut b).await else {
        panic!("expected update");
    };

    b.input.send(save_frame("ad", first.version, "ab")).unwrap();
    let ServerMessage::Ack(conflict) = next_frame(&mut b).await else {
        panic!("expected conflict ack");
    };
    assert_eq!(conflict.status, SyncStatus::ConflictMergeFailed);
    assert_eq!(conflict.content.as_deref(), Some("ac"));

    // A conflicted save changes nothing, so A hears nothing.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(a.frames.try_recv().is_err());

    drop(a.input);
    drop(b.input);
    task_a.await.unwrap();
    task_b.await.unwrap();
}
