//! Integration tests for the sync coordinator over real stores.

use noteroom_protocol::SyncStatus;
use noteroom_store::{
    DocumentStore, MemoryStore, PendingEdit, RetryConfig, RoomId, SqliteStore,
};
use noteroom_sync::{SyncConfig, SyncCoordinator};
use std::sync::Arc;
use std::time::Duration;

fn fast_config() -> SyncConfig {
    SyncConfig::new().with_retry(
        RetryConfig::new(3)
            .with_initial_delay(Duration::from_millis(1))
            .without_jitter(),
    )
}

#[tokio::test]
async fn concurrent_overlapping_writes_have_one_winner() {
    let store = MemoryStore::new();
    let room = RoomId::new("room");
    let base = store.write_unconditional(&room, "ab").await.unwrap();
    let coord = SyncCoordinator::new(Arc::new(store.clone()), fast_config());

    let c1 = {
        let coord = coord.clone();
        let room = room.clone();
        tokio::spawn(async move {
            coord
                .sync(&room, PendingEdit::new("ac", base.version, "ab"))
                .await
                .unwrap()
        })
    };
    let c2 = {
        let coord = coord.clone();
        let room = room.clone();
        tokio::spawn(async move {
            coord
                .sync(&room, PendingEdit::new("ad", base.version, "ab"))
                .await
                .unwrap()
        })
    };

    let (r1, r2) = (c1.await.unwrap(), c2.await.unwrap());
    let mut statuses = [r1.status, r2.status];
    statuses.sort_by_key(|s| *s != SyncStatus::Ok);

    // Exactly one writer wins; the other's overlapping edit surfaces as a
    // conflict carrying the winner's content, never a silent overwrite.
    assert_eq!(statuses[0], SyncStatus::Ok);
    assert_eq!(statuses[1], SyncStatus::ConflictMergeFailed);

    let final_doc = store.read(&room).await.unwrap();
    let winner = if r1.status == SyncStatus::Ok { &r1 } else { &r2 };
    let loser = if r1.status == SyncStatus::Ok { &r2 } else { &r1 };
    assert_eq!(final_doc.content, winner.content);
    assert_eq!(loser.content, winner.content);
}

#[tokio::test]
async fn concurrent_disjoint_writes_both_survive() {
    let store = MemoryStore::new();
    let room = RoomId::new("room");
    let base = store.write_unconditional(&room, "ab").await.unwrap();
    let coord = SyncCoordinator::new(Arc::new(store.clone()), fast_config());

    let append = {
        let coord = coord.clone();
        let room = room.clone();
        tokio::spawn(async move {
            coord
                .sync(&room, PendingEdit::new("abX", base.version, "ab"))
                .await
                .unwrap()
        })
    };
    let prepend = {
        let coord = coord.clone();
        let room = room.clone();
        tokio::spawn(async move {
            coord
                .sync(&room, PendingEdit::new("Yab", base.version, "ab"))
                .await
                .unwrap()
        })
    };

    let (r1, r2) = (append.await.unwrap(), prepend.await.unwrap());
    assert!(r1.changed());
    assert!(r2.changed());

    let final_doc = store.read(&room).await.unwrap();
    assert_eq!(final_doc.content, "YabX");
}

#[tokio::test]
async fn versions_increase_monotonically_across_writes() {
    let store = MemoryStore::new();
    let room = RoomId::new("room");
    let coord = SyncCoordinator::new(Arc::new(store.clone()), fast_config());

    let mut versions = Vec::new();
    let mut doc = store.get_or_create(&room).await.unwrap();
    versions.push(doc.version);

    for i in 0..10 {
        let outcome = coord
            .sync(
                &room,
                PendingEdit::new(format!("rev {i}"), doc.version, doc.content.clone()),
            )
            .await
            .unwrap();
        assert!(outcome.changed());
        versions.push(outcome.version);
        doc = store.read(&room).await.unwrap();
    }

    for pair in versions.windows(2) {
        assert!(pair[1] > pair[0], "versions must strictly increase");
    }
}

#[tokio::test]
async fn fallback_write_overwrites_regardless_of_state() {
    let store = MemoryStore::new();
    let room = RoomId::new("room");
    let coord = SyncCoordinator::new(Arc::new(store.clone()), fast_config());

    store.write_unconditional(&room, "someone else").await.unwrap();

    let outcome = coord
        .sync(&room, PendingEdit::unconditional("new text"))
        .await
        .unwrap();
    assert_eq!(outcome.status, SyncStatus::OkFallback);
    assert_eq!(store.read(&room).await.unwrap().content, "new text");
}

#[tokio::test]
async fn full_ladder_over_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("notes.db")).unwrap();
    let room = RoomId::new("room");
    let coord = SyncCoordinator::new(Arc::new(store.clone()), fast_config());

    // Clean write.
    let doc = store.get_or_create(&room).await.unwrap();
    let ok = coord
        .sync(&room, PendingEdit::new("ab", doc.version, ""))
        .await
        .unwrap();
    assert_eq!(ok.status, SyncStatus::Ok);

    // Another writer lands; a stale disjoint edit merges.
    store
        .compare_and_swap(&room, "axb", ok.version)
        .await
        .unwrap();
    let merged = coord
        .sync(&room, PendingEdit::new("aby", ok.version, "ab"))
        .await
        .unwrap();
    assert_eq!(merged.status, SyncStatus::OkMerged);
    assert_eq!(merged.content, "axby");

    // Another writer rewrites the middle; a stale edit to that same region
    // conflicts and reports the current state.
    store
        .compare_and_swap(&room, "aQRy", merged.version)
        .await
        .unwrap();
    let conflict = coord
        .sync(&room, PendingEdit::new("axZy", merged.version, "axby"))
        .await
        .unwrap();
    assert_eq!(conflict.status, SyncStatus::ConflictMergeFailed);
    assert_eq!(conflict.content, "aQRy");
}
