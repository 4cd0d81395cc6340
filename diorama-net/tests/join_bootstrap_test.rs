//! Integration tests for the join handshake
//!
//! A newcomer dials one participating peer; the accepting side answers
//! with a full-scene sync. After the handshake the newcomer's store must
//! match the acceptor's exactly — including losing any local entities the
//! newcomer never shared.

mod common;

use common::{wait_for_entity, TestPeer};
use diorama_model::{Entity, PeerId, Transform};
use diorama_net_sim::ChannelNetwork;

#[tokio::test]
async fn test_join_receives_full_scene() {
    common::init_tracing();
    let net = ChannelNetwork::new();
    let a = TestPeer::spawn(&net).await;
    let b = TestPeer::spawn(&net).await;

    // A holds two entities before anyone joins: one plain, one with an
    // animation clip and a non-trivial transform.
    let e1 = a.add_entity(b"teapot-gltf");
    let e2 = a.add_full_entity(
        Entity::new(a.ids.allocate(), b"dancer-gltf".to_vec())
            .with_animation(b"dance-clip".to_vec())
            .with_transform(Transform::from_position([1.0, 0.0, -2.0]).with_uniform_scale(0.5)),
    );

    b.engine.join(a.id).await.expect("join");

    assert!(wait_for_entity(&b, &e1).await);
    assert!(wait_for_entity(&b, &e2).await);
    assert_eq!(b.scene.len().unwrap(), 2);

    // Blobs and transforms survive the bootstrap unchanged.
    let dancer = b.scene.get(&e2).unwrap().unwrap();
    assert_eq!(dancer.object, b"dancer-gltf");
    assert_eq!(dancer.animation.as_deref(), Some(&b"dance-clip"[..]));
    assert_eq!(
        dancer.transform,
        Transform::from_position([1.0, 0.0, -2.0]).with_uniform_scale(0.5)
    );
}

#[tokio::test]
async fn test_bootstrap_sync_is_destructive() {
    let net = ChannelNetwork::new();
    let a = TestPeer::spawn(&net).await;
    let b = TestPeer::spawn(&net).await;

    let shared = a.add_entity(b"statue");

    // B made a local draft it never announced; the bootstrap replaces it.
    let draft = Entity::new(b.ids.allocate(), b"draft".to_vec());
    let draft_id = draft.id;
    b.scene.add(draft).unwrap();

    b.engine.join(a.id).await.expect("join");

    assert!(wait_for_entity(&b, &shared).await);
    assert!(b.scene.get(&draft_id).unwrap().is_none());
    assert_eq!(b.scene.len().unwrap(), 1);
}

#[tokio::test]
async fn test_edits_flow_both_ways_after_join() {
    let net = ChannelNetwork::new();
    let a = TestPeer::spawn(&net).await;
    let b = TestPeer::spawn(&net).await;

    b.engine.join(a.id).await.expect("join");
    common::settle().await;

    // Acceptor → newcomer.
    let from_a = a.add_entity(b"lamp");
    assert!(wait_for_entity(&b, &from_a).await);

    // Newcomer → acceptor.
    let from_b = b.add_entity(b"chair");
    assert!(wait_for_entity(&a, &from_b).await);

    assert_eq!(a.scene.len().unwrap(), 2);
    assert_eq!(b.scene.len().unwrap(), 2);
}

#[tokio::test]
async fn test_full_sync_all_pushes_scene_to_every_peer() {
    let net = ChannelNetwork::new();
    let a = TestPeer::spawn(&net).await;
    let b = TestPeer::spawn(&net).await;
    b.engine.join(a.id).await.expect("join");
    common::settle().await;

    // A grows an entity without announcing it (the simplest protocol
    // variant: propagate by re-syncing instead of per-object frames).
    let quiet = Entity::new(a.ids.allocate(), b"quiet".to_vec());
    let quiet_id = quiet.id;
    a.scene.add(quiet).unwrap();
    assert!(b.scene.get(&quiet_id).unwrap().is_none());

    a.engine.full_sync_all().expect("full sync");
    assert!(wait_for_entity(&b, &quiet_id).await);
    assert_eq!(b.scene.len().unwrap(), 1);
}

#[tokio::test]
async fn test_join_unreachable_peer_fails() {
    let net = ChannelNetwork::new();
    let a = TestPeer::spawn(&net).await;

    // Never registered with the broker — the dial fails, nothing is
    // registered, and the error surfaces to the caller.
    let stranger = PeerId::random();
    assert!(a.engine.join(stranger).await.is_err());
    assert!(a.engine.peers().unwrap().is_empty());
}
