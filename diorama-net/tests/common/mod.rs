// Each integration test compiles as a separate binary that includes this
// module via `mod common;`. Not every test binary uses every helper, so
// Rust emits spurious dead_code warnings.
#![allow(dead_code)]
//! Shared test utilities for diorama-net integration tests.

use diorama_model::{EngineEvent, Entity, EntityId, IdAllocator, PeerId, Transform};
use diorama_net::{EngineConfig, SyncEngine};
use diorama_net_sim::{ChannelNetwork, ChannelTransport};
use diorama_scene::SceneStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// One mesh participant: transport, scene store, engine, id allocator.
pub struct TestPeer {
    pub id: PeerId,
    pub scene: Arc<SceneStore>,
    pub engine: Arc<SyncEngine<ChannelTransport>>,
    pub ids: IdAllocator,
}

impl TestPeer {
    pub async fn spawn(net: &ChannelNetwork) -> Self {
        let id = PeerId::random();
        let transport = ChannelTransport::new(id, net).await;
        let scene = Arc::new(SceneStore::new());
        let engine = SyncEngine::start(transport, scene.clone(), EngineConfig::default());
        Self {
            id,
            scene,
            engine,
            ids: IdAllocator::new(),
        }
    }

    /// Add an entity locally and announce it to the mesh.
    pub fn add_entity(&self, object: &[u8]) -> EntityId {
        let entity = Entity::new(self.ids.allocate(), object.to_vec());
        self.add_full_entity(entity)
    }

    /// Add a prepared entity locally and announce it to the mesh.
    pub fn add_full_entity(&self, entity: Entity) -> EntityId {
        let id = entity.id;
        self.scene.add(entity.clone()).expect("scene add");
        self.engine.notify_entity_added(&entity).expect("broadcast");
        id
    }

    /// Apply a transform locally and broadcast it, the way a manipulation
    /// handler would.
    pub fn move_entity(&self, id: EntityId, transform: Transform) {
        self.scene
            .apply_transform(&id, transform)
            .expect("apply transform");
        self.engine
            .notify_transform_changed(id, transform)
            .expect("broadcast");
    }

    pub fn events(&self) -> broadcast::Receiver<EngineEvent> {
        self.engine.subscribe_events()
    }
}

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Poll until the peer's store holds `id`, or time out.
pub async fn wait_for_entity(peer: &TestPeer, id: &EntityId) -> bool {
    let start = Instant::now();
    while start.elapsed() < WAIT_TIMEOUT {
        if peer.scene.get(id).unwrap().is_some() {
            return true;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    false
}

/// Poll until the peer's store holds `id` with exactly `expected`, or time
/// out.
pub async fn wait_for_transform(peer: &TestPeer, id: &EntityId, expected: Transform) -> bool {
    let start = Instant::now();
    while start.elapsed() < WAIT_TIMEOUT {
        if let Some(entity) = peer.scene.get(id).unwrap() {
            if entity.transform == expected {
                return true;
            }
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    false
}

/// Let in-flight frames drain.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(150)).await;
}

/// Drain an event receiver and count events matching the predicate.
pub fn drain_events(
    rx: &mut broadcast::Receiver<EngineEvent>,
    mut matches: impl FnMut(&EngineEvent) -> bool,
) -> usize {
    let mut count = 0;
    while let Ok(event) = rx.try_recv() {
        if matches(&event) {
            count += 1;
        }
    }
    count
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("diorama_net=debug")),
        )
        .with_test_writer()
        .try_init();
}
