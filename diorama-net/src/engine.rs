//! SyncEngine — peer mesh synchronization
//!
//! Owns the peer registry and the scene store, and is the single code path
//! through which both local edits and inbound network data mutate the
//! scene. Generic over `T: Transport` — production hosts bring their own
//! transport, tests run over in-memory channels.
//!
//! Protocol shape: a frame received from peer S is applied locally and
//! relayed verbatim to every session except S (flood broadcast). A bounded
//! recently-seen cache suppresses re-relay of frames already handled, which
//! bounds duplication in topologies with cycles. Full-scene sync frames are
//! the join bootstrap and are never relayed onward: a destructive full
//! replace flooding a cycle could clobber newer state arbitrarily late.

use crate::dedup::SeenCache;
use crate::error::NetError;
use crate::framing::{MessageSink, MessageStream};
use crate::registry::PeerRegistry;
use diorama_model::{EngineEvent, Entity, EntityId, PeerId, Transform};
use diorama_net_types::transport::{BiStream, Connection as TransportConnection, Transport};
use diorama_proto::{
    peer_message, EntityState, ObjectAnnounce, PeerMessage, SceneSnapshot, TransformUpdate,
};
use diorama_scene::SceneStore;
use prost::Message;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc};

/// Tunables for the sync engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Encoded frames queued per session before sends to it are dropped.
    pub send_queue_depth: usize,
    /// Frames remembered by the relay dedup cache.
    pub dedup_capacity: usize,
    /// Depth of the EngineEvent broadcast channel.
    pub event_channel_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            send_queue_depth: 64,
            dedup_capacity: 1024,
            event_channel_depth: 128,
        }
    }
}

/// Central service for scene mesh networking.
///
/// Create with [`SyncEngine::start`]; share as `Arc`. Local edits enter
/// through [`notify_entity_added`](Self::notify_entity_added) and
/// [`notify_transform_changed`](Self::notify_transform_changed); everything
/// the mesh does to the local scene is reported on the event channel.
pub struct SyncEngine<T: Transport> {
    transport: T,
    scene: Arc<SceneStore>,
    registry: PeerRegistry,
    seen: Mutex<SeenCache>,
    events_tx: broadcast::Sender<EngineEvent>,
    config: EngineConfig,
}

impl<T: Transport> SyncEngine<T> {
    /// Start the engine: spawns the accept loop on the given transport.
    pub fn start(transport: T, scene: Arc<SceneStore>, config: EngineConfig) -> Arc<Self> {
        let (events_tx, _) = broadcast::channel(config.event_channel_depth);
        let engine = Arc::new(Self {
            transport,
            scene,
            registry: PeerRegistry::new(),
            seen: Mutex::new(SeenCache::new(config.dedup_capacity)),
            events_tx,
            config,
        });

        {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine.run_accept_loop().await;
            });
        }

        engine
    }

    /// Access the scene store.
    pub fn scene(&self) -> &Arc<SceneStore> {
        &self.scene
    }

    /// Access the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// This node's peer id.
    pub fn peer_id(&self) -> PeerId {
        self.transport.peer_id()
    }

    /// Currently connected peers.
    pub fn peers(&self) -> Result<Vec<PeerId>, NetError> {
        self.registry.peers().map_err(NetError::Registry)
    }

    /// Subscribe to engine events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events_tx.subscribe()
    }

    // ==================== Session lifecycle ====================

    /// Accept incoming sessions until the transport shuts down.
    async fn run_accept_loop(self: &Arc<Self>) {
        loop {
            let Some(conn) = self.transport.accept().await else {
                break;
            };
            let engine = self.clone();
            tokio::spawn(async move {
                let remote = conn.remote_peer_id();
                if let Err(e) = engine.accept_session(conn).await {
                    tracing::warn!(peer = %remote.fmt_short(), error = %e, "incoming session failed");
                }
            });
        }
        tracing::debug!("accept loop ended");
    }

    /// One inbound session: open the stream, register, then catch the
    /// newcomer up with the entire scene.
    async fn accept_session(self: &Arc<Self>, conn: T::Connection) -> Result<(), NetError> {
        let remote = conn.remote_peer_id();
        tracing::info!(peer = %remote.fmt_short(), "peer connected to us");

        let bi = conn
            .open_bi()
            .await
            .map_err(|e| NetError::Connection(e.to_string()))?;
        let (send, recv) = bi.into_split();
        self.start_session(remote, send, recv)?;

        self.full_sync_to(remote)?;
        Ok(())
    }

    /// Join the mesh through one already-participating peer.
    ///
    /// Dials, opens the session stream, and registers the session. The
    /// accepting side answers with a full-scene sync; until that arrives
    /// this node's view is whatever it already held.
    pub async fn join(self: &Arc<Self>, peer: PeerId) -> Result<(), NetError> {
        tracing::info!(peer = %peer.fmt_short(), "joining mesh via peer");

        let conn = self.transport.connect(&peer).await.map_err(|e| {
            tracing::warn!(peer = %peer.fmt_short(), error = %e, "join failed: connection error");
            NetError::Connection(e.to_string())
        })?;
        let bi = conn
            .open_bi()
            .await
            .map_err(|e| NetError::Connection(e.to_string()))?;
        let (send, recv) = bi.into_split();
        self.start_session(peer, send, recv)?;

        tracing::info!(peer = %peer.fmt_short(), "join complete, awaiting bootstrap sync");
        Ok(())
    }

    /// Wire up one live session: a writer task draining the outbound queue
    /// and a reader task feeding inbound frames to the engine.
    fn start_session<W, R>(self: &Arc<Self>, peer: PeerId, send: W, recv: R) -> Result<(), NetError>
    where
        W: AsyncWrite + Send + Unpin + 'static,
        R: AsyncRead + Send + Unpin + 'static,
    {
        let (outbound_tx, mut outbound_rx) =
            mpsc::channel::<Vec<u8>>(self.config.send_queue_depth);
        let session_token = outbound_tx.clone();

        let new = self
            .registry
            .register(peer, outbound_tx)
            .map_err(NetError::Registry)?;
        if !new {
            tracing::debug!(peer = %peer.fmt_short(), "replacing existing session");
        }
        let _ = self.events_tx.send(EngineEvent::PeerJoined { peer });

        // Writer: drains the queue until it closes (unregister drops the
        // sender) or the transport rejects a frame.
        tokio::spawn(async move {
            let mut sink = MessageSink::new(send);
            while let Some(frame) = outbound_rx.recv().await {
                if let Err(e) = sink.send_raw(frame).await {
                    tracing::warn!(peer = %peer.fmt_short(), error = %e, "send failed");
                    break;
                }
            }
        });

        // Reader: applies and relays until the link closes or errors.
        let engine = self.clone();
        tokio::spawn(async move {
            let mut stream = MessageStream::new(recv);
            loop {
                match stream.next_frame().await {
                    Ok(Some(frame)) => engine.handle_frame(peer, frame),
                    Ok(None) => break,
                    Err(e) => {
                        tracing::debug!(peer = %peer.fmt_short(), error = %e, "session stream error");
                        break;
                    }
                }
            }
            engine.drop_session(peer, &session_token);
        });

        Ok(())
    }

    /// Session teardown: unregister (idempotent, identity-checked) and tell
    /// the application.
    fn drop_session(&self, peer: PeerId, token: &mpsc::Sender<Vec<u8>>) {
        match self.registry.unregister_session(&peer, token) {
            Ok(true) => {
                tracing::info!(peer = %peer.fmt_short(), "session closed");
                let _ = self.events_tx.send(EngineEvent::PeerLeft { peer });
            }
            Ok(false) => {} // already replaced by a newer session
            Err(e) => tracing::warn!(error = %e, "unregister failed"),
        }
    }

    // ==================== Local-edit entry points ====================

    /// Announce a locally added entity to every connected peer.
    ///
    /// The entity is already in the scene store; this only broadcasts.
    pub fn notify_entity_added(&self, entity: &Entity) -> Result<(), NetError> {
        tracing::debug!(id = %entity.id, "broadcasting entity announce");
        self.broadcast(PeerMessage::object(EntityState::from(entity)))
    }

    /// Broadcast the full current transform of a locally manipulated
    /// entity. Called at manipulation frequency; carries no delta, so a
    /// dropped frame is simply overwritten by the next one.
    pub fn notify_transform_changed(
        &self,
        id: EntityId,
        transform: Transform,
    ) -> Result<(), NetError> {
        self.broadcast(PeerMessage::update(TransformUpdate::from_parts(
            id, transform,
        )))
    }

    fn broadcast(&self, msg: PeerMessage) -> Result<(), NetError> {
        let bytes = msg.encode_to_vec();
        // Remember our own frames: a copy flooding back around a mesh cycle
        // must not be relayed again by its origin.
        if let Ok(mut seen) = self.seen.lock() {
            seen.observe(&bytes);
        }
        for session in self.registry.all().map_err(NetError::Registry)? {
            if !session.send(bytes.clone()) {
                tracing::warn!(peer = %session.peer().fmt_short(), "broadcast send failed, skipping peer");
            }
        }
        Ok(())
    }

    // ==================== Full-scene sync ====================

    /// Send the entire scene to one peer (the newcomer bootstrap).
    #[tracing::instrument(skip(self), fields(peer = %peer.fmt_short()))]
    pub fn full_sync_to(&self, peer: PeerId) -> Result<(), NetError> {
        let entities = self.scene.snapshot()?;
        let count = entities.len();
        let states: Vec<EntityState> = entities.iter().map(EntityState::from).collect();
        let bytes = PeerMessage::sync(states).encode_to_vec();

        let session = self
            .registry
            .get(&peer)
            .map_err(NetError::Registry)?
            .ok_or_else(|| NetError::Connection(format!("no session for peer {}", peer)))?;

        tracing::info!(entities = count, "sending full scene sync");
        if !session.send(bytes) {
            tracing::warn!("full sync send failed");
        }
        Ok(())
    }

    /// Re-send the entire scene to every connected peer.
    pub fn full_sync_all(&self) -> Result<(), NetError> {
        for peer in self.registry.peers().map_err(NetError::Registry)? {
            self.full_sync_to(peer)?;
        }
        Ok(())
    }

    // ==================== Inbound frames ====================

    /// One inbound frame: dedup-check, apply, relay. Runs to completion as
    /// a single reaction; the store and registry locks are scoped inside
    /// and never held across an await.
    fn handle_frame(&self, from: PeerId, frame: Vec<u8>) {
        let fresh = match self.seen.lock() {
            Ok(mut seen) => seen.observe(&frame),
            Err(_) => {
                tracing::warn!("dedup cache lock poisoned, dropping frame");
                return;
            }
        };

        let msg = match PeerMessage::decode(&frame[..]) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(peer = %from.fmt_short(), error = %e, "undecodable frame dropped");
                return;
            }
        };
        let Some(kind) = msg.message else {
            tracing::debug!(peer = %from.fmt_short(), "empty frame dropped");
            return;
        };

        match kind {
            peer_message::Message::Object(announce) => self.apply_object(from, announce),
            peer_message::Message::Update(update) => self.apply_update(from, update),
            peer_message::Message::Sync(snapshot) => {
                // Bootstrap-only: applied here, never relayed onward.
                self.apply_sync(from, snapshot);
                return;
            }
        }

        if fresh {
            self.relay(from, frame);
        } else {
            tracing::debug!(peer = %from.fmt_short(), "duplicate frame, relay suppressed");
        }
    }

    fn apply_object(&self, from: PeerId, announce: ObjectAnnounce) {
        let Some(state) = announce.entity else {
            tracing::debug!(peer = %from.fmt_short(), "object frame without entity, dropped");
            return;
        };
        match Entity::try_from(state) {
            Ok(entity) => {
                let id = entity.id;
                match self.scene.add(entity) {
                    Ok(true) => {
                        tracing::info!(peer = %from.fmt_short(), id = %id, "entity announced")
                    }
                    Ok(false) => {
                        tracing::debug!(peer = %from.fmt_short(), id = %id, "entity re-announced, replaced")
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "scene add failed");
                        return;
                    }
                }
                let _ = self.events_tx.send(EngineEvent::EntityAdded { id });
            }
            Err(e) => {
                tracing::warn!(peer = %from.fmt_short(), error = %e, "malformed entity record dropped")
            }
        }
    }

    fn apply_update(&self, from: PeerId, update: TransformUpdate) {
        match update.to_parts() {
            Ok((id, transform)) => match self.scene.apply_transform(&id, transform) {
                Ok(true) => {
                    let _ = self.events_tx.send(EngineEvent::TransformUpdated { id });
                }
                // Unknown id is expected under eventual convergence: the
                // entity may not have arrived here yet. The frame is still
                // relayed by the caller so downstream peers converge.
                Ok(false) => {}
                Err(e) => tracing::warn!(error = %e, "transform apply failed"),
            },
            Err(e) => {
                tracing::warn!(peer = %from.fmt_short(), error = %e, "malformed transform update dropped")
            }
        }
    }

    fn apply_sync(&self, from: PeerId, snapshot: SceneSnapshot) {
        let mut entities = Vec::with_capacity(snapshot.entities.len());
        for state in snapshot.entities {
            match Entity::try_from(state) {
                Ok(entity) => entities.push(entity),
                Err(e) => {
                    tracing::warn!(peer = %from.fmt_short(), error = %e, "malformed entity in snapshot skipped")
                }
            }
        }
        match self.scene.replace_all(entities) {
            Ok(count) => {
                tracing::info!(peer = %from.fmt_short(), entities = count, "scene replaced from snapshot");
                let _ = self.events_tx.send(EngineEvent::SceneReplaced { entities: count });
            }
            Err(e) => tracing::warn!(error = %e, "scene replace failed"),
        }
    }

    /// Forward a received frame, verbatim, to every session except its
    /// sender. Per-peer failures are logged and skipped.
    fn relay(&self, from: PeerId, frame: Vec<u8>) {
        let sessions = match self.registry.all_except(&from) {
            Ok(sessions) => sessions,
            Err(e) => {
                tracing::warn!(error = %e, "relay skipped");
                return;
            }
        };
        for session in sessions {
            if !session.send(frame.clone()) {
                tracing::warn!(peer = %session.peer().fmt_short(), "relay send failed, skipping peer");
            }
        }
    }
}
