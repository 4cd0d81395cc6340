//! ChannelTransport — in-memory Transport implementation
//!
//! Uses `tokio::io::DuplexStream` for bidirectional byte streams and a
//! shared `ChannelNetwork` broker in place of peer discovery. Dialing a
//! peer that never registered with the broker fails the way an unreachable
//! address would.

use diorama_model::PeerId;
use diorama_net_types::transport::{BiStream, Connection, Transport, TransportError};
use diorama_net_types::NetworkEvent;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::{broadcast, mpsc, Mutex};

/// Shared network broker — routes connections between ChannelTransport
/// instances.
#[derive(Clone, Debug)]
pub struct ChannelNetwork {
    peers: Arc<Mutex<HashMap<PeerId, mpsc::Sender<ChannelConnection>>>>,
}

impl ChannelNetwork {
    pub fn new() -> Self {
        Self {
            peers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn register(&self, peer: PeerId, accept_tx: mpsc::Sender<ChannelConnection>) {
        self.peers.lock().await.insert(peer, accept_tx);
    }
}

impl Default for ChannelNetwork {
    fn default() -> Self {
        Self::new()
    }
}

const DUPLEX_BUF_SIZE: usize = 64 * 1024;

/// In-memory Transport implementation.
#[derive(Clone, Debug)]
pub struct ChannelTransport {
    peer: PeerId,
    network: ChannelNetwork,
    accept_rx: Arc<Mutex<mpsc::Receiver<ChannelConnection>>>,
    network_events_tx: broadcast::Sender<NetworkEvent>,
}

impl ChannelTransport {
    pub async fn new(peer: PeerId, network: &ChannelNetwork) -> Self {
        let (accept_tx, accept_rx) = mpsc::channel(64);
        let (network_events_tx, _) = broadcast::channel(128);
        network.register(peer, accept_tx).await;
        Self {
            peer,
            network: network.clone(),
            accept_rx: Arc::new(Mutex::new(accept_rx)),
            network_events_tx,
        }
    }
}

impl Transport for ChannelTransport {
    type Connection = ChannelConnection;

    fn peer_id(&self) -> PeerId {
        self.peer
    }

    fn connect(
        &self,
        peer: &PeerId,
    ) -> impl std::future::Future<Output = Result<Self::Connection, TransportError>> + Send {
        let network = self.network.clone();
        let my_peer = self.peer;
        let remote = *peer;

        async move {
            let peers = network.peers.lock().await;
            let accept_tx = peers
                .get(&remote)
                .ok_or_else(|| {
                    TransportError::Connect(format!("peer {} not found in network", remote))
                })?
                .clone();
            drop(peers);

            // One channel: the dialer sends DuplexStream ends to the acceptor.
            let (stream_tx, stream_rx) = mpsc::channel::<DuplexStream>(8);

            // Hand the acceptor side to the remote peer's accept queue.
            let accepted = ChannelConnection {
                remote: my_peer,
                role: ConnectionRole::Acceptor(Arc::new(Mutex::new(stream_rx))),
            };

            accept_tx.send(accepted).await.map_err(|_| {
                TransportError::Connect(format!("peer {} accept channel closed", remote))
            })?;

            tracing::debug!(peer = %remote.fmt_short(), "dialed peer");
            let _ = self
                .network_events_tx
                .send(NetworkEvent::PeerConnected(remote));

            // Keep the dialer side.
            Ok(ChannelConnection {
                remote,
                role: ConnectionRole::Dialer(Arc::new(Mutex::new(stream_tx))),
            })
        }
    }

    fn accept(&self) -> impl std::future::Future<Output = Option<Self::Connection>> + Send {
        let accept_rx = self.accept_rx.clone();
        let events_tx = self.network_events_tx.clone();
        async move {
            let conn = accept_rx.lock().await.recv().await;
            if let Some(ref c) = conn {
                tracing::debug!(peer = %c.remote.fmt_short(), "accepted peer");
                let _ = events_tx.send(NetworkEvent::PeerConnected(c.remote));
            }
            conn
        }
    }

    fn network_events(&self) -> broadcast::Receiver<NetworkEvent> {
        self.network_events_tx.subscribe()
    }
}

/// Role determines how open_bi() works.
enum ConnectionRole {
    /// Creates DuplexStream pairs and sends one end to the peer.
    Dialer(Arc<Mutex<mpsc::Sender<DuplexStream>>>),
    /// Receives DuplexStream ends from the dialer.
    Acceptor(Arc<Mutex<mpsc::Receiver<DuplexStream>>>),
}

/// In-memory connection between two ChannelTransport instances.
pub struct ChannelConnection {
    remote: PeerId,
    role: ConnectionRole,
}

impl std::fmt::Debug for ChannelConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelConnection")
            .field("remote", &self.remote)
            .finish()
    }
}

impl Connection for ChannelConnection {
    type Stream = ChannelBiStream;

    fn open_bi(
        &self,
    ) -> impl std::future::Future<Output = Result<Self::Stream, TransportError>> + Send {
        let role = match &self.role {
            ConnectionRole::Dialer(tx) => ConnectionRole::Dialer(tx.clone()),
            ConnectionRole::Acceptor(rx) => ConnectionRole::Acceptor(rx.clone()),
        };

        async move {
            match role {
                ConnectionRole::Dialer(tx) => {
                    let (mine, theirs) = tokio::io::duplex(DUPLEX_BUF_SIZE);
                    let tx = tx.lock().await;
                    tx.send(theirs)
                        .await
                        .map_err(|_| TransportError::Stream("connection closed".into()))?;
                    Ok(ChannelBiStream(mine))
                }
                ConnectionRole::Acceptor(rx) => {
                    let mut rx = rx.lock().await;
                    let stream = rx
                        .recv()
                        .await
                        .ok_or_else(|| TransportError::Stream("connection closed".into()))?;
                    Ok(ChannelBiStream(stream))
                }
            }
        }
    }

    fn remote_peer_id(&self) -> PeerId {
        self.remote
    }
}

/// In-memory bidirectional stream backed by a single `DuplexStream`.
///
/// Each side gets one end of the duplex pair: writes on one end are reads
/// on the other.
pub struct ChannelBiStream(DuplexStream);

impl BiStream for ChannelBiStream {
    type SendStream = WriteHalf<DuplexStream>;
    type RecvStream = ReadHalf<DuplexStream>;

    fn into_split(self) -> (Self::SendStream, Self::RecvStream) {
        let (read, write) = tokio::io::split(self.0);
        (write, read)
    }
}
