//! Transport abstraction for diorama networking
//!
//! Decouples the sync engine from any concrete networking stack.
//! Production hosts supply their own implementation (QUIC, WebRTC data
//! channels, ...); the test harness uses the in-memory channel transport
//! from `diorama-net-sim`.

use diorama_model::PeerId;
use std::fmt;

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),
    #[error("Accept failed: {0}")]
    Accept(String),
    #[error("Stream error: {0}")]
    Stream(String),
}

/// A bidirectional byte stream (send + receive half).
///
/// Both halves must be independently usable; per-link ordering is the
/// transport's guarantee. The engine layers message framing on top.
pub trait BiStream: Send + 'static {
    /// The send half of the stream.
    type SendStream: tokio::io::AsyncWrite + Send + Unpin + 'static;
    /// The receive half of the stream.
    type RecvStream: tokio::io::AsyncRead + Send + Unpin + 'static;

    /// Split into send and receive halves.
    fn into_split(self) -> (Self::SendStream, Self::RecvStream);
}

/// A connection to exactly one remote peer.
pub trait Connection: Send + Sync + 'static {
    /// The bidirectional stream type produced by this connection.
    type Stream: BiStream;

    /// Open the bidirectional stream for this connection.
    ///
    /// Callable on both ends: the dialer creates the stream, the acceptor
    /// receives it. The engine opens exactly one stream per session and
    /// keeps it for the session's lifetime.
    fn open_bi(
        &self,
    ) -> impl std::future::Future<Output = Result<Self::Stream, TransportError>> + Send;

    /// The remote peer's identifier.
    fn remote_peer_id(&self) -> PeerId;
}

/// Transport layer abstraction.
///
/// Provides peer identity, outbound connections, and inbound connection
/// acceptance. This is the primary seam for swapping a real network stack
/// with in-memory channels.
pub trait Transport: Send + Sync + fmt::Debug + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;

    /// This node's peer identifier.
    fn peer_id(&self) -> PeerId;

    /// Dial a remote peer by identifier.
    fn connect(
        &self,
        peer: &PeerId,
    ) -> impl std::future::Future<Output = Result<Self::Connection, TransportError>> + Send;

    /// Accept an incoming connection (waits until one arrives, or returns
    /// None on shutdown).
    fn accept(
        &self,
    ) -> impl std::future::Future<Output = Option<Self::Connection>> + Send;

    /// Get a stream of connectivity events (PeerConnected/PeerDisconnected).
    fn network_events(&self) -> tokio::sync::broadcast::Receiver<crate::NetworkEvent>;
}
