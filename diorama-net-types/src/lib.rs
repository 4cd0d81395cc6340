//! Diorama Net Types
//!
//! The seam between the sync engine and the point-to-point transport it
//! runs over. The transport itself — dialing, NAT traversal, signaling,
//! delivery — is an external concern; this crate only states the contract
//! the engine needs: open or accept a connection to exactly one remote
//! peer, and exchange ordered bytes over it.

pub mod transport;

pub use transport::{BiStream, Connection, Transport, TransportError};

use diorama_model::PeerId;

/// Connectivity events surfaced by a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkEvent {
    PeerConnected(PeerId),
    PeerDisconnected(PeerId),
}
