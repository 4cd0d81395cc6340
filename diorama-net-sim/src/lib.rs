//! In-memory network simulation for diorama
//!
//! Provides `ChannelTransport`, a `Transport` impl using tokio channels,
//! with a shared `ChannelNetwork` broker for peer lookup. Enables
//! multi-peer mesh testing without real networking.

mod channel_transport;

pub use channel_transport::{ChannelBiStream, ChannelConnection, ChannelNetwork, ChannelTransport};
