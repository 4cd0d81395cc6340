//! Diorama Networking
//!
//! The peer mesh synchronization core:
//! - **engine**: SyncEngine — apply/relay state machine, join bootstrap,
//!   local-edit broadcast
//! - **registry**: live peer sessions and their outbound queues
//! - **framing**: length-prefixed PeerMessage frames over any byte stream
//! - **dedup**: bounded recently-seen cache bounding flood duplication
//! - **error**: typed error types

mod dedup;
mod engine;
mod error;
mod framing;
mod registry;

pub use dedup::SeenCache;
pub use engine::{EngineConfig, SyncEngine};
pub use error::NetError;
pub use framing::{MessageSink, MessageStream};
pub use registry::{PeerRegistry, SessionHandle};
