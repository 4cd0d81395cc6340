//! Message framing using tokio-util LengthDelimitedCodec
//!
//! Provides a clean interface for sending/receiving length-prefixed
//! `PeerMessage` frames over any byte stream without manual buffer
//! management. The relay path forwards received frames verbatim, so the
//! raw-bytes variants exist alongside the typed ones.

use crate::error::NetError;
use diorama_proto::PeerMessage;
use futures_util::{SinkExt, StreamExt};
use prost::Message;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

/// Upper bound on one frame. A frame carries at most a full-scene snapshot;
/// model blobs dominate its size.
const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

fn codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_BYTES)
        .new_codec()
}

/// Framed writer for sending PeerMessage over a send stream
pub struct MessageSink<W> {
    inner: FramedWrite<W, LengthDelimitedCodec>,
}

impl<W: AsyncWrite + Unpin> MessageSink<W> {
    pub fn new(stream: W) -> Self {
        Self {
            inner: FramedWrite::new(stream, codec()),
        }
    }

    /// Send a PeerMessage (length-prefixed).
    pub async fn send(&mut self, msg: &PeerMessage) -> Result<(), NetError> {
        self.send_raw(msg.encode_to_vec()).await
    }

    /// Send an already-encoded frame verbatim (relay path).
    pub async fn send_raw(&mut self, bytes: Vec<u8>) -> Result<(), NetError> {
        self.inner.send(bytes.into()).await?;
        Ok(())
    }
}

/// Framed reader for receiving PeerMessage from a receive stream
pub struct MessageStream<R> {
    inner: FramedRead<R, LengthDelimitedCodec>,
}

impl<R: AsyncRead + Unpin> MessageStream<R> {
    pub fn new(stream: R) -> Self {
        Self {
            inner: FramedRead::new(stream, codec()),
        }
    }

    /// Receive the next encoded frame, undecoded (or None if the stream
    /// closed). The engine hashes and relays these bytes as received.
    pub async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, NetError> {
        match self.inner.next().await {
            Some(Ok(bytes)) => Ok(Some(bytes.to_vec())),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// Receive and decode the next PeerMessage (or None if the stream closed).
    pub async fn recv(&mut self) -> Result<Option<PeerMessage>, NetError> {
        match self.next_frame().await? {
            Some(bytes) => Ok(Some(PeerMessage::decode(&bytes[..])?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diorama_proto::TransformUpdate;

    #[tokio::test]
    async fn test_frame_roundtrip_over_duplex() {
        let (client, server) = tokio::io::duplex(4096);
        let mut sink = MessageSink::new(client);
        let mut stream = MessageStream::new(server);

        let msg = PeerMessage::update(TransformUpdate {
            id: "0102030405060708-3".to_string(),
            position: vec![1.0, 2.0, 3.0],
            rotation: vec![0.0, 0.0, 0.0, 1.0],
            scale: vec![1.0, 1.0, 1.0],
        });

        sink.send(&msg).await.unwrap();
        let received = stream.recv().await.unwrap().unwrap();
        assert_eq!(received, msg);
    }

    #[tokio::test]
    async fn test_closed_stream_yields_none() {
        let (client, server) = tokio::io::duplex(4096);
        drop(client);
        let mut stream = MessageStream::<_>::new(server);
        assert!(stream.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_raw_frames_preserved_verbatim() {
        let (client, server) = tokio::io::duplex(4096);
        let mut sink = MessageSink::new(client);
        let mut stream = MessageStream::new(server);

        let msg = PeerMessage::sync(vec![]);
        let bytes = prost::Message::encode_to_vec(&msg);
        sink.send_raw(bytes.clone()).await.unwrap();

        let received = stream.next_frame().await.unwrap().unwrap();
        assert_eq!(received, bytes);
    }
}
