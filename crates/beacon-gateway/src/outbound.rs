use axum::extract::ws::{CloseFrame, Message, WebSocket};
use beacon_models::gateway::GatewayFrame;
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use tokio::sync::mpsc;

use crate::compression::ZlibStream;

/// Compressed output is split into chunks this size before hitting the
/// socket; the client reassembles by concatenation up to the next
/// decompressible unit.
pub const MAX_CHUNK_BYTES: usize = 1024;

/// Capacity of each session's outbound queue. `try_send` on a full queue is
/// a delivery failure, never backpressure into the router.
pub const OUTBOUND_QUEUE: usize = 256;

#[derive(Debug)]
pub enum Outbound {
    Frame(GatewayFrame),
    Close { code: u16, reason: &'static str },
}

/// Single writer per connection: owns the socket sink and the session's
/// compression context, so sends serialize and compressed bytes hit the
/// wire in compression order.
pub(crate) async fn run_writer(
    mut sink: SplitSink<WebSocket, Message>,
    mut queue: mpsc::Receiver<Outbound>,
    trace_tag: String,
) {
    let mut zlib = ZlibStream::new();

    while let Some(item) = queue.recv().await {
        match item {
            Outbound::Frame(mut frame) => {
                frame.trace = vec![trace_tag.clone()];
                let encoded = match serde_json::to_vec(&frame) {
                    Ok(encoded) => encoded,
                    Err(err) => {
                        tracing::error!(error = %err, "unserializable outbound frame, skipping");
                        continue;
                    }
                };
                let compressed = match zlib.compress(&encoded) {
                    Ok(compressed) => compressed,
                    Err(err) => {
                        tracing::error!(error = %err, "compression stream corrupted, closing writer");
                        return;
                    }
                };
                for chunk in compressed.chunks(MAX_CHUNK_BYTES) {
                    if sink.send(Message::Binary(chunk.to_vec().into())).await.is_err() {
                        // Peer is gone; the connection's liveness poll will
                        // notice the dead queue and run teardown.
                        return;
                    }
                }
            }
            Outbound::Close { code, reason } => {
                let _ = sink
                    .send(Message::Close(Some(CloseFrame {
                        code,
                        reason: reason.to_string().into(),
                    })))
                    .await;
                return;
            }
        }
    }

    // Teardown dropped the queue: close out gracefully.
    let _ = sink.close().await;
}
