//! One WebSocket connection bridged to the hub.
//!
//! Each connection runs a read pump and a write pump concurrently. The read
//! pump is the only reader of the socket and the write pump the only writer.
//! Whichever stops first takes the connection down:
//!
//! - read pump stops: it unregisters, the hub closes the outbound queue, the
//!   write pump sends a close frame and stops.
//! - write pump stops: the read pump is dropped and the connection
//!   unregisters itself.

use crate::hub::{ConnectionId, HubError, HubHandle};
use crate::keepalive::Keepalive;
use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use cartsync_core::{FRAME_SEPARATOR, normalize};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("no pong within {0:?}")]
    PongTimeout(Duration),
    #[error("write did not complete within {0:?}")]
    WriteTimeout(Duration),
    #[error("transport: {0}")]
    Transport(String),
    #[error(transparent)]
    Hub(#[from] HubError),
}

/// Serve an upgraded WebSocket until either direction fails.
pub async fn serve(socket: WebSocket, hub: HubHandle, keepalive: Keepalive) {
    let (sink, stream) = socket.split();
    serve_split(sink, stream, hub, keepalive).await
}

/// Serve a connection given as separate sink and stream halves.
pub async fn serve_split<K, S, E>(sink: K, stream: S, hub: HubHandle, keepalive: Keepalive)
where
    K: Sink<Message> + Unpin,
    K::Error: Display,
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    // Registration completes before any frame is read or written.
    let (id, queue) = match hub.register().await {
        Ok(registered) => registered,
        Err(e) => {
            tracing::warn!("Rejecting connection: {}", e);
            return;
        }
    };
    tracing::debug!("Connection {} open", id);

    let read = read_pump(id, stream, &hub, keepalive);
    let write = write_pump(id, sink, queue, keepalive);
    tokio::pin!(read, write);

    tokio::select! {
        result = &mut read => {
            log_stop(id, "read", result);
            log_stop(id, "write", write.await);
        }
        result = &mut write => {
            log_stop(id, "write", result);
            if let Err(e) = hub.unregister(id).await {
                tracing::debug!("Connection {}: {}", id, e);
            }
        }
    }

    tracing::debug!("Connection {} closed", id);
}

fn log_stop(id: ConnectionId, side: &str, result: Result<(), ConnectionError>) {
    match result {
        Ok(()) => tracing::debug!("Connection {}: {} side finished", id, side),
        Err(ConnectionError::Transport(e)) => {
            tracing::warn!("Connection {}: {} error: {}", id, side, e)
        }
        Err(e) => tracing::debug!("Connection {}: {} side stopped: {}", id, side, e),
    }
}

/// Read frames and hand them to the hub, then unregister.
async fn read_pump<S, E>(
    id: ConnectionId,
    mut stream: S,
    hub: &HubHandle,
    keepalive: Keepalive,
) -> Result<(), ConnectionError>
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let result = read_frames(&mut stream, hub, keepalive).await;
    hub.unregister(id).await?;
    result
}

async fn read_frames<S, E>(
    stream: &mut S,
    hub: &HubHandle,
    keepalive: Keepalive,
) -> Result<(), ConnectionError>
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let mut deadline = keepalive.read_deadline();
    loop {
        let message = match tokio::time::timeout_at(deadline.at(), stream.next()).await {
            Err(_) => return Err(ConnectionError::PongTimeout(keepalive.pong_wait)),
            Ok(None) => return Ok(()),
            Ok(Some(Err(e))) => return Err(ConnectionError::Transport(e.to_string())),
            Ok(Some(Ok(message))) => message,
        };

        let frame = match message {
            Message::Text(text) => normalize(text.as_str().as_bytes()),
            Message::Binary(data) => normalize(&data),
            Message::Pong(_) => {
                deadline.extend();
                continue;
            }
            // Pongs to client pings are queued by the transport.
            Message::Ping(_) => continue,
            Message::Close(_) => return Ok(()),
        };
        hub.broadcast(Bytes::from(frame)).await?;
    }
}

/// Write queued frames and periodic pings until the queue closes.
async fn write_pump<K>(
    id: ConnectionId,
    mut sink: K,
    mut queue: mpsc::Receiver<Bytes>,
    keepalive: Keepalive,
) -> Result<(), ConnectionError>
where
    K: Sink<Message> + Unpin,
    K::Error: Display,
{
    let mut ping = keepalive.ping_timer();
    loop {
        tokio::select! {
            frame = queue.recv() => {
                let Some(frame) = frame else {
                    // The hub dropped us.
                    tracing::trace!("Connection {}: queue closed", id);
                    let _ = send(&mut sink, Message::Close(None), keepalive.write_wait).await;
                    return Ok(());
                };
                let message = coalesce(frame, &mut queue);
                send(&mut sink, message, keepalive.write_wait).await?;
            }
            _ = ping.tick() => {
                send(&mut sink, Message::Ping(Bytes::new()), keepalive.write_wait).await?;
            }
        }
    }
}

/// Join `first` with whatever is already queued into one message.
fn coalesce(first: Bytes, queue: &mut mpsc::Receiver<Bytes>) -> Message {
    let pending = queue.len();
    let mut buf = Vec::from(first);
    for _ in 0..pending {
        let Ok(next) = queue.try_recv() else { break };
        buf.push(FRAME_SEPARATOR);
        buf.extend_from_slice(&next);
    }

    match String::from_utf8(buf) {
        Ok(text) => Message::Text(text.into()),
        Err(e) => Message::Binary(e.into_bytes().into()),
    }
}

async fn send<K>(sink: &mut K, message: Message, wait: Duration) -> Result<(), ConnectionError>
where
    K: Sink<Message> + Unpin,
    K::Error: Display,
{
    match tokio::time::timeout(wait, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ConnectionError::Transport(e.to_string())),
        Err(_) => Err(ConnectionError::WriteTimeout(wait)),
    }
}
