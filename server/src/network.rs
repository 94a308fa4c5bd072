//! Websocket transport and background loops for the arena.
//!
//! One task reads each connection, one task writes it; the writer drains
//! the client's registry send-handle, so dropping that handle (unregister)
//! shuts the writer down cleanly. Two interval tasks drive the arena: the
//! game tick (continuous games) and the reap sweep (Ended sessions).

use crate::arena::Arena;
use crate::connection::SEND_QUEUE_CAPACITY;
use crate::dispatch;
use crate::error::ArenaError;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Game ticks per second for continuous games.
    pub tick_rate: u32,
    /// How often the reap sweep runs.
    pub sweep_interval: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            tick_rate: 20,
            sweep_interval: Duration::from_secs(5),
        }
    }
}

/// Binds the listening socket. Split from [`run`] so callers (and tests)
/// can learn the bound address before serving.
pub async fn bind(addr: &str) -> Result<TcpListener, Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(addr).await?;
    info!("Arena server listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Serves the arena on an already-bound listener. Runs until the listener
/// fails fatally; individual connection errors are logged and absorbed.
pub async fn run(arena: Arc<Arena>, listener: TcpListener, config: NetworkConfig) {
    spawn_tick_loop(&arena, config.tick_rate);
    spawn_reap_loop(&arena, config.sweep_interval);

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tokio::spawn(handle_connection(Arc::clone(&arena), stream, peer));
            }
            Err(e) => {
                error!("Error accepting connection: {}", e);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }
}

/// Game tick: advances continuous games at the configured rate.
fn spawn_tick_loop(arena: &Arc<Arena>, tick_rate: u32) {
    let arena = Arc::clone(arena);

    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs_f64(1.0 / tick_rate.max(1) as f64));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            arena.tick().await;
        }
    });
}

/// Passive sweep removing Ended sessions past their grace window.
fn spawn_reap_loop(arena: &Arc<Arena>, sweep_interval: Duration) {
    let arena = Arc::clone(arena);

    tokio::spawn(async move {
        let mut ticker = interval(sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            arena.sweep().await;
        }
    });
}

/// Full lifecycle of one websocket connection.
async fn handle_connection(arena: Arc<Arena>, stream: TcpStream, peer: SocketAddr) {
    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("Websocket handshake failed with {}: {}", peer, e);
            return;
        }
    };
    info!("New connection from {}", peer);

    let (mut ws_tx, mut ws_rx) = ws.split();
    let (tx, mut rx) = mpsc::channel(SEND_QUEUE_CAPACITY);

    let Some(client_id) = arena.connect(tx).await else {
        // At capacity; close immediately rather than hang the handshake.
        let _ = ws_tx.send(Message::Close(None)).await;
        return;
    };

    // Writer: drains the registry send-handle into text frames. Ends when
    // the handle is dropped (unregister) or the peer stops reading.
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            match serde_json::to_string(&message) {
                Ok(text) => {
                    if ws_tx.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!("Failed to encode outbound message: {}", e),
            }
        }
        let _ = ws_tx.close().await;
    });

    // Reader: one inbound frame at a time, in receipt order.
    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(Message::Text(text)) => dispatch::handle_text(&arena, client_id, &text).await,
            Ok(Message::Binary(_)) => {
                let err = ArenaError::BadCommand("binary frames not supported".to_string());
                arena.send(client_id, err.to_message()).await;
            }
            Ok(Message::Close(_)) => break,
            // Transport-level ping/pong is handled by tungstenite itself.
            Ok(_) => {}
            Err(e) => {
                debug!("Connection error from {}: {}", peer, e);
                break;
            }
        }
    }

    info!("Connection from {} closed", peer);
    Arc::clone(&arena).disconnect(client_id).await;
    let _ = writer.await;
}
