//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::sim::{InboundEvent, OutboundEvent, SimError, SimulationHandle};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Direct replies waiting for the writer task
const REPLY_BUFFER: usize = 16;

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Player id chosen by the client
    pub player: Uuid,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    info!(player_id = %query.player, "WebSocket upgrade");
    ws.on_upgrade(move |socket| handle_socket(socket, query.player, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, player_id: Uuid, state: AppState) {
    info!(player_id = %player_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    let welcome = ServerMsg::Welcome {
        player_id,
        server_time: unix_millis(),
        tick: state.sim.status().tick,
    };
    if let Err(e) = send_json(&mut ws_sink, &welcome).await {
        error!(player_id = %player_id, error = %e, "Failed to send welcome");
        return;
    }

    run_session(player_id, ws_sink, ws_stream, state.sim.clone()).await;

    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    player_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    sim: SimulationHandle,
) {
    let rate_limiter = ConnectionRateLimiter::new();
    let mut events_rx = sim.subscribe();
    let (reply_tx, mut reply_rx) = mpsc::channel::<ServerMsg>(REPLY_BUFFER);

    // Spawn writer task: simulation events and direct replies -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            let result = tokio::select! {
                event = events_rx.recv() => match event {
                    Ok(event) => send_json::<OutboundEvent>(&mut ws_sink, &event).await,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(
                            player_id = %player_id,
                            lagged_count = n,
                            "Client lagged, skipping {} events", n
                        );
                        Ok(())
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(player_id = %player_id, "Event channel closed");
                        break;
                    }
                },
                reply = reply_rx.recv() => match reply {
                    Some(msg) => send_json(&mut ws_sink, &msg).await,
                    None => break,
                },
            };

            if let Err(e) = result {
                debug!(player_id = %player_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> simulation
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_message() {
                    warn!(player_id = %player_id, "Rate limited client message");
                    continue;
                }

                let client_msg = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(player_id = %player_id, error = %e, "Failed to parse client message");
                        let _ = reply_tx
                            .send(ServerMsg::Error {
                                code: "bad_message".to_string(),
                                message: e.to_string(),
                            })
                            .await;
                        continue;
                    }
                };

                if let ClientMsg::Ping { t } = client_msg {
                    let _ = reply_tx
                        .send(ServerMsg::Pong {
                            t,
                            server_time: unix_millis(),
                        })
                        .await;
                    continue;
                }

                let Some(event) = client_msg.into_event(player_id) else {
                    continue;
                };
                match sim.send(event) {
                    Ok(()) => {}
                    Err(SimError::QueueFull) => {
                        warn!(player_id = %player_id, "Simulation queue full, dropping message");
                    }
                    Err(SimError::Closed) => {
                        debug!(player_id = %player_id, "Simulation closed");
                        break;
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(player_id = %player_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(player_id = %player_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Signal disconnect to the simulation, waiting for room if needed
    let _ = sim
        .events
        .send(InboundEvent::PlayerLeft { player: player_id })
        .await;

    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_json<T: Serialize>(
    sink: &mut SplitSink<WebSocket, Message>,
    msg: &T,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
