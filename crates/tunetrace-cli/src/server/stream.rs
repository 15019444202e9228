//! Streaming match socket
//!
//! Each connection owns its own session. Frames are handled in arrival
//! order; while a chunk is being matched the socket is still read so that a
//! close cancels the in-flight work. At most `MAX_PENDING_FRAMES` frames are
//! held back that way; past that the socket is left unread until the chunk
//! finishes.

use super::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::collections::VecDeque;
use tunetrace_core::{ClientMessage, ServerMessage, StreamingSession};

/// Frames buffered while a chunk is in flight
pub const MAX_PENDING_FRAMES: usize = 8;

pub async fn stream_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut session =
        StreamingSession::new(state.matcher.clone(), state.config.clone(), &state.session);
    let mut pending: VecDeque<Message> = VecDeque::with_capacity(MAX_PENDING_FRAMES);
    log::info!("Stream session opened");

    loop {
        let message = match pending.pop_front() {
            Some(message) => message,
            None => match receiver.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    log::warn!("Stream socket error: {}", e);
                    break;
                }
                None => break,
            },
        };

        let reply = match message {
            Message::Text(text) => session.handle_text(text.as_str()).await,
            Message::Binary(bytes) => {
                let work = session.handle(ClientMessage::Chunk(bytes.to_vec()));
                tokio::pin!(work);
                let outcome = loop {
                    tokio::select! {
                        reply = &mut work => break Some(reply),
                        incoming = receiver.next(), if pending.len() < MAX_PENDING_FRAMES => {
                            match incoming {
                                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break None,
                                Some(Ok(other)) => pending.push_back(other),
                            }
                        }
                    }
                };
                match outcome {
                    Some(reply) => reply,
                    None => {
                        log::info!("Stream closed during a chunk, dropping its result");
                        break;
                    }
                }
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        if let Some(reply) = reply {
            if let Err(e) = send(&mut sender, &reply).await {
                log::debug!("Stream reply not delivered: {}", e);
                break;
            }
        }
    }

    log::info!(
        "Stream session closed after {} chunks",
        session.chunks_processed()
    );
}

async fn send<S>(sender: &mut S, reply: &ServerMessage) -> Result<(), axum::Error>
where
    S: futures::Sink<Message, Error = axum::Error> + Unpin,
{
    sender.send(Message::Text(reply.to_json().into())).await
}
