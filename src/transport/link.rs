//! WebSocket link driving a [`Server`].
//!
//! [`connect`] opens the socket, attaches to the server, and spawns a tokio
//! task that handles:
//!
//! - Inbound text frames → [`Server::handle_message`]
//! - Outbound [`LinkCommand`]s → socket writes
//! - Socket loss → [`Server::handle_disconnect_if`], scoped to the link
//!   generation the loop was spawned for

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, trace};

use crate::error::{Error, Result};

use super::server::{LinkCommand, Server};

// ============================================================================
// Connect
// ============================================================================

/// Opens a WebSocket to `server` and spawns its event loop.
///
/// # Errors
///
/// - [`Error::ConnectionTimeout`] if the handshake does not finish in time
/// - [`Error::WebSocket`] if the handshake fails
pub async fn connect(server: &Server, connect_timeout: Duration) -> Result<JoinHandle<()>> {
    let url = server.url().as_str();

    let (ws_stream, _) = timeout(connect_timeout, tokio_tungstenite::connect_async(url))
        .await
        .map_err(|_| Error::connection_timeout(connect_timeout.as_millis() as u64))??;

    info!(url, "WebSocket connection established");

    Ok(spawn(server.clone(), ws_stream))
}

/// Attaches `server` to an established stream and spawns the event loop.
pub fn spawn<S>(server: Server, ws_stream: WebSocketStream<S>) -> JoinHandle<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (epoch, commands) = server.attach_link();
    tokio::spawn(run_event_loop(server, epoch, ws_stream, commands))
}

// ============================================================================
// Event Loop
// ============================================================================

/// Event loop that handles WebSocket I/O for one server.
async fn run_event_loop<S>(
    server: Server,
    epoch: u64,
    ws_stream: WebSocketStream<S>,
    mut commands: mpsc::UnboundedReceiver<LinkCommand>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut ws_write, mut ws_read) = ws_stream.split();

    loop {
        tokio::select! {
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        server.handle_message(&text);
                    }

                    Some(Ok(Message::Close(_))) => {
                        debug!(url = %server.url(), "WebSocket closed by server");
                        break;
                    }

                    Some(Err(e)) => {
                        error!(url = %server.url(), error = %e, "WebSocket error");
                        break;
                    }

                    None => {
                        debug!(url = %server.url(), "WebSocket stream ended");
                        break;
                    }

                    // Ignore Binary, Ping, Pong
                    _ => {}
                }
            }

            command = commands.recv() => {
                match command {
                    Some(LinkCommand::Frame(text)) => {
                        trace!(url = %server.url(), bytes = text.len(), "Writing frame");
                        if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                            error!(url = %server.url(), error = %e, "Failed to write frame");
                            break;
                        }
                    }

                    Some(LinkCommand::Shutdown) => {
                        debug!(url = %server.url(), "Shutdown command received");
                        let _ = ws_write.close().await;
                        break;
                    }

                    None => {
                        debug!(url = %server.url(), "Command channel closed");
                        break;
                    }
                }
            }
        }
    }

    server.handle_disconnect_if(epoch);

    info!(url = %server.url(), epoch, "Server link terminated");
}

// ============================================================================
// Tests
// ============================================================================
