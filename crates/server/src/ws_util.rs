//! Forwarding of patch streams over WebSockets with server-side keep-alive.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, Stream, StreamExt, TryStreamExt};
use tokio::time::{Instant, MissedTickBehavior, interval};
use utils::stream_msg::StreamMsg;

#[derive(Debug, Clone)]
pub struct WsKeepAlive {
    /// Interval between server-initiated ping frames.
    pub ping_interval: Duration,
    /// Connection is dropped when no pong arrived for this long.
    pub pong_timeout: Duration,
}

impl Default for WsKeepAlive {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(90),
        }
    }
}

impl WsKeepAlive {
    /// Boards are open while the user is dragging cards around; dead
    /// sockets should be noticed quickly.
    pub fn for_board_streams() -> Self {
        Self {
            ping_interval: Duration::from_secs(15),
            pong_timeout: Duration::from_secs(60),
        }
    }

    /// The notification feed stays open for the whole session.
    pub fn for_feed_streams() -> Self {
        Self::default()
    }
}

/// Send every [`StreamMsg`] as a text frame until the stream ends or the
/// client goes away.
pub async fn forward_stream_msgs<S>(
    socket: WebSocket,
    stream: S,
    keep_alive: WsKeepAlive,
) -> anyhow::Result<()>
where
    S: Stream<Item = Result<StreamMsg, std::io::Error>> + Unpin,
{
    let frames = stream.map_ok(|msg| msg.to_ws_message_unchecked());
    run_ws_stream(socket, frames, keep_alive).await
}

/// Pump `data_stream` into the socket while answering pings, sending our own
/// and closing on pong timeout.
pub async fn run_ws_stream<S, E>(
    socket: WebSocket,
    mut data_stream: S,
    keep_alive: WsKeepAlive,
) -> anyhow::Result<()>
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display + Send + Sync + 'static,
{
    let (mut sender, mut receiver) = socket.split();

    let mut ping_interval = interval(keep_alive.ping_interval);
    ping_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut last_pong = Instant::now();

    loop {
        tokio::select! {
            item = data_stream.next() => {
                match item {
                    Some(Ok(msg)) => {
                        if sender.send(msg).await.is_err() {
                            tracing::debug!("client disconnected during send");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "stream error");
                        break;
                    }
                    None => {
                        tracing::debug!("data stream ended");
                        break;
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::debug!("client sent close frame");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(?e, "websocket receive error");
                        break;
                    }
                    None => {
                        tracing::debug!("websocket stream ended");
                        break;
                    }
                    // clients only listen
                    _ => {}
                }
            }

            _ = ping_interval.tick() => {
                if last_pong.elapsed() > keep_alive.pong_timeout {
                    tracing::warn!(
                        elapsed_secs = last_pong.elapsed().as_secs(),
                        "WebSocket pong timeout, closing connection"
                    );
                    break;
                }

                if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                    tracing::debug!("failed to send ping, client disconnected");
                    break;
                }
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;

    Ok(())
}
