//! Connection actor for the live-audio session.
//!
//! The socket is owned by exactly one spawned task. Everyone else talks
//! to it through a command channel (audio out, close) and listens on an
//! event channel (open, content, error, closed), so no component outside
//! this module ever touches the transport directly.

use crate::audio::capture::AudioFrame;
use crate::audio::pcm;
use crate::error::{Result, SessionError};
use crate::live::messages::{RealtimeInputMessage, ServerContent, ServerMessage, SetupMessage};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, info, warn};

/// Commands accepted by the connection actor.
#[derive(Debug)]
pub enum LiveCommand {
    /// Transmit one captured audio frame (fire-and-forget)
    Audio(AudioFrame),
    /// Close the connection
    Close,
}

/// Events emitted by the connection actor.
#[derive(Debug)]
pub enum LiveEvent {
    /// The remote session acknowledged setup and is ready for audio
    Open,
    /// Server-driven content (transcriptions, audio, turn/interrupt signals)
    Content(ServerContent),
    /// Transport-level failure; terminal, a `Closed` follows
    Error(String),
    /// The connection is gone (local close, remote close, or after error)
    Closed,
}

/// Handle to a running connection actor.
pub struct LiveHandle {
    commands: mpsc::Sender<LiveCommand>,
    pub events: mpsc::Receiver<LiveEvent>,
}

impl LiveHandle {
    /// Build a handle from raw channels. Production code gets one from
    /// [`LiveClient::connect`]; tests wire their own actor double.
    pub fn from_channels(
        commands: mpsc::Sender<LiveCommand>,
        events: mpsc::Receiver<LiveEvent>,
    ) -> Self {
        Self { commands, events }
    }

    /// Sender half for the capture forwarding task.
    pub fn command_sender(&self) -> mpsc::Sender<LiveCommand> {
        self.commands.clone()
    }

    /// Request connection close. Idempotent: closing an already-dead
    /// actor is a no-op.
    pub async fn close(&self) {
        let _ = self.commands.send(LiveCommand::Close).await;
    }
}

/// Connects and spawns the connection actor.
pub struct LiveClient;

impl LiveClient {
    /// Open the duplex connection and send the session setup.
    ///
    /// Resolves once the socket handshake completes; the `Open` event on
    /// the returned handle fires when the server acknowledges setup.
    /// Audio sent before that is held by the actor and flushed on open;
    /// a close request takes effect at any point.
    pub async fn connect(url: &str, setup: SetupMessage) -> Result<LiveHandle> {
        info!("Connecting to live session endpoint");

        let (mut ws, _response) = connect_async(url)
            .await
            .map_err(|e| SessionError::transport(format!("Connection failed: {}", e)))?;

        let setup_json = serde_json::to_string(&setup)
            .map_err(|e| SessionError::transport(format!("Failed to encode setup: {}", e)))?;
        ws.send(Message::Text(setup_json.into()))
            .await
            .map_err(|e| SessionError::transport(format!("Failed to send setup: {}", e)))?;

        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (event_tx, event_rx) = mpsc::channel(256);

        tokio::spawn(run_actor(ws, cmd_rx, event_tx));

        Ok(LiveHandle::from_channels(cmd_tx, event_rx))
    }
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// The actor loop: sole owner of the socket until it dies.
async fn run_actor(
    mut ws: WsStream,
    mut commands: mpsc::Receiver<LiveCommand>,
    events: mpsc::Sender<LiveEvent>,
) {
    // Audio arriving before the server acknowledges setup is held
    // locally and flushed the moment the session opens. Close is acted
    // on immediately in every state, including while still connecting.
    let mut open = false;
    let mut held: Vec<AudioFrame> = Vec::new();

    loop {
        tokio::select! {
            incoming = ws.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let was_open = open;
                        if !handle_server_payload(text.as_bytes(), &mut open, &events).await {
                            break;
                        }
                        if open && !was_open && !flush_held(&mut ws, &mut held, &events).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        let was_open = open;
                        if !handle_server_payload(&bytes, &mut open, &events).await {
                            break;
                        }
                        if open && !was_open && !flush_held(&mut ws, &mut held, &events).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!("Server closed the session: {:?}", frame);
                        break;
                    }
                    Some(Ok(_)) => {
                        // Ping/pong handled by the library.
                    }
                    Some(Err(e)) => {
                        error!("Live session transport error: {}", e);
                        let _ = events.send(LiveEvent::Error(e.to_string())).await;
                        break;
                    }
                    None => {
                        warn!("Live session stream ended");
                        break;
                    }
                }
            }

            command = commands.recv() => {
                match command {
                    Some(LiveCommand::Audio(frame)) if !open => {
                        held.push(frame);
                    }
                    Some(LiveCommand::Audio(frame)) => {
                        if !send_audio(&mut ws, &frame, &events).await {
                            break;
                        }
                    }
                    Some(LiveCommand::Close) | None => {
                        info!("Closing live session");
                        let _ = ws.close(None).await;
                        break;
                    }
                }
            }
        }
    }

    let _ = events.send(LiveEvent::Closed).await;
}

/// Encode and transmit one captured frame. Returns false when the
/// socket write fails and the actor should stop.
async fn send_audio(
    ws: &mut WsStream,
    frame: &AudioFrame,
    events: &mpsc::Sender<LiveEvent>,
) -> bool {
    let payload = RealtimeInputMessage::audio(&pcm::encode_frame(&frame.samples));
    let json = match serde_json::to_string(&payload) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to encode audio frame: {}", e);
            return true;
        }
    };
    if let Err(e) = ws.send(Message::Text(json.into())).await {
        error!("Failed to send audio frame: {}", e);
        let _ = events.send(LiveEvent::Error(e.to_string())).await;
        return false;
    }
    true
}

/// Drain frames captured while the session was still opening, in
/// arrival order.
async fn flush_held(
    ws: &mut WsStream,
    held: &mut Vec<AudioFrame>,
    events: &mpsc::Sender<LiveEvent>,
) -> bool {
    for frame in held.drain(..) {
        if !send_audio(ws, &frame, events).await {
            return false;
        }
    }
    true
}

/// Parse one server payload and forward its events. Returns false when
/// the actor should stop (event receiver gone).
async fn handle_server_payload(
    payload: &[u8],
    open: &mut bool,
    events: &mpsc::Sender<LiveEvent>,
) -> bool {
    let message: ServerMessage = match serde_json::from_slice(payload) {
        Ok(message) => message,
        Err(e) => {
            warn!("Unparseable server message ({} bytes): {}", payload.len(), e);
            return true;
        }
    };

    if message.setup_complete.is_some() && !*open {
        *open = true;
        info!("Live session is open");
        if events.send(LiveEvent::Open).await.is_err() {
            return false;
        }
    }

    if let Some(content) = message.server_content {
        if events.send(LiveEvent::Content(content)).await.is_err() {
            return false;
        }
    }

    true
}
