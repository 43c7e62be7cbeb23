//! Interview session state machine.
//!
//! Owns the capture backend, playback pipeline, transcript assembler and
//! the connection handle, and is the only place phase transitions happen.
//! Every entry point validates the current phase before acting, so a late
//! event after a close request can never resurrect a finished session.

use crate::audio::capture::CaptureBackend;
use crate::audio::playback::{AudioSink, PlaybackPipeline};
use crate::error::{Result, SessionError};
use crate::live::client::{LiveCommand, LiveEvent, LiveHandle};
use crate::live::messages::{ServerContent, SetupMessage};
use crate::session::config::InterviewConfig;
use crate::session::report::{FeedbackAnalyzer, FeedbackReport};
use crate::session::stats::SessionStats;
use crate::transcript::{InterviewTurn, Speaker, TranscriptAssembler};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Session phase. `Report` and `Error` are terminal; a new session
/// starts over from `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Connecting,
    Live,
    Processing,
    Report,
    Error,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Connecting => "connecting",
            Phase::Live => "live",
            Phase::Processing => "processing",
            Phase::Report => "report",
            Phase::Error => "error",
        };
        f.write_str(name)
    }
}

/// Produces a connection handle for a session setup.
///
/// The production implementation dials the websocket endpoint; tests
/// substitute scripted actors.
#[async_trait]
pub trait LiveConnector: Send + Sync {
    async fn connect(&self, setup: SetupMessage) -> Result<LiveHandle>;
}

/// Connector against the real live endpoint.
pub struct WsConnector {
    pub url: String,
}

#[async_trait]
impl LiveConnector for WsConnector {
    async fn connect(&self, setup: SetupMessage) -> Result<LiveHandle> {
        crate::live::client::LiveClient::connect(&self.url, setup).await
    }
}

/// Top-level controller for one interview session.
pub struct InterviewController<S: AudioSink> {
    config: InterviewConfig,
    phase: Phase,
    started_at: DateTime<Utc>,
    assembler: TranscriptAssembler,
    playback: PlaybackPipeline<S>,
    capture: Box<dyn CaptureBackend>,
    live: Option<LiveHandle>,
    forward_task: Option<JoinHandle<()>>,
    close_requested: bool,
    torn_down: bool,
    error: Option<SessionError>,
    report: Option<FeedbackReport>,
}

impl<S: AudioSink> InterviewController<S> {
    pub fn new(config: InterviewConfig, capture: Box<dyn CaptureBackend>, sink: S) -> Self {
        Self {
            config,
            phase: Phase::Idle,
            started_at: Utc::now(),
            assembler: TranscriptAssembler::new(),
            playback: PlaybackPipeline::new(sink),
            capture,
            live: None,
            forward_task: None,
            close_requested: false,
            torn_down: false,
            error: None,
            report: None,
        }
    }

    /// Start the session: request the microphone, dial the connection,
    /// and begin forwarding captured frames.
    ///
    /// `idle -> connecting`; the `Open` event moves it to `live`.
    pub async fn start(&mut self, connector: &dyn LiveConnector) -> Result<()> {
        if self.phase != Phase::Idle {
            warn!("start ignored in phase {}", self.phase);
            return Ok(());
        }

        info!("Starting interview session {}", self.config.session_id);
        self.phase = Phase::Connecting;
        self.started_at = Utc::now();

        // Microphone first: permission denial must fail the attempt
        // before anything touches the network.
        let mut frames = match self.capture.start().await {
            Ok(frames) => frames,
            Err(e) => {
                self.fail(e.clone()).await;
                return Err(e);
            }
        };

        let setup = SetupMessage::new(
            &self.config.model,
            &self.config.voice,
            &self.config.system_instruction(),
        );
        let handle = match connector.connect(setup).await {
            Ok(handle) => handle,
            Err(e) => {
                self.fail(e.clone()).await;
                return Err(e);
            }
        };

        // Frames flow into the actor's command channel as soon as the
        // handle exists; the actor holds them until the session is open.
        let commands = handle.command_sender();
        self.forward_task = Some(tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                if commands.send(LiveCommand::Audio(frame)).await.is_err() {
                    // Actor gone; the controller handles the Closed event.
                    break;
                }
            }
        }));
        self.live = Some(handle);

        Ok(())
    }

    /// Next connection event, for the driver loop. Resolves to `None`
    /// once the connection is gone.
    pub async fn next_event(&mut self) -> Option<LiveEvent> {
        match &mut self.live {
            Some(handle) => handle.events.recv().await,
            None => None,
        }
    }

    /// Single dispatch point for connection events.
    pub async fn handle_event(&mut self, event: LiveEvent) {
        match event {
            LiveEvent::Open => self.on_open(),
            LiveEvent::Content(content) => self.on_content(content),
            LiveEvent::Error(message) => {
                self.fail(SessionError::transport(message)).await;
            }
            LiveEvent::Closed => self.on_closed().await,
        }
    }

    fn on_open(&mut self) {
        if self.phase != Phase::Connecting {
            warn!("Open event ignored in phase {}", self.phase);
            return;
        }
        info!("Interview session is live");
        self.phase = Phase::Live;
    }

    fn on_content(&mut self, content: ServerContent) {
        if self.phase != Phase::Live {
            debug!("Content ignored in phase {}", self.phase);
            return;
        }

        // A single message can carry any combination of these.
        if let Some(t) = &content.input_transcription {
            self.assembler.push(Speaker::User, &t.text);
        }
        if let Some(t) = &content.output_transcription {
            self.assembler.push(Speaker::Model, &t.text);
        }

        if content.is_interrupted() {
            debug!("Barge-in: discarding pending playback");
            self.playback.interrupt();
        }

        for chunk in content.audio_chunks() {
            if let Err(e) = self.playback.enqueue(&chunk) {
                // Playback trouble alone does not end the session.
                error!("Failed to schedule audio chunk: {}", e);
            }
        }

        if content.is_turn_complete() {
            self.assembler.turn_complete();
        }
    }

    async fn on_closed(&mut self) {
        if self.close_requested {
            debug!("Connection closed after local close request");
            return;
        }
        match self.phase {
            // An unrequested close while the conversation is underway is
            // a transport failure, never a silent return to idle.
            Phase::Connecting | Phase::Live => {
                self.fail(SessionError::transport(
                    "Connection closed unexpectedly during the interview",
                ))
                .await;
            }
            _ => debug!("Close event ignored in phase {}", self.phase),
        }
    }

    /// Explicit user finish: `live -> processing -> report` (or `error`).
    pub async fn finish(&mut self, analyzer: &dyn FeedbackAnalyzer) -> Result<()> {
        if self.phase != Phase::Live {
            warn!("finish ignored in phase {}", self.phase);
            return Ok(());
        }

        info!("Finishing interview session {}", self.config.session_id);
        self.phase = Phase::Processing;
        self.teardown().await;

        // Keep partial speech from an interrupted final exchange.
        self.assembler.flush();

        if self.assembler.is_empty() {
            let e = SessionError::empty_transcript(
                "No conversation was recorded; nothing to analyze",
            );
            self.error = Some(e.clone());
            self.phase = Phase::Error;
            return Err(e);
        }
        if !self.assembler.has_user_turn() {
            let e = SessionError::empty_transcript(
                "No answers from you were recorded; nothing to analyze",
            );
            self.error = Some(e.clone());
            self.phase = Phase::Error;
            return Err(e);
        }

        match analyzer
            .analyze(&self.config.role, self.assembler.turns())
            .await
        {
            Ok(report) => {
                info!("Feedback report ready (overall {})", report.overall);
                self.report = Some(report);
                self.phase = Phase::Report;
                Ok(())
            }
            Err(e) => {
                error!("Feedback analysis failed: {}", e);
                self.error = Some(e.clone());
                self.phase = Phase::Error;
                Err(e)
            }
        }
    }

    /// Fatal failure from any phase: tear down, then land in `error`.
    pub async fn fail(&mut self, err: SessionError) {
        error!("Session failed: {}", err);
        self.teardown().await;
        self.error = Some(err);
        self.phase = Phase::Error;
    }

    /// Release everything, in dependency order: stop feeding the
    /// connection, silence playback, then close the connection itself.
    /// Safe to call any number of times.
    pub async fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        if let Err(e) = self.capture.stop().await {
            warn!("Capture stop failed during teardown: {}", e);
        }
        if let Some(task) = self.forward_task.take() {
            task.abort();
        }

        self.playback.reset();

        if let Some(handle) = &self.live {
            self.close_requested = true;
            handle.close().await;
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn transcript(&self) -> &[InterviewTurn] {
        self.assembler.turns()
    }

    /// Unflushed text for live display.
    pub fn in_progress(&self, speaker: Speaker) -> &str {
        self.assembler.in_progress(speaker)
    }

    pub fn is_model_speaking(&mut self) -> bool {
        self.playback.is_speaking()
    }

    pub fn report(&self) -> Option<&FeedbackReport> {
        self.report.as_ref()
    }

    pub fn error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    pub fn stats(&self) -> SessionStats {
        let duration = Utc::now().signed_duration_since(self.started_at);
        SessionStats {
            phase: self.phase,
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            turn_count: self.assembler.turns().len(),
            is_capturing: self.capture.is_capturing(),
        }
    }
}
