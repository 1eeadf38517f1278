//! Session lifecycle controller
//!
//! `LiveSession` owns everything one voice conversation needs: the
//! credential check, the microphone, the playback sink, the transport
//! connection and the cancel token that keeps late callbacks from touching
//! state after teardown. Setup runs credential check, then microphone, then
//! playback, then transport; a failure at any stage never leaves a partial
//! session running.
//!
//! Status machine:
//!
//! ```text
//! Connecting ──→ Connected
//!      │             │
//!      ├──→ Error ←──┤      (terminal, no reconnect)
//!      └──→ Closed ←─┘      (terminal)
//! ```

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::credentials;
use crate::live::persona::Role;
use crate::live::playback::PlaybackScheduler;
use crate::live::transport;
use crate::live::visualizer::VisualizerFeed;
use crate::live::CancelToken;

/// Why a session could not start or continue
#[derive(Debug, Error)]
pub enum SessionError {
    /// No API key in the environment, keyring or fallback file
    #[error("API key missing; set GEMINI_API_KEY or run `woosh-live config --set-api-key`")]
    MissingCredential,
    /// Microphone absent or unusable at setup
    #[error("microphone unavailable: {0}")]
    MicrophoneUnavailable(String),
    /// Speaker output could not be opened at setup
    #[error("audio playback unavailable: {0}")]
    PlaybackUnavailable(String),
    /// The transport failed after setup
    #[error("transport error: {0}")]
    Transport(String),
}

/// Coarse connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Connecting,
    Connected,
    Error,
    Closed,
}

impl SessionStatus {
    /// Terminal statuses never transition again; a new session must be
    /// opened instead.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Error | SessionStatus::Closed)
    }
}

/// Events surfaced to the host UI
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Status(SessionStatus),
    AgentTurnComplete,
    AgentInterrupted,
}

/// Knobs for opening a session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub model: String,
    pub endpoint: String,
    /// Explicit credential; `None` resolves from env/keyring/file
    pub api_key: Option<String>,
    /// Override the serialized menu context (tests pass trimmed fixtures)
    pub menu_context: Option<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            model: transport::DEFAULT_MODEL.to_string(),
            endpoint: transport::LIVE_ENDPOINT.to_string(),
            api_key: None,
            menu_context: None,
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            model: config.live.model.clone(),
            endpoint: config.live.endpoint.clone(),
            ..Self::default()
        }
    }
}

/// Shared status cell: the single place transitions happen, so terminal
/// states stay terminal no matter which callback fires last.
#[derive(Clone)]
struct StatusCell {
    status: Arc<Mutex<SessionStatus>>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl StatusCell {
    fn new(events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            status: Arc::new(Mutex::new(SessionStatus::Connecting)),
            events,
        }
    }

    fn get(&self) -> SessionStatus {
        self.status
            .lock()
            .map(|s| *s)
            .unwrap_or(SessionStatus::Error)
    }

    fn advance(&self, next: SessionStatus) {
        let mut current = match self.status.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if current.is_terminal() || *current == next {
            return;
        }
        debug!("session status {:?} -> {:?}", *current, next);
        *current = next;
        let _ = self.events.send(SessionEvent::Status(next));
    }
}

/// One end-to-end voice conversation with the café agent
pub struct LiveSession {
    role: Role,
    cell: StatusCell,
    events_rx: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    cancel: CancelToken,
    handle: Option<transport::LiveHandle>,
    scheduler: Arc<PlaybackScheduler>,
    visualizer: VisualizerFeed,
    #[cfg(feature = "voice")]
    capture: Option<crate::live::capture::CaptureEncoder>,
}

impl LiveSession {
    /// Open a session for `role`.
    ///
    /// Fails fast, in order: missing credential (before any device is
    /// touched), unusable microphone, unusable speaker output. Once `Ok` is
    /// returned the connection continues in the background; watch the event
    /// channel for `Connected`, `Error` or `Closed`.
    #[cfg(feature = "voice")]
    pub async fn open(role: Role, options: SessionOptions) -> Result<LiveSession, SessionError> {
        use crate::live::capture::{CaptureConfig, CaptureEncoder};
        use crate::live::playback::RodioSink;
        use crate::live::transport::ServerEvent;
        use std::sync::atomic::{AtomicBool, Ordering};
        use tracing::error;

        let api_key = match &options.api_key {
            Some(key) => key.clone(),
            None => credentials::resolve_api_key().ok_or(SessionError::MissingCredential)?,
        };

        let mut capture = CaptureEncoder::open(CaptureConfig::default())
            .map_err(|e| SessionError::MicrophoneUnavailable(e.to_string()))?;

        let sink =
            RodioSink::spawn().map_err(|e| SessionError::PlaybackUnavailable(e.to_string()))?;

        let menu_context = options
            .menu_context
            .clone()
            .unwrap_or_else(crate::menu::menu_context);
        let agent = transport::AgentConfig {
            system_instruction: role.system_instruction(&menu_context),
            voice_name: role.voice_name().to_string(),
        };

        let cancel = CancelToken::new();
        let visualizer = VisualizerFeed::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let cell = StatusCell::new(events_tx);
        let scheduler = Arc::new(PlaybackScheduler::new(
            Arc::new(sink),
            visualizer.clone(),
            cancel.clone(),
        ));

        // Capture blocks start flowing only once the server confirms setup
        let transport_open = Arc::new(AtomicBool::new(false));

        let callbacks = {
            let open_cancel = cancel.clone();
            let open_cell = cell.clone();
            let open_flag = transport_open.clone();
            let msg_cancel = cancel.clone();
            let msg_cell = cell.clone();
            let msg_scheduler = scheduler.clone();
            let close_cancel = cancel.clone();
            let close_cell = cell.clone();
            let err_cancel = cancel.clone();
            let err_cell = cell.clone();

            transport::LiveCallbacks {
                on_open: Box::new(move || {
                    if open_cancel.is_cancelled() {
                        return;
                    }
                    open_flag.store(true, Ordering::SeqCst);
                    open_cell.advance(SessionStatus::Connected);
                }),
                on_message: Box::new(move |event| {
                    if msg_cancel.is_cancelled() {
                        return;
                    }
                    match event {
                        ServerEvent::Audio(chunk) => msg_scheduler.handle_frame(&chunk.data),
                        ServerEvent::TurnComplete => {
                            let _ = msg_cell.events.send(SessionEvent::AgentTurnComplete);
                        }
                        ServerEvent::Interrupted => {
                            let _ = msg_cell.events.send(SessionEvent::AgentInterrupted);
                        }
                    }
                }),
                on_close: Box::new(move || {
                    if close_cancel.is_cancelled() {
                        return;
                    }
                    close_cell.advance(SessionStatus::Closed);
                }),
                on_error: Box::new(move |message| {
                    if err_cancel.is_cancelled() {
                        return;
                    }
                    error!("live transport error: {message}");
                    err_cell.advance(SessionStatus::Error);
                }),
            }
        };

        info!(
            "opening live session as {} (voice {})",
            role.display_name(),
            role.voice_name()
        );
        let handle = transport::connect(
            &api_key,
            &options.model,
            &options.endpoint,
            agent,
            callbacks,
        );

        let fatal_cell = cell.clone();
        capture
            .start(
                handle.sender(),
                visualizer.clone(),
                transport_open,
                cancel.clone(),
                move |message| {
                    error!("capture failed: {message}");
                    fatal_cell.advance(SessionStatus::Error);
                },
            )
            .map_err(|e| SessionError::MicrophoneUnavailable(e.to_string()))?;

        Ok(LiveSession {
            role,
            cell,
            events_rx: Some(events_rx),
            cancel,
            handle: Some(handle),
            scheduler,
            visualizer,
            capture: Some(capture),
        })
    }

    /// Open a session (stub for builds without the `voice` feature).
    ///
    /// The credential check still runs first so callers observe the same
    /// failure ordering as the full build.
    #[cfg(not(feature = "voice"))]
    pub async fn open(_role: Role, options: SessionOptions) -> Result<LiveSession, SessionError> {
        if options.api_key.is_none() && credentials::resolve_api_key().is_none() {
            return Err(SessionError::MissingCredential);
        }
        Err(SessionError::MicrophoneUnavailable(
            "built without the 'voice' feature".to_string(),
        ))
    }

    /// Current status snapshot
    pub fn status(&self) -> SessionStatus {
        self.cell.get()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Cosmetic activity feed for rendering
    pub fn visualizer(&self) -> VisualizerFeed {
        self.visualizer.clone()
    }

    /// Take the event receiver (available once)
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        self.events_rx.take()
    }

    /// Number of playback buffers scheduled or playing
    pub fn active_sources(&self) -> usize {
        self.scheduler.active_sources()
    }

    /// Tear the session down: cancel all continuations, stop the
    /// microphone, close the transport and forcibly stop every in-flight
    /// playback source. Runs on every exit path (`Drop` calls it too) and
    /// is safe to call repeatedly.
    pub fn close(&mut self) {
        if self.cancel.is_cancelled() && self.handle.is_none() {
            return;
        }
        info!("closing live session");
        self.cancel.cancel();

        #[cfg(feature = "voice")]
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }

        if let Some(mut handle) = self.handle.take() {
            handle.close();
        }

        self.scheduler.stop_all();

        // Transport callbacks are suppressed by the cancel token now, so
        // record the terminal state ourselves.
        self.cell.advance(SessionStatus::Closed);
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!SessionStatus::Connecting.is_terminal());
        assert!(!SessionStatus::Connected.is_terminal());
        assert!(SessionStatus::Error.is_terminal());
        assert!(SessionStatus::Closed.is_terminal());
    }

    #[test]
    fn test_status_cell_advances_and_notifies() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cell = StatusCell::new(tx);
        assert_eq!(cell.get(), SessionStatus::Connecting);

        cell.advance(SessionStatus::Connected);
        assert_eq!(cell.get(), SessionStatus::Connected);
        assert!(matches!(
            rx.try_recv(),
            Ok(SessionEvent::Status(SessionStatus::Connected))
        ));
    }

    #[test]
    fn test_status_cell_terminal_is_sticky() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cell = StatusCell::new(tx);

        cell.advance(SessionStatus::Error);
        let _ = rx.try_recv();

        // A late close callback must not resurrect the session
        cell.advance(SessionStatus::Closed);
        cell.advance(SessionStatus::Connected);
        assert_eq!(cell.get(), SessionStatus::Error);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_status_cell_dedupes_repeats() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cell = StatusCell::new(tx);

        cell.advance(SessionStatus::Connected);
        cell.advance(SessionStatus::Connected);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_default_options() {
        let options = SessionOptions::default();
        assert_eq!(options.model, transport::DEFAULT_MODEL);
        assert_eq!(options.endpoint, transport::LIVE_ENDPOINT);
        assert!(options.api_key.is_none());
        assert!(options.menu_context.is_none());
    }

    #[test]
    fn test_session_error_messages() {
        assert!(SessionError::MissingCredential
            .to_string()
            .contains("GEMINI_API_KEY"));
        let error = SessionError::MicrophoneUnavailable("no device".to_string());
        assert!(error.to_string().contains("no device"));
    }
}
