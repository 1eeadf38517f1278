//! WebSocket transport to the live conversational-audio endpoint
//!
//! Speaks the published bidirectional-session contract of the Gemini live
//! API: one `setup` message selects model, voice and system instruction;
//! audio then flows both ways as base64 PCM chunks. The wire protocol
//! itself is treated as opaque: this module only marshals the documented
//! client messages and unmarshals the documented server ones.
//!
//! `connect` returns a handle immediately; dialing, the TLS handshake and
//! setup run in a background task. Frames sent before the server confirms
//! setup queue in the handle's channel and drain once the session is open,
//! so callers never buffer audio themselves. Sends are fire-and-forget:
//! failures surface only through the `on_error` callback.

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

/// Default live endpoint (API key appended as a query parameter)
pub const LIVE_ENDPOINT: &str =
    "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Default native-audio conversational model
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";

/// Role-specific agent configuration applied at setup
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub system_instruction: String,
    pub voice_name: String,
}

/// One transport-encoded audio frame: a format descriptor plus base64 data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaChunk {
    pub mime_type: String,
    pub data: String,
}

/// Events surfaced from server messages
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// Synthesized audio (base64 PCM16 at 24kHz)
    Audio(MediaChunk),
    /// The agent finished its current turn
    TurnComplete,
    /// The agent was cut off by new user speech
    Interrupted,
}

/// Callbacks invoked from the transport task
pub struct LiveCallbacks {
    pub on_open: Box<dyn Fn() + Send>,
    pub on_message: Box<dyn Fn(ServerEvent) + Send>,
    pub on_close: Box<dyn Fn() + Send>,
    pub on_error: Box<dyn Fn(String) + Send>,
}

/// Cloneable sender for outbound audio frames
#[derive(Debug, Clone)]
pub struct LiveInput {
    tx: mpsc::UnboundedSender<MediaChunk>,
}

impl LiveInput {
    /// Queue one frame for the agent. Fire-and-forget: a dead transport
    /// drops the frame silently (its failure already surfaced via
    /// `on_error`).
    pub fn send_realtime_input(&self, chunk: MediaChunk) {
        let _ = self.tx.send(chunk);
    }
}

/// Owned handle to one live connection
pub struct LiveHandle {
    input: LiveInput,
    shutdown: Option<oneshot::Sender<()>>,
}

impl LiveHandle {
    /// Sender usable from capture callbacks (and before the connection
    /// confirms open).
    pub fn sender(&self) -> LiveInput {
        self.input.clone()
    }

    /// Ask the transport task to close the socket and exit. Idempotent.
    pub fn close(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for LiveHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Open a live session. Returns immediately; connection progress arrives
/// through the callbacks (`on_open` once the server confirms setup).
pub fn connect(
    api_key: &str,
    model: &str,
    endpoint: &str,
    config: AgentConfig,
    callbacks: LiveCallbacks,
) -> LiveHandle {
    let (input_tx, input_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let url = format!("{endpoint}?key={api_key}");
    let model = model.to_string();
    tokio::spawn(run_connection(url, model, config, callbacks, input_rx, shutdown_rx));

    LiveHandle {
        input: LiveInput { tx: input_tx },
        shutdown: Some(shutdown_tx),
    }
}

async fn run_connection(
    url: String,
    model: String,
    config: AgentConfig,
    callbacks: LiveCallbacks,
    mut input_rx: mpsc::UnboundedReceiver<MediaChunk>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let request = match url.clone().into_client_request() {
        Ok(request) => request,
        Err(e) => {
            (callbacks.on_error)(format!("invalid endpoint: {e}"));
            return;
        }
    };

    let (mut ws, _response) = match connect_async(request).await {
        Ok(ok) => ok,
        Err(e) => {
            (callbacks.on_error)(format!("connect failed: {e}"));
            return;
        }
    };
    debug!("live transport connected, sending setup");

    let setup = setup_message(&model, &config);
    if let Err(e) = ws.send(Message::Text(setup.into())).await {
        (callbacks.on_error)(format!("setup send failed: {e}"));
        return;
    }

    // Outbound frames are held in the channel until the server confirms
    // setup; inbound processing starts right away.
    let mut open = false;
    let mut input_alive = true;

    loop {
        tokio::select! {
            chunk = input_rx.recv(), if open && input_alive => {
                match chunk {
                    Some(chunk) => {
                        let frame = realtime_input_message(chunk);
                        if let Err(e) = ws.send(Message::Text(frame.into())).await {
                            (callbacks.on_error)(format!("send failed: {e}"));
                            return;
                        }
                    }
                    None => input_alive = false,
                }
            }
            _ = &mut shutdown_rx => {
                let _ = ws.close(None).await;
                (callbacks.on_close)();
                return;
            }
            incoming = ws.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        dispatch(&text, &mut open, &callbacks);
                    }
                    Some(Ok(Message::Binary(data))) => {
                        // The endpoint frames JSON as binary as well
                        match std::str::from_utf8(&data) {
                            Ok(text) => dispatch(text, &mut open, &callbacks),
                            Err(_) => warn!("dropping non-UTF8 binary frame ({} bytes)", data.len()),
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = ws.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!("live transport closed by server: {:?}", frame);
                        (callbacks.on_close)();
                        return;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        (callbacks.on_error)(format!("transport error: {e}"));
                        return;
                    }
                    None => {
                        (callbacks.on_close)();
                        return;
                    }
                }
            }
        }
    }
}

fn dispatch(text: &str, open: &mut bool, callbacks: &LiveCallbacks) {
    let message: ServerMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            debug!("unparsed server frame: {e}");
            return;
        }
    };

    if message.setup_complete.is_some() && !*open {
        *open = true;
        (callbacks.on_open)();
    }

    if let Some(content) = message.server_content {
        if let Some(turn) = content.model_turn {
            for part in turn.parts {
                if let Some(inline) = part.inline_data {
                    (callbacks.on_message)(ServerEvent::Audio(inline));
                }
            }
        }
        if content.interrupted.unwrap_or(false) {
            (callbacks.on_message)(ServerEvent::Interrupted);
        }
        if content.turn_complete.unwrap_or(false) {
            (callbacks.on_message)(ServerEvent::TurnComplete);
        }
    }
}

// ─── Wire messages ───────────────────────────────────────────

fn setup_message(model: &str, config: &AgentConfig) -> String {
    let setup = ClientSetup {
        setup: Setup {
            model: format!("models/{model}"),
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: config.voice_name.clone(),
                        },
                    },
                },
            },
            system_instruction: Content {
                parts: vec![TextPart {
                    text: config.system_instruction.clone(),
                }],
            },
        },
    };
    serde_json::to_string(&setup).unwrap_or_default()
}

fn realtime_input_message(chunk: MediaChunk) -> String {
    let frame = ClientRealtimeInput {
        realtime_input: RealtimeInput {
            media_chunks: vec![chunk],
        },
    };
    serde_json::to_string(&frame).unwrap_or_default()
}

#[derive(Serialize)]
struct ClientSetup {
    setup: Setup,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Setup {
    model: String,
    generation_config: GenerationConfig,
    system_instruction: Content,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
    speech_config: SpeechConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<TextPart>,
}

#[derive(Serialize)]
struct TextPart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientRealtimeInput {
    realtime_input: RealtimeInput,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RealtimeInput {
    media_chunks: Vec<MediaChunk>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerMessage {
    setup_complete: Option<serde_json::Value>,
    server_content: Option<ServerContent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerContent {
    model_turn: Option<ModelTurn>,
    turn_complete: Option<bool>,
    interrupted: Option<bool>,
}

#[derive(Deserialize)]
struct ModelTurn {
    #[serde(default)]
    parts: Vec<ModelPart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelPart {
    inline_data: Option<MediaChunk>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_setup_message_shape() {
        let config = AgentConfig {
            system_instruction: "You are a barista.".to_string(),
            voice_name: "Kore".to_string(),
        };
        let json = setup_message(DEFAULT_MODEL, &config);

        assert!(json.contains(&format!("\"model\":\"models/{DEFAULT_MODEL}\"")));
        assert!(json.contains("\"responseModalities\":[\"AUDIO\"]"));
        assert!(json.contains("\"voiceName\":\"Kore\""));
        assert!(json.contains("\"systemInstruction\""));
        assert!(json.contains("You are a barista."));
    }

    #[test]
    fn test_realtime_input_shape() {
        let chunk = MediaChunk {
            mime_type: "audio/pcm;rate=16000".to_string(),
            data: "AAAA".to_string(),
        };
        let json = realtime_input_message(chunk);

        assert!(json.contains("\"realtimeInput\""));
        assert!(json.contains("\"mediaChunks\""));
        assert!(json.contains("\"mimeType\":\"audio/pcm;rate=16000\""));
        assert!(json.contains("\"data\":\"AAAA\""));
    }

    fn counting_callbacks() -> (LiveCallbacks, Arc<AtomicBool>, Arc<AtomicUsize>) {
        let opened = Arc::new(AtomicBool::new(false));
        let audio_frames = Arc::new(AtomicUsize::new(0));
        let opened_cb = opened.clone();
        let frames_cb = audio_frames.clone();
        let callbacks = LiveCallbacks {
            on_open: Box::new(move || opened_cb.store(true, Ordering::SeqCst)),
            on_message: Box::new(move |event| {
                if matches!(event, ServerEvent::Audio(_)) {
                    frames_cb.fetch_add(1, Ordering::SeqCst);
                }
            }),
            on_close: Box::new(|| {}),
            on_error: Box::new(|_| {}),
        };
        (callbacks, opened, audio_frames)
    }

    #[test]
    fn test_dispatch_setup_complete_opens_once() {
        let (callbacks, opened, _) = counting_callbacks();
        let mut open = false;

        dispatch(r#"{"setupComplete":{}}"#, &mut open, &callbacks);
        assert!(open);
        assert!(opened.load(Ordering::SeqCst));

        opened.store(false, Ordering::SeqCst);
        dispatch(r#"{"setupComplete":{}}"#, &mut open, &callbacks);
        assert!(!opened.load(Ordering::SeqCst), "on_open must fire only once");
    }

    #[test]
    fn test_dispatch_extracts_inline_audio() {
        let (callbacks, _, audio_frames) = counting_callbacks();
        let mut open = true;

        let frame = r#"{
            "serverContent": {
                "modelTurn": {
                    "parts": [
                        {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "AAAA"}},
                        {"text": "transcript fragment"}
                    ]
                }
            }
        }"#;
        dispatch(frame, &mut open, &callbacks);
        assert_eq!(audio_frames.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispatch_ignores_unknown_frames() {
        let (callbacks, opened, audio_frames) = counting_callbacks();
        let mut open = false;

        dispatch(r#"{"usageMetadata":{"totalTokenCount":5}}"#, &mut open, &callbacks);
        dispatch("not json", &mut open, &callbacks);
        assert!(!open);
        assert!(!opened.load(Ordering::SeqCst));
        assert_eq!(audio_frames.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_handle_queues_frames_before_open() {
        // A handle must accept sends immediately even though nothing is
        // draining the channel yet.
        let (input_tx, mut input_rx) = mpsc::unbounded_channel();
        let input = LiveInput { tx: input_tx };

        for _ in 0..3 {
            input.send_realtime_input(MediaChunk {
                mime_type: "audio/pcm;rate=16000".to_string(),
                data: "AAAA".to_string(),
            });
        }

        let mut queued = 0;
        while input_rx.try_recv().is_ok() {
            queued += 1;
        }
        assert_eq!(queued, 3);
    }

    #[tokio::test]
    async fn test_connect_reports_dial_failure() {
        let (error_tx, mut error_rx) = mpsc::unbounded_channel();
        let callbacks = LiveCallbacks {
            on_open: Box::new(|| {}),
            on_message: Box::new(|_| {}),
            on_close: Box::new(|| {}),
            on_error: Box::new(move |e| {
                let _ = error_tx.send(e);
            }),
        };
        let config = AgentConfig {
            system_instruction: String::new(),
            voice_name: "Kore".to_string(),
        };

        // Nothing listens on this port; the dial must fail through on_error.
        let _handle = connect("test-key", DEFAULT_MODEL, "ws://127.0.0.1:9", config, callbacks);
        let error = tokio::time::timeout(std::time::Duration::from_secs(10), error_rx.recv())
            .await
            .expect("expected an error callback")
            .expect("error channel closed");
        assert!(error.contains("connect failed"), "unexpected error: {error}");
    }
}
