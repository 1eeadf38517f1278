//! Live voice session pipeline
//!
//! Everything needed for one end-to-end voice conversation with the café
//! agent:
//!
//! ```text
//! Microphone → CaptureEncoder → ───────┐
//!                                      │ base64 PCM16 over WebSocket
//! Speaker ← PlaybackScheduler ← ───────┘
//!                   │
//!             VisualizerFeed (cosmetic)
//! ```
//!
//! `LiveSession` owns the whole lifecycle: credential check, microphone
//! acquisition, transport connection, playback teardown.

pub mod capture;
pub mod pcm;
pub mod persona;
pub mod playback;
pub mod session;
pub mod transport;
pub mod visualizer;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Sample rate for microphone capture sent to the agent
pub const INPUT_SAMPLE_RATE: u32 = 16_000;

/// Sample rate of synthesized audio received from the agent
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

/// Samples per outbound capture block (~256ms at 16kHz)
pub const CAPTURE_BLOCK_SIZE: usize = 4096;

/// Mean-absolute volume below which a capture block leaves the visualizer alone
pub const VOLUME_THRESHOLD: f32 = 0.01;

/// Format descriptor attached to every outbound audio frame
pub const CAPTURE_MIME: &str = "audio/pcm;rate=16000";

pub use persona::Role;
pub use session::{LiveSession, SessionError, SessionEvent, SessionOptions, SessionStatus};

/// Cancellation token handed to every asynchronous continuation of a session.
///
/// Each callback checks the token before touching shared state, so nothing
/// mutates the session or schedules audio after teardown.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());

        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_block_cadence() {
        // One block should cover roughly a quarter second of speech
        let secs = CAPTURE_BLOCK_SIZE as f64 / INPUT_SAMPLE_RATE as f64;
        assert!(secs > 0.2 && secs < 0.3);
    }
}
