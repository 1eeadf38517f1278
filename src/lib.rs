//! Woosh Live - WOOSH CAFE voice assistant
//!
//! A native client for real-time voice conversations with the café's
//! cloud agent:
//! - Two role personas: guest "barista" and operator "COO"
//! - Microphone capture, PCM16 wire encoding, base64 transport
//! - Gapless playback scheduling for synthesized speech
//! - Menu catalog embedded as agent context
//!
//! # Example
//!
//! ```ignore
//! use woosh_live::live::{LiveSession, Role, SessionOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut session = LiveSession::open(Role::Guest, SessionOptions::default()).await?;
//!     // ... consume session events, then:
//!     session.close();
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod credentials;
pub mod live;
pub mod menu;
