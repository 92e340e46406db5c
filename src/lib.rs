//! Iris - Realtime voice and vision client for multimodal AI assistants
//!
//! Streams microphone audio (and occasional images) over a persistent
//! WebSocket to a remote multimodal model, plays back synthesized speech as
//! it arrives, and surfaces transcript and turn-taking events to the host
//! application.
//!
//! # Architecture
//!
//! ```text
//! mic frames ──▶ Resampler/Encoder ──▶ Event Encoder ──▶ Transport (WS)
//!                                                            │
//!           host app ◀── SessionEvent channel ◀── Session ◀──┤ decode
//!                                                            │
//!           speakers ◀── Playback Reassembler ◀──────────────┘
//! ```
//!
//! The session state machine (`session`) owns the connection and recording
//! lifecycles; audio hardware and the socket are reached only through the
//! `InputDevice`, `OutputSink`, and `Transport` capability traits.

pub mod audio;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod vision;

pub use config::ClientConfig;
pub use error::{Error, Result};
pub use session::{ConnectionState, RealtimeClient, SessionEvent};
