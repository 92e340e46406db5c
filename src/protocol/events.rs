//! Typed client and server events
//!
//! Wire format is a flat JSON object `{event_id, type, ...payload}` with
//! binary payloads base64-encoded; see `codec` for the framing.

use serde::{Deserialize, Serialize};

use crate::audio::WireAudioChunk;
use crate::config::ClientConfig;

/// Client-to-server events
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Negotiate session modalities, formats, voice, and VAD parameters
    SessionUpdate(SessionDescription),
    /// Append one encoded audio chunk to the input buffer
    AudioAppend(WireAudioChunk),
    /// Commit the input audio buffer as a completed user turn
    AudioCommit,
    /// Append one JPEG image to the input image buffer
    ImageAppend(Vec<u8>),
    /// Request a model response
    ResponseCreate,
}

impl ClientEvent {
    /// Protocol name carried in the `type` field
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SessionUpdate(_) => "session.update",
            Self::AudioAppend(_) => "input_audio_buffer.append",
            Self::AudioCommit => "input_audio_buffer.commit",
            Self::ImageAppend(_) => "input_image_buffer.append",
            Self::ResponseCreate => "response.create",
        }
    }
}

/// `session.update` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDescription {
    pub modalities: Vec<String>,
    pub voice: String,
    pub input_audio_format: String,
    pub output_audio_format: String,
    pub smooth_output: bool,
    pub instructions: String,
    pub turn_detection: TurnDetection,
}

/// Server-side VAD negotiation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: String,
    pub threshold: f32,
    pub silence_duration_ms: u32,
}

impl SessionDescription {
    /// Build the negotiation payload from client configuration
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            modalities: vec!["text".to_string(), "audio".to_string()],
            voice: config.voice.clone(),
            input_audio_format: "pcm16".to_string(),
            output_audio_format: "pcm24".to_string(),
            smooth_output: config.smooth_output,
            instructions: config.instructions.clone(),
            turn_detection: TurnDetection {
                kind: "server_vad".to_string(),
                threshold: config.turn_detection.threshold,
                silence_duration_ms: config.turn_detection.silence_duration_ms,
            },
        }
    }
}

/// Server-to-client events. Unknown or malformed frames decode to no event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    SessionCreated,
    SessionUpdated,
    SpeechStarted,
    SpeechStopped,
    Committed,
    ResponseCreated,
    ResponseDone,
    /// Incremental assistant transcript text
    TranscriptDelta(String),
    /// Final assistant transcript text
    TranscriptDone(String),
    /// Decoded PCM16 audio bytes
    AudioDelta(Vec<u8>),
    AudioDone,
    ItemCreated,
    /// Completed transcription of the user's speech
    UserTranscriptCompleted(String),
    /// Server-reported error, surfaced verbatim
    Error(String),
}
