//! Client configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Wire sample rate for outbound microphone audio (PCM16 mono)
pub const INPUT_SAMPLE_RATE: u32 = 24_000;

/// Wire sample rate for inbound synthesized audio
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

/// Native sample rates below this are treated as a hardware fault
pub const MIN_NATIVE_SAMPLE_RATE: u32 = 8_000;

/// Realtime client configuration
///
/// Every field carries a serde default so partial TOML files work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket endpoint, e.g. `wss://api.example.com/v1/realtime`
    pub endpoint: String,

    /// Bearer credential sent on the upgrade request
    pub api_key: String,

    /// Model variant selected via the `?model=` query parameter
    pub model: String,

    /// Synthesized voice name
    pub voice: String,

    /// Session instructions forwarded verbatim in `session.update`
    pub instructions: String,

    /// Ask the server to smooth synthesized output
    pub smooth_output: bool,

    /// Server-side voice activity detection tuning
    pub turn_detection: TurnDetectionConfig,

    /// Chunks accumulated before the first playback flush (jitter guard)
    pub prebuffer_chunks: usize,

    /// JPEG re-compression quality for image sends, 1-100
    pub image_quality: u8,

    /// Delay between transport open and the `session.update` send
    pub negotiation_delay_ms: u64,

    /// Surface hardware format faults as error events instead of only
    /// logging them
    pub report_audio_faults: bool,
}

/// Server VAD parameters for end-of-turn detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnDetectionConfig {
    /// Energy threshold, 0.0 - 1.0
    pub threshold: f32,

    /// Trailing silence that ends a turn
    pub silence_duration_ms: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "wss://localhost:8765/v1/realtime".to_string(),
            api_key: String::new(),
            model: "default".to_string(),
            voice: "alloy".to_string(),
            instructions: String::new(),
            smooth_output: true,
            turn_detection: TurnDetectionConfig::default(),
            prebuffer_chunks: 3,
            image_quality: 45,
            negotiation_delay_ms: 500,
            report_audio_faults: true,
        }
    }
}

impl Default for TurnDetectionConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            silence_duration_ms: 600,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Validate fields that have no usable fallback
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint is empty or the quality is out of range
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(Error::Config("endpoint must not be empty".to_string()));
        }
        if self.image_quality == 0 || self.image_quality > 100 {
            return Err(Error::Config(format!(
                "image_quality must be 1-100, got {}",
                self.image_quality
            )));
        }
        if self.prebuffer_chunks == 0 {
            return Err(Error::Config(
                "prebuffer_chunks must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
