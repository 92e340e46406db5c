//! Wire framing: event encoding with monotonic ids, tolerant decoding

use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Map, Value, json};

use crate::protocol::events::{ClientEvent, ServerEvent};

/// Serializes client events with per-client unique, monotonically increasing
/// event identifiers.
///
/// The counter lives for the client's whole lifetime, so identifiers are
/// never reused across reconnects.
pub struct EventEncoder {
    counter: AtomicU64,
}

impl EventEncoder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// Next opaque event identifier
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("evt_{n}")
    }

    /// Encode one event to wire text.
    ///
    /// Returns `None` if the serializer cannot represent the payload; the
    /// event is then silently dropped (logged at debug).
    #[must_use]
    pub fn encode(&self, event: &ClientEvent) -> Option<String> {
        let mut obj = Map::new();
        obj.insert("event_id".to_string(), json!(self.next_id()));
        obj.insert("type".to_string(), json!(event.kind()));

        match event {
            ClientEvent::SessionUpdate(session) => {
                let payload = match serde_json::to_value(session) {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::debug!(error = %e, "dropping unrepresentable session.update");
                        return None;
                    }
                };
                obj.insert("session".to_string(), payload);
            }
            ClientEvent::AudioAppend(chunk) => {
                obj.insert("audio".to_string(), json!(BASE64.encode(&chunk.0)));
            }
            ClientEvent::ImageAppend(jpeg) => {
                obj.insert("image".to_string(), json!(BASE64.encode(jpeg)));
            }
            ClientEvent::AudioCommit | ClientEvent::ResponseCreate => {}
        }

        match serde_json::to_string(&Value::Object(obj)) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::debug!(error = %e, kind = event.kind(), "dropping unserializable event");
                None
            }
        }
    }
}

impl Default for EventEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode one server frame.
///
/// Malformed JSON, a missing or unrecognized `type`, and undecodable audio
/// payloads all yield `None` (dropped, not an error) so the client stays
/// forward-compatible with new server event types.
#[must_use]
pub fn decode(wire_text: &str) -> Option<ServerEvent> {
    let value: Value = serde_json::from_str(wire_text).ok()?;
    let kind = value.get("type")?.as_str()?;

    let event = match kind {
        "session.created" => ServerEvent::SessionCreated,
        "session.updated" => ServerEvent::SessionUpdated,
        "input_audio_buffer.speech_started" => ServerEvent::SpeechStarted,
        "input_audio_buffer.speech_stopped" => ServerEvent::SpeechStopped,
        "input_audio_buffer.committed" => ServerEvent::Committed,
        "response.created" => ServerEvent::ResponseCreated,
        "response.done" => ServerEvent::ResponseDone,
        "response.audio_transcript.delta" => {
            ServerEvent::TranscriptDelta(text_field(&value, "delta")?)
        }
        "response.audio_transcript.done" => ServerEvent::TranscriptDone(text_field(&value, "text")?),
        "response.audio.delta" => {
            let encoded = text_field(&value, "delta")?;
            let bytes = BASE64.decode(encoded).ok()?;
            ServerEvent::AudioDelta(bytes)
        }
        "response.audio.done" => ServerEvent::AudioDone,
        "conversation.item.created" => ServerEvent::ItemCreated,
        "conversation.item.input_audio_transcription.completed" => {
            ServerEvent::UserTranscriptCompleted(text_field(&value, "transcript")?)
        }
        "error" => {
            let message = value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("unknown server error")
                .to_string();
            ServerEvent::Error(message)
        }
        _ => {
            tracing::trace!(kind, "ignoring unrecognized server event");
            return None;
        }
    };

    Some(event)
}

fn text_field(value: &Value, field: &str) -> Option<String> {
    Some(value.get(field)?.as_str()?.to_string())
}
