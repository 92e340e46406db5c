//! Wire codec properties

use std::collections::HashSet;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use iris_realtime::ClientConfig;
use iris_realtime::audio::WireAudioChunk;
use iris_realtime::protocol::{ClientEvent, EventEncoder, ServerEvent, SessionDescription, decode};

mod common;

#[test]
fn event_ids_are_unique_across_sends() {
    let encoder = EventEncoder::new();
    let mut seen = HashSet::new();
    for _ in 0..100 {
        let text = encoder.encode(&ClientEvent::ResponseCreate).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let id = value["event_id"].as_str().unwrap().to_string();
        assert!(seen.insert(id), "duplicate event id");
    }
    assert_eq!(seen.len(), 100);
}

#[test]
fn session_update_carries_negotiation_payload() {
    let mut config = ClientConfig::default();
    config.voice = "sage".to_string();
    config.instructions = "be brief".to_string();
    config.turn_detection.threshold = 0.7;
    config.turn_detection.silence_duration_ms = 450;

    let encoder = EventEncoder::new();
    let event = ClientEvent::SessionUpdate(SessionDescription::from_config(&config));
    let text = encoder.encode(&event).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();

    assert_eq!(value["type"], "session.update");
    let session = &value["session"];
    assert_eq!(session["modalities"], serde_json::json!(["text", "audio"]));
    assert_eq!(session["voice"], "sage");
    assert_eq!(session["input_audio_format"], "pcm16");
    assert_eq!(session["output_audio_format"], "pcm24");
    assert_eq!(session["instructions"], "be brief");
    assert_eq!(session["turn_detection"]["type"], "server_vad");
    assert_eq!(session["turn_detection"]["silence_duration_ms"], 450);
}

#[test]
fn audio_append_round_trips_pcm() {
    let samples: Vec<i16> = vec![0, 1000, -1000, i16::MAX, i16::MIN];
    let chunk = WireAudioChunk::from_samples(&samples);

    let encoder = EventEncoder::new();
    let text = encoder.encode(&ClientEvent::AudioAppend(chunk)).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();

    assert_eq!(value["type"], "input_audio_buffer.append");
    let decoded = BASE64.decode(value["audio"].as_str().unwrap()).unwrap();
    assert_eq!(WireAudioChunk(decoded).to_samples(), samples);
}

#[test]
fn image_append_embeds_base64_jpeg() {
    let jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
    let encoder = EventEncoder::new();
    let text = encoder.encode(&ClientEvent::ImageAppend(jpeg.clone())).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();

    assert_eq!(value["type"], "input_image_buffer.append");
    let decoded = BASE64.decode(value["image"].as_str().unwrap()).unwrap();
    assert_eq!(decoded, jpeg);
}

#[test]
fn known_server_types_decode() {
    let cases = [
        (r#"{"type":"session.created"}"#, ServerEvent::SessionCreated),
        (r#"{"type":"session.updated"}"#, ServerEvent::SessionUpdated),
        (
            r#"{"type":"input_audio_buffer.speech_started"}"#,
            ServerEvent::SpeechStarted,
        ),
        (
            r#"{"type":"input_audio_buffer.speech_stopped"}"#,
            ServerEvent::SpeechStopped,
        ),
        (
            r#"{"type":"input_audio_buffer.committed"}"#,
            ServerEvent::Committed,
        ),
        (r#"{"type":"response.created"}"#, ServerEvent::ResponseCreated),
        (r#"{"type":"response.done"}"#, ServerEvent::ResponseDone),
        (
            r#"{"type":"response.audio_transcript.delta","delta":"hel"}"#,
            ServerEvent::TranscriptDelta("hel".to_string()),
        ),
        (
            r#"{"type":"response.audio_transcript.done","text":"hello"}"#,
            ServerEvent::TranscriptDone("hello".to_string()),
        ),
        (r#"{"type":"response.audio.done"}"#, ServerEvent::AudioDone),
        (
            r#"{"type":"conversation.item.created"}"#,
            ServerEvent::ItemCreated,
        ),
        (
            r#"{"type":"conversation.item.input_audio_transcription.completed","transcript":"hi"}"#,
            ServerEvent::UserTranscriptCompleted("hi".to_string()),
        ),
        (
            r#"{"type":"error","error":{"message":"boom"}}"#,
            ServerEvent::Error("boom".to_string()),
        ),
    ];
    for (wire, expected) in cases {
        assert_eq!(decode(wire).as_ref(), Some(&expected), "frame: {wire}");
    }
}

#[test]
fn unknown_and_malformed_frames_yield_no_event() {
    assert_eq!(decode(r#"{"type":"response.video.delta","delta":"x"}"#), None);
    assert_eq!(decode(r#"{"delta":"no type field"}"#), None);
    assert_eq!(decode("not json at all"), None);
    assert_eq!(decode(r#"[1,2,3]"#), None);
    // known type with a missing required field is dropped, not fatal
    assert_eq!(decode(r#"{"type":"response.audio_transcript.delta"}"#), None);
}

#[test]
fn config_defaults_round_trip_through_toml() {
    let config = common::test_config();
    let text = toml::to_string(&config).unwrap();
    let parsed: ClientConfig = toml::from_str(&text).unwrap();
    assert_eq!(parsed.prebuffer_chunks, 3);
    assert_eq!(parsed.instructions, "test");
    assert_eq!(parsed.turn_detection.silence_duration_ms, config.turn_detection.silence_duration_ms);

    // partial files work because every field has a default
    let partial: ClientConfig = toml::from_str(r#"voice = "sage""#).unwrap();
    assert_eq!(partial.voice, "sage");
    assert_eq!(partial.prebuffer_chunks, 3);
}
