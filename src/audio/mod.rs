//! Audio pipeline
//!
//! Capture, wire-format encoding, and reassembled playback. Hardware access
//! goes through the [`InputDevice`] and [`OutputSink`] traits so the session
//! stays testable without audio devices.

mod capture;
mod encoder;
mod frame;
mod playback;
mod reassembler;

pub use capture::{FrameHandler, InputDevice, MicInput};
pub use encoder::AudioEncoder;
pub use frame::{AudioFrame, NativeFormat, SampleData, SampleFormat, WireAudioChunk};
pub use playback::{OutputSink, SpeakerSink};
pub use reassembler::{PlaybackReassembler, TurnState};
