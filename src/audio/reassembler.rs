//! Playback reassembler
//!
//! Absorbs arrival jitter of streamed audio chunks and schedules them for
//! gapless output. Each response turn accumulates a short prebuffer before
//! the first flush, then streams subsequent chunks individually.

use crate::audio::frame::WireAudioChunk;
use crate::audio::playback::OutputSink;

/// Turn-local reassembly state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// No turn in progress
    Idle,
    /// Accumulating chunks until the prebuffer threshold
    Prebuffering,
    /// Steady state: chunks scheduled immediately
    Streaming,
}

/// Reassembles streamed audio chunks into scheduled playback blocks.
///
/// At most one playback turn is open at a time; a chunk arriving after a
/// finished turn starts a fresh one.
pub struct PlaybackReassembler {
    sink: Box<dyn OutputSink>,
    threshold: usize,
    state: TurnState,
    pending: Vec<i16>,
    chunks_buffered: usize,
}

impl PlaybackReassembler {
    /// `threshold` is the chunk count that triggers the prebuffer flush.
    /// Lower values start audio sooner but risk audible gaps if chunks
    /// arrive slower than playback consumes them.
    #[must_use]
    pub fn new(sink: Box<dyn OutputSink>, threshold: usize) -> Self {
        Self {
            sink,
            threshold: threshold.max(1),
            state: TurnState::Idle,
            pending: Vec::new(),
            chunks_buffered: 0,
        }
    }

    /// Current turn state
    #[must_use]
    pub const fn state(&self) -> TurnState {
        self.state
    }

    /// Handle one inbound audio chunk (raw PCM16 LE bytes)
    pub fn push(&mut self, pcm: &[u8]) {
        let samples = WireAudioChunk(pcm.to_vec()).to_samples();

        if self.state == TurnState::Idle {
            if let Err(e) = self.sink.start() {
                tracing::warn!(error = %e, "output sink failed to start");
            }
            self.pending.clear();
            self.chunks_buffered = 0;
            self.state = TurnState::Prebuffering;
        }

        if self.state == TurnState::Streaming {
            self.sink.enqueue(samples);
            return;
        }

        self.pending.extend(samples);
        self.chunks_buffered += 1;
        if self.chunks_buffered >= self.threshold {
            self.flush_pending();
            self.state = TurnState::Streaming;
        }
    }

    /// Handle end-of-turn: flush any unreached prebuffer and return to idle
    pub fn finish(&mut self) {
        if !self.pending.is_empty() {
            self.flush_pending();
        }
        self.chunks_buffered = 0;
        self.state = TurnState::Idle;
    }

    /// Tear down: discard turn state and silence in-flight scheduling
    pub fn reset(&mut self) {
        self.pending.clear();
        self.chunks_buffered = 0;
        self.state = TurnState::Idle;
        self.sink.stop();
    }

    fn flush_pending(&mut self) {
        let block = std::mem::take(&mut self.pending);
        tracing::debug!(samples = block.len(), chunks = self.chunks_buffered, "playback flush");
        self.sink.enqueue(block);
    }
}
