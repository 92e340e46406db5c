//! Audio frame value types

use std::time::Instant;

/// Sample layout of a native audio frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// 32-bit float samples in [-1.0, 1.0]
    F32,
    /// 16-bit signed integer samples
    I16,
}

/// Audio format as reported by the input device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeFormat {
    /// Hardware sample rate in Hz
    pub sample_rate: u32,
    /// Interleaved channel count
    pub channels: u16,
    /// Sample representation
    pub sample_format: SampleFormat,
}

/// Interleaved sample payload of a captured frame
#[derive(Debug, Clone)]
pub enum SampleData {
    F32(Vec<f32>),
    I16(Vec<i16>),
}

impl SampleData {
    /// Number of interleaved samples (not frames)
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::F32(v) => v.len(),
            Self::I16(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A batch of samples handed off by the capture callback.
///
/// Ephemeral: consumed immediately by the encoder, never stored.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Interleaved samples
    pub data: SampleData,
    /// Declared sample rate in Hz
    pub sample_rate: u32,
    /// Declared channel count
    pub channels: u16,
    /// Monotonic capture timestamp
    pub captured_at: Instant,
}

impl AudioFrame {
    /// Frames (samples per channel) contained in this batch
    #[must_use]
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.data.len() / self.channels as usize
    }
}

/// A contiguous buffer of mono int16 little-endian PCM at the wire rate.
///
/// Owned exclusively by whichever stage currently holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireAudioChunk(pub Vec<u8>);

impl WireAudioChunk {
    /// Number of 16-bit samples in the chunk
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.0.len() / 2
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode the chunk back into i16 samples (little-endian)
    #[must_use]
    pub fn to_samples(&self) -> Vec<i16> {
        self.0
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect()
    }

    /// Encode i16 samples as little-endian bytes
    #[must_use]
    pub fn from_samples(samples: &[i16]) -> Self {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for s in samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        Self(bytes)
    }
}
