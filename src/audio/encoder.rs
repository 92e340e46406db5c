//! Resampler/Encoder: native-format frames -> wire-format PCM chunks
//!
//! Converts whatever the hardware reports (arbitrary rate, channel count,
//! f32 or i16 samples) into mono 16-bit little-endian PCM at the fixed wire
//! rate. Rate conversion is true resampling via rubato's FFT resampler; a
//! matching native rate degrades to a direct clamped cast.

use rubato::{FftFixedIn, Resampler};

use crate::audio::frame::{AudioFrame, NativeFormat, SampleData, WireAudioChunk};
use crate::config::MIN_NATIVE_SAMPLE_RATE;
use crate::{Error, Result};

/// Input chunk size fed to the FFT resampler
const RESAMPLER_CHUNK: usize = 1024;

/// FFT sub-chunk count
const RESAMPLER_SUB_CHUNKS: usize = 2;

/// Converts native [`AudioFrame`]s into [`WireAudioChunk`]s.
///
/// Owns one converter instance for a single native format; re-create it when
/// the device format changes. Performs no I/O.
pub struct AudioEncoder {
    native: NativeFormat,
    target_rate: u32,
    /// None when the native rate already matches the wire rate
    resampler: Option<FftFixedIn<f32>>,
    /// Initial filter delay of the resampler, in output frames
    delay: usize,
}

impl AudioEncoder {
    /// Create an encoder for one native format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AudioFormat`] when the reported rate is zero or
    /// below the hardware-fault floor, or the channel count is zero.
    pub fn new(native: NativeFormat, target_rate: u32) -> Result<Self> {
        if native.sample_rate < MIN_NATIVE_SAMPLE_RATE {
            return Err(Error::AudioFormat(format!(
                "native sample rate {} Hz is below the {} Hz floor",
                native.sample_rate, MIN_NATIVE_SAMPLE_RATE
            )));
        }
        if native.channels == 0 {
            return Err(Error::AudioFormat(
                "native format reports zero channels".to_string(),
            ));
        }

        let (resampler, delay) = if native.sample_rate == target_rate {
            (None, 0)
        } else {
            let inner = FftFixedIn::<f32>::new(
                native.sample_rate as usize,
                target_rate as usize,
                RESAMPLER_CHUNK,
                RESAMPLER_SUB_CHUNKS,
                1,
            )
            .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;
            let delay = inner.output_delay();
            (Some(inner), delay)
        };

        tracing::debug!(
            native_rate = native.sample_rate,
            channels = native.channels,
            target_rate,
            resampling = resampler.is_some(),
            "audio encoder created"
        );

        Ok(Self {
            native,
            target_rate,
            resampler,
            delay,
        })
    }

    /// Native format this encoder was built for
    #[must_use]
    pub const fn native_format(&self) -> NativeFormat {
        self.native
    }

    /// Convert one captured frame into a wire chunk.
    ///
    /// Output length is `round(input_frames * target_rate / native_rate)`
    /// samples.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AudioFormat`] if the frame's declared format does
    /// not match the format this encoder was created for.
    pub fn encode(&mut self, frame: &AudioFrame) -> Result<WireAudioChunk> {
        if frame.sample_rate != self.native.sample_rate || frame.channels != self.native.channels {
            return Err(Error::AudioFormat(format!(
                "frame format {} Hz x{} does not match encoder format {} Hz x{}",
                frame.sample_rate, frame.channels, self.native.sample_rate, self.native.channels
            )));
        }

        // mono i16 at the wire rate is already wire format
        if self.resampler.is_none() && self.native.channels == 1 {
            if let SampleData::I16(v) = &frame.data {
                return Ok(WireAudioChunk::from_samples(v));
            }
        }

        let mono = downmix(&frame.data, self.native.channels);
        if mono.is_empty() {
            return Ok(WireAudioChunk(Vec::new()));
        }

        let ratio = self.resample_ratio();
        let samples = match self.resampler.as_mut() {
            None => mono,
            Some(inner) => resample(inner, &mono, self.delay, ratio),
        };

        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for s in samples {
            bytes.extend_from_slice(&clamp_to_i16(s).to_le_bytes());
        }
        Ok(WireAudioChunk(bytes))
    }

    fn resample_ratio(&self) -> f64 {
        f64::from(self.target_rate) / f64::from(self.native.sample_rate)
    }
}

/// Resample one frame's worth of mono samples to exactly
/// `round(input * ratio)` output frames.
///
/// The resampler is reset per frame, fed in fixed chunks (the tail zero
/// padded), then fed silence until the filter delay plus the expected output
/// has drained; the delay prefix is discarded and the tail trimmed.
fn resample(inner: &mut FftFixedIn<f32>, mono: &[f32], delay: usize, ratio: f64) -> Vec<f32> {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let expected = (mono.len() as f64 * ratio).round() as usize;

    inner.reset();
    let mut collected: Vec<f32> = Vec::with_capacity(expected + delay + RESAMPLER_CHUNK);

    let mut chunk = vec![0.0f32; RESAMPLER_CHUNK];
    let mut offset = 0;
    while collected.len() < delay + expected {
        let remaining = mono.len().saturating_sub(offset);
        let take = remaining.min(RESAMPLER_CHUNK);
        chunk[..take].copy_from_slice(&mono[offset..offset + take]);
        chunk[take..].fill(0.0);
        offset += take;

        match inner.process(&[&chunk], None) {
            Ok(out) => collected.extend_from_slice(&out[0]),
            Err(e) => {
                tracing::warn!(error = %e, "resampler process failed, dropping frame");
                return Vec::new();
            }
        }
    }

    collected[delay..delay + expected].to_vec()
}

/// Average interleaved channels down to mono f32
fn downmix(data: &SampleData, channels: u16) -> Vec<f32> {
    let ch = channels as usize;
    match data {
        SampleData::F32(v) => {
            if ch == 1 {
                v.clone()
            } else {
                v.chunks_exact(ch)
                    .map(|frame| frame.iter().sum::<f32>() / ch as f32)
                    .collect()
            }
        }
        SampleData::I16(v) => v
            .chunks_exact(ch)
            .map(|frame| {
                let sum: f32 = frame.iter().map(|&s| f32::from(s) / 32768.0).sum();
                sum / ch as f32
            })
            .collect(),
    }
}

/// Clamp to [-1.0, 1.0] and scale to i16
#[allow(clippy::cast_possible_truncation)]
fn clamp_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0) as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn frame(samples: Vec<f32>, rate: u32, channels: u16) -> AudioFrame {
        AudioFrame {
            data: SampleData::F32(samples),
            sample_rate: rate,
            channels,
            captured_at: Instant::now(),
        }
    }

    #[test]
    fn equal_rate_is_direct_cast() {
        let native = NativeFormat {
            sample_rate: 24_000,
            channels: 1,
            sample_format: crate::audio::SampleFormat::F32,
        };
        let mut enc = AudioEncoder::new(native, 24_000).unwrap();
        let chunk = enc.encode(&frame(vec![0.0, 0.5, -0.5, 2.0], 24_000, 1)).unwrap();
        let samples = chunk.to_samples();
        assert_eq!(samples, vec![0, 16383, -16383, 32767]);
    }

    #[test]
    fn rejects_sub_floor_rate() {
        let native = NativeFormat {
            sample_rate: 4_000,
            channels: 1,
            sample_format: crate::audio::SampleFormat::F32,
        };
        assert!(matches!(
            AudioEncoder::new(native, 24_000),
            Err(Error::AudioFormat(_))
        ));
    }

    #[test]
    fn rejects_zero_rate() {
        let native = NativeFormat {
            sample_rate: 0,
            channels: 1,
            sample_format: crate::audio::SampleFormat::F32,
        };
        assert!(matches!(
            AudioEncoder::new(native, 24_000),
            Err(Error::AudioFormat(_))
        ));
    }

    #[test]
    fn stereo_downmix_halves_sample_count() {
        let native = NativeFormat {
            sample_rate: 24_000,
            channels: 2,
            sample_format: crate::audio::SampleFormat::F32,
        };
        let mut enc = AudioEncoder::new(native, 24_000).unwrap();
        let chunk = enc.encode(&frame(vec![0.5, -0.5, 1.0, 1.0], 24_000, 2)).unwrap();
        let samples = chunk.to_samples();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0], 0);
        assert_eq!(samples[1], 32767);
    }
}
