//! Audio playback sink via cpal
//!
//! Scheduled blocks drain back-to-back from a shared sample queue; the
//! output callback zero-fills on underrun instead of stalling the device.

use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleRate;

use crate::config::OUTPUT_SAMPLE_RATE;
use crate::{Error, Result};

/// Push-based output stream accepting scheduled PCM blocks.
///
/// Blocks play in enqueue order with no re-ordering or drop.
pub trait OutputSink: Send {
    /// Ensure the output device is running. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns error if the output stream cannot be opened
    fn start(&mut self) -> Result<()>;

    /// Schedule one block of mono i16 samples for gapless playback
    fn enqueue(&mut self, block: Vec<i16>);

    /// Stop playback and release the output stream, discarding queued audio
    fn stop(&mut self);
}

/// Default-host speaker output at the wire rate
pub struct SpeakerSink {
    queue: Arc<Mutex<VecDeque<i16>>>,
    worker: Option<SinkWorker>,
}

struct SinkWorker {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl SpeakerSink {
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            worker: None,
        }
    }
}

impl Default for SpeakerSink {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputSink for SpeakerSink {
    fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }

        let queue = Arc::clone(&self.queue);
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        // cpal streams are not Send; the stream lives on its own thread
        let handle = std::thread::Builder::new()
            .name("iris-playback".to_string())
            .spawn(move || match build_output_stream(&queue) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    let _ = stop_rx.recv();
                    drop(stream);
                    tracing::debug!("audio playback stopped");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })?;

        ready_rx
            .recv()
            .map_err(|_| Error::Audio("playback thread exited before ready".to_string()))??;

        self.worker = Some(SinkWorker { stop_tx, handle });
        Ok(())
    }

    fn enqueue(&mut self, block: Vec<i16>) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.extend(block);
        }
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
            let _ = worker.handle.join();
        }
        if let Ok(mut queue) = self.queue.lock() {
            queue.clear();
        }
    }
}

impl Drop for SpeakerSink {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Open the default output stream fed from the shared sample queue
fn build_output_stream(queue: &Arc<Mutex<VecDeque<i16>>>) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

    let supported = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(OUTPUT_SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(OUTPUT_SAMPLE_RATE)
        })
        .or_else(|| {
            // Fallback: stereo, mono fanned out
            device.supported_output_configs().ok()?.find(|c| {
                c.channels() == 2
                    && c.min_sample_rate() <= SampleRate(OUTPUT_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(OUTPUT_SAMPLE_RATE)
            })
        })
        .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

    let config = supported.with_sample_rate(SampleRate(OUTPUT_SAMPLE_RATE)).config();
    let channels = config.channels as usize;

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate = OUTPUT_SAMPLE_RATE,
        channels,
        "audio playback started"
    );

    let queue = Arc::clone(queue);
    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let Ok(mut queue) = queue.lock() else {
                    data.fill(0.0);
                    return;
                };
                for frame in data.chunks_mut(channels) {
                    let sample = queue
                        .pop_front()
                        .map_or(0.0, |s| f32::from(s) / 32768.0);
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                }
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;
    Ok(stream)
}
