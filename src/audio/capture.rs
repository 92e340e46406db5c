//! Microphone capture via cpal
//!
//! The cpal stream is not `Send`, so it lives on a dedicated capture thread;
//! the handle exposed to the session is.

use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Instant;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::audio::frame::{AudioFrame, NativeFormat, SampleData, SampleFormat};
use crate::{Error, Result};

/// Callback invoked from the realtime capture context for each input block.
///
/// Must do minimal, non-blocking work.
pub type FrameHandler = Box<dyn FnMut(AudioFrame) + Send + 'static>;

/// Pull-based input stream of native-format frames
pub trait InputDevice: Send {
    /// Query the device's native format
    ///
    /// # Errors
    ///
    /// Returns error if no device is available or its format is unsupported
    fn native_format(&self) -> Result<NativeFormat>;

    /// Start delivering frames to `handler`. A second call while running is
    /// a no-op.
    ///
    /// # Errors
    ///
    /// Returns error if the stream cannot be opened
    fn start(&mut self, handler: FrameHandler) -> Result<()>;

    /// Stop delivering frames. A call while stopped is a no-op.
    fn stop(&mut self);

    /// Whether a capture stream is currently running
    fn is_running(&self) -> bool;
}

/// Default-host microphone input
pub struct MicInput {
    worker: Option<CaptureWorker>,
}

struct CaptureWorker {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl MicInput {
    #[must_use]
    pub const fn new() -> Self {
        Self { worker: None }
    }
}

impl Default for MicInput {
    fn default() -> Self {
        Self::new()
    }
}

impl InputDevice for MicInput {
    fn native_format(&self) -> Result<NativeFormat> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;
        let config = device
            .default_input_config()
            .map_err(|e| Error::Audio(e.to_string()))?;

        let sample_format = match config.sample_format() {
            cpal::SampleFormat::F32 => SampleFormat::F32,
            cpal::SampleFormat::I16 => SampleFormat::I16,
            other => {
                return Err(Error::AudioFormat(format!(
                    "unsupported sample format {other:?}"
                )));
            }
        };

        Ok(NativeFormat {
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
            sample_format,
        })
    }

    fn start(&mut self, handler: FrameHandler) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }

        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = std::thread::Builder::new()
            .name("iris-capture".to_string())
            .spawn(move || match build_capture_stream(handler) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    // Keep the stream alive until stop() drops the sender
                    let _ = stop_rx.recv();
                    drop(stream);
                    tracing::debug!("audio capture stopped");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })?;

        ready_rx
            .recv()
            .map_err(|_| Error::Audio("capture thread exited before ready".to_string()))??;

        self.worker = Some(CaptureWorker { stop_tx, handle });
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
            let _ = worker.handle.join();
        }
    }

    fn is_running(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for MicInput {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Open the default input stream and wire its callback to `handler`
fn build_capture_stream(mut handler: FrameHandler) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| Error::Audio("no input device available".to_string()))?;
    let supported = device
        .default_input_config()
        .map_err(|e| Error::Audio(e.to_string()))?;

    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels();
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate,
        channels,
        ?sample_format,
        "audio capture started"
    );

    let err_fn = |err| {
        tracing::error!(error = %err, "audio capture error");
    };

    let stream = match sample_format {
        cpal::SampleFormat::F32 => device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    handler(AudioFrame {
                        data: SampleData::F32(data.to_vec()),
                        sample_rate,
                        channels,
                        captured_at: Instant::now(),
                    });
                },
                err_fn,
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?,
        cpal::SampleFormat::I16 => device
            .build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    handler(AudioFrame {
                        data: SampleData::I16(data.to_vec()),
                        sample_rate,
                        channels,
                        captured_at: Instant::now(),
                    });
                },
                err_fn,
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?,
        other => {
            return Err(Error::AudioFormat(format!(
                "unsupported sample format {other:?}"
            )));
        }
    };

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;
    Ok(stream)
}
