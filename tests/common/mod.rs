//! Shared test doubles: in-memory transport, recording sink, scripted mic

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use iris_realtime::audio::{FrameHandler, InputDevice, NativeFormat, OutputSink, SampleFormat};
use iris_realtime::transport::Transport;
use iris_realtime::{ClientConfig, Error, Result};

/// Config with a short negotiation delay so scenarios run fast
#[must_use]
pub fn test_config() -> ClientConfig {
    ClientConfig {
        instructions: "test".to_string(),
        negotiation_delay_ms: 10,
        prebuffer_chunks: 3,
        ..ClientConfig::default()
    }
}

/// In-memory duplex transport; the returned [`MockServer`] plays the peer
pub struct MockTransport {
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<Option<String>>>>,
    outbound_tx: mpsc::UnboundedSender<String>,
}

pub struct MockServer {
    to_client: mpsc::UnboundedSender<Result<Option<String>>>,
    from_client: mpsc::UnboundedReceiver<String>,
}

#[must_use]
pub fn mock_transport() -> (Arc<MockTransport>, MockServer) {
    let (to_client, inbound) = mpsc::unbounded_channel();
    let (outbound_tx, from_client) = mpsc::unbounded_channel();
    (
        Arc::new(MockTransport {
            inbound: tokio::sync::Mutex::new(inbound),
            outbound_tx,
        }),
        MockServer {
            to_client,
            from_client,
        },
    )
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, text: String) -> Result<()> {
        self.outbound_tx
            .send(text)
            .map_err(|_| Error::Transport("mock peer gone".to_string()))
    }

    async fn receive(&self) -> Result<Option<String>> {
        match self.inbound.lock().await.recv().await {
            Some(item) => item,
            None => Ok(None),
        }
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

impl MockServer {
    /// Push one server frame to the client
    pub fn send(&self, frame: &str) {
        self.to_client
            .send(Ok(Some(frame.to_string())))
            .expect("client receive loop gone");
    }

    /// Make the client's next receive fail
    pub fn fail(&self) {
        self.to_client
            .send(Err(Error::Transport("simulated link failure".to_string())))
            .expect("client receive loop gone");
    }

    /// Await the next frame the client sent
    pub async fn next_sent(&mut self) -> serde_json::Value {
        let text = tokio::time::timeout(Duration::from_secs(2), self.from_client.recv())
            .await
            .expect("timed out waiting for client frame")
            .expect("client writer gone");
        serde_json::from_str(&text).expect("client sent invalid JSON")
    }
}

/// Output sink that records scheduled blocks instead of playing them
#[derive(Clone, Default)]
pub struct BlockRecorder {
    pub blocks: Arc<Mutex<Vec<Vec<i16>>>>,
    pub starts: Arc<AtomicUsize>,
    pub stops: Arc<AtomicUsize>,
}

impl BlockRecorder {
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.lock().unwrap().len()
    }

    #[must_use]
    pub fn block(&self, index: usize) -> Vec<i16> {
        self.blocks.lock().unwrap()[index].clone()
    }
}

pub struct MockSink {
    recorder: BlockRecorder,
}

impl MockSink {
    #[must_use]
    pub fn new() -> (Self, BlockRecorder) {
        let recorder = BlockRecorder::default();
        (
            Self {
                recorder: recorder.clone(),
            },
            recorder,
        )
    }
}

impl OutputSink for MockSink {
    fn start(&mut self) -> Result<()> {
        self.recorder.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn enqueue(&mut self, block: Vec<i16>) {
        self.recorder.blocks.lock().unwrap().push(block);
    }

    fn stop(&mut self) {
        self.recorder.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Scripted input device with a configurable native format
#[derive(Clone, Default)]
pub struct MicProbe {
    pub starts: Arc<AtomicUsize>,
    pub stops: Arc<AtomicUsize>,
    pub handler: Arc<Mutex<Option<FrameHandler>>>,
}

pub struct MockMic {
    format: NativeFormat,
    probe: MicProbe,
}

impl MockMic {
    #[must_use]
    pub fn new(sample_rate: u32) -> (Self, MicProbe) {
        let probe = MicProbe::default();
        (
            Self {
                format: NativeFormat {
                    sample_rate,
                    channels: 1,
                    sample_format: SampleFormat::F32,
                },
                probe: probe.clone(),
            },
            probe,
        )
    }
}

impl InputDevice for MockMic {
    fn native_format(&self) -> Result<NativeFormat> {
        Ok(self.format)
    }

    fn start(&mut self, handler: FrameHandler) -> Result<()> {
        self.probe.starts.fetch_add(1, Ordering::SeqCst);
        *self.probe.handler.lock().unwrap() = Some(handler);
        Ok(())
    }

    fn stop(&mut self) {
        self.probe.stops.fetch_add(1, Ordering::SeqCst);
        *self.probe.handler.lock().unwrap() = None;
    }

    fn is_running(&self) -> bool {
        self.probe.handler.lock().unwrap().is_some()
    }
}
