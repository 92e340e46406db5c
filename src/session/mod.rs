//! Session state machine
//!
//! Owns the connection and recording lifecycles and coordinates the audio
//! pipeline, the protocol codec, and the transport. Inbound events are
//! dispatched in wire arrival order; the capture callback never touches the
//! network directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::audio::{
    AudioEncoder, FrameHandler, InputDevice, MicInput, OutputSink, PlaybackReassembler,
    SpeakerSink, TurnState,
};
use crate::config::{ClientConfig, INPUT_SAMPLE_RATE};
use crate::protocol::{ClientEvent, EventEncoder, ServerEvent, SessionDescription, decode};
use crate::transport::{Transport, WsTransport};
use crate::{Error, Result, vision};

/// Connection lifecycle, owned solely by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    AwaitingNegotiation,
    Active,
    Closing,
}

/// Typed events delivered to the host application on one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Negotiation finished; the session accepts recording and sends
    Ready,
    /// Server VAD detected the start of user speech
    SpeechStarted,
    /// Server VAD detected the end of user speech
    SpeechStopped,
    /// The input audio buffer was committed as a user turn
    InputCommitted,
    /// A model response began
    ResponseStarted,
    /// A model response finished
    ResponseDone,
    /// Incremental assistant transcript
    TranscriptDelta(String),
    /// Final assistant transcript
    TranscriptDone(String),
    /// Completed transcription of the user's speech
    UserTranscript(String),
    /// The current synthesized-audio turn finished playing out
    AudioDone,
    /// Connection-level or server-reported error; no automatic retry
    Error(String),
    /// The transport closed
    Disconnected,
}

/// Host-platform audio route policy (speaker/headset/bluetooth selection).
///
/// The core calls `activate` when recording starts and `deactivate` on
/// teardown; route-mode selection never leaks into the core.
pub trait AudioRoute: Send + Sync {
    /// Configure and activate the input/output route
    ///
    /// # Errors
    ///
    /// Returns error if the route cannot be activated
    fn activate(&self) -> Result<()>;

    /// Release the route
    fn deactivate(&self);
}

/// No-op route for hosts without platform route policy
pub struct NullRoute;

impl AudioRoute for NullRoute {
    fn activate(&self) -> Result<()> {
        Ok(())
    }

    fn deactivate(&self) {}
}

/// Realtime voice/vision client.
///
/// Construct with [`RealtimeClient::new`], receive [`SessionEvent`]s on the
/// returned channel, then drive the lifecycle: `connect`, wait for
/// [`SessionEvent::Ready`], `start_recording`, and `disconnect` when done.
pub struct RealtimeClient {
    config: ClientConfig,
    state: Arc<Mutex<ConnectionState>>,
    encoder: Arc<EventEncoder>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    outbound_tx: Option<mpsc::UnboundedSender<String>>,
    transport: Option<Arc<dyn Transport>>,
    tasks: Vec<JoinHandle<()>>,
    /// Built lazily on first connect so the output device is not contended
    /// at construction time
    reassembler: Option<Arc<Mutex<PlaybackReassembler>>>,
    pending_sink: Option<Box<dyn OutputSink>>,
    /// Acquired lazily on first `start_recording`
    input: Option<Box<dyn InputDevice>>,
    route: Arc<dyn AudioRoute>,
    recording: Arc<AtomicBool>,
}

impl RealtimeClient {
    /// Create a client backed by the default host audio devices (acquired
    /// lazily, not here).
    #[must_use]
    pub fn new(config: ClientConfig) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        Self::with_audio(config, Box::new(MicInput::new()), Box::new(SpeakerSink::new()))
    }

    /// Create a client with explicit audio collaborators (used by tests and
    /// embedders with their own device layer).
    #[must_use]
    pub fn with_audio(
        config: ClientConfig,
        input: Box<dyn InputDevice>,
        sink: Box<dyn OutputSink>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let client = Self {
            config,
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
            encoder: Arc::new(EventEncoder::new()),
            events_tx,
            outbound_tx: None,
            transport: None,
            tasks: Vec::new(),
            reassembler: None,
            pending_sink: Some(sink),
            input: Some(input),
            route: Arc::new(NullRoute),
            recording: Arc::new(AtomicBool::new(false)),
        };
        (client, events_rx)
    }

    /// Install a platform audio route policy
    pub fn set_route(&mut self, route: Arc<dyn AudioRoute>) {
        self.route = route;
    }

    /// Current connection state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    /// Whether the microphone pipeline is running
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    /// Current playback turn state (Idle when no turn is in progress)
    #[must_use]
    pub fn playback_state(&self) -> TurnState {
        self.reassembler
            .as_ref()
            .map_or(TurnState::Idle, |r| r.lock().unwrap().state())
    }

    /// Open the configured WebSocket endpoint and begin the session.
    ///
    /// # Errors
    ///
    /// Returns error if already connected or the transport cannot open
    pub async fn connect(&mut self) -> Result<()> {
        self.begin_connect()?;
        let transport = match WsTransport::connect(
            &self.config.endpoint,
            &self.config.api_key,
            &self.config.model,
        )
        .await
        {
            Ok(t) => Arc::new(t) as Arc<dyn Transport>,
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                return Err(e);
            }
        };
        self.attach(transport);
        Ok(())
    }

    /// Begin the session over an already-open transport.
    ///
    /// # Errors
    ///
    /// Returns error if already connected
    pub async fn connect_with(&mut self, transport: Arc<dyn Transport>) -> Result<()> {
        self.begin_connect()?;
        self.attach(transport);
        Ok(())
    }

    fn begin_connect(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if *state != ConnectionState::Disconnected {
            return Err(Error::State(format!(
                "connect() requires a disconnected session, state is {state:?}"
            )));
        }
        *state = ConnectionState::Connecting;
        Ok(())
    }

    /// Wire the open transport into the receive loop, writer, and the
    /// delayed negotiation send.
    fn attach(&mut self, transport: Arc<dyn Transport>) {
        let reassembler = match &self.reassembler {
            Some(r) => Arc::clone(r),
            None => {
                let sink = self
                    .pending_sink
                    .take()
                    .unwrap_or_else(|| Box::new(SpeakerSink::new()));
                let r = Arc::new(Mutex::new(PlaybackReassembler::new(
                    sink,
                    self.config.prebuffer_chunks,
                )));
                self.reassembler = Some(Arc::clone(&r));
                r
            }
        };

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();
        self.outbound_tx = Some(outbound_tx.clone());
        self.transport = Some(Arc::clone(&transport));
        self.set_state(ConnectionState::AwaitingNegotiation);
        tracing::debug!("transport open, awaiting negotiation");

        // A channel failure is surfaced to the caller exactly once even if
        // both loops observe it
        let fault_reported = Arc::new(AtomicBool::new(false));

        self.tasks.push(tokio::spawn(writer_loop(
            Arc::clone(&transport),
            outbound_rx,
            self.events_tx.clone(),
            Arc::clone(&self.state),
            Arc::clone(&fault_reported),
        )));

        self.tasks.push(tokio::spawn(receive_loop(
            transport,
            self.events_tx.clone(),
            Arc::clone(&self.state),
            reassembler,
            fault_reported,
        )));

        // Fixed short delay between transport open and negotiation
        let description = SessionDescription::from_config(&self.config);
        let encoder = Arc::clone(&self.encoder);
        let delay = Duration::from_millis(self.config.negotiation_delay_ms);
        self.tasks.push(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(text) = encoder.encode(&ClientEvent::SessionUpdate(description)) {
                let _ = outbound_tx.send(text);
            }
        }));
    }

    /// Begin pulling microphone frames into the encode-and-send pipeline.
    ///
    /// A hardware format fault (zero or implausible sample rate) does not
    /// fail the session: it is reported or logged per configuration and the
    /// client stays out of the recording state. Calling while already
    /// recording is a no-op.
    ///
    /// # Errors
    ///
    /// Returns error if the session is not active or the capture stream
    /// cannot start
    pub fn start_recording(&mut self) -> Result<()> {
        if self.input.as_ref().is_some_and(|input| input.is_running()) || self.is_recording() {
            return Ok(());
        }
        if self.state() != ConnectionState::Active {
            return Err(Error::State(
                "start_recording() requires an active session".to_string(),
            ));
        }
        let outbound_tx = self
            .outbound_tx
            .clone()
            .ok_or_else(|| Error::State("no outbound channel".to_string()))?;

        let input = self.input.get_or_insert_with(|| Box::new(MicInput::new()));

        let native = match input.native_format() {
            Ok(format) => format,
            Err(e) => return self.contain_audio_fault(e),
        };
        let mut audio_encoder = match AudioEncoder::new(native, INPUT_SAMPLE_RATE) {
            Ok(enc) => enc,
            Err(e @ Error::AudioFormat(_)) => return self.contain_audio_fault(e),
            Err(e) => return Err(e),
        };

        self.route.activate()?;

        let event_encoder = Arc::clone(&self.encoder);
        let handler: FrameHandler = Box::new(move |frame| {
            // Realtime capture context: encode and enqueue only, no I/O
            match audio_encoder.encode(&frame) {
                Ok(chunk) if !chunk.is_empty() => {
                    if let Some(text) = event_encoder.encode(&ClientEvent::AudioAppend(chunk)) {
                        let _ = outbound_tx.send(text);
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, "dropping mismatched capture frame"),
            }
        });

        if let Err(e) = input.start(handler) {
            self.route.deactivate();
            return Err(e);
        }
        self.recording.store(true, Ordering::SeqCst);
        tracing::debug!(
            native_rate = native.sample_rate,
            channels = native.channels,
            "recording started"
        );
        Ok(())
    }

    /// Stop pulling input frames. The connection stays up; already-sent
    /// audio is not retracted. Calling while not recording is a no-op.
    pub fn stop_recording(&mut self) {
        if !self.recording.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(input) = self.input.as_mut() {
            input.stop();
        }
        self.route.deactivate();
        tracing::debug!("recording stopped");
    }

    /// Compress an image to JPEG at the configured quality and queue it.
    ///
    /// # Errors
    ///
    /// Returns error if the session is not active or the image cannot be
    /// decoded
    pub fn send_image(&self, image_bytes: &[u8]) -> Result<()> {
        self.ensure_active()?;
        let jpeg = vision::compress_jpeg(image_bytes, self.config.image_quality)?;
        self.queue_event(&ClientEvent::ImageAppend(jpeg))
    }

    /// Commit the input audio buffer as a completed user turn.
    ///
    /// # Errors
    ///
    /// Returns error if the session is not active
    pub fn commit_audio(&self) -> Result<()> {
        self.ensure_active()?;
        self.queue_event(&ClientEvent::AudioCommit)
    }

    /// Explicitly request a model response.
    ///
    /// # Errors
    ///
    /// Returns error if the session is not active
    pub fn create_response(&self) -> Result<()> {
        self.ensure_active()?;
        self.queue_event(&ClientEvent::ResponseCreate)
    }

    /// Tear down: stop recording, silence playback, close the transport.
    pub async fn disconnect(&mut self) {
        self.set_state(ConnectionState::Closing);
        self.stop_recording();

        if let Some(reassembler) = &self.reassembler {
            reassembler.lock().unwrap().reset();
        }
        if let Some(transport) = self.transport.take() {
            let _ = transport.close().await;
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.outbound_tx = None;
        self.set_state(ConnectionState::Disconnected);
        tracing::debug!("session disconnected");
    }

    fn ensure_active(&self) -> Result<()> {
        if self.state() == ConnectionState::Active {
            Ok(())
        } else {
            Err(Error::State("session is not active".to_string()))
        }
    }

    fn queue_event(&self, event: &ClientEvent) -> Result<()> {
        let tx = self
            .outbound_tx
            .as_ref()
            .ok_or_else(|| Error::State("no outbound channel".to_string()))?;
        if let Some(text) = self.encoder.encode(event) {
            tx.send(text)
                .map_err(|_| Error::Transport("outbound channel closed".to_string()))?;
        }
        Ok(())
    }

    /// Report or log a hardware format fault without entering the recording
    /// state and without failing the session.
    fn contain_audio_fault(&self, e: Error) -> Result<()> {
        if self.config.report_audio_faults {
            let _ = self.events_tx.send(SessionEvent::Error(e.to_string()));
        } else {
            tracing::warn!(error = %e, "audio format fault, recording not started");
        }
        Ok(())
    }

    fn set_state(&self, next: ConnectionState) {
        *self.state.lock().unwrap() = next;
    }
}

/// Drains the single outbound queue, preserving program order of sends.
async fn writer_loop(
    transport: Arc<dyn Transport>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    state: Arc<Mutex<ConnectionState>>,
    fault_reported: Arc<AtomicBool>,
) {
    while let Some(text) = outbound_rx.recv().await {
        if let Err(e) = transport.send(text).await {
            report_channel_fault(&events_tx, &state, &fault_reported, &e);
            break;
        }
    }
}

/// Pulls inbound frames one at a time and dispatches each fully before
/// re-arming, preserving wire arrival order.
async fn receive_loop(
    transport: Arc<dyn Transport>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    state: Arc<Mutex<ConnectionState>>,
    reassembler: Arc<Mutex<PlaybackReassembler>>,
    fault_reported: Arc<AtomicBool>,
) {
    loop {
        match transport.receive().await {
            Ok(Some(text)) => {
                if let Some(event) = decode(&text) {
                    dispatch(event, &events_tx, &state, &reassembler);
                }
            }
            Ok(None) => {
                *state.lock().unwrap() = ConnectionState::Disconnected;
                let _ = events_tx.send(SessionEvent::Disconnected);
                break;
            }
            Err(e) => {
                report_channel_fault(&events_tx, &state, &fault_reported, &e);
                break;
            }
        }
    }
}

fn report_channel_fault(
    events_tx: &mpsc::UnboundedSender<SessionEvent>,
    state: &Arc<Mutex<ConnectionState>>,
    fault_reported: &Arc<AtomicBool>,
    e: &Error,
) {
    *state.lock().unwrap() = ConnectionState::Disconnected;
    if !fault_reported.swap(true, Ordering::SeqCst) {
        let _ = events_tx.send(SessionEvent::Error(format!("connection lost: {e}")));
    }
}

/// Route one decoded server event: state transitions, playback, or caller
/// callbacks. Must not block; the receive loop re-arms only after this
/// returns.
fn dispatch(
    event: ServerEvent,
    events_tx: &mpsc::UnboundedSender<SessionEvent>,
    state: &Arc<Mutex<ConnectionState>>,
    reassembler: &Arc<Mutex<PlaybackReassembler>>,
) {
    let emit = |e: SessionEvent| {
        let _ = events_tx.send(e);
    };

    match event {
        ServerEvent::SessionCreated | ServerEvent::SessionUpdated => {
            let mut state = state.lock().unwrap();
            if *state == ConnectionState::AwaitingNegotiation {
                *state = ConnectionState::Active;
                drop(state);
                tracing::debug!("session active");
                emit(SessionEvent::Ready);
            }
        }
        ServerEvent::SpeechStarted => emit(SessionEvent::SpeechStarted),
        ServerEvent::SpeechStopped => emit(SessionEvent::SpeechStopped),
        ServerEvent::Committed => emit(SessionEvent::InputCommitted),
        ServerEvent::ResponseCreated => emit(SessionEvent::ResponseStarted),
        ServerEvent::ResponseDone => emit(SessionEvent::ResponseDone),
        ServerEvent::TranscriptDelta(text) => emit(SessionEvent::TranscriptDelta(text)),
        ServerEvent::TranscriptDone(text) => emit(SessionEvent::TranscriptDone(text)),
        ServerEvent::AudioDelta(pcm) => reassembler.lock().unwrap().push(&pcm),
        ServerEvent::AudioDone => {
            reassembler.lock().unwrap().finish();
            emit(SessionEvent::AudioDone);
        }
        ServerEvent::ItemCreated => {}
        ServerEvent::UserTranscriptCompleted(text) => emit(SessionEvent::UserTranscript(text)),
        ServerEvent::Error(message) => emit(SessionEvent::Error(message)),
    }
}
