//! Stream workers.
//!
//! One dedicated thread per stream runs an acquire → reduce → match →
//! publish loop. The state machine is
//! Idle → Running → StopRequested → Stopped; only the owning thread moves a
//! worker to Running/Stopped, and only the controlling side sets
//! StopRequested. Every blocking acquisition is bounded by the capture
//! timeout, so a stop request is observed within one iteration.
//!
//! Per-iteration failures (a dropped frame, an unintelligible utterance) are
//! logged and the loop continues; only end-of-stream ends a worker on its
//! own. The device handle lives inside the loop thread and is released
//! before the thread exits, so a joined worker has always released its
//! device.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use signfuse_catalog::{extract_label, Catalog};
use tracing::{debug, info, trace, warn};

use crate::channel::EventChannel;
use crate::config::EngineConfig;
use crate::debounce::Debouncer;
use crate::device::{
    Capture, LandmarkDetector, SpeechDevice, Transcriber, VisionDevice,
};
use crate::event::{RecognizedEvent, SourceKind};

/// Lifecycle state of one stream worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle = 0,
    Running = 1,
    StopRequested = 2,
    Stopped = 3,
}

impl WorkerState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => WorkerState::Running,
            2 => WorkerState::StopRequested,
            3 => WorkerState::Stopped,
            _ => WorkerState::Idle,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Idle => "idle",
            WorkerState::Running => "running",
            WorkerState::StopRequested => "stop_requested",
            WorkerState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

struct Shared {
    state: AtomicU8,
}

impl Shared {
    fn load(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn store(&self, s: WorkerState) {
        self.state.store(s as u8, Ordering::SeqCst);
    }

    /// Moves Idle/Running to StopRequested. Leaves Stopped untouched so a
    /// finished worker still reads as Stopped.
    fn request_stop(&self) {
        loop {
            let current = self.state.load(Ordering::SeqCst);
            if current == WorkerState::Stopped as u8
                || current == WorkerState::StopRequested as u8
            {
                return;
            }
            if self
                .state
                .compare_exchange(
                    current,
                    WorkerState::StopRequested as u8,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok()
            {
                return;
            }
        }
    }
}

/// Handle to a running stream worker. Dropping the handle stops the worker.
pub struct WorkerHandle {
    kind: SourceKind,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn state(&self) -> WorkerState {
        self.shared.load()
    }

    /// Returns true while the worker thread may still be producing events.
    pub fn is_active(&self) -> bool {
        !matches!(self.state(), WorkerState::Stopped)
    }

    /// Requests stop and joins the worker thread. Synchronous: when this
    /// returns, the thread has terminated and the device handle is released.
    /// Safe to call on an already-stopped worker.
    pub fn stop(&mut self) {
        self.shared.request_stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!(kind = %self.kind, "worker: thread panicked");
                self.shared.store(WorkerState::Stopped);
            }
        }
        debug!(kind = %self.kind, "worker: stopped");
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Consecutive capture failures tolerated before a device is written off.
const CAPTURE_FAILURE_BUDGET: u32 = 10;

/// One acquisition iteration's outcome, after reduction and matching.
enum Step {
    /// A catalog label was recognized.
    Label(String),
    /// Nothing usable this iteration (timeout, no hand, no match, skipped
    /// frame). The loop spins again.
    Nothing,
    /// The acquisition call itself failed. Retried with pacing; too many in
    /// a row end the stream.
    Failed,
    /// The device is exhausted; the worker winds down.
    EndOfStream,
}

/// The stream-specific half of the worker loop: acquire one frame/utterance
/// and reduce it to a catalog label.
trait Pipeline: Send + 'static {
    fn kind(&self) -> SourceKind;
    fn poll(&mut self, timeout: Duration) -> Step;
}

struct VisionPipeline {
    device: Box<dyn VisionDevice>,
    detector: Box<dyn LandmarkDetector>,
    catalog: Arc<Catalog>,
    threshold: f32,
}

impl Pipeline for VisionPipeline {
    fn kind(&self) -> SourceKind {
        SourceKind::Vision
    }

    fn poll(&mut self, timeout: Duration) -> Step {
        let frame = match self.device.capture(timeout) {
            Ok(Capture::Frame(frame)) => frame,
            Ok(Capture::Timeout) => return Step::Nothing,
            Ok(Capture::EndOfStream) => return Step::EndOfStream,
            Err(e) => {
                warn!(error = %e, "vision worker: capture failed");
                return Step::Failed;
            }
        };

        let vector = match self.detector.detect(&frame) {
            Ok(Some(vector)) => vector,
            Ok(None) => return Step::Nothing,
            Err(e) => {
                warn!(error = %e, "vision worker: detection failed, skipping frame");
                return Step::Nothing;
            }
        };

        match self.catalog.nearest(&vector, self.threshold) {
            Some(m) => {
                trace!(label = %m.entry.name, distance = m.distance, "vision worker: gesture matched");
                Step::Label(m.entry.name.clone())
            }
            None => Step::Nothing,
        }
    }
}

struct SpeechPipeline {
    device: Box<dyn SpeechDevice>,
    transcriber: Box<dyn Transcriber>,
    catalog: Arc<Catalog>,
}

impl Pipeline for SpeechPipeline {
    fn kind(&self) -> SourceKind {
        SourceKind::Speech
    }

    fn poll(&mut self, timeout: Duration) -> Step {
        let chunk = match self.device.listen(timeout) {
            Ok(Capture::Frame(chunk)) => chunk,
            Ok(Capture::Timeout) => return Step::Nothing,
            Ok(Capture::EndOfStream) => return Step::EndOfStream,
            Err(e) => {
                warn!(error = %e, "speech worker: capture failed");
                return Step::Failed;
            }
        };

        let text = match self.transcriber.transcribe(&chunk) {
            Ok(Some(text)) => text,
            Ok(None) => return Step::Nothing,
            Err(e) => {
                warn!(error = %e, "speech worker: transcription failed, skipping utterance");
                return Step::Nothing;
            }
        };

        match extract_label(&self.catalog, &text) {
            Some(label) => {
                trace!(label = %label, transcript = %text, "speech worker: label extracted");
                Step::Label(label.to_string())
            }
            None => {
                trace!(transcript = %text, "speech worker: no catalog label in transcript");
                Step::Nothing
            }
        }
    }
}

/// Spawns the vision worker thread.
pub(crate) fn spawn_vision(
    device: Box<dyn VisionDevice>,
    detector: Box<dyn LandmarkDetector>,
    catalog: Arc<Catalog>,
    channel: EventChannel,
    config: &EngineConfig,
) -> WorkerHandle {
    let pipeline = VisionPipeline {
        device,
        detector,
        catalog,
        threshold: config.match_threshold,
    };
    spawn(pipeline, channel, config)
}

/// Spawns the speech worker thread.
pub(crate) fn spawn_speech(
    device: Box<dyn SpeechDevice>,
    transcriber: Box<dyn Transcriber>,
    catalog: Arc<Catalog>,
    channel: EventChannel,
    config: &EngineConfig,
) -> WorkerHandle {
    let pipeline = SpeechPipeline {
        device,
        transcriber,
        catalog,
    };
    spawn(pipeline, channel, config)
}

fn spawn(pipeline: impl Pipeline, channel: EventChannel, config: &EngineConfig) -> WorkerHandle {
    let kind = pipeline.kind();
    let shared = Arc::new(Shared {
        state: AtomicU8::new(WorkerState::Idle as u8),
    });
    let timeout = config.capture_timeout();
    let debounce = config.debounce();

    let thread_shared = shared.clone();
    let handle =
        thread::spawn(move || run(pipeline, thread_shared, channel, debounce, timeout));

    WorkerHandle {
        kind,
        shared,
        handle: Some(handle),
    }
}

fn run(
    mut pipeline: impl Pipeline,
    shared: Arc<Shared>,
    channel: EventChannel,
    debounce: Duration,
    timeout: Duration,
) {
    let kind = pipeline.kind();

    // A stop requested before the first iteration wins the race.
    if shared
        .state
        .compare_exchange(
            WorkerState::Idle as u8,
            WorkerState::Running as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        )
        .is_err()
    {
        shared.store(WorkerState::Stopped);
        return;
    }

    info!(kind = %kind, "worker: started");
    let mut debouncer = Debouncer::new(debounce);
    let mut failures = 0u32;

    while shared.load() == WorkerState::Running {
        match pipeline.poll(timeout) {
            Step::Label(label) => {
                failures = 0;
                if !debouncer.admit(&label) {
                    trace!(kind = %kind, label = %label, "worker: debounced");
                    continue;
                }
                let event = RecognizedEvent::new(kind, label);
                debug!(event = %event, "worker: publishing");
                if !channel.publish(event) {
                    // Channel shut down under us; nothing left to do.
                    break;
                }
            }
            Step::Nothing => {
                failures = 0;
            }
            Step::Failed => {
                failures += 1;
                if failures >= CAPTURE_FAILURE_BUDGET {
                    warn!(kind = %kind, failures, "worker: device keeps failing, giving up");
                    break;
                }
                // A broken device can fail instantly; pace the retry so the
                // loop does not spin at full CPU.
                thread::sleep(timeout);
            }
            Step::EndOfStream => {
                info!(kind = %kind, "worker: end of stream");
                break;
            }
        }
    }

    // Release the device before the state flips to Stopped, so a joined
    // stop() guarantees the handle is free.
    drop(pipeline);
    shared.store(WorkerState::Stopped);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{CaptureError, DetectionError, FeatureVector, RawFrame};
    use signfuse_catalog::CatalogEntry;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Instant;

    /// Vision device yielding a scripted sequence of feature vectors, with a
    /// release counter bumped on drop.
    struct ScriptedCamera {
        frames: Mutex<Vec<Option<FeatureVector>>>,
        released: Arc<AtomicUsize>,
        end_after_script: bool,
    }

    impl VisionDevice for ScriptedCamera {
        fn capture(&mut self, _timeout: Duration) -> Result<Capture<RawFrame>, CaptureError> {
            let mut frames = self.frames.lock().unwrap();
            if frames.is_empty() {
                if self.end_after_script {
                    return Ok(Capture::EndOfStream);
                }
                // Simulate an idle camera: brief pause, nothing captured.
                thread::sleep(Duration::from_millis(1));
                return Ok(Capture::Timeout);
            }
            let vector = frames.remove(0);
            // Smuggle the vector through the opaque frame payload.
            let data = match vector {
                Some(v) => v.iter().flat_map(|f| f.to_le_bytes()).collect(),
                None => Vec::new(),
            };
            Ok(Capture::Frame(RawFrame { data }))
        }
    }

    impl Drop for ScriptedCamera {
        fn drop(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Decodes the vectors smuggled through [`ScriptedCamera`] frames.
    struct PassthroughDetector;

    impl LandmarkDetector for PassthroughDetector {
        fn detect(&mut self, frame: &RawFrame) -> Result<Option<FeatureVector>, DetectionError> {
            if frame.data.is_empty() {
                return Ok(None);
            }
            let vector = frame
                .data
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect();
            Ok(Some(vector))
        }
    }

    fn catalog() -> Arc<Catalog> {
        Arc::new(
            Catalog::from_entries(vec![
                CatalogEntry::with_reference("hello", vec![0.0, 0.0]),
                CatalogEntry::with_reference("goodbye", vec![10.0, 10.0]),
            ])
            .unwrap(),
        )
    }

    fn start_camera(
        frames: Vec<Option<FeatureVector>>,
        end_after_script: bool,
        channel: EventChannel,
        config: &EngineConfig,
    ) -> (WorkerHandle, Arc<AtomicUsize>) {
        let released = Arc::new(AtomicUsize::new(0));
        let camera = ScriptedCamera {
            frames: Mutex::new(frames),
            released: released.clone(),
            end_after_script,
        };
        let handle = spawn_vision(
            Box::new(camera),
            Box::new(PassthroughDetector),
            catalog(),
            channel,
            config,
        );
        (handle, released)
    }

    #[test]
    fn recognizes_and_publishes_matching_frames() {
        let channel = EventChannel::new(8);
        let config = EngineConfig::default().with_debounce(Duration::ZERO);

        let frames = vec![
            Some(vec![0.1, 0.0]),   // hello (distance 0.1)
            None,                   // no hand
            Some(vec![5.0, 5.0]),   // no match (distance > threshold)
            Some(vec![10.0, 10.1]), // goodbye
        ];
        let (mut handle, _released) = start_camera(frames, true, channel.clone(), &config);

        let first = channel.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first.label, "hello");
        assert_eq!(first.source, SourceKind::Vision);

        let second = channel.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(second.label, "goodbye");

        handle.stop();
        assert_eq!(handle.state(), WorkerState::Stopped);
    }

    #[test]
    fn debounce_suppresses_repeat_label() {
        let channel = EventChannel::new(8);
        let config = EngineConfig::default().with_debounce(Duration::from_secs(10));

        let frames = vec![
            Some(vec![0.0, 0.0]), // hello
            Some(vec![0.0, 0.0]), // hello again, inside window
            Some(vec![0.0, 0.0]), // and again
        ];
        let (mut handle, _released) = start_camera(frames, true, channel.clone(), &config);

        assert_eq!(
            channel.recv_timeout(Duration::from_secs(2)).unwrap().label,
            "hello"
        );
        // No second event must arrive.
        assert_eq!(
            channel.recv_timeout(Duration::from_millis(100)),
            Err(crate::channel::RecvError::Timeout)
        );

        handle.stop();
    }

    #[test]
    fn end_of_stream_stops_worker_and_releases_device() {
        let channel = EventChannel::new(8);
        let config = EngineConfig::default();

        let (handle, released) = start_camera(Vec::new(), true, channel, &config);

        let deadline = Instant::now() + Duration::from_secs(2);
        while handle.state() != WorkerState::Stopped {
            assert!(Instant::now() < deadline, "worker never stopped");
            thread::sleep(Duration::from_millis(5));
        }
        // Stopped implies the device was dropped first.
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn immediate_stop_after_start_never_leaks() {
        // Race start against stop repeatedly; every round must terminate
        // promptly and release its device exactly once.
        let config = EngineConfig::default().with_capture_timeout(Duration::from_millis(10));
        for _ in 0..100 {
            let channel = EventChannel::new(8);
            let (mut handle, released) = start_camera(Vec::new(), false, channel, &config);
            handle.stop();
            assert_eq!(handle.state(), WorkerState::Stopped);
            assert_eq!(released.load(Ordering::SeqCst), 1);
        }
    }

    struct BrokenCamera {
        attempts: Arc<AtomicUsize>,
        released: Arc<AtomicUsize>,
    }

    impl VisionDevice for BrokenCamera {
        fn capture(&mut self, _timeout: Duration) -> Result<Capture<RawFrame>, CaptureError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(CaptureError("sensor fault".into()))
        }
    }

    impl Drop for BrokenCamera {
        fn drop(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn persistent_capture_failure_ends_worker() {
        let channel = EventChannel::new(8);
        let config = EngineConfig::default().with_capture_timeout(Duration::from_millis(5));

        let attempts = Arc::new(AtomicUsize::new(0));
        let released = Arc::new(AtomicUsize::new(0));
        let handle = spawn_vision(
            Box::new(BrokenCamera {
                attempts: attempts.clone(),
                released: released.clone(),
            }),
            Box::new(PassthroughDetector),
            catalog(),
            channel.clone(),
            &config,
        );

        let deadline = Instant::now() + Duration::from_secs(2);
        while handle.state() != WorkerState::Stopped {
            assert!(Instant::now() < deadline, "worker never gave up");
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(attempts.load(Ordering::SeqCst), CAPTURE_FAILURE_BUDGET as usize);
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert!(channel.is_empty());
    }

    #[test]
    fn stop_is_idempotent() {
        let channel = EventChannel::new(8);
        let config = EngineConfig::default();
        let (mut handle, released) = start_camera(Vec::new(), false, channel, &config);

        handle.stop();
        handle.stop();
        assert_eq!(handle.state(), WorkerState::Stopped);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
