//! Capture and recognition collaborator interfaces.
//!
//! The engine performs no landmark detection, speech recognition or video
//! decoding of its own; it orchestrates these traits. Every acquisition call
//! takes a bounded timeout so a worker observes stop requests within one
//! iteration.

use std::time::Duration;

use thiserror::Error;

/// Fixed-arity numeric encoding of one detected hand pose.
pub type FeatureVector = Vec<f32>;

/// One raw camera frame, opaque to the engine.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub data: Vec<u8>,
}

/// One captured audio utterance, opaque to the engine.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub samples: Vec<i16>,
}

/// Outcome of one bounded acquisition call.
#[derive(Debug, Clone)]
pub enum Capture<T> {
    /// One frame/utterance was acquired.
    Frame(T),
    /// Nothing arrived within the timeout; the loop spins again.
    Timeout,
    /// The device has no more data (unplugged, file ended). Ends the worker.
    EndOfStream,
}

/// Transient per-iteration acquisition failure; logged and retried.
#[derive(Error, Debug)]
#[error("capture failed: {0}")]
pub struct CaptureError(pub String);

/// Transient landmark-detection failure; logged, the frame is skipped.
#[derive(Error, Debug)]
#[error("detection failed: {0}")]
pub struct DetectionError(pub String);

/// Transient transcription failure; logged, the utterance is skipped.
#[derive(Error, Debug)]
#[error("transcription failed: {0}")]
pub struct TranscriptionError(pub String);

/// Device could not be opened; fatal to one start attempt.
#[derive(Error, Debug)]
#[error("device unavailable: {0}")]
pub struct DeviceError(pub String);

/// A camera (or equivalent) yielding raw frames.
pub trait VisionDevice: Send {
    /// Acquires one frame, blocking at most `timeout`.
    fn capture(&mut self, timeout: Duration) -> Result<Capture<RawFrame>, CaptureError>;
}

/// Reduces a raw frame to a hand-landmark feature vector.
pub trait LandmarkDetector: Send {
    /// Returns `None` when no hand is visible in the frame.
    fn detect(&mut self, frame: &RawFrame) -> Result<Option<FeatureVector>, DetectionError>;
}

/// A microphone (or equivalent) yielding audio utterances.
pub trait SpeechDevice: Send {
    /// Acquires one utterance, blocking at most `timeout`.
    fn listen(&mut self, timeout: Duration) -> Result<Capture<AudioChunk>, CaptureError>;
}

/// Converts an audio utterance to text.
pub trait Transcriber: Send {
    /// Returns `None` when the audio was unintelligible.
    fn transcribe(&mut self, chunk: &AudioChunk) -> Result<Option<String>, TranscriptionError>;
}

/// Opens the vision capture pipeline. Called on every worker start so a
/// stopped stream can be restarted with a fresh device handle.
pub trait VisionSource: Send + Sync {
    fn open(&self) -> Result<(Box<dyn VisionDevice>, Box<dyn LandmarkDetector>), DeviceError>;
}

/// Opens the speech capture pipeline.
pub trait SpeechSource: Send + Sync {
    fn open(&self) -> Result<(Box<dyn SpeechDevice>, Box<dyn Transcriber>), DeviceError>;
}
