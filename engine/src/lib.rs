//! Two-stream recognition engine.
//!
//! Fuses a vision stream (hand landmarks matched against a reference catalog)
//! and a speech stream (transcripts scanned for catalog labels) into a single
//! queue of recognized events, consumed by a preemptive playback controller.
//!
//! Data flow: device → worker → matcher → event channel → playback.
//! Control flow: caller → [`Coordinator`] → workers/controller.

pub mod channel;
pub mod config;
pub mod coordinator;
pub mod debounce;
pub mod device;
pub mod error;
pub mod event;
pub mod worker;

pub use channel::{EventChannel, RecvError};
pub use config::EngineConfig;
pub use coordinator::Coordinator;
pub use debounce::Debouncer;
pub use device::{
    AudioChunk, Capture, CaptureError, DetectionError, DeviceError, FeatureVector,
    LandmarkDetector, RawFrame, SpeechDevice, SpeechSource, Transcriber, TranscriptionError,
    VisionDevice, VisionSource,
};
pub use error::EngineError;
pub use event::{RecognizedEvent, SourceKind};
pub use worker::{WorkerHandle, WorkerState};
