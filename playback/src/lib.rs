pub mod cancel;
pub mod controller;
pub mod error;
pub mod sink;

pub use cancel::CancelToken;
pub use controller::{PlaybackConfig, PlaybackController, PlaybackState};
pub use error::PlaybackError;
pub use sink::{ClipReader, FrameSink, MediaFrame, MediaOpener, SpeechSynthesizer};
