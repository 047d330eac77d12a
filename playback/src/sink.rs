//! Output collaborator interfaces.
//!
//! The controller never decodes video or synthesizes audio itself; it drives
//! these traits. Real integrations (a window renderer, a platform TTS voice)
//! live outside this crate; tests and the CLI use recording/printing
//! implementations.

use std::path::Path;

use crate::error::PlaybackError;

/// One decoded frame of a reference clip. The payload is opaque to the
/// controller; it is produced by a [`ClipReader`] and consumed by a
/// [`FrameSink`] untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaFrame {
    /// Zero-based frame index within the clip.
    pub index: u32,

    /// Decoded frame bytes in whatever format the opener/sink pair agreed on.
    pub data: Vec<u8>,
}

/// Sequential reader over the frames of one clip.
pub trait ClipReader: Send {
    /// Returns the next frame, or `None` at end of clip.
    fn next_frame(&mut self) -> Result<Option<MediaFrame>, PlaybackError>;
}

impl std::fmt::Debug for dyn ClipReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn ClipReader")
    }
}

/// Opens reference clips by path.
pub trait MediaOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn ClipReader>, PlaybackError>;
}

/// Receives frames for display.
pub trait FrameSink: Send + Sync {
    fn render(&self, frame: &MediaFrame) -> Result<(), PlaybackError>;
}

/// Speaks a label when no clip is available for it.
///
/// `speak` may block for the duration of the utterance; the controller always
/// calls it from the dedicated playback thread.
pub trait SpeechSynthesizer: Send + Sync {
    fn speak(&self, text: &str) -> Result<(), PlaybackError>;
}
