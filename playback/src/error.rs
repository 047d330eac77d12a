use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("playback: cannot open clip {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("playback: cannot decode frame {index}: {reason}")]
    Decode { index: u32, reason: String },

    #[error("playback: render failed: {0}")]
    Render(String),

    #[error("playback: speech synthesis failed: {0}")]
    Speak(String),
}
