//! Console-backed playback collaborators.
//!
//! The demo has no video decoder; a clip file is split into fixed-size
//! chunks and each chunk is rendered as one terminal line, which is enough
//! to watch preemption and pacing happen.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use signfuse_playback::{ClipReader, FrameSink, MediaFrame, MediaOpener, PlaybackError, SpeechSynthesizer};

const DEFAULT_CHUNK: usize = 4096;

/// Opens a media file and serves it back in fixed-size chunks, one chunk per
/// frame.
pub struct FileChunkOpener {
    chunk: usize,
}

impl Default for FileChunkOpener {
    fn default() -> Self {
        Self {
            chunk: DEFAULT_CHUNK,
        }
    }
}

impl MediaOpener for FileChunkOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn ClipReader>, PlaybackError> {
        let file = File::open(path).map_err(|e| PlaybackError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Box::new(FileChunkReader {
            file,
            chunk: self.chunk,
            next: 0,
        }))
    }
}

struct FileChunkReader {
    file: File,
    chunk: usize,
    next: u32,
}

impl ClipReader for FileChunkReader {
    fn next_frame(&mut self) -> Result<Option<MediaFrame>, PlaybackError> {
        let mut data = vec![0u8; self.chunk];
        let n = self.file.read(&mut data).map_err(|e| PlaybackError::Decode {
            index: self.next,
            reason: e.to_string(),
        })?;
        if n == 0 {
            return Ok(None);
        }
        data.truncate(n);
        let frame = MediaFrame {
            index: self.next,
            data,
        };
        self.next += 1;
        Ok(Some(frame))
    }
}

/// Prints each rendered frame as one line.
pub struct TerminalSink;

impl FrameSink for TerminalSink {
    fn render(&self, frame: &MediaFrame) -> Result<(), PlaybackError> {
        println!("[clip] frame {} ({} bytes)", frame.index, frame.data.len());
        Ok(())
    }
}

/// Prints spoken fallbacks instead of synthesizing audio.
pub struct ConsoleVoice;

impl SpeechSynthesizer for ConsoleVoice {
    fn speak(&self, text: &str) -> Result<(), PlaybackError> {
        println!("[speak] {text}");
        Ok(())
    }
}
