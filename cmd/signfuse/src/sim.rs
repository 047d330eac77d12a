//! Simulated capture devices backed by the scripted timeline.
//!
//! The script's vectors and utterances ride through the opaque device
//! payloads: vectors as little-endian f32 bytes in the video frame,
//! utterances as UTF-8 bytes widened into audio samples. The paired
//! detector/transcriber decode them back out, so the engine sees the same
//! shapes a real camera and microphone would produce.

use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use signfuse_engine::{
    AudioChunk, Capture, CaptureError, DetectionError, DeviceError, FeatureVector,
    LandmarkDetector, RawFrame, SpeechDevice, SpeechSource, Transcriber, TranscriptionError,
    VisionDevice, VisionSource,
};

use crate::script::{Input, Script, Step};

pub struct TimedVector {
    pub at: Duration,
    pub vector: Vec<f32>,
}

pub struct TimedText {
    pub at: Duration,
    pub text: String,
}

/// Splits a script into its per-stream timelines.
pub fn split(script: Script) -> (Vec<TimedVector>, Vec<TimedText>) {
    let mut vision = Vec::new();
    let mut speech = Vec::new();
    for Step { after_ms, input } in script.steps {
        let at = Duration::from_millis(after_ms);
        match input {
            Input::Vision(vector) => vision.push(TimedVector { at, vector }),
            Input::Speech(text) => speech.push(TimedText { at, text }),
        }
    }
    vision.sort_by_key(|s| s.at);
    speech.sort_by_key(|s| s.at);
    (vision, speech)
}

/// Blocks until the head of `pending` is due or `timeout` elapses; pops and
/// returns the head if due.
fn next_due<T>(pending: &mut Vec<(Duration, T)>, start: Instant, timeout: Duration) -> Option<T> {
    let Some((at, _)) = pending.first() else {
        return None;
    };
    let due = start + *at;
    let now = Instant::now();
    if due > now {
        let wait = (due - now).min(timeout);
        thread::sleep(wait);
        if Instant::now() < due {
            return None;
        }
    }
    Some(pending.remove(0).1)
}

pub struct ScriptedVision {
    steps: Mutex<Vec<TimedVector>>,
}

impl ScriptedVision {
    pub fn new(steps: Vec<TimedVector>) -> Self {
        Self {
            steps: Mutex::new(steps),
        }
    }
}

impl VisionSource for ScriptedVision {
    fn open(&self) -> Result<(Box<dyn VisionDevice>, Box<dyn LandmarkDetector>), DeviceError> {
        let steps = std::mem::take(
            &mut *self
                .steps
                .lock()
                .map_err(|_| DeviceError("scripted camera poisoned".into()))?,
        );
        let pending = steps.into_iter().map(|s| (s.at, s.vector)).collect();
        Ok((
            Box::new(ScriptedCamera {
                start: Instant::now(),
                pending,
            }),
            Box::new(VectorDetector),
        ))
    }
}

struct ScriptedCamera {
    start: Instant,
    pending: Vec<(Duration, Vec<f32>)>,
}

impl VisionDevice for ScriptedCamera {
    fn capture(&mut self, timeout: Duration) -> Result<Capture<RawFrame>, CaptureError> {
        if self.pending.is_empty() {
            return Ok(Capture::EndOfStream);
        }
        match next_due(&mut self.pending, self.start, timeout) {
            Some(vector) => Ok(Capture::Frame(RawFrame {
                data: vector.iter().flat_map(|f| f.to_le_bytes()).collect(),
            })),
            None => Ok(Capture::Timeout),
        }
    }
}

struct VectorDetector;

impl LandmarkDetector for VectorDetector {
    fn detect(&mut self, frame: &RawFrame) -> Result<Option<FeatureVector>, DetectionError> {
        if frame.data.is_empty() || frame.data.len() % 4 != 0 {
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

pub struct ScriptedSpeech {
    steps: Mutex<Vec<TimedText>>,
}

impl ScriptedSpeech {
    pub fn new(steps: Vec<TimedText>) -> Self {
        Self {
            steps: Mutex::new(steps),
        }
    }
}

impl SpeechSource for ScriptedSpeech {
    fn open(&self) -> Result<(Box<dyn SpeechDevice>, Box<dyn Transcriber>), DeviceError> {
        let steps = std::mem::take(
            &mut *self
                .steps
                .lock()
                .map_err(|_| DeviceError("scripted microphone poisoned".into()))?,
        );
        let pending = steps.into_iter().map(|s| (s.at, s.text)).collect();
        Ok((
            Box::new(ScriptedMic {
                start: Instant::now(),
                pending,
            }),
            Box::new(TextTranscriber),
        ))
    }
}

struct ScriptedMic {
    start: Instant,
    pending: Vec<(Duration, String)>,
}

impl SpeechDevice for ScriptedMic {
    fn listen(&mut self, timeout: Duration) -> Result<Capture<AudioChunk>, CaptureError> {
        if self.pending.is_empty() {
            return Ok(Capture::EndOfStream);
        }
        match next_due(&mut self.pending, self.start, timeout) {
            Some(text) => Ok(Capture::Frame(AudioChunk {
                samples: text.bytes().map(i16::from).collect(),
            })),
            None => Ok(Capture::Timeout),
        }
    }
}

struct TextTranscriber;

impl Transcriber for TextTranscriber {
    fn transcribe(&mut self, chunk: &AudioChunk) -> Result<Option<String>, TranscriptionError> {
        let bytes: Vec<u8> = chunk.samples.iter().map(|s| *s as u8).collect();
        Ok(String::from_utf8(bytes).ok())
    }
}
