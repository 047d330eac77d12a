//! Preemptive playback controller.
//!
//! At most one output session runs at a time. A new `play` call cancels the
//! active session, waits (bounded) for it to observe cancellation, and only
//! then starts the new one — the newest recognized event always wins.
//!
//! Each session runs on its own thread, spawned per playback. Clip frames
//! are paced by a cancellable wait, so cancellation and shutdown latency are
//! bounded by one frame interval, not by the clip length.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use signfuse_catalog::CatalogEntry;
use tracing::{debug, warn};

use crate::cancel::{CancelToken, Flag};
use crate::sink::{FrameSink, MediaOpener, SpeechSynthesizer};

const DEFAULT_FRAME_RATE: u32 = 30;

/// State of the playback controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// No session active.
    Idle = 0,
    /// One session is rendering frames or speaking.
    Playing = 1,
    /// The active session has been asked to stop and has not yet exited.
    Cancelling = 2,
}

impl PlaybackState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => PlaybackState::Playing,
            2 => PlaybackState::Cancelling,
            _ => PlaybackState::Idle,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Playing => "playing",
            PlaybackState::Cancelling => "cancelling",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Options for [`PlaybackController`].
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Clip playback rate in frames per second (default: 30).
    pub frame_rate: u32,

    /// How long to wait for a cancelled session to exit before detaching it
    /// (default: 500 ms). Only a session stuck inside a collaborator call
    /// can exceed this.
    pub cancel_wait: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
            cancel_wait: Duration::from_millis(500),
        }
    }
}

impl PlaybackConfig {
    pub fn with_frame_rate(mut self, fps: u32) -> Self {
        self.frame_rate = fps;
        self
    }

    pub fn with_cancel_wait(mut self, wait: Duration) -> Self {
        self.cancel_wait = wait;
        self
    }

    fn frame_interval(&self) -> Duration {
        let fps = if self.frame_rate > 0 {
            self.frame_rate
        } else {
            DEFAULT_FRAME_RATE
        };
        Duration::from_secs_f64(1.0 / fps as f64)
    }
}

struct Session {
    token: CancelToken,
    done: Flag,
    handle: JoinHandle<()>,
}

/// Resolves recognized labels to an output action and runs it.
pub struct PlaybackController {
    opener: Arc<dyn MediaOpener>,
    sink: Arc<dyn FrameSink>,
    tts: Arc<dyn SpeechSynthesizer>,
    config: PlaybackConfig,

    state: Arc<AtomicU8>,
    // Monotonic session counter: a finishing session only writes Idle back
    // if it is still the newest one.
    generation: Arc<AtomicU64>,
    session: Mutex<Option<Session>>,
}

impl PlaybackController {
    pub fn new(
        opener: Arc<dyn MediaOpener>,
        sink: Arc<dyn FrameSink>,
        tts: Arc<dyn SpeechSynthesizer>,
        config: PlaybackConfig,
    ) -> Self {
        Self {
            opener,
            sink,
            tts,
            config,
            state: Arc::new(AtomicU8::new(PlaybackState::Idle as u8)),
            generation: Arc::new(AtomicU64::new(0)),
            session: Mutex::new(None),
        }
    }

    /// Current controller state.
    pub fn state(&self) -> PlaybackState {
        PlaybackState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Starts output for `entry`, preempting any active session first.
    ///
    /// Entries with a media path play the clip at the configured frame rate;
    /// entries without one are spoken via the synthesizer.
    pub fn play(&self, entry: &CatalogEntry) {
        let mut slot = self.session.lock().unwrap();
        self.preempt_locked(&mut slot);

        let token = CancelToken::new();
        let done = Flag::new();
        let gen = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state
            .store(PlaybackState::Playing as u8, Ordering::SeqCst);

        let worker = SessionWorker {
            label: entry.name.clone(),
            media: entry.media.clone(),
            opener: self.opener.clone(),
            sink: self.sink.clone(),
            tts: self.tts.clone(),
            interval: self.config.frame_interval(),
            token: token.clone(),
            done: done.clone(),
            state: self.state.clone(),
            generation: self.generation.clone(),
            gen,
        };
        let handle = thread::spawn(move || worker.run());

        *slot = Some(Session {
            token,
            done,
            handle,
        });
    }

    /// Cancels and joins any active session. Idempotent.
    pub fn stop(&self) {
        let mut slot = self.session.lock().unwrap();
        self.preempt_locked(&mut slot);
    }

    fn preempt_locked(&self, slot: &mut Option<Session>) {
        let Some(session) = slot.take() else {
            return;
        };

        if !session.done.is_set() {
            self.state
                .store(PlaybackState::Cancelling as u8, Ordering::SeqCst);
            session.token.cancel();
        }

        if session.done.wait_for(self.config.cancel_wait) {
            let _ = session.handle.join();
        } else {
            // Stuck inside a collaborator call; leave the thread to finish
            // on its own rather than hang the caller.
            warn!(
                wait = ?self.config.cancel_wait,
                "playback: session did not observe cancellation in time, detaching"
            );
        }

        self.state
            .store(PlaybackState::Idle as u8, Ordering::SeqCst);
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.stop();
    }
}

struct SessionWorker {
    label: String,
    media: Option<PathBuf>,
    opener: Arc<dyn MediaOpener>,
    sink: Arc<dyn FrameSink>,
    tts: Arc<dyn SpeechSynthesizer>,
    interval: Duration,
    token: CancelToken,
    done: Flag,
    state: Arc<AtomicU8>,
    generation: Arc<AtomicU64>,
    gen: u64,
}

impl SessionWorker {
    fn run(self) {
        match &self.media {
            Some(path) => self.play_clip(path.clone()),
            None => self.speak(),
        }

        // A newer session may already be Playing; only the newest session
        // returns the controller to Idle.
        if self.generation.load(Ordering::SeqCst) == self.gen {
            self.state
                .store(PlaybackState::Idle as u8, Ordering::SeqCst);
        }
        self.done.set();
    }

    fn play_clip(&self, path: PathBuf) {
        let mut clip = match self.opener.open(&path) {
            Ok(clip) => clip,
            Err(e) => {
                warn!(label = %self.label, error = %e, "playback: clip open failed, speaking label instead");
                self.speak();
                return;
            }
        };

        debug!(label = %self.label, path = %path.display(), "playback: clip started");
        loop {
            if self.token.is_cancelled() {
                debug!(label = %self.label, "playback: clip cancelled");
                return;
            }
            match clip.next_frame() {
                Ok(Some(frame)) => {
                    if let Err(e) = self.sink.render(&frame) {
                        warn!(label = %self.label, error = %e, "playback: render failed, stopping clip");
                        return;
                    }
                    // Pacing delay; wakes early on cancellation.
                    if self.token.wait_for(self.interval) {
                        debug!(label = %self.label, "playback: clip cancelled");
                        return;
                    }
                }
                Ok(None) => {
                    debug!(label = %self.label, "playback: clip finished");
                    return;
                }
                Err(e) => {
                    warn!(label = %self.label, error = %e, "playback: frame decode failed, stopping clip");
                    return;
                }
            }
        }
    }

    fn speak(&self) {
        if self.token.is_cancelled() {
            return;
        }
        debug!(label = %self.label, "playback: speaking label");
        if let Err(e) = self.tts.speak(&self.label) {
            warn!(label = %self.label, error = %e, "playback: speech synthesis failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlaybackError;
    use crate::sink::{ClipReader, MediaFrame};
    use std::path::Path;
    use std::time::Instant;

    /// Opener whose clips yield `frames` frames, each tagged with the clip
    /// path so interleaving across sessions is visible in the sink log.
    struct FakeOpener {
        frames: u32,
    }

    struct FakeClip {
        tag: String,
        next: u32,
        frames: u32,
    }

    impl MediaOpener for FakeOpener {
        fn open(&self, path: &Path) -> Result<Box<dyn ClipReader>, PlaybackError> {
            if path.to_string_lossy().contains("missing") {
                return Err(PlaybackError::Open {
                    path: path.to_path_buf(),
                    reason: "no such clip".into(),
                });
            }
            Ok(Box::new(FakeClip {
                tag: path.file_stem().unwrap().to_string_lossy().into_owned(),
                next: 0,
                frames: self.frames,
            }))
        }
    }

    impl ClipReader for FakeClip {
        fn next_frame(&mut self) -> Result<Option<MediaFrame>, PlaybackError> {
            if self.next >= self.frames {
                return Ok(None);
            }
            let frame = MediaFrame {
                index: self.next,
                data: self.tag.clone().into_bytes(),
            };
            self.next += 1;
            Ok(Some(frame))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        rendered: Mutex<Vec<(String, u32)>>,
    }

    impl FrameSink for RecordingSink {
        fn render(&self, frame: &MediaFrame) -> Result<(), PlaybackError> {
            let tag = String::from_utf8_lossy(&frame.data).into_owned();
            self.rendered.lock().unwrap().push((tag, frame.index));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingVoice {
        spoken: Mutex<Vec<String>>,
    }

    impl SpeechSynthesizer for RecordingVoice {
        fn speak(&self, text: &str) -> Result<(), PlaybackError> {
            self.spoken.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn controller(
        frames: u32,
        fps: u32,
    ) -> (PlaybackController, Arc<RecordingSink>, Arc<RecordingVoice>) {
        let sink = Arc::new(RecordingSink::default());
        let voice = Arc::new(RecordingVoice::default());
        let ctrl = PlaybackController::new(
            Arc::new(FakeOpener { frames }),
            sink.clone(),
            voice.clone(),
            PlaybackConfig::default().with_frame_rate(fps),
        );
        (ctrl, sink, voice)
    }

    fn wait_idle(ctrl: &PlaybackController, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        while ctrl.state() != PlaybackState::Idle {
            assert!(Instant::now() < deadline, "controller never became idle");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn plays_all_frames_then_idle() {
        let (ctrl, sink, _voice) = controller(3, 200);
        ctrl.play(&CatalogEntry::with_media("hello", "clips/hello.mp4"));

        wait_idle(&ctrl, Duration::from_secs(2));

        let rendered = sink.rendered.lock().unwrap();
        assert_eq!(
            *rendered,
            vec![
                ("hello".to_string(), 0),
                ("hello".to_string(), 1),
                ("hello".to_string(), 2),
            ]
        );
    }

    #[test]
    fn entry_without_media_is_spoken() {
        let (ctrl, sink, voice) = controller(3, 200);
        ctrl.play(&CatalogEntry::with_reference("wave", vec![0.0]));

        wait_idle(&ctrl, Duration::from_secs(2));

        assert!(sink.rendered.lock().unwrap().is_empty());
        assert_eq!(*voice.spoken.lock().unwrap(), vec!["wave".to_string()]);
    }

    #[test]
    fn open_failure_falls_back_to_speech() {
        let (ctrl, _sink, voice) = controller(3, 200);
        ctrl.play(&CatalogEntry::with_media("gone", "clips/missing.mp4"));

        wait_idle(&ctrl, Duration::from_secs(2));
        assert_eq!(*voice.spoken.lock().unwrap(), vec!["gone".to_string()]);
    }

    #[test]
    fn new_play_preempts_running_session() {
        // 20 fps -> 50 ms per frame; 1000-frame clip runs ~50 s uncancelled.
        let (ctrl, sink, _voice) = controller(1000, 20);
        ctrl.play(&CatalogEntry::with_media("first", "clips/first.mp4"));
        thread::sleep(Duration::from_millis(120));

        let started = Instant::now();
        ctrl.play(&CatalogEntry::with_media("second", "clips/second.mp4"));
        // Preemption must complete within roughly one pacing interval.
        assert!(
            started.elapsed() < Duration::from_millis(200),
            "preemption took {:?}",
            started.elapsed()
        );

        thread::sleep(Duration::from_millis(120));
        ctrl.stop();

        let rendered = sink.rendered.lock().unwrap();
        let first_frames: Vec<u32> = rendered
            .iter()
            .filter(|(tag, _)| tag == "first")
            .map(|&(_, i)| i)
            .collect();
        let second_frames: Vec<u32> = rendered
            .iter()
            .filter(|(tag, _)| tag == "second")
            .map(|&(_, i)| i)
            .collect();

        // The first clip was cut short, the second one ran.
        assert!(!first_frames.is_empty());
        assert!(first_frames.len() < 10);
        assert!(!second_frames.is_empty());

        // No interleaving: every "first" render precedes every "second" one.
        let last_first = rendered
            .iter()
            .rposition(|(tag, _)| tag == "first")
            .unwrap();
        let first_second = rendered
            .iter()
            .position(|(tag, _)| tag == "second")
            .unwrap();
        assert!(last_first < first_second);
    }

    #[test]
    fn stop_is_idempotent() {
        let (ctrl, _sink, _voice) = controller(1000, 20);
        ctrl.stop();
        ctrl.play(&CatalogEntry::with_media("x", "clips/x.mp4"));
        ctrl.stop();
        ctrl.stop();
        assert_eq!(ctrl.state(), PlaybackState::Idle);
    }

    #[test]
    fn state_reports_playing_during_session() {
        let (ctrl, _sink, _voice) = controller(1000, 20);
        ctrl.play(&CatalogEntry::with_media("x", "clips/x.mp4"));
        thread::sleep(Duration::from_millis(60));
        assert_eq!(ctrl.state(), PlaybackState::Playing);
        ctrl.stop();
        assert_eq!(ctrl.state(), PlaybackState::Idle);
    }
}
