//! Engine coordinator.
//!
//! Owns both stream workers, the event channel, and the playback
//! controller, and runs the consumer thread that turns recognized events
//! into playback. Start/stop are per stream and idempotent; shutdown tears
//! the whole engine down exactly once.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use signfuse_catalog::{Catalog, CatalogEntry};
use signfuse_playback::{PlaybackController, PlaybackState};
use tracing::{debug, info, warn};

use crate::channel::EventChannel;
use crate::config::EngineConfig;
use crate::device::{SpeechSource, VisionSource};
use crate::error::EngineError;
use crate::event::SourceKind;
use crate::worker::{self, WorkerHandle, WorkerState};

pub struct Coordinator {
    catalog: Arc<Catalog>,
    config: EngineConfig,
    channel: EventChannel,
    playback: Arc<PlaybackController>,
    vision_source: Box<dyn VisionSource>,
    speech_source: Box<dyn SpeechSource>,
    vision: Option<WorkerHandle>,
    speech: Option<WorkerHandle>,
    consumer: Option<JoinHandle<()>>,
    shut_down: bool,
}

impl Coordinator {
    /// Builds a coordinator and starts its consumer thread. No workers run
    /// until [`start`](Self::start) is called.
    pub fn new(
        catalog: Arc<Catalog>,
        vision_source: Box<dyn VisionSource>,
        speech_source: Box<dyn SpeechSource>,
        playback: Arc<PlaybackController>,
        config: EngineConfig,
    ) -> Self {
        let channel = EventChannel::new(config.channel_capacity);

        let consumer_channel = channel.clone();
        let consumer_catalog = catalog.clone();
        let consumer_playback = playback.clone();
        let consumer = thread::spawn(move || {
            consume(consumer_channel, consumer_catalog, consumer_playback)
        });

        Self {
            catalog,
            config,
            channel,
            playback,
            vision_source,
            speech_source,
            vision: None,
            speech: None,
            consumer: Some(consumer),
            shut_down: false,
        }
    }

    /// Starts the worker for one stream. A no-op if that worker is already
    /// active. A previously stopped worker is reaped and replaced.
    pub fn start(&mut self, kind: SourceKind) -> Result<(), EngineError> {
        if self.shut_down {
            return Err(EngineError::ShutDown);
        }

        let slot = match kind {
            SourceKind::Vision => &mut self.vision,
            SourceKind::Speech => &mut self.speech,
        };
        if let Some(handle) = slot {
            if handle.is_active() {
                debug!(kind = %kind, "coordinator: worker already active");
                return Ok(());
            }
            // Reap the finished worker before replacing it.
            handle.stop();
            *slot = None;
        }

        let handle = match kind {
            SourceKind::Vision => {
                let (device, detector) =
                    self.vision_source
                        .open()
                        .map_err(|source| EngineError::DeviceUnavailable { kind, source })?;
                worker::spawn_vision(
                    device,
                    detector,
                    self.catalog.clone(),
                    self.channel.clone(),
                    &self.config,
                )
            }
            SourceKind::Speech => {
                let (device, transcriber) =
                    self.speech_source
                        .open()
                        .map_err(|source| EngineError::DeviceUnavailable { kind, source })?;
                worker::spawn_speech(
                    device,
                    transcriber,
                    self.catalog.clone(),
                    self.channel.clone(),
                    &self.config,
                )
            }
        };

        info!(kind = %kind, "coordinator: worker started");
        match kind {
            SourceKind::Vision => self.vision = Some(handle),
            SourceKind::Speech => self.speech = Some(handle),
        }
        Ok(())
    }

    /// Stops the worker for one stream, joining its thread. A no-op if the
    /// worker is not running.
    pub fn stop(&mut self, kind: SourceKind) {
        let slot = match kind {
            SourceKind::Vision => &mut self.vision,
            SourceKind::Speech => &mut self.speech,
        };
        if let Some(mut handle) = slot.take() {
            handle.stop();
            info!(kind = %kind, "coordinator: worker stopped");
        }
    }

    /// State of one stream's worker, or `None` if it was never started (or
    /// was stopped and reaped).
    pub fn worker_state(&self, kind: SourceKind) -> Option<WorkerState> {
        match kind {
            SourceKind::Vision => self.vision.as_ref().map(WorkerHandle::state),
            SourceKind::Speech => self.speech.as_ref().map(WorkerHandle::state),
        }
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback.state()
    }

    /// Number of recognized events queued but not yet consumed.
    pub fn pending_events(&self) -> usize {
        self.channel.len()
    }

    /// Stops both workers, drains and discards pending events, joins the
    /// consumer thread, and cancels any active playback. Idempotent.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        self.stop(SourceKind::Vision);
        self.stop(SourceKind::Speech);

        self.channel.shutdown();
        let discarded = self.channel.drain();
        if !discarded.is_empty() {
            debug!(count = discarded.len(), "coordinator: discarded pending events");
        }

        // The consumer may still be mid-dispatch on an event it popped before
        // the channel shut down; it must be joined before playback is
        // cancelled, or the session it starts would outlive shutdown.
        if let Some(consumer) = self.consumer.take() {
            if consumer.join().is_err() {
                warn!("coordinator: consumer thread panicked");
            }
        }
        self.playback.stop();
        info!("coordinator: shut down");
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Consumer loop: each received event preempts whatever is playing and
/// starts its catalog entry. A label missing from the catalog is still
/// acknowledged with a spoken fallback.
fn consume(channel: EventChannel, catalog: Arc<Catalog>, playback: Arc<PlaybackController>) {
    while let Ok(event) = channel.recv() {
        debug!(event = %event, "coordinator: consuming");
        match catalog.lookup(&event.label) {
            Some(entry) => playback.play(entry),
            None => {
                warn!(label = %event.label, "coordinator: label not in catalog, speaking it");
                let fallback = CatalogEntry {
                    name: event.label,
                    reference: None,
                    media: None,
                };
                playback.play(&fallback);
            }
        }
    }
    debug!("coordinator: consumer exiting");
}
