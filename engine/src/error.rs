use thiserror::Error;

use crate::device::DeviceError;
use crate::event::SourceKind;

#[derive(Error, Debug)]
pub enum EngineError {
    /// A worker's device could not be opened. Fatal to that start attempt
    /// only; the other stream and playback are unaffected.
    #[error("engine: {kind} device unavailable: {source}")]
    DeviceUnavailable {
        kind: SourceKind,
        #[source]
        source: DeviceError,
    },

    /// The coordinator has already been shut down.
    #[error("engine: coordinator is shut down")]
    ShutDown,
}
