use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("catalog: cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("catalog: {path} is not a valid catalog file: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("catalog: no usable entries after load")]
    Empty,
}
