//! Input timeline loaded from YAML.
//!
//! ```yaml
//! steps:
//!   - after_ms: 200
//!     vision: [0.12, 0.45, 0.01]
//!   - after_ms: 900
//!     speech: "hello there"
//! ```
//!
//! `after_ms` is relative to the start of the run.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub after_ms: u64,

    #[serde(flatten)]
    pub input: Input,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Input {
    /// A flattened landmark vector, handed straight to the detector.
    Vision(Vec<f32>),
    /// An utterance, handed straight to the transcriber.
    Speech(String),
}

impl Script {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let script: Script = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(script)
    }
}
