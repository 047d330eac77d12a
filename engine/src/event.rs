//! Recognized events.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which stream produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Vision,
    Speech,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Vision => "vision",
            SourceKind::Speech => "speech",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single successful recognition: one catalog label matched by one stream.
///
/// Events are plain values; they are copied onto the channel and consumed
/// exactly once, carrying no shared state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedEvent {
    pub source: SourceKind,
    pub label: String,
    pub timestamp: DateTime<Utc>,
}

impl RecognizedEvent {
    pub fn new(source: SourceKind, label: impl Into<String>) -> Self {
        Self {
            source,
            label: label.into(),
            timestamp: Utc::now(),
        }
    }
}

impl fmt::Display for RecognizedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_kind_display() {
        assert_eq!(SourceKind::Vision.to_string(), "vision");
        assert_eq!(SourceKind::Speech.to_string(), "speech");
    }

    #[test]
    fn event_display() {
        let ev = RecognizedEvent::new(SourceKind::Speech, "hello");
        assert_eq!(ev.to_string(), "speech:hello");
    }

    #[test]
    fn event_serializes_source_lowercase() {
        let ev = RecognizedEvent::new(SourceKind::Vision, "wave");
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("\"vision\""));
    }
}
