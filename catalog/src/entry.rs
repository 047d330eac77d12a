use std::fmt;
use std::path::PathBuf;

/// A single catalog entry: a sign label with an optional reference feature
/// vector (for gesture matching) and an optional media clip path (for
/// playback). At least one of the two is always present after load.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    /// Lower-cased sign label, unique within the catalog.
    pub name: String,

    /// Reference feature vector in normalized landmark space.
    /// `None` for entries that only map a label to a media clip.
    pub reference: Option<Vec<f32>>,

    /// Path to the reference media clip for this label.
    pub media: Option<PathBuf>,
}

impl CatalogEntry {
    /// Creates an entry holding only a reference vector.
    pub fn with_reference(name: impl Into<String>, reference: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            reference: Some(reference),
            media: None,
        }
    }

    /// Creates an entry holding only a media path.
    pub fn with_media(name: impl Into<String>, media: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            reference: None,
            media: Some(media.into()),
        }
    }

    /// Returns true if the entry can participate in vector matching.
    pub fn is_matchable(&self) -> bool {
        self.reference.is_some()
    }
}

impl fmt::Display for CatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.reference, &self.media) {
            (Some(r), Some(m)) => {
                write!(f, "{} ({} dims, {})", self.name, r.len(), m.display())
            }
            (Some(r), None) => write!(f, "{} ({} dims)", self.name, r.len()),
            (None, Some(m)) => write!(f, "{} ({})", self.name, m.display()),
            (None, None) => write!(f, "{}", self.name),
        }
    }
}
