//! Catalog loading and lookup.
//!
//! The catalog file is a JSON object mapping each label to either a flat
//! numeric array (a reference feature vector) or a string (a media clip
//! path):
//!
//! ```json
//! {
//!   "hello": [0.12, 0.43, 0.01, ...],
//!   "goodbye": "clips/goodbye.mp4"
//! }
//! ```
//!
//! Malformed entries are skipped with a warning; a catalog with no usable
//! entries at all is an error. The catalog is immutable after load and safe
//! to share read-only across threads.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::entry::CatalogEntry;
use crate::error::CatalogError;
use crate::matcher::{self, NearestMatch};

/// Media file extensions recognized by [`Catalog::scan_media_dir`].
const MEDIA_EXTENSIONS: &[&str] = &["mp4", "avi", "mov"];

/// Immutable mapping from sign label to [`CatalogEntry`], preserving the
/// order entries were added so nearest-match tie-breaking is deterministic.
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Loads a catalog from a JSON file.
    ///
    /// Returns [`CatalogError::Empty`] if no entry survives validation.
    /// A reference to a media file that does not exist is logged as a
    /// warning but kept, so lookup-only use still works.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let root: serde_json::Map<String, Value> =
            serde_json::from_slice(&data).map_err(|e| CatalogError::Malformed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        let mut catalog = Self {
            entries: Vec::with_capacity(root.len()),
            index: HashMap::with_capacity(root.len()),
        };

        // serde_json is built with preserve_order, so entries keep the
        // catalog file's document order and tie-breaks follow it.
        for (label, value) in root {
            match parse_entry(&label, &value, base_dir) {
                Some(entry) => catalog.insert(entry),
                None => {
                    warn!(label = %label, "catalog: skipping malformed entry");
                }
            }
        }

        if catalog.is_empty() {
            return Err(CatalogError::Empty);
        }

        debug!(
            entries = catalog.len(),
            path = %path.display(),
            "catalog: loaded"
        );
        Ok(catalog)
    }

    /// Builds a catalog directly from entries. Labels are lower-cased; a
    /// repeated label merges into the existing entry (later reference/media
    /// fill the missing half, matching file + media-dir loading).
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Result<Self, CatalogError> {
        let mut catalog = Self {
            entries: Vec::with_capacity(entries.len()),
            index: HashMap::with_capacity(entries.len()),
        };
        for entry in entries {
            catalog.insert(entry);
        }
        if catalog.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(catalog)
    }

    /// Merges every media file found directly in `dir` into the catalog,
    /// using the lower-cased file stem as the label. Labels already present
    /// gain a media path; new labels become media-only entries.
    pub fn scan_media_dir(&mut self, dir: impl AsRef<Path>) -> Result<usize, CatalogError> {
        let dir = dir.as_ref();
        let read = std::fs::read_dir(dir).map_err(|source| CatalogError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut added = 0;
        for entry in read.flatten() {
            let path = entry.path();
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase());
            if !matches!(ext.as_deref(), Some(e) if MEDIA_EXTENSIONS.contains(&e)) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            self.insert(CatalogEntry::with_media(stem.to_lowercase(), path));
            added += 1;
        }

        debug!(dir = %dir.display(), added, "catalog: merged media directory");
        Ok(added)
    }

    /// Case-insensitive lookup by label.
    pub fn lookup(&self, name: &str) -> Option<&CatalogEntry> {
        let key = name.trim().to_lowercase();
        self.index.get(&key).map(|&i| &self.entries[i])
    }

    /// Returns the entry with minimum Euclidean distance to `query`, if that
    /// distance is below `threshold`. See [`matcher::nearest`].
    pub fn nearest(&self, query: &[f32], threshold: f32) -> Option<NearestMatch<'_>> {
        matcher::nearest(self, query, threshold)
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    /// Labels in insertion order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, mut entry: CatalogEntry) {
        entry.name = entry.name.trim().to_lowercase();
        if entry.name.is_empty() {
            return;
        }

        if let Some(path) = &entry.media {
            if !path.exists() {
                warn!(
                    label = %entry.name,
                    path = %path.display(),
                    "catalog: media file missing, playback for this label will fall back to speech"
                );
            }
        }

        match self.index.get(&entry.name) {
            Some(&i) => {
                let existing = &mut self.entries[i];
                if existing.reference.is_none() {
                    existing.reference = entry.reference;
                }
                if existing.media.is_none() {
                    existing.media = entry.media;
                }
            }
            None => {
                self.index.insert(entry.name.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }
}

/// Parses one `label: value` pair from the catalog file. Returns `None` for
/// values that are neither a flat numeric array nor a path string.
fn parse_entry(label: &str, value: &Value, base_dir: &Path) -> Option<CatalogEntry> {
    match value {
        Value::Array(items) => {
            let mut reference = Vec::with_capacity(items.len());
            for item in items {
                reference.push(item.as_f64()? as f32);
            }
            if reference.is_empty() {
                return None;
            }
            Some(CatalogEntry::with_reference(label, reference))
        }
        Value::String(rel) => {
            if rel.is_empty() {
                return None;
            }
            let path = base_dir.join(rel);
            Some(CatalogEntry::with_media(label, path))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_catalog(json: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(json.as_bytes()).unwrap();
        f
    }

    #[test]
    fn load_vectors_and_paths() {
        let f = write_catalog(
            r#"{
                "Hello": [0.1, 0.2, 0.3],
                "goodbye": "clips/goodbye.mp4"
            }"#,
        );
        let cat = Catalog::load(f.path()).unwrap();
        assert_eq!(cat.len(), 2);

        let hello = cat.lookup("hello").unwrap();
        assert_eq!(hello.reference.as_deref(), Some(&[0.1, 0.2, 0.3][..]));

        let goodbye = cat.lookup("GOODBYE").unwrap();
        assert!(goodbye.media.as_ref().unwrap().ends_with("clips/goodbye.mp4"));
    }

    #[test]
    fn load_keeps_document_order() {
        let f = write_catalog(
            r#"{
                "zebra": [1.0],
                "apple": [2.0],
                "mango": [3.0]
            }"#,
        );
        let cat = Catalog::load(f.path()).unwrap();
        let labels: Vec<&str> = cat.labels().collect();
        assert_eq!(labels, vec!["zebra", "apple", "mango"]);
    }

    #[test]
    fn load_skips_malformed_entries() {
        let f = write_catalog(
            r#"{
                "ok": [1.0, 2.0],
                "bad_null": null,
                "bad_mixed": [1.0, "x"],
                "bad_empty": []
            }"#,
        );
        let cat = Catalog::load(f.path()).unwrap();
        assert_eq!(cat.len(), 1);
        assert!(cat.lookup("ok").is_some());
    }

    #[test]
    fn load_empty_is_fatal() {
        let f = write_catalog(r#"{"bad": null}"#);
        assert!(matches!(Catalog::load(f.path()), Err(CatalogError::Empty)));

        let f = write_catalog("{}");
        assert!(matches!(Catalog::load(f.path()), Err(CatalogError::Empty)));
    }

    #[test]
    fn load_rejects_non_object() {
        let f = write_catalog("[1, 2, 3]");
        assert!(matches!(
            Catalog::load(f.path()),
            Err(CatalogError::Malformed { .. })
        ));
    }

    #[test]
    fn scan_media_dir_merges() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Hello.mp4"), b"").unwrap();
        std::fs::write(dir.path().join("wave.mov"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let mut cat =
            Catalog::from_entries(vec![CatalogEntry::with_reference("hello", vec![0.0])])
                .unwrap();
        let added = cat.scan_media_dir(dir.path()).unwrap();
        assert_eq!(added, 2);
        assert_eq!(cat.len(), 2);

        // Existing entry gains the media path, keeping its reference.
        let hello = cat.lookup("hello").unwrap();
        assert!(hello.reference.is_some());
        assert!(hello.media.is_some());

        assert!(cat.lookup("wave").unwrap().media.is_some());
        assert!(cat.lookup("notes").is_none());
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let cat =
            Catalog::from_entries(vec![CatalogEntry::with_media("Thank You", "t.mp4")])
                .unwrap();
        assert!(cat.lookup("thank you").is_some());
        assert!(cat.lookup("  THANK YOU ").is_some());
    }
}
