//! Brute-force nearest-reference matching over the catalog.

use crate::catalog::Catalog;
use crate::entry::CatalogEntry;

/// Result of a successful nearest-reference search.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestMatch<'a> {
    /// The winning catalog entry.
    pub entry: &'a CatalogEntry,

    /// Euclidean distance between the query and the entry's reference.
    pub distance: f32,
}

/// Euclidean distance between two vectors of equal arity.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

/// Scans every matchable entry in catalog insertion order and returns the one
/// with minimum Euclidean distance to `query`, if that distance is below
/// `threshold`. References of a different arity than the query are skipped.
/// Ties keep the earlier entry, so results are deterministic.
pub fn nearest<'a>(
    catalog: &'a Catalog,
    query: &[f32],
    threshold: f32,
) -> Option<NearestMatch<'a>> {
    let mut best: Option<NearestMatch<'a>> = None;

    for entry in catalog.entries() {
        let Some(reference) = entry.reference.as_deref() else {
            continue;
        };
        if reference.len() != query.len() {
            continue;
        }

        let distance = euclidean_distance(query, reference);
        match &best {
            Some(b) if distance >= b.distance => {}
            _ => best = Some(NearestMatch { entry, distance }),
        }
    }

    best.filter(|m| m.distance < threshold)
}
