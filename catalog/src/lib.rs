pub mod catalog;
pub mod entry;
pub mod error;
pub mod matcher;
pub mod text;

pub use catalog::Catalog;
pub use entry::CatalogEntry;
pub use error::CatalogError;
pub use matcher::{euclidean_distance, NearestMatch};
pub use text::{extract_label, normalize};
