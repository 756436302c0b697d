pub mod catalog;
pub mod error;

pub use catalog::{FileMeta, ListingRow, VfsCatalog};
pub use error::VfsError;
