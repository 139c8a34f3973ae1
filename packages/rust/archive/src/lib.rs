//! Archive extraction and bank merging.
//!
//! [`Extractor`] unpacks a zip archive into the extraction cache in one of the
//! three [`ExtractMode`](dictindex_shared::ExtractMode) shapes. [`BankMerger`]
//! stitches sharded bank files from a subdirectory extraction back into one
//! record collection.

mod extract;
mod merge;

pub use extract::{Extracted, Extractor};
pub use merge::{BankMerger, MANIFEST_FILE, fragment_number, is_fragment, merge_banks};
