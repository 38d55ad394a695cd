//! Directory entries and file metadata.
//!
//! Only the entry name is part of the portable contract; [`Metadata`] is
//! filled in by backends that can supply it.

mod dir;
mod metadata;

pub use dir::{DirEntry, ReadDir};
pub use metadata::{FileType, Metadata};
