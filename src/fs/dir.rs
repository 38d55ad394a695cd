use serde::Serialize;
use std::collections::VecDeque;

use super::{FileType, Metadata};

/// Entries returned by the [`ReadDir`] iterator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntry {
    name: String,
    metadata: Option<Metadata>,
}

impl DirEntry {
    pub fn new<T: Into<String>>(name: T, metadata: Option<Metadata>) -> Self {
        Self {
            name: name.into(),
            metadata,
        }
    }

    /// Returns the file name for the file that this entry points at.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn into_file_name(self) -> String {
        self.name
    }

    /// Returns the file type if the backend reported one.
    #[must_use]
    pub fn file_type(&self) -> Option<FileType> {
        self.metadata.as_ref().map(|metadata| metadata.file_type)
    }

    /// Returns the metadata for the file that this entry points at.
    #[must_use]
    pub const fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }
}

/// Iterator over the entries of one listing call.
///
/// The first `next` is the find-first step, every later call a find-next.
/// Entries are fully materialised, so dropping the iterator early never
/// leaves a listing open on the transport.
#[derive(Debug, Default)]
pub struct ReadDir {
    entries: VecDeque<DirEntry>,
}

impl Iterator for ReadDir {
    type Item = DirEntry;

    fn next(&mut self) -> Option<Self::Item> {
        match self.entries.pop_front() {
            None => None,
            Some(entry) if entry.name == "." || entry.name == ".." => self.next(),
            Some(entry) => Some(entry),
        }
    }
}

impl FromIterator<DirEntry> for ReadDir {
    fn from_iter<I: IntoIterator<Item = DirEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
