use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use crate::utils;

bitflags! {
    /// Types according to mode unix
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct FileType: u32 {
        const FIFO = 0x1000;
        const CHR = 0x2000;
        const DIR = 0x4000;
        const BLK = 0x6000;
        const REG = 0x8000;
        const LNK = 0xA000;
    }
}

impl FileType {
    const MASK: u32 = 0xF000;

    /// Extracts the type bits of a unix mode.
    pub const fn from_mode(mode: u32) -> Self {
        Self::from_bits_retain(mode & Self::MASK)
    }
}

/// Optional per-entry details a backend may report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub size: Option<u64>,
    pub file_type: FileType,
    pub permissions: Option<u32>,
    pub modified: Option<DateTime<Utc>>,
}

macro_rules! impl_fn_type {
    ($name:ident, $doc_name:expr, $flag:ident) => {
        #[doc = "Returns `true` if is a "]
        #[doc = $doc_name]
        pub fn $name(&self) -> bool {
            self.file_type == FileType::$flag
        }
    };
}

impl Metadata {
    impl_fn_type!(is_dir, "dir", DIR);
    impl_fn_type!(is_regular, "regular", REG);
    impl_fn_type!(is_symlink, "symlink", LNK);

    pub fn directory(modified: Option<DateTime<Utc>>) -> Self {
        Self {
            file_type: FileType::DIR,
            modified,
            ..Default::default()
        }
    }

    pub fn regular(size: u64, modified: Option<DateTime<Utc>>) -> Self {
        Self {
            size: Some(size),
            file_type: FileType::REG,
            modified,
            ..Default::default()
        }
    }

    /// Returns the size of the file
    pub fn len(&self) -> u64 {
        self.size.unwrap_or(0)
    }
}

/// For simple conversion of local `Metadata` into entry metadata
impl From<&fs::Metadata> for Metadata {
    fn from(metadata: &fs::Metadata) -> Self {
        let file_type = if metadata.is_dir() {
            FileType::DIR
        } else if metadata.is_symlink() {
            FileType::LNK
        } else {
            FileType::REG
        };

        #[cfg(unix)]
        let permissions = metadata.permissions().mode() & 0o7777;
        #[cfg(not(unix))]
        let permissions = if metadata.permissions().readonly() {
            0o555
        } else {
            0o777
        };

        Self {
            size: Some(metadata.len()),
            file_type,
            permissions: Some(permissions),
            modified: metadata.modified().ok().map(utils::datetime),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_from_mode() {
        assert_eq!(FileType::from_mode(0o40755), FileType::DIR);
        assert_eq!(FileType::from_mode(0o100644), FileType::REG);
        assert_eq!(FileType::from_mode(0o120777), FileType::LNK);
    }

    #[test]
    fn test_symlink_is_not_regular() {
        let metadata = Metadata {
            file_type: FileType::LNK,
            ..Default::default()
        };
        assert!(metadata.is_symlink());
        assert!(!metadata.is_regular());
    }

    #[test]
    fn test_regular_len() {
        let metadata = Metadata::regular(10, None);
        assert!(metadata.is_regular());
        assert_eq!(metadata.len(), 10);
        assert_eq!(Metadata::default().len(), 0);
    }
}
