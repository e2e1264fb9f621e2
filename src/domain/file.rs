//! `tsk_files` row shape and its parallel enums.
//!
//! Field layout is grounded on the teacher's `domain::entry::Entry` (a flat
//! struct carrying identity, kind, size, the time quadruple and platform
//! identifiers) generalized to the case database's file model from
//! `spec.md` §3.

use serde::{Deserialize, Serialize};

/// `TSK_DB_FILES_TYPE_ENUM` — how a file's bytes are stored/derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum FileKind {
    FsFile = 0,
    VirtualDir = 1,
    LocalDir = 2,
    LocalFile = 3,
    DerivedFile = 4,
    Carved = 5,
    UnallocBlocks = 6,
    LayoutFile = 7,
    Slack = 8,
}

impl FileKind {
    pub fn from_db(v: i32) -> Option<Self> {
        Some(match v {
            0 => Self::FsFile,
            1 => Self::VirtualDir,
            2 => Self::LocalDir,
            3 => Self::LocalFile,
            4 => Self::DerivedFile,
            5 => Self::Carved,
            6 => Self::UnallocBlocks,
            7 => Self::LayoutFile,
            8 => Self::Slack,
            _ => return None,
        })
    }

    /// Files whose bytes live outside the DB, needing a `tsk_files_path` row.
    pub fn has_local_path(self) -> bool {
        matches!(self, Self::DerivedFile | Self::LocalFile | Self::LocalDir)
    }

    /// Files backed by `tsk_file_layout` byte ranges.
    pub fn has_layout(self) -> bool {
        matches!(self, Self::Carved | Self::UnallocBlocks | Self::LayoutFile)
    }

    /// Directories never generate timeline events and are never carved.
    pub fn is_directory(self) -> bool {
        matches!(self, Self::VirtualDir | Self::LocalDir)
    }

    /// File store kinds for which a successful insert triggers timeline
    /// event derivation (§4.4): file-system, derived and local files.
    pub fn emits_timeline_events(self) -> bool {
        matches!(self, Self::FsFile | Self::DerivedFile | Self::LocalFile)
    }
}

/// `TSK_FS_NAME_TYPE_ENUM` subset surfaced through `tsk_files.dir_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum DirType {
    Undef = 0,
    Fifo = 1,
    Dir = 2,
    Chr = 3,
    Blk = 4,
    Reg = 5,
    Lnk = 6,
    Shad = 7,
    Sock = 8,
    Wht = 9,
    Virt = 10,
}

/// `TSK_FS_META_TYPE_ENUM` subset surfaced through `tsk_files.meta_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum MetaType {
    Undef = 0,
    Fifo = 1,
    Chr = 2,
    Dir = 3,
    Blk = 4,
    Reg = 5,
    Lnk = 6,
    Shad = 7,
    Sock = 8,
    Wht = 9,
    Virt = 10,
    VirtDir = 11,
}

/// `TSK_FS_NAME_FLAG_ENUM` — allocated/unallocated as seen by directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum DirFlag {
    Allocated = 1,
    Unallocated = 2,
}

/// `TSK_FS_META_FLAG_ENUM` bitmask — allocated/unallocated/used/unused, etc.
pub mod meta_flag {
    pub const ALLOCATED: i32 = 0x01;
    pub const UNALLOCATED: i32 = 0x02;
    pub const USED: i32 = 0x04;
    pub const UNUSED: i32 = 0x08;
    pub const COMPRESSED: i32 = 0x10;
    pub const ORPHAN: i32 = 0x20;
}
pub use meta_flag::ALLOCATED as MetaFlag; // re-export a default for convenience imports

/// Known status of a file's content hash against a hash-set lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum KnownStatus {
    Unknown = 0,
    Known = 1,
    KnownBad = 2,
}

/// Whether a file's bytes were actually collected into/alongside the case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum CollectedStatus {
    Unknown = 0,
    NotCollected = 1,
    CollectedAtAcquisition = 2,
    CollectedPostAcquisition = 3,
}

impl CollectedStatus {
    pub fn from_db(v: i32) -> Option<Self> {
        Some(match v {
            0 => Self::Unknown,
            1 => Self::NotCollected,
            2 => Self::CollectedAtAcquisition,
            3 => Self::CollectedPostAcquisition,
            _ => return None,
        })
    }
}

/// The sentinel used for `owner_uid` when the owner is unknown (§3, §4.4).
pub const UNKNOWN_OWNER_UID: &str = "-";

/// `tsk_files` row plus the `tsk_objects` identity it always has.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub obj_id: i64,
    pub fs_obj_id: Option<i64>,
    pub data_source_obj_id: i64,
    pub parent_path: String,
    pub name: String,
    pub extension: String,
    pub kind: FileKind,
    pub dir_type: DirType,
    pub meta_type: MetaType,
    pub dir_flags: i32,
    pub meta_flags: i32,
    pub size: i64,
    pub ctime: i64,
    pub crtime: i64,
    pub atime: i64,
    pub mtime: i64,
    pub md5: Option<String>,
    pub sha1: Option<String>,
    pub sha256: Option<String>,
    pub known: KnownStatus,
    pub mime_type: Option<String>,
    pub owner_uid: String,
    pub os_account_obj_id: Option<i64>,
    pub collected: CollectedStatus,
    pub has_path: bool,
}

impl File {
    /// `extract_extension`: lower-cased suffix after the final `.`, or empty
    /// if there is none, or if the dot is the first character, or if the
    /// dot is the file's last character (testable property #9).
    pub fn extract_extension(name: &str) -> String {
        match name.rfind('.') {
            Some(0) => String::new(),
            Some(idx) if idx == name.len() - 1 => String::new(),
            Some(idx) => name[idx + 1..].to_ascii_lowercase(),
            None => String::new(),
        }
    }

    /// Size is clamped to zero; never negative on disk (§4.4).
    pub fn clamp_size(size: i64) -> i64 {
        size.max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_extraction_matches_testable_property_9() {
        assert_eq!(File::extract_extension("foo.tar.gz"), "gz");
        assert_eq!(File::extract_extension(".hidden"), "");
        assert_eq!(File::extract_extension("NoDot"), "");
        assert_eq!(File::extract_extension("bar."), "");
        assert_eq!(File::extract_extension("Report.PDF"), "pdf");
    }

    #[test]
    fn size_is_clamped_at_zero() {
        assert_eq!(File::clamp_size(-5), 0);
        assert_eq!(File::clamp_size(0), 0);
        assert_eq!(File::clamp_size(42), 42);
    }
}
