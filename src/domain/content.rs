//! The `tsk_objects` discriminant and the tagged-variant content model.

use serde::{Deserialize, Serialize};

/// `tsk_objects.type` — the discriminant of every node in the object forest.
///
/// Values are part of the on-disk contract (§6.1 of the spec): once assigned
/// they are never renumbered. `AbstractFile` covers every `FileKind`
/// (file-system file, virtual directory, ..., slack) — the object table only
/// needs to know "this is a file-ish thing"; `tsk_files.type` carries the
/// finer discriminant (see `crate::domain::file::FileKind`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ObjectType {
    Image = 0,
    VolumeSystem = 1,
    Volume = 2,
    Pool = 3,
    FileSystem = 4,
    AbstractFile = 5,
    Artifact = 6,
    Report = 7,
    OsAccount = 8,
    HostAddress = 9,
    Unsupported = 10,
}

impl ObjectType {
    pub fn from_db(v: i32) -> Option<Self> {
        Some(match v {
            0 => Self::Image,
            1 => Self::VolumeSystem,
            2 => Self::Volume,
            3 => Self::Pool,
            4 => Self::FileSystem,
            5 => Self::AbstractFile,
            6 => Self::Artifact,
            7 => Self::Report,
            8 => Self::OsAccount,
            9 => Self::HostAddress,
            10 => Self::Unsupported,
            _ => return None,
        })
    }

    /// True for object types that never carry a `par_obj_id`: data-source
    /// roots (images, logical-file-set roots) and reports.
    pub fn is_parentless_capable(self) -> bool {
        matches!(self, Self::Image | Self::Report)
    }
}

/// The re-architected `Content` tagged variant described in the spec's
/// design notes: a single enum instead of the `Content`/`AbstractContent`/
/// `AbstractFile`/`FsContent`/`File`/`Directory`/... inheritance chain.
/// `kind` on `AbstractFile` carries the file subvariant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Content {
    Image(ImageInfo),
    VolumeSystem(VolumeSystemInfo),
    Volume(VolumeInfo),
    Pool(PoolInfo),
    FileSystem(FileSystemInfo),
    AbstractFile(crate::domain::file::File),
    Artifact(ArtifactRef),
    Report(ReportInfo),
    OsAccount(OsAccountRef),
    HostAddress(HostAddressRef),
    Unsupported { obj_id: i64 },
}

impl Content {
    pub fn obj_id(&self) -> i64 {
        match self {
            Content::Image(i) => i.obj_id,
            Content::VolumeSystem(v) => v.obj_id,
            Content::Volume(v) => v.obj_id,
            Content::Pool(p) => p.obj_id,
            Content::FileSystem(f) => f.obj_id,
            Content::AbstractFile(f) => f.obj_id,
            Content::Artifact(a) => a.obj_id,
            Content::Report(r) => r.obj_id,
            Content::OsAccount(o) => o.obj_id,
            Content::HostAddress(h) => h.obj_id,
            Content::Unsupported { obj_id } => *obj_id,
        }
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            Content::Image(_) => ObjectType::Image,
            Content::VolumeSystem(_) => ObjectType::VolumeSystem,
            Content::Volume(_) => ObjectType::Volume,
            Content::Pool(_) => ObjectType::Pool,
            Content::FileSystem(_) => ObjectType::FileSystem,
            Content::AbstractFile(_) => ObjectType::AbstractFile,
            Content::Artifact(_) => ObjectType::Artifact,
            Content::Report(_) => ObjectType::Report,
            Content::OsAccount(_) => ObjectType::OsAccount,
            Content::HostAddress(_) => ObjectType::HostAddress,
            Content::Unsupported { .. } => ObjectType::Unsupported,
        }
    }
}

/// A parentless object: either a parsed image or a logical-files root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInfo {
    pub obj_id: i64,
    pub device_id: String,
    pub time_zone: String,
    pub size: i64,
    pub sector_size: i32,
    pub md5: Option<String>,
    pub sha1: Option<String>,
    pub sha256: Option<String>,
    pub acquisition_details: Option<String>,
    pub acquisition_tool_name: Option<String>,
    pub acquisition_tool_version: Option<String>,
    pub acquisition_tool_settings: Option<serde_json::Value>,
    pub added_date_time: i64,
    pub host_id: Option<i64>,
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeSystemInfo {
    pub obj_id: i64,
    pub vs_type: i32,
    pub img_offset: i64,
    pub block_size: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub obj_id: i64,
    pub addr: i64,
    pub start: i64,
    pub length: i64,
    pub flags: i32,
    /// The source mixes `desc`/`descr` spellings across backends (§9 open
    /// question); this is the `descr` value with `desc` as a fallback read,
    /// never normalised away — see `crate::schema::vs_parts`.
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolInfo {
    pub obj_id: i64,
    pub pool_type: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSystemInfo {
    pub obj_id: i64,
    pub data_source_obj_id: i64,
    pub img_offset: i64,
    pub fs_type: i32,
    pub block_size: i32,
    pub block_count: i64,
    pub root_inum: i64,
    pub first_inum: i64,
    pub last_inum: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub obj_id: i64,
    pub artifact_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportInfo {
    pub obj_id: i64,
    pub path: String,
    pub source_module_name: String,
    pub report_name: String,
    pub created_time: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsAccountRef {
    pub obj_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostAddressRef {
    pub obj_id: i64,
}
