//! Core domain types for the case database.
//!
//! These are the bit-exact discriminants and value shapes that the schema
//! (`crate::schema`), object graph (`crate::objects`) and file store
//! (`crate::files`) persist. Modelled as tagged variants rather than the
//! deep `Content`/`AbstractFile`/`FsContent`/... inheritance chain the
//! original forensic toolkit uses — see `DESIGN.md` for the rationale.

pub mod content;
pub mod file;
pub mod score;
pub mod time;

pub use content::{Content, ObjectType};
pub use file::{
    CollectedStatus, DirFlag, DirType, File, FileKind, KnownStatus, MetaFlag, MetaType,
};
pub use score::{Priority, Significance};
