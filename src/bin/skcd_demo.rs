//! Minimal end-to-end walkthrough: open a fresh embedded case, add an
//! image/file-system/file, tag it, insert an analysis result, and print
//! the aggregate score — exercising C1–C10 in one straight-line run.

use skcd::attributes::AttributeValue;
use skcd::backend::BackendKind;
use skcd::blackboard::{self, ArtifactCategory, ArtifactIdAllocator, NewAnalysisResult};
use skcd::config::{BackendDescriptor, CaseConfig};
use skcd::domain::score::{Priority, Significance};
use skcd::domain::{FileKind, KnownStatus};
use skcd::files::{self, NewFile, NoopTimelineSink};
use skcd::objects::{self};
use skcd::tags;
use skcd::Case;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let db_path = PathBuf::from("/tmp/skcd-demo.db");
    let _ = std::fs::remove_file(&db_path);

    let descriptor = BackendDescriptor::Embedded { path: db_path };
    let config = CaseConfig::default();
    let case = Case::open(&descriptor, &config).await?;
    assert_eq!(case.backend.kind(), BackendKind::Embedded);
    tracing::info!(version = %case.schema_version, "opened demo case");

    let image_obj_id = objects::add_image(
        &case.backend,
        objects::NewImage {
            device_id: "demo-device".to_string(),
            time_zone: "UTC".to_string(),
            size: 10_240_000,
            sector_size: 512,
            md5: None,
            paths: vec!["/tmp/a.dd".to_string()],
        },
        Some(case.has_children_cache()),
    )
    .await?;
    let fs_obj_id = objects::add_file_system(
        &case.backend,
        image_obj_id,
        objects::NewFileSystem {
            data_source_obj_id: image_obj_id,
            img_offset: 32_256,
            fs_type: 0,
            block_size: 512,
            block_count: 1000,
            root_inum: 2,
            first_inum: 2,
            last_inum: 1000,
        },
        Some(case.has_children_cache()),
    )
    .await?;

    let file_obj_id = objects::add_object(
        &case.backend,
        Some(fs_obj_id),
        skcd::domain::ObjectType::AbstractFile,
        Some(case.has_children_cache()),
    )
    .await?;
    let new_file = NewFile {
        par_obj_id: Some(fs_obj_id),
        fs_obj_id: Some(fs_obj_id),
        data_source_obj_id: image_obj_id,
        parent_path: "/".to_string(),
        name: "doc.txt".to_string(),
        kind: FileKind::FsFile,
        dir_type: skcd::domain::DirType::Reg,
        meta_type: skcd::domain::MetaType::Reg,
        dir_flags: 0,
        meta_flags: 0,
        size: 100,
        ctime: 0,
        crtime: 0,
        atime: 0,
        mtime: 0,
        md5: None,
        sha1: None,
        sha256: None,
        known: KnownStatus::Unknown,
        mime_type: None,
        owner_uid: None,
        os_account_obj_id: None,
        collected: skcd::domain::CollectedStatus::CollectedAtAcquisition,
        has_path: false,
    };
    let file = files::insert_file(&case.backend, file_obj_id, new_file, config.timeline_events_disabled, &NoopTimelineSink).await?;
    println!("inserted file {} ({})", file.name, file.obj_id);

    let tag_name = tags::add_tag_name(
        &case.backend,
        tags::NewTagName {
            display_name: "Evidence".to_string(),
            description: None,
            color: Some("dark red".to_string()),
            known_status: 0,
            tag_set_id: None,
            rank: None,
        },
    )
    .await?;
    tags::tag_content(&case.backend, file.obj_id, tag_name.tag_name_id, Some("first"), None, Some(case.examiner_id)).await?;

    let artifact_type_id =
        blackboard::get_or_add_artifact_type(&case.backend, "TSK_HASHSET_HIT", "Hashset Hit", ArtifactCategory::AnalysisResult).await?;
    let allocator = ArtifactIdAllocator::init(&case.backend).await?;
    let artifact = blackboard::insert_analysis_result(
        &case.backend,
        file.obj_id,
        image_obj_id,
        artifact_type_id,
        NewAnalysisResult {
            conclusion: Some("known-bad hash match".to_string()),
            significance: Significance::Notable,
            priority: Priority::Normal,
            configuration: None,
            justification: None,
            ignore_score: false,
        },
        Some(&allocator),
    )
    .await?;
    blackboard::insert_attribute(
        &case.backend,
        artifact.artifact_id,
        1,
        Some("hashset-module"),
        AttributeValue::String("NSRL".to_string()),
    )
    .await?;

    println!("case at {:?} ready; artifact {} scored", descriptor, artifact.artifact_id);
    Ok(())
}
