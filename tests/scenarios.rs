//! End-to-end scenarios over a real embedded engine — no mocking of the
//! database. Each test name tracks the scenario it exercises.

mod common;

use common::open_embedded_case;
use skcd::attributes::AttributeValue;
use skcd::blackboard::{self, ArtifactCategory, ArtifactIdAllocator, NewAnalysisResult};
use skcd::domain::score::{Priority, Significance};
use skcd::domain::{FileKind, KnownStatus};
use skcd::files::{self, NewCarvedFile, NewFile, NoopTimelineSink};
use skcd::objects::{self, NewFileSystem, NewImage};
use skcd::tags;
use pretty_assertions::assert_eq;

async fn seed_file(case: &skcd::Case) -> (i64, i64) {
    let image_obj_id = objects::add_image(
        &case.backend,
        NewImage {
            device_id: "scenario-device".to_string(),
            time_zone: "UTC".to_string(),
            size: 10_240_000,
            sector_size: 512,
            md5: None,
            paths: vec!["/tmp/a.dd".to_string()],
        },
        Some(case.has_children_cache()),
    )
    .await
    .expect("add image");

    let fs_obj_id = objects::add_file_system(
        &case.backend,
        image_obj_id,
        NewFileSystem {
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
    .await
    .expect("add file system");

    let file_obj_id = objects::add_object(
        &case.backend,
        Some(fs_obj_id),
        skcd::domain::ObjectType::AbstractFile,
        Some(case.has_children_cache()),
    )
    .await
    .expect("add file object");
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
    let file = files::insert_file(&case.backend, file_obj_id, new_file, false, &NoopTimelineSink)
        .await
        .expect("insert file");
    (file.obj_id, image_obj_id)
}

/// S2. Create-and-tag: tagging a freshly inserted file records the
/// resolved examiner's login name alongside the tag.
#[tokio::test]
async fn create_and_tag_records_current_examiner() {
    let case = open_embedded_case().await;
    let (file_obj_id, _image_obj_id) = seed_file(&case).await;

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
    .await
    .expect("add tag name");

    tags::tag_content(&case.backend, file_obj_id, tag_name.tag_name_id, Some("first"), None, Some(case.examiner_id))
        .await
        .expect("tag content");

    let all_tags = tags::get_all_content_tags(&case.backend).await.expect("get all content tags");
    assert_eq!(all_tags.len(), 1);
    let (tag, login_name) = &all_tags[0];
    assert_eq!(tag.obj_id, file_obj_id);
    assert_eq!(tag.comment.as_deref(), Some("first"));
    assert_eq!(login_name, &tags::current_login_name());
}

/// S3. Analysis-result scoring: the aggregate tracks the maximum
/// significance among surviving results and recomputes after a deletion.
#[tokio::test]
async fn analysis_result_scoring_tracks_max_and_recomputes_after_delete() {
    let case = open_embedded_case().await;
    let (file_obj_id, image_obj_id) = seed_file(&case).await;

    let artifact_type_id =
        blackboard::get_or_add_artifact_type(&case.backend, "TSK_HASHSET_HIT", "Hashset Hit", ArtifactCategory::AnalysisResult)
            .await
            .expect("get or add artifact type");
    let allocator = ArtifactIdAllocator::init(&case.backend).await.expect("init allocator");

    blackboard::insert_analysis_result(
        &case.backend,
        file_obj_id,
        image_obj_id,
        artifact_type_id,
        NewAnalysisResult {
            conclusion: None,
            significance: Significance::LikelyNotable,
            priority: Priority::Normal,
            configuration: None,
            justification: None,
            ignore_score: false,
        },
        Some(&allocator),
    )
    .await
    .expect("insert first analysis result");

    let second = blackboard::insert_analysis_result(
        &case.backend,
        file_obj_id,
        image_obj_id,
        artifact_type_id,
        NewAnalysisResult {
            conclusion: None,
            significance: Significance::Notable,
            priority: Priority::Normal,
            configuration: None,
            justification: None,
            ignore_score: false,
        },
        Some(&allocator),
    )
    .await
    .expect("insert second analysis result");

    let aggregate: (i32, i32) = match &case.backend {
        skcd::Backend::Sqlite(pool) => {
            sqlx::query_as("SELECT significance, priority FROM tsk_aggregate_score WHERE obj_id = ?")
                .bind(file_obj_id)
                .fetch_one(pool)
                .await
                .expect("read aggregate")
        }
        skcd::Backend::Postgres(_) => unreachable!("embedded case"),
    };
    assert_eq!(aggregate.0, Significance::Notable as i32);

    blackboard::delete_analysis_result(&case.backend, second.obj_id).await.expect("delete second result");

    let aggregate_after: (i32, i32) = match &case.backend {
        skcd::Backend::Sqlite(pool) => {
            sqlx::query_as("SELECT significance, priority FROM tsk_aggregate_score WHERE obj_id = ?")
                .bind(file_obj_id)
                .fetch_one(pool)
                .await
                .expect("read aggregate after delete")
        }
        skcd::Backend::Postgres(_) => unreachable!("embedded case"),
    };
    assert_eq!(aggregate_after.0, Significance::LikelyNotable as i32);
}

/// S4 / invariant 5. Source-module merge: adding the same source twice is
/// idempotent, and a distinct source appends exactly one comma-separated
/// token, in insertion order.
#[tokio::test]
async fn attribute_source_merge_is_idempotent_and_ordered() {
    let case = open_embedded_case().await;
    let (file_obj_id, image_obj_id) = seed_file(&case).await;

    let artifact_type_id =
        blackboard::get_or_add_artifact_type(&case.backend, "TSK_KEYWORD_HIT", "Keyword Hit", ArtifactCategory::AnalysisResult)
            .await
            .expect("get or add artifact type");
    let allocator = ArtifactIdAllocator::init(&case.backend).await.expect("init allocator");
    let artifact = blackboard::insert_analysis_result(
        &case.backend,
        file_obj_id,
        image_obj_id,
        artifact_type_id,
        NewAnalysisResult {
            conclusion: None,
            significance: Significance::Unknown,
            priority: Priority::Normal,
            configuration: None,
            justification: None,
            ignore_score: true,
        },
        Some(&allocator),
    )
    .await
    .expect("insert analysis result");

    let attribute_type_id = 42; // TSK_KEYWORD stand-in; attribute type tables are keyed by this id alone.

    blackboard::insert_attribute(
        &case.backend,
        artifact.artifact_id,
        attribute_type_id,
        Some("ModA"),
        AttributeValue::String("foo".to_string()),
    )
    .await
    .expect("insert attribute from ModA");
    blackboard::insert_attribute(
        &case.backend,
        artifact.artifact_id,
        attribute_type_id,
        Some("ModB"),
        AttributeValue::String("foo".to_string()),
    )
    .await
    .expect("insert attribute from ModB");
    blackboard::insert_attribute(
        &case.backend,
        artifact.artifact_id,
        attribute_type_id,
        Some("ModA"),
        AttributeValue::String("foo".to_string()),
    )
    .await
    .expect("re-insert attribute from ModA");

    let rows: Vec<(Option<String>,)> = match &case.backend {
        skcd::Backend::Sqlite(pool) => {
            sqlx::query_as("SELECT source FROM blackboard_attributes WHERE artifact_id = ?")
                .bind(artifact.artifact_id)
                .fetch_all(pool)
                .await
                .expect("select attributes")
        }
        skcd::Backend::Postgres(_) => unreachable!("embedded case"),
    };
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0.as_deref(), Some("ModA,ModB"));
}

/// S5 / invariant 7. Carved-file folder rotation: inserting 4 500 carved
/// files produces a real `$CarvedFiles` virtual directory with exactly
/// three numbered subfolders, `"1"`, `"2"`, `"3"`, holding 2000, 2000 and
/// 500 children respectively.
#[tokio::test]
async fn carved_file_registry_rotates_at_case_level() {
    let case = open_embedded_case().await;
    let (_file_obj_id, image_obj_id) = seed_file(&case).await;

    for i in 0..4500 {
        files::insert_carved_file(
            &case.backend,
            case.carved_files(),
            image_obj_id,
            NewCarvedFile {
                data_source_obj_id: image_obj_id,
                name: format!("carved_{i}.bin"),
                byte_start: i * 512,
                byte_len: 512,
            },
        )
        .await
        .expect("insert carved file");
    }

    let children = objects::get_children_info(&case.backend, image_obj_id).await.expect("get children of image");
    assert_eq!(children.len(), 2, "image has the seeded file's file system plus $CarvedFiles");
    let carved_files_dir = find_child_named(&case, image_obj_id, "$CarvedFiles").await.expect("$CarvedFiles exists");

    let subfolders = objects::get_children_info(&case.backend, carved_files_dir)
        .await
        .expect("get $CarvedFiles subfolders");
    assert_eq!(subfolders.len(), 3);

    for (name, expected_count) in [("1", 2000), ("2", 2000), ("3", 500)] {
        let subfolder_obj_id = find_child_named(&case, carved_files_dir, name).await.expect("subfolder exists");
        let children = objects::get_children_info(&case.backend, subfolder_obj_id)
            .await
            .expect("get subfolder children");
        assert_eq!(children.len(), expected_count, "subfolder {name} child count");
    }
}

/// `obj_id` of the child of `par_obj_id` named `name`, by `tsk_files.name`.
async fn find_child_named(case: &skcd::Case, par_obj_id: i64, name: &str) -> Option<i64> {
    match &case.backend {
        skcd::Backend::Sqlite(pool) => {
            sqlx::query_scalar(
                "SELECT f.obj_id FROM tsk_files f JOIN tsk_objects o ON o.obj_id = f.obj_id \
                 WHERE o.par_obj_id = ? AND f.name = ?",
            )
            .bind(par_obj_id)
            .bind(name)
            .fetch_optional(pool)
            .await
            .expect("query child by name")
        }
        skcd::Backend::Postgres(_) => unreachable!("embedded case"),
    }
}

/// Invariant 1 (object-graph integrity), restricted to the part provable
/// without a full cascade-delete implementation: every non-root object's
/// `par_obj_id` resolves to a real row.
#[tokio::test]
async fn every_child_object_has_a_resolvable_parent() {
    let case = open_embedded_case().await;
    let (file_obj_id, image_obj_id) = seed_file(&case).await;

    let (parent_id, _parent_type) = objects::get_parent_info(&case.backend, file_obj_id)
        .await
        .expect("get parent info")
        .expect("file has a parent");
    assert_ne!(parent_id, 0);

    let roots = objects::get_root_objects(&case.backend).await.expect("get root objects");
    assert!(roots.iter().any(|(id, _)| *id == image_obj_id));
}

/// Invariant 8 (has-children bitset correctness): a parent gains a bit as
/// soon as its first child is inserted, whether or not the background
/// population worker had already run by then.
#[tokio::test]
async fn has_children_bitset_reflects_inserts_made_after_case_open() {
    let case = open_embedded_case().await;
    let (_file_obj_id, image_obj_id) = seed_file(&case).await;

    assert!(case.has_children_cache().has_children(image_obj_id).await.expect("has_children image"));

    let leaf_obj_id = objects::add_object(&case.backend, None, skcd::domain::ObjectType::Image, None)
        .await
        .expect("add leaf object");
    assert!(!case.has_children_cache().has_children(leaf_obj_id).await.expect("has_children leaf"));
}
