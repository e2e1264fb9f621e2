//! Tag store (C9): `tag_names`, `tag_sets`, `content_tags`,
//! `blackboard_artifact_tags`, and examiner resolution (§4.7, cross-cut).
//!
//! Grounded on `crate::blackboard`'s get-or-add pattern for
//! `blackboard_artifact_types` — tag names and examiners follow the same
//! shape (a small lookup table keyed by a unique name, resolved once and
//! referenced by id thereafter) — generalized here to content tags,
//! artifact tags and the examiner identity resolved from the host OS
//! account name at case-open.

use crate::backend::Backend;
use crate::error::Result;

/// A row in `tag_names`: a display name, color, known-status, optional
/// tag-set membership, and rank (§4 glossary, "Tag name").
#[derive(Debug, Clone)]
pub struct TagName {
    pub tag_name_id: i64,
    pub display_name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub known_status: i32,
    pub tag_set_id: Option<i64>,
    pub rank: Option<i64>,
}

/// A tag attached to a file or directory (`content_tags`).
#[derive(Debug, Clone)]
pub struct ContentTag {
    pub tag_id: i64,
    pub obj_id: i64,
    pub tag_name_id: i64,
    pub comment: Option<String>,
    pub begin_byte_offset: Option<i64>,
    pub end_byte_offset: Option<i64>,
    pub examiner_id: Option<i64>,
}

/// A tag attached to a blackboard artifact (`blackboard_artifact_tags`).
#[derive(Debug, Clone)]
pub struct ArtifactTag {
    pub tag_id: i64,
    pub artifact_id: i64,
    pub tag_name_id: i64,
    pub comment: Option<String>,
    pub examiner_id: Option<i64>,
}

/// Resolve (creating if absent) the `tsk_examiners` row for a login name.
/// Called once at case-open with the host OS account name (§4.7: "Tags
/// are inserted with an examiner id resolved from the host operating-
/// system account name at case-open").
pub async fn resolve_examiner(backend: &Backend, login_name: &str) -> Result<i64> {
    if let Some(id) = find_examiner(backend, login_name).await? {
        return Ok(id);
    }
    match backend {
        Backend::Sqlite(pool) => {
            let result = sqlx::query("INSERT INTO tsk_examiners (login_name, display_name) VALUES (?, NULL)")
                .bind(login_name)
                .execute(pool)
                .await?;
            Ok(result.last_insert_rowid())
        }
        Backend::Postgres(pool) => {
            let row: (i64,) = sqlx::query_as(
                "INSERT INTO tsk_examiners (login_name, display_name) VALUES ($1, NULL) RETURNING examiner_id",
            )
            .bind(login_name)
            .fetch_one(pool)
            .await?;
            Ok(row.0)
        }
    }
}

async fn find_examiner(backend: &Backend, login_name: &str) -> Result<Option<i64>> {
    match backend {
        Backend::Sqlite(pool) => {
            Ok(sqlx::query_scalar("SELECT examiner_id FROM tsk_examiners WHERE login_name = ?")
                .bind(login_name)
                .fetch_optional(pool)
                .await?)
        }
        Backend::Postgres(pool) => {
            Ok(sqlx::query_scalar("SELECT examiner_id FROM tsk_examiners WHERE login_name = $1")
                .bind(login_name)
                .fetch_optional(pool)
                .await?)
        }
    }
}

/// The current user's login name, read once at case-open and passed to
/// `resolve_examiner`. The teacher reaches for `whoami` for the device's
/// human-readable hostname; this generalizes the same crate to the
/// OS-account name the spec wants for examiner identity.
pub fn current_login_name() -> String {
    whoami::username()
}

pub struct NewTagName {
    pub display_name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub known_status: i32,
    pub tag_set_id: Option<i64>,
    pub rank: Option<i64>,
}

pub async fn add_tag_name(backend: &Backend, new: NewTagName) -> Result<TagName> {
    let tag_name_id = match backend {
        Backend::Sqlite(pool) => {
            let result = sqlx::query(
                "INSERT INTO tag_names (display_name, description, color, knownStatus, tag_set_id, rank) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&new.display_name)
            .bind(&new.description)
            .bind(&new.color)
            .bind(new.known_status)
            .bind(new.tag_set_id)
            .bind(new.rank)
            .execute(pool)
            .await?;
            result.last_insert_rowid()
        }
        Backend::Postgres(pool) => {
            let row: (i64,) = sqlx::query_as(
                "INSERT INTO tag_names (display_name, description, color, knownStatus, tag_set_id, rank) \
                 VALUES ($1, $2, $3, $4, $5, $6) RETURNING tag_name_id",
            )
            .bind(&new.display_name)
            .bind(&new.description)
            .bind(&new.color)
            .bind(new.known_status)
            .bind(new.tag_set_id)
            .bind(new.rank)
            .fetch_one(pool)
            .await?;
            row.0
        }
    };
    Ok(TagName {
        tag_name_id,
        display_name: new.display_name,
        description: new.description,
        color: new.color,
        known_status: new.known_status,
        tag_set_id: new.tag_set_id,
        rank: new.rank,
    })
}

pub async fn get_all_tag_names(backend: &Backend) -> Result<Vec<TagName>> {
    let rows: Vec<(i64, String, Option<String>, Option<String>, Option<i32>, Option<i64>, Option<i64>)> = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_as(
                "SELECT tag_name_id, display_name, description, color, knownStatus, tag_set_id, rank FROM tag_names",
            )
            .fetch_all(pool)
            .await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_as(
                "SELECT tag_name_id, display_name, description, color, knownStatus, tag_set_id, rank FROM tag_names",
            )
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows
        .into_iter()
        .map(|(tag_name_id, display_name, description, color, known_status, tag_set_id, rank)| TagName {
            tag_name_id,
            display_name,
            description,
            color,
            known_status: known_status.unwrap_or(0),
            tag_set_id,
            rank,
        })
        .collect())
}

/// Tag a file or directory at `obj_id` (§4, glossary "Content tags and
/// artifact tags both point to a tag name and optionally an examiner").
pub async fn tag_content(
    backend: &Backend,
    obj_id: i64,
    tag_name_id: i64,
    comment: Option<&str>,
    byte_range: Option<(i64, i64)>,
    examiner_id: Option<i64>,
) -> Result<ContentTag> {
    let (begin_byte_offset, end_byte_offset) = match byte_range {
        Some((b, e)) => (Some(b), Some(e)),
        None => (None, None),
    };
    let tag_id = match backend {
        Backend::Sqlite(pool) => {
            let result = sqlx::query(
                "INSERT INTO content_tags (obj_id, tag_name_id, comment, begin_byte_offset, end_byte_offset, examiner_id) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(obj_id)
            .bind(tag_name_id)
            .bind(comment)
            .bind(begin_byte_offset)
            .bind(end_byte_offset)
            .bind(examiner_id)
            .execute(pool)
            .await?;
            result.last_insert_rowid()
        }
        Backend::Postgres(pool) => {
            let row: (i64,) = sqlx::query_as(
                "INSERT INTO content_tags (obj_id, tag_name_id, comment, begin_byte_offset, end_byte_offset, examiner_id) \
                 VALUES ($1, $2, $3, $4, $5, $6) RETURNING tag_id",
            )
            .bind(obj_id)
            .bind(tag_name_id)
            .bind(comment)
            .bind(begin_byte_offset)
            .bind(end_byte_offset)
            .bind(examiner_id)
            .fetch_one(pool)
            .await?;
            row.0
        }
    };
    Ok(ContentTag {
        tag_id,
        obj_id,
        tag_name_id,
        comment: comment.map(str::to_string),
        begin_byte_offset,
        end_byte_offset,
        examiner_id,
    })
}

pub async fn tag_artifact(
    backend: &Backend,
    artifact_id: i64,
    tag_name_id: i64,
    comment: Option<&str>,
    examiner_id: Option<i64>,
) -> Result<ArtifactTag> {
    let tag_id = match backend {
        Backend::Sqlite(pool) => {
            let result = sqlx::query(
                "INSERT INTO blackboard_artifact_tags (artifact_id, tag_name_id, comment, examiner_id) VALUES (?, ?, ?, ?)",
            )
            .bind(artifact_id)
            .bind(tag_name_id)
            .bind(comment)
            .bind(examiner_id)
            .execute(pool)
            .await?;
            result.last_insert_rowid()
        }
        Backend::Postgres(pool) => {
            let row: (i64,) = sqlx::query_as(
                "INSERT INTO blackboard_artifact_tags (artifact_id, tag_name_id, comment, examiner_id) \
                 VALUES ($1, $2, $3, $4) RETURNING tag_id",
            )
            .bind(artifact_id)
            .bind(tag_name_id)
            .bind(comment)
            .bind(examiner_id)
            .fetch_one(pool)
            .await?;
            row.0
        }
    };
    Ok(ArtifactTag { tag_id, artifact_id, tag_name_id, comment: comment.map(str::to_string), examiner_id })
}

pub async fn get_all_content_tags(backend: &Backend) -> Result<Vec<(ContentTag, String)>> {
    let rows: Vec<(i64, i64, i64, Option<String>, Option<i64>, Option<i64>, Option<i64>, String)> = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_as(
                "SELECT ct.tag_id, ct.obj_id, ct.tag_name_id, ct.comment, ct.begin_byte_offset, \
                        ct.end_byte_offset, ct.examiner_id, COALESCE(e.login_name, '') \
                 FROM content_tags ct LEFT JOIN tsk_examiners e ON e.examiner_id = ct.examiner_id",
            )
            .fetch_all(pool)
            .await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_as(
                "SELECT ct.tag_id, ct.obj_id, ct.tag_name_id, ct.comment, ct.begin_byte_offset, \
                        ct.end_byte_offset, ct.examiner_id, COALESCE(e.login_name, '') \
                 FROM content_tags ct LEFT JOIN tsk_examiners e ON e.examiner_id = ct.examiner_id",
            )
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows
        .into_iter()
        .map(|(tag_id, obj_id, tag_name_id, comment, begin_byte_offset, end_byte_offset, examiner_id, login_name)| {
            (ContentTag { tag_id, obj_id, tag_name_id, comment, begin_byte_offset, end_byte_offset, examiner_id }, login_name)
        })
        .collect())
}

/// Content tags restricted to one data source, joining through
/// `tsk_files` for file/directory tags and through
/// `tsk_os_account_instances` for OS-account tags, combined with `UNION`
/// (§4.7: "per-data-source filters by joining `content_tags ↔ tsk_files /
/// tsk_os_accounts` with the data-source column, merged via `UNION`").
pub async fn get_content_tags_by_data_source(backend: &Backend, data_source_obj_id: i64) -> Result<Vec<ContentTag>> {
    const QUERY: &str = "\
        SELECT ct.tag_id, ct.obj_id, ct.tag_name_id, ct.comment, ct.begin_byte_offset, ct.end_byte_offset, ct.examiner_id \
        FROM content_tags ct JOIN tsk_files f ON f.obj_id = ct.obj_id \
        WHERE f.data_source_obj_id = ? \
        UNION \
        SELECT ct.tag_id, ct.obj_id, ct.tag_name_id, ct.comment, ct.begin_byte_offset, ct.end_byte_offset, ct.examiner_id \
        FROM content_tags ct JOIN tsk_os_account_instances oi ON oi.os_account_obj_id = ct.obj_id \
        WHERE oi.data_source_obj_id = ?";

    let rows: Vec<(i64, i64, i64, Option<String>, Option<i64>, Option<i64>, Option<i64>)> = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_as(QUERY).bind(data_source_obj_id).bind(data_source_obj_id).fetch_all(pool).await?
        }
        Backend::Postgres(pool) => {
            let pg_query = QUERY.replace("WHERE f.data_source_obj_id = ?", "WHERE f.data_source_obj_id = $1").replace(
                "WHERE oi.data_source_obj_id = ?",
                "WHERE oi.data_source_obj_id = $2",
            );
            sqlx::query_as(&pg_query).bind(data_source_obj_id).bind(data_source_obj_id).fetch_all(pool).await?
        }
    };
    Ok(rows
        .into_iter()
        .map(|(tag_id, obj_id, tag_name_id, comment, begin_byte_offset, end_byte_offset, examiner_id)| ContentTag {
            tag_id,
            obj_id,
            tag_name_id,
            comment,
            begin_byte_offset,
            end_byte_offset,
            examiner_id,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_login_name_is_non_empty() {
        assert!(!current_login_name().is_empty());
    }
}
