//! Blackboard (C7): artifacts, their typed attributes, and the two
//! per-category extension tables (`tsk_data_artifacts`,
//! `tsk_analysis_results`).
//!
//! Artifact *types* are populated at case-open by an external service via
//! `get_or_add_artifact_type`; this module only owns the schema, the
//! side-tables and the per-type dispatch (§4.5).

use crate::attributes::{merge_source, AttributeValue};
use crate::backend::Backend;
use crate::domain::content::ArtifactRef;
use crate::domain::ObjectType;
use crate::error::{Result, SkcdError};
use crate::scoring::{self, Score};
use std::sync::atomic::{AtomicI64, Ordering};

/// `category_type` constraint on `blackboard_artifact_types` (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactCategory {
    DataArtifact,
    AnalysisResult,
}

impl ArtifactCategory {
    fn db_code(self) -> i32 {
        match self {
            ArtifactCategory::DataArtifact => 0,
            ArtifactCategory::AnalysisResult => 1,
        }
    }
}

/// Looks up an artifact type by name, inserting it with the next free id
/// if absent — the "separate service" §4.5 describes, folded into this
/// module since nothing else in the crate owns artifact-type identity.
pub async fn get_or_add_artifact_type(
    backend: &Backend,
    type_name: &str,
    display_name: &str,
    category: ArtifactCategory,
) -> Result<i64> {
    if let Some(id) = find_artifact_type_id(backend, type_name).await? {
        return Ok(id);
    }
    let next_id = next_artifact_type_id(backend).await?;
    match backend {
        Backend::Sqlite(pool) => {
            sqlx::query(
                "INSERT INTO blackboard_artifact_types (artifact_type_id, type_name, display_name, category_type) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(next_id)
            .bind(type_name)
            .bind(display_name)
            .bind(category.db_code())
            .execute(pool)
            .await?;
        }
        Backend::Postgres(pool) => {
            sqlx::query(
                "INSERT INTO blackboard_artifact_types (artifact_type_id, type_name, display_name, category_type) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(next_id)
            .bind(type_name)
            .bind(display_name)
            .bind(category.db_code())
            .execute(pool)
            .await?;
        }
    }
    Ok(next_id)
}

async fn find_artifact_type_id(backend: &Backend, type_name: &str) -> Result<Option<i64>> {
    match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_scalar("SELECT artifact_type_id FROM blackboard_artifact_types WHERE type_name = ?")
                .bind(type_name)
                .fetch_optional(pool)
                .await
                .map_err(Into::into)
        }
        Backend::Postgres(pool) => {
            sqlx::query_scalar("SELECT artifact_type_id FROM blackboard_artifact_types WHERE type_name = $1")
                .bind(type_name)
                .fetch_optional(pool)
                .await
                .map_err(Into::into)
        }
    }
}

async fn next_artifact_type_id(backend: &Backend) -> Result<i64> {
    let max: Option<i64> = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_scalar("SELECT MAX(artifact_type_id) FROM blackboard_artifact_types").fetch_one(pool).await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_scalar("SELECT MAX(artifact_type_id) FROM blackboard_artifact_types").fetch_one(pool).await?
        }
    };
    Ok(max.unwrap_or(0) + 1)
}

/// Client-side monotonic artifact-id counter for the embedded backend
/// (§4.5 "Artifact-id allocation"): initialised at case-open to
/// `max(artifact_id) + 1`, or `i64::MIN` if the table is empty.
pub struct ArtifactIdAllocator {
    next: AtomicI64,
}

impl ArtifactIdAllocator {
    pub async fn init(backend: &Backend) -> Result<Self> {
        let max: Option<i64> = match backend {
            Backend::Sqlite(pool) => {
                sqlx::query_scalar("SELECT MAX(artifact_id) FROM blackboard_artifacts").fetch_one(pool).await?
            }
            Backend::Postgres(pool) => {
                sqlx::query_scalar("SELECT MAX(artifact_id) FROM blackboard_artifacts").fetch_one(pool).await?
            }
        };
        let next = match max {
            Some(m) => m.checked_add(1).ok_or_else(|| SkcdError::Other("artifact_id counter overflow".into()))?,
            None => i64::MIN,
        };
        Ok(Self { next: AtomicI64::new(next) })
    }

    fn allocate(&self) -> i64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

async fn insert_artifact_row(
    backend: &Backend,
    par_obj_id: i64,
    data_source_obj_id: i64,
    artifact_type_id: i64,
    allocator: Option<&ArtifactIdAllocator>,
) -> Result<ArtifactRef> {
    let obj_id = crate::objects::add_object(backend, Some(par_obj_id), ObjectType::Artifact, None).await?;

    let artifact_id = match backend {
        Backend::Sqlite(pool) => {
            let allocator = allocator.ok_or_else(|| {
                SkcdError::InvalidArgument("embedded backend requires an artifact-id allocator".into())
            })?;
            let artifact_id = allocator.allocate();
            sqlx::query(
                "INSERT INTO blackboard_artifacts (artifact_id, obj_id, artifact_type_id, artifact_obj_id, data_source_obj_id) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(artifact_id)
            .bind(obj_id)
            .bind(artifact_type_id)
            .bind(obj_id)
            .bind(data_source_obj_id)
            .execute(pool)
            .await?;
            artifact_id
        }
        Backend::Postgres(pool) => {
            sqlx::query_scalar(
                "INSERT INTO blackboard_artifacts (obj_id, artifact_type_id, artifact_obj_id, data_source_obj_id) \
                 VALUES ($1, $2, $3, $4) RETURNING artifact_id",
            )
            .bind(obj_id)
            .bind(artifact_type_id)
            .bind(obj_id)
            .bind(data_source_obj_id)
            .fetch_one(pool)
            .await?
        }
    };

    Ok(ArtifactRef { obj_id, artifact_id })
}

/// Create a data artifact: `tsk_objects` row, `blackboard_artifacts` row,
/// `tsk_data_artifacts` row (§4.5).
pub async fn insert_data_artifact(
    backend: &Backend,
    par_obj_id: i64,
    data_source_obj_id: i64,
    artifact_type_id: i64,
    os_account_obj_id: Option<i64>,
    allocator: Option<&ArtifactIdAllocator>,
) -> Result<ArtifactRef> {
    let artifact = insert_artifact_row(backend, par_obj_id, data_source_obj_id, artifact_type_id, allocator).await?;
    match backend {
        Backend::Sqlite(pool) => {
            sqlx::query("INSERT INTO tsk_data_artifacts (artifact_obj_id, os_account_obj_id) VALUES (?, ?)")
                .bind(artifact.obj_id)
                .bind(os_account_obj_id)
                .execute(pool)
                .await?;
        }
        Backend::Postgres(pool) => {
            sqlx::query("INSERT INTO tsk_data_artifacts (artifact_obj_id, os_account_obj_id) VALUES ($1, $2)")
                .bind(artifact.obj_id)
                .bind(os_account_obj_id)
                .execute(pool)
                .await?;
        }
    }
    Ok(artifact)
}

/// Caller-supplied analysis-result finding (§4.5).
pub struct NewAnalysisResult {
    pub conclusion: Option<String>,
    pub significance: crate::domain::score::Significance,
    pub priority: crate::domain::score::Priority,
    pub configuration: Option<String>,
    pub justification: Option<String>,
    pub ignore_score: bool,
}

impl NewAnalysisResult {
    fn score(&self) -> Score {
        Score { significance: self.significance, priority: self.priority }
    }

    /// A bare artifact is enough when the score is `(unknown, normal)` and
    /// every free-text field is empty (§4.5).
    fn is_trivial(&self) -> bool {
        self.score().is_default()
            && self.conclusion.as_deref().unwrap_or("").is_empty()
            && self.configuration.as_deref().unwrap_or("").is_empty()
            && self.justification.as_deref().unwrap_or("").is_empty()
    }
}

/// Create an analysis result: `tsk_objects` row, `blackboard_artifacts`
/// row, and — unless the finding is trivial — a `tsk_analysis_results`
/// row, followed by an aggregate-score update (§4.5, §4.6).
pub async fn insert_analysis_result(
    backend: &Backend,
    par_obj_id: i64,
    data_source_obj_id: i64,
    artifact_type_id: i64,
    result: NewAnalysisResult,
    allocator: Option<&ArtifactIdAllocator>,
) -> Result<ArtifactRef> {
    let artifact = insert_artifact_row(backend, par_obj_id, data_source_obj_id, artifact_type_id, allocator).await?;

    let trivial = result.is_trivial();
    let score = result.score();
    let significance = result.significance as i32;
    let priority = result.priority as i32;

    if !trivial {
        match backend {
            Backend::Sqlite(pool) => {
                sqlx::query(
                    "INSERT INTO tsk_analysis_results \
                     (artifact_obj_id, conclusion, significance, priority, configuration, justification, ignore_score) \
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(artifact.obj_id)
                .bind(&result.conclusion)
                .bind(significance)
                .bind(priority)
                .bind(&result.configuration)
                .bind(&result.justification)
                .bind(result.ignore_score as i32)
                .execute(pool)
                .await?;
            }
            Backend::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO tsk_analysis_results \
                     (artifact_obj_id, conclusion, significance, priority, configuration, justification, ignore_score) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7)",
                )
                .bind(artifact.obj_id)
                .bind(&result.conclusion)
                .bind(significance)
                .bind(priority)
                .bind(&result.configuration)
                .bind(&result.justification)
                .bind(result.ignore_score as i32)
                .execute(pool)
                .await?;
            }
        }
    }

    if !result.ignore_score {
        scoring::update_aggregate_score(backend, par_obj_id, data_source_obj_id, score).await?;
    }

    Ok(artifact)
}

/// Insert a typed attribute, merging into an existing row with the same
/// `(artifact_id, attribute_type_id, value_type, value)` but a different
/// `source` rather than duplicating it (§4.7).
pub async fn insert_attribute(
    backend: &Backend,
    artifact_id: i64,
    attribute_type_id: i64,
    source: Option<&str>,
    value: AttributeValue,
) -> Result<()> {
    if let Some(source) = source {
        if let Some((existing_source, existing_value)) =
            find_matching_attribute(backend, artifact_id, attribute_type_id, &value).await?
        {
            if existing_value.matches(&value) {
                let merged = merge_source(existing_source.as_deref(), source);
                update_attribute_source(backend, artifact_id, attribute_type_id, &value, &merged).await?;
                return Ok(());
            }
        }
    }

    let (byte, text, int32, int64, double) = value.columns();
    let value_type = value.value_type_code();
    match backend {
        Backend::Sqlite(pool) => {
            sqlx::query(
                "INSERT INTO blackboard_attributes \
                 (artifact_id, source, attribute_type_id, value_type, value_byte, value_text, value_int32, value_int64, value_double) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(artifact_id)
            .bind(source)
            .bind(attribute_type_id)
            .bind(value_type)
            .bind(byte)
            .bind(text)
            .bind(int32)
            .bind(int64)
            .bind(double)
            .execute(pool)
            .await?;
        }
        Backend::Postgres(pool) => {
            sqlx::query(
                "INSERT INTO blackboard_attributes \
                 (artifact_id, source, attribute_type_id, value_type, value_byte, value_text, value_int32, value_int64, value_double) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(artifact_id)
            .bind(source)
            .bind(attribute_type_id)
            .bind(value_type)
            .bind(byte)
            .bind(text)
            .bind(int32)
            .bind(int64)
            .bind(double)
            .execute(pool)
            .await?;
        }
    }
    Ok(())
}

async fn find_matching_attribute(
    backend: &Backend,
    artifact_id: i64,
    attribute_type_id: i64,
    value: &AttributeValue,
) -> Result<Option<(Option<String>, AttributeValue)>> {
    type Row = (Option<String>, i32, Option<Vec<u8>>, Option<String>, Option<i32>, Option<i64>, Option<f64>);
    let rows: Vec<Row> = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_as(
                "SELECT source, value_type, value_byte, value_text, value_int32, value_int64, value_double \
                 FROM blackboard_attributes WHERE artifact_id = ? AND attribute_type_id = ? AND value_type = ?",
            )
            .bind(artifact_id)
            .bind(attribute_type_id)
            .bind(value.value_type_code())
            .fetch_all(pool)
            .await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_as(
                "SELECT source, value_type, value_byte, value_text, value_int32, value_int64, value_double \
                 FROM blackboard_attributes WHERE artifact_id = $1 AND attribute_type_id = $2 AND value_type = $3",
            )
            .bind(artifact_id)
            .bind(attribute_type_id)
            .bind(value.value_type_code())
            .fetch_all(pool)
            .await?
        }
    };

    for (source, _value_type, byte, text, int32, int64, double) in rows {
        if let Some(row_value) = reconstruct_value(value, byte, text, int32, int64, double) {
            if row_value.matches(value) {
                return Ok(Some((source, row_value)));
            }
        }
    }
    Ok(None)
}

fn reconstruct_value(
    shape: &AttributeValue,
    byte: Option<Vec<u8>>,
    text: Option<String>,
    int32: Option<i32>,
    int64: Option<i64>,
    double: Option<f64>,
) -> Option<AttributeValue> {
    match shape {
        AttributeValue::Byte(_) => byte.map(AttributeValue::Byte),
        AttributeValue::Int32(_) => int32.map(AttributeValue::Int32),
        AttributeValue::Int64(_) => int64.map(AttributeValue::Int64),
        AttributeValue::DateTime(_) => int64.map(AttributeValue::DateTime),
        AttributeValue::Double(_) => double.map(AttributeValue::Double),
        AttributeValue::String(_) => text.map(AttributeValue::String),
        AttributeValue::Json(_) => text.and_then(|t| serde_json::from_str(&t).ok()).map(AttributeValue::Json),
    }
}

async fn update_attribute_source(
    backend: &Backend,
    artifact_id: i64,
    attribute_type_id: i64,
    value: &AttributeValue,
    merged_source: &str,
) -> Result<()> {
    let value_type = value.value_type_code();
    match backend {
        Backend::Sqlite(pool) => {
            sqlx::query(
                "UPDATE blackboard_attributes SET source = ? WHERE artifact_id = ? AND attribute_type_id = ? AND value_type = ?",
            )
            .bind(merged_source)
            .bind(artifact_id)
            .bind(attribute_type_id)
            .bind(value_type)
            .execute(pool)
            .await?;
        }
        Backend::Postgres(pool) => {
            sqlx::query(
                "UPDATE blackboard_attributes SET source = $1 WHERE artifact_id = $2 AND attribute_type_id = $3 AND value_type = $4",
            )
            .bind(merged_source)
            .bind(artifact_id)
            .bind(attribute_type_id)
            .bind(value_type)
            .execute(pool)
            .await?;
        }
    }
    Ok(())
}

/// Delete an analysis result and recompute the aggregate for its parent
/// content object (§4.6).
pub async fn delete_analysis_result(backend: &Backend, artifact_obj_id: i64) -> Result<()> {
    let (par_obj_id, data_source_obj_id): (i64, i64) = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_as("SELECT obj_id, data_source_obj_id FROM blackboard_artifacts WHERE artifact_obj_id = ?")
                .bind(artifact_obj_id)
                .fetch_one(pool)
                .await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_as("SELECT obj_id, data_source_obj_id FROM blackboard_artifacts WHERE artifact_obj_id = $1")
                .bind(artifact_obj_id)
                .fetch_one(pool)
                .await?
        }
    };
    match backend {
        Backend::Sqlite(pool) => {
            sqlx::query("DELETE FROM tsk_analysis_results WHERE artifact_obj_id = ?")
                .bind(artifact_obj_id)
                .execute(pool)
                .await?;
        }
        Backend::Postgres(pool) => {
            sqlx::query("DELETE FROM tsk_analysis_results WHERE artifact_obj_id = $1")
                .bind(artifact_obj_id)
                .execute(pool)
                .await?;
        }
    }
    scoring::update_aggregate_score_after_deletion(backend, par_obj_id, data_source_obj_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::score::{Priority, Significance};

    #[test]
    fn trivial_result_detection_matches_default_score_rule() {
        let trivial = NewAnalysisResult {
            conclusion: None,
            significance: Significance::Unknown,
            priority: Priority::Normal,
            configuration: Some(String::new()),
            justification: None,
            ignore_score: false,
        };
        assert!(trivial.is_trivial());

        let not_trivial = NewAnalysisResult {
            conclusion: Some("suspicious".into()),
            significance: Significance::Unknown,
            priority: Priority::Normal,
            configuration: None,
            justification: None,
            ignore_score: false,
        };
        assert!(!not_trivial.is_trivial());
    }
}
