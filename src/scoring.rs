//! Scoring aggregator (C8): `tsk_aggregate_score` holds, per `obj_id`, the
//! maximum `(significance, priority)` observed across surviving analysis
//! results (§4.6).
//!
//! Grounded on the teacher's `library::stats` running-aggregate pattern
//! (read current, fold in the new sample, write back under a lock),
//! generalized from a numeric running total to a lexicographically
//! maximal pair.

use crate::backend::Backend;
use crate::domain::score::{Priority, Significance};
use crate::error::{Result, SkcdError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Score {
    pub significance: Significance,
    pub priority: Priority,
}

impl Score {
    /// `(unknown, normal)` — the score an analysis result defaults to when
    /// the caller supplies no finding at all (§4.5).
    pub fn is_default(&self) -> bool {
        self.significance == Significance::Unknown && self.priority == Priority::Normal
    }
}

/// Serialize aggregate-score writers. On the networked backend this takes
/// an explicit table lock inside the caller's transaction; on the embedded
/// backend the process-wide write lock (C3) already does the job (§4.6).
pub async fn lock_aggregate_table(backend: &Backend) -> Result<()> {
    if let Backend::Postgres(pool) = backend {
        sqlx::query("LOCK TABLE ONLY tsk_aggregate_score IN SHARE ROW EXCLUSIVE MODE")
            .execute(pool)
            .await?;
    }
    Ok(())
}

/// Fold a newly-inserted analysis result's score into `obj_id`'s aggregate.
/// Returns `true` if the aggregate actually changed, so the caller can
/// register a deferred score-change event (§4.10).
pub async fn update_aggregate_score(
    backend: &Backend,
    obj_id: i64,
    data_source_obj_id: i64,
    new_score: Score,
) -> Result<bool> {
    lock_aggregate_table(backend).await?;
    if let Some(existing) = read_aggregate(backend, obj_id).await? {
        if existing >= new_score {
            return Ok(false);
        }
    }
    upsert_aggregate(backend, obj_id, data_source_obj_id, new_score).await?;
    Ok(true)
}

/// Re-read the surviving analysis results attached (through
/// `blackboard_artifacts`) to `obj_id` and replace the aggregate, or drop
/// it entirely if none remain (§4.6, "after deletion").
pub async fn update_aggregate_score_after_deletion(
    backend: &Backend,
    obj_id: i64,
    data_source_obj_id: i64,
) -> Result<()> {
    lock_aggregate_table(backend).await?;
    match read_max_surviving_score(backend, obj_id).await? {
        Some(score) => upsert_aggregate(backend, obj_id, data_source_obj_id, score).await?,
        None => delete_aggregate(backend, obj_id).await?,
    }
    Ok(())
}

fn decode_score(significance: i32, priority: i32) -> Result<Score> {
    let significance = Significance::from_db(significance)
        .ok_or_else(|| SkcdError::SchemaCorrupt(format!("unknown significance code {significance}")))?;
    let priority = Priority::from_db(priority)
        .ok_or_else(|| SkcdError::SchemaCorrupt(format!("unknown priority code {priority}")))?;
    Ok(Score { significance, priority })
}

async fn read_aggregate(backend: &Backend, obj_id: i64) -> Result<Option<Score>> {
    let row: Option<(i32, i32)> = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_as("SELECT significance, priority FROM tsk_aggregate_score WHERE obj_id = ?")
                .bind(obj_id)
                .fetch_optional(pool)
                .await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_as("SELECT significance, priority FROM tsk_aggregate_score WHERE obj_id = $1")
                .bind(obj_id)
                .fetch_optional(pool)
                .await?
        }
    };
    row.map(|(significance, priority)| decode_score(significance, priority)).transpose()
}

async fn read_max_surviving_score(backend: &Backend, obj_id: i64) -> Result<Option<Score>> {
    let rows: Vec<(i32, i32)> = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_as(
                "SELECT ar.significance, ar.priority FROM tsk_analysis_results ar \
                 JOIN blackboard_artifacts ba ON ba.artifact_obj_id = ar.artifact_obj_id \
                 WHERE ba.obj_id = ?",
            )
            .bind(obj_id)
            .fetch_all(pool)
            .await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_as(
                "SELECT ar.significance, ar.priority FROM tsk_analysis_results ar \
                 JOIN blackboard_artifacts ba ON ba.artifact_obj_id = ar.artifact_obj_id \
                 WHERE ba.obj_id = $1",
            )
            .bind(obj_id)
            .fetch_all(pool)
            .await?
        }
    };
    let mut best: Option<Score> = None;
    for (significance, priority) in rows {
        let score = decode_score(significance, priority)?;
        best = Some(match best {
            Some(current) if current >= score => current,
            _ => score,
        });
    }
    Ok(best)
}

async fn upsert_aggregate(backend: &Backend, obj_id: i64, data_source_obj_id: i64, score: Score) -> Result<()> {
    let significance = score.significance as i32;
    let priority = score.priority as i32;
    match backend {
        Backend::Sqlite(pool) => {
            let result = sqlx::query(
                "UPDATE tsk_aggregate_score SET significance = ?, priority = ?, data_source_obj_id = ? WHERE obj_id = ?",
            )
            .bind(significance)
            .bind(priority)
            .bind(data_source_obj_id)
            .bind(obj_id)
            .execute(pool)
            .await?;
            if result.rows_affected() == 0 {
                sqlx::query(
                    "INSERT INTO tsk_aggregate_score (obj_id, data_source_obj_id, significance, priority) VALUES (?, ?, ?, ?)",
                )
                .bind(obj_id)
                .bind(data_source_obj_id)
                .bind(significance)
                .bind(priority)
                .execute(pool)
                .await?;
            }
        }
        Backend::Postgres(pool) => {
            let result = sqlx::query(
                "UPDATE tsk_aggregate_score SET significance = $1, priority = $2, data_source_obj_id = $3 WHERE obj_id = $4",
            )
            .bind(significance)
            .bind(priority)
            .bind(data_source_obj_id)
            .bind(obj_id)
            .execute(pool)
            .await?;
            if result.rows_affected() == 0 {
                sqlx::query(
                    "INSERT INTO tsk_aggregate_score (obj_id, data_source_obj_id, significance, priority) VALUES ($1, $2, $3, $4)",
                )
                .bind(obj_id)
                .bind(data_source_obj_id)
                .bind(significance)
                .bind(priority)
                .execute(pool)
                .await?;
            }
        }
    }
    Ok(())
}

async fn delete_aggregate(backend: &Backend, obj_id: i64) -> Result<()> {
    match backend {
        Backend::Sqlite(pool) => {
            sqlx::query("DELETE FROM tsk_aggregate_score WHERE obj_id = ?").bind(obj_id).execute(pool).await?;
        }
        Backend::Postgres(pool) => {
            sqlx::query("DELETE FROM tsk_aggregate_score WHERE obj_id = $1").bind(obj_id).execute(pool).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_ordering_is_lexicographic() {
        let low = Score { significance: Significance::None, priority: Priority::Override };
        let high = Score { significance: Significance::Notable, priority: Priority::Normal };
        assert!(high > low);
    }

    #[test]
    fn default_score_is_unknown_normal() {
        let score = Score { significance: Significance::Unknown, priority: Priority::Normal };
        assert!(score.is_default());
        assert!(!Score { significance: Significance::LikelyNotable, priority: Priority::Normal }.is_default());
    }
}
