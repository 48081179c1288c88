use async_trait::async_trait;
use chrono::Utc;

use super::models::JobRow;
use super::retry::retry_on_sqlite_busy;
use super::DbPool;
use crate::domain::{Job, JobStatus};
use crate::{Error, Result};

/// Job Store (C1) operations, `spec.md` §4.1.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job: &Job) -> Result<()>;
    async fn get(&self, job_id: &str) -> Result<Option<Job>>;
    async fn update(&self, job: &Job) -> Result<()>;
    async fn delete(&self, job_id: &str) -> Result<()>;
    async fn list(&self, status: Option<JobStatus>, limit: i64, offset: i64) -> Result<Vec<Job>>;
    async fn count(&self, status: Option<JobStatus>) -> Result<i64>;
    /// Rows whose `expires_at` is strictly in the past.
    async fn expired(&self) -> Result<Vec<Job>>;
    /// Rows with `status = queued`, oldest first (startup recovery).
    async fn queued(&self) -> Result<Vec<Job>>;
    /// Rows in any non-terminal, non-queued state (crash-recovery orphans).
    async fn in_progress(&self) -> Result<Vec<Job>>;
    /// Counts grouped by status, for `GET /admin/stats`.
    async fn counts_by_status(&self) -> Result<Vec<(JobStatus, i64)>>;
}

pub struct SqliteJobStore {
    pool: DbPool,
}

impl SqliteJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn create(&self, job: &Job) -> Result<()> {
        let row = JobRow::from_job(job)?;
        retry_on_sqlite_busy("jobs.create", || {
            let row = row.clone();
            let pool = self.pool.clone();
            async move {
                let result = sqlx::query(
                    r#"
                    INSERT INTO jobs (
                        job_id, status, stage, progress, url, filename, input_path, audio_path,
                        output_json, output_txt, output_srt, output_md, webhook_url,
                        duration_seconds, error, created_at, started_at, completed_at,
                        failed_at, expires_at
                    ) VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?)
                    "#,
                )
                .bind(&row.job_id)
                .bind(&row.status)
                .bind(&row.stage)
                .bind(row.progress)
                .bind(&row.url)
                .bind(&row.filename)
                .bind(&row.input_path)
                .bind(&row.audio_path)
                .bind(&row.output_json)
                .bind(&row.output_txt)
                .bind(&row.output_srt)
                .bind(&row.output_md)
                .bind(&row.webhook_url)
                .bind(row.duration_seconds)
                .bind(&row.error)
                .bind(row.created_at)
                .bind(row.started_at)
                .bind(row.completed_at)
                .bind(row.failed_at)
                .bind(row.expires_at)
                .execute(&pool)
                .await;

                match result {
                    Ok(_) => Ok(()),
                    Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                        Err(Error::Duplicate(row.job_id.clone()))
                    }
                    Err(e) => Err(Error::from(e)),
                }
            }
        })
        .await
    }

    async fn get(&self, job_id: &str) -> Result<Option<Job>> {
        let row: Option<JobRow> = sqlx::query_as("SELECT * FROM jobs WHERE job_id = ?")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(JobRow::into_job).transpose()
    }

    async fn update(&self, job: &Job) -> Result<()> {
        let row = JobRow::from_job(job)?;
        retry_on_sqlite_busy("jobs.update", || {
            let row = row.clone();
            let pool = self.pool.clone();
            async move {
                let result = sqlx::query(
                    r#"
                    UPDATE jobs SET
                        status = ?, stage = ?, progress = ?, url = ?, filename = ?,
                        input_path = ?, audio_path = ?, output_json = ?, output_txt = ?,
                        output_srt = ?, output_md = ?, webhook_url = ?, duration_seconds = ?,
                        error = ?, created_at = ?, started_at = ?, completed_at = ?,
                        failed_at = ?, expires_at = ?
                    WHERE job_id = ?
                    "#,
                )
                .bind(&row.status)
                .bind(&row.stage)
                .bind(row.progress)
                .bind(&row.url)
                .bind(&row.filename)
                .bind(&row.input_path)
                .bind(&row.audio_path)
                .bind(&row.output_json)
                .bind(&row.output_txt)
                .bind(&row.output_srt)
                .bind(&row.output_md)
                .bind(&row.webhook_url)
                .bind(row.duration_seconds)
                .bind(&row.error)
                .bind(row.created_at)
                .bind(row.started_at)
                .bind(row.completed_at)
                .bind(row.failed_at)
                .bind(row.expires_at)
                .bind(&row.job_id)
                .execute(&pool)
                .await;

                match result {
                    Ok(result) if result.rows_affected() == 0 => {
                        Err(Error::NotFound(row.job_id.clone()))
                    }
                    Ok(_) => Ok(()),
                    Err(e) => Err(Error::from(e)),
                }
            }
        })
        .await
    }

    async fn delete(&self, job_id: &str) -> Result<()> {
        retry_on_sqlite_busy("jobs.delete", || {
            let pool = self.pool.clone();
            async move {
                sqlx::query("DELETE FROM jobs WHERE job_id = ?")
                    .bind(job_id)
                    .execute(&pool)
                    .await?;
                Ok(())
            }
        })
        .await
    }

    async fn list(&self, status: Option<JobStatus>, limit: i64, offset: i64) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = if let Some(status) = status {
            sqlx::query_as(
                "SELECT * FROM jobs WHERE status = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
            )
            .bind(status.to_string())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as("SELECT * FROM jobs ORDER BY created_at DESC LIMIT ? OFFSET ?")
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
        };
        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn count(&self, status: Option<JobStatus>) -> Result<i64> {
        let count: i64 = if let Some(status) = status {
            sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status = ?")
                .bind(status.to_string())
                .fetch_one(&self.pool)
                .await?
        } else {
            sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
                .fetch_one(&self.pool)
                .await?
        };
        Ok(count)
    }

    async fn expired(&self) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as("SELECT * FROM jobs WHERE expires_at < ?")
            .bind(Utc::now())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn queued(&self) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> =
            sqlx::query_as("SELECT * FROM jobs WHERE status = 'queued' ORDER BY created_at ASC")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn in_progress(&self) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            "SELECT * FROM jobs WHERE status NOT IN ('queued', 'completed', 'failed') \
             ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn counts_by_status(&self) -> Result<Vec<(JobStatus, i64)>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM jobs GROUP BY status")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter()
            .map(|(status, count)| Ok((status.parse::<JobStatus>()?, count)))
            .collect()
    }
}
