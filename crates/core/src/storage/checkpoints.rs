use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::HashSet;

/// Terminal outcome of one day's load within one run.
#[derive(Debug, Clone, PartialEq)]
pub enum DayOutcome {
    Completed {
        total_tickers: i64,
        rows_inserted: i64,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestionStats {
    pub days_processed: i64,
    pub total_rows: i64,
    pub avg_tickers_per_day: f64,
    pub earliest_date: NaiveDate,
    pub latest_date: NaiveDate,
    pub failed_runs: i64,
}

#[async_trait::async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Days with a `completed` record under any run id. Degrades to the
    /// empty set when the table cannot be read, so an unreachable store
    /// means reprocessing, never a halted backfill.
    async fn completed_dates(&self) -> HashSet<NaiveDate>;

    async fn record_start(&self, run_id: &str, date: NaiveDate, total_tickers: i64) -> Result<()>;

    /// Finalizes the matching `started` record in place. A terminal write
    /// that matches no record is a bug in the start/terminal bracketing and
    /// is surfaced as an error.
    async fn record_terminal(&self, run_id: &str, date: NaiveDate, outcome: DayOutcome)
        -> Result<()>;

    async fn ingestion_stats(&self) -> Option<IngestionStats>;
}

#[derive(Debug, Clone)]
pub struct PgCheckpointStore {
    pool: sqlx::PgPool,
}

impl PgCheckpointStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CheckpointStore for PgCheckpointStore {
    async fn completed_dates(&self) -> HashSet<NaiveDate> {
        let res = sqlx::query_scalar::<_, NaiveDate>(
            "SELECT DISTINCT api_date FROM ingestion_checkpoints WHERE status = 'completed'",
        )
        .persistent(false)
        .fetch_all(&self.pool)
        .await;

        match res {
            Ok(dates) => {
                tracing::info!(
                    completed = dates.len(),
                    "loaded completed dates from checkpoint table"
                );
                dates.into_iter().collect()
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "error reading checkpoint table; starting fresh with no completed dates"
                );
                HashSet::new()
            }
        }
    }

    async fn record_start(&self, run_id: &str, date: NaiveDate, total_tickers: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO ingestion_checkpoints (run_id, api_date, status, total_tickers, started_at) \
             VALUES ($1, $2, 'started', $3, now())",
        )
        .persistent(false)
        .bind(run_id)
        .bind(date)
        .bind(total_tickers)
        .execute(&self.pool)
        .await
        .context("insert started checkpoint failed")?;

        tracing::info!(%date, status = "started", "checkpoint recorded");
        Ok(())
    }

    async fn record_terminal(
        &self,
        run_id: &str,
        date: NaiveDate,
        outcome: DayOutcome,
    ) -> Result<()> {
        let (status, res) = match &outcome {
            DayOutcome::Completed {
                total_tickers,
                rows_inserted,
            } => (
                "completed",
                sqlx::query(
                    "UPDATE ingestion_checkpoints \
                     SET status = 'completed', total_tickers = $3, rows_inserted = $4, completed_at = now() \
                     WHERE run_id = $1 AND api_date = $2",
                )
                .persistent(false)
                .bind(run_id)
                .bind(date)
                .bind(total_tickers)
                .bind(rows_inserted)
                .execute(&self.pool)
                .await,
            ),
            DayOutcome::Failed { error } => (
                "failed",
                sqlx::query(
                    "UPDATE ingestion_checkpoints \
                     SET status = 'failed', error_message = $3, completed_at = now() \
                     WHERE run_id = $1 AND api_date = $2",
                )
                .persistent(false)
                .bind(run_id)
                .bind(date)
                .bind(error)
                .execute(&self.pool)
                .await,
            ),
        };

        let res = res.context("update terminal checkpoint failed")?;
        anyhow::ensure!(
            res.rows_affected() == 1,
            "no started checkpoint to finalize for run {run_id}, date {date}"
        );

        tracing::info!(%date, status, "checkpoint recorded");
        Ok(())
    }

    async fn ingestion_stats(&self) -> Option<IngestionStats> {
        let res = sqlx::query_as::<
            _,
            (
                i64,
                i64,
                Option<f64>,
                Option<NaiveDate>,
                Option<NaiveDate>,
                i64,
            ),
        >(
            "SELECT COUNT(DISTINCT api_date) FILTER (WHERE status = 'completed'), \
                    COALESCE(SUM(rows_inserted) FILTER (WHERE status = 'completed'), 0)::bigint, \
                    (AVG(total_tickers) FILTER (WHERE status = 'completed'))::double precision, \
                    MIN(api_date) FILTER (WHERE status = 'completed'), \
                    MAX(api_date) FILTER (WHERE status = 'completed'), \
                    COUNT(*) FILTER (WHERE status = 'failed') \
             FROM ingestion_checkpoints",
        )
        .persistent(false)
        .fetch_one(&self.pool)
        .await;

        match res {
            Ok((days_processed, total_rows, avg, earliest, latest, failed_runs)) => {
                // All three are NULL exactly when no day has completed yet.
                let (Some(avg_tickers_per_day), Some(earliest_date), Some(latest_date)) =
                    (avg, earliest, latest)
                else {
                    return None;
                };
                Some(IngestionStats {
                    days_processed,
                    total_rows,
                    avg_tickers_per_day,
                    earliest_date,
                    latest_date,
                    failed_runs,
                })
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to read ingestion stats");
                None
            }
        }
    }
}
