use crate::ingest::types::RawBar;
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};

const INSERT_BATCH: usize = 500;

#[async_trait::async_trait]
pub trait BarSink: Send + Sync {
    /// Persists a day's bars to the fact table and returns the row count.
    /// Errors are the caller's to record; they must not escape the loader.
    async fn insert_daily_bars(&self, date: NaiveDate, bars: &[RawBar]) -> Result<u64>;
}

#[derive(Debug, Clone)]
pub struct PgBarSink {
    pool: sqlx::PgPool,
}

impl PgBarSink {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl BarSink for PgBarSink {
    async fn insert_daily_bars(&self, date: NaiveDate, bars: &[RawBar]) -> Result<u64> {
        anyhow::ensure!(!bars.is_empty(), "bars must be non-empty");

        let mut tx = self.pool.begin().await.context("begin transaction failed")?;

        // Replace the day's partition so a retried load cannot double-count.
        sqlx::query("DELETE FROM daily_bars WHERE date = $1")
            .persistent(false)
            .bind(date)
            .execute(&mut *tx)
            .await
            .context("delete existing rows for date failed")?;

        // ingested_at is stamped at write time; a retried load gets a fresh one.
        let ingested_at = Utc::now();

        let mut inserted: u64 = 0;
        let mut batch_idx: usize = 0;
        for chunk in bars.chunks(INSERT_BATCH) {
            batch_idx += 1;
            let t0 = std::time::Instant::now();
            let mut qb = sqlx::QueryBuilder::new(
                "INSERT INTO daily_bars (\"T\", v, vw, o, c, h, l, ts, n, date, ingested_at) ",
            );
            qb.push_values(chunk, |mut b, bar| {
                b.push_bind(&bar.ticker)
                    .push_bind(bar.volume)
                    .push_bind(bar.vwap)
                    .push_bind(bar.open)
                    .push_bind(bar.close)
                    .push_bind(bar.high)
                    .push_bind(bar.low)
                    .push_bind(bar.timestamp_utc())
                    .push_bind(bar.transactions)
                    .push_bind(date)
                    .push_bind(ingested_at);
            });

            let res = qb
                .build()
                .persistent(false)
                .execute(&mut *tx)
                .await
                .context("batch insert daily_bars failed")?;
            inserted += res.rows_affected();

            tracing::debug!(
                %date,
                batch_idx,
                batch_size = chunk.len(),
                elapsed_ms = t0.elapsed().as_millis(),
                "daily_bars batch insert"
            );
        }

        tx.commit().await.context("commit transaction failed")?;
        Ok(inserted)
    }
}
