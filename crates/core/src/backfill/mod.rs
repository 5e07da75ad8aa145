pub mod loader;

use crate::ingest::provider::DailyBarsProvider;
use crate::storage::checkpoints::{CheckpointStore, IngestionStats};
use crate::storage::daily_bars::BarSink;
use crate::time::us_market::TradingCalendar;
use anyhow::Result;
use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use loader::LoadOutcome;

// Fixed inter-day pacing keeps a multi-year run under the upstream request
// budget; the fetcher's own backoff handles trouble within a day.
const PACING_SLEEP: std::time::Duration = std::time::Duration::from_secs(20);
const DEFAULT_YEARS_BACK: u32 = 2;

#[derive(Debug, Clone, Copy)]
pub struct BackfillWindow {
    pub years_back: u32,
    pub days_back_override: Option<i64>,
}

impl Default for BackfillWindow {
    fn default() -> Self {
        Self {
            years_back: DEFAULT_YEARS_BACK,
            days_back_override: None,
        }
    }
}

impl BackfillWindow {
    // The window always ends at yesterday; end-of-day bars only exist once
    // the session has closed.
    pub fn resolve(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let end = today - Duration::days(1);
        let start = match self.days_back_override {
            Some(days) => end - Duration::days(days),
            None => end - Months::new(12 * self.years_back),
        };
        (start, end)
    }
}

#[derive(Debug, Default)]
pub struct BackfillReport {
    pub run_id: String,
    pub total_days: usize,
    pub skipped: usize,
    pub loaded: usize,
    pub no_data: usize,
    pub failed: usize,
    pub rows_inserted: u64,
    pub stats: Option<IngestionStats>,
}

pub struct Backfill<'a> {
    provider: &'a dyn DailyBarsProvider,
    checkpoints: &'a dyn CheckpointStore,
    sink: &'a dyn BarSink,
    calendar: &'a TradingCalendar,
}

impl<'a> Backfill<'a> {
    pub fn new(
        provider: &'a dyn DailyBarsProvider,
        checkpoints: &'a dyn CheckpointStore,
        sink: &'a dyn BarSink,
        calendar: &'a TradingCalendar,
    ) -> Self {
        Self {
            provider,
            checkpoints,
            sink,
            calendar,
        }
    }

    /// Processes every trading day in the window that has no `completed`
    /// checkpoint yet. Safe to re-invoke after an interruption: completed
    /// days are skipped, everything else is picked up again.
    pub async fn run(&self, now: DateTime<Utc>, window: BackfillWindow) -> Result<BackfillReport> {
        let run_id = now.format("%Y%m%d_%H%M%S").to_string();
        let (start, end) = window.resolve(now.date_naive());
        tracing::info!(%run_id, %start, %end, "starting historical data load");

        let completed = self.checkpoints.completed_dates().await;
        let days = self.calendar.trading_days(start, end);
        let total_days = days.len();
        let mut remaining = days.iter().filter(|d| !completed.contains(d)).count();
        tracing::info!(
            total_days,
            already_completed = completed.len(),
            remaining,
            "computed work list"
        );

        let mut report = BackfillReport {
            run_id: run_id.clone(),
            total_days,
            ..Default::default()
        };

        for (i, date) in days.into_iter().enumerate() {
            let progress = i + 1;
            if completed.contains(&date) {
                tracing::info!(%date, progress, total_days, "skipping; already completed");
                report.skipped += 1;
                continue;
            }

            tracing::info!(%date, progress, total_days, remaining, "processing trading day");

            let bars = self.provider.fetch_grouped_daily(date).await;
            match loader::load_day(self.checkpoints, self.sink, &run_id, date, bars).await {
                Ok(LoadOutcome::Loaded { rows_inserted }) => {
                    report.loaded += 1;
                    report.rows_inserted += rows_inserted;
                }
                Ok(LoadOutcome::NoData) => report.no_data += 1,
                Ok(LoadOutcome::Failed) => report.failed += 1,
                Err(err) => {
                    report.failed += 1;
                    tracing::error!(%date, error = %err, "day processing failed");
                }
            }
            remaining -= 1;

            tokio::time::sleep(PACING_SLEEP).await;
        }

        tracing::info!(total_days, "finished processing trading days");

        report.stats = self.checkpoints.ingestion_stats().await;
        if let Some(stats) = &report.stats {
            tracing::info!(
                days_processed = stats.days_processed,
                total_rows = stats.total_rows,
                avg_tickers_per_day = stats.avg_tickers_per_day,
                earliest_date = %stats.earliest_date,
                latest_date = %stats.latest_date,
                failed_runs = stats.failed_runs,
                "ingestion summary"
            );
        }

        Ok(report)
    }
}
