use crate::ingest::types::{distinct_tickers, RawBar};
use crate::storage::checkpoints::{CheckpointStore, DayOutcome};
use crate::storage::daily_bars::BarSink;
use anyhow::Result;
use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Nothing to load. Deliberately leaves no checkpoint, so a later run
    /// can tell a no-data day from one that failed mid-load.
    NoData,
    Loaded {
        rows_inserted: u64,
    },
    /// The insert failed; a `failed` checkpoint keeps the day eligible for
    /// pickup by a future run.
    Failed,
}

pub async fn load_day(
    checkpoints: &dyn CheckpointStore,
    sink: &dyn BarSink,
    run_id: &str,
    date: NaiveDate,
    bars: Option<Vec<RawBar>>,
) -> Result<LoadOutcome> {
    let Some(bars) = bars.filter(|bars| !bars.is_empty()) else {
        tracing::info!(%date, "no data to save");
        return Ok(LoadOutcome::NoData);
    };

    let total_tickers = distinct_tickers(&bars) as i64;
    checkpoints.record_start(run_id, date, total_tickers).await?;

    match sink.insert_daily_bars(date, &bars).await {
        Ok(rows_inserted) => {
            checkpoints
                .record_terminal(
                    run_id,
                    date,
                    DayOutcome::Completed {
                        total_tickers,
                        rows_inserted: rows_inserted as i64,
                    },
                )
                .await?;
            tracing::info!(%date, rows_inserted, "successfully saved records");
            Ok(LoadOutcome::Loaded { rows_inserted })
        }
        Err(err) => {
            tracing::error!(%date, error = %err, "failed to save data");
            checkpoints
                .record_terminal(
                    run_id,
                    date,
                    DayOutcome::Failed {
                        error: format!("{err:#}"),
                    },
                )
                .await?;
            Ok(LoadOutcome::Failed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::checkpoints::IngestionStats;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Started {
            run_id: String,
            date: NaiveDate,
            total_tickers: i64,
        },
        Terminal {
            run_id: String,
            date: NaiveDate,
            outcome: DayOutcome,
        },
    }

    #[derive(Default)]
    struct RecordingStore {
        events: Mutex<Vec<Event>>,
    }

    #[async_trait::async_trait]
    impl CheckpointStore for RecordingStore {
        async fn completed_dates(&self) -> HashSet<NaiveDate> {
            HashSet::new()
        }

        async fn record_start(
            &self,
            run_id: &str,
            date: NaiveDate,
            total_tickers: i64,
        ) -> Result<()> {
            self.events.lock().unwrap().push(Event::Started {
                run_id: run_id.to_string(),
                date,
                total_tickers,
            });
            Ok(())
        }

        async fn record_terminal(
            &self,
            run_id: &str,
            date: NaiveDate,
            outcome: DayOutcome,
        ) -> Result<()> {
            self.events.lock().unwrap().push(Event::Terminal {
                run_id: run_id.to_string(),
                date,
                outcome,
            });
            Ok(())
        }

        async fn ingestion_stats(&self) -> Option<IngestionStats> {
            None
        }
    }

    #[derive(Default)]
    struct StubSink {
        fail: bool,
        inserted: Mutex<Vec<(NaiveDate, usize)>>,
    }

    #[async_trait::async_trait]
    impl BarSink for StubSink {
        async fn insert_daily_bars(&self, date: NaiveDate, bars: &[RawBar]) -> Result<u64> {
            if self.fail {
                anyhow::bail!("insert rejected");
            }
            self.inserted.lock().unwrap().push((date, bars.len()));
            Ok(bars.len() as u64)
        }
    }

    fn bar(ticker: &str) -> RawBar {
        RawBar {
            ticker: ticker.to_string(),
            volume: Some(100.0),
            vwap: Some(10.1),
            open: Some(10.0),
            close: Some(10.2),
            high: Some(10.4),
            low: Some(9.9),
            timestamp_ms: Some(1_706_648_400_000),
            transactions: Some(12),
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 30).unwrap()
    }

    #[tokio::test]
    async fn missing_or_empty_dataset_writes_nothing() {
        for bars in [None, Some(Vec::new())] {
            let store = RecordingStore::default();
            let sink = StubSink::default();

            let out = load_day(&store, &sink, "run", day(), bars).await.unwrap();

            assert_eq!(out, LoadOutcome::NoData);
            assert!(store.events.lock().unwrap().is_empty());
            assert!(sink.inserted.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn successful_load_brackets_started_then_completed() {
        let store = RecordingStore::default();
        let sink = StubSink::default();
        let bars = vec![bar("AAPL"), bar("MSFT"), bar("AAPL")];

        let out = load_day(&store, &sink, "run", day(), Some(bars))
            .await
            .unwrap();

        assert_eq!(out, LoadOutcome::Loaded { rows_inserted: 3 });
        let events = store.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            Event::Started {
                run_id: "run".to_string(),
                date: day(),
                total_tickers: 2,
            }
        );
        assert_eq!(
            events[1],
            Event::Terminal {
                run_id: "run".to_string(),
                date: day(),
                outcome: DayOutcome::Completed {
                    total_tickers: 2,
                    rows_inserted: 3,
                },
            }
        );
    }

    #[tokio::test]
    async fn sink_failure_brackets_started_then_failed() {
        let store = RecordingStore::default();
        let sink = StubSink {
            fail: true,
            ..Default::default()
        };

        let out = load_day(&store, &sink, "run", day(), Some(vec![bar("AAPL")]))
            .await
            .unwrap();

        assert_eq!(out, LoadOutcome::Failed);
        let events = store.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Event::Started { .. }));
        assert!(matches!(
            &events[1],
            Event::Terminal {
                outcome: DayOutcome::Failed { .. },
                ..
            }
        ));
    }
}
