use crate::ingest::types::RawBar;
use chrono::NaiveDate;

/// One grouped-daily fetch per trading day. `None` means no data could be
/// obtained for the day (missing results, a non-recoverable status, or an
/// exhausted retry budget); callers treat that as a day to pass over, not a
/// failure of the run.
#[async_trait::async_trait]
pub trait DailyBarsProvider: Send + Sync {
    async fn fetch_grouped_daily(&self, date: NaiveDate) -> Option<Vec<RawBar>>;
}
