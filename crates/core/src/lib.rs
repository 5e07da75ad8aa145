pub mod backfill;
pub mod ingest;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;
    use chrono::NaiveDate;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub api_base_url: Option<String>,
        pub polygon_api_key: Option<String>,
        pub market_calendar: Option<String>,
        pub market_extra_closures: Vec<NaiveDate>,
        pub backfill_years: Option<u32>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                api_base_url: std::env::var("API_BASE_URL").ok(),
                polygon_api_key: std::env::var("POLYGON_API_KEY").ok(),
                market_calendar: std::env::var("MARKET_CALENDAR").ok(),
                market_extra_closures: parse_closures(std::env::var("MARKET_EXTRA_CLOSURES").ok()),
                backfill_years: std::env::var("BACKFILL_YEARS")
                    .ok()
                    .and_then(|s| s.parse::<u32>().ok()),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_api_base_url(&self) -> anyhow::Result<&str> {
            self.api_base_url
                .as_deref()
                .context("API_BASE_URL is required")
        }

        pub fn require_polygon_api_key(&self) -> anyhow::Result<&str> {
            self.polygon_api_key
                .as_deref()
                .context("POLYGON_API_KEY is required")
        }
    }

    // Ad-hoc market closures as "YYYY-MM-DD,YYYY-MM-DD". Unparseable entries
    // are skipped.
    fn parse_closures(v: Option<String>) -> Vec<NaiveDate> {
        let Some(v) = v else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for part in v.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if let Ok(d) = NaiveDate::parse_from_str(part, "%Y-%m-%d") {
                out.push(d);
            }
        }
        out
    }
}
