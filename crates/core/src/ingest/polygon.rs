use crate::config::Settings;
use crate::ingest::provider::DailyBarsProvider;
use crate::ingest::types::{GroupedDailyResponse, RawBar};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::StatusCode;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// The retry policy is load-bearing for staying under the upstream rate
// budget across a multi-year run: three attempts per day, a long pause when
// rate limited, a short one for server/transport trouble, and no retry at
// all on other client errors.
const MAX_ATTEMPTS: u32 = 3;
const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(60);
const TRANSIENT_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub struct PolygonClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl PolygonClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_api_base_url()?.to_string();
        let api_key = settings.require_polygon_api_key()?.to_string();

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build market data http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    fn url_for(&self, date: NaiveDate) -> String {
        format!("{}/{date}", self.base_url.trim_end_matches('/'))
    }
}

pub(crate) struct ApiReply {
    pub status: StatusCode,
    pub body: String,
}

// One HTTP exchange, no policy. Split out so the retry engine can be driven
// by a scripted transport in tests.
#[async_trait::async_trait]
pub(crate) trait GroupedDailySend: Send + Sync {
    async fn send(&self, date: NaiveDate) -> Result<ApiReply>;
}

#[async_trait::async_trait]
impl GroupedDailySend for PolygonClient {
    async fn send(&self, date: NaiveDate) -> Result<ApiReply> {
        let res = self
            .http
            .get(self.url_for(date))
            .query(&[("adjusted", "true"), ("apiKey", self.api_key.as_str())])
            .send()
            .await
            .context("grouped daily request failed")?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context("failed to read grouped daily response")?;
        Ok(ApiReply { status, body })
    }
}

#[async_trait::async_trait]
impl DailyBarsProvider for PolygonClient {
    async fn fetch_grouped_daily(&self, date: NaiveDate) -> Option<Vec<RawBar>> {
        fetch_with_retry(self, date).await
    }
}

pub(crate) async fn fetch_with_retry<S>(transport: &S, date: NaiveDate) -> Option<Vec<RawBar>>
where
    S: GroupedDailySend + ?Sized,
{
    for attempt in 1..=MAX_ATTEMPTS {
        match transport.send(date).await {
            Ok(reply) if reply.status == StatusCode::OK => {
                return parse_grouped_daily(&reply.body, date);
            }
            Ok(reply) if reply.status == StatusCode::TOO_MANY_REQUESTS => {
                tracing::warn!(%date, attempt, "rate limited; waiting before retry");
                tokio::time::sleep(RATE_LIMIT_BACKOFF).await;
            }
            Ok(reply) if reply.status.is_server_error() => {
                tracing::warn!(%date, attempt, http_status = %reply.status, "server error; retrying");
                tokio::time::sleep(TRANSIENT_BACKOFF).await;
            }
            Ok(reply) => {
                tracing::warn!(%date, http_status = %reply.status, "client error; not retrying");
                return None;
            }
            Err(err) => {
                tracing::warn!(%date, attempt, error = %err, "request failed; retrying");
                tokio::time::sleep(TRANSIENT_BACKOFF).await;
            }
        }
    }

    tracing::warn!(%date, "data not downloaded; retry budget exhausted");
    None
}

fn parse_grouped_daily(body: &str, date: NaiveDate) -> Option<Vec<RawBar>> {
    let parsed = match serde_json::from_str::<GroupedDailyResponse>(body) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::warn!(%date, error = %err, "grouped daily body did not parse");
            return None;
        }
    };

    let bars = parsed.results.unwrap_or_default();
    if bars.is_empty() {
        tracing::info!(%date, "no grouped daily data for this day");
        return None;
    }
    Some(bars)
}
