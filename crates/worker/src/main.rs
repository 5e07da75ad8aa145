use anyhow::Context;
use clap::Parser;
use polybars_core::backfill::{Backfill, BackfillWindow};
use polybars_core::ingest::polygon::PolygonClient;
use polybars_core::storage::checkpoints::PgCheckpointStore;
use polybars_core::storage::daily_bars::PgBarSink;
use polybars_core::time::us_market::TradingCalendar;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "polybars_worker")]
struct Args {
    /// Backfill window in years (default 2; BACKFILL_YEARS also applies).
    #[arg(long)]
    years_back: Option<u32>,

    /// Explicit backfill window in days, overriding the year window.
    #[arg(long)]
    days_back: Option<i64>,

    /// Resolve the window and calendar, then exit without fetching or writing.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = polybars_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let calendar_id = settings.market_calendar.as_deref().unwrap_or("NYSE");
    let calendar = TradingCalendar::from_id(calendar_id)?
        .with_extra_closures(settings.market_extra_closures.iter().copied());

    let mut window = BackfillWindow::default();
    if let Some(years) = args.years_back.or(settings.backfill_years) {
        window.years_back = years;
    }
    window.days_back_override = args.days_back;

    if args.dry_run {
        let (start, end) = window.resolve(chrono::Utc::now().date_naive());
        let days = calendar.trading_days(start, end);
        tracing::info!(
            %start,
            %end,
            trading_days = days.len(),
            dry_run = true,
            "resolved backfill window"
        );
        return Ok(());
    }

    let db_url = settings.require_database_url()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    polybars_core::storage::migrate(&pool).await?;

    let acquired = polybars_core::storage::lock::try_acquire_backfill_lock(&pool).await?;
    if !acquired {
        tracing::warn!("backfill lock not acquired; another run in progress");
        return Ok(());
    }

    let provider = PolygonClient::from_settings(&settings)?;
    let checkpoints = PgCheckpointStore::new(pool.clone());
    let sink = PgBarSink::new(pool.clone());
    let backfill = Backfill::new(&provider, &checkpoints, &sink, &calendar);

    let result = backfill.run(chrono::Utc::now(), window).await;

    match &result {
        Ok(report) => {
            tracing::info!(
                run_id = %report.run_id,
                total_days = report.total_days,
                skipped = report.skipped,
                loaded = report.loaded,
                no_data = report.no_data,
                failed = report.failed,
                rows_inserted = report.rows_inserted,
                "backfill finished"
            );
        }
        Err(err) => {
            sentry_anyhow::capture_anyhow(err);
            tracing::error!(error = %err, "backfill run failed");
        }
    }

    let _ = polybars_core::storage::lock::release_backfill_lock(&pool).await;

    result.map(|_| ())
}

fn init_sentry(settings: &polybars_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
