use anyhow::Context;

// Advisory locks are scoped to the Postgres session. This is a best-effort
// guard against two backfill runs interleaving checkpoint writes; the lock
// is dropped with the connection if the process dies.
const BACKFILL_LOCK_KEY: i64 = 0x504F_4C59_4241_5253; // "POLYBARS" as a hex-ish namespace.

pub async fn try_acquire_backfill_lock(pool: &sqlx::PgPool) -> anyhow::Result<bool> {
    let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
        .persistent(false)
        .bind(BACKFILL_LOCK_KEY)
        .fetch_one(pool)
        .await
        .context("failed to acquire backfill advisory lock")?;
    Ok(acquired.0)
}

pub async fn release_backfill_lock(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::query("SELECT pg_advisory_unlock($1)")
        .persistent(false)
        .bind(BACKFILL_LOCK_KEY)
        .execute(pool)
        .await
        .context("failed to release backfill advisory lock")?;
    Ok(())
}
