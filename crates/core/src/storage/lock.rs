use anyhow::Context;
use chrono::{Datelike, NaiveDate};

// Every run targets one compliance week and its items are read back per week, so two batches for
// the same week must not both write. The key is session-scoped: a crashed worker frees it.
const WEEK_LOCK_NAMESPACE: i64 = 0x4341_4445 << 24; // "CADE"; the low 24 bits hold the week

/// Held advisory lock for one compliance week. Release it with [`WeekLock::release`].
#[derive(Debug)]
pub struct WeekLock {
    week_start: NaiveDate,
    key: i64,
}

impl WeekLock {
    fn key_for(week_start: NaiveDate) -> i64 {
        // Weeks start on Mondays, so the week number since CE is unique per week.
        WEEK_LOCK_NAMESPACE | i64::from(week_start.num_days_from_ce() / 7)
    }

    /// `None` when another session already holds the week.
    pub async fn try_acquire(
        pool: &sqlx::PgPool,
        week_start: NaiveDate,
    ) -> anyhow::Result<Option<Self>> {
        let key = Self::key_for(week_start);
        let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
            .persistent(false)
            .bind(key)
            .fetch_one(pool)
            .await
            .with_context(|| format!("failed to lock compliance week {week_start} (key={key})"))?;

        if acquired {
            tracing::debug!(%week_start, key, "compliance week locked");
        }
        Ok(acquired.then_some(Self { week_start, key }))
    }

    pub async fn release(self, pool: &sqlx::PgPool) -> anyhow::Result<()> {
        let released: bool = sqlx::query_scalar("SELECT pg_advisory_unlock($1)")
            .persistent(false)
            .bind(self.key)
            .fetch_one(pool)
            .await
            .with_context(|| format!("failed to unlock compliance week {}", self.week_start))?;

        if !released {
            tracing::warn!(week_start = %self.week_start, "compliance week lock was not held");
        }
        Ok(())
    }
}
