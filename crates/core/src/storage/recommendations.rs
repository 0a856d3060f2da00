use crate::domain::recommendation::{RecommendationItem, RecommendationRun};
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

pub async fn persist_success(pool: &sqlx::PgPool, run: &RecommendationRun) -> anyhow::Result<Uuid> {
    let mut tx = pool.begin().await.context("begin transaction failed")?;
    let omissions = serde_json::to_value(&run.omissions).context("serialize omissions failed")?;

    sqlx::query(
        "INSERT INTO recommendation_runs \
         (id, week_start, generated_at, status, error, converted_rating, per_customer, train_fraction, \
          seed, trained_ratings, held_out_ratings, rmse, omissions) \
         VALUES ($1, $2, $3, 'success', NULL, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(run.run_id)
    .bind(run.week_start)
    .bind(run.generated_at)
    .bind(run.converted_rating as i32)
    .bind(run.per_customer as i32)
    .bind(run.train_fraction)
    .bind(run.seed as i64)
    .bind(run.trained_ratings as i32)
    .bind(run.held_out_ratings as i32)
    .bind(run.rmse)
    .bind(omissions)
    .execute(&mut *tx)
    .await
    .context("insert recommendation_runs failed")?;

    let mut inserted = 0usize;
    for customer in &run.customers {
        for item in &customer.items {
            insert_item(&mut tx, run.run_id, customer.customer_id, &customer.country, item).await?;
            inserted += 1;
        }
    }

    tx.commit().await.context("commit transaction failed")?;
    tracing::info!(run_id = %run.run_id, items = inserted, "persisted recommendation run");
    Ok(run.run_id)
}

pub async fn persist_failure(
    pool: &sqlx::PgPool,
    week_start: NaiveDate,
    generated_at: DateTime<Utc>,
    error: &str,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO recommendation_runs (id, week_start, generated_at, status, error) \
         VALUES ($1, $2, $3, 'error', $4)",
    )
    .bind(id)
    .bind(week_start)
    .bind(generated_at)
    .bind(error)
    .execute(pool)
    .await
    .context("insert error recommendation_runs failed")?;

    Ok(id)
}

async fn insert_item(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    run_id: Uuid,
    customer_id: i64,
    country: &str,
    item: &RecommendationItem,
) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO recommendation_items (run_id, customer_id, rank, country, time_window, predicted_rating, send_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(run_id)
    .bind(customer_id)
    .bind(item.rank)
    .bind(country)
    .bind(item.time_window.label())
    .bind(item.predicted_rating)
    .bind(item.send_at)
    .execute(&mut **tx)
    .await
    .context("insert recommendation_items failed")?;

    Ok(())
}
