//! `PostgreSQL` implementation of [`PlanRepository`].
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE plans (
//!     id UUID PRIMARY KEY,
//!     provider_plan_id TEXT NOT NULL UNIQUE,
//!     title TEXT NOT NULL,
//!     start_date TIMESTAMPTZ NOT NULL,
//!     end_date TIMESTAMPTZ NOT NULL,
//!     min_price NUMERIC NOT NULL,
//!     max_price NUMERIC NOT NULL,
//!     sell_mode TEXT NOT NULL,
//!     organizer_company_id TEXT,
//!     sell_from TIMESTAMPTZ,
//!     sell_to TIMESTAMPTZ,
//!     sold_out BOOLEAN NOT NULL,
//!     last_updated TIMESTAMPTZ NOT NULL,
//!     version BIGINT NOT NULL
//! );
//!
//! CREATE TABLE plan_zones (
//!     plan_id UUID REFERENCES plans(id) ON DELETE CASCADE,
//!     position BIGINT NOT NULL,
//!     zone_id TEXT NOT NULL,
//!     name TEXT NOT NULL,
//!     price NUMERIC NOT NULL,
//!     capacity BIGINT NOT NULL,
//!     numbered BOOLEAN NOT NULL,
//!     PRIMARY KEY (plan_id, position)
//! );
//! ```
//!
//! Prices are stored without a fixed scale so a stored plan compares equal
//! to the provider data it came from.

use chrono::{DateTime, Utc};
use plansync_core::repository::{PlanRepository, RepositoryError};
use plansync_core::{
    DateRange, INITIAL_VERSION, Plan, PlanId, PlanSnapshot, PriceRange, ProviderPlanId, SellMode,
    Zone,
};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::future::Future;
use std::pin::Pin;
use uuid::Uuid;

#[derive(sqlx::FromRow)]
struct PlanRow {
    id: Uuid,
    provider_plan_id: String,
    title: String,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    min_price: Decimal,
    max_price: Decimal,
    sell_mode: String,
    organizer_company_id: Option<String>,
    sell_from: Option<DateTime<Utc>>,
    sell_to: Option<DateTime<Utc>>,
    sold_out: bool,
    last_updated: DateTime<Utc>,
    version: i64,
}

#[derive(sqlx::FromRow)]
struct ZoneRow {
    zone_id: String,
    name: String,
    price: Decimal,
    capacity: i64,
    numbered: bool,
}

/// Plan repository backed by `PostgreSQL`.
#[derive(Clone)]
pub struct PostgresPlanRepository {
    pool: PgPool,
}

impl PostgresPlanRepository {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a new pool against `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Database`] if the connection fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to connect: {e}")))?;

        Ok(Self::new(pool))
    }

    /// Create the `plans` and `plan_zones` tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn find(&self, provider_plan_id: &ProviderPlanId) -> Result<Option<Plan>, RepositoryError> {
        let row: Option<PlanRow> = sqlx::query_as(
            "SELECT id, provider_plan_id, title, start_date, end_date, min_price, max_price,
                    sell_mode, organizer_company_id, sell_from, sell_to, sold_out,
                    last_updated, version
             FROM plans
             WHERE provider_plan_id = $1",
        )
        .bind(provider_plan_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to load plan: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let zones: Vec<ZoneRow> = sqlx::query_as(
            "SELECT zone_id, name, price, capacity, numbered
             FROM plan_zones
             WHERE plan_id = $1
             ORDER BY position",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to load zones: {e}")))?;

        restore(row, zones).map(Some)
    }

    async fn write(&self, plan: Plan) -> Result<Plan, RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to start transaction: {e}")))?;

        let stored: Option<(Uuid, i64)> = sqlx::query_as(
            "SELECT id, version FROM plans WHERE provider_plan_id = $1 FOR UPDATE",
        )
        .bind(plan.provider_plan_id().as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to lock plan: {e}")))?;

        let expected = plan.version() - 1;
        let row_id = match stored {
            None if plan.version() == INITIAL_VERSION => {
                insert_plan(&mut tx, &plan).await?;
                *plan.id().as_uuid()
            }
            Some((id, version)) if version == expected => {
                update_plan(&mut tx, id, &plan).await?;
                id
            }
            other => {
                if let Err(e) = tx.rollback().await {
                    tracing::warn!(
                        provider_plan_id = %plan.provider_plan_id(),
                        error = %e,
                        "Failed to roll back after version mismatch"
                    );
                }
                return Err(RepositoryError::OptimisticLock {
                    provider_plan_id: plan.provider_plan_id().clone(),
                    expected,
                    actual: other.map(|(_, version)| version),
                });
            }
        };

        replace_zones(&mut tx, row_id, plan.zones()).await?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to commit transaction: {e}")))?;

        tracing::debug!(
            provider_plan_id = %plan.provider_plan_id(),
            version = plan.version(),
            "Plan stored"
        );
        Ok(plan)
    }
}

async fn insert_plan(tx: &mut Transaction<'_, Postgres>, plan: &Plan) -> Result<(), RepositoryError> {
    let sell_period = plan.sell_period();
    let result = sqlx::query(
        "INSERT INTO plans (id, provider_plan_id, title, start_date, end_date, min_price,
                            max_price, sell_mode, organizer_company_id, sell_from, sell_to,
                            sold_out, last_updated, version)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
    )
    .bind(plan.id().as_uuid())
    .bind(plan.provider_plan_id().as_str())
    .bind(plan.title())
    .bind(plan.date().from())
    .bind(plan.date().to())
    .bind(plan.price_range().min())
    .bind(plan.price_range().max())
    .bind(plan.sell_mode().as_str())
    .bind(plan.organizer_company_id())
    .bind(sell_period.map(|period| period.from()))
    .bind(sell_period.map(|period| period.to()))
    .bind(plan.sold_out())
    .bind(plan.last_updated())
    .bind(plan.version())
    .execute(&mut **tx)
    .await;

    match result {
        Ok(_) => Ok(()),
        // A concurrent writer inserted the same plan between our lock query and insert.
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(RepositoryError::OptimisticLock {
                provider_plan_id: plan.provider_plan_id().clone(),
                expected: 0,
                actual: None,
            })
        }
        Err(e) => Err(RepositoryError::Database(format!("Failed to insert plan: {e}"))),
    }
}

async fn update_plan(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    plan: &Plan,
) -> Result<(), RepositoryError> {
    let sell_period = plan.sell_period();
    sqlx::query(
        "UPDATE plans
         SET title = $2, start_date = $3, end_date = $4, min_price = $5, max_price = $6,
             sell_mode = $7, organizer_company_id = $8, sell_from = $9, sell_to = $10,
             sold_out = $11, last_updated = $12, version = $13
         WHERE id = $1",
    )
    .bind(id)
    .bind(plan.title())
    .bind(plan.date().from())
    .bind(plan.date().to())
    .bind(plan.price_range().min())
    .bind(plan.price_range().max())
    .bind(plan.sell_mode().as_str())
    .bind(plan.organizer_company_id())
    .bind(sell_period.map(|period| period.from()))
    .bind(sell_period.map(|period| period.to()))
    .bind(plan.sold_out())
    .bind(plan.last_updated())
    .bind(plan.version())
    .execute(&mut **tx)
    .await
    .map_err(|e| RepositoryError::Database(format!("Failed to update plan: {e}")))?;

    Ok(())
}

async fn replace_zones(
    tx: &mut Transaction<'_, Postgres>,
    plan_id: Uuid,
    zones: &[Zone],
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM plan_zones WHERE plan_id = $1")
        .bind(plan_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to clear zones: {e}")))?;

    for (position, zone) in (0_i64..).zip(zones) {
        sqlx::query(
            "INSERT INTO plan_zones (plan_id, position, zone_id, name, price, capacity, numbered)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(plan_id)
        .bind(position)
        .bind(zone.id())
        .bind(zone.name())
        .bind(zone.price())
        .bind(i64::from(zone.capacity()))
        .bind(zone.numbered())
        .execute(&mut **tx)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to insert zone: {e}")))?;
    }

    Ok(())
}

fn restore(row: PlanRow, zones: Vec<ZoneRow>) -> Result<Plan, RepositoryError> {
    let corrupt = |e: &dyn std::fmt::Display| {
        RepositoryError::Corrupt(format!("plan {}: {e}", row.provider_plan_id))
    };

    let date = DateRange::new(row.start_date, row.end_date).map_err(|e| corrupt(&e))?;
    let price_range = PriceRange::new(row.min_price, row.max_price).map_err(|e| corrupt(&e))?;
    let sell_mode: SellMode = row.sell_mode.parse().map_err(|e| corrupt(&e))?;
    let sell_period = match (row.sell_from, row.sell_to) {
        (Some(from), Some(to)) => Some(DateRange::new(from, to).map_err(|e| corrupt(&e))?),
        (None, None) => None,
        _ => return Err(corrupt(&"sell period is half-set")),
    };

    let zones = zones
        .into_iter()
        .map(|zone| {
            let capacity = u32::try_from(zone.capacity).map_err(|e| corrupt(&e))?;
            Zone::new(zone.zone_id, zone.name, zone.price, capacity, zone.numbered)
                .map_err(|e| corrupt(&e))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let snapshot = PlanSnapshot {
        id: PlanId::from_uuid(row.id),
        provider_plan_id: row.provider_plan_id.clone(),
        title: row.title,
        date,
        price_range,
        sell_mode,
        organizer_company_id: row.organizer_company_id,
        sell_period,
        sold_out: row.sold_out,
        zones,
        last_updated: row.last_updated,
        version: row.version,
    };

    Plan::restore(snapshot).map_err(|e| corrupt(&e))
}

impl PlanRepository for PostgresPlanRepository {
    fn find_by_provider_id<'a>(
        &'a self,
        provider_plan_id: &'a ProviderPlanId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Plan>, RepositoryError>> + Send + 'a>> {
        Box::pin(self.find(provider_plan_id))
    }

    fn upsert(
        &self,
        plan: Plan,
    ) -> Pin<Box<dyn Future<Output = Result<Plan, RepositoryError>> + Send + '_>> {
        Box::pin(self.write(plan))
    }

    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<(), RepositoryError>> + Send + '_>> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(|e| RepositoryError::Database(format!("Ping failed: {e}")))?;
            Ok(())
        })
    }
}
