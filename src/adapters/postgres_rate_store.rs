//! Postgres implementation of RateStore.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{AccountType, InterestRate};
use crate::ports::{RateStore, RepositoryError, RepositoryResult};

#[derive(Clone)]
pub struct PostgresRateStore {
    pool: PgPool,
}

impl PostgresRateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RateStore for PostgresRateStore {
    async fn get(&self, account_type: AccountType) -> RepositoryResult<Option<InterestRate>> {
        let row = sqlx::query_as::<_, RateRow>(
            "SELECT account_type, rate, updated_at FROM interest_rates WHERE account_type = $1",
        )
        .bind(account_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(RateRow::into_domain).transpose()
    }

    async fn upsert(
        &self,
        account_type: AccountType,
        rate: &BigDecimal,
        at: DateTime<Utc>,
    ) -> RepositoryResult<InterestRate> {
        let row = sqlx::query_as::<_, RateRow>(
            r#"
            INSERT INTO interest_rates (account_type, rate, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (account_type) DO UPDATE SET rate = EXCLUDED.rate, updated_at = EXCLUDED.updated_at
            RETURNING account_type, rate, updated_at
            "#,
        )
        .bind(account_type.as_str())
        .bind(rate)
        .bind(at)
        .fetch_one(&self.pool)
        .await?;

        row.into_domain()
    }

    async fn list(&self) -> RepositoryResult<Vec<InterestRate>> {
        let rows = sqlx::query_as::<_, RateRow>(
            "SELECT account_type, rate, updated_at FROM interest_rates ORDER BY account_type",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RateRow::into_domain).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RateRow {
    account_type: String,
    rate: BigDecimal,
    updated_at: DateTime<Utc>,
}

impl RateRow {
    fn into_domain(self) -> RepositoryResult<InterestRate> {
        let account_type = self
            .account_type
            .parse::<AccountType>()
            .map_err(|e| RepositoryError::Database(sqlx::Error::Decode(Box::new(e))))?;
        Ok(InterestRate {
            account_type,
            rate: self.rate,
            updated_at: self.updated_at,
        })
    }
}
