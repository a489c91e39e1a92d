use std::time::Duration;

use chrono::Utc;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use tracing::{debug, info, instrument};

use crate::config::StorageConfig;
use crate::market_data::types::PriceLevel;
use crate::persist::snapshot;
use crate::persist::types::{Destination, PersistError, PersistResult};
use crate::persist::LevelSink;

/// Postgres sink; one table per destination, all sharing a single pool.
pub struct PostgresLevelSink {
    connection_pool: PgPool,
}

impl PostgresLevelSink {
    pub async fn connect(database_url: &str, config: &StorageConfig) -> PersistResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| PersistError::Connect(Box::new(e)))?;
        info!(max_connections = config.max_connections, "connected to postgres");
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { connection_pool: pool }
    }
}

fn create_table_sql(destination: &Destination) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id                 BIGSERIAL PRIMARY KEY,
            snapshot_timestamp TIMESTAMPTZ NOT NULL,
            price              NUMERIC(30, 10) NOT NULL,
            size               NUMERIC(30, 10) NOT NULL,
            side               VARCHAR(4) NOT NULL,
            "rank"             INTEGER NOT NULL,
            persisted_at       TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
        table = destination.quoted()
    )
}

fn create_index_sql(destination: &Destination) -> String {
    format!(
        r#"CREATE INDEX IF NOT EXISTS {index} ON {table} (snapshot_timestamp)"#,
        index = destination.index_quoted(),
        table = destination.quoted()
    )
}

#[async_trait::async_trait]
impl LevelSink for PostgresLevelSink {
    #[instrument(skip(self), fields(destination = %destination))]
    async fn ensure_destination(&self, destination: &Destination) -> PersistResult<()> {
        let schema_error = |e: sqlx::Error| PersistError::Schema {
            destination: destination.to_string(),
            source: Box::new(e),
        };

        sqlx::query(&create_table_sql(destination))
            .execute(&self.connection_pool)
            .await
            .map_err(schema_error)?;
        sqlx::query(&create_index_sql(destination))
            .execute(&self.connection_pool)
            .await
            .map_err(schema_error)?;

        info!("destination table ready");
        Ok(())
    }

    #[instrument(skip(self, levels), fields(destination = %destination, levels = levels.len()))]
    async fn persist(&self, destination: &Destination, levels: Vec<PriceLevel>) -> PersistResult<usize> {
        if levels.is_empty() {
            debug!("nothing to persist");
            return Ok(0);
        }

        let rows = snapshot::to_rows(levels, Utc::now());

        // A single multi-row INSERT is atomic: the whole snapshot lands or none of it does.
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            r#"INSERT INTO {} (snapshot_timestamp, price, size, side, "rank", persisted_at) "#,
            destination.quoted()
        ));
        builder.push_values(rows, |mut row_values, row| {
            row_values
                .push_bind(row.snapshot_timestamp)
                .push_bind(row.price)
                .push_bind(row.size)
                .push_bind(row.side.as_str())
                .push_bind(row.rank)
                .push_bind(row.persisted_at);
        });

        let result = builder
            .build()
            .execute(&self.connection_pool)
            .await
            .map_err(|e| PersistError::WriteFailed {
                destination: destination.to_string(),
                source: Box::new(e),
            })?;

        Ok(result.rows_affected() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ddl_quotes_destination() {
        let dest = Destination::parse("okx_prices_btc").unwrap();
        let table = create_table_sql(&dest);
        assert!(table.contains(r#"CREATE TABLE IF NOT EXISTS "okx_prices_btc""#));
        assert!(table.contains("persisted_at"));
        assert_eq!(
            create_index_sql(&dest),
            r#"CREATE INDEX IF NOT EXISTS "okx_prices_btc_snapshot_ts_idx" ON "okx_prices_btc" (snapshot_timestamp)"#
        );
    }
}
