pub mod types;
pub use types::*;
pub mod snapshot;
pub mod postgres;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{StorageBackend, StorageConfig};
use crate::market_data::types::PriceLevel;

/// Batch writer for extracted levels.
///
/// One sink is shared by every instrument task, so implementations must
/// accept concurrent, independent calls.
#[async_trait]
pub trait LevelSink: Send + Sync {
    /// Create the destination's table if needed. Called once per destination at startup.
    async fn ensure_destination(&self, destination: &Destination) -> PersistResult<()>;

    /// Write all levels of one snapshot as a single atomic unit and return
    /// how many rows landed. An empty batch is a no-op.
    async fn persist(&self, destination: &Destination, levels: Vec<PriceLevel>) -> PersistResult<usize>;
}

/// Build the sink selected by `storage.backend`.
pub async fn open_sink(config: &StorageConfig) -> PersistResult<Arc<dyn LevelSink>> {
    match config.backend {
        StorageBackend::Postgres => {
            let url = config
                .database_url()
                .ok_or_else(|| PersistError::Connect("no storage.url or DATABASE_URL set".into()))?;
            let sink = postgres::PostgresLevelSink::connect(&url, config).await?;
            Ok(Arc::new(sink))
        }
        StorageBackend::Sqlite => {
            let sink = sqlite::SqliteLevelSink::open(&config.sqlite_path)?;
            Ok(Arc::new(sink))
        }
    }
}
