// SQLite sink for local runs: one connection, every call hops onto the blocking pool.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use tracing::{debug, info, instrument};

use crate::market_data::types::PriceLevel;
use crate::persist::snapshot;
use crate::persist::types::{BoxError, Destination, LevelRow, PersistError, PersistResult};
use crate::persist::LevelSink;

#[derive(Clone)]
pub struct SqliteLevelSink {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLevelSink {
    /// Open (or create) the database at `path`; `":memory:"` gives a private in-memory db.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let conn = Connection::open(path.as_ref()).map_err(|e| PersistError::Connect(Box::new(e)))?;
        info!(path = %path.as_ref().display(), "opened sqlite database");
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, BoxError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, rusqlite::Error> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let joined = tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await;
        match joined {
            Ok(result) => result.map_err(|e| Box::new(e) as BoxError),
            Err(join_err) => Err(Box::new(join_err) as BoxError),
        }
    }

    /// Number of rows currently stored in `destination`.
    pub async fn count_rows(&self, destination: &Destination) -> PersistResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", destination.quoted());
        self.with_conn(move |conn| conn.query_row(&sql, [], |row| row.get(0)))
            .await
            .map_err(|source| PersistError::Query { destination: destination.to_string(), source })
    }

    /// Rows of `destination` in insertion order.
    pub async fn load_rows(&self, destination: &Destination) -> PersistResult<Vec<LevelRow>> {
        let sql = format!(
            r#"SELECT snapshot_timestamp, price, size, side, "rank", persisted_at FROM {} ORDER BY id"#,
            destination.quoted()
        );
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], read_row)?.collect::<Result<Vec<_>, _>>();
            rows
        })
        .await
        .map_err(|source| PersistError::Query { destination: destination.to_string(), source })
    }
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_column<T, E>(idx: usize, raw: &str, parse: impl FnOnce(&str) -> Result<T, E>) -> rusqlite::Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    parse(raw).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LevelRow> {
    use crate::market_data::types::Side;
    use std::str::FromStr;

    let snapshot_ts: String = row.get(0)?;
    let price: String = row.get(1)?;
    let size: String = row.get(2)?;
    let side: String = row.get(3)?;
    let persisted_at: String = row.get(5)?;

    Ok(LevelRow {
        snapshot_timestamp: parse_column(0, &snapshot_ts, DateTime::parse_from_rfc3339)?.with_timezone(&Utc),
        price: parse_column(1, &price, rust_decimal::Decimal::from_str)?,
        size: parse_column(2, &size, rust_decimal::Decimal::from_str)?,
        side: parse_column(3, &side, Side::from_str)?,
        rank: row.get(4)?,
        persisted_at: parse_column(5, &persisted_at, DateTime::parse_from_rfc3339)?.with_timezone(&Utc),
    })
}

#[async_trait::async_trait]
impl LevelSink for SqliteLevelSink {
    #[instrument(skip(self), fields(destination = %destination))]
    async fn ensure_destination(&self, destination: &Destination) -> PersistResult<()> {
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id                 INTEGER PRIMARY KEY AUTOINCREMENT,
                snapshot_timestamp TEXT NOT NULL,
                price              TEXT NOT NULL,
                size               TEXT NOT NULL,
                side               TEXT NOT NULL,
                "rank"             INTEGER NOT NULL,
                persisted_at       TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS {index} ON {table} (snapshot_timestamp);
            "#,
            table = destination.quoted(),
            index = destination.index_quoted()
        );

        self.with_conn(move |conn| conn.execute_batch(&ddl))
            .await
            .map_err(|source| PersistError::Schema { destination: destination.to_string(), source })?;
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
        let sql = format!(
            r#"INSERT INTO {} (snapshot_timestamp, price, size, side, "rank", persisted_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            destination.quoted()
        );

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(&sql)?;
                for row in &rows {
                    stmt.execute(params![
                        format_ts(&row.snapshot_timestamp),
                        row.price.to_string(),
                        row.size.to_string(),
                        row.side.as_str(),
                        row.rank,
                        format_ts(&row.persisted_at),
                    ])?;
                }
            }
            tx.commit()?;
            Ok(rows.len())
        })
        .await
        .map_err(|source| PersistError::WriteFailed { destination: destination.to_string(), source })
    }
}
