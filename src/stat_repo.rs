// SQLite stat store. Both producers share one StatRepo; each batch is one transaction.

use crate::error::IngestError;
use crate::models::{
    NetworkMedium, NetworkStatRow, StatBatch, StorageClass, StorageStatRow,
};
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

/// Where finished batches go. Implementations must accept calls from the sampler task and the
/// MQTT handler at the same time, and commit each batch all-or-nothing.
pub trait StatSink: Send + Sync {
    fn commit(&self, batch: &StatBatch) -> impl Future<Output = Result<(), IngestError>> + Send;
}

pub struct StatRepo {
    pool: SqlitePool,
}

impl StatRepo {
    pub async fn connect(path: &str, max_pool_size: u32) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_pool_size)
            .connect_with(opts)
            .await?;
        Ok(Self { pool })
    }

    /// Create tables and indexes if they don't exist. Safe to call repeatedly.
    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS network_stat (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ip VARCHAR(15) NOT NULL,
                mac CHAR(17),
                network TEXT NOT NULL,
                device VARCHAR(255) NOT NULL,
                rx_rate INTEGER NOT NULL,
                tx_rate INTEGER NOT NULL,
                observed_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_network_stat_ip ON network_stat(ip)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_network_stat_observed_at ON network_stat(observed_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS storage_stat (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                device VARCHAR(255) NOT NULL,
                storage_type TEXT NOT NULL,
                read_rate INTEGER NOT NULL,
                write_rate INTEGER NOT NULL,
                observed_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_storage_stat_observed_at ON storage_stat(observed_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self, batch), fields(repo = "stat", operation = "save_batch", network_rows = batch.network.len(), storage_rows = batch.storage.len()))]
    pub async fn save_batch(&self, batch: &StatBatch) -> anyhow::Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for r in &batch.network {
            sqlx::query(
                "INSERT INTO network_stat (ip, mac, network, device, rx_rate, tx_rate, observed_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(&r.ip)
            .bind(r.mac.as_deref())
            .bind(r.medium.as_str())
            .bind(&r.device)
            .bind(rate_to_db(r.rx_rate))
            .bind(rate_to_db(r.tx_rate))
            .bind(r.observed_at.timestamp_millis())
            .execute(&mut *tx)
            .await?;
        }
        for r in &batch.storage {
            sqlx::query(
                "INSERT INTO storage_stat (device, storage_type, read_rate, write_rate, observed_at) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(&r.device)
            .bind(r.class.as_str())
            .bind(rate_to_db(r.read_rate))
            .bind(rate_to_db(r.write_rate))
            .bind(r.observed_at.timestamp_millis())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Most recent network rows, oldest first. For inspection; the pipeline never reads back.
    pub async fn get_recent_network_rows(&self, limit: u32) -> anyhow::Result<Vec<NetworkStatRow>> {
        let rows = sqlx::query(
            "SELECT ip, mac, network, device, rx_rate, tx_rate, observed_at
             FROM network_stat ORDER BY id DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let network: String = row.try_get("network")?;
            out.push(NetworkStatRow {
                ip: row.try_get("ip")?,
                mac: row.try_get("mac")?,
                medium: NetworkMedium::from_db(&network),
                device: row.try_get("device")?,
                rx_rate: row.try_get::<i64, _>("rx_rate")?.max(0) as u64,
                tx_rate: row.try_get::<i64, _>("tx_rate")?.max(0) as u64,
                observed_at: observed_at(&row)?,
            });
        }
        out.reverse();
        Ok(out)
    }

    pub async fn get_recent_storage_rows(&self, limit: u32) -> anyhow::Result<Vec<StorageStatRow>> {
        let rows = sqlx::query(
            "SELECT device, storage_type, read_rate, write_rate, observed_at
             FROM storage_stat ORDER BY id DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let storage_type: String = row.try_get("storage_type")?;
            out.push(StorageStatRow {
                device: row.try_get("device")?,
                class: StorageClass::from_db(&storage_type),
                read_rate: row.try_get::<i64, _>("read_rate")?.max(0) as u64,
                write_rate: row.try_get::<i64, _>("write_rate")?.max(0) as u64,
                observed_at: observed_at(&row)?,
            });
        }
        out.reverse();
        Ok(out)
    }

    /// Names of the stat tables present in the database (used to check provisioning).
    pub async fn table_names(&self) -> anyhow::Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE '%_stat' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| r.try_get::<String, _>("name").map_err(Into::into))
            .collect()
    }
}

impl StatSink for StatRepo {
    async fn commit(&self, batch: &StatBatch) -> Result<(), IngestError> {
        self.save_batch(batch)
            .await
            .map_err(IngestError::SinkCommitFailed)
    }
}

/// SQLite INTEGER is i64; rates beyond that are saturated rather than wrapped.
fn rate_to_db(rate: u64) -> i64 {
    i64::try_from(rate).unwrap_or(i64::MAX)
}

fn observed_at(row: &SqliteRow) -> anyhow::Result<DateTime<Utc>> {
    let ms: i64 = row.try_get("observed_at")?;
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| anyhow::anyhow!("observed_at out of range: {}", ms))
}
