// Durable storage for guild settings
// SQLite via rusqlite or PostgreSQL via sqlx, one flattened row per guild

use async_trait::async_trait;
use rusqlite::{params, Connection};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tokio::sync::Mutex;
use tracing::debug;

use crate::models::guild::GuildSettingsRecord;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("postgres error: {0}")]
    Postgres(#[from] sqlx::Error),
    #[error("invalid guild settings row: guild id {0}")]
    InvalidRecord(u64),
}

/// Bulk read and upsert over persisted guild settings
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load_all(&self) -> Result<Vec<GuildSettingsRecord>, StoreError>;
    async fn upsert(&self, record: &GuildSettingsRecord) -> Result<(), StoreError>;
}

/// SQLite-backed settings store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `dsn`; `:memory:` is accepted
    pub fn open(dsn: &str) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open(dsn)?)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS guild_settings (
                guild_id             INTEGER PRIMARY KEY,
                member_join_enabled  INTEGER NOT NULL DEFAULT 0,
                member_join_channel  INTEGER NOT NULL DEFAULT 0,
                member_join_format   TEXT    NOT NULL DEFAULT ''
            )",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

// Snowflakes fit in 63 bits; the cast is a lossless bit reinterpretation either way.
fn to_sql_id(id: u64) -> i64 {
    id as i64
}

fn from_sql_id(id: i64) -> u64 {
    id as u64
}

#[async_trait]
impl SettingsStore for SqliteStore {
    async fn load_all(&self) -> Result<Vec<GuildSettingsRecord>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT guild_id, member_join_enabled, member_join_channel, member_join_format
            FROM guild_settings",
        )?;

        let records = stmt
            .query_map([], |row| {
                Ok(GuildSettingsRecord {
                    guild_id: from_sql_id(row.get(0)?),
                    member_join_enabled: row.get(1)?,
                    member_join_channel: from_sql_id(row.get(2)?),
                    member_join_format: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Loaded {} guild settings rows", records.len());
        Ok(records)
    }

    async fn upsert(&self, record: &GuildSettingsRecord) -> Result<(), StoreError> {
        self.conn.lock().await.execute(
            "INSERT INTO guild_settings (
                guild_id,
                member_join_enabled,
                member_join_channel,
                member_join_format
            )
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(guild_id) DO UPDATE SET
                member_join_enabled = excluded.member_join_enabled,
                member_join_channel = excluded.member_join_channel,
                member_join_format = excluded.member_join_format",
            params![
                to_sql_id(record.guild_id),
                record.member_join_enabled,
                to_sql_id(record.member_join_channel),
                record.member_join_format,
            ],
        )?;

        debug!("Saved guild settings for {}", record.guild_id);
        Ok(())
    }
}

type PgRow = (i64, bool, i64, String);

fn record_from_pg_row((guild_id, enabled, channel, format): PgRow) -> GuildSettingsRecord {
    GuildSettingsRecord {
        guild_id: from_sql_id(guild_id),
        member_join_enabled: enabled,
        member_join_channel: from_sql_id(channel),
        member_join_format: format,
    }
}

/// PostgreSQL-backed settings store
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(dsn: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new().max_connections(5).connect(dsn).await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS guild_settings (
                guild_id             BIGINT  PRIMARY KEY,
                member_join_enabled  BOOLEAN NOT NULL DEFAULT FALSE,
                member_join_channel  BIGINT  NOT NULL DEFAULT 0,
                member_join_format   TEXT    NOT NULL DEFAULT ''
            )
            ",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl SettingsStore for PostgresStore {
    async fn load_all(&self) -> Result<Vec<GuildSettingsRecord>, StoreError> {
        let rows = sqlx::query_as::<_, PgRow>(
            r"
            SELECT guild_id, member_join_enabled, member_join_channel, member_join_format
            FROM guild_settings
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        debug!("Loaded {} guild settings rows", rows.len());
        Ok(rows.into_iter().map(record_from_pg_row).collect())
    }

    async fn upsert(&self, record: &GuildSettingsRecord) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO guild_settings (
                guild_id,
                member_join_enabled,
                member_join_channel,
                member_join_format
            )
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (guild_id) DO UPDATE SET
                member_join_enabled = EXCLUDED.member_join_enabled,
                member_join_channel = EXCLUDED.member_join_channel,
                member_join_format = EXCLUDED.member_join_format
            ",
        )
        .bind(to_sql_id(record.guild_id))
        .bind(record.member_join_enabled)
        .bind(to_sql_id(record.member_join_channel))
        .bind(&record.member_join_format)
        .execute(&self.pool)
        .await?;

        debug!("Saved guild settings for {}", record.guild_id);
        Ok(())
    }
}
