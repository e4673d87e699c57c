//! Persistence collaborator: streamer records backed by SQLite.
//!
//! A thin layer over the `streamers` table. Credentials are stored as
//! opaque tokens and looked up directly rather than hashed, because the
//! field-connection handshake (§4.9) needs O(1) reverse lookup by
//! presented credential.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use fieldmux_common::ids;
use fieldmux_common::models::{StreamDestination, StreamerRecord};

use crate::error::{AppError, AppResult};

/// The contract the hub needs from persistence: resolve a streamer by
/// either credential or id, and the admin mutations to create/approve
/// one and manage its destinations.
pub trait StreamerStore {
    async fn get_by_id(&self, id: &str) -> AppResult<Option<StreamerRecord>>;
    async fn get_by_write_credential(&self, credential: &str) -> AppResult<Option<StreamerRecord>>;
    async fn get_by_read_credential(&self, credential: &str) -> AppResult<Option<StreamerRecord>>;
    async fn list(&self) -> AppResult<Vec<StreamerRecord>>;
    async fn create(&self, name: &str, auto_approve: bool) -> AppResult<StreamerRecord>;
    async fn set_approved(&self, id: &str, approved: bool) -> AppResult<()>;
    async fn set_destinations(&self, id: &str, destinations: &[StreamDestination]) -> AppResult<()>;
}

type StreamerRow = (
    String,          // id
    String,          // name
    String,          // avatar_url
    String,          // color
    String,          // socials (json)
    bool,            // approved
    String,          // write_credential
    String,          // read_credential
    String,          // destinations (json)
    DateTime<Utc>,   // created_at
);

fn row_to_record(row: StreamerRow) -> AppResult<StreamerRecord> {
    let (id, name, avatar_url, color, socials, approved, write_credential, read_credential, destinations, created_at) = row;
    Ok(StreamerRecord {
        id,
        name,
        avatar_url,
        color,
        socials: serde_json::from_str(&socials).unwrap_or_default(),
        approved,
        write_credential,
        read_credential,
        destinations: serde_json::from_str(&destinations)
            .map_err(|e| AppError::internal(format!("corrupt destinations blob: {e}")))?,
        created_at,
    })
}

const SELECT_COLUMNS: &str = "id, name, avatar_url, color, socials, approved, \
    write_credential, read_credential, destinations, created_at";

pub struct SqliteStreamerStore {
    pool: SqlitePool,
}

impl SqliteStreamerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl StreamerStore for SqliteStreamerStore {
    async fn get_by_id(&self, id: &str) -> AppResult<Option<StreamerRecord>> {
        let row = sqlx::query_as::<_, StreamerRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM streamers WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_record).transpose()
    }

    /// Resolve a write-scoped credential presented by a field agent.
    async fn get_by_write_credential(&self, credential: &str) -> AppResult<Option<StreamerRecord>> {
        let row = sqlx::query_as::<_, StreamerRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM streamers WHERE write_credential = ?"
        ))
        .bind(credential)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_record).transpose()
    }

    /// Resolve a read-scoped credential presented by an overlay client.
    async fn get_by_read_credential(&self, credential: &str) -> AppResult<Option<StreamerRecord>> {
        let row = sqlx::query_as::<_, StreamerRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM streamers WHERE read_credential = ?"
        ))
        .bind(credential)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_record).transpose()
    }

    async fn list(&self) -> AppResult<Vec<StreamerRecord>> {
        let rows = sqlx::query_as::<_, StreamerRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM streamers ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_record).collect()
    }

    async fn create(&self, name: &str, auto_approve: bool) -> AppResult<StreamerRecord> {
        let record = StreamerRecord {
            id: ids::streamer_id(),
            name: name.to_string(),
            avatar_url: String::new(),
            color: "#ff6600".to_string(),
            socials: Vec::new(),
            approved: auto_approve,
            write_credential: ids::write_credential(),
            read_credential: ids::read_credential(),
            destinations: Vec::new(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO streamers \
             (id, name, avatar_url, color, socials, approved, write_credential, read_credential, destinations, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(&record.avatar_url)
        .bind(&record.color)
        .bind("[]")
        .bind(record.approved)
        .bind(&record.write_credential)
        .bind(&record.read_credential)
        .bind("[]")
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        tracing::info!(streamer_id = %record.id, name, "streamer created");
        Ok(record)
    }

    async fn set_approved(&self, id: &str, approved: bool) -> AppResult<()> {
        let result = sqlx::query("UPDATE streamers SET approved = ? WHERE id = ?")
            .bind(approved)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("streamer", id));
        }
        Ok(())
    }

    async fn set_destinations(&self, id: &str, destinations: &[StreamDestination]) -> AppResult<()> {
        let blob = serde_json::to_string(destinations)
            .map_err(|e| AppError::internal(format!("failed to serialize destinations: {e}")))?;

        let result = sqlx::query("UPDATE streamers SET destinations = ? WHERE id = ?")
            .bind(blob)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("streamer", id));
        }
        Ok(())
    }
}
