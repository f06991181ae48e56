use serde_json::json;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{Error as SqlxError, Row};
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

use super::store::{RoomQuery, RoomStore, StoreError, StoreFuture};
use crate::models::Room;

const SCHEMA_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS study_rooms (
        id UUID PRIMARY KEY,
        version BIGINT NOT NULL,
        is_active BOOLEAN NOT NULL,
        doc JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    );
    CREATE INDEX IF NOT EXISTS study_rooms_doc_idx ON study_rooms USING GIN (doc jsonb_path_ops);
"#;

impl From<SqlxError> for StoreError {
    fn from(err: SqlxError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Postgres backed room store. Each room is kept as one JSONB document.
pub struct DbRooms {
    pool: PgPool,
}

impl DbRooms {
    /// Create a new database connection pool
    pub async fn new(database_url: &str) -> Result<Self, SqlxError> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(database_url)
            .await?;

        info!("Database connection pool created successfully");

        Ok(Self { pool })
    }

    /// Create the rooms table and index when missing
    pub async fn ensure_schema(&self) -> Result<(), SqlxError> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    fn room_from_row(row: &PgRow) -> Result<Room, SqlxError> {
        let Json(mut room): Json<Room> = row.try_get("doc")?;
        room.version = row.try_get("version")?;
        Ok(room)
    }

    /// JSONB containment document matching a query
    fn containment(query: &RoomQuery) -> serde_json::Value {
        match query {
            RoomQuery::ActiveMember(uid) => json!({
                "is_active": true,
                "participants": [{ "user_id": uid, "state": "active" }]
            }),
            RoomQuery::AnyMember(uid) => json!({
                "participants": [{ "user_id": uid }]
            }),
            RoomQuery::OwnedBy(uid) => json!({
                "participants": [{ "user_id": uid, "role": "owner" }]
            }),
        }
    }
}

impl RoomStore for DbRooms {
    fn get(&self, room_id: Uuid) -> StoreFuture<'_, Room> {
        Box::pin(async move {
            let row = sqlx::query("SELECT doc, version FROM study_rooms WHERE id = $1")
                .bind(room_id)
                .fetch_optional(&self.pool)
                .await?;
            match row {
                Some(row) => Ok(Self::room_from_row(&row)?),
                None => Err(StoreError::NotFound(room_id)),
            }
        })
    }

    fn insert(&self, mut room: Room) -> StoreFuture<'_, Room> {
        Box::pin(async move {
            room.version = 1;
            let result = sqlx::query(
                r#"
                INSERT INTO study_rooms (id, version, is_active, doc, created_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(room.id)
            .bind(room.version)
            .bind(room.is_active)
            .bind(Json(&room))
            .bind(room.created_at)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(StoreError::Conflict(room.id));
            }
            Ok(room)
        })
    }

    fn save(&self, mut room: Room) -> StoreFuture<'_, Room> {
        Box::pin(async move {
            let expected = room.version;
            room.version += 1;
            let updated = sqlx::query(
                r#"
                UPDATE study_rooms
                SET doc = $2, version = $3, is_active = $4, updated_at = now()
                WHERE id = $1 AND version = $5
                "#,
            )
            .bind(room.id)
            .bind(Json(&room))
            .bind(room.version)
            .bind(room.is_active)
            .bind(expected)
            .execute(&self.pool)
            .await?;

            if updated.rows_affected() == 1 {
                return Ok(room);
            }

            // Distinguish a missing row from a lost race
            let exists = sqlx::query("SELECT 1 FROM study_rooms WHERE id = $1")
                .bind(room.id)
                .fetch_optional(&self.pool)
                .await?
                .is_some();
            if exists {
                error!("Version conflict saving study room {}", room.id);
                Err(StoreError::Conflict(room.id))
            } else {
                Err(StoreError::NotFound(room.id))
            }
        })
    }

    fn find(&self, query: RoomQuery) -> StoreFuture<'_, Vec<Room>> {
        Box::pin(async move {
            let rows = sqlx::query(
                "SELECT doc, version FROM study_rooms WHERE doc @> $1 ORDER BY created_at DESC",
            )
            .bind(Json(Self::containment(&query)))
            .fetch_all(&self.pool)
            .await?;

            let rooms = rows
                .iter()
                .map(Self::room_from_row)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rooms)
        })
    }
}
