use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Error as SqlxError;
use std::time::Duration;
use tracing::{error, info};

use crate::db::store::{RoomStore, StoreError};
use crate::models::{Comment, RoomRow};

const SCHEMA_SQL: [&str; 4] = [
    r#"
        CREATE TABLE IF NOT EXISTS rooms (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            video_url TEXT,
            video_position DOUBLE PRECISION NOT NULL DEFAULT 0,
            is_playing BOOLEAN NOT NULL DEFAULT FALSE
        )
    "#,
    r#"
        CREATE TABLE IF NOT EXISTS comments (
            id TEXT PRIMARY KEY,
            room_id TEXT NOT NULL,
            author_id TEXT NOT NULL,
            author_name TEXT NOT NULL,
            text TEXT NOT NULL,
            video_position DOUBLE PRECISION NOT NULL,
            reply_to_id TEXT,
            created_at BIGINT NOT NULL
        )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_comments_room_id ON comments(room_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_comments_video_position ON comments(room_id, video_position)",
];

/// Comment row as stored
#[derive(Debug, sqlx::FromRow)]
struct CommentRow {
    id: String,
    room_id: String,
    author_id: String,
    author_name: String,
    text: String,
    video_position: f64,
    reply_to_id: Option<String>,
    created_at: i64,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            room_id: row.room_id,
            author_id: row.author_id,
            author_name: row.author_name,
            text: row.text,
            video_position_seconds: row.video_position,
            reply_to_id: row.reply_to_id,
            created_at: row.created_at,
        }
    }
}

/// PostgreSQL backed room store
pub struct PgRoomStore {
    pool: PgPool,
}

impl PgRoomStore {
    /// Create a new database connection pool and make sure the schema exists
    pub async fn connect(database_url: &str) -> Result<Self, SqlxError> {
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

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), SqlxError> {
        for statement in SCHEMA_SQL {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Database schema initialized");
        Ok(())
    }

    fn log_pool_state(&self, action: &str, room_id: &str) {
        let pool_idle = self.pool.num_idle() as u32;
        let pool_size = self.pool.size();
        info!(
            "{} for room {}. Pool connections: {} idle, {} in use",
            action,
            room_id,
            pool_idle,
            pool_size.saturating_sub(pool_idle)
        );
    }
}

#[async_trait]
impl RoomStore for PgRoomStore {
    async fn create_room(&self, id: &str, name: &str) -> Result<RoomRow, StoreError> {
        self.log_pool_state("Creating room", id);

        let row = sqlx::query_as::<_, RoomRow>(
            r#"
                INSERT INTO rooms (id, name, created_at, video_url, video_position, is_playing)
                VALUES ($1, $2, $3, NULL, 0, FALSE)
                RETURNING id, name, created_at, video_url, video_position, is_playing
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn get_room(&self, id: &str) -> Result<Option<RoomRow>, StoreError> {
        let row = sqlx::query_as::<_, RoomRow>(
            "SELECT id, name, created_at, video_url, video_position, is_playing FROM rooms WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn list_rooms(&self, limit: i64) -> Result<Vec<RoomRow>, StoreError> {
        let rows = sqlx::query_as::<_, RoomRow>(
            r#"
                SELECT id, name, created_at, video_url, video_position, is_playing
                FROM rooms
                ORDER BY created_at DESC
                LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn delete_room(&self, id: &str) -> Result<bool, StoreError> {
        self.log_pool_state("Deleting room", id);

        // Begin a transaction, comments go together with their room
        let mut tx = match self.pool.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                error!(
                    "Failed to acquire connection from pool for room {}: {}. Pool state: {} idle, {} total",
                    id, e, self.pool.num_idle(), self.pool.size()
                );
                return Err(e.into());
            }
        };

        sqlx::query("DELETE FROM comments WHERE room_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM rooms WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        Ok(deleted > 0)
    }

    async fn update_video_state(
        &self,
        id: &str,
        video_url: Option<&str>,
        position: f64,
        is_playing: bool,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE rooms SET video_url = $1, video_position = $2, is_playing = $3 WHERE id = $4")
            .bind(video_url)
            .bind(position)
            .bind(is_playing)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn create_comment(&self, comment: &Comment) -> Result<(), StoreError> {
        sqlx::query(
            r#"
                INSERT INTO comments (id, room_id, author_id, author_name, text, video_position, reply_to_id, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&comment.id)
        .bind(&comment.room_id)
        .bind(&comment.author_id)
        .bind(&comment.author_name)
        .bind(&comment.text)
        .bind(comment.video_position_seconds)
        .bind(&comment.reply_to_id)
        .bind(comment.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_comments_by_room(&self, room_id: &str, limit: i64) -> Result<Vec<Comment>, StoreError> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
                SELECT id, room_id, author_id, author_name, text, video_position, reply_to_id, created_at
                FROM comments
                WHERE room_id = $1
                ORDER BY created_at DESC
                LIMIT $2
            "#,
        )
        .bind(room_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Comment::from).collect())
    }

    async fn list_comments_by_video_window(
        &self,
        room_id: &str,
        start: f64,
        end: f64,
    ) -> Result<Vec<Comment>, StoreError> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
                SELECT id, room_id, author_id, author_name, text, video_position, reply_to_id, created_at
                FROM comments
                WHERE room_id = $1 AND video_position BETWEEN $2 AND $3
                ORDER BY video_position ASC
            "#,
        )
        .bind(room_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Comment::from).collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
