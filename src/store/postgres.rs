// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::MessageStore;
use crate::error::StoreError;
use crate::models::{ChatMessage, NewChatMessage, SenderRole};

/// PostgreSQL-backed message store.
#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    /// Connect to the database and create the `chat_messages` table if it
    /// doesn't exist.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chat_messages (
                id BIGSERIAL PRIMARY KEY,
                customer_id TEXT NOT NULL,
                vendor_id TEXT NOT NULL,
                enquiry_id TEXT NOT NULL,
                sender_role TEXT NOT NULL,
                body TEXT NOT NULL,
                external_timestamp TEXT NOT NULL,
                persisted_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chat_messages_thread
             ON chat_messages (customer_id, vendor_id, enquiry_id, persisted_at)",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    async fn fetch(
        &self,
        query: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_message).collect()
    }
}

fn row_to_message(row: &PgRow) -> Result<ChatMessage, StoreError> {
    let role: String = row.try_get("sender_role").map_err(StoreError::from)?;
    let sender_role = role
        .parse::<SenderRole>()
        .map_err(StoreError::Unavailable)?;
    let persisted_at: DateTime<Utc> = row.try_get("persisted_at").map_err(StoreError::from)?;

    Ok(ChatMessage {
        id: row.try_get("id").map_err(StoreError::from)?,
        customer_id: row.try_get("customer_id").map_err(StoreError::from)?,
        vendor_id: row.try_get("vendor_id").map_err(StoreError::from)?,
        enquiry_id: row.try_get("enquiry_id").map_err(StoreError::from)?,
        sender_role,
        body: row.try_get("body").map_err(StoreError::from)?,
        external_timestamp: row
            .try_get("external_timestamp")
            .map_err(StoreError::from)?,
        persisted_at,
    })
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn append(&self, message: NewChatMessage) -> Result<ChatMessage, StoreError> {
        let row = sqlx::query(
            "INSERT INTO chat_messages
                (customer_id, vendor_id, enquiry_id, sender_role, body, external_timestamp)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, persisted_at",
        )
        .bind(&message.customer_id)
        .bind(&message.vendor_id)
        .bind(&message.enquiry_id)
        .bind(message.sender_role.as_str())
        .bind(&message.body)
        .bind(&message.external_timestamp)
        .fetch_one(&self.pool)
        .await?;

        let id: i64 = row.try_get("id")?;
        let persisted_at: DateTime<Utc> = row.try_get("persisted_at")?;

        Ok(ChatMessage {
            id,
            customer_id: message.customer_id,
            vendor_id: message.vendor_id,
            enquiry_id: message.enquiry_id,
            sender_role: message.sender_role,
            body: message.body,
            external_timestamp: message.external_timestamp,
            persisted_at,
        })
    }

    async fn query_scoped(
        &self,
        customer_id: &str,
        vendor_id: &str,
        enquiry_id: &str,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        self.fetch(
            sqlx::query(
                "SELECT * FROM chat_messages
                 WHERE customer_id = $1 AND vendor_id = $2 AND enquiry_id = $3
                 ORDER BY persisted_at ASC, id ASC",
            )
            .bind(customer_id)
            .bind(vendor_id)
            .bind(enquiry_id),
        )
        .await
    }

    async fn query_broad(
        &self,
        customer_id: &str,
        vendor_id: &str,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        self.fetch(
            sqlx::query(
                "SELECT * FROM chat_messages
                 WHERE customer_id = $1 AND vendor_id = $2
                 ORDER BY persisted_at ASC, id ASC",
            )
            .bind(customer_id)
            .bind(vendor_id),
        )
        .await
    }

    async fn query_vendor_threads(&self, vendor_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        self.fetch(
            sqlx::query(
                "SELECT * FROM chat_messages
                 WHERE vendor_id = $1
                 ORDER BY persisted_at DESC, id DESC",
            )
            .bind(vendor_id),
        )
        .await
    }

    async fn query_customer_threads(
        &self,
        customer_id: &str,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        self.fetch(
            sqlx::query(
                "SELECT * FROM chat_messages
                 WHERE customer_id = $1
                 ORDER BY persisted_at DESC, id DESC",
            )
            .bind(customer_id),
        )
        .await
    }

    async fn query_thread_desc(
        &self,
        customer_id: &str,
        vendor_id: &str,
        enquiry_id: &str,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        self.fetch(
            sqlx::query(
                "SELECT * FROM chat_messages
                 WHERE customer_id = $1 AND vendor_id = $2 AND enquiry_id = $3
                 ORDER BY persisted_at DESC, id DESC",
            )
            .bind(customer_id)
            .bind(vendor_id)
            .bind(enquiry_id),
        )
        .await
    }
}
