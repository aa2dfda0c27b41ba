use crate::domain::IdentifierKind;
use crate::ports::document_store::{Result, StoreError};
use crate::ports::sequence::SequenceSource as SequenceSourceTrait;
use async_trait::async_trait;
use sqlx::PgPool;

/// PostgreSQL implementation of SequenceSource
///
/// A single upsert statement increments and returns the counter, so the row
/// lock taken by PostgreSQL is the serialization point.
pub struct SequenceSource {
    pool: PgPool,
}

impl SequenceSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SequenceSourceTrait for SequenceSource {
    async fn next_value(&self, kind: IdentifierKind) -> Result<u64> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sequences (kind, value)
            VALUES ($1, 1)
            ON CONFLICT (kind) DO UPDATE SET value = sequences.value + 1
            RETURNING value
            "#,
        )
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(Box::new(e)))?;

        u64::try_from(value).map_err(|_| {
            StoreError::Backend(format!("sequence {} out of range: {}", kind.as_str(), value).into())
        })
    }
}
