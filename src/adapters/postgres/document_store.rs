use crate::ports::document_store::{
    CollectionKind, Document, DocumentStore as DocumentStoreTrait, Result, StoreError,
};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde_json::Value;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(Box::new(err))
}

/// 一意キーの挿入エラーを変換する
///
/// SQLSTATE 23505（unique_violation）は`UniqueViolation`、それ以外はバックエンドエラー。
fn unique_key_error(err: sqlx::Error, kind: CollectionKind, field: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::UniqueViolation {
            kind,
            field: field.to_string(),
        },
        _ => backend(err),
    }
}

/// PostgreSQLの行データをDocumentに変換する
fn map_row_to_document(row: &PgRow) -> Result<Document> {
    let id: Uuid = row.try_get("id").map_err(backend)?;
    let version: i64 = row.try_get("version").map_err(backend)?;
    let body: Value = row.try_get("body").map_err(backend)?;

    let version = u64::try_from(version).map_err(|_| {
        StoreError::Backend(format!("document version out of range: {}", version).into())
    })?;

    Ok(Document { id, version, body })
}

/// LIKEパターンの特殊文字をエスケープする
fn escape_like(needle: &str) -> String {
    needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// DocumentStoreのPostgreSQL実装
///
/// ドキュメントはJSONBで`documents`テーブルに保存する。
/// 一意フィールドは`document_unique_keys`の主キーで保証し、
/// 更新はversion列によるcompare-and-swapで行う。
pub struct DocumentStore {
    pool: PgPool,
}

impl DocumentStore {
    /// PostgreSQLコネクションプールから新しいDocumentStoreを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStoreTrait for DocumentStore {
    async fn get(&self, kind: CollectionKind, id: Uuid) -> Result<Option<Document>> {
        let row = sqlx::query(
            r#"
            SELECT id, version, body
            FROM documents
            WHERE kind = $1 AND id = $2
            "#,
        )
        .bind(kind.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.as_ref().map(map_row_to_document).transpose()
    }

    /// ドキュメントを保存する
    ///
    /// 本体の書き込みと一意キーの差し替えを1トランザクションで行う。
    /// どちらかが失敗すればロールバックされ、部分的な書き込みは残らない。
    async fn put(&self, kind: CollectionKind, document: Document) -> Result<Document> {
        let expected_version = i64::try_from(document.version).map_err(|_| {
            StoreError::Backend(format!("document version out of range: {}", document.version).into())
        })?;

        let mut tx = self.pool.begin().await.map_err(backend)?;

        let affected = if document.version == 0 {
            sqlx::query(
                r#"
                INSERT INTO documents (kind, id, version, body)
                VALUES ($1, $2, 1, $3)
                ON CONFLICT (kind, id) DO NOTHING
                "#,
            )
            .bind(kind.as_str())
            .bind(document.id)
            .bind(&document.body)
            .execute(&mut *tx)
            .await
            .map_err(backend)?
            .rows_affected()
        } else {
            sqlx::query(
                r#"
                UPDATE documents
                SET body = $3, version = version + 1, updated_at = NOW()
                WHERE kind = $1 AND id = $2 AND version = $4
                "#,
            )
            .bind(kind.as_str())
            .bind(document.id)
            .bind(&document.body)
            .bind(expected_version)
            .execute(&mut *tx)
            .await
            .map_err(backend)?
            .rows_affected()
        };

        if affected == 0 {
            return Err(StoreError::VersionConflict {
                kind,
                id: document.id,
            });
        }

        sqlx::query("DELETE FROM document_unique_keys WHERE kind = $1 AND document_id = $2")
            .bind(kind.as_str())
            .bind(document.id)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        for field in kind.unique_fields() {
            let Some(value) = document.body.get(*field).filter(|v| !v.is_null()) else {
                continue;
            };
            sqlx::query(
                r#"
                INSERT INTO document_unique_keys (kind, field, value, document_id)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(kind.as_str())
            .bind(*field)
            .bind(value)
            .bind(document.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| unique_key_error(e, kind, field))?;
        }

        tx.commit().await.map_err(backend)?;

        Ok(Document {
            version: document.version + 1,
            ..document
        })
    }

    async fn delete(&self, kind: CollectionKind, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE kind = $1 AND id = $2")
            .bind(kind.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_field(
        &self,
        kind: CollectionKind,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            r#"
            SELECT id, version, body
            FROM documents
            WHERE kind = $1 AND body -> $2::text = $3::jsonb
            ORDER BY id
            "#,
        )
        .bind(kind.as_str())
        .bind(field)
        .bind(value)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(map_row_to_document).collect()
    }

    async fn count_by_field(
        &self,
        kind: CollectionKind,
        field: &str,
        value: &Value,
    ) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM documents
            WHERE kind = $1 AND body -> $2::text = $3::jsonb
            "#,
        )
        .bind(kind.as_str())
        .bind(field)
        .bind(value)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        Ok(count.max(0) as u64)
    }

    async fn search_by_field(
        &self,
        kind: CollectionKind,
        field: &str,
        needle: &str,
    ) -> Result<Vec<Document>> {
        let pattern = format!("%{}%", escape_like(needle));

        let rows = sqlx::query(
            r#"
            SELECT id, version, body
            FROM documents
            WHERE kind = $1 AND body ->> $2::text ILIKE $3
            ORDER BY id
            "#,
        )
        .bind(kind.as_str())
        .bind(field)
        .bind(pattern)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(map_row_to_document).collect()
    }

    fn stream_all(&self, kind: CollectionKind) -> BoxStream<'_, Result<Document>> {
        let stream = sqlx::query(
            r#"
            SELECT id, version, body
            FROM documents
            WHERE kind = $1
            ORDER BY id
            "#,
        )
        .bind(kind.as_str())
        .fetch(&self.pool)
        .map(|row_result| {
            let row = row_result.map_err(backend)?;
            map_row_to_document(&row)
        });

        Box::pin(stream)
    }
}
