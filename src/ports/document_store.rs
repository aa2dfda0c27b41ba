use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// コレクション（ドキュメントの種類）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Member,
    Borrowing,
    Reservation,
}

impl CollectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::Member => "member",
            CollectionKind::Borrowing => "borrowing",
            CollectionKind::Reservation => "reservation",
        }
    }

    /// 一意制約を持つフィールド
    ///
    /// どのアダプターもこの一覧に従って一意性を保証しなければならない。
    pub fn unique_fields(&self) -> &'static [&'static str] {
        match self {
            CollectionKind::Member => &["email", "member_number"],
            CollectionKind::Borrowing => &["borrowing_number"],
            CollectionKind::Reservation => &["reservation_number"],
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 保存されたドキュメント
///
/// `version == 0` は未保存を表す。保存のたびに1ずつ増える。
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: Uuid,
    pub version: u64,
    pub body: Value,
}

impl Document {
    pub fn new(id: Uuid, body: Value) -> Self {
        Self {
            id,
            version: 0,
            body,
        }
    }
}

/// ストレージのエラー
#[derive(Debug, Error)]
pub enum StoreError {
    /// 一意制約違反
    #[error("unique constraint violated on {kind}.{field}")]
    UniqueViolation { kind: CollectionKind, field: String },

    /// 楽観ロックの競合（期待したversionと一致しない）
    #[error("version conflict on {kind} {id}")]
    VersionConflict { kind: CollectionKind, id: Uuid },

    /// ドキュメントの変換エラー
    #[error("document codec error")]
    Codec(#[from] serde_json::Error),

    /// バックエンド固有のエラー
    #[error("storage backend error")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// ドキュメントストアポート
///
/// IDをキーにしたドキュメントの集合。等値検索と部分一致検索だけを持つ。
/// 書き込みはversionによるcompare-and-swap。
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// IDで取得する
    async fn get(&self, kind: CollectionKind, id: Uuid) -> Result<Option<Document>>;

    /// 保存する
    ///
    /// - `version == 0`：新規作成。同じIDが既にあれば`VersionConflict`
    /// - それ以外：保存済みのversionが一致する場合のみ更新
    ///
    /// 成功時はversionを1進めたドキュメントを返す。
    /// 一意フィールドの重複は`UniqueViolation`。
    async fn put(&self, kind: CollectionKind, document: Document) -> Result<Document>;

    /// 削除する。存在した場合は`true`
    async fn delete(&self, kind: CollectionKind, id: Uuid) -> Result<bool>;

    /// トップレベルのフィールドが`value`と等しいドキュメントを返す
    async fn find_by_field(
        &self,
        kind: CollectionKind,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>>;

    async fn count_by_field(&self, kind: CollectionKind, field: &str, value: &Value)
    -> Result<u64>;

    async fn exists_by_field(
        &self,
        kind: CollectionKind,
        field: &str,
        value: &Value,
    ) -> Result<bool> {
        Ok(self.count_by_field(kind, field, value).await? > 0)
    }

    /// 文字列フィールドの部分一致検索（大文字小文字を区別しない）
    async fn search_by_field(
        &self,
        kind: CollectionKind,
        field: &str,
        needle: &str,
    ) -> Result<Vec<Document>>;

    /// コレクション全体をストリーム配信する
    ///
    /// 延滞検知などのバッチ処理に使用される。
    fn stream_all(&self, kind: CollectionKind) -> BoxStream<'_, Result<Document>>;
}
