//! 型付きのドキュメントアクセス
//!
//! ドメインの集約をJSONドキュメントとして読み書きするヘルパー。
//! versionを保持して更新時のcompare-and-swapに使う。

use crate::domain::{Borrowing, Member, Reservation};
use crate::ports::document_store::{CollectionKind, Document, DocumentStore, StoreError};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use super::errors::{LendingError, Result};

/// ドキュメントとして保存される集約
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    const KIND: CollectionKind;

    fn storage_id(&self) -> Uuid;
}

impl Entity for Member {
    const KIND: CollectionKind = CollectionKind::Member;

    fn storage_id(&self) -> Uuid {
        self.id.value()
    }
}

impl Entity for Borrowing {
    const KIND: CollectionKind = CollectionKind::Borrowing;

    fn storage_id(&self) -> Uuid {
        self.id.value()
    }
}

impl Entity for Reservation {
    const KIND: CollectionKind = CollectionKind::Reservation;

    fn storage_id(&self) -> Uuid {
        self.id.value()
    }
}

/// 読み込んだ時点のversion付きの集約
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub entity: T,
    pub version: u64,
}

fn decode<T: Entity>(document: Document) -> std::result::Result<Versioned<T>, StoreError> {
    Ok(Versioned {
        entity: serde_json::from_value(document.body)?,
        version: document.version,
    })
}

fn encode<T: Entity>(entity: &T, version: u64) -> std::result::Result<Document, StoreError> {
    Ok(Document {
        id: entity.storage_id(),
        version,
        body: serde_json::to_value(entity)?,
    })
}

pub async fn load<T: Entity>(
    store: &dyn DocumentStore,
    id: Uuid,
) -> std::result::Result<Option<Versioned<T>>, StoreError> {
    store.get(T::KIND, id).await?.map(decode).transpose()
}

/// 取得する。存在しなければ`NotFound`
pub async fn require<T: Entity>(store: &dyn DocumentStore, id: Uuid) -> Result<Versioned<T>> {
    load(store, id)
        .await?
        .ok_or_else(|| LendingError::not_found(T::KIND, id))
}

/// 新規保存
pub async fn insert<T: Entity>(
    store: &dyn DocumentStore,
    entity: T,
) -> std::result::Result<Versioned<T>, StoreError> {
    let saved = store.put(T::KIND, encode(&entity, 0)?).await?;
    Ok(Versioned {
        entity,
        version: saved.version,
    })
}

/// 読み込み時のversionを条件に更新する
///
/// 間に別の書き込みがあれば`StoreError::VersionConflict`。
pub async fn update<T: Entity>(
    store: &dyn DocumentStore,
    current: &Versioned<T>,
    entity: T,
) -> std::result::Result<Versioned<T>, StoreError> {
    let saved = store.put(T::KIND, encode(&entity, current.version)?).await?;
    Ok(Versioned {
        entity,
        version: saved.version,
    })
}

pub async fn find_by<T: Entity>(
    store: &dyn DocumentStore,
    field: &str,
    value: impl Serialize,
) -> std::result::Result<Vec<T>, StoreError> {
    let value = serde_json::to_value(value)?;
    store
        .find_by_field(T::KIND, field, &value)
        .await?
        .into_iter()
        .map(|document| decode(document).map(|v| v.entity))
        .collect()
}

pub async fn search_by<T: Entity>(
    store: &dyn DocumentStore,
    field: &str,
    needle: &str,
) -> std::result::Result<Vec<T>, StoreError> {
    store
        .search_by_field(T::KIND, field, needle)
        .await?
        .into_iter()
        .map(|document| decode(document).map(|v| v.entity))
        .collect()
}

pub async fn exists_by(
    store: &dyn DocumentStore,
    kind: CollectionKind,
    field: &str,
    value: impl Serialize,
) -> std::result::Result<bool, StoreError> {
    let value = serde_json::to_value(value)?;
    store.exists_by_field(kind, field, &value).await
}

/// コレクション全体をversion付きで読み込む
pub async fn load_all<T: Entity>(
    store: &dyn DocumentStore,
) -> std::result::Result<Vec<Versioned<T>>, StoreError> {
    use futures::TryStreamExt;

    let documents: Vec<Document> = store.stream_all(T::KIND).try_collect().await?;
    documents.into_iter().map(decode).collect()
}
