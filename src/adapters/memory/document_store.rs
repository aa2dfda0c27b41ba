use crate::ports::document_store::{
    CollectionKind, Document, DocumentStore as DocumentStoreTrait, Result, StoreError,
};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredDocument {
    version: u64,
    body: Value,
}

type Collections = HashMap<CollectionKind, HashMap<Uuid, StoredDocument>>;

/// In-memory implementation of DocumentStore
///
/// Used by tests and by the server when no database is configured.
/// Writes are serialized by a single mutex, so the version check and the
/// unique-field check happen atomically with the insert.
pub struct DocumentStore {
    collections: Mutex<Collections>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Collections>> {
        self.collections
            .lock()
            .map_err(|_| StoreError::Backend("in-memory document store lock poisoned".into()))
    }

    fn snapshot(&self, kind: CollectionKind) -> Result<Vec<Document>> {
        let collections = self.lock()?;
        Ok(collections
            .get(&kind)
            .map(|documents| {
                documents
                    .iter()
                    .map(|(id, stored)| to_document(*id, stored))
                    .collect()
            })
            .unwrap_or_default())
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

fn to_document(id: Uuid, stored: &StoredDocument) -> Document {
    Document {
        id,
        version: stored.version,
        body: stored.body.clone(),
    }
}

fn field_matches(body: &Value, field: &str, value: &Value) -> bool {
    body.get(field) == Some(value)
}

#[async_trait]
impl DocumentStoreTrait for DocumentStore {
    async fn get(&self, kind: CollectionKind, id: Uuid) -> Result<Option<Document>> {
        let collections = self.lock()?;
        Ok(collections
            .get(&kind)
            .and_then(|documents| documents.get(&id))
            .map(|stored| to_document(id, stored)))
    }

    async fn put(&self, kind: CollectionKind, document: Document) -> Result<Document> {
        let mut collections = self.lock()?;
        let documents = collections.entry(kind).or_default();

        // Compare-and-swap on version
        let current_version = documents.get(&document.id).map(|stored| stored.version);
        let accepted = match current_version {
            None => document.version == 0,
            Some(version) => document.version != 0 && version == document.version,
        };
        if !accepted {
            return Err(StoreError::VersionConflict {
                kind,
                id: document.id,
            });
        }

        // Unique fields must not collide with any other document
        for field in kind.unique_fields() {
            let Some(value) = document.body.get(*field).filter(|v| !v.is_null()) else {
                continue;
            };
            let taken = documents
                .iter()
                .any(|(id, stored)| *id != document.id && field_matches(&stored.body, field, value));
            if taken {
                return Err(StoreError::UniqueViolation {
                    kind,
                    field: (*field).to_string(),
                });
            }
        }

        let stored = StoredDocument {
            version: document.version + 1,
            body: document.body,
        };
        let saved = to_document(document.id, &stored);
        documents.insert(document.id, stored);
        Ok(saved)
    }

    async fn delete(&self, kind: CollectionKind, id: Uuid) -> Result<bool> {
        let mut collections = self.lock()?;
        Ok(collections
            .get_mut(&kind)
            .map(|documents| documents.remove(&id).is_some())
            .unwrap_or(false))
    }

    async fn find_by_field(
        &self,
        kind: CollectionKind,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>> {
        let mut found: Vec<Document> = self
            .snapshot(kind)?
            .into_iter()
            .filter(|document| field_matches(&document.body, field, value))
            .collect();
        found.sort_by_key(|document| document.id);
        Ok(found)
    }

    async fn count_by_field(
        &self,
        kind: CollectionKind,
        field: &str,
        value: &Value,
    ) -> Result<u64> {
        let collections = self.lock()?;
        let count = collections
            .get(&kind)
            .map(|documents| {
                documents
                    .values()
                    .filter(|stored| field_matches(&stored.body, field, value))
                    .count()
            })
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn search_by_field(
        &self,
        kind: CollectionKind,
        field: &str,
        needle: &str,
    ) -> Result<Vec<Document>> {
        let needle = needle.to_lowercase();
        let mut found: Vec<Document> = self
            .snapshot(kind)?
            .into_iter()
            .filter(|document| {
                document
                    .body
                    .get(field)
                    .and_then(Value::as_str)
                    .is_some_and(|text| text.to_lowercase().contains(&needle))
            })
            .collect();
        found.sort_by_key(|document| document.id);
        Ok(found)
    }

    fn stream_all(&self, kind: CollectionKind) -> BoxStream<'_, Result<Document>> {
        match self.snapshot(kind) {
            Ok(documents) => stream::iter(documents.into_iter().map(Ok)).boxed(),
            Err(e) => stream::once(async move { Err(e) }).boxed(),
        }
    }
}
