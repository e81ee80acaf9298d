//! In-memory [`DocumentStore`] implementation.
//!
//! Uses a `HashMap` behind `std::sync::RwLock`. Nothing is persisted; this is
//! the store behind the lexical fallback backend and the default in tests.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::Document;

use super::DocumentStore;

/// In-memory store for the fallback backend and tests.
pub struct InMemoryStore {
    docs: RwLock<HashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, String>>> {
        self.docs
            .read()
            .map_err(|_| Error::store("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, String>>> {
        self.docs
            .write()
            .map_err(|_| Error::store("in-memory store lock poisoned"))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn insert(&self, doc: &Document) -> Result<Option<Document>> {
        let previous = self.write()?.insert(doc.id.clone(), doc.text.clone());
        Ok(previous.map(|text| Document::new(doc.id.clone(), text)))
    }

    async fn get(&self, id: &str) -> Result<Option<Document>> {
        Ok(self
            .read()?
            .get(id)
            .map(|text| Document::new(id, text.clone())))
    }

    async fn replace(&self, id: &str, text: &str) -> Result<Option<Document>> {
        let mut docs = self.write()?;
        match docs.get_mut(id) {
            Some(stored) => {
                *stored = text.to_string();
                Ok(Some(Document::new(id, text)))
            }
            None => Ok(None),
        }
    }

    async fn remove(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.write()?.remove(id).map(|text| Document::new(id, text)))
    }

    async fn scan(&self) -> Result<Vec<Document>> {
        let mut docs: Vec<Document> = self
            .read()?
            .iter()
            .map(|(id, text)| Document::new(id.clone(), text.clone()))
            .collect();
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(docs)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}
