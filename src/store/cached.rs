use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use super::{Collection, Document, DocumentStore, StoreError};

/// Read-through cache of whole collections.
///
/// A collection is fetched once and served from memory until any write to it
/// through this wrapper invalidates the cached copy.
pub struct CachingStore<S> {
    inner: S,
    cache: RefCell<HashMap<Collection, Vec<Document>>>,
    misses: Cell<usize>,
}

impl<S: DocumentStore> CachingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: RefCell::new(HashMap::new()),
            misses: Cell::new(0),
        }
    }

    /// Drops the cached copy of `collection`.
    pub fn invalidate(&self, collection: Collection) {
        self.cache.borrow_mut().remove(&collection);
    }

    pub fn clear(&self) {
        self.cache.borrow_mut().clear();
    }

    /// Number of collection fetches that reached the inner store.
    pub fn misses(&self) -> usize {
        self.misses.get()
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn cached(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        if let Some(docs) = self.cache.borrow().get(&collection) {
            return Ok(docs.clone());
        }
        debug!(%collection, "Collection cache miss");
        self.misses.set(self.misses.get() + 1);
        let docs = self.inner.get_collection(collection)?;
        self.cache.borrow_mut().insert(collection, docs.clone());
        Ok(docs)
    }
}

impl<S: DocumentStore> DocumentStore for CachingStore<S> {
    fn get_collection(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        self.cached(collection)
    }

    fn get_document(&self, collection: Collection, id: &str) -> Result<Document, StoreError> {
        self.cached(collection)?
            .into_iter()
            .find(|d| d.id == id)
            .ok_or(StoreError::NotFound)
    }

    fn add_document(&mut self, collection: Collection, data: Value) -> Result<String, StoreError> {
        self.invalidate(collection);
        self.inner.add_document(collection, data)
    }

    fn update_document(
        &mut self,
        collection: Collection,
        id: &str,
        fields: Value,
    ) -> Result<u64, StoreError> {
        self.invalidate(collection);
        self.inner.update_document(collection, id, fields)
    }

    fn delete_document(&mut self, collection: Collection, id: &str) -> Result<(), StoreError> {
        self.invalidate(collection);
        self.inner.delete_document(collection, id)
    }

    fn update_document_if(
        &mut self,
        collection: Collection,
        id: &str,
        expected_version: u64,
        fields: Value,
    ) -> Result<u64, StoreError> {
        self.invalidate(collection);
        self.inner
            .update_document_if(collection, id, expected_version, fields)
    }
}
