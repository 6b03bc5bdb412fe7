//! Adapters for the document collections backing the loan book.

pub mod cached;
pub mod file;

pub use cached::CachingStore;
pub use file::FileStore;

use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Named document collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Debtors,
    Loans,
    Contributions,
    Investors,
    RetainedEarnings,
    TransactionLogs,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Debtors,
        Collection::Loans,
        Collection::Contributions,
        Collection::Investors,
        Collection::RetainedEarnings,
        Collection::TransactionLogs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Debtors => "debtors",
            Collection::Loans => "loans",
            Collection::Contributions => "contributions",
            Collection::Investors => "investors",
            Collection::RetainedEarnings => "retainedEarnings",
            Collection::TransactionLogs => "transactionLogs",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored document with its id and write version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub version: u64,
    pub data: Value,
}

impl Document {
    /// Deserializes the document body. Malformed bodies are permanent errors.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(self.data.clone())
            .map_err(|e| StoreError::Permanent(format!("document {}: {e}", self.id)))
    }
}

/// Represents errors that can occur when talking to the document store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The requested document does not exist.
    NotFound,
    /// The document changed since it was read.
    Conflict,
    /// A temporary failure; the same request may succeed later.
    Transient(String),
    /// A failure that will not go away on its own.
    Permanent(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound => write!(f, "document not found"),
            StoreError::Conflict => write!(f, "document was modified concurrently"),
            StoreError::Transient(e) => write!(f, "temporary store failure: {e}"),
            StoreError::Permanent(e) => write!(f, "store failure: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Abstraction over a document database.
pub trait DocumentStore {
    /// Lists every document in a collection.
    fn get_collection(&self, collection: Collection) -> Result<Vec<Document>, StoreError>;
    /// Reads a single document.
    fn get_document(&self, collection: Collection, id: &str) -> Result<Document, StoreError>;
    /// Stores a new document and returns its generated id.
    fn add_document(&mut self, collection: Collection, data: Value) -> Result<String, StoreError>;
    /// Replaces the top-level fields present in `fields` and returns the new version.
    fn update_document(
        &mut self,
        collection: Collection,
        id: &str,
        fields: Value,
    ) -> Result<u64, StoreError>;

    /// Removes a document. Used to undo an add whose follow-up write failed.
    fn delete_document(&mut self, collection: Collection, id: &str) -> Result<(), StoreError>;

    /// Like [`update_document`](Self::update_document) but fails with
    /// [`StoreError::Conflict`] unless the stored version is `expected_version`.
    fn update_document_if(
        &mut self,
        collection: Collection,
        id: &str,
        expected_version: u64,
        fields: Value,
    ) -> Result<u64, StoreError> {
        let current = self.get_document(collection, id)?;
        if current.version != expected_version {
            return Err(StoreError::Conflict);
        }
        self.update_document(collection, id, fields)
    }
}

/// Merges top-level object fields into `target`; non-objects replace it.
pub(crate) fn merge_fields(target: &mut Value, fields: Value) {
    match (target, fields) {
        (Value::Object(existing), Value::Object(updates)) => {
            for (k, v) in updates {
                existing.insert(k, v);
            }
        }
        (target, fields) => *target = fields,
    }
}

/// In-memory store used for tests and local runs.
pub struct MemoryStore {
    collections: HashMap<Collection, Vec<Document>>,
    next_id: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: HashMap::new(),
            next_id: 1,
        }
    }

    fn find_mut(&mut self, collection: Collection, id: &str) -> Result<&mut Document, StoreError> {
        self.collections
            .get_mut(&collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
            .ok_or(StoreError::NotFound)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryStore {
    fn get_collection(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        Ok(self.collections.get(&collection).cloned().unwrap_or_default())
    }

    fn get_document(&self, collection: Collection, id: &str) -> Result<Document, StoreError> {
        self.collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn add_document(&mut self, collection: Collection, data: Value) -> Result<String, StoreError> {
        let id = format!("doc{}", self.next_id);
        self.next_id += 1;
        debug!(%collection, id = %id, "Adding document");
        self.collections.entry(collection).or_default().push(Document {
            id: id.clone(),
            version: 1,
            data,
        });
        Ok(id)
    }

    fn update_document(
        &mut self,
        collection: Collection,
        id: &str,
        fields: Value,
    ) -> Result<u64, StoreError> {
        let doc = self.find_mut(collection, id)?;
        merge_fields(&mut doc.data, fields);
        doc.version += 1;
        Ok(doc.version)
    }

    fn delete_document(&mut self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let docs = self.collections.get_mut(&collection).ok_or(StoreError::NotFound)?;
        let idx = docs.iter().position(|d| d.id == id).ok_or(StoreError::NotFound)?;
        docs.remove(idx);
        debug!(%collection, id = %id, "Deleted document");
        Ok(())
    }
}
