use std::path::PathBuf;

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::{Collection, Document, DocumentStore, StoreError, merge_fields};

/// Adapter that keeps each collection in a local JSON file.
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Create a new store rooted at `base_dir`. The directory is created on first write.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn collection_path(&self, collection: Collection) -> PathBuf {
        self.base_dir.join(format!("{}.json", collection.as_str()))
    }

    fn load(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        let path = self.collection_path(collection);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data =
            std::fs::read_to_string(&path).map_err(|e| StoreError::Transient(e.to_string()))?;
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&data)
            .map_err(|e| StoreError::Permanent(format!("{}: {e}", path.display())))
    }

    fn save(&self, collection: Collection, docs: &[Document]) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| StoreError::Transient(e.to_string()))?;
        let data =
            serde_json::to_string_pretty(docs).map_err(|e| StoreError::Permanent(e.to_string()))?;
        let path = self.collection_path(collection);
        debug!(path = %path.display(), documents = docs.len(), "Writing collection");
        std::fs::write(&path, data).map_err(|e| StoreError::Transient(e.to_string()))
    }
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("loan-book"))
    }
}

impl DocumentStore for FileStore {
    fn get_collection(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        self.load(collection)
    }

    fn get_document(&self, collection: Collection, id: &str) -> Result<Document, StoreError> {
        self.load(collection)?
            .into_iter()
            .find(|d| d.id == id)
            .ok_or(StoreError::NotFound)
    }

    fn add_document(&mut self, collection: Collection, data: Value) -> Result<String, StoreError> {
        let mut docs = self.load(collection)?;
        let id = Uuid::new_v4().simple().to_string();
        docs.push(Document {
            id: id.clone(),
            version: 1,
            data,
        });
        self.save(collection, &docs)?;
        Ok(id)
    }

    fn update_document(
        &mut self,
        collection: Collection,
        id: &str,
        fields: Value,
    ) -> Result<u64, StoreError> {
        let mut docs = self.load(collection)?;
        let doc = docs
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or(StoreError::NotFound)?;
        merge_fields(&mut doc.data, fields);
        doc.version += 1;
        let version = doc.version;
        self.save(collection, &docs)?;
        Ok(version)
    }

    fn delete_document(&mut self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let mut docs = self.load(collection)?;
        let before = docs.len();
        docs.retain(|d| d.id != id);
        if docs.len() == before {
            return Err(StoreError::NotFound);
        }
        self.save(collection, &docs)
    }

    fn update_document_if(
        &mut self,
        collection: Collection,
        id: &str,
        expected_version: u64,
        fields: Value,
    ) -> Result<u64, StoreError> {
        let mut docs = self.load(collection)?;
        let doc = docs
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or(StoreError::NotFound)?;
        if doc.version != expected_version {
            return Err(StoreError::Conflict);
        }
        merge_fields(&mut doc.data, fields);
        doc.version += 1;
        let version = doc.version;
        self.save(collection, &docs)?;
        Ok(version)
    }
}
