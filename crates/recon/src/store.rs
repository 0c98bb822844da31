use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde_json::{Map, Value};

/// A stored record: one JSON object per subject.
pub type Document = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub inserted_new: bool,
}

#[derive(Debug)]
pub enum StoreError {
    /// Backend rejected the operation or is unreachable.
    Backend(String),
    /// Document could not be encoded.
    Serialize(String),
    /// A stored body is not a JSON object.
    Corrupt { collection: String, key: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(msg) => write!(f, "{msg}"),
            Self::Serialize(msg) => write!(f, "cannot encode document: {msg}"),
            Self::Corrupt { collection, key } => {
                write!(f, "{collection}/{key}: stored document is not a JSON object")
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Keyed document persistence. Keys are unique per collection.
pub trait DocumentStore {
    fn find_one(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError>;

    /// Insert or replace the document stored under `key`.
    fn upsert(
        &mut self,
        collection: &str,
        key: &str,
        document: &Document,
    ) -> Result<UpsertOutcome, StoreError>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for &mut S {
    fn find_one(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
        (**self).find_one(collection, key)
    }

    fn upsert(
        &mut self,
        collection: &str,
        key: &str,
        document: &Document,
    ) -> Result<UpsertOutcome, StoreError> {
        (**self).upsert(collection, key, document)
    }
}

/// In-process store, for embedding and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    collections: HashMap<String, BTreeMap<String, Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.collections.values().all(BTreeMap::is_empty)
    }

    pub fn get(&self, collection: &str, key: &str) -> Option<&Document> {
        self.collections.get(collection)?.get(key)
    }
}

impl DocumentStore for MemoryStore {
    fn find_one(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.get(collection, key).cloned())
    }

    fn upsert(
        &mut self,
        collection: &str,
        key: &str,
        document: &Document,
    ) -> Result<UpsertOutcome, StoreError> {
        let previous = self
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), document.clone());
        Ok(UpsertOutcome { inserted_new: previous.is_none() })
    }
}
