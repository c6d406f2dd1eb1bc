//! Secondary store abstraction, the target of mirror operations.

use crate::{MirrorError, Result, MONGO_ID_KEY};
use bson::{doc, Document};
use mongodb::options::ReplaceOptions;
use mongodb::sync::Database;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Document storage which receives mirrored records.
///
/// Both operations act on exactly one document and must be atomic for that document.
pub trait MirrorStore: Send + Sync {
    /// replace whole content of `collection/id` with `body`, create it if absent.
    fn replace_document(&self, collection: &str, id: &str, body: Document) -> Result<()>;

    /// remove `collection/id`, succeed when it doesn't exist.
    fn delete_document(&self, collection: &str, id: &str) -> Result<()>;
}

/// Mirror store backed by a mongodb database.
#[derive(Clone, Debug)]
pub struct MongoMirrorStore {
    db: Database,
}

impl MongoMirrorStore {
    /// create a store writing into `db`.
    pub fn new(db: Database) -> Self {
        MongoMirrorStore { db }
    }

    /// get underlying database.
    pub fn database(&self) -> &Database {
        &self.db
    }
}

impl MirrorStore for MongoMirrorStore {
    fn replace_document(&self, collection: &str, id: &str, body: Document) -> Result<()> {
        let mut replacement = doc! { MONGO_ID_KEY: id };
        replacement.extend(body);
        self.db
            .collection::<Document>(collection)
            .replace_one(
                doc! { MONGO_ID_KEY: id },
                replacement,
                ReplaceOptions::builder().upsert(true).build(),
            )
            .map_err(|e| MirrorError::Store {
                collection: collection.to_string(),
                id: id.to_string(),
                source: e,
            })?;
        Ok(())
    }

    fn delete_document(&self, collection: &str, id: &str) -> Result<()> {
        // deleted_count == 0 means it's already absent, which is fine.
        self.db
            .collection::<Document>(collection)
            .delete_one(doc! { MONGO_ID_KEY: id }, None)
            .map_err(|e| MirrorError::Store {
                collection: collection.to_string(),
                id: id.to_string(),
                source: e,
            })?;
        Ok(())
    }
}

/// In memory mirror store, keeps `collection -> id -> body`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    colls: Mutex<HashMap<String, BTreeMap<String, Document>>>,
}

impl MemoryStore {
    /// create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// get a copy of `collection/id`.
    pub fn get(&self, collection: &str, id: &str) -> Option<Document> {
        self.lock()
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned()
    }

    /// check if `collection/id` exists.
    pub fn contains(&self, collection: &str, id: &str) -> bool {
        self.get(collection, id).is_some()
    }

    /// total documents count across all collections.
    pub fn len(&self) -> usize {
        self.lock().values().map(|docs| docs.len()).sum()
    }

    /// check if the store holds no document.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// put `body` at `collection/id` directly, without mirror transformation.
    pub fn insert_raw(&self, collection: &str, id: &str, body: Document) {
        self.lock()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), body);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, BTreeMap<String, Document>>> {
        // a poisoned lock only means some test thread panicked while holding it.
        match self.colls.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl MirrorStore for MemoryStore {
    fn replace_document(&self, collection: &str, id: &str, body: Document) -> Result<()> {
        self.insert_raw(collection, id, body);
        Ok(())
    }

    fn delete_document(&self, collection: &str, id: &str) -> Result<()> {
        if let Some(docs) = self.lock().get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_memory_replace_is_not_merge() {
        let store = MemoryStore::new();
        store
            .replace_document("players", "1", doc! {"a": 1, "b": 2})
            .unwrap();
        store.replace_document("players", "1", doc! {"a": 1}).unwrap();
        assert_eq!(store.get("players", "1").unwrap(), doc! {"a": 1});
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_memory_delete_absent() {
        let store = MemoryStore::new();
        store.delete_document("venues", "9").unwrap();
        store.insert_raw("venues", "9", doc! {"x": 1});
        store.delete_document("venues", "9").unwrap();
        store.delete_document("venues", "9").unwrap();
        assert!(store.is_empty());
    }
}
