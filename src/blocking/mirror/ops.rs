//! The two mirror operations, executed against a secondary store handle.

use super::bson_helper::mirror_body;
use super::store::MirrorStore;
use crate::Result;
use bson::Document;
use tracing::debug;

/// Write `record` to `collection/id` in `store`, replacing existing content entirely.
///
/// The mirrored `id` field keeps the record's own value if present, else it's set to `id`.
/// Failures from `store` are returned as they are, there is no retry.
pub fn mirror_write(
    store: &dyn MirrorStore,
    collection: &str,
    id: &str,
    record: Document,
) -> Result<()> {
    let body = mirror_body(id, record);
    debug!(%collection, %id, fields = body.len(), "Mirror write.");
    store.replace_document(collection, id, body)
}

/// Remove `collection/id` from `store`, it's fine if the document is already absent.
pub fn mirror_delete(store: &dyn MirrorStore, collection: &str, id: &str) -> Result<()> {
    debug!(%collection, %id, "Mirror delete.");
    store.delete_document(collection, id)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::blocking::mirror::store::MemoryStore;
    use bson::doc;

    #[test]
    fn test_write_then_delete() {
        let store = MemoryStore::new();
        mirror_write(&store, "referees", "r1", doc! {"name": "Ann"}).unwrap();
        assert_eq!(
            store.get("referees", "r1").unwrap(),
            doc! {"name": "Ann", "id": "r1"}
        );
        mirror_delete(&store, "referees", "r1").unwrap();
        assert!(!store.contains("referees", "r1"));
    }

    #[test]
    fn test_full_replace_drops_stale_fields() {
        let store = MemoryStore::new();
        mirror_write(&store, "kitQueue", "X", doc! {"a": 1, "b": 2}).unwrap();
        mirror_write(&store, "kitQueue", "X", doc! {"a": 1}).unwrap();
        assert_eq!(store.get("kitQueue", "X").unwrap(), doc! {"a": 1, "id": "X"});
    }
}
