//! Per-collection trigger registration and dispatch.

use super::provider::MirrorContext;
use crate::{MirrorError, Result};
use bson::Document;
use std::collections::BTreeMap;
use tracing::{info, info_span};
use uuid::Uuid;

/// What happened to a primary document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentChange {
    /// document created, with its full state.
    Created(Document),
    /// document updated, with its full post-write state.
    Updated(Document),
    /// document deleted, or its post-write state no longer exists.
    Deleted,
}

/// A "document written" event delivered to a trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerEvent {
    /// collection name on the primary.
    pub collection: String,
    /// document identifier.
    pub doc_id: String,
    /// None when the event carries no data at all.
    pub data: Option<DocumentChange>,
}

impl TriggerEvent {
    /// create an event for `collection/doc_id`.
    pub fn new(collection: &str, doc_id: &str, data: Option<DocumentChange>) -> Self {
        TriggerEvent {
            collection: collection.to_string(),
            doc_id: doc_id.to_string(),
            data,
        }
    }
}

/// Which branch an event took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// event had no data, nothing done.
    Skipped,
    /// post-write state mirrored.
    Written,
    /// mirror document removed.
    Deleted,
}

/// One trigger registration, bound to a single collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    collection: String,
    document_path: String,
    secret: String,
}

impl Trigger {
    /// register a trigger for `collection`, depending on credentials in `secret`.
    pub fn register(collection: &str, secret: &str) -> Trigger {
        Trigger {
            collection: collection.to_string(),
            document_path: format!("{}/{{docId}}", collection),
            secret: secret.to_string(),
        }
    }

    /// collection this trigger watches.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// document path pattern, like `players/{docId}`.
    pub fn document_path(&self) -> &str {
        &self.document_path
    }

    /// secret this trigger depends on.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Handle one event: no data is skipped, deletes remove the mirror, creates and
    /// updates both write the full post-write state.
    pub fn fire(
        &self,
        ctx: &MirrorContext,
        doc_id: &str,
        data: Option<DocumentChange>,
    ) -> Result<Dispatch> {
        let invocation = Uuid::new_v4();
        let span = info_span!("trigger", collection = %self.collection, %doc_id, %invocation);
        let _enter = span.enter();

        match data {
            None => {
                info!("Event without data, skipped.");
                Ok(Dispatch::Skipped)
            }
            Some(DocumentChange::Deleted) => {
                ctx.mirror_delete(&self.collection, doc_id)?;
                info!("Mirror document deleted.");
                Ok(Dispatch::Deleted)
            }
            Some(DocumentChange::Created(record)) | Some(DocumentChange::Updated(record)) => {
                ctx.mirror_write(&self.collection, doc_id, record)?;
                info!("Mirror document written.");
                Ok(Dispatch::Written)
            }
        }
    }
}

/// All registered triggers, keyed by collection name.
#[derive(Debug, Clone, Default)]
pub struct TriggerSet {
    triggers: BTreeMap<String, Trigger>,
}

impl TriggerSet {
    /// register one trigger for every collection in `collections`, duplicates register once.
    pub fn register_all<S: AsRef<str>>(collections: &[S], secret: &str) -> TriggerSet {
        let mut set = TriggerSet::default();
        for coll in collections {
            set.add(Trigger::register(coll.as_ref(), secret));
        }
        set
    }

    /// add `trigger`, replacing the one for the same collection.
    pub fn add(&mut self, trigger: Trigger) {
        self.triggers.insert(trigger.collection.clone(), trigger);
    }

    /// get trigger registered for `collection`.
    pub fn get(&self, collection: &str) -> Option<&Trigger> {
        self.triggers.get(collection)
    }

    /// iterate registered triggers.
    pub fn iter(&self) -> impl Iterator<Item = &Trigger> {
        self.triggers.values()
    }

    /// number of registered triggers.
    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    /// check if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// route `event` to the trigger registered for its collection.
    pub fn dispatch(&self, ctx: &MirrorContext, event: TriggerEvent) -> Result<Dispatch> {
        let trigger = self
            .get(&event.collection)
            .ok_or_else(|| MirrorError::UnknownCollection(event.collection.clone()))?;
        trigger.fire(ctx, &event.doc_id, event.data)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::TRACKED_COLLECTIONS;

    #[test]
    fn test_register_all_tracked() {
        let set = TriggerSet::register_all(&TRACKED_COLLECTIONS, "S");
        assert_eq!(set.len(), 9);
        let trigger = set.get("kitDetails").unwrap();
        assert_eq!(trigger.document_path(), "kitDetails/{docId}");
        assert_eq!(trigger.secret(), "S");
    }

    #[test]
    fn test_register_duplicates_once() {
        let set = TriggerSet::register_all(&["players", "players", "venues"], "S");
        assert_eq!(set.len(), 2);
        assert!(set.get("fixtures").is_none());
    }
}
