//! Deliver primary document writes to triggers through mongodb change streams.

use super::bson_helper::{doc_key_id, id_to_string};
use super::provider::MirrorContext;
use super::time_helper;
use super::trigger::{DocumentChange, Trigger, TriggerEvent};
use crate::{MirrorError, Result, MONGO_ID_KEY};
use bson::Document;
use crossbeam::channel::{self, Sender};
use mongodb::change_stream::event::{ChangeStreamEvent, OperationType, ResumeToken};
use mongodb::options::{ChangeStreamOptions, FullDocumentType};
use mongodb::sync::{Collection, Database};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Something which delivers events until it stops, and can be run again after failure.
pub trait Watch: Send + 'static {
    /// name used in log and restart bookkeeping.
    fn name(&self) -> &str;

    /// Deliver events, returns Ok when there is nothing more to deliver, Err when delivery
    /// fails or the source closes.  A [StreamClosed](MirrorError::StreamClosed) error is
    /// always restarted.
    fn run(&mut self) -> Result<()>;

    /// whether the last run processed at least one event.
    fn made_progress(&self) -> bool {
        false
    }
}

/// Convert one change stream event into a trigger event.
///
/// Returns None when the event is not a document write (drop, rename, invalidate...).
pub fn to_trigger_event(
    collection: &str,
    operation_type: &OperationType,
    document_key: Option<&Document>,
    full_document: Option<Document>,
) -> Option<TriggerEvent> {
    let data = match operation_type {
        OperationType::Insert => full_document.map(DocumentChange::Created),
        OperationType::Update | OperationType::Replace => Some(
            // with update lookup, missing full document means it's gone after the write.
            full_document.map_or(DocumentChange::Deleted, DocumentChange::Updated),
        ),
        OperationType::Delete => Some(DocumentChange::Deleted),
        _ => return None,
    };

    let doc_id = document_key.and_then(doc_key_id).or_else(|| match &data {
        Some(DocumentChange::Created(d)) | Some(DocumentChange::Updated(d)) => {
            d.get(MONGO_ID_KEY).and_then(id_to_string)
        }
        _ => None,
    });
    match doc_id {
        Some(doc_id) => Some(TriggerEvent::new(collection, &doc_id, data)),
        None => Some(TriggerEvent::new(collection, "", None)),
    }
}

/// Watch one primary collection and fire its trigger for every document write.
pub struct CollectionWatcher {
    coll: Collection<Document>,
    trigger: Trigger,
    ctx: Arc<MirrorContext>,
    resume_token: Option<ResumeToken>,
    // invalidate token, a new stream must start after it.
    start_after: Option<ResumeToken>,
    processed: u64,
}

impl CollectionWatcher {
    /// create a watcher of `trigger`'s collection in primary database `db`.
    pub fn new(db: &Database, trigger: Trigger, ctx: Arc<MirrorContext>) -> Self {
        CollectionWatcher {
            coll: db.collection(trigger.collection()),
            trigger,
            ctx,
            resume_token: None,
            start_after: None,
            processed: 0,
        }
    }

    /// token of the last processed event, next run resumes after it.
    pub fn resume_token(&self) -> Option<&ResumeToken> {
        self.resume_token.as_ref()
    }

    fn watch_error(&self, e: mongodb::error::Error) -> MirrorError {
        MirrorError::Watch {
            collection: self.trigger.collection().to_string(),
            source: e,
        }
    }

    fn handle_event(&self, event: ChangeStreamEvent<Document>) -> Result<()> {
        match event.cluster_time.as_ref().and_then(time_helper::to_datetime) {
            Some(cluster_time) => {
                info!(collection = %self.trigger.collection(), operation = ?event.operation_type,
                    %cluster_time, "Receive change event.");
            }
            None => {
                info!(collection = %self.trigger.collection(), operation = ?event.operation_type,
                    "Receive change event.");
            }
        }
        let trigger_event = to_trigger_event(
            self.trigger.collection(),
            &event.operation_type,
            event.document_key.as_ref(),
            event.full_document,
        );
        match trigger_event {
            Some(e) => {
                self.trigger.fire(&self.ctx, &e.doc_id, e.data)?;
            }
            None => {
                warn!(collection = %self.trigger.collection(), operation = ?event.operation_type,
                    "Not a document write, ignored.");
            }
        }
        Ok(())
    }
}

impl Watch for CollectionWatcher {
    fn name(&self) -> &str {
        self.trigger.collection()
    }

    fn run(&mut self) -> Result<()> {
        self.processed = 0;
        let mut options = ChangeStreamOptions::default();
        options.full_document = Some(FullDocumentType::UpdateLookup);
        // an invalidate token is only accepted by `startAfter`.
        match self.start_after.clone() {
            Some(token) => options.start_after = Some(token),
            None => options.resume_after = self.resume_token.clone(),
        }

        info!(collection = %self.trigger.collection(), resuming = self.resume_token.is_some(),
            after_invalidate = self.start_after.is_some(), "Begin to watch collection.");
        let stream = self
            .coll
            .watch(None, options)
            .map_err(|e| self.watch_error(e))?;
        for event in stream {
            let event = event.map_err(|e| self.watch_error(e))?;
            let token = event.id.clone();
            if matches!(event.operation_type, OperationType::Invalidate) {
                warn!(collection = %self.trigger.collection(),
                    "Change stream invalidated, collection dropped or renamed.");
                self.start_after = Some(token);
                self.resume_token = None;
                return Err(MirrorError::StreamClosed {
                    collection: self.trigger.collection().to_string(),
                    invalidated: true,
                });
            }
            self.handle_event(event)?;
            self.start_after = None;
            self.resume_token = Some(token);
            self.processed += 1;
        }
        warn!(collection = %self.trigger.collection(), "Change stream closed.");
        Err(MirrorError::StreamClosed {
            collection: self.trigger.collection().to_string(),
            invalidated: false,
        })
    }

    fn made_progress(&self) -> bool {
        self.processed > 0
    }
}

/// Terminal status of one watcher run.
pub enum WatchStatus {
    /// watcher returned, it's handed back so it can run again.
    Stopped {
        /// the watcher itself.
        watcher: Box<dyn Watch>,
        /// run result.
        result: Result<()>,
    },
}

/// Run watchers concurrently and restart failed ones.
#[derive(Debug, Clone)]
pub struct WatchManager {
    restart_delay: Duration,
    max_restarts: usize,
}

impl WatchManager {
    /// create a manager which waits `restart_delay` before restarting a failed watcher,
    /// and gives up on a watcher after `max_restarts` consecutive restarts without progress.
    pub fn new(restart_delay: Duration, max_restarts: usize) -> Self {
        WatchManager {
            restart_delay,
            max_restarts,
        }
    }

    /// Run all `watchers` until every one of them stops for good.
    ///
    /// Returns the last error of a watcher which ran out of restarts, if any.
    pub fn run(&self, watchers: Vec<Box<dyn Watch>>) -> Result<()> {
        if watchers.is_empty() {
            return Ok(());
        }
        // every watcher blocks its thread for its whole life.
        let pool = ThreadPoolBuilder::new()
            .num_threads(watchers.len())
            .thread_name(|i| format!("mirror-watcher-{}", i))
            .build()?;
        let (sender, receiver) = channel::unbounded();

        let mut running = 0;
        for watcher in watchers {
            spawn_watcher(&pool, watcher, Duration::from_secs(0), sender.clone());
            running += 1;
        }

        let mut restarts: HashMap<String, usize> = HashMap::new();
        let mut last_error = None;
        while running > 0 {
            let status = match receiver.recv() {
                Ok(s) => s,
                Err(_) => break,
            };
            running -= 1;
            match status {
                WatchStatus::Stopped {
                    watcher,
                    result: Ok(()),
                } => {
                    info!(watcher = %watcher.name(), "Watcher finished.");
                }
                WatchStatus::Stopped {
                    watcher,
                    result: Err(e),
                } => {
                    let count = restarts.entry(watcher.name().to_string()).or_insert(0);
                    if watcher.made_progress() {
                        *count = 0;
                    }
                    if let MirrorError::StreamClosed { invalidated, .. } = e {
                        info!(watcher = %watcher.name(), invalidated, delay = ?self.restart_delay,
                            "Change stream closed, reopen it.");
                        spawn_watcher(&pool, watcher, self.restart_delay, sender.clone());
                        running += 1;
                    } else if *count >= self.max_restarts {
                        error!(watcher = %watcher.name(), error = ?e, restarts = *count,
                            "Watcher failed, retried several times, I'm leaving it now.");
                        last_error = Some(e);
                    } else {
                        *count += 1;
                        error!(watcher = %watcher.name(), error = ?e, restarts = *count,
                            delay = ?self.restart_delay, "Watcher failed, wait for a while and restart.");
                        spawn_watcher(&pool, watcher, self.restart_delay, sender.clone());
                        running += 1;
                    }
                }
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn spawn_watcher(
    pool: &ThreadPool,
    mut watcher: Box<dyn Watch>,
    delay: Duration,
    sender: Sender<WatchStatus>,
) {
    pool.spawn(move || {
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let result = watcher.run();
        let _ = sender.send(WatchStatus::Stopped { watcher, result });
    });
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::blocking::mirror::ops::{mirror_delete, mirror_write};
    use crate::blocking::mirror::store::MemoryStore;
    use bson::doc;

    #[test]
    fn test_insert_is_created() {
        let event = to_trigger_event(
            "players",
            &OperationType::Insert,
            Some(&doc! {"_id": "42"}),
            Some(doc! {"_id": "42", "name": "Bo"}),
        )
        .unwrap();
        assert_eq!(event.doc_id, "42");
        assert_eq!(
            event.data,
            Some(DocumentChange::Created(doc! {"_id": "42", "name": "Bo"}))
        );
    }

    #[test]
    fn test_update_without_post_state_is_delete() {
        let event = to_trigger_event(
            "fixtures",
            &OperationType::Update,
            Some(&doc! {"_id": "7"}),
            None,
        )
        .unwrap();
        assert_eq!(event.data, Some(DocumentChange::Deleted));

        let event = to_trigger_event(
            "fixtures",
            &OperationType::Replace,
            Some(&doc! {"_id": "7"}),
            Some(doc! {"_id": "7", "status": "ended"}),
        )
        .unwrap();
        assert!(matches!(event.data, Some(DocumentChange::Updated(_))));
    }

    #[test]
    fn test_delete_and_ignored_operations() {
        let event =
            to_trigger_event("venues", &OperationType::Delete, Some(&doc! {"_id": 9}), None).unwrap();
        assert_eq!(event.doc_id, "i32:9");
        assert_eq!(event.data, Some(DocumentChange::Deleted));

        assert!(to_trigger_event("venues", &OperationType::Drop, None, None).is_none());
    }

    #[test]
    fn test_int_and_string_ids_mirror_separately() {
        let store = MemoryStore::new();
        for key in [doc! {"_id": 9}, doc! {"_id": "9"}] {
            let event = to_trigger_event(
                "players",
                &OperationType::Insert,
                Some(&key),
                Some(doc! {"name": "Bo"}),
            )
            .unwrap();
            mirror_write(&store, "players", &event.doc_id, doc! {"name": "Bo"}).unwrap();
        }
        assert_eq!(store.len(), 2);

        let delete =
            to_trigger_event("players", &OperationType::Delete, Some(&doc! {"_id": 9}), None)
                .unwrap();
        mirror_delete(&store, "players", &delete.doc_id).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get("players", "9").unwrap(),
            doc! {"name": "Bo", "id": "9"}
        );
    }

    #[test]
    fn test_missing_doc_key_has_no_data() {
        let event = to_trigger_event("venues", &OperationType::Delete, None, None).unwrap();
        assert!(event.data.is_none());

        // fallback to `_id` in full document.
        let event = to_trigger_event(
            "venues",
            &OperationType::Insert,
            None,
            Some(doc! {"_id": "v1"}),
        )
        .unwrap();
        assert_eq!(event.doc_id, "v1");
    }
}
