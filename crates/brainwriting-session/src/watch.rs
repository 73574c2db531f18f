//! Live chain refresh.
//!
//! Every non-editable chain entry tracks its underlying round document
//! through a store subscription: when the author submits (or an image
//! reference is attached), the snapshot is applied to the shared chain and
//! freshly persisted references are adopted into the illustration cache.
//! Dropping the watcher aborts all tasks and thereby unsubscribes — a
//! watcher leaked past its view would otherwise keep mutating a chain the
//! participant has already navigated away from.

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use brainwriting_core::ids::{CardKey, SessionCode};
use brainwriting_core::store::DocumentStore;
use brainwriting_docs::{ROUNDS_COLLECTION, RoundDoc, round_doc_id};
use brainwriting_illustration::IllustrationCache;

use crate::chain::{ChainEntry, apply_round_snapshot};

/// Keeps the non-editable entries of a chain in sync with the store.
#[derive(Debug)]
pub(crate) struct ChainWatcher {
    tasks: Vec<JoinHandle<()>>,
}

impl ChainWatcher {
    /// Subscribes to every non-editable entry of `chain` and spawns one
    /// refresh task per subscription.
    pub(crate) async fn start(
        store: &Arc<dyn DocumentStore>,
        cache: &Arc<IllustrationCache>,
        session: &SessionCode,
        chain: &Arc<Mutex<Vec<ChainEntry>>>,
    ) -> Self {
        let entries: Vec<(usize, ChainEntry)> = {
            let Ok(chain) = chain.lock() else {
                return Self { tasks: Vec::new() };
            };
            chain
                .iter()
                .enumerate()
                .filter(|(_, entry)| !entry.editable)
                .map(|(index, entry)| (index, entry.clone()))
                .collect()
        };

        let mut tasks = Vec::with_capacity(entries.len());
        for (index, entry) in entries {
            let doc_id = round_doc_id(session, &entry.participant, entry.round);
            let watch = match store.subscribe(ROUNDS_COLLECTION, &doc_id).await {
                Ok(watch) => watch,
                Err(err) => {
                    tracing::warn!(doc = %doc_id, error = %err, "chain subscription failed");
                    continue;
                }
            };
            let chain = Arc::clone(chain);
            let cache = Arc::clone(cache);
            tasks.push(tokio::spawn(async move {
                let mut watch = watch;
                while let Some(raw) = watch.changed().await {
                    let Ok(doc) = RoundDoc::from_document(&raw) else {
                        tracing::warn!(doc = %doc_id, "ignoring malformed round snapshot");
                        continue;
                    };
                    for (slot, reference) in &doc.card_images {
                        cache.adopt(
                            CardKey::new(doc.participant.clone(), doc.round, *slot),
                            reference.clone(),
                        );
                    }
                    let changed = chain
                        .lock()
                        .map(|mut chain| apply_round_snapshot(&mut chain, index, &doc))
                        .unwrap_or(false);
                    if changed {
                        tracing::debug!(doc = %doc_id, "chain entry refreshed");
                    }
                }
            }));
        }
        Self { tasks }
    }
}

impl Drop for ChainWatcher {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
