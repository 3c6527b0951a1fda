//! A persisted, file-backed FIFO queue paired with an in-process
//! `tokio::sync::Notify` to wake its single consumer.
//!
//! Every enqueue/dequeue rewrites the whole queue file — there's only ever
//! one match in flight at a time per worker, so this isn't a throughput
//! concern. Grounded on the teacher's `SyncerChannel`/`Syncer` pattern in
//! `db/writer.rs`: a bounded channel in front of a single background task
//! that persists every mutation before the in-memory state is considered
//! durable.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base::{Error, ErrorKind};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{Mutex, Notify};

pub struct PersistedQueue<T> {
    path: PathBuf,
    items: Mutex<VecDeque<T>>,
    notify: Notify,
}

impl<T> PersistedQueue<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    /// Loads `path` if it exists (an empty queue otherwise).
    pub async fn open(path: PathBuf) -> Result<Arc<Self>, Error> {
        let items = if path.exists() {
            let bytes = tokio::fs::read(&path).await.map_err(|e| {
                Error::wrap(ErrorKind::Internal, format!("reading {}", path.display()), Box::new(e))
            })?;
            serde_json::from_slice(&bytes).map_err(|e| {
                Error::wrap(ErrorKind::Internal, format!("parsing {}", path.display()), Box::new(e))
            })?
        } else {
            VecDeque::new()
        };
        Ok(Arc::new(PersistedQueue {
            path,
            items: Mutex::new(items),
            notify: Notify::new(),
        }))
    }

    async fn persist(&self, items: &VecDeque<T>) -> Result<(), Error> {
        let tmp = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(items)
            .map_err(|e| Error::wrap(ErrorKind::Internal, "serializing queue", Box::new(e)))?;
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| Error::wrap(ErrorKind::Internal, format!("writing {}", tmp.display()), Box::new(e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::wrap(ErrorKind::Internal, format!("renaming into {}", self.path.display()), Box::new(e)))
    }

    pub async fn enqueue(&self, item: T) -> Result<(), Error> {
        let mut items = self.items.lock().await;
        items.push_back(item);
        self.persist(&items).await?;
        drop(items);
        self.notify.notify_one();
        Ok(())
    }

    /// Waits for and removes the front item, persisting the removal before
    /// returning it. A worker that crashes between dequeue and finishing the
    /// task will simply not see it again — the spec's StateAuditor is what
    /// re-derives pending work from `state.json`, not this queue.
    pub async fn dequeue(self: &Arc<Self>) -> Result<T, Error> {
        loop {
            {
                let mut items = self.items.lock().await;
                if let Some(item) = items.pop_front() {
                    self.persist(&items).await?;
                    return Ok(item);
                }
            }
            self.notify.notified().await;
        }
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

pub fn queue_path(storage_root: &Path, file_name: &str) -> PathBuf {
    storage_root.join(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
    struct Item(u32);

    #[tokio::test]
    async fn enqueue_dequeue_is_fifo() {
        let dir = tempfile::tempdir().unwrap();
        let queue = PersistedQueue::<Item>::open(dir.path().join("q.json")).await.unwrap();
        queue.enqueue(Item(1)).await.unwrap();
        queue.enqueue(Item(2)).await.unwrap();
        assert_eq!(queue.dequeue().await.unwrap(), Item(1));
        assert_eq!(queue.dequeue().await.unwrap(), Item(2));
    }

    #[tokio::test]
    async fn persists_and_reloads_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.json");
        let queue = PersistedQueue::<Item>::open(path.clone()).await.unwrap();
        queue.enqueue(Item(42)).await.unwrap();

        let reopened = PersistedQueue::<Item>::open(path).await.unwrap();
        assert_eq!(reopened.len().await, 1);
    }

    #[tokio::test]
    async fn dequeue_waits_for_enqueue() {
        let dir = tempfile::tempdir().unwrap();
        let queue = PersistedQueue::<Item>::open(dir.path().join("q.json")).await.unwrap();
        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.dequeue().await.unwrap() })
        };
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        queue.enqueue(Item(7)).await.unwrap();
        assert_eq!(consumer.await.unwrap(), Item(7));
    }
}
