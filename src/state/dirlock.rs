//! Per-group-directory exclusive lock registry, so two workers racing to
//! read-modify-write the same `state.json` serialize instead of clobbering
//! each other. Locks are process-local: there's exactly one instance of
//! this pipeline against a given storage root at a time.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct DirLocks {
    locks: StdMutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl DirLocks {
    pub fn new() -> Arc<Self> {
        Arc::new(DirLocks::default())
    }

    fn entry(&self, group_dir: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("dirlock registry poisoned");
        locks
            .entry(group_dir.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Acquires the exclusive lock for `group_dir`. Hold the returned guard
    /// for the entire load -> mutate -> save sequence.
    pub async fn lock(&self, group_dir: &Path) -> OwnedMutexGuard<()> {
        self.entry(group_dir).lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn serializes_access_to_the_same_directory() {
        let locks = DirLocks::new();
        let dir = PathBuf::from("/tmp/group-a");
        let counter = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let dir = dir.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock(&dir).await;
                let before = counter.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                assert_eq!(counter.load(Ordering::SeqCst), before + 1);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
    }

    #[tokio::test]
    async fn distinct_directories_do_not_contend() {
        let locks = DirLocks::new();
        let _a = locks.lock(Path::new("/tmp/a")).await;
        // Should not deadlock: different key, independent mutex.
        let _b = locks.lock(Path::new("/tmp/b")).await;
    }
}
