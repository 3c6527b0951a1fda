//! The five long-lived workers plus the NotifierQueue, each an independent
//! tokio task processing its own persisted queue strictly sequentially.

pub mod camera_poller;
pub mod download_worker;
pub mod notifier_queue;
pub mod state_auditor;
pub mod upload_worker;
pub mod video_worker;

use std::path::PathBuf;
use std::sync::Arc;

use crate::capabilities::{Camera, MatchSchedule, Notifier, Uploader};
use crate::config::Config;
use crate::state::queue::PersistedQueue;
use crate::state::DirLocks;
use crate::tasks::{DownloadTask, UploadTask, VideoTask};

/// Shared, cloneable handle to everything a worker needs. Each worker
/// thread/task gets its own clone; the `Arc`s make that cheap.
#[derive(Clone)]
pub struct Context {
    pub config: Arc<Config>,
    pub storage_root: PathBuf,
    pub download_queue: Arc<PersistedQueue<DownloadTask>>,
    pub video_queue: Arc<PersistedQueue<VideoTask>>,
    pub upload_queue: Arc<PersistedQueue<UploadTask>>,
    pub dir_locks: Arc<DirLocks>,
    pub camera: Arc<dyn Camera>,
    pub uploader: Option<Arc<dyn Uploader>>,
    pub schedule: Option<Arc<dyn MatchSchedule>>,
    pub notifier: Option<Arc<dyn Notifier>>,
    pub shutdown: base::shutdown::Receiver,
}
