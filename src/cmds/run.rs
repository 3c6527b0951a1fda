//! `run`: the daemon entrypoint. Loads `config.ini`, builds the configured
//! capabilities, and runs the five workers plus the NotifierQueue until
//! interrupted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bpaf::Bpaf;
use tracing::{error, info};

use crate::cmds::build_capabilities;
use crate::config::Config;
use crate::state::queue::{queue_path, PersistedQueue};
use crate::state::DirLocks;
use crate::tasks::{DownloadTask, UploadTask, VideoTask};
use crate::workers::{self, Context};

#[derive(Bpaf, Debug, Clone)]
#[bpaf(command("run"))]
/// Run the unattended camera ingestion/post-production daemon.
pub struct Args {
    /// Path to config.ini.
    #[bpaf(long("config"), argument("PATH"), fallback(PathBuf::from("config.ini")))]
    config: PathBuf,
}

pub fn run(args: Args) -> Result<i32, base::Error> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| base::Error::wrap(base::ErrorKind::Internal, "starting tokio runtime", e))?;
    rt.block_on(run_async(args))
}

async fn run_async(args: Args) -> Result<i32, base::Error> {
    let config = match Config::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, path = %args.config.display(), "failed to load config");
            return Ok(1);
        }
    };
    let storage_root = config.storage_path.clone();
    if let Err(e) = tokio::fs::create_dir_all(&storage_root).await {
        error!(error = %e, path = %storage_root.display(), "failed to create storage root");
        return Ok(1);
    }

    let capabilities = build_capabilities(&config, &storage_root);

    let download_queue = PersistedQueue::<DownloadTask>::open(queue_path(&storage_root, "download_queue_state.json")).await?;
    let video_queue = PersistedQueue::<VideoTask>::open(queue_path(&storage_root, "video_queue_state.json")).await?;
    let upload_queue = PersistedQueue::<UploadTask>::open(queue_path(&storage_root, "upload_queue_state.json")).await?;

    let (shutdown_tx, shutdown_rx) = base::shutdown::channel();

    let ctx = Context {
        config: Arc::new(config.clone()),
        storage_root: storage_root.clone(),
        download_queue,
        video_queue,
        upload_queue,
        dir_locks: DirLocks::new(),
        camera: capabilities.camera,
        uploader: capabilities.uploader,
        schedule: capabilities.schedule,
        notifier: capabilities.notifier,
        shutdown: shutdown_rx,
    };

    let mut handles = vec![
        tokio::spawn(workers::camera_poller::run(ctx.clone())),
        tokio::spawn(workers::download_worker::run(ctx.clone())),
        tokio::spawn(workers::video_worker::run(ctx.clone())),
        tokio::spawn(workers::upload_worker::run(ctx.clone())),
        tokio::spawn(workers::state_auditor::run(ctx.clone())),
        tokio::spawn(workers::notifier_queue::run(ctx.clone())),
    ];

    if let Some(cloud_sync_cfg) = config.cloud_sync.clone().filter(|c| c.enabled) {
        let config_path = args.config.clone();
        let shutdown = ctx.shutdown.clone();
        handles.push(tokio::spawn(async move {
            loop {
                crate::cloud_sync::sync_once(&cloud_sync_cfg, &config_path).await;
                if shutdown.sleep(Duration::from_secs(3600)).await.is_err() {
                    return;
                }
            }
        }));
    }

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| base::Error::wrap(base::ErrorKind::Internal, "waiting for ctrl-c", e))?;
    info!("shutdown requested, waiting for workers to stop");
    drop(shutdown_tx);
    for handle in handles {
        let _ = handle.await;
    }
    Ok(0)
}
