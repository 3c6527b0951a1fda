//! Serially downloads `.dav` fragments off the camera. Single worker by
//! design: the camera itself only tolerates one active connection well.

use std::time::Instant;

use tracing::{info, warn};

use crate::state::file::FileStatus;
use crate::state::group::DirectoryState;
use crate::tasks::VideoTask;

use super::Context;

pub async fn run(ctx: Context) {
    loop {
        if ctx.shutdown.is_shutdown() {
            return;
        }
        let task = tokio::select! {
            t = ctx.download_queue.dequeue() => match t {
                Ok(t) => t,
                Err(e) => {
                    warn!(error = %e.chain(), "download queue read failed");
                    continue;
                }
            },
            _ = ctx.shutdown.notified() => return,
        };

        if let Err(e) = process(&ctx, &task).await {
            warn!(error = %e.chain(), group = %task.group_dir().display(), "download task failed");
        }
    }
}

async fn process(ctx: &Context, task: &crate::tasks::DownloadTask) -> Result<(), base::Error> {
    let group_dir = task.group_dir().clone();
    let _guard = ctx.dir_locks.lock(&group_dir).await;
    let mut state = DirectoryState::load(&group_dir)?;

    let base_name = task
        .file_path()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let expected_size = ctx.camera.get_size(task.camera_path()).await.unwrap_or(0);
    if expected_size <= 0 {
        if let Some(file) = state.get_file_mut(&base_name) {
            file.fail(FileStatus::DownloadFailed, "camera reported zero or unknown size");
        }
        state.save(&group_dir)?;
        return Ok(());
    }

    let start = Instant::now();
    let ok = ctx
        .camera
        .download(task.camera_path(), task.file_path())
        .await
        .unwrap_or(false);

    if !ok {
        let _ = tokio::fs::remove_file(task.file_path()).await;
        if let Some(file) = state.get_file_mut(&base_name) {
            file.fail(FileStatus::DownloadFailed, "download transfer failed");
        }
        state.save(&group_dir)?;
        return Ok(());
    }

    let actual_size = tokio::fs::metadata(task.file_path())
        .await
        .map(|m| m.len() as i64)
        .unwrap_or(0);
    if actual_size != expected_size {
        let _ = tokio::fs::remove_file(task.file_path()).await;
        if let Some(file) = state.get_file_mut(&base_name) {
            file.fail(
                FileStatus::DownloadFailed,
                format!("size mismatch: expected {expected_size}, got {actual_size}"),
            );
        }
        state.save(&group_dir)?;
        return Ok(());
    }

    let elapsed = start.elapsed().as_secs_f64().max(0.001);
    info!(
        bytes = actual_size,
        rate_kbps = (actual_size as f64 / 1024.0) / elapsed,
        path = %task.file_path().display(),
        "download complete"
    );

    let output_path = task.file_path().with_extension("mp4");
    if let Some(file) = state.get_file_mut(&base_name) {
        file.mark(FileStatus::Downloaded);
    }
    state.save(&group_dir)?;

    ctx.video_queue
        .enqueue(VideoTask::Convert {
            group_dir,
            input_path: task.file_path().clone(),
            output_path,
        })
        .await?;
    Ok(())
}
