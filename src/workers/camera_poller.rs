//! Periodically enumerates new recordings on the camera, groups them, and
//! hands each new File to the DownloadWorker.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::grouping::{assign_group, overlaps_connected_interval, ConnectedInterval, ExistingGroup, GroupAssignment};
use crate::state::file::RecordingFile;
use crate::state::group::DirectoryState;
use crate::state::hwm;
use crate::tasks::DownloadTask;

use super::Context;

pub async fn run(ctx: Context) {
    let interval = std::time::Duration::from_secs(ctx.config.app.check_interval_seconds.max(1));
    loop {
        if ctx.shutdown.is_shutdown() {
            return;
        }
        if let Err(e) = poll_once(&ctx).await {
            warn!(error = %e.chain(), "camera poll failed");
        }
        if ctx.shutdown.sleep(interval).await.is_err() {
            return;
        }
    }
}

async fn poll_once(ctx: &Context) -> Result<(), base::Error> {
    if !ctx.camera.check_availability().await {
        warn!("camera unavailable; skipping this poll");
        return Ok(());
    }

    let now = chrono::Utc::now().naive_utc();
    let from = hwm::read(&ctx.storage_root)?
        .map(|h| h - chrono::Duration::seconds(60))
        .unwrap_or(now - chrono::Duration::days(1));

    let files = ctx.camera.list_files(from, now).await?;
    if files.is_empty() {
        return Ok(());
    }

    let connected: Vec<ConnectedInterval> = ctx
        .camera
        .connected_timeframes()
        .await?
        .into_iter()
        .map(|tf| ConnectedInterval {
            start: tf.start,
            end: tf.end.unwrap_or(now),
        })
        .collect();

    let mut existing_groups = scan_existing_groups(&ctx.storage_root).await?;
    let mut latest_end = None;

    for file in files {
        // Advance the hwm for every fragment observed, not only the ones we
        // keep, or a filtered-out burst gets re-fetched and re-evaluated on
        // every future pass instead of being treated as seen.
        latest_end = Some(latest_end.map_or(file.end_time, |e: chrono::NaiveDateTime| e.max(file.end_time)));

        if overlaps_connected_interval(file.start_time, file.end_time, &connected) {
            continue;
        }

        let assignment = assign_group(file.start_time, &existing_groups);
        let dir_name = match &assignment {
            GroupAssignment::Existing(name) => name.clone(),
            GroupAssignment::New(name) => name.clone(),
        };
        let group_dir = ctx.storage_root.join(&dir_name);
        tokio::fs::create_dir_all(&group_dir)
            .await
            .map_err(|e| base::Error::wrap(base::ErrorKind::Internal, format!("creating {}", group_dir.display()), e))?;

        let local_path = group_dir.join(
            std::path::Path::new(&file.path)
                .file_name()
                .unwrap_or_default(),
        );

        {
            let _guard = ctx.dir_locks.lock(&group_dir).await;
            let mut state = DirectoryState::load(&group_dir)?;
            state.add_file(RecordingFile::new(
                local_path.clone(),
                file.path.clone(),
                file.start_time,
                file.end_time,
            ));
            state.save(&group_dir)?;
        }

        existing_groups.retain(|g| g.dir_name != dir_name);
        existing_groups.insert(
            0,
            ExistingGroup {
                dir_name: dir_name.clone(),
                latest_end: file.end_time,
            },
        );

        ctx.download_queue
            .enqueue(DownloadTask::new(group_dir, file.path.clone(), local_path))
            .await?;

        info!(path = %file.path, "discovered new camera fragment");
    }

    if let Some(latest_end) = latest_end {
        hwm::advance(&ctx.storage_root, latest_end)?;
    }
    Ok(())
}

async fn scan_existing_groups(storage_root: &std::path::Path) -> Result<Vec<ExistingGroup>, base::Error> {
    let mut groups = Vec::new();
    let mut entries = match tokio::fs::read_dir(storage_root).await {
        Ok(e) => e,
        Err(_) => return Ok(groups),
    };
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| base::Error::wrap(base::ErrorKind::Internal, "scanning storage root", e))?
    {
        let path: PathBuf = entry.path();
        if !path.is_dir() {
            continue;
        }
        let state = DirectoryState::load(&path)?;
        if let Some(latest_end) = state.latest_end() {
            groups.push(ExistingGroup {
                dir_name: path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
                latest_end,
            });
        }
    }
    groups.sort_by(|a, b| b.latest_end.cmp(&a.latest_end));
    Ok(groups)
}
