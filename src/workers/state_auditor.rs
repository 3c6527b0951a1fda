//! Periodic filesystem scan that re-derives pending work from state files
//! and enqueues it. Sole path for crash recovery: it never mutates File or
//! Group state directly, only enqueues.

use tracing::warn;

use crate::capabilities::MatchSchedule;
use crate::state::file::FileStatus;
use crate::state::group::{combined_video_path, DirectoryState, GroupStatus};
use crate::state::match_info::MatchInfo;
use crate::state::ntfy_state::{NtfyServiceState, TaskKind, TaskMetadata, TaskStatus};
use crate::tasks::{DownloadTask, UploadTask, UploadVariant, VideoTask};

use super::Context;

pub async fn run(ctx: Context) {
    let interval = std::time::Duration::from_secs(ctx.config.app.check_interval_seconds.max(1));
    loop {
        if ctx.shutdown.is_shutdown() {
            return;
        }
        if let Err(e) = audit_once(&ctx).await {
            warn!(error = %e.chain(), "audit pass failed");
        }
        if ctx.shutdown.sleep(interval).await.is_err() {
            return;
        }
    }
}

async fn audit_once(ctx: &Context) -> Result<(), base::Error> {
    let mut entries = match tokio::fs::read_dir(&ctx.storage_root).await {
        Ok(e) => e,
        Err(_) => return Ok(()),
    };
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| base::Error::wrap(base::ErrorKind::Internal, "scanning storage root", e))?
    {
        let group_dir = entry.path();
        if !group_dir.join("state.json").exists() {
            continue;
        }
        if let Err(e) = audit_group(ctx, &group_dir).await {
            warn!(error = %e.chain(), group = %group_dir.display(), "auditing group failed");
        }
    }
    Ok(())
}

async fn audit_group(ctx: &Context, group_dir: &std::path::Path) -> Result<(), base::Error> {
    let state = DirectoryState::load(group_dir)?;

    // Rule 1: per-file re-derivation.
    for file in state.files.values() {
        if file.skip {
            continue;
        }
        match file.status {
            FileStatus::Pending | FileStatus::DownloadFailed => {
                ctx.download_queue
                    .enqueue(DownloadTask::new(group_dir.to_path_buf(), file.camera_path.clone(), file.file_path.clone()))
                    .await?;
            }
            FileStatus::Downloaded | FileStatus::ConversionFailed => {
                ctx.video_queue
                    .enqueue(VideoTask::Convert {
                        group_dir: group_dir.to_path_buf(),
                        input_path: file.file_path.clone(),
                        output_path: file.file_path.with_extension("mp4"),
                    })
                    .await?;
            }
            _ => {}
        }
    }

    // Rule 2: combine readiness.
    if state.all_converted() && !combined_video_path(group_dir).exists() {
        ctx.video_queue
            .enqueue(VideoTask::Combine {
                group_dir: group_dir.to_path_buf(),
            })
            .await?;
    }

    let match_info = MatchInfo::load(&group_dir.join("match_info.ini"))?;

    // Rule 3: trim readiness.
    if state.status == Some(GroupStatus::Combined) && combined_video_path(group_dir).exists() && match_info.is_populated() {
        ctx.video_queue
            .enqueue(VideoTask::Trim {
                group_dir: group_dir.to_path_buf(),
            })
            .await?;
    }

    // Rule 4: upload readiness.
    if state.status == Some(GroupStatus::AutocamComplete) && ctx.uploader.is_some() {
        if let Some(trimmed_path) = &state.trimmed_video_path {
            if state.uploaded_video_id.is_none() {
                ctx.upload_queue
                    .enqueue(UploadTask::new(group_dir.to_path_buf(), UploadVariant::Trimmed, trimmed_path.clone()))
                    .await?;
            }
        }
        if state.uploaded_raw_video_id.is_none() {
            ctx.upload_queue
                .enqueue(UploadTask::new(
                    group_dir.to_path_buf(),
                    UploadVariant::Raw,
                    combined_video_path(group_dir),
                ))
                .await?;
        }
    }

    // Rule 5: ask for missing match info, unless already waiting. Try the
    // configured schedule provider first so the operator is only asked
    // about what it couldn't fill in (the kickoff point in this video).
    if state.status == Some(GroupStatus::Combined) && !match_info.is_populated() {
        let match_info = enrich_from_schedule(ctx, group_dir, &state, match_info).await?;
        if !match_info.is_populated() {
            request_match_info(ctx, group_dir, &match_info).await?;
        }
    }

    // Rule 6: delete source .dav files once autocam post-production is done
    // and both uploads (or the lack of an uploader) are accounted for.
    cleanup_group(ctx, group_dir, &state).await?;

    Ok(())
}

async fn enrich_from_schedule(
    ctx: &Context,
    group_dir: &std::path::Path,
    state: &DirectoryState,
    match_info: MatchInfo,
) -> Result<MatchInfo, base::Error> {
    let Some(schedule) = ctx.schedule.as_ref() else {
        return Ok(match_info);
    };
    let (Some(start), Some(end)) = (state.earliest_start(), state.latest_end()) else {
        return Ok(match_info);
    };
    match schedule.find_game(start, end).await {
        Ok(Some(game)) => Ok(MatchInfo::enrich_from_schedule(&group_dir.join("match_info.ini"), &game)?),
        Ok(None) => Ok(match_info),
        Err(e) => {
            warn!(error = %e.chain(), group = %group_dir.display(), "schedule lookup failed");
            Ok(match_info)
        }
    }
}

/// Deletes the raw `.dav` fragments for a group once post-production is
/// fully done, per `original_source`'s cleanup service. "Done" means both
/// uploads are accounted for when an uploader is configured, or the combine
/// stage finished when it isn't.
async fn cleanup_group(ctx: &Context, group_dir: &std::path::Path, state: &DirectoryState) -> Result<(), base::Error> {
    if state.status == Some(GroupStatus::AutocamCompleteDavFilesDeleted) {
        return Ok(());
    }
    let autocam_done = state.status == Some(GroupStatus::AutocamComplete);
    if !autocam_done {
        return Ok(());
    }
    let uploads_done = if ctx.uploader.is_some() {
        state.uploaded_raw_video_id.is_some() && (state.trimmed_video_path.is_none() || state.uploaded_video_id.is_some())
    } else {
        true
    };
    if !uploads_done {
        return Ok(());
    }

    let _guard = ctx.dir_locks.lock(group_dir).await;
    let mut state = DirectoryState::load(group_dir)?;
    if state.status != Some(GroupStatus::AutocamComplete) {
        return Ok(());
    }
    for file in state.files.values() {
        if file.file_path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("dav")) {
            let _ = tokio::fs::remove_file(&file.file_path).await;
        }
    }
    state.status = Some(GroupStatus::AutocamCompleteDavFilesDeleted);
    state.save(group_dir)
}

/// Also used by the `process-with-ntfy` command to force a fresh round for
/// one group outside the regular audit cadence.
pub(crate) async fn request_match_info(
    ctx: &Context,
    group_dir: &std::path::Path,
    match_info: &MatchInfo,
) -> Result<(), base::Error> {
    let dir_key = group_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| group_dir.display().to_string());

    let mut ntfy_state = NtfyServiceState::load(&ctx.storage_root)?;
    if ntfy_state.pending_inputs.contains_key(&dir_key) {
        return Ok(());
    }

    let kind = if match_info.my_team_name.is_empty() || match_info.opponent_team_name.is_empty() || match_info.location.is_empty()
    {
        TaskKind::TeamInfo
    } else if match_info.start_time_offset.is_empty() {
        TaskKind::GameStartTime
    } else {
        TaskKind::GameEndTime
    };

    // game_end_time's first screenshot is 45 minutes into the video past
    // kickoff, not the start of the recording.
    let initial_offset = match kind {
        TaskKind::GameEndTime => match_info.start_time_offset_seconds().unwrap_or(0) + 45 * 60,
        _ => 0,
    };

    let task_id = ntfy_state.next_task_id(kind);
    ntfy_state.upsert(
        &dir_key,
        TaskMetadata {
            task_id,
            task_type: kind,
            status: TaskStatus::Queued,
            sent_at: None,
            time_offset_seconds: Some(initial_offset),
            message_id: None,
        },
    );
    ntfy_state.save(&ctx.storage_root)
}
