//! Uploads trimmed and raw outputs to the configured video host once a
//! group reaches `autocam_complete` and its match metadata is populated.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::state::group::DirectoryState;
use crate::state::match_info::MatchInfo;
use crate::state::ntfy_state::{NtfyServiceState, TaskKind, TaskMetadata, TaskStatus};
use crate::tasks::{UploadTask, UploadVariant};

use super::Context;

pub async fn run(ctx: Context) {
    loop {
        if ctx.shutdown.is_shutdown() {
            return;
        }
        let task = tokio::select! {
            t = ctx.upload_queue.dequeue() => match t {
                Ok(t) => t,
                Err(e) => {
                    warn!(error = %e.chain(), "upload queue read failed");
                    continue;
                }
            },
            _ = ctx.shutdown.notified() => return,
        };

        if let Err(e) = process(&ctx, &task).await {
            warn!(error = %e.chain(), group = %task.group_dir().display(), "upload task failed");
        }
    }
}

fn title_for(match_info: &MatchInfo, variant: UploadVariant) -> String {
    let base = format!("{} vs {}", match_info.my_team_name, match_info.opponent_team_name);
    match variant {
        UploadVariant::Raw => format!("{base} - Full Field"),
        UploadVariant::Trimmed => base,
    }
}

fn description_for(match_info: &MatchInfo, variant: UploadVariant) -> String {
    let base = format!(
        "{} vs {} at {}",
        match_info.my_team_name, match_info.opponent_team_name, match_info.location
    );
    match variant {
        UploadVariant::Raw => format!("{base}\n\nFull field view - unedited footage"),
        UploadVariant::Trimmed => format!("{base}\n\nProcessed with automated camera tracking"),
    }
}

fn playlist_names(base: &str, variant: UploadVariant) -> String {
    match variant {
        UploadVariant::Raw => format!("{base} - Full Field"),
        UploadVariant::Trimmed => base.to_owned(),
    }
}

async fn resolve_playlist_base_name(
    ctx: &Context,
    group_dir: &PathBuf,
    match_info: &MatchInfo,
) -> Result<Option<String>, base::Error> {
    let state = DirectoryState::load(group_dir)?;
    if let Some(name) = state.youtube_playlist_name {
        return Ok(Some(name));
    }
    if let Some(youtube) = &ctx.config.youtube {
        if let Some(name) = youtube.playlist_map.get(&match_info.my_team_name) {
            return Ok(Some(name.clone()));
        }
    }

    // Neither an override nor a configured mapping: ask the operator, and
    // defer this upload until a future audit cycle finds the answer.
    let dir_key = group_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| group_dir.display().to_string());
    let mut ntfy_state = NtfyServiceState::load(&ctx.storage_root)?;
    if !ntfy_state.pending_inputs.contains_key(&dir_key) {
        let task_id = ntfy_state.next_task_id(TaskKind::PlaylistName);
        ntfy_state.upsert(
            &dir_key,
            TaskMetadata {
                task_id,
                task_type: TaskKind::PlaylistName,
                status: TaskStatus::Queued,
                sent_at: None,
                time_offset_seconds: None,
                message_id: None,
            },
        );
        ntfy_state.save(&ctx.storage_root)?;
    }
    Ok(None)
}

async fn process(ctx: &Context, task: &UploadTask) -> Result<(), base::Error> {
    let Some(uploader) = ctx.uploader.as_ref() else {
        return Ok(());
    };
    let group_dir = task.group_dir().clone();
    let match_info = MatchInfo::load(&group_dir.join("match_info.ini"))?;
    if !match_info.is_populated() {
        return Ok(());
    }

    let Some(base_name) = resolve_playlist_base_name(ctx, &group_dir, &match_info).await? else {
        return Ok(());
    };

    let privacy_status = ctx
        .config
        .youtube
        .as_ref()
        .map(|y| y.privacy_status.as_str())
        .unwrap_or("private");

    let variant = task.variant();
    let playlist_name = playlist_names(&base_name, variant);
    let playlist_id = match uploader.find_playlist(&playlist_name).await? {
        Some(id) => id,
        None => {
            uploader
                .create_playlist(&playlist_name, &description_for(&match_info, variant), privacy_status)
                .await?
        }
    };

    let title = title_for(&match_info, variant);
    let description = description_for(&match_info, variant);
    let video_id = uploader
        .upload(task.source_path(), &title, &description, &[], privacy_status, Some(&playlist_id))
        .await?;

    let Some(video_id) = video_id else {
        warn!(group = %group_dir.display(), ?variant, "upload returned no video id; auditor will retry");
        return Ok(());
    };

    let _guard = ctx.dir_locks.lock(&group_dir).await;
    let mut state = DirectoryState::load(&group_dir)?;
    match variant {
        UploadVariant::Raw => state.uploaded_raw_video_id = Some(video_id.clone()),
        UploadVariant::Trimmed => state.uploaded_video_id = Some(video_id.clone()),
    }
    state.save(&group_dir)?;
    info!(group = %group_dir.display(), %video_id, ?variant, "uploaded video");
    Ok(())
}

