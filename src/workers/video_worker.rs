//! Single-consumer executor for convert/combine/trim ffmpeg jobs. Running
//! two ffmpeg jobs at once is forbidden, so this worker has exactly one
//! queue and processes it strictly FIFO.

use std::path::PathBuf;

use tracing::warn;

use crate::ffmpeg;
use crate::slug::slugify;
use crate::state::file::FileStatus;
use crate::state::group::{combined_video_path, DirectoryState, GroupStatus};
use crate::state::match_info::MatchInfo;
use crate::tasks::VideoTask;

use super::Context;

pub async fn run(ctx: Context) {
    loop {
        if ctx.shutdown.is_shutdown() {
            return;
        }
        let task = tokio::select! {
            t = ctx.video_queue.dequeue() => match t {
                Ok(t) => t,
                Err(e) => {
                    warn!(error = %e.chain(), "video queue read failed");
                    continue;
                }
            },
            _ = ctx.shutdown.notified() => return,
        };

        let group_dir = task.group_dir().clone();
        let result = match &task {
            VideoTask::Convert { input_path, output_path, .. } => {
                process_convert(&ctx, &group_dir, input_path, output_path).await
            }
            VideoTask::Combine { .. } => process_combine(&ctx, &group_dir).await,
            VideoTask::Trim { .. } => process_trim(&ctx, &group_dir).await,
        };
        if let Err(e) = result {
            warn!(error = %e.chain(), group = %group_dir.display(), task = ?task, "video task failed");
        }
    }
}

async fn process_convert(
    ctx: &Context,
    group_dir: &PathBuf,
    input_path: &PathBuf,
    output_path: &PathBuf,
) -> Result<(), base::Error> {
    let base_name = input_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if let Err(e) = ffmpeg::convert(input_path, output_path).await {
        let _guard = ctx.dir_locks.lock(group_dir).await;
        let mut state = DirectoryState::load(group_dir)?;
        if let Some(file) = state.get_file_mut(&base_name) {
            file.fail(FileStatus::ConversionFailed, e.to_string());
        }
        state.save(group_dir)?;
        return Err(e);
    }

    let duration = ffmpeg::probe_duration_seconds(output_path).await;
    let screenshot_path = output_path.with_extension("jpg");
    let _ = ffmpeg::screenshot(output_path, &screenshot_path, 1).await;

    if duration.is_some() {
        let _ = tokio::fs::remove_file(input_path).await;
    }

    crate::state::match_info::MatchInfo::ensure_template(&group_dir.join("match_info.ini"))?;

    let ready_for_combine;
    {
        let _guard = ctx.dir_locks.lock(group_dir).await;
        let mut state = DirectoryState::load(group_dir)?;
        if let Some(file) = state.get_file_mut(&base_name) {
            file.mark(FileStatus::Converted);
            file.screenshot_path = Some(screenshot_path);
        }
        ready_for_combine = state.all_converted() && !combined_video_path(group_dir).exists();
        state.save(group_dir)?;
    }

    if ready_for_combine {
        ctx.video_queue
            .enqueue(VideoTask::Combine {
                group_dir: group_dir.clone(),
            })
            .await?;
    }
    Ok(())
}

async fn process_combine(ctx: &Context, group_dir: &PathBuf) -> Result<(), base::Error> {
    let _guard = ctx.dir_locks.lock(group_dir).await;
    let mut state = DirectoryState::load(group_dir)?;

    let mut inputs: Vec<PathBuf> = state
        .files
        .values()
        .filter(|f| f.participates_in_combine())
        .map(|f| f.file_path.with_extension("mp4"))
        .collect();
    inputs.sort();

    let output = combined_video_path(group_dir);
    if let Err(e) = ffmpeg::combine(&inputs, &output, group_dir).await {
        state.status = Some(GroupStatus::CombineFailed);
        state.save(group_dir)?;
        return Err(e);
    }

    state.status = Some(GroupStatus::Combined);
    state.save(group_dir)?;
    Ok(())
}

async fn process_trim(ctx: &Context, group_dir: &PathBuf) -> Result<(), base::Error> {
    let match_info = MatchInfo::load(&group_dir.join("match_info.ini"))?;
    let _guard = ctx.dir_locks.lock(group_dir).await;
    let mut state = DirectoryState::load(group_dir)?;

    let Some(start_seconds) = match_info.start_time_offset_seconds() else {
        return Err(base::Error::new(
            base::ErrorKind::FailedPrecondition,
            "trim requested without a parseable start_time_offset",
        ));
    };
    let end_seconds = start_seconds + match_info.total_duration_seconds();
    let start = base::duration::format_hms(start_seconds);
    let end = base::duration::format_hms(end_seconds);

    let earliest = state.earliest_start().unwrap_or(chrono::NaiveDateTime::UNIX_EPOCH);
    let subdir_name = format!(
        "{} - {} vs {} ({})",
        earliest.format("%Y.%m.%d"),
        match_info.my_team_name,
        match_info.opponent_team_name,
        match_info.location,
    );
    let file_name = format!(
        "{}-{}-{}-{}-raw.mp4",
        slugify(&match_info.my_team_name),
        slugify(&match_info.opponent_team_name),
        slugify(&match_info.location),
        earliest.format("%m-%d-%Y"),
    );
    let out_dir = group_dir.join(subdir_name);
    tokio::fs::create_dir_all(&out_dir)
        .await
        .map_err(|e| base::Error::wrap(base::ErrorKind::Internal, format!("creating {}", out_dir.display()), e))?;
    let output = out_dir.join(file_name);

    let combined = combined_video_path(group_dir);
    if let Err(e) = ffmpeg::trim(&combined, &output, &start, &end).await {
        state.status = Some(GroupStatus::TrimFailed);
        state.save(group_dir)?;
        return Err(e);
    }

    state.status = Some(GroupStatus::Trimmed);
    state.trimmed_video_path = Some(output);
    state.save(group_dir)?;
    Ok(())
}
