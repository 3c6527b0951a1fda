//! Single-flight, per-group interactive-question dispatcher. Sends one
//! outstanding ntfy notification per group at a time, correlates the
//! operator's reply, and persists every task transition to
//! `ntfy_service_state.json` before the notification goes out so a crash
//! mid-send safely resends on restart.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::capabilities::notifier::NotificationAction;
use crate::image_compress;
use crate::state::group::DirectoryState;
use crate::state::match_info::MatchInfo;
use crate::state::ntfy_state::{NtfyServiceState, PendingInput, TaskKind, TaskStatus};

use super::Context;

const GAME_START_STEP_SECONDS: i64 = 5 * 60;
const GAME_START_MAX_SECONDS: i64 = 45 * 60;
const GAME_END_STEP_SECONDS: i64 = 5 * 60;
const GAME_END_LOOKAHEAD_SECONDS: i64 = 120 * 60;
const ECHO_DEDUP_WINDOW: Duration = Duration::from_secs(60);
const DISPATCH_TICK: Duration = Duration::from_secs(5);

pub async fn run(ctx: Context) {
    let Some(notifier) = ctx.notifier.clone() else {
        return;
    };

    // Recovery: any entry with a malformed shape was already discarded by
    // `NtfyServiceState::load`'s best-effort parse.
    let mut recent_sent: Vec<(Instant, String)> = Vec::new();
    let mut events = notifier.subscribe_events();

    loop {
        tokio::select! {
            _ = tokio::time::sleep(DISPATCH_TICK) => {
                if let Err(e) = dispatch_pending(&ctx, notifier.as_ref(), &mut recent_sent).await {
                    warn!(error = %e.chain(), "ntfy dispatch pass failed");
                }
            }
            event = events.recv() => {
                let Some(event) = event else { return };
                if let Err(e) = handle_event(&ctx, &event.message, &mut recent_sent).await {
                    warn!(error = %e.chain(), "ntfy event handling failed");
                }
            }
            _ = ctx.shutdown.notified() => return,
        }
        if ctx.shutdown.is_shutdown() {
            return;
        }
    }
}

/// Also invoked directly by the `process-with-ntfy` command for an
/// immediate one-shot dispatch outside the regular 5-second tick.
pub(crate) async fn dispatch_pending(
    ctx: &Context,
    notifier: &dyn crate::capabilities::Notifier,
    recent_sent: &mut Vec<(Instant, String)>,
) -> Result<(), base::Error> {
    let mut ntfy_state = NtfyServiceState::load(&ctx.storage_root)?;
    let queued: Vec<String> = ntfy_state
        .pending_inputs
        .iter()
        .filter(|(_, p)| p.metadata.status == TaskStatus::Queued)
        .map(|(k, _)| k.clone())
        .collect();

    for dir_key in queued {
        let group_dir = ctx.storage_root.join(&dir_key);
        let Some(pending) = ntfy_state.pending_inputs.get(&dir_key).cloned() else {
            continue;
        };
        let message = match build_message(&group_dir, &pending).await {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e.chain(), group = %dir_key, "failed to build ntfy message");
                continue;
            }
        };

        // Write the "sent" transition before the outbound call.
        if let Some(p) = ntfy_state.pending_inputs.get_mut(&dir_key) {
            p.metadata.status = TaskStatus::Sent;
            p.metadata.sent_at = Some(Utc::now());
        }
        ntfy_state.save(&ctx.storage_root)?;

        let sent = notifier
            .send(&message.body, &message.title, &[], 3, message.image, &message.actions)
            .await
            .unwrap_or(false);
        if sent {
            recent_sent.push((Instant::now(), message.body.clone()));
            recent_sent.retain(|(t, _)| t.elapsed() < ECHO_DEDUP_WINDOW);
            info!(group = %dir_key, "sent ntfy question");
        } else {
            warn!(group = %dir_key, "ntfy send failed; will remain in sent state and rely on the 5-minute soft timeout");
        }
    }
    Ok(())
}

struct Message {
    title: String,
    body: String,
    image: Option<Vec<u8>>,
    actions: Vec<NotificationAction>,
}

async fn build_message(group_dir: &std::path::Path, pending: &PendingInput) -> Result<Message, base::Error> {
    let task_id = &pending.metadata.task_id;
    match pending.metadata.input_type {
        TaskKind::GameStartTime | TaskKind::GameEndTime => {
            let offset = pending.metadata.time_offset_seconds.unwrap_or(0);
            let hms = base::duration::format_hms(offset);
            let combined = group_dir.join("combined.mp4");
            let screenshot_path = group_dir.join(format!(".ntfy-screenshot-{task_id}.jpg"));
            let _ = crate::ffmpeg::screenshot(&combined, &screenshot_path, offset).await;
            let image = tokio::fs::read(&screenshot_path)
                .await
                .ok()
                .map(|bytes| image_compress::compress(&bytes, image_compress::DEFAULT_QUALITY, image_compress::DEFAULT_MAX_WIDTH));
            let _ = tokio::fs::remove_file(&screenshot_path).await;

            let question = if pending.metadata.input_type == TaskKind::GameStartTime {
                format!("Has the game started at this point ({hms} into the video)?")
            } else {
                format!("Has the game ended at this point ({hms} into the video)?")
            };
            let (yes_label, no_label) = if pending.metadata.input_type == TaskKind::GameStartTime {
                (
                    format!("Yes, game started at {hms} (ID: {task_id})"),
                    format!("No, not yet at {hms} (ID: {task_id})"),
                )
            } else {
                (
                    format!("Yes, game ended at {hms} (ID: {task_id})"),
                    format!("No, not yet at {hms} (ID: {task_id})"),
                )
            };
            Ok(Message {
                title: "Match info needed".into(),
                body: question,
                image,
                actions: vec![
                    NotificationAction {
                        label: "Yes".into(),
                        payload: yes_label,
                    },
                    NotificationAction {
                        label: "No".into(),
                        payload: no_label,
                    },
                ],
            })
        }
        TaskKind::TeamInfo => {
            let match_info = MatchInfo::load(&group_dir.join("match_info.ini"))?;
            let mut missing = Vec::new();
            if match_info.my_team_name.is_empty() {
                missing.push("my_team_name");
            }
            if match_info.opponent_team_name.is_empty() {
                missing.push("opponent_team_name");
            }
            if match_info.location.is_empty() {
                missing.push("location");
            }
            Ok(Message {
                title: "Match info needed".into(),
                body: format!(
                    "Please edit match_info.ini in {} — missing: {} (ID: {task_id})",
                    group_dir.display(),
                    missing.join(", ")
                ),
                image: None,
                actions: vec![],
            })
        }
        TaskKind::PlaylistName => Ok(Message {
            title: "Playlist name needed".into(),
            body: format!("What playlist should this team's videos go in? (ID: {task_id})"),
            image: None,
            actions: vec![],
        }),
    }
}

async fn handle_event(ctx: &Context, message: &str, recent_sent: &mut [(Instant, String)]) -> Result<(), base::Error> {
    if recent_sent
        .iter()
        .any(|(t, m)| t.elapsed() < ECHO_DEDUP_WINDOW && m == message)
    {
        debug!(%message, "ignoring echo of our own outbound notification");
        return Ok(());
    }

    let mut ntfy_state = NtfyServiceState::load(&ctx.storage_root)?;

    let dir_key = if let Some(task_id) = extract_task_id(message) {
        ntfy_state
            .pending_inputs
            .iter()
            .find(|(_, p)| p.metadata.task_id == task_id)
            .map(|(k, _)| k.clone())
    } else {
        most_recent_sent_of_matching_kind(&ntfy_state.pending_inputs, message)
    };

    let Some(dir_key) = dir_key else {
        warn!(%message, "could not correlate ntfy reply to any task; dropping");
        return Ok(());
    };

    let Some(pending) = ntfy_state.pending_inputs.get(&dir_key).cloned() else {
        return Ok(());
    };
    apply_answer(ctx, &dir_key, &pending, message).await?;
    ntfy_state.clear(&dir_key);
    ntfy_state.save(&ctx.storage_root)
}

fn extract_task_id(message: &str) -> Option<String> {
    let start = message.find("(ID: ")? + "(ID: ".len();
    let end = message[start..].find(')')? + start;
    Some(message[start..end].to_owned())
}

fn most_recent_sent_of_matching_kind(pending_inputs: &HashMap<String, PendingInput>, message: &str) -> Option<String> {
    let lower = message.to_ascii_lowercase();
    pending_inputs
        .iter()
        .filter(|(_, p)| p.metadata.status == TaskStatus::Sent)
        .filter(|(_, p)| match p.metadata.input_type {
            TaskKind::GameStartTime | TaskKind::GameEndTime => lower.contains("game") || extract_hms(message).is_some(),
            TaskKind::TeamInfo => lower.contains("team"),
            TaskKind::PlaylistName => lower.contains("playlist"),
        })
        .max_by_key(|(_, p)| p.metadata.sent_at)
        .map(|(k, _)| k.clone())
}

fn extract_hms(message: &str) -> Option<String> {
    let chars: Vec<char> = message.chars().collect();
    if chars.len() < 8 {
        return None;
    }
    for start in 0..=chars.len() - 8 {
        let candidate = &chars[start..start + 8];
        let is_hms = candidate[2] == ':'
            && candidate[5] == ':'
            && candidate.iter().enumerate().all(|(i, c)| matches!(i, 2 | 5) || c.is_ascii_digit());
        if is_hms {
            return Some(candidate.iter().collect());
        }
    }
    None
}

async fn apply_answer(
    ctx: &Context,
    dir_key: &str,
    pending: &PendingInput,
    message: &str,
) -> Result<(), base::Error> {
    let group_dir = ctx.storage_root.join(dir_key);
    let lower = message.to_ascii_lowercase();
    let said_yes = lower.starts_with("yes");

    match pending.metadata.input_type {
        TaskKind::GameStartTime => {
            if said_yes {
                if let Some(hms) = extract_hms(message) {
                    let update = MatchInfo {
                        start_time_offset: hms,
                        ..Default::default()
                    };
                    MatchInfo::merge_fill_empty(&group_dir.join("match_info.ini"), &update)?;
                }
                return Ok(());
            }
            let combined = group_dir.join("combined.mp4");
            let duration = crate::ffmpeg::probe_duration_seconds(&combined)
                .await
                .map(|d| d as i64)
                .unwrap_or(GAME_START_MAX_SECONDS);
            let max_seconds = duration.min(GAME_START_MAX_SECONDS);
            requeue_next_step(ctx, dir_key, pending, GAME_START_STEP_SECONDS, max_seconds).await
        }
        TaskKind::GameEndTime => {
            if said_yes {
                if let Some(hms) = extract_hms(message) {
                    if let Some(answer_seconds) = base::duration::parse_hms_seconds(&hms) {
                        let match_info = MatchInfo::load(&group_dir.join("match_info.ini"))?;
                        if let Some(start_seconds) = match_info.start_time_offset_seconds() {
                            let total = (answer_seconds - start_seconds).max(0);
                            let update = MatchInfo {
                                total_duration: base::duration::format_hms(total),
                                ..Default::default()
                            };
                            MatchInfo::merge_fill_empty(&group_dir.join("match_info.ini"), &update)?;
                        }
                    }
                }
                return Ok(());
            }
            let match_info = MatchInfo::load(&group_dir.join("match_info.ini"))?;
            let start_seconds = match_info.start_time_offset_seconds().unwrap_or(0);
            let max_seconds = start_seconds + GAME_END_LOOKAHEAD_SECONDS;
            requeue_next_step(ctx, dir_key, pending, GAME_END_STEP_SECONDS, max_seconds).await
        }
        TaskKind::TeamInfo => Ok(()),
        TaskKind::PlaylistName => {
            let answer = message.split(" (ID:").next().unwrap_or(message).trim().to_owned();
            let _guard = ctx.dir_locks.lock(&group_dir).await;
            let mut state = DirectoryState::load(&group_dir)?;
            state.youtube_playlist_name = Some(answer);
            state.save(&group_dir)
        }
    }
}

async fn requeue_next_step(
    ctx: &Context,
    dir_key: &str,
    pending: &PendingInput,
    step_seconds: i64,
    max_seconds: i64,
) -> Result<(), base::Error> {
    let current = pending.metadata.time_offset_seconds.unwrap_or(0);
    let next = current + step_seconds;
    if next > max_seconds {
        return Ok(());
    }
    let mut ntfy_state = NtfyServiceState::load(&ctx.storage_root)?;
    let mut metadata = pending.metadata.clone();
    // A fresh id per step: an old, still-displayed NTFY push must never
    // correlate against the step we're now queuing.
    metadata.task_id = ntfy_state.next_task_id(metadata.task_type);
    metadata.status = TaskStatus::Queued;
    metadata.time_offset_seconds = Some(next);
    metadata.sent_at = None;
    ntfy_state.upsert(dir_key, metadata);
    ntfy_state.save(&ctx.storage_root)
}
