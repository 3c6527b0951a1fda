//! `ntfy_service_state.json`: the NotifierQueue's durable record of
//! in-flight questions, keyed by group directory. Every task transition is
//! written here before the outbound notification is sent, so a crash after
//! "about to send" is indistinguishable from "sent but unacknowledged" and
//! safely resends on restart.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use base::{Error, ErrorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const NTFY_STATE_FILE_NAME: &str = "ntfy_service_state.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    GameStartTime,
    GameEndTime,
    TeamInfo,
    PlaylistName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Sent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMetadata {
    pub task_id: String,
    pub task_type: TaskKind,
    pub status: TaskStatus,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
    /// Seconds into `combined.mp4` for the current game_start_time /
    /// game_end_time iteration step.
    #[serde(default)]
    pub time_offset_seconds: Option<i64>,
    #[serde(default)]
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingInput {
    pub input_type: TaskKind,
    pub timestamp: DateTime<Utc>,
    pub metadata: TaskMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NtfyServiceState {
    #[serde(default)]
    pub pending_inputs: HashMap<String, PendingInput>,
    #[serde(default)]
    pub processed_dirs: HashSet<String>,
    /// Monotonic counter minting unique task ids, persisted so a restart
    /// never reissues one already seen by the operator.
    #[serde(default)]
    pub task_counter: u64,
}

impl NtfyServiceState {
    pub fn load(storage_root: &Path) -> Result<NtfyServiceState, Error> {
        let path = storage_root.join(NTFY_STATE_FILE_NAME);
        if !path.exists() {
            return Ok(NtfyServiceState::default());
        }
        let bytes = std::fs::read(&path)
            .map_err(|e| Error::wrap(ErrorKind::Internal, format!("reading {}", path.display()), Box::new(e)))?;
        // Any shape that doesn't parse is treated as a legacy-format state
        // file and cleared, per spec's startup-recovery rule.
        Ok(serde_json::from_slice(&bytes).unwrap_or_default())
    }

    pub fn save(&self, storage_root: &Path) -> Result<(), Error> {
        let path = storage_root.join(NTFY_STATE_FILE_NAME);
        let tmp = storage_root.join(format!("{NTFY_STATE_FILE_NAME}.tmp"));
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| Error::wrap(ErrorKind::Internal, "serializing ntfy state", Box::new(e)))?;
        std::fs::write(&tmp, bytes)
            .map_err(|e| Error::wrap(ErrorKind::Internal, format!("writing {}", tmp.display()), Box::new(e)))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| Error::wrap(ErrorKind::Internal, format!("renaming into {}", path.display()), Box::new(e)))
    }

    pub fn upsert(&mut self, group_dir: &str, task: TaskMetadata) {
        self.pending_inputs.insert(
            group_dir.to_owned(),
            PendingInput {
                input_type: task.task_type,
                timestamp: Utc::now(),
                metadata: task,
            },
        );
    }

    pub fn clear(&mut self, group_dir: &str) {
        self.pending_inputs.remove(group_dir);
        self.processed_dirs.insert(group_dir.to_owned());
    }

    /// Mints a fresh, never-reused task id: `{kind}_{counter}_{timestamp}`,
    /// mirroring the original's `f"{task_type}_{counter}_{datetime.now()}"`.
    /// Every created or requeued task must get a new one — a stale id left
    /// on an old iteration step could otherwise match a reply meant for a
    /// step the operator has already moved past.
    pub fn next_task_id(&mut self, kind: TaskKind) -> String {
        self.task_counter += 1;
        format!("{kind:?}_{}_{}", self.task_counter, Utc::now().format("%Y%m%d%H%M%S"))
    }
}

pub fn state_file_path(storage_root: &Path) -> PathBuf {
    storage_root.join(NTFY_STATE_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> TaskMetadata {
        TaskMetadata {
            task_id: "game_start_time-1-20240501120000".into(),
            task_type: TaskKind::GameStartTime,
            status: TaskStatus::Queued,
            sent_at: None,
            time_offset_seconds: Some(0),
            message_id: None,
        }
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = NtfyServiceState::default();
        state.upsert("2024.05.01-10.00.00", sample_task());
        state.save(dir.path()).unwrap();

        let loaded = NtfyServiceState::load(dir.path()).unwrap();
        assert!(loaded.pending_inputs.contains_key("2024.05.01-10.00.00"));
    }

    #[test]
    fn malformed_state_file_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(NTFY_STATE_FILE_NAME), b"not json at all").unwrap();
        let loaded = NtfyServiceState::load(dir.path()).unwrap();
        assert!(loaded.pending_inputs.is_empty());
        assert!(loaded.processed_dirs.is_empty());
    }

    #[test]
    fn clear_moves_entry_to_processed() {
        let mut state = NtfyServiceState::default();
        state.upsert("g1", sample_task());
        state.clear("g1");
        assert!(!state.pending_inputs.contains_key("g1"));
        assert!(state.processed_dirs.contains("g1"));
    }
}
