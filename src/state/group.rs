//! The per-group `state.json`: a `DirectoryState` value type loaded from
//! disk at the start of every state-mutating action and written back
//! wholesale under the directory's lock.
//!
//! Grounded on `original_source/video_grouper/directory_state.py`'s
//! `_load_state` / `_save_state_nolock` / `add_file` / `update_file_state`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use base::{Error, ErrorKind};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::file::RecordingFile;

pub const STATE_FILE_NAME: &str = "state.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Combined,
    CombineFailed,
    Trimmed,
    TrimFailed,
    AutocamComplete,
    AutocamCompleteDavFilesDeleted,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryState {
    pub status: Option<GroupStatus>,
    /// Keyed by the file's base name, ordered for deterministic iteration
    /// and concat-list generation.
    #[serde(default)]
    pub files: BTreeMap<String, RecordingFile>,
    #[serde(default)]
    pub youtube_playlist_name: Option<String>,
    #[serde(default)]
    pub uploaded_video_id: Option<String>,
    #[serde(default)]
    pub uploaded_raw_video_id: Option<String>,
    #[serde(default)]
    pub trimmed_video_path: Option<PathBuf>,
}

impl DirectoryState {
    /// Loads `state.json` from `group_dir`, or an empty state if absent.
    /// Callers must hold the group's directory lock before calling this as
    /// part of a read-modify-write sequence.
    pub fn load(group_dir: &Path) -> Result<DirectoryState, Error> {
        let path = group_dir.join(STATE_FILE_NAME);
        if !path.exists() {
            return Ok(DirectoryState::default());
        }
        let bytes = std::fs::read(&path)
            .map_err(|e| Error::wrap(ErrorKind::Internal, format!("reading {}", path.display()), Box::new(e)))?;
        // Any shape that doesn't parse resets the group to an empty state
        // rather than aborting the caller's whole scan over one bad file.
        Ok(serde_json::from_slice(&bytes).unwrap_or_default())
    }

    /// Serializes and atomically replaces `state.json` in `group_dir` via a
    /// write-to-temp-then-rename, so a crash mid-write never corrupts the
    /// previous state.
    pub fn save(&self, group_dir: &Path) -> Result<(), Error> {
        let path = group_dir.join(STATE_FILE_NAME);
        let tmp = group_dir.join(format!("{STATE_FILE_NAME}.tmp"));
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| Error::wrap(ErrorKind::Internal, "serializing state.json", Box::new(e)))?;
        std::fs::write(&tmp, bytes)
            .map_err(|e| Error::wrap(ErrorKind::Internal, format!("writing {}", tmp.display()), Box::new(e)))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| Error::wrap(ErrorKind::Internal, format!("renaming into {}", path.display()), Box::new(e)))
    }

    pub fn add_file(&mut self, file: RecordingFile) {
        let key = file
            .file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.file_path.display().to_string());
        self.files.insert(key, file);
    }

    pub fn get_file_mut(&mut self, base_name: &str) -> Option<&mut RecordingFile> {
        self.files.get_mut(base_name)
    }

    /// True once every non-skipped file has reached `converted`.
    pub fn all_converted(&self) -> bool {
        self.files
            .values()
            .filter(|f| f.participates_in_combine())
            .all(|f| matches!(f.status, super::file::FileStatus::Converted))
            && self.files.values().any(|f| f.participates_in_combine())
    }

    pub fn earliest_start(&self) -> Option<NaiveDateTime> {
        self.files.values().map(|f| f.start_time).min()
    }

    pub fn latest_end(&self) -> Option<NaiveDateTime> {
        self.files.values().map(|f| f.end_time).max()
    }
}

/// Formats a group directory name from its start time, per spec.md's
/// `YYYY.MM.DD-HH.MM.SS` convention.
pub fn group_dir_name(start_time: NaiveDateTime) -> String {
    start_time.format("%Y.%m.%d-%H.%M.%S").to_string()
}

pub fn combined_video_path(group_dir: &Path) -> PathBuf {
    group_dir.join("combined.mp4")
}

pub fn trimmed_video_path(group_dir: &Path, slug: &str) -> PathBuf {
    group_dir.join(format!("{slug}-trimmed.mp4"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::file::FileStatus;
    use chrono::NaiveDate;

    fn dt(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = DirectoryState::default();
        state.add_file(RecordingFile::new(
            dir.path().join("a.dav"),
            "/mnt/dav/a.dav".into(),
            dt(10, 0, 0),
            dt(10, 15, 0),
        ));
        state.save(dir.path()).unwrap();

        let loaded = DirectoryState::load(dir.path()).unwrap();
        assert_eq!(loaded.files.len(), 1);
        assert!(loaded.files.contains_key("a.dav"));
    }

    #[test]
    fn missing_state_file_is_empty_default() {
        let dir = tempfile::tempdir().unwrap();
        let state = DirectoryState::load(dir.path()).unwrap();
        assert!(state.files.is_empty());
        assert!(state.status.is_none());
    }

    #[test]
    fn malformed_state_file_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(STATE_FILE_NAME), b"not json at all").unwrap();
        let state = DirectoryState::load(dir.path()).unwrap();
        assert!(state.files.is_empty());
        assert!(state.status.is_none());
    }

    #[test]
    fn all_converted_requires_at_least_one_participating_file() {
        let mut state = DirectoryState::default();
        assert!(!state.all_converted());

        let mut f = RecordingFile::new(PathBuf::from("a.dav"), "/a.dav".into(), dt(10, 0, 0), dt(10, 5, 0));
        f.mark(FileStatus::Converted);
        state.add_file(f);
        assert!(state.all_converted());
    }

    #[test]
    fn skipped_files_are_excluded_from_all_converted() {
        let mut state = DirectoryState::default();
        let mut pending = RecordingFile::new(PathBuf::from("a.dav"), "/a.dav".into(), dt(10, 0, 0), dt(10, 5, 0));
        pending.skip = true;
        state.add_file(pending);

        let mut done = RecordingFile::new(PathBuf::from("b.dav"), "/b.dav".into(), dt(10, 5, 0), dt(10, 10, 0));
        done.mark(FileStatus::Converted);
        state.add_file(done);

        assert!(state.all_converted());
    }

    #[test]
    fn dir_name_format() {
        assert_eq!(group_dir_name(dt(14, 30, 5)), "2024.05.01-14.30.05");
    }
}
