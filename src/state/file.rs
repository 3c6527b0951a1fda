//! The `File` (`RecordingFile`) entity: one camera fragment.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-file state machine: `pending -> downloaded -> converted`, with
/// `download_failed`/`conversion_failed` as retry points, and `skipped` as an
/// absorbing state entered when `skip=true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Pending,
    Downloaded,
    Converted,
    DownloadFailed,
    ConversionFailed,
    Skipped,
}

impl FileStatus {
    pub fn is_failed(self) -> bool {
        matches!(self, FileStatus::DownloadFailed | FileStatus::ConversionFailed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingFile {
    pub file_path: PathBuf,
    /// Camera wall-clock start time, naive because the camera reports local
    /// time without an offset.
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub status: FileStatus,
    #[serde(default)]
    pub skip: bool,
    #[serde(default)]
    pub screenshot_path: Option<PathBuf>,
    /// The file's path as seen on the camera itself (for re-download after a
    /// `download_failed` retry).
    pub camera_path: String,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl RecordingFile {
    pub fn new(file_path: PathBuf, camera_path: String, start_time: NaiveDateTime, end_time: NaiveDateTime) -> Self {
        RecordingFile {
            file_path,
            start_time,
            end_time,
            status: FileStatus::Pending,
            skip: false,
            screenshot_path: None,
            camera_path,
            error_message: None,
            last_updated: Some(Utc::now()),
        }
    }

    pub fn mark(&mut self, status: FileStatus) {
        self.status = status;
        self.last_updated = Some(Utc::now());
    }

    pub fn fail(&mut self, status: FileStatus, message: impl Into<String>) {
        self.status = status;
        self.error_message = Some(message.into());
        self.last_updated = Some(Utc::now());
    }

    /// True if this file should be counted toward combine-readiness and the
    /// concat file list.
    pub fn participates_in_combine(&self) -> bool {
        !self.skip
    }
}
