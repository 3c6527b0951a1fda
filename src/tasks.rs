//! Task shapes for the three persisted work queues. Each queue file holds
//! a JSON array of task dicts discriminated by `task_type`; deserialization
//! dispatches on the tag and behavior lives in the worker's stage
//! functions, not in methods on the task type. This replaces the source
//! system's base-task-class-with-subclasses with a tagged union, per
//! SPEC_FULL.md's design notes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "task_type", rename_all = "snake_case")]
pub enum DownloadTask {
    DahuaDownload {
        group_dir: PathBuf,
        camera_path: String,
        file_path: PathBuf,
    },
}

impl DownloadTask {
    pub fn new(group_dir: PathBuf, camera_path: String, file_path: PathBuf) -> Self {
        DownloadTask::DahuaDownload {
            group_dir,
            camera_path,
            file_path,
        }
    }

    pub fn group_dir(&self) -> &PathBuf {
        let DownloadTask::DahuaDownload { group_dir, .. } = self;
        group_dir
    }

    pub fn camera_path(&self) -> &str {
        let DownloadTask::DahuaDownload { camera_path, .. } = self;
        camera_path
    }

    pub fn file_path(&self) -> &PathBuf {
        let DownloadTask::DahuaDownload { file_path, .. } = self;
        file_path
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "task_type", rename_all = "snake_case")]
pub enum VideoTask {
    Convert {
        group_dir: PathBuf,
        input_path: PathBuf,
        output_path: PathBuf,
    },
    Combine {
        group_dir: PathBuf,
    },
    Trim {
        group_dir: PathBuf,
    },
}

impl VideoTask {
    pub fn group_dir(&self) -> &PathBuf {
        match self {
            VideoTask::Convert { group_dir, .. } => group_dir,
            VideoTask::Combine { group_dir } => group_dir,
            VideoTask::Trim { group_dir } => group_dir,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadVariant {
    Raw,
    Trimmed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "task_type", rename_all = "snake_case")]
pub enum UploadTask {
    YoutubeUpload {
        group_dir: PathBuf,
        variant: UploadVariant,
        source_path: PathBuf,
    },
}

impl UploadTask {
    pub fn new(group_dir: PathBuf, variant: UploadVariant, source_path: PathBuf) -> Self {
        UploadTask::YoutubeUpload {
            group_dir,
            variant,
            source_path,
        }
    }

    pub fn group_dir(&self) -> &PathBuf {
        let UploadTask::YoutubeUpload { group_dir, .. } = self;
        group_dir
    }

    pub fn variant(&self) -> UploadVariant {
        let UploadTask::YoutubeUpload { variant, .. } = self;
        *variant
    }

    pub fn source_path(&self) -> &PathBuf {
        let UploadTask::YoutubeUpload { source_path, .. } = self;
        source_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_task_tags_round_trip() {
        let task = VideoTask::Combine {
            group_dir: PathBuf::from("/data/2024.05.01-10.00.00"),
        };
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("\"task_type\":\"combine\""));
        let back: VideoTask = serde_json::from_str(&json).unwrap();
        assert_eq!(back.group_dir(), task.group_dir());
    }

    #[test]
    fn download_task_tag_is_dahua_download() {
        let task = DownloadTask::new(
            PathBuf::from("/data/g"),
            "/mnt/dav/a.dav".into(),
            PathBuf::from("/data/g/a.dav"),
        );
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("\"task_type\":\"dahua_download\""));
    }

    #[test]
    fn upload_task_tag_is_youtube_upload() {
        let task = UploadTask::new(
            PathBuf::from("/data/g"),
            UploadVariant::Trimmed,
            PathBuf::from("/data/g/out.mp4"),
        );
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("\"task_type\":\"youtube_upload\""));
    }
}
