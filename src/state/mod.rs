//! All on-disk state: the filesystem *is* the database. Every type here
//! maps directly to one of the JSON/INI files laid out in SPEC_FULL.md's
//! storage layout.

pub mod dirlock;
pub mod file;
pub mod group;
pub mod hwm;
pub mod match_info;
pub mod ntfy_state;
pub mod queue;

pub use dirlock::DirLocks;
pub use file::{FileStatus, RecordingFile};
pub use group::{DirectoryState, GroupStatus};
pub use match_info::MatchInfo;
pub use ntfy_state::{NtfyServiceState, TaskKind, TaskMetadata, TaskStatus};
pub use queue::PersistedQueue;
