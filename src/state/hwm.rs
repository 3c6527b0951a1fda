//! `latest_video.txt`: the high-water mark past which the CameraPoller never
//! re-considers already-grouped fragments. Monotonic forward-only — a read
//! followed by an advance never moves the mark backward, even if the
//! caller computes an earlier candidate (e.g. from a clock skew).

use std::path::Path;

use base::{Error, ErrorKind};
use chrono::NaiveDateTime;

pub const HWM_FILE_NAME: &str = "latest_video.txt";

const HWM_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn read(storage_root: &Path) -> Result<Option<NaiveDateTime>, Error> {
    let path = storage_root.join(HWM_FILE_NAME);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)
        .map_err(|e| Error::wrap(ErrorKind::Internal, format!("reading {}", path.display()), Box::new(e)))?;
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    NaiveDateTime::parse_from_str(trimmed, HWM_FORMAT)
        .map(Some)
        .map_err(|e| Error::wrap(ErrorKind::Internal, format!("parsing {}", path.display()), Box::new(e)))
}

/// Advances the high-water mark to `candidate` iff it's strictly newer than
/// what's currently on disk.
pub fn advance(storage_root: &Path, candidate: NaiveDateTime) -> Result<(), Error> {
    let current = read(storage_root)?;
    if current.is_some_and(|c| c >= candidate) {
        return Ok(());
    }
    let path = storage_root.join(HWM_FILE_NAME);
    let tmp = storage_root.join(format!("{HWM_FILE_NAME}.tmp"));
    std::fs::write(&tmp, candidate.format(HWM_FORMAT).to_string())
        .map_err(|e| Error::wrap(ErrorKind::Internal, format!("writing {}", tmp.display()), Box::new(e)))?;
    std::fs::rename(&tmp, &path)
        .map_err(|e| Error::wrap(ErrorKind::Internal, format!("renaming into {}", path.display()), Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn absent_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read(dir.path()).unwrap(), None);
    }

    #[test]
    fn advance_moves_mark_forward() {
        let dir = tempfile::tempdir().unwrap();
        advance(dir.path(), dt(10, 0, 0)).unwrap();
        assert_eq!(read(dir.path()).unwrap(), Some(dt(10, 0, 0)));
    }

    #[test]
    fn advance_never_moves_backward() {
        let dir = tempfile::tempdir().unwrap();
        advance(dir.path(), dt(12, 0, 0)).unwrap();
        advance(dir.path(), dt(9, 0, 0)).unwrap();
        assert_eq!(read(dir.path()).unwrap(), Some(dt(12, 0, 0)));
    }

    #[test]
    fn advance_to_equal_mark_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        advance(dir.path(), dt(12, 0, 0)).unwrap();
        advance(dir.path(), dt(12, 0, 0)).unwrap();
        assert_eq!(read(dir.path()).unwrap(), Some(dt(12, 0, 0)));
    }
}
