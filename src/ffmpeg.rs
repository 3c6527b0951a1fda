//! ffmpeg/ffprobe subprocess wrappers. The source project shells out to the
//! ffmpeg CLI rather than binding libav*; that stays true here too — unlike
//! the teacher's direct `moonfire-ffmpeg` bindings, there's no need for
//! frame-accurate control, just convert/concat/trim, so the simpler
//! subprocess boundary is kept.

use std::path::{Path, PathBuf};

use base::{Error, ErrorKind};
use tokio::process::Command;
use tracing::{debug, warn};

async fn run(mut cmd: Command, description: &str) -> Result<(), Error> {
    debug!(%description, "running ffmpeg command");
    let output = cmd
        .output()
        .await
        .map_err(|e| Error::wrap(ErrorKind::Internal, format!("spawning {description}"), e))?;
    if !output.status.success() {
        warn!(
            %description,
            status = %output.status,
            stderr = %String::from_utf8_lossy(&output.stderr),
            "ffmpeg command failed"
        );
        return Err(Error::new(
            ErrorKind::Internal,
            format!("{description} exited with {}", output.status),
        ));
    }
    Ok(())
}

/// Convert one `.dav` fragment to `.mp4`: video stream copied, audio
/// transcoded to AAC.
pub async fn convert(input: &Path, output: &Path) -> Result<(), Error> {
    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-y")
        .arg("-i")
        .arg(input)
        .args(["-c:v", "copy", "-c:a", "aac", "-b:a", "192k"])
        .arg(output);
    run(cmd, &format!("convert {}", input.display())).await
}

/// Concatenates `inputs` (already in the desired order) into `output` via
/// the concat demuxer, using a transient file list that's always removed on
/// exit regardless of whether the command succeeded.
pub async fn combine(inputs: &[PathBuf], output: &Path, group_dir: &Path) -> Result<(), Error> {
    let list_path = group_dir.join(format!(".concat-{}.txt", std::process::id()));
    let list_contents: String = inputs
        .iter()
        .map(|p| format!("file '{}'\n", p.display()))
        .collect();
    tokio::fs::write(&list_path, list_contents)
        .await
        .map_err(|e| Error::wrap(ErrorKind::Internal, format!("writing {}", list_path.display()), e))?;

    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-y")
        .args(["-f", "concat", "-safe", "0"])
        .arg("-i")
        .arg(&list_path)
        .args(["-c", "copy"])
        .arg(output);
    let result = run(cmd, &format!("combine into {}", output.display())).await;
    let _ = tokio::fs::remove_file(&list_path).await;
    result
}

/// Trims `input` to `[start, end]` (both `HH:MM:SS`) without re-encoding.
pub async fn trim(input: &Path, output: &Path, start: &str, end: &str) -> Result<(), Error> {
    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-y")
        .arg("-i")
        .arg(input)
        .args(["-ss", start, "-to", end, "-c", "copy"])
        .arg(output);
    run(cmd, &format!("trim {}", input.display())).await
}

/// A single JPEG screenshot at `offset_seconds` into `input`.
pub async fn screenshot(input: &Path, output: &Path, offset_seconds: i64) -> Result<(), Error> {
    let offset = base::duration::format_hms(offset_seconds);
    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-y")
        .args(["-ss", &offset])
        .arg("-i")
        .arg(input)
        .args(["-vframes", "1", "-q:v", "2"])
        .arg(output);
    run(cmd, &format!("screenshot {}", input.display())).await
}

/// Runs `ffprobe` and returns the reported duration in seconds, or `None`
/// if ffprobe failed or returned a non-positive duration.
pub async fn probe_duration_seconds(path: &Path) -> Option<f64> {
    let output = Command::new("ffprobe")
        .args(["-v", "error", "-show_entries", "format=duration"])
        .args(["-of", "default=noprint_wrappers=1:nokey=1"])
        .arg(path)
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let duration: f64 = String::from_utf8_lossy(&output.stdout).trim().parse().ok()?;
    if duration > 0.0 {
        Some(duration)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn combine_always_removes_transient_list_even_on_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = vec![dir.path().join("a.mp4"), dir.path().join("b.mp4")];
        let output = dir.path().join("combined.mp4");
        // ffmpeg is not guaranteed present in this test environment; we
        // only assert the transient list is cleaned up either way.
        let _ = combine(&inputs, &output, dir.path()).await;
        let leftover = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .any(|e| e.file_name().to_string_lossy().starts_with(".concat-"));
        assert!(!leftover);
    }
}
