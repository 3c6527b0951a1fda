//! Subcommand implementations. Each submodule exposes `args()` (a `bpaf`
//! parser fragment) and `run(Args) -> Result<i32, base::Error>`, following
//! the same shape as every subcommand in this binary.

pub mod process_with_ntfy;
pub mod run;

use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use crate::capabilities::camera::{Camera, DahuaCamera, FakeCamera};
use crate::capabilities::notifier::{Notifier, NtfyNotifier};
use crate::capabilities::schedule::{MatchSchedule, PlayMetricsSchedule, TeamSnapSchedule};
use crate::capabilities::uploader::{Uploader, YoutubeUploader};
use crate::config::Config;

/// Everything a worker set needs beyond config and storage paths. Built
/// once from `Config` at daemon startup and shared via `Arc`s.
pub struct Capabilities {
    pub camera: Arc<dyn Camera>,
    pub uploader: Option<Arc<dyn Uploader>>,
    pub schedule: Option<Arc<dyn MatchSchedule>>,
    pub notifier: Option<Arc<dyn Notifier>>,
}

pub fn build_capabilities(config: &Config, storage_root: &Path) -> Capabilities {
    let camera: Arc<dyn Camera> = if config.camera.camera_type.eq_ignore_ascii_case("fake") {
        Arc::new(FakeCamera::default())
    } else {
        Arc::new(DahuaCamera::new(
            config.camera.device_ip.clone(),
            config.camera.username.clone(),
            config.camera.password.clone(),
        ))
    };

    let uploader: Option<Arc<dyn Uploader>> = config.youtube.as_ref().filter(|y| y.enabled).and_then(|_| {
        load_youtube_access_token(storage_root).map(|token| Arc::new(YoutubeUploader::new(token)) as Arc<dyn Uploader>)
    });

    let schedule: Option<Arc<dyn MatchSchedule>> = if let Some(ts) = config.teamsnap.as_ref() {
        let teams = ts.teams.values().map(|t| (t.team_id.clone(), t.team_name.clone())).collect();
        Some(Arc::new(TeamSnapSchedule::new(ts.access_token.clone(), teams)))
    } else {
        config.playmetrics.as_ref().map(|pm| {
            let teams = pm.teams.values().map(|t| t.team_name.clone()).collect();
            Arc::new(PlayMetricsSchedule::new(pm.username.clone(), pm.password.clone(), teams)) as Arc<dyn MatchSchedule>
        })
    };

    let notifier: Option<Arc<dyn Notifier>> = config
        .ntfy
        .as_ref()
        .filter(|n| n.enabled)
        .map(|n| Arc::new(NtfyNotifier::new(n.server_url.clone(), n.topic.clone())) as Arc<dyn Notifier>);

    Capabilities {
        camera,
        uploader,
        schedule,
        notifier,
    }
}

/// YouTube's OAuth dance is an interactive, one-time setup step outside
/// this daemon's scope; it reads the access token a prior `login` left
/// behind at `<storage_root>/youtube/token.json`.
fn load_youtube_access_token(storage_root: &Path) -> Option<String> {
    let path = storage_root.join("youtube").join("token.json");
    let bytes = std::fs::read(&path).ok()?;
    let value: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    match value.get("access_token").and_then(|v| v.as_str()) {
        Some(token) => Some(token.to_owned()),
        None => {
            warn!(path = %path.display(), "youtube token.json missing access_token");
            None
        }
    }
}
