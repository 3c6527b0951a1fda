//! `process-with-ntfy <dir> [--force]`: a one-shot auxiliary command to
//! kick a single group directory through match-info collection outside the
//! daemon's regular audit cadence. Grounded on
//! `original_source/process_with_ntfy.py`, which does the same thing for
//! operator scripting/cron use.

use std::path::PathBuf;
use std::time::Duration;

use bpaf::Bpaf;
use tracing::{error, info};

use crate::cmds::build_capabilities;
use crate::config::Config;
use crate::state::ntfy_state::NtfyServiceState;
use crate::state::DirLocks;
use crate::state::MatchInfo;
use crate::workers::{notifier_queue, state_auditor, Context};

#[derive(Bpaf, Debug, Clone)]
#[bpaf(command("process-with-ntfy"))]
/// Force a round of match-info collection for one group directory.
pub struct Args {
    /// Path to config.ini.
    #[bpaf(long("config"), argument("PATH"), fallback(PathBuf::from("config.ini")))]
    config: PathBuf,

    /// Re-ask even if a question is already queued or sent for this group.
    #[bpaf(long("force"), switch)]
    force: bool,

    /// Group directory name under the storage root (or an absolute path).
    #[bpaf(positional("DIR"))]
    dir: String,
}

pub fn run(args: Args) -> Result<i32, base::Error> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| base::Error::wrap(base::ErrorKind::Internal, "starting tokio runtime", e))?;
    rt.block_on(run_async(args))
}

async fn run_async(args: Args) -> Result<i32, base::Error> {
    let config = match Config::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, path = %args.config.display(), "failed to load config");
            return Ok(1);
        }
    };
    let storage_root = config.storage_path.clone();

    let requested = PathBuf::from(&args.dir);
    let group_dir = if requested.is_absolute() { requested } else { storage_root.join(&requested) };
    if !group_dir.join("state.json").exists() {
        error!(dir = %group_dir.display(), "not a known group directory (no state.json)");
        return Ok(1);
    }
    let dir_key = group_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| group_dir.display().to_string());

    let capabilities = build_capabilities(&config, &storage_root);
    let Some(notifier) = capabilities.notifier.clone() else {
        error!("ntfy is not enabled in config.ini; nothing to dispatch");
        return Ok(1);
    };

    if args.force {
        let mut ntfy_state = NtfyServiceState::load(&storage_root)?;
        ntfy_state.pending_inputs.remove(&dir_key);
        ntfy_state.save(&storage_root)?;
    }

    let (_shutdown_tx, shutdown_rx) = base::shutdown::channel();
    let ctx = Context {
        config: std::sync::Arc::new(config),
        storage_root: storage_root.clone(),
        download_queue: crate::state::queue::PersistedQueue::open(crate::state::queue::queue_path(&storage_root, "download_queue_state.json")).await?,
        video_queue: crate::state::queue::PersistedQueue::open(crate::state::queue::queue_path(&storage_root, "video_queue_state.json")).await?,
        upload_queue: crate::state::queue::PersistedQueue::open(crate::state::queue::queue_path(&storage_root, "upload_queue_state.json")).await?,
        dir_locks: DirLocks::new(),
        camera: capabilities.camera,
        uploader: capabilities.uploader,
        schedule: capabilities.schedule,
        notifier: capabilities.notifier.clone(),
        shutdown: shutdown_rx,
    };

    let match_info = MatchInfo::load(&group_dir.join("match_info.ini"))?;
    state_auditor::request_match_info(&ctx, &group_dir, &match_info).await?;

    let mut recent_sent = Vec::new();
    notifier_queue::dispatch_pending(&ctx, notifier.as_ref(), &mut recent_sent).await?;

    info!(dir = %dir_key, "waiting for ntfy delivery to settle");
    tokio::time::sleep(Duration::from_secs(5)).await;

    Ok(0)
}
