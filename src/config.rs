//! `config.ini` loading. Mirrors the section layout of spec.md's CLI surface
//! table; unknown keys are ignored since `ini::Ini` only returns keys we
//! explicitly ask for. Grounded on the original Python loader
//! (`original_source/video_grouper/utils/config.py`), which is also
//! section-per-struct with per-team dotted sub-sections.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ini::Ini;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CameraConfig {
    pub camera_type: String,
    pub device_ip: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub check_interval_seconds: u64,
    pub timezone: Option<String>,
    pub update_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            check_interval_seconds: 60,
            timezone: None,
            update_url: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    pub max_concurrent_downloads: u32,
    pub max_concurrent_conversions: u32,
    pub retry_attempts: u32,
    pub retry_delay_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        ProcessingConfig {
            max_concurrent_downloads: 1,
            max_concurrent_conversions: 1,
            retry_attempts: 3,
            retry_delay_secs: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TeamSnapTeam {
    pub team_id: String,
    pub team_name: String,
}

#[derive(Debug, Clone)]
pub struct TeamSnapConfig {
    pub client_id: String,
    pub client_secret: String,
    pub access_token: String,
    pub teams: HashMap<String, TeamSnapTeam>,
}

#[derive(Debug, Clone)]
pub struct PlayMetricsTeam {
    pub team_name: String,
}

#[derive(Debug, Clone)]
pub struct PlayMetricsConfig {
    pub username: String,
    pub password: String,
    pub teams: HashMap<String, PlayMetricsTeam>,
}

#[derive(Debug, Clone)]
pub struct NtfyConfig {
    pub enabled: bool,
    pub server_url: String,
    pub topic: String,
}

#[derive(Debug, Clone, Default)]
pub struct YoutubeConfig {
    pub enabled: bool,
    pub privacy_status: String,
    pub playlist_map: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct CloudSyncConfig {
    pub enabled: bool,
    pub endpoint_url: Option<String>,
    pub username: String,
    pub password: String,
    /// PEM-encoded RSA public key used to wrap the per-upload AES key.
    /// Cloud sync is skipped (logged, not an error) when this is absent.
    pub public_key_pem: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub camera: CameraConfig,
    pub storage_path: PathBuf,
    pub app: AppConfig,
    pub processing: ProcessingConfig,
    pub teamsnap: Option<TeamSnapConfig>,
    pub playmetrics: Option<PlayMetricsConfig>,
    pub ntfy: Option<NtfyConfig>,
    pub youtube: Option<YoutubeConfig>,
    pub cloud_sync: Option<CloudSyncConfig>,
}

fn get(ini: &Ini, section: &str, key: &str) -> Option<String> {
    ini.section(Some(section))?.get(key).map(str::to_owned)
}

fn get_or(ini: &Ini, section: &str, key: &str, default: &str) -> String {
    get(ini, section, key).unwrap_or_else(|| default.to_owned())
}

fn get_bool(ini: &Ini, section: &str, key: &str, default: bool) -> bool {
    get(ini, section, key)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn get_u64(ini: &Ini, section: &str, key: &str, default: u64) -> u64 {
    get(ini, section, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn get_u32(ini: &Ini, section: &str, key: &str, default: u32) -> u32 {
    get(ini, section, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Per-team sub-sections look like `[TEAMSNAP.myteam]`; collect them keyed by
/// the part after the dot.
fn team_sub_sections<'a>(ini: &'a Ini, prefix: &str) -> Vec<(&'a str, &'a ini::Properties)> {
    ini.iter()
        .filter_map(|(name, props)| {
            let name = name?;
            let suffix = name.strip_prefix(prefix)?.strip_prefix('.')?;
            Some((suffix, props))
        })
        .collect()
}

impl Config {
    pub fn load(path: &Path) -> Result<Config> {
        let mut ini = Ini::load_from_file(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        let camera = CameraConfig {
            camera_type: get_or(&ini, "CAMERA", "type", "dahua"),
            device_ip: get_or(&ini, "CAMERA", "device_ip", ""),
            username: get_or(&ini, "CAMERA", "username", ""),
            password: get_or(&ini, "CAMERA", "password", ""),
        };

        let storage_path = PathBuf::from(get_or(&ini, "STORAGE", "path", "."));

        let app = AppConfig {
            check_interval_seconds: get_u64(&ini, "APP", "check_interval_seconds", 60),
            timezone: get(&ini, "APP", "timezone"),
            update_url: get(&ini, "APP", "update_url"),
        };

        let processing = ProcessingConfig {
            max_concurrent_downloads: get_u32(&ini, "PROCESSING", "max_concurrent_downloads", 1),
            max_concurrent_conversions: get_u32(&ini, "PROCESSING", "max_concurrent_conversions", 1),
            retry_attempts: get_u32(&ini, "PROCESSING", "retry_attempts", 3),
            retry_delay_secs: get_u64(&ini, "PROCESSING", "retry_delay", 5),
        };

        let teamsnap = ini.section(Some("TEAMSNAP")).map(|props| TeamSnapConfig {
            client_id: props.get("client_id").unwrap_or("").to_owned(),
            client_secret: props.get("client_secret").unwrap_or("").to_owned(),
            access_token: props.get("access_token").unwrap_or("").to_owned(),
            teams: team_sub_sections(&ini, "TEAMSNAP")
                .into_iter()
                .map(|(name, props)| {
                    (
                        name.to_owned(),
                        TeamSnapTeam {
                            team_id: props.get("team_id").unwrap_or("").to_owned(),
                            team_name: props.get("team_name").unwrap_or(name).to_owned(),
                        },
                    )
                })
                .collect(),
        });

        let playmetrics = ini.section(Some("PLAYMETRICS")).map(|props| PlayMetricsConfig {
            username: props.get("username").unwrap_or("").to_owned(),
            password: props.get("password").unwrap_or("").to_owned(),
            teams: team_sub_sections(&ini, "PLAYMETRICS")
                .into_iter()
                .map(|(name, props)| {
                    (
                        name.to_owned(),
                        PlayMetricsTeam {
                            team_name: props.get("team_name").unwrap_or(name).to_owned(),
                        },
                    )
                })
                .collect(),
        });

        let ntfy = if get_bool(&ini, "NTFY", "enabled", false) {
            let topic = match get(&ini, "NTFY", "topic") {
                Some(t) if !t.is_empty() => t,
                _ => {
                    let generated = format!("camera-pipeline-{}", Uuid::new_v4());
                    ini.with_section(Some("NTFY")).set("topic", &generated);
                    ini.write_to_file(path)
                        .with_context(|| format!("persisting generated ntfy topic to {}", path.display()))?;
                    generated
                }
            };
            Some(NtfyConfig {
                enabled: true,
                server_url: get_or(&ini, "NTFY", "server_url", "https://ntfy.sh"),
                topic,
            })
        } else {
            None
        };

        let youtube = if ini.section(Some("YOUTUBE")).is_some() {
            let mut playlist_map = HashMap::new();
            if let Some(props) = ini.section(Some("YOUTUBE.PLAYLIST_MAP")) {
                for (k, v) in props.iter() {
                    playlist_map.insert(k.to_owned(), v.to_owned());
                }
            }
            Some(YoutubeConfig {
                enabled: get_bool(&ini, "YOUTUBE", "enabled", false),
                privacy_status: get_or(&ini, "YOUTUBE", "privacy_status", "private"),
                playlist_map,
            })
        } else {
            None
        };

        let cloud_sync = ini.section(Some("CLOUD_SYNC")).map(|_| CloudSyncConfig {
            enabled: get_bool(&ini, "CLOUD_SYNC", "enabled", false),
            endpoint_url: get(&ini, "CLOUD_SYNC", "endpoint_url"),
            username: get_or(&ini, "CLOUD_SYNC", "username", ""),
            password: get_or(&ini, "CLOUD_SYNC", "password", ""),
            public_key_pem: get(&ini, "CLOUD_SYNC", "public_key_pem"),
        });

        Ok(Config {
            camera,
            storage_path,
            app,
            processing,
            teamsnap,
            playmetrics,
            ntfy,
            youtube,
            cloud_sync,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn loads_minimal_config() {
        let f = write_config(
            "[CAMERA]\ntype = dahua\ndevice_ip = 10.0.0.5\nusername = admin\npassword = secret\n\n\
             [STORAGE]\npath = /data/recordings\n",
        );
        let cfg = Config::load(f.path()).unwrap();
        assert_eq!(cfg.camera.device_ip, "10.0.0.5");
        assert_eq!(cfg.storage_path, PathBuf::from("/data/recordings"));
        assert_eq!(cfg.app.check_interval_seconds, 60);
    }

    #[test]
    fn parses_per_team_teamsnap_sections() {
        let f = write_config(
            "[CAMERA]\n[STORAGE]\npath = .\n\n\
             [TEAMSNAP]\nclient_id = abc\nclient_secret = def\naccess_token = ghi\n\n\
             [TEAMSNAP.U10 Red]\nteam_id = 555\nteam_name = U10 Red\n",
        );
        let cfg = Config::load(f.path()).unwrap();
        let ts = cfg.teamsnap.unwrap();
        assert_eq!(ts.teams.get("U10 Red").unwrap().team_id, "555");
    }

    #[test]
    fn parses_youtube_playlist_map() {
        let f = write_config(
            "[CAMERA]\n[STORAGE]\npath = .\n\n\
             [YOUTUBE]\nenabled = true\nprivacy_status = unlisted\n\n\
             [YOUTUBE.PLAYLIST_MAP]\nU10 Red = U10 Red 2024\n",
        );
        let cfg = Config::load(f.path()).unwrap();
        let yt = cfg.youtube.unwrap();
        assert_eq!(yt.playlist_map.get("U10 Red").unwrap(), "U10 Red 2024");
    }
}
