//! `match_info.ini`: human-or-API-populated per-group metadata.

use std::path::Path;

use anyhow::{Context, Result};
use ini::Ini;

use crate::capabilities::schedule::Game;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchInfo {
    pub my_team_name: String,
    pub opponent_team_name: String,
    pub location: String,
    pub start_time_offset: String,
    pub total_duration: String,
}

impl MatchInfo {
    /// Populated iff the first four fields named in spec.md are non-empty.
    pub fn is_populated(&self) -> bool {
        !self.my_team_name.is_empty()
            && !self.opponent_team_name.is_empty()
            && !self.location.is_empty()
            && !self.start_time_offset.is_empty()
    }

    pub fn load(path: &Path) -> Result<MatchInfo> {
        if !path.exists() {
            return Ok(MatchInfo::default());
        }
        let ini = Ini::load_from_file(path)
            .with_context(|| format!("reading match info {}", path.display()))?;
        let section = ini.section(Some("MATCH"));
        let get = |key: &str| {
            section
                .and_then(|s| s.get(key))
                .unwrap_or("")
                .to_owned()
        };
        Ok(MatchInfo {
            my_team_name: get("my_team_name"),
            opponent_team_name: get("opponent_team_name"),
            location: get("location"),
            start_time_offset: get("start_time_offset"),
            total_duration: get("total_duration"),
        })
    }

    /// Writes an empty `[MATCH]` template if the file does not already
    /// exist; never touches an existing file.
    pub fn ensure_template(path: &Path) -> Result<()> {
        if path.exists() {
            return Ok(());
        }
        let mut ini = Ini::new();
        ini.with_section(Some("MATCH"))
            .set("my_team_name", "")
            .set("opponent_team_name", "")
            .set("location", "")
            .set("start_time_offset", "")
            .set("total_duration", "");
        ini.write_to_file(path)
            .with_context(|| format!("writing match info template {}", path.display()))
    }

    /// Merges `update` into the file on disk, filling only fields that are
    /// currently empty. Per the spec's resolved open question: never
    /// overwrite a populated field.
    pub fn merge_fill_empty(path: &Path, update: &MatchInfo) -> Result<MatchInfo> {
        let mut current = MatchInfo::load(path)?;
        if current.my_team_name.is_empty() {
            current.my_team_name = update.my_team_name.clone();
        }
        if current.opponent_team_name.is_empty() {
            current.opponent_team_name = update.opponent_team_name.clone();
        }
        if current.location.is_empty() {
            current.location = update.location.clone();
        }
        if current.start_time_offset.is_empty() {
            current.start_time_offset = update.start_time_offset.clone();
        }
        if current.total_duration.is_empty() {
            current.total_duration = update.total_duration.clone();
        }
        current.save(path)?;
        Ok(current)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut ini = Ini::new();
        ini.with_section(Some("MATCH"))
            .set("my_team_name", &self.my_team_name)
            .set("opponent_team_name", &self.opponent_team_name)
            .set("location", &self.location)
            .set("start_time_offset", &self.start_time_offset)
            .set("total_duration", &self.total_duration);
        ini.write_to_file(path)
            .with_context(|| format!("writing match info {}", path.display()))
    }

    /// Parses `total_duration` as seconds; unparseable values default to 90
    /// minutes per spec's boundary cases.
    pub fn total_duration_seconds(&self) -> i64 {
        base::duration::parse_hms_seconds(&self.total_duration).unwrap_or(90 * 60)
    }

    pub fn start_time_offset_seconds(&self) -> Option<i64> {
        base::duration::parse_hms_seconds(&self.start_time_offset)
    }

    /// Fills team names and location from a schedule-provider match, leaving
    /// `start_time_offset`/`total_duration` for the NTFY flow: the provider
    /// knows who played and where, not where kickoff lands in this
    /// recording.
    pub fn enrich_from_schedule(path: &Path, game: &Game) -> Result<MatchInfo> {
        let update = MatchInfo {
            my_team_name: game.my_team_name.clone(),
            opponent_team_name: game.opponent_team_name.clone(),
            location: game.location.clone(),
            start_time_offset: String::new(),
            total_duration: String::new(),
        };
        MatchInfo::merge_fill_empty(path, &update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enrich_from_schedule_fills_team_fields_but_not_start_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("match_info.ini");
        let game = Game {
            my_team_name: "U10 Red".into(),
            opponent_team_name: "U10 Blue".into(),
            location: "Field 3".into(),
            start_time: None,
            source: "teamsnap".into(),
        };
        let merged = MatchInfo::enrich_from_schedule(&path, &game).unwrap();
        assert_eq!(merged.my_team_name, "U10 Red");
        assert_eq!(merged.opponent_team_name, "U10 Blue");
        assert_eq!(merged.location, "Field 3");
        assert!(merged.start_time_offset.is_empty());
    }

    #[test]
    fn default_is_not_populated() {
        assert!(!MatchInfo::default().is_populated());
    }

    #[test]
    fn populated_requires_first_four_fields() {
        let mi = MatchInfo {
            my_team_name: "A".into(),
            opponent_team_name: "B".into(),
            location: "Field 1".into(),
            start_time_offset: "00:05:00".into(),
            total_duration: "".into(),
        };
        assert!(mi.is_populated());
    }

    #[test]
    fn merge_never_overwrites_populated_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("match_info.ini");
        let existing = MatchInfo {
            my_team_name: "Existing Team".into(),
            opponent_team_name: "".into(),
            location: "".into(),
            start_time_offset: "".into(),
            total_duration: "".into(),
        };
        existing.save(&path).unwrap();

        let update = MatchInfo {
            my_team_name: "Should Not Win".into(),
            opponent_team_name: "Opponent".into(),
            location: "Field 2".into(),
            start_time_offset: "".into(),
            total_duration: "".into(),
        };
        let merged = MatchInfo::merge_fill_empty(&path, &update).unwrap();
        assert_eq!(merged.my_team_name, "Existing Team");
        assert_eq!(merged.opponent_team_name, "Opponent");
        assert_eq!(merged.location, "Field 2");
    }

    #[test]
    fn unparseable_duration_defaults_to_90_minutes() {
        let mi = MatchInfo {
            total_duration: "garbage".into(),
            ..Default::default()
        };
        assert_eq!(mi.total_duration_seconds(), 90 * 60);
    }
}
