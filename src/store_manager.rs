use crate::config::Config;
use crate::event_log;
use crate::storage::{CmdEvent, Selection};
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const SELECTION_PREFIX: &str = "selection-";
const SELECTION_SUFFIX: &str = ".json";

/// Knows where the events log and saved selections live.
pub struct StoreManager {
    events_path: PathBuf,
    state_dir: PathBuf,
}

impl StoreManager {
    pub fn new_with_config(config: &Config) -> Result<Self> {
        let base_dir = Config::base_dir();
        fs::create_dir_all(&base_dir)
            .with_context(|| format!("failed to create {}", base_dir.display()))?;

        Ok(Self::with_paths(
            config.effective_events_path(&base_dir),
            config.effective_state_dir(&base_dir),
        ))
    }

    pub fn with_paths(events_path: PathBuf, state_dir: PathBuf) -> Self {
        Self { events_path, state_dir }
    }

    pub fn events_path(&self) -> &Path {
        &self.events_path
    }

    pub fn append_event(&self, event: &CmdEvent) -> Result<()> {
        event_log::append_event(&self.events_path, event)
    }

    /// All recorded events; a log that was never written reads as empty.
    pub fn load_events(&self) -> Result<Vec<CmdEvent>> {
        event_log::read_events_or_empty(&self.events_path)
    }

    fn selection_path(&self, id: &str) -> PathBuf {
        self.state_dir
            .join(format!("{}{}{}", SELECTION_PREFIX, id, SELECTION_SUFFIX))
    }

    /// Persist a selection as pretty JSON, atomically replacing the target.
    pub fn save_selection(&self, selection: &Selection) -> Result<PathBuf> {
        fs::create_dir_all(&self.state_dir)
            .with_context(|| format!("failed to create state dir {}", self.state_dir.display()))?;

        let path = self.selection_path(&selection.id);
        let mut tmp = NamedTempFile::new_in(&self.state_dir)
            .context("failed to create temporary selection file")?;
        serde_json::to_writer_pretty(&mut tmp, selection).context("failed to encode selection")?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path)
            .with_context(|| format!("failed to save selection {}", path.display()))?;

        Ok(path)
    }

    /// Resolve `reference` to a selection file: `None` is the newest one, a
    /// bare id lives in the state dir, anything else is taken as a path.
    pub fn resolve_selection_path(&self, reference: Option<&str>) -> Result<PathBuf> {
        match reference {
            None => self.find_most_recent_selection(),
            Some(r) => {
                let as_path = Path::new(r);
                if as_path.is_absolute() || r.contains(std::path::MAIN_SEPARATOR) || r.contains('/') {
                    Ok(as_path.to_path_buf())
                } else {
                    Ok(self.selection_path(r))
                }
            }
        }
    }

    pub fn load_selection(&self, reference: Option<&str>) -> Result<Selection> {
        let path = self.resolve_selection_path(reference)?;
        let file = fs::File::open(&path)
            .with_context(|| format!("failed to open selection file {}", path.display()))?;
        let selection = serde_json::from_reader(file)
            .with_context(|| format!("failed to decode selection file {}", path.display()))?;
        Ok(selection)
    }

    fn find_most_recent_selection(&self) -> Result<PathBuf> {
        let entries = fs::read_dir(&self.state_dir)
            .with_context(|| format!("failed to read state dir {}", self.state_dir.display()))?;

        let mut newest: Option<String> = None;
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(SELECTION_PREFIX) && name.ends_with(SELECTION_SUFFIX) {
                // Ids are zero-padded timestamps, so name order is time order
                if newest.as_deref().map_or(true, |n| name.as_str() > n) {
                    newest = Some(name);
                }
            }
        }

        newest
            .map(|name| self.state_dir.join(name))
            .ok_or_else(|| anyhow!("no selections found in {}", self.state_dir.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ScopeKind;

    fn store(dir: &Path) -> StoreManager {
        StoreManager::with_paths(dir.join("events.jsonl"), dir.join("state"))
    }

    fn selection(id: &str, cmds: &[&str]) -> Selection {
        Selection {
            id: id.to_string(),
            created_at: "2024-06-01T12:00:00Z".to_string(),
            scope: ScopeKind::Global,
            repo_root: String::new(),
            items: cmds
                .iter()
                .map(|c| CmdEvent { cmd: c.to_string(), ..CmdEvent::default() })
                .collect(),
        }
    }

    #[test]
    fn save_and_load_by_id_and_path() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = store(dir.path());
        let saved = selection("20240601-120000", &["make", "make test"]);

        let path = store.save_selection(&saved)?;
        assert_eq!(path, dir.path().join("state").join("selection-20240601-120000.json"));

        assert_eq!(store.load_selection(Some("20240601-120000"))?, saved);
        let path_str = path.to_string_lossy().into_owned();
        assert_eq!(store.load_selection(Some(path_str.as_str()))?, saved);
        Ok(())
    }

    #[test]
    fn newest_selection_wins_when_no_reference() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = store(dir.path());
        store.save_selection(&selection("20240102-090000", &["old"]))?;
        store.save_selection(&selection("20240315-180000", &["new"]))?;
        store.save_selection(&selection("20231231-235959", &["older"]))?;
        fs::write(dir.path().join("state").join("notes.txt"), "ignore me")?;

        let latest = store.load_selection(None)?;
        assert_eq!(latest.id, "20240315-180000");
        assert_eq!(latest.items[0].cmd, "new");
        Ok(())
    }

    #[test]
    fn no_selections_is_an_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = store(dir.path());
        fs::create_dir_all(dir.path().join("state"))?;

        let err = store.load_selection(None).unwrap_err();
        assert!(err.to_string().contains("no selections found"));
        assert!(store.load_selection(Some("19990101-000000")).is_err());
        Ok(())
    }

    #[test]
    fn events_round_trip_through_store() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = store(dir.path());
        assert!(store.load_events()?.is_empty());

        store.append_event(&CmdEvent { cmd: "cargo fmt".to_string(), ..CmdEvent::default() })?;
        let events = store.load_events()?;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].cmd, "cargo fmt");
        assert_eq!(store.events_path(), dir.path().join("events.jsonl"));
        Ok(())
    }
}
