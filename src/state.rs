//! Durable tab→topic state.
//!
//! The only state that survives a restart is the tab↔topic mapping; pane
//! offsets are deliberately not persisted (a restart seeks to end-of-file
//! instead of replaying history). The file is one JSON object mapping
//! decimal tab-id strings to topic ids, read once at startup and fully
//! rewritten on every structural change.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::Result;

/// Reads and rewrites the durable tab→topic snapshot.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Creates a store backed by `path`. Nothing is touched until the
    /// first load or save.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Loads the persisted mapping. A missing or unreadable file is an
    /// empty mapping - the bridge rebuilds topics from live discovery.
    #[must_use]
    pub fn load(&self) -> HashMap<u64, i64> {
        let Ok(content) = fs::read_to_string(&self.path) else {
            return HashMap::new();
        };

        let raw: HashMap<String, i64> = match serde_json::from_str(&content) {
            Ok(map) => map,
            Err(e) => {
                log::warn!("[state] unreadable state file {}: {e}", self.path.display());
                return HashMap::new();
            }
        };

        raw.into_iter()
            .filter_map(|(tab, topic)| tab.parse::<u64>().ok().map(|id| (id, topic)))
            .collect()
    }

    /// Rewrites the whole snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error when the parent directory cannot be created or
    /// the file cannot be written.
    pub fn save(&self, mapping: &HashMap<u64, i64>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let raw: HashMap<String, i64> = mapping
            .iter()
            .map(|(tab, topic)| (tab.to_string(), *topic))
            .collect();
        fs::write(&self.path, serde_json::to_string(&raw)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = StateStore::new(tmp.path().join("state.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn round_trips_mapping() {
        let tmp = tempfile::tempdir().unwrap();
        let store = StateStore::new(tmp.path().join("nested/dir/state.json"));

        let mut mapping = HashMap::new();
        mapping.insert(3u64, 101i64);
        mapping.insert(7u64, 202i64);
        store.save(&mapping).unwrap();

        assert_eq!(store.load(), mapping);
    }

    #[test]
    fn keys_are_decimal_strings() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.json");
        let store = StateStore::new(path.clone());

        let mut mapping = HashMap::new();
        mapping.insert(12u64, 55i64);
        store.save(&mapping).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["12"], 55);
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.json");
        fs::write(&path, "not json at all").unwrap();

        let store = StateStore::new(path);
        assert!(store.load().is_empty());
    }
}
