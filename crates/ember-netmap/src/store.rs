//! Durable snapshot storage for network maps.
//!
//! Snapshots are plain JSON files keyed by the map's timestamp. Writes
//! are atomic (write-temp-sync-rename) so a crash mid-write can never
//! leave a truncated snapshot behind.

use crate::error::Result;
use crate::map::NetworkMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SNAPSHOT_PREFIX: &str = "network-map-";
const SNAPSHOT_SUFFIX: &str = ".json";

/// Write `data` to `path` atomically: temp file in the same directory,
/// sync, then rename over the target.
pub fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    let mut file = File::create(&tmp)?;
    file.write_all(data)?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Snapshot store rooted at a data directory.
#[derive(Debug, Clone)]
pub struct MapStore {
    dir: PathBuf,
}

impl MapStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn snapshot_path(&self, timestamp: u64) -> PathBuf {
        self.dir
            .join(format!("{SNAPSHOT_PREFIX}{timestamp}{SNAPSHOT_SUFFIX}"))
    }

    /// Persist a map, keyed by its timestamp, and prune older snapshots.
    pub fn save(&self, map: &NetworkMap) -> Result<()> {
        let path = self.snapshot_path(map.timestamp);
        let data = serde_json::to_vec_pretty(map)?;
        write_atomic(&path, &data)?;
        debug!(path = %path.display(), "saved network map snapshot");
        self.prune_older_than(map.timestamp);
        Ok(())
    }

    /// Load the newest snapshot, if any exists and parses.
    pub fn load_latest(&self) -> Result<Option<NetworkMap>> {
        let Some((_, path)) = self.newest_snapshot()? else {
            return Ok(None);
        };
        let data = fs::read(&path)?;
        let map = serde_json::from_slice(&data)?;
        Ok(Some(map))
    }

    fn newest_snapshot(&self) -> Result<Option<(u64, PathBuf)>> {
        let mut newest: Option<(u64, PathBuf)> = None;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(ts) = parse_snapshot_timestamp(&name.to_string_lossy()) else {
                continue;
            };
            if newest.as_ref().map_or(true, |(best, _)| ts > *best) {
                newest = Some((ts, entry.path()));
            }
        }
        Ok(newest)
    }

    fn prune_older_than(&self, keep: u64) {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return;
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(ts) = parse_snapshot_timestamp(&name.to_string_lossy()) else {
                continue;
            };
            if ts < keep {
                if let Err(e) = fs::remove_file(entry.path()) {
                    warn!(error = %e, "failed to prune old snapshot");
                }
            }
        }
    }
}

fn parse_snapshot_timestamp(name: &str) -> Option<u64> {
    name.strip_prefix(SNAPSHOT_PREFIX)?
        .strip_suffix(SNAPSHOT_SUFFIX)?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Provenance;

    fn map(timestamp: u64) -> NetworkMap {
        let mut m = NetworkMap::degraded(timestamp);
        m.provenance = Provenance::Coordinator;
        m.active_nodes = 7;
        m
    }

    #[test]
    fn save_and_reload_latest() {
        let dir = tempfile::tempdir().unwrap();
        let store = MapStore::open(dir.path()).unwrap();

        assert!(store.load_latest().unwrap().is_none());

        store.save(&map(1000)).unwrap();
        store.save(&map(3000)).unwrap();

        let loaded = store.load_latest().unwrap().unwrap();
        assert_eq!(loaded.timestamp, 3000);
        assert_eq!(loaded.active_nodes, 7);
    }

    #[test]
    fn saving_newer_prunes_older() {
        let dir = tempfile::tempdir().unwrap();
        let store = MapStore::open(dir.path()).unwrap();

        store.save(&map(1000)).unwrap();
        store.save(&map(2000)).unwrap();

        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with(SNAPSHOT_PREFIX))
            .collect();
        assert_eq!(files, vec!["network-map-2000.json".to_string()]);
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_atomic(&path, b"{\"ok\":true}").unwrap();

        assert!(path.exists());
        assert!(!dir.path().join("out.json.tmp").exists());
        assert_eq!(std::fs::read(&path).unwrap(), b"{\"ok\":true}");
    }

    #[test]
    fn unrelated_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = MapStore::open(dir.path()).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"hi").unwrap();
        std::fs::write(dir.path().join("network-map-bogus.json"), b"{}").unwrap();

        assert!(store.load_latest().unwrap().is_none());
    }
}
