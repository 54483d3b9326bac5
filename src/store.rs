// src/store.rs

//! On-disk record of last-execution instants.
//!
//! The backing store is a flat UTF-8 JSON document keyed by task name:
//!
//! ```json
//! {
//!   "heartbeat": { "last": "2024-03-07T12:30:45.123456Z" }
//! }
//! ```
//!
//! Only the `last` field is persisted; intervals, groups and callables are
//! re-supplied by registration calls at each process start. The document is
//! always rewritten wholesale, never patched incrementally.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{Result, SchedError};
use crate::timefmt;

/// One persisted record per task.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedEntry {
    last: String,
}

/// Load the persisted last-run map from `path`.
///
/// - Missing file: created containing an empty document, returns an empty map.
/// - Empty file: treated as an empty document.
/// - Unparsable content: surfaced as [`SchedError::Storage`] so corruption
///   halts startup instead of being silently masked.
pub fn load(path: &Path) -> Result<HashMap<String, DateTime<Utc>>> {
    if !path.exists() {
        info!(path = %path.display(), "state file missing; creating empty document");
        write_document(path, &HashMap::new())?;
        return Ok(HashMap::new());
    }

    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        debug!(path = %path.display(), "state file empty; treating as empty document");
        return Ok(HashMap::new());
    }

    let raw: HashMap<String, PersistedEntry> =
        serde_json::from_str(&contents).map_err(|err| {
            SchedError::Storage(format!(
                "unparsable state file {}: {err}",
                path.display()
            ))
        })?;

    let mut map = HashMap::with_capacity(raw.len());
    for (name, entry) in raw {
        let last = timefmt::decode_instant(&entry.last)?;
        map.insert(name, last);
    }

    debug!(path = %path.display(), entries = map.len(), "loaded persisted state");
    Ok(map)
}

/// Rewrite the whole document at `path` from the given `(name, last)` pairs.
///
/// Entries for tasks no longer registered are dropped implicitly, since the
/// document is reconstructed from scratch. The write goes to a sibling
/// temporary file first and is moved into place, so a concurrent reader never
/// observes a partially written document.
pub fn save<'a, I>(path: &Path, entries: I) -> Result<()>
where
    I: IntoIterator<Item = (&'a str, DateTime<Utc>)>,
{
    let mut document: HashMap<String, PersistedEntry> = HashMap::new();
    for (name, last) in entries {
        document.insert(
            name.to_string(),
            PersistedEntry {
                last: timefmt::encode_instant(last),
            },
        );
    }

    write_document(path, &document)?;
    debug!(path = %path.display(), entries = document.len(), "persisted state saved");
    Ok(())
}

fn write_document(path: &Path, document: &HashMap<String, PersistedEntry>) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_string_pretty(document).map_err(|err| {
        SchedError::Storage(format!(
            "serializing state document for {}: {err}",
            path.display()
        ))
    })?;

    let tmp_path = temp_sibling(path);
    {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(json.as_bytes())?;
        writer.flush()?;
    }
    fs::rename(&tmp_path, path)?;

    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "state".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_created_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let map = load(&path).unwrap();
        assert!(map.is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn empty_file_is_an_empty_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "").unwrap();

        assert!(load(&path).unwrap().is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let t1 = timefmt::decode_instant("2024-03-07T12:00:00.5Z").unwrap();
        let t2 = timefmt::decode_instant("2024-03-07T13:00:00Z").unwrap();
        save(&path, [("a", t1), ("b", t2)]).unwrap();

        let map = load(&path).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["a"], t1);
        assert_eq!(map["b"], t2);
    }

    #[test]
    fn save_drops_entries_absent_from_the_registry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let t = timefmt::now();
        save(&path, [("a", t), ("b", t)]).unwrap();
        save(&path, [("a", t)]).unwrap();

        let map = load(&path).unwrap();
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("a"));
    }

    #[test]
    fn corrupt_document_is_a_storage_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();

        let err = load(&path).unwrap_err();
        assert!(matches!(err, SchedError::Storage(_)));
    }

    #[test]
    fn malformed_timestamp_is_a_format_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{ "a": { "last": "yesterday" } }"#).unwrap();

        let err = load(&path).unwrap_err();
        assert!(matches!(err, SchedError::Format(_)));
    }
}
