use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::snapshot::Snapshot;

/// Where Vesslo writes its export, relative to the user's home.
const DATA_RELATIVE_PATH: &str = "Library/Application Support/Vesslo/raycast_data.json";

/// Result of one poll tick.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome
{
    /// The file carries a new export token; swap this snapshot in.
    Changed(Snapshot),
    /// Same token as last time; nothing to re-render.
    Unchanged,
    /// Missing or unreadable file; callers keep whatever they hold.
    Absent,
}

/// Reader side of Vesslo's snapshot file. Vesslo owns and rewrites the
/// file; this store only reads it, and owns the change-detection token.
pub struct SnapshotStore
{
    data_path: PathBuf,
    last_token: Option<String>,
}

impl SnapshotStore
{
    pub fn new(data_path: PathBuf) -> Self
    {
        Self {
            data_path,
            last_token: None,
        }
    }

    /// Create a store from the environment. VESSLO_DATA_PATH overrides
    /// the default per-user application-support location.
    pub fn from_env() -> Self
    {
        let data_path = match std::env::var_os("VESSLO_DATA_PATH")
        {
            Some(path) => PathBuf::from(path),
            None => default_data_path(),
        };
        Self::new(data_path)
    }

    pub fn data_path(&self) -> &Path
    {
        &self.data_path
    }

    /// Load and validate the snapshot file.
    ///
    /// Total: a missing file, unreadable bytes, malformed JSON and a
    /// wrong top-level shape all collapse to None, with the reason
    /// logged. Never panics, never returns an error to the caller.
    pub fn load(&self) -> Option<Snapshot>
    {
        if !self.data_path.exists()
        {
            debug!(path = %self.data_path.display(), "snapshot file not found");
            return None;
        }

        let content = match std::fs::read_to_string(&self.data_path)
        {
            Ok(content) => content,
            Err(e) =>
            {
                warn!("failed to read snapshot file: {}", e);
                return None;
            }
        };

        // Two stages so a torn mid-write read (invalid JSON) logs
        // differently from a well-formed file with the wrong shape.
        let value: serde_json::Value = match serde_json::from_str(&content)
        {
            Ok(value) => value,
            Err(e) =>
            {
                warn!("snapshot is not valid JSON: {}", e);
                return None;
            }
        };

        match serde_json::from_value::<Snapshot>(value)
        {
            Ok(snapshot) => Some(snapshot),
            Err(e) =>
            {
                warn!("snapshot has unexpected shape: {}", e);
                None
            }
        }
    }

    /// One poll tick: reload and compare the export token against the
    /// last one seen. The token is the only change signal; content edits
    /// under an unchanged token go undetected, as Vesslo's writer
    /// contract promises a new token per export.
    ///
    /// A failed read keeps the token, so a recovered-but-identical file
    /// still reads as Unchanged on the next tick.
    pub fn poll(&mut self) -> PollOutcome
    {
        let snapshot = match self.load()
        {
            Some(snapshot) => snapshot,
            None => return PollOutcome::Absent,
        };

        if self.last_token.as_deref() == Some(snapshot.exported_at.as_str())
        {
            return PollOutcome::Unchanged;
        }

        self.last_token = Some(snapshot.exported_at.clone());
        PollOutcome::Changed(snapshot)
    }

    /// Unconditional fresh ingestion, used right after an update action
    /// so the view need not wait out a poll interval. Updates the token.
    pub fn reload(&mut self) -> Option<Snapshot>
    {
        let snapshot = self.load()?;
        self.last_token = Some(snapshot.exported_at.clone());
        Some(snapshot)
    }
}

/// `$HOME/Library/Application Support/Vesslo/raycast_data.json`
fn default_data_path() -> PathBuf
{
    let home = std::env::var_os("HOME").map(PathBuf::from)
                                       .unwrap_or_else(|| PathBuf::from("/"));
    home.join(DATA_RELATIVE_PATH)
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::snapshot::AppRecord;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> SnapshotStore
    {
        SnapshotStore::new(dir.path().join("raycast_data.json"))
    }

    fn write_data(store: &SnapshotStore,
                  content: &str)
    {
        std::fs::write(store.data_path(), content).unwrap();
    }

    #[test]
    fn missing_file_is_absent()
    {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);

        assert_eq!(store.load(), None);
        assert_eq!(store.poll(), PollOutcome::Absent);
    }

    #[test]
    fn empty_apps_is_a_valid_snapshot_not_absence()
    {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        write_data(&store, r#"{"exportedAt":"2024-06-01T10:00:00Z","apps":[]}"#);

        let snapshot = store.load().unwrap();
        assert_eq!(snapshot.apps.len(), 0);
    }

    #[test]
    fn invalid_json_and_wrong_shapes_are_absent()
    {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        for content in ["{\"apps\": [trunc", "null", "[]", r#"{"apps": 3}"#, r#"{"exportedAt":"x"}"#]
        {
            write_data(&store, content);
            assert_eq!(store.load(), None, "content {:?} should not load", content);
        }
    }

    #[test]
    fn records_missing_required_fields_are_dropped()
    {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        write_data(&store,
                   r#"{"exportedAt":"2024-06-01T10:00:00Z","apps":[
                        {"id":"1","name":"A","path":"/a"},
                        {"name":"B","path":"/b"},
                        {"id":"","name":"C","path":"/c"},
                        {"id":"4","name":"D"}
                      ]}"#);

        let snapshot = store.load().unwrap();
        assert_eq!(snapshot.apps.len(), 1);
        assert_eq!(snapshot.apps[0].id, "1");
    }

    #[test]
    fn minimal_record_gets_defaults_not_garbage()
    {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        write_data(&store,
                   r#"{"exportedAt":"2024-06-01T10:00:00Z","apps":[{"id":"1","name":"A","path":"/a"}]}"#);

        let snapshot = store.load().unwrap();
        let expected = AppRecord {
            id: "1".to_string(),
            name: "A".to_string(),
            path: "/a".to_string(),
            ..Default::default()
        };
        assert_eq!(snapshot.apps[0], expected);
        assert_eq!(snapshot.update_count, 0);
    }

    #[test]
    fn reloading_an_unchanged_file_is_deterministic()
    {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        write_data(&store,
                   r#"{"exportedAt":"2024-06-01T10:00:00Z","updateCount":1,"apps":[
                        {"id":"1","name":"A","path":"/a","tags":["x"],"sources":["Brew"]}
                      ]}"#);

        assert_eq!(store.load().unwrap(), store.load().unwrap());
    }

    #[test]
    fn change_is_detected_by_token_only()
    {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        write_data(&store,
                   r#"{"exportedAt":"2024-06-01T10:00:00Z","apps":[{"id":"1","name":"A","path":"/a","icon":"aaaa"}]}"#);
        assert!(matches!(store.poll(), PollOutcome::Changed(_)));

        // Content edit under the same token is invisible
        write_data(&store,
                   r#"{"exportedAt":"2024-06-01T10:00:00Z","apps":[{"id":"1","name":"A","path":"/a","icon":"bbbb"}]}"#);
        assert_eq!(store.poll(), PollOutcome::Unchanged);

        // New token with identical apps is a change
        write_data(&store,
                   r#"{"exportedAt":"2024-06-01T10:00:03Z","apps":[{"id":"1","name":"A","path":"/a","icon":"bbbb"}]}"#);
        assert!(matches!(store.poll(), PollOutcome::Changed(_)));
    }

    #[test]
    fn transient_parse_failure_keeps_the_token()
    {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        let valid = r#"{"exportedAt":"2024-06-01T10:00:00Z","apps":[{"id":"1","name":"A","path":"/a"}]}"#;

        write_data(&store, valid);
        assert!(matches!(store.poll(), PollOutcome::Changed(_)));

        // Torn mid-write read: absent this tick, nothing forgotten
        write_data(&store, r#"{"exportedAt":"2024-06-01T1"#);
        assert_eq!(store.poll(), PollOutcome::Absent);

        // Writer finished rewriting the same export
        write_data(&store, valid);
        assert_eq!(store.poll(), PollOutcome::Unchanged);
    }

    #[test]
    fn missing_export_token_reads_as_changed_every_poll()
    {
        // The fallback token is "now", so two ingestions of the same
        // token-less file never compare equal. Accepted edge, pinned here.
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        write_data(&store, r#"{"apps":[{"id":"1","name":"A","path":"/a"}]}"#);

        let first = store.load().unwrap();
        let second = store.load().unwrap();
        assert_ne!(first.exported_at, second.exported_at);

        assert!(matches!(store.poll(), PollOutcome::Changed(_)));
        assert!(matches!(store.poll(), PollOutcome::Changed(_)));
    }

    #[test]
    fn reload_updates_the_token()
    {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        write_data(&store,
                   r#"{"exportedAt":"2024-06-01T10:00:00Z","apps":[]}"#);

        assert!(store.reload().is_some());
        assert_eq!(store.poll(), PollOutcome::Unchanged);
    }
}
