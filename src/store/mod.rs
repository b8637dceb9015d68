//! Conversation persistence
//!
//! Each conversation is an append-only JSONL log, one turn per line, plus
//! an in-memory cache kept consistent with the log across append, truncate,
//! rename and delete. The registry submodule owns the durable index.

mod registry;

pub use registry::{Registry, RegistryEntry, RegistryRecord};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// One prompt/response exchange
///
/// Immutable once appended, except by whole-conversation truncation of the
/// most recent turn or by deletion of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// The fully assembled text sent to the model (prefix+body+suffix)
    pub prompt: String,
    /// The model's reply, or the error text that substituted for it
    pub response: String,
    /// Total tokens billed for the exchange, 0 if unknown or failed
    #[serde(default)]
    pub usage: u64,
    /// Epoch seconds, set at append time
    #[serde(default)]
    pub timestamp: f64,
    /// Role labels; defaulted for records from older writers
    #[serde(default = "Turn::default_roles")]
    pub roles: BTreeMap<String, String>,
}

impl Turn {
    /// Create a turn stamped with the current time
    pub fn new(prompt: String, response: String, usage: u64) -> Self {
        Self {
            prompt,
            response,
            usage,
            timestamp: Utc::now().timestamp_millis() as f64 / 1000.0,
            roles: Self::default_roles(),
        }
    }

    fn default_roles() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("user".to_string(), "user".to_string()),
            ("assistant".to_string(), "assistant".to_string()),
        ])
    }
}

/// A named, identified sequence of turns with a durable log location
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    pub history: Vec<Turn>,
}

/// Errors from conversation storage operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("a conversation log already exists at {0}")]
    NameConflict(PathBuf),

    #[error("rename target already exists at {0}")]
    RenameConflict(PathBuf),

    #[error("conversation has no turns to drop")]
    EmptyHistory,

    #[error("unknown conversation: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] io::Error),

    #[error("failed to encode turn: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Owns all conversation state: the on-disk logs, the in-memory cache and
/// the registry index
pub struct ConversationStore {
    log_dir: PathBuf,
    conversations: HashMap<String, Conversation>,
    registry: Registry,
}

impl ConversationStore {
    /// Create a store over `log_dir`, indexed by previously persisted records
    pub fn new(log_dir: PathBuf, records: Vec<RegistryRecord>) -> Self {
        let registry = Registry::from_records(records, &log_dir);
        Self {
            log_dir,
            conversations: HashMap::new(),
            registry,
        }
    }

    /// The durable index, in creation order
    pub fn list(&self) -> &[RegistryEntry] {
        self.registry.list()
    }

    /// Resolve an entry by id or (case-insensitive) name
    pub fn find(&self, key: &str) -> Option<&RegistryEntry> {
        self.registry.find(key)
    }

    /// A cached conversation body, if loaded
    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.get(id)
    }

    /// Registry snapshot for the settings file
    pub fn records(&self) -> Vec<RegistryRecord> {
        self.registry.to_records()
    }

    /// Allocate a new empty conversation and register it
    ///
    /// The log file is created up front, which is also what detects a name
    /// conflict atomically.
    pub fn create(&mut self, name: Option<&str>) -> Result<&Conversation, StoreError> {
        let id = self.next_id();
        let name = match name {
            Some(given) if !given.trim().is_empty() => given.trim().to_string(),
            _ => format!("Conversation {}", id),
        };
        let path = self.log_path(&name);

        fs::create_dir_all(&self.log_dir)?;
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|err| {
                if err.kind() == ErrorKind::AlreadyExists {
                    StoreError::NameConflict(path.clone())
                } else {
                    StoreError::Storage(err)
                }
            })?;

        self.registry.upsert(RegistryEntry {
            id: id.clone(),
            name: name.clone(),
            location: path.clone(),
        });
        self.conversations.insert(
            id.clone(),
            Conversation {
                id: id.clone(),
                name,
                path,
                history: Vec::new(),
            },
        );

        self.conversations
            .get(&id)
            .ok_or(StoreError::NotFound(id))
    }

    /// Append a turn to memory and durably to the end of the log
    ///
    /// On a failed write the in-memory turn is popped back off, so the cache
    /// is never ahead of the durable log.
    pub fn append_turn(&mut self, id: &str, turn: Turn) -> Result<(), StoreError> {
        let conv = self
            .conversations
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let record = serde_json::to_string(&turn)?;
        conv.history.push(turn);

        if let Err(err) = append_record(&conv.path, &record) {
            conv.history.pop();
            return Err(StoreError::Storage(err));
        }
        Ok(())
    }

    /// Remove and return the most recent turn
    ///
    /// The log has no delete-in-place, so the remaining history is rewritten
    /// through a temp file. A failed rewrite restores the popped turn.
    pub fn truncate_last(&mut self, id: &str) -> Result<Turn, StoreError> {
        let conv = self
            .conversations
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let turn = conv.history.pop().ok_or(StoreError::EmptyHistory)?;
        if let Err(err) = rewrite_log(&conv.path, &conv.history) {
            conv.history.push(turn);
            return Err(err);
        }
        Ok(turn)
    }

    /// Load a conversation body, reading its log on a cache miss
    ///
    /// Lines are parsed independently: a corrupt record is skipped with a
    /// warning rather than losing the rest of the conversation.
    pub fn load(&mut self, id: &str) -> Result<&Conversation, StoreError> {
        if !self.conversations.contains_key(id) {
            let entry = self
                .registry
                .get(id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?
                .clone();

            let history = match read_log(&entry.location) {
                Ok(history) => history,
                Err(StoreError::Storage(err)) if err.kind() == ErrorKind::NotFound => {
                    return Err(StoreError::NotFound(id.to_string()));
                }
                Err(err) => return Err(err),
            };

            self.conversations.insert(
                entry.id.clone(),
                Conversation {
                    id: entry.id,
                    name: entry.name,
                    path: entry.location,
                    history,
                },
            );
        }

        self.conversations
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Rename a conversation, moving its log to the name-derived location
    ///
    /// The file is renamed first; the cache and index are only updated once
    /// the rename succeeded, so they never point at a missing file.
    pub fn rename(&mut self, id: &str, new_name: &str) -> Result<(), StoreError> {
        self.load(id)?;
        let new_path = self.log_path(new_name);

        let conv = self
            .conversations
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if new_path != conv.path {
            if new_path.exists() {
                return Err(StoreError::RenameConflict(new_path));
            }
            fs::rename(&conv.path, &new_path)?;
            conv.path = new_path;
        }
        conv.name = new_name.trim().to_string();

        self.registry.upsert(RegistryEntry {
            id: conv.id.clone(),
            name: conv.name.clone(),
            location: conv.path.clone(),
        });
        Ok(())
    }

    /// Delete a conversation's log, cache entry and index entry
    ///
    /// A missing file and an unknown id are both no-ops. The caller is
    /// responsible for clearing its active-conversation reference.
    pub fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        let location = self
            .registry
            .get(id)
            .map(|entry| entry.location.clone())
            .or_else(|| self.conversations.get(id).map(|conv| conv.path.clone()));

        let Some(location) = location else {
            return Ok(());
        };

        match fs::remove_file(&location) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(StoreError::Storage(err)),
        }

        self.conversations.remove(id);
        self.registry.remove(id);
        Ok(())
    }

    /// Next conversation id, derived from creation time and never reused
    fn next_id(&self) -> String {
        let mut stamp = Utc::now().timestamp().max(0);
        loop {
            let id = stamp.to_string();
            if self.registry.get(&id).is_none() && !self.conversations.contains_key(&id) {
                return id;
            }
            stamp += 1;
        }
    }

    fn log_path(&self, name: &str) -> PathBuf {
        self.log_dir.join(format!("{}.txt", sanitize_name(name)))
    }
}

/// Derive a file stem from a display name
fn sanitize_name(name: &str) -> String {
    let stem: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    if stem.is_empty() {
        "conversation".to_string()
    } else {
        stem
    }
}

fn append_record(path: &Path, record: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(record.as_bytes())?;
    file.write_all(b"\n")?;
    file.sync_data()
}

fn rewrite_log(path: &Path, history: &[Turn]) -> Result<(), StoreError> {
    let tmp = path.with_extension("txt.tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        for turn in history {
            serde_json::to_writer(&mut writer, turn)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn read_log(path: &Path) -> Result<Vec<Turn>, StoreError> {
    let raw = fs::read_to_string(path)?;
    // Some earlier writers emitted a byte-order marker
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(&raw);

    let mut history = Vec::new();
    for (index, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Turn>(line) {
            Ok(turn) => history.push(turn),
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    line = index + 1,
                    %err,
                    "skipping unreadable log record"
                );
            }
        }
    }
    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> ConversationStore {
        ConversationStore::new(dir.path().join("log"), Vec::new())
    }

    fn turn(prompt: &str, response: &str, usage: u64) -> Turn {
        Turn::new(prompt.to_string(), response.to_string(), usage)
    }

    #[test]
    fn test_append_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);

        let id = store.create(Some("roundtrip")).unwrap().id.clone();
        let first = turn("hi", "hello", 10);
        let second = turn("bye", "goodbye", 20);
        store.append_turn(&id, first.clone()).unwrap();
        store.append_turn(&id, second.clone()).unwrap();

        // Fresh cache over the same log and index
        let mut reloaded = ConversationStore::new(dir.path().join("log"), store.records());
        let conv = reloaded.load(&id).unwrap();
        assert_eq!(conv.history, vec![first, second]);
        assert_eq!(conv.name, "roundtrip");
    }

    #[test]
    fn test_truncate_is_left_inverse_of_append() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);

        let id = store.create(None).unwrap().id.clone();
        let kept = turn("keep", "kept", 1);
        store.append_turn(&id, kept.clone()).unwrap();
        store.append_turn(&id, turn("drop", "dropped", 2)).unwrap();

        let removed = store.truncate_last(&id).unwrap();
        assert_eq!(removed.prompt, "drop");
        assert_eq!(store.get(&id).unwrap().history, vec![kept.clone()]);

        // The rewrite must be visible to a fresh cache too
        let mut reloaded = ConversationStore::new(dir.path().join("log"), store.records());
        assert_eq!(reloaded.load(&id).unwrap().history, vec![kept]);
    }

    #[test]
    fn test_truncate_empty_history() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);

        let id = store.create(None).unwrap().id.clone();
        assert!(matches!(
            store.truncate_last(&id),
            Err(StoreError::EmptyHistory)
        ));
    }

    #[test]
    fn test_corrupt_line_is_skipped() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);

        let id = store.create(None).unwrap().id.clone();
        store.append_turn(&id, turn("one", "1", 1)).unwrap();
        store.append_turn(&id, turn("two", "2", 2)).unwrap();

        // Splice a corrupt record between the two valid lines
        let path = store.get(&id).unwrap().path.clone();
        let raw = fs::read_to_string(&path).unwrap();
        let mut lines: Vec<&str> = raw.lines().collect();
        lines.insert(1, "{not json at all");
        fs::write(&path, lines.join("\n")).unwrap();

        let mut reloaded = ConversationStore::new(dir.path().join("log"), store.records());
        let conv = reloaded.load(&id).unwrap();
        let prompts: Vec<&str> = conv.history.iter().map(|t| t.prompt.as_str()).collect();
        assert_eq!(prompts, ["one", "two"]);
    }

    #[test]
    fn test_load_tolerates_bom_and_legacy_records() {
        let dir = TempDir::new().unwrap();
        let log_dir = dir.path().join("log");
        fs::create_dir_all(&log_dir).unwrap();

        // A log written by an earlier client: BOM, no roles field
        fs::write(
            log_dir.join("1700000000.txt"),
            "\u{feff}{\"prompt\":\"hi\",\"response\":\"hello\",\"usage\":10,\"timestamp\":1700000001.5}\n",
        )
        .unwrap();

        let records: Vec<RegistryRecord> = serde_json::from_str(r#"["1700000000"]"#).unwrap();
        let mut store = ConversationStore::new(log_dir, records);

        let conv = store.load("1700000000").unwrap();
        assert_eq!(conv.name, "Conversation 1700000000");
        assert_eq!(conv.history.len(), 1);
        assert_eq!(conv.history[0].usage, 10);
        assert_eq!(
            conv.history[0].roles.get("assistant").map(String::as_str),
            Some("assistant")
        );
    }

    #[test]
    fn test_name_conflict() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);

        store.create(Some("same")).unwrap();
        assert!(matches!(
            store.create(Some("same")),
            Err(StoreError::NameConflict(_))
        ));
    }

    #[test]
    fn test_rename_keeps_history_and_moves_log() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);

        let id = store.create(Some("before")).unwrap().id.clone();
        let old_path = store.get(&id).unwrap().path.clone();
        store.append_turn(&id, turn("hi", "hello", 5)).unwrap();

        store.rename(&id, "after").unwrap();
        assert!(!old_path.exists());

        let conv = store.get(&id).unwrap();
        assert_eq!(conv.name, "after");
        assert!(conv.path.exists());
        assert_eq!(conv.history.len(), 1);

        // Same id resolves to the same history through a fresh cache
        let mut reloaded = ConversationStore::new(dir.path().join("log"), store.records());
        let conv = reloaded.load(&id).unwrap();
        assert_eq!(conv.history[0].prompt, "hi");
    }

    #[test]
    fn test_rename_conflict_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);

        store.create(Some("taken")).unwrap();
        let id = store.create(Some("source")).unwrap().id.clone();

        assert!(matches!(
            store.rename(&id, "taken"),
            Err(StoreError::RenameConflict(_))
        ));
        let conv = store.get(&id).unwrap();
        assert_eq!(conv.name, "source");
        assert!(conv.path.exists());
    }

    #[test]
    fn test_delete_removes_listing_and_file() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);

        let id = store.create(Some("doomed")).unwrap().id.clone();
        let path = store.get(&id).unwrap().path.clone();

        store.delete(&id).unwrap();
        assert!(!path.exists());
        assert!(store.list().is_empty());

        // Unknown id is a no-op, not an error
        store.delete("does-not-exist").unwrap();
    }

    #[test]
    fn test_ids_are_never_reused() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);

        let a = store.create(Some("a")).unwrap().id.clone();
        let b = store.create(Some("b")).unwrap().id.clone();
        let c = store.create(Some("c")).unwrap().id.clone();

        assert_ne!(a, b);
        assert_ne!(b, c);
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("Conversation 1700000000"), "conversation_1700000000");
        assert_eq!(sanitize_name("  notes/2024 "), "notes_2024");
        assert_eq!(sanitize_name(""), "conversation");
    }
}
