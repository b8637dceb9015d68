//! Conversation index
//!
//! The registry is the authoritative list of which conversations exist,
//! persisted inside the settings file and independent of whether any
//! conversation body is currently loaded.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One durable index record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub id: String,
    pub name: String,
    pub location: PathBuf,
}

/// On-disk form of an index record
///
/// Older config files stored a bare conversation id per entry. Both forms
/// are accepted on load and normalized to [`RegistryEntry`] before use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegistryRecord {
    Entry(RegistryEntry),
    Legacy(String),
}

impl RegistryRecord {
    /// Normalize to the structured form
    ///
    /// A legacy id keeps the id-derived location the old writer used.
    pub fn into_entry(self, log_dir: &Path) -> RegistryEntry {
        match self {
            RegistryRecord::Entry(entry) => entry,
            RegistryRecord::Legacy(id) => RegistryEntry {
                name: format!("Conversation {}", id),
                location: log_dir.join(format!("{}.txt", id)),
                id,
            },
        }
    }
}

/// In-memory index, insertion order preserved
#[derive(Debug, Default, Clone)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
}

impl Registry {
    /// Build the registry from persisted records, upgrading legacy entries
    pub fn from_records(records: Vec<RegistryRecord>, log_dir: &Path) -> Self {
        let mut registry = Registry::default();
        for record in records {
            let entry = record.into_entry(log_dir);
            if registry.get(&entry.id).is_none() {
                registry.entries.push(entry);
            }
        }
        registry
    }

    /// All entries in insertion order
    pub fn list(&self) -> &[RegistryEntry] {
        &self.entries
    }

    /// Look up an entry by id
    pub fn get(&self, id: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Look up an entry by id, falling back to a case-insensitive name match
    pub fn find(&self, key: &str) -> Option<&RegistryEntry> {
        self.get(key).or_else(|| {
            self.entries
                .iter()
                .find(|entry| entry.name.eq_ignore_ascii_case(key))
        })
    }

    /// Insert a new entry or replace the existing one with the same id
    pub fn upsert(&mut self, entry: RegistryEntry) {
        match self.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Remove an entry by id
    pub fn remove(&mut self, id: &str) -> Option<RegistryEntry> {
        let index = self.entries.iter().position(|entry| entry.id == id)?;
        Some(self.entries.remove(index))
    }

    /// Snapshot for persistence, always in the structured form
    pub fn to_records(&self) -> Vec<RegistryRecord> {
        self.entries
            .iter()
            .cloned()
            .map(RegistryRecord::Entry)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_record_upgrade() {
        let records: Vec<RegistryRecord> =
            serde_json::from_str(r#"["1700000000"]"#).unwrap();
        let registry = Registry::from_records(records, Path::new("log"));

        assert_eq!(
            registry.list(),
            &[RegistryEntry {
                id: "1700000000".into(),
                name: "Conversation 1700000000".into(),
                location: PathBuf::from("log/1700000000.txt"),
            }]
        );
    }

    #[test]
    fn test_mixed_records_keep_order() {
        let records: Vec<RegistryRecord> = serde_json::from_str(
            r#"["1700000000",
                {"id": "1700000050", "name": "notes", "location": "log/notes.txt"}]"#,
        )
        .unwrap();
        let registry = Registry::from_records(records, Path::new("log"));

        let ids: Vec<&str> = registry.list().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["1700000000", "1700000050"]);
        assert_eq!(registry.list()[1].name, "notes");
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut registry = Registry::default();
        registry.upsert(RegistryEntry {
            id: "1".into(),
            name: "first".into(),
            location: "log/first.txt".into(),
        });
        registry.upsert(RegistryEntry {
            id: "2".into(),
            name: "second".into(),
            location: "log/second.txt".into(),
        });
        registry.upsert(RegistryEntry {
            id: "1".into(),
            name: "renamed".into(),
            location: "log/renamed.txt".into(),
        });

        let names: Vec<&str> = registry.list().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["renamed", "second"]);
    }

    #[test]
    fn test_find_by_name_ignores_case() {
        let mut registry = Registry::default();
        registry.upsert(RegistryEntry {
            id: "9".into(),
            name: "Shopping List".into(),
            location: "log/shopping_list.txt".into(),
        });

        assert_eq!(registry.find("shopping list").unwrap().id, "9");
        assert_eq!(registry.find("9").unwrap().name, "Shopping List");
        assert!(registry.find("missing").is_none());
    }

    #[test]
    fn test_records_round_trip_as_structured() {
        let records: Vec<RegistryRecord> = serde_json::from_str(r#"["42"]"#).unwrap();
        let registry = Registry::from_records(records, Path::new("log"));

        let serialized = serde_json::to_string(&registry.to_records()).unwrap();
        assert!(serialized.contains(r#""id":"42""#));
        assert!(serialized.contains(r#""name":"Conversation 42""#));
    }
}
