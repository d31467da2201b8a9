use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

const SUMMARY_PREFIX: &str = "summary_";
const FILE_PREFIX: &str = "file_";
const PLACEHOLDER_PREFIX: &str = "placeholder_";
const AUX_PREFIXES: [&str; 3] = [SUMMARY_PREFIX, FILE_PREFIX, PLACEHOLDER_PREFIX];

/// Persisted mapping `document id -> last synchronized modifiedTime`, plus
/// auxiliary `summary_<id>`, `file_<id>` and `placeholder_<id>` keys.
///
/// Backed by a `BTreeMap` so the serialized form is stable across runs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncState {
    entries: BTreeMap<String, String>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn marker(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(String::as_str)
    }

    pub fn set_marker(&mut self, id: &str, modified_time: &str) {
        self.entries.insert(id.to_string(), modified_time.to_string());
    }

    pub fn summary(&self, id: &str) -> Option<&str> {
        self.aux(SUMMARY_PREFIX, id)
    }

    pub fn set_summary(&mut self, id: &str, summary: &str) {
        self.set_aux(SUMMARY_PREFIX, id, summary);
    }

    /// Post filename written by the last successful sync of `id`.
    pub fn file(&self, id: &str) -> Option<&str> {
        self.aux(FILE_PREFIX, id)
    }

    pub fn set_file(&mut self, id: &str, filename: &str) {
        self.set_aux(FILE_PREFIX, id, filename);
    }

    pub fn is_placeholder(&self, id: &str) -> bool {
        self.aux(PLACEHOLDER_PREFIX, id) == Some("true")
    }

    pub fn set_placeholder(&mut self, id: &str, placeholder: bool) {
        let key = format!("{PLACEHOLDER_PREFIX}{id}");
        if placeholder {
            self.entries.insert(key, "true".to_string());
        } else {
            self.entries.remove(&key);
        }
    }

    /// Ids that own at least one key.
    pub fn document_ids(&self) -> BTreeSet<&str> {
        self.entries.keys().map(|key| owner_id(key)).collect()
    }

    /// Drops every key owned by an id missing from `live_ids`. Returns the
    /// removed ids in sorted order.
    pub fn prune<'a, I>(&mut self, live_ids: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let live: BTreeSet<&str> = live_ids.into_iter().collect();
        let mut removed = BTreeSet::new();
        self.entries.retain(|key, _| {
            let owner = owner_id(key);
            if live.contains(owner) {
                true
            } else {
                removed.insert(owner.to_string());
                false
            }
        });
        removed.into_iter().collect()
    }

    fn aux(&self, prefix: &str, id: &str) -> Option<&str> {
        self.entries
            .get(&format!("{prefix}{id}"))
            .map(String::as_str)
    }

    fn set_aux(&mut self, prefix: &str, id: &str, value: &str) {
        self.entries
            .insert(format!("{prefix}{id}"), value.to_string());
    }
}

fn owner_id(key: &str) -> &str {
    AUX_PREFIXES
        .iter()
        .find_map(|prefix| key.strip_prefix(prefix))
        .unwrap_or(key)
}
