//! Append-only JSONL backend.
//!
//! One file, one JSON object per line. Lines are either record inserts,
//! index entries, or deletion tombstones; nothing is ever rewritten in
//! place, which is what makes the file portable and crash-safe: a torn
//! final line fails to parse and is skipped on replay, so a partially
//! written record is simply absent.

use serde_json::{json, Value};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

use crate::backend::{record_mentions_agent, RecordKind, StorageBackend};
use crate::error::Result;

struct JsonlState {
    file: File,
    /// kind tag -> insertion-ordered (id, record)
    records: std::collections::HashMap<&'static str, Vec<(String, Value)>>,
    /// (kind, index_name, key) -> ids
    indexes: std::collections::HashMap<(String, String, String), Vec<String>>,
}

/// Append-only JSONL [`StorageBackend`].
pub struct JsonlBackend {
    state: Mutex<JsonlState>,
    path: PathBuf,
}

impl JsonlBackend {
    /// Open the log, replaying existing lines into memory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut records: std::collections::HashMap<&'static str, Vec<(String, Value)>> =
            std::collections::HashMap::new();
        let mut indexes: std::collections::HashMap<(String, String, String), Vec<String>> =
            std::collections::HashMap::new();
        let mut tombstones: HashSet<(String, String)> = HashSet::new();

        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            let mut line_no = 0usize;
            for line in reader.lines() {
                line_no += 1;
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let entry: Value = match serde_json::from_str(&line) {
                    Ok(entry) => entry,
                    Err(_) => {
                        // Torn tail from an interrupted write.
                        warn!(path = %path.display(), line = line_no, "Skipping unparseable log line");
                        continue;
                    }
                };
                Self::replay_entry(&entry, &mut records, &mut indexes, &mut tombstones);
            }
        }

        // Apply tombstones collected during replay.
        for (kind_tag, id) in &tombstones {
            if let Some(kind) = RecordKind::from_str_tag(kind_tag) {
                if let Some(list) = records.get_mut(kind.as_str()) {
                    list.retain(|(existing, _)| existing != id);
                }
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        info!(
            path = %path.display(),
            kinds = records.len(),
            "Opened JSONL storage backend"
        );

        Ok(Self {
            state: Mutex::new(JsonlState {
                file,
                records,
                indexes,
            }),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn replay_entry(
        entry: &Value,
        records: &mut std::collections::HashMap<&'static str, Vec<(String, Value)>>,
        indexes: &mut std::collections::HashMap<(String, String, String), Vec<String>>,
        tombstones: &mut HashSet<(String, String)>,
    ) {
        let kind_tag = entry.get("kind").and_then(Value::as_str).unwrap_or("");
        let id = entry.get("id").and_then(Value::as_str).unwrap_or("");
        if kind_tag.is_empty() || id.is_empty() {
            return;
        }

        if entry.get("deleted").and_then(Value::as_bool) == Some(true) {
            tombstones.insert((kind_tag.to_string(), id.to_string()));
            return;
        }

        if let Some(index_name) = entry.get("index_name").and_then(Value::as_str) {
            let key = entry.get("key").and_then(Value::as_str).unwrap_or("");
            let ids = indexes
                .entry((
                    kind_tag.to_string(),
                    index_name.to_string(),
                    key.to_string(),
                ))
                .or_default();
            if !ids.iter().any(|existing| existing == id) {
                ids.push(id.to_string());
            }
            return;
        }

        if let (Some(kind), Some(record)) =
            (RecordKind::from_str_tag(kind_tag), entry.get("record"))
        {
            let is_update = entry.get("updated").and_then(Value::as_bool) == Some(true);
            let list = records.entry(kind.as_str()).or_default();
            match list.iter_mut().find(|(existing, _)| existing == id) {
                Some(slot) if is_update => slot.1 = record.clone(),
                Some(_) => {}
                None => list.push((id.to_string(), record.clone())),
            }
        }
    }

    fn append_line(state: &mut JsonlState, line: &Value) -> Result<()> {
        let mut bytes = serde_json::to_vec(line)?;
        bytes.push(b'\n');
        state.file.write_all(&bytes)?;
        state.file.flush()?;
        Ok(())
    }
}

impl StorageBackend for JsonlBackend {
    fn put(&self, kind: RecordKind, id: &str, record: &Value) -> Result<bool> {
        let mut state = self.state.lock().expect("jsonl backend poisoned");
        let exists = state
            .records
            .get(kind.as_str())
            .map(|list| list.iter().any(|(existing, _)| existing == id))
            .unwrap_or(false);
        if exists {
            return Ok(false);
        }

        let line = json!({"kind": kind.as_str(), "id": id, "record": record});
        Self::append_line(&mut state, &line)?;
        state
            .records
            .entry(kind.as_str())
            .or_default()
            .push((id.to_string(), record.clone()));
        Ok(true)
    }

    fn update(&self, kind: RecordKind, id: &str, record: &Value) -> Result<bool> {
        let mut state = self.state.lock().expect("jsonl backend poisoned");
        let exists = state
            .records
            .get(kind.as_str())
            .map(|list| list.iter().any(|(existing, _)| existing == id))
            .unwrap_or(false);
        if !exists {
            return Ok(false);
        }

        // Append-only: the newest line for an id wins on replay.
        let line = json!({"kind": kind.as_str(), "id": id, "record": record, "updated": true});
        Self::append_line(&mut state, &line)?;
        if let Some(list) = state.records.get_mut(kind.as_str()) {
            if let Some(slot) = list.iter_mut().find(|(existing, _)| existing == id) {
                slot.1 = record.clone();
            }
        }
        Ok(true)
    }

    fn get(&self, kind: RecordKind, id: &str) -> Result<Option<Value>> {
        let state = self.state.lock().expect("jsonl backend poisoned");
        Ok(state.records.get(kind.as_str()).and_then(|list| {
            list.iter()
                .find(|(existing, _)| existing == id)
                .map(|(_, record)| record.clone())
        }))
    }

    fn iter(&self, kind: RecordKind) -> Result<Vec<(String, Value)>> {
        let state = self.state.lock().expect("jsonl backend poisoned");
        Ok(state
            .records
            .get(kind.as_str())
            .cloned()
            .unwrap_or_default())
    }

    fn delete_by_agent(&self, agent_id: &str) -> Result<usize> {
        let mut state = self.state.lock().expect("jsonl backend poisoned");

        // Collect matches first, then append one tombstone per record.
        let mut doomed: Vec<(&'static str, String)> = Vec::new();
        for kind in RecordKind::all() {
            if let Some(list) = state.records.get(kind.as_str()) {
                for (id, record) in list {
                    if record_mentions_agent(record, agent_id) {
                        doomed.push((kind.as_str(), id.clone()));
                    }
                }
            }
        }

        for (kind_tag, id) in &doomed {
            let line = json!({"kind": kind_tag, "id": id, "deleted": true});
            Self::append_line(&mut state, &line)?;
            if let Some(list) = state.records.get_mut(*kind_tag) {
                list.retain(|(existing, _)| existing != id);
            }
        }

        info!(agent_id = %agent_id, removed = doomed.len(), "Erased agent records");
        Ok(doomed.len())
    }

    fn index_add(&self, kind: RecordKind, index_name: &str, key: &str, id: &str) -> Result<()> {
        let mut state = self.state.lock().expect("jsonl backend poisoned");
        let entry_key = (
            kind.as_str().to_string(),
            index_name.to_string(),
            key.to_string(),
        );
        let already = state
            .indexes
            .get(&entry_key)
            .map(|ids| ids.iter().any(|existing| existing == id))
            .unwrap_or(false);
        if already {
            return Ok(());
        }

        let line = json!({
            "kind": kind.as_str(),
            "index_name": index_name,
            "key": key,
            "id": id,
        });
        Self::append_line(&mut state, &line)?;
        state.indexes.entry(entry_key).or_default().push(id.to_string());
        Ok(())
    }

    fn index_lookup(&self, kind: RecordKind, index_name: &str, key: &str) -> Result<Vec<String>> {
        let state = self.state.lock().expect("jsonl backend poisoned");
        let ids = state
            .indexes
            .get(&(
                kind.as_str().to_string(),
                index_name.to_string(),
                key.to_string(),
            ))
            .cloned()
            .unwrap_or_default();

        let live = state.records.get(kind.as_str());
        Ok(ids
            .into_iter()
            .filter(|id| {
                live.map(|list| list.iter().any(|(existing, _)| existing == id))
                    .unwrap_or(false)
            })
            .collect())
    }
}
