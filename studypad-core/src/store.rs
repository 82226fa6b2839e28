use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::document::{document_id_for_bytes, DocumentId};
use crate::error::ReaderError;

/// One uploaded document: class/subject keys, the raw payload, and a
/// unix-seconds upload timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub class_name: String,
    pub subject: String,
    pub file_name: String,
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
    pub created_at: u64,
}

impl DocumentRecord {
    pub fn new(class_name: &str, subject: &str, file_name: &str, data: Vec<u8>) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            id: document_id_for_bytes(&data),
            class_name: class_name.to_string(),
            subject: subject.to_string(),
            file_name: file_name.to_string(),
            data,
            created_at,
        }
    }
}

/// Key-value record store for uploaded documents.
pub trait DocumentStore: Send + Sync {
    fn add(&self, record: DocumentRecord) -> Result<DocumentId, ReaderError>;
    fn get_all(&self) -> Result<Vec<DocumentRecord>, ReaderError>;
    fn get_by_class(&self, class_name: &str) -> Result<Vec<DocumentRecord>, ReaderError>;
    fn delete(&self, id: DocumentId) -> Result<(), ReaderError>;
}

pub struct MemoryDocumentStore {
    inner: Mutex<HashMap<DocumentId, DocumentRecord>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn add(&self, record: DocumentRecord) -> Result<DocumentId, ReaderError> {
        let id = record.id;
        self.inner.lock().insert(id, record);
        Ok(id)
    }

    fn get_all(&self) -> Result<Vec<DocumentRecord>, ReaderError> {
        let mut records: Vec<_> = self.inner.lock().values().cloned().collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    fn get_by_class(&self, class_name: &str) -> Result<Vec<DocumentRecord>, ReaderError> {
        let mut records: Vec<_> = self
            .inner
            .lock()
            .values()
            .filter(|r| r.class_name == class_name)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    fn delete(&self, id: DocumentId) -> Result<(), ReaderError> {
        self.inner.lock().remove(&id);
        Ok(())
    }
}

/// One JSON file per record under a root directory, written via a temp file
/// and atomic rename.
pub struct FileDocumentStore {
    root: PathBuf,
}

impl FileDocumentStore {
    pub fn new(root: PathBuf) -> Result<Self, ReaderError> {
        fs::create_dir_all(&root)
            .map_err(|err| ReaderError::Store(format!("failed to create {:?}: {err}", root)))?;
        Ok(Self { root })
    }

    fn record_path(&self, id: DocumentId) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    fn read_record(&self, path: &PathBuf) -> Result<DocumentRecord, ReaderError> {
        let mut file = File::open(path)
            .map_err(|err| ReaderError::Store(format!("failed to open {:?}: {err}", path)))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)
            .map_err(|err| ReaderError::Store(format!("failed to read {:?}: {err}", path)))?;
        serde_json::from_slice(&buf)
            .map_err(|err| ReaderError::Store(format!("failed to decode {:?}: {err}", path)))
    }
}

impl DocumentStore for FileDocumentStore {
    fn add(&self, record: DocumentRecord) -> Result<DocumentId, ReaderError> {
        let path = self.record_path(record.id);
        let tmp = path.with_extension("json.tmp");
        let payload = serde_json::to_vec(&record)
            .map_err(|err| ReaderError::Store(format!("failed to encode record: {err}")))?;
        let mut file = File::create(&tmp)
            .map_err(|err| ReaderError::Store(format!("failed to create {:?}: {err}", tmp)))?;
        file.write_all(&payload)
            .and_then(|_| file.flush())
            .map_err(|err| ReaderError::Store(format!("failed to write {:?}: {err}", tmp)))?;
        fs::rename(&tmp, &path)
            .map_err(|err| ReaderError::Store(format!("failed to commit {:?}: {err}", path)))?;
        Ok(record.id)
    }

    fn get_all(&self) -> Result<Vec<DocumentRecord>, ReaderError> {
        let entries = fs::read_dir(&self.root)
            .map_err(|err| ReaderError::Store(format!("failed to list {:?}: {err}", self.root)))?;
        let mut records = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|err| ReaderError::Store(format!("failed to list entry: {err}")))?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                records.push(self.read_record(&path)?);
            }
        }
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    fn get_by_class(&self, class_name: &str) -> Result<Vec<DocumentRecord>, ReaderError> {
        let mut records = self.get_all()?;
        records.retain(|r| r.class_name == class_name);
        Ok(records)
    }

    fn delete(&self, id: DocumentId) -> Result<(), ReaderError> {
        let path = self.record_path(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ReaderError::Store(format!(
                "failed to delete {:?}: {err}",
                path
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample(class_name: &str, payload: &[u8]) -> DocumentRecord {
        DocumentRecord::new(class_name, "physics", "optics.pdf", payload.to_vec())
    }

    #[test]
    fn memory_store_round_trips_and_filters_by_class() {
        let store = MemoryDocumentStore::new();
        store.add(sample("9a", b"one")).unwrap();
        store.add(sample("9a", b"two")).unwrap();
        store.add(sample("10b", b"three")).unwrap();

        assert_eq!(store.get_all().unwrap().len(), 3);
        let class = store.get_by_class("9a").unwrap();
        assert_eq!(class.len(), 2);
        assert!(class.iter().all(|r| r.class_name == "9a"));
    }

    #[test]
    fn memory_store_delete_removes_record() {
        let store = MemoryDocumentStore::new();
        let id = store.add(sample("9a", b"bytes")).unwrap();
        store.delete(id).unwrap();
        assert!(store.get_all().unwrap().is_empty());
    }

    #[test]
    fn file_store_round_trips_records() {
        let dir = tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path().join("records")).unwrap();

        let record = sample("9a", b"%PDF-1.7 payload");
        let id = store.add(record.clone()).unwrap();

        let all = store.get_all().unwrap();
        assert_eq!(all, vec![record]);

        store.delete(id).unwrap();
        assert!(store.get_all().unwrap().is_empty());
    }

    #[test]
    fn file_store_delete_of_missing_record_is_a_noop() {
        let dir = tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path().to_path_buf()).unwrap();
        store.delete(document_id_for_bytes(b"never stored")).unwrap();
    }

    #[test]
    fn record_id_tracks_payload() {
        let a = sample("9a", b"same");
        let b = sample("10b", b"same");
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, sample("9a", b"different").id);
    }
}
