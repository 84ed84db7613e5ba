use std::{collections::BTreeSet, fs, path::PathBuf};

use rocksdb::{DBWithThreadMode, Direction, IteratorMode, MultiThreaded, Options, WriteBatch};
use serde_json::Value;

use crate::{
    error::{AcError, Result},
    query::FilterExpr,
    store::{BulkSummary, Document, DocumentStore, WriteOp, apply_set_fields, document_id},
};

const SEP: u8 = 0x1F;

/// rocksdb-backed document store. Every document lives under the key
/// `collection \x1F id`; a collection is nothing more than a shared key
/// prefix, so partitions appear on first write and cost nothing when
/// empty.
pub struct RocksStore {
    db: DBWithThreadMode<MultiThreaded>,
}

impl RocksStore {
    pub fn open(path: PathBuf) -> Result<Self> {
        fs::create_dir_all(&path)?;
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DBWithThreadMode::<MultiThreaded>::open(&opts, path).map_err(map_db_error)?;
        Ok(Self { db })
    }

    fn document_key(collection: &str, id: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(collection.len() + 1 + id.len());
        key.extend_from_slice(collection.as_bytes());
        key.push(SEP);
        key.extend_from_slice(id.as_bytes());
        key
    }

    fn collection_prefix(collection: &str) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(collection.len() + 1);
        prefix.extend_from_slice(collection.as_bytes());
        prefix.push(SEP);
        prefix
    }

    fn load(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let key = Self::document_key(collection, id);
        match self.db.get(&key).map_err(map_db_error)? {
            Some(bytes) => Ok(Some(decode_document(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<F>(&self, collection: &str, mut visit: F) -> Result<()>
    where
        F: FnMut(Document) -> Result<()>,
    {
        let prefix = Self::collection_prefix(collection);
        let iter = self
            .db
            .iterator(IteratorMode::From(&prefix, Direction::Forward));
        for entry in iter {
            let (key, value) = entry.map_err(map_db_error)?;
            if !key.starts_with(&prefix) {
                break;
            }
            visit(decode_document(&value)?)?;
        }
        Ok(())
    }
}

impl DocumentStore for RocksStore {
    fn list_collections(&self) -> Result<Vec<String>> {
        let mut collections = BTreeSet::new();
        for entry in self.db.iterator(IteratorMode::Start) {
            let (key, _) = entry.map_err(map_db_error)?;
            if let Some(pos) = key.iter().position(|byte| *byte == SEP) {
                if let Ok(name) = std::str::from_utf8(&key[..pos]) {
                    collections.insert(name.to_string());
                }
            }
        }
        Ok(collections.into_iter().collect())
    }

    // The iterator pins a consistent view at creation, so visitors may
    // write back through the store mid-scan.
    fn for_each(
        &self,
        collection: &str,
        filter: &FilterExpr,
        visit: &mut dyn FnMut(Document) -> Result<()>,
    ) -> Result<()> {
        self.scan(collection, |document| {
            if filter.matches(&document) {
                visit(document)?;
            }
            Ok(())
        })
    }

    fn bulk_write(&self, collection: &str, ops: Vec<WriteOp>) -> Result<BulkSummary> {
        let mut summary = BulkSummary::default();
        let mut batch = WriteBatch::default();

        for op in ops {
            match op {
                WriteOp::SetFields { id, fields } => {
                    let Some(mut document) = self.load(collection, &id)? else {
                        continue;
                    };
                    summary.matched += 1;
                    if apply_set_fields(&mut document, &fields) {
                        summary.modified += 1;
                        batch.put(
                            Self::document_key(collection, &id),
                            serde_json::to_vec(&Value::Object(document))?,
                        );
                    }
                }
                WriteOp::ReplaceById {
                    id,
                    document,
                    upsert,
                } => {
                    let exists = self.load(collection, &id)?.is_some();
                    if !exists && !upsert {
                        continue;
                    }
                    if exists {
                        summary.matched += 1;
                        summary.modified += 1;
                    } else {
                        summary.inserted += 1;
                    }
                    batch.put(
                        Self::document_key(collection, &id),
                        serde_json::to_vec(&Value::Object(document))?,
                    );
                }
                WriteOp::Insert {
                    document,
                    overwrite,
                } => {
                    let Some(id) = document_id(&document).map(str::to_string) else {
                        return Err(AcError::Storage(
                            "cannot insert a document without an _id".into(),
                        ));
                    };
                    if !overwrite && self.load(collection, &id)?.is_some() {
                        continue;
                    }
                    summary.inserted += 1;
                    batch.put(
                        Self::document_key(collection, &id),
                        serde_json::to_vec(&Value::Object(document))?,
                    );
                }
            }
        }

        self.db.write(batch).map_err(map_db_error)?;
        Ok(summary)
    }
}

fn decode_document(bytes: &[u8]) -> Result<Document> {
    match serde_json::from_slice::<Value>(bytes)? {
        Value::Object(map) => Ok(map),
        other => Err(AcError::Storage(format!(
            "stored document is not an object: {other}"
        ))),
    }
}

fn map_db_error(err: rocksdb::Error) -> AcError {
    AcError::Storage(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn round_trips_documents_per_collection() {
        let dir = tempdir().unwrap();
        let store = RocksStore::open(dir.path().join("store")).unwrap();

        store
            .bulk_write(
                "voters_119",
                vec![
                    WriteOp::Insert {
                        overwrite: true,
                        document: doc(json!({"_id": "v1", "name": "A"})),
                    },
                    WriteOp::Insert {
                        overwrite: true,
                        document: doc(json!({"_id": "v2", "name": "B"})),
                    },
                ],
            )
            .unwrap();
        store
            .bulk_write(
                "voters_121",
                vec![WriteOp::Insert {
                    overwrite: true,
                    document: doc(json!({"_id": "v1", "name": "C"})),
                }],
            )
            .unwrap();

        assert_eq!(store.count("voters_119", &FilterExpr::All).unwrap(), 2);
        assert_eq!(store.count("voters_121", &FilterExpr::All).unwrap(), 1);
        assert_eq!(
            store.list_collections().unwrap(),
            vec!["voters_119".to_string(), "voters_121".to_string()]
        );
    }

    #[test]
    fn set_fields_preserves_unrelated_fields() {
        let dir = tempdir().unwrap();
        let store = RocksStore::open(dir.path().join("store")).unwrap();
        store
            .bulk_write(
                "voters_119",
                vec![WriteOp::Insert {
                    overwrite: true,
                    document: doc(json!({"_id": "v1", "name": "A", "age": "42"})),
                }],
            )
            .unwrap();

        let summary = store
            .bulk_write(
                "voters_119",
                vec![WriteOp::SetFields {
                    id: "v1".into(),
                    fields: doc(json!({"age": 42})),
                }],
            )
            .unwrap();
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.modified, 1);

        let documents = store.find("voters_119", &FilterExpr::All).unwrap();
        assert_eq!(documents[0]["name"], json!("A"));
        assert_eq!(documents[0]["age"], json!(42));
    }

    #[test]
    fn insert_without_overwrite_keeps_the_existing_document() {
        let dir = tempdir().unwrap();
        let store = RocksStore::open(dir.path().join("store")).unwrap();
        store
            .bulk_write(
                "voters_119_backup_20260823",
                vec![WriteOp::Insert {
                    overwrite: true,
                    document: doc(json!({"_id": "v1", "name": "first"})),
                }],
            )
            .unwrap();

        let summary = store
            .bulk_write(
                "voters_119_backup_20260823",
                vec![WriteOp::Insert {
                    overwrite: false,
                    document: doc(json!({"_id": "v1", "name": "second"})),
                }],
            )
            .unwrap();
        assert_eq!(summary.inserted, 0);

        let documents = store
            .find("voters_119_backup_20260823", &FilterExpr::All)
            .unwrap();
        assert_eq!(documents[0]["name"], json!("first"));
    }

    #[test]
    fn replace_without_upsert_skips_missing_ids() {
        let dir = tempdir().unwrap();
        let store = RocksStore::open(dir.path().join("store")).unwrap();
        let summary = store
            .bulk_write(
                "voters_119",
                vec![WriteOp::ReplaceById {
                    id: "ghost".into(),
                    document: doc(json!({"_id": "ghost"})),
                    upsert: false,
                }],
            )
            .unwrap();
        assert_eq!(summary, BulkSummary::default());
        assert_eq!(store.count("voters_119", &FilterExpr::All).unwrap(), 0);
    }
}
