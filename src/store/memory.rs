use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde_json::Value;

use crate::{
    error::{AcError, Result},
    query::FilterExpr,
    store::{BulkSummary, Document, DocumentStore, WriteOp, apply_set_fields, document_id},
};

/// In-memory store used by tests and local tooling. Tracks how many
/// `bulk_write` calls it has served so tests can assert that dry-run paths
/// never write.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<BTreeMap<String, BTreeMap<String, Document>>>,
    write_calls: Mutex<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_calls(&self) -> u64 {
        *self.write_calls.lock()
    }

    /// Test hook: drops one document outside the store's write accounting.
    pub fn remove(&self, collection: &str, id: &str) -> Option<Document> {
        self.collections
            .lock()
            .get_mut(collection)
            .and_then(|documents| documents.remove(id))
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<Document> {
        self.collections
            .lock()
            .get(collection)
            .and_then(|documents| documents.get(id).cloned())
    }

    pub fn insert(&self, collection: &str, document: Document) {
        let id = document_id(&document)
            .expect("seed documents carry an _id")
            .to_string();
        self.collections
            .lock()
            .entry(collection.to_string())
            .or_default()
            .insert(id, document);
    }

    pub fn seed(&self, collection: &str, documents: Vec<Value>) {
        for document in documents {
            match document {
                Value::Object(map) => self.insert(collection, map),
                other => panic!("seed documents must be objects, got {other}"),
            }
        }
    }
}

impl DocumentStore for MemoryStore {
    fn list_collections(&self) -> Result<Vec<String>> {
        Ok(self.collections.lock().keys().cloned().collect())
    }

    // Snapshots the collection before visiting so visitors may write back
    // through the store without holding the lock.
    fn for_each(
        &self,
        collection: &str,
        filter: &FilterExpr,
        visit: &mut dyn FnMut(Document) -> Result<()>,
    ) -> Result<()> {
        let snapshot: Vec<Document> = self
            .collections
            .lock()
            .get(collection)
            .map(|documents| documents.values().cloned().collect())
            .unwrap_or_default();
        for document in snapshot {
            if filter.matches(&document) {
                visit(document)?;
            }
        }
        Ok(())
    }

    fn bulk_write(&self, collection: &str, ops: Vec<WriteOp>) -> Result<BulkSummary> {
        *self.write_calls.lock() += 1;
        let mut collections = self.collections.lock();
        let documents = collections.entry(collection.to_string()).or_default();
        let mut summary = BulkSummary::default();

        for op in ops {
            match op {
                WriteOp::SetFields { id, fields } => {
                    if let Some(document) = documents.get_mut(&id) {
                        summary.matched += 1;
                        if apply_set_fields(document, &fields) {
                            summary.modified += 1;
                        }
                    }
                }
                WriteOp::ReplaceById {
                    id,
                    document,
                    upsert,
                } => match documents.get_mut(&id) {
                    Some(existing) => {
                        summary.matched += 1;
                        if *existing != document {
                            summary.modified += 1;
                        }
                        *existing = document;
                    }
                    None if upsert => {
                        summary.inserted += 1;
                        documents.insert(id, document);
                    }
                    None => {}
                },
                WriteOp::Insert {
                    document,
                    overwrite,
                } => {
                    let Some(id) = document_id(&document).map(str::to_string) else {
                        return Err(AcError::Storage(
                            "cannot insert a document without an _id".into(),
                        ));
                    };
                    if !overwrite && documents.contains_key(&id) {
                        continue;
                    }
                    summary.inserted += 1;
                    documents.insert(id, document);
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn counts_write_calls() {
        let store = MemoryStore::new();
        assert_eq!(store.write_calls(), 0);
        store
            .bulk_write(
                "voters_119",
                vec![WriteOp::Insert {
                    document: doc(json!({"_id": "v1"})),
                    overwrite: true,
                }],
            )
            .unwrap();
        assert_eq!(store.write_calls(), 1);
        assert_eq!(store.find("voters_119", &FilterExpr::All).unwrap().len(), 1);
    }

    #[test]
    fn insert_without_overwrite_keeps_the_existing_document() {
        let store = MemoryStore::new();
        store.insert("voters_119", doc(json!({"_id": "v1", "name": "first"})));

        let summary = store
            .bulk_write(
                "voters_119",
                vec![WriteOp::Insert {
                    document: doc(json!({"_id": "v1", "name": "second"})),
                    overwrite: false,
                }],
            )
            .unwrap();
        assert_eq!(summary.inserted, 0);
        assert_eq!(store.get("voters_119", "v1").unwrap()["name"], json!("first"));
    }

    #[test]
    fn visitors_may_write_back_through_the_store() {
        let store = MemoryStore::new();
        store.insert("voters_119", doc(json!({"_id": "v1", "flag": false})));
        store
            .for_each("voters_119", &FilterExpr::All, &mut |document| {
                let id = document["_id"].as_str().unwrap().to_string();
                store.bulk_write(
                    "voters_119",
                    vec![WriteOp::SetFields {
                        id,
                        fields: doc(json!({"flag": true})),
                    }],
                )?;
                Ok(())
            })
            .unwrap();
        assert_eq!(store.get("voters_119", "v1").unwrap()["flag"], json!(true));
    }

    #[test]
    fn finds_on_missing_collection_return_empty() {
        let store = MemoryStore::new();
        assert!(store.find("voters_999", &FilterExpr::All).unwrap().is_empty());
        assert_eq!(store.count("voters_999", &FilterExpr::All).unwrap(), 0);
    }
}
