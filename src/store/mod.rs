mod memory;
mod rocks;

use serde_json::{Map, Value};

use crate::{error::Result, query::FilterExpr};

pub use memory::MemoryStore;
pub use rocks::RocksStore;

/// Documents are loosely-typed JSON objects. Known fields are reconciled
/// by the core; everything else round-trips untouched.
pub type Document = Map<String, Value>;

pub const ID_FIELD: &str = "_id";

pub fn document_id(document: &Document) -> Option<&str> {
    document.get(ID_FIELD).and_then(Value::as_str)
}

#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Partial update: sets only the named fields on the identified
    /// document, leaving every other field alone. No-op when the id does
    /// not exist.
    SetFields { id: String, fields: Document },
    /// Full replace by id. With `upsert: false` the op is a no-op when the
    /// id does not exist in the collection.
    ReplaceById {
        id: String,
        document: Document,
        upsert: bool,
    },
    /// Insert a document under its own `_id`. With `overwrite: false` the
    /// op is a no-op when the id already exists; the backup path relies on
    /// this so an existing snapshot is never replaced.
    Insert { document: Document, overwrite: bool },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkSummary {
    pub matched: u64,
    pub modified: u64,
    pub inserted: u64,
}

impl BulkSummary {
    pub fn absorb(&mut self, other: BulkSummary) {
        self.matched += other.matched;
        self.modified += other.modified;
        self.inserted += other.inserted;
    }
}

/// Collection-level primitives the core needs from a document store:
/// find, count, bulk-write, and collection inventory. Implementations must
/// apply each `bulk_write` call atomically (one committed batch) and must
/// never create a collection as a side effect of reading it.
pub trait DocumentStore: Send + Sync {
    fn list_collections(&self) -> Result<Vec<String>>;

    /// Streams every matching document to `visit`, one at a time, without
    /// materializing the collection. Visitors may write back through the
    /// store; the traversal sees the collection as it was when the scan
    /// started. The engines do all their scanning through this so memory
    /// stays bounded regardless of partition size.
    fn for_each(
        &self,
        collection: &str,
        filter: &FilterExpr,
        visit: &mut dyn FnMut(Document) -> Result<()>,
    ) -> Result<()>;

    fn find(&self, collection: &str, filter: &FilterExpr) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        self.for_each(collection, filter, &mut |document| {
            documents.push(document);
            Ok(())
        })?;
        Ok(documents)
    }

    fn count(&self, collection: &str, filter: &FilterExpr) -> Result<u64> {
        let mut total = 0;
        self.for_each(collection, filter, &mut |_| {
            total += 1;
            Ok(())
        })?;
        Ok(total)
    }

    fn bulk_write(&self, collection: &str, ops: Vec<WriteOp>) -> Result<BulkSummary>;
}

/// Applies a `SetFields`-style delta to a document in memory. Shared by
/// the backends so partial-update semantics cannot drift between them.
pub fn apply_set_fields(document: &mut Document, fields: &Document) -> bool {
    let mut changed = false;
    for (key, value) in fields {
        if document.get(key) != Some(value) {
            document.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    changed
}
