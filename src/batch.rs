use tracing::info;

use crate::{
    error::{AcError, Result},
    partition::PartitionHandle,
    store::{BulkSummary, WriteOp},
};

/// Every batch operation in the engines is bounded to this many documents.
pub const BATCH_SIZE: usize = 500;

/// Bounded write buffer shared by the migration and rollback engines:
/// accumulate ops, flush as one bulk write at capacity, report progress
/// after every committed batch. Each flush is an independently committed
/// round-trip, so a failure aborts the remaining work for this partition
/// without disturbing batches already written.
pub struct BatchWriter<'a> {
    handle: &'a PartitionHandle,
    capacity: usize,
    buffer: Vec<WriteOp>,
    batch_index: usize,
    totals: BulkSummary,
    expected: u64,
}

impl<'a> BatchWriter<'a> {
    /// `expected` is the total op count identified up front, used only for
    /// progress reporting.
    pub fn new(handle: &'a PartitionHandle, expected: u64) -> Self {
        Self::with_capacity(handle, expected, BATCH_SIZE)
    }

    pub fn with_capacity(handle: &'a PartitionHandle, expected: u64, capacity: usize) -> Self {
        Self {
            handle,
            capacity: capacity.max(1),
            buffer: Vec::new(),
            batch_index: 0,
            totals: BulkSummary::default(),
            expected,
        }
    }

    pub fn push(&mut self, op: WriteOp) -> Result<()> {
        self.buffer.push(op);
        if self.buffer.len() >= self.capacity {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let ops = std::mem::take(&mut self.buffer);
        let attempted = ops.len() as u64;
        let summary = self
            .handle
            .bulk_write(ops)
            .map_err(|err| AcError::BatchWrite {
                partition: self.handle.collection().to_string(),
                batch_index: self.batch_index,
                written: self.totals.matched + self.totals.inserted,
                message: err.to_string(),
            })?;
        self.totals.absorb(summary);
        info!(
            partition = self.handle.collection(),
            batch = self.batch_index,
            attempted,
            progress = self.totals.matched + self.totals.inserted,
            expected = self.expected,
            "batch committed"
        );
        self.batch_index += 1;
        Ok(())
    }

    /// Flushes the tail batch and returns the accumulated totals.
    pub fn finish(mut self) -> Result<BulkSummary> {
        self.flush()?;
        Ok(self.totals)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        partition::{EntityKind, PartitionRouter},
        query::FilterExpr,
        registry::AcRegistry,
        store::{DocumentStore, MemoryStore},
    };
    use serde_json::json;

    fn setup() -> (Arc<MemoryStore>, PartitionHandle) {
        let store = Arc::new(MemoryStore::new());
        let router = PartitionRouter::new(
            Arc::new(AcRegistry::default_table()),
            Arc::clone(&store) as Arc<dyn DocumentStore>,
        );
        let handle = router.route(EntityKind::Voters, 119).unwrap();
        (store, handle)
    }

    fn insert_op(id: usize) -> WriteOp {
        WriteOp::Insert {
            document: json!({"_id": format!("v{id}")}).as_object().cloned().unwrap(),
            overwrite: true,
        }
    }

    #[test]
    fn flushes_at_capacity_and_on_finish() {
        let (store, handle) = setup();
        let mut writer = BatchWriter::with_capacity(&handle, 5, 2);
        for id in 0..5 {
            writer.push(insert_op(id)).unwrap();
        }
        // Two full batches flushed, one op still buffered.
        assert_eq!(store.write_calls(), 2);
        let totals = writer.finish().unwrap();
        assert_eq!(store.write_calls(), 3);
        assert_eq!(totals.inserted, 5);
        assert_eq!(handle.count(&FilterExpr::All).unwrap(), 5);
    }

    #[test]
    fn empty_writer_never_touches_the_store() {
        let (store, handle) = setup();
        let writer = BatchWriter::new(&handle, 0);
        let totals = writer.finish().unwrap();
        assert_eq!(store.write_calls(), 0);
        assert_eq!(totals, BulkSummary::default());
    }
}
