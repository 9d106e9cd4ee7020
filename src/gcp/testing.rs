//! Collaborator doubles for unit tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{
    BatchProcessRequest, DocumentProcessor, GcpError, ObjectInfo, ObjectStore, OperationState,
    Publisher, Warehouse,
};
use crate::extract::{CanonicalRecord, TableSchema};

/// Counts every call and fails it; used to prove nothing is touched.
#[derive(Default)]
pub struct Untouchable {
    calls: AtomicUsize,
}

impl Untouchable {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn refuse<T>(&self) -> Result<T, GcpError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(GcpError::Auth("unexpected call".to_string()))
    }
}

#[async_trait]
impl DocumentProcessor for Untouchable {
    async fn start_batch(&self, _request: &BatchProcessRequest) -> Result<String, GcpError> {
        self.refuse()
    }
    async fn operation_state(&self, _operation: &str) -> Result<OperationState, GcpError> {
        self.refuse()
    }
}

#[async_trait]
impl ObjectStore for Untouchable {
    async fn list(&self, _bucket: &str, _prefix: &str) -> Result<Vec<ObjectInfo>, GcpError> {
        self.refuse()
    }
    async fn download(&self, _bucket: &str, _name: &str) -> Result<Vec<u8>, GcpError> {
        self.refuse()
    }
    async fn delete(&self, _bucket: &str, _name: &str) -> Result<(), GcpError> {
        self.refuse()
    }
    async fn copy(&self, _: &str, _: &str, _: &str, _: &str) -> Result<(), GcpError> {
        self.refuse()
    }
}

#[async_trait]
impl Warehouse for Untouchable {
    async fn ensure_table(&self, _schema: &TableSchema) -> Result<(), GcpError> {
        self.refuse()
    }
    async fn append_row(&self, _record: &CanonicalRecord) -> Result<(), GcpError> {
        self.refuse()
    }
}

#[async_trait]
impl Publisher for Untouchable {
    async fn publish(&self, _topic: &str, _data: Vec<u8>) -> Result<String, GcpError> {
        self.refuse()
    }
}
