//! Configuration options for the indexed write batch.

use crate::merge::MergeOperator;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Upper bound accepted for `reserved_bytes` (1GB).
pub const MAX_RESERVED_BYTES: usize = 1 << 30;

/// Options fixed when a batch is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOptions {
    /// Bytes reserved up front in the underlying log.
    /// Default: 0
    pub reserved_bytes: usize,

    /// Keep only the latest terminal write per key in the index.
    /// Default: false (every write is indexed)
    pub overwrite_key: bool,
}

impl BatchOptions {
    /// Creates a new BatchOptions with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of bytes reserved in the log.
    pub fn reserved_bytes(mut self, bytes: usize) -> Self {
        self.reserved_bytes = bytes;
        self
    }

    /// Sets the index overwrite policy.
    pub fn overwrite_key(mut self, value: bool) -> Self {
        self.overwrite_key = value;
        self
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> crate::Result<()> {
        if self.reserved_bytes > MAX_RESERVED_BYTES {
            return Err(crate::Error::invalid_argument(format!(
                "reserved_bytes must be <= {}",
                MAX_RESERVED_BYTES
            )));
        }
        Ok(())
    }
}

/// Options consulted by batch-only reads.
#[derive(Clone, Default)]
pub struct Options {
    /// Operator used to resolve pending merges.
    /// Default: None
    pub merge_operator: Option<Arc<dyn MergeOperator>>,
}

impl Options {
    /// Creates a new Options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the merge operator.
    pub fn merge_operator(mut self, operator: Arc<dyn MergeOperator>) -> Self {
        self.merge_operator = Some(operator);
        self
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("merge_operator", &self.merge_operator.as_ref().map(|op| op.name().to_string()))
            .finish()
    }
}

/// Options handed through, untouched, to the base store on reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadOptions {
    /// Sequence number to read at, if the store supports snapshots.
    /// Default: None (latest)
    pub snapshot: Option<u64>,

    /// Whether blocks read by this call should be cached.
    /// Default: true
    pub fill_cache: bool,

    /// Whether the store should verify checksums of data it reads.
    /// Default: true
    pub verify_checksums: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self { snapshot: None, fill_cache: true, verify_checksums: true }
    }
}

impl ReadOptions {
    /// Creates a new ReadOptions with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the snapshot sequence number.
    pub fn snapshot(mut self, sequence: u64) -> Self {
        self.snapshot = Some(sequence);
        self
    }

    /// Sets whether reads fill the store's cache.
    pub fn fill_cache(mut self, value: bool) -> Self {
        self.fill_cache = value;
        self
    }

    /// Sets whether the store verifies checksums.
    pub fn verify_checksums(mut self, value: bool) -> Self {
        self.verify_checksums = value;
        self
    }
}
