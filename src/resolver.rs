//! Read resolution against the batch index.
//!
//! A lookup walks the indexed records of one key from newest to oldest,
//! collecting merge operands until it meets a Put or Delete. The outcome is
//! a [`BatchLookup`]; turning it into a value may need a merge operator and,
//! for `MergeInProgress`, a base store read.

use crate::error::{Error, Result};
use crate::index::WriteBatchIndex;
use crate::merge::MergeOperator;
use crate::write_batch::{RecordRef, WriteBatch};

/// What the batch alone knows about a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchLookup {
    /// No indexed record for the key.
    NotFound,
    /// The latest record is a Put.
    Found(Vec<u8>),
    /// The latest record is a Delete.
    Deleted,
    /// Merges stacked on a Put (`Some`) or Delete (`None`) inside the batch.
    MergeOnto {
        /// Value of the terminal write beneath the merges.
        base: Option<Vec<u8>>,
        /// Operands, oldest first.
        operands: Vec<Vec<u8>>,
    },
    /// Merges with no terminal write beneath them in the batch.
    MergeInProgress(Vec<Vec<u8>>),
}

/// Resolves `(column_family, key)` against the index.
///
/// DeleteRange records are not indexed, so they never affect the outcome.
pub(crate) fn lookup(
    batch: &WriteBatch,
    index: &WriteBatchIndex,
    column_family: u32,
    key: &[u8],
) -> Result<BatchLookup> {
    let offsets = index.lookup(column_family, key);
    if offsets.is_empty() {
        return Ok(BatchLookup::NotFound);
    }

    let mut operands = Vec::new();
    for &offset in offsets.iter().rev() {
        match batch.record_at(offset)? {
            RecordRef::Put { value, .. } => {
                return Ok(finish(Some(value.to_vec()), operands));
            }
            RecordRef::Delete { .. } => return Ok(finish(None, operands)),
            RecordRef::Merge { value, .. } => operands.push(value.to_vec()),
            record => {
                return Err(Error::internal(format!(
                    "Index points at unindexable {:?} record at offset {}",
                    record.kind(),
                    offset
                )));
            }
        }
    }

    operands.reverse();
    Ok(BatchLookup::MergeInProgress(operands))
}

/// Builds the outcome for a terminal write with `newest_first` merges on top.
fn finish(base: Option<Vec<u8>>, mut newest_first: Vec<Vec<u8>>) -> BatchLookup {
    if newest_first.is_empty() {
        return match base {
            Some(value) => BatchLookup::Found(value),
            None => BatchLookup::Deleted,
        };
    }
    newest_first.reverse();
    BatchLookup::MergeOnto { base, operands: newest_first }
}

/// Folds `operands` onto `existing` with `operator`.
pub(crate) fn full_merge(
    operator: Option<&dyn MergeOperator>,
    key: &[u8],
    existing: Option<&[u8]>,
    operands: &[Vec<u8>],
) -> Result<Vec<u8>> {
    let operator =
        operator.ok_or_else(|| Error::invalid_argument("Merge operator not configured"))?;
    let operands: Vec<&[u8]> = operands.iter().map(Vec::as_slice).collect();
    operator.full_merge(key, existing, &operands).map_err(|e| Error::merge_failure(operator.name(), e))
}
