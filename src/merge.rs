//! Merge operator contract.
//!
//! A merge operator folds an ordered list of operands onto an optional
//! existing value. Operands are always passed oldest first.

/// Error reported by a merge operator that rejects its input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct MergeError {
    message: String,
}

impl MergeError {
    /// Creates a new merge error.
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// A user supplied reduction over merge operands.
pub trait MergeOperator: Send + Sync {
    /// Name used in error messages.
    fn name(&self) -> &str;

    /// Folds `operands` (oldest first) onto `existing`.
    ///
    /// `existing` is `None` when neither the batch nor the base store holds a
    /// value for the key.
    fn full_merge(
        &self,
        key: &[u8],
        existing: Option<&[u8]>,
        operands: &[&[u8]],
    ) -> Result<Vec<u8>, MergeError>;
}

/// Concatenates operands onto the existing value, separated by a delimiter.
#[derive(Debug, Clone)]
pub struct AppendOperator {
    delimiter: Vec<u8>,
}

impl AppendOperator {
    /// Creates an operator joining values with `delimiter`.
    pub fn new(delimiter: &[u8]) -> Self {
        Self { delimiter: delimiter.to_vec() }
    }
}

impl Default for AppendOperator {
    fn default() -> Self {
        Self::new(b",")
    }
}

impl MergeOperator for AppendOperator {
    fn name(&self) -> &str {
        "append"
    }

    fn full_merge(
        &self,
        _key: &[u8],
        existing: Option<&[u8]>,
        operands: &[&[u8]],
    ) -> Result<Vec<u8>, MergeError> {
        let mut result = existing.map(<[u8]>::to_vec).unwrap_or_default();
        let mut first = existing.is_none();
        for operand in operands {
            if !first {
                result.extend_from_slice(&self.delimiter);
            }
            result.extend_from_slice(operand);
            first = false;
        }
        Ok(result)
    }
}

/// Treats values as little-endian u64 counters and adds operands to them.
#[derive(Debug, Clone, Copy, Default)]
pub struct U64AddOperator;

impl U64AddOperator {
    fn decode(bytes: &[u8]) -> Result<u64, MergeError> {
        let raw: [u8; 8] = bytes
            .try_into()
            .map_err(|_| MergeError::new(format!("expected 8 bytes, got {}", bytes.len())))?;
        Ok(u64::from_le_bytes(raw))
    }
}

impl MergeOperator for U64AddOperator {
    fn name(&self) -> &str {
        "uint64add"
    }

    fn full_merge(
        &self,
        _key: &[u8],
        existing: Option<&[u8]>,
        operands: &[&[u8]],
    ) -> Result<Vec<u8>, MergeError> {
        let mut total = match existing {
            Some(bytes) => Self::decode(bytes)?,
            None => 0,
        };
        for operand in operands {
            total = total.wrapping_add(Self::decode(operand)?);
        }
        Ok(total.to_le_bytes().to_vec())
    }
}
