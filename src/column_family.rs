//! Column family handles.
//!
//! The batch never manages column families itself. Handles are issued by the
//! base store and the batch only uses the numeric id, both as an index key
//! component and in the serialized record.

/// Id of the default column family.
pub const DEFAULT_COLUMN_FAMILY_ID: u32 = 0;

/// Name of the default column family.
pub const DEFAULT_COLUMN_FAMILY_NAME: &str = "default";

/// A handle naming one column family of the base store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnFamilyHandle {
    id: u32,
    name: String,
}

impl ColumnFamilyHandle {
    /// Creates a handle for the column family with the given id and name.
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }

    /// Returns the handle of the default column family.
    pub fn default_cf() -> Self {
        Self::new(DEFAULT_COLUMN_FAMILY_ID, DEFAULT_COLUMN_FAMILY_NAME)
    }

    /// Returns the numeric id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_handle() {
        let cf = ColumnFamilyHandle::default_cf();
        assert_eq!(cf.id(), 0);
        assert_eq!(cf.name(), "default");
        assert_eq!(cf, ColumnFamilyHandle::new(DEFAULT_COLUMN_FAMILY_ID, DEFAULT_COLUMN_FAMILY_NAME));
    }
}
