//! Table schema as seen by the key model.

use crate::error::{KeyResult, MarshalError};
use crate::sharder::StaticSharder;

/// Type of a partition key column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// Arbitrary bytes.
    Blob,
    /// UTF-8 text.
    Text,
    /// 32-bit big-endian integer.
    Int,
    /// 64-bit big-endian integer.
    BigInt,
    /// 16-byte UUID.
    Uuid,
    /// Single byte boolean.
    Boolean,
}

impl ColumnType {
    /// Returns the type name used in error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ColumnType::Blob => "blob",
            ColumnType::Text => "text",
            ColumnType::Int => "int",
            ColumnType::BigInt => "bigint",
            ColumnType::Uuid => "uuid",
            ColumnType::Boolean => "boolean",
        }
    }

    /// Returns the encoded width of fixed-size types.
    #[must_use]
    pub const fn fixed_width(self) -> Option<usize> {
        match self {
            ColumnType::Int => Some(4),
            ColumnType::BigInt => Some(8),
            ColumnType::Uuid => Some(16),
            ColumnType::Boolean => Some(1),
            ColumnType::Blob | ColumnType::Text => None,
        }
    }

    /// Checks that `value` is a valid serialized value of this type.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError::InvalidValue`] naming `column` if the value
    /// has the wrong width or is not valid UTF-8 for text columns.
    pub fn validate(self, column: usize, value: &[u8]) -> KeyResult<()> {
        if let Some(width) = self.fixed_width() {
            if value.len() != width {
                return Err(MarshalError::invalid_value(
                    column,
                    self.name(),
                    format!("expected {width} bytes, got {}", value.len()),
                ));
            }
        }
        if self == ColumnType::Text {
            std::str::from_utf8(value).map_err(|e| {
                MarshalError::invalid_value(column, self.name(), format!("invalid UTF-8: {e}"))
            })?;
        }
        Ok(())
    }
}

/// Table schema: partition key layout, clustering key size and the
/// sharder that decides shard ownership for the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    keyspace: String,
    table: String,
    partition_key: Vec<ColumnType>,
    clustering_key_size: usize,
    sharder: StaticSharder,
}

impl Schema {
    /// Creates a schema with the given partition key columns, no clustering
    /// columns and a single-shard sharder.
    pub fn new(
        keyspace: impl Into<String>,
        table: impl Into<String>,
        partition_key: Vec<ColumnType>,
    ) -> Self {
        Self {
            keyspace: keyspace.into(),
            table: table.into(),
            partition_key,
            clustering_key_size: 0,
            sharder: StaticSharder::single(),
        }
    }

    /// Sets the number of clustering key columns.
    #[must_use]
    pub fn with_clustering_columns(mut self, count: usize) -> Self {
        self.clustering_key_size = count;
        self
    }

    /// Sets the sharder.
    #[must_use]
    pub fn with_sharder(mut self, sharder: StaticSharder) -> Self {
        self.sharder = sharder;
        self
    }

    /// Keyspace name.
    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    /// Table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Partition key column types, in key order.
    pub fn partition_key_columns(&self) -> &[ColumnType] {
        &self.partition_key
    }

    /// Number of partition key columns.
    pub fn partition_key_size(&self) -> usize {
        self.partition_key.len()
    }

    /// Whether partition keys use the compound (multi-component) encoding.
    pub fn is_compound(&self) -> bool {
        self.partition_key.len() > 1
    }

    /// Number of clustering key columns.
    pub fn clustering_key_size(&self) -> usize {
        self.clustering_key_size
    }

    /// The table's sharder.
    pub fn sharder(&self) -> &StaticSharder {
        &self.sharder
    }
}

impl std::fmt::Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.keyspace, self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compound_detection() {
        let single = Schema::new("ks", "t", vec![ColumnType::Text]);
        assert!(!single.is_compound());

        let compound = Schema::new("ks", "t", vec![ColumnType::Text, ColumnType::Int]);
        assert!(compound.is_compound());
        assert_eq!(compound.partition_key_size(), 2);
    }

    #[test]
    fn fixed_width_validation() {
        assert!(ColumnType::Int.validate(0, &[0, 0, 0, 1]).is_ok());
        assert!(ColumnType::Int.validate(0, &[0, 1]).is_err());
        assert!(ColumnType::BigInt.validate(0, &[0; 8]).is_ok());
        assert!(ColumnType::Uuid.validate(0, &[0; 15]).is_err());
        assert!(ColumnType::Blob.validate(0, &[]).is_ok());
    }

    #[test]
    fn text_must_be_utf8() {
        assert!(ColumnType::Text.validate(0, "héllo".as_bytes()).is_ok());
        let err = ColumnType::Text.validate(2, &[0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, MarshalError::InvalidValue { column: 2, .. }));
    }

    #[test]
    fn schema_display() {
        let schema = Schema::new("app", "users", vec![ColumnType::Uuid]);
        assert_eq!(schema.to_string(), "app.users");
    }
}
