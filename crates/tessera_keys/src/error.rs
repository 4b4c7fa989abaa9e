//! Error types for the key model.

use thiserror::Error;

/// Result type for key operations.
pub type KeyResult<T> = Result<T, MarshalError>;

/// A key failed structural validation against its schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarshalError {
    /// A component's length prefix or body runs past the end of the key.
    #[error("truncated key component at offset {offset}")]
    Truncated {
        /// Byte offset where the component starts.
        offset: usize,
    },

    /// A compound component ends with a non-zero end-of-component marker.
    #[error("invalid end-of-component byte {byte:#04x} at offset {offset}")]
    InvalidEndOfComponent {
        /// The marker that was found.
        byte: u8,
        /// Byte offset of the marker.
        offset: usize,
    },

    /// The key has a different number of components than the schema.
    #[error("wrong number of key components: expected {expected}, got {actual}")]
    ComponentCount {
        /// Components declared by the schema.
        expected: usize,
        /// Components found in the key.
        actual: usize,
    },

    /// A component is too long to be length-prefixed.
    #[error("key component of {len} bytes exceeds the {max} byte limit")]
    ComponentTooLong {
        /// Component length.
        len: usize,
        /// Largest encodable length.
        max: usize,
    },

    /// A component does not hold a valid value of its column type.
    #[error("invalid value for key column {column} ({type_name}): {message}")]
    InvalidValue {
        /// Index of the offending column.
        column: usize,
        /// Declared column type.
        type_name: &'static str,
        /// What is wrong with the value.
        message: String,
    },

    /// Sentinel keys carry no bytes and cannot be decomposed.
    #[error("sentinel key has no components")]
    Sentinel,
}

impl MarshalError {
    /// Creates an invalid value error.
    pub fn invalid_value(
        column: usize,
        type_name: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            column,
            type_name,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = MarshalError::ComponentCount {
            expected: 2,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "wrong number of key components: expected 2, got 3"
        );

        let err = MarshalError::invalid_value(1, "int", "expected 4 bytes, got 3");
        assert!(err.to_string().contains("column 1"));
        assert!(err.to_string().contains("int"));
    }
}
