//! Partition keys and borrowed key views.
//!
//! A [`Key`] is the self-describing byte encoding of a partition key. Two
//! regular keys compare by unsigned lexicographic order of their encoded
//! bytes. The sentinels [`Key::minimum`] and [`Key::maximum`] hold no bytes
//! and sort below and above every regular key.

use crate::composite::{serialize_value, CompositeView};
use crate::error::{KeyResult, MarshalError};
use crate::schema::Schema;
use bytes::Bytes;
use std::cmp::Ordering;
use std::fmt;

/// Kind of a [`Key`].
///
/// Variant order is the sort order of the kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyKind {
    /// Sorts before every other key.
    BeforeAllKeys,
    /// A real key with bytes.
    Regular,
    /// Sorts after every other key.
    AfterAllKeys,
}

/// An owned, immutable partition key.
///
/// Field order matters: the derived ordering compares the kind first, so
/// sentinels bracket all regular keys, and then the encoded bytes.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key {
    kind: KeyKind,
    bytes: Bytes,
}

impl Key {
    /// Wraps already-encoded key bytes.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            kind: KeyKind::Regular,
            bytes: bytes.into(),
        }
    }

    /// Encodes a key from its components using the schema's layout.
    ///
    /// # Errors
    ///
    /// Returns a [`MarshalError`] if the components cannot be encoded.
    pub fn from_exploded<I, T>(schema: &Schema, components: I) -> KeyResult<Self>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let bytes = serialize_value(components, schema.is_compound())?;
        Ok(Self::from_bytes(bytes))
    }

    /// The key that sorts before all keys.
    #[must_use]
    pub fn minimum() -> Self {
        Self {
            kind: KeyKind::BeforeAllKeys,
            bytes: Bytes::new(),
        }
    }

    /// The key that sorts after all keys.
    #[must_use]
    pub fn maximum() -> Self {
        Self {
            kind: KeyKind::AfterAllKeys,
            bytes: Bytes::new(),
        }
    }

    /// Returns the key kind.
    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    /// Returns true for the two sentinel keys.
    pub fn is_sentinel(&self) -> bool {
        self.kind != KeyKind::Regular
    }

    /// Returns true if the key holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The encoded bytes as a shared buffer.
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Borrows the key. The view keeps the key's kind.
    pub fn as_view(&self) -> KeyView<'_> {
        KeyView {
            kind: self.kind,
            bytes: &self.bytes,
        }
    }

    /// Splits the key into its components.
    ///
    /// # Errors
    ///
    /// Fails with [`MarshalError::Sentinel`] for sentinel keys, or with a
    /// structural error for malformed compound encodings.
    pub fn explode(&self, schema: &Schema) -> KeyResult<Vec<&[u8]>> {
        if self.is_sentinel() {
            return Err(MarshalError::Sentinel);
        }
        self.as_view().explode(schema)
    }

    /// Validates the key against the schema's partition key columns.
    ///
    /// # Errors
    ///
    /// Returns the first [`MarshalError`] found: structural problems,
    /// a component count mismatch, or a value not valid for its column.
    pub fn validate(&self, schema: &Schema) -> KeyResult<()> {
        if self.is_sentinel() {
            return Err(MarshalError::Sentinel);
        }
        self.as_view().validate(schema)
    }

    /// Three-way comparison against a key view.
    ///
    /// Sentinels compare less (minimum) or greater (maximum) than any
    /// regular view and equal to a view of the same sentinel.
    pub fn tri_compare(&self, other: KeyView<'_>) -> Ordering {
        self.as_view().tri_compare(other)
    }

    /// Three-way comparison against a decomposed key.
    ///
    /// # Errors
    ///
    /// Fails if the components cannot be encoded for the schema.
    pub fn tri_compare_components(
        &self,
        schema: &Schema,
        components: &[&[u8]],
    ) -> KeyResult<Ordering> {
        self.as_view().tri_compare_components(schema, components)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            KeyKind::BeforeAllKeys => write!(f, "Key(min)"),
            KeyKind::AfterAllKeys => write!(f, "Key(max)"),
            KeyKind::Regular => write!(f, "Key({})", self.as_view()),
        }
    }
}

impl From<Bytes> for Key {
    fn from(bytes: Bytes) -> Self {
        Self::from_bytes(bytes)
    }
}

impl<'a> From<&'a Key> for KeyView<'a> {
    fn from(key: &'a Key) -> Self {
        key.as_view()
    }
}

/// A non-owning look at a key.
///
/// Supports the same comparisons as [`Key`] without copying. A view of a
/// sentinel keeps its kind, so it still brackets every regular view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyView<'a> {
    kind: KeyKind,
    bytes: &'a [u8],
}

impl<'a> KeyView<'a> {
    /// Creates a view over encoded regular key bytes.
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self {
            kind: KeyKind::Regular,
            bytes,
        }
    }

    /// A view of [`Key::minimum`].
    pub const fn minimum() -> Self {
        Self {
            kind: KeyKind::BeforeAllKeys,
            bytes: &[],
        }
    }

    /// A view of [`Key::maximum`].
    pub const fn maximum() -> Self {
        Self {
            kind: KeyKind::AfterAllKeys,
            bytes: &[],
        }
    }

    /// Returns the key kind.
    pub const fn kind(&self) -> KeyKind {
        self.kind
    }

    /// Returns true for views of the sentinel keys.
    pub fn is_sentinel(&self) -> bool {
        self.kind != KeyKind::Regular
    }

    /// The viewed bytes.
    pub const fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Returns true if the view holds no bytes.
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Three-way comparison: kind first, then unsigned lexicographic order
    /// of the encoded forms.
    pub fn tri_compare(&self, other: KeyView<'_>) -> Ordering {
        self.kind
            .cmp(&other.kind)
            .then_with(|| self.bytes.cmp(other.bytes))
    }

    /// Compares against a decomposed key by encoding it the way the
    /// schema lays out partition keys.
    ///
    /// # Errors
    ///
    /// Fails if the components cannot be encoded for the schema.
    pub fn tri_compare_components(
        &self,
        schema: &Schema,
        components: &[&[u8]],
    ) -> KeyResult<Ordering> {
        let encoded = serialize_value(components.iter().copied(), schema.is_compound())?;
        Ok(self.tri_compare(KeyView::new(&encoded)))
    }

    /// Splits the key into component byte ranges.
    ///
    /// # Errors
    ///
    /// Fails with [`MarshalError::Sentinel`] for sentinel views, or with a
    /// structural [`MarshalError`] for malformed compound keys.
    pub fn explode(&self, schema: &Schema) -> KeyResult<Vec<&'a [u8]>> {
        if self.is_sentinel() {
            return Err(MarshalError::Sentinel);
        }
        CompositeView::new(self.bytes, schema.is_compound()).explode()
    }

    /// Validates the viewed bytes against the schema.
    ///
    /// # Errors
    ///
    /// See [`Key::validate`].
    pub fn validate(&self, schema: &Schema) -> KeyResult<()> {
        let components = self.explode(schema)?;
        let columns = schema.partition_key_columns();
        if components.len() != columns.len() {
            return Err(MarshalError::ComponentCount {
                expected: columns.len(),
                actual: components.len(),
            });
        }
        for (idx, (column, value)) in columns.iter().zip(&components).enumerate() {
            column.validate(idx, value)?;
        }
        Ok(())
    }

    /// Copies the view into an owned key of the same kind.
    pub fn to_key(&self) -> Key {
        match self.kind {
            KeyKind::BeforeAllKeys => Key::minimum(),
            KeyKind::AfterAllKeys => Key::maximum(),
            KeyKind::Regular => Key::from_bytes(Bytes::copy_from_slice(self.bytes)),
        }
    }
}

impl Default for KeyView<'_> {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl fmt::Display for KeyView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            KeyKind::BeforeAllKeys => f.write_str("min"),
            KeyKind::AfterAllKeys => f.write_str("max"),
            KeyKind::Regular => {
                for byte in self.bytes {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}
