//! Clustering keys and positions within a partition.

use bytes::Bytes;
use std::cmp::Ordering;
use std::fmt;

/// A clustering key, or a prefix of one.
///
/// Components compare as unsigned bytes, left to right; a prefix sorts
/// before any key it is a prefix of.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClusteringKey {
    components: Vec<Bytes>,
}

impl ClusteringKey {
    /// Creates a clustering key from its components.
    pub fn new<I, T>(components: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Bytes>,
    {
        Self {
            components: components.into_iter().map(Into::into).collect(),
        }
    }

    /// The empty prefix.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The components.
    pub fn components(&self) -> &[Bytes] {
        &self.components
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns true for the empty prefix.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl fmt::Display for ClusteringKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, component) in self.components.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            for byte in component.iter() {
                write!(f, "{byte:02x}")?;
            }
        }
        write!(f, "]")
    }
}

/// Where a position sits relative to its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BoundWeight {
    /// Just before every key with this prefix.
    Before,
    /// At the key itself.
    At,
    /// Just after every key with this prefix.
    After,
}

/// A position in a partition's clustering order.
///
/// Rows sit [`BoundWeight::At`] their key; range tombstone changes sit
/// before or after a key prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Position {
    key: ClusteringKey,
    weight: BoundWeight,
}

impl Position {
    /// Creates a position.
    pub fn new(key: ClusteringKey, weight: BoundWeight) -> Self {
        Self { key, weight }
    }

    /// Position of the row with `key`.
    pub fn at_key(key: ClusteringKey) -> Self {
        Self::new(key, BoundWeight::At)
    }

    /// Position before all keys with prefix `key`.
    pub fn before_key(key: ClusteringKey) -> Self {
        Self::new(key, BoundWeight::Before)
    }

    /// Position after all keys with prefix `key`.
    pub fn after_key(key: ClusteringKey) -> Self {
        Self::new(key, BoundWeight::After)
    }

    /// Position before every clustering row.
    #[must_use]
    pub fn before_all_rows() -> Self {
        Self::before_key(ClusteringKey::empty())
    }

    /// Position after every clustering row.
    #[must_use]
    pub fn after_all_rows() -> Self {
        Self::after_key(ClusteringKey::empty())
    }

    /// The key prefix.
    pub fn key(&self) -> &ClusteringKey {
        &self.key
    }

    /// The bound weight.
    pub fn weight(&self) -> BoundWeight {
        self.weight
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        let a = self.key.components();
        let b = other.key.components();
        for (x, y) in a.iter().zip(b) {
            match x.cmp(y) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        // One key is a prefix of the other; the shorter one's weight
        // decides whether it sorts before or after the longer.
        match a.len().cmp(&b.len()) {
            Ordering::Equal => self.weight.cmp(&other.weight),
            Ordering::Less => match self.weight {
                BoundWeight::After => Ordering::Greater,
                BoundWeight::Before | BoundWeight::At => Ordering::Less,
            },
            Ordering::Greater => match other.weight {
                BoundWeight::After => Ordering::Less,
                BoundWeight::Before | BoundWeight::At => Ordering::Greater,
            },
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let weight = match self.weight {
            BoundWeight::Before => "before",
            BoundWeight::At => "at",
            BoundWeight::After => "after",
        };
        write!(f, "{weight} {}", self.key)
    }
}
