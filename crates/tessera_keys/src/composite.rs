//! Composite encoding of multi-component keys.
//!
//! Compound keys store each component as a big-endian `u16` length, the
//! component bytes and a single end-of-component byte (always zero for
//! partition keys). Single-column keys are stored as the raw component.

use crate::error::{KeyResult, MarshalError};

/// Largest component that fits behind a `u16` length prefix.
pub const MAX_COMPONENT_LEN: usize = u16::MAX as usize;

/// Serializes key components.
///
/// # Errors
///
/// Fails if a compound component is longer than [`MAX_COMPONENT_LEN`], or
/// if a non-compound key is given anything but exactly one component.
pub fn serialize_value<I, T>(components: I, compound: bool) -> KeyResult<Vec<u8>>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut buffer = Vec::new();
    let mut count = 0usize;

    for component in components {
        let component = component.as_ref();
        count += 1;
        if !compound {
            buffer.extend_from_slice(component);
            continue;
        }
        let len = u16::try_from(component.len()).map_err(|_| MarshalError::ComponentTooLong {
            len: component.len(),
            max: MAX_COMPONENT_LEN,
        })?;
        buffer.extend_from_slice(&len.to_be_bytes());
        buffer.extend_from_slice(component);
        buffer.push(0);
    }

    if !compound && count != 1 {
        return Err(MarshalError::ComponentCount {
            expected: 1,
            actual: count,
        });
    }
    Ok(buffer)
}

/// A borrowed view over an encoded key.
#[derive(Debug, Clone, Copy)]
pub struct CompositeView<'a> {
    data: &'a [u8],
    compound: bool,
}

impl<'a> CompositeView<'a> {
    /// Creates a view over encoded bytes.
    pub fn new(data: &'a [u8], compound: bool) -> Self {
        Self { data, compound }
    }

    /// Iterates over the components.
    pub fn components(&self) -> Components<'a> {
        Components {
            data: self.data,
            pos: 0,
            compound: self.compound,
            done: false,
        }
    }

    /// Splits the key into its component byte ranges.
    ///
    /// # Errors
    ///
    /// Returns the first structural error found.
    pub fn explode(&self) -> KeyResult<Vec<&'a [u8]>> {
        self.components().collect()
    }
}

/// Iterator over the components of an encoded key.
#[derive(Debug, Clone)]
pub struct Components<'a> {
    data: &'a [u8],
    pos: usize,
    compound: bool,
    done: bool,
}

impl<'a> Iterator for Components<'a> {
    type Item = KeyResult<&'a [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if !self.compound {
            self.done = true;
            return Some(Ok(self.data));
        }
        if self.pos >= self.data.len() {
            self.done = true;
            return None;
        }

        let start = self.pos;
        let Some(prefix) = self.data.get(start..start + 2) else {
            self.done = true;
            return Some(Err(MarshalError::Truncated { offset: start }));
        };
        let len = usize::from(u16::from_be_bytes([prefix[0], prefix[1]]));
        let body = start + 2;
        let eoc_pos = body + len;
        if eoc_pos >= self.data.len() {
            self.done = true;
            return Some(Err(MarshalError::Truncated { offset: start }));
        }

        let eoc = self.data[eoc_pos];
        if eoc != 0 {
            self.done = true;
            return Some(Err(MarshalError::InvalidEndOfComponent {
                byte: eoc,
                offset: eoc_pos,
            }));
        }
        self.pos = eoc_pos + 1;
        Some(Ok(&self.data[body..eoc_pos]))
    }
}
