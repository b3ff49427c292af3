//! GUID Heap (`#GUID`) for .NET Metadata
//!
//! Stores 16-byte GUIDs referenced by 1-based index from the metadata tables,
//! most prominently the module version id (MVID).
//!
//! # Reference
//! - [ECMA-335 II.24.2.5](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{Error::OutOfBounds, Result};

use uguid::Guid;

/// The `#GUID` heap is a simple array of 16-byte GUIDs. Unlike the other heaps it is
/// indexed by position (1-based), not by byte offset.
///
/// # Examples
///
/// ```rust
/// use cilgraph::metadata::streams::Guids;
/// let data = [0u8; 16];
/// let guids = Guids::from(&data)?;
/// assert_eq!(guids.get(1)?.to_string(), "00000000-0000-0000-0000-000000000000");
/// # Ok::<(), cilgraph::Error>(())
/// ```
pub struct Guids<'a> {
    data: &'a [u8],
}

impl<'a> Guids<'a> {
    /// Create a `Guids` object from a sequence of bytes.
    ///
    /// # Arguments
    /// * `data` - The byte slice from which this object shall be created
    ///
    /// # Errors
    /// Returns an error if the heap size is not a multiple of 16.
    pub fn from(data: &'a [u8]) -> Result<Guids<'a>> {
        if data.len() % 16 != 0 {
            return Err(malformed_error!(
                "#GUID heap size is not a multiple of 16 - {}",
                data.len()
            ));
        }

        Ok(Guids { data })
    }

    /// Get the GUID at the provided 1-based index.
    ///
    /// # Arguments
    /// * `index` - The 1-based position within the heap (comes from metadata tables)
    ///
    /// # Errors
    /// Returns an error if the index is zero or out of bounds.
    pub fn get(&self, index: usize) -> Result<Guid> {
        if index == 0 {
            return Err(OutOfBounds);
        }

        let offset = (index - 1) * 16;
        let Some(end) = offset.checked_add(16) else {
            return Err(OutOfBounds);
        };

        if end > self.data.len() {
            return Err(OutOfBounds);
        }

        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&self.data[offset..end]);
        Ok(Guid::from_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let data: [u8; 32] = [
            // Mixed-endian GUID layout: {12345678-9ABC-DEF0-1122-334455667788}
            0x78, 0x56, 0x34, 0x12, 0xBC, 0x9A, 0xF0, 0xDE,
            0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];

        let guids = Guids::from(&data).unwrap();

        let first = guids.get(1).unwrap();
        assert_eq!(
            first.to_string().to_uppercase(),
            "12345678-9ABC-DEF0-1122-334455667788"
        );

        let second = guids.get(2).unwrap();
        assert_eq!(second, Guid::ZERO);
    }

    #[test]
    fn zero_index_rejected() {
        let data = [0u8; 16];
        let guids = Guids::from(&data).unwrap();
        assert!(guids.get(0).is_err());
    }

    #[test]
    fn out_of_bounds_rejected() {
        let data = [0u8; 16];
        let guids = Guids::from(&data).unwrap();
        assert!(guids.get(2).is_err());
    }

    #[test]
    fn unaligned_heap_rejected() {
        let data = [0u8; 17];
        assert!(Guids::from(&data).is_err());
    }
}
