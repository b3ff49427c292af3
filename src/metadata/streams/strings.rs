//! String Heap (`#Strings`) for .NET Metadata
//!
//! Stores identifier strings in UTF-8 encoding, referenced by offset from the
//! metadata tables.
//!
//! # Reference
//! - [ECMA-335 II.24.2.3](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use std::{ffi::CStr, str};

use crate::{Error::OutOfBounds, Result};

/// '#Strings' holds the identifiers referenced from other tables within the CIL
/// metadata: type names, namespaces, method names and the like.
///
/// # Examples
///
/// ```rust
/// use cilgraph::metadata::streams::Strings;
/// let data = &[0u8, b'H', b'e', b'l', b'l', b'o', 0u8];
/// let strings = Strings::from(data)?;
/// assert_eq!(strings.get(1)?, "Hello");
/// # Ok::<(), cilgraph::Error>(())
/// ```
pub struct Strings<'a> {
    data: &'a [u8],
}

impl<'a> Strings<'a> {
    /// Create a `Strings` object from a sequence of bytes.
    ///
    /// # Arguments
    /// * `data` - The byte slice from which this object shall be created
    ///
    /// # Errors
    /// Returns an error if the string heap data is empty or does not begin with the
    /// mandatory leading null byte.
    pub fn from(data: &'a [u8]) -> Result<Strings<'a>> {
        if data.is_empty() || data[0] != 0 {
            return Err(malformed_error!("Provided #Strings heap is invalid"));
        }

        Ok(Strings { data })
    }

    /// Get a view of the string at the provided heap offset.
    ///
    /// # Arguments
    /// * `index` - The offset within the heap (comes from metadata tables)
    ///
    /// # Errors
    /// Returns an error if the index is out of bounds or the string data is invalid UTF-8.
    pub fn get(&self, index: usize) -> Result<&'a str> {
        if index >= self.data.len() {
            return Err(OutOfBounds);
        }

        match CStr::from_bytes_until_nul(&self.data[index..]) {
            Ok(result) => match result.to_str() {
                Ok(result) => Ok(result),
                Err(_) => Err(malformed_error!("Invalid string at index - {}", index)),
            },
            Err(_) => Err(malformed_error!("Invalid string at index - {}", index)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let data: [u8; 34] = [
            0x00,
            b'O', b'u', b't', b'e', b'r', 0x00,
            b'I', b'n', b'n', b'e', b'r', 0x00,
            b'S', b'y', b's', b't', b'e', b'm', b'.', b'C', b'o', b'n', b's', b'o', b'l', b'e', 0x00,
            b'.', b'c', b't', b'o', b'r', 0x00,
        ];

        let strings = Strings::from(&data).unwrap();

        assert_eq!(strings.get(1).unwrap(), "Outer");
        assert_eq!(strings.get(7).unwrap(), "Inner");
        assert_eq!(strings.get(13).unwrap(), "System.Console");
        assert_eq!(strings.get(28).unwrap(), ".ctor");

        // Offsets into the middle of an entry yield the suffix
        assert_eq!(strings.get(3).unwrap(), "ter");
    }

    #[test]
    fn empty_heap_rejected() {
        assert!(Strings::from(&[]).is_err());
        assert!(Strings::from(&[0x41]).is_err());
    }

    #[test]
    fn out_of_bounds_index() {
        let data = [0x00, b'A', 0x00];
        let strings = Strings::from(&data).unwrap();
        assert!(strings.get(3).is_err());
        assert!(strings.get(100).is_err());
    }

    #[test]
    fn unterminated_string_rejected() {
        let data = [0x00, b'A', b'B'];
        let strings = Strings::from(&data).unwrap();
        assert!(strings.get(1).is_err());
    }
}
