//! User String Heap (`#US`) for .NET Metadata
//!
//! Stores user-defined string literals in UTF-16 encoding, referenced by `ldstr`
//! instructions through string tokens (table byte 0x70).
//!
//! # Reference
//! - [ECMA-335 II.24.2.4](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{file::parser::Parser, Error::OutOfBounds, Result};

use widestring::U16String;

/// The `UserStrings` object provides access to the '#US' heap, which contains all
/// user defined string literals of the assembly.
///
/// Each entry is prefixed with its compressed byte length; the length counts the
/// UTF-16 code units plus one trailing flag byte.
///
/// # Examples
///
/// ```rust
/// use cilgraph::metadata::streams::UserStrings;
/// let data = &[0u8, 0x05, b'H', 0, b'i', 0, 0x00];
/// let us = UserStrings::from(data)?;
/// assert_eq!(us.get(1)?.to_string_lossy(), "Hi");
/// # Ok::<(), cilgraph::Error>(())
/// ```
pub struct UserStrings<'a> {
    data: &'a [u8],
}

impl<'a> UserStrings<'a> {
    /// Create a `UserStrings` object from a sequence of bytes.
    ///
    /// # Arguments
    /// * `data` - The byte slice from which this object shall be created
    ///
    /// # Errors
    /// Returns an error if the user string heap data is empty or malformed.
    pub fn from(data: &'a [u8]) -> Result<UserStrings<'a>> {
        if data.is_empty() || data[0] != 0 {
            return Err(OutOfBounds);
        }

        Ok(UserStrings { data })
    }

    /// Get a view of the string at the provided heap offset.
    ///
    /// # Arguments
    /// * `index` - The offset within the heap (the low 24 bits of a string token)
    ///
    /// # Errors
    /// Returns an error if the index is out of bounds or the entry is malformed.
    pub fn get(&self, index: usize) -> Result<U16String> {
        if index >= self.data.len() {
            return Err(OutOfBounds);
        }

        let mut parser = Parser::new(&self.data[index..]);
        let byte_len = parser.read_compressed_uint()? as usize;
        let payload = parser.read_bytes(byte_len)?;

        // The declared length covers the UTF-16 code units plus one flag byte;
        // an empty string is encoded as a bare 0x00 length.
        let utf16_bytes = if byte_len % 2 == 1 {
            &payload[..byte_len - 1]
        } else {
            payload
        };

        if utf16_bytes.len() % 2 != 0 {
            return Err(malformed_error!(
                "Invalid user string data length at index - {}",
                index
            ));
        }

        let units: Vec<u16> = utf16_bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        Ok(U16String::from_vec(units))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let data: [u8; 29] = [
            0x00,
            0x1B, // 27 bytes: 13 UTF-16 units + flag byte
            0x48, 0x00, 0x65, 0x00, 0x6C, 0x00, 0x6C, 0x00, 0x6F, 0x00, 0x2C, 0x00, 0x20, 0x00,
            0x57, 0x00, 0x6F, 0x00, 0x72, 0x00, 0x6C, 0x00, 0x64, 0x00, 0x21, 0x00,
            0x00, // flag byte
        ];

        let us = UserStrings::from(&data).unwrap();
        assert_eq!(us.get(1).unwrap().to_string_lossy(), "Hello, World!");
    }

    #[test]
    fn empty_entry() {
        let data = [0x00, 0x00];
        let us = UserStrings::from(&data).unwrap();
        assert_eq!(us.get(1).unwrap().to_string_lossy(), "");
    }

    #[test]
    fn invalid_heap_rejected() {
        assert!(UserStrings::from(&[]).is_err());
        assert!(UserStrings::from(&[0x22, 0x1B]).is_err());
    }

    #[test]
    fn truncated_entry_rejected() {
        let data = [0x00, 0x1B, 0x48, 0x00];
        let us = UserStrings::from(&data).unwrap();
        assert!(us.get(1).is_err());
    }
}
