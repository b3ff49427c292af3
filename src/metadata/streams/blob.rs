//! Blob Heap (`#Blob`) for .NET Metadata
//!
//! Stores binary data such as signatures, referenced by offset from the metadata
//! tables. Each entry carries its size as a compressed integer prefix.
//!
//! # Reference
//! - [ECMA-335 II.24.2.4](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{file::parser::Parser, Error::OutOfBounds, Result};

/// '#Blob' points to streams of bytes. Each valid blob is pointed to by another
/// table index, and each contains its size encoded in the leading bytes:
///
/// * First byte `0bbbbbbb` - the blob holds `bbbbbbb` bytes of data.
/// * First bytes `10bbbbbb x` - the blob holds `(bbbbbb << 8 + x)` bytes.
/// * First bytes `110bbbbb x y z` - the blob holds `(bbbbb << 24 + x << 16 + y << 8 + z)` bytes.
///
/// # Examples
///
/// ```rust
/// use cilgraph::metadata::streams::Blob;
/// let data = &[0u8, 0x03, 0x41, 0x42, 0x43];
/// let blob = Blob::from(data)?;
/// assert_eq!(blob.get(1)?, &[0x41, 0x42, 0x43]);
/// # Ok::<(), cilgraph::Error>(())
/// ```
pub struct Blob<'a> {
    data: &'a [u8],
}

impl<'a> Blob<'a> {
    /// Create a `Blob` object from a sequence of bytes.
    ///
    /// # Arguments
    /// * `data` - The byte slice from which this object shall be created
    ///
    /// # Errors
    /// Returns an error if the data is empty or doesn't start with a null byte.
    pub fn from(data: &'a [u8]) -> Result<Blob<'a>> {
        if data.is_empty() || data[0] != 0 {
            return Err(malformed_error!("Invalid memory for #Blob heap"));
        }

        Ok(Blob { data })
    }

    /// Get a view of the bytes at the provided heap offset.
    ///
    /// # Arguments
    /// * `index` - The offset within the heap (comes from metadata tables)
    ///
    /// # Errors
    /// Returns an error if the index is out of bounds or the blob length prefix
    /// cannot be parsed.
    pub fn get(&self, index: usize) -> Result<&'a [u8]> {
        if index > self.data.len() {
            return Err(OutOfBounds);
        }

        let mut parser = Parser::new(&self.data[index..]);
        let len = parser.read_compressed_uint()? as usize;
        let skip = parser.pos();

        let Some(data_start) = index.checked_add(skip) else {
            return Err(OutOfBounds);
        };

        let Some(data_end) = data_start.checked_add(len) else {
            return Err(OutOfBounds);
        };

        if data_start > self.data.len() || data_end > self.data.len() {
            return Err(OutOfBounds);
        }

        Ok(&self.data[data_start..data_end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let data = [
            0x00,
            0x03, 0x41, 0x42, 0x43,     // 3-byte blob at offset 1
            0x00,                       // empty blob at offset 5
            0x02, 0x44, 0x45,           // 2-byte blob at offset 6
        ];

        let blob = Blob::from(&data).unwrap();

        assert_eq!(blob.get(1).unwrap(), &[0x41, 0x42, 0x43]);
        assert_eq!(blob.get(5).unwrap(), &[] as &[u8]);
        assert_eq!(blob.get(6).unwrap(), &[0x44, 0x45]);
    }

    #[test]
    fn two_byte_length_prefix() {
        // 10bbbbbb x form: 0x81 0x00 -> length 0x100
        let mut data = vec![0x00, 0x81, 0x00];
        data.extend(std::iter::repeat(0xAA).take(0x100));

        let blob = Blob::from(&data).unwrap();
        let entry = blob.get(1).unwrap();
        assert_eq!(entry.len(), 0x100);
        assert!(entry.iter().all(|byte| *byte == 0xAA));
    }

    #[test]
    fn invalid_heap_rejected() {
        assert!(Blob::from(&[]).is_err());
        assert!(Blob::from(&[0x01, 0x02]).is_err());
    }

    #[test]
    fn truncated_blob_rejected() {
        let data = [0x00, 0x05, 0x41];
        let blob = Blob::from(&data).unwrap();
        assert!(blob.get(1).is_err());
    }
}
