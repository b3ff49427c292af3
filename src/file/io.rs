//! Low-level I/O utilities for reading little-endian values from byte buffers.
//!
//! All metadata structures in a .NET PE file are stored little-endian. This module
//! provides the [`CilIO`] conversion trait plus bounds-checked helper functions used
//! by every parsing layer of the crate.
//!
//! # Examples
//!
//! ```rust
//! use cilgraph::file::io::{read_le, read_le_at};
//!
//! let data = [0x01, 0x00, 0x00, 0x00, 0xFF];
//! let value: u32 = read_le(&data)?;
//! assert_eq!(value, 1);
//!
//! let mut offset = 4;
//! let byte: u8 = read_le_at(&data, &mut offset)?;
//! assert_eq!(byte, 0xFF);
//! assert_eq!(offset, 5);
//! # Ok::<(), cilgraph::Error>(())
//! ```

use crate::{Error::OutOfBounds, Result};

/// Conversion trait for types that can be read from little-endian byte buffers.
///
/// Implemented for the fixed-width integer and float types that appear in PE and
/// ECMA-335 structures.
pub trait CilIO: Sized {
    /// The width of the value in bytes
    const SIZE: usize;

    /// Convert a byte slice (at least `SIZE` bytes) into the value
    fn from_le_slice(data: &[u8]) -> Self;
}

macro_rules! impl_cil_io {
    ($($ty:ty),*) => {
        $(
            impl CilIO for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn from_le_slice(data: &[u8]) -> Self {
                    let mut bytes = [0u8; std::mem::size_of::<$ty>()];
                    bytes.copy_from_slice(&data[..std::mem::size_of::<$ty>()]);
                    <$ty>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_cil_io!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Reads a value of type `T` from the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than the size of `T`.
pub fn read_le<T: CilIO>(data: &[u8]) -> Result<T> {
    if data.len() < T::SIZE {
        return Err(OutOfBounds);
    }

    Ok(T::from_le_slice(data))
}

/// Reads a value of type `T` from `data` at `offset`, advancing `offset` past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the read would exceed the buffer.
pub fn read_le_at<T: CilIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let Some(end) = offset.checked_add(T::SIZE) else {
        return Err(OutOfBounds);
    };

    if end > data.len() {
        return Err(OutOfBounds);
    }

    let value = T::from_le_slice(&data[*offset..]);
    *offset = end;
    Ok(value)
}

/// Reads a 2- or 4-byte index from `data` at `offset`, advancing `offset` past it.
///
/// Metadata tables use 2-byte indexes into heaps and other tables unless the target
/// is large (more than `u16::MAX` entries), in which case indexes widen to 4 bytes.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the read would exceed the buffer.
pub fn read_le_at_dyn(data: &[u8], offset: &mut usize, is_large: bool) -> Result<u32> {
    if is_large {
        read_le_at::<u32>(data, offset)
    } else {
        Ok(u32::from(read_le_at::<u16>(data, offset)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_le_primitives() {
        let data = [0x78, 0x56, 0x34, 0x12, 0xF0, 0xDE, 0xBC, 0x9A];

        assert_eq!(read_le::<u8>(&data).unwrap(), 0x78);
        assert_eq!(read_le::<u16>(&data).unwrap(), 0x5678);
        assert_eq!(read_le::<u32>(&data).unwrap(), 0x12345678);
        assert_eq!(read_le::<u64>(&data).unwrap(), 0x9ABC_DEF0_1234_5678);
        assert_eq!(read_le::<i8>(&[0xFF]).unwrap(), -1);
        assert_eq!(read_le::<i32>(&[0xFF, 0xFF, 0xFF, 0xFF]).unwrap(), -1);
    }

    #[test]
    fn read_le_out_of_bounds() {
        let data = [0x01, 0x02];
        assert!(read_le::<u32>(&data).is_err());
        assert!(read_le::<u64>(&data).is_err());
        assert!(read_le::<u16>(&data).is_ok());
    }

    #[test]
    fn read_le_at_advances_offset() {
        let data = [0x01, 0x00, 0x02, 0x00, 0x03];
        let mut offset = 0;

        assert_eq!(read_le_at::<u16>(&data, &mut offset).unwrap(), 1);
        assert_eq!(read_le_at::<u16>(&data, &mut offset).unwrap(), 2);
        assert_eq!(offset, 4);
        assert_eq!(read_le_at::<u8>(&data, &mut offset).unwrap(), 3);
        assert!(read_le_at::<u8>(&data, &mut offset).is_err());
        assert_eq!(offset, 5);
    }

    #[test]
    fn read_le_at_dyn_widths() {
        let data = [0x34, 0x12, 0x78, 0x56, 0x34, 0x12];
        let mut offset = 0;

        assert_eq!(read_le_at_dyn(&data, &mut offset, false).unwrap(), 0x1234);
        assert_eq!(
            read_le_at_dyn(&data, &mut offset, true).unwrap(),
            0x12345678
        );
        assert_eq!(offset, 6);
    }

    #[test]
    fn read_le_at_offset_overflow() {
        let data = [0u8; 4];
        let mut offset = usize::MAX - 1;
        assert!(read_le_at::<u32>(&data, &mut offset).is_err());
    }
}
