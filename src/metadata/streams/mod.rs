//! Metadata streams and heaps as defined by ECMA-335 II.24.2.
//!
//! Each heap wraps a byte slice of the physical metadata and provides bounds-checked,
//! standard-conforming access:
//!
//! - [`Strings`] - `#Strings`, UTF-8 identifier strings
//! - [`UserStrings`] - `#US`, UTF-16 user string literals
//! - [`Blob`] - `#Blob`, length-prefixed binary blobs (signatures)
//! - [`Guids`] - `#GUID`, 16-byte GUID array
//! - [`StreamHeader`] - the stream directory entries of the metadata root
//!
//! The `#~` tables stream is handled by [`crate::metadata::tables`].

mod blob;
mod guid;
mod streamheader;
mod strings;
mod userstrings;

pub use blob::Blob;
pub use guid::Guids;
pub use streamheader::StreamHeader;
pub use strings::Strings;
pub use userstrings::UserStrings;
