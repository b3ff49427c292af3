//! Metadata root header and stream directory for .NET assemblies.
//!
//! The metadata root is the entry point for reading physical metadata. It carries the
//! version string and the stream directory used to locate `#~`, `#Strings`, `#US`,
//! `#GUID` and `#Blob`.
//!
//! # Reference
//! - [ECMA-335 II.24.2.1](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{
    file::io::{read_le, read_le_at},
    metadata::streams::StreamHeader,
    Error::OutOfBounds,
    Result,
};

/// The MAGIC value indicating the CIL metadata header
pub const CIL_HEADER_MAGIC: u32 = 0x424A_5342;

/// The header of the physical metadata, providing the information necessary to locate
/// all metadata streams.
pub struct Root {
    /// Magic signature for physical metadata: 0x424A5342
    pub signature: u32,
    /// `MajorVersion`
    pub major_version: u16,
    /// `MinorVersion`
    pub minor_version: u16,
    /// Number of bytes allocated to hold the version string
    pub length: u32,
    /// 'VersionString\0'
    pub version: String,
    /// Reserved, always 0
    pub flags: u16,
    /// Streams
    pub stream_headers: Vec<StreamHeader>,
}

impl Root {
    /// Reads a [`Root`] metadata header from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice from which this object shall be read
    ///
    /// # Errors
    /// Returns an error if the data is too short, the signature is invalid, or the
    /// stream directory is malformed.
    pub fn read(data: &[u8]) -> Result<Root> {
        if data.len() < 20 {
            return Err(OutOfBounds);
        }

        let signature = read_le::<u32>(data)?;
        if signature != CIL_HEADER_MAGIC {
            return Err(malformed_error!(
                "CIL_HEADER_MAGIC does not match - {:#010X}",
                signature
            ));
        }

        let version_length = read_le::<u32>(&data[12..])? as usize;
        if version_length > 256 {
            return Err(malformed_error!(
                "Version string length out of range - {}",
                version_length
            ));
        }

        let Some(version_end) = version_length.checked_add(16) else {
            return Err(OutOfBounds);
        };
        if version_end > data.len() {
            return Err(OutOfBounds);
        }

        // Version string is null-padded to its declared length
        let version_bytes = &data[16..version_end];
        let version = match version_bytes.iter().position(|byte| *byte == 0) {
            Some(terminator) => String::from_utf8_lossy(&version_bytes[..terminator]).into_owned(),
            None => String::from_utf8_lossy(version_bytes).into_owned(),
        };

        let mut offset = version_end;
        let flags = read_le_at::<u16>(data, &mut offset)?;
        let stream_count = read_le_at::<u16>(data, &mut offset)?;

        // No duplicates allowed, no more than the 5 defined streams possible
        if stream_count == 0 || stream_count > 5 {
            return Err(malformed_error!("Invalid stream count - {}", stream_count));
        }

        let mut streams = Vec::with_capacity(stream_count as usize);
        for _ in 0..stream_count {
            if offset > data.len() {
                return Err(OutOfBounds);
            }

            let stream = StreamHeader::from(&data[offset..])?;
            match u32::checked_add(stream.offset, stream.size) {
                Some(range) => {
                    if range as usize > data.len() {
                        return Err(OutOfBounds);
                    }
                }
                None => {
                    return Err(malformed_error!(
                        "Stream offset and size cause integer overflow - {} + {}",
                        stream.offset,
                        stream.size
                    ))
                }
            }

            let name_aligned = ((stream.name.len() + 1) + 3) & !3;
            offset += 8 + name_aligned;

            streams.push(stream);
        }

        Ok(Root {
            signature,
            major_version: read_le::<u16>(&data[4..])?,
            minor_version: read_le::<u16>(&data[6..])?,
            length: u32::try_from(version_length)
                .map_err(|_| malformed_error!("Version string length too large"))?,
            version,
            flags,
            stream_headers: streams,
        })
    }

    /// Find a stream header by name, e.g. `#~` or `#Strings`
    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&StreamHeader> {
        self.stream_headers.iter().find(|header| header.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let header_bytes = [
            0x42, 0x53, 0x4A, 0x42,             // signature
            0x01, 0x00,                         // major_version = 1
            0x01, 0x00,                         // minor_version = 1
            0x00, 0x00, 0x00, 0x00,             // reserved
            0x0C, 0x00, 0x00, 0x00,             // version length = 12
            b'v', b'4', b'.', b'0', b'.', b'3', b'0', b'3', b'1', b'9', 0x00, 0x00,
            0x00, 0x00,                         // flags
            0x02, 0x00,                         // stream count = 2

            0x6C, 0x00, 0x00, 0x00,             // stream[0] offset
            0x04, 0x00, 0x00, 0x00,             // stream[0] size
            0x23, 0x7E, 0x00, 0x00,             // "#~\0" (aligned)

            0x70, 0x00, 0x00, 0x00,             // stream[1] offset
            0x08, 0x00, 0x00, 0x00,             // stream[1] size
            0x23, 0x53, 0x74, 0x72, 0x69, 0x6E, 0x67, 0x73, 0x00, 0x00, 0x00, 0x00, // "#Strings\0"

            // padding so declared stream ranges stay in bounds
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];

        let root = Root::read(&header_bytes).unwrap();

        assert_eq!(root.signature, CIL_HEADER_MAGIC);
        assert_eq!(root.major_version, 1);
        assert_eq!(root.minor_version, 1);
        assert_eq!(root.version, "v4.0.30319");
        assert_eq!(root.stream_headers.len(), 2);
        assert_eq!(root.stream_headers[0].name, "#~");
        assert_eq!(root.stream_headers[0].offset, 0x6C);
        assert_eq!(root.stream_headers[1].name, "#Strings");
        assert!(root.stream("#~").is_some());
        assert!(root.stream("#Blob").is_none());
    }

    #[test]
    fn invalid_signature_rejected() {
        let mut data = [0u8; 64];
        data[0] = 0x41;
        assert!(Root::read(&data).is_err());
    }

    #[test]
    fn truncated_rejected() {
        let data = [0x42, 0x53, 0x4A, 0x42];
        assert!(matches!(Root::read(&data), Err(OutOfBounds)));
    }
}
