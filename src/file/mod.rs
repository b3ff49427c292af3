//! PE file abstraction for .NET assemblies.
//!
//! This module provides [`File`], the loader boundary of the crate: it opens a PE
//! image (from disk via a memory map, or from an in-memory buffer), validates the
//! headers with goblin, locates the CLR runtime data directory, and offers address
//! translation between RVAs and file offsets.
//!
//! Header facts needed by the report (file size, image base, entry point RVA,
//! alignments) are extracted eagerly at load time so the parsed goblin structures
//! do not need to outlive the constructor.
//!
//! # Examples
//!
//! ```rust,no_run
//! use cilgraph::File;
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("sample.dll"))?;
//! let (clr_rva, clr_size) = file.clr();
//! let clr_offset = file.rva_to_offset(clr_rva as usize)?;
//! let header = file.data_slice(clr_offset, clr_size as usize)?;
//! # Ok::<(), cilgraph::Error>(())
//! ```
//!
//! # References
//! - Microsoft PE/COFF Specification
//! - ECMA-335 6th Edition, Partition II - PE File Format

pub mod io;
pub mod parser;

use std::path::Path;

use goblin::pe::{section_table::SectionTable, PE};
use memmap2::Mmap;

use crate::{
    Error::{Empty, NotSupported},
    Result,
};

/// Backend trait for file data sources.
///
/// Abstracts over the source of PE data, allowing both on-disk (memory-mapped) and
/// in-memory representations behind one interface.
trait Backend: Send + Sync {
    /// Returns the entire data buffer.
    fn data(&self) -> &[u8];

    /// Returns the total length of the data buffer.
    fn len(&self) -> usize;
}

/// Memory-mapped file backend.
struct Physical {
    map: Mmap,
}

impl Physical {
    fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        // The map stays valid for the lifetime of this backend; the file handle
        // can be dropped once the mapping exists.
        let map = unsafe { Mmap::map(&file)? };
        Ok(Physical { map })
    }
}

impl Backend for Physical {
    fn data(&self) -> &[u8] {
        &self.map
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}

/// In-memory buffer backend.
struct Memory {
    data: Vec<u8>,
}

impl Backend for Memory {
    fn data(&self) -> &[u8] {
        &self.data
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}

/// Represents a loaded PE file with .NET metadata.
///
/// Owns the raw image data for the lifetime of one analysis run and releases it on
/// every exit path through `Drop`. Construction fails if the image is not a PE file
/// or carries no CLR runtime header; the caller treats that as a fatal load error.
pub struct File {
    data: Box<dyn Backend>,
    sections: Vec<SectionTable>,
    image_base: u64,
    entry_point_rva: u32,
    section_alignment: u32,
    file_alignment: u32,
    clr_rva: u32,
    clr_size: u32,
}

impl File {
    /// Load a PE file from disk via a memory map.
    ///
    /// # Arguments
    /// * `path` - Path of the file to load
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or mapped, is empty, is not a
    /// valid PE image, or has no CLR runtime header.
    pub fn from_file(path: &Path) -> Result<File> {
        File::from_backend(Box::new(Physical::open(path)?))
    }

    /// Load a PE file from an in-memory buffer.
    ///
    /// # Arguments
    /// * `data` - The raw image bytes
    ///
    /// # Errors
    /// Returns an error if the buffer is empty, is not a valid PE image, or has no
    /// CLR runtime header.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        File::from_backend(Box::new(Memory { data }))
    }

    fn from_backend(backend: Box<dyn Backend>) -> Result<File> {
        if backend.len() == 0 {
            return Err(Empty);
        }

        let pe = PE::parse(backend.data())?;
        let Some(optional_header) = pe.header.optional_header else {
            return Err(NotSupported);
        };

        let Some(clr) = optional_header.data_directories.get_clr_runtime_header() else {
            // A PE without a COM descriptor directory carries no .NET metadata
            return Err(NotSupported);
        };

        if clr.virtual_address == 0 || clr.size == 0 {
            return Err(NotSupported);
        }

        // 'address_of_entry_point' is the native stub entry; the managed entry point
        // token lives in the Cor20 header and is resolved by the metadata layer.
        #[allow(clippy::cast_possible_truncation)]
        let entry_point_rva = optional_header.standard_fields.address_of_entry_point as u32;

        let file = File {
            sections: pe.sections.clone(),
            image_base: optional_header.windows_fields.image_base,
            entry_point_rva,
            section_alignment: optional_header.windows_fields.section_alignment,
            file_alignment: optional_header.windows_fields.file_alignment,
            clr_rva: clr.virtual_address,
            clr_size: clr.size,
            data: backend,
        };

        // The directory has to land inside the image
        file.rva_to_offset(file.clr_rva as usize)?;

        Ok(file)
    }

    /// Total size of the loaded image in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the loaded image is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }

    /// The preferred load address of the image
    #[must_use]
    pub fn imagebase(&self) -> u64 {
        self.image_base
    }

    /// RVA of the native entry point stub
    #[must_use]
    pub fn entry_point_rva(&self) -> u32 {
        self.entry_point_rva
    }

    /// In-memory alignment of sections
    #[must_use]
    pub fn section_alignment(&self) -> u32 {
        self.section_alignment
    }

    /// On-disk alignment of section data
    #[must_use]
    pub fn file_alignment(&self) -> u32 {
        self.file_alignment
    }

    /// RVA and size of the CLR runtime header (the COM descriptor data directory)
    #[must_use]
    pub fn clr(&self) -> (u32, u32) {
        (self.clr_rva, self.clr_size)
    }

    /// Iterator over the PE section table
    pub fn sections(&self) -> impl Iterator<Item = &SectionTable> {
        self.sections.iter()
    }

    /// Translate an RVA into a file offset using the section table.
    ///
    /// RVAs below the first section map identically (header region).
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOffset`] if the RVA falls outside every
    /// section and past the header region.
    pub fn rva_to_offset(&self, rva: usize) -> Result<usize> {
        for section in &self.sections {
            let va = section.virtual_address as usize;
            let vsize = std::cmp::max(section.virtual_size, section.size_of_raw_data) as usize;

            if rva >= va && rva < va + vsize {
                let offset = rva - va + section.pointer_to_raw_data as usize;
                if offset >= self.data.len() {
                    return Err(crate::Error::InvalidOffset);
                }

                return Ok(offset);
            }
        }

        // Header region before the first section is mapped 1:1
        if let Some(first) = self.sections.first() {
            if rva < first.pointer_to_raw_data as usize && rva < self.data.len() {
                return Ok(rva);
            }
        }

        Err(crate::Error::InvalidOffset)
    }

    /// Returns a bounds-checked slice of the image data.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the requested range exceeds the image.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let Some(end) = offset.checked_add(len) else {
            return Err(crate::Error::OutOfBounds);
        };

        if end > self.data.len() {
            return Err(crate::Error::OutOfBounds);
        }

        Ok(&self.data.data()[offset..end])
    }

    /// Returns the image data from `offset` to the end of the containing section.
    ///
    /// Method bodies state their own length in their header, so callers get the
    /// longest safely addressable slice and let the body parser bound the read.
    ///
    /// # Errors
    /// Returns an error if `rva` cannot be translated.
    pub fn data_from_rva(&self, rva: usize) -> Result<&[u8]> {
        let offset = self.rva_to_offset(rva)?;
        Ok(&self.data.data()[offset..])
    }

    /// The entire image data
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.data()
    }
}

impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File")
            .field("len", &self.data.len())
            .field("sections", &self.sections.len())
            .field("clr_rva", &self.clr_rva)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_rejected() {
        match File::from_mem(Vec::new()) {
            Err(Empty) => {}
            _ => panic!("empty input must be rejected"),
        }
    }

    #[test]
    fn garbage_input_rejected() {
        let data = vec![0x42u8; 128];
        assert!(File::from_mem(data).is_err());
    }

    #[test]
    fn truncated_dos_header_rejected() {
        // Valid MZ magic, nothing else
        let mut data = vec![0u8; 0x40];
        data[0] = b'M';
        data[1] = b'Z';
        assert!(File::from_mem(data).is_err());
    }
}
