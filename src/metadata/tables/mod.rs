//! Metadata table infrastructure for the `#~` stream.
//!
//! The .NET metadata format stores type, method, and reference information in a
//! series of structured tables (ECMA-335 II.22). This module provides:
//!
//! - [`TableId`] - enumeration of all ECMA-335 metadata tables
//! - [`TableInfo`] - row counts and index widths for the loaded image
//! - [`CodedIndex`] / [`CodedIndexType`] - compact cross-table references
//! - [`RowRead`] - trait for reading typed table rows
//! - [`MetadataTable`] - lazy, typed view over one table's raw bytes
//! - [`TablesStream`] - the parsed `#~` stream header and table directory
//!
//! Only the tables this analyzer consumes have typed row definitions (in
//! [`rows`]); every other table is skipped using its computed row size.
//!
//! # References
//! - [ECMA-335 6th Edition](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - Partition II, Sections 22 and 24.2.6

mod info;
mod rows;
mod stream;

use std::marker::PhantomData;

pub use info::{CodedIndex, CodedIndexType, TableInfo, TableInfoRef, TableRowInfo};
pub use rows::{
    AssemblyRaw, AssemblyRefRaw, CustomAttributeRaw, ExportedTypeRaw, GenericParamRaw, ImplMapRaw,
    MemberRefRaw, MethodDefRaw, MethodSpecRaw, ModuleRaw, ModuleRefRaw, NestedClassRaw, ParamRaw,
    TypeAttributes, TypeDefRaw, TypeRefRaw, TypeSpecRaw,
};
pub use stream::TablesStream;

use crate::Result;
use strum::{EnumCount, EnumIter};

/// Enumeration of all metadata tables defined by ECMA-335.
///
/// The discriminant of each variant is the table number as it appears in the high
/// byte of a metadata token and in the `valid` bit-vector of the `#~` stream.
#[derive(Debug, Hash, Eq, PartialEq, Clone, Copy, PartialOrd, Ord, EnumIter, EnumCount)]
#[repr(usize)]
pub enum TableId {
    /// Current module descriptor, `TableId` = 0x00
    Module = 0x00,
    /// References to types defined in other modules, `TableId` = 0x01
    TypeRef = 0x01,
    /// Type definitions of this module, `TableId` = 0x02
    TypeDef = 0x02,
    /// Field indirection for edit-and-continue, `TableId` = 0x03
    FieldPtr = 0x03,
    /// Field definitions, `TableId` = 0x04
    Field = 0x04,
    /// Method indirection for edit-and-continue, `TableId` = 0x05
    MethodPtr = 0x05,
    /// Method definitions, `TableId` = 0x06
    MethodDef = 0x06,
    /// Param indirection for edit-and-continue, `TableId` = 0x07
    ParamPtr = 0x07,
    /// Parameter definitions, `TableId` = 0x08
    Param = 0x08,
    /// Interface implementations, `TableId` = 0x09
    InterfaceImpl = 0x09,
    /// References to members of other types, `TableId` = 0x0A
    MemberRef = 0x0A,
    /// Compile-time constant values, `TableId` = 0x0B
    Constant = 0x0B,
    /// Custom attribute attachments, `TableId` = 0x0C
    CustomAttribute = 0x0C,
    /// Marshalling descriptors, `TableId` = 0x0D
    FieldMarshal = 0x0D,
    /// Declarative security, `TableId` = 0x0E
    DeclSecurity = 0x0E,
    /// Class layout directives, `TableId` = 0x0F
    ClassLayout = 0x0F,
    /// Field layout directives, `TableId` = 0x10
    FieldLayout = 0x10,
    /// Standalone signatures, `TableId` = 0x11
    StandAloneSig = 0x11,
    /// Event map, `TableId` = 0x12
    EventMap = 0x12,
    /// Event indirection for edit-and-continue, `TableId` = 0x13
    EventPtr = 0x13,
    /// Event definitions, `TableId` = 0x14
    Event = 0x14,
    /// Property map, `TableId` = 0x15
    PropertyMap = 0x15,
    /// Property indirection for edit-and-continue, `TableId` = 0x16
    PropertyPtr = 0x16,
    /// Property definitions, `TableId` = 0x17
    Property = 0x17,
    /// Method semantics (getter/setter/...), `TableId` = 0x18
    MethodSemantics = 0x18,
    /// Method implementation overrides, `TableId` = 0x19
    MethodImpl = 0x19,
    /// References to other modules, `TableId` = 0x1A
    ModuleRef = 0x1A,
    /// Type specifications (constructed types), `TableId` = 0x1B
    TypeSpec = 0x1B,
    /// P/Invoke mappings, `TableId` = 0x1C
    ImplMap = 0x1C,
    /// Field RVAs for initialized data, `TableId` = 0x1D
    FieldRva = 0x1D,
    /// Edit-and-continue log, `TableId` = 0x1E
    EncLog = 0x1E,
    /// Edit-and-continue map, `TableId` = 0x1F
    EncMap = 0x1F,
    /// Assembly manifest, `TableId` = 0x20
    Assembly = 0x20,
    /// Assembly processor (unused), `TableId` = 0x21
    AssemblyProcessor = 0x21,
    /// Assembly OS (unused), `TableId` = 0x22
    AssemblyOs = 0x22,
    /// References to other assemblies, `TableId` = 0x23
    AssemblyRef = 0x23,
    /// Assembly reference processor (unused), `TableId` = 0x24
    AssemblyRefProcessor = 0x24,
    /// Assembly reference OS (unused), `TableId` = 0x25
    AssemblyRefOs = 0x25,
    /// Files of a multi-module assembly, `TableId` = 0x26
    File = 0x26,
    /// Types exported from other modules of this assembly, `TableId` = 0x27
    ExportedType = 0x27,
    /// Manifest resources, `TableId` = 0x28
    ManifestResource = 0x28,
    /// Nesting relationships between types, `TableId` = 0x29
    NestedClass = 0x29,
    /// Generic parameter definitions, `TableId` = 0x2A
    GenericParam = 0x2A,
    /// Generic method instantiations, `TableId` = 0x2B
    MethodSpec = 0x2B,
    /// Generic parameter constraints, `TableId` = 0x2C
    GenericParamConstraint = 0x2C,
}

impl TableId {
    /// Convert a raw table number (e.g. the high byte of a token) into a `TableId`
    #[must_use]
    pub fn from_number(number: u8) -> Option<TableId> {
        use strum::IntoEnumIterator;
        TableId::iter().find(|id| *id as usize == number as usize)
    }
}

/// Trait for types that represent one row of a metadata table.
///
/// Implementations provide their table identity, row width, and parsing logic,
/// enabling generic lazy table access through [`MetadataTable`].
pub trait RowRead: Sized {
    /// The table this row type belongs to
    const TABLE: TableId;

    /// Calculates the size in bytes of a single row for this table type.
    ///
    /// Variable-width fields (heap indexes, table indexes, coded indexes) are 2 or
    /// 4 bytes depending on the sizes recorded in `info`.
    fn row_size(info: &TableInfo) -> u32;

    /// Reads and parses a single row from `data` at `offset`, advancing `offset`.
    ///
    /// `rid` is the 1-based row identifier per the CLI specification.
    ///
    /// # Errors
    /// Returns an error if the buffer contains insufficient data for a complete row.
    fn read_row(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self>;
}

/// Typed, lazy view over the raw bytes of one metadata table.
///
/// Rows are parsed on demand; nothing is copied out of the underlying stream.
pub struct MetadataTable<'a, T> {
    data: &'a [u8],
    row_count: u32,
    row_size: u32,
    info: TableInfoRef,
    _phantom: PhantomData<T>,
}

impl<'a, T: RowRead> MetadataTable<'a, T> {
    /// Create a table view over `data`, which must start at the table's first row.
    pub(crate) fn new(data: &'a [u8], row_count: u32, info: TableInfoRef) -> Self {
        MetadataTable {
            data,
            row_count,
            row_size: T::row_size(&info),
            info,
            _phantom: PhantomData,
        }
    }

    /// Number of rows in this table
    #[must_use]
    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    /// Size in bytes of a single row
    #[must_use]
    pub fn row_size(&self) -> u32 {
        self.row_size
    }

    /// Retrieve a row by its 1-based index.
    ///
    /// Returns `None` for index 0 (the null row), out-of-range indexes, and rows
    /// that fail to parse.
    #[must_use]
    pub fn get(&self, index: u32) -> Option<T> {
        if index == 0 || index > self.row_count {
            return None;
        }

        let mut offset = (index as usize - 1) * self.row_size as usize;
        T::read_row(self.data, &mut offset, index, &self.info).ok()
    }

    /// Sequential iterator over all rows
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (1..=self.row_count).filter_map(move |rid| self.get(rid))
    }
}
