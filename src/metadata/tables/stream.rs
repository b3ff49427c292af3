//! The `#~` tables stream: header parsing and table directory.
//!
//! [`TablesStream`] parses the compressed metadata stream header, records the byte
//! offset and row count of every present table, and hands out typed
//! [`MetadataTable`] views on demand. Tables this analyzer does not consume are
//! skipped using their computed row sizes, which therefore must be known for every
//! table the format defines.
//!
//! # Reference
//! - [ECMA-335 II.24.2.6](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use std::sync::Arc;

use strum::IntoEnumIterator;

use crate::{
    file::io::read_le,
    metadata::tables::{
        AssemblyRaw, AssemblyRefRaw, CodedIndexType, CustomAttributeRaw, ExportedTypeRaw,
        GenericParamRaw, ImplMapRaw, MemberRefRaw, MetadataTable, MethodDefRaw, MethodSpecRaw,
        ModuleRaw, ModuleRefRaw, NestedClassRaw, ParamRaw, RowRead, TableId, TableInfo,
        TableInfoRef, TypeDefRaw, TypeRefRaw, TypeSpecRaw,
    },
    Error::OutOfBounds,
    Result,
};

/// Size in bytes of one row of `id`, given the index widths recorded in `info`.
///
/// Tables with typed row definitions delegate to their [`RowRead`] implementation;
/// the remainder are computed inline from their ECMA-335 column layout so that any
/// conforming table arrangement can be walked.
fn row_size_of(id: TableId, info: &TableInfo) -> u32 {
    let str_bytes = u32::from(info.str_bytes());
    let blob_bytes = u32::from(info.blob_bytes());
    let index = |table: TableId| u32::from(info.table_index_bytes(table));
    let coded = |ci: CodedIndexType| u32::from(info.coded_index_bytes(ci));

    match id {
        TableId::Module => ModuleRaw::row_size(info),
        TableId::TypeRef => TypeRefRaw::row_size(info),
        TableId::TypeDef => TypeDefRaw::row_size(info),
        TableId::FieldPtr => index(TableId::Field),
        TableId::Field => 2 + str_bytes + blob_bytes,
        TableId::MethodPtr => index(TableId::MethodDef),
        TableId::MethodDef => MethodDefRaw::row_size(info),
        TableId::ParamPtr => index(TableId::Param),
        TableId::Param => ParamRaw::row_size(info),
        TableId::InterfaceImpl => index(TableId::TypeDef) + coded(CodedIndexType::TypeDefOrRef),
        TableId::MemberRef => MemberRefRaw::row_size(info),
        TableId::Constant => 2 + coded(CodedIndexType::HasConstant) + blob_bytes,
        TableId::CustomAttribute => CustomAttributeRaw::row_size(info),
        TableId::FieldMarshal => coded(CodedIndexType::HasFieldMarshal) + blob_bytes,
        TableId::DeclSecurity => 2 + coded(CodedIndexType::HasDeclSecurity) + blob_bytes,
        TableId::ClassLayout => 2 + 4 + index(TableId::TypeDef),
        TableId::FieldLayout => 4 + index(TableId::Field),
        TableId::StandAloneSig => blob_bytes,
        TableId::EventMap => index(TableId::TypeDef) + index(TableId::Event),
        TableId::EventPtr => index(TableId::Event),
        TableId::Event => 2 + str_bytes + coded(CodedIndexType::TypeDefOrRef),
        TableId::PropertyMap => index(TableId::TypeDef) + index(TableId::Property),
        TableId::PropertyPtr => index(TableId::Property),
        TableId::Property => 2 + str_bytes + blob_bytes,
        TableId::MethodSemantics => {
            2 + index(TableId::MethodDef) + coded(CodedIndexType::HasSemantics)
        }
        TableId::MethodImpl => index(TableId::TypeDef) + 2 * coded(CodedIndexType::MethodDefOrRef),
        TableId::ModuleRef => ModuleRefRaw::row_size(info),
        TableId::TypeSpec => TypeSpecRaw::row_size(info),
        TableId::ImplMap => ImplMapRaw::row_size(info),
        TableId::FieldRva => 4 + index(TableId::Field),
        TableId::EncLog => 8,
        TableId::EncMap => 4,
        TableId::Assembly => AssemblyRaw::row_size(info),
        TableId::AssemblyProcessor => 4,
        TableId::AssemblyOs => 12,
        TableId::AssemblyRef => AssemblyRefRaw::row_size(info),
        TableId::AssemblyRefProcessor => 4 + index(TableId::AssemblyRef),
        TableId::AssemblyRefOs => 12 + index(TableId::AssemblyRef),
        TableId::File => 4 + str_bytes + blob_bytes,
        TableId::ExportedType => ExportedTypeRaw::row_size(info),
        TableId::ManifestResource => 4 + 4 + str_bytes + coded(CodedIndexType::Implementation),
        TableId::NestedClass => NestedClassRaw::row_size(info),
        TableId::GenericParam => GenericParamRaw::row_size(info),
        TableId::MethodSpec => MethodSpecRaw::row_size(info),
        TableId::GenericParamConstraint => {
            index(TableId::GenericParam) + coded(CodedIndexType::TypeDefOrRef)
        }
    }
}

/// The parsed header and table directory of the `#~` stream.
///
/// Holds no references into the stream data; typed table views are produced on
/// demand from the stream slice by [`TablesStream::table`].
pub struct TablesStream {
    /// Major version of the table schema, shall be 2
    pub major_version: u8,
    /// Minor version of the table schema, shall be 0
    pub minor_version: u8,
    /// Bit vector of present tables
    pub valid: u64,
    /// Bit vector of sorted tables
    pub sorted: u64,
    /// Row counts and index widths of all tables
    pub info: TableInfoRef,
    /// Per-table byte offset within the stream
    offsets: Vec<Option<(usize, u32)>>,
}

impl TablesStream {
    /// Parse the `#~` stream header and compute the table directory.
    ///
    /// # Arguments
    /// * `data` - The complete `#~` stream
    ///
    /// # Errors
    /// Returns an error if the stream is truncated, no tables are present, or
    /// valid bits above the ECMA-335 table range are set (Portable PDB tables
    /// embedded in the image are not supported).
    pub fn parse(data: &[u8]) -> Result<TablesStream> {
        if data.len() < 24 {
            return Err(OutOfBounds);
        }

        let valid = read_le::<u64>(&data[8..])?;
        if valid == 0 {
            return Err(malformed_error!("No valid rows in any of the tables"));
        }

        // Bits above GenericParamConstraint denote Portable PDB tables
        const KNOWN_TABLES: u64 = (1u64 << (TableId::GenericParamConstraint as usize + 1)) - 1;
        if valid & !KNOWN_TABLES != 0 {
            return Err(crate::Error::NotSupported);
        }

        let info = Arc::new(TableInfo::new(data, valid)?);

        let mut offsets = vec![None; TableId::GenericParamConstraint as usize + 1];
        let mut cursor = 24 + valid.count_ones() as usize * 4;

        for table_id in TableId::iter() {
            let rows = info.get(table_id).rows;
            if rows == 0 {
                continue;
            }

            let table_bytes = row_size_of(table_id, &info) as usize * rows as usize;
            let Some(end) = cursor.checked_add(table_bytes) else {
                return Err(OutOfBounds);
            };

            if end > data.len() {
                return Err(malformed_error!(
                    "Table {:?} exceeds the #~ stream - {} > {}",
                    table_id,
                    end,
                    data.len()
                ));
            }

            offsets[table_id as usize] = Some((cursor, rows));
            cursor = end;
        }

        Ok(TablesStream {
            major_version: read_le::<u8>(&data[4..])?,
            minor_version: read_le::<u8>(&data[5..])?,
            valid,
            sorted: read_le::<u64>(&data[16..])?,
            info,
            offsets,
        })
    }

    /// Number of tables present in the stream
    #[must_use]
    pub fn table_count(&self) -> u32 {
        self.valid.count_ones()
    }

    /// Returns `true` if the given table is present
    #[must_use]
    pub fn has_table(&self, id: TableId) -> bool {
        self.offsets[id as usize].is_some()
    }

    /// Row count of the given table, 0 when absent
    #[must_use]
    pub fn row_count(&self, id: TableId) -> u32 {
        self.offsets[id as usize].map_or(0, |(_, rows)| rows)
    }

    /// Typed view over the rows of `T`'s table.
    ///
    /// `data` must be the same `#~` stream slice that was passed to
    /// [`TablesStream::parse`]. Returns `None` when the table is absent.
    #[must_use]
    pub fn table<'a, T: RowRead>(&self, data: &'a [u8]) -> Option<MetadataTable<'a, T>> {
        let (offset, rows) = self.offsets[T::TABLE as usize]?;
        Some(MetadataTable::new(
            &data[offset..],
            rows,
            self.info.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a minimal `#~` stream containing a Module table (1 row) and a
    /// TypeDef table (`typedef_rows` rows), with small heaps.
    fn crafted_stream(typedef_rows: u32) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // reserved
        data.push(2); // major_version
        data.push(0); // minor_version
        data.push(0); // heap_size flags: all small
        data.push(1); // reserved
        let valid: u64 = (1 << 0x00) | (1 << 0x02);
        data.extend_from_slice(&valid.to_le_bytes());
        data.extend_from_slice(&0u64.to_le_bytes()); // sorted
        data.extend_from_slice(&1u32.to_le_bytes()); // Module rows
        data.extend_from_slice(&typedef_rows.to_le_bytes()); // TypeDef rows

        // Module row: generation + name + mvid + encid + encbaseid (all small)
        data.extend_from_slice(&[0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00]);

        // TypeDef rows: flags(4) + name(2) + namespace(2) + extends(2) + field_list(2) + method_list(2)
        for rid in 0..typedef_rows {
            data.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
            data.extend_from_slice(&(0x10u16 + rid as u16).to_le_bytes());
            data.extend_from_slice(&[0x00, 0x00]);
            data.extend_from_slice(&[0x00, 0x00]);
            data.extend_from_slice(&[0x01, 0x00]);
            data.extend_from_slice(&[0x01, 0x00]);
        }

        data
    }

    #[test]
    fn crafted_directory() {
        let data = crafted_stream(3);
        let stream = TablesStream::parse(&data).unwrap();

        assert_eq!(stream.major_version, 2);
        assert_eq!(stream.table_count(), 2);
        assert!(stream.has_table(TableId::Module));
        assert!(stream.has_table(TableId::TypeDef));
        assert!(!stream.has_table(TableId::MethodDef));
        assert_eq!(stream.row_count(TableId::TypeDef), 3);
        assert_eq!(stream.row_count(TableId::MemberRef), 0);
    }

    #[test]
    fn crafted_typed_access() {
        let data = crafted_stream(2);
        let stream = TablesStream::parse(&data).unwrap();

        let module = stream.table::<ModuleRaw>(&data).unwrap();
        assert_eq!(module.row_count(), 1);
        assert_eq!(module.get(1).unwrap().name, 1);

        let typedefs = stream.table::<TypeDefRaw>(&data).unwrap();
        assert_eq!(typedefs.row_count(), 2);
        assert_eq!(typedefs.get(1).unwrap().type_name, 0x10);
        assert_eq!(typedefs.get(2).unwrap().type_name, 0x11);
        assert_eq!(typedefs.get(2).unwrap().token.value(), 0x02000002);

        assert!(stream.table::<MemberRefRaw>(&data).is_none());
    }

    #[test]
    fn truncated_stream_rejected() {
        let data = crafted_stream(3);
        assert!(TablesStream::parse(&data[..data.len() - 4]).is_err());
    }

    #[test]
    fn empty_valid_rejected() {
        let mut data = crafted_stream(1);
        data[8..16].copy_from_slice(&0u64.to_le_bytes());
        assert!(TablesStream::parse(&data).is_err());
    }

    #[test]
    fn pdb_tables_rejected() {
        let mut data = crafted_stream(1);
        let valid: u64 = (1 << 0x00) | (1 << 0x02) | (1 << 0x30);
        data[8..16].copy_from_slice(&valid.to_le_bytes());
        assert!(matches!(
            TablesStream::parse(&data),
            Err(crate::Error::NotSupported)
        ));
    }
}
