//! Typed row definitions for the metadata tables this analyzer consumes.
//!
//! Each `*Raw` struct mirrors the physical column layout of its table as specified
//! in ECMA-335 II.22, with heap indexes left unresolved. Resolution against the
//! heaps happens in [`crate::metadata::assembly::Assembly`].
//!
//! # Reference
//! - [ECMA-335 II.22](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use bitflags::bitflags;

use crate::{
    file::io::{read_le_at, read_le_at_dyn},
    metadata::{
        tables::{CodedIndex, CodedIndexType, RowRead, TableId, TableInfo},
        token::Token,
    },
    Result,
};

bitflags! {
    /// Type attribute flags from the `TypeDef` table (ECMA-335 II.23.1.15).
    ///
    /// Only the bits this analyzer inspects are named; the remainder round-trip
    /// through the raw `flags` field untouched.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TypeAttributes: u32 {
        /// Visibility mask (3 bits)
        const VISIBILITY_MASK = 0x0000_0007;
        /// Type is visible outside the assembly
        const PUBLIC = 0x0000_0001;
        /// Type is an interface
        const INTERFACE = 0x0000_0020;
        /// Type is abstract
        const ABSTRACT = 0x0000_0080;
        /// Type cannot be derived from
        const SEALED = 0x0000_0100;
        /// Name is special, interpreted by the runtime
        const SPECIAL_NAME = 0x0000_0400;
        /// Type is imported from COM
        const IMPORT = 0x0000_1000;
        /// Type is serializable
        const SERIALIZABLE = 0x0000_2000;
    }
}

fn read_string_index(data: &[u8], offset: &mut usize, info: &TableInfo) -> Result<u32> {
    read_le_at_dyn(data, offset, info.is_large_str())
}

fn read_blob_index(data: &[u8], offset: &mut usize, info: &TableInfo) -> Result<u32> {
    read_le_at_dyn(data, offset, info.is_large_blob())
}

fn read_guid_index(data: &[u8], offset: &mut usize, info: &TableInfo) -> Result<u32> {
    read_le_at_dyn(data, offset, info.is_large_guid())
}

fn read_table_index(
    data: &[u8],
    offset: &mut usize,
    info: &TableInfo,
    table: TableId,
) -> Result<u32> {
    read_le_at_dyn(data, offset, info.is_large(table))
}

/// The `Module` table describes the current module. `TableId` = 0x00
#[derive(Clone, Debug)]
pub struct ModuleRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// Reserved, shall be zero
    pub generation: u16,
    /// an index into the String heap
    pub name: u32,
    /// an index into the GUID heap; the module version id
    pub mvid: u32,
    /// an index into the GUID heap, reserved
    pub encid: u32,
    /// an index into the GUID heap, reserved
    pub encbaseid: u32,
}

impl RowRead for ModuleRaw {
    const TABLE: TableId = TableId::Module;

    #[rustfmt::skip]
    fn row_size(info: &TableInfo) -> u32 {
        u32::from(
            /* generation */ 2 +
            /* name */       info.str_bytes() +
            /* mvid */       info.guid_bytes() +
            /* encid */      info.guid_bytes() +
            /* encbaseid */  info.guid_bytes()
        )
    }

    fn read_row(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(ModuleRaw {
            rid,
            token: Token::from_table_row(0x00, rid),
            generation: read_le_at::<u16>(data, offset)?,
            name: read_string_index(data, offset, info)?,
            mvid: read_guid_index(data, offset, info)?,
            encid: read_guid_index(data, offset, info)?,
            encbaseid: read_guid_index(data, offset, info)?,
        })
    }
}

/// The `TypeRef` table references types defined in other modules or assemblies. `TableId` = 0x01
#[derive(Clone, Debug)]
pub struct TypeRefRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// an index into Module, `ModuleRef`, `AssemblyRef` or `TypeRef`; a `ResolutionScope`
    pub resolution_scope: CodedIndex,
    /// an index into the String heap
    pub type_name: u32,
    /// an index into the String heap
    pub type_namespace: u32,
}

impl RowRead for TypeRefRaw {
    const TABLE: TableId = TableId::TypeRef;

    #[rustfmt::skip]
    fn row_size(info: &TableInfo) -> u32 {
        u32::from(
            /* resolution_scope */ info.coded_index_bytes(CodedIndexType::ResolutionScope) +
            /* type_name */        info.str_bytes() +
            /* type_namespace */   info.str_bytes()
        )
    }

    fn read_row(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(TypeRefRaw {
            rid,
            token: Token::from_table_row(0x01, rid),
            resolution_scope: CodedIndex::read(data, offset, info, CodedIndexType::ResolutionScope)?,
            type_name: read_string_index(data, offset, info)?,
            type_namespace: read_string_index(data, offset, info)?,
        })
    }
}

/// The `TypeDef` table defines the types of the current module. `TableId` = 0x02
#[derive(Clone, Debug)]
pub struct TypeDefRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// a 4-byte bitmask of type `TypeAttributes`
    pub flags: u32,
    /// an index into the String heap
    pub type_name: u32,
    /// an index into the String heap
    pub type_namespace: u32,
    /// an index into `TypeDef`, `TypeRef`, or `TypeSpec`; a `TypeDefOrRef`
    pub extends: CodedIndex,
    /// an index into the Field table, first of a contiguous run owned by this type
    pub field_list: u32,
    /// an index into the `MethodDef` table, first of a contiguous run owned by this type
    pub method_list: u32,
}

impl TypeDefRaw {
    /// The type attribute flags of this row
    #[must_use]
    pub fn attributes(&self) -> TypeAttributes {
        TypeAttributes::from_bits_truncate(self.flags)
    }
}

impl RowRead for TypeDefRaw {
    const TABLE: TableId = TableId::TypeDef;

    #[rustfmt::skip]
    fn row_size(info: &TableInfo) -> u32 {
        u32::from(
            /* flags */          4 +
            /* type_name */      info.str_bytes() +
            /* type_namespace */ info.str_bytes() +
            /* extends */        info.coded_index_bytes(CodedIndexType::TypeDefOrRef) +
            /* field_list */     info.table_index_bytes(TableId::Field) +
            /* method_list */    info.table_index_bytes(TableId::MethodDef)
        )
    }

    fn read_row(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(TypeDefRaw {
            rid,
            token: Token::from_table_row(0x02, rid),
            flags: read_le_at::<u32>(data, offset)?,
            type_name: read_string_index(data, offset, info)?,
            type_namespace: read_string_index(data, offset, info)?,
            extends: CodedIndex::read(data, offset, info, CodedIndexType::TypeDefOrRef)?,
            field_list: read_table_index(data, offset, info, TableId::Field)?,
            method_list: read_table_index(data, offset, info, TableId::MethodDef)?,
        })
    }
}

/// The `MethodDef` table defines the methods of the current module. `TableId` = 0x06
#[derive(Clone, Debug)]
pub struct MethodDefRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// RVA of the method body, 0 for abstract and external methods
    pub rva: u32,
    /// a 2-byte bitmask of type `MethodImplAttributes`
    pub impl_flags: u16,
    /// a 2-byte bitmask of type `MethodAttributes`
    pub flags: u16,
    /// an index into the String heap
    pub name: u32,
    /// an index into the Blob heap; the method signature
    pub signature: u32,
    /// an index into the Param table, first of a contiguous run owned by this method
    pub param_list: u32,
}

impl RowRead for MethodDefRaw {
    const TABLE: TableId = TableId::MethodDef;

    #[rustfmt::skip]
    fn row_size(info: &TableInfo) -> u32 {
        u32::from(
            /* rva */        4 +
            /* impl_flags */ 2 +
            /* flags */      2 +
            /* name */       info.str_bytes() +
            /* signature */  info.blob_bytes() +
            /* param_list */ info.table_index_bytes(TableId::Param)
        )
    }

    fn read_row(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(MethodDefRaw {
            rid,
            token: Token::from_table_row(0x06, rid),
            rva: read_le_at::<u32>(data, offset)?,
            impl_flags: read_le_at::<u16>(data, offset)?,
            flags: read_le_at::<u16>(data, offset)?,
            name: read_string_index(data, offset, info)?,
            signature: read_blob_index(data, offset, info)?,
            param_list: read_table_index(data, offset, info, TableId::Param)?,
        })
    }
}

/// The `Param` table describes method parameters. `TableId` = 0x08
#[derive(Clone, Debug)]
pub struct ParamRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// a 2-byte bitmask of type `ParamAttributes`
    pub flags: u16,
    /// The parameter position; 0 denotes the return value
    pub sequence: u16,
    /// an index into the String heap
    pub name: u32,
}

impl RowRead for ParamRaw {
    const TABLE: TableId = TableId::Param;

    #[rustfmt::skip]
    fn row_size(info: &TableInfo) -> u32 {
        u32::from(
            /* flags */    2 +
            /* sequence */ 2 +
            /* name */     info.str_bytes()
        )
    }

    fn read_row(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(ParamRaw {
            rid,
            token: Token::from_table_row(0x08, rid),
            flags: read_le_at::<u16>(data, offset)?,
            sequence: read_le_at::<u16>(data, offset)?,
            name: read_string_index(data, offset, info)?,
        })
    }
}

/// The `MemberRef` table references members of other types, typically imports. `TableId` = 0x0A
#[derive(Clone, Debug)]
pub struct MemberRefRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// an index into `TypeDef`, `TypeRef`, `ModuleRef`, `MethodDef` or `TypeSpec`; a `MemberRefParent`
    pub class: CodedIndex,
    /// an index into the String heap
    pub name: u32,
    /// an index into the Blob heap; the member signature
    pub signature: u32,
}

impl RowRead for MemberRefRaw {
    const TABLE: TableId = TableId::MemberRef;

    #[rustfmt::skip]
    fn row_size(info: &TableInfo) -> u32 {
        u32::from(
            /* class */     info.coded_index_bytes(CodedIndexType::MemberRefParent) +
            /* name */      info.str_bytes() +
            /* signature */ info.blob_bytes()
        )
    }

    fn read_row(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(MemberRefRaw {
            rid,
            token: Token::from_table_row(0x0A, rid),
            class: CodedIndex::read(data, offset, info, CodedIndexType::MemberRefParent)?,
            name: read_string_index(data, offset, info)?,
            signature: read_blob_index(data, offset, info)?,
        })
    }
}

/// The `CustomAttribute` table attaches attributes to metadata entities. `TableId` = 0x0C
#[derive(Clone, Debug)]
pub struct CustomAttributeRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// the attributed entity; a `HasCustomAttribute`
    pub parent: CodedIndex,
    /// the attribute constructor; a `CustomAttributeType`
    pub constructor: CodedIndex,
    /// an index into the Blob heap; the encoded attribute value
    pub value: u32,
}

impl RowRead for CustomAttributeRaw {
    const TABLE: TableId = TableId::CustomAttribute;

    #[rustfmt::skip]
    fn row_size(info: &TableInfo) -> u32 {
        u32::from(
            /* parent */      info.coded_index_bytes(CodedIndexType::HasCustomAttribute) +
            /* constructor */ info.coded_index_bytes(CodedIndexType::CustomAttributeType) +
            /* value */       info.blob_bytes()
        )
    }

    fn read_row(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(CustomAttributeRaw {
            rid,
            token: Token::from_table_row(0x0C, rid),
            parent: CodedIndex::read(data, offset, info, CodedIndexType::HasCustomAttribute)?,
            constructor: CodedIndex::read(data, offset, info, CodedIndexType::CustomAttributeType)?,
            value: read_blob_index(data, offset, info)?,
        })
    }
}

/// The `ModuleRef` table references external modules for P/Invoke. `TableId` = 0x1A
#[derive(Clone, Debug)]
pub struct ModuleRefRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// an index into the String heap
    pub name: u32,
}

impl RowRead for ModuleRefRaw {
    const TABLE: TableId = TableId::ModuleRef;

    fn row_size(info: &TableInfo) -> u32 {
        u32::from(info.str_bytes())
    }

    fn read_row(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(ModuleRefRaw {
            rid,
            token: Token::from_table_row(0x1A, rid),
            name: read_string_index(data, offset, info)?,
        })
    }
}

/// The `TypeSpec` table holds signatures of constructed types. `TableId` = 0x1B
#[derive(Clone, Debug)]
pub struct TypeSpecRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// an index into the Blob heap; the type signature
    pub signature: u32,
}

impl RowRead for TypeSpecRaw {
    const TABLE: TableId = TableId::TypeSpec;

    fn row_size(info: &TableInfo) -> u32 {
        u32::from(info.blob_bytes())
    }

    fn read_row(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(TypeSpecRaw {
            rid,
            token: Token::from_table_row(0x1B, rid),
            signature: read_blob_index(data, offset, info)?,
        })
    }
}

/// The `ImplMap` table maps managed methods onto native P/Invoke imports. `TableId` = 0x1C
#[derive(Clone, Debug)]
pub struct ImplMapRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// a 2-byte bitmask of type `PInvokeAttributes`
    pub mapping_flags: u16,
    /// the forwarded member; a `MemberForwarded`
    pub member_forwarded: CodedIndex,
    /// an index into the String heap; the native import name
    pub import_name: u32,
    /// an index into the `ModuleRef` table
    pub import_scope: u32,
}

impl RowRead for ImplMapRaw {
    const TABLE: TableId = TableId::ImplMap;

    #[rustfmt::skip]
    fn row_size(info: &TableInfo) -> u32 {
        u32::from(
            /* mapping_flags */    2 +
            /* member_forwarded */ info.coded_index_bytes(CodedIndexType::MemberForwarded) +
            /* import_name */      info.str_bytes() +
            /* import_scope */     info.table_index_bytes(TableId::ModuleRef)
        )
    }

    fn read_row(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(ImplMapRaw {
            rid,
            token: Token::from_table_row(0x1C, rid),
            mapping_flags: read_le_at::<u16>(data, offset)?,
            member_forwarded: CodedIndex::read(data, offset, info, CodedIndexType::MemberForwarded)?,
            import_name: read_string_index(data, offset, info)?,
            import_scope: read_table_index(data, offset, info, TableId::ModuleRef)?,
        })
    }
}

/// The `Assembly` table holds the manifest of the current assembly. `TableId` = 0x20
#[derive(Clone, Debug)]
pub struct AssemblyRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// a 4-byte constant of type `AssemblyHashAlgorithm`
    pub hash_alg_id: u32,
    /// `MajorVersion`
    pub major_version: u16,
    /// `MinorVersion`
    pub minor_version: u16,
    /// `BuildNumber`
    pub build_number: u16,
    /// `RevisionNumber`
    pub revision_number: u16,
    /// a 4-byte bitmask of type `AssemblyFlags`
    pub flags: u32,
    /// an index into the Blob heap
    pub public_key: u32,
    /// an index into the String heap
    pub name: u32,
    /// an index into the String heap
    pub culture: u32,
}

impl RowRead for AssemblyRaw {
    const TABLE: TableId = TableId::Assembly;

    #[rustfmt::skip]
    fn row_size(info: &TableInfo) -> u32 {
        u32::from(
            /* hash_alg_id */ 4 +
            /* versions */    8 +
            /* flags */       4 +
            /* public_key */  info.blob_bytes() +
            /* name */        info.str_bytes() +
            /* culture */     info.str_bytes()
        )
    }

    fn read_row(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(AssemblyRaw {
            rid,
            token: Token::from_table_row(0x20, rid),
            hash_alg_id: read_le_at::<u32>(data, offset)?,
            major_version: read_le_at::<u16>(data, offset)?,
            minor_version: read_le_at::<u16>(data, offset)?,
            build_number: read_le_at::<u16>(data, offset)?,
            revision_number: read_le_at::<u16>(data, offset)?,
            flags: read_le_at::<u32>(data, offset)?,
            public_key: read_blob_index(data, offset, info)?,
            name: read_string_index(data, offset, info)?,
            culture: read_string_index(data, offset, info)?,
        })
    }
}

/// The `AssemblyRef` table references other assemblies. `TableId` = 0x23
#[derive(Clone, Debug)]
pub struct AssemblyRefRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// `MajorVersion`
    pub major_version: u16,
    /// `MinorVersion`
    pub minor_version: u16,
    /// `BuildNumber`
    pub build_number: u16,
    /// `RevisionNumber`
    pub revision_number: u16,
    /// a 4-byte bitmask of type `AssemblyFlags`
    pub flags: u32,
    /// an index into the Blob heap
    pub public_key_or_token: u32,
    /// an index into the String heap
    pub name: u32,
    /// an index into the String heap
    pub culture: u32,
    /// an index into the Blob heap
    pub hash_value: u32,
}

impl RowRead for AssemblyRefRaw {
    const TABLE: TableId = TableId::AssemblyRef;

    #[rustfmt::skip]
    fn row_size(info: &TableInfo) -> u32 {
        u32::from(
            /* versions */            8 +
            /* flags */               4 +
            /* public_key_or_token */ info.blob_bytes() +
            /* name */                info.str_bytes() +
            /* culture */             info.str_bytes() +
            /* hash_value */          info.blob_bytes()
        )
    }

    fn read_row(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(AssemblyRefRaw {
            rid,
            token: Token::from_table_row(0x23, rid),
            major_version: read_le_at::<u16>(data, offset)?,
            minor_version: read_le_at::<u16>(data, offset)?,
            build_number: read_le_at::<u16>(data, offset)?,
            revision_number: read_le_at::<u16>(data, offset)?,
            flags: read_le_at::<u32>(data, offset)?,
            public_key_or_token: read_blob_index(data, offset, info)?,
            name: read_string_index(data, offset, info)?,
            culture: read_string_index(data, offset, info)?,
            hash_value: read_blob_index(data, offset, info)?,
        })
    }
}

/// The `ExportedType` table lists types exported from other modules of this assembly. `TableId` = 0x27
#[derive(Clone, Debug)]
pub struct ExportedTypeRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// a 4-byte bitmask of type `TypeAttributes`
    pub flags: u32,
    /// the `TypeDef` token of the type in its defining module, 0 when unused
    pub type_def_id: u32,
    /// an index into the String heap
    pub type_name: u32,
    /// an index into the String heap
    pub type_namespace: u32,
    /// an index into File, `AssemblyRef` or `ExportedType`; an `Implementation`
    pub implementation: CodedIndex,
}

impl RowRead for ExportedTypeRaw {
    const TABLE: TableId = TableId::ExportedType;

    #[rustfmt::skip]
    fn row_size(info: &TableInfo) -> u32 {
        u32::from(
            /* flags */          4 +
            /* type_def_id */    4 +
            /* type_name */      info.str_bytes() +
            /* type_namespace */ info.str_bytes() +
            /* implementation */ info.coded_index_bytes(CodedIndexType::Implementation)
        )
    }

    fn read_row(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(ExportedTypeRaw {
            rid,
            token: Token::from_table_row(0x27, rid),
            flags: read_le_at::<u32>(data, offset)?,
            type_def_id: read_le_at::<u32>(data, offset)?,
            type_name: read_string_index(data, offset, info)?,
            type_namespace: read_string_index(data, offset, info)?,
            implementation: CodedIndex::read(data, offset, info, CodedIndexType::Implementation)?,
        })
    }
}

/// The `NestedClass` table records which types are nested within which. `TableId` = 0x29
#[derive(Clone, Debug)]
pub struct NestedClassRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// an index into the `TypeDef` table; the nested type
    pub nested_class: u32,
    /// an index into the `TypeDef` table; the enclosing type
    pub enclosing_class: u32,
}

impl RowRead for NestedClassRaw {
    const TABLE: TableId = TableId::NestedClass;

    #[rustfmt::skip]
    fn row_size(info: &TableInfo) -> u32 {
        u32::from(
            /* nested_class */    info.table_index_bytes(TableId::TypeDef) +
            /* enclosing_class */ info.table_index_bytes(TableId::TypeDef)
        )
    }

    fn read_row(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(NestedClassRaw {
            rid,
            token: Token::from_table_row(0x29, rid),
            nested_class: read_table_index(data, offset, info, TableId::TypeDef)?,
            enclosing_class: read_table_index(data, offset, info, TableId::TypeDef)?,
        })
    }
}

/// The `GenericParam` table defines generic parameters of types and methods. `TableId` = 0x2A
#[derive(Clone, Debug)]
pub struct GenericParamRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// the 0-based ordinal of this parameter
    pub number: u16,
    /// a 2-byte bitmask of type `GenericParamAttributes`
    pub flags: u16,
    /// the owning type or method; a `TypeOrMethodDef`
    pub owner: CodedIndex,
    /// an index into the String heap
    pub name: u32,
}

impl RowRead for GenericParamRaw {
    const TABLE: TableId = TableId::GenericParam;

    #[rustfmt::skip]
    fn row_size(info: &TableInfo) -> u32 {
        u32::from(
            /* number */ 2 +
            /* flags */  2 +
            /* owner */  info.coded_index_bytes(CodedIndexType::TypeOrMethodDef) +
            /* name */   info.str_bytes()
        )
    }

    fn read_row(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(GenericParamRaw {
            rid,
            token: Token::from_table_row(0x2A, rid),
            number: read_le_at::<u16>(data, offset)?,
            flags: read_le_at::<u16>(data, offset)?,
            owner: CodedIndex::read(data, offset, info, CodedIndexType::TypeOrMethodDef)?,
            name: read_string_index(data, offset, info)?,
        })
    }
}

/// The `MethodSpec` table records generic method instantiations. `TableId` = 0x2B
#[derive(Clone, Debug)]
pub struct MethodSpecRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// the instantiated method; a `MethodDefOrRef`
    pub method: CodedIndex,
    /// an index into the Blob heap; the instantiation signature
    pub instantiation: u32,
}

impl RowRead for MethodSpecRaw {
    const TABLE: TableId = TableId::MethodSpec;

    #[rustfmt::skip]
    fn row_size(info: &TableInfo) -> u32 {
        u32::from(
            /* method */        info.coded_index_bytes(CodedIndexType::MethodDefOrRef) +
            /* instantiation */ info.blob_bytes()
        )
    }

    fn read_row(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(MethodSpecRaw {
            rid,
            token: Token::from_table_row(0x2B, rid),
            method: CodedIndex::read(data, offset, info, CodedIndexType::MethodDefOrRef)?,
            instantiation: read_blob_index(data, offset, info)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::MetadataTable;
    use std::sync::Arc;

    #[test]
    fn typedef_crafted_short() {
        let data = vec![
            0x01, 0x00, 0x00, 0x00, // flags = PUBLIC
            0x42, 0x00, // type_name
            0x43, 0x00, // type_namespace
            0x05, 0x00, // extends: (row 1 << 2) | tag 1 = TypeRef
            0x01, 0x00, // field_list
            0x02, 0x00, // method_list
        ];

        let info = Arc::new(TableInfo::new_test(
            &[
                (TableId::TypeDef, 1),
                (TableId::TypeRef, 2),
                (TableId::Field, 1),
                (TableId::MethodDef, 3),
            ],
            false,
            false,
            false,
        ));

        let table = MetadataTable::<TypeDefRaw>::new(&data, 1, info);
        let row = table.get(1).unwrap();

        assert_eq!(row.rid, 1);
        assert_eq!(row.token.value(), 0x02000001);
        assert!(row.attributes().contains(TypeAttributes::PUBLIC));
        assert_eq!(row.type_name, 0x42);
        assert_eq!(row.type_namespace, 0x43);
        assert_eq!(row.extends.tag, TableId::TypeRef);
        assert_eq!(row.extends.row, 1);
        assert_eq!(row.field_list, 1);
        assert_eq!(row.method_list, 2);

        assert!(table.get(0).is_none());
        assert!(table.get(2).is_none());
    }

    #[test]
    fn methoddef_crafted_short() {
        let data = vec![
            0x50, 0x20, 0x00, 0x00, // rva = 0x2050
            0x00, 0x00, // impl_flags
            0x96, 0x00, // flags = Public | Static | HideBySig
            0x10, 0x00, // name
            0x0A, 0x00, // signature
            0x01, 0x00, // param_list
        ];

        let info = Arc::new(TableInfo::new_test(
            &[(TableId::MethodDef, 1), (TableId::Param, 1)],
            false,
            false,
            false,
        ));

        let table = MetadataTable::<MethodDefRaw>::new(&data, 1, info);
        let row = table.get(1).unwrap();

        assert_eq!(row.token.value(), 0x06000001);
        assert_eq!(row.rva, 0x2050);
        assert_eq!(row.flags, 0x0096);
        assert_eq!(row.name, 0x10);
        assert_eq!(row.signature, 0x0A);
        assert_eq!(row.param_list, 1);
    }

    #[test]
    fn memberref_crafted_short() {
        let data = vec![
            0x09, 0x00, // class: (row 1 << 3) | tag 1 = TypeRef
            0x20, 0x00, // name
            0x15, 0x00, // signature
        ];

        let info = Arc::new(TableInfo::new_test(
            &[(TableId::MemberRef, 1), (TableId::TypeRef, 4)],
            false,
            false,
            false,
        ));

        let table = MetadataTable::<MemberRefRaw>::new(&data, 1, info);
        let row = table.get(1).unwrap();

        assert_eq!(row.token.value(), 0x0A000001);
        assert_eq!(row.class.tag, TableId::TypeRef);
        assert_eq!(row.class.row, 1);
        assert_eq!(row.name, 0x20);
        assert_eq!(row.signature, 0x15);
    }

    #[test]
    fn nestedclass_crafted_short() {
        let data = vec![
            0x02, 0x00, // nested_class -> TypeDef row 2
            0x01, 0x00, // enclosing_class -> TypeDef row 1
        ];

        let info = Arc::new(TableInfo::new_test(
            &[(TableId::TypeDef, 2), (TableId::NestedClass, 1)],
            false,
            false,
            false,
        ));

        let table = MetadataTable::<NestedClassRaw>::new(&data, 1, info);
        let row = table.get(1).unwrap();

        assert_eq!(row.nested_class, 2);
        assert_eq!(row.enclosing_class, 1);
    }

    #[test]
    fn genericparam_crafted_short() {
        let data = vec![
            0x00, 0x00, // number = 0
            0x00, 0x00, // flags
            0x05, 0x00, // owner: (row 2 << 1) | tag 1 = MethodDef
            0x30, 0x00, // name
        ];

        let info = Arc::new(TableInfo::new_test(
            &[
                (TableId::GenericParam, 1),
                (TableId::TypeDef, 4),
                (TableId::MethodDef, 4),
            ],
            false,
            false,
            false,
        ));

        let table = MetadataTable::<GenericParamRaw>::new(&data, 1, info);
        let row = table.get(1).unwrap();

        assert_eq!(row.number, 0);
        assert_eq!(row.owner.tag, TableId::MethodDef);
        assert_eq!(row.owner.row, 2);
        assert_eq!(row.owner.token.value(), 0x06000002);
    }

    #[test]
    fn module_row_size_with_large_guid() {
        let small = TableInfo::new_test(&[(TableId::Module, 1)], false, false, false);
        assert_eq!(ModuleRaw::row_size(&small), 2 + 2 + 2 + 2 + 2);

        let large = TableInfo::new_test(&[(TableId::Module, 1)], false, false, true);
        assert_eq!(ModuleRaw::row_size(&large), 2 + 2 + 4 + 4 + 4);
    }

    #[test]
    fn iteration_yields_all_rows() {
        let data = vec![
            0x01, 0x00, 0x01, 0x00, 0x10, 0x00, // param row 1
            0x00, 0x00, 0x02, 0x00, 0x14, 0x00, // param row 2
        ];

        let info = Arc::new(TableInfo::new_test(&[(TableId::Param, 2)], false, false, false));
        let table = MetadataTable::<ParamRaw>::new(&data, 2, info);

        let rows: Vec<ParamRaw> = table.iter().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].sequence, 1);
        assert_eq!(rows[0].name, 0x10);
        assert_eq!(rows[1].sequence, 2);
        assert_eq!(rows[1].name, 0x14);
    }
}
