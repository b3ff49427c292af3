//! The loaded-assembly view: one handle over the file, heaps, and tables.
//!
//! [`Assembly`] owns the mapped image and the parsed metadata directory for the
//! lifetime of one analysis run. All heap and table access flows through it, as do
//! the derived indices the analyzer needs repeatedly: method ownership, nesting
//! relationships, generic arity, and the set of compiler-generated entities.
//!
//! Construction performs all fatal validation up front; everything after a
//! successful load operates on immutable data and cannot mutate shared state.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use log::warn;

use crate::{
    file::File,
    metadata::{
        cor20::Cor20Header,
        method::MethodBody,
        root::Root,
        signatures::{parse_method_signature, parse_type_spec, MethodSig, TypeSig},
        streams::{Blob, Guids, Strings, UserStrings},
        tables::{
            CustomAttributeRaw, GenericParamRaw, MemberRefRaw, MetadataTable, MethodDefRaw,
            ModuleRaw, NestedClassRaw, ParamRaw, RowRead, TableId, TablesStream, TypeDefRaw,
            TypeRefRaw, TypeSpecRaw,
        },
        token::Token,
    },
    Result,
};

const MAX_NESTING_DEPTH: usize = 64;

/// A loaded .NET assembly: the open binary plus its parsed metadata directory.
///
/// Created once per analysis run and dropped on every exit path, releasing the
/// memory map with it.
pub struct Assembly {
    file: File,
    cor20: Cor20Header,
    metadata_version: String,
    strings_range: Option<(usize, usize)>,
    blob_range: Option<(usize, usize)>,
    us_range: Option<(usize, usize)>,
    guid_range: Option<(usize, usize)>,
    tables_range: (usize, usize),
    tables: TablesStream,
    /// typedef rid-1 -> [start, end) of owned MethodDef rids
    method_ranges: Vec<(u32, u32)>,
    /// method rid-1 -> owning typedef rid, 0 when unowned
    method_owner: Vec<u32>,
    /// method rid-1 -> [start, end) of owned Param rids
    param_ranges: Vec<(u32, u32)>,
    /// nested typedef rid -> enclosing typedef rid
    enclosing: HashMap<u32, u32>,
    /// generic parameter count per owner (TypeDef or MethodDef token)
    generic_arity: HashMap<Token, u32>,
    /// entities carrying [CompilerGenerated]
    compiler_generated: HashSet<Token>,
}

impl Assembly {
    /// Load an assembly from a file on disk.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not a valid .NET assembly.
    pub fn from_file(path: &Path) -> Result<Assembly> {
        Assembly::load(File::from_file(path)?)
    }

    /// Load an assembly from an in-memory image.
    ///
    /// # Errors
    /// Returns an error if the buffer is not a valid .NET assembly.
    pub fn from_mem(data: Vec<u8>) -> Result<Assembly> {
        Assembly::load(File::from_mem(data)?)
    }

    fn load(file: File) -> Result<Assembly> {
        let (clr_rva, _) = file.clr();
        let clr_offset = file.rva_to_offset(clr_rva as usize)?;
        let cor20 = Cor20Header::read(file.data_slice(clr_offset, 72)?)?;

        let root_offset = file.rva_to_offset(cor20.meta_data_rva as usize)?;
        let root_data = file.data_slice(root_offset, cor20.meta_data_size as usize)?;
        let root = Root::read(root_data)?;

        let absolute = |name: &str| {
            root.stream(name)
                .map(|header| (root_offset + header.offset as usize, header.size as usize))
        };

        let strings_range = absolute("#Strings");
        let blob_range = absolute("#Blob");
        let us_range = absolute("#US");
        let guid_range = absolute("#GUID");
        let Some(tables_range) = absolute("#~") else {
            return Err(malformed_error!("Assembly has no #~ tables stream"));
        };

        let tables_data = file.data_slice(tables_range.0, tables_range.1)?;
        let tables = TablesStream::parse(tables_data)?;

        let mut assembly = Assembly {
            metadata_version: root.version,
            file,
            cor20,
            strings_range,
            blob_range,
            us_range,
            guid_range,
            tables_range,
            tables,
            method_ranges: Vec::new(),
            method_owner: Vec::new(),
            param_ranges: Vec::new(),
            enclosing: HashMap::new(),
            generic_arity: HashMap::new(),
            compiler_generated: HashSet::new(),
        };

        assembly.build_ownership_indices();
        assembly.build_nesting_index();
        assembly.build_generic_arity_index();
        assembly.build_compiler_generated_index();

        Ok(assembly)
    }

    /// Compute the contiguous MethodDef and Param runs owned by each type/method.
    fn build_ownership_indices(&mut self) {
        let method_count = self.tables.row_count(TableId::MethodDef);
        let type_count = self.tables.row_count(TableId::TypeDef);
        let param_count = self.tables.row_count(TableId::Param);

        self.method_owner = vec![0; method_count as usize];
        self.method_ranges = Vec::with_capacity(type_count as usize);

        let method_starts: Vec<u32> = self
            .table::<TypeDefRaw>()
            .map(|table| table.iter().map(|row| row.method_list).collect())
            .unwrap_or_default();

        for (index, start) in method_starts.iter().enumerate() {
            let end = method_starts
                .get(index + 1)
                .copied()
                .unwrap_or(method_count + 1)
                .clamp(1, method_count + 1);
            let start = (*start).clamp(1, method_count + 1);
            let end = end.max(start);
            self.method_ranges.push((start, end));

            #[allow(clippy::cast_possible_truncation)]
            let type_rid = (index + 1) as u32;
            for method_rid in start..end {
                self.method_owner[method_rid as usize - 1] = type_rid;
            }
        }

        self.param_ranges = Vec::with_capacity(method_count as usize);

        let param_starts: Vec<u32> = self
            .table::<MethodDefRaw>()
            .map(|table| table.iter().map(|row| row.param_list).collect())
            .unwrap_or_default();

        for (index, start) in param_starts.iter().enumerate() {
            let end = param_starts
                .get(index + 1)
                .copied()
                .unwrap_or(param_count + 1)
                .clamp(1, param_count + 1);
            let start = (*start).clamp(1, param_count + 1);
            self.param_ranges.push((start, end.max(start)));
        }
    }

    fn build_nesting_index(&mut self) {
        let rows: Vec<NestedClassRaw> = self
            .table::<NestedClassRaw>()
            .map(|table| table.iter().collect())
            .unwrap_or_default();

        for row in rows {
            self.enclosing.insert(row.nested_class, row.enclosing_class);
        }
    }

    fn build_generic_arity_index(&mut self) {
        let owners: Vec<Token> = self
            .table::<GenericParamRaw>()
            .map(|table| table.iter().map(|row| row.owner.token).collect())
            .unwrap_or_default();

        for owner in owners {
            *self.generic_arity.entry(owner).or_insert(0) += 1;
        }
    }

    /// Index entities marked with `CompilerGeneratedAttribute`.
    ///
    /// The constructor of each custom attribute is resolved just far enough to read
    /// its declaring type's name; rows that fail to resolve are skipped.
    fn build_compiler_generated_index(&mut self) {
        let Some(attributes) = self.table::<CustomAttributeRaw>() else {
            return;
        };

        let mut marked = HashSet::new();
        for row in attributes.iter() {
            let is_compiler_generated = match row.constructor.tag {
                TableId::MemberRef => self
                    .row::<MemberRefRaw>(row.constructor.token)
                    .ok()
                    .filter(|member| member.class.tag == TableId::TypeRef)
                    .and_then(|member| self.row::<TypeRefRaw>(member.class.token).ok())
                    .is_some_and(|type_ref| {
                        self.string_at(type_ref.type_name)
                            .is_ok_and(|name| name == "CompilerGeneratedAttribute")
                    }),
                TableId::MethodDef => self
                    .declaring_type_of(row.constructor.token)
                    .and_then(|type_token| self.row::<TypeDefRaw>(type_token).ok())
                    .is_some_and(|type_def| {
                        self.string_at(type_def.type_name)
                            .is_ok_and(|name| name == "CompilerGeneratedAttribute")
                    }),
                _ => false,
            };

            if is_compiler_generated {
                marked.insert(row.parent.token);
            }
        }

        self.compiler_generated = marked;
    }

    /// The underlying PE file
    #[must_use]
    pub fn file(&self) -> &File {
        &self.file
    }

    /// The CLR runtime header
    #[must_use]
    pub fn cor20(&self) -> &Cor20Header {
        &self.cor20
    }

    /// The metadata version string, e.g. `v4.0.30319`
    #[must_use]
    pub fn metadata_version(&self) -> &str {
        &self.metadata_version
    }

    /// The parsed `#~` stream directory
    #[must_use]
    pub fn tables(&self) -> &TablesStream {
        &self.tables
    }

    /// The `#Strings` heap.
    ///
    /// # Errors
    /// Returns an error if the assembly carries no `#Strings` stream.
    pub fn strings(&self) -> Result<Strings<'_>> {
        let Some((offset, size)) = self.strings_range else {
            return Err(malformed_error!("Assembly has no #Strings heap"));
        };
        Strings::from(self.file.data_slice(offset, size)?)
    }

    /// The `#Blob` heap.
    ///
    /// # Errors
    /// Returns an error if the assembly carries no `#Blob` stream.
    pub fn blob(&self) -> Result<Blob<'_>> {
        let Some((offset, size)) = self.blob_range else {
            return Err(malformed_error!("Assembly has no #Blob heap"));
        };
        Blob::from(self.file.data_slice(offset, size)?)
    }

    /// The `#US` heap.
    ///
    /// # Errors
    /// Returns an error if the assembly carries no `#US` stream.
    pub fn user_strings(&self) -> Result<UserStrings<'_>> {
        let Some((offset, size)) = self.us_range else {
            return Err(malformed_error!("Assembly has no #US heap"));
        };
        UserStrings::from(self.file.data_slice(offset, size)?)
    }

    /// The `#GUID` heap.
    ///
    /// # Errors
    /// Returns an error if the assembly carries no `#GUID` stream.
    pub fn guids(&self) -> Result<Guids<'_>> {
        let Some((offset, size)) = self.guid_range else {
            return Err(malformed_error!("Assembly has no #GUID heap"));
        };
        Guids::from(self.file.data_slice(offset, size)?)
    }

    /// Typed view over the rows of `T`'s table, `None` when the table is absent.
    #[must_use]
    pub fn table<T: RowRead>(&self) -> Option<MetadataTable<'_, T>> {
        let (offset, size) = self.tables_range;
        let data = self.file.data_slice(offset, size).ok()?;
        self.tables.table::<T>(data)
    }

    /// Fetch one table row by token.
    ///
    /// # Errors
    /// Returns [`crate::Error::RowNotFound`] if the token targets a different
    /// table than `T` or the row does not exist.
    pub fn row<T: RowRead>(&self, token: Token) -> Result<T> {
        if token.table() as usize != T::TABLE as usize {
            return Err(crate::Error::RowNotFound(token));
        }

        self.table::<T>()
            .and_then(|table| table.get(token.row()))
            .ok_or(crate::Error::RowNotFound(token))
    }

    /// Resolve a `#Strings` heap index.
    ///
    /// # Errors
    /// Returns an error if the heap is absent or the index is invalid.
    pub fn string_at(&self, index: u32) -> Result<String> {
        Ok(self.strings()?.get(index as usize)?.to_string())
    }

    /// Resolve a `#Blob` heap index.
    ///
    /// # Errors
    /// Returns an error if the heap is absent or the index is invalid.
    pub fn blob_at(&self, index: u32) -> Result<Vec<u8>> {
        Ok(self.blob()?.get(index as usize)?.to_vec())
    }

    /// Resolve a `#US` heap offset (the row bits of a string token) to text.
    ///
    /// # Errors
    /// Returns an error if the heap is absent or the entry is malformed.
    pub fn user_string_at(&self, index: u32) -> Result<String> {
        Ok(self.user_strings()?.get(index as usize)?.to_string_lossy())
    }

    /// The module name from the Module table.
    ///
    /// # Errors
    /// Returns an error if the Module table or `#Strings` heap is missing.
    pub fn module_name(&self) -> Result<String> {
        let module = self.row::<ModuleRaw>(Token::new(0x0000_0001))?;
        self.string_at(module.name)
    }

    /// The module version id (MVID) rendered as a GUID string.
    ///
    /// # Errors
    /// Returns an error if the Module table or `#GUID` heap is missing.
    pub fn module_mvid(&self) -> Result<String> {
        let module = self.row::<ModuleRaw>(Token::new(0x0000_0001))?;
        Ok(self.guids()?.get(module.mvid as usize)?.to_string())
    }

    /// The 1-based MethodDef rid range owned by a type
    #[must_use]
    pub fn methods_of(&self, type_rid: u32) -> std::ops::Range<u32> {
        if type_rid == 0 {
            return 0..0;
        }

        match self.method_ranges.get(type_rid as usize - 1) {
            Some((start, end)) => *start..*end,
            None => 0..0,
        }
    }

    /// The 1-based Param rid range owned by a method
    #[must_use]
    pub fn params_of(&self, method_rid: u32) -> std::ops::Range<u32> {
        if method_rid == 0 {
            return 0..0;
        }

        match self.param_ranges.get(method_rid as usize - 1) {
            Some((start, end)) => *start..*end,
            None => 0..0,
        }
    }

    /// The declaring type of a method definition, if any
    #[must_use]
    pub fn declaring_type_of(&self, method: Token) -> Option<Token> {
        if method.table() != 0x06 || method.row() == 0 {
            return None;
        }

        match self.method_owner.get(method.row() as usize - 1) {
            Some(0) | None => None,
            Some(type_rid) => Some(Token::from_table_row(0x02, *type_rid)),
        }
    }

    /// The enclosing type of a nested type definition, if any
    #[must_use]
    pub fn enclosing_type_of(&self, type_rid: u32) -> Option<u32> {
        self.enclosing.get(&type_rid).copied()
    }

    /// Number of generic parameters declared by a type or method definition
    #[must_use]
    pub fn generic_arity(&self, owner: Token) -> u32 {
        self.generic_arity.get(&owner).copied().unwrap_or(0)
    }

    /// Returns `true` if the entity carries `CompilerGeneratedAttribute`
    #[must_use]
    pub fn is_compiler_generated(&self, token: Token) -> bool {
        self.compiler_generated.contains(&token)
    }

    /// The Param rows of a method, ordered by sequence number
    #[must_use]
    pub fn method_params(&self, method_rid: u32) -> Vec<ParamRaw> {
        let Some(params) = self.table::<ParamRaw>() else {
            return Vec::new();
        };

        let mut rows: Vec<ParamRaw> = self
            .params_of(method_rid)
            .filter_map(|rid| params.get(rid))
            .collect();
        rows.sort_by_key(|row| row.sequence);
        rows
    }

    /// Parse the signature blob of a method definition or reference.
    ///
    /// # Errors
    /// Returns an error if the blob is missing or malformed.
    pub fn method_signature(&self, blob_index: u32) -> Result<MethodSig> {
        let blob = self.blob()?.get(blob_index as usize)?.to_vec();
        parse_method_signature(&blob)
    }

    /// Parse the method body addressed by a `MethodDef` row.
    ///
    /// Returns the parsed header and the IL code slice. The caller is expected to
    /// have checked `rva != 0`; an RVA of zero is rejected here as well.
    ///
    /// # Errors
    /// Returns an error for a zero RVA, an untranslatable RVA, or a corrupt header.
    pub fn method_body(&self, method: &MethodDefRaw) -> Result<(MethodBody, &[u8])> {
        if method.rva == 0 {
            return Err(malformed_error!(
                "Method {} has no body (RVA 0)",
                method.token
            ));
        }

        let data = self.file.data_from_rva(method.rva as usize)?;
        let body = MethodBody::from(data)?;
        let code = body.code(data)?;
        Ok((body, code))
    }

    /// The plain full name of a type entity: namespace once, nesting chain joined
    /// outer+inner with `+`, no arity or token suffix.
    ///
    /// Accepts `TypeDef`, `TypeRef` and `TypeSpec` tokens; a `TypeSpec` renders as
    /// its type text.
    ///
    /// # Errors
    /// Returns an error if the token cannot be resolved.
    pub fn full_type_name(&self, token: Token) -> Result<String> {
        match token.table() {
            0x02 => {
                let mut names = Vec::new();
                let mut current = self.row::<TypeDefRaw>(token)?;

                for _ in 0..MAX_NESTING_DEPTH {
                    names.push(self.string_at(current.type_name)?);

                    match self.enclosing_type_of(current.rid) {
                        Some(enclosing_rid) => {
                            current =
                                self.row::<TypeDefRaw>(Token::from_table_row(0x02, enclosing_rid))?;
                        }
                        None => {
                            let namespace = self.string_at(current.type_namespace)?;
                            names.reverse();
                            let chain = names.join("+");
                            return Ok(if namespace.is_empty() {
                                chain
                            } else {
                                format!("{namespace}.{chain}")
                            });
                        }
                    }
                }

                Err(crate::Error::RecursionLimit(MAX_NESTING_DEPTH))
            }
            0x01 => {
                let type_ref = self.row::<TypeRefRaw>(token)?;
                let namespace = self.string_at(type_ref.type_namespace)?;
                let name = self.string_at(type_ref.type_name)?;
                Ok(if namespace.is_empty() {
                    name
                } else {
                    format!("{namespace}.{name}")
                })
            }
            0x1B => {
                let type_spec = self.row::<TypeSpecRaw>(token)?;
                let blob = self.blob()?.get(type_spec.signature as usize)?.to_vec();
                Ok(self.type_text(&parse_type_spec(&blob)?))
            }
            _ => Err(crate::Error::RowNotFound(token)),
        }
    }

    /// Render a parsed type signature as display text.
    ///
    /// Unresolvable tokens render as their hex value rather than failing; naming
    /// must stay total for fallback purposes.
    #[must_use]
    pub fn type_text(&self, sig: &TypeSig) -> String {
        render_type_sig(sig, &|token| match self.full_type_name(token) {
            Ok(name) => Some(name),
            Err(_) => {
                warn!("failed to resolve type token {token} while rendering a signature");
                None
            }
        })
    }
}

impl std::fmt::Debug for Assembly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assembly")
            .field("metadata_version", &self.metadata_version)
            .field("tables", &self.tables.table_count())
            .finish()
    }
}

/// Render a type signature with a pluggable token resolver.
///
/// The resolver maps `TypeDef`/`TypeRef`/`TypeSpec` tokens to full names; `None`
/// falls back to the token's hex form.
pub(crate) fn render_type_sig(sig: &TypeSig, resolve: &dyn Fn(Token) -> Option<String>) -> String {
    match sig {
        TypeSig::Void => "void".to_string(),
        TypeSig::Boolean => "bool".to_string(),
        TypeSig::Char => "char".to_string(),
        TypeSig::I1 => "int8".to_string(),
        TypeSig::U1 => "uint8".to_string(),
        TypeSig::I2 => "int16".to_string(),
        TypeSig::U2 => "uint16".to_string(),
        TypeSig::I4 => "int32".to_string(),
        TypeSig::U4 => "uint32".to_string(),
        TypeSig::I8 => "int64".to_string(),
        TypeSig::U8 => "uint64".to_string(),
        TypeSig::R4 => "float32".to_string(),
        TypeSig::R8 => "float64".to_string(),
        TypeSig::String => "string".to_string(),
        TypeSig::Object => "object".to_string(),
        TypeSig::I => "native int".to_string(),
        TypeSig::U => "native uint".to_string(),
        TypeSig::TypedByRef => "typedref".to_string(),
        TypeSig::Ptr(base) => format!("{}*", render_type_sig(base, resolve)),
        TypeSig::ByRef(base) => format!("{}&", render_type_sig(base, resolve)),
        TypeSig::ValueType(token) | TypeSig::Class(token) => {
            resolve(*token).unwrap_or_else(|| token.to_string())
        }
        TypeSig::Var(index) => format!("!{index}"),
        TypeSig::MVar(index) => format!("!!{index}"),
        TypeSig::Array { base, rank } => {
            let commas = ",".repeat(rank.saturating_sub(1) as usize);
            format!("{}[{}]", render_type_sig(base, resolve), commas)
        }
        TypeSig::SzArray(base) => format!("{}[]", render_type_sig(base, resolve)),
        TypeSig::GenericInst(base, args) => {
            let rendered: Vec<String> = args
                .iter()
                .map(|arg| render_type_sig(arg, resolve))
                .collect();
            format!(
                "{}<{}>",
                render_type_sig(base, resolve),
                rendered.join(",")
            )
        }
        TypeSig::FnPtr(method) => {
            let params: Vec<String> = method
                .params
                .iter()
                .map(|param| render_type_sig(param, resolve))
                .collect();
            let return_text = method
                .return_type
                .as_ref()
                .map_or_else(|| "void".to_string(), |ret| render_type_sig(ret, resolve));
            format!("method {} *({})", return_text, params.join(","))
        }
        TypeSig::Pinned(base) => format!("{} pinned", render_type_sig(base, resolve)),
        TypeSig::Sentinel => "...".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_resolve(_: Token) -> Option<String> {
        None
    }

    #[test]
    fn render_primitives() {
        assert_eq!(render_type_sig(&TypeSig::Void, &no_resolve), "void");
        assert_eq!(render_type_sig(&TypeSig::I4, &no_resolve), "int32");
        assert_eq!(render_type_sig(&TypeSig::String, &no_resolve), "string");
        assert_eq!(render_type_sig(&TypeSig::I, &no_resolve), "native int");
    }

    #[test]
    fn render_composites() {
        assert_eq!(
            render_type_sig(&TypeSig::SzArray(Box::new(TypeSig::String)), &no_resolve),
            "string[]"
        );
        assert_eq!(
            render_type_sig(&TypeSig::ByRef(Box::new(TypeSig::I4)), &no_resolve),
            "int32&"
        );
        assert_eq!(
            render_type_sig(
                &TypeSig::Array {
                    base: Box::new(TypeSig::R8),
                    rank: 3
                },
                &no_resolve
            ),
            "float64[,,]"
        );
        assert_eq!(render_type_sig(&TypeSig::MVar(1), &no_resolve), "!!1");
    }

    #[test]
    fn render_with_resolver() {
        let resolve = |token: Token| {
            if token == Token::new(0x01000002) {
                Some("System.Collections.Generic.List`1".to_string())
            } else {
                None
            }
        };

        let sig = TypeSig::GenericInst(
            Box::new(TypeSig::Class(Token::new(0x01000002))),
            vec![TypeSig::I4],
        );

        assert_eq!(
            render_type_sig(&sig, &resolve),
            "System.Collections.Generic.List`1<int32>"
        );
    }

    #[test]
    fn render_unresolved_token_falls_back_to_hex() {
        let sig = TypeSig::Class(Token::new(0x01000099));
        assert_eq!(render_type_sig(&sig, &no_resolve), "0x01000099");
    }

    #[test]
    fn render_is_deterministic() {
        let sig = TypeSig::GenericInst(
            Box::new(TypeSig::ValueType(Token::new(0x02000001))),
            vec![TypeSig::SzArray(Box::new(TypeSig::U1)), TypeSig::Object],
        );

        let first = render_type_sig(&sig, &no_resolve);
        let second = render_type_sig(&sig, &no_resolve);
        assert_eq!(first, second);
        assert_eq!(first, "0x02000001<uint8[],object>");
    }
}
