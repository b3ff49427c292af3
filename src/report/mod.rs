//! Report model and builder: the structured output of one analysis run.
//!
//! [`ReportBuilder`] orchestrates the whole pipeline over one loaded assembly:
//! header facts, the two-pass call-graph scan and resolution, per-method
//! decompilation and literal extraction, and the flat import/export lists. Field
//! names mirror the historical JSON report of the original tooling (PascalCase,
//! `RVA`, `ILBytes`, `PEInformation`).
//!
//! Per-method failures (decompilation, body decoding) substitute sentinel values
//! and never abort the batch; the builder either returns a complete report or a
//! fatal error with no report at all.

use log::debug;
use serde::Serialize;

use crate::{
    analysis::{
        callgraph::{resolve, scan, CalledMethod, ResolutionMode, Scan, ScanOptions},
        naming::{identity_key, NameEntity},
    },
    decompiler::{string_literals, Decompiler},
    metadata::{
        assembly::Assembly,
        signatures::is_method_signature,
        tables::{
            ExportedTypeRaw, ImplMapRaw, MemberRefRaw, MethodDefRaw, ModuleRefRaw, TableId,
            TypeRefRaw,
        },
    },
    Result,
};

/// PE and module header facts
#[derive(Debug, Clone, Serialize)]
pub struct PeInformation {
    /// Size of the file on disk in bytes
    #[serde(rename = "FileSize")]
    pub file_size: u64,
    /// Preferred load address
    #[serde(rename = "ImageBase")]
    pub image_base: u64,
    /// RVA of the native entry point stub
    #[serde(rename = "EntryPointRVA")]
    pub entry_point_rva: u32,
    /// In-memory section alignment
    #[serde(rename = "SectionAlignment")]
    pub section_alignment: u32,
    /// On-disk section alignment
    #[serde(rename = "FileAlignment")]
    pub file_alignment: u32,
    /// Name of the module from the metadata
    #[serde(rename = "ModuleName")]
    pub module_name: String,
    /// Module version id
    #[serde(rename = "Mvid")]
    pub mvid: String,
    /// CLR runtime version required by the image
    #[serde(rename = "RuntimeVersion")]
    pub runtime_version: String,
}

/// One method parameter
#[derive(Debug, Clone, Serialize)]
pub struct Parameter {
    /// Parameter name from the Param table, `param{n}` when unnamed
    #[serde(rename = "Name")]
    pub name: String,
    /// Rendered parameter type
    #[serde(rename = "Type")]
    pub r#type: String,
}

/// One analyzed method
#[derive(Debug, Clone, Serialize)]
pub struct MethodEntry {
    /// Identity key of the method
    #[serde(rename = "Name")]
    pub name: String,
    /// RVA of the method body, 0 for abstract and external methods
    #[serde(rename = "RVA")]
    pub rva: u32,
    /// Size of the IL code in bytes
    #[serde(rename = "MethodSize")]
    pub method_size: u64,
    /// The method parameters
    #[serde(rename = "Parameters")]
    pub parameters: Vec<Parameter>,
    /// Rendered return type
    #[serde(rename = "ReturnType")]
    pub return_type: String,
    /// String literals loaded by the body, in traversal order
    #[serde(rename = "StringLiterals")]
    pub string_literals: Vec<String>,
    /// Raw IL bytes as spaced hex digits, or an availability sentinel
    #[serde(rename = "ILBytes")]
    pub il_bytes: String,
    /// Best-effort decompiled text, or a failure sentinel
    #[serde(rename = "DecompiledSource")]
    pub decompiled_source: String,
    /// Resolved call targets of this method
    #[serde(rename = "CalledMethods")]
    pub called_methods: Vec<CalledMethod>,
}

/// One analyzed type with all of its methods
#[derive(Debug, Clone, Serialize)]
pub struct TypeEntry {
    /// Identity key of the type
    #[serde(rename = "Name")]
    pub name: String,
    /// Classification: Class, Interface, Enum, Struct or Delegate
    #[serde(rename = "Kind")]
    pub kind: String,
    /// The type's methods; empty for types without methods
    #[serde(rename = "Methods")]
    pub methods: Vec<MethodEntry>,
}

/// A flat import or export list entry
#[derive(Debug, Clone, Serialize)]
pub struct NamedEntry {
    /// Identity key of the entry
    #[serde(rename = "FullTypeName")]
    pub full_type_name: String,
}

/// The complete analysis report of one assembly
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// PE and module header facts
    #[serde(rename = "PEInformation")]
    pub pe_information: PeInformation,
    /// All type definitions with their methods
    #[serde(rename = "Types")]
    pub types: Vec<TypeEntry>,
    /// Managed imports: method references into other assemblies
    #[serde(rename = "ImportedFunctions")]
    pub imported_functions: Vec<NamedEntry>,
    /// Native P/Invoke imports, `module!function`
    #[serde(rename = "ImportedNativeFunctions")]
    pub imported_native_functions: Vec<NamedEntry>,
    /// Referenced external types
    #[serde(rename = "ImportedTypes")]
    pub imported_types: Vec<NamedEntry>,
    /// Types exported from other modules of this assembly
    #[serde(rename = "ExportedTypes")]
    pub exported_types: Vec<NamedEntry>,
}

/// Options controlling report construction
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportOptions {
    /// Skip methods carrying `CompilerGeneratedAttribute`
    pub ignore_compiler_generated: bool,
    /// Reproduce the historical caller-identity output for locally bound calls
    pub legacy_caller_names: bool,
}

/// Builds a [`Report`] from one loaded assembly and a decompiler collaborator.
pub struct ReportBuilder<'a> {
    assembly: &'a Assembly,
    decompiler: &'a dyn Decompiler,
    options: ReportOptions,
}

impl<'a> ReportBuilder<'a> {
    /// Create a builder over `assembly` using `decompiler` for source text
    #[must_use]
    pub fn new(assembly: &'a Assembly, decompiler: &'a dyn Decompiler) -> Self {
        ReportBuilder {
            assembly,
            decompiler,
            options: ReportOptions::default(),
        }
    }

    /// Replace the builder options
    #[must_use]
    pub fn with_options(mut self, options: ReportOptions) -> Self {
        self.options = options;
        self
    }

    /// Run the full analysis and produce the report.
    ///
    /// # Errors
    /// Returns an error only for fatal faults (unreadable metadata); per-method
    /// failures degrade to sentinel values.
    pub fn build(&self) -> Result<Report> {
        let scan_outcome = scan(
            self.assembly,
            ScanOptions {
                skip_compiler_generated: self.options.ignore_compiler_generated,
            },
        )?;

        let mode = if self.options.legacy_caller_names {
            ResolutionMode::LegacyCallerIdentity
        } else {
            ResolutionMode::CalleeIdentity
        };

        Ok(Report {
            pe_information: self.pe_information()?,
            types: self.type_entries(&scan_outcome, mode),
            imported_functions: self.imported_functions(),
            imported_native_functions: self.imported_native_functions(),
            imported_types: self.imported_types(),
            exported_types: self.exported_types(),
        })
    }

    fn pe_information(&self) -> Result<PeInformation> {
        let file = self.assembly.file();
        Ok(PeInformation {
            file_size: file.len() as u64,
            image_base: file.imagebase(),
            entry_point_rva: file.entry_point_rva(),
            section_alignment: file.section_alignment(),
            file_alignment: file.file_alignment(),
            module_name: self.assembly.module_name().unwrap_or_default(),
            mvid: self.assembly.module_mvid().unwrap_or_default(),
            runtime_version: self.assembly.metadata_version().to_string(),
        })
    }

    fn type_entries(&self, scan_outcome: &Scan, mode: ResolutionMode) -> Vec<TypeEntry> {
        let mut entries = Vec::with_capacity(scan_outcome.types.len());

        for scanned_type in &scan_outcome.types {
            let mut methods = Vec::with_capacity(scanned_type.methods.len());
            for method in &scanned_type.methods {
                methods.push(self.method_entry(scan_outcome, method, mode));
            }

            entries.push(TypeEntry {
                name: scanned_type.key.clone(),
                kind: scanned_type.kind.as_str().to_string(),
                methods,
            });
        }

        entries
    }

    fn method_entry(
        &self,
        scan_outcome: &Scan,
        method: &crate::analysis::callgraph::ScannedMethod,
        mode: ResolutionMode,
    ) -> MethodEntry {
        use crate::analysis::callgraph::BodyStatus;

        let (return_type, parameters) = self.method_signature_entry(method.token);

        let (method_size, il_bytes, literals) = match method.body {
            BodyStatus::Absent => (0, "<abstract or external>".to_string(), Vec::new()),
            BodyStatus::Failed => (0, "<none>".to_string(), Vec::new()),
            BodyStatus::Present { code_size } => {
                let (il_bytes, literals) = self
                    .assembly
                    .row::<MethodDefRaw>(method.token)
                    .and_then(|row| self.assembly.method_body(&row))
                    .map(|(_, code)| {
                        (render_il_bytes(code), string_literals(self.assembly, code))
                    })
                    .unwrap_or_else(|error| {
                        debug!("body of {} vanished after scan: {error}", method.token);
                        ("<none>".to_string(), Vec::new())
                    });

                (code_size as u64, il_bytes, literals)
            }
        };

        let decompiled_source = match self.decompiler.decompile(self.assembly, method.token) {
            Ok(text) => text,
            Err(error) => {
                debug!("decompilation failed for {}: {error}", method.token);
                "    <decompilation failed>".to_string()
            }
        };

        MethodEntry {
            name: method.key.clone(),
            rva: method.rva,
            method_size,
            parameters,
            return_type,
            string_literals: literals,
            il_bytes,
            decompiled_source,
            called_methods: resolve(&scan_outcome.index, method, mode),
        }
    }

    /// Signature text via the collaborator, parameter names from the Param table.
    fn method_signature_entry(
        &self,
        method: crate::metadata::token::Token,
    ) -> (String, Vec<Parameter>) {
        let resolved = self.decompiler.resolve_signature(self.assembly, method);
        let (return_type, param_types) = match resolved {
            Ok(parts) => parts,
            Err(error) => {
                debug!("unresolvable signature for {method}: {error}");
                return ("<unknown>".to_string(), Vec::new());
            }
        };

        let named_rows = self.assembly.method_params(method.row());
        let parameters = param_types
            .into_iter()
            .enumerate()
            .map(|(index, type_text)| {
                let position = index + 1;
                let name = named_rows
                    .iter()
                    .find(|row| usize::from(row.sequence) == position && row.name != 0)
                    .and_then(|row| self.assembly.string_at(row.name).ok())
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| format!("param{position}"));

                Parameter {
                    name,
                    r#type: type_text,
                }
            })
            .collect();

        (return_type, parameters)
    }

    /// Managed imports: method-shaped member references into foreign scopes,
    /// deduplicated by identity.
    fn imported_functions(&self) -> Vec<NamedEntry> {
        let Some(member_refs) = self.assembly.table::<MemberRefRaw>() else {
            return Vec::new();
        };

        let mut entries: Vec<NamedEntry> = Vec::new();
        for member in member_refs.iter() {
            if member.class.tag != TableId::TypeRef {
                continue;
            }

            let is_method = self
                .assembly
                .blob_at(member.signature)
                .is_ok_and(|blob| is_method_signature(&blob));
            if !is_method {
                continue;
            }

            match identity_key(self.assembly, &NameEntity::MemberReference(member.token)) {
                Ok(name) => {
                    if !entries.iter().any(|entry| entry.full_type_name == name) {
                        entries.push(NamedEntry {
                            full_type_name: name,
                        });
                    }
                }
                Err(error) => debug!("unnameable member reference {}: {error}", member.token),
            }
        }

        entries
    }

    /// Native P/Invoke imports from the ImplMap table, `module!function`.
    fn imported_native_functions(&self) -> Vec<NamedEntry> {
        let Some(impl_maps) = self.assembly.table::<ImplMapRaw>() else {
            return Vec::new();
        };

        let mut entries: Vec<NamedEntry> = Vec::new();
        for row in impl_maps.iter() {
            let import_name = match self.assembly.string_at(row.import_name) {
                Ok(name) => name,
                Err(error) => {
                    debug!("unreadable P/Invoke name in {}: {error}", row.token);
                    continue;
                }
            };

            let module = self
                .assembly
                .row::<ModuleRefRaw>(crate::metadata::token::Token::from_table_row(
                    0x1A,
                    row.import_scope,
                ))
                .and_then(|module_ref| self.assembly.string_at(module_ref.name))
                .unwrap_or_default();

            let name = if module.is_empty() {
                import_name
            } else {
                format!("{module}!{import_name}")
            };

            if !entries.iter().any(|entry| entry.full_type_name == name) {
                entries.push(NamedEntry {
                    full_type_name: name,
                });
            }
        }

        entries
    }

    fn imported_types(&self) -> Vec<NamedEntry> {
        let Some(type_refs) = self.assembly.table::<TypeRefRaw>() else {
            return Vec::new();
        };

        type_refs
            .iter()
            .filter_map(|row| {
                match identity_key(self.assembly, &NameEntity::TypeReference(row.token)) {
                    Ok(name) => Some(NamedEntry {
                        full_type_name: name,
                    }),
                    Err(error) => {
                        debug!("unnameable type reference {}: {error}", row.token);
                        None
                    }
                }
            })
            .collect()
    }

    fn exported_types(&self) -> Vec<NamedEntry> {
        let Some(exported) = self.assembly.table::<ExportedTypeRaw>() else {
            return Vec::new();
        };

        exported
            .iter()
            .filter_map(|row| {
                match identity_key(self.assembly, &NameEntity::ExportedType(row.token)) {
                    Ok(name) => Some(NamedEntry {
                        full_type_name: name,
                    }),
                    Err(error) => {
                        debug!("unnameable exported type {}: {error}", row.token);
                        None
                    }
                }
            })
            .collect()
    }
}

/// Hex rendition of raw IL bytes, space separated, `<empty>` for zero bytes.
fn render_il_bytes(code: &[u8]) -> String {
    if code.is_empty() {
        return "<empty>".to_string();
    }

    let mut text = String::with_capacity(code.len() * 3);
    for (index, byte) in code.iter().enumerate() {
        if index > 0 {
            text.push(' ');
        }
        text.push_str(&format!("{byte:02X}"));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn il_bytes_rendering() {
        assert_eq!(render_il_bytes(&[]), "<empty>");
        assert_eq!(render_il_bytes(&[0x00]), "00");
        assert_eq!(render_il_bytes(&[0x00, 0x2A, 0xFF]), "00 2A FF");
    }
}
