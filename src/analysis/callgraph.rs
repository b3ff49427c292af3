//! Two-pass call-graph construction over one assembly.
//!
//! A method can call another that is defined later in scan order, so a single
//! streaming pass cannot resolve call targets: the callee's definition would not
//! be indexed yet when the caller is visited. Resolution therefore runs in two
//! passes:
//!
//! - **Pass 1** ([`scan`]): visit every method definition, insert its handle into
//!   the [`MethodIndex`], and attach the pending call set extracted from its body.
//! - **Pass 2** ([`resolve`]): with the completed, now read-only index, convert
//!   each method's pending calls into final [`CalledMethod`] records.
//!
//! The index is owned by the orchestrating caller and passed explicitly into
//! pass 2; there is no ambient state connecting the passes.
//!
//! A call target absent from the index is not an error: the callee lives in
//! another assembly (or is otherwise unindexable), and the record carries the
//! pass-1 fallback name with address zero.

use std::collections::HashMap;

use log::debug;
use serde::Serialize;

use crate::{
    analysis::{
        extract::{CallExtractor, PendingCall},
        naming::{identity_key, NameEntity},
    },
    metadata::{
        assembly::Assembly,
        tables::{MethodDefRaw, TypeAttributes, TypeDefRaw},
        token::Token,
    },
    Result,
};

/// What pass 2 needs to know about one locally defined method.
#[derive(Debug, Clone)]
pub struct MethodSummary {
    /// The method's `MethodDef` token
    pub token: Token,
    /// The method's identity key
    pub key: String,
    /// RVA of the method body, 0 for abstract and external methods
    pub rva: u32,
}

/// The handle lookup table built by pass 1.
///
/// Grows monotonically during the scan and is only read afterwards; pass 2 takes
/// it by shared reference.
#[derive(Debug, Default)]
pub struct MethodIndex {
    entries: HashMap<Token, MethodSummary>,
}

impl MethodIndex {
    /// Create an empty index
    #[must_use]
    pub fn new() -> Self {
        MethodIndex {
            entries: HashMap::new(),
        }
    }

    /// Insert a method definition
    pub fn insert(&mut self, summary: MethodSummary) {
        self.entries.insert(summary.token, summary);
    }

    /// Look up a method definition by token
    #[must_use]
    pub fn get(&self, token: Token) -> Option<&MethodSummary> {
        self.entries.get(&token)
    }

    /// Number of indexed methods
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no methods are indexed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Body availability of a scanned method, drives the report's IL sentinels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyStatus {
    /// RVA is zero: abstract or external method
    Absent,
    /// A body exists but its header or code could not be read
    Failed,
    /// The body decoded; carries the IL code size in bytes
    Present {
        /// Size of the IL code in bytes
        code_size: usize,
    },
}

/// One method visited by pass 1
#[derive(Debug, Clone)]
pub struct ScannedMethod {
    /// The method's `MethodDef` token
    pub token: Token,
    /// The method's identity key
    pub key: String,
    /// RVA of the method body, 0 when absent
    pub rva: u32,
    /// Whether a body was found and decoded
    pub body: BodyStatus,
    /// Call targets collected from the body, consumed by pass 2
    pub pending: Vec<PendingCall>,
}

/// Classification of a type definition for reporting purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// An ordinary class
    Class,
    /// An interface
    Interface,
    /// An enumeration (extends System.Enum)
    Enum,
    /// A value type (extends System.ValueType)
    Struct,
    /// A delegate (extends System.MulticastDelegate)
    Delegate,
}

impl TypeKind {
    /// Display text of the kind
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeKind::Class => "Class",
            TypeKind::Interface => "Interface",
            TypeKind::Enum => "Enum",
            TypeKind::Struct => "Struct",
            TypeKind::Delegate => "Delegate",
        }
    }
}

/// One type visited by pass 1, with all of its scanned methods.
///
/// Types without methods still appear, with an empty method list.
#[derive(Debug, Clone)]
pub struct ScannedType {
    /// The type's `TypeDef` token
    pub token: Token,
    /// The type's identity key
    pub key: String,
    /// Classification of the type
    pub kind: TypeKind,
    /// The scanned methods of this type
    pub methods: Vec<ScannedMethod>,
}

/// The complete outcome of pass 1
#[derive(Debug)]
pub struct Scan {
    /// The handle lookup table, complete and ready for pass 2
    pub index: MethodIndex,
    /// All scanned types in table order
    pub types: Vec<ScannedType>,
}

/// Options controlling the scan
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// Skip methods carrying `CompilerGeneratedAttribute`
    pub skip_compiler_generated: bool,
}

/// Which identity a resolved (locally bound) call record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionMode {
    /// Records name the callee and carry the callee's address
    #[default]
    CalleeIdentity,
    /// Compatibility with the original tool's output, which emitted the caller's
    /// own name and address for locally bound targets
    LegacyCallerIdentity,
}

/// Final call record: the resolved name and the callee's code address, or the
/// fallback name with address zero when no local definition exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalledMethod {
    /// Identity of the called method
    #[serde(rename = "Name")]
    pub name: String,
    /// The callee's RVA, 0 when the callee is not defined in this assembly
    #[serde(rename = "Address")]
    pub address: u64,
}

/// Pass 1: visit every type and method, build the handle lookup table, and
/// attach each method's pending call set.
///
/// # Arguments
/// * `assembly` - The assembly to scan
/// * `options` - Scan options
///
/// # Errors
/// Returns an error only for fatal metadata faults (unreadable type rows or
/// heaps). Per-method body failures are absorbed into [`BodyStatus`].
pub fn scan(assembly: &Assembly, options: ScanOptions) -> Result<Scan> {
    let extractor = CallExtractor::new(assembly);
    let mut index = MethodIndex::new();
    let mut types = Vec::new();

    let type_rows: Vec<TypeDefRaw> = assembly
        .table::<TypeDefRaw>()
        .map(|table| table.iter().collect())
        .unwrap_or_default();

    for type_row in type_rows {
        let type_key = identity_key(assembly, &NameEntity::TypeDefinition(type_row.token))?;
        let kind = classify_type(assembly, &type_row);

        let mut methods = Vec::new();
        for method_rid in assembly.methods_of(type_row.rid) {
            let method_token = Token::from_table_row(0x06, method_rid);
            let Ok(method_row) = assembly.row::<MethodDefRaw>(method_token) else {
                debug!("method row {method_token} vanished during scan");
                continue;
            };

            if options.skip_compiler_generated && assembly.is_compiler_generated(method_token) {
                continue;
            }

            let key = identity_key(assembly, &NameEntity::MethodDefinition(method_token))?;

            let (body, pending) = if method_row.rva == 0 {
                (BodyStatus::Absent, Vec::new())
            } else {
                match assembly.method_body(&method_row) {
                    Ok((parsed, code)) => (
                        BodyStatus::Present {
                            code_size: parsed.size_code,
                        },
                        extractor.extract(code),
                    ),
                    Err(error) => {
                        debug!("unreadable body for method {method_token}: {error}");
                        (BodyStatus::Failed, Vec::new())
                    }
                }
            };

            index.insert(MethodSummary {
                token: method_token,
                key: key.clone(),
                rva: method_row.rva,
            });

            methods.push(ScannedMethod {
                token: method_token,
                key,
                rva: method_row.rva,
                body,
                pending,
            });
        }

        types.push(ScannedType {
            token: type_row.token,
            key: type_key,
            kind,
            methods,
        });
    }

    Ok(Scan { index, types })
}

/// Pass 2: convert one method's pending calls into final records.
///
/// Must only run once pass 1 has completed for every method of the assembly;
/// resolving against a partially built index silently misclassifies
/// forward-referenced local callees as external.
#[must_use]
pub fn resolve(
    index: &MethodIndex,
    caller: &ScannedMethod,
    mode: ResolutionMode,
) -> Vec<CalledMethod> {
    caller
        .pending
        .iter()
        .map(|pending| match index.get(pending.target) {
            Some(callee) => match mode {
                ResolutionMode::CalleeIdentity => CalledMethod {
                    name: callee.key.clone(),
                    address: u64::from(callee.rva),
                },
                ResolutionMode::LegacyCallerIdentity => CalledMethod {
                    name: caller.key.clone(),
                    address: u64::from(caller.rva),
                },
            },
            None => CalledMethod {
                name: pending.fallback.clone(),
                address: 0,
            },
        })
        .collect()
}

fn classify_type(assembly: &Assembly, type_row: &TypeDefRaw) -> TypeKind {
    if type_row.attributes().contains(TypeAttributes::INTERFACE) {
        return TypeKind::Interface;
    }

    if !type_row.extends.is_null() {
        if let Ok(base) = assembly.full_type_name(type_row.extends.token) {
            return match base.as_str() {
                "System.Enum" => TypeKind::Enum,
                "System.ValueType" => TypeKind::Struct,
                "System.MulticastDelegate" => TypeKind::Delegate,
                _ => TypeKind::Class,
            };
        }
    }

    TypeKind::Class
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(token: u32, key: &str, rva: u32) -> MethodSummary {
        MethodSummary {
            token: Token::new(token),
            key: key.to_string(),
            rva,
        }
    }

    fn scanned(token: u32, key: &str, rva: u32, pending: Vec<PendingCall>) -> ScannedMethod {
        ScannedMethod {
            token: Token::new(token),
            key: key.to_string(),
            rva,
            body: BodyStatus::Present { code_size: 16 },
            pending,
        }
    }

    fn pending(target: u32, fallback: &str) -> PendingCall {
        PendingCall {
            target: Token::new(target),
            fallback: fallback.to_string(),
        }
    }

    #[test]
    fn local_hit_names_the_callee() {
        let mut index = MethodIndex::new();
        index.insert(summary(0x06000001, "A.M1", 0x2050));
        index.insert(summary(0x06000002, "A.M2", 0x2060));

        let caller = scanned(
            0x06000001,
            "A.M1",
            0x2050,
            vec![pending(0x06000002, "fallback-M2")],
        );

        let calls = resolve(&index, &caller, ResolutionMode::CalleeIdentity);
        assert_eq!(
            calls,
            vec![CalledMethod {
                name: "A.M2".to_string(),
                address: 0x2060,
            }]
        );
    }

    #[test]
    fn external_miss_uses_fallback_with_address_zero() {
        let mut index = MethodIndex::new();
        index.insert(summary(0x06000001, "A.M1", 0x2050));

        let caller = scanned(
            0x06000001,
            "A.M1",
            0x2050,
            vec![pending(0x0A000012, "System.Console.WriteLine`0(string)|static|0x0A000012")],
        );

        let calls = resolve(&index, &caller, ResolutionMode::CalleeIdentity);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].address, 0);
        assert!(calls[0].name.contains("WriteLine"));
    }

    #[test]
    fn mixed_local_and_external_counts() {
        let mut index = MethodIndex::new();
        index.insert(summary(0x06000001, "A.M1", 0x2000));
        index.insert(summary(0x06000002, "A.M2", 0x2100));
        index.insert(summary(0x06000003, "A.M3", 0x2200));

        let caller = scanned(
            0x06000001,
            "A.M1",
            0x2000,
            vec![
                pending(0x06000002, "f2"),
                pending(0x06000003, "f3"),
                pending(0x0A000001, "ext1"),
                pending(0x0A000002, "ext2"),
            ],
        );

        let calls = resolve(&index, &caller, ResolutionMode::CalleeIdentity);
        let local: Vec<&CalledMethod> = calls.iter().filter(|call| call.address != 0).collect();
        let external: Vec<&CalledMethod> = calls.iter().filter(|call| call.address == 0).collect();

        assert_eq!(local.len(), 2);
        assert_eq!(external.len(), 2);
        assert_eq!(external[0].name, "ext1");
        assert_eq!(external[1].name, "ext2");
    }

    #[test]
    fn forward_reference_resolves_after_full_scan() {
        // The callee is inserted after the caller was scanned; resolution only
        // happens once the index is complete, so the forward edge still binds.
        let caller = scanned(
            0x06000001,
            "A.Early",
            0x2000,
            vec![pending(0x06000009, "fallback-late")],
        );

        let mut index = MethodIndex::new();
        index.insert(summary(0x06000001, "A.Early", 0x2000));
        index.insert(summary(0x06000009, "A.Late", 0x3000));

        let calls = resolve(&index, &caller, ResolutionMode::CalleeIdentity);
        assert_eq!(calls[0].name, "A.Late");
        assert_eq!(calls[0].address, 0x3000);
    }

    #[test]
    fn legacy_mode_reproduces_caller_identity() {
        let mut index = MethodIndex::new();
        index.insert(summary(0x06000001, "A.M1", 0x2050));
        index.insert(summary(0x06000002, "A.M2", 0x2060));

        let caller = scanned(
            0x06000001,
            "A.M1",
            0x2050,
            vec![
                pending(0x06000002, "f2"),
                pending(0x0A000001, "external"),
            ],
        );

        let calls = resolve(&index, &caller, ResolutionMode::LegacyCallerIdentity);

        // The historical hit branch re-emits the caller; misses are unaffected
        assert_eq!(calls[0].name, "A.M1");
        assert_eq!(calls[0].address, 0x2050);
        assert_eq!(calls[1].name, "external");
        assert_eq!(calls[1].address, 0);
    }

    #[test]
    fn undecodable_body_contributes_no_records() {
        let index = MethodIndex::new();
        let caller = ScannedMethod {
            token: Token::new(0x06000001),
            key: "A.Broken".to_string(),
            rva: 0x2000,
            body: BodyStatus::Failed,
            pending: Vec::new(),
        };

        assert!(resolve(&index, &caller, ResolutionMode::CalleeIdentity).is_empty());
    }

    #[test]
    fn resolution_is_deterministic() {
        let mut index = MethodIndex::new();
        index.insert(summary(0x06000002, "A.M2", 0x2060));

        let caller = scanned(
            0x06000001,
            "A.M1",
            0x2050,
            vec![pending(0x06000002, "f2"), pending(0x0A000001, "ext")],
        );

        let first = resolve(&index, &caller, ResolutionMode::CalleeIdentity);
        let second = resolve(&index, &caller, ResolutionMode::CalleeIdentity);
        assert_eq!(first, second);
    }
}
