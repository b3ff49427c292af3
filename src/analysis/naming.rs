//! Unique, deterministic identity keys for metadata entities.
//!
//! Plain names collide: overloads share a name, generic types differ only in
//! arity, nested types repeat across enclosing scopes. Identity keys make every
//! entity of one assembly distinguishable by composing the available naming
//! metadata with the entity's metadata token, which is unique per table row.
//!
//! One rule per entity kind, dispatched over [`NameEntity`]:
//!
//! - **Type definition** - namespace, nesting chain joined outer+inner, generic
//!   arity, token.
//! - **Type reference / exported type** - namespace.name and token only; these
//!   rows carry no arity or nesting metadata, a documented precision limit.
//! - **Method definition** - declaring type key, name (constructor marker
//!   stripped), arity, parameter list, attribute flags, token.
//! - **Member reference** - declaring scope key, name, a digest of the raw
//!   signature blob, token.
//! - **Resolved method info** - a name built from in-memory call-site knowledge,
//!   used when the callee cannot be resolved against the local tables.
//!
//! Every rule is pure: identical input yields byte-identical output, and nothing
//! is consulted beyond the entity itself and the immutable metadata store.

use log::debug;
use sha1::{Digest, Sha1};

use crate::{
    metadata::{
        assembly::Assembly,
        method::MethodAttributes,
        tables::{ExportedTypeRaw, MemberRefRaw, MethodDefRaw, ModuleRefRaw, TableId, TypeRefRaw},
        token::Token,
    },
    Result,
};

/// A method named from in-memory, call-site-local knowledge.
///
/// Built by the call extractor for every call target; carries exactly the fields
/// its naming rule needs. Accessibility and virtualness are unavailable for
/// entities defined elsewhere, so the flag field only distinguishes
/// instance/static and the vararg convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMethodInfo {
    /// Full name of the declaring type
    pub declaring_type: String,
    /// The method name, marker prefix not yet stripped
    pub name: String,
    /// Number of generic parameters
    pub generic_arity: u32,
    /// Rendered parameter type names, in order
    pub param_types: Vec<String>,
    /// The method has no `this` parameter
    pub is_static: bool,
    /// The method uses the vararg calling convention
    pub is_vararg: bool,
    /// The call-site token of the method
    pub token: Token,
}

impl ResolvedMethodInfo {
    /// The identity key of this in-memory method description.
    ///
    /// Unlike the table-backed rules this one needs no metadata store; it is the
    /// rule behind [`NameEntity::ResolvedMethodInfo`].
    #[must_use]
    pub fn key(&self) -> String {
        resolved_method_key(self)
    }
}

/// A metadata entity to be named, tagged by kind.
///
/// Each variant carries exactly what its naming rule consumes; table rows are
/// fetched from the assembly on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameEntity {
    /// A type defined in this assembly (`TypeDef` token)
    TypeDefinition(Token),
    /// A type defined elsewhere (`TypeRef` token)
    TypeReference(Token),
    /// A type exported from another module of this assembly (`ExportedType` token)
    ExportedType(Token),
    /// A method defined in this assembly (`MethodDef` token)
    MethodDefinition(Token),
    /// A member defined outside the local definition tables (`MemberRef` token)
    MemberReference(Token),
    /// A callee known only through in-memory call-site information
    ResolvedMethodInfo(ResolvedMethodInfo),
}

/// Compute the identity key of a metadata entity.
///
/// # Arguments
/// * `assembly` - The assembly whose metadata store backs the entity
/// * `entity` - The entity to name
///
/// # Errors
/// Returns an error if a referenced table row or heap entry cannot be resolved.
pub fn identity_key(assembly: &Assembly, entity: &NameEntity) -> Result<String> {
    match entity {
        NameEntity::TypeDefinition(token) => type_definition_key(assembly, *token),
        NameEntity::TypeReference(token) => {
            let row = assembly.row::<TypeRefRaw>(*token)?;
            let namespace = assembly.string_at(row.type_namespace)?;
            let name = assembly.string_at(row.type_name)?;
            Ok(format!(
                "{}|0x{:08X}",
                join_namespace(&namespace, &name),
                token.value()
            ))
        }
        NameEntity::ExportedType(token) => {
            let row = assembly.row::<ExportedTypeRaw>(*token)?;
            let namespace = assembly.string_at(row.type_namespace)?;
            let name = assembly.string_at(row.type_name)?;
            Ok(format!(
                "{}|0x{:08X}",
                join_namespace(&namespace, &name),
                token.value()
            ))
        }
        NameEntity::MethodDefinition(token) => method_definition_key(assembly, *token),
        NameEntity::MemberReference(token) => member_reference_key(assembly, *token),
        NameEntity::ResolvedMethodInfo(info) => Ok(info.key()),
    }
}

/// Rule for type definitions: `{ns.Outer+Inner}`{arity}|0x{token}`.
fn type_definition_key(assembly: &Assembly, token: Token) -> Result<String> {
    let full_name = assembly.full_type_name(token)?;
    let arity = assembly.generic_arity(token);
    Ok(format!("{}`{}|0x{:08X}", full_name, arity, token.value()))
}

/// Rule for method definitions:
/// `{type_key}.{name}`{arity}({params})|{attributes}|0x{token}`.
fn method_definition_key(assembly: &Assembly, token: Token) -> Result<String> {
    let method = assembly.row::<MethodDefRaw>(token)?;

    let type_key = match assembly.declaring_type_of(token) {
        Some(type_token) => type_definition_key(assembly, type_token)?,
        None => String::from("<module>"),
    };

    let name = assembly.string_at(method.name)?;
    let name = strip_name_marker(&name).to_string();
    let arity = assembly.generic_arity(token);
    let params = method_parameter_list(assembly, &method);
    let attributes = MethodAttributes::from_bits_truncate(method.flags);

    Ok(format!(
        "{}.{}`{}({})|{}|0x{:08X}",
        type_key,
        name,
        arity,
        params.join(","),
        attributes,
        token.value()
    ))
}

/// Parameter text for a local method.
///
/// Each position uses the Param row's name when one is present for that sequence
/// number, and the decoded signature's type text otherwise. Unreadable signatures
/// degrade to the named parameters alone.
fn method_parameter_list(assembly: &Assembly, method: &MethodDefRaw) -> Vec<String> {
    let signature = match assembly.method_signature(method.signature) {
        Ok(signature) => Some(signature),
        Err(error) => {
            debug!(
                "unreadable signature for method {}: {}",
                method.token, error
            );
            None
        }
    };

    let param_rows = assembly.method_params(method.rid);
    let declared = signature.as_ref().map_or_else(
        // Sequence 0 is the return value row and does not count
        || param_rows.iter().filter(|row| row.sequence > 0).count(),
        |sig| sig.params.len(),
    );

    let mut params = Vec::with_capacity(declared);
    for position in 1..=declared {
        let named = param_rows
            .iter()
            .find(|row| usize::from(row.sequence) == position && row.name != 0)
            .and_then(|row| assembly.string_at(row.name).ok())
            .filter(|name| !name.is_empty());

        match named {
            Some(name) => params.push(name),
            None => match signature.as_ref().and_then(|sig| sig.params.get(position - 1)) {
                Some(type_sig) => params.push(assembly.type_text(type_sig)),
                None => params.push(format!("param{position}")),
            },
        }
    }

    params
}

/// Rule for member references:
/// `{parent_key}.{name}|sig:0x{digest}|0x{token}`.
///
/// The parent key is computed by whichever rule the parent handle denotes. The
/// signature digest disambiguates overloads that share a name; referenced rows
/// carry no arity or parameter names, so this key is less precise than a method
/// definition key.
fn member_reference_key(assembly: &Assembly, token: Token) -> Result<String> {
    let member = assembly.row::<MemberRefRaw>(token)?;

    let parent_key = match member.class.tag {
        TableId::TypeRef => {
            identity_key(assembly, &NameEntity::TypeReference(member.class.token))?
        }
        TableId::TypeDef => type_definition_key(assembly, member.class.token)?,
        TableId::TypeSpec => assembly.full_type_name(member.class.token)?,
        TableId::ModuleRef => {
            let module_ref = assembly.row::<ModuleRefRaw>(member.class.token)?;
            assembly.string_at(module_ref.name)?
        }
        TableId::MethodDef => method_definition_key(assembly, member.class.token)?,
        _ => format!("{:?}", member.class.tag),
    };

    let name = assembly.string_at(member.name)?;
    let name = strip_name_marker(&name);

    let digest = match assembly.blob_at(member.signature) {
        Ok(blob) if !blob.is_empty() => format!("|sig:0x{:08X}", signature_digest(&blob)),
        _ => String::new(),
    };

    Ok(format!(
        "{}.{}{}|0x{:08X}",
        parent_key,
        name,
        digest,
        token.value()
    ))
}

/// Rule for in-memory resolved methods:
/// `{type}.{name}`{arity}({param_types})|{flags}|0x{token}`.
fn resolved_method_key(info: &ResolvedMethodInfo) -> String {
    let mut flags = if info.is_static { "static" } else { "instance" }.to_string();
    if info.is_vararg {
        flags.push_str("|vararg");
    }

    format!(
        "{}.{}`{}({})|{}|0x{:08X}",
        info.declaring_type,
        strip_name_marker(&info.name),
        info.generic_arity,
        info.param_types.join(","),
        flags,
        info.token.value()
    )
}

/// Strip the leading marker of special member names (`.ctor`, `.cctor`).
fn strip_name_marker(name: &str) -> &str {
    name.strip_prefix('.').unwrap_or(name)
}

/// Stable 32-bit digest of a signature blob: the first four bytes of its SHA-1.
fn signature_digest(blob: &[u8]) -> u32 {
    let digest = Sha1::digest(blob);
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

fn join_namespace(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_stripping() {
        assert_eq!(strip_name_marker(".ctor"), "ctor");
        assert_eq!(strip_name_marker(".cctor"), "cctor");
        assert_eq!(strip_name_marker("Main"), "Main");
        assert_eq!(strip_name_marker(""), "");
    }

    #[test]
    fn signature_digest_is_stable() {
        let blob = [0x20, 0x01, 0x01, 0x0E];
        assert_eq!(signature_digest(&blob), signature_digest(&blob));
        assert_ne!(signature_digest(&blob), signature_digest(&[0x20, 0x01]));
    }

    #[test]
    fn resolved_method_key_shape() {
        let info = ResolvedMethodInfo {
            declaring_type: "System.Console".to_string(),
            name: "WriteLine".to_string(),
            generic_arity: 0,
            param_types: vec!["string".to_string()],
            is_static: true,
            is_vararg: false,
            token: Token::new(0x0A000012),
        };

        assert_eq!(
            resolved_method_key(&info),
            "System.Console.WriteLine`0(string)|static|0x0A000012"
        );
    }

    #[test]
    fn resolved_method_key_instance_vararg() {
        let info = ResolvedMethodInfo {
            declaring_type: "Lib.Formatter".to_string(),
            name: ".ctor".to_string(),
            generic_arity: 1,
            param_types: vec!["object[]".to_string(), "int32".to_string()],
            is_static: false,
            is_vararg: true,
            token: Token::new(0x0A000034),
        };

        assert_eq!(
            resolved_method_key(&info),
            "Lib.Formatter.ctor`1(object[],int32)|instance|vararg|0x0A000034"
        );
    }

    #[test]
    fn resolved_method_key_is_deterministic() {
        let info = ResolvedMethodInfo {
            declaring_type: "A.B".to_string(),
            name: "M".to_string(),
            generic_arity: 2,
            param_types: vec!["!!0".to_string(), "!!1".to_string()],
            is_static: false,
            is_vararg: false,
            token: Token::new(0x06000005),
        };

        assert_eq!(resolved_method_key(&info), resolved_method_key(&info));
    }

    #[test]
    fn namespace_joining() {
        assert_eq!(join_namespace("System", "Console"), "System.Console");
        assert_eq!(join_namespace("", "Program"), "Program");
    }
}
