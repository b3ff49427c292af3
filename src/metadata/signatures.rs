//! Signature blob parsing for method and field signatures.
//!
//! Signatures are stored in the `#Blob` heap as compressed byte sequences. This
//! module decodes the subset the analyzer needs: method definition/reference
//! signatures (for parameter and return types) and type signatures (for rendering
//! parameter type text and resolving `TypeSpec` parents).
//!
//! # Reference
//! - [ECMA-335 II.23.2](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{file::parser::Parser, metadata::token::Token, Result};

/// Element type constants from ECMA-335 II.23.1.16
pub(crate) mod element {
    pub const VOID: u8 = 0x01;
    pub const BOOLEAN: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const I1: u8 = 0x04;
    pub const U1: u8 = 0x05;
    pub const I2: u8 = 0x06;
    pub const U2: u8 = 0x07;
    pub const I4: u8 = 0x08;
    pub const U4: u8 = 0x09;
    pub const I8: u8 = 0x0A;
    pub const U8: u8 = 0x0B;
    pub const R4: u8 = 0x0C;
    pub const R8: u8 = 0x0D;
    pub const STRING: u8 = 0x0E;
    pub const PTR: u8 = 0x0F;
    pub const BYREF: u8 = 0x10;
    pub const VALUETYPE: u8 = 0x11;
    pub const CLASS: u8 = 0x12;
    pub const VAR: u8 = 0x13;
    pub const ARRAY: u8 = 0x14;
    pub const GENERICINST: u8 = 0x15;
    pub const TYPEDBYREF: u8 = 0x16;
    pub const I: u8 = 0x18;
    pub const U: u8 = 0x19;
    pub const FNPTR: u8 = 0x1B;
    pub const OBJECT: u8 = 0x1C;
    pub const SZARRAY: u8 = 0x1D;
    pub const MVAR: u8 = 0x1E;
    pub const CMOD_REQD: u8 = 0x1F;
    pub const CMOD_OPT: u8 = 0x20;
    pub const SENTINEL: u8 = 0x41;
    pub const PINNED: u8 = 0x45;
}

/// Calling convention constants from ECMA-335 II.23.2.3
mod calling_convention {
    pub const MASK: u8 = 0x0F;
    pub const VARARG: u8 = 0x05;
    pub const FIELD: u8 = 0x06;
    pub const GENERIC: u8 = 0x10;
    pub const HAS_THIS: u8 = 0x20;
    pub const EXPLICIT_THIS: u8 = 0x40;
}

const MAX_RECURSION_DEPTH: usize = 50;

/// Represents a parsed type from a signature blob
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSig {
    /// void
    Void,
    /// bool
    Boolean,
    /// char
    Char,
    /// signed 8bit integer
    I1,
    /// unsigned 8bit integer
    U1,
    /// signed 16bit integer
    I2,
    /// unsigned 16bit integer
    U2,
    /// signed 32bit integer
    I4,
    /// unsigned 32bit integer
    U4,
    /// signed 64bit integer
    I8,
    /// unsigned 64bit integer
    U8,
    /// 32bit floating-point
    R4,
    /// 64bit floating-point
    R8,
    /// System.String
    String,
    /// System.Object
    Object,
    /// signed integer, sized to executing platform
    I,
    /// unsigned integer, sized to executing platform
    U,
    /// Type is referenced during runtime
    TypedByRef,
    /// A pointer to a type
    Ptr(Box<TypeSig>),
    /// Type passed by reference
    ByRef(Box<TypeSig>),
    /// CIL value-type, `TypeDefOrRefOrSpecEncoded`
    ValueType(Token),
    /// CIL class, `TypeDefOrRefOrSpecEncoded`
    Class(Token),
    /// Generic type parameter, index into the owner's `GenericParam` list
    Var(u32),
    /// Generic method parameter, index into the owner's `GenericParam` list
    MVar(u32),
    /// Multi-dimensional array with a rank
    Array {
        /// The element type
        base: Box<TypeSig>,
        /// Number of dimensions
        rank: u32,
    },
    /// Single-dimensional array
    SzArray(Box<TypeSig>),
    /// Generic type and its arguments
    GenericInst(Box<TypeSig>, Vec<TypeSig>),
    /// Function pointer
    FnPtr(Box<MethodSig>),
    /// A pinned type (local variable signatures only)
    Pinned(Box<TypeSig>),
    /// Sentinel marking the start of vararg arguments
    Sentinel,
}

/// A parsed method signature (ECMA-335 II.23.2.1)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethodSig {
    /// Instance method: the first stack argument is `this`
    pub has_this: bool,
    /// `this` is listed explicitly in the parameter types
    pub explicit_this: bool,
    /// Uses the vararg calling convention
    pub vararg: bool,
    /// Number of generic parameters of the method
    pub generic_count: u32,
    /// The return type
    pub return_type: Option<TypeSig>,
    /// The parameter types, in order
    pub params: Vec<TypeSig>,
}

/// Returns `true` if the blob is a method signature (as opposed to a field,
/// property, or local variable signature).
#[must_use]
pub fn is_method_signature(blob: &[u8]) -> bool {
    match blob.first() {
        Some(first) => {
            let convention = first & calling_convention::MASK;
            convention <= calling_convention::VARARG
        }
        None => false,
    }
}

/// Parse a `MethodDefSig` or `MethodRefSig` blob.
///
/// # Arguments
/// * `blob` - The raw signature bytes from the `#Blob` heap
///
/// # Errors
/// Returns an error if the blob is truncated, is not a method signature, or nests
/// deeper than the recursion limit.
pub fn parse_method_signature(blob: &[u8]) -> Result<MethodSig> {
    let mut parser = Parser::new(blob);

    let convention = parser.read_le::<u8>()?;
    if (convention & calling_convention::MASK) == calling_convention::FIELD {
        return Err(malformed_error!(
            "Expected a method signature, found a field signature - 0x{:02X}",
            convention
        ));
    }

    let generic_count = if convention & calling_convention::GENERIC != 0 {
        parser.read_compressed_uint()?
    } else {
        0
    };

    let param_count = parser.read_compressed_uint()?;
    let return_type = parse_type(&mut parser, 0)?;

    let mut params = Vec::with_capacity(param_count as usize);
    for _ in 0..param_count {
        let param = parse_type(&mut parser, 0)?;
        if param == TypeSig::Sentinel {
            // Sentinel separates fixed parameters from vararg extras at a call
            // site; the extras do not contribute to the declared parameter list.
            break;
        }
        params.push(param);
    }

    Ok(MethodSig {
        has_this: convention & calling_convention::HAS_THIS != 0,
        explicit_this: convention & calling_convention::EXPLICIT_THIS != 0,
        vararg: (convention & calling_convention::MASK) == calling_convention::VARARG,
        generic_count,
        return_type: Some(return_type),
        params,
    })
}

/// Parse a `TypeSpec` signature blob into a single type.
///
/// # Errors
/// Returns an error if the blob is truncated or malformed.
pub fn parse_type_spec(blob: &[u8]) -> Result<TypeSig> {
    let mut parser = Parser::new(blob);
    parse_type(&mut parser, 0)
}

fn parse_type(parser: &mut Parser, depth: usize) -> Result<TypeSig> {
    if depth > MAX_RECURSION_DEPTH {
        return Err(crate::Error::RecursionLimit(MAX_RECURSION_DEPTH));
    }

    let element_type = parser.read_le::<u8>()?;
    match element_type {
        element::VOID => Ok(TypeSig::Void),
        element::BOOLEAN => Ok(TypeSig::Boolean),
        element::CHAR => Ok(TypeSig::Char),
        element::I1 => Ok(TypeSig::I1),
        element::U1 => Ok(TypeSig::U1),
        element::I2 => Ok(TypeSig::I2),
        element::U2 => Ok(TypeSig::U2),
        element::I4 => Ok(TypeSig::I4),
        element::U4 => Ok(TypeSig::U4),
        element::I8 => Ok(TypeSig::I8),
        element::U8 => Ok(TypeSig::U8),
        element::R4 => Ok(TypeSig::R4),
        element::R8 => Ok(TypeSig::R8),
        element::STRING => Ok(TypeSig::String),
        element::OBJECT => Ok(TypeSig::Object),
        element::I => Ok(TypeSig::I),
        element::U => Ok(TypeSig::U),
        element::TYPEDBYREF => Ok(TypeSig::TypedByRef),
        element::PTR => Ok(TypeSig::Ptr(Box::new(parse_type(parser, depth + 1)?))),
        element::BYREF => Ok(TypeSig::ByRef(Box::new(parse_type(parser, depth + 1)?))),
        element::VALUETYPE => Ok(TypeSig::ValueType(parser.read_compressed_token()?)),
        element::CLASS => Ok(TypeSig::Class(parser.read_compressed_token()?)),
        element::VAR => Ok(TypeSig::Var(parser.read_compressed_uint()?)),
        element::MVAR => Ok(TypeSig::MVar(parser.read_compressed_uint()?)),
        element::ARRAY => {
            let base = parse_type(parser, depth + 1)?;
            let rank = parser.read_compressed_uint()?;

            let num_sizes = parser.read_compressed_uint()?;
            for _ in 0..num_sizes {
                parser.read_compressed_uint()?;
            }

            let num_lo_bounds = parser.read_compressed_uint()?;
            for _ in 0..num_lo_bounds {
                parser.read_compressed_int()?;
            }

            Ok(TypeSig::Array {
                base: Box::new(base),
                rank,
            })
        }
        element::SZARRAY => Ok(TypeSig::SzArray(Box::new(parse_type(parser, depth + 1)?))),
        element::GENERICINST => {
            let base = parse_type(parser, depth + 1)?;
            let arg_count = parser.read_compressed_uint()?;

            let mut args = Vec::with_capacity(arg_count as usize);
            for _ in 0..arg_count {
                args.push(parse_type(parser, depth + 1)?);
            }

            Ok(TypeSig::GenericInst(Box::new(base), args))
        }
        element::FNPTR => {
            // A full method signature follows inline
            let convention = parser.read_le::<u8>()?;
            let generic_count = if convention & calling_convention::GENERIC != 0 {
                parser.read_compressed_uint()?
            } else {
                0
            };

            let param_count = parser.read_compressed_uint()?;
            let return_type = parse_type(parser, depth + 1)?;

            let mut params = Vec::with_capacity(param_count as usize);
            for _ in 0..param_count {
                let param = parse_type(parser, depth + 1)?;
                if param == TypeSig::Sentinel {
                    break;
                }
                params.push(param);
            }

            Ok(TypeSig::FnPtr(Box::new(MethodSig {
                has_this: convention & calling_convention::HAS_THIS != 0,
                explicit_this: convention & calling_convention::EXPLICIT_THIS != 0,
                vararg: (convention & calling_convention::MASK) == calling_convention::VARARG,
                generic_count,
                return_type: Some(return_type),
                params,
            })))
        }
        element::CMOD_REQD | element::CMOD_OPT => {
            // Custom modifiers decorate the type that follows; the modifier token
            // itself does not affect naming.
            parser.read_compressed_token()?;
            parse_type(parser, depth + 1)
        }
        element::PINNED => Ok(TypeSig::Pinned(Box::new(parse_type(parser, depth + 1)?))),
        element::SENTINEL => Ok(TypeSig::Sentinel),
        _ => Err(malformed_error!(
            "Unsupported ELEMENT_TYPE - 0x{:02X}",
            element_type
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_void_no_params() {
        // default convention, 0 params, void return
        let blob = [0x00, 0x00, 0x01];
        let sig = parse_method_signature(&blob).unwrap();

        assert!(!sig.has_this);
        assert!(!sig.vararg);
        assert_eq!(sig.generic_count, 0);
        assert_eq!(sig.return_type, Some(TypeSig::Void));
        assert!(sig.params.is_empty());
    }

    #[test]
    fn instance_string_param() {
        // HASTHIS, 1 param, void return, string param
        let blob = [0x20, 0x01, 0x01, 0x0E];
        let sig = parse_method_signature(&blob).unwrap();

        assert!(sig.has_this);
        assert_eq!(sig.params, vec![TypeSig::String]);
    }

    #[test]
    fn generic_method() {
        // GENERIC, 1 generic param, 2 params (int32, !!0), int32 return
        let blob = [0x10, 0x01, 0x02, 0x08, 0x08, 0x1E, 0x00];
        let sig = parse_method_signature(&blob).unwrap();

        assert_eq!(sig.generic_count, 1);
        assert_eq!(sig.return_type, Some(TypeSig::I4));
        assert_eq!(sig.params, vec![TypeSig::I4, TypeSig::MVar(0)]);
    }

    #[test]
    fn class_and_valuetype_params() {
        // default, 2 params, void return:
        //   class TypeRef row 0x12 (encoded 0x49), valuetype TypeDef row 1 (encoded 0x04)
        let blob = [0x00, 0x02, 0x01, 0x12, 0x49, 0x11, 0x04];
        let sig = parse_method_signature(&blob).unwrap();

        assert_eq!(sig.params.len(), 2);
        assert_eq!(sig.params[0], TypeSig::Class(Token::new(0x01000012)));
        assert_eq!(sig.params[1], TypeSig::ValueType(Token::new(0x02000001)));
    }

    #[test]
    fn szarray_and_byref() {
        // default, 2 params, void return: string[], int32&
        let blob = [0x00, 0x02, 0x01, 0x1D, 0x0E, 0x10, 0x08];
        let sig = parse_method_signature(&blob).unwrap();

        assert_eq!(
            sig.params,
            vec![
                TypeSig::SzArray(Box::new(TypeSig::String)),
                TypeSig::ByRef(Box::new(TypeSig::I4)),
            ]
        );
    }

    #[test]
    fn generic_inst_param() {
        // default, 1 param, void return: class List`1<int32> (TypeRef row 2)
        let blob = [0x00, 0x01, 0x01, 0x15, 0x12, 0x09, 0x01, 0x08];
        let sig = parse_method_signature(&blob).unwrap();

        assert_eq!(
            sig.params[0],
            TypeSig::GenericInst(
                Box::new(TypeSig::Class(Token::new(0x01000002))),
                vec![TypeSig::I4]
            )
        );
    }

    #[test]
    fn field_signature_rejected() {
        // FIELD convention
        let blob = [0x06, 0x08];
        assert!(parse_method_signature(&blob).is_err());
        assert!(!is_method_signature(&blob));
        assert!(is_method_signature(&[0x20, 0x00, 0x01]));
        assert!(!is_method_signature(&[]));
    }

    #[test]
    fn truncated_signature_rejected() {
        let blob = [0x00, 0x02, 0x01, 0x0E];
        assert!(parse_method_signature(&blob).is_err());
    }

    #[test]
    fn type_spec_generic_inst() {
        // valuetype Nullable`1<int64> (TypeRef row 3)
        let blob = [0x15, 0x11, 0x0D, 0x01, 0x0A];
        let spec = parse_type_spec(&blob).unwrap();

        assert_eq!(
            spec,
            TypeSig::GenericInst(
                Box::new(TypeSig::ValueType(Token::new(0x0100_0003))),
                vec![TypeSig::I8]
            )
        );
    }

    #[test]
    fn custom_modifiers_skipped() {
        // default, 1 param, void return: cmod_opt(TypeRef row 1) int32
        let blob = [0x00, 0x01, 0x01, 0x20, 0x05, 0x08];
        let sig = parse_method_signature(&blob).unwrap();
        assert_eq!(sig.params, vec![TypeSig::I4]);
    }
}
