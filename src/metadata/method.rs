//! CIL method body headers and method attribute flags.
//!
//! Method bodies are located by the RVA stored in their `MethodDef` row and start
//! with either a tiny (1 byte) or fat (12 byte) header describing the size of the
//! IL code that follows. Supports both formats as specified by ECMA-335.
//!
//! # Reference
//! - ECMA-335 6th Edition, Partition II, Section 25.4 - Method Header Format

use bitflags::bitflags;

use crate::{file::io::read_le, Error::OutOfBounds, Result};

bitflags! {
    /// Method body header format flags (ECMA-335 II.25.4.4)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodBodyFlags: u16 {
        /// The body has a tiny header
        const TINY_FORMAT = 0x2;
        /// The body has a fat header
        const FAT_FORMAT = 0x3;
        /// More sections (exception handling data) follow the code
        const MORE_SECTS = 0x8;
        /// Call the default constructor on all local variables
        const INIT_LOCALS = 0x10;
    }
}

bitflags! {
    /// Method attribute flags from the `MethodDef` table (ECMA-335 II.23.1.10).
    ///
    /// The low three bits are the member access level; the remainder are
    /// independent flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodAttributes: u16 {
        /// Member access mask (3 bits)
        const MEMBER_ACCESS_MASK = 0x0007;
        /// Member not referenceable
        const COMPILER_CONTROLLED = 0x0000;
        /// Accessible only by this type
        const PRIVATE = 0x0001;
        /// Accessible by subtypes in this assembly
        const FAM_AND_ASSEM = 0x0002;
        /// Accessible by anyone in this assembly
        const ASSEM = 0x0003;
        /// Accessible by this type and subtypes
        const FAMILY = 0x0004;
        /// Accessible by subtypes and this assembly
        const FAM_OR_ASSEM = 0x0005;
        /// Accessible by anyone
        const PUBLIC = 0x0006;
        /// Defined on the type, not on instances
        const STATIC = 0x0010;
        /// Cannot be overridden
        const FINAL = 0x0020;
        /// Dispatched through the vtable
        const VIRTUAL = 0x0040;
        /// Hides by name and signature
        const HIDE_BY_SIG = 0x0080;
        /// Method gets a new vtable slot
        const NEW_SLOT = 0x0100;
        /// Can only be overridden when also accessible
        const STRICT = 0x0200;
        /// Does not provide an implementation
        const ABSTRACT = 0x0400;
        /// Name is special, interpreted by tools
        const SPECIAL_NAME = 0x0800;
        /// Name is special, interpreted by the runtime
        const RT_SPECIAL_NAME = 0x1000;
        /// Implementation is forwarded through P/Invoke
        const PINVOKE_IMPL = 0x2000;
        /// Reserved: has security associated
        const HAS_SECURITY = 0x4000;
        /// Reserved: calls `require_sec_object`
        const REQUIRE_SEC_OBJECT = 0x8000;
    }
}

impl std::fmt::Display for MethodAttributes {
    /// Renders the access level followed by the set flags, comma-joined.
    ///
    /// The rendering is deterministic (fixed flag order), which makes it usable
    /// inside identity keys.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let access = match self.bits() & MethodAttributes::MEMBER_ACCESS_MASK.bits() {
            0x0001 => "Private",
            0x0002 => "FamANDAssem",
            0x0003 => "Assembly",
            0x0004 => "Family",
            0x0005 => "FamORAssem",
            0x0006 => "Public",
            _ => "PrivateScope",
        };
        f.write_str(access)?;

        const NAMED: &[(MethodAttributes, &str)] = &[
            (MethodAttributes::STATIC, "Static"),
            (MethodAttributes::FINAL, "Final"),
            (MethodAttributes::VIRTUAL, "Virtual"),
            (MethodAttributes::HIDE_BY_SIG, "HideBySig"),
            (MethodAttributes::NEW_SLOT, "NewSlot"),
            (MethodAttributes::STRICT, "Strict"),
            (MethodAttributes::ABSTRACT, "Abstract"),
            (MethodAttributes::SPECIAL_NAME, "SpecialName"),
            (MethodAttributes::RT_SPECIAL_NAME, "RTSpecialName"),
            (MethodAttributes::PINVOKE_IMPL, "PinvokeImpl"),
            (MethodAttributes::HAS_SECURITY, "HasSecurity"),
            (MethodAttributes::REQUIRE_SEC_OBJECT, "RequireSecObject"),
        ];

        for (flag, name) in NAMED {
            if self.contains(*flag) {
                write!(f, ", {name}")?;
            }
        }

        Ok(())
    }
}

/// The parsed header of one CIL method body.
///
/// Exception handling sections that may follow the code are detected but not
/// modeled; call extraction operates on the code bytes alone.
pub struct MethodBody {
    /// Size of the IL code (not counting the header) in bytes
    pub size_code: usize,
    /// Size of the method header in bytes
    pub size_header: usize,
    /// Metadata token of the local variable signature, 0 when absent
    pub local_var_sig_token: u32,
    /// Maximum number of items on the operand stack
    pub max_stack: usize,
    /// Flag indicating the type of the method header
    pub is_fat: bool,
    /// Flag indicating that local variables are default-initialized
    pub is_init_local: bool,
    /// Flag indicating that exception handling sections follow the code
    pub has_sections: bool,
}

impl MethodBody {
    /// Parse a method body header from a byte slice beginning at the body RVA.
    ///
    /// # Arguments
    /// * `data` - The byte slice from which this object shall be created
    ///
    /// # Errors
    /// Returns an error if the data is empty, truncated, or has an invalid header.
    pub fn from(data: &[u8]) -> Result<MethodBody> {
        if data.is_empty() {
            return Err(malformed_error!("Provided data for body parsing is empty"));
        }

        let first_byte = read_le::<u8>(data)?;
        match u16::from(first_byte & 0b0000_0011) {
            format if format == MethodBodyFlags::TINY_FORMAT.bits() => {
                let size_code = (first_byte >> 2) as usize;
                if size_code + 1 > data.len() {
                    return Err(OutOfBounds);
                }

                Ok(MethodBody {
                    size_code,
                    size_header: 1,
                    local_var_sig_token: 0,
                    max_stack: 8,
                    is_fat: false,
                    is_init_local: false,
                    has_sections: false,
                })
            }
            format if format == MethodBodyFlags::FAT_FORMAT.bits() => {
                if data.len() < 12 {
                    return Err(OutOfBounds);
                }

                let first_duo = read_le::<u16>(data)?;
                let flags = MethodBodyFlags::from_bits_truncate(first_duo & 0x0FFF);

                let size_header = ((first_duo >> 12) * 4) as usize;
                if size_header < 12 {
                    return Err(malformed_error!(
                        "Invalid fat header size - {}",
                        size_header
                    ));
                }

                let max_stack = read_le::<u16>(&data[2..])? as usize;
                let size_code = read_le::<u32>(&data[4..])? as usize;
                let local_var_sig_token = read_le::<u32>(&data[8..])?;

                if data.len() < size_header + size_code {
                    return Err(OutOfBounds);
                }

                Ok(MethodBody {
                    size_code,
                    size_header,
                    local_var_sig_token,
                    max_stack,
                    is_fat: true,
                    is_init_local: flags.contains(MethodBodyFlags::INIT_LOCALS),
                    has_sections: flags.contains(MethodBodyFlags::MORE_SECTS),
                })
            }
            _ => Err(malformed_error!(
                "Invalid method body header type - 0x{:02X}",
                first_byte
            )),
        }
    }

    /// The IL code bytes of this body within `data`, the slice the header was
    /// parsed from.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the declared code size exceeds `data`.
    pub fn code<'a>(&self, data: &'a [u8]) -> Result<&'a [u8]> {
        let Some(end) = self.size_header.checked_add(self.size_code) else {
            return Err(OutOfBounds);
        };

        if end > data.len() {
            return Err(OutOfBounds);
        }

        Ok(&data[self.size_header..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiny_header() {
        // 0x0A = (2 << 2) | TINY_FORMAT: 2 bytes of code
        let data = [0x0A, 0x00, 0x2A];
        let body = MethodBody::from(&data).unwrap();

        assert!(!body.is_fat);
        assert_eq!(body.size_header, 1);
        assert_eq!(body.size_code, 2);
        assert_eq!(body.local_var_sig_token, 0);
        assert_eq!(body.code(&data).unwrap(), &[0x00, 0x2A]);
    }

    #[test]
    fn fat_header() {
        #[rustfmt::skip]
        let data = [
            0x13, 0x30,             // flags = FAT | INIT_LOCALS, header size = 3 * 4
            0x08, 0x00,             // max_stack = 8
            0x03, 0x00, 0x00, 0x00, // code size = 3
            0x01, 0x00, 0x00, 0x11, // local var sig token = 0x11000001
            0x00, 0x00, 0x2A,       // nop, nop, ret
        ];

        let body = MethodBody::from(&data).unwrap();

        assert!(body.is_fat);
        assert!(body.is_init_local);
        assert!(!body.has_sections);
        assert_eq!(body.size_header, 12);
        assert_eq!(body.size_code, 3);
        assert_eq!(body.max_stack, 8);
        assert_eq!(body.local_var_sig_token, 0x11000001);
        assert_eq!(body.code(&data).unwrap(), &[0x00, 0x00, 0x2A]);
    }

    #[test]
    fn truncated_tiny_rejected() {
        // Declares 4 bytes of code, provides 1
        let data = [0x12, 0x00];
        assert!(MethodBody::from(&data).is_err());
    }

    #[test]
    fn truncated_fat_rejected() {
        let data = [0x03, 0x30, 0x08, 0x00];
        assert!(MethodBody::from(&data).is_err());
    }

    #[test]
    fn invalid_format_rejected() {
        let data = [0x00, 0x00];
        assert!(MethodBody::from(&data).is_err());
        assert!(MethodBody::from(&[]).is_err());
    }

    #[test]
    fn attributes_display() {
        let attrs = MethodAttributes::PUBLIC
            | MethodAttributes::STATIC
            | MethodAttributes::HIDE_BY_SIG;
        assert_eq!(attrs.to_string(), "Public, Static, HideBySig");

        let attrs = MethodAttributes::PRIVATE | MethodAttributes::SPECIAL_NAME;
        assert_eq!(attrs.to_string(), "Private, SpecialName");

        assert_eq!(MethodAttributes::empty().to_string(), "PrivateScope");
    }

    #[test]
    fn attributes_display_is_deterministic() {
        let attrs = MethodAttributes::from_bits_truncate(0x0096);
        assert_eq!(attrs.to_string(), attrs.to_string());
        assert_eq!(attrs.to_string(), "Public, Static, HideBySig");
    }
}
