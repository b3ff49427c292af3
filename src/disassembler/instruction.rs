//! CIL instruction representation and opcode tables.
//!
//! The two static tables [`INSTRUCTIONS`] (one-byte opcodes) and [`INSTRUCTIONS_FE`]
//! (two-byte opcodes behind the `0xFE` prefix) drive the decoder: each entry names
//! the instruction, its operand encoding, and its effect on control flow. Reserved
//! encodings carry an empty mnemonic and are rejected during decoding.
//!
//! # Reference
//! - ECMA-335 6th Edition, Partition III - CIL Instruction Set

use crate::metadata::token::Token;

/// Operand encoding of an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// No operand bytes
    None,
    /// 1-byte signed immediate (also short branch targets)
    Int8,
    /// 1-byte unsigned immediate
    UInt8,
    /// 2-byte unsigned immediate
    UInt16,
    /// 4-byte signed immediate (also long branch targets)
    Int32,
    /// 8-byte signed immediate
    Int64,
    /// 4-byte float immediate
    Float32,
    /// 8-byte float immediate
    Float64,
    /// 4-byte metadata token
    Token,
    /// Jump table: count followed by 4-byte relative targets
    Switch,
}

/// How an instruction affects control flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Control continues with the next instruction
    Normal,
    /// Invokes a method, control returns afterwards
    Call,
    /// Exits the current method and continues in the jump target method
    Jump,
    /// Returns from the current method
    Return,
    /// Branches when a condition holds, falls through otherwise
    ConditionalBranch,
    /// Always branches
    UnconditionalBranch,
    /// Multi-way branch through a jump table
    Switch,
    /// Raises an exception
    Throw,
    /// Debugger breakpoint
    Break,
    /// Prefix that modifies the following instruction
    Meta,
}

/// One entry of the opcode tables
pub struct OpCode {
    /// Instruction mnemonic, empty for reserved encodings
    pub mnemonic: &'static str,
    /// Operand encoding
    pub operand: OperandType,
    /// Control flow effect
    pub flow: FlowType,
}

/// A decoded immediate operand value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Immediate {
    /// 1-byte signed
    Int8(i8),
    /// 1-byte unsigned
    UInt8(u8),
    /// 2-byte unsigned
    UInt16(u16),
    /// 4-byte signed
    Int32(i32),
    /// 8-byte signed
    Int64(i64),
    /// 4-byte float
    Float32(f32),
    /// 8-byte float
    Float64(f64),
}

impl Immediate {
    /// The value as a branch displacement, where applicable
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        match self {
            Immediate::Int8(value) => i64::from(*value),
            Immediate::UInt8(value) => i64::from(*value),
            Immediate::UInt16(value) => i64::from(*value),
            Immediate::Int32(value) => i64::from(*value),
            Immediate::Int64(value) => *value,
            #[allow(clippy::cast_possible_truncation)]
            Immediate::Float32(value) => *value as i64,
            #[allow(clippy::cast_possible_truncation)]
            Immediate::Float64(value) => *value as i64,
        }
    }
}

/// A decoded instruction operand
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand
    None,
    /// Immediate value
    Immediate(Immediate),
    /// Metadata token
    Token(Token),
    /// Relative switch targets
    Switch(Vec<i32>),
}

/// One decoded CIL instruction
#[derive(Debug, Clone)]
pub struct Instruction {
    /// Offset of the instruction within the method's IL
    pub offset: usize,
    /// Encoded size in bytes, including prefix and operand
    pub size: usize,
    /// The opcode byte (second byte for `0xFE`-prefixed instructions)
    pub opcode: u8,
    /// `0xFE` for two-byte instructions, 0 otherwise
    pub prefix: u8,
    /// Instruction mnemonic
    pub mnemonic: &'static str,
    /// Control flow effect
    pub flow: FlowType,
    /// Decoded operand
    pub operand: Operand,
    /// IL offsets of branch targets, filled for branch and switch instructions
    pub branch_targets: Vec<usize>,
}

impl Instruction {
    /// The metadata token operand, when present
    #[must_use]
    pub fn token_operand(&self) -> Option<Token> {
        match &self.operand {
            Operand::Token(token) => Some(*token),
            _ => None,
        }
    }

    /// Returns `true` if this instruction invokes a method
    #[must_use]
    pub fn is_call(&self) -> bool {
        matches!(self.flow, FlowType::Call | FlowType::Jump)
    }
}

const fn op(mnemonic: &'static str, operand: OperandType, flow: FlowType) -> OpCode {
    OpCode {
        mnemonic,
        operand,
        flow,
    }
}

const RESERVED: OpCode = op("", OperandType::None, FlowType::Normal);

use FlowType::{
    Break, Call, ConditionalBranch as CondBr, Jump, Meta, Normal, Return, Switch as SwitchFlow,
    Throw, UnconditionalBranch as UncondBr,
};
use OperandType as Op;

/// One-byte opcode table, indexed by the opcode value
#[rustfmt::skip]
pub static INSTRUCTIONS: [OpCode; 256] = [
    op("nop", Op::None, Normal),            // 0x00
    op("break", Op::None, Break),           // 0x01
    op("ldarg.0", Op::None, Normal),        // 0x02
    op("ldarg.1", Op::None, Normal),        // 0x03
    op("ldarg.2", Op::None, Normal),        // 0x04
    op("ldarg.3", Op::None, Normal),        // 0x05
    op("ldloc.0", Op::None, Normal),        // 0x06
    op("ldloc.1", Op::None, Normal),        // 0x07
    op("ldloc.2", Op::None, Normal),        // 0x08
    op("ldloc.3", Op::None, Normal),        // 0x09
    op("stloc.0", Op::None, Normal),        // 0x0A
    op("stloc.1", Op::None, Normal),        // 0x0B
    op("stloc.2", Op::None, Normal),        // 0x0C
    op("stloc.3", Op::None, Normal),        // 0x0D
    op("ldarg.s", Op::UInt8, Normal),       // 0x0E
    op("ldarga.s", Op::UInt8, Normal),      // 0x0F
    op("starg.s", Op::UInt8, Normal),       // 0x10
    op("ldloc.s", Op::UInt8, Normal),       // 0x11
    op("ldloca.s", Op::UInt8, Normal),      // 0x12
    op("stloc.s", Op::UInt8, Normal),       // 0x13
    op("ldnull", Op::None, Normal),         // 0x14
    op("ldc.i4.m1", Op::None, Normal),      // 0x15
    op("ldc.i4.0", Op::None, Normal),       // 0x16
    op("ldc.i4.1", Op::None, Normal),       // 0x17
    op("ldc.i4.2", Op::None, Normal),       // 0x18
    op("ldc.i4.3", Op::None, Normal),       // 0x19
    op("ldc.i4.4", Op::None, Normal),       // 0x1A
    op("ldc.i4.5", Op::None, Normal),       // 0x1B
    op("ldc.i4.6", Op::None, Normal),       // 0x1C
    op("ldc.i4.7", Op::None, Normal),       // 0x1D
    op("ldc.i4.8", Op::None, Normal),       // 0x1E
    op("ldc.i4.s", Op::Int8, Normal),       // 0x1F
    op("ldc.i4", Op::Int32, Normal),        // 0x20
    op("ldc.i8", Op::Int64, Normal),        // 0x21
    op("ldc.r4", Op::Float32, Normal),      // 0x22
    op("ldc.r8", Op::Float64, Normal),      // 0x23
    RESERVED,                               // 0x24
    op("dup", Op::None, Normal),            // 0x25
    op("pop", Op::None, Normal),            // 0x26
    op("jmp", Op::Token, Jump),             // 0x27
    op("call", Op::Token, Call),            // 0x28
    op("calli", Op::Token, Call),           // 0x29
    op("ret", Op::None, Return),            // 0x2A
    op("br.s", Op::Int8, UncondBr),         // 0x2B
    op("brfalse.s", Op::Int8, CondBr),      // 0x2C
    op("brtrue.s", Op::Int8, CondBr),       // 0x2D
    op("beq.s", Op::Int8, CondBr),          // 0x2E
    op("bge.s", Op::Int8, CondBr),          // 0x2F
    op("bgt.s", Op::Int8, CondBr),          // 0x30
    op("ble.s", Op::Int8, CondBr),          // 0x31
    op("blt.s", Op::Int8, CondBr),          // 0x32
    op("bne.un.s", Op::Int8, CondBr),       // 0x33
    op("bge.un.s", Op::Int8, CondBr),       // 0x34
    op("bgt.un.s", Op::Int8, CondBr),       // 0x35
    op("ble.un.s", Op::Int8, CondBr),       // 0x36
    op("blt.un.s", Op::Int8, CondBr),       // 0x37
    op("br", Op::Int32, UncondBr),          // 0x38
    op("brfalse", Op::Int32, CondBr),       // 0x39
    op("brtrue", Op::Int32, CondBr),        // 0x3A
    op("beq", Op::Int32, CondBr),           // 0x3B
    op("bge", Op::Int32, CondBr),           // 0x3C
    op("bgt", Op::Int32, CondBr),           // 0x3D
    op("ble", Op::Int32, CondBr),           // 0x3E
    op("blt", Op::Int32, CondBr),           // 0x3F
    op("bne.un", Op::Int32, CondBr),        // 0x40
    op("bge.un", Op::Int32, CondBr),        // 0x41
    op("bgt.un", Op::Int32, CondBr),        // 0x42
    op("ble.un", Op::Int32, CondBr),        // 0x43
    op("blt.un", Op::Int32, CondBr),        // 0x44
    op("switch", Op::Switch, SwitchFlow),   // 0x45
    op("ldind.i1", Op::None, Normal),       // 0x46
    op("ldind.u1", Op::None, Normal),       // 0x47
    op("ldind.i2", Op::None, Normal),       // 0x48
    op("ldind.u2", Op::None, Normal),       // 0x49
    op("ldind.i4", Op::None, Normal),       // 0x4A
    op("ldind.u4", Op::None, Normal),       // 0x4B
    op("ldind.i8", Op::None, Normal),       // 0x4C
    op("ldind.i", Op::None, Normal),        // 0x4D
    op("ldind.r4", Op::None, Normal),       // 0x4E
    op("ldind.r8", Op::None, Normal),       // 0x4F
    op("ldind.ref", Op::None, Normal),      // 0x50
    op("stind.ref", Op::None, Normal),      // 0x51
    op("stind.i1", Op::None, Normal),       // 0x52
    op("stind.i2", Op::None, Normal),       // 0x53
    op("stind.i4", Op::None, Normal),       // 0x54
    op("stind.i8", Op::None, Normal),       // 0x55
    op("stind.r4", Op::None, Normal),       // 0x56
    op("stind.r8", Op::None, Normal),       // 0x57
    op("add", Op::None, Normal),            // 0x58
    op("sub", Op::None, Normal),            // 0x59
    op("mul", Op::None, Normal),            // 0x5A
    op("div", Op::None, Normal),            // 0x5B
    op("div.un", Op::None, Normal),         // 0x5C
    op("rem", Op::None, Normal),            // 0x5D
    op("rem.un", Op::None, Normal),         // 0x5E
    op("and", Op::None, Normal),            // 0x5F
    op("or", Op::None, Normal),             // 0x60
    op("xor", Op::None, Normal),            // 0x61
    op("shl", Op::None, Normal),            // 0x62
    op("shr", Op::None, Normal),            // 0x63
    op("shr.un", Op::None, Normal),         // 0x64
    op("neg", Op::None, Normal),            // 0x65
    op("not", Op::None, Normal),            // 0x66
    op("conv.i1", Op::None, Normal),        // 0x67
    op("conv.i2", Op::None, Normal),        // 0x68
    op("conv.i4", Op::None, Normal),        // 0x69
    op("conv.i8", Op::None, Normal),        // 0x6A
    op("conv.r4", Op::None, Normal),        // 0x6B
    op("conv.r8", Op::None, Normal),        // 0x6C
    op("conv.u4", Op::None, Normal),        // 0x6D
    op("conv.u8", Op::None, Normal),        // 0x6E
    op("callvirt", Op::Token, Call),        // 0x6F
    op("cpobj", Op::Token, Normal),         // 0x70
    op("ldobj", Op::Token, Normal),         // 0x71
    op("ldstr", Op::Token, Normal),         // 0x72
    op("newobj", Op::Token, Call),          // 0x73
    op("castclass", Op::Token, Normal),     // 0x74
    op("isinst", Op::Token, Normal),        // 0x75
    op("conv.r.un", Op::None, Normal),      // 0x76
    RESERVED,                               // 0x77
    RESERVED,                               // 0x78
    op("unbox", Op::Token, Normal),         // 0x79
    op("throw", Op::None, Throw),           // 0x7A
    op("ldfld", Op::Token, Normal),         // 0x7B
    op("ldflda", Op::Token, Normal),        // 0x7C
    op("stfld", Op::Token, Normal),         // 0x7D
    op("ldsfld", Op::Token, Normal),        // 0x7E
    op("ldsflda", Op::Token, Normal),       // 0x7F
    op("stsfld", Op::Token, Normal),        // 0x80
    op("stobj", Op::Token, Normal),         // 0x81
    op("conv.ovf.i1.un", Op::None, Normal), // 0x82
    op("conv.ovf.i2.un", Op::None, Normal), // 0x83
    op("conv.ovf.i4.un", Op::None, Normal), // 0x84
    op("conv.ovf.i8.un", Op::None, Normal), // 0x85
    op("conv.ovf.u1.un", Op::None, Normal), // 0x86
    op("conv.ovf.u2.un", Op::None, Normal), // 0x87
    op("conv.ovf.u4.un", Op::None, Normal), // 0x88
    op("conv.ovf.u8.un", Op::None, Normal), // 0x89
    op("conv.ovf.i.un", Op::None, Normal),  // 0x8A
    op("conv.ovf.u.un", Op::None, Normal),  // 0x8B
    op("box", Op::Token, Normal),           // 0x8C
    op("newarr", Op::Token, Normal),        // 0x8D
    op("ldlen", Op::None, Normal),          // 0x8E
    op("ldelema", Op::Token, Normal),       // 0x8F
    op("ldelem.i1", Op::None, Normal),      // 0x90
    op("ldelem.u1", Op::None, Normal),      // 0x91
    op("ldelem.i2", Op::None, Normal),      // 0x92
    op("ldelem.u2", Op::None, Normal),      // 0x93
    op("ldelem.i4", Op::None, Normal),      // 0x94
    op("ldelem.u4", Op::None, Normal),      // 0x95
    op("ldelem.i8", Op::None, Normal),      // 0x96
    op("ldelem.i", Op::None, Normal),       // 0x97
    op("ldelem.r4", Op::None, Normal),      // 0x98
    op("ldelem.r8", Op::None, Normal),      // 0x99
    op("ldelem.ref", Op::None, Normal),     // 0x9A
    op("stelem.i", Op::None, Normal),       // 0x9B
    op("stelem.i1", Op::None, Normal),      // 0x9C
    op("stelem.i2", Op::None, Normal),      // 0x9D
    op("stelem.i4", Op::None, Normal),      // 0x9E
    op("stelem.i8", Op::None, Normal),      // 0x9F
    op("stelem.r4", Op::None, Normal),      // 0xA0
    op("stelem.r8", Op::None, Normal),      // 0xA1
    op("stelem.ref", Op::None, Normal),     // 0xA2
    op("ldelem", Op::Token, Normal),        // 0xA3
    op("stelem", Op::Token, Normal),        // 0xA4
    op("unbox.any", Op::Token, Normal),     // 0xA5
    RESERVED,                               // 0xA6
    RESERVED,                               // 0xA7
    RESERVED,                               // 0xA8
    RESERVED,                               // 0xA9
    RESERVED,                               // 0xAA
    RESERVED,                               // 0xAB
    RESERVED,                               // 0xAC
    RESERVED,                               // 0xAD
    RESERVED,                               // 0xAE
    RESERVED,                               // 0xAF
    RESERVED,                               // 0xB0
    RESERVED,                               // 0xB1
    RESERVED,                               // 0xB2
    op("conv.ovf.i1", Op::None, Normal),    // 0xB3
    op("conv.ovf.u1", Op::None, Normal),    // 0xB4
    op("conv.ovf.i2", Op::None, Normal),    // 0xB5
    op("conv.ovf.u2", Op::None, Normal),    // 0xB6
    op("conv.ovf.i4", Op::None, Normal),    // 0xB7
    op("conv.ovf.u4", Op::None, Normal),    // 0xB8
    op("conv.ovf.i8", Op::None, Normal),    // 0xB9
    op("conv.ovf.u8", Op::None, Normal),    // 0xBA
    RESERVED,                               // 0xBB
    RESERVED,                               // 0xBC
    RESERVED,                               // 0xBD
    RESERVED,                               // 0xBE
    RESERVED,                               // 0xBF
    RESERVED,                               // 0xC0
    RESERVED,                               // 0xC1
    op("refanyval", Op::Token, Normal),     // 0xC2
    op("ckfinite", Op::None, Normal),       // 0xC3
    RESERVED,                               // 0xC4
    RESERVED,                               // 0xC5
    op("mkrefany", Op::Token, Normal),      // 0xC6
    RESERVED,                               // 0xC7
    RESERVED,                               // 0xC8
    RESERVED,                               // 0xC9
    RESERVED,                               // 0xCA
    RESERVED,                               // 0xCB
    RESERVED,                               // 0xCC
    RESERVED,                               // 0xCD
    RESERVED,                               // 0xCE
    RESERVED,                               // 0xCF
    op("ldtoken", Op::Token, Normal),       // 0xD0
    op("conv.u2", Op::None, Normal),        // 0xD1
    op("conv.u1", Op::None, Normal),        // 0xD2
    op("conv.i", Op::None, Normal),         // 0xD3
    op("conv.ovf.i", Op::None, Normal),     // 0xD4
    op("conv.ovf.u", Op::None, Normal),     // 0xD5
    op("add.ovf", Op::None, Normal),        // 0xD6
    op("add.ovf.un", Op::None, Normal),     // 0xD7
    op("mul.ovf", Op::None, Normal),        // 0xD8
    op("mul.ovf.un", Op::None, Normal),     // 0xD9
    op("sub.ovf", Op::None, Normal),        // 0xDA
    op("sub.ovf.un", Op::None, Normal),     // 0xDB
    op("endfinally", Op::None, Return),     // 0xDC
    op("leave", Op::Int32, UncondBr),       // 0xDD
    op("leave.s", Op::Int8, UncondBr),      // 0xDE
    op("stind.i", Op::None, Normal),        // 0xDF
    op("conv.u", Op::None, Normal),         // 0xE0
    RESERVED,                               // 0xE1
    RESERVED,                               // 0xE2
    RESERVED,                               // 0xE3
    RESERVED,                               // 0xE4
    RESERVED,                               // 0xE5
    RESERVED,                               // 0xE6
    RESERVED,                               // 0xE7
    RESERVED,                               // 0xE8
    RESERVED,                               // 0xE9
    RESERVED,                               // 0xEA
    RESERVED,                               // 0xEB
    RESERVED,                               // 0xEC
    RESERVED,                               // 0xED
    RESERVED,                               // 0xEE
    RESERVED,                               // 0xEF
    RESERVED,                               // 0xF0
    RESERVED,                               // 0xF1
    RESERVED,                               // 0xF2
    RESERVED,                               // 0xF3
    RESERVED,                               // 0xF4
    RESERVED,                               // 0xF5
    RESERVED,                               // 0xF6
    RESERVED,                               // 0xF7
    RESERVED,                               // 0xF8
    RESERVED,                               // 0xF9
    RESERVED,                               // 0xFA
    RESERVED,                               // 0xFB
    RESERVED,                               // 0xFC
    RESERVED,                               // 0xFD
    RESERVED,                               // 0xFE (two-byte prefix, handled by the decoder)
    RESERVED,                               // 0xFF
];

/// Two-byte opcode table for the `0xFE` prefix, indexed by the second byte
#[rustfmt::skip]
pub static INSTRUCTIONS_FE: [OpCode; 31] = [
    op("arglist", Op::None, Normal),        // 0xFE 0x00
    op("ceq", Op::None, Normal),            // 0xFE 0x01
    op("cgt", Op::None, Normal),            // 0xFE 0x02
    op("cgt.un", Op::None, Normal),         // 0xFE 0x03
    op("clt", Op::None, Normal),            // 0xFE 0x04
    op("clt.un", Op::None, Normal),         // 0xFE 0x05
    op("ldftn", Op::Token, Normal),         // 0xFE 0x06
    op("ldvirtftn", Op::Token, Normal),     // 0xFE 0x07
    RESERVED,                               // 0xFE 0x08
    op("ldarg", Op::UInt16, Normal),        // 0xFE 0x09
    op("ldarga", Op::UInt16, Normal),       // 0xFE 0x0A
    op("starg", Op::UInt16, Normal),        // 0xFE 0x0B
    op("ldloc", Op::UInt16, Normal),        // 0xFE 0x0C
    op("ldloca", Op::UInt16, Normal),       // 0xFE 0x0D
    op("stloc", Op::UInt16, Normal),        // 0xFE 0x0E
    op("localloc", Op::None, Normal),       // 0xFE 0x0F
    RESERVED,                               // 0xFE 0x10
    op("endfilter", Op::None, Return),      // 0xFE 0x11
    op("unaligned.", Op::UInt8, Meta),      // 0xFE 0x12
    op("volatile.", Op::None, Meta),        // 0xFE 0x13
    op("tail.", Op::None, Meta),            // 0xFE 0x14
    op("initobj", Op::Token, Normal),       // 0xFE 0x15
    op("constrained.", Op::Token, Meta),    // 0xFE 0x16
    op("cpblk", Op::None, Normal),          // 0xFE 0x17
    op("initblk", Op::None, Normal),        // 0xFE 0x18
    op("no.", Op::UInt8, Meta),             // 0xFE 0x19
    op("rethrow", Op::None, Throw),         // 0xFE 0x1A
    RESERVED,                               // 0xFE 0x1B
    op("sizeof", Op::Token, Normal),        // 0xFE 0x1C
    op("refanytype", Op::None, Normal),     // 0xFE 0x1D
    op("readonly.", Op::None, Meta),        // 0xFE 0x1E
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_spot_checks() {
        assert_eq!(INSTRUCTIONS[0x00].mnemonic, "nop");
        assert_eq!(INSTRUCTIONS[0x28].mnemonic, "call");
        assert_eq!(INSTRUCTIONS[0x28].operand, OperandType::Token);
        assert_eq!(INSTRUCTIONS[0x28].flow, FlowType::Call);
        assert_eq!(INSTRUCTIONS[0x2A].mnemonic, "ret");
        assert_eq!(INSTRUCTIONS[0x6F].mnemonic, "callvirt");
        assert_eq!(INSTRUCTIONS[0x72].mnemonic, "ldstr");
        assert_eq!(INSTRUCTIONS[0x73].mnemonic, "newobj");
        assert_eq!(INSTRUCTIONS[0xE0].mnemonic, "conv.u");
        assert_eq!(INSTRUCTIONS[0xD0].mnemonic, "ldtoken");
        assert_eq!(INSTRUCTIONS[0x45].operand, OperandType::Switch);
        assert!(INSTRUCTIONS[0x24].mnemonic.is_empty());
        assert!(INSTRUCTIONS[0xFF].mnemonic.is_empty());
    }

    #[test]
    fn fe_table_spot_checks() {
        assert_eq!(INSTRUCTIONS_FE[0x01].mnemonic, "ceq");
        assert_eq!(INSTRUCTIONS_FE[0x06].mnemonic, "ldftn");
        assert_eq!(INSTRUCTIONS_FE[0x06].operand, OperandType::Token);
        assert_eq!(INSTRUCTIONS_FE[0x16].mnemonic, "constrained.");
        assert_eq!(INSTRUCTIONS_FE[0x1A].mnemonic, "rethrow");
        assert_eq!(INSTRUCTIONS_FE[0x1E].mnemonic, "readonly.");
        assert!(INSTRUCTIONS_FE[0x08].mnemonic.is_empty());
    }

    #[test]
    fn call_classification() {
        let call = Instruction {
            offset: 0,
            size: 5,
            opcode: 0x28,
            prefix: 0,
            mnemonic: "call",
            flow: FlowType::Call,
            operand: Operand::Token(Token::new(0x0A000001)),
            branch_targets: Vec::new(),
        };

        assert!(call.is_call());
        assert_eq!(call.token_operand(), Some(Token::new(0x0A000001)));
    }

    #[test]
    fn immediate_widening() {
        assert_eq!(Immediate::Int8(-2).as_i64(), -2);
        assert_eq!(Immediate::Int32(-100).as_i64(), -100);
        assert_eq!(Immediate::UInt16(7).as_i64(), 7);
    }
}
