//! CIL (Common Intermediate Language) instruction decoding.
//!
//! Provides instruction-level decoding of method body bytecode and construction of
//! basic blocks for flow-aware traversal.
//!
//! # Key Types
//! - [`Instruction`] - a decoded CIL instruction
//! - [`BasicBlock`] - a run of instructions with a single entry
//! - [`Operand`] / [`Immediate`] - instruction operands
//! - [`FlowType`] - how an instruction affects control flow
//!
//! # Example
//! ```rust
//! use cilgraph::disassembler::decode_stream;
//!
//! let bytecode = [0x00, 0x2A]; // nop, ret
//! let instructions = decode_stream(&bytecode)?;
//! assert_eq!(instructions[1].mnemonic, "ret");
//! # Ok::<(), cilgraph::Error>(())
//! ```

mod decoder;
mod instruction;

pub use decoder::{decode_blocks, decode_instruction, decode_stream, BasicBlock};
pub use instruction::{
    FlowType, Immediate, Instruction, OpCode, Operand, OperandType, INSTRUCTIONS, INSTRUCTIONS_FE,
};
