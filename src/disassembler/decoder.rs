//! CIL instruction decoding and basic block construction.
//!
//! Three levels of decoding are provided:
//!
//! - [`decode_instruction`] - one instruction at the parser's position
//! - [`decode_stream`] - a linear sweep over an entire code buffer
//! - [`decode_blocks`] - reachability-driven decoding into basic blocks,
//!   following branch targets from the method entry
//!
//! Block decoding is what the call extractor and the listing decompiler build on:
//! it yields a traversable graph in which every reachable instruction appears
//! exactly once.

use crate::{
    disassembler::{
        FlowType, Immediate, Instruction, OpCode, Operand, OperandType, INSTRUCTIONS,
        INSTRUCTIONS_FE,
    },
    file::parser::Parser,
    metadata::token::Token,
    Result,
};

/// A straight-line run of instructions with a single entry point.
///
/// Successors are IL offsets; an offset always identifies the block that starts
/// there in the output of [`decode_blocks`].
#[derive(Debug, Clone)]
pub struct BasicBlock {
    /// Sequential block id, in discovery order
    pub id: usize,
    /// IL offset of the first instruction
    pub offset: usize,
    /// The decoded instructions
    pub instructions: Vec<Instruction>,
    /// IL offsets of successor blocks
    pub successors: Vec<usize>,
}

/// Decode a single instruction at the parser's current position.
///
/// # Arguments
/// * `parser` - Parser positioned at the instruction to decode
///
/// # Errors
/// Returns an error on truncated input or reserved opcodes.
pub fn decode_instruction(parser: &mut Parser) -> Result<Instruction> {
    let offset = parser.pos();
    let first_byte = parser.read_le::<u8>()?;

    let (entry, prefix, opcode): (&OpCode, u8, u8) = if first_byte == 0xFE {
        let second_byte = parser.read_le::<u8>()?;
        match INSTRUCTIONS_FE.get(second_byte as usize) {
            Some(entry) => (entry, 0xFE, second_byte),
            None => {
                return Err(malformed_error!("Invalid opcode: FE {:02X}", second_byte));
            }
        }
    } else {
        (&INSTRUCTIONS[first_byte as usize], 0, first_byte)
    };

    if entry.mnemonic.is_empty() {
        return Err(malformed_error!(
            "Reserved opcode: {:02X} {:02X}",
            prefix,
            opcode
        ));
    }

    let operand = match entry.operand {
        OperandType::None => Operand::None,
        OperandType::Int8 => Operand::Immediate(Immediate::Int8(parser.read_le::<i8>()?)),
        OperandType::UInt8 => Operand::Immediate(Immediate::UInt8(parser.read_le::<u8>()?)),
        OperandType::UInt16 => Operand::Immediate(Immediate::UInt16(parser.read_le::<u16>()?)),
        OperandType::Int32 => Operand::Immediate(Immediate::Int32(parser.read_le::<i32>()?)),
        OperandType::Int64 => Operand::Immediate(Immediate::Int64(parser.read_le::<i64>()?)),
        OperandType::Float32 => Operand::Immediate(Immediate::Float32(parser.read_le::<f32>()?)),
        OperandType::Float64 => Operand::Immediate(Immediate::Float64(parser.read_le::<f64>()?)),
        OperandType::Token => Operand::Token(Token::new(parser.read_le::<u32>()?)),
        OperandType::Switch => {
            let case_count = parser.read_le::<u32>()?;
            if case_count as usize > parser.remaining() / 4 {
                return Err(malformed_error!(
                    "Switch table with {} cases exceeds the method body",
                    case_count
                ));
            }

            let mut targets = Vec::with_capacity(case_count as usize);
            for _ in 0..case_count {
                targets.push(parser.read_le::<i32>()?);
            }
            Operand::Switch(targets)
        }
    };

    let size = parser.pos() - offset;
    let next_offset = offset + size;

    let mut branch_targets = Vec::new();
    match entry.flow {
        FlowType::ConditionalBranch | FlowType::UnconditionalBranch => {
            if let Operand::Immediate(value) = &operand {
                let target = next_offset as i64 + value.as_i64();
                if target >= 0 {
                    #[allow(clippy::cast_sign_loss)]
                    branch_targets.push(target as usize);
                }
            }
        }
        FlowType::Switch => {
            if let Operand::Switch(targets) = &operand {
                for relative in targets {
                    let target = next_offset as i64 + i64::from(*relative);
                    if target >= 0 {
                        #[allow(clippy::cast_sign_loss)]
                        branch_targets.push(target as usize);
                    }
                }
            }
        }
        _ => {}
    }

    Ok(Instruction {
        offset,
        size,
        opcode,
        prefix,
        mnemonic: entry.mnemonic,
        flow: entry.flow,
        operand,
        branch_targets,
    })
}

/// Decode an entire code buffer as a linear instruction sequence.
///
/// # Arguments
/// * `code` - The IL code bytes of one method body
///
/// # Errors
/// Returns an error if any instruction fails to decode.
pub fn decode_stream(code: &[u8]) -> Result<Vec<Instruction>> {
    let mut parser = Parser::new(code);
    let mut instructions = Vec::new();

    while parser.has_more_data() {
        instructions.push(decode_instruction(&mut parser)?);
    }

    Ok(instructions)
}

/// Decode a method body into basic blocks, following control flow from offset 0.
///
/// Unreachable code is not decoded. Blocks are returned in discovery order
/// (depth-first from the entry); `successors` carry the IL offsets of the blocks
/// control can continue to.
///
/// # Arguments
/// * `code` - The IL code bytes of one method body
///
/// # Errors
/// Returns an error if a reachable instruction fails to decode or a branch leaves
/// the method body.
pub fn decode_blocks(code: &[u8]) -> Result<Vec<BasicBlock>> {
    if code.is_empty() {
        return Ok(Vec::new());
    }

    // Instruction starts already decoded, to stop runs that flow into one another
    let mut visited = vec![false; code.len()];
    let mut blocks: Vec<BasicBlock> = Vec::new();
    let mut worklist = vec![0usize];

    while let Some(start) = worklist.pop() {
        if start >= code.len() {
            return Err(malformed_error!(
                "Branch target {:#x} is outside the method body",
                start
            ));
        }

        if visited[start] {
            continue;
        }

        let mut parser = Parser::new(code);
        parser.seek(start)?;

        let block_id = blocks.len();
        let mut instructions = Vec::new();
        let mut successors = Vec::new();

        loop {
            let at = parser.pos();
            if at >= code.len() || visited[at] {
                // Ran into an already decoded run; that run continues this block
                if visited.get(at).copied().unwrap_or(false) {
                    successors.push(at);
                }
                break;
            }

            let instruction = decode_instruction(&mut parser)?;
            visited[at] = true;
            let next = at + instruction.size;

            match instruction.flow {
                FlowType::UnconditionalBranch => {
                    successors.extend(instruction.branch_targets.iter().copied());
                    instructions.push(instruction);
                    break;
                }
                FlowType::ConditionalBranch => {
                    successors.extend(instruction.branch_targets.iter().copied());
                    successors.push(next);
                    instructions.push(instruction);
                    break;
                }
                FlowType::Switch => {
                    successors.extend(instruction.branch_targets.iter().copied());
                    successors.push(next);
                    instructions.push(instruction);
                    break;
                }
                FlowType::Return | FlowType::Throw | FlowType::Jump => {
                    instructions.push(instruction);
                    break;
                }
                _ => {
                    instructions.push(instruction);
                }
            }
        }

        successors.sort_unstable();
        successors.dedup();

        // Depth-first: push successors for later decoding
        for successor in successors.iter().rev() {
            if *successor < code.len() && !visited[*successor] {
                worklist.push(*successor);
            } else if *successor >= code.len() {
                return Err(malformed_error!(
                    "Branch target {:#x} is outside the method body",
                    successor
                ));
            }
        }

        blocks.push(BasicBlock {
            id: block_id,
            offset: start,
            instructions,
            successors,
        });
    }

    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_instructions() {
        let mut parser = Parser::new(&[0x2A]);
        let ret = decode_instruction(&mut parser).unwrap();
        assert_eq!(ret.mnemonic, "ret");
        assert_eq!(ret.size, 1);
        assert_eq!(ret.flow, FlowType::Return);

        let mut parser = Parser::new(&[0x28, 0x01, 0x00, 0x00, 0x06]);
        let call = decode_instruction(&mut parser).unwrap();
        assert_eq!(call.mnemonic, "call");
        assert_eq!(call.size, 5);
        assert_eq!(call.token_operand(), Some(Token::new(0x06000001)));

        let mut parser = Parser::new(&[0xFE, 0x01]);
        let ceq = decode_instruction(&mut parser).unwrap();
        assert_eq!(ceq.mnemonic, "ceq");
        assert_eq!(ceq.prefix, 0xFE);
        assert_eq!(ceq.size, 2);
    }

    #[test]
    fn branch_targets() {
        // br.s +2 at offset 0: next = 2, target = 4
        let mut parser = Parser::new(&[0x2B, 0x02, 0x00, 0x00, 0x2A]);
        let br = decode_instruction(&mut parser).unwrap();
        assert_eq!(br.branch_targets, vec![4]);

        // brtrue.s -2 at offset 0: next = 2, target = 0
        let mut parser = Parser::new(&[0x2D, 0xFE]);
        let brtrue = decode_instruction(&mut parser).unwrap();
        assert_eq!(brtrue.branch_targets, vec![0]);
    }

    #[test]
    fn switch_targets() {
        // switch with 2 cases (+1, +6) at offset 0: next = 13
        #[rustfmt::skip]
        let code = [
            0x45,
            0x02, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00,
            0x06, 0x00, 0x00, 0x00,
        ];
        let mut parser = Parser::new(&code);
        let switch = decode_instruction(&mut parser).unwrap();
        assert_eq!(switch.size, 13);
        assert_eq!(switch.branch_targets, vec![14, 19]);
    }

    #[test]
    fn reserved_opcode_rejected() {
        let mut parser = Parser::new(&[0x24]);
        assert!(decode_instruction(&mut parser).is_err());

        let mut parser = Parser::new(&[0xFE, 0x08]);
        assert!(decode_instruction(&mut parser).is_err());
    }

    #[test]
    fn truncated_operand_rejected() {
        let mut parser = Parser::new(&[0x28, 0x01, 0x00]);
        assert!(decode_instruction(&mut parser).is_err());
    }

    #[test]
    fn stream_decoding() {
        // nop, ldc.i4.s 5, ret
        let code = [0x00, 0x1F, 0x05, 0x2A];
        let instructions = decode_stream(&code).unwrap();

        assert_eq!(instructions.len(), 3);
        assert_eq!(instructions[0].mnemonic, "nop");
        assert_eq!(instructions[1].mnemonic, "ldc.i4.s");
        assert_eq!(instructions[2].mnemonic, "ret");
        assert_eq!(instructions[2].offset, 3);
    }

    #[test]
    fn blocks_linear_method() {
        // nop, call 0x06000002, ret
        let code = [0x00, 0x28, 0x02, 0x00, 0x00, 0x06, 0x2A];
        let blocks = decode_blocks(&code).unwrap();

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].offset, 0);
        assert_eq!(blocks[0].instructions.len(), 3);
        assert!(blocks[0].successors.is_empty());
    }

    #[test]
    fn blocks_follow_conditional_branch() {
        #[rustfmt::skip]
        let code = [
            0x2D, 0x01, // 0: brtrue.s +1 -> 3
            0x2A,       // 2: ret (fallthrough)
            0x2A,       // 3: ret (branch target)
        ];
        let blocks = decode_blocks(&code).unwrap();

        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].successors, vec![2, 3]);

        let offsets: Vec<usize> = blocks.iter().map(|block| block.offset).collect();
        assert!(offsets.contains(&2));
        assert!(offsets.contains(&3));
    }

    #[test]
    fn blocks_skip_unreachable_code() {
        #[rustfmt::skip]
        let code = [
            0x2B, 0x01, // 0: br.s +1 -> 3
            0x24,       // 2: reserved byte, never decoded
            0x2A,       // 3: ret
        ];
        let blocks = decode_blocks(&code).unwrap();

        assert_eq!(blocks.len(), 2);
        let decoded: usize = blocks.iter().map(|block| block.instructions.len()).sum();
        assert_eq!(decoded, 2);
    }

    #[test]
    fn blocks_branch_out_of_bounds_rejected() {
        let code = [0x2B, 0x10, 0x2A];
        assert!(decode_blocks(&code).is_err());
    }

    #[test]
    fn blocks_loop_terminates() {
        // 0: nop; 1: br.s -3 -> 0
        let code = [0x00, 0x2B, 0xFD];
        let blocks = decode_blocks(&code).unwrap();

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].successors, vec![0]);
    }
}
