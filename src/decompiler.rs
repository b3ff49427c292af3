//! Decompiler collaborator boundary and the built-in IL listing backend.
//!
//! Full decompilation to readable source is the job of an external engine; the
//! analyzer only depends on the small [`Decompiler`] trait. [`IlDecompiler`] is
//! the built-in implementation producing a deterministic, ildasm-flavoured
//! listing, good enough to carry the per-method `DecompiledSource` field and the
//! dead-code/dead-store/formatting options of the command line.
//!
//! Failures are per-method by contract: a body that cannot be rendered yields an
//! error for that method alone and the batch continues.

use std::collections::HashSet;

use log::debug;

use crate::{
    disassembler::{decode_blocks, decode_stream, BasicBlock, Immediate, Instruction, Operand},
    metadata::{
        assembly::Assembly,
        tables::{MemberRefRaw, MethodDefRaw},
        token::Token,
    },
    Result,
};

/// Options honored by the built-in listing backend
#[derive(Debug, Clone, Copy, Default)]
pub struct DecompilerOptions {
    /// Omit code not reachable from the method entry
    pub remove_dead_code: bool,
    /// Omit stores to local variables that are never read
    pub remove_dead_stores: bool,
    /// Strip indentation from the produced text
    pub strip_formatting: bool,
}

/// The decompiler collaborator boundary.
///
/// Implementations may fail arbitrarily per method; callers substitute a sentinel
/// and continue the batch.
pub trait Decompiler {
    /// Produce a text rendition of one method body.
    ///
    /// # Errors
    /// Implementation-defined; a failure is isolated to this method.
    fn decompile(&self, assembly: &Assembly, method: Token) -> Result<String>;

    /// Resolve a method's signature to `(return type, parameter types)` text.
    ///
    /// # Errors
    /// Returns an error if the signature blob is missing or malformed.
    fn resolve_signature(&self, assembly: &Assembly, method: Token) -> Result<(String, Vec<String>)> {
        let row = assembly.row::<MethodDefRaw>(method)?;
        let signature = assembly.method_signature(row.signature)?;

        let return_type = signature
            .return_type
            .as_ref()
            .map_or_else(|| "void".to_string(), |ret| assembly.type_text(ret));
        let params = signature
            .params
            .iter()
            .map(|param| assembly.type_text(param))
            .collect();

        Ok((return_type, params))
    }
}

/// The built-in IL listing backend.
pub struct IlDecompiler {
    options: DecompilerOptions,
}

impl IlDecompiler {
    /// Create a listing backend with the given options
    #[must_use]
    pub fn new(options: DecompilerOptions) -> Self {
        IlDecompiler { options }
    }

    fn render(&self, assembly: &Assembly, method: Token, code: &[u8]) -> Result<String> {
        // Reachability-driven decoding drops dead code as a side effect; the
        // linear sweep shows everything, decodable or not in one piece.
        let instructions = if self.options.remove_dead_code {
            let mut blocks = decode_blocks(code)?;
            blocks.sort_by_key(|block| block.offset);
            blocks
                .into_iter()
                .flat_map(|block| block.instructions)
                .collect::<Vec<Instruction>>()
        } else {
            decode_stream(code)?
        };

        let dead_stores: HashSet<u32> = if self.options.remove_dead_stores {
            let loaded = loaded_locals(&instructions);
            instructions
                .iter()
                .filter_map(local_store_index)
                .filter(|index| !loaded.contains(index))
                .collect()
        } else {
            HashSet::new()
        };

        let indent = if self.options.strip_formatting { "" } else { "    " };
        let mut lines = Vec::with_capacity(instructions.len() + 1);
        lines.push(format!("// method {method}"));

        for instruction in &instructions {
            if let Some(index) = local_store_index(instruction) {
                if dead_stores.contains(&index) {
                    continue;
                }
            }

            lines.push(format!(
                "{}IL_{:04x}: {}",
                indent,
                instruction.offset,
                self.render_instruction(assembly, instruction)
            ));
        }

        Ok(lines.join("\n"))
    }

    fn render_instruction(&self, assembly: &Assembly, instruction: &Instruction) -> String {
        match &instruction.operand {
            Operand::None => instruction.mnemonic.to_string(),
            Operand::Immediate(value) => match instruction.branch_targets.first() {
                Some(target) => format!("{} IL_{:04x}", instruction.mnemonic, target),
                None => format!("{} {}", instruction.mnemonic, render_immediate(value)),
            },
            Operand::Token(token) => format!(
                "{} {}",
                instruction.mnemonic,
                render_token(assembly, *token)
            ),
            Operand::Switch(_) => {
                let targets: Vec<String> = instruction
                    .branch_targets
                    .iter()
                    .map(|target| format!("IL_{target:04x}"))
                    .collect();
                format!("switch ({})", targets.join(", "))
            }
        }
    }
}

impl Decompiler for IlDecompiler {
    fn decompile(&self, assembly: &Assembly, method: Token) -> Result<String> {
        let row = assembly.row::<MethodDefRaw>(method)?;
        if row.rva == 0 {
            return Err(malformed_error!(
                "Method {} has no body to decompile",
                method
            ));
        }

        let (_, code) = assembly.method_body(&row)?;
        self.render(assembly, method, code)
    }
}

/// Collect every `ldstr` literal of a method body, in depth-first traversal
/// order from the entry block.
///
/// A single recursive accumulator over the block graph; repeated literals appear
/// once per occurrence. An undecodable body yields an empty sequence.
#[must_use]
pub fn string_literals(assembly: &Assembly, code: &[u8]) -> Vec<String> {
    fn walk(
        offset: usize,
        blocks: &[BasicBlock],
        assembly: &Assembly,
        visited: &mut Vec<bool>,
        literals: &mut Vec<String>,
    ) {
        let Some(index) = blocks.iter().position(|block| block.offset == offset) else {
            return;
        };

        if visited[index] {
            return;
        }
        visited[index] = true;

        for instruction in &blocks[index].instructions {
            if instruction.mnemonic != "ldstr" {
                continue;
            }

            if let Some(token) = instruction.token_operand() {
                // String tokens live in table byte 0x70; the row bits are a
                // #US heap offset
                if token.table() == 0x70 {
                    match assembly.user_string_at(token.row()) {
                        Ok(literal) => literals.push(literal),
                        Err(error) => debug!("unreadable string literal {token}: {error}"),
                    }
                }
            }
        }

        for successor in &blocks[index].successors {
            walk(*successor, blocks, assembly, visited, literals);
        }
    }

    let blocks = match decode_blocks(code) {
        Ok(blocks) => blocks,
        Err(error) => {
            debug!("skipping literal extraction for undecodable body: {error}");
            return Vec::new();
        }
    };

    let mut visited = vec![false; blocks.len()];
    let mut literals = Vec::new();
    if !blocks.is_empty() {
        walk(blocks[0].offset, &blocks, assembly, &mut visited, &mut literals);
    }
    literals
}

fn render_immediate(value: &Immediate) -> String {
    match value {
        Immediate::Int8(value) => value.to_string(),
        Immediate::UInt8(value) => value.to_string(),
        Immediate::UInt16(value) => value.to_string(),
        Immediate::Int32(value) => value.to_string(),
        Immediate::Int64(value) => value.to_string(),
        Immediate::Float32(value) => value.to_string(),
        Immediate::Float64(value) => value.to_string(),
    }
}

/// Short operand text for token operands: member paths where resolvable, the
/// raw token otherwise.
fn render_token(assembly: &Assembly, token: Token) -> String {
    match token.table() {
        0x06 => {
            let path = assembly.row::<MethodDefRaw>(token).ok().and_then(|row| {
                let name = assembly.string_at(row.name).ok()?;
                let declaring = assembly
                    .declaring_type_of(token)
                    .and_then(|type_token| assembly.full_type_name(type_token).ok())?;
                Some(format!("{declaring}::{name}"))
            });
            path.unwrap_or_else(|| token.to_string())
        }
        0x0A => {
            let path = assembly.row::<MemberRefRaw>(token).ok().and_then(|row| {
                let name = assembly.string_at(row.name).ok()?;
                let declaring = assembly.full_type_name(row.class.token).ok()?;
                Some(format!("{declaring}::{name}"))
            });
            path.unwrap_or_else(|| token.to_string())
        }
        0x70 => match assembly.user_string_at(token.row()) {
            Ok(literal) => format!("\"{literal}\""),
            Err(_) => token.to_string(),
        },
        _ => token.to_string(),
    }
}

/// Locals read anywhere in the instruction sequence
fn loaded_locals(instructions: &[Instruction]) -> HashSet<u32> {
    let mut loaded = HashSet::new();
    for instruction in instructions {
        match instruction.mnemonic {
            "ldloc.0" => _ = loaded.insert(0),
            "ldloc.1" => _ = loaded.insert(1),
            "ldloc.2" => _ = loaded.insert(2),
            "ldloc.3" => _ = loaded.insert(3),
            "ldloc.s" | "ldloca.s" | "ldloc" | "ldloca" => {
                if let Operand::Immediate(value) = &instruction.operand {
                    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                    loaded.insert(value.as_i64() as u32);
                }
            }
            _ => {}
        }
    }
    loaded
}

/// The local index a store instruction writes, `None` for non-stores
fn local_store_index(instruction: &Instruction) -> Option<u32> {
    match instruction.mnemonic {
        "stloc.0" => Some(0),
        "stloc.1" => Some(1),
        "stloc.2" => Some(2),
        "stloc.3" => Some(3),
        "stloc.s" | "stloc" => match &instruction.operand {
            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            Operand::Immediate(value) => Some(value.as_i64() as u32),
            _ => None,
        },
        _ => None,
    }
}
