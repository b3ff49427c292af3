//! Call-site extraction from CIL method bodies.
//!
//! [`CallExtractor`] decodes one method body into basic blocks, walks them
//! depth-first from the entry, and collects every call instruction's statically
//! resolved callee. Each newly seen callee is paired immediately with a fallback
//! name computed from the in-memory view available at the call site: that name is
//! the only one ever available for callees living outside the local method table,
//! and computing it later would require re-reading table rows that pass 2 no
//! longer touches.
//!
//! Indirect calls (`calli`) have no statically resolved callee and are invisible
//! to the graph by design.

use log::debug;

use crate::{
    analysis::naming::{identity_key, NameEntity, ResolvedMethodInfo},
    disassembler::{decode_blocks, BasicBlock},
    metadata::{
        assembly::Assembly,
        method::MethodAttributes,
        tables::{MemberRefRaw, MethodDefRaw, MethodSpecRaw, ModuleRefRaw, TableId},
        token::Token,
    },
    Result,
};

/// One call target collected during pass 1: the raw callee handle plus the
/// eagerly computed fallback name. Consumed exactly once by pass 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCall {
    /// The statically resolved callee token
    pub target: Token,
    /// Name computed from call-site information, used when the target cannot be
    /// bound to a local definition
    pub fallback: String,
}

/// Collect the deduplicated call-target tokens of a block graph.
///
/// Targets appear in first-occurrence order of a depth-first traversal from the
/// entry block. Only tokens that can name a method take part: `MethodDef`,
/// `MemberRef` and `MethodSpec`. `calli` call sites carry a `StandAloneSig`
/// token and drop out here.
#[must_use]
pub fn collect_call_targets(blocks: &[BasicBlock]) -> Vec<Token> {
    fn walk(
        offset: usize,
        blocks: &[BasicBlock],
        visited: &mut Vec<bool>,
        targets: &mut Vec<Token>,
    ) {
        let Some(index) = blocks.iter().position(|block| block.offset == offset) else {
            return;
        };

        if visited[index] {
            return;
        }
        visited[index] = true;

        for instruction in &blocks[index].instructions {
            if !instruction.is_call() {
                continue;
            }

            let Some(token) = instruction.token_operand() else {
                continue;
            };

            let names_a_method = matches!(
                TableId::from_number(token.table()),
                Some(TableId::MethodDef | TableId::MemberRef | TableId::MethodSpec)
            );

            if names_a_method && !targets.contains(&token) {
                targets.push(token);
            }
        }

        for successor in &blocks[index].successors {
            walk(*successor, blocks, visited, targets);
        }
    }

    let mut visited = vec![false; blocks.len()];
    let mut targets = Vec::new();
    if !blocks.is_empty() {
        walk(blocks[0].offset, blocks, &mut visited, &mut targets);
    }
    targets
}

/// Extracts pending calls from method bodies of one assembly.
pub struct CallExtractor<'a> {
    assembly: &'a Assembly,
}

impl<'a> CallExtractor<'a> {
    /// Create an extractor over `assembly`
    #[must_use]
    pub fn new(assembly: &'a Assembly) -> Self {
        CallExtractor { assembly }
    }

    /// Extract the deduplicated call set of one method body.
    ///
    /// Never fails: a body that cannot be decoded contributes an empty call set,
    /// and a callee whose fallback name cannot be computed is skipped. Both are
    /// logged and isolated to this method.
    #[must_use]
    pub fn extract(&self, code: &[u8]) -> Vec<PendingCall> {
        let blocks = match decode_blocks(code) {
            Ok(blocks) => blocks,
            Err(error) => {
                debug!("skipping call extraction for undecodable body: {error}");
                return Vec::new();
            }
        };

        let mut pending = Vec::new();
        for target in collect_call_targets(&blocks) {
            match self.fallback_name(target) {
                Ok((resolved_target, fallback)) => {
                    if !pending
                        .iter()
                        .any(|call: &PendingCall| call.target == resolved_target)
                    {
                        pending.push(PendingCall {
                            target: resolved_target,
                            fallback,
                        });
                    }
                }
                Err(error) => {
                    debug!("no fallback name for call target {target}: {error}");
                }
            }
        }

        pending
    }

    /// Compute the in-memory fallback name of a call target.
    ///
    /// `MethodSpec` targets resolve to the underlying generic method definition
    /// or reference first; the returned token is the one pass 2 should look up.
    fn fallback_name(&self, target: Token) -> Result<(Token, String)> {
        match target.table() {
            0x06 => Ok((target, self.method_def_fallback(target)?)),
            0x0A => Ok((target, self.member_ref_fallback(target)?)),
            0x2B => {
                let spec = self.assembly.row::<MethodSpecRaw>(target)?;
                self.fallback_name(spec.method.token)
            }
            _ => Err(crate::Error::RowNotFound(target)),
        }
    }

    fn method_def_fallback(&self, target: Token) -> Result<String> {
        let assembly = self.assembly;
        let method = assembly.row::<MethodDefRaw>(target)?;

        let declaring_type = match assembly.declaring_type_of(target) {
            Some(type_token) => assembly.full_type_name(type_token)?,
            None => String::from("<module>"),
        };

        let signature = assembly.method_signature(method.signature)?;
        let param_types = signature
            .params
            .iter()
            .map(|param| assembly.type_text(param))
            .collect();

        let flags = MethodAttributes::from_bits_truncate(method.flags);

        identity_key(
            assembly,
            &NameEntity::ResolvedMethodInfo(ResolvedMethodInfo {
                declaring_type,
                name: assembly.string_at(method.name)?,
                generic_arity: assembly.generic_arity(target),
                param_types,
                is_static: flags.contains(MethodAttributes::STATIC),
                is_vararg: signature.vararg,
                token: target,
            }),
        )
    }

    fn member_ref_fallback(&self, target: Token) -> Result<String> {
        let assembly = self.assembly;
        let member = assembly.row::<MemberRefRaw>(target)?;

        let declaring_type = match member.class.tag {
            TableId::TypeRef | TableId::TypeDef | TableId::TypeSpec => {
                assembly.full_type_name(member.class.token)?
            }
            TableId::ModuleRef => {
                let module_ref = assembly.row::<ModuleRefRaw>(member.class.token)?;
                assembly.string_at(module_ref.name)?
            }
            TableId::MethodDef => match assembly.declaring_type_of(member.class.token) {
                Some(type_token) => assembly.full_type_name(type_token)?,
                None => String::from("<module>"),
            },
            _ => format!("{:?}", member.class.tag),
        };

        let signature = assembly.method_signature(member.signature)?;
        let param_types = signature
            .params
            .iter()
            .map(|param| assembly.type_text(param))
            .collect();

        identity_key(
            assembly,
            &NameEntity::ResolvedMethodInfo(ResolvedMethodInfo {
                declaring_type,
                name: assembly.string_at(member.name)?,
                generic_arity: signature.generic_count,
                param_types,
                is_static: !signature.has_this,
                is_vararg: signature.vararg,
                token: target,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disassembler::decode_blocks;

    #[test]
    fn collects_in_first_occurrence_order() {
        // call 0x0A000001, call 0x06000002, callvirt 0x0A000001 (dup), ret
        #[rustfmt::skip]
        let code = [
            0x28, 0x01, 0x00, 0x00, 0x0A,
            0x28, 0x02, 0x00, 0x00, 0x06,
            0x6F, 0x01, 0x00, 0x00, 0x0A,
            0x2A,
        ];

        let blocks = decode_blocks(&code).unwrap();
        let targets = collect_call_targets(&blocks);

        assert_eq!(
            targets,
            vec![Token::new(0x0A000001), Token::new(0x06000002)]
        );
    }

    #[test]
    fn newobj_and_jmp_take_part() {
        // newobj 0x0A000003, jmp 0x06000004
        #[rustfmt::skip]
        let code = [
            0x73, 0x03, 0x00, 0x00, 0x0A,
            0x27, 0x04, 0x00, 0x00, 0x06,
        ];

        let blocks = decode_blocks(&code).unwrap();
        let targets = collect_call_targets(&blocks);

        assert_eq!(
            targets,
            vec![Token::new(0x0A000003), Token::new(0x06000004)]
        );
    }

    #[test]
    fn calli_is_invisible() {
        // calli 0x11000001 (StandAloneSig token), ret
        #[rustfmt::skip]
        let code = [
            0x29, 0x01, 0x00, 0x00, 0x11,
            0x2A,
        ];

        let blocks = decode_blocks(&code).unwrap();
        assert!(collect_call_targets(&blocks).is_empty());
    }

    #[test]
    fn calls_behind_branches_are_found() {
        #[rustfmt::skip]
        let code = [
            0x2D, 0x06,                     // 0: brtrue.s -> 8
            0x28, 0x01, 0x00, 0x00, 0x06,   // 2: call 0x06000001
            0x2A,                           // 7: ret
            0x28, 0x02, 0x00, 0x00, 0x06,   // 8: call 0x06000002
            0x2A,                           // 13: ret
        ];

        let blocks = decode_blocks(&code).unwrap();
        let targets = collect_call_targets(&blocks);

        assert_eq!(targets.len(), 2);
        assert!(targets.contains(&Token::new(0x06000001)));
        assert!(targets.contains(&Token::new(0x06000002)));
    }

    #[test]
    fn non_call_tokens_ignored() {
        // ldstr 0x70000001, ldtoken 0x02000001, ret
        #[rustfmt::skip]
        let code = [
            0x72, 0x01, 0x00, 0x00, 0x70,
            0xD0, 0x01, 0x00, 0x00, 0x02,
            0x2A,
        ];

        let blocks = decode_blocks(&code).unwrap();
        assert!(collect_call_targets(&blocks).is_empty());
    }

    #[test]
    fn empty_body_yields_no_targets() {
        let blocks = decode_blocks(&[]).unwrap();
        assert!(collect_call_targets(&blocks).is_empty());
    }
}
