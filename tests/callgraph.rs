//! End-to-end behavior of the two-pass call-graph pipeline on synthetic input:
//! crafted IL through the extractor's target collection, then resolution against
//! a hand-built method index.

use cilgraph::analysis::callgraph::{
    resolve, BodyStatus, CalledMethod, MethodIndex, MethodSummary, ResolutionMode, ScannedMethod,
};
use cilgraph::analysis::extract::{collect_call_targets, PendingCall};
use cilgraph::analysis::naming::ResolvedMethodInfo;
use cilgraph::disassembler::decode_blocks;
use cilgraph::metadata::token::Token;

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
        body: BodyStatus::Present { code_size: 0 },
        pending,
    }
}

fn pending(target: u32, fallback: &str) -> PendingCall {
    PendingCall {
        target: Token::new(target),
        fallback: fallback.to_string(),
    }
}

/// The canonical scenario: `A.M1` calls the local `A.M2` and the external
/// `Console.WriteLine`. The resolved list names the callee with its offset for
/// the local target and carries the fallback with address zero for the external
/// one.
#[test]
fn local_and_external_calls_resolve_as_specified() {
    let m2_key = "A`0|0x02000002.M2`0()|Public, Static, HideBySig|0x06000002";
    let writeline_fallback = "System.Console.WriteLine`0(string)|static|0x0A000012";

    let mut index = MethodIndex::new();
    index.insert(summary(0x06000001, "A.M1", 0x2050));
    index.insert(summary(0x06000002, m2_key, 0x2070));

    let m1 = scanned(
        0x06000001,
        "A.M1",
        0x2050,
        vec![
            pending(0x06000002, "in-memory fallback for M2"),
            pending(0x0A000012, writeline_fallback),
        ],
    );

    let calls = resolve(&index, &m1, ResolutionMode::CalleeIdentity);

    assert_eq!(
        calls,
        vec![
            CalledMethod {
                name: m2_key.to_string(),
                address: 0x2070,
            },
            CalledMethod {
                name: writeline_fallback.to_string(),
                address: 0,
            },
        ]
    );
}

/// N call instructions deduplicating to M local and K external targets yield
/// exactly M records with a non-zero address and K records with address zero.
#[test]
fn call_counts_partition_into_local_and_external() {
    // 5 call instructions, 2 duplicate: targets dedup to 2 local + 1 external
    #[rustfmt::skip]
    let code = [
        0x28, 0x01, 0x00, 0x00, 0x06, // call  0x06000001
        0x28, 0x02, 0x00, 0x00, 0x06, // call  0x06000002
        0x28, 0x01, 0x00, 0x00, 0x06, // call  0x06000001 (dup)
        0x6F, 0x07, 0x00, 0x00, 0x0A, // callvirt 0x0A000007
        0x6F, 0x07, 0x00, 0x00, 0x0A, // callvirt 0x0A000007 (dup)
        0x2A,                         // ret
    ];

    let blocks = decode_blocks(&code).expect("crafted IL decodes");
    let targets = collect_call_targets(&blocks);
    assert_eq!(targets.len(), 3);

    let mut index = MethodIndex::new();
    index.insert(summary(0x06000001, "T.Local1", 0x2000));
    index.insert(summary(0x06000002, "T.Local2", 0x2100));

    let caller = scanned(
        0x06000009,
        "T.Caller",
        0x3000,
        targets
            .iter()
            .map(|target| pending(target.value(), "external fallback"))
            .collect(),
    );

    let calls = resolve(&index, &caller, ResolutionMode::CalleeIdentity);
    let local_count = calls.iter().filter(|call| call.address != 0).count();
    let external_count = calls.iter().filter(|call| call.address == 0).count();

    assert_eq!(local_count, 2);
    assert_eq!(external_count, 1);
}

/// A callee defined later in scan order still resolves, because resolution only
/// runs against the completed index.
#[test]
fn forward_references_resolve() {
    let early = scanned(
        0x06000001,
        "Lib.Early",
        0x2000,
        vec![pending(0x06000063, "fallback for Late")],
    );

    // Pass 1 continues: the callee is indexed after the caller was scanned
    let mut index = MethodIndex::new();
    index.insert(summary(0x06000001, "Lib.Early", 0x2000));
    index.insert(summary(0x06000063, "Lib.Late", 0x5400));

    let calls = resolve(&index, &early, ResolutionMode::CalleeIdentity);
    assert_eq!(calls[0].name, "Lib.Late");
    assert_eq!(calls[0].address, 0x5400);
}

/// Re-resolving the same scan twice yields identical records.
#[test]
fn resolution_is_repeatable() {
    let mut index = MethodIndex::new();
    index.insert(summary(0x06000002, "A.M2", 0x2060));

    let caller = scanned(
        0x06000001,
        "A.M1",
        0x2050,
        vec![pending(0x06000002, "f"), pending(0x0A000001, "ext")],
    );

    let first = resolve(&index, &caller, ResolutionMode::CalleeIdentity);
    let second = resolve(&index, &caller, ResolutionMode::CalleeIdentity);
    assert_eq!(first, second);
}

/// Distinct tokens keep identity keys pairwise distinct even when everything
/// else collides (same name, same signature, same flags).
#[test]
fn identical_overloads_stay_distinguishable() {
    let info = |token: u32| ResolvedMethodInfo {
        declaring_type: "Lib.Worker".to_string(),
        name: "Run".to_string(),
        generic_arity: 0,
        param_types: vec!["int32".to_string()],
        is_static: false,
        is_vararg: false,
        token: Token::new(token),
    };

    let keys: Vec<String> = [0x0A000001u32, 0x0A000002, 0x0A000003]
        .iter()
        .map(|token| info(*token).key())
        .collect();

    assert_ne!(keys[0], keys[1]);
    assert_ne!(keys[1], keys[2]);
    assert_ne!(keys[0], keys[2]);

    // And the computation is deterministic
    assert_eq!(info(0x0A000001).key(), keys[0]);
}
