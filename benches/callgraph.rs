use criterion::{criterion_group, criterion_main, Criterion};

use cilgraph::analysis::callgraph::{
    resolve, BodyStatus, MethodIndex, MethodSummary, ResolutionMode, ScannedMethod,
};
use cilgraph::analysis::extract::{collect_call_targets, PendingCall};
use cilgraph::disassembler::decode_blocks;
use cilgraph::metadata::token::Token;

/// A synthetic method body: a run of calls with interleaved arithmetic, ending
/// in `ret`.
fn synthetic_body(call_count: u32) -> Vec<u8> {
    let mut code = Vec::new();
    for index in 0..call_count {
        code.push(0x00); // nop
        code.push(0x28); // call
        let token = 0x0600_0001 + (index % 64);
        code.extend_from_slice(&token.to_le_bytes());
        code.push(0x26); // pop
    }
    code.push(0x2A); // ret
    code
}

fn bench_decode_and_collect(criterion: &mut Criterion) {
    let body = synthetic_body(256);

    criterion.bench_function("decode_blocks_256_calls", |bencher| {
        bencher.iter(|| decode_blocks(std::hint::black_box(&body)).unwrap());
    });

    let blocks = decode_blocks(&body).unwrap();
    criterion.bench_function("collect_call_targets_256_calls", |bencher| {
        bencher.iter(|| collect_call_targets(std::hint::black_box(&blocks)));
    });
}

fn bench_resolution(criterion: &mut Criterion) {
    let mut index = MethodIndex::new();
    for rid in 1..=1024u32 {
        index.insert(MethodSummary {
            token: Token::from_table_row(0x06, rid),
            key: format!("Lib.Type`0|0x02000001.Method{rid}`0()|Public|0x{:08X}", 0x06000000 + rid),
            rva: 0x2000 + rid * 0x10,
        });
    }

    let caller = ScannedMethod {
        token: Token::new(0x0600_0001),
        key: "caller".to_string(),
        rva: 0x2000,
        body: BodyStatus::Present { code_size: 0 },
        pending: (1..=512u32)
            .map(|rid| PendingCall {
                // Every other target misses the index and takes the fallback path
                target: Token::from_table_row(if rid % 2 == 0 { 0x06 } else { 0x0A }, rid),
                fallback: format!("external{rid}"),
            })
            .collect(),
    };

    criterion.bench_function("resolve_512_pending", |bencher| {
        bencher.iter(|| {
            resolve(
                std::hint::black_box(&index),
                std::hint::black_box(&caller),
                ResolutionMode::CalleeIdentity,
            )
        });
    });
}

criterion_group!(benches, bench_decode_and_collect, bench_resolution);
criterion_main!(benches);
