use std::hint::black_box;

use divan::{AllocProfiler, Bencher};
use scrip_bench::{deep_let_chain, ledger_contract};
use scrip_check::typeck::{check_expr, check_module};
use scrip_check::{CheckContext, ContractHost, TypeEnv};
use scrip_types::{AdtRegistry, BuiltinDictionary};

#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

fn main() {
    divan::main();
}

#[divan::bench(args = [32, 128, 512])]
fn check_let_chain(bencher: Bencher, depth: usize) {
    let expr = deep_let_chain(depth);
    let adts = AdtRegistry::with_stdlib();
    let builtins = BuiltinDictionary::with_stdlib();
    let host = ContractHost::default();
    bencher.bench(|| {
        let mut ctx = CheckContext::new(&adts, &builtins, &host);
        let env = TypeEnv::new();
        let typed = check_expr(black_box(&expr), &env, &mut ctx)
            .unwrap_or_else(|diag| panic!("checking failed in benchmark setup: {diag}"));
        black_box(typed.ann.qty.ty)
    });
}

#[divan::bench(args = [4, 16, 64])]
fn check_ledger_module(bencher: Bencher, transitions: usize) {
    let module = ledger_contract(transitions);
    let adts = AdtRegistry::with_stdlib();
    let builtins = BuiltinDictionary::with_stdlib();
    let host = ContractHost::default();
    bencher.bench(|| {
        let mut ctx = CheckContext::new(&adts, &builtins, &host);
        let checked = check_module(black_box(&module), &[], &[], &mut ctx)
            .unwrap_or_else(|err| panic!("checking failed in benchmark setup: {err}"));
        black_box(checked.module.contract.transitions.len())
    });
}
