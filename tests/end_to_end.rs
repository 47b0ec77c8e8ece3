//! End-to-end scenarios lifted from spec §8, driven through the crate's
//! public API rather than its internal `#[cfg(test)]` modules.

use std::io::Write;

use cfront::config::{CompilerConfig, Dialect};
use cfront::ir::Instr;
use cfront::{compile_file, compile_str};

fn only_function(src: &str) -> cfront::ir::Procedure {
    let module = compile_str(src, &CompilerConfig::new()).unwrap();
    assert_eq!(module.functions.len(), 1);
    module.functions.into_iter().next().unwrap()
}

fn instrs(proc: &cfront::ir::Procedure) -> Vec<&Instr> {
    proc.block_ids()
        .flat_map(|id| proc.block(id).instrs.clone())
        .map(|id| proc.instr(id))
        .collect()
}

/// Scenario 1: a one-line function loads its parameter slot, adds a
/// constant, and returns.
#[test]
fn scenario_1_parameter_plus_constant() {
    let proc = only_function("int f(int x){ return x + 1; }");
    let all = instrs(&proc);
    assert!(all.iter().any(|i| matches!(i, Instr::Param { .. })));
    assert!(all.iter().any(|i| matches!(i, Instr::Load { .. })));
    assert!(all.iter().any(|i| matches!(i, Instr::Binary { op: cfront::ir::ArithOp::Add, .. })));
    assert!(all.iter().any(|i| matches!(i, Instr::Return { value: Some(_) })));
    // Exactly one store into the parameter's stack slot (the prologue).
    let store_count = all.iter().filter(|i| matches!(i, Instr::Store { .. })).count();
    assert_eq!(store_count, 1);
}

/// Scenario 2: `if (a < b) return a; else return b;` produces entry/yes/no
/// blocks and sweeps the unreachable join.
#[test]
fn scenario_2_if_else_both_arms_return() {
    let proc = only_function("int g(int a, int b){ if (a < b) return a; else return b; }");
    let entry = proc.block(proc.entry);
    let terminator = proc.instr(*entry.instrs.last().unwrap());
    assert!(matches!(terminator, Instr::CJump { .. }));

    let mut return_blocks = 0;
    let mut empty_blocks = 0;
    for id in proc.block_ids() {
        let block = proc.block(id);
        if block.instrs.is_empty() {
            empty_blocks += 1;
            continue;
        }
        if matches!(proc.instr(*block.instrs.last().unwrap()), Instr::Return { .. }) {
            return_blocks += 1;
        }
    }
    assert_eq!(return_blocks, 2);
    assert!(empty_blocks >= 1, "the would-be final block should be swept empty");
}

/// Scenario 3: a `while` loop accumulates into locals and returns the sum.
#[test]
fn scenario_3_while_loop_accumulator() {
    let proc = only_function(
        "int s(int n){ int i = 0; int t = 0; while (i < n) { t = t + i; i = i + 1; } return t; }",
    );
    let all = instrs(&proc);
    let store_count = all.iter().filter(|i| matches!(i, Instr::Store { .. })).count();
    // param prologue store, i=0, t=0, t=t+i, i=i+1
    assert_eq!(store_count, 5);
    assert!(matches!(all.last().unwrap(), Instr::Return { value: Some(_) }) || all.iter().any(|i| matches!(i, Instr::Return { .. })));
}

/// Scenario 4: `typedef int foo; foo bar;` yields one global `Variable`
/// sized through the `sizeof` seam, and the typedef name is live afterward.
#[test]
fn scenario_4_typedef_then_global_variable() {
    let module = compile_str("typedef int foo; foo bar;", &CompilerConfig::new()).unwrap();
    assert_eq!(module.functions.len(), 0);
    assert_eq!(module.globals.len(), 1);
    let global = &module.globals[0];
    assert_eq!(global.name, "bar");
    assert_eq!(global.size, 8);
}

/// Scenario 5: `x > 0 && x < 10` never materializes a boolean; it joins two
/// relational comparisons through a middle block.
#[test]
fn scenario_5_short_circuit_and_uses_a_middle_block() {
    let proc = only_function("int h(int x){ if (x > 0 && x < 10) return 1; return 0; }");
    let all = instrs(&proc);
    let cmp_count = all.iter().filter(|i| matches!(i, Instr::Cmp { .. })).count();
    assert_eq!(cmp_count, 2);
    assert!(!all.iter().any(|i| matches!(i, Instr::Binary { .. })));
}

/// Scenario 6: an empty body in a non-void function is swept, not flagged
/// as a missing return.
#[test]
fn scenario_6_empty_body_is_swept_not_rejected() {
    let module = compile_str("int k(){ }", &CompilerConfig::new()).unwrap();
    let proc = &module.functions[0];
    for id in proc.block_ids() {
        let block = proc.block(id);
        if let Some(&last) = block.instrs.last() {
            assert!(proc.instr(last).is_terminator());
        }
    }
}

/// A file-backed configuration (spec §6 "Configuration options") round-trips
/// through `from_toml_str`, and `compile_file` honors the loaded dialect
/// when lowering a source file from disk.
#[test]
fn file_backed_config_round_trips_through_toml() {
    let mut config_file = tempfile::NamedTempFile::new().unwrap();
    writeln!(config_file, "std = \"c99\"\ntrigraphs = false\n").unwrap();
    let text = std::fs::read_to_string(config_file.path()).unwrap();
    let config = CompilerConfig::from_toml_str(&text).unwrap();
    assert_eq!(config.std, Dialect::C99);
    assert!(config.std.allows_restrict());

    let mut source_file = tempfile::NamedTempFile::new().unwrap();
    writeln!(source_file, "int add(int a, int b) {{ return a + b; }}").unwrap();
    let module = compile_file(source_file.path(), &config).unwrap();
    assert_eq!(module.functions.len(), 1);
    assert_eq!(module.functions[0].name, "add");
}
