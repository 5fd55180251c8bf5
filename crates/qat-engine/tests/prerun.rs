//! Compile-time evaluation limits and results

mod common;

use common::*;
use qat_engine::ast::{BinaryOperator, Decl, Sentence};
use qat_engine::{CompileOptions, CompileOutput};

fn global_initializer(output: &CompileOutput, name: &str) -> Option<i128> {
    output
        .ir
        .globals
        .iter()
        .find(|g| g.name == name)
        .and_then(|g| g.initializer.as_int())
}

/// `prerun count() -> i32` adding one per iteration of `loop`
fn counting(loop_sentence: Sentence) -> Decl {
    prerun_function(
        "count",
        vec![],
        Some(int_ty(32)),
        vec![
            local("n", Some(int_ty(32)), Some(int(0)), true),
            loop_sentence,
            give(Some(entity("n"))),
        ],
    )
}

fn increment() -> Sentence {
    update(BinaryOperator::Add, entity("n"), int(1))
}

#[test]
fn test_prerun_loop_result_becomes_constant() {
    let program = program(vec![
        counting(loop_times(int(5), None, vec![increment()])),
        global("total", call("count", vec![])),
    ]);
    let output = compile_ok(&program, &CompileOptions::default());
    assert_eq!(global_initializer(&output, "main::total"), Some(5));
}

#[test]
fn test_huge_loop_count_hits_the_limit() {
    let spin = prerun_function(
        "spin",
        vec![],
        Some(int_ty(32)),
        vec![
            loop_times(int(1_000_000_000_000_000), None, vec![]),
            give(Some(int(1))),
        ],
    );
    let program = program(vec![spin, prerun_global("X", call("spin", vec![]))]);
    let failure = compile_err(&program, &CompileOptions::default());

    assert_eq!(error_code(&failure), "E2011");
    let message = failure.diagnostic().map(|d| d.message().to_string());
    assert!(message.is_some_and(|m| m.contains("65536")));
}

#[test]
fn test_loop_limit_comes_from_options() {
    let options = CompileOptions {
        prerun_loop_limit: 4,
        ..CompileOptions::default()
    };
    let program = program(vec![
        counting(loop_times(int(5), None, vec![increment()])),
        global("total", call("count", vec![])),
    ]);
    let failure = compile_err(&program, &options);
    assert_eq!(error_code(&failure), "E2011");
}

#[test]
fn test_endless_prerun_while_loop_is_stopped() {
    let options = CompileOptions {
        prerun_loop_limit: 100,
        ..CompileOptions::default()
    };
    let program = program(vec![
        counting(loop_while(boolean(true), vec![increment()])),
        prerun_global("X", call("count", vec![])),
    ]);
    let failure = compile_err(&program, &options);
    assert_eq!(error_code(&failure), "E2011");
}

#[test]
fn test_unbounded_recursion_hits_call_depth() {
    let forever = prerun_function(
        "forever",
        vec![],
        Some(int_ty(32)),
        vec![give(Some(call("forever", vec![])))],
    );
    let options = CompileOptions {
        prerun_call_depth: 16,
        ..CompileOptions::default()
    };
    let program = program(vec![forever, prerun_global("X", call("forever", vec![]))]);
    let failure = compile_err(&program, &options);

    assert_eq!(error_code(&failure), "E2011");
    let message = failure.diagnostic().map(|d| d.message().to_string());
    assert!(message.is_some_and(|m| m.contains("main::forever")));
}
