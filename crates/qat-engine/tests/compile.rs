//! End-to-end compilation tests
//!
//! Programs are built as syntax trees, compiled, and checked through the
//! produced IR, type tables and diagnostics.

mod common;

use common::*;
use qat_engine::ast::{BinaryOperator, MemberDeclKind};
use qat_engine::ir::{IrFunction, IrInstr, IrValue};
use qat_engine::types::IntInfo;
use qat_engine::{CompileOptions, DefineValue, EmitPhase, EntityId};
use rustc_hash::FxHashMap;

fn function_named<'o>(output: &'o qat_engine::CompileOutput, name: &str) -> &'o IrFunction {
    match output.ir.get_function_by_name(name) {
        Some(function) => function,
        None => panic!("no IR function named `{}`", name),
    }
}

fn block_labels(function: &IrFunction) -> Vec<&str> {
    function.blocks.iter().filter_map(|b| b.label.as_deref()).collect()
}

fn instructions(function: &IrFunction) -> impl Iterator<Item = &IrInstr> {
    function.blocks.iter().flat_map(|b| b.instructions.iter())
}

// ============================================================================
// Functions
// ============================================================================

#[test]
fn test_free_function_is_named_after_its_module() {
    let program = program(vec![function(
        "answer",
        vec![],
        Some(int_ty(32)),
        vec![give(Some(int(42)))],
    )]);
    let output = compile_ok(&program, &CompileOptions::default());

    let answer = function_named(&output, "main::answer");
    assert!(!answer.is_external);
    assert!(answer.blocks.iter().all(|b| b.terminator.is_some()));
    assert!(output.diagnostics.is_empty());
}

#[test]
fn test_void_function_gets_implicit_return() {
    let program = program(vec![function("nothing", vec![], None, vec![])]);
    let output = compile_ok(&program, &CompileOptions::default());

    let nothing = function_named(&output, "main::nothing");
    assert!(nothing.blocks.iter().all(|b| b.terminator.is_some()));
}

#[test]
fn test_functions_call_each_other_regardless_of_order() {
    let caller = function(
        "caller",
        vec![],
        Some(int_ty(32)),
        vec![give(Some(expr(qat_engine::ast::ExprKind::Call {
            callee: Box::new(entity("callee")),
            args: vec![],
        })))],
    );
    let callee = function("callee", vec![], Some(int_ty(32)), vec![give(Some(int(7)))]);
    let output = compile_ok(&program(vec![caller, callee]), &CompileOptions::default());

    let caller = function_named(&output, "main::caller");
    assert!(instructions(caller).any(|i| i.is_call()));
}

// ============================================================================
// Integer width checks
// ============================================================================

#[test]
fn test_mixed_integer_widths_are_rejected() {
    let program = program(vec![function(
        "add",
        vec![arg("a", int_ty(32)), arg("b", int_ty(64))],
        Some(int_ty(64)),
        vec![give(Some(binary(BinaryOperator::Add, entity("a"), entity("b"))))],
    )]);
    let failure = compile_err(&program, &CompileOptions::default());
    assert_eq!(error_code(&failure), "E2002");
}

#[test]
fn test_explicit_conversion_resolves_width_mismatch() {
    let program = program(vec![function(
        "add",
        vec![arg("a", int_ty(32)), arg("b", int_ty(64))],
        Some(int_ty(64)),
        vec![give(Some(binary(
            BinaryOperator::Add,
            cast(entity("a"), int_ty(64)),
            entity("b"),
        )))],
    )]);
    compile_ok(&program, &CompileOptions::default());
}

// ============================================================================
// String comparison
// ============================================================================

#[test]
fn test_known_strings_compare_at_compile_time() {
    let program = program(vec![function(
        "same",
        vec![],
        Some(bool_ty()),
        vec![give(Some(binary(BinaryOperator::Eq, string("qat"), string("qat"))))],
    )]);
    let output = compile_ok(&program, &CompileOptions::default());

    let same = function_named(&output, "main::same");
    assert!(!block_labels(same).iter().any(|l| l.starts_with("str.cmp")));
}

#[test]
fn test_runtime_strings_compare_in_a_loop() {
    let program = program(vec![function(
        "same",
        vec![arg("a", str_ty()), arg("b", str_ty())],
        Some(bool_ty()),
        vec![give(Some(binary(BinaryOperator::Eq, entity("a"), entity("b"))))],
    )]);
    let output = compile_ok(&program, &CompileOptions::default());

    let labels = block_labels(function_named(&output, "main::same"));
    for expected in ["str.cmp.length", "str.cmp.cond", "str.cmp.body", "str.cmp.end"] {
        assert!(labels.contains(&expected), "missing block `{}` in {:?}", expected, labels);
    }
}

// ============================================================================
// Choice types
// ============================================================================

#[test]
fn test_choice_values_continue_from_previous_variant() {
    let program = program(vec![choice(
        "Color",
        vec![("Red", None), ("Green", Some(10)), ("Blue", None)],
    )]);
    let output = compile_ok(&program, &CompileOptions::default());

    let color = match output.types.find_named("main::Color") {
        Some(ty) => ty,
        None => panic!("choice type was not created"),
    };
    let def = output.types.choice_of(color).unwrap();
    let values: Vec<i128> = def.variants.iter().map(|v| v.value).collect();
    assert_eq!(values, [0, 10, 11]);
    assert_eq!(
        output.types.int_info(def.underlying),
        Some(IntInfo {
            bits: 4,
            is_signed: false
        })
    );
}

#[test]
fn test_choice_values_must_be_unique() {
    let program = program(vec![choice("Level", vec![("Low", Some(1)), ("High", Some(1))])]);
    let failure = compile_err(&program, &CompileOptions::default());
    assert_eq!(error_code(&failure), "E2008");
}

// ============================================================================
// Construction and lifecycle
// ============================================================================

fn point_with_constructor() -> qat_engine::Decl {
    structure(
        "Point",
        vec![field("x", int_ty(32)), field("y", int_ty(32))],
        vec![member(
            MemberDeclKind::Constructor,
            vec![member_arg("x"), member_arg("y")],
            vec![],
        )],
    )
}

#[test]
fn test_local_is_constructed_in_its_own_slot() {
    let program = program(vec![
        point_with_constructor(),
        function(
            "make",
            vec![],
            None,
            vec![local(
                "p",
                Some(named_ty("Point")),
                Some(construct("Point", vec![int(1), int(2)])),
                false,
            )],
        ),
    ]);
    let output = compile_ok(&program, &CompileOptions::default());
    let point = output.types.find_named("main::Point").unwrap();
    let make = function_named(&output, "main::make");

    let slots: Vec<_> = instructions(make)
        .filter_map(|i| match i {
            IrInstr::Alloca { dest, ty, name } if *ty == point => Some((*dest, name.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(slots.len(), 1, "expected a single slot for the point, found {:?}", slots);
    let (slot, name) = slots[0].clone();
    assert_eq!(name.as_deref(), Some("p"));

    let constructed_in_slot = instructions(make).any(|i| match i {
        IrInstr::Call { args, .. } => args.first() == Some(&IrValue::from(slot)),
        _ => false,
    });
    assert!(constructed_in_slot);
}

#[test]
fn test_struct_field_of_own_type_is_rejected() {
    let program = program(vec![structure(
        "Node",
        vec![field("value", int_ty(32)), field("next", named_ty("Node"))],
        vec![],
    )]);
    let failure = compile_err(&program, &CompileOptions::default());
    assert_eq!(error_code(&failure), "E2004");
}

#[test]
fn test_moving_copy_only_value_warns() {
    let handle = structure(
        "Handle",
        vec![field("raw", int_ty(32))],
        vec![member(MemberDeclKind::CopyConstructor, vec![], vec![])],
    );
    let body = vec![
        local("h", None, Some(plain("Handle", vec![int(3)])), true),
        local("g", None, Some(move_out(entity("h"))), false),
    ];
    let program = program(vec![handle, function("take", vec![], None, body)]);
    let output = compile_ok(&program, &CompileOptions::default());

    let codes: Vec<&str> = output
        .diagnostics
        .iter()
        .filter_map(|d| d.code())
        .map(|c| c.0)
        .collect();
    assert_eq!(codes, ["W0001"]);
}

// ============================================================================
// Guards and defines
// ============================================================================

#[test]
fn test_only_enabled_guarded_declaration_exists() {
    let enabled = function("platform", vec![], Some(int_ty(32)), vec![give(Some(int(1)))])
        .with_guard(boolean(true));
    let disabled = function("platform", vec![], Some(int_ty(32)), vec![give(Some(int(2)))])
        .with_guard(boolean(false));
    let output = compile_ok(&program(vec![enabled, disabled]), &CompileOptions::default());

    let count = output.ir.functions.iter().filter(|f| f.name == "main::platform").count();
    assert_eq!(count, 1);
}

#[test]
fn test_guard_reads_defines() {
    let traced = || function("trace", vec![], None, vec![]).with_guard(entity("tracing_enabled"));

    let options = CompileOptions::default().with_define("tracing_enabled", DefineValue::Bool(true));
    let output = compile_ok(&program(vec![traced()]), &options);
    assert!(output.ir.get_function_by_name("main::trace").is_some());

    let options =
        CompileOptions::default().with_define("tracing_enabled", DefineValue::Bool(false));
    let output = compile_ok(&program(vec![traced()]), &options);
    assert!(output.ir.get_function_by_name("main::trace").is_none());
}

// ============================================================================
// Markers
// ============================================================================

#[test]
fn test_todo_warns_in_debug_builds() {
    let program = program(vec![function("later", vec![], None, vec![todo(Some("write this"))])]);
    let output = compile_ok(&program, &CompileOptions::default());

    assert_eq!(output.diagnostics.len(), 1);
    assert_eq!(output.diagnostics[0].code().map(|c| c.0), Some("W0003"));
    assert!(output.diagnostics[0].message().contains("write this"));
}

#[test]
fn test_todo_fails_release_builds() {
    let program = program(vec![function("later", vec![], None, vec![todo(None)])]);
    let failure = compile_err(&program, &CompileOptions::release());
    assert_eq!(error_code(&failure), "E5001");
}

// ============================================================================
// Name resolution
// ============================================================================

#[test]
fn test_unresolved_bring_is_reported() {
    let program = program(vec![bring("missing::thing")]);
    let failure = compile_err(&program, &CompileOptions::default());
    assert_eq!(error_code(&failure), "E1004");
}

#[test]
fn test_bring_makes_lib_entity_visible() {
    let helpers = lib(
        "helpers",
        vec![function("one", vec![], Some(int_ty(32)), vec![give(Some(int(1)))])],
    );
    let user = function(
        "user",
        vec![],
        Some(int_ty(32)),
        vec![give(Some(expr(qat_engine::ast::ExprKind::Call {
            callee: Box::new(entity("one")),
            args: vec![],
        })))],
    );
    let program = program(vec![helpers, bring("helpers::one"), user]);
    let output = compile_ok(&program, &CompileOptions::default());

    assert!(output.ir.get_function_by_name("main::helpers::one").is_some());
    assert!(instructions(function_named(&output, "main::user")).any(|i| i.is_call()));
}

#[test]
fn test_duplicate_names_are_rejected() {
    let program = program(vec![
        function("twice", vec![], None, vec![]),
        function("twice", vec![], None, vec![]),
    ]);
    let failure = compile_err(&program, &CompileOptions::default());
    assert_eq!(error_code(&failure), "E1001");
}

// ============================================================================
// Scheduling
// ============================================================================

#[test]
fn test_prerun_cycle_is_reported_with_its_members() {
    let program = program(vec![
        prerun_global("A", binary(BinaryOperator::Add, entity("B"), int(1))),
        prerun_global("B", binary(BinaryOperator::Add, entity("A"), int(1))),
    ]);
    let failure = compile_err(&program, &CompileOptions::default());
    assert_eq!(error_code(&failure), "E4001");

    let diagnostic = failure.diagnostic().unwrap();
    let cycle = diagnostic
        .notes()
        .iter()
        .find(|n| n.starts_with("dependency cycle"))
        .unwrap();
    assert!(cycle.contains('A') && cycle.contains('B'), "{}", cycle);
}

#[test]
fn test_phases_advance_monotonically_per_entity() {
    let program = program(vec![
        function(
            "origin",
            vec![],
            None,
            vec![local(
                "p",
                Some(named_ty("Point")),
                Some(construct("Point", vec![int(0), int(0)])),
                false,
            )],
        ),
        point_with_constructor(),
        prerun_global("LIMIT", int(8)),
    ]);
    let output = compile_ok(&program, &CompileOptions::default());

    let mut last: FxHashMap<EntityId, EmitPhase> = FxHashMap::default();
    for (entity, phase) in &output.phase_log {
        if let Some(previous) = last.insert(*entity, *phase) {
            assert!(
                previous < *phase,
                "{} ran {:?} after {:?}",
                output.entity_name(*entity),
                phase,
                previous
            );
        }
    }
    assert!(output.stats.phase_runs >= output.phase_log.len());
}
