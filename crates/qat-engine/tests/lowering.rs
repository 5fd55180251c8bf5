//! Lowering of loops, operators, references and constructing expressions

mod common;

use common::*;
use qat_engine::ast::{BinaryOperator, MemberDeclKind};
use qat_engine::ir::{Callee, CmpPredicate, IrConstant, IrFunction, IrInstr, IrValue, Terminator};
use qat_engine::{CompileOptions, CompileOutput, TypeContext, WriteIr};

fn function_named<'o>(output: &'o CompileOutput, name: &str) -> &'o IrFunction {
    match output.ir.get_function_by_name(name) {
        Some(function) => function,
        None => panic!("no IR function named `{}`", name),
    }
}

fn block_labels(function: &IrFunction) -> Vec<&str> {
    function
        .blocks
        .iter()
        .filter_map(|b| b.label.as_deref())
        .collect()
}

fn assert_blocks(function: &IrFunction, expected: &[&str]) {
    let labels = block_labels(function);
    for label in expected {
        assert!(
            labels.contains(label),
            "missing block `{}` in {:?}",
            label,
            labels
        );
    }
}

fn warning_codes(output: &CompileOutput) -> Vec<&'static str> {
    output
        .diagnostics
        .iter()
        .filter_map(|d| d.code())
        .map(|c| c.0)
        .collect()
}

/// A program with one function `main::walk(values: T)` looping over `values`
fn walk_over(values: qat_engine::ast::TypeExpr) -> CompileOutput {
    let program = program(vec![function(
        "walk",
        vec![arg("values", values)],
        None,
        vec![loop_in(entity("values"), "item", vec![])],
    )]);
    compile_ok(&program, &CompileOptions::default())
}

fn bounded_by_count(function: &IrFunction) -> bool {
    function.count_instructions(|i| {
        matches!(
            i,
            IrInstr::Compare {
                pred: CmpPredicate::UnsignedLt,
                ..
            }
        )
    }) == 1
}

// ============================================================================
// Loops
// ============================================================================

#[test]
fn test_loop_in_array_walks_each_element() {
    let body = vec![
        local("total", Some(int_ty(32)), Some(int(0)), true),
        loop_in(
            entity("values"),
            "item",
            vec![update(BinaryOperator::Add, entity("total"), entity("item"))],
        ),
        give(Some(entity("total"))),
    ];
    let program = program(vec![function(
        "sum",
        vec![arg("values", array_ty(int_ty(32), 4))],
        Some(int_ty(32)),
        body,
    )]);
    let output = compile_ok(&program, &CompileOptions::default());

    let sum = function_named(&output, "main::sum");
    assert_blocks(sum, &["loop.cond", "loop.body", "loop.incr", "loop.rest"]);
    let bound = sum.instructions().find_map(|i| match i {
        IrInstr::Compare {
            pred: CmpPredicate::UnsignedLt,
            rhs: IrValue::Constant(constant),
            ..
        } => constant.as_int(),
        _ => None,
    });
    assert_eq!(bound, Some(4));
    assert_eq!(
        sum.count_instructions(|i| matches!(i, IrInstr::ElementPtr { .. })),
        1
    );
}

#[test]
fn test_loop_in_slice_reads_its_length() {
    let output = walk_over(slice_ty(uint_ty(8)));
    let walk = function_named(&output, "main::walk");

    assert_blocks(walk, &["loop.cond", "loop.body", "loop.rest"]);
    let parts: Vec<u32> = walk
        .instructions()
        .filter_map(|i| match i {
            IrInstr::ExtractValue { index, .. } => Some(*index),
            _ => None,
        })
        .collect();
    assert_eq!(parts, [0, 1]);
    assert!(bounded_by_count(walk));
}

#[test]
fn test_loop_in_vector_uses_lane_count() {
    let output = walk_over(vector_ty(int_ty(32), 8));
    let walk = function_named(&output, "main::walk");

    let bound = walk.instructions().find_map(|i| match i {
        IrInstr::Compare {
            pred: CmpPredicate::UnsignedLt,
            rhs: IrValue::Constant(constant),
            ..
        } => constant.as_int(),
        _ => None,
    });
    assert_eq!(bound, Some(8));
}

#[test]
fn test_loop_in_str_walks_bytes() {
    let output = walk_over(str_ty());
    let walk = function_named(&output, "main::walk");

    assert_blocks(walk, &["loop.cond", "loop.body", "loop.incr", "loop.rest"]);
    assert!(bounded_by_count(walk));
}

#[test]
fn test_loop_in_cstring_stops_at_zero_byte() {
    let output = walk_over(cstring_ty());
    let walk = function_named(&output, "main::walk");

    assert_blocks(walk, &["loop.cond", "loop.body", "loop.rest"]);
    let zero = IrValue::from(IrConstant::int(TypeContext::U8, 0));
    let stops_at_zero = walk.instructions().any(|i| match i {
        IrInstr::Compare {
            pred: CmpPredicate::Ne,
            rhs,
            ..
        } => *rhs == zero,
        _ => false,
    });
    assert!(stops_at_zero);
    assert!(!bounded_by_count(walk));
}

#[test]
fn test_loop_in_rejects_integers() {
    let program = program(vec![function(
        "walk",
        vec![arg("values", int_ty(32))],
        None,
        vec![loop_in(entity("values"), "item", vec![])],
    )]);
    let failure = compile_err(&program, &CompileOptions::default());
    assert_eq!(error_code(&failure), "E2001");
}

#[test]
fn test_loop_while_checks_condition_first() {
    let program = program(vec![function(
        "spin",
        vec![arg("running", bool_ty())],
        None,
        vec![loop_while(entity("running"), vec![])],
    )]);
    let output = compile_ok(&program, &CompileOptions::default());

    let spin = function_named(&output, "main::spin");
    assert_blocks(spin, &["while.cond", "while.body", "while.end"]);
    let cond = spin.block_by_label("while.cond").map(|b| &b.terminator);
    assert!(matches!(cond, Some(Some(Terminator::Branch { .. }))));
}

#[test]
fn test_loop_times_keeps_index_in_named_slot() {
    let body = vec![
        local("total", Some(uint_ty(32)), Some(int(0)), true),
        loop_times(
            entity("count"),
            Some("i"),
            vec![update(BinaryOperator::Add, entity("total"), entity("i"))],
        ),
        give(Some(entity("total"))),
    ];
    let program = program(vec![function(
        "triangle",
        vec![arg("count", uint_ty(32))],
        Some(uint_ty(32)),
        body,
    )]);
    let output = compile_ok(&program, &CompileOptions::default());

    let triangle = function_named(&output, "main::triangle");
    let count_ty = triangle.params[0].ty;
    let index_slot = triangle.instructions().any(|i| match i {
        IrInstr::Alloca { ty, name, .. } => *ty == count_ty && name.as_deref() == Some("i"),
        _ => false,
    });
    assert!(index_slot);
    assert!(bounded_by_count(triangle));
    assert_blocks(triangle, &["loop.cond", "loop.body", "loop.incr", "loop.rest"]);
}

// ============================================================================
// String equality
// ============================================================================

#[test]
fn test_different_known_strings_are_unequal() {
    let program = program(vec![function(
        "same",
        vec![],
        Some(bool_ty()),
        vec![give(Some(binary(
            BinaryOperator::Eq,
            string("abc"),
            string("abd"),
        )))],
    )]);
    let output = compile_ok(&program, &CompileOptions::default());

    let same = function_named(&output, "main::same");
    let returned = same.blocks.iter().find_map(|b| match &b.terminator {
        Some(Terminator::Return(Some(value))) => Some(value.clone()),
        _ => None,
    });
    assert_eq!(
        returned,
        Some(IrValue::from(IrConstant::bool(TypeContext::BOOL, false)))
    );
}

#[test]
fn test_variable_strings_compare_at_runtime() {
    let body = vec![
        local("a", None, Some(string("abc")), true),
        local("b", None, Some(string("abd")), true),
        give(Some(binary(BinaryOperator::Eq, entity("a"), entity("b")))),
    ];
    let program = program(vec![function("same", vec![], Some(bool_ty()), body)]);
    let output = compile_ok(&program, &CompileOptions::default());

    let same = function_named(&output, "main::same");
    assert_blocks(
        same,
        &[
            "str.cmp.length",
            "str.cmp.cond",
            "str.cmp.body",
            "str.cmp.next",
            "str.cmp.true",
            "str.cmp.end",
        ],
    );
    let starts_false = same.instructions().any(|i| match i {
        IrInstr::Store { value, .. } => *value == IrConstant::bool(TypeContext::BOOL, false).into(),
        _ => false,
    });
    assert!(starts_false);
}

// ============================================================================
// Integer literals
// ============================================================================

#[test]
fn test_literal_takes_type_from_either_side() {
    for (lhs, rhs) in [(int(1), entity("x")), (entity("x"), int(1))] {
        let program = program(vec![function(
            "next",
            vec![arg("x", int_ty(64))],
            Some(int_ty(64)),
            vec![give(Some(binary(BinaryOperator::Add, lhs, rhs)))],
        )]);
        let output = compile_ok(&program, &CompileOptions::default());

        let next = function_named(&output, "main::next");
        let wide = next.params[0].ty;
        let added = next.instructions().any(|i| match i {
            IrInstr::Binary { lhs, rhs, .. } => lhs.ty() == wide && rhs.ty() == wide,
            _ => false,
        });
        assert!(added);
    }
}

// ============================================================================
// References
// ============================================================================

fn bump() -> qat_engine::Decl {
    function(
        "bump",
        vec![arg("target", reference_ty(int_ty(32), true))],
        None,
        vec![],
    )
}

#[test]
fn test_variable_reference_needs_variable_local() {
    let caller = function(
        "caller",
        vec![],
        None,
        vec![
            local("x", Some(int_ty(32)), Some(int(5)), false),
            eval(call("bump", vec![entity("x")])),
        ],
    );
    let failure = compile_err(&program(vec![bump(), caller]), &CompileOptions::default());
    assert_eq!(error_code(&failure), "E3003");
}

#[test]
fn test_variable_reference_binds_variable_local() {
    let caller = function(
        "caller",
        vec![],
        None,
        vec![
            local("x", Some(int_ty(32)), Some(int(5)), true),
            eval(call("bump", vec![entity("x")])),
        ],
    );
    let output = compile_ok(&program(vec![bump(), caller]), &CompileOptions::default());

    let caller = function_named(&output, "main::caller");
    let slot = caller.instructions().find_map(|i| match i {
        IrInstr::Alloca { dest, name, .. } if name.as_deref() == Some("x") => Some(*dest),
        _ => None,
    });
    let passes_slot = caller.instructions().any(|i| match (i, slot) {
        (IrInstr::Call { args, .. }, Some(slot)) => args.first() == Some(&IrValue::from(slot)),
        _ => false,
    });
    assert!(passes_slot);
}

#[test]
fn test_constant_reference_cannot_become_variable() {
    let relay = function(
        "relay",
        vec![arg("source", reference_ty(int_ty(32), false))],
        None,
        vec![eval(call("bump", vec![entity("source")]))],
    );
    let failure = compile_err(&program(vec![bump(), relay]), &CompileOptions::default());
    assert_eq!(error_code(&failure), "E3003");
}

// ============================================================================
// Maybe locals
// ============================================================================

#[test]
fn test_constant_maybe_without_value_warns() {
    let body = vec![local("slot", Some(maybe_ty(int_ty(32))), None, false)];
    let program = program(vec![function("empty", vec![], None, body)]);
    let output = compile_ok(&program, &CompileOptions::default());
    assert_eq!(warning_codes(&output), ["W0002"]);
}

#[test]
fn test_variable_maybe_without_value_is_fine() {
    let body = vec![local("slot", Some(maybe_ty(int_ty(32))), None, true)];
    let program = program(vec![function("empty", vec![], None, body)]);
    let output = compile_ok(&program, &CompileOptions::default());
    assert!(warning_codes(&output).is_empty());
}

// ============================================================================
// Operators
// ============================================================================

fn counter() -> qat_engine::Decl {
    structure(
        "Counter",
        vec![field("value", int_ty(32))],
        vec![member(
            MemberDeclKind::BinaryOperator {
                op: BinaryOperator::Add,
                is_variation: true,
            },
            vec![arg("amount", int_ty(32))],
            vec![],
        )],
    )
}

fn add_to_counter(is_variable: bool) -> qat_engine::Decl {
    function(
        "add",
        vec![arg("amount", int_ty(32))],
        None,
        vec![
            local("c", None, Some(plain("Counter", vec![int(0)])), is_variable),
            eval(binary(BinaryOperator::Add, entity("c"), entity("amount"))),
        ],
    )
}

#[test]
fn test_variation_operator_needs_variable_operand() {
    let program = program(vec![counter(), add_to_counter(false)]);
    let failure = compile_err(&program, &CompileOptions::default());
    assert_eq!(error_code(&failure), "E3001");
}

#[test]
fn test_variation_operator_calls_member() {
    let program = program(vec![counter(), add_to_counter(true)]);
    let output = compile_ok(&program, &CompileOptions::default());

    let add = function_named(&output, "main::add");
    assert_eq!(
        add.count_instructions(|i| matches!(i, IrInstr::Call { .. })),
        1
    );
}

// ============================================================================
// Variants
// ============================================================================

fn shape() -> qat_engine::Decl {
    mix(
        "Shape",
        vec![("Circle", Some(int_ty(32))), ("Empty", None)],
    )
}

#[test]
fn test_mix_variant_stores_tag_and_payload() {
    let program = program(vec![
        shape(),
        function(
            "circle",
            vec![arg("radius", int_ty(32))],
            Some(named_ty("Shape")),
            vec![give(Some(variant("Shape", "Circle", Some(entity("radius")))))],
        ),
    ]);
    let output = compile_ok(&program, &CompileOptions::default());

    let shape = output.types.find_named("main::Shape").unwrap();
    let circle = function_named(&output, "main::circle");
    let fields: Vec<u32> = circle
        .instructions()
        .filter_map(|i| match i {
            IrInstr::FieldPtr {
                aggregate, index, ..
            } if *aggregate == shape => Some(*index),
            _ => None,
        })
        .collect();
    assert_eq!(fields, [0, 1]);
}

#[test]
fn test_unknown_mix_variant_is_rejected() {
    let program = program(vec![
        shape(),
        function(
            "square",
            vec![],
            Some(named_ty("Shape")),
            vec![give(Some(variant("Shape", "Square", Some(int(4)))))],
        ),
    ]);
    let failure = compile_err(&program, &CompileOptions::default());
    assert_eq!(error_code(&failure), "E2009");
}

#[test]
fn test_mix_variant_without_payload_rejects_value() {
    let program = program(vec![
        shape(),
        function(
            "empty",
            vec![],
            Some(named_ty("Shape")),
            vec![give(Some(variant("Shape", "Empty", Some(int(1)))))],
        ),
    ]);
    let failure = compile_err(&program, &CompileOptions::default());
    assert_eq!(error_code(&failure), "E2009");
}

#[test]
fn test_choice_variant_is_a_constant() {
    let program = program(vec![
        choice("Level", vec![("Low", None), ("High", Some(7))]),
        function(
            "high",
            vec![],
            Some(named_ty("Level")),
            vec![give(Some(variant("Level", "High", None)))],
        ),
    ]);
    let output = compile_ok(&program, &CompileOptions::default());

    let high = function_named(&output, "main::high");
    let returned = high.blocks.iter().find_map(|b| match &b.terminator {
        Some(Terminator::Return(Some(IrValue::Constant(constant)))) => constant.as_int(),
        _ => None,
    });
    assert_eq!(returned, Some(7));
}

#[test]
fn test_choice_variant_rejects_value() {
    let program = program(vec![
        choice("Level", vec![("Low", None), ("High", None)]),
        function(
            "high",
            vec![],
            Some(named_ty("Level")),
            vec![give(Some(variant("Level", "High", Some(int(1)))))],
        ),
    ]);
    let failure = compile_err(&program, &CompileOptions::default());
    assert_eq!(error_code(&failure), "E2009");
}

// ============================================================================
// Constructors and convertors
// ============================================================================

#[test]
fn test_constructor_from_skill_implementation() {
    let pair = structure(
        "Pair",
        vec![field("a", int_ty(32)), field("b", int_ty(32))],
        vec![],
    );
    let constructor = member(
        MemberDeclKind::Constructor,
        vec![member_arg("a"), member_arg("b")],
        vec![],
    );
    let make = function(
        "make",
        vec![],
        None,
        vec![local(
            "p",
            Some(named_ty("Pair")),
            Some(construct("Pair", vec![int(1), int(2)])),
            false,
        )],
    );
    let program = program(vec![pair, do_skill("Pair", vec![constructor]), make]);
    let output = compile_ok(&program, &CompileOptions::default());

    let make = function_named(&output, "main::make");
    let callees: Vec<&str> = make
        .instructions()
        .filter_map(|i| match i {
            IrInstr::Call {
                callee: Callee::Function(id),
                ..
            } => output.ir.get_function(*id).map(|f| f.name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(callees.len(), 1);
    assert!(
        callees[0].starts_with("main::Pair'do"),
        "unexpected callee {:?}",
        callees
    );
}

#[test]
fn test_from_convertor_local_owns_single_slot() {
    let meters = structure(
        "Meters",
        vec![field("value", int_ty(32))],
        vec![member(
            MemberDeclKind::FromConvertor,
            vec![member_arg("value")],
            vec![],
        )],
    );
    let make = function(
        "make",
        vec![],
        None,
        vec![local("m", None, Some(construct("Meters", vec![int(5)])), false)],
    );
    let output = compile_ok(&program(vec![meters, make]), &CompileOptions::default());

    let meters = output.types.find_named("main::Meters").unwrap();
    let make = function_named(&output, "main::make");
    assert_eq!(
        make.count_instructions(|i| matches!(i, IrInstr::Alloca { ty, .. } if *ty == meters)),
        1
    );
    let from = output
        .ir
        .functions
        .iter()
        .find(|f| f.name.starts_with("main::Meters'") && f.name.contains("from"));
    assert!(from.is_some());
}

// ============================================================================
// Printing
// ============================================================================

#[test]
fn test_printed_ir_names_types() {
    let program = program(vec![function(
        "id",
        vec![arg("x", int_ty(64))],
        Some(int_ty(64)),
        vec![give(Some(entity("x")))],
    )]);
    let output = compile_ok(&program, &CompileOptions::default());

    let text = output.ir.with_types(&output.types).to_string();
    assert!(text.contains("fn main::id(%0: i64) -> i64 {"), "{}", text);
    assert!(text.contains("alloca i64 ; x"), "{}", text);
}
