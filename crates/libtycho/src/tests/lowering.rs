//! Lowering behavior: instruction families, conversions and determinism.

use pretty_assertions::assert_eq;

use crate::{
    ast::{AstIndexer, BinaryOperator, TypeNameAst, TypeNameKind},
    ir::{lower_package, Instr, IrType},
    span::Span,
    types::BasicTy,
};

use super::helpers::{compile_main, AstBuilder};

fn function_ir<'m>(module: &'m crate::ir::IrModule, name: &str) -> &'m crate::ir::FunctionIr {
    module
        .functions
        .iter()
        .find(|function| function.name == name)
        .unwrap_or_else(|| panic!("no function named '{name}' in {module}"))
}

#[test]
fn addition_lowers_to_add_and_ret() {
    let indexer = AstIndexer::new();
    let builder = AstBuilder::new(indexer.clone(), "main");

    let main_file = builder.file_ast(
        Vec::new(),
        vec![
            builder.function(
                "add",
                vec![
                    builder.argument("x", TypeNameAst::named("i32")),
                    builder.argument("y", TypeNameAst::named("i32")),
                ],
                TypeNameAst::named("i32"),
                vec![builder.ret(Some(builder.binary(
                    BinaryOperator::Add,
                    builder.ident("x"),
                    builder.ident("y"),
                )))],
            ),
            builder.function(
                "main",
                Vec::new(),
                TypeNameAst::named("u32"),
                vec![builder.ret(Some(builder.int(0)))],
            ),
        ],
        Vec::new(),
    );

    let (mut ctx, package) = compile_main(&indexer, main_file).unwrap();
    let module = lower_package(&mut ctx, package).unwrap();

    let add = function_ir(&module, "add");
    let position = add
        .instrs
        .iter()
        .position(|instr| matches!(instr, Instr::Binary { ty: IrType::I32, op: crate::ir::BinIrOp::Add, .. }))
        .expect("no add_i32 in the body");
    let result = match &add.instrs[position] {
        Instr::Binary { dst, .. } => *dst,
        _ => unreachable!(),
    };
    assert!(
        add.instrs[position..]
            .iter()
            .any(|instr| matches!(instr, Instr::Ret { ty: IrType::I32, src } if *src == result)),
        "the sum is not the returned temporary: {add}"
    );
}

#[test]
fn variant_construction_emits_tag_and_fields() {
    let indexer = AstIndexer::new();
    let builder = AstBuilder::new(indexer.clone(), "main");

    let variant = builder.variant(
        "V",
        vec![
            ("A", vec![builder.argument("x", TypeNameAst::named("i32"))]),
            ("B", Vec::new()),
        ],
    );

    let main_file = builder.file_ast(
        Vec::new(),
        vec![
            variant,
            builder.function(
                "main",
                Vec::new(),
                TypeNameAst::named("u32"),
                vec![
                    builder.let_(
                        "v",
                        None,
                        builder.call(builder.member(builder.ident("V"), "A"), vec![builder.int(5)]),
                    ),
                    builder.ret(Some(builder.int(0))),
                ],
            ),
        ],
        Vec::new(),
    );

    let (mut ctx, package) = compile_main(&indexer, main_file).unwrap();
    let module = lower_package(&mut ctx, package).unwrap();
    let main = function_ir(&module, "main");

    // s_alloc with two fields: the u16 tag at offset 0, the i32 at offset 2.
    let alloc = main
        .instrs
        .iter()
        .position(|instr| matches!(instr, Instr::SAlloc { fields: 2, total_size: 6, .. }))
        .expect("variant allocation missing");
    assert!(matches!(main.instrs[alloc + 1], Instr::SRegField { index: 0, offset: 0, .. }));
    assert!(matches!(main.instrs[alloc + 2], Instr::SRegField { index: 1, offset: 2, .. }));

    assert!(main.instrs.iter().any(|instr| matches!(
        instr,
        Instr::Const { ty: IrType::U16, .. }
    )));
    assert!(main.instrs.iter().any(|instr| matches!(
        instr,
        Instr::SStoreF { ty: IrType::U16, index: 0, .. }
    )));
    assert!(main.instrs.iter().any(|instr| matches!(
        instr,
        Instr::SStoreF { ty: IrType::I32, index: 1, .. }
    )));
}

#[test]
fn permuted_struct_assignment_emits_swap_prologue() {
    let indexer = AstIndexer::new();
    let builder = AstBuilder::new(indexer.clone(), "main");

    let shape_a = TypeNameAst::new(
        TypeNameKind::Struct {
            fields: vec![
                ("x".into(), TypeNameAst::named("i32")),
                ("y".into(), TypeNameAst::named("f64")),
            ],
        },
        Span::synthetic(),
    );
    let shape_b = TypeNameAst::new(
        TypeNameKind::Struct {
            fields: vec![
                ("y".into(), TypeNameAst::named("f64")),
                ("x".into(), TypeNameAst::named("i32")),
            ],
        },
        Span::synthetic(),
    );

    let main_file = builder.file_ast(
        Vec::new(),
        vec![
            builder.type_alias("First", shape_a),
            builder.type_alias("Second", shape_b),
            builder.function(
                "rearrange",
                vec![builder.argument("a", TypeNameAst::named("First"))],
                TypeNameAst::named("void"),
                vec![builder.let_("b", Some(TypeNameAst::named("Second")), builder.ident("a"))],
            ),
        ],
        Vec::new(),
    );

    let (mut ctx, package) = compile_main(&indexer, main_file).unwrap();
    let module = lower_package(&mut ctx, package).unwrap();
    let rearrange = function_ir(&module, "rearrange");

    // A fresh struct is allocated in destination order and both fields are
    // copied across.
    let alloc = rearrange
        .instrs
        .iter()
        .position(|instr| matches!(instr, Instr::SAlloc { fields: 2, total_size: 12, .. }))
        .expect("no swap prologue allocation");
    assert!(matches!(rearrange.instrs[alloc + 1], Instr::SRegField { index: 0, offset: 0, .. }));
    assert!(matches!(rearrange.instrs[alloc + 2], Instr::SRegField { index: 1, offset: 8, .. }));

    let loads = rearrange.instrs.iter().filter(|instr| matches!(instr, Instr::SLoadF { .. })).count();
    let stores = rearrange.instrs.iter().filter(|instr| matches!(instr, Instr::SStoreF { .. })).count();
    assert_eq!(loads, 2);
    assert_eq!(stores, 2);
}

#[test]
fn widening_call_argument_emits_upcast_to_the_hinted_type() {
    let indexer = AstIndexer::new();
    let builder = AstBuilder::new(indexer.clone(), "main");

    let main_file = builder.file_ast(
        Vec::new(),
        vec![
            builder.function(
                "wide",
                vec![builder.argument("x", TypeNameAst::named("i64"))],
                TypeNameAst::named("void"),
                Vec::new(),
            ),
            builder.function(
                "caller",
                vec![builder.argument("small", TypeNameAst::named("i16"))],
                TypeNameAst::named("void"),
                vec![builder.expr_stmt(builder.call(builder.ident("wide"), vec![builder.ident("small")]))],
            ),
        ],
        Vec::new(),
    );

    let (mut ctx, package) = compile_main(&indexer, main_file).unwrap();
    let module = lower_package(&mut ctx, package).unwrap();
    let caller = function_ir(&module, "caller");

    // The final temporary feeding the call slot is in the hinted type.
    let cast = caller
        .instrs
        .iter()
        .find_map(|instr| match instr {
            Instr::Cast { step, dst, .. } => Some((*step, *dst)),
            _ => None,
        })
        .expect("no widening cast emitted");
    assert_eq!(cast.0.from, BasicTy::I16);
    assert_eq!(cast.0.to, BasicTy::I64);
    assert!(caller.instrs.iter().any(|instr| matches!(
        instr,
        Instr::FnSetReg { ty: IrType::I64, slot: 0, src } if *src == cast.1
    )));
}

#[test]
fn lambda_capture_emits_closure_alloc_and_env_push() {
    let indexer = AstIndexer::new();
    let builder = AstBuilder::new(indexer.clone(), "main");

    let lambda = builder.expr(crate::ast::ExpressionKind::Lambda {
        arguments: Vec::new(),
        return_type: Some(TypeNameAst::named("i64")),
        body: vec![builder.ret(Some(builder.ident("captured")))],
    });

    let main_file = builder.file_ast(
        Vec::new(),
        vec![builder.function(
            "outer",
            Vec::new(),
            TypeNameAst::named("void"),
            vec![
                builder.let_("captured", Some(TypeNameAst::named("i64")), builder.int(7)),
                builder.let_("closure", None, lambda),
            ],
        )],
        Vec::new(),
    );

    let (mut ctx, package) = compile_main(&indexer, main_file).unwrap();
    let module = lower_package(&mut ctx, package).unwrap();
    let outer = function_ir(&module, "outer");

    let alloc = outer
        .instrs
        .iter()
        .position(|instr| matches!(instr, Instr::ClosureAlloc { captures: 1, .. }))
        .expect("closure allocation with one capture missing");
    assert!(
        outer.instrs[alloc..]
            .iter()
            .any(|instr| matches!(instr, Instr::ClosurePushEnv { ty: IrType::I64, .. })),
        "capture was not pushed: {outer}"
    );

    // The lambda body itself was lowered as a function.
    assert!(module.functions.iter().any(|function| function.name.starts_with("$lambda_")));
}

#[test]
fn coroutine_function_yields_and_finishes() {
    let indexer = AstIndexer::new();
    let builder = AstBuilder::new(indexer.clone(), "main");

    let main_file = builder.file_ast(
        Vec::new(),
        vec![builder.function(
            "ticker",
            Vec::new(),
            TypeNameAst::named("void"),
            vec![builder.expr_stmt(builder.yield_(Some(builder.int(1))))],
        )],
        Vec::new(),
    );

    let (mut ctx, package) = compile_main(&indexer, main_file).unwrap();
    let module = lower_package(&mut ctx, package).unwrap();
    let ticker = function_ir(&module, "ticker");

    assert!(ticker.instrs.iter().any(|instr| matches!(instr, Instr::CoroutineYield { src: Some(_) })));
    assert_eq!(ticker.instrs.last(), Some(&Instr::CoroutineFinish));
}

#[test]
fn while_loop_shape_is_label_test_body_jump() {
    let indexer = AstIndexer::new();
    let builder = AstBuilder::new(indexer.clone(), "main");

    let condition = builder.binary(BinaryOperator::Less, builder.ident("i"), builder.int(10));
    let body = vec![builder.expr_stmt(builder.assign(
        builder.ident("i"),
        builder.binary(BinaryOperator::Add, builder.ident("i"), builder.int(1)),
    ))];

    let main_file = builder.file_ast(
        Vec::new(),
        vec![builder.function(
            "count",
            Vec::new(),
            TypeNameAst::named("void"),
            vec![
                builder.let_("i", Some(TypeNameAst::named("i32")), builder.int(0)),
                builder.stmt(crate::ast::StatementKind::While { condition, body }),
            ],
        )],
        Vec::new(),
    );

    let (mut ctx, package) = compile_main(&indexer, main_file).unwrap();
    let module = lower_package(&mut ctx, package).unwrap();
    let count = function_ir(&module, "count");

    let labels = count.instrs.iter().filter(|instr| instr.is_label()).count();
    assert!(labels >= 3, "entry, loop head and loop exit expected: {count}");
    assert!(count.instrs.iter().any(|instr| matches!(instr, Instr::Jump { .. })));
    assert!(count.instrs.iter().any(|instr| matches!(instr, Instr::JumpCmp { .. })));
}

#[test]
fn entry_label_is_the_context_uuid() {
    let indexer = AstIndexer::new();
    let builder = AstBuilder::new(indexer.clone(), "main");

    let main_file = builder.file_ast(
        Vec::new(),
        vec![builder.function(
            "main",
            Vec::new(),
            TypeNameAst::named("u32"),
            vec![builder.ret(Some(builder.int(0)))],
        )],
        Vec::new(),
    );

    let (mut ctx, package) = compile_main(&indexer, main_file).unwrap();
    let module = lower_package(&mut ctx, package).unwrap();
    let main = function_ir(&module, "main");

    assert_eq!(main.instrs.first(), Some(&Instr::Label { name: main.uid.clone() }));
    assert!(module.entry_points().contains_key(&main.uid));
}

#[test]
fn source_maps_wrap_statements() {
    let indexer = AstIndexer::new();
    let builder = AstBuilder::new(indexer.clone(), "main");

    let main_file = builder.file_ast(
        Vec::new(),
        vec![builder.function(
            "main",
            Vec::new(),
            TypeNameAst::named("u32"),
            vec![builder.ret(Some(builder.int(0)))],
        )],
        Vec::new(),
    );

    let (mut ctx, package) = compile_main(&indexer, main_file).unwrap();
    let module = lower_package(&mut ctx, package).unwrap();
    let main = function_ir(&module, "main");

    let pushes = main.instrs.iter().filter(|instr| matches!(instr, Instr::SrcMapPush { .. })).count();
    let pops = main.instrs.iter().filter(|instr| matches!(instr, Instr::SrcMapPop)).count();
    assert_eq!(pushes, pops);
    assert!(pushes > 0);
    assert!(module.source_map().contains(":main"));
}

#[test]
fn lowering_twice_produces_identical_ir_text() {
    let build_and_lower = || {
        let indexer = AstIndexer::new();
        let builder = AstBuilder::new(indexer.clone(), "main");
        let main_file = builder.file_ast(
            Vec::new(),
            vec![
                builder.function(
                    "add",
                    vec![
                        builder.argument("x", TypeNameAst::named("i32")),
                        builder.argument("y", TypeNameAst::named("i32")),
                    ],
                    TypeNameAst::named("i32"),
                    vec![builder.ret(Some(builder.binary(
                        BinaryOperator::Add,
                        builder.ident("x"),
                        builder.ident("y"),
                    )))],
                ),
                builder.function(
                    "main",
                    Vec::new(),
                    TypeNameAst::named("u32"),
                    vec![
                        builder.expr_stmt(builder.call(builder.ident("add"), vec![builder.int(1), builder.int(2)])),
                        builder.ret(Some(builder.int(0))),
                    ],
                ),
            ],
            Vec::new(),
        );
        let (mut ctx, package) = compile_main(&indexer, main_file).unwrap();
        lower_package(&mut ctx, package).unwrap().to_string()
    };

    assert_eq!(build_and_lower(), build_and_lower());
}
