//! End-to-end programs driven through resolution, inference, lowering and
//! allocation together.

use pretty_assertions::assert_eq;

use crate::{
    ast::{AstIndexer, GenericParameterAst, TypeNameAst},
    ir::{allocate, lower_package, Instr},
};

use super::helpers::{compile_main, AstBuilder};

#[test]
fn two_generic_instances_call_two_distinct_targets() {
    let indexer = AstIndexer::new();
    let builder = AstBuilder::new(indexer.clone(), "main");

    let main_file = builder.file_ast(
        Vec::new(),
        vec![
            builder.function_generic(
                "id",
                vec![GenericParameterAst::unconstrained("T")],
                vec![builder.argument("x", TypeNameAst::named("T"))],
                TypeNameAst::named("T"),
                vec![builder.ret(Some(builder.ident("x")))],
            ),
            builder.function(
                "main",
                Vec::new(),
                TypeNameAst::named("u32"),
                vec![
                    builder.expr_stmt(builder.call_generic(
                        builder.ident("id"),
                        vec![TypeNameAst::named("i32")],
                        vec![builder.int(1)],
                    )),
                    builder.expr_stmt(builder.call_generic(
                        builder.ident("id"),
                        vec![TypeNameAst::named("f32")],
                        vec![builder.float(1.0)],
                    )),
                    builder.ret(Some(builder.int(0))),
                ],
            ),
        ],
        Vec::new(),
    );

    let (mut ctx, package) = compile_main(&indexer, main_file).unwrap();
    let module = lower_package(&mut ctx, package).unwrap();

    let main = module.functions.iter().find(|function| function.name == "main").unwrap();
    let targets: Vec<&str> = main
        .instrs
        .iter()
        .filter_map(|instr| match instr {
            Instr::Call { target_uid, .. } => Some(target_uid.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(targets.len(), 2, "two instantiations, two direct calls");
    assert_ne!(targets[0], targets[1], "each concrete instance has its own entry");

    // Both targets exist as lowered functions.
    let entries = module.entry_points();
    assert!(entries.contains_key(targets[0]));
    assert!(entries.contains_key(targets[1]));
}

#[test]
fn plain_main_compiles_and_allocates() {
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

    for function in &module.functions {
        let allocation = allocate(function);
        assert_eq!(allocation.spill_slots, 0, "tiny bodies never spill: {}", function.name);
    }

    let root = ctx.package(package).root_context;
    let main = ctx.context(root).get("main").unwrap();
    assert!(!ctx.fn_info(main).unwrap().requires_args);
}

#[test]
fn class_construction_builds_the_method_table() {
    let indexer = AstIndexer::new();
    let builder = AstBuilder::new(indexer.clone(), "main");

    let counter = builder.class(
        "Counter",
        vec![builder.attribute("value", TypeNameAst::named("i64"))],
        vec![
            builder.method("init", Vec::new(), TypeNameAst::named("void"), Vec::new()),
            builder.method("bump", Vec::new(), TypeNameAst::named("void"), Vec::new()),
        ],
    );

    let main_file = builder.file_ast(
        Vec::new(),
        vec![
            counter,
            builder.function(
                "main",
                Vec::new(),
                TypeNameAst::named("u32"),
                vec![
                    builder.let_(
                        "c",
                        None,
                        builder.expr(crate::ast::ExpressionKind::New {
                            type_name: TypeNameAst::named("Counter"),
                            arguments: Vec::new(),
                        }),
                    ),
                    builder.expr_stmt(builder.call(builder.member(builder.ident("c"), "bump"), Vec::new())),
                    builder.ret(Some(builder.int(0))),
                ],
            ),
        ],
        Vec::new(),
    );

    let (mut ctx, package) = compile_main(&indexer, main_file).unwrap();

    // Method indices are assigned and stable.
    let root = ctx.package(package).root_context;
    let class = ctx.context(root).get("Counter").unwrap();
    let layout = ctx.class_layouts.get(&class).unwrap().clone();
    assert_eq!(layout.methods.len(), 2);
    for (position, method) in layout.methods.iter().enumerate() {
        match ctx.symbol(*method).kind {
            crate::sym::SymbolKind::ClassMethod { index_in_class, .. } => {
                assert_eq!(index_in_class, Some(position));
            }
            _ => panic!("method table holds a non-method"),
        }
    }

    let module = lower_package(&mut ctx, package).unwrap();
    let main = module.functions.iter().find(|function| function.name == "main").unwrap();

    // Allocation registers the fields and populates both table slots.
    assert!(main.instrs.iter().any(|instr| matches!(
        instr,
        Instr::CAlloc { methods: 2, data_size: 8, .. }
    )));
    assert!(main.instrs.iter().any(|instr| matches!(instr, Instr::CRegField { index: 0, offset: 0, .. })));
    let stored_methods = main.instrs.iter().filter(|instr| matches!(instr, Instr::CStoreM { .. })).count();
    assert_eq!(stored_methods, 2);

    // The instance call dispatches through the table.
    assert!(main.instrs.iter().any(|instr| matches!(instr, Instr::CLoadM { index: 1, .. })));
    assert!(main.instrs.iter().any(|instr| matches!(instr, Instr::CallPtr { .. })));
}

#[test]
fn match_on_variant_selects_by_tag() {
    let indexer = AstIndexer::new();
    let builder = AstBuilder::new(indexer.clone(), "main");

    let variant = builder.variant(
        "Shape",
        vec![
            ("Dot", Vec::new()),
            ("Line", vec![builder.argument("len", TypeNameAst::named("i32"))]),
        ],
    );

    let scrutinee = builder.ident("shape");
    let match_expr = builder.expr(crate::ast::ExpressionKind::Match {
        scrutinee: Box::new(scrutinee),
        arms: vec![
            crate::ast::MatchArmAst {
                pattern: crate::ast::MatchPatternAst::VariantCase {
                    path: vec!["Shape".into(), "Line".into()],
                    bindings: vec!["len".into()],
                },
                value: builder.ident("len"),
                span: builder.span(),
            },
            crate::ast::MatchArmAst {
                pattern: crate::ast::MatchPatternAst::Wildcard,
                value: builder.int(0),
                span: builder.span(),
            },
        ],
    });

    let main_file = builder.file_ast(
        Vec::new(),
        vec![
            variant,
            builder.function(
                "measure",
                vec![builder.argument("shape", TypeNameAst::named("Shape"))],
                TypeNameAst::named("i32"),
                vec![builder.ret(Some(match_expr))],
            ),
        ],
        Vec::new(),
    );

    let (mut ctx, package) = compile_main(&indexer, main_file).unwrap();
    let module = lower_package(&mut ctx, package).unwrap();
    let measure = module.functions.iter().find(|function| function.name == "measure").unwrap();

    // The tag is read once and compared against the case id.
    assert!(measure.instrs.iter().any(|instr| matches!(
        instr,
        Instr::SLoadF { ty: crate::ir::IrType::U16, index: 0, .. }
    )));
    assert!(measure.instrs.iter().any(|instr| matches!(
        instr,
        Instr::JumpCmp { ty: crate::ir::IrType::U16, .. }
    )));
}

#[test]
fn explicit_narrowing_cast_emits_dcast() {
    let indexer = AstIndexer::new();
    let builder = AstBuilder::new(indexer.clone(), "main");

    let cast = builder.expr(crate::ast::ExpressionKind::Cast {
        value: Box::new(builder.ident("big")),
        target: TypeNameAst::named("i16"),
        safe: false,
    });

    let main_file = builder.file_ast(
        Vec::new(),
        vec![builder.function(
            "shrink",
            vec![builder.argument("big", TypeNameAst::named("i64"))],
            TypeNameAst::named("i16"),
            vec![builder.ret(Some(cast))],
        )],
        Vec::new(),
    );

    let (mut ctx, package) = compile_main(&indexer, main_file).unwrap();
    let module = lower_package(&mut ctx, package).unwrap();
    let shrink = module.functions.iter().find(|function| function.name == "shrink").unwrap();

    assert!(shrink.instrs.iter().any(|instr| matches!(
        instr,
        Instr::Cast { step, .. }
            if step.op == crate::types::CastOp::DcastI
                && step.from == crate::types::BasicTy::I64
                && step.to == crate::types::BasicTy::I16
    )));
}
