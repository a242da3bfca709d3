//! Inference behavior: monomorphization caching, coroutine discipline,
//! operator overloads and hint propagation.

use pretty_assertions::assert_eq;

use crate::{
    ast::{AstIndexer, BinaryOperator, GenericParameterAst, TypeNameAst},
    error::{CompilerError, SemanticError},
    types::{BasicTy, Ty},
};

use super::helpers::{compile_main, AstBuilder};

/// `fn id<T>(x: T) -> T { return x }`
fn generic_identity(builder: &AstBuilder) -> crate::ast::DeclarationAst {
    builder.function_generic(
        "id",
        vec![GenericParameterAst::unconstrained("T")],
        vec![builder.argument("x", TypeNameAst::named("T"))],
        TypeNameAst::named("T"),
        vec![builder.ret(Some(builder.ident("x")))],
    )
}

#[test]
fn same_type_arguments_share_one_concrete_instance() {
    let indexer = AstIndexer::new();
    let builder = AstBuilder::new(indexer.clone(), "main");

    let main_file = builder.file_ast(
        Vec::new(),
        vec![
            generic_identity(&builder),
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
                        vec![TypeNameAst::named("i32")],
                        vec![builder.int(2)],
                    )),
                    builder.ret(Some(builder.int(0))),
                ],
            ),
        ],
        Vec::new(),
    );

    let (ctx, _) = compile_main(&indexer, main_file).unwrap();

    let concrete: Vec<_> = ctx
        .mono_cache
        .iter()
        .filter(|((uid, _), _)| uid.contains("id"))
        .collect();
    assert_eq!(concrete.len(), 1, "one signature, one clone: {concrete:?}");
}

#[test]
fn distinct_type_arguments_produce_distinct_instances() {
    let indexer = AstIndexer::new();
    let builder = AstBuilder::new(indexer.clone(), "main");

    let main_file = builder.file_ast(
        Vec::new(),
        vec![
            generic_identity(&builder),
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

    let (ctx, _) = compile_main(&indexer, main_file).unwrap();

    let uids: Vec<String> = ctx
        .mono_cache
        .iter()
        .filter(|((uid, _), _)| uid.contains("id"))
        .map(|(_, symbol)| ctx.symbol(*symbol).uid.clone())
        .collect();
    assert_eq!(uids.len(), 2);
    assert_ne!(uids[0], uids[1]);
}

#[test]
fn implicit_generic_instantiation_from_argument_types() {
    let indexer = AstIndexer::new();
    let builder = AstBuilder::new(indexer.clone(), "main");

    let main_file = builder.file_ast(
        Vec::new(),
        vec![
            generic_identity(&builder),
            builder.function(
                "main",
                Vec::new(),
                TypeNameAst::named("u32"),
                vec![
                    // No explicit type arguments: T comes from the call site.
                    builder.let_("x", Some(TypeNameAst::named("i64")), builder.int(9)),
                    builder.expr_stmt(builder.call(builder.ident("id"), vec![builder.ident("x")])),
                    builder.ret(Some(builder.int(0))),
                ],
            ),
        ],
        Vec::new(),
    );

    let (ctx, _) = compile_main(&indexer, main_file).unwrap();

    let signatures: Vec<&str> = ctx
        .mono_cache
        .keys()
        .filter(|(uid, _)| uid.contains("id"))
        .map(|(_, signature)| signature.as_str())
        .collect();
    assert_eq!(signatures, vec!["i64"]);
}

#[test]
fn yield_and_return_in_one_function_is_fatal() {
    let indexer = AstIndexer::new();
    let builder = AstBuilder::new(indexer.clone(), "main");

    let main_file = builder.file_ast(
        Vec::new(),
        vec![builder.function(
            "numbers",
            Vec::new(),
            TypeNameAst::named("i32"),
            vec![
                builder.expr_stmt(builder.yield_(Some(builder.int(1)))),
                builder.ret(Some(builder.int(1))),
            ],
        )],
        Vec::new(),
    );

    let error = compile_main(&indexer, main_file).unwrap_err();
    match &error {
        CompilerError::Semantic(SemanticError::ReturnInCoroutine(_)) => {}
        other => panic!("expected ReturnInCoroutine, got {other:?}"),
    }
    assert_eq!(error.to_string(), "Coroutine function cannot have return statements");
}

#[test]
fn yield_marks_the_function_coroutine_callable() {
    let indexer = AstIndexer::new();
    let builder = AstBuilder::new(indexer.clone(), "main");

    let main_file = builder.file_ast(
        Vec::new(),
        vec![builder.function(
            "numbers",
            Vec::new(),
            TypeNameAst::named("void"),
            vec![builder.expr_stmt(builder.yield_(Some(builder.int(1))))],
        )],
        Vec::new(),
    );

    let (ctx, package) = compile_main(&indexer, main_file).unwrap();
    let root = ctx.package(package).root_context;
    let numbers = ctx.context(root).get("numbers").unwrap();
    assert!(ctx.fn_info(numbers).unwrap().is_coroutine_callable());
}

#[test]
fn operator_overload_marks_the_expression() {
    let indexer = AstIndexer::new();
    let builder = AstBuilder::new(indexer.clone(), "main");

    let vec_class = builder.class(
        "Vec",
        vec![builder.attribute("len", TypeNameAst::named("i64"))],
        vec![builder.method(
            "__add__",
            vec![builder.argument("other", TypeNameAst::named("Vec"))],
            TypeNameAst::named("Vec"),
            vec![builder.ret(Some(builder.ident("other")))],
        )],
    );

    let add_expr = builder.binary(BinaryOperator::Add, builder.ident("a"), builder.ident("b"));
    let add_index = add_expr.index;

    let main_file = builder.file_ast(
        Vec::new(),
        vec![
            vec_class,
            builder.function(
                "combine",
                vec![
                    builder.argument("a", TypeNameAst::named("Vec")),
                    builder.argument("b", TypeNameAst::named("Vec")),
                ],
                TypeNameAst::named("Vec"),
                vec![builder.ret(Some(add_expr))],
            ),
        ],
        Vec::new(),
    );

    let (ctx, package) = compile_main(&indexer, main_file).unwrap();

    let root = ctx.package(package).root_context;
    let combine = ctx.context(root).get("combine").unwrap();
    let info = ctx
        .expr_info
        .get(&(combine, add_index))
        .expect("the addition was never inferred");
    assert!(info.overload.is_some(), "__add__ was not resolved as an overload");
    assert_eq!(info.inferred, Ty::Class { symbol: ctx.context(root).get("Vec").unwrap(), name: "Vec".into() });
}

#[test]
fn widening_hint_is_recorded_for_lowering() {
    let indexer = AstIndexer::new();
    let builder = AstBuilder::new(indexer.clone(), "main");

    let narrow = builder.ident("small");
    let narrow_index = narrow.index;

    let main_file = builder.file_ast(
        Vec::new(),
        vec![
            builder.function(
                "wide",
                vec![builder.argument("x", TypeNameAst::named("i64"))],
                TypeNameAst::named("i64"),
                vec![builder.ret(Some(builder.ident("x")))],
            ),
            builder.function(
                "caller",
                vec![builder.argument("small", TypeNameAst::named("i16"))],
                TypeNameAst::named("i64"),
                vec![builder.ret(Some(builder.call(builder.ident("wide"), vec![narrow])))],
            ),
        ],
        Vec::new(),
    );

    let (ctx, package) = compile_main(&indexer, main_file).unwrap();

    let root = ctx.package(package).root_context;
    let caller = ctx.context(root).get("caller").unwrap();
    let info = ctx.expr_info.get(&(caller, narrow_index)).unwrap();
    assert_eq!(info.inferred, Ty::Basic(BasicTy::I16));
    assert_eq!(info.hint, Some(Ty::Basic(BasicTy::I64)));
}

#[test]
fn undefined_symbol_reports_the_name() {
    let indexer = AstIndexer::new();
    let builder = AstBuilder::new(indexer.clone(), "main");

    let main_file = builder.file_ast(
        Vec::new(),
        vec![builder.function(
            "broken",
            Vec::new(),
            TypeNameAst::named("void"),
            vec![builder.expr_stmt(builder.ident("ghost"))],
        )],
        Vec::new(),
    );

    let error = compile_main(&indexer, main_file).unwrap_err();
    assert!(error.to_string().contains("ghost"));
}

#[test]
fn main_with_bool_return_is_rejected() {
    let indexer = AstIndexer::new();
    let builder = AstBuilder::new(indexer.clone(), "main");

    let main_file = builder.file_ast(
        Vec::new(),
        vec![builder.function(
            "main",
            Vec::new(),
            TypeNameAst::named("bool"),
            vec![builder.ret(Some(builder.boolean(true)))],
        )],
        Vec::new(),
    );

    let error = compile_main(&indexer, main_file).unwrap_err();
    assert_eq!(
        error.to_string(),
        "main must return void or u32/i32 or smaller integer"
    );
}

#[test]
fn main_with_argument_vector_requires_args() {
    let indexer = AstIndexer::new();
    let builder = AstBuilder::new(indexer.clone(), "main");

    let main_file = builder.file_ast(
        Vec::new(),
        vec![builder.function(
            "main",
            vec![builder.argument("args", TypeNameAst::array(TypeNameAst::named("String")))],
            TypeNameAst::named("u32"),
            vec![builder.ret(Some(builder.int(0)))],
        )],
        Vec::new(),
    );

    let (ctx, package) = compile_main(&indexer, main_file).unwrap();

    let root = ctx.package(package).root_context;
    let main = ctx.context(root).get("main").unwrap();
    assert!(ctx.fn_info(main).unwrap().requires_args);
}

#[test]
fn reserved_constructs_report_not_yet_implemented() {
    let indexer = AstIndexer::new();
    let builder = AstBuilder::new(indexer.clone(), "main");

    let spawned = builder.expr(crate::ast::ExpressionKind::Spawn(Box::new(builder.int(1))));
    let main_file = builder.file_ast(
        Vec::new(),
        vec![builder.function(
            "main",
            Vec::new(),
            TypeNameAst::named("u32"),
            vec![builder.expr_stmt(spawned), builder.ret(Some(builder.int(0)))],
        )],
        Vec::new(),
    );

    let error = compile_main(&indexer, main_file).unwrap_err();
    assert!(error.to_string().contains("not yet implemented"));
}

#[test]
fn recursive_function_inference_terminates() {
    let indexer = AstIndexer::new();
    let builder = AstBuilder::new(indexer.clone(), "main");

    // fn loop_forever(n: i32) -> i32 { return loop_forever(n) }
    let main_file = builder.file_ast(
        Vec::new(),
        vec![builder.function(
            "loop_forever",
            vec![builder.argument("n", TypeNameAst::named("i32"))],
            TypeNameAst::named("i32"),
            vec![builder.ret(Some(builder.call(builder.ident("loop_forever"), vec![builder.ident("n")])))],
        )],
        Vec::new(),
    );

    let (ctx, package) = compile_main(&indexer, main_file).unwrap();
    let root = ctx.package(package).root_context;
    let function = ctx.context(root).get("loop_forever").unwrap();
    assert!(ctx.fn_info(function).unwrap().inferred);
}
