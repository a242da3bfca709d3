//! Import resolution behavior.

use pretty_assertions::assert_eq;

use crate::{
    ast::{AstIndexer, TypeNameAst},
    sym::SymbolKind,
};

use super::helpers::{compile_project, AstBuilder};

#[test]
fn two_importers_share_one_package() {
    let indexer = AstIndexer::new();

    let lib = AstBuilder::new(indexer.clone(), "lib");
    let lib_file = lib.file_ast(Vec::new(), vec![lib.class("Shared", Vec::new(), Vec::new())], Vec::new());

    let first = AstBuilder::new(indexer.clone(), "first");
    let first_file = first.file_ast(vec![first.import(&["lib"], "Shared", None)], Vec::new(), Vec::new());

    let second = AstBuilder::new(indexer.clone(), "main");
    let second_file = second.file_ast(
        vec![
            second.import(&["first"], "*", None),
            second.import(&["lib"], "Shared", Some("Also")),
        ],
        Vec::new(),
        Vec::new(),
    );

    let (ctx, _) = compile_project(
        &indexer,
        vec![("lib.tc", lib_file), ("first.tc", first_file), ("main.tc", second_file)],
        &["main"],
    )
    .unwrap();

    // lib.tc was resolved through two import paths but exists exactly once.
    let lib_packages = ctx
        .package_paths
        .keys()
        .filter(|path| path.as_str() == "lib.tc")
        .count();
    assert_eq!(lib_packages, 1);
}

#[test]
fn duplicate_import_is_a_noop() {
    let indexer = AstIndexer::new();

    let lib = AstBuilder::new(indexer.clone(), "lib");
    let lib_file = lib.file_ast(Vec::new(), vec![lib.class("Thing", Vec::new(), Vec::new())], Vec::new());

    let main = AstBuilder::new(indexer.clone(), "main");
    let main_file = main.file_ast(
        vec![
            main.import(&["lib"], "Thing", None),
            main.import(&["lib"], "Thing", None),
        ],
        Vec::new(),
        Vec::new(),
    );

    let (ctx, package) = compile_project(&indexer, vec![("lib.tc", lib_file), ("main.tc", main_file)], &["main"]).unwrap();

    let root = ctx.package(package).root_context;
    assert!(ctx.context(root).externals.contains_key("Thing"));
    // The second directive was deduplicated, not re-registered.
    assert_eq!(
        ctx.package(package)
            .imports_seen
            .iter()
            .filter(|(base, name, _)| base == "lib" && name == "Thing")
            .count(),
        1
    );
}

#[test]
fn aliased_reimport_is_allowed() {
    let indexer = AstIndexer::new();

    let lib = AstBuilder::new(indexer.clone(), "lib");
    let lib_file = lib.file_ast(Vec::new(), vec![lib.class("Thing", Vec::new(), Vec::new())], Vec::new());

    let main = AstBuilder::new(indexer.clone(), "main");
    let main_file = main.file_ast(
        vec![
            main.import(&["lib"], "Thing", Some("t1")),
            main.import(&["lib"], "Thing", Some("t2")),
        ],
        Vec::new(),
        Vec::new(),
    );

    let (ctx, package) = compile_project(&indexer, vec![("lib.tc", lib_file), ("main.tc", main_file)], &["main"]).unwrap();

    let root = ctx.package(package).root_context;
    assert!(ctx.context(root).externals.contains_key("t1"));
    assert!(ctx.context(root).externals.contains_key("t2"));
    assert!(!ctx.context(root).externals.contains_key("Thing"));
}

#[test]
fn star_import_binds_every_exported_symbol() {
    let indexer = AstIndexer::new();

    let lib = AstBuilder::new(indexer.clone(), "lib");
    let mut exported = lib.class("Exported", Vec::new(), Vec::new());
    let hidden = {
        let mut decl = lib.class("Hidden", Vec::new(), Vec::new());
        if let crate::ast::DeclarationAst::Class(class) = &mut decl {
            let inner = std::rc::Rc::get_mut(class).unwrap();
            inner.is_local = true;
        }
        decl
    };
    if let crate::ast::DeclarationAst::Class(class) = &mut exported {
        std::rc::Rc::get_mut(class).unwrap().is_local = false;
    }
    let lib_file = lib.file_ast(
        Vec::new(),
        vec![
            exported,
            hidden,
            lib.function("helper", Vec::new(), TypeNameAst::named("void"), Vec::new()),
        ],
        Vec::new(),
    );

    let main = AstBuilder::new(indexer.clone(), "main");
    let main_file = main.file_ast(vec![main.import(&["lib"], "*", None)], Vec::new(), Vec::new());

    let (ctx, package) = compile_project(&indexer, vec![("lib.tc", lib_file), ("main.tc", main_file)], &["main"]).unwrap();

    let root = ctx.package(package).root_context;
    assert!(ctx.context(root).externals.contains_key("Exported"));
    assert!(ctx.context(root).externals.contains_key("helper"));
    assert!(!ctx.context(root).externals.contains_key("Hidden"));
}

#[test]
fn importing_a_local_symbol_is_fatal() {
    let indexer = AstIndexer::new();

    let lib = AstBuilder::new(indexer.clone(), "lib");
    let hidden = {
        let mut decl = lib.class("Hidden", Vec::new(), Vec::new());
        if let crate::ast::DeclarationAst::Class(class) = &mut decl {
            std::rc::Rc::get_mut(class).unwrap().is_local = true;
        }
        decl
    };
    let lib_file = lib.file_ast(Vec::new(), vec![hidden], Vec::new());

    let main = AstBuilder::new(indexer.clone(), "main");
    let main_file = main.file_ast(vec![main.import(&["lib"], "Hidden", None)], Vec::new(), Vec::new());

    let error = compile_project(&indexer, vec![("lib.tc", lib_file), ("main.tc", main_file)], &["main"]).unwrap_err();
    assert!(error.to_string().contains("Hidden"));
}

#[test]
fn missing_import_path_fails() {
    let indexer = AstIndexer::new();
    let main = AstBuilder::new(indexer.clone(), "main");
    let main_file = main.file_ast(vec![main.import(&["nowhere"], "Thing", None)], Vec::new(), Vec::new());

    let error = compile_project(&indexer, vec![("main.tc", main_file)], &["main"]).unwrap_err();
    assert!(error.to_string().contains("nowhere"));
}

#[test]
fn cyclic_imports_do_not_loop() {
    let indexer = AstIndexer::new();

    let a = AstBuilder::new(indexer.clone(), "a");
    let a_file = a.file_ast(
        vec![a.import(&["b"], "B", None)],
        vec![a.class("A", Vec::new(), Vec::new())],
        Vec::new(),
    );

    let b = AstBuilder::new(indexer.clone(), "b");
    let b_file = b.file_ast(
        vec![b.import(&["a"], "A", None)],
        vec![b.class("B", Vec::new(), Vec::new())],
        Vec::new(),
    );

    let (ctx, _) = compile_project(&indexer, vec![("a.tc", a_file), ("b.tc", b_file)], &["a"]).unwrap();
    assert!(ctx.package_paths.contains_key("a.tc"));
    assert!(ctx.package_paths.contains_key("b.tc"));
}

#[test]
fn builtin_imports_are_injected() {
    let indexer = AstIndexer::new();
    let main = AstBuilder::new(indexer.clone(), "main");
    let main_file = main.file_ast(Vec::new(), Vec::new(), Vec::new());

    let (ctx, package) = compile_project(&indexer, vec![("main.tc", main_file)], &["main"]).unwrap();

    let root = ctx.package(package).root_context;
    let string = ctx.context(root).get("String").expect("String was not injected");
    assert!(matches!(ctx.symbol(string).kind, SymbolKind::DeclaredType(_)));
    assert!(ctx.context(root).externals.contains_key("ArrayIterator"));
    assert!(ctx.context(root).externals.contains_key("toArgVector"));
}

#[test]
fn alias_is_bound_instead_of_original_name() {
    let indexer = AstIndexer::new();

    let lib = AstBuilder::new(indexer.clone(), "lib");
    let lib_file = lib.file_ast(Vec::new(), vec![lib.class("Original", Vec::new(), Vec::new())], Vec::new());

    let main = AstBuilder::new(indexer.clone(), "main");
    let main_file = main.file_ast(vec![main.import(&["lib"], "Original", Some("Renamed"))], Vec::new(), Vec::new());

    let (ctx, package) = compile_project(&indexer, vec![("lib.tc", lib_file), ("main.tc", main_file)], &["main"]).unwrap();

    let root = ctx.package(package).root_context;
    assert!(ctx.context(root).externals.contains_key("Renamed"));
    assert!(!ctx.context(root).externals.contains_key("Original"));
}
