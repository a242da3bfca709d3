//! Declaration pass.
//!
//! Walks a parsed file and populates its root context with symbols: one per
//! top-level declaration, plus member symbols inside class, implementation
//! and namespace contexts. Runs before import registration so that cyclic
//! imports always find a package's names in place.

use log::debug;

use crate::{
    ast::{ClassDefinitionAst, DeclarationAst, ImplementationDefinitionAst, NamespaceDefinitionAst},
    context::CompilerContext,
    error::CompilerError,
    pkg::PackageId,
    sym::{ContextId, ContextOwner, Symbol, SymbolId, SymbolKind, TypeDeclAst},
};

/// Builds symbols for every declaration of a package.
pub fn declare_package(ctx: &mut CompilerContext, package: PackageId) -> Result<(), CompilerError> {
    let ast = ctx.package(package).ast.clone();
    let root = ctx.package(package).root_context;
    debug!("declaring package '{}'", ctx.package(package).path);

    declare_all(ctx, package, root, &ast.declarations)
}

/// Declares a sibling list, grouping same-named functions into overload sets.
pub fn declare_all(ctx: &mut CompilerContext, package: PackageId, scope: ContextId, declarations: &[DeclarationAst]) -> Result<(), CompilerError> {
    let mut seen_functions: Vec<&str> = Vec::new();

    for declaration in declarations {
        if let DeclarationAst::Function(decl) = declaration {
            if seen_functions.contains(&decl.name.as_str()) {
                continue;
            }
            seen_functions.push(&decl.name);

            let group: Vec<_> = declarations
                .iter()
                .filter_map(|candidate| match candidate {
                    DeclarationAst::Function(function) if function.name == decl.name => Some(function.clone()),
                    _ => None,
                })
                .collect();

            if group.len() > 1 {
                declare_overload_set(ctx, scope, group)?;
                continue;
            }
        }
        declare_one(ctx, package, scope, declaration)?;
    }

    Ok(())
}

/// One name, several function bodies: members live detached in the arena,
/// the name binds to the set.
fn declare_overload_set(ctx: &mut CompilerContext, scope: ContextId, group: Vec<std::rc::Rc<crate::ast::FunctionDefinitionAst>>) -> Result<(), CompilerError> {
    let name = group[0].name.clone();
    let span = group[0].span.clone();
    let is_local = group.iter().all(|decl| decl.is_local);
    let context_uuid = ctx.context(scope).uuid;

    let mut members = Vec::new();
    for (overload_index, decl) in group.into_iter().enumerate() {
        let mut member = Symbol::new(&name, SymbolKind::Function(decl.clone()), decl.span.clone());
        member.is_local = is_local;
        member.context = scope;
        let uid = format!("{}_{}${}", context_uuid, name, overload_index);
        members.push(ctx.add_detached_symbol(member, uid));
    }

    let mut set = Symbol::new(&name, SymbolKind::OverloadSet(members), span);
    set.is_local = is_local;
    ctx.add_symbol(scope, set).map(|_| ())
}

fn declare_one(ctx: &mut CompilerContext, package: PackageId, scope: ContextId, declaration: &DeclarationAst) -> Result<(), CompilerError> {
    let result = match declaration {
        DeclarationAst::Function(decl) => {
            let mut symbol = Symbol::new(&decl.name, SymbolKind::Function(decl.clone()), decl.span.clone());
            symbol.is_local = decl.is_local;
            ctx.add_symbol(scope, symbol).map(|_| ())
        }
        DeclarationAst::Class(decl) => declare_class(ctx, package, scope, decl),
        DeclarationAst::Interface(decl) => {
            let mut symbol = Symbol::new(&decl.name, SymbolKind::DeclaredType(TypeDeclAst::Interface(decl.clone())), decl.span.clone());
            symbol.is_local = decl.is_local;
            ctx.add_symbol(scope, symbol).map(|_| ())
        }
        DeclarationAst::Implementation(decl) => declare_implementation(ctx, package, scope, decl),
        DeclarationAst::Variant(decl) => {
            let mut symbol = Symbol::new(&decl.name, SymbolKind::DeclaredType(TypeDeclAst::Variant(decl.clone())), decl.span.clone());
            symbol.is_local = decl.is_local;
            ctx.add_symbol(scope, symbol).map(|_| ())
        }
        DeclarationAst::Enum(decl) => {
            let mut symbol = Symbol::new(&decl.name, SymbolKind::DeclaredType(TypeDeclAst::Enum(decl.clone())), decl.span.clone());
            symbol.is_local = decl.is_local;
            ctx.add_symbol(scope, symbol).map(|_| ())
        }
        DeclarationAst::TypeAlias(decl) => {
            let mut symbol = Symbol::new(&decl.name, SymbolKind::DeclaredType(TypeDeclAst::Alias(decl.clone())), decl.span.clone());
            symbol.is_local = decl.is_local;
            ctx.add_symbol(scope, symbol).map(|_| ())
        }
        DeclarationAst::Namespace(decl) => declare_namespace(ctx, package, scope, decl),
        DeclarationAst::Ffi(decl) => {
            let symbol = Symbol::new(&decl.name, SymbolKind::Ffi(decl.clone()), decl.span.clone());
            ctx.add_symbol(scope, symbol).map(|symbol_id| {
                let ffi_id = ctx.next_ffi_id();
                ctx.ffi_ids.insert(symbol_id, ffi_id);
            })
        }
        DeclarationAst::Global(decl) => {
            let mut symbol = Symbol::new(&decl.name, SymbolKind::Variable, decl.span.clone());
            symbol.is_local = decl.is_local;
            ctx.add_symbol(scope, symbol).map(|_| ())
        }
    };

    match result {
        Ok(()) => Ok(()),
        Err(error) => ctx.report(scope, error),
    }
}

fn declare_class(ctx: &mut CompilerContext, package: PackageId, scope: ContextId, decl: &std::rc::Rc<ClassDefinitionAst>) -> Result<(), CompilerError> {
    let mut symbol = Symbol::new(&decl.name, SymbolKind::DeclaredType(TypeDeclAst::Class(decl.clone())), decl.span.clone());
    symbol.is_local = decl.is_local;
    let class = ctx.add_symbol(scope, symbol)?;

    let members = ctx.create_context(Some(scope), ContextOwner::None, package);
    ctx.context_mut(members).within_class = true;
    ctx.context_mut(members).active_class = Some(class);
    for parameter in &decl.generics {
        let placeholder = crate::types::Ty::Generic { name: parameter.name.clone(), constraints: Vec::new() };
        ctx.context_mut(members).bound_generics.insert(parameter.name.clone(), placeholder);
    }
    ctx.type_contexts.insert(class, members);

    for (attribute_index, attribute) in decl.attributes.iter().enumerate() {
        if attribute.name == "init" {
            return Err(CompilerError::init_name_collision(&attribute.span));
        }
        let attribute_uid = ctx.next_attribute_uid();
        let kind = SymbolKind::ClassAttribute { class, attribute_index, attribute_uid };
        ctx.add_symbol(members, Symbol::new(&attribute.name, kind, attribute.span.clone()))?;
    }

    for (method_index, method) in decl.methods.iter().enumerate() {
        let kind = SymbolKind::ClassMethod { class, method_index, index_in_class: None };
        ctx.add_symbol(members, Symbol::new(&method.function.name, kind, method.function.span.clone()))?;
    }

    if decl.static_block.is_some() {
        ctx.package_mut(package).static_blocks.push(class);
    }

    Ok(())
}

fn declare_implementation(ctx: &mut CompilerContext, package: PackageId, scope: ContextId, decl: &std::rc::Rc<ImplementationDefinitionAst>) -> Result<(), CompilerError> {
    let mut symbol = Symbol::new(&decl.name, SymbolKind::DeclaredType(TypeDeclAst::Implementation(decl.clone())), decl.span.clone());
    symbol.is_local = decl.is_local;
    let implementation = ctx.add_symbol(scope, symbol)?;

    let members = ctx.create_context(Some(scope), ContextOwner::None, package);
    ctx.context_mut(members).within_implementation = true;
    ctx.context_mut(members).active_implementation = Some(implementation);
    ctx.type_contexts.insert(implementation, members);

    for (attribute_index, attribute) in decl.required_attributes.iter().enumerate() {
        let kind = SymbolKind::ImplementationAttribute { implementation, attribute_index };
        ctx.add_symbol(members, Symbol::new(&attribute.name, kind, attribute.span.clone()))?;
    }

    for (method_index, method) in decl.methods.iter().enumerate() {
        let kind = SymbolKind::ImplementationMethod { implementation, method_index };
        ctx.add_symbol(members, Symbol::new(&method.function.name, kind, method.function.span.clone()))?;
    }

    Ok(())
}

fn declare_namespace(ctx: &mut CompilerContext, package: PackageId, scope: ContextId, decl: &std::rc::Rc<NamespaceDefinitionAst>) -> Result<(), CompilerError> {
    let mut symbol = Symbol::new(&decl.name, SymbolKind::Namespace { context: ContextId::UNDEFINED }, decl.span.clone());
    symbol.is_local = decl.is_local;
    let namespace = ctx.add_symbol(scope, symbol)?;

    let body = ctx.create_context(Some(scope), ContextOwner::Namespace(namespace), package);
    ctx.symbol_mut(namespace).kind = SymbolKind::Namespace { context: body };
    ctx.package_mut(package).namespaces.push(decl.clone());

    declare_all(ctx, package, body, &decl.declarations)
}

/// Fetches the namespace body context of a namespace symbol.
pub fn namespace_context(ctx: &CompilerContext, namespace: SymbolId) -> Option<ContextId> {
    match &ctx.symbol(namespace).kind {
        SymbolKind::Namespace { context } => Some(*context),
        _ => None,
    }
}
