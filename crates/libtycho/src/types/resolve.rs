//! Type reference resolution and kind reduction.
//!
//! Resolution turns syntactic [`TypeNameAst`] trees into canonical [`Ty`]
//! values against a lexical context. Reduction (`pierce`, `to_kind`,
//! `is_kind`) strips references, aliases and nullables so that pattern
//! matching on types sees through naming.

use indexmap::IndexMap;
use log::debug;

use crate::{
    ast::{TypeNameAst, TypeNameKind},
    context::CompilerContext,
    error::CompilerError,
    span::Span,
    sym::{ContextId, SymbolId, SymbolKind, TypeDeclAst},
    types::{BasicTy, FnTy, StructTy, Ty, TyKind},
};

/// Resolves a syntactic type reference in the given context.
pub fn resolve_type_name(ctx: &mut CompilerContext, scope: ContextId, type_name: &TypeNameAst) -> Result<Ty, CompilerError> {
    resolve_with_bindings(ctx, scope, type_name, &IndexMap::new())
}

/// Resolution with an extra substitution map consulted before name lookup.
/// Alias expansion routes its generic arguments through here.
pub fn resolve_with_bindings(
    ctx: &mut CompilerContext,
    scope: ContextId,
    type_name: &TypeNameAst,
    bindings: &IndexMap<String, Ty>,
) -> Result<Ty, CompilerError> {
    match &type_name.kind {
        TypeNameKind::Named { path, generics } => {
            let arguments = generics
                .iter()
                .map(|argument| resolve_with_bindings(ctx, scope, argument, bindings))
                .collect::<Result<Vec<_>, _>>()?;
            resolve_named(ctx, scope, path, arguments, bindings, &type_name.span)
        }
        TypeNameKind::Array(element) => {
            let element = resolve_with_bindings(ctx, scope, element, bindings)?;
            Ok(Ty::array(element))
        }
        TypeNameKind::Nullable(inner) => {
            let inner = resolve_with_bindings(ctx, scope, inner, bindings)?;
            if !inner.allowed_nullable() {
                return Err(CompilerError::cannot_cast(
                    inner.to_string(),
                    format!("{inner}?"),
                    "this type cannot be made nullable",
                    &type_name.span,
                ));
            }
            Ok(Ty::nullable(inner))
        }
        TypeNameKind::Function { parameters, return_type } => {
            let parameters = parameters
                .iter()
                .map(|parameter| resolve_with_bindings(ctx, scope, parameter, bindings))
                .collect::<Result<Vec<_>, _>>()?;
            let return_type = resolve_with_bindings(ctx, scope, return_type, bindings)?;
            Ok(Ty::Function(FnTy {
                parameters,
                return_type: Box::new(return_type),
                coroutine: false,
            }))
        }
        TypeNameKind::Struct { fields } => {
            let fields = fields
                .iter()
                .map(|(name, field)| {
                    resolve_with_bindings(ctx, scope, field, bindings).map(|ty| (name.clone(), ty))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Ty::Struct(StructTy { fields }))
        }
    }
}

fn resolve_named(
    ctx: &mut CompilerContext,
    scope: ContextId,
    path: &[String],
    arguments: Vec<Ty>,
    bindings: &IndexMap<String, Ty>,
    span: &Span,
) -> Result<Ty, CompilerError> {
    let first = &path[0];

    if path.len() == 1 {
        if let Some(bound) = bindings.get(first).cloned().or_else(|| ctx.lookup_bound_generic(scope, first)) {
            if !arguments.is_empty() {
                return Err(CompilerError::generic_arity(0, arguments.len(), span));
            }
            return Ok(bound);
        }

        if let Some(basic) = BasicTy::from_name(first) {
            if !arguments.is_empty() {
                return Err(CompilerError::generic_arity(0, arguments.len(), span));
            }
            return Ok(Ty::Basic(basic));
        }
    }

    // Walk the dotted path: every hop but the last must be a namespace.
    let mut symbol = match ctx.lookup(scope, first) {
        Some(symbol) => symbol,
        None => {
            let known = ctx.known_type_names();
            return Err(CompilerError::type_not_found(known.iter().map(String::as_str), path.join("."), span));
        }
    };

    for segment in &path[1..] {
        let namespace_context = match &ctx.symbol(symbol).kind {
            SymbolKind::Namespace { context } => *context,
            _ => return Err(CompilerError::import_target_not_namespace(ctx.symbol(symbol).name.clone(), span)),
        };
        symbol = match ctx.context(namespace_context).get(segment) {
            Some(symbol) => symbol,
            None => {
                let known = ctx.known_type_names();
                return Err(CompilerError::type_not_found(known.iter().map(String::as_str), path.join("."), span));
            }
        };
    }

    symbol_to_ty(ctx, symbol, arguments, span)
}

/// Produces the [`Ty`] a declared-type symbol stands for, applying generic
/// arguments when given.
pub fn symbol_to_ty(ctx: &mut CompilerContext, symbol_id: SymbolId, arguments: Vec<Ty>, span: &Span) -> Result<Ty, CompilerError> {
    let symbol = ctx.symbol(symbol_id);
    let name = symbol.name.clone();

    let decl = match &symbol.kind {
        SymbolKind::DeclaredType(decl) => decl.clone(),
        _ => {
            let known = ctx.known_type_names();
            return Err(CompilerError::type_not_found(known.iter().map(String::as_str), name, span));
        }
    };

    match decl {
        TypeDeclAst::Class(class) => {
            if class.generics.len() != arguments.len() {
                return Err(CompilerError::generic_arity(class.generics.len(), arguments.len(), span));
            }
            if arguments.is_empty() {
                return Ok(Ty::Class { symbol: symbol_id, name });
            }
            super::generics::monomorphize_class(ctx, symbol_id, &arguments, span)
        }
        TypeDeclAst::Interface(interface) => {
            if interface.generics.len() != arguments.len() {
                return Err(CompilerError::generic_arity(interface.generics.len(), arguments.len(), span));
            }
            Ok(Ty::Interface { symbol: symbol_id, name: rendered_name(name, &arguments) })
        }
        TypeDeclAst::Implementation(_) => Ok(Ty::Implementation { symbol: symbol_id, name }),
        TypeDeclAst::Variant(variant) => {
            if variant.generics.len() != arguments.len() {
                return Err(CompilerError::generic_arity(variant.generics.len(), arguments.len(), span));
            }
            Ok(Ty::Variant { symbol: symbol_id, name: rendered_name(name, &arguments) })
        }
        TypeDeclAst::Enum(decl) => {
            let backing = decl
                .backing
                .as_ref()
                .and_then(|backing| backing.dotted_path())
                .and_then(|name| BasicTy::from_name(&name))
                .unwrap_or(BasicTy::U32);
            Ok(Ty::Enum { symbol: symbol_id, name, backing })
        }
        TypeDeclAst::Alias(alias) => {
            if alias.generics.len() != arguments.len() {
                return Err(CompilerError::generic_arity(alias.generics.len(), arguments.len(), span));
            }
            let mut alias_bindings = IndexMap::new();
            for (parameter, argument) in alias.generics.iter().zip(arguments) {
                alias_bindings.insert(parameter.name.clone(), argument);
            }
            let alias_scope = ctx.symbol(symbol_id).context;
            debug!("expanding alias '{name}'");
            resolve_with_bindings(ctx, alias_scope, &alias.target, &alias_bindings)
        }
    }
}

fn rendered_name(name: String, arguments: &[Ty]) -> String {
    if arguments.is_empty() {
        return name;
    }
    let list = arguments.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
    format!("{name}<{list}>")
}

/// Resolves a late-bound reference. Idempotent: an already-resolved reference
/// and every non-reference type come back unchanged in name and shape.
pub fn resolve_reference(ctx: &mut CompilerContext, ty: &Ty, span: &Span) -> Result<Ty, CompilerError> {
    match ty {
        Ty::Reference { path, generics, context, resolved } => {
            if let Some(symbol) = resolved {
                return symbol_to_ty(ctx, *symbol, generics.clone(), span);
            }
            resolve_named(ctx, *context, path, generics.clone(), &IndexMap::new(), span)
        }
        other => Ok(other.clone()),
    }
}

/// Reduces a type toward the requested kind, piercing references, nullables
/// and aliases one layer at a time. Returns the first form matching the kind,
/// so asking for `Nullable` still succeeds on a nullable type.
pub fn to_kind(ctx: &mut CompilerContext, ty: &Ty, kind: TyKind, span: &Span) -> Option<Ty> {
    let mut current = ty.clone();
    loop {
        if current.kind() == kind {
            return Some(current);
        }
        current = match current {
            Ty::Reference { .. } => match resolve_reference(ctx, &current, span) {
                Ok(resolved) if resolved != current => resolved,
                _ => return None,
            },
            Ty::Nullable(inner) => *inner,
            _ => return None,
        };
    }
}

/// Like [`to_kind`] without handing the reduced value back.
pub fn is_kind(ctx: &mut CompilerContext, ty: &Ty, kind: TyKind, span: &Span) -> bool {
    to_kind(ctx, ty, kind, span).is_some()
}

/// Strips references and nullable wrappers until a stable form remains.
pub fn pierce(ctx: &mut CompilerContext, ty: &Ty, span: &Span) -> Ty {
    let mut current = ty.clone();
    loop {
        current = match current {
            Ty::Reference { .. } => match resolve_reference(ctx, &current, span) {
                Ok(resolved) if resolved != current => resolved,
                _ => return current,
            },
            Ty::Nullable(inner) => *inner,
            stable => return stable,
        };
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::{
        ast::{FileAst, TypeAliasAst},
        context::CompilerContext,
        file::SourceFile,
        pkg::{Package, PackageId},
        sym::{ContextOwner, Symbol},
    };

    fn test_context() -> (CompilerContext, ContextId) {
        let mut ctx = CompilerContext::default();
        let file = SourceFile::new(vec!["test".into()], String::new());
        let ast = Rc::new(FileAst::new(file));
        let root = ctx.create_context(None, ContextOwner::Package, PackageId(0));
        ctx.packages.push(Package::new(PackageId(0), "test".into(), ast, root));
        ctx.package_paths.insert("test".into(), PackageId(0));
        (ctx, root)
    }

    #[test]
    fn basics_resolve_by_name() {
        let (mut ctx, root) = test_context();
        let ty = resolve_type_name(&mut ctx, root, &TypeNameAst::named("i32")).unwrap();
        assert_eq!(ty, Ty::Basic(BasicTy::I32));

        let ty = resolve_type_name(&mut ctx, root, &TypeNameAst::named("void")).unwrap();
        assert!(ty.is_void());
    }

    #[test]
    fn unknown_name_reports_type_not_found() {
        let (mut ctx, root) = test_context();
        let error = resolve_type_name(&mut ctx, root, &TypeNameAst::named("Missing")).unwrap_err();
        assert!(error.to_string().contains("Missing"));
    }

    #[test]
    fn array_and_nullable_compose() {
        let (mut ctx, root) = test_context();
        let ty = resolve_type_name(&mut ctx, root, &TypeNameAst::nullable(TypeNameAst::array(TypeNameAst::named("u8")))).unwrap();
        assert_eq!(ty, Ty::nullable(Ty::array(Ty::Basic(BasicTy::U8))));
    }

    #[test]
    fn void_cannot_be_nullable() {
        let (mut ctx, root) = test_context();
        let error = resolve_type_name(&mut ctx, root, &TypeNameAst::nullable(TypeNameAst::named("void"))).unwrap_err();
        assert!(error.to_string().contains("cannot cast"));
    }

    #[test]
    fn alias_expansion_substitutes_generics() {
        let (mut ctx, root) = test_context();

        let alias = Rc::new(TypeAliasAst {
            index: crate::ast::AstIndex(0),
            name: "Boxed".into(),
            generics: vec![crate::ast::GenericParameterAst::unconstrained("T")],
            target: TypeNameAst::array(TypeNameAst::named("T")),
            is_local: false,
            span: Span::synthetic(),
        });
        ctx.add_symbol(root, Symbol::new("Boxed", SymbolKind::DeclaredType(TypeDeclAst::Alias(alias)), Span::synthetic())).unwrap();

        let reference = TypeNameAst::new(
            crate::ast::TypeNameKind::Named {
                path: vec!["Boxed".into()],
                generics: vec![TypeNameAst::named("i64")],
            },
            Span::synthetic(),
        );
        let ty = resolve_type_name(&mut ctx, root, &reference).unwrap();
        assert_eq!(ty, Ty::array(Ty::Basic(BasicTy::I64)));
    }

    #[test]
    fn pierce_strips_nullable() {
        let (mut ctx, _) = test_context();
        let ty = Ty::nullable(Ty::Basic(BasicTy::I8));
        let reduced = pierce(&mut ctx, &ty, &Span::synthetic());
        assert_eq!(reduced, Ty::Basic(BasicTy::I8));
        assert!(is_kind(&mut ctx, &ty, TyKind::Basic, &Span::synthetic()));
    }
}
