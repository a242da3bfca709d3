//! Generic substitution, extraction and monomorphization support.
//!
//! Concrete instances of generic symbols are cached on the compiler under a
//! canonical signature derived solely from the ordered type-argument list, so
//! two requests with the same arguments share one clone.

use indexmap::IndexMap;
use log::debug;

use crate::{
    context::CompilerContext,
    error::CompilerError,
    span::Span,
    sym::{ContextOwner, Symbol, SymbolId, SymbolKind, TypeDeclAst},
    types::{FnTy, StructTy, Ty},
};

/// The canonical, order-sensitive signature of a type-argument list.
pub fn signature_of(arguments: &[Ty]) -> String {
    arguments.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
}

/// Deep-copies a type, replacing generic parameters by name.
pub fn substitute(ty: &Ty, map: &IndexMap<String, Ty>) -> Ty {
    match ty {
        Ty::Generic { name, .. } => map.get(name).cloned().unwrap_or_else(|| ty.clone()),
        Ty::Array(element) => Ty::array(substitute(element, map)),
        Ty::Nullable(inner) => Ty::nullable(substitute(inner, map)),
        Ty::Struct(fields) => Ty::Struct(StructTy {
            fields: fields
                .fields
                .iter()
                .map(|(name, field)| (name.clone(), substitute(field, map)))
                .collect(),
        }),
        Ty::Function(function) => Ty::Function(FnTy {
            parameters: function.parameters.iter().map(|parameter| substitute(parameter, map)).collect(),
            return_type: Box::new(substitute(&function.return_type, map)),
            coroutine: function.coroutine,
        }),
        Ty::Meta(inner) => Ty::Meta(Box::new(substitute(inner, map))),
        Ty::Union(types) => Ty::Union(types.iter().map(|member| substitute(member, map)).collect()),
        other => other.clone(),
    }
}

/// Unifies a declared parameter type against the actual argument type,
/// extracting concrete types for generic parameter names into `out`.
///
/// A parameter name that unifies against two different types is a conflict
/// and fails; shape mismatches are ignored so that ordinary type errors are
/// reported by the assignability check instead.
pub fn extract_generics(declared: &Ty, actual: &Ty, out: &mut IndexMap<String, Ty>) -> Result<(), String> {
    match (declared, actual) {
        (Ty::Generic { name, .. }, _) => {
            if let Some(previous) = out.get(name) {
                if previous != actual {
                    return Err(format!(
                        "generic parameter '{name}' inferred as both '{previous}' and '{actual}'"
                    ));
                }
            } else {
                out.insert(name.clone(), actual.clone());
            }
            Ok(())
        }
        (Ty::Array(declared), Ty::Array(actual)) => extract_generics(declared, actual, out),
        (Ty::Nullable(declared), Ty::Nullable(actual)) => extract_generics(declared, actual, out),
        (Ty::Nullable(declared), actual) => extract_generics(declared, actual, out),
        (Ty::Struct(declared), Ty::Struct(actual)) if declared.fields.len() == actual.fields.len() => {
            for ((_, declared), (_, actual)) in declared.fields.iter().zip(actual.fields.iter()) {
                extract_generics(declared, actual, out)?;
            }
            Ok(())
        }
        (Ty::Function(declared), Ty::Function(actual)) if declared.parameters.len() == actual.parameters.len() => {
            for (declared, actual) in declared.parameters.iter().zip(actual.parameters.iter()) {
                extract_generics(declared, actual, out)?;
            }
            extract_generics(&declared.return_type, &actual.return_type, out)
        }
        (Ty::Meta(declared), Ty::Meta(actual)) => extract_generics(declared, actual, out),
        _ => Ok(()),
    }
}

/// Checks one type argument against a parameter's constraint union.
///
/// An empty union accepts everything. Interface constraints accept classes
/// implementing the interface and the interface itself; class constraints
/// accept exactly that class.
pub fn satisfies_constraint(ctx: &mut CompilerContext, actual: &Ty, constraints: &[Ty], span: &Span) -> bool {
    if constraints.is_empty() {
        return true;
    }

    constraints.iter().any(|constraint| match constraint {
        Ty::Union(members) => satisfies_constraint(ctx, actual, members, span),
        Ty::Interface { symbol, .. } => match actual {
            Ty::Interface { symbol: actual_symbol, .. } => symbol == actual_symbol,
            Ty::Class { symbol: class, .. } => super::compat::class_implements_interface(ctx, *class, *symbol),
            _ => false,
        },
        Ty::Class { symbol, .. } => matches!(actual, Ty::Class { symbol: actual_symbol, .. } if symbol == actual_symbol),
        other => other == actual,
    })
}

/// Produces (or returns the cached) concrete class for an ordered list of
/// type arguments.
///
/// The clone shares the declaration AST; only its member context differs, a
/// shallow copy with the parameter names bound to the concrete types. The
/// cache key is the generic symbol's uid plus the canonical signature, shared
/// by every caller.
pub fn monomorphize_class(ctx: &mut CompilerContext, class: SymbolId, arguments: &[Ty], span: &Span) -> Result<Ty, CompilerError> {
    let decl = match &ctx.symbol(class).kind {
        SymbolKind::DeclaredType(TypeDeclAst::Class(decl)) => decl.clone(),
        _ => unreachable!("monomorphize_class called on a non-class symbol"),
    };

    let generic_uid = ctx.symbol(class).uid.clone();
    let signature = signature_of(arguments);
    let cache_key = (generic_uid.clone(), signature.clone());

    if let Some(concrete) = ctx.mono_cache.get(&cache_key) {
        let name = ctx.symbol(*concrete).name.clone();
        return Ok(Ty::Class { symbol: *concrete, name });
    }

    let class_context = ctx.symbol(class).context;
    for (parameter, argument) in decl.generics.iter().zip(arguments) {
        let constraints = parameter
            .constraints
            .iter()
            .map(|constraint| super::resolve::resolve_type_name(ctx, class_context, constraint))
            .collect::<Result<Vec<_>, _>>()?;
        if !satisfies_constraint(ctx, argument, &constraints, span) {
            let rendered = constraints.iter().map(ToString::to_string).collect::<Vec<_>>().join(" | ");
            return Err(CompilerError::constraint_not_satisfied(argument.to_string(), rendered, span));
        }
    }

    let concrete_name = format!("{}<{}>", decl.name, signature);
    debug!("monomorphizing class {concrete_name}");

    let mut symbol = Symbol::new(
        concrete_name,
        SymbolKind::DeclaredType(TypeDeclAst::Class(decl.clone())),
        span.clone(),
    );
    symbol.context = ctx.symbol(class).context;
    let concrete = ctx.add_detached_symbol(symbol, format!("{generic_uid}<{signature}>"));

    // The member context mirrors the generic's, with the parameters bound.
    let template_context = ctx.type_contexts.get(&class).copied();
    let parent = template_context.and_then(|id| ctx.context(id).parent);
    let package = template_context
        .map(|id| ctx.context(id).package)
        .unwrap_or(crate::pkg::PackageId::UNDEFINED);
    let member_context = ctx.create_context(parent, ContextOwner::None, package);
    ctx.context_mut(member_context).within_class = true;
    ctx.context_mut(member_context).active_class = Some(concrete);
    for (parameter, argument) in decl.generics.iter().zip(arguments) {
        ctx.context_mut(member_context)
            .bound_generics
            .insert(parameter.name.clone(), argument.clone());
    }
    ctx.type_contexts.insert(concrete, member_context);

    ctx.mono_cache.insert(cache_key, concrete);

    let name = ctx.symbol(concrete).name.clone();
    Ok(Ty::Class { symbol: concrete, name })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BasicTy;

    fn generic(name: &str) -> Ty {
        Ty::Generic { name: name.into(), constraints: Vec::new() }
    }

    #[test]
    fn signature_is_order_sensitive() {
        let a = signature_of(&[Ty::Basic(BasicTy::I32), Ty::Basic(BasicTy::F32)]);
        let b = signature_of(&[Ty::Basic(BasicTy::F32), Ty::Basic(BasicTy::I32)]);
        assert_ne!(a, b);
        assert_eq!(a, "i32,f32");
    }

    #[test]
    fn substitution_reaches_nested_positions() {
        let mut map = IndexMap::new();
        map.insert("T".to_string(), Ty::Basic(BasicTy::I64));

        let declared = Ty::Function(FnTy {
            parameters: vec![Ty::array(generic("T"))],
            return_type: Box::new(Ty::nullable(generic("T"))),
            coroutine: false,
        });
        let substituted = substitute(&declared, &map);
        assert_eq!(
            substituted,
            Ty::Function(FnTy {
                parameters: vec![Ty::array(Ty::Basic(BasicTy::I64))],
                return_type: Box::new(Ty::nullable(Ty::Basic(BasicTy::I64))),
                coroutine: false,
            })
        );
    }

    #[test]
    fn extraction_fills_map_from_arguments() {
        let mut out = IndexMap::new();
        extract_generics(&Ty::array(generic("T")), &Ty::array(Ty::Basic(BasicTy::U8)), &mut out).unwrap();
        assert_eq!(out.get("T"), Some(&Ty::Basic(BasicTy::U8)));
    }

    #[test]
    fn conflicting_extraction_fails() {
        let mut out = IndexMap::new();
        let declared = Ty::Function(FnTy {
            parameters: vec![generic("T"), generic("T")],
            return_type: Box::new(Ty::VOID),
            coroutine: false,
        });
        let actual = Ty::Function(FnTy {
            parameters: vec![Ty::Basic(BasicTy::I32), Ty::Basic(BasicTy::F32)],
            return_type: Box::new(Ty::VOID),
            coroutine: false,
        });
        let error = extract_generics(&declared, &actual, &mut out).unwrap_err();
        assert!(error.contains("'T'"));
    }

    #[test]
    fn empty_constraint_accepts_everything() {
        let mut ctx = CompilerContext::default();
        assert!(satisfies_constraint(&mut ctx, &Ty::Basic(BasicTy::I32), &[], &Span::synthetic()));
    }
}
