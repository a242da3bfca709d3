//! Operator overload resolution.
//!
//! Binary, unary, call, index-access and index-set expressions on class
//! values check whether the class offers the matching dunder method. When it
//! does, the expression's overload marker is set and lowering rewrites the
//! expression into a plain method call.

use crate::{
    context::CompilerContext,
    error::CompilerError,
    span::Span,
    sym::{SymbolId, SymbolKind},
    types::{FnTy, Ty},
};

use super::InferencePass;

/// The index-access and index-set method names.
pub static INDEX_GET: &str = "__index__";
pub static INDEX_SET: &str = "__index_set__";
/// The call-operator method name.
pub static CALL_OPERATOR: &str = "__call__";

/// Finds a method on a class symbol by name.
pub fn find_class_method(ctx: &CompilerContext, class: SymbolId, name: &str) -> Option<SymbolId> {
    let members = ctx.type_contexts.get(&class)?;
    let symbol = ctx.context(*members).symbols.get(name).copied()?;
    matches!(ctx.symbol(symbol).kind, SymbolKind::ClassMethod { .. }).then_some(symbol)
}

/// The overload method a type offers for an operator name, if any.
pub fn overload_target(ctx: &CompilerContext, ty: &Ty, method_name: &str) -> Option<SymbolId> {
    match ty {
        Ty::Class { symbol, .. } => find_class_method(ctx, *symbol, method_name),
        Ty::Nullable(inner) => overload_target(ctx, inner, method_name),
        _ => None,
    }
}

impl InferencePass<'_> {
    /// Resolves a method symbol's signature in its class scope, inferring the
    /// body on first touch so the header is available.
    pub fn method_signature(&mut self, method: SymbolId, span: &Span) -> Result<FnTy, CompilerError> {
        let decl = match self.function_decl(method) {
            Some(decl) => decl,
            None => return Err(CompilerError::undefined_symbol(self.ctx.symbol(method).name.clone(), span)),
        };
        let scope = self.ctx.symbol(method).context;
        self.resolve_header(&decl, scope)
    }
}
