//! Bidirectional type inference.
//!
//! Every expression is inferred with an optional hint flowing down from
//! assignment targets, call parameters, return contexts and nested
//! constructors. Results land in the `AstIndex`-keyed side tables on the
//! [`CompilerContext`]; the AST itself is never touched.
//!
//! Function bodies are inferred once and memoized. Generic functions are
//! monomorphized from their call sites, implicitly by unifying declared
//! parameter types against the actual argument types or explicitly from
//! written type arguments, and the concrete clones are cached under a
//! canonical signature so repeated instantiations share one symbol.

use log::debug;

use crate::{
    ast::DeclarationAst,
    context::CompilerContext,
    error::CompilerError,
    pkg::PackageId,
    span::Span,
    sym::{ContextId, SymbolId},
    types::{can_assign_types, Ty},
};

pub mod expr;
pub mod func;
pub mod ops;
pub mod stmt;

/// What a call expression resolved to, recorded for lowering.
#[derive(Debug, Clone, PartialEq)]
pub enum CallTarget {
    /// A declared function or a concrete generic instance
    Function(SymbolId),
    /// An instance or static method; `this` is prepended for instance calls
    Method(SymbolId),
    /// A variant case constructor
    VariantCase { variant: SymbolId, case_index: usize },
    /// One callable of an FFI block
    FfiMethod { ffi: SymbolId, method_index: usize },
    /// A function-typed value called through a pointer or closure
    Indirect,
}

/// Inference results of one expression.
#[derive(Debug, Clone)]
pub struct InferenceInfo {
    /// The natural type of the expression
    pub inferred: Ty,
    /// The non-void hint the expression was inferred under, if any. Lowering
    /// inserts an implicit cast when this differs from the inferred type.
    pub hint: Option<Ty>,
    /// Operator overload target; lowering rewrites into a method call
    pub overload: Option<SymbolId>,
}

/// Infers one package: declarations in order, then static blocks, then the
/// top-level statements. Idempotent; the second call is a no-op.
pub fn infer_package(ctx: &mut CompilerContext, package: PackageId) -> Result<(), CompilerError> {
    if ctx.package(package).inferred {
        return Ok(());
    }
    ctx.package_mut(package).inferred = true;
    debug!("inferring package '{}'", ctx.package(package).path);

    let ast = ctx.package(package).ast.clone();
    let root = ctx.package(package).root_context;
    let mut pass = InferencePass { ctx, package };

    pass.infer_declarations(root, &ast.declarations)?;

    let static_classes = pass.ctx.package(package).static_blocks.clone();
    for class in static_classes {
        pass.infer_static_block(class)?;
    }

    for statement in &ast.statements {
        pass.infer_stmt(root, statement)?;
    }

    pass.check_main(root)?;
    Ok(())
}

/// The inference engine for one package.
pub struct InferencePass<'ctx> {
    pub ctx: &'ctx mut CompilerContext,
    pub package: PackageId,
}

impl<'ctx> InferencePass<'ctx> {
    fn infer_declarations(&mut self, scope: ContextId, declarations: &[DeclarationAst]) -> Result<(), CompilerError> {
        // Global variables first so function bodies can read their types.
        for declaration in declarations {
            if let DeclarationAst::Global(decl) = declaration {
                let symbol = match self.ctx.context(scope).symbols.get(decl.name.as_str()).copied() {
                    Some(symbol) => symbol,
                    None => continue,
                };
                let annotated = match &decl.type_name {
                    Some(type_name) => Some(crate::types::resolve_type_name(self.ctx, scope, type_name)?),
                    None => None,
                };
                let inferred = self.infer_expr(scope, &decl.value, annotated.as_ref())?;
                self.ctx.var_types.insert(symbol, annotated.unwrap_or(inferred));
            }
        }

        for declaration in declarations {
            match declaration {
                DeclarationAst::Function(decl) => {
                    if !decl.generics.is_empty() {
                        // Generic bodies are only checked per concrete
                        // instantiation, driven by call sites.
                        continue;
                    }
                    if let Some(symbol) = self.ctx.context(scope).symbols.get(decl.name.as_str()).copied() {
                        self.infer_function(symbol, None)?;
                    }
                }
                DeclarationAst::Class(decl) => {
                    if !decl.generics.is_empty() {
                        continue;
                    }
                    if let Some(symbol) = self.ctx.context(scope).symbols.get(decl.name.as_str()).copied() {
                        self.finalize_class(symbol)?;
                        self.infer_class_methods(symbol)?;
                    }
                }
                DeclarationAst::Implementation(decl) => {
                    if let Some(symbol) = self.ctx.context(scope).symbols.get(decl.name.as_str()).copied() {
                        self.infer_implementation_methods(symbol)?;
                    }
                }
                DeclarationAst::Global(_) => {}
                DeclarationAst::Namespace(decl) => {
                    if let Some(symbol) = self.ctx.context(scope).symbols.get(decl.name.as_str()).copied() {
                        if let Some(body) = crate::pkg::declare::namespace_context(self.ctx, symbol) {
                            self.infer_declarations(body, &decl.declarations)?;
                        }
                    }
                }
                DeclarationAst::Interface(_)
                | DeclarationAst::Variant(_)
                | DeclarationAst::Enum(_)
                | DeclarationAst::TypeAlias(_)
                | DeclarationAst::Ffi(_) => {}
            }
        }
        Ok(())
    }

    /// Records an expression's inference results and validates the hint.
    pub(crate) fn finish(
        &mut self,
        scope: ContextId,
        index: crate::ast::AstIndex,
        span: &Span,
        inferred: Ty,
        hint: Option<&Ty>,
        overload: Option<SymbolId>,
    ) -> Result<Ty, CompilerError> {
        let hint = hint.filter(|hint| !hint.is_void()).cloned();

        if let Some(hint_ty) = &hint {
            if *hint_ty != inferred {
                let result = can_assign_types(self.ctx, &inferred, hint_ty, span);
                if !result.success {
                    let error = CompilerError::cannot_assign(
                        inferred.to_string(),
                        hint_ty.to_string(),
                        result.message,
                        span,
                    );
                    self.ctx.report(scope, error)?;
                }
            }
        }

        let owner = self.ctx.owner_of(scope);
        self.ctx
            .expr_info
            .insert((owner, index), InferenceInfo { inferred: inferred.clone(), hint, overload });
        Ok(inferred)
    }

    /// Retrofits a hint onto an already-inferred expression. Used when the
    /// target type only becomes known after the arguments were inferred,
    /// as with implicit generic instantiation and overload selection.
    pub(crate) fn set_hint(&mut self, scope: ContextId, index: crate::ast::AstIndex, span: &Span, hint: &Ty) -> Result<(), CompilerError> {
        let owner = self.ctx.owner_of(scope);
        let inferred = match self.ctx.expr_info.get(&(owner, index)) {
            Some(info) => info.inferred.clone(),
            None => return Ok(()),
        };
        if inferred == *hint || hint.is_void() {
            return Ok(());
        }

        let result = can_assign_types(self.ctx, &inferred, hint, span);
        if !result.success {
            let error = CompilerError::cannot_assign(inferred.to_string(), hint.to_string(), result.message, span);
            return self.ctx.report(scope, error);
        }

        if let Some(info) = self.ctx.expr_info.get_mut(&(owner, index)) {
            info.hint = Some(hint.clone());
        }
        Ok(())
    }
}
