//! Per-function stack layout.
//!
//! Computed before IR emission. Methods reserve `this` first; arguments get
//! byte offsets by summing sizes in declared order; locals follow, except
//! function and lambda symbols, which live in the global segment. Every local
//! must have a resolved type by now; a missing annotation here means the
//! inference pass did not run, which is a compiler bug.

use indexmap::IndexMap;

use crate::{
    context::CompilerContext,
    error::CompilerError,
    sym::{SymbolId, SymbolKind},
};

/// Which region a slot lives in.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SlotKind {
    This,
    Arg,
    Local,
}

/// Byte layout of one function frame.
#[derive(Debug, Clone, Default)]
pub struct StackLayout {
    pub args_byte_size: usize,
    pub locals_byte_size: usize,
    /// uid to `(kind, offset, size)`
    pub slots: IndexMap<String, (SlotKind, usize, usize)>,
    pub has_this: bool,
}

impl StackLayout {
    pub fn slot(&self, uid: &str) -> Option<(SlotKind, usize, usize)> {
        self.slots.get(uid).copied()
    }
}

/// Computes the frame layout for a function-like symbol.
pub fn compute_stack_layout(ctx: &CompilerContext, function: SymbolId) -> Result<StackLayout, CompilerError> {
    let mut layout = StackLayout::default();
    let info = match ctx.fn_info(function) {
        Some(info) => info,
        None => return Ok(layout),
    };

    let mut offset = 0usize;

    if info.is_method {
        layout.has_this = true;
        layout.slots.insert("this".to_string(), (SlotKind::This, 0, 8));
        offset += 8;
    }

    // Arguments in declared order, straight size sums.
    let body = info.body_context;
    let argument_symbols: Vec<SymbolId> = ctx
        .context(body)
        .symbols
        .values()
        .copied()
        .filter(|symbol| matches!(ctx.symbol(*symbol).kind, SymbolKind::Argument { .. }))
        .collect();

    for symbol in &argument_symbols {
        let uid = ctx.symbol(*symbol).uid.clone();
        let size = match ctx.var_types.get(symbol) {
            Some(ty) => ty.byte_size(),
            None => {
                return Err(CompilerError::missing_annotation(
                    format!("argument '{}' has no resolved type at layout time", ctx.symbol(*symbol).name),
                    &ctx.symbol(*symbol).span,
                ))
            }
        };
        layout.slots.insert(uid, (SlotKind::Arg, offset, size));
        offset += size;
    }
    layout.args_byte_size = offset;

    // Locals registered by declarations and lookups. Functions and lambdas
    // are global, never frame slots.
    let mut locals_offset = 0usize;
    for symbol in &info.locals {
        match ctx.symbol(*symbol).kind {
            SymbolKind::Function(_) | SymbolKind::Lambda(_) => continue,
            _ => {}
        }
        let uid = ctx.symbol(*symbol).uid.clone();
        let size = match ctx.var_types.get(symbol) {
            Some(ty) => ty.byte_size(),
            None => {
                return Err(CompilerError::missing_annotation(
                    format!("local '{}' has no resolved type at layout time", ctx.symbol(*symbol).name),
                    &ctx.symbol(*symbol).span,
                ))
            }
        };
        layout.slots.insert(uid, (SlotKind::Local, layout.args_byte_size + locals_offset, size));
        locals_offset += size;
    }
    layout.locals_byte_size = locals_offset;

    Ok(layout)
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::{
        ast::FileAst,
        file::SourceFile,
        pkg::{Package, PackageId},
        span::Span,
        sym::{ContextOwner, Symbol},
        types::{BasicTy, Ty},
    };

    #[test]
    fn layout_sums_argument_and_local_sizes() {
        let mut ctx = CompilerContext::default();
        let file = SourceFile::new(vec!["test".into()], String::new());
        let root = ctx.create_context(None, ContextOwner::Package, PackageId(0));
        ctx.packages.push(Package::new(PackageId(0), "test".into(), Rc::new(FileAst::new(file)), root));

        let function = ctx
            .add_symbol(root, Symbol::new("f", SymbolKind::Lambda(crate::ast::AstIndex(0)), Span::synthetic()))
            .unwrap();
        let body = ctx.create_context(Some(root), ContextOwner::Function(function), PackageId(0));
        ctx.fn_info_mut(function).body_context = body;

        let a = ctx.add_symbol(body, Symbol::new("a", SymbolKind::Argument { index: 0 }, Span::synthetic())).unwrap();
        ctx.var_types.insert(a, Ty::Basic(BasicTy::I16));
        let b = ctx.add_symbol(body, Symbol::new("b", SymbolKind::Argument { index: 1 }, Span::synthetic())).unwrap();
        ctx.var_types.insert(b, Ty::Basic(BasicTy::I64));

        let local = ctx.add_symbol(body, Symbol::new("x", SymbolKind::Variable, Span::synthetic())).unwrap();
        ctx.var_types.insert(local, Ty::Basic(BasicTy::U8));
        ctx.fn_info_mut(function).locals.insert(local);

        let layout = compute_stack_layout(&ctx, function).unwrap();
        assert_eq!(layout.args_byte_size, 10);
        assert_eq!(layout.locals_byte_size, 1);

        let a_uid = ctx.symbol(a).uid.clone();
        let b_uid = ctx.symbol(b).uid.clone();
        let local_uid = ctx.symbol(local).uid.clone();
        assert_eq!(layout.slot(&a_uid), Some((SlotKind::Arg, 0, 2)));
        assert_eq!(layout.slot(&b_uid), Some((SlotKind::Arg, 2, 8)));
        assert_eq!(layout.slot(&local_uid), Some((SlotKind::Local, 10, 1)));
    }

    #[test]
    fn methods_reserve_this_first() {
        let mut ctx = CompilerContext::default();
        let file = SourceFile::new(vec!["test".into()], String::new());
        let root = ctx.create_context(None, ContextOwner::Package, PackageId(0));
        ctx.packages.push(Package::new(PackageId(0), "test".into(), Rc::new(FileAst::new(file)), root));

        let function = ctx
            .add_symbol(root, Symbol::new("m", SymbolKind::Lambda(crate::ast::AstIndex(0)), Span::synthetic()))
            .unwrap();
        let body = ctx.create_context(Some(root), ContextOwner::Function(function), PackageId(0));
        ctx.fn_info_mut(function).body_context = body;
        ctx.fn_info_mut(function).is_method = true;

        let a = ctx.add_symbol(body, Symbol::new("a", SymbolKind::Argument { index: 0 }, Span::synthetic())).unwrap();
        ctx.var_types.insert(a, Ty::Basic(BasicTy::I32));

        let layout = compute_stack_layout(&ctx, function).unwrap();
        assert!(layout.has_this);
        assert_eq!(layout.slot("this"), Some((SlotKind::This, 0, 8)));
        let a_uid = ctx.symbol(a).uid.clone();
        assert_eq!(layout.slot(&a_uid), Some((SlotKind::Arg, 8, 4)));
        assert_eq!(layout.args_byte_size, 12);
    }

    #[test]
    fn missing_local_type_is_a_codegen_bug() {
        let mut ctx = CompilerContext::default();
        let file = SourceFile::new(vec!["test".into()], String::new());
        let root = ctx.create_context(None, ContextOwner::Package, PackageId(0));
        ctx.packages.push(Package::new(PackageId(0), "test".into(), Rc::new(FileAst::new(file)), root));

        let function = ctx
            .add_symbol(root, Symbol::new("f", SymbolKind::Lambda(crate::ast::AstIndex(0)), Span::synthetic()))
            .unwrap();
        let body = ctx.create_context(Some(root), ContextOwner::Function(function), PackageId(0));
        ctx.fn_info_mut(function).body_context = body;

        let local = ctx.add_symbol(body, Symbol::new("x", SymbolKind::Variable, Span::synthetic())).unwrap();
        ctx.fn_info_mut(function).locals.insert(local);

        assert!(compute_stack_layout(&ctx, function).is_err());
    }
}
