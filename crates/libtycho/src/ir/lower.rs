//! IR lowering driver.
//!
//! One [`FunctionIr`] per function, method, lambda and per-package
//! initializer. Emission order within a function follows a depth-first,
//! left-to-right walk of the typed AST; the relative order of instructions is
//! observable downstream and therefore stable.

use std::rc::Rc;

use indexmap::IndexMap;
use log::debug;

use crate::{
    ast::FunctionDefinitionAst,
    context::CompilerContext,
    error::CompilerError,
    pkg::PackageId,
    span::Span,
    sym::{ContextId, SymbolId, SymbolKind, TypeDeclAst},
    types::Ty,
};

use super::{compute_stack_layout, Instr, IrType, Reg, StackLayout};

/// The lowered body of one function.
#[derive(Debug, Clone)]
pub struct FunctionIr {
    pub name: String,
    /// The owning body context's uuid; jump targets use this token
    pub uid: String,
    pub instrs: Vec<Instr>,
    pub layout: StackLayout,
}

impl std::fmt::Display for FunctionIr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "fn {} {}", self.uid, self.name)?;
        for instr in &self.instrs {
            writeln!(f, "  {instr}")?;
        }
        Ok(())
    }
}

/// Everything the downstream encoder consumes for one package.
#[derive(Debug, Clone, Default)]
pub struct IrModule {
    pub package_path: String,
    pub functions: Vec<FunctionIr>,
}

impl IrModule {
    /// The stable map from context uuid to function entry.
    pub fn entry_points(&self) -> IndexMap<String, String> {
        self.functions
            .iter()
            .map(|function| (function.uid.clone(), function.name.clone()))
            .collect()
    }

    /// Newline-delimited `file:line:col:function` records, one per source-map
    /// push, indexed by instruction position.
    pub fn source_map(&self) -> String {
        let mut out = String::new();
        for function in &self.functions {
            for instr in &function.instrs {
                if let Instr::SrcMapPush { file, line, column, function } = instr {
                    out.push_str(&format!("{file}:{line}:{column}:{function}\n"));
                }
            }
        }
        out
    }
}

impl std::fmt::Display for IrModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "; package {}", self.package_path)?;
        for function in &self.functions {
            function.fmt(f)?;
        }
        Ok(())
    }
}

/// Lowers everything a package contributes: the package initializer first,
/// then registry-ordered functions and lambdas, then class methods in method
/// table order.
pub fn lower_package(ctx: &mut CompilerContext, package: PackageId) -> Result<IrModule, CompilerError> {
    let path = ctx.package(package).path.clone();
    debug!("lowering package '{path}'");
    let mut module = IrModule { package_path: path, functions: Vec::new() };

    module.functions.push(lower_package_init(ctx, package)?);

    let registry: Vec<(String, SymbolId)> = ctx
        .globals
        .iter()
        .map(|(uid, symbol)| (uid.to_string(), symbol))
        .collect();
    for (_, symbol) in registry {
        if ctx.context(ctx.symbol(symbol).context).package != package {
            continue;
        }
        let lowerable = matches!(
            ctx.symbol(symbol).kind,
            SymbolKind::Function(_) | SymbolKind::Lambda(_)
        );
        if !lowerable {
            continue;
        }
        let inferred = ctx.fn_info(symbol).map(|info| info.inferred).unwrap_or(false);
        if !inferred {
            // Generic originals and never-touched bodies have no concrete IR.
            continue;
        }
        module.functions.push(lower_function(ctx, symbol)?);
    }

    let classes: Vec<SymbolId> = ctx
        .class_layouts
        .keys()
        .copied()
        .filter(|class| ctx.context(ctx.symbol(*class).context).package == package)
        .collect();
    for class in classes {
        let methods = ctx.class_layouts[&class].methods.clone();
        for method in methods {
            let inferred = ctx.fn_info(method).map(|info| info.inferred).unwrap_or(false);
            if inferred {
                module.functions.push(lower_function(ctx, method)?);
            }
        }
    }

    Ok(module)
}

/// The declaration backing a function-like symbol for lowering purposes.
fn lowering_decl(ctx: &CompilerContext, symbol: SymbolId) -> Option<Rc<FunctionDefinitionAst>> {
    match &ctx.symbol(symbol).kind {
        SymbolKind::Function(decl) => Some(decl.clone()),
        SymbolKind::Lambda(_) => ctx.lambda_decls.get(&symbol).cloned(),
        SymbolKind::ClassMethod { class, method_index, .. } => match &ctx.symbol(*class).kind {
            SymbolKind::DeclaredType(TypeDeclAst::Class(decl)) => {
                decl.methods.get(*method_index).map(|method| Rc::new(method.function.clone()))
            }
            _ => None,
        },
        SymbolKind::ImplementationMethod { implementation, method_index } => {
            match &ctx.symbol(*implementation).kind {
                SymbolKind::DeclaredType(TypeDeclAst::Implementation(decl)) => {
                    decl.methods.get(*method_index).map(|method| Rc::new(method.function.clone()))
                }
                _ => None,
            }
        }
        _ => None,
    }
}

/// Lowers one inferred function body.
pub fn lower_function(ctx: &mut CompilerContext, symbol: SymbolId) -> Result<FunctionIr, CompilerError> {
    let decl = match lowering_decl(ctx, symbol) {
        Some(decl) => decl,
        None => {
            let span = ctx.symbol(symbol).span.clone();
            return Err(CompilerError::missing_annotation(
                format!("'{}' has no body to lower", ctx.symbol(symbol).name),
                &span,
            ));
        }
    };

    let info = ctx.fn_info(symbol).cloned().unwrap_or_default();
    let body = info.body_context;
    let uuid = ctx.context(body).uuid.to_string();
    let name = ctx.symbol(symbol).name.clone();
    let layout = compute_stack_layout(ctx, symbol)?;
    let coroutine = info.is_coroutine_callable();
    let return_ty = info.return_ty.clone().unwrap_or(Ty::VOID);

    let mut lowering = FunctionLowering::new(ctx, symbol, uuid.clone(), name.clone(), layout, coroutine, return_ty);
    lowering.emit(Instr::Label { name: uuid.clone() });

    for statement in &decl.body {
        lowering.lower_stmt(body, statement)?;
    }
    lowering.terminate();

    let (instrs, layout) = lowering.into_parts();
    Ok(FunctionIr { name, uid: uuid, instrs, layout })
}

/// Lowers the package initializer: global values, static class blocks, then
/// the top-level statements.
fn lower_package_init(ctx: &mut CompilerContext, package: PackageId) -> Result<FunctionIr, CompilerError> {
    let ast = ctx.package(package).ast.clone();
    let root = ctx.package(package).root_context;
    let uuid = ctx.context(root).uuid.to_string();
    let name = format!("{}::init", ctx.package(package).path);

    let mut lowering = FunctionLowering::new(
        ctx,
        SymbolId::UNDEFINED,
        uuid.clone(),
        name.clone(),
        StackLayout::default(),
        false,
        Ty::VOID,
    );
    lowering.emit(Instr::Label { name: uuid.clone() });

    for declaration in &ast.declarations {
        if let crate::ast::DeclarationAst::Global(decl) = declaration {
            let symbol = match lowering.ctx.context(root).symbols.get(decl.name.as_str()).copied() {
                Some(symbol) => symbol,
                None => continue,
            };
            let uid = lowering.ctx.symbol(symbol).uid.clone();
            let ty = lowering
                .ctx
                .var_types
                .get(&symbol)
                .map(IrType::from_ty)
                .unwrap_or(IrType::Ptr);
            let value = lowering.lower_expr(root, &decl.value)?;
            lowering.emit(Instr::StoreGlobal { ty, uid, src: value });
        }
    }

    let static_classes = lowering.ctx.package(package).static_blocks.clone();
    for class in static_classes {
        let decl = match &lowering.ctx.symbol(class).kind {
            SymbolKind::DeclaredType(TypeDeclAst::Class(decl)) => decl.clone(),
            _ => continue,
        };
        let statements = match &decl.static_block {
            Some(statements) => statements.clone(),
            None => continue,
        };
        let scope = lowering
            .ctx
            .block_contexts
            .get(&(SymbolId::UNDEFINED, decl.index))
            .copied()
            .unwrap_or(root);
        for statement in &statements {
            lowering.lower_stmt(scope, statement)?;
        }
    }

    for statement in &ast.statements {
        lowering.lower_stmt(root, statement)?;
    }

    lowering.emit(Instr::RetVoid);
    let (instrs, layout) = lowering.into_parts();
    Ok(FunctionIr { name, uid: uuid, instrs, layout })
}

/// Emission state for one function body.
pub struct FunctionLowering<'a> {
    pub ctx: &'a mut CompilerContext,
    /// Side-table key: the function symbol, or undefined at package level
    pub owner: SymbolId,
    pub uuid: String,
    pub function_name: String,
    instrs: Vec<Instr>,
    next_reg: u32,
    next_label: u32,
    pub layout: StackLayout,
    pub coroutine: bool,
    pub return_ty: Ty,
    pub(super) break_labels: Vec<String>,
    pub(super) continue_labels: Vec<String>,
}

impl<'a> FunctionLowering<'a> {
    pub fn new(
        ctx: &'a mut CompilerContext,
        owner: SymbolId,
        uuid: String,
        function_name: String,
        layout: StackLayout,
        coroutine: bool,
        return_ty: Ty,
    ) -> Self {
        Self {
            ctx,
            owner,
            uuid,
            function_name,
            instrs: Vec::new(),
            next_reg: 0,
            next_label: 0,
            layout,
            coroutine,
            return_ty,
            break_labels: Vec::new(),
            continue_labels: Vec::new(),
        }
    }

    pub fn emit(&mut self, instr: Instr) {
        self.instrs.push(instr);
    }

    pub fn fresh_reg(&mut self) -> Reg {
        let reg = Reg(self.next_reg);
        self.next_reg += 1;
        reg
    }

    pub fn fresh_label(&mut self) -> String {
        let label = format!("{}_{}", self.uuid, self.next_label);
        self.next_label += 1;
        label
    }

    /// Emits the function epilogue: coroutine bodies finish, void bodies
    /// return, and value bodies rely on their return statements.
    pub fn terminate(&mut self) {
        if self.coroutine {
            self.emit(Instr::CoroutineFinish);
        } else if self.return_ty.is_void() {
            if !matches!(self.instrs.last(), Some(Instr::RetVoid)) {
                self.emit(Instr::RetVoid);
            }
        }
    }

    pub fn into_parts(self) -> (Vec<Instr>, StackLayout) {
        (self.instrs, self.layout)
    }

    /// Emits the paired source-map markers around a lowered region.
    pub(super) fn with_srcmap<T>(
        &mut self,
        span: &Span,
        body: impl FnOnce(&mut Self) -> Result<T, CompilerError>,
    ) -> Result<T, CompilerError> {
        let (line, column) = span.line_col();
        self.emit(Instr::SrcMapPush {
            file: span.file.display_path(),
            line,
            column,
            function: self.function_name.clone(),
        });
        let result = body(self);
        self.emit(Instr::SrcMapPop);
        result
    }

    /// The inference record of an expression, which must exist by now.
    pub(super) fn info_of(&self, index: crate::ast::AstIndex, span: &Span) -> Result<crate::infer::InferenceInfo, CompilerError> {
        match self.ctx.expr_info.get(&(self.owner, index)) {
            Some(info) => Ok(info.clone()),
            None => Err(CompilerError::missing_annotation(
                "expression reached lowering without inference results",
                span,
            )),
        }
    }

    /// The context inference created for a block-like node, if any.
    pub(super) fn block_context(&self, index: crate::ast::AstIndex, fallback: ContextId) -> ContextId {
        self.ctx
            .block_contexts
            .get(&(self.owner, index))
            .copied()
            .unwrap_or(fallback)
    }
}
