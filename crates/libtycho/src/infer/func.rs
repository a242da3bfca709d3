//! Function header and body inference.
//!
//! Non-generic functions and methods are inferred once and memoized on their
//! [`FunctionInfo`](crate::sym::FunctionInfo). Generic functions never have
//! their bodies checked directly; every call site produces (or reuses) a
//! concrete clone whose body context binds the parameter names to concrete
//! types, and the clone is inferred like any other function.

use std::rc::Rc;

use log::debug;

use crate::{
    ast::FunctionDefinitionAst,
    error::CompilerError,
    span::Span,
    sym::{ContextId, ContextOwner, Symbol, SymbolId, SymbolKind, TypeDeclAst},
    types::{
        generics::{satisfies_constraint, signature_of},
        resolve_type_name, BasicTy, FnTy, Ty, TyKind,
    },
};

use super::InferencePass;

impl InferencePass<'_> {
    /// The declaration behind a function-like symbol.
    pub fn function_decl(&self, symbol: SymbolId) -> Option<Rc<FunctionDefinitionAst>> {
        match &self.ctx.symbol(symbol).kind {
            SymbolKind::Function(decl) => Some(decl.clone()),
            SymbolKind::ClassMethod { class, method_index, .. } => {
                match &self.ctx.symbol(*class).kind {
                    SymbolKind::DeclaredType(TypeDeclAst::Class(decl)) => {
                        decl.methods.get(*method_index).map(|method| Rc::new(method.function.clone()))
                    }
                    _ => None,
                }
            }
            SymbolKind::ImplementationMethod { implementation, method_index } => {
                match &self.ctx.symbol(*implementation).kind {
                    SymbolKind::DeclaredType(TypeDeclAst::Implementation(decl)) => {
                        decl.methods.get(*method_index).map(|method| Rc::new(method.function.clone()))
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Whether a method symbol is static on its class or implementation.
    fn is_static_method(&self, symbol: SymbolId) -> bool {
        match &self.ctx.symbol(symbol).kind {
            SymbolKind::ClassMethod { class, method_index, .. } => match &self.ctx.symbol(*class).kind {
                SymbolKind::DeclaredType(TypeDeclAst::Class(decl)) => {
                    decl.methods.get(*method_index).map(|method| method.is_static).unwrap_or(false)
                }
                _ => false,
            },
            SymbolKind::ImplementationMethod { implementation, method_index } => {
                match &self.ctx.symbol(*implementation).kind {
                    SymbolKind::DeclaredType(TypeDeclAst::Implementation(decl)) => {
                        decl.methods.get(*method_index).map(|method| method.is_static).unwrap_or(false)
                    }
                    _ => false,
                }
            }
            _ => false,
        }
    }

    /// Resolves a function's declared signature against a scope.
    pub fn resolve_header(&mut self, decl: &FunctionDefinitionAst, scope: ContextId) -> Result<FnTy, CompilerError> {
        let parameters = decl
            .arguments
            .iter()
            .map(|argument| resolve_type_name(self.ctx, scope, &argument.type_name))
            .collect::<Result<Vec<_>, _>>()?;
        let return_type = resolve_type_name(self.ctx, scope, &decl.return_type)?;
        Ok(FnTy {
            parameters,
            return_type: Box::new(return_type),
            coroutine: false,
        })
    }

    /// Infers a function body once; returns the resolved return type.
    ///
    /// Passing `precreated_body` hands in the clone context built during
    /// monomorphization. Re-entrant calls for a function already on the
    /// inference stack return the declared return type immediately.
    pub fn infer_function(&mut self, symbol: SymbolId, precreated_body: Option<ContextId>) -> Result<Ty, CompilerError> {
        if let Some(info) = self.ctx.fn_info(symbol) {
            if info.inferred {
                return Ok(info.return_ty.clone().unwrap_or(Ty::VOID));
            }
        }

        let decl = match self.function_decl(symbol) {
            Some(decl) => decl,
            None => return Ok(Ty::VOID),
        };

        let uid = self.ctx.symbol(symbol).uid.clone();
        let defining = self.ctx.symbol(symbol).context;
        let is_method = matches!(
            self.ctx.symbol(symbol).kind,
            SymbolKind::ClassMethod { .. } | SymbolKind::ImplementationMethod { .. }
        );

        // Reuse the body context across re-entrant visits so the function
        // keeps one stable uuid.
        let body = match precreated_body {
            Some(body) => body,
            None => {
                let existing = self.ctx.fn_info_mut(symbol).body_context;
                if existing == ContextId::UNDEFINED {
                    let owner = if is_method { ContextOwner::Method(symbol) } else { ContextOwner::Function(symbol) };
                    let package = self.ctx.context(defining).package;
                    self.ctx.create_context(Some(defining), owner, package)
                } else {
                    existing
                }
            }
        };
        self.ctx.fn_info_mut(symbol).body_context = body;
        self.ctx.fn_info_mut(symbol).is_method = is_method && !self.is_static_method(symbol);

        if !self.ctx.infer_stack_enter(&uid) {
            // Recursive reference: the declared signature is all a caller needs.
            let return_type = resolve_type_name(self.ctx, body, &decl.return_type)?;
            return Ok(return_type);
        }

        debug!("inferring function '{}'", uid);
        let result = self.infer_function_body(symbol, &decl, body);
        self.ctx.infer_stack_leave(&uid);
        result
    }

    fn infer_function_body(&mut self, symbol: SymbolId, decl: &FunctionDefinitionAst, body: ContextId) -> Result<Ty, CompilerError> {
        for (index, argument) in decl.arguments.iter().enumerate() {
            let ty = resolve_type_name(self.ctx, body, &argument.type_name)?;
            let argument_symbol = self.ctx.add_symbol(
                body,
                Symbol::new(&argument.name, SymbolKind::Argument { index }, argument.span.clone()),
            )?;
            self.ctx.var_types.insert(argument_symbol, ty);
        }

        let return_type = resolve_type_name(self.ctx, body, &decl.return_type)?;
        self.ctx.fn_info_mut(symbol).return_ty = Some(return_type.clone());

        for statement in &decl.body {
            self.infer_stmt(body, statement)?;
        }

        let info = self.ctx.fn_info_mut(symbol);
        if info.is_coroutine_callable() {
            if let Some((_, span)) = info.returns.first().cloned() {
                return Err(CompilerError::return_in_coroutine(&span));
            }
        }
        info.inferred = true;

        self.warn_unused(symbol, body);
        Ok(return_type)
    }

    /// Unused-argument and unused-local warnings. Never stop compilation.
    fn warn_unused(&mut self, symbol: SymbolId, body: ContextId) {
        let info = match self.ctx.fn_info(symbol) {
            Some(info) => info.clone(),
            None => return,
        };

        let arguments: Vec<SymbolId> = self
            .ctx
            .context(body)
            .symbols
            .values()
            .copied()
            .filter(|candidate| matches!(self.ctx.symbol(*candidate).kind, SymbolKind::Argument { .. }))
            .collect();
        for argument in arguments {
            if !info.used_args.contains(&argument) {
                let name = self.ctx.symbol(argument).name.clone();
                let span = self.ctx.symbol(argument).span.clone();
                let log = crate::diag::CompilerLog::warning(
                    format!("argument '{name}' is never used"),
                    &span,
                    "declared here",
                );
                self.ctx.push_log(body, log);
            }
        }

        for local in &info.locals {
            if !info.used_locals.contains(local) {
                let name = self.ctx.symbol(*local).name.clone();
                let span = self.ctx.symbol(*local).span.clone();
                let log = crate::diag::CompilerLog::warning(
                    format!("'{name}' is never used"),
                    &span,
                    "declared here",
                );
                self.ctx.push_log(body, log);
            }
        }
    }

    /// Produces (or returns the cached) concrete instance of a generic
    /// function for an ordered list of type arguments.
    pub fn monomorphize_function(&mut self, symbol: SymbolId, arguments: &[Ty], span: &Span) -> Result<SymbolId, CompilerError> {
        let decl = match &self.ctx.symbol(symbol).kind {
            SymbolKind::Function(decl) => decl.clone(),
            _ => return Err(CompilerError::undefined_symbol(self.ctx.symbol(symbol).name.clone(), span)),
        };

        if decl.generics.len() != arguments.len() {
            return Err(CompilerError::generic_arity(decl.generics.len(), arguments.len(), span));
        }

        let generic_uid = self.ctx.symbol(symbol).uid.clone();
        let signature = signature_of(arguments);
        let cache_key = (generic_uid.clone(), signature.clone());
        if let Some(concrete) = self.ctx.mono_cache.get(&cache_key) {
            return Ok(*concrete);
        }

        let defining = self.ctx.symbol(symbol).context;
        for (parameter, argument) in decl.generics.iter().zip(arguments) {
            let constraints = parameter
                .constraints
                .iter()
                .map(|constraint| resolve_type_name(self.ctx, defining, constraint))
                .collect::<Result<Vec<_>, _>>()?;
            if !satisfies_constraint(self.ctx, argument, &constraints, span) {
                let rendered = constraints.iter().map(ToString::to_string).collect::<Vec<_>>().join(" | ");
                return Err(CompilerError::constraint_not_satisfied(argument.to_string(), rendered, span));
            }
        }

        debug!("monomorphizing function {}<{}>", decl.name, signature);
        let mut concrete_symbol = Symbol::new(
            format!("{}<{}>", decl.name, signature),
            SymbolKind::Function(decl.clone()),
            span.clone(),
        );
        concrete_symbol.context = defining;
        let concrete = self.ctx.add_detached_symbol(concrete_symbol, format!("{generic_uid}<{signature}>"));

        let package = self.ctx.context(defining).package;
        let body = self.ctx.create_context(Some(defining), ContextOwner::Function(concrete), package);
        for (parameter, argument) in decl.generics.iter().zip(arguments) {
            self.ctx
                .context_mut(body)
                .bound_generics
                .insert(parameter.name.clone(), argument.clone());
        }
        self.ctx.fn_info_mut(concrete).body_context = body;

        // Cached before body inference so self-recursive instantiations with
        // the same arguments resolve to this clone.
        self.ctx.mono_cache.insert(cache_key, concrete);

        self.infer_function(concrete, Some(body))?;
        Ok(concrete)
    }

    /// Assigns the class id, attribute offsets and the method table. Method
    /// indices are stable from here on.
    pub fn finalize_class(&mut self, class: SymbolId) -> Result<(), CompilerError> {
        if self.ctx.class_layouts.contains_key(&class) {
            return Ok(());
        }

        let decl = match &self.ctx.symbol(class).kind {
            SymbolKind::DeclaredType(TypeDeclAst::Class(decl)) => decl.clone(),
            _ => return Ok(()),
        };
        let members = match self.ctx.type_contexts.get(&class).copied() {
            Some(members) => members,
            None => return Ok(()),
        };

        let class_id = self.ctx.next_class_id();
        let mut layout = crate::context::ClassLayout { class_id, ..Default::default() };

        for attribute in &decl.attributes {
            let ty = resolve_type_name(self.ctx, members, &attribute.type_name)?;
            let size = ty.byte_size();
            layout.attributes.push((attribute.name.clone(), ty, layout.data_size, size));
            layout.data_size += size;
        }

        for method in &decl.methods {
            let method_symbol = match self.ctx.context(members).symbols.get(method.function.name.as_str()).copied() {
                Some(symbol) => symbol,
                None => continue,
            };
            let index_in_class = layout.methods.len();
            layout.methods.push(method_symbol);
            if let SymbolKind::ClassMethod { index_in_class: slot, .. } = &mut self.ctx.symbol_mut(method_symbol).kind {
                *slot = Some(index_in_class);
            }
        }

        debug!("class '{}' finalized as id {class_id}", decl.name);
        self.ctx.class_layouts.insert(class, layout);
        Ok(())
    }

    pub fn infer_class_methods(&mut self, class: SymbolId) -> Result<(), CompilerError> {
        let layout_methods = match self.ctx.class_layouts.get(&class) {
            Some(layout) => layout.methods.clone(),
            None => return Ok(()),
        };

        for method in layout_methods {
            if let Some(decl) = self.function_decl(method) {
                if !decl.generics.is_empty() {
                    continue;
                }
            }
            self.infer_function(method, None)?;
        }
        Ok(())
    }

    pub fn infer_implementation_methods(&mut self, implementation: SymbolId) -> Result<(), CompilerError> {
        let members = match self.ctx.type_contexts.get(&implementation).copied() {
            Some(members) => members,
            None => return Ok(()),
        };

        let methods: Vec<SymbolId> = self
            .ctx
            .context(members)
            .symbols
            .values()
            .copied()
            .filter(|symbol| matches!(self.ctx.symbol(*symbol).kind, SymbolKind::ImplementationMethod { .. }))
            .collect();

        for method in methods {
            self.infer_function(method, None)?;
        }
        Ok(())
    }

    /// Infers a class's static initializer block in a class-scoped context.
    pub fn infer_static_block(&mut self, class: SymbolId) -> Result<(), CompilerError> {
        let decl = match &self.ctx.symbol(class).kind {
            SymbolKind::DeclaredType(TypeDeclAst::Class(decl)) => decl.clone(),
            _ => return Ok(()),
        };
        let statements = match &decl.static_block {
            Some(statements) => statements.clone(),
            None => return Ok(()),
        };
        let members = match self.ctx.type_contexts.get(&class).copied() {
            Some(members) => members,
            None => return Ok(()),
        };

        let package = self.ctx.context(members).package;
        let scope = self.ctx.create_context(Some(members), ContextOwner::None, package);
        let owner = self.ctx.owner_of(members);
        self.ctx.block_contexts.insert((owner, decl.index), scope);

        for statement in &statements {
            self.infer_stmt(scope, statement)?;
        }
        Ok(())
    }

    /// Validates the entry point's signature when one exists.
    pub fn check_main(&mut self, root: ContextId) -> Result<(), CompilerError> {
        let main = match self.ctx.context(root).symbols.get("main").copied() {
            Some(symbol) => symbol,
            None => return Ok(()),
        };
        let decl = match self.function_decl(main) {
            Some(decl) => decl,
            None => return Ok(()),
        };

        let return_type = resolve_type_name(self.ctx, root, &decl.return_type)?;
        let allowed = matches!(
            return_type.as_basic(),
            Some(BasicTy::Void)
                | Some(BasicTy::U32)
                | Some(BasicTy::I32)
                | Some(BasicTy::U16)
                | Some(BasicTy::I16)
                | Some(BasicTy::U8)
                | Some(BasicTy::I8)
        );
        if !allowed {
            return Err(CompilerError::main_signature(
                "main must return void or u32/i32 or smaller integer",
                &decl.span,
            ));
        }

        match decl.arguments.len() {
            0 => {
                self.ctx.fn_info_mut(main).requires_args = false;
            }
            1 => {
                let argument = resolve_type_name(self.ctx, root, &decl.arguments[0].type_name)?;
                let is_string_array = matches!(
                    &argument,
                    Ty::Array(element) if element.kind() == TyKind::Class
                );
                if !is_string_array {
                    return Err(CompilerError::main_signature(
                        "main takes no arguments or the argument vector",
                        &decl.arguments[0].span,
                    ));
                }
                self.ctx.fn_info_mut(main).requires_args = true;
            }
            _ => {
                return Err(CompilerError::main_signature(
                    "main takes no arguments or the argument vector",
                    &decl.span,
                ))
            }
        }

        Ok(())
    }
}
