//! Central compilation state.
//!
//! The [`CompilerContext`] owns every arena (contexts, symbols, packages),
//! the global generation registry, the inference side tables, the
//! monomorphization cache and all process-wide counters. Nothing in the
//! compiler is global state: embedding hosts create one context per
//! compilation, or call [`CompilerContext::reset`] between runs.
//!
//! Symbol insertion and lookup live here rather than on
//! [`Context`](crate::sym::Context) because they touch the symbol arena, the
//! package log sinks and the global registry in one motion.

use indexmap::IndexMap;
use log::debug;

use crate::{
    ast::AstIndex,
    error::CompilerError,
    infer::InferenceInfo,
    diag::{CompilerLog, LogSink},
    pkg::{Package, PackageId},
    span::Span,
    sym::{Context, ContextId, ContextOwner, FunctionInfo, GlobalRegistry, ScopeClass, Symbol, SymbolId, SymbolKind},
    types::Ty,
};

/// How diagnostics propagate.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CompileMode {
    /// First error aborts the current package
    Compiler,
    /// Errors accumulate in the package log; nothing unwinds
    Intellisense,
}

/// Data layout of one class, computed before lowering.
#[derive(Debug, Clone, Default)]
pub struct ClassLayout {
    pub class_id: u32,
    /// Total byte size of the attribute data area
    pub data_size: usize,
    /// `(name, type, offset, size)` per attribute, in declaration order
    pub attributes: Vec<(String, Ty, usize, usize)>,
    /// Method symbols in method-table order
    pub methods: Vec<SymbolId>,
}

impl ClassLayout {
    pub fn attribute_index(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|(attr, ..)| attr == name)
    }

    pub fn method_index(&self, method: SymbolId) -> Option<usize> {
        self.methods.iter().position(|candidate| *candidate == method)
    }
}

/// The owner of all compilation state.
#[derive(Debug)]
pub struct CompilerContext {
    pub contexts: Vec<Context>,
    pub symbols: Vec<Symbol>,
    pub packages: Vec<Package>,
    /// Normalized path to package
    pub package_paths: IndexMap<String, PackageId>,
    /// Normalized path to raw source
    pub sources: IndexMap<String, String>,
    pub globals: GlobalRegistry,
    /// Codegen bookkeeping per function, lambda and method symbol
    pub fn_infos: IndexMap<SymbolId, FunctionInfo>,
    /// Inference results per expression node, keyed by the owning function so
    /// that clones re-walking a shared AST do not collide
    pub expr_info: IndexMap<(SymbolId, AstIndex), InferenceInfo>,
    /// Resolved types of variable, pattern and argument symbols
    pub var_types: IndexMap<SymbolId, Ty>,
    /// Contexts created for blocks, lambdas and let-in bodies during inference
    pub block_contexts: IndexMap<(SymbolId, AstIndex), ContextId>,
    /// What every call expression resolved to
    pub call_targets: IndexMap<(SymbolId, AstIndex), crate::infer::CallTarget>,
    /// The symbol synthesized for each lambda expression
    pub lambda_symbols: IndexMap<(SymbolId, AstIndex), SymbolId>,
    /// Synthesized declarations backing lambda symbols, for lowering
    pub lambda_decls: IndexMap<SymbolId, std::rc::Rc<crate::ast::FunctionDefinitionAst>>,
    /// Concrete instances of generic symbols: `(generic uid, signature)` to clone
    pub mono_cache: IndexMap<(String, String), SymbolId>,
    /// Layouts of classes whose method tables have been assigned
    pub class_layouts: IndexMap<SymbolId, ClassLayout>,
    /// Member context of every class, interface, implementation and variant
    pub type_contexts: IndexMap<SymbolId, ContextId>,
    /// Ids handed to FFI declarations in declaration order
    pub ffi_ids: IndexMap<SymbolId, u32>,
    /// Functions currently being inferred, to break recursion
    infer_stack: Vec<String>,
    pub mode: CompileMode,
    /// Warnings with no package attribution (synthetic contexts)
    pub orphan_logs: LogSink,
    context_uuid: u64,
    class_id: u32,
    attribute_uid: u64,
    ffi_id: u32,
}

impl Default for CompilerContext {
    fn default() -> Self {
        Self::new(CompileMode::Compiler)
    }
}

impl CompilerContext {
    pub fn new(mode: CompileMode) -> Self {
        Self {
            contexts: Vec::new(),
            symbols: Vec::new(),
            packages: Vec::new(),
            package_paths: IndexMap::new(),
            sources: IndexMap::new(),
            globals: GlobalRegistry::new(),
            fn_infos: IndexMap::new(),
            expr_info: IndexMap::new(),
            var_types: IndexMap::new(),
            block_contexts: IndexMap::new(),
            call_targets: IndexMap::new(),
            lambda_symbols: IndexMap::new(),
            lambda_decls: IndexMap::new(),
            mono_cache: IndexMap::new(),
            class_layouts: IndexMap::new(),
            type_contexts: IndexMap::new(),
            ffi_ids: IndexMap::new(),
            infer_stack: Vec::new(),
            mode,
            orphan_logs: LogSink::new(),
            context_uuid: 0,
            class_id: 0,
            attribute_uid: 0,
            ffi_id: 0,
        }
    }

    /// Clears every arena and counter, for hosts that reuse one instance.
    pub fn reset(&mut self) {
        *self = Self::new(self.mode);
    }

    pub fn next_context_uuid(&mut self) -> u64 {
        let uuid = self.context_uuid;
        self.context_uuid += 1;
        uuid
    }

    pub fn next_class_id(&mut self) -> u32 {
        let id = self.class_id;
        self.class_id += 1;
        id
    }

    pub fn next_attribute_uid(&mut self) -> u64 {
        let uid = self.attribute_uid;
        self.attribute_uid += 1;
        uid
    }

    pub fn next_ffi_id(&mut self) -> u32 {
        let id = self.ffi_id;
        self.ffi_id += 1;
        id
    }

    pub fn context(&self, id: ContextId) -> &Context {
        &self.contexts[id.0]
    }

    pub fn context_mut(&mut self, id: ContextId) -> &mut Context {
        &mut self.contexts[id.0]
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0]
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.0]
    }

    pub fn package(&self, id: PackageId) -> &Package {
        &self.packages[id.0]
    }

    pub fn package_mut(&mut self, id: PackageId) -> &mut Package {
        &mut self.packages[id.0]
    }

    /// Creates a context. Environment flags are inherited from the parent.
    pub fn create_context(&mut self, parent: Option<ContextId>, owner: ContextOwner, package: PackageId) -> ContextId {
        let id = ContextId(self.contexts.len());
        let uuid = self.next_context_uuid();
        let mut context = Context::new(id, uuid, parent, owner, package);

        if let Some(parent_id) = parent {
            let parent = &self.contexts[parent_id.0];
            context.inherit_environment(parent);
        }

        match owner {
            ContextOwner::Function(_) | ContextOwner::Lambda(_) | ContextOwner::Method(_) => {
                context.within_function = true;
            }
            ContextOwner::Loop => {
                context.within_loop = true;
                context.loop_context = Some(id);
            }
            ContextOwner::DoExpression => context.within_do_expression = true,
            _ => {}
        }

        debug!("new context {} (uuid {uuid}) under {:?}", id.0, parent.map(|p| p.0));
        self.contexts.push(context);
        id
    }

    /// Shallow-copies a context for generic monomorphization: environment
    /// flags and active class survive, the symbol tables start empty.
    pub fn clone_context_for_generics(&mut self, source: ContextId, parent: Option<ContextId>) -> ContextId {
        let id = ContextId(self.contexts.len());
        let uuid = self.next_context_uuid();
        let template = &self.contexts[source.0];

        let mut context = Context::new(id, uuid, parent, template.owner, template.package);
        context.inherit_environment(template);

        self.contexts.push(context);
        id
    }

    /// Routes a diagnostic to the owning package's sink.
    pub fn push_log(&mut self, context: ContextId, log: CompilerLog) {
        let package = self.contexts[context.0].package;
        if package == PackageId::UNDEFINED || package.0 >= self.packages.len() {
            self.orphan_logs.push(log);
        } else {
            self.packages[package.0].logs.push(log);
        }
    }

    /// Applies the propagation policy: compiler mode returns the error,
    /// intellisense mode accumulates it and continues.
    pub fn report(&mut self, context: ContextId, error: CompilerError) -> Result<(), CompilerError> {
        match self.mode {
            CompileMode::Compiler => Err(error),
            CompileMode::Intellisense => {
                let file = self.contexts[context.0].package;
                let file = if file == PackageId::UNDEFINED || file.0 >= self.packages.len() {
                    crate::file::SourceFile::synthetic("unknown")
                } else {
                    self.packages[file.0].file.clone()
                };
                self.push_log(context, error.into_log(&file));
                Ok(())
            }
        }
    }

    /// Inserts a symbol into a context.
    ///
    /// Fails when the name already exists in the same context. Shadowing an
    /// ancestor's symbol only warns. The uid is assigned here, exactly once;
    /// handing an already-inserted symbol in again is a caller bug.
    pub fn add_symbol(&mut self, context_id: ContextId, mut symbol: Symbol) -> Result<SymbolId, CompilerError> {
        assert!(symbol.uid.is_empty(), "symbol '{}' was already inserted into a context", symbol.name);

        let context = &self.contexts[context_id.0];
        if let Some(existing) = context.get(&symbol.name) {
            let old_span = self.symbols[existing.0].span.clone();
            return Err(CompilerError::duplicate_symbol(symbol.name.clone(), &symbol.span, &old_span));
        }

        if let Some(parent) = context.parent {
            if self.lookup(parent, &symbol.name).is_some() {
                let log = CompilerLog::warning(
                    format!("'{}' shadows a symbol from an outer scope", symbol.name),
                    &symbol.span,
                    "shadowed here",
                );
                self.push_log(context_id, log);
            }
        }

        let context = &mut self.contexts[context_id.0];
        let index = context.symbols.len();
        symbol.uid = format!("{}_{}_{}", context.uuid, symbol.name, index);
        symbol.context = context_id;

        let symbol_id = SymbolId(self.symbols.len());
        let name = symbol.name.clone();
        let uid = symbol.uid.clone();
        let registrable = symbol.kind.is_globally_registered() || context.owner.is_package();

        context.symbols.insert(name.clone(), symbol_id);
        debug!("add symbol '{name}' as {uid} into context {}", context_id.0);
        self.symbols.push(symbol);

        if registrable {
            self.globals.register(uid, symbol_id);
        }

        Ok(symbol_id)
    }

    /// Installs an alias to a foreign symbol without taking ownership.
    pub fn add_external_symbol(&mut self, context_id: ContextId, alias: impl Into<String>, target: SymbolId, span: &Span) -> Result<(), CompilerError> {
        let alias = alias.into();
        let context = &self.contexts[context_id.0];
        if let Some(existing) = context.get(&alias) {
            let old_span = self.symbols[existing.0].span.clone();
            return Err(CompilerError::duplicate_symbol(alias, span, &old_span));
        }

        debug!("alias '{alias}' -> {} in context {}", self.symbols[target.0].uid, context_id.0);
        self.contexts[context_id.0].externals.insert(alias, target);
        Ok(())
    }

    /// Adds a symbol to the arena without inserting it into any context's
    /// name table. Used for monomorphized clones, which are addressed through
    /// the cache and the global registry rather than by name.
    pub fn add_detached_symbol(&mut self, mut symbol: Symbol, uid: String) -> SymbolId {
        assert!(symbol.uid.is_empty(), "symbol '{}' was already inserted into a context", symbol.name);
        symbol.uid = uid.clone();

        let symbol_id = SymbolId(self.symbols.len());
        self.symbols.push(symbol);
        self.globals.register(uid, symbol_id);
        symbol_id
    }

    /// Resolves a generic parameter name through the context chain.
    pub fn lookup_bound_generic(&self, context_id: ContextId, name: &str) -> Option<Ty> {
        let mut current = Some(context_id);
        while let Some(id) = current {
            let context = &self.contexts[id.0];
            if let Some(ty) = context.bound_generics.get(name) {
                return Some(ty.clone());
            }
            current = context.parent;
        }
        None
    }

    /// Walks parents until the name is found.
    pub fn lookup(&self, context_id: ContextId, name: &str) -> Option<SymbolId> {
        let mut current = Some(context_id);
        while let Some(id) = current {
            let context = &self.contexts[id.0];
            if let Some(symbol) = context.get(name) {
                return Some(symbol);
            }
            current = context.parent;
        }
        None
    }

    /// Looks a name up and classifies the hit as global, local or upvalue.
    ///
    /// Side effects, by symbol kind: local variables and patterns register on
    /// the enclosing function's bookkeeping; arguments are marked used;
    /// symbols resolved across a function boundary register as upvalues on the
    /// asking function and every intermediate one.
    pub fn lookup_scope(&mut self, context_id: ContextId, name: &str) -> Option<(SymbolId, ScopeClass)> {
        let symbol_id = self.lookup(context_id, name)?;

        let caller_fn = self.find_parent_function(context_id);
        let defining_context = self.symbols[symbol_id.0].context;
        let symbol_fn = self.find_parent_function(defining_context);

        let class = match (caller_fn, symbol_fn) {
            (_, None) => ScopeClass::Global,
            (Some(caller), Some(owner)) if caller == owner => {
                match self.symbols[symbol_id.0].kind {
                    SymbolKind::Variable | SymbolKind::VariablePattern => {
                        let info = self.fn_info_mut(owner);
                        info.locals.insert(symbol_id);
                        info.used_locals.insert(symbol_id);
                    }
                    SymbolKind::Argument { .. } => {
                        self.fn_info_mut(owner).used_args.insert(symbol_id);
                    }
                    _ => {}
                }
                ScopeClass::Local
            }
            (_, Some(owner)) => {
                self.register_upvalue(context_id, symbol_id, owner);
                ScopeClass::Upvalue
            }
        };

        Some((symbol_id, class))
    }

    /// Classifies an already-resolved symbol relative to a context, with no
    /// bookkeeping side effects. Lowering uses this to pick the storage kind
    /// of a load without re-registering upvalues.
    pub fn classify(&self, context_id: ContextId, symbol_id: SymbolId) -> ScopeClass {
        let caller_fn = self.find_parent_function(context_id);
        let symbol_fn = self.find_parent_function(self.symbols[symbol_id.0].context);

        match (caller_fn, symbol_fn) {
            (_, None) => ScopeClass::Global,
            (Some(caller), Some(owner)) if caller == owner => ScopeClass::Local,
            _ => ScopeClass::Upvalue,
        }
    }

    /// Registers `symbol` as an upvalue on every function between the asking
    /// context and the function that defines it, innermost first.
    fn register_upvalue(&mut self, from: ContextId, symbol_id: SymbolId, defining_fn: SymbolId) {
        let uid = self.symbols[symbol_id.0].uid.clone();
        let mut current = Some(from);

        while let Some(id) = current {
            let context = &self.contexts[id.0];
            let parent = context.parent;
            let owner_fn = context.owner.function_symbol();
            if let Some(function) = owner_fn {
                if function == defining_fn {
                    break;
                }
                debug!("upvalue '{uid}' captured by {}", self.symbols[function.0].uid);
                self.fn_info_mut(function).upvalues.insert(uid.clone(), symbol_id);
            }
            current = parent;
        }
    }

    /// The key namespace for per-expression side tables: the enclosing
    /// function symbol, or the undefined sentinel at package level.
    pub fn owner_of(&self, context_id: ContextId) -> SymbolId {
        self.find_parent_function(context_id).unwrap_or(SymbolId::UNDEFINED)
    }

    /// The nearest enclosing function-like symbol of a context.
    pub fn find_parent_function(&self, context_id: ContextId) -> Option<SymbolId> {
        let mut current = Some(context_id);
        while let Some(id) = current {
            let context = &self.contexts[id.0];
            if let Some(function) = context.owner.function_symbol() {
                return Some(function);
            }
            current = context.parent;
        }
        None
    }

    /// The nearest enclosing loop context.
    pub fn find_parent_loop(&self, context_id: ContextId) -> Option<ContextId> {
        let mut current = Some(context_id);
        while let Some(id) = current {
            let context = &self.contexts[id.0];
            if let Some(loop_context) = context.loop_context {
                return Some(loop_context);
            }
            current = context.parent;
        }
        None
    }

    /// The nearest enclosing do-expression context.
    pub fn find_parent_do_expression(&self, context_id: ContextId) -> Option<ContextId> {
        let mut current = Some(context_id);
        while let Some(id) = current {
            let context = &self.contexts[id.0];
            if context.owner == ContextOwner::DoExpression {
                return Some(id);
            }
            current = context.parent;
        }
        None
    }

    /// The class `this` resolves to, searched up the chain until set.
    pub fn active_class(&self, context_id: ContextId) -> Option<SymbolId> {
        let mut current = Some(context_id);
        while let Some(id) = current {
            let context = &self.contexts[id.0];
            if let Some(class) = context.active_class {
                return Some(class);
            }
            current = context.parent;
        }
        None
    }

    /// The implementation `this` resolves to, searched up the chain until set.
    pub fn active_implementation(&self, context_id: ContextId) -> Option<SymbolId> {
        let mut current = Some(context_id);
        while let Some(id) = current {
            let context = &self.contexts[id.0];
            if let Some(implementation) = context.active_implementation {
                return Some(implementation);
            }
            current = context.parent;
        }
        None
    }

    pub fn fn_info(&self, symbol: SymbolId) -> Option<&FunctionInfo> {
        self.fn_infos.get(&symbol)
    }

    pub fn fn_info_mut(&mut self, symbol: SymbolId) -> &mut FunctionInfo {
        self.fn_infos.entry(symbol).or_default()
    }

    /// Pushes a function uid onto the inference stack. Returns false when the
    /// uid is already being inferred, which breaks recursive cycles.
    pub fn infer_stack_enter(&mut self, uid: &str) -> bool {
        if self.infer_stack.iter().any(|entry| entry == uid) {
            return false;
        }
        self.infer_stack.push(uid.to_string());
        true
    }

    /// Pops the top of the inference stack. Callers pop on every exit path.
    pub fn infer_stack_leave(&mut self, uid: &str) {
        debug_assert_eq!(self.infer_stack.last().map(String::as_str), Some(uid));
        self.infer_stack.pop();
    }

    /// Qualified names of all declared types, for not-found suggestions.
    pub fn known_type_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for package in &self.packages {
            let root = &self.contexts[package.root_context.0];
            for (name, symbol) in &root.symbols {
                if self.symbols[symbol.0].kind.is_declared_type() {
                    names.push(format!("{}.{}", package.path, name));
                }
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::{ast::FileAst, file::SourceFile, sym::SymbolKind};

    fn test_context() -> (CompilerContext, ContextId) {
        let mut ctx = CompilerContext::default();
        let file = SourceFile::new(vec!["test".into()], "source".to_string());
        let ast = Rc::new(FileAst::new(file));
        let package_id = PackageId(0);
        let root = ctx.create_context(None, ContextOwner::Package, package_id);
        ctx.packages.push(Package::new(package_id, "test".into(), ast, root));
        ctx.package_paths.insert("test".into(), package_id);
        (ctx, root)
    }

    fn variable(name: &str) -> Symbol {
        Symbol::new(name, SymbolKind::Variable, Span::synthetic())
    }

    #[test]
    fn add_then_lookup_same_context() {
        let (mut ctx, root) = test_context();
        let id = ctx.add_symbol(root, variable("x")).unwrap();
        assert_eq!(ctx.lookup(root, "x"), Some(id));
        assert_eq!(ctx.lookup(root, "y"), None);
    }

    #[test]
    fn lookup_does_not_descend() {
        let (mut ctx, root) = test_context();
        let child = ctx.create_context(Some(root), ContextOwner::LetIn, PackageId(0));
        ctx.add_symbol(child, variable("inner")).unwrap();
        assert_eq!(ctx.lookup(root, "inner"), None);
        assert!(ctx.lookup(child, "inner").is_some());
    }

    #[test]
    fn duplicate_symbol_in_same_context_fails() {
        let (mut ctx, root) = test_context();
        ctx.add_symbol(root, variable("x")).unwrap();
        let result = ctx.add_symbol(root, variable("x"));
        assert!(result.is_err());
    }

    #[test]
    fn shadowing_warns_but_succeeds() {
        let (mut ctx, root) = test_context();
        ctx.add_symbol(root, variable("x")).unwrap();
        let child = ctx.create_context(Some(root), ContextOwner::LetIn, PackageId(0));
        ctx.add_symbol(child, variable("x")).unwrap();

        let logs = ctx.package(PackageId(0)).logs.logs();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].message.contains("shadows"));
        assert!(!ctx.package(PackageId(0)).has_errors());
    }

    #[test]
    fn uids_are_unique_across_contexts() {
        let (mut ctx, root) = test_context();
        let a = ctx.add_symbol(root, variable("x")).unwrap();
        let child = ctx.create_context(Some(root), ContextOwner::LetIn, PackageId(0));
        let b = ctx.add_symbol(child, variable("x")).unwrap();
        assert_ne!(ctx.symbol(a).uid, ctx.symbol(b).uid);
        assert!(!ctx.symbol(a).uid.is_empty());
    }

    #[test]
    fn root_context_symbols_reach_global_registry() {
        let (mut ctx, root) = test_context();
        let id = ctx.add_symbol(root, variable("g")).unwrap();
        let uid = ctx.symbol(id).uid.clone();
        assert_eq!(ctx.globals.get(&uid), Some(id));
    }

    #[test]
    fn upvalue_classification_and_registration() {
        let (mut ctx, root) = test_context();

        // outer function with a local
        let outer_sym = ctx.add_symbol(root, Symbol::new("outer", SymbolKind::Lambda(crate::ast::AstIndex(0)), Span::synthetic())).unwrap();
        let outer_body = ctx.create_context(Some(root), ContextOwner::Function(outer_sym), PackageId(0));
        let captured = ctx.add_symbol(outer_body, variable("captured")).unwrap();

        // inner function looking the local up
        let inner_sym = ctx.add_symbol(outer_body, Symbol::new("inner", SymbolKind::Lambda(crate::ast::AstIndex(1)), Span::synthetic())).unwrap();
        let inner_body = ctx.create_context(Some(outer_body), ContextOwner::Lambda(inner_sym), PackageId(0));

        let (found, class) = ctx.lookup_scope(inner_body, "captured").unwrap();
        assert_eq!(found, captured);
        assert_eq!(class, ScopeClass::Upvalue);

        let info = ctx.fn_info(inner_sym).unwrap();
        assert_eq!(info.upvalues.len(), 1);
        assert_eq!(*info.upvalues.get_index(0).unwrap().1, captured);

        // the defining function does not see its own local as an upvalue
        assert!(ctx.fn_info(outer_sym).map(|info| info.upvalues.is_empty()).unwrap_or(true));
    }

    #[test]
    fn local_and_global_classification() {
        let (mut ctx, root) = test_context();
        ctx.add_symbol(root, variable("global_var")).unwrap();

        let fn_sym = ctx.add_symbol(root, Symbol::new("f", SymbolKind::Lambda(crate::ast::AstIndex(0)), Span::synthetic())).unwrap();
        let body = ctx.create_context(Some(root), ContextOwner::Function(fn_sym), PackageId(0));
        let local = ctx.add_symbol(body, variable("local_var")).unwrap();

        assert_eq!(ctx.lookup_scope(body, "global_var").unwrap().1, ScopeClass::Global);
        assert_eq!(ctx.lookup_scope(body, "local_var").unwrap().1, ScopeClass::Local);
        assert!(ctx.fn_info(fn_sym).unwrap().locals.contains(&local));
    }

    #[test]
    fn infer_stack_breaks_cycles() {
        let mut ctx = CompilerContext::default();
        assert!(ctx.infer_stack_enter("f"));
        assert!(!ctx.infer_stack_enter("f"));
        ctx.infer_stack_leave("f");
        assert!(ctx.infer_stack_enter("f"));
        ctx.infer_stack_leave("f");
    }

    #[test]
    fn reset_clears_counters() {
        let mut ctx = CompilerContext::default();
        ctx.next_context_uuid();
        ctx.next_class_id();
        ctx.reset();
        assert_eq!(ctx.next_context_uuid(), 0);
        assert_eq!(ctx.next_class_id(), 0);
    }
}
