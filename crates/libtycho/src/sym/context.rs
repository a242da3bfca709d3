//! Lexical contexts.
//!
//! A [`Context`] is one node of the scope tree. Contexts carry the name table
//! of their symbols, environment flags describing where in the program they
//! sit, and the `uuid` that later becomes the jump target of the function body
//! they own. Insertion, lookup and scope classification are implemented on
//! [`CompilerContext`](crate::context::CompilerContext) because they touch the
//! symbol arena and the global registry at the same time.

use indexmap::IndexMap;
use strum_macros::EnumIs;

use crate::{pkg::PackageId, span::Span};

use super::symbol::SymbolId;

/// Index of a context in the compiler's context arena.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ContextId(pub usize);

impl ContextId {
    /// Sentinel for an unset context reference.
    pub const UNDEFINED: Self = ContextId(usize::MAX);
}

impl Default for ContextId {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

impl From<usize> for ContextId {
    fn from(index: usize) -> Self {
        ContextId(index)
    }
}

/// What a context belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIs)]
pub enum ContextOwner {
    None,
    /// A package root
    Package,
    /// A declared function body
    Function(SymbolId),
    /// A lambda body
    Lambda(SymbolId),
    /// A class or implementation method body
    Method(SymbolId),
    /// A namespace block
    Namespace(SymbolId),
    /// A `let .. in` expression
    LetIn,
    /// A `do` expression body
    DoExpression,
    /// A loop body
    Loop,
}

impl ContextOwner {
    /// The function-like symbol this owner stands for, if any.
    pub fn function_symbol(&self) -> Option<SymbolId> {
        match self {
            ContextOwner::Function(symbol)
            | ContextOwner::Lambda(symbol)
            | ContextOwner::Method(symbol) => Some(*symbol),
            _ => None,
        }
    }
}

/// Classification of a name lookup relative to the asking context.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScopeClass {
    /// Defined outside any function: package root or namespace level
    Global,
    /// Defined within the same enclosing function
    Local,
    /// Defined in an enclosing function other than the caller's
    Upvalue,
}

/// One node of the lexical scope tree.
#[derive(Debug, Clone)]
pub struct Context {
    pub id: ContextId,
    pub parent: Option<ContextId>,
    pub owner: ContextOwner,
    /// The package this context belongs to
    pub package: PackageId,
    /// Names declared directly in this context; unique per context
    pub symbols: IndexMap<String, SymbolId>,
    /// Imported aliases; point at symbols owned by other packages
    pub externals: IndexMap<String, SymbolId>,
    /// Generic parameter bindings visible in this context. Uninstantiated
    /// generic headers bind parameter names to generic placeholders; clones
    /// made during monomorphization bind them to concrete types.
    pub bound_generics: IndexMap<String, crate::types::Ty>,
    /// Process-unique id; function-body contexts use it as the IR entry label
    pub uuid: u64,
    pub within_class: bool,
    pub within_loop: bool,
    pub within_function: bool,
    pub within_implementation: bool,
    pub within_do_expression: bool,
    /// The innermost loop context, used to target `break`/`continue`
    pub loop_context: Option<ContextId>,
    /// The class symbol `this` resolves against, when set
    pub active_class: Option<SymbolId>,
    /// The implementation symbol `this` resolves against, when set
    pub active_implementation: Option<SymbolId>,
    /// Where this scope closes in source, recorded for tooling
    pub end_location: Option<Span>,
}

impl Context {
    pub fn new(id: ContextId, uuid: u64, parent: Option<ContextId>, owner: ContextOwner, package: PackageId) -> Self {
        Self {
            id,
            parent,
            owner,
            package,
            symbols: IndexMap::new(),
            externals: IndexMap::new(),
            bound_generics: IndexMap::new(),
            uuid,
            within_class: false,
            within_loop: false,
            within_function: false,
            within_implementation: false,
            within_do_expression: false,
            loop_context: None,
            active_class: None,
            active_implementation: None,
            end_location: None,
        }
    }

    /// Copies the environment flags and active type pointers from a parent.
    pub fn inherit_environment(&mut self, parent: &Context) {
        self.within_class = parent.within_class;
        self.within_loop = parent.within_loop;
        self.within_function = parent.within_function;
        self.within_implementation = parent.within_implementation;
        self.within_do_expression = parent.within_do_expression;
        self.loop_context = parent.loop_context;
        self.active_class = parent.active_class;
        self.active_implementation = parent.active_implementation;
    }

    /// Looks up a name in this context only, aliases included.
    pub fn get(&self, name: &str) -> Option<SymbolId> {
        self.symbols
            .get(name)
            .copied()
            .or_else(|| self.externals.get(name).copied())
    }

    /// True when the name is already taken in this context, owned or aliased.
    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name) || self.externals.contains_key(name)
    }

    pub fn record_end_location(&mut self, span: Span) {
        self.end_location = Some(span);
    }
}
