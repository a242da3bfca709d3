//! Symbols, lexical contexts and the global generation registry.
//!
//! The context graph mirrors lexical nesting: one [`Context`](context::Context)
//! per scope, stored in an arena on the
//! [`CompilerContext`](crate::context::CompilerContext) and addressed by
//! [`ContextId`](context::ContextId). Symbols live in their own arena and are
//! addressed by [`SymbolId`](symbol::SymbolId); all cross-references between
//! scopes, symbols and types are arena indices.

pub mod context;
pub mod global;
pub mod symbol;

pub use context::{Context, ContextId, ContextOwner, ScopeClass};
pub use global::GlobalRegistry;
pub use symbol::{FunctionInfo, Symbol, SymbolId, SymbolKind, TypeDeclAst};
