//! Symbol definitions.
//!
//! A [`Symbol`] is any named entity: variables, patterns, arguments,
//! functions, class members, implementation members, declared types, FFI
//! blocks and namespaces. Each symbol receives a stable `uid` on first scope
//! insertion; the uid doubles as the key into the global generation registry
//! and as the call target token in the IR.

use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use strum_macros::{EnumDiscriminants, EnumIs};

use crate::{
    ast::{
        AstIndex, ClassDefinitionAst, EnumDefinitionAst, FfiDefinitionAst, FunctionDefinitionAst,
        ImplementationDefinitionAst, InterfaceDefinitionAst, TypeAliasAst, VariantDefinitionAst,
    },
    span::Span,
    types::Ty,
};

use super::context::ContextId;

/// Index of a symbol in the compiler's symbol arena.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub usize);

impl SymbolId {
    pub const UNDEFINED: Self = SymbolId(usize::MAX);
}

impl From<usize> for SymbolId {
    fn from(index: usize) -> Self {
        SymbolId(index)
    }
}

/// The declared-type payload of a symbol.
#[derive(Debug, Clone, EnumIs)]
pub enum TypeDeclAst {
    Class(Rc<ClassDefinitionAst>),
    Interface(Rc<InterfaceDefinitionAst>),
    Implementation(Rc<ImplementationDefinitionAst>),
    Variant(Rc<VariantDefinitionAst>),
    Enum(Rc<EnumDefinitionAst>),
    Alias(Rc<TypeAliasAst>),
}

impl TypeDeclAst {
    pub fn name(&self) -> &str {
        match self {
            TypeDeclAst::Class(decl) => &decl.name,
            TypeDeclAst::Interface(decl) => &decl.name,
            TypeDeclAst::Implementation(decl) => &decl.name,
            TypeDeclAst::Variant(decl) => &decl.name,
            TypeDeclAst::Enum(decl) => &decl.name,
            TypeDeclAst::Alias(decl) => &decl.name,
        }
    }
}

/// Every symbol kind known to the compiler.
#[derive(Debug, Clone, EnumIs, EnumDiscriminants)]
#[strum_discriminants(vis(pub), name(SymbolKindDiscriminants))]
pub enum SymbolKind {
    /// A declared local or global variable
    Variable,
    /// A variable bound by a match-arm pattern
    VariablePattern,
    /// A function argument with its declared position
    Argument { index: usize },
    /// A declared function
    Function(Rc<FunctionDefinitionAst>),
    /// A set of functions sharing one name
    OverloadSet(Vec<SymbolId>),
    /// An attribute of a class, addressed by position
    ClassAttribute {
        class: SymbolId,
        attribute_index: usize,
        attribute_uid: u64,
    },
    /// A method of a class, addressed by position
    ClassMethod {
        class: SymbolId,
        method_index: usize,
        /// Slot in the class method table; assigned before lowering and
        /// stable afterwards
        index_in_class: Option<usize>,
    },
    /// An attribute requirement inside an implementation
    ImplementationAttribute {
        implementation: SymbolId,
        attribute_index: usize,
    },
    /// A method carried by an implementation
    ImplementationMethod {
        implementation: SymbolId,
        method_index: usize,
    },
    /// A declared type (class, interface, implementation, variant, enum, alias)
    DeclaredType(TypeDeclAst),
    /// A foreign function interface block
    Ffi(Rc<FfiDefinitionAst>),
    /// A declared namespace with its own context
    Namespace { context: ContextId },
    /// An anonymous function created from a lambda expression
    Lambda(AstIndex),
}

impl SymbolKind {
    /// Kinds that are eagerly registered to the global generation registry.
    pub fn is_globally_registered(&self) -> bool {
        matches!(
            self,
            SymbolKind::Function(_) | SymbolKind::Lambda(_) | SymbolKind::DeclaredType(_)
        )
    }
}

/// A named entity inside a context.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Stable identifier formed from the owning context's uuid, the name and
    /// the insertion index. Empty until the symbol enters a context; required
    /// unique afterwards.
    pub uid: String,
    /// Imported from another package
    pub external: bool,
    /// Not exported from the defining package
    pub is_local: bool,
    /// The context that owns this symbol
    pub context: ContextId,
    pub span: Span,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, span: Span) -> Self {
        Self {
            name: name.into(),
            kind,
            uid: String::new(),
            external: false,
            is_local: false,
            context: ContextId::UNDEFINED,
            span,
        }
    }

    pub fn local(name: impl Into<String>, kind: SymbolKind, span: Span) -> Self {
        let mut symbol = Self::new(name, kind, span);
        symbol.is_local = true;
        symbol
    }
}

/// Per-function codegen bookkeeping collected by scope lookups and inference.
///
/// The upvalue map preserves insertion order; closure captures are emitted in
/// exactly this order at the allocation site.
#[derive(Debug, Clone, Default)]
pub struct FunctionInfo {
    /// The context of the function body
    pub body_context: ContextId,
    /// Captured symbols, keyed by uid, in first-lookup order
    pub upvalues: IndexMap<String, SymbolId>,
    /// Local variables and patterns, from declarations and scope lookups
    pub locals: IndexSet<SymbolId>,
    /// Locals observed as read, for the unused-local warning
    pub used_locals: IndexSet<SymbolId>,
    /// Arguments observed as used
    pub used_args: IndexSet<SymbolId>,
    /// Return statements collected while inferring the body
    pub returns: Vec<(AstIndex, Span)>,
    /// Yield expressions collected while inferring the body
    pub yields: Vec<(AstIndex, Span)>,
    /// Body has been inferred already
    pub inferred: bool,
    /// Resolved return type, available after header inference
    pub return_ty: Option<Ty>,
    /// `main` takes the argument vector
    pub requires_args: bool,
    /// Lowered as an instance method with `this` in slot 0
    pub is_method: bool,
}

impl FunctionInfo {
    /// A function that contains any yield is coroutine-callable.
    pub fn is_coroutine_callable(&self) -> bool {
        !self.yields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn globally_registered_kinds() {
        let function = SymbolKind::Function(Rc::new(FunctionDefinitionAst {
            index: AstIndex(0),
            name: "f".into(),
            generics: Vec::new(),
            arguments: Vec::new(),
            return_type: crate::ast::TypeNameAst::named("void"),
            body: Vec::new(),
            is_local: false,
            span: Span::synthetic(),
        }));
        assert!(function.is_globally_registered());
        assert!(SymbolKind::Lambda(AstIndex(1)).is_globally_registered());
        assert!(!SymbolKind::Variable.is_globally_registered());
        assert!(!SymbolKind::Argument { index: 0 }.is_globally_registered());
    }

    #[test]
    fn coroutine_flag_follows_yields() {
        let mut info = FunctionInfo::default();
        assert!(!info.is_coroutine_callable());
        info.yields.push((AstIndex(3), Span::synthetic()));
        assert!(info.is_coroutine_callable());
    }
}
