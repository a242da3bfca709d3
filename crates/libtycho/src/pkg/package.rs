//! The per-file compilation unit.

use std::rc::Rc;

use indexmap::IndexSet;

use crate::{
    ast::{FileAst, NamespaceDefinitionAst},
    file::SourceFile,
    diag::LogSink,
    sym::{ContextId, SymbolId},
};

/// Index of a package in the compiler's package arena.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PackageId(pub usize);

impl PackageId {
    pub const UNDEFINED: Self = PackageId(usize::MAX);
}

impl From<usize> for PackageId {
    fn from(index: usize) -> Self {
        PackageId(index)
    }
}

/// One source file after parsing.
///
/// Holds the root scope, the parsed tree with its import directives and
/// top-level statements, the namespace declarations (their initializers run
/// in declaration order before top-level statements), the classes carrying
/// static initializer blocks, and the accumulated diagnostic log. The global
/// generation registry lives on the
/// [`CompilerContext`](crate::context::CompilerContext) that owns every
/// package.
#[derive(Debug)]
pub struct Package {
    pub id: PackageId,
    /// Normalized path, unique per package
    pub path: String,
    pub file: SourceFile,
    pub root_context: ContextId,
    pub ast: Rc<FileAst>,
    /// Namespace declarations in source order
    pub namespaces: Vec<Rc<NamespaceDefinitionAst>>,
    /// Class symbols that carry a static initializer block
    pub static_blocks: Vec<SymbolId>,
    /// Dedup keys of imports already registered
    pub imports_seen: IndexSet<(String, String, Option<String>)>,
    pub logs: LogSink,
    /// `infer` has completed for this package
    pub inferred: bool,
}

impl Package {
    pub fn new(id: PackageId, path: String, ast: Rc<FileAst>, root_context: ContextId) -> Self {
        Self {
            id,
            path,
            file: ast.file.clone(),
            root_context,
            ast,
            namespaces: Vec::new(),
            static_blocks: Vec::new(),
            imports_seen: IndexSet::new(),
            logs: LogSink::new(),
            inferred: false,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.logs.has_errors()
    }
}
