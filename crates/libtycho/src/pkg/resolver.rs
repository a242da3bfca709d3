//! Import resolution.
//!
//! The resolver drives the external parser. It keeps two maps on the
//! [`CompilerContext`]: normalized path to raw source and normalized path to
//! parsed package. Resolution is memoized and cycle tolerant: a package
//! encountered while it is still being resolved is returned as-is.
//!
//! For every new package the resolver parses the file, declares its symbols,
//! resolves its own imports depth-first, and then invokes inference, giving
//! the leaves-first inference order the rest of the compiler relies on.

use std::path::PathBuf;
use std::rc::Rc;

use indexmap::IndexMap;
use log::debug;

use crate::{
    ast::{AstIndexer, FileAst, ImportAst},
    context::CompilerContext,
    error::CompilerError,
    pkg::{declare_package, Package, PackageId},
    span::Span,
    sym::{ContextOwner, SymbolId, SymbolKind},
};

/// Built-in imports injected into every package that does not carry them:
/// the standard string class, the array-iterator interface and the runtime
/// argument-vector transformer.
pub static BUILT_IN_IMPORTS: [(&[&str], &str); 3] = [
    (&["std", "string"], "String"),
    (&["std", "iterator"], "ArrayIterator"),
    (&["std", "runtime"], "toArgVector"),
];

/// The parser collaborator: turns one file into its AST.
pub trait SourceParser {
    fn parse(&mut self, path: &str, source: &str) -> Result<FileAst, CompilerError>;
}

/// Where the resolver searches for imported files.
#[derive(Debug, Clone, Default)]
pub struct ResolverConfig {
    pub project_dir: PathBuf,
    pub stdlib_dir: PathBuf,
}

/// Resolves imports across packages.
pub struct ImportResolver<P: SourceParser> {
    parser: P,
    config: ResolverConfig,
    /// In-memory sources consulted before the filesystem; keyed by the
    /// normalized relative path
    overlay: IndexMap<String, String>,
    indexer: AstIndexer,
}

impl<P: SourceParser> ImportResolver<P> {
    pub fn new(parser: P, config: ResolverConfig) -> Self {
        Self {
            parser,
            config,
            overlay: IndexMap::new(),
            indexer: AstIndexer::new(),
        }
    }

    /// Registers an in-memory source file, keyed like `a/b/c.tc`.
    pub fn with_source(mut self, path: impl Into<String>, source: impl Into<String>) -> Self {
        self.overlay.insert(path.into(), source.into());
        self
    }

    /// The indexer handed to synthesized import nodes.
    pub fn indexer(&self) -> &AstIndexer {
        &self.indexer
    }

    /// Compiles the entry file and everything it reaches.
    pub fn compile(&mut self, ctx: &mut CompilerContext, entry: &[String]) -> Result<PackageId, CompilerError> {
        self.resolve_package(ctx, entry, None)
    }

    fn normalize(segments: &[String]) -> String {
        format!("{}.tc", segments.join("/"))
    }

    fn locate(&self, relative: &str) -> Option<String> {
        if let Some(source) = self.overlay.get(relative) {
            return Some(source.clone());
        }

        for base in [&self.config.project_dir, &self.config.project_dir.join("deps"), &self.config.stdlib_dir] {
            let candidate = base.join(relative);
            if let Ok(source) = std::fs::read_to_string(&candidate) {
                return Some(source);
            }
        }

        None
    }

    /// Parses and resolves one package, memoized by normalized path.
    pub fn resolve_package(&mut self, ctx: &mut CompilerContext, segments: &[String], import_span: Option<&Span>) -> Result<PackageId, CompilerError> {
        let relative = Self::normalize(segments);

        // Memoized, and the cycle tolerance: a package that exists, even
        // half-resolved, is the package.
        if let Some(existing) = ctx.package_paths.get(&relative) {
            return Ok(*existing);
        }

        let source = match self.locate(&relative) {
            Some(source) => source,
            None => {
                let span = import_span.cloned().unwrap_or_else(Span::synthetic);
                return Err(CompilerError::import_not_found(segments.join("."), &span));
            }
        };

        debug!("resolving package '{relative}'");
        ctx.sources.insert(relative.clone(), source.clone());

        let ast = Rc::new(self.parser.parse(&relative, &source)?);
        let package_id = PackageId(ctx.packages.len());
        let root = ctx.create_context(None, ContextOwner::Package, package_id);
        ctx.packages.push(Package::new(package_id, relative.clone(), ast.clone(), root));
        ctx.package_paths.insert(relative.clone(), package_id);

        declare_package(ctx, package_id)?;

        // The standard library does not re-import itself.
        let mut imports: Vec<ImportAst> = Vec::new();
        if !relative.starts_with("std/") {
            for (base_path, actual_name) in BUILT_IN_IMPORTS {
                let synthetic = ImportAst {
                    index: self.indexer.next(),
                    base_path: base_path.iter().map(|segment| segment.to_string()).collect(),
                    actual_name: actual_name.to_string(),
                    alias: None,
                    sub_imports: Vec::new(),
                    span: Span::synthetic(),
                };
                let present = ast.imports.iter().any(|import| import.dedup_key() == synthetic.dedup_key());
                if !present {
                    imports.push(synthetic);
                }
            }
        }
        imports.extend(ast.imports.iter().cloned());

        for import in &imports {
            self.resolve_import(ctx, package_id, import)?;
        }

        crate::infer::infer_package(ctx, package_id)?;

        Ok(package_id)
    }

    fn resolve_import(&mut self, ctx: &mut CompilerContext, importer: PackageId, import: &ImportAst) -> Result<(), CompilerError> {
        let key = {
            let (base, name, alias) = import.dedup_key();
            (base, name.to_string(), alias.map(str::to_string))
        };
        if !ctx.package_mut(importer).imports_seen.insert(key) {
            // Same (path, name, alias) again: a no-op.
            debug!("duplicate import of '{}' skipped", import.actual_name);
            return Ok(());
        }

        let target = self.resolve_package(ctx, &import.base_path, Some(&import.span))?;
        register_import(ctx, importer, target, import)
    }
}

/// Applies the import registration policy for one resolved import.
pub fn register_import(ctx: &mut CompilerContext, importer: PackageId, target: PackageId, import: &ImportAst) -> Result<(), CompilerError> {
    let importer_root = ctx.package(importer).root_context;
    let target_root = ctx.package(target).root_context;

    if import.is_star() {
        // Bind every exported, owned symbol under its original name.
        let exported: Vec<(String, SymbolId)> = ctx
            .context(target_root)
            .symbols
            .iter()
            .filter(|(_, symbol)| !ctx.symbol(**symbol).is_local)
            .map(|(name, symbol)| (name.clone(), *symbol))
            .collect();

        for (name, symbol) in exported {
            if let Err(error) = ctx.add_external_symbol(importer_root, name, symbol, &import.span) {
                ctx.report(importer_root, error)?;
            }
        }
        return Ok(());
    }

    // Sub-imports hop through namespaces before the final lookup.
    let mut lookup_context = target_root;
    for hop in &import.sub_imports {
        let symbol = match ctx.context(lookup_context).symbols.get(hop.as_str()).copied() {
            Some(symbol) => symbol,
            None => return Err(CompilerError::undefined_symbol(hop.clone(), &import.span)),
        };
        if ctx.symbol(symbol).is_local {
            return Err(CompilerError::local_symbol_import(hop.clone(), &import.span));
        }
        lookup_context = match &ctx.symbol(symbol).kind {
            SymbolKind::Namespace { context } => *context,
            _ => return Err(CompilerError::import_target_not_namespace(hop.clone(), &import.span)),
        };
    }

    let symbol = match ctx.context(lookup_context).symbols.get(import.actual_name.as_str()).copied() {
        Some(symbol) => symbol,
        None => return Err(CompilerError::undefined_symbol(import.actual_name.clone(), &import.span)),
    };

    if ctx.symbol(symbol).is_local {
        return Err(CompilerError::local_symbol_import(import.actual_name.clone(), &import.span));
    }

    // The alias, not the original name, lands in the importing package.
    let bound = import.bound_name().to_string();
    match ctx.add_external_symbol(importer_root, bound, symbol, &import.span) {
        Ok(()) => Ok(()),
        Err(error) => ctx.report(importer_root, error),
    }
}
