//! Tycho Language Compiler Library
//!
//! This is the core library for the Tycho language compiler front-end. It
//! takes parsed source trees through symbol resolution, whole-program type
//! inference and lowering into the register-oriented linear IR consumed by
//! the downstream bytecode assembler.
//!
//! # Overview
//!
//! The pipeline has four stages:
//!
//! 1. **Import resolution**: the [`ImportResolver`](pkg::ImportResolver)
//!    drives the external parser over a project directory, links packages
//!    into a DAG and applies the import registration policy
//! 2. **Declaration**: each package's root context is populated with symbols
//! 3. **Inference**: bidirectional type inference with generic
//!    monomorphization, run per package in leaves-first order
//! 4. **Lowering**: every function, method, lambda and package initializer
//!    becomes a [`FunctionIr`](ir::FunctionIr); register allocation maps the
//!    virtual registers onto the physical file
//!
//! # Architecture
//!
//! - [`ast`]: immutable syntax trees handed over by the parser
//! - [`sym`]: contexts, symbols and the global generation registry
//! - [`pkg`]: packages, import resolution and the project manifest
//! - [`types`]: the type system with assignability and castability
//! - [`infer`]: the inference engine and its side tables
//! - [`ir`]: IR emission, stack layout, CFG and register allocation
//! - [`error`] / [`diag`]: structured diagnostics and accumulated logs
//!
//! # Usage
//!
//! ```ignore
//! use libtycho::{CompilerContext, CompileMode};
//! use libtycho::pkg::{ImportResolver, ResolverConfig};
//!
//! let mut ctx = CompilerContext::new(CompileMode::Compiler);
//! let mut resolver = ImportResolver::new(parser, ResolverConfig::default());
//! let entry = resolver.compile(&mut ctx, &["main".to_string()])?;
//! let module = libtycho::ir::lower_package(&mut ctx, entry)?;
//! print!("{module}");
//! ```
//!
//! # Error Handling
//!
//! In compiler mode the first error of a package unwinds as a
//! [`CompilerError`] and cascades to the importing package. In intellisense
//! mode diagnostics accumulate in each package's [`diag::LogSink`] and no
//! error escapes.

pub mod ast;
pub mod context;
pub mod error;
pub mod file;
pub mod infer;
pub mod ir;
pub mod diag;
pub mod pkg;
pub mod span;
pub mod sym;
pub mod types;

#[cfg(test)]
mod tests;

pub use context::{CompileMode, CompilerContext};
pub use error::CompilerError;
pub use file::SourceFile;
pub use span::Span;

/// Runs inference over one already-resolved package. Idempotent.
pub fn infer_package(ctx: &mut CompilerContext, package: pkg::PackageId) -> Result<(), CompilerError> {
    infer::infer_package(ctx, package)
}

/// Lowers one inferred package into its IR module.
pub fn lower_package(ctx: &mut CompilerContext, package: pkg::PackageId) -> Result<ir::IrModule, CompilerError> {
    ir::lower_package(ctx, package)
}
