//! Packages and import resolution.
//!
//! A [`Package`](package::Package) is the compilation unit for one source
//! file. The [`ImportResolver`](resolver::ImportResolver) drives the external
//! parser, links packages into a DAG and applies the import registration
//! policy; the [`ProjectManifest`](project::ProjectManifest) describes the
//! project the resolver searches.

pub mod declare;
pub mod package;
pub mod project;
pub mod resolver;

pub use declare::declare_package;
pub use package::{Package, PackageId};
pub use project::{CompilerSection, ProjectManifest};
pub use resolver::{ImportResolver, ResolverConfig, SourceParser};
