//! Compiler error system.
//!
//! Fatal diagnostics used in compiler mode. Every error struct carries the
//! labeled source span and the source code it points into; category enums wrap
//! the boxed structs transparently so a single [`CompilerError`] travels up to
//! the driver. In intellisense mode the same information is converted into a
//! [`CompilerLog`](crate::diag::CompilerLog) and accumulated instead.
//!
//! # Error Categories
//!
//! - [`SymbolError`]: duplicate/undefined symbols, import failures
//! - [`TypeError`]: assignability, castability, generics, call shape
//! - [`SemanticError`]: control-flow and declaration discipline
//! - [`CodegenError`]: internal lowering invariants (bug indicators)

use miette::{Diagnostic, NamedSource, SourceSpan};
use strum_macros::EnumDiscriminants;
use thiserror::Error;

use crate::{file::SourceFile, diag::{CompilerLog, LogKind}, span::Span};

/// Default help message for type-not-found errors when no similar type exists.
pub static TYPE_NOT_FOUND_HELP: &str = "try to import the type, or maybe you need to define it in the current file";

/// A name is declared twice in the same context.
#[derive(Debug, Error, Diagnostic)]
#[error("'{name}' is already defined in this scope")]
#[diagnostic(code("tycho::symbol::duplicate"), help("change one of the names or remove the definition"))]
pub struct DuplicateSymbol {
    pub name: String,

    #[label("already defined here")]
    pub old_position: SourceSpan,

    #[label("but it is defined again here")]
    pub new_position: SourceSpan,

    #[source_code]
    pub code: NamedSource<String>,
}

/// A name could not be resolved in any enclosing context.
#[derive(Debug, Error, Diagnostic)]
#[error("'{name}' is not defined")]
#[diagnostic(code("tycho::symbol::undefined"))]
pub struct UndefinedSymbol {
    pub name: String,

    #[label("no symbol with this name is reachable from here")]
    pub position: SourceSpan,

    #[source_code]
    pub code: NamedSource<String>,
}

/// An imported path does not resolve to any package file.
#[derive(Debug, Error, Diagnostic)]
#[error("'{path}' not found")]
#[diagnostic(code("tycho::symbol::import_not_found"), help("check the import path against the project, deps and stdlib directories"))]
pub struct ImportNotFound {
    pub path: String,

    #[label("no package found for this import")]
    pub position: SourceSpan,

    #[source_code]
    pub code: NamedSource<String>,
}

/// A sub-import hop landed on something that is not a namespace.
#[derive(Debug, Error, Diagnostic)]
#[error("'{name}' is not a namespace")]
#[diagnostic(code("tycho::symbol::import_target_not_namespace"))]
pub struct ImportTargetNotNamespace {
    pub name: String,

    #[label("sub-imports can only traverse namespaces")]
    pub position: SourceSpan,

    #[source_code]
    pub code: NamedSource<String>,
}

/// The imported symbol is marked local and is not exported.
#[derive(Debug, Error, Diagnostic)]
#[error("'{name}' is local to its package and cannot be imported")]
#[diagnostic(code("tycho::symbol::local_import"), help("remove the local marker from the declaration to export it"))]
pub struct LocalSymbolImport {
    pub name: String,

    #[label("this symbol is not exported")]
    pub position: SourceSpan,

    #[source_code]
    pub code: NamedSource<String>,
}

/// Symbol-category errors.
#[derive(Debug, Error, Diagnostic, EnumDiscriminants)]
pub enum SymbolError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Duplicate(Box<DuplicateSymbol>),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Undefined(Box<UndefinedSymbol>),

    #[error(transparent)]
    #[diagnostic(transparent)]
    ImportNotFound(Box<ImportNotFound>),

    #[error(transparent)]
    #[diagnostic(transparent)]
    ImportTargetNotNamespace(Box<ImportTargetNotNamespace>),

    #[error(transparent)]
    #[diagnostic(transparent)]
    LocalSymbolImport(Box<LocalSymbolImport>),
}

/// A referenced type name could not be found.
#[derive(Debug, Error, Diagnostic)]
#[error("'{type_name}' type not found")]
#[diagnostic(code("tycho::type::not_found"))]
pub struct TypeNotFound {
    pub type_name: String,

    #[label("type is not imported or defined in the current file")]
    pub position: SourceSpan,

    #[source_code]
    pub code: NamedSource<String>,

    /// Contextual advice including similar type suggestions
    #[help]
    pub advice: Option<String>,
}

/// A value of one type was used where another is required.
#[derive(Debug, Error, Diagnostic)]
#[error("cannot assign '{from}' to '{to}'")]
#[diagnostic(code("tycho::type::cannot_assign"))]
pub struct CannotAssign {
    pub from: String,
    pub to: String,

    #[label("{reason}")]
    pub position: SourceSpan,

    pub reason: String,

    #[source_code]
    pub code: NamedSource<String>,
}

/// No cast exists between two types.
#[derive(Debug, Error, Diagnostic)]
#[error("cannot cast '{from}' to '{to}'")]
#[diagnostic(code("tycho::type::cannot_cast"))]
pub struct CannotCast {
    pub from: String,
    pub to: String,

    #[label("{reason}")]
    pub position: SourceSpan,

    pub reason: String,

    #[source_code]
    pub code: NamedSource<String>,
}

/// A generic symbol was given the wrong number of type arguments.
#[derive(Debug, Error, Diagnostic)]
#[error("expected {expected} type argument(s), found {found}")]
#[diagnostic(code("tycho::type::generic_arity"))]
pub struct GenericArityMismatch {
    pub expected: usize,
    pub found: usize,

    #[label("wrong number of type arguments")]
    pub position: SourceSpan,

    #[source_code]
    pub code: NamedSource<String>,
}

/// A type argument does not satisfy the parameter's constraint.
#[derive(Debug, Error, Diagnostic)]
#[error("'{type_name}' does not satisfy constraint '{constraint}'")]
#[diagnostic(code("tycho::type::constraint"))]
pub struct ConstraintNotSatisfied {
    pub type_name: String,
    pub constraint: String,

    #[label("constraint is not satisfied here")]
    pub position: SourceSpan,

    #[source_code]
    pub code: NamedSource<String>,
}

/// More than one overload candidate matches the call site.
#[derive(Debug, Error, Diagnostic)]
#[error("ambiguous call to '{name}': {candidates} candidates match")]
#[diagnostic(code("tycho::type::ambiguous_overload"), help("add explicit argument types or a cast to disambiguate"))]
pub struct AmbiguousOverload {
    pub name: String,
    pub candidates: usize,

    #[label("call is ambiguous")]
    pub position: SourceSpan,

    #[source_code]
    pub code: NamedSource<String>,
}

/// Field or method access on a type that does not have it.
#[derive(Debug, Error, Diagnostic)]
#[error("'{base}' has no member '{member}'")]
#[diagnostic(code("tycho::type::undefined_member"))]
pub struct UndefinedMember {
    pub base: String,
    pub member: String,

    #[label("member does not exist")]
    pub position: SourceSpan,

    #[source_code]
    pub code: NamedSource<String>,
}

/// A call site passed the wrong number of arguments.
#[derive(Debug, Error, Diagnostic)]
#[error("'{name}' expects {expected} argument(s), found {found}")]
#[diagnostic(code("tycho::type::wrong_arity"))]
pub struct WrongArity {
    pub name: String,
    pub expected: usize,
    pub found: usize,

    #[label("wrong number of arguments")]
    pub position: SourceSpan,

    #[source_code]
    pub code: NamedSource<String>,
}

/// Type-category errors.
#[derive(Debug, Error, Diagnostic, EnumDiscriminants)]
pub enum TypeError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    NotFound(Box<TypeNotFound>),

    #[error(transparent)]
    #[diagnostic(transparent)]
    CannotAssign(Box<CannotAssign>),

    #[error(transparent)]
    #[diagnostic(transparent)]
    CannotCast(Box<CannotCast>),

    #[error(transparent)]
    #[diagnostic(transparent)]
    GenericArity(Box<GenericArityMismatch>),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Constraint(Box<ConstraintNotSatisfied>),

    #[error(transparent)]
    #[diagnostic(transparent)]
    AmbiguousOverload(Box<AmbiguousOverload>),

    #[error(transparent)]
    #[diagnostic(transparent)]
    UndefinedMember(Box<UndefinedMember>),

    #[error(transparent)]
    #[diagnostic(transparent)]
    WrongArity(Box<WrongArity>),
}

/// A generic semantic rule violation with a fixed message.
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code("tycho::semantic"))]
pub struct SemanticViolation {
    pub message: String,

    #[label("{label}")]
    pub position: SourceSpan,

    pub label: String,

    #[source_code]
    pub code: NamedSource<String>,
}

/// Semantic-category errors.
#[derive(Debug, Error, Diagnostic, EnumDiscriminants)]
pub enum SemanticError {
    /// `return` inside a coroutine-callable function
    #[error(transparent)]
    #[diagnostic(transparent)]
    ReturnInCoroutine(Box<SemanticViolation>),

    /// `yield` outside of any function body
    #[error(transparent)]
    #[diagnostic(transparent)]
    YieldOutsideFunction(Box<SemanticViolation>),

    /// `break` or `continue` outside a loop
    #[error(transparent)]
    #[diagnostic(transparent)]
    JumpOutsideLoop(Box<SemanticViolation>),

    /// attribute named `init` collides with the constructor slot
    #[error(transparent)]
    #[diagnostic(transparent)]
    InitNameCollision(Box<SemanticViolation>),

    /// `main` has an unsupported signature
    #[error(transparent)]
    #[diagnostic(transparent)]
    MainSignature(Box<SemanticViolation>),

    /// any other semantic rule violation
    #[error(transparent)]
    #[diagnostic(transparent)]
    Other(Box<SemanticViolation>),
}

/// Internal invariant broken during lowering. Always a compiler bug when seen.
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code("tycho::codegen::internal"), help("this is a compiler bug, please report it"))]
pub struct InternalCodegen {
    pub message: String,

    #[label("while lowering this expression")]
    pub position: SourceSpan,

    #[source_code]
    pub code: NamedSource<String>,
}

/// A construct whose semantics are reserved and not yet defined.
#[derive(Debug, Error, Diagnostic)]
#[error("'{construct}' is not yet implemented")]
#[diagnostic(code("tycho::codegen::not_yet_implemented"))]
pub struct NotYetImplemented {
    pub construct: String,

    #[label("this construct is reserved")]
    pub position: SourceSpan,

    #[source_code]
    pub code: NamedSource<String>,
}

/// Codegen-category errors.
#[derive(Debug, Error, Diagnostic, EnumDiscriminants)]
pub enum CodegenError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    MissingAnnotation(Box<InternalCodegen>),

    #[error(transparent)]
    #[diagnostic(transparent)]
    UnknownArgument(Box<InternalCodegen>),

    #[error(transparent)]
    #[diagnostic(transparent)]
    NotYetImplemented(Box<NotYetImplemented>),
}

/// Several errors gathered from one compilation run.
#[derive(Debug, Error, Diagnostic)]
#[error("{} error(s) detected", .errors.len())]
pub struct ErrorCollection {
    #[related]
    pub errors: Vec<CompilerError>,
}

/// Top-level compiler error.
#[derive(Debug, Error, Diagnostic, EnumDiscriminants)]
pub enum CompilerError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Symbol(#[from] SymbolError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Semantic(#[from] SemanticError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Codegen(#[from] CodegenError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Collection(Box<ErrorCollection>),
}

impl CompilerError {
    pub fn duplicate_symbol(name: impl Into<String>, new: &Span, old: &Span) -> Self {
        SymbolError::Duplicate(DuplicateSymbol {
            name: name.into(),
            old_position: old.to_range().into(),
            new_position: new.to_range().into(),
            code: (&new.file).into(),
        }.into()).into()
    }

    pub fn undefined_symbol(name: impl Into<String>, span: &Span) -> Self {
        SymbolError::Undefined(UndefinedSymbol {
            name: name.into(),
            position: span.to_range().into(),
            code: (&span.file).into(),
        }.into()).into()
    }

    pub fn import_not_found(path: impl Into<String>, span: &Span) -> Self {
        SymbolError::ImportNotFound(ImportNotFound {
            path: path.into(),
            position: span.to_range().into(),
            code: (&span.file).into(),
        }.into()).into()
    }

    pub fn import_target_not_namespace(name: impl Into<String>, span: &Span) -> Self {
        SymbolError::ImportTargetNotNamespace(ImportTargetNotNamespace {
            name: name.into(),
            position: span.to_range().into(),
            code: (&span.file).into(),
        }.into()).into()
    }

    pub fn local_symbol_import(name: impl Into<String>, span: &Span) -> Self {
        SymbolError::LocalSymbolImport(LocalSymbolImport {
            name: name.into(),
            position: span.to_range().into(),
            code: (&span.file).into(),
        }.into()).into()
    }

    /// Builds a type-not-found error, listing similarly named candidates.
    pub fn type_not_found<'a>(known_types: impl Iterator<Item = &'a str>, missing: String, span: &Span) -> Self {
        let mut similar = Vec::new();
        for name in known_types {
            if name.ends_with(missing.as_str()) {
                similar.push(name.to_string());
            }
        }

        let advice = if !similar.is_empty() {
            let list = similar.iter().map(|item| format!(" - {item}")).collect::<Vec<_>>().join("\n");
            format!("The following types are similar:\n{list}")
        } else {
            TYPE_NOT_FOUND_HELP.to_string()
        };

        TypeError::NotFound(TypeNotFound {
            type_name: missing,
            position: span.to_range().into(),
            code: (&span.file).into(),
            advice: Some(advice),
        }.into()).into()
    }

    pub fn cannot_assign(from: impl Into<String>, to: impl Into<String>, reason: impl Into<String>, span: &Span) -> Self {
        TypeError::CannotAssign(CannotAssign {
            from: from.into(),
            to: to.into(),
            reason: reason.into(),
            position: span.to_range().into(),
            code: (&span.file).into(),
        }.into()).into()
    }

    pub fn cannot_cast(from: impl Into<String>, to: impl Into<String>, reason: impl Into<String>, span: &Span) -> Self {
        TypeError::CannotCast(CannotCast {
            from: from.into(),
            to: to.into(),
            reason: reason.into(),
            position: span.to_range().into(),
            code: (&span.file).into(),
        }.into()).into()
    }

    pub fn generic_arity(expected: usize, found: usize, span: &Span) -> Self {
        TypeError::GenericArity(GenericArityMismatch {
            expected,
            found,
            position: span.to_range().into(),
            code: (&span.file).into(),
        }.into()).into()
    }

    pub fn constraint_not_satisfied(type_name: impl Into<String>, constraint: impl Into<String>, span: &Span) -> Self {
        TypeError::Constraint(ConstraintNotSatisfied {
            type_name: type_name.into(),
            constraint: constraint.into(),
            position: span.to_range().into(),
            code: (&span.file).into(),
        }.into()).into()
    }

    pub fn ambiguous_overload(name: impl Into<String>, candidates: usize, span: &Span) -> Self {
        TypeError::AmbiguousOverload(AmbiguousOverload {
            name: name.into(),
            candidates,
            position: span.to_range().into(),
            code: (&span.file).into(),
        }.into()).into()
    }

    pub fn undefined_member(base: impl Into<String>, member: impl Into<String>, span: &Span) -> Self {
        TypeError::UndefinedMember(UndefinedMember {
            base: base.into(),
            member: member.into(),
            position: span.to_range().into(),
            code: (&span.file).into(),
        }.into()).into()
    }

    pub fn wrong_arity(name: impl Into<String>, expected: usize, found: usize, span: &Span) -> Self {
        TypeError::WrongArity(WrongArity {
            name: name.into(),
            expected,
            found,
            position: span.to_range().into(),
            code: (&span.file).into(),
        }.into()).into()
    }

    fn violation(message: impl Into<String>, label: impl Into<String>, span: &Span) -> Box<SemanticViolation> {
        SemanticViolation {
            message: message.into(),
            label: label.into(),
            position: span.to_range().into(),
            code: (&span.file).into(),
        }.into()
    }

    pub fn return_in_coroutine(span: &Span) -> Self {
        SemanticError::ReturnInCoroutine(Self::violation(
            "Coroutine function cannot have return statements",
            "return is not allowed here",
            span,
        )).into()
    }

    pub fn yield_outside_function(span: &Span) -> Self {
        SemanticError::YieldOutsideFunction(Self::violation(
            "yield can only appear inside a function body",
            "yield is not allowed here",
            span,
        )).into()
    }

    pub fn jump_outside_loop(keyword: &str, span: &Span) -> Self {
        SemanticError::JumpOutsideLoop(Self::violation(
            format!("{keyword} can only appear inside a loop"),
            format!("{keyword} is not allowed here"),
            span,
        )).into()
    }

    pub fn init_name_collision(span: &Span) -> Self {
        SemanticError::InitNameCollision(Self::violation(
            "attribute name 'init' collides with the constructor",
            "rename this attribute",
            span,
        )).into()
    }

    pub fn main_signature(message: impl Into<String>, span: &Span) -> Self {
        SemanticError::MainSignature(Self::violation(message, "invalid main signature", span)).into()
    }

    pub fn semantic(message: impl Into<String>, label: impl Into<String>, span: &Span) -> Self {
        SemanticError::Other(Self::violation(message, label, span)).into()
    }

    pub fn missing_annotation(message: impl Into<String>, span: &Span) -> Self {
        CodegenError::MissingAnnotation(InternalCodegen {
            message: message.into(),
            position: span.to_range().into(),
            code: (&span.file).into(),
        }.into()).into()
    }

    pub fn unknown_argument(message: impl Into<String>, span: &Span) -> Self {
        CodegenError::UnknownArgument(InternalCodegen {
            message: message.into(),
            position: span.to_range().into(),
            code: (&span.file).into(),
        }.into()).into()
    }

    pub fn not_yet_implemented(construct: impl Into<String>, span: &Span) -> Self {
        CodegenError::NotYetImplemented(NotYetImplemented {
            construct: construct.into(),
            position: span.to_range().into(),
            code: (&span.file).into(),
        }.into()).into()
    }

    pub fn multiple_errors(errors: Vec<CompilerError>) -> Self {
        CompilerError::Collection(ErrorCollection { errors }.into())
    }

    /// Converts this error into an accumulated log entry for intellisense mode.
    pub fn into_log(self, file: &SourceFile) -> CompilerLog {
        CompilerLog {
            kind: LogKind::Error,
            message: self.to_string(),
            labels: vec![(0..0, String::new())],
            help: None,
            file: file.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span::new(4..7, SourceFile::new(vec!["test".into()], "let Foo = 1".to_string()))
    }

    #[test]
    fn type_not_found_lists_similar_types() {
        let known = ["pkg.MyList", "pkg.Other"];
        let error = CompilerError::type_not_found(known.iter().copied(), "List".to_string(), &span());
        if let CompilerError::Type(TypeError::NotFound(inner)) = &error {
            let advice = inner.advice.as_deref().unwrap();
            assert!(advice.contains("pkg.MyList"));
            assert!(!advice.contains("Other"));
        } else {
            panic!("expected TypeError::NotFound, got {error:?}");
        }
    }

    #[test]
    fn type_not_found_falls_back_to_generic_help() {
        let error = CompilerError::type_not_found([].iter().copied(), "List".to_string(), &span());
        if let CompilerError::Type(TypeError::NotFound(inner)) = &error {
            assert_eq!(inner.advice.as_deref(), Some(TYPE_NOT_FOUND_HELP));
        } else {
            panic!("expected TypeError::NotFound");
        }
    }

    #[test]
    fn coroutine_return_message() {
        let error = CompilerError::return_in_coroutine(&span());
        assert_eq!(error.to_string(), "Coroutine function cannot have return statements");
    }

    #[test]
    fn collection_counts_errors() {
        let errors = vec![
            CompilerError::undefined_symbol("a", &span()),
            CompilerError::undefined_symbol("b", &span()),
        ];
        let collected = CompilerError::multiple_errors(errors);
        assert!(collected.to_string().contains("2 error(s)"));
    }
}
