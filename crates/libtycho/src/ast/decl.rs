//! Top-level declaration nodes.
//!
//! Declarations are shared behind `Rc` so that symbols can point back at the
//! node they were created from without copying function bodies around.

use std::rc::Rc;

use strum_macros::{EnumDiscriminants, EnumIs};

use crate::{file::SourceFile, span::Span};

use super::{expr::ExpressionAst, stmt::StatementAst, types::TypeNameAst, AstIndex};

/// One function or method parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionArgumentAst {
    pub name: String,
    pub type_name: TypeNameAst,
    pub span: Span,
}

impl FunctionArgumentAst {
    pub fn new(name: impl Into<String>, type_name: TypeNameAst) -> Self {
        Self {
            name: name.into(),
            type_name,
            span: Span::synthetic(),
        }
    }
}

/// A generic parameter with its constraint list.
///
/// An empty constraint list means the parameter is unconstrained; multiple
/// entries form a union constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericParameterAst {
    pub name: String,
    pub constraints: Vec<TypeNameAst>,
    pub span: Span,
}

impl GenericParameterAst {
    pub fn unconstrained(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraints: Vec::new(),
            span: Span::synthetic(),
        }
    }
}

/// A function declaration: top-level, method body, or lambda skeleton.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefinitionAst {
    pub index: AstIndex,
    pub name: String,
    pub generics: Vec<GenericParameterAst>,
    pub arguments: Vec<FunctionArgumentAst>,
    pub return_type: TypeNameAst,
    pub body: Vec<StatementAst>,
    /// Not exported from the package when set
    pub is_local: bool,
    pub span: Span,
}

/// An attribute declared on a class or required by an implementation.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassAttributeAst {
    pub name: String,
    pub type_name: TypeNameAst,
    pub is_static: bool,
    pub span: Span,
}

/// A method declared on a class or carried by an implementation.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassMethodAst {
    pub function: FunctionDefinitionAst,
    pub is_static: bool,
    pub is_override: bool,
}

/// A class declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDefinitionAst {
    pub index: AstIndex,
    pub name: String,
    pub generics: Vec<GenericParameterAst>,
    /// Interfaces this class implements
    pub implements: Vec<TypeNameAst>,
    pub attributes: Vec<ClassAttributeAst>,
    pub methods: Vec<ClassMethodAst>,
    /// Statements run once when the class is first touched
    pub static_block: Option<Vec<StatementAst>>,
    pub is_local: bool,
    pub span: Span,
}

/// A method signature inside an interface.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceMethodAst {
    pub name: String,
    pub generics: Vec<GenericParameterAst>,
    pub arguments: Vec<FunctionArgumentAst>,
    pub return_type: TypeNameAst,
    pub is_static: bool,
    pub span: Span,
}

/// An interface declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDefinitionAst {
    pub index: AstIndex,
    pub name: String,
    pub generics: Vec<GenericParameterAst>,
    pub methods: Vec<InterfaceMethodAst>,
    pub is_local: bool,
    pub span: Span,
}

/// An implementation declaration: attribute requirements plus method bodies,
/// optionally promising an interface contract.
#[derive(Debug, Clone, PartialEq)]
pub struct ImplementationDefinitionAst {
    pub index: AstIndex,
    pub name: String,
    pub required_attributes: Vec<ClassAttributeAst>,
    pub methods: Vec<ClassMethodAst>,
    pub contract: Option<TypeNameAst>,
    pub is_local: bool,
    pub span: Span,
}

/// One case of a variant declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantCaseAst {
    pub name: String,
    pub parameters: Vec<FunctionArgumentAst>,
    pub span: Span,
}

/// A tagged-union declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantDefinitionAst {
    pub index: AstIndex,
    pub name: String,
    pub generics: Vec<GenericParameterAst>,
    pub cases: Vec<VariantCaseAst>,
    pub is_local: bool,
    pub span: Span,
}

/// One member of an enum declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumMemberAst {
    pub name: String,
    pub value: Option<i64>,
    pub span: Span,
}

/// An integer-backed enum declaration. The backing type defaults to `u32`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDefinitionAst {
    pub index: AstIndex,
    pub name: String,
    pub backing: Option<TypeNameAst>,
    pub members: Vec<EnumMemberAst>,
    pub is_local: bool,
    pub span: Span,
}

/// A type alias; also how named struct types enter the program.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeAliasAst {
    pub index: AstIndex,
    pub name: String,
    pub generics: Vec<GenericParameterAst>,
    pub target: TypeNameAst,
    pub is_local: bool,
    pub span: Span,
}

/// A namespace grouping declarations under a common prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceDefinitionAst {
    pub index: AstIndex,
    pub name: String,
    pub declarations: Vec<DeclarationAst>,
    pub is_local: bool,
    pub span: Span,
}

/// One callable inside an FFI declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FfiMethodAst {
    pub name: String,
    pub arguments: Vec<FunctionArgumentAst>,
    pub return_type: TypeNameAst,
    pub span: Span,
}

/// A foreign function interface block bound to a dynamic library.
#[derive(Debug, Clone, PartialEq)]
pub struct FfiDefinitionAst {
    pub index: AstIndex,
    pub name: String,
    pub library: String,
    pub methods: Vec<FfiMethodAst>,
    pub span: Span,
}

/// A package-level variable.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVariableAst {
    pub index: AstIndex,
    pub name: String,
    pub type_name: Option<TypeNameAst>,
    pub value: ExpressionAst,
    pub is_local: bool,
    pub span: Span,
}

/// Any top-level declaration.
#[derive(Debug, Clone, PartialEq, EnumIs, EnumDiscriminants)]
#[strum_discriminants(vis(pub), name(DeclarationKind))]
pub enum DeclarationAst {
    Function(Rc<FunctionDefinitionAst>),
    Class(Rc<ClassDefinitionAst>),
    Interface(Rc<InterfaceDefinitionAst>),
    Implementation(Rc<ImplementationDefinitionAst>),
    Variant(Rc<VariantDefinitionAst>),
    Enum(Rc<EnumDefinitionAst>),
    TypeAlias(Rc<TypeAliasAst>),
    Namespace(Rc<NamespaceDefinitionAst>),
    Ffi(Rc<FfiDefinitionAst>),
    Global(Rc<GlobalVariableAst>),
}

impl DeclarationAst {
    pub fn name(&self) -> &str {
        match self {
            DeclarationAst::Function(decl) => &decl.name,
            DeclarationAst::Class(decl) => &decl.name,
            DeclarationAst::Interface(decl) => &decl.name,
            DeclarationAst::Implementation(decl) => &decl.name,
            DeclarationAst::Variant(decl) => &decl.name,
            DeclarationAst::Enum(decl) => &decl.name,
            DeclarationAst::TypeAlias(decl) => &decl.name,
            DeclarationAst::Namespace(decl) => &decl.name,
            DeclarationAst::Ffi(decl) => &decl.name,
            DeclarationAst::Global(decl) => &decl.name,
        }
    }

    pub fn is_local(&self) -> bool {
        match self {
            DeclarationAst::Function(decl) => decl.is_local,
            DeclarationAst::Class(decl) => decl.is_local,
            DeclarationAst::Interface(decl) => decl.is_local,
            DeclarationAst::Implementation(decl) => decl.is_local,
            DeclarationAst::Variant(decl) => decl.is_local,
            DeclarationAst::Enum(decl) => decl.is_local,
            DeclarationAst::TypeAlias(decl) => decl.is_local,
            DeclarationAst::Namespace(decl) => decl.is_local,
            DeclarationAst::Ffi(_) => false,
            DeclarationAst::Global(decl) => decl.is_local,
        }
    }

    pub fn span(&self) -> &Span {
        match self {
            DeclarationAst::Function(decl) => &decl.span,
            DeclarationAst::Class(decl) => &decl.span,
            DeclarationAst::Interface(decl) => &decl.span,
            DeclarationAst::Implementation(decl) => &decl.span,
            DeclarationAst::Variant(decl) => &decl.span,
            DeclarationAst::Enum(decl) => &decl.span,
            DeclarationAst::TypeAlias(decl) => &decl.span,
            DeclarationAst::Namespace(decl) => &decl.span,
            DeclarationAst::Ffi(decl) => &decl.span,
            DeclarationAst::Global(decl) => &decl.span,
        }
    }
}

/// An import directive: `from a.b import Name as Alias` or `from a.b import *`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportAst {
    pub index: AstIndex,
    pub base_path: Vec<String>,
    /// `*` requests a star import
    pub actual_name: String,
    pub alias: Option<String>,
    /// Namespace hops taken before the final name lookup
    pub sub_imports: Vec<String>,
    pub span: Span,
}

impl ImportAst {
    pub fn is_star(&self) -> bool {
        self.actual_name == "*"
    }

    /// The name the imported symbol gets in the importing package.
    pub fn bound_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.actual_name)
    }

    /// Identity used for the duplicate-import no-op check.
    pub fn dedup_key(&self) -> (String, &str, Option<&str>) {
        (self.base_path.join("."), self.actual_name.as_str(), self.alias.as_deref())
    }
}

/// The parsed contents of one source file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileAst {
    pub file: SourceFile,
    pub imports: Vec<ImportAst>,
    pub declarations: Vec<DeclarationAst>,
    pub statements: Vec<StatementAst>,
}

impl FileAst {
    pub fn new(file: SourceFile) -> Self {
        Self {
            file,
            imports: Vec::new(),
            declarations: Vec::new(),
            statements: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_dedup_key_includes_alias() {
        let indexer = crate::ast::AstIndexer::new();
        let import = ImportAst {
            index: indexer.next(),
            base_path: vec!["std".into(), "string".into()],
            actual_name: "String".into(),
            alias: Some("Str".into()),
            sub_imports: Vec::new(),
            span: Span::synthetic(),
        };
        assert_eq!(import.dedup_key(), ("std.string".to_string(), "String", Some("Str")));
        assert_eq!(import.bound_name(), "Str");
        assert!(!import.is_star());
    }
}
