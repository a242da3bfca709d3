//! Type references as written in source.
//!
//! A `TypeNameAst` is the syntactic form of a type; resolution into a
//! [`Ty`](crate::types::Ty) happens later against a declaration context.

use crate::span::Span;

/// A syntactic type reference.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeNameAst {
    pub kind: TypeNameKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeNameKind {
    /// A dotted name with optional generic arguments: `pkg.List<i32>`
    Named {
        path: Vec<String>,
        generics: Vec<TypeNameAst>,
    },
    /// `T[]`
    Array(Box<TypeNameAst>),
    /// `T?`
    Nullable(Box<TypeNameAst>),
    /// `fn(a, b) -> r`
    Function {
        parameters: Vec<TypeNameAst>,
        return_type: Box<TypeNameAst>,
    },
    /// `{ x: i32, y: i32 }`
    Struct {
        fields: Vec<(String, TypeNameAst)>,
    },
}

impl TypeNameAst {
    pub fn new(kind: TypeNameKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// A bare named type with no generics, spanning nothing. Convenient for
    /// synthesized references such as built-in imports.
    pub fn named(name: &str) -> Self {
        Self {
            kind: TypeNameKind::Named {
                path: vec![name.to_string()],
                generics: Vec::new(),
            },
            span: Span::synthetic(),
        }
    }

    pub fn named_path(path: Vec<String>) -> Self {
        Self {
            kind: TypeNameKind::Named { path, generics: Vec::new() },
            span: Span::synthetic(),
        }
    }

    pub fn nullable(inner: TypeNameAst) -> Self {
        let span = inner.span.clone();
        Self { kind: TypeNameKind::Nullable(Box::new(inner)), span }
    }

    pub fn array(element: TypeNameAst) -> Self {
        let span = element.span.clone();
        Self { kind: TypeNameKind::Array(Box::new(element)), span }
    }

    /// The dotted path if this is a named reference.
    pub fn dotted_path(&self) -> Option<String> {
        match &self.kind {
            TypeNameKind::Named { path, .. } => Some(path.join(".")),
            _ => None,
        }
    }
}

impl std::fmt::Display for TypeNameAst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            TypeNameKind::Named { path, generics } => {
                write!(f, "{}", path.join("."))?;
                if !generics.is_empty() {
                    let list = generics.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
                    write!(f, "<{list}>")?;
                }
                Ok(())
            }
            TypeNameKind::Array(inner) => write!(f, "{inner}[]"),
            TypeNameKind::Nullable(inner) => write!(f, "{inner}?"),
            TypeNameKind::Function { parameters, return_type } => {
                let list = parameters.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
                write!(f, "fn({list}) -> {return_type}")
            }
            TypeNameKind::Struct { fields } => {
                let list = fields
                    .iter()
                    .map(|(name, ty)| format!("{name}: {ty}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{{ {list} }}")
            }
        }
    }
}
