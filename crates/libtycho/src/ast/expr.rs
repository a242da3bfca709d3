//! Expression nodes.

use strum_macros::{EnumDiscriminants, EnumIs};

use crate::span::Span;

use super::{decl::FunctionArgumentAst, stmt::StatementAst, types::TypeNameAst, AstIndex};

/// Literal values as they appear in source.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Char(char),
    String(String),
    Null,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Not,
    BitNot,
}

impl UnaryOperator {
    /// The method name used when the operand's class overloads this operator.
    pub fn overload_name(&self) -> &'static str {
        match self {
            UnaryOperator::Negate => "__neg__",
            UnaryOperator::Not => "__not__",
            UnaryOperator::BitNot => "__bnot__",
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    NotEq,
    Greater,
    GreaterEq,
    Less,
    LessEq,
}

impl BinaryOperator {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::NotEq
                | BinaryOperator::Greater
                | BinaryOperator::GreaterEq
                | BinaryOperator::Less
                | BinaryOperator::LessEq
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }

    /// The method name used when the left operand's class overloads this operator.
    pub fn overload_name(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "__add__",
            BinaryOperator::Sub => "__sub__",
            BinaryOperator::Mul => "__mul__",
            BinaryOperator::Div => "__div__",
            BinaryOperator::Mod => "__mod__",
            BinaryOperator::And => "__and__",
            BinaryOperator::Or => "__or__",
            BinaryOperator::BitAnd => "__band__",
            BinaryOperator::BitOr => "__bor__",
            BinaryOperator::BitXor => "__bxor__",
            BinaryOperator::Shl => "__shl__",
            BinaryOperator::Shr => "__shr__",
            BinaryOperator::Eq => "__eq__",
            BinaryOperator::NotEq => "__neq__",
            BinaryOperator::Greater => "__gt__",
            BinaryOperator::GreaterEq => "__ge__",
            BinaryOperator::Less => "__lt__",
            BinaryOperator::LessEq => "__le__",
        }
    }
}

/// A binding introduced by a `let .. in` expression.
#[derive(Debug, Clone, PartialEq)]
pub struct LetBindingAst {
    pub name: String,
    pub type_name: Option<TypeNameAst>,
    pub value: ExpressionAst,
    pub span: Span,
}

/// One arm of a `match` expression.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchArmAst {
    pub pattern: MatchPatternAst,
    pub value: ExpressionAst,
    pub span: Span,
}

/// Patterns accepted in match arms.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchPatternAst {
    /// A literal compared with the scrutinee
    Literal(PrimitiveValue),
    /// A variant case with variable patterns for its parameters
    VariantCase { path: Vec<String>, bindings: Vec<String> },
    /// `_`
    Wildcard,
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionAst {
    pub index: AstIndex,
    pub kind: ExpressionKind,
    pub span: Span,
}

impl ExpressionAst {
    pub fn new(index: AstIndex, kind: ExpressionKind, span: Span) -> Self {
        Self { index, kind, span }
    }
}

/// All expression forms.
///
/// Tuple construction/deconstruction, spawn, await and coroutine construction
/// are reserved: they parse into the tree but inference reports them as not
/// yet implemented.
#[derive(Debug, Clone, PartialEq, EnumIs, EnumDiscriminants)]
#[strum_discriminants(vis(pub), name(ExpressionKindDiscriminants))]
pub enum ExpressionKind {
    Primitive(PrimitiveValue),
    Ident(String),
    This,
    Unary {
        op: UnaryOperator,
        operand: Box<ExpressionAst>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<ExpressionAst>,
        right: Box<ExpressionAst>,
    },
    Assign {
        target: Box<ExpressionAst>,
        value: Box<ExpressionAst>,
    },
    CompoundAssign {
        op: BinaryOperator,
        target: Box<ExpressionAst>,
        value: Box<ExpressionAst>,
    },
    PreIncrement(Box<ExpressionAst>),
    PreDecrement(Box<ExpressionAst>),
    Call {
        callee: Box<ExpressionAst>,
        type_args: Vec<TypeNameAst>,
        arguments: Vec<ExpressionAst>,
    },
    Member {
        object: Box<ExpressionAst>,
        member: String,
    },
    NullableMember {
        object: Box<ExpressionAst>,
        member: String,
    },
    Index {
        object: Box<ExpressionAst>,
        index: Box<ExpressionAst>,
    },
    IndexSet {
        object: Box<ExpressionAst>,
        index: Box<ExpressionAst>,
        value: Box<ExpressionAst>,
    },
    ArrayLiteral(Vec<ExpressionAst>),
    StructLiteral {
        type_name: Option<TypeNameAst>,
        fields: Vec<(String, ExpressionAst)>,
    },
    New {
        type_name: TypeNameAst,
        arguments: Vec<ExpressionAst>,
    },
    Lambda {
        arguments: Vec<FunctionArgumentAst>,
        return_type: Option<TypeNameAst>,
        body: Vec<StatementAst>,
    },
    IfElse {
        condition: Box<ExpressionAst>,
        then_value: Box<ExpressionAst>,
        else_value: Box<ExpressionAst>,
    },
    Match {
        scrutinee: Box<ExpressionAst>,
        arms: Vec<MatchArmAst>,
    },
    LetIn {
        bindings: Vec<LetBindingAst>,
        body: Box<ExpressionAst>,
    },
    Do {
        body: Vec<StatementAst>,
        value: Box<ExpressionAst>,
    },
    Cast {
        value: Box<ExpressionAst>,
        target: TypeNameAst,
        safe: bool,
    },
    Yield(Option<Box<ExpressionAst>>),
    TupleConstruction(Vec<ExpressionAst>),
    TupleDeconstruction {
        names: Vec<String>,
        value: Box<ExpressionAst>,
    },
    Spawn(Box<ExpressionAst>),
    Await(Box<ExpressionAst>),
    CoroutineConstruction(Box<ExpressionAst>),
}

impl ExpressionKind {
    /// Human-readable construct name, used in "not yet implemented" diagnostics.
    pub fn construct_name(&self) -> &'static str {
        match self {
            ExpressionKind::TupleConstruction(_) => "tuple construction",
            ExpressionKind::TupleDeconstruction { .. } => "tuple deconstruction",
            ExpressionKind::NullableMember { .. } => "nullable member access",
            ExpressionKind::Spawn(_) => "spawn expression",
            ExpressionKind::Await(_) => "await expression",
            ExpressionKind::CoroutineConstruction(_) => "coroutine construction",
            _ => "expression",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overload_names_match_operator() {
        assert_eq!(BinaryOperator::Add.overload_name(), "__add__");
        assert_eq!(BinaryOperator::Eq.overload_name(), "__eq__");
        assert_eq!(UnaryOperator::Negate.overload_name(), "__neg__");
    }

    #[test]
    fn comparison_classification() {
        assert!(BinaryOperator::LessEq.is_comparison());
        assert!(!BinaryOperator::Add.is_comparison());
        assert!(BinaryOperator::And.is_logical());
    }
}
