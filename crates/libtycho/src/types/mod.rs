//! The Tycho type system.
//!
//! [`Ty`] is the canonical type representation used by inference and
//! lowering. Nominal types (classes, interfaces, implementations, variants,
//! enums) reference their declaring symbol by arena index; structural types
//! (structs, arrays, functions, nullables) carry their shape directly.
//!
//! The capability set of the base type operations lives across this module
//! tree:
//!
//! - kind reduction and late-bound name resolution in [`resolve`]
//! - assignability and castability with cast metadata in [`compat`]
//! - generic substitution, extraction and constraints in [`generics`]

use strum_macros::{EnumDiscriminants, EnumIs};

use crate::sym::{ContextId, SymbolId};

pub mod compat;
pub mod generics;
pub mod resolve;

pub use compat::{can_assign_types, can_cast_types, numeric_cast_steps, CastMeta, CastOp, CastStep, MatchResult};
pub use generics::{extract_generics, satisfies_constraint, signature_of};
pub use resolve::resolve_type_name;

/// Built-in scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicTy {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Bool,
    Char,
    Void,
    /// The type of the `null` literal before it is absorbed by a nullable
    Null,
}

impl BasicTy {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "i8" => BasicTy::I8,
            "u8" => BasicTy::U8,
            "i16" => BasicTy::I16,
            "u16" => BasicTy::U16,
            "i32" => BasicTy::I32,
            "u32" => BasicTy::U32,
            "i64" => BasicTy::I64,
            "u64" => BasicTy::U64,
            "f32" => BasicTy::F32,
            "f64" => BasicTy::F64,
            "bool" => BasicTy::Bool,
            "char" => BasicTy::Char,
            "void" => BasicTy::Void,
            "null" => BasicTy::Null,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            BasicTy::I8 => "i8",
            BasicTy::U8 => "u8",
            BasicTy::I16 => "i16",
            BasicTy::U16 => "u16",
            BasicTy::I32 => "i32",
            BasicTy::U32 => "u32",
            BasicTy::I64 => "i64",
            BasicTy::U64 => "u64",
            BasicTy::F32 => "f32",
            BasicTy::F64 => "f64",
            BasicTy::Bool => "bool",
            BasicTy::Char => "char",
            BasicTy::Void => "void",
            BasicTy::Null => "null",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            BasicTy::I8 | BasicTy::U8 | BasicTy::I16 | BasicTy::U16
                | BasicTy::I32 | BasicTy::U32 | BasicTy::I64 | BasicTy::U64
        )
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, BasicTy::I8 | BasicTy::I16 | BasicTy::I32 | BasicTy::I64)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, BasicTy::F32 | BasicTy::F64)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Byte size; offsets are plain sums of these.
    pub fn byte_size(&self) -> usize {
        match self {
            BasicTy::I8 | BasicTy::U8 | BasicTy::Bool | BasicTy::Char => 1,
            BasicTy::I16 | BasicTy::U16 => 2,
            BasicTy::I32 | BasicTy::U32 | BasicTy::F32 => 4,
            BasicTy::I64 | BasicTy::U64 | BasicTy::F64 | BasicTy::Null => 8,
            BasicTy::Void => 0,
        }
    }
}

/// A function type.
#[derive(Debug, Clone, PartialEq)]
pub struct FnTy {
    pub parameters: Vec<Ty>,
    pub return_type: Box<Ty>,
    /// Contains a yield; called through the coroutine instruction group
    pub coroutine: bool,
}

/// A structural record type with ordered named fields.
#[derive(Debug, Clone, PartialEq)]
pub struct StructTy {
    pub fields: Vec<(String, Ty)>,
}

impl StructTy {
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(field, _)| field == name)
    }

    /// Byte offset of a field by index, summing sizes of the fields before it.
    pub fn field_offset(&self, index: usize) -> usize {
        self.fields[..index].iter().map(|(_, ty)| ty.byte_size()).sum()
    }

    pub fn total_size(&self) -> usize {
        self.fields.iter().map(|(_, ty)| ty.byte_size()).sum()
    }
}

/// The canonical type representation.
#[derive(Debug, Clone, PartialEq, EnumIs, EnumDiscriminants)]
#[strum_discriminants(vis(pub), name(TyKind))]
pub enum Ty {
    Basic(BasicTy),
    Array(Box<Ty>),
    Struct(StructTy),
    Class { symbol: SymbolId, name: String },
    Interface { symbol: SymbolId, name: String },
    Implementation { symbol: SymbolId, name: String },
    Variant { symbol: SymbolId, name: String },
    /// One case of a variant, usable where a tag-checked narrowing occurred
    VariantCtor { variant: SymbolId, case_index: usize, name: String },
    Enum { symbol: SymbolId, name: String, backing: BasicTy },
    Function(FnTy),
    Nullable(Box<Ty>),
    /// A late-bound named reference, resolved against its declaration context
    Reference {
        path: Vec<String>,
        generics: Vec<Ty>,
        context: ContextId,
        /// Filled by resolution; the name and path are never rewritten
        resolved: Option<SymbolId>,
    },
    /// A generic parameter with its constraint union
    Generic { name: String, constraints: Vec<Ty> },
    /// A reference to a type itself: class/interface/variant-ctor access
    Meta(Box<Ty>),
    /// One callable of an FFI block
    FfiMethod { ffi: SymbolId, method_index: usize },
    /// Only valid inside generic constraints
    Union(Vec<Ty>),
}

impl Ty {
    pub const VOID: Ty = Ty::Basic(BasicTy::Void);
    pub const BOOL: Ty = Ty::Basic(BasicTy::Bool);
    pub const NULL: Ty = Ty::Basic(BasicTy::Null);

    pub fn kind(&self) -> TyKind {
        self.into()
    }

    pub fn array(element: Ty) -> Ty {
        Ty::Array(Box::new(element))
    }

    pub fn nullable(inner: Ty) -> Ty {
        match inner {
            already @ Ty::Nullable(_) => already,
            other => Ty::Nullable(Box::new(other)),
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Ty::Basic(BasicTy::Void))
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(self, Ty::Basic(BasicTy::Null))
    }

    /// Whether values of this type may be wrapped into a nullable.
    pub fn allowed_nullable(&self) -> bool {
        !matches!(self, Ty::Basic(BasicTy::Void) | Ty::Basic(BasicTy::Null) | Ty::Nullable(_) | Ty::Union(_))
    }

    /// Byte size on the stack and inside structs and arrays. Everything
    /// reference-shaped is pointer sized.
    pub fn byte_size(&self) -> usize {
        match self {
            Ty::Basic(basic) => basic.byte_size(),
            Ty::Enum { backing, .. } => backing.byte_size(),
            _ => 8,
        }
    }

    /// The basic scalar underneath, if this is scalar-shaped.
    pub fn as_basic(&self) -> Option<BasicTy> {
        match self {
            Ty::Basic(basic) => Some(*basic),
            Ty::Enum { backing, .. } => Some(*backing),
            _ => None,
        }
    }

    /// The declaring symbol of a nominal type.
    pub fn nominal_symbol(&self) -> Option<SymbolId> {
        match self {
            Ty::Class { symbol, .. }
            | Ty::Interface { symbol, .. }
            | Ty::Implementation { symbol, .. }
            | Ty::Variant { symbol, .. }
            | Ty::Enum { symbol, .. } => Some(*symbol),
            Ty::VariantCtor { variant, .. } => Some(*variant),
            _ => None,
        }
    }
}

impl std::fmt::Display for Ty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ty::Basic(basic) => f.write_str(basic.name()),
            Ty::Array(element) => write!(f, "{element}[]"),
            Ty::Struct(fields) => {
                let list = fields
                    .fields
                    .iter()
                    .map(|(name, ty)| format!("{name}: {ty}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{{ {list} }}")
            }
            Ty::Class { name, .. }
            | Ty::Interface { name, .. }
            | Ty::Implementation { name, .. }
            | Ty::Variant { name, .. }
            | Ty::Enum { name, .. } => f.write_str(name),
            Ty::VariantCtor { name, .. } => f.write_str(name),
            Ty::Function(function) => {
                let list = function.parameters.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
                write!(f, "fn({list}) -> {}", function.return_type)
            }
            Ty::Nullable(inner) => write!(f, "{inner}?"),
            Ty::Reference { path, .. } => f.write_str(&path.join(".")),
            Ty::Generic { name, .. } => f.write_str(name),
            Ty::Meta(inner) => write!(f, "meta<{inner}>"),
            Ty::FfiMethod { .. } => f.write_str("ffi method"),
            Ty::Union(types) => {
                let list = types.iter().map(ToString::to_string).collect::<Vec<_>>().join(" | ");
                f.write_str(&list)
            }
        }
    }
}
