//! Assignability and castability.
//!
//! Both checks return a structured [`MatchResult`]: success or failure with a
//! message, plus the metadata lowering needs to realize the conversion:
//! struct field swaps, interface method index tables, runtime checks, tag
//! checks and numeric cast step sequences.

use crate::{
    context::CompilerContext,
    span::Span,
    sym::{SymbolId, SymbolKind, TypeDeclAst},
    types::{resolve, BasicTy, Ty},
};

/// One primitive numeric conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastOp {
    /// Unsigned integer widening
    UpcastU,
    /// Signed integer widening
    UpcastI,
    /// Unsigned integer narrowing
    DcastU,
    /// Signed integer narrowing
    DcastI,
    /// Float narrowing (f64 to f32)
    DcastF,
    /// Float widening (f32 to f64)
    UpcastF,
    /// Signed integer to float
    I2F,
    /// Unsigned integer to float
    U2F,
    /// Float to signed integer
    F2I,
    /// Float to unsigned integer
    F2U,
}

impl CastOp {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            CastOp::UpcastU => "upcast_u",
            CastOp::UpcastI => "upcast_i",
            CastOp::DcastU => "dcast_u",
            CastOp::DcastI => "dcast_i",
            CastOp::DcastF => "dcast_f",
            CastOp::UpcastF => "upcast_f",
            CastOp::I2F => "cast_i2f",
            CastOp::U2F => "cast_u2f",
            CastOp::F2I => "cast_f2i",
            CastOp::F2U => "cast_f2u",
        }
    }
}

/// One step of a numeric conversion chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CastStep {
    pub op: CastOp,
    pub from: BasicTy,
    pub to: BasicTy,
}

/// What lowering must emit to realize a conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum CastMeta {
    /// Bit-identical or representation-compatible, nothing to emit
    None,
    /// Struct fields must be rearranged: `(destination index, source index)`
    FieldSwaps(Vec<(usize, usize)>),
    /// Class or interface methods mapped into the target's method order:
    /// per target slot, the source method-table index
    MethodTable(Vec<usize>),
    /// Needs a runtime check; failing the check yields null in a safe cast
    RuntimeCheck,
    /// Variant narrowing; the tag must be compared at runtime
    TagCheck,
    /// A deterministic chain of primitive numeric casts
    NumericSteps(Vec<CastStep>),
}

/// Outcome of an assignability or castability query.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub success: bool,
    pub message: String,
    pub metadata: CastMeta,
}

impl MatchResult {
    pub fn ok(metadata: CastMeta) -> Self {
        Self { success: true, message: String::new(), metadata }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into(), metadata: CastMeta::None }
    }
}

/// The deterministic numeric conversion recipe.
///
/// Small integers widen to their 64-bit form before meeting a float; `f32`
/// results narrow from `f64` last. Every produced step is one of the
/// primitive cast instructions.
pub fn numeric_cast_steps(from: BasicTy, to: BasicTy) -> Vec<CastStep> {
    let mut steps = Vec::new();
    if from == to {
        return steps;
    }

    match (from.is_integer(), to.is_integer()) {
        (true, true) => {
            let op = if from.byte_size() < to.byte_size() {
                if to.is_signed() { CastOp::UpcastI } else { CastOp::UpcastU }
            } else if to.is_signed() {
                CastOp::DcastI
            } else {
                CastOp::DcastU
            };
            steps.push(CastStep { op, from, to });
        }
        (true, false) => {
            let mut current = from;
            if current.byte_size() < 8 {
                let wide = if current.is_signed() { BasicTy::I64 } else { BasicTy::U64 };
                let op = if current.is_signed() { CastOp::UpcastI } else { CastOp::UpcastU };
                steps.push(CastStep { op, from: current, to: wide });
                current = wide;
            }
            let op = if current.is_signed() { CastOp::I2F } else { CastOp::U2F };
            steps.push(CastStep { op, from: current, to: BasicTy::F64 });
            if to == BasicTy::F32 {
                steps.push(CastStep { op: CastOp::DcastF, from: BasicTy::F64, to: BasicTy::F32 });
            }
        }
        (false, true) => {
            let mut current = from;
            if current == BasicTy::F32 {
                steps.push(CastStep { op: CastOp::UpcastF, from: BasicTy::F32, to: BasicTy::F64 });
                current = BasicTy::F64;
            }
            let wide = if to.is_signed() { BasicTy::I64 } else { BasicTy::U64 };
            let op = if to.is_signed() { CastOp::F2I } else { CastOp::F2U };
            steps.push(CastStep { op, from: current, to: wide });
            if to.byte_size() < 8 {
                let op = if to.is_signed() { CastOp::DcastI } else { CastOp::DcastU };
                steps.push(CastStep { op, from: wide, to });
            }
        }
        (false, false) => {
            let op = if to == BasicTy::F64 { CastOp::UpcastF } else { CastOp::DcastF };
            steps.push(CastStep { op, from, to });
        }
    }

    steps
}

/// All methods an interface requires, as `(name, arity)` pairs.
fn interface_methods(ctx: &CompilerContext, interface: SymbolId) -> Vec<(String, usize)> {
    match &ctx.symbol(interface).kind {
        SymbolKind::DeclaredType(TypeDeclAst::Interface(decl)) => decl
            .methods
            .iter()
            .map(|method| (method.name.clone(), method.arguments.len()))
            .collect(),
        _ => Vec::new(),
    }
}

/// All methods a class provides, in declaration order.
fn class_methods(ctx: &CompilerContext, class: SymbolId) -> Vec<(String, usize)> {
    match &ctx.symbol(class).kind {
        SymbolKind::DeclaredType(TypeDeclAst::Class(decl)) => decl
            .methods
            .iter()
            .map(|method| (method.function.name.clone(), method.function.arguments.len()))
            .collect(),
        _ => Vec::new(),
    }
}

/// Whether a class names an interface in its implements list.
pub fn class_implements_interface(ctx: &mut CompilerContext, class: SymbolId, interface: SymbolId) -> bool {
    let decl = match &ctx.symbol(class).kind {
        SymbolKind::DeclaredType(TypeDeclAst::Class(decl)) => decl.clone(),
        _ => return false,
    };
    let scope = ctx.symbol(class).context;

    decl.implements.iter().any(|implemented| {
        matches!(
            resolve::resolve_type_name(ctx, scope, implemented),
            Ok(Ty::Interface { symbol, .. }) if symbol == interface
        )
    })
}

/// Maps every interface method onto the providing class's method table.
/// Returns the table index per interface slot, or the first missing method.
fn class_to_interface_table(ctx: &CompilerContext, class: SymbolId, interface: SymbolId) -> Result<Vec<usize>, String> {
    let provided = class_methods(ctx, class);
    let mut table = Vec::new();

    for (name, arity) in interface_methods(ctx, interface) {
        match provided.iter().position(|(method, method_arity)| *method == name && *method_arity == arity) {
            Some(index) => table.push(index),
            None => return Err(format!("missing method '{name}' with {arity} parameter(s)")),
        }
    }

    Ok(table)
}

/// Structural struct comparison permitting field re-ordering.
fn match_structs(from: &crate::types::StructTy, to: &crate::types::StructTy) -> MatchResult {
    if from.fields.len() != to.fields.len() {
        return MatchResult::fail(format!(
            "field counts differ: {} vs {}",
            from.fields.len(),
            to.fields.len()
        ));
    }

    let mut swaps = Vec::new();
    let mut reordered = false;

    for (destination_index, (name, destination_ty)) in to.fields.iter().enumerate() {
        match from.field_index(name) {
            Some(source_index) => {
                if &from.fields[source_index].1 != destination_ty {
                    return MatchResult::fail(format!(
                        "field '{name}' has type '{}', expected '{destination_ty}'",
                        from.fields[source_index].1
                    ));
                }
                if source_index != destination_index {
                    reordered = true;
                }
                swaps.push((destination_index, source_index));
            }
            None => return MatchResult::fail(format!("field '{name}' is missing")),
        }
    }

    if reordered {
        MatchResult::ok(CastMeta::FieldSwaps(swaps))
    } else {
        MatchResult::ok(CastMeta::None)
    }
}

/// Whether a value of `from` may flow into a slot of type `to` without an
/// explicit cast.
pub fn can_assign_types(ctx: &mut CompilerContext, from: &Ty, to: &Ty, span: &Span) -> MatchResult {
    let from = resolve::resolve_reference(ctx, from, span).unwrap_or_else(|_| from.clone());
    let to = resolve::resolve_reference(ctx, to, span).unwrap_or_else(|_| to.clone());

    if from == to {
        return MatchResult::ok(CastMeta::None);
    }

    match (&from, &to) {
        // The null literal flows only into nullable slots.
        (Ty::Basic(BasicTy::Null), Ty::Nullable(_)) => MatchResult::ok(CastMeta::None),
        (Ty::Basic(BasicTy::Null), _) => MatchResult::fail("null is only assignable to a nullable target"),

        // A nullable absorbs its own non-nullable underlying.
        (_, Ty::Nullable(inner)) => {
            let result = can_assign_types(ctx, &from, inner, span);
            if result.success {
                result
            } else {
                MatchResult::fail(format!("'{from}' does not match the nullable underlying '{inner}'"))
            }
        }
        (Ty::Nullable(_), _) => MatchResult::fail("a nullable value needs a null check or a safe cast first"),

        // Integer widening is implicit; everything else numeric is a cast.
        (Ty::Basic(a), Ty::Basic(b)) if a.is_integer() && b.is_integer() => {
            if a.byte_size() < b.byte_size() && a.is_signed() == b.is_signed() {
                MatchResult::ok(CastMeta::NumericSteps(numeric_cast_steps(*a, *b)))
            } else {
                MatchResult::fail(format!("'{from}' does not widen into '{to}'"))
            }
        }
        (Ty::Basic(BasicTy::F32), Ty::Basic(BasicTy::F64)) => {
            MatchResult::ok(CastMeta::NumericSteps(numeric_cast_steps(BasicTy::F32, BasicTy::F64)))
        }

        (Ty::Struct(a), Ty::Struct(b)) => match_structs(a, b),

        (Ty::Class { symbol: class, .. }, Ty::Interface { symbol: interface, .. }) => {
            match class_to_interface_table(ctx, *class, *interface) {
                Ok(table) => MatchResult::ok(CastMeta::MethodTable(table)),
                Err(message) => MatchResult::fail(message),
            }
        }

        (Ty::Interface { symbol: a, .. }, Ty::Interface { symbol: b, .. }) => {
            let source = interface_methods(ctx, *a);
            let target = interface_methods(ctx, *b);

            let mut table = Vec::new();
            for method in &target {
                match source.iter().position(|candidate| candidate == method) {
                    Some(index) => table.push(index),
                    None => {
                        return MatchResult::fail(format!(
                            "interface '{from}' lacks method '{}'; a safe cast checks at runtime",
                            method.0
                        ))
                    }
                }
            }

            let aligned = table.iter().enumerate().all(|(slot, index)| slot == *index);
            if aligned && source.len() == target.len() {
                MatchResult::ok(CastMeta::None)
            } else {
                MatchResult::ok(CastMeta::MethodTable(table))
            }
        }

        // A constructor value widens into its variant.
        (Ty::VariantCtor { variant, .. }, Ty::Variant { symbol, .. }) if variant == symbol => {
            MatchResult::ok(CastMeta::None)
        }
        (Ty::Variant { .. }, Ty::VariantCtor { .. }) => {
            MatchResult::fail("narrowing to a variant case needs a runtime tag check")
        }

        (Ty::Array(a), Ty::Array(b)) => {
            if a == b {
                MatchResult::ok(CastMeta::None)
            } else {
                MatchResult::fail(format!("array element types differ: '{a}' vs '{b}'"))
            }
        }

        (Ty::Generic { name: a, .. }, Ty::Generic { name: b, .. }) if a == b => MatchResult::ok(CastMeta::None),

        _ => MatchResult::fail(format!("'{from}' is not assignable to '{to}'")),
    }
}

/// Whether an explicit cast from `from` to `to` exists, and what it takes.
pub fn can_cast_types(ctx: &mut CompilerContext, from: &Ty, to: &Ty, span: &Span) -> MatchResult {
    let assign = can_assign_types(ctx, from, to, span);
    if assign.success {
        return assign;
    }

    let from = resolve::resolve_reference(ctx, from, span).unwrap_or_else(|_| from.clone());
    let to = resolve::resolve_reference(ctx, to, span).unwrap_or_else(|_| to.clone());

    match (&from, &to) {
        (Ty::Basic(a), Ty::Basic(b)) if a.is_numeric() && b.is_numeric() => {
            MatchResult::ok(CastMeta::NumericSteps(numeric_cast_steps(*a, *b)))
        }

        // Enums cast to and from their backing integer.
        (Ty::Enum { backing, .. }, Ty::Basic(b)) if b.is_integer() => {
            MatchResult::ok(CastMeta::NumericSteps(numeric_cast_steps(*backing, *b)))
        }
        (Ty::Basic(a), Ty::Enum { backing, .. }) if a.is_integer() => {
            MatchResult::ok(CastMeta::NumericSteps(numeric_cast_steps(*a, *backing)))
        }

        // Stripping a nullable checks for null at runtime.
        (Ty::Nullable(inner), _) if can_cast_types(ctx, inner, &to, span).success => {
            MatchResult::ok(CastMeta::RuntimeCheck)
        }

        (Ty::Variant { symbol, .. }, Ty::VariantCtor { variant, .. }) if symbol == variant => {
            MatchResult::ok(CastMeta::TagCheck)
        }

        // Downcasts through interfaces resolve at runtime.
        (Ty::Interface { .. }, Ty::Class { .. }) => MatchResult::ok(CastMeta::RuntimeCheck),
        (Ty::Interface { .. }, Ty::Interface { .. }) => MatchResult::ok(CastMeta::RuntimeCheck),

        _ => MatchResult::fail(format!("no cast from '{from}' to '{to}' exists")),
    }
}
