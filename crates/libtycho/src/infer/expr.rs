//! Expression inference.
//!
//! One `infer_expr` per expression form. Every path funnels through
//! [`InferencePass::finish`] so the side tables always receive the natural
//! type, the active hint and any operator-overload marker.

use crate::{
    ast::{
        AstIndex, ExpressionAst, ExpressionKind, MatchPatternAst, PrimitiveValue, TypeNameAst, UnaryOperator,
    },
    error::CompilerError,
    span::Span,
    sym::{ContextId, ContextOwner, Symbol, SymbolId, SymbolKind, TypeDeclAst},
    types::{
        resolve::{pierce, to_kind},
        resolve_type_name, can_cast_types, extract_generics, BasicTy, FnTy, Ty, TyKind,
    },
};

use super::{ops, CallTarget, InferencePass};

impl InferencePass<'_> {
    pub fn infer_expr(&mut self, scope: ContextId, expr: &ExpressionAst, hint: Option<&Ty>) -> Result<Ty, CompilerError> {
        let index = expr.index;
        let span = &expr.span;

        match &expr.kind {
            ExpressionKind::Primitive(value) => {
                let ty = self.literal_ty(scope, value, hint, span)?;
                self.finish(scope, index, span, ty, hint, None)
            }

            ExpressionKind::Ident(name) => {
                let symbol = match self.ctx.lookup_scope(scope, name) {
                    Some((symbol, _)) => symbol,
                    None => return Err(CompilerError::undefined_symbol(name.clone(), span)),
                };
                let ty = self.symbol_value_ty(scope, symbol, span)?;
                self.finish(scope, index, span, ty, hint, None)
            }

            ExpressionKind::This => {
                let ty = if let Some(class) = self.ctx.active_class(scope) {
                    let name = self.ctx.symbol(class).name.clone();
                    Ty::Class { symbol: class, name }
                } else if let Some(implementation) = self.ctx.active_implementation(scope) {
                    let name = self.ctx.symbol(implementation).name.clone();
                    Ty::Implementation { symbol: implementation, name }
                } else {
                    return Err(CompilerError::undefined_symbol("this", span));
                };
                self.finish(scope, index, span, ty, hint, None)
            }

            ExpressionKind::Unary { op, operand } => {
                let operand_ty = self.infer_expr(scope, operand, None)?;
                let reduced = pierce(self.ctx, &operand_ty, span);

                if let Some(method) = ops::overload_target(self.ctx, &reduced, op.overload_name()) {
                    let signature = self.method_signature(method, span)?;
                    self.infer_function(method, None)?;
                    return self.finish(scope, index, span, *signature.return_type, hint, Some(method));
                }

                let ty = match op {
                    UnaryOperator::Negate => {
                        self.require_numeric(&reduced, span)?;
                        operand_ty
                    }
                    UnaryOperator::Not => {
                        self.require_kind(&reduced, BasicTy::Bool, span)?;
                        Ty::BOOL
                    }
                    UnaryOperator::BitNot => {
                        self.require_integer(&reduced, span)?;
                        operand_ty
                    }
                };
                self.finish(scope, index, span, ty, hint, None)
            }

            ExpressionKind::Binary { op, left, right } => {
                if op.is_logical() {
                    self.infer_expr(scope, left, Some(&Ty::BOOL))?;
                    self.infer_expr(scope, right, Some(&Ty::BOOL))?;
                    return self.finish(scope, index, span, Ty::BOOL, hint, None);
                }

                let left_ty = self.infer_expr(scope, left, None)?;
                let reduced = pierce(self.ctx, &left_ty, span);

                if let Some(method) = ops::overload_target(self.ctx, &reduced, op.overload_name()) {
                    let signature = self.method_signature(method, span)?;
                    let rhs_hint = signature.parameters.first().cloned();
                    self.infer_expr(scope, right, rhs_hint.as_ref())?;
                    self.infer_function(method, None)?;
                    return self.finish(scope, index, span, *signature.return_type, hint, Some(method));
                }

                self.infer_expr(scope, right, Some(&left_ty))?;

                if op.is_comparison() {
                    return self.finish(scope, index, span, Ty::BOOL, hint, None);
                }

                self.require_numeric(&reduced, span)?;
                self.finish(scope, index, span, left_ty, hint, None)
            }

            ExpressionKind::Assign { target, value } => {
                self.require_lvalue(target)?;
                let target_ty = self.infer_expr(scope, target, None)?;
                self.infer_expr(scope, value, Some(&target_ty))?;
                self.finish(scope, index, span, target_ty, hint, None)
            }

            ExpressionKind::CompoundAssign { op, target, value } => {
                self.require_lvalue(target)?;
                let target_ty = self.infer_expr(scope, target, None)?;
                let reduced = pierce(self.ctx, &target_ty, span);

                let overload = match ops::overload_target(self.ctx, &reduced, op.overload_name()) {
                    Some(method) => {
                        let signature = self.method_signature(method, span)?;
                        self.infer_expr(scope, value, signature.parameters.first())?;
                        self.infer_function(method, None)?;
                        Some(method)
                    }
                    None => {
                        self.require_numeric(&reduced, span)?;
                        self.infer_expr(scope, value, Some(&target_ty))?;
                        None
                    }
                };
                self.finish(scope, index, span, target_ty, hint, overload)
            }

            ExpressionKind::PreIncrement(operand) | ExpressionKind::PreDecrement(operand) => {
                self.require_lvalue(operand)?;
                let operand_ty = self.infer_expr(scope, operand, None)?;
                let reduced = pierce(self.ctx, &operand_ty, span);
                self.require_numeric(&reduced, span)?;
                self.finish(scope, index, span, operand_ty, hint, None)
            }

            ExpressionKind::Call { callee, type_args, arguments } => {
                let ty = self.infer_call(scope, index, span, callee, type_args, arguments)?;
                self.finish(scope, index, span, ty, hint, None)
            }

            ExpressionKind::Member { object, member } => {
                let ty = self.infer_member(scope, object, member, span)?;
                self.finish(scope, index, span, ty, hint, None)
            }

            ExpressionKind::Index { object, index: index_expr } => {
                let object_ty = self.infer_expr(scope, object, None)?;
                let reduced = pierce(self.ctx, &object_ty, span);

                if let Some(method) = ops::overload_target(self.ctx, &reduced, ops::INDEX_GET) {
                    let signature = self.method_signature(method, span)?;
                    self.infer_expr(scope, index_expr, signature.parameters.first())?;
                    self.infer_function(method, None)?;
                    return self.finish(scope, index, span, *signature.return_type, hint, Some(method));
                }

                let element = self.require_array_element(&reduced, span)?;
                self.infer_expr(scope, index_expr, Some(&Ty::Basic(BasicTy::U64)))?;
                self.finish(scope, index, span, element, hint, None)
            }

            ExpressionKind::IndexSet { object, index: index_expr, value } => {
                let object_ty = self.infer_expr(scope, object, None)?;
                let reduced = pierce(self.ctx, &object_ty, span);

                if let Some(method) = ops::overload_target(self.ctx, &reduced, ops::INDEX_SET) {
                    let signature = self.method_signature(method, span)?;
                    self.infer_expr(scope, index_expr, signature.parameters.first())?;
                    self.infer_expr(scope, value, signature.parameters.get(1))?;
                    self.infer_function(method, None)?;
                    return self.finish(scope, index, span, *signature.return_type, hint, Some(method));
                }

                let element = self.require_array_element(&reduced, span)?;
                self.infer_expr(scope, index_expr, Some(&Ty::Basic(BasicTy::U64)))?;
                self.infer_expr(scope, value, Some(&element))?;
                self.finish(scope, index, span, element, hint, None)
            }

            ExpressionKind::ArrayLiteral(elements) => {
                let element_hint = match hint.map(|hint| pierce(self.ctx, hint, span)) {
                    Some(Ty::Array(element)) => Some(*element),
                    _ => None,
                };

                let mut element_ty = element_hint.clone();
                for element in elements {
                    let ty = self.infer_expr(scope, element, element_ty.as_ref())?;
                    if element_ty.is_none() {
                        element_ty = Some(ty);
                    }
                }

                let element_ty = match element_ty {
                    Some(element_ty) => element_ty,
                    None => {
                        return Err(CompilerError::missing_annotation(
                            "an empty array literal needs a type from context",
                            span,
                        ))
                    }
                };
                self.finish(scope, index, span, Ty::array(element_ty), hint, None)
            }

            ExpressionKind::StructLiteral { type_name, fields } => {
                let declared = match type_name {
                    Some(type_name) => Some(resolve_type_name(self.ctx, scope, type_name)?),
                    None => hint.cloned(),
                };
                let declared_struct = declared
                    .as_ref()
                    .and_then(|ty| to_kind(self.ctx, ty, TyKind::Struct, span));

                let mut inferred_fields = Vec::new();
                for (name, value) in fields {
                    let field_hint = match &declared_struct {
                        Some(Ty::Struct(shape)) => shape
                            .field_index(name)
                            .map(|position| shape.fields[position].1.clone()),
                        _ => None,
                    };
                    let ty = self.infer_expr(scope, value, field_hint.as_ref())?;
                    inferred_fields.push((name.clone(), field_hint.unwrap_or(ty)));
                }

                let ty = match declared {
                    Some(declared) => declared,
                    None => Ty::Struct(crate::types::StructTy { fields: inferred_fields }),
                };
                self.finish(scope, index, span, ty, hint, None)
            }

            ExpressionKind::New { type_name, arguments } => {
                let class_ty = resolve_type_name(self.ctx, scope, type_name)?;
                let class = match &class_ty {
                    Ty::Class { symbol, .. } => *symbol,
                    _ => {
                        return Err(CompilerError::cannot_assign(
                            class_ty.to_string(),
                            "a class",
                            "only classes can be constructed with new",
                            span,
                        ))
                    }
                };

                self.finalize_class(class)?;
                if let Some(constructor) = ops::find_class_method(self.ctx, class, "init") {
                    let signature = self.method_signature(constructor, span)?;
                    if signature.parameters.len() != arguments.len() {
                        return Err(CompilerError::wrong_arity(
                            "init",
                            signature.parameters.len(),
                            arguments.len(),
                            span,
                        ));
                    }
                    for (argument, parameter) in arguments.iter().zip(&signature.parameters) {
                        self.infer_expr(scope, argument, Some(parameter))?;
                    }
                    self.infer_function(constructor, None)?;
                    let owner = self.ctx.owner_of(scope);
                    self.ctx.call_targets.insert((owner, index), CallTarget::Method(constructor));
                } else if !arguments.is_empty() {
                    return Err(CompilerError::wrong_arity("init", 0, arguments.len(), span));
                }

                self.finish(scope, index, span, class_ty, hint, None)
            }

            ExpressionKind::Lambda { arguments, return_type, body } => {
                let ty = self.infer_lambda(scope, index, span, arguments, return_type.as_ref(), body, hint)?;
                self.finish(scope, index, span, ty, hint, None)
            }

            ExpressionKind::IfElse { condition, then_value, else_value } => {
                self.infer_expr(scope, condition, Some(&Ty::BOOL))?;
                let then_ty = self.infer_expr(scope, then_value, hint)?;
                self.infer_expr(scope, else_value, Some(&then_ty))?;
                self.finish(scope, index, span, then_ty, hint, None)
            }

            ExpressionKind::Match { scrutinee, arms } => {
                let ty = self.infer_match(scope, span, scrutinee, arms, hint)?;
                self.finish(scope, index, span, ty, hint, None)
            }

            ExpressionKind::LetIn { bindings, body } => {
                let package = self.ctx.context(scope).package;
                let inner = self.ctx.create_context(Some(scope), ContextOwner::LetIn, package);
                let owner = self.ctx.owner_of(scope);
                self.ctx.block_contexts.insert((owner, index), inner);

                for binding in bindings {
                    let annotated = match &binding.type_name {
                        Some(type_name) => Some(resolve_type_name(self.ctx, inner, type_name)?),
                        None => None,
                    };
                    let value_ty = self.infer_expr(inner, &binding.value, annotated.as_ref())?;
                    let symbol = self.ctx.add_symbol(
                        inner,
                        Symbol::new(&binding.name, SymbolKind::Variable, binding.span.clone()),
                    )?;
                    self.ctx.var_types.insert(symbol, annotated.unwrap_or(value_ty));
                    if let Some(function) = self.ctx.find_parent_function(inner) {
                        self.ctx.fn_info_mut(function).locals.insert(symbol);
                    }
                }

                let ty = self.infer_expr(inner, body, hint)?;
                self.finish(scope, index, span, ty, hint, None)
            }

            ExpressionKind::Do { body, value } => {
                let package = self.ctx.context(scope).package;
                let inner = self.ctx.create_context(Some(scope), ContextOwner::DoExpression, package);
                let owner = self.ctx.owner_of(scope);
                self.ctx.block_contexts.insert((owner, index), inner);

                for statement in body {
                    self.infer_stmt(inner, statement)?;
                }
                let ty = self.infer_expr(inner, value, hint)?;
                self.finish(scope, index, span, ty, hint, None)
            }

            ExpressionKind::Cast { value, target, safe } => {
                let value_ty = self.infer_expr(scope, value, None)?;
                let target_ty = resolve_type_name(self.ctx, scope, target)?;

                let result = can_cast_types(self.ctx, &value_ty, &target_ty, span);
                if !result.success {
                    return Err(CompilerError::cannot_cast(
                        value_ty.to_string(),
                        target_ty.to_string(),
                        result.message,
                        span,
                    ));
                }

                let ty = if *safe && target_ty.allowed_nullable() {
                    Ty::nullable(target_ty)
                } else {
                    target_ty
                };
                self.finish(scope, index, span, ty, hint, None)
            }

            ExpressionKind::Yield(value) => {
                let function = match self.ctx.find_parent_function(scope) {
                    Some(function) => function,
                    None => return Err(CompilerError::yield_outside_function(span)),
                };
                if let Some(value) = value {
                    self.infer_expr(scope, value, None)?;
                }
                self.ctx.fn_info_mut(function).yields.push((index, span.clone()));
                self.finish(scope, index, span, Ty::VOID, hint, None)
            }

            ExpressionKind::NullableMember { .. }
            | ExpressionKind::TupleConstruction(_)
            | ExpressionKind::TupleDeconstruction { .. }
            | ExpressionKind::Spawn(_)
            | ExpressionKind::Await(_)
            | ExpressionKind::CoroutineConstruction(_) => {
                Err(CompilerError::not_yet_implemented(expr.kind.construct_name(), span))
            }
        }
    }

    fn literal_ty(&mut self, scope: ContextId, value: &PrimitiveValue, hint: Option<&Ty>, span: &Span) -> Result<Ty, CompilerError> {
        Ok(match value {
            PrimitiveValue::Int(_) => match hint.map(|hint| pierce(self.ctx, hint, span)).and_then(|ty| ty.as_basic()) {
                Some(basic) if basic.is_integer() => Ty::Basic(basic),
                _ => Ty::Basic(BasicTy::I32),
            },
            PrimitiveValue::Float(_) => match hint.map(|hint| pierce(self.ctx, hint, span)).and_then(|ty| ty.as_basic()) {
                Some(basic) if basic.is_float() => Ty::Basic(basic),
                _ => Ty::Basic(BasicTy::F64),
            },
            PrimitiveValue::Bool(_) => Ty::BOOL,
            PrimitiveValue::Char(_) => Ty::Basic(BasicTy::Char),
            PrimitiveValue::Null => Ty::NULL,
            PrimitiveValue::String(_) => {
                // String literals are values of the standard string class.
                let symbol = match self.ctx.lookup(scope, "String") {
                    Some(symbol) => symbol,
                    None => {
                        let known = self.ctx.known_type_names();
                        return Err(CompilerError::type_not_found(
                            known.iter().map(String::as_str),
                            "String".to_string(),
                            span,
                        ));
                    }
                };
                crate::types::resolve::symbol_to_ty(self.ctx, symbol, Vec::new(), span)?
            }
        })
    }

    /// The type a symbol has when read as a value.
    fn symbol_value_ty(&mut self, _scope: ContextId, symbol: SymbolId, span: &Span) -> Result<Ty, CompilerError> {
        let kind = self.ctx.symbol(symbol).kind.clone();
        let name = self.ctx.symbol(symbol).name.clone();

        match kind {
            SymbolKind::Variable | SymbolKind::VariablePattern | SymbolKind::Argument { .. } => {
                match self.ctx.var_types.get(&symbol) {
                    Some(ty) => Ok(ty.clone()),
                    None => Err(CompilerError::missing_annotation(
                        format!("'{name}' is used before its type is known"),
                        span,
                    )),
                }
            }
            SymbolKind::Function(decl) => {
                if !decl.generics.is_empty() {
                    return Err(CompilerError::generic_arity(decl.generics.len(), 0, span));
                }
                let defining = self.ctx.symbol(symbol).context;
                let header = self.resolve_header(&decl, defining)?;
                Ok(Ty::Function(header))
            }
            SymbolKind::OverloadSet(members) => {
                Err(CompilerError::ambiguous_overload(name, members.len(), span))
            }
            SymbolKind::ClassAttribute { class, attribute_index, .. } => {
                self.finalize_class(class)?;
                let layout = &self.ctx.class_layouts[&class];
                Ok(layout.attributes[attribute_index].1.clone())
            }
            SymbolKind::ClassMethod { .. } | SymbolKind::ImplementationMethod { .. } => {
                let signature = self.method_signature(symbol, span)?;
                Ok(Ty::Function(signature))
            }
            SymbolKind::ImplementationAttribute { implementation, attribute_index } => {
                let decl = match &self.ctx.symbol(implementation).kind {
                    SymbolKind::DeclaredType(TypeDeclAst::Implementation(decl)) => decl.clone(),
                    _ => return Err(CompilerError::undefined_symbol(name, span)),
                };
                let members = self.ctx.symbol(symbol).context;
                resolve_type_name(self.ctx, members, &decl.required_attributes[attribute_index].type_name)
            }
            SymbolKind::DeclaredType(_) => {
                let inner = crate::types::resolve::symbol_to_ty(self.ctx, symbol, Vec::new(), span)?;
                Ok(Ty::Meta(Box::new(inner)))
            }
            SymbolKind::Namespace { .. } | SymbolKind::Ffi(_) => Err(CompilerError::semantic(
                format!("'{name}' is not a value"),
                "namespaces and ffi blocks can only be accessed by member",
                span,
            )),
            SymbolKind::Lambda(_) => Err(CompilerError::undefined_symbol(name, span)),
        }
    }

    fn infer_member(&mut self, scope: ContextId, object: &ExpressionAst, member: &str, span: &Span) -> Result<Ty, CompilerError> {
        // Namespace, FFI, variant, enum and static-class access never
        // evaluates the object; resolve the symbol path directly.
        if let ExpressionKind::Ident(name) = &object.kind {
            if let Some((symbol, _)) = self.ctx.lookup_scope(scope, name) {
                match self.ctx.symbol(symbol).kind.clone() {
                    SymbolKind::Namespace { context } => {
                        let target = match self.ctx.context(context).get(member) {
                            Some(target) => target,
                            None => return Err(CompilerError::undefined_member(name.clone(), member, span)),
                        };
                        // Mark the namespace object so lowering knows it is
                        // not a value access.
                        self.finish(scope, object.index, &object.span, Ty::VOID, None, None)?;
                        return self.symbol_value_ty(scope, target, span);
                    }
                    SymbolKind::Ffi(decl) => {
                        let method_index = match decl.methods.iter().position(|method| method.name == member) {
                            Some(position) => position,
                            None => return Err(CompilerError::undefined_member(name.clone(), member, span)),
                        };
                        self.finish(scope, object.index, &object.span, Ty::VOID, None, None)?;
                        return Ok(Ty::FfiMethod { ffi: symbol, method_index });
                    }
                    SymbolKind::DeclaredType(TypeDeclAst::Variant(decl)) => {
                        let case_index = match decl.cases.iter().position(|case| case.name == member) {
                            Some(position) => position,
                            None => return Err(CompilerError::undefined_member(name.clone(), member, span)),
                        };
                        self.finish(scope, object.index, &object.span, Ty::VOID, None, None)?;
                        let case_ty = Ty::VariantCtor {
                            variant: symbol,
                            case_index,
                            name: format!("{}.{}", decl.name, member),
                        };
                        // A parameterless case is already a value; the rest
                        // are constructors awaiting a call.
                        return if decl.cases[case_index].parameters.is_empty() {
                            Ok(case_ty)
                        } else {
                            Ok(Ty::Meta(Box::new(case_ty)))
                        };
                    }
                    SymbolKind::DeclaredType(TypeDeclAst::Enum(decl)) => {
                        if !decl.members.iter().any(|candidate| candidate.name == member) {
                            return Err(CompilerError::undefined_member(name.clone(), member, span));
                        }
                        self.finish(scope, object.index, &object.span, Ty::VOID, None, None)?;
                        return crate::types::resolve::symbol_to_ty(self.ctx, symbol, Vec::new(), span);
                    }
                    SymbolKind::DeclaredType(TypeDeclAst::Class(_)) => {
                        if let Some(target) = self.ctx.type_contexts.get(&symbol).copied() {
                            if let Some(member_symbol) = self.ctx.context(target).get(member) {
                                self.finish(scope, object.index, &object.span, Ty::VOID, None, None)?;
                                return self.symbol_value_ty(scope, member_symbol, span);
                            }
                        }
                        return Err(CompilerError::undefined_member(name.clone(), member, span));
                    }
                    _ => {}
                }
            }
        }

        let object_ty = self.infer_expr(scope, object, None)?;
        let reduced = pierce(self.ctx, &object_ty, span);

        match &reduced {
            Ty::Class { symbol, .. } => {
                let class = *symbol;
                self.finalize_class(class)?;
                if let Some(position) = self.ctx.class_layouts[&class].attribute_index(member) {
                    return Ok(self.ctx.class_layouts[&class].attributes[position].1.clone());
                }
                if let Some(method) = ops::find_class_method(self.ctx, class, member) {
                    let signature = self.method_signature(method, span)?;
                    return Ok(Ty::Function(signature));
                }
                Err(CompilerError::undefined_member(reduced.to_string(), member, span))
            }
            Ty::Implementation { symbol, .. } => {
                let members = match self.ctx.type_contexts.get(symbol).copied() {
                    Some(members) => members,
                    None => return Err(CompilerError::undefined_member(reduced.to_string(), member, span)),
                };
                match self.ctx.context(members).get(member) {
                    Some(target) => self.symbol_value_ty(scope, target, span),
                    None => Err(CompilerError::undefined_member(reduced.to_string(), member, span)),
                }
            }
            Ty::Struct(shape) => match shape.field_index(member) {
                Some(position) => Ok(shape.fields[position].1.clone()),
                None => Err(CompilerError::undefined_member(reduced.to_string(), member, span)),
            },
            _ => Err(CompilerError::undefined_member(reduced.to_string(), member, span)),
        }
    }

    fn infer_call(
        &mut self,
        scope: ContextId,
        call_index: AstIndex,
        call_span: &Span,
        callee: &ExpressionAst,
        type_args: &[TypeNameAst],
        arguments: &[ExpressionAst],
    ) -> Result<Ty, CompilerError> {
        // Calls through a bare name: functions, overload sets, generics,
        // function-typed variables.
        if let ExpressionKind::Ident(name) = &callee.kind {
            let symbol = match self.ctx.lookup_scope(scope, name) {
                Some((symbol, _)) => symbol,
                None => return Err(CompilerError::undefined_symbol(name.clone(), call_span)),
            };

            match self.ctx.symbol(symbol).kind.clone() {
                SymbolKind::Function(_) => {
                    self.finish(scope, callee.index, &callee.span, Ty::VOID, None, None)?;
                    return self.call_function_symbol(scope, call_index, call_span, symbol, type_args, arguments);
                }
                SymbolKind::OverloadSet(members) => {
                    self.finish(scope, callee.index, &callee.span, Ty::VOID, None, None)?;
                    return self.call_overload_set(scope, call_index, call_span, name, &members, arguments);
                }
                SymbolKind::ClassMethod { .. } | SymbolKind::ImplementationMethod { .. } => {
                    // A bare method name inside a class body calls on `this`.
                    self.finish(scope, callee.index, &callee.span, Ty::VOID, None, None)?;
                    return self.call_method(scope, call_index, call_span, symbol, arguments);
                }
                _ => {}
            }
        }

        // Calls through a member: methods, variant cases, FFI callables.
        if let ExpressionKind::Member { object, member } = &callee.kind {
            let member_ty = self.infer_member(scope, object, member, &callee.span)?;
            self.finish(scope, callee.index, &callee.span, member_ty.clone(), None, None)?;

            match &member_ty {
                Ty::Meta(inner) => {
                    if let Ty::VariantCtor { variant, case_index, name } = inner.as_ref() {
                        return self.call_variant_case(
                            scope, call_index, call_span, *variant, *case_index, name, arguments,
                        );
                    }
                }
                Ty::FfiMethod { ffi, method_index } => {
                    return self.call_ffi_method(scope, call_index, call_span, *ffi, *method_index, arguments);
                }
                _ => {}
            }

            // A method value resolved through an object: find the method
            // symbol again for the call target.
            let object_info_owner = self.ctx.owner_of(scope);
            let object_ty = self
                .ctx
                .expr_info
                .get(&(object_info_owner, object.index))
                .map(|info| info.inferred.clone());
            if let Some(object_ty) = object_ty {
                let reduced = pierce(self.ctx, &object_ty, call_span);
                if let Ty::Class { symbol: class, .. } = reduced {
                    if let Some(method) = ops::find_class_method(self.ctx, class, member) {
                        return self.call_method(scope, call_index, call_span, method, arguments);
                    }
                }
                if let Ty::Implementation { symbol: implementation, .. } = reduced {
                    if let Some(members) = self.ctx.type_contexts.get(&implementation).copied() {
                        if let Some(method) = self.ctx.context(members).get(member) {
                            return self.call_method(scope, call_index, call_span, method, arguments);
                        }
                    }
                }
            }

            return self.call_value(scope, call_index, call_span, &member_ty, arguments);
        }

        // Anything else: evaluate the callee and call the value.
        let callee_ty = self.infer_expr(scope, callee, None)?;
        self.call_value(scope, call_index, call_span, &callee_ty, arguments)
    }

    /// Calls a declared function symbol, monomorphizing generics from the
    /// call site when needed.
    fn call_function_symbol(
        &mut self,
        scope: ContextId,
        call_index: AstIndex,
        call_span: &Span,
        symbol: SymbolId,
        type_args: &[TypeNameAst],
        arguments: &[ExpressionAst],
    ) -> Result<Ty, CompilerError> {
        let decl = match &self.ctx.symbol(symbol).kind {
            SymbolKind::Function(decl) => decl.clone(),
            _ => return Err(CompilerError::undefined_symbol(self.ctx.symbol(symbol).name.clone(), call_span)),
        };
        let owner = self.ctx.owner_of(scope);

        if decl.generics.is_empty() {
            if !type_args.is_empty() {
                return Err(CompilerError::generic_arity(0, type_args.len(), call_span));
            }

            let defining = self.ctx.symbol(symbol).context;
            let header = self.resolve_header(&decl, defining)?;
            if header.parameters.len() != arguments.len() {
                return Err(CompilerError::wrong_arity(
                    decl.name.clone(),
                    header.parameters.len(),
                    arguments.len(),
                    call_span,
                ));
            }
            for (argument, parameter) in arguments.iter().zip(&header.parameters) {
                self.infer_expr(scope, argument, Some(parameter))?;
            }

            let return_type = self.infer_function(symbol, None)?;
            self.ctx.call_targets.insert((owner, call_index), CallTarget::Function(symbol));
            return Ok(return_type);
        }

        // Explicit type arguments: verify arity and instantiate before the
        // arguments are inferred, so the concrete parameter types flow into
        // them as hints.
        let (concrete, arguments_inferred) = if !type_args.is_empty() {
            if type_args.len() != decl.generics.len() {
                return Err(CompilerError::generic_arity(decl.generics.len(), type_args.len(), call_span));
            }
            if decl.arguments.len() != arguments.len() {
                return Err(CompilerError::wrong_arity(
                    decl.name.clone(),
                    decl.arguments.len(),
                    arguments.len(),
                    call_span,
                ));
            }
            let resolved = type_args
                .iter()
                .map(|argument| resolve_type_name(self.ctx, scope, argument))
                .collect::<Result<Vec<_>, _>>()?;
            (self.monomorphize_function(symbol, &resolved, call_span)?, false)
        } else {
            // Implicit: unify declared parameter types against the actual
            // argument types.
            if decl.arguments.len() != arguments.len() {
                return Err(CompilerError::wrong_arity(
                    decl.name.clone(),
                    decl.arguments.len(),
                    arguments.len(),
                    call_span,
                ));
            }

            let defining = self.ctx.symbol(symbol).context;
            let package = self.ctx.context(defining).package;
            let header_scope = self.ctx.create_context(Some(defining), ContextOwner::None, package);
            for parameter in &decl.generics {
                let constraints = parameter
                    .constraints
                    .iter()
                    .map(|constraint| resolve_type_name(self.ctx, defining, constraint))
                    .collect::<Result<Vec<_>, _>>()?;
                let placeholder = Ty::Generic { name: parameter.name.clone(), constraints };
                self.ctx.context_mut(header_scope).bound_generics.insert(parameter.name.clone(), placeholder);
            }

            let mut bindings = indexmap::IndexMap::new();
            for (argument_ast, declared_ast) in arguments.iter().zip(&decl.arguments) {
                let actual = self.infer_expr(scope, argument_ast, None)?;
                let declared = resolve_type_name(self.ctx, header_scope, &declared_ast.type_name)?;
                if let Err(message) = extract_generics(&declared, &actual, &mut bindings) {
                    return Err(CompilerError::cannot_assign(actual.to_string(), declared.to_string(), message, &argument_ast.span));
                }
            }

            let ordered = decl
                .generics
                .iter()
                .map(|parameter| bindings.get(&parameter.name).cloned())
                .collect::<Option<Vec<_>>>();
            let ordered = match ordered {
                Some(ordered) => ordered,
                None => return Err(CompilerError::generic_arity(decl.generics.len(), bindings.len(), call_span)),
            };
            (self.monomorphize_function(symbol, &ordered, call_span)?, true)
        };

        let body = self.ctx.fn_info_mut(concrete).body_context;
        let header = self.resolve_header(&decl, body)?;
        if arguments_inferred {
            // Retrofit parameter hints now that the concrete header is known.
            for (argument, parameter) in arguments.iter().zip(&header.parameters) {
                self.set_hint(scope, argument.index, &argument.span, parameter)?;
            }
        } else {
            for (argument, parameter) in arguments.iter().zip(&header.parameters) {
                self.infer_expr(scope, argument, Some(parameter))?;
            }
        }

        self.ctx.call_targets.insert((owner, call_index), CallTarget::Function(concrete));
        Ok(*header.return_type)
    }

    fn call_overload_set(
        &mut self,
        scope: ContextId,
        call_index: AstIndex,
        call_span: &Span,
        name: &str,
        members: &[SymbolId],
        arguments: &[ExpressionAst],
    ) -> Result<Ty, CompilerError> {
        let actual = arguments
            .iter()
            .map(|argument| self.infer_expr(scope, argument, None))
            .collect::<Result<Vec<_>, _>>()?;

        let mut candidates = Vec::new();
        for member in members {
            let decl = match &self.ctx.symbol(*member).kind {
                SymbolKind::Function(decl) => decl.clone(),
                _ => continue,
            };
            if decl.arguments.len() != arguments.len() || !decl.generics.is_empty() {
                continue;
            }
            let defining = self.ctx.symbol(*member).context;
            let header = self.resolve_header(&decl, defining)?;
            let matches = actual
                .iter()
                .zip(&header.parameters)
                .all(|(argument, parameter)| {
                    crate::types::can_assign_types(self.ctx, argument, parameter, call_span).success
                });
            if matches {
                candidates.push((*member, header));
            }
        }

        match candidates.len() {
            0 => Err(CompilerError::wrong_arity(name, members.len(), arguments.len(), call_span)),
            1 => {
                let (member, header) = candidates.remove(0);
                for (argument, parameter) in arguments.iter().zip(&header.parameters) {
                    self.set_hint(scope, argument.index, &argument.span, parameter)?;
                }
                let return_type = self.infer_function(member, None)?;
                let owner = self.ctx.owner_of(scope);
                self.ctx.call_targets.insert((owner, call_index), CallTarget::Function(member));
                let _ = return_type;
                Ok(*header.return_type)
            }
            ambiguous => Err(CompilerError::ambiguous_overload(name, ambiguous, call_span)),
        }
    }

    fn call_method(
        &mut self,
        scope: ContextId,
        call_index: AstIndex,
        call_span: &Span,
        method: SymbolId,
        arguments: &[ExpressionAst],
    ) -> Result<Ty, CompilerError> {
        let signature = self.method_signature(method, call_span)?;
        if signature.parameters.len() != arguments.len() {
            return Err(CompilerError::wrong_arity(
                self.ctx.symbol(method).name.clone(),
                signature.parameters.len(),
                arguments.len(),
                call_span,
            ));
        }
        for (argument, parameter) in arguments.iter().zip(&signature.parameters) {
            self.infer_expr(scope, argument, Some(parameter))?;
        }

        self.infer_function(method, None)?;
        let owner = self.ctx.owner_of(scope);
        self.ctx.call_targets.insert((owner, call_index), CallTarget::Method(method));
        Ok(*signature.return_type)
    }

    fn call_variant_case(
        &mut self,
        scope: ContextId,
        call_index: AstIndex,
        call_span: &Span,
        variant: SymbolId,
        case_index: usize,
        case_name: &str,
        arguments: &[ExpressionAst],
    ) -> Result<Ty, CompilerError> {
        let decl = match &self.ctx.symbol(variant).kind {
            SymbolKind::DeclaredType(TypeDeclAst::Variant(decl)) => decl.clone(),
            _ => return Err(CompilerError::undefined_symbol(case_name, call_span)),
        };
        let case = &decl.cases[case_index];
        if case.parameters.len() != arguments.len() {
            return Err(CompilerError::wrong_arity(
                case.name.clone(),
                case.parameters.len(),
                arguments.len(),
                call_span,
            ));
        }

        let variant_scope = self.ctx.symbol(variant).context;
        for (argument, parameter) in arguments.iter().zip(&case.parameters) {
            let parameter_ty = resolve_type_name(self.ctx, variant_scope, &parameter.type_name)?;
            self.infer_expr(scope, argument, Some(&parameter_ty))?;
        }

        let owner = self.ctx.owner_of(scope);
        self.ctx
            .call_targets
            .insert((owner, call_index), CallTarget::VariantCase { variant, case_index });
        Ok(Ty::VariantCtor { variant, case_index, name: case_name.to_string() })
    }

    fn call_ffi_method(
        &mut self,
        scope: ContextId,
        call_index: AstIndex,
        call_span: &Span,
        ffi: SymbolId,
        method_index: usize,
        arguments: &[ExpressionAst],
    ) -> Result<Ty, CompilerError> {
        let decl = match &self.ctx.symbol(ffi).kind {
            SymbolKind::Ffi(decl) => decl.clone(),
            _ => return Err(CompilerError::undefined_symbol(self.ctx.symbol(ffi).name.clone(), call_span)),
        };
        let method = &decl.methods[method_index];
        if method.arguments.len() != arguments.len() {
            return Err(CompilerError::wrong_arity(
                method.name.clone(),
                method.arguments.len(),
                arguments.len(),
                call_span,
            ));
        }

        let ffi_scope = self.ctx.symbol(ffi).context;
        for (argument, parameter) in arguments.iter().zip(&method.arguments) {
            let parameter_ty = resolve_type_name(self.ctx, ffi_scope, &parameter.type_name)?;
            self.infer_expr(scope, argument, Some(&parameter_ty))?;
        }
        let return_type = resolve_type_name(self.ctx, ffi_scope, &method.return_type)?;

        let owner = self.ctx.owner_of(scope);
        self.ctx
            .call_targets
            .insert((owner, call_index), CallTarget::FfiMethod { ffi, method_index });
        Ok(return_type)
    }

    /// Calls a function-typed value, or a class value through `__call__`.
    fn call_value(
        &mut self,
        scope: ContextId,
        call_index: AstIndex,
        call_span: &Span,
        callee_ty: &Ty,
        arguments: &[ExpressionAst],
    ) -> Result<Ty, CompilerError> {
        let reduced = pierce(self.ctx, callee_ty, call_span);

        if let Some(method) = ops::overload_target(self.ctx, &reduced, ops::CALL_OPERATOR) {
            let signature = self.method_signature(method, call_span)?;
            if signature.parameters.len() != arguments.len() {
                return Err(CompilerError::wrong_arity(
                    ops::CALL_OPERATOR,
                    signature.parameters.len(),
                    arguments.len(),
                    call_span,
                ));
            }
            for (argument, parameter) in arguments.iter().zip(&signature.parameters) {
                self.infer_expr(scope, argument, Some(parameter))?;
            }
            self.infer_function(method, None)?;
            let owner = self.ctx.owner_of(scope);
            self.ctx.call_targets.insert((owner, call_index), CallTarget::Method(method));
            return Ok(*signature.return_type);
        }

        match &reduced {
            Ty::Function(function) => {
                if function.parameters.len() != arguments.len() {
                    return Err(CompilerError::wrong_arity(
                        reduced.to_string(),
                        function.parameters.len(),
                        arguments.len(),
                        call_span,
                    ));
                }
                for (argument, parameter) in arguments.iter().zip(&function.parameters) {
                    self.infer_expr(scope, argument, Some(parameter))?;
                }
                let owner = self.ctx.owner_of(scope);
                self.ctx.call_targets.insert((owner, call_index), CallTarget::Indirect);
                Ok(*function.return_type.clone())
            }
            Ty::Meta(inner) => match inner.as_ref() {
                Ty::VariantCtor { variant, case_index, name } => {
                    self.call_variant_case(scope, call_index, call_span, *variant, *case_index, &name.clone(), arguments)
                }
                _ => Err(CompilerError::semantic(
                    format!("'{reduced}' is not callable"),
                    "this expression cannot be called",
                    call_span,
                )),
            },
            _ => Err(CompilerError::semantic(
                format!("'{reduced}' is not callable"),
                "this expression cannot be called",
                call_span,
            )),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn infer_lambda(
        &mut self,
        scope: ContextId,
        index: AstIndex,
        span: &Span,
        arguments: &[crate::ast::FunctionArgumentAst],
        return_type: Option<&TypeNameAst>,
        body: &[crate::ast::StatementAst],
        hint: Option<&Ty>,
    ) -> Result<Ty, CompilerError> {
        let name = format!("$lambda_{}", index.0);
        let symbol = self.ctx.add_symbol(scope, Symbol::new(name.clone(), SymbolKind::Lambda(index), span.clone()))?;
        let owner = self.ctx.owner_of(scope);
        self.ctx.lambda_symbols.insert((owner, index), symbol);

        // A synthesized declaration lets lowering treat lambdas like any
        // other function body.
        self.ctx.lambda_decls.insert(
            symbol,
            std::rc::Rc::new(crate::ast::FunctionDefinitionAst {
                index,
                name,
                generics: Vec::new(),
                arguments: arguments.to_vec(),
                return_type: return_type.cloned().unwrap_or_else(|| TypeNameAst::named("void")),
                body: body.to_vec(),
                is_local: true,
                span: span.clone(),
            }),
        );

        let package = self.ctx.context(scope).package;
        let inner = self.ctx.create_context(Some(scope), ContextOwner::Lambda(symbol), package);
        self.ctx.block_contexts.insert((owner, index), inner);
        self.ctx.fn_info_mut(symbol).body_context = inner;

        let mut parameters = Vec::new();
        for (position, argument) in arguments.iter().enumerate() {
            let ty = resolve_type_name(self.ctx, inner, &argument.type_name)?;
            let argument_symbol = self.ctx.add_symbol(
                inner,
                Symbol::new(&argument.name, SymbolKind::Argument { index: position }, argument.span.clone()),
            )?;
            self.ctx.var_types.insert(argument_symbol, ty.clone());
            parameters.push(ty);
        }

        let hinted_return = match hint.map(|hint| pierce(self.ctx, hint, span)) {
            Some(Ty::Function(function)) => Some(*function.return_type),
            _ => None,
        };
        let declared_return = match return_type {
            Some(return_type) => Some(resolve_type_name(self.ctx, inner, return_type)?),
            None => hinted_return,
        };
        let return_ty = declared_return.unwrap_or(Ty::VOID);
        self.ctx.fn_info_mut(symbol).return_ty = Some(return_ty.clone());

        for statement in body {
            self.infer_stmt(inner, statement)?;
        }

        let info = self.ctx.fn_info_mut(symbol);
        let coroutine = info.is_coroutine_callable();
        if coroutine {
            if let Some((_, return_span)) = info.returns.first().cloned() {
                return Err(CompilerError::return_in_coroutine(&return_span));
            }
        }
        info.inferred = true;

        Ok(Ty::Function(FnTy {
            parameters,
            return_type: Box::new(return_ty),
            coroutine,
        }))
    }

    fn infer_match(
        &mut self,
        scope: ContextId,
        span: &Span,
        scrutinee: &ExpressionAst,
        arms: &[crate::ast::MatchArmAst],
        hint: Option<&Ty>,
    ) -> Result<Ty, CompilerError> {
        let scrutinee_ty = self.infer_expr(scope, scrutinee, None)?;
        let reduced = pierce(self.ctx, &scrutinee_ty, span);
        let package = self.ctx.context(scope).package;
        let owner = self.ctx.owner_of(scope);

        let mut result_ty = hint.cloned();
        for arm in arms {
            let arm_scope = self.ctx.create_context(Some(scope), ContextOwner::None, package);
            self.ctx.block_contexts.insert((owner, arm.value.index), arm_scope);

            if let MatchPatternAst::VariantCase { path, bindings } = &arm.pattern {
                let (variant, case_index) = self.resolve_variant_case(scope, path, &arm.span)?;
                if reduced.nominal_symbol() != Some(variant) {
                    return Err(CompilerError::cannot_assign(
                        reduced.to_string(),
                        self.ctx.symbol(variant).name.clone(),
                        "the pattern does not belong to the matched variant",
                        &arm.span,
                    ));
                }

                let decl = match &self.ctx.symbol(variant).kind {
                    SymbolKind::DeclaredType(TypeDeclAst::Variant(decl)) => decl.clone(),
                    _ => unreachable!("variant symbol lost its declaration"),
                };
                let case = &decl.cases[case_index];
                if bindings.len() != case.parameters.len() {
                    return Err(CompilerError::wrong_arity(
                        case.name.clone(),
                        case.parameters.len(),
                        bindings.len(),
                        &arm.span,
                    ));
                }

                let variant_scope = self.ctx.symbol(variant).context;
                for (binding, parameter) in bindings.iter().zip(&case.parameters) {
                    let ty = resolve_type_name(self.ctx, variant_scope, &parameter.type_name)?;
                    let binding_symbol = self.ctx.add_symbol(
                        arm_scope,
                        Symbol::new(binding, SymbolKind::VariablePattern, arm.span.clone()),
                    )?;
                    self.ctx.var_types.insert(binding_symbol, ty);
                    if let Some(function) = self.ctx.find_parent_function(arm_scope) {
                        self.ctx.fn_info_mut(function).locals.insert(binding_symbol);
                    }
                }
            }

            let arm_ty = self.infer_expr(arm_scope, &arm.value, result_ty.as_ref())?;
            if result_ty.is_none() {
                result_ty = Some(arm_ty);
            }
        }

        result_ty.ok_or_else(|| {
            CompilerError::missing_annotation("a match expression needs at least one arm", span)
        })
    }

    /// Resolves a `Variant.Case` pattern path.
    pub(crate) fn resolve_variant_case(&mut self, scope: ContextId, path: &[String], span: &Span) -> Result<(SymbolId, usize), CompilerError> {
        if path.len() != 2 {
            return Err(CompilerError::undefined_symbol(path.join("."), span));
        }
        let variant = match self.ctx.lookup(scope, &path[0]) {
            Some(symbol) => symbol,
            None => return Err(CompilerError::undefined_symbol(path[0].clone(), span)),
        };
        let decl = match &self.ctx.symbol(variant).kind {
            SymbolKind::DeclaredType(TypeDeclAst::Variant(decl)) => decl.clone(),
            _ => return Err(CompilerError::undefined_symbol(path[0].clone(), span)),
        };
        match decl.cases.iter().position(|case| case.name == path[1]) {
            Some(case_index) => Ok((variant, case_index)),
            None => Err(CompilerError::undefined_member(path[0].clone(), path[1].clone(), span)),
        }
    }

    fn require_lvalue(&mut self, target: &ExpressionAst) -> Result<(), CompilerError> {
        match &target.kind {
            ExpressionKind::Ident(_) | ExpressionKind::Member { .. } | ExpressionKind::Index { .. } => Ok(()),
            _ => Err(CompilerError::semantic(
                "this expression cannot be assigned to",
                "not an assignable place",
                &target.span,
            )),
        }
    }

    fn require_numeric(&mut self, ty: &Ty, span: &Span) -> Result<(), CompilerError> {
        match ty.as_basic() {
            Some(basic) if basic.is_numeric() => Ok(()),
            _ => Err(CompilerError::cannot_assign(
                ty.to_string(),
                "a numeric type",
                "this operator needs numeric operands",
                span,
            )),
        }
    }

    fn require_integer(&mut self, ty: &Ty, span: &Span) -> Result<(), CompilerError> {
        match ty.as_basic() {
            Some(basic) if basic.is_integer() => Ok(()),
            _ => Err(CompilerError::cannot_assign(
                ty.to_string(),
                "an integer type",
                "this operator needs integer operands",
                span,
            )),
        }
    }

    fn require_kind(&mut self, ty: &Ty, expected: BasicTy, span: &Span) -> Result<(), CompilerError> {
        if ty.as_basic() == Some(expected) {
            Ok(())
        } else {
            Err(CompilerError::cannot_assign(
                ty.to_string(),
                expected.name(),
                "operand has the wrong type",
                span,
            ))
        }
    }

    fn require_array_element(&mut self, ty: &Ty, span: &Span) -> Result<Ty, CompilerError> {
        match to_kind(self.ctx, ty, TyKind::Array, span) {
            Some(Ty::Array(element)) => Ok(*element),
            _ => Err(CompilerError::cannot_assign(
                ty.to_string(),
                "an array",
                "only arrays can be indexed",
                span,
            )),
        }
    }
}
