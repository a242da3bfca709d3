//! Expression lowering.
//!
//! Every expression lowers to the register holding its value. When inference
//! recorded a hint differing from the natural type, the conversion the
//! compatibility check prescribed is emitted on the way out, so the value a
//! parent sees is always in the hinted type.

use crate::{
    ast::{
        BinaryOperator, EnumDefinitionAst, ExpressionAst, ExpressionKind, MatchPatternAst, PrimitiveValue,
        UnaryOperator,
    },
    error::CompilerError,
    infer::{ops, CallTarget, InferenceInfo},
    ir::{BinIrOp, CmpOp, ConstVal, Instr, IrType, Reg, Slot, UnIrOp},
    span::Span,
    sym::{ContextId, ScopeClass, SymbolId, SymbolKind, TypeDeclAst},
    types::{can_cast_types, resolve::pierce, resolve::to_kind, CastMeta, Ty, TyKind},
};

use super::FunctionLowering;

impl FunctionLowering<'_> {
    pub fn lower_expr(&mut self, scope: ContextId, expr: &ExpressionAst) -> Result<Reg, CompilerError> {
        let info = self.info_of(expr.index, &expr.span)?;
        let natural = self.lower_expr_natural(scope, expr, &info)?;
        self.apply_conversion(natural, &info, &expr.span)
    }

    /// The type a parent observes for an expression.
    pub(super) fn effective_ty(&self, info: &InferenceInfo) -> Ty {
        info.hint.clone().unwrap_or_else(|| info.inferred.clone())
    }

    /// Emits the implicit conversion between the inferred and hinted type.
    fn apply_conversion(&mut self, value: Reg, info: &InferenceInfo, span: &Span) -> Result<Reg, CompilerError> {
        let hint = match &info.hint {
            Some(hint) if *hint != info.inferred => hint.clone(),
            _ => return Ok(value),
        };

        let result = can_cast_types(self.ctx, &info.inferred, &hint, span);
        if !result.success {
            return Err(CompilerError::cannot_cast(
                info.inferred.to_string(),
                hint.to_string(),
                result.message,
                span,
            ));
        }

        match result.metadata {
            CastMeta::None | CastMeta::MethodTable(_) => Ok(value),
            CastMeta::NumericSteps(steps) => {
                let mut current = value;
                for step in steps {
                    let dst = self.fresh_reg();
                    self.emit(Instr::Cast { step, dst, src: current });
                    current = dst;
                }
                Ok(current)
            }
            CastMeta::FieldSwaps(swaps) => self.emit_field_swaps(value, &info.inferred, &hint, &swaps, span),
            CastMeta::RuntimeCheck => self.emit_null_checked_copy(value, &info.inferred),
            CastMeta::TagCheck => Ok(value),
        }
    }

    /// Rebuilds a struct value in the destination's field order.
    fn emit_field_swaps(
        &mut self,
        value: Reg,
        from: &Ty,
        to: &Ty,
        swaps: &[(usize, usize)],
        span: &Span,
    ) -> Result<Reg, CompilerError> {
        let source = match to_kind(self.ctx, from, TyKind::Struct, span) {
            Some(Ty::Struct(shape)) => shape,
            _ => return Ok(value),
        };
        let target = match to_kind(self.ctx, to, TyKind::Struct, span) {
            Some(Ty::Struct(shape)) => shape,
            _ => return Ok(value),
        };

        let dst = self.fresh_reg();
        self.emit(Instr::SAlloc {
            dst,
            fields: target.fields.len(),
            total_size: target.total_size(),
        });
        for (index, _) in target.fields.iter().enumerate() {
            self.emit(Instr::SRegField { dst, index, offset: target.field_offset(index) });
        }

        for (destination_index, source_index) in swaps {
            let field_ty = IrType::from_ty(&source.fields[*source_index].1);
            let tmp = self.fresh_reg();
            self.emit(Instr::SLoadF { ty: field_ty, dst: tmp, object: value, index: *source_index });
            self.emit(Instr::SStoreF { ty: field_ty, object: dst, index: *destination_index, src: tmp });
        }
        Ok(dst)
    }

    /// Null-checks a value; the failing path produces null.
    fn emit_null_checked_copy(&mut self, value: Reg, from: &Ty) -> Result<Reg, CompilerError> {
        let size = from.byte_size();
        let fail = self.fresh_label();
        let end = self.fresh_label();
        let dst = self.fresh_reg();

        self.emit(Instr::JumpEqNull { size, reg: value, target: fail.clone() });
        self.emit(Instr::Load { ty: IrType::Ptr, dst, slot: Slot::Reg(value) });
        self.emit(Instr::Jump { target: end.clone() });
        self.emit(Instr::Label { name: fail });
        self.emit(Instr::Const { ty: IrType::Ptr, dst, value: ConstVal::Int(0) });
        self.emit(Instr::Label { name: end });
        Ok(dst)
    }

    fn lower_expr_natural(&mut self, scope: ContextId, expr: &ExpressionAst, info: &InferenceInfo) -> Result<Reg, CompilerError> {
        let span = &expr.span;

        match &expr.kind {
            ExpressionKind::Primitive(value) => {
                let ty = IrType::from_ty(&info.inferred);
                let dst = self.fresh_reg();
                let constant = match value {
                    PrimitiveValue::Int(value) => ConstVal::Int(*value),
                    PrimitiveValue::Float(value) => ConstVal::Float(*value),
                    PrimitiveValue::Bool(value) => ConstVal::Int(i64::from(*value)),
                    PrimitiveValue::Char(value) => ConstVal::Int(*value as i64),
                    PrimitiveValue::Null => ConstVal::Int(0),
                    PrimitiveValue::String(value) => ConstVal::Str(value.clone()),
                };
                self.emit(Instr::Const { ty, dst, value: constant });
                Ok(dst)
            }

            ExpressionKind::Ident(name) => {
                let symbol = match self.ctx.lookup(scope, name) {
                    Some(symbol) => symbol,
                    None => return Err(CompilerError::undefined_symbol(name.clone(), span)),
                };
                self.load_symbol(scope, symbol, span)
            }

            ExpressionKind::This => {
                let dst = self.fresh_reg();
                self.emit(Instr::Load { ty: IrType::Ptr, dst, slot: Slot::Arg("this".to_string()) });
                Ok(dst)
            }

            ExpressionKind::Unary { op, operand } => {
                if let Some(method) = info.overload {
                    let object = self.lower_expr(scope, operand)?;
                    return self.emit_method_call(method, Some(object), &[], span);
                }

                let operand_reg = self.lower_expr(scope, operand)?;
                let operand_info = self.info_of(operand.index, &operand.span)?;
                let ty = IrType::from_ty(&self.effective_ty(&operand_info));
                let dst = self.fresh_reg();
                let ir_op = match op {
                    UnaryOperator::Negate => UnIrOp::Neg,
                    UnaryOperator::Not => UnIrOp::Not,
                    UnaryOperator::BitNot => UnIrOp::BNot,
                };
                self.emit(Instr::Unary { ty, op: ir_op, dst, a: operand_reg });
                Ok(dst)
            }

            ExpressionKind::Binary { op, left, right } => self.lower_binary(scope, *op, left, right, info, span),

            ExpressionKind::Assign { target, value } => {
                let src = self.lower_expr(scope, value)?;
                self.store_into_target(scope, target, src)?;
                Ok(src)
            }

            ExpressionKind::CompoundAssign { op, target, value } => {
                // `a op= b` is `a = a op b`.
                let current = self.lower_expr(scope, target)?;
                let rhs = self.lower_expr(scope, value)?;

                let result = if let Some(method) = info.overload {
                    self.emit_method_call(method, Some(current), &[(rhs, IrType::Ptr)], span)?
                } else {
                    let target_info = self.info_of(target.index, &target.span)?;
                    let ty = IrType::from_ty(&self.effective_ty(&target_info));
                    let ir_op = BinIrOp::from_operator(*op).ok_or_else(|| {
                        CompilerError::unknown_argument("operator cannot be compounded", span)
                    })?;
                    let dst = self.fresh_reg();
                    self.emit(Instr::Binary { ty, op: ir_op, dst, a: current, b: rhs });
                    dst
                };

                self.store_into_target(scope, target, result)?;
                Ok(result)
            }

            ExpressionKind::PreIncrement(target) | ExpressionKind::PreDecrement(target) => {
                // `++x` is `x = x + 1`.
                let current = self.lower_expr(scope, target)?;
                let target_info = self.info_of(target.index, &target.span)?;
                let ty = IrType::from_ty(&self.effective_ty(&target_info));

                let one = self.fresh_reg();
                self.emit(Instr::Const { ty, dst: one, value: ConstVal::Int(1) });
                let op = if matches!(expr.kind, ExpressionKind::PreIncrement(_)) { BinIrOp::Add } else { BinIrOp::Sub };
                let dst = self.fresh_reg();
                self.emit(Instr::Binary { ty, op, dst, a: current, b: one });
                self.store_into_target(scope, target, dst)?;
                Ok(dst)
            }

            ExpressionKind::Call { callee, arguments, .. } => self.lower_call(scope, expr, callee, arguments),

            ExpressionKind::Member { object, member } => self.lower_member_read(scope, object, member, info, span),

            ExpressionKind::Index { object, index } => {
                if let Some(method) = info.overload {
                    let object_reg = self.lower_expr(scope, object)?;
                    let index_reg = self.lower_expr(scope, index)?;
                    let index_info = self.info_of(index.index, &index.span)?;
                    let index_ty = IrType::from_ty(&self.effective_ty(&index_info));
                    return self.emit_method_call(method, Some(object_reg), &[(index_reg, index_ty)], span);
                }

                let array = self.lower_expr(scope, object)?;
                let index_reg = self.lower_expr(scope, index)?;
                let ty = IrType::from_ty(&info.inferred);
                let dst = self.fresh_reg();
                self.emit(Instr::ALoadF { ty, dst, index: index_reg, array });
                Ok(dst)
            }

            ExpressionKind::IndexSet { object, index, value } => {
                if let Some(method) = info.overload {
                    let object_reg = self.lower_expr(scope, object)?;
                    let index_reg = self.lower_expr(scope, index)?;
                    let value_reg = self.lower_expr(scope, value)?;
                    let index_info = self.info_of(index.index, &index.span)?;
                    let value_info = self.info_of(value.index, &value.span)?;
                    return self.emit_method_call(
                        method,
                        Some(object_reg),
                        &[
                            (index_reg, IrType::from_ty(&self.effective_ty(&index_info))),
                            (value_reg, IrType::from_ty(&self.effective_ty(&value_info))),
                        ],
                        span,
                    );
                }

                let array = self.lower_expr(scope, object)?;
                let index_reg = self.lower_expr(scope, index)?;
                let value_reg = self.lower_expr(scope, value)?;
                let ty = IrType::from_ty(&info.inferred);
                self.emit(Instr::AStoreF { ty, array, index: index_reg, src: value_reg });
                Ok(value_reg)
            }

            ExpressionKind::ArrayLiteral(elements) => {
                let element_ty = match pierce(self.ctx, &info.inferred, span) {
                    Ty::Array(element) => *element,
                    other => other,
                };
                let element_size = element_ty.byte_size();
                let ir_ty = IrType::from_ty(&element_ty);

                let dst = self.fresh_reg();
                self.emit(Instr::AAlloc { dst, count: elements.len(), element_size });
                for (position, element) in elements.iter().enumerate() {
                    let value = self.lower_expr(scope, element)?;
                    let index = self.fresh_reg();
                    self.emit(Instr::Const { ty: IrType::U64, dst: index, value: ConstVal::Int(position as i64) });
                    self.emit(Instr::AStoreF { ty: ir_ty, array: dst, index, src: value });
                }
                Ok(dst)
            }

            ExpressionKind::StructLiteral { fields, .. } => {
                let shape = match to_kind(self.ctx, &info.inferred, TyKind::Struct, span) {
                    Some(Ty::Struct(shape)) => shape,
                    _ => {
                        return Err(CompilerError::unknown_argument(
                            "struct literal lost its shape between passes",
                            span,
                        ))
                    }
                };

                let dst = self.fresh_reg();
                self.emit(Instr::SAlloc { dst, fields: shape.fields.len(), total_size: shape.total_size() });
                for (index, _) in shape.fields.iter().enumerate() {
                    self.emit(Instr::SRegField { dst, index, offset: shape.field_offset(index) });
                }
                for (name, value) in fields {
                    let position = shape.field_index(name).unwrap_or(0);
                    let field_ty = IrType::from_ty(&shape.fields[position].1);
                    let value_reg = self.lower_expr(scope, value)?;
                    self.emit(Instr::SStoreF { ty: field_ty, object: dst, index: position, src: value_reg });
                }
                Ok(dst)
            }

            ExpressionKind::New { arguments, .. } => self.lower_new(scope, expr, arguments, info, span),

            ExpressionKind::Lambda { .. } => self.lower_lambda_value(scope, expr, span),

            ExpressionKind::IfElse { condition, then_value, else_value } => {
                // The result register exists before the condition is lowered.
                let dst = self.fresh_reg();
                let ty = IrType::from_ty(&self.effective_ty(info));

                let condition_reg = self.lower_expr(scope, condition)?;
                let else_label = self.fresh_label();
                let end_label = self.fresh_label();
                self.emit_branch_if_false(condition_reg, &else_label);

                let then_reg = self.lower_expr(scope, then_value)?;
                self.emit(Instr::Load { ty, dst, slot: Slot::Reg(then_reg) });
                self.emit(Instr::Jump { target: end_label.clone() });

                self.emit(Instr::Label { name: else_label });
                let else_reg = self.lower_expr(scope, else_value)?;
                self.emit(Instr::Load { ty, dst, slot: Slot::Reg(else_reg) });
                self.emit(Instr::Label { name: end_label });
                Ok(dst)
            }

            ExpressionKind::Match { scrutinee, arms } => self.lower_match(scope, scrutinee, arms, info, span),

            ExpressionKind::LetIn { bindings, body } => {
                let inner = self.block_context(expr.index, scope);
                for binding in bindings {
                    let value = self.lower_expr(inner, &binding.value)?;
                    let symbol = match self.ctx.context(inner).get(&binding.name) {
                        Some(symbol) => symbol,
                        None => {
                            return Err(CompilerError::unknown_argument(
                                format!("binding '{}' vanished between passes", binding.name),
                                &binding.span,
                            ))
                        }
                    };
                    let uid = self.ctx.symbol(symbol).uid.clone();
                    let ty = self.ctx.var_types.get(&symbol).map(IrType::from_ty).unwrap_or(IrType::Ptr);
                    self.emit(Instr::StoreLocal { ty, uid, src: value });
                }
                self.lower_expr(inner, body)
            }

            ExpressionKind::Do { body, value } => {
                let inner = self.block_context(expr.index, scope);
                for statement in body {
                    self.lower_stmt(inner, statement)?;
                }
                self.lower_expr(inner, value)
            }

            ExpressionKind::Cast { value, target: _, safe } => {
                let value_reg = self.lower_expr(scope, value)?;
                let value_info = self.info_of(value.index, &value.span)?;
                self.lower_explicit_cast(value_reg, &value_info.inferred, &info.inferred, *safe, span)
            }

            ExpressionKind::Yield(value) => {
                let src = match value {
                    Some(value) => Some(self.lower_expr(scope, value)?),
                    None => None,
                };
                self.emit(Instr::CoroutineYield { src });
                let dst = self.fresh_reg();
                self.emit(Instr::Const { ty: IrType::U8, dst, value: ConstVal::Int(0) });
                Ok(dst)
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

    fn lower_binary(
        &mut self,
        scope: ContextId,
        op: BinaryOperator,
        left: &ExpressionAst,
        right: &ExpressionAst,
        info: &InferenceInfo,
        span: &Span,
    ) -> Result<Reg, CompilerError> {
        if let Some(method) = info.overload {
            let object = self.lower_expr(scope, left)?;
            let rhs = self.lower_expr(scope, right)?;
            let rhs_info = self.info_of(right.index, &right.span)?;
            let rhs_ty = IrType::from_ty(&self.effective_ty(&rhs_info));
            return self.emit_method_call(method, Some(object), &[(rhs, rhs_ty)], span);
        }

        if op.is_logical() {
            // Short circuit; both operands are booleans.
            let dst = self.fresh_reg();
            let short = self.fresh_label();
            let end = self.fresh_label();

            let left_reg = self.lower_expr(scope, left)?;
            match op {
                BinaryOperator::And => self.emit_branch_if_false(left_reg, &short),
                _ => {
                    let zero = self.fresh_reg();
                    self.emit(Instr::Const { ty: IrType::U8, dst: zero, value: ConstVal::Int(0) });
                    self.emit(Instr::JumpCmp { ty: IrType::U8, a: left_reg, b: zero, op: CmpOp::Ne, target: short.clone() });
                }
            }

            let right_reg = self.lower_expr(scope, right)?;
            self.emit(Instr::Load { ty: IrType::U8, dst, slot: Slot::Reg(right_reg) });
            self.emit(Instr::Jump { target: end.clone() });

            self.emit(Instr::Label { name: short });
            let short_value = i64::from(matches!(op, BinaryOperator::Or));
            self.emit(Instr::Const { ty: IrType::U8, dst, value: ConstVal::Int(short_value) });
            self.emit(Instr::Label { name: end });
            return Ok(dst);
        }

        let left_reg = self.lower_expr(scope, left)?;
        let right_reg = self.lower_expr(scope, right)?;
        let left_info = self.info_of(left.index, &left.span)?;
        let operand_ty = IrType::from_ty(&self.effective_ty(&left_info));

        if let Some(cmp) = CmpOp::from_operator(op) {
            return Ok(self.emit_cmp_value(operand_ty, left_reg, right_reg, cmp));
        }

        let ir_op = BinIrOp::from_operator(op)
            .ok_or_else(|| CompilerError::unknown_argument("operator has no instruction", span))?;
        let dst = self.fresh_reg();
        self.emit(Instr::Binary { ty: operand_ty, op: ir_op, dst, a: left_reg, b: right_reg });
        Ok(dst)
    }

    /// Materializes a comparison into a boolean register.
    fn emit_cmp_value(&mut self, ty: IrType, a: Reg, b: Reg, op: CmpOp) -> Reg {
        let dst = self.fresh_reg();
        let true_label = self.fresh_label();
        let end = self.fresh_label();
        self.emit(Instr::JumpCmp { ty, a, b, op, target: true_label.clone() });
        self.emit(Instr::Const { ty: IrType::U8, dst, value: ConstVal::Int(0) });
        self.emit(Instr::Jump { target: end.clone() });
        self.emit(Instr::Label { name: true_label });
        self.emit(Instr::Const { ty: IrType::U8, dst, value: ConstVal::Int(1) });
        self.emit(Instr::Label { name: end });
        dst
    }

    /// Loads a symbol's value into a register.
    fn load_symbol(&mut self, scope: ContextId, symbol: SymbolId, span: &Span) -> Result<Reg, CompilerError> {
        let kind = self.ctx.symbol(symbol).kind.clone();
        let uid = self.ctx.symbol(symbol).uid.clone();

        match kind {
            SymbolKind::Variable | SymbolKind::VariablePattern => {
                let ty = self.ctx.var_types.get(&symbol).map(IrType::from_ty).unwrap_or(IrType::Ptr);
                let slot = match self.ctx.classify(scope, symbol) {
                    ScopeClass::Global => Slot::Global(uid),
                    ScopeClass::Local => Slot::Local(uid),
                    ScopeClass::Upvalue => Slot::Env(uid),
                };
                let dst = self.fresh_reg();
                self.emit(Instr::Load { ty, dst, slot });
                Ok(dst)
            }
            SymbolKind::Argument { .. } => {
                let ty = self.ctx.var_types.get(&symbol).map(IrType::from_ty).unwrap_or(IrType::Ptr);
                let slot = match self.ctx.classify(scope, symbol) {
                    ScopeClass::Upvalue => Slot::Env(uid),
                    _ => Slot::Arg(uid),
                };
                let dst = self.fresh_reg();
                self.emit(Instr::Load { ty, dst, slot });
                Ok(dst)
            }
            SymbolKind::Function(_) | SymbolKind::Lambda(_) => {
                // Function values are zero-capture closures.
                let function_uid = self.entry_uuid(symbol)?;
                let dst = self.fresh_reg();
                self.emit(Instr::ClosureAlloc { dst, captures: 0, function_uid });
                Ok(dst)
            }
            SymbolKind::ClassAttribute { class, attribute_index, .. } => {
                let this = self.fresh_reg();
                self.emit(Instr::Load { ty: IrType::Ptr, dst: this, slot: Slot::Arg("this".to_string()) });
                let ty = self
                    .ctx
                    .class_layouts
                    .get(&class)
                    .map(|layout| IrType::from_ty(&layout.attributes[attribute_index].1))
                    .unwrap_or(IrType::Ptr);
                let dst = self.fresh_reg();
                self.emit(Instr::CLoadF { ty, dst, object: this, index: attribute_index });
                Ok(dst)
            }
            _ => Err(CompilerError::unknown_argument(
                format!("'{}' cannot be loaded as a value", self.ctx.symbol(symbol).name),
                span,
            )),
        }
    }

    /// Stores a register into an assignable place.
    fn store_into_target(&mut self, scope: ContextId, target: &ExpressionAst, src: Reg) -> Result<(), CompilerError> {
        let span = &target.span;
        match &target.kind {
            ExpressionKind::Ident(name) => {
                let symbol = match self.ctx.lookup(scope, name) {
                    Some(symbol) => symbol,
                    None => return Err(CompilerError::undefined_symbol(name.clone(), span)),
                };
                let uid = self.ctx.symbol(symbol).uid.clone();
                let kind = self.ctx.symbol(symbol).kind.clone();

                match kind {
                    SymbolKind::Variable | SymbolKind::VariablePattern | SymbolKind::Argument { .. } => {
                        let ty = self.ctx.var_types.get(&symbol).map(IrType::from_ty).unwrap_or(IrType::Ptr);
                        match self.ctx.classify(scope, symbol) {
                            ScopeClass::Global => self.emit(Instr::StoreGlobal { ty, uid, src }),
                            ScopeClass::Local => self.emit(Instr::StoreLocal { ty, uid, src }),
                            ScopeClass::Upvalue => {
                                self.emit(Instr::StoreLocal { ty, uid, src });
                                self.emit(Instr::ClosureBackup);
                            }
                        }
                        Ok(())
                    }
                    SymbolKind::ClassAttribute { class, attribute_index, .. } => {
                        let this = self.fresh_reg();
                        self.emit(Instr::Load { ty: IrType::Ptr, dst: this, slot: Slot::Arg("this".to_string()) });
                        let ty = self
                            .ctx
                            .class_layouts
                            .get(&class)
                            .map(|layout| IrType::from_ty(&layout.attributes[attribute_index].1))
                            .unwrap_or(IrType::Ptr);
                        self.emit(Instr::CStoreF { ty, object: this, index: attribute_index, src });
                        Ok(())
                    }
                    _ => Err(CompilerError::unknown_argument(
                        format!("'{name}' is not an assignable place"),
                        span,
                    )),
                }
            }

            ExpressionKind::Member { object, member } => {
                let object_info = self.info_of(object.index, &object.span)?;
                let object_reg = self.lower_expr(scope, object)?;
                let reduced = pierce(self.ctx, &object_info.inferred, span);

                match &reduced {
                    Ty::Class { symbol: class, .. } => {
                        let layout = match self.ctx.class_layouts.get(class) {
                            Some(layout) => layout,
                            None => return Err(CompilerError::unknown_argument("class layout missing", span)),
                        };
                        let index = match layout.attribute_index(member) {
                            Some(index) => index,
                            None => return Err(CompilerError::undefined_member(reduced.to_string(), member, span)),
                        };
                        let ty = IrType::from_ty(&layout.attributes[index].1);
                        self.emit(Instr::CStoreF { ty, object: object_reg, index, src });
                        Ok(())
                    }
                    Ty::Struct(shape) => {
                        let index = match shape.field_index(member) {
                            Some(index) => index,
                            None => return Err(CompilerError::undefined_member(reduced.to_string(), member, span)),
                        };
                        let ty = IrType::from_ty(&shape.fields[index].1);
                        self.emit(Instr::SStoreF { ty, object: object_reg, index, src });
                        Ok(())
                    }
                    _ => Err(CompilerError::undefined_member(reduced.to_string(), member, span)),
                }
            }

            ExpressionKind::Index { object, index } => {
                let object_info = self.info_of(object.index, &object.span)?;
                let reduced = pierce(self.ctx, &object_info.inferred, span);

                if let Some(method) = ops::overload_target(self.ctx, &reduced, ops::INDEX_SET) {
                    let object_reg = self.lower_expr(scope, object)?;
                    let index_reg = self.lower_expr(scope, index)?;
                    self.emit_method_call(
                        method,
                        Some(object_reg),
                        &[(index_reg, IrType::U64), (src, IrType::Ptr)],
                        span,
                    )?;
                    return Ok(());
                }

                let array = self.lower_expr(scope, object)?;
                let index_reg = self.lower_expr(scope, index)?;
                let element_ty = match to_kind(self.ctx, &object_info.inferred, TyKind::Array, span) {
                    Some(Ty::Array(element)) => IrType::from_ty(&element),
                    _ => IrType::Ptr,
                };
                self.emit(Instr::AStoreF { ty: element_ty, array, index: index_reg, src });
                Ok(())
            }

            _ => Err(CompilerError::unknown_argument("not an assignable place", span)),
        }
    }

    /// Entry label of a function-like symbol: its body context's uuid.
    pub(super) fn entry_uuid(&self, symbol: SymbolId) -> Result<String, CompilerError> {
        let info = self.ctx.fn_info(symbol).ok_or_else(|| {
            CompilerError::unknown_argument(
                format!("'{}' has no lowered body", self.ctx.symbol(symbol).name),
                &self.ctx.symbol(symbol).span,
            )
        })?;
        Ok(self.ctx.context(info.body_context).uuid.to_string())
    }

    /// Emits a full method invocation through the receiver's method table.
    fn emit_method_call(
        &mut self,
        method: SymbolId,
        object: Option<Reg>,
        arguments: &[(Reg, IrType)],
        span: &Span,
    ) -> Result<Reg, CompilerError> {
        let is_instance = self.ctx.fn_info(method).map(|info| info.is_method).unwrap_or(false);
        let dst = self.fresh_reg();

        if is_instance {
            let object = object.ok_or_else(|| {
                CompilerError::unknown_argument("instance method call without a receiver", span)
            })?;
            let table_index = match self.ctx.symbol(method).kind {
                SymbolKind::ClassMethod { index_in_class: Some(index), .. } => index,
                _ => 0,
            };
            let function = self.fresh_reg();
            self.emit(Instr::CLoadM { dst: function, index: table_index, object });

            self.emit(Instr::FnAlloc);
            self.emit(Instr::FnSetReg { ty: IrType::Ptr, slot: 0, src: object });
            for (position, (reg, ty)) in arguments.iter().enumerate() {
                self.emit(Instr::FnSetReg { ty: *ty, slot: position + 1, src: *reg });
            }
            self.emit(Instr::CallPtr { dst, function });
        } else {
            let target_uid = self.entry_uuid(method)?;
            self.emit(Instr::FnAlloc);
            for (position, (reg, ty)) in arguments.iter().enumerate() {
                self.emit(Instr::FnSetReg { ty: *ty, slot: position, src: *reg });
            }
            self.emit(Instr::Call { dst, target_uid });
        }

        Ok(dst)
    }

    fn lower_call(
        &mut self,
        scope: ContextId,
        expr: &ExpressionAst,
        callee: &ExpressionAst,
        arguments: &[ExpressionAst],
    ) -> Result<Reg, CompilerError> {
        let span = &expr.span;
        let target = match self.ctx.call_targets.get(&(self.owner, expr.index)).cloned() {
            Some(target) => target,
            None => return Err(CompilerError::unknown_argument("call reached lowering unresolved", span)),
        };

        // Arguments evaluate before the frame opens so nested calls cannot
        // clobber it.
        let mut lowered = Vec::new();
        for argument in arguments {
            let reg = self.lower_expr(scope, argument)?;
            let info = self.info_of(argument.index, &argument.span)?;
            lowered.push((reg, IrType::from_ty(&self.effective_ty(&info))));
        }

        match target {
            CallTarget::Function(symbol) => {
                let coroutine = self.ctx.fn_info(symbol).map(|info| info.is_coroutine_callable()).unwrap_or(false);
                let target_uid = self.entry_uuid(symbol)?;
                let dst = self.fresh_reg();

                if coroutine {
                    let coroutine_reg = self.fresh_reg();
                    self.emit(Instr::CoroutineAlloc { dst: coroutine_reg, function_uid: target_uid });
                    self.emit(Instr::CoroutineFnAlloc { coroutine: coroutine_reg });
                    for (position, (reg, ty)) in lowered.iter().enumerate() {
                        self.emit(Instr::FnSetReg { ty: *ty, slot: position, src: *reg });
                    }
                    self.emit(Instr::CoroutineCall { dst, coroutine: coroutine_reg });
                } else {
                    self.emit(Instr::FnAlloc);
                    for (position, (reg, ty)) in lowered.iter().enumerate() {
                        self.emit(Instr::FnSetReg { ty: *ty, slot: position, src: *reg });
                    }
                    self.emit(Instr::Call { dst, target_uid });
                }
                Ok(dst)
            }

            CallTarget::Method(method) => {
                let object = match &callee.kind {
                    ExpressionKind::Member { object, .. } => Some(self.lower_expr(scope, object)?),
                    _ => {
                        // Bare method name inside a class body: the receiver
                        // is `this`.
                        if self.ctx.fn_info(method).map(|info| info.is_method).unwrap_or(false) {
                            let this = self.fresh_reg();
                            self.emit(Instr::Load { ty: IrType::Ptr, dst: this, slot: Slot::Arg("this".to_string()) });
                            Some(this)
                        } else {
                            None
                        }
                    }
                };
                self.emit_method_call(method, object, &lowered, span)
            }

            CallTarget::VariantCase { variant, case_index } => {
                self.construct_variant_case(variant, case_index, &lowered, span)
            }

            CallTarget::FfiMethod { ffi, method_index } => {
                for (reg, ty) in &lowered {
                    self.emit(Instr::Push { ty: *ty, src: *reg });
                }
                let ffi_id = self.ctx.ffi_ids.get(&ffi).copied().unwrap_or(0);
                let dst = self.fresh_reg();
                self.emit(Instr::CallFfi { dst, ffi_id, method_id: method_index });
                Ok(dst)
            }

            CallTarget::Indirect => {
                let closure = self.lower_expr(scope, callee)?;
                self.emit(Instr::FnAlloc);
                for (position, (reg, ty)) in lowered.iter().enumerate() {
                    self.emit(Instr::FnSetReg { ty: *ty, slot: position, src: *reg });
                }
                let dst = self.fresh_reg();
                self.emit(Instr::ClosureCall { dst, closure });
                Ok(dst)
            }
        }
    }

    /// Builds the struct representation of one variant case: a `u16` tag at
    /// field 0 followed by the case parameters.
    pub(super) fn construct_variant_case(
        &mut self,
        variant: SymbolId,
        case_index: usize,
        arguments: &[(Reg, IrType)],
        span: &Span,
    ) -> Result<Reg, CompilerError> {
        let _ = span;
        let _ = variant;

        let fields = 1 + arguments.len();
        let total_size = 2 + arguments.iter().map(|(_, ty)| ty.byte_size()).sum::<usize>();

        let dst = self.fresh_reg();
        self.emit(Instr::SAlloc { dst, fields, total_size });
        self.emit(Instr::SRegField { dst, index: 0, offset: 0 });
        let mut offset = 2;
        for (position, (_, ty)) in arguments.iter().enumerate() {
            self.emit(Instr::SRegField { dst, index: position + 1, offset });
            offset += ty.byte_size();
        }

        let tag = self.fresh_reg();
        self.emit(Instr::Const { ty: IrType::U16, dst: tag, value: ConstVal::Int(case_index as i64) });
        self.emit(Instr::SStoreF { ty: IrType::U16, object: dst, index: 0, src: tag });

        for (position, (reg, ty)) in arguments.iter().enumerate() {
            self.emit(Instr::SStoreF { ty: *ty, object: dst, index: position + 1, src: *reg });
        }
        Ok(dst)
    }

    fn lower_new(
        &mut self,
        scope: ContextId,
        expr: &ExpressionAst,
        arguments: &[ExpressionAst],
        info: &InferenceInfo,
        span: &Span,
    ) -> Result<Reg, CompilerError> {
        let class = match pierce(self.ctx, &info.inferred, span) {
            Ty::Class { symbol, .. } => symbol,
            other => {
                return Err(CompilerError::unknown_argument(
                    format!("'{other}' reached new-lowering without a class type"),
                    span,
                ))
            }
        };
        let layout = match self.ctx.class_layouts.get(&class).cloned() {
            Some(layout) => layout,
            None => return Err(CompilerError::unknown_argument("class layout missing", span)),
        };

        let dst = self.fresh_reg();
        self.emit(Instr::CAlloc {
            dst,
            methods: layout.methods.len(),
            data_size: layout.data_size,
            class_id: layout.class_id,
        });
        for (index, (_, _, offset, _)) in layout.attributes.iter().enumerate() {
            self.emit(Instr::CRegField { dst, index, offset: *offset });
        }
        for (index, method) in layout.methods.iter().enumerate() {
            let inferred = self.ctx.fn_info(*method).map(|info| info.inferred).unwrap_or(false);
            if !inferred {
                continue;
            }
            let function_uid = self.entry_uuid(*method)?;
            self.emit(Instr::CStoreM { dst, index, function_uid });
        }

        // Constructor dispatch goes through the freshly built method table.
        if let Some(CallTarget::Method(constructor)) = self.ctx.call_targets.get(&(self.owner, expr.index)).cloned() {
            let mut lowered = Vec::new();
            for argument in arguments {
                let reg = self.lower_expr(scope, argument)?;
                let argument_info = self.info_of(argument.index, &argument.span)?;
                lowered.push((reg, IrType::from_ty(&self.effective_ty(&argument_info))));
            }
            self.emit_method_call(constructor, Some(dst), &lowered, span)?;
        }

        Ok(dst)
    }

    fn lower_lambda_value(&mut self, scope: ContextId, expr: &ExpressionAst, span: &Span) -> Result<Reg, CompilerError> {
        let symbol = match self.ctx.lambda_symbols.get(&(self.owner, expr.index)).copied() {
            Some(symbol) => symbol,
            None => return Err(CompilerError::unknown_argument("lambda lost its symbol between passes", span)),
        };

        let upvalues: Vec<(String, SymbolId)> = self
            .ctx
            .fn_info(symbol)
            .map(|info| info.upvalues.iter().map(|(uid, sym)| (uid.clone(), *sym)).collect())
            .unwrap_or_default();
        let function_uid = self.entry_uuid(symbol)?;

        let dst = self.fresh_reg();
        self.emit(Instr::ClosureAlloc { dst, captures: upvalues.len(), function_uid });

        // Captures are pushed in first-lookup order, matching the capture
        // list the body was compiled against.
        for (_, captured) in upvalues {
            let value = self.load_symbol(scope, captured, span)?;
            let ty = self.ctx.var_types.get(&captured).map(IrType::from_ty).unwrap_or(IrType::Ptr);
            self.emit(Instr::ClosurePushEnv { ty, closure: dst, src: value });
        }
        Ok(dst)
    }

    fn lower_member_read(
        &mut self,
        scope: ContextId,
        object: &ExpressionAst,
        member: &str,
        info: &InferenceInfo,
        span: &Span,
    ) -> Result<Reg, CompilerError> {
        // Paths through namespaces, enums, variants and static classes
        // never evaluate the object.
        if let ExpressionKind::Ident(name) = &object.kind {
            if let Some(symbol) = self.ctx.lookup(scope, name) {
                match self.ctx.symbol(symbol).kind.clone() {
                    SymbolKind::Namespace { context } => {
                        let target = match self.ctx.context(context).get(member) {
                            Some(target) => target,
                            None => return Err(CompilerError::undefined_member(name.clone(), member, span)),
                        };
                        return self.load_symbol(scope, target, span);
                    }
                    SymbolKind::DeclaredType(TypeDeclAst::Variant(decl)) => {
                        let case_index = decl
                            .cases
                            .iter()
                            .position(|case| case.name == member)
                            .ok_or_else(|| CompilerError::undefined_member(name.clone(), member, span))?;
                        // Only parameterless cases are values here.
                        return self.construct_variant_case(symbol, case_index, &[], span);
                    }
                    SymbolKind::DeclaredType(TypeDeclAst::Enum(decl)) => {
                        let value = enum_member_value(&decl, member)
                            .ok_or_else(|| CompilerError::undefined_member(name.clone(), member, span))?;
                        let ty = IrType::from_ty(&info.inferred);
                        let dst = self.fresh_reg();
                        self.emit(Instr::Const { ty, dst, value: ConstVal::Int(value) });
                        return Ok(dst);
                    }
                    SymbolKind::DeclaredType(TypeDeclAst::Class(_)) => {
                        if let Some(members) = self.ctx.type_contexts.get(&symbol).copied() {
                            if let Some(target) = self.ctx.context(members).get(member) {
                                // Static access: attributes live in the global
                                // segment, methods become closures.
                                match self.ctx.symbol(target).kind.clone() {
                                    SymbolKind::ClassAttribute { .. } => {
                                        let uid = self.ctx.symbol(target).uid.clone();
                                        let ty = IrType::from_ty(&info.inferred);
                                        let dst = self.fresh_reg();
                                        self.emit(Instr::Load { ty, dst, slot: Slot::Global(uid) });
                                        return Ok(dst);
                                    }
                                    SymbolKind::ClassMethod { .. } => {
                                        let function_uid = self.entry_uuid(target)?;
                                        let dst = self.fresh_reg();
                                        self.emit(Instr::ClosureAlloc { dst, captures: 0, function_uid });
                                        return Ok(dst);
                                    }
                                    _ => {}
                                }
                            }
                        }
                        return Err(CompilerError::undefined_member(name.clone(), member, span));
                    }
                    _ => {}
                }
            }
        }

        let object_info = self.info_of(object.index, &object.span)?;
        let object_reg = self.lower_expr(scope, object)?;
        let reduced = pierce(self.ctx, &object_info.inferred, span);

        match &reduced {
            Ty::Class { symbol: class, .. } => {
                let layout = match self.ctx.class_layouts.get(class).cloned() {
                    Some(layout) => layout,
                    None => return Err(CompilerError::unknown_argument("class layout missing", span)),
                };
                if let Some(index) = layout.attribute_index(member) {
                    let ty = IrType::from_ty(&layout.attributes[index].1);
                    let dst = self.fresh_reg();
                    self.emit(Instr::CLoadF { ty, dst, object: object_reg, index });
                    return Ok(dst);
                }
                if let Some(method) = ops::find_class_method(self.ctx, *class, member) {
                    let index = layout.method_index(method).unwrap_or(0);
                    let dst = self.fresh_reg();
                    self.emit(Instr::CLoadM { dst, index, object: object_reg });
                    return Ok(dst);
                }
                Err(CompilerError::undefined_member(reduced.to_string(), member, span))
            }
            Ty::Implementation { symbol, .. } => {
                let members = self.ctx.type_contexts.get(symbol).copied();
                let target = members.and_then(|members| self.ctx.context(members).get(member));
                match target.map(|target| self.ctx.symbol(target).kind.clone()) {
                    Some(SymbolKind::ImplementationAttribute { attribute_index, .. }) => {
                        let ty = IrType::from_ty(&info.inferred);
                        let dst = self.fresh_reg();
                        self.emit(Instr::CLoadF { ty, dst, object: object_reg, index: attribute_index });
                        Ok(dst)
                    }
                    _ => Err(CompilerError::undefined_member(reduced.to_string(), member, span)),
                }
            }
            Ty::Struct(shape) => {
                let index = shape
                    .field_index(member)
                    .ok_or_else(|| CompilerError::undefined_member(reduced.to_string(), member, span))?;
                let ty = IrType::from_ty(&shape.fields[index].1);
                let dst = self.fresh_reg();
                self.emit(Instr::SLoadF { ty, dst, object: object_reg, index });
                Ok(dst)
            }
            _ => Err(CompilerError::undefined_member(reduced.to_string(), member, span)),
        }
    }

    fn lower_match(
        &mut self,
        scope: ContextId,
        scrutinee: &ExpressionAst,
        arms: &[crate::ast::MatchArmAst],
        info: &InferenceInfo,
        span: &Span,
    ) -> Result<Reg, CompilerError> {
        let scrutinee_info = self.info_of(scrutinee.index, &scrutinee.span)?;
        let scrutinee_reg = self.lower_expr(scope, scrutinee)?;
        let scrutinee_ty = pierce(self.ctx, &scrutinee_info.inferred, span);

        let result_ty = IrType::from_ty(&self.effective_ty(info));
        let dst = self.fresh_reg();
        let end = self.fresh_label();

        // Selection: tag comparisons for variants, chained value compares
        // otherwise.
        let arm_labels: Vec<String> = arms.iter().map(|_| self.fresh_label()).collect();
        let tag = if scrutinee_ty.kind() == TyKind::Variant || scrutinee_ty.kind() == TyKind::VariantCtor {
            let tag = self.fresh_reg();
            self.emit(Instr::SLoadF { ty: IrType::U16, dst: tag, object: scrutinee_reg, index: 0 });
            Some(tag)
        } else {
            None
        };

        for (arm, label) in arms.iter().zip(&arm_labels) {
            match &arm.pattern {
                MatchPatternAst::VariantCase { path, bindings: _ } => {
                    let arm_scope = self.block_context(arm.value.index, scope);
                    let (_, case_index) = self.resolve_case_for_lowering(arm_scope, path, &arm.span)?;
                    let tag = tag.ok_or_else(|| {
                        CompilerError::unknown_argument("variant pattern on a non-variant value", &arm.span)
                    })?;
                    let wanted = self.fresh_reg();
                    self.emit(Instr::Const { ty: IrType::U16, dst: wanted, value: ConstVal::Int(case_index as i64) });
                    self.emit(Instr::JumpCmp { ty: IrType::U16, a: tag, b: wanted, op: CmpOp::Eq, target: label.clone() });
                }
                MatchPatternAst::Literal(literal) => {
                    let ty = IrType::from_ty(&scrutinee_ty);
                    let wanted = self.fresh_reg();
                    let value = match literal {
                        PrimitiveValue::Int(value) => ConstVal::Int(*value),
                        PrimitiveValue::Float(value) => ConstVal::Float(*value),
                        PrimitiveValue::Bool(value) => ConstVal::Int(i64::from(*value)),
                        PrimitiveValue::Char(value) => ConstVal::Int(*value as i64),
                        PrimitiveValue::Null => ConstVal::Int(0),
                        PrimitiveValue::String(value) => ConstVal::Str(value.clone()),
                    };
                    self.emit(Instr::Const { ty, dst: wanted, value });
                    self.emit(Instr::JumpCmp { ty, a: scrutinee_reg, b: wanted, op: CmpOp::Eq, target: label.clone() });
                }
                MatchPatternAst::Wildcard => {
                    self.emit(Instr::Jump { target: label.clone() });
                }
            }
        }
        self.emit(Instr::Jump { target: end.clone() });

        for (arm, label) in arms.iter().zip(&arm_labels) {
            self.emit(Instr::Label { name: label.clone() });
            let arm_scope = self.block_context(arm.value.index, scope);

            if let MatchPatternAst::VariantCase { path, bindings } = &arm.pattern {
                let (_, _case_index) = self.resolve_case_for_lowering(arm_scope, path, &arm.span)?;
                for (position, binding) in bindings.iter().enumerate() {
                    let symbol = match self.ctx.context(arm_scope).get(binding) {
                        Some(symbol) => symbol,
                        None => continue,
                    };
                    let ty = self.ctx.var_types.get(&symbol).map(IrType::from_ty).unwrap_or(IrType::Ptr);
                    let uid = self.ctx.symbol(symbol).uid.clone();
                    let value = self.fresh_reg();
                    self.emit(Instr::SLoadF { ty, dst: value, object: scrutinee_reg, index: position + 1 });
                    self.emit(Instr::StoreLocal { ty, uid, src: value });
                }
            }

            let arm_value = self.lower_expr(arm_scope, &arm.value)?;
            self.emit(Instr::Load { ty: result_ty, dst, slot: Slot::Reg(arm_value) });
            self.emit(Instr::Jump { target: end.clone() });
        }

        self.emit(Instr::Label { name: end });
        Ok(dst)
    }

    fn resolve_case_for_lowering(&mut self, scope: ContextId, path: &[String], span: &Span) -> Result<(SymbolId, usize), CompilerError> {
        if path.len() != 2 {
            return Err(CompilerError::undefined_symbol(path.join("."), span));
        }
        let variant = self
            .ctx
            .lookup(scope, &path[0])
            .ok_or_else(|| CompilerError::undefined_symbol(path[0].clone(), span))?;
        let decl = match &self.ctx.symbol(variant).kind {
            SymbolKind::DeclaredType(TypeDeclAst::Variant(decl)) => decl.clone(),
            _ => return Err(CompilerError::undefined_symbol(path[0].clone(), span)),
        };
        let case_index = decl
            .cases
            .iter()
            .position(|case| case.name == path[1])
            .ok_or_else(|| CompilerError::undefined_member(path[0].clone(), path[1].clone(), span))?;
        Ok((variant, case_index))
    }

    /// Explicit cast lowering. Safe casts produce null on the failing path;
    /// the metadata decides the runtime shape.
    fn lower_explicit_cast(&mut self, value: Reg, from: &Ty, to: &Ty, safe: bool, span: &Span) -> Result<Reg, CompilerError> {
        let target = match to {
            Ty::Nullable(inner) if safe => inner.as_ref().clone(),
            other => other.clone(),
        };

        let result = can_cast_types(self.ctx, from, &target, span);
        if !result.success {
            return Err(CompilerError::cannot_cast(from.to_string(), target.to_string(), result.message, span));
        }

        match result.metadata {
            CastMeta::None | CastMeta::MethodTable(_) => Ok(value),
            CastMeta::NumericSteps(steps) => {
                let mut current = value;
                for step in steps {
                    let dst = self.fresh_reg();
                    self.emit(Instr::Cast { step, dst, src: current });
                    current = dst;
                }
                Ok(current)
            }
            CastMeta::FieldSwaps(swaps) => self.emit_field_swaps(value, from, &target, &swaps, span),
            CastMeta::RuntimeCheck => {
                let reduced_from = pierce(self.ctx, from, span);
                let reduced_to = pierce(self.ctx, &target, span);

                match (&reduced_from, &reduced_to) {
                    // Interface to class: identity check on the class id.
                    (Ty::Interface { .. }, Ty::Class { symbol, .. }) => {
                        let class_id = self
                            .ctx
                            .class_layouts
                            .get(symbol)
                            .map(|layout| layout.class_id)
                            .unwrap_or(0);
                        let check = self.fresh_reg();
                        self.emit(Instr::IIsC { dst: check, interface: value, class_id });

                        let fail = self.fresh_label();
                        let end = self.fresh_label();
                        let dst = self.fresh_reg();
                        self.emit_branch_if_false_to(check, &fail);
                        self.emit(Instr::Load { ty: IrType::Ptr, dst, slot: Slot::Reg(value) });
                        self.emit(Instr::Jump { target: end.clone() });
                        self.emit(Instr::Label { name: fail });
                        self.emit(Instr::Const { ty: IrType::Ptr, dst, value: ConstVal::Int(0) });
                        self.emit(Instr::Label { name: end });
                        Ok(dst)
                    }
                    // Interface to interface: probe every required method.
                    (Ty::Interface { .. }, Ty::Interface { symbol, .. }) => {
                        let method_count = match &self.ctx.symbol(*symbol).kind {
                            SymbolKind::DeclaredType(TypeDeclAst::Interface(decl)) => decl.methods.len(),
                            _ => 0,
                        };
                        let fail = self.fresh_label();
                        let end = self.fresh_label();
                        let dst = self.fresh_reg();
                        for method_id in 0..method_count {
                            self.emit(Instr::IHasM { method_id, interface: value, fail: fail.clone() });
                        }
                        self.emit(Instr::Load { ty: IrType::Ptr, dst, slot: Slot::Reg(value) });
                        self.emit(Instr::Jump { target: end.clone() });
                        self.emit(Instr::Label { name: fail });
                        self.emit(Instr::Const { ty: IrType::Ptr, dst, value: ConstVal::Int(0) });
                        self.emit(Instr::Label { name: end });
                        Ok(dst)
                    }
                    // Nullable strip.
                    _ => self.emit_null_checked_copy(value, from),
                }
            }
            CastMeta::TagCheck => {
                let case_index = match pierce(self.ctx, &target, span) {
                    Ty::VariantCtor { case_index, .. } => case_index,
                    _ => 0,
                };
                let tag = self.fresh_reg();
                self.emit(Instr::SLoadF { ty: IrType::U16, dst: tag, object: value, index: 0 });
                let wanted = self.fresh_reg();
                self.emit(Instr::Const { ty: IrType::U16, dst: wanted, value: ConstVal::Int(case_index as i64) });

                let ok = self.fresh_label();
                let end = self.fresh_label();
                let dst = self.fresh_reg();
                self.emit(Instr::JumpCmp { ty: IrType::U16, a: tag, b: wanted, op: CmpOp::Eq, target: ok.clone() });
                self.emit(Instr::Const { ty: IrType::Ptr, dst, value: ConstVal::Int(0) });
                self.emit(Instr::Jump { target: end.clone() });
                self.emit(Instr::Label { name: ok });
                self.emit(Instr::Load { ty: IrType::Ptr, dst, slot: Slot::Reg(value) });
                self.emit(Instr::Label { name: end });
                Ok(dst)
            }
        }
    }

    /// Like [`Self::emit_branch_if_false`], reused by cast paths.
    fn emit_branch_if_false_to(&mut self, condition: Reg, target: &str) {
        self.emit_branch_if_false(condition, target);
    }
}

/// Enum member values: explicit where written, previous-plus-one otherwise.
fn enum_member_value(decl: &EnumDefinitionAst, member: &str) -> Option<i64> {
    let mut next = 0i64;
    for candidate in &decl.members {
        let value = candidate.value.unwrap_or(next);
        if candidate.name == member {
            return Some(value);
        }
        next = value + 1;
    }
    None
}
