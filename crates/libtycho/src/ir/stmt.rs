//! Statement lowering.

use crate::{
    ast::{StatementAst, StatementKind},
    error::CompilerError,
    ir::{CmpOp, ConstVal, Instr, IrType, Reg},
    sym::ContextId,
};

use super::FunctionLowering;

impl FunctionLowering<'_> {
    pub fn lower_stmt(&mut self, scope: ContextId, statement: &StatementAst) -> Result<(), CompilerError> {
        match &statement.kind {
            StatementKind::Variable(definition) => {
                let value = match &definition.value {
                    Some(value) => value,
                    None => return Ok(()),
                };
                self.with_srcmap(&statement.span, |lowering| {
                    let src = lowering.lower_expr(scope, value)?;
                    let symbol = match lowering.ctx.lookup(scope, &definition.name) {
                        Some(symbol) => symbol,
                        None => {
                            return Err(CompilerError::unknown_argument(
                                format!("variable '{}' vanished between passes", definition.name),
                                &statement.span,
                            ))
                        }
                    };
                    let uid = lowering.ctx.symbol(symbol).uid.clone();
                    let ty = lowering
                        .ctx
                        .var_types
                        .get(&symbol)
                        .map(IrType::from_ty)
                        .unwrap_or(IrType::Ptr);
                    lowering.emit(Instr::StoreLocal { ty, uid, src });
                    Ok(())
                })
            }

            StatementKind::Expression(expression) => self.with_srcmap(&statement.span, |lowering| {
                lowering.lower_expr(scope, expression)?;
                Ok(())
            }),

            StatementKind::Block(body) => {
                let inner = self.block_context(statement.index, scope);
                for statement in body {
                    self.lower_stmt(inner, statement)?;
                }
                Ok(())
            }

            StatementKind::If { condition, then_body, else_body } => {
                let condition_reg = self.lower_expr(scope, condition)?;
                let false_target = self.fresh_label();
                self.emit_branch_if_false(condition_reg, &false_target);

                let then_scope = self.block_context(statement.index, scope);
                for statement in then_body {
                    self.lower_stmt(then_scope, statement)?;
                }

                match else_body {
                    Some(else_body) => {
                        let end = self.fresh_label();
                        self.emit(Instr::Jump { target: end.clone() });
                        self.emit(Instr::Label { name: false_target });

                        let else_scope = else_body
                            .first()
                            .map(|first| self.block_context(first.index, scope))
                            .unwrap_or(scope);
                        for statement in else_body {
                            self.lower_stmt(else_scope, statement)?;
                        }
                        self.emit(Instr::Label { name: end });
                    }
                    None => self.emit(Instr::Label { name: false_target }),
                }
                Ok(())
            }

            StatementKind::While { condition, body } => {
                let start = self.fresh_label();
                let end = self.fresh_label();

                self.emit(Instr::Label { name: start.clone() });
                let condition_reg = self.lower_expr(scope, condition)?;
                self.emit_branch_if_false(condition_reg, &end);

                self.break_labels.push(end.clone());
                self.continue_labels.push(start.clone());
                let loop_scope = self.block_context(statement.index, scope);
                for statement in body {
                    self.lower_stmt(loop_scope, statement)?;
                }
                self.continue_labels.pop();
                self.break_labels.pop();

                self.emit(Instr::Jump { target: start });
                self.emit(Instr::Label { name: end });
                Ok(())
            }

            StatementKind::ForEach { variable, iterable, body } => {
                let array = self.lower_expr(scope, iterable)?;
                let length = self.fresh_reg();
                self.emit(Instr::ALen { dst: length, array });

                let index = self.fresh_reg();
                self.emit(Instr::Const { ty: IrType::U64, dst: index, value: ConstVal::Int(0) });

                let start = self.fresh_label();
                let advance = self.fresh_label();
                let end = self.fresh_label();
                self.emit(Instr::Label { name: start.clone() });
                self.emit(Instr::JumpCmp {
                    ty: IrType::U64,
                    a: index,
                    b: length,
                    op: CmpOp::Ge,
                    target: end.clone(),
                });

                let loop_scope = self.block_context(statement.index, scope);
                let binding = match self.ctx.context(loop_scope).get(variable) {
                    Some(binding) => binding,
                    None => {
                        return Err(CompilerError::unknown_argument(
                            format!("loop variable '{variable}' vanished between passes"),
                            &statement.span,
                        ))
                    }
                };
                let element_ty = self
                    .ctx
                    .var_types
                    .get(&binding)
                    .map(IrType::from_ty)
                    .unwrap_or(IrType::Ptr);
                let uid = self.ctx.symbol(binding).uid.clone();

                let element = self.fresh_reg();
                self.emit(Instr::ALoadF { ty: element_ty, dst: element, index, array });
                self.emit(Instr::StoreLocal { ty: element_ty, uid, src: element });

                self.break_labels.push(end.clone());
                self.continue_labels.push(advance.clone());
                for statement in body {
                    self.lower_stmt(loop_scope, statement)?;
                }
                self.continue_labels.pop();
                self.break_labels.pop();

                self.emit(Instr::Label { name: advance });
                let one = self.fresh_reg();
                self.emit(Instr::Const { ty: IrType::U64, dst: one, value: ConstVal::Int(1) });
                self.emit(Instr::Binary {
                    ty: IrType::U64,
                    op: super::BinIrOp::Add,
                    dst: index,
                    a: index,
                    b: one,
                });
                self.emit(Instr::Jump { target: start });
                self.emit(Instr::Label { name: end });
                Ok(())
            }

            StatementKind::Return(value) => self.with_srcmap(&statement.span, |lowering| {
                match value {
                    Some(value) => {
                        let src = lowering.lower_expr(scope, value)?;
                        let ty = IrType::from_ty(&lowering.return_ty);
                        lowering.emit(Instr::Ret { ty, src });
                    }
                    None => lowering.emit(Instr::RetVoid),
                }
                Ok(())
            }),

            StatementKind::Break => match self.break_labels.last().cloned() {
                Some(target) => {
                    self.emit(Instr::Jump { target });
                    Ok(())
                }
                None => Err(CompilerError::jump_outside_loop("break", &statement.span)),
            },

            StatementKind::Continue => match self.continue_labels.last().cloned() {
                Some(target) => {
                    self.emit(Instr::Jump { target });
                    Ok(())
                }
                None => Err(CompilerError::jump_outside_loop("continue", &statement.span)),
            },
        }
    }

    /// Jumps to `target` when a boolean register holds false.
    pub(super) fn emit_branch_if_false(&mut self, condition: Reg, target: &str) {
        let zero = self.fresh_reg();
        self.emit(Instr::Const { ty: IrType::U8, dst: zero, value: ConstVal::Int(0) });
        self.emit(Instr::JumpCmp {
            ty: IrType::U8,
            a: condition,
            b: zero,
            op: CmpOp::Eq,
            target: target.to_string(),
        });
    }
}
