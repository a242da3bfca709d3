//! Statement inference.

use crate::{
    ast::{StatementAst, StatementKind, VariableDefinitionAst},
    error::CompilerError,
    sym::{ContextId, ContextOwner, Symbol, SymbolKind},
    types::{resolve_type_name, Ty, TyKind},
};

use super::InferencePass;

impl InferencePass<'_> {
    pub fn infer_stmt(&mut self, scope: ContextId, statement: &StatementAst) -> Result<(), CompilerError> {
        match &statement.kind {
            StatementKind::Variable(definition) => self.infer_variable(scope, statement, definition),
            StatementKind::Expression(expression) => {
                self.infer_expr(scope, expression, None)?;
                Ok(())
            }
            StatementKind::Block(body) => {
                let package = self.ctx.context(scope).package;
                let block = self.ctx.create_context(Some(scope), ContextOwner::None, package);
                let owner = self.ctx.owner_of(scope);
                self.ctx.block_contexts.insert((owner, statement.index), block);
                for inner in body {
                    self.infer_stmt(block, inner)?;
                }
                Ok(())
            }
            StatementKind::If { condition, then_body, else_body } => {
                self.infer_expr(scope, condition, Some(&Ty::BOOL))?;

                let package = self.ctx.context(scope).package;
                let then_scope = self.ctx.create_context(Some(scope), ContextOwner::None, package);
                let owner = self.ctx.owner_of(scope);
                self.ctx.block_contexts.insert((owner, statement.index), then_scope);
                for inner in then_body {
                    self.infer_stmt(then_scope, inner)?;
                }

                if let Some(else_body) = else_body {
                    let else_scope = self.ctx.create_context(Some(scope), ContextOwner::None, package);
                    // Keyed off the first statement when present; an empty
                    // else branch needs no context at lowering time.
                    if let Some(first) = else_body.first() {
                        let owner = self.ctx.owner_of(scope);
                        self.ctx.block_contexts.insert((owner, first.index), else_scope);
                    }
                    for inner in else_body {
                        self.infer_stmt(else_scope, inner)?;
                    }
                }
                Ok(())
            }
            StatementKind::While { condition, body } => {
                self.infer_expr(scope, condition, Some(&Ty::BOOL))?;

                let package = self.ctx.context(scope).package;
                let loop_scope = self.ctx.create_context(Some(scope), ContextOwner::Loop, package);
                let owner = self.ctx.owner_of(scope);
                self.ctx.block_contexts.insert((owner, statement.index), loop_scope);
                for inner in body {
                    self.infer_stmt(loop_scope, inner)?;
                }
                Ok(())
            }
            StatementKind::ForEach { variable, iterable, body } => {
                let iterable_ty = self.infer_expr(scope, iterable, None)?;
                let element = match crate::types::resolve::to_kind(self.ctx, &iterable_ty, TyKind::Array, &iterable.span) {
                    Some(Ty::Array(element)) => *element,
                    _ => {
                        return Err(CompilerError::cannot_assign(
                            iterable_ty.to_string(),
                            "array",
                            "only arrays can be iterated",
                            &iterable.span,
                        ))
                    }
                };

                let package = self.ctx.context(scope).package;
                let loop_scope = self.ctx.create_context(Some(scope), ContextOwner::Loop, package);
                let owner = self.ctx.owner_of(scope);
                self.ctx.block_contexts.insert((owner, statement.index), loop_scope);

                let binding = self.ctx.add_symbol(
                    loop_scope,
                    Symbol::new(variable, SymbolKind::Variable, statement.span.clone()),
                )?;
                self.ctx.var_types.insert(binding, element);
                if let Some(function) = self.ctx.find_parent_function(loop_scope) {
                    self.ctx.fn_info_mut(function).locals.insert(binding);
                }

                for inner in body {
                    self.infer_stmt(loop_scope, inner)?;
                }
                Ok(())
            }
            StatementKind::Return(value) => {
                let function = match self.ctx.find_parent_function(scope) {
                    Some(function) => function,
                    None => {
                        return Err(CompilerError::semantic(
                            "return can only appear inside a function body",
                            "return is not allowed here",
                            &statement.span,
                        ))
                    }
                };

                let declared = self.ctx.fn_info_mut(function).return_ty.clone();
                if let Some(value) = value {
                    self.infer_expr(scope, value, declared.as_ref())?;
                } else if let Some(declared) = &declared {
                    if !declared.is_void() {
                        return Err(CompilerError::cannot_assign(
                            "void",
                            declared.to_string(),
                            "this function must return a value",
                            &statement.span,
                        ));
                    }
                }

                self.ctx
                    .fn_info_mut(function)
                    .returns
                    .push((statement.index, statement.span.clone()));
                Ok(())
            }
            StatementKind::Break => {
                if self.ctx.find_parent_loop(scope).is_none() {
                    return Err(CompilerError::jump_outside_loop("break", &statement.span));
                }
                Ok(())
            }
            StatementKind::Continue => {
                if self.ctx.find_parent_loop(scope).is_none() {
                    return Err(CompilerError::jump_outside_loop("continue", &statement.span));
                }
                Ok(())
            }
        }
    }

    fn infer_variable(&mut self, scope: ContextId, statement: &StatementAst, definition: &VariableDefinitionAst) -> Result<(), CompilerError> {
        let annotated = match &definition.type_name {
            Some(type_name) => Some(resolve_type_name(self.ctx, scope, type_name)?),
            None => None,
        };

        let inferred = match &definition.value {
            Some(value) => Some(self.infer_expr(scope, value, annotated.as_ref())?),
            None => None,
        };

        let ty = match (annotated, inferred) {
            (Some(annotated), _) => annotated,
            (None, Some(inferred)) => {
                if inferred.is_null_literal() {
                    return Err(CompilerError::cannot_assign(
                        "null",
                        "an annotated nullable type",
                        "a bare null initializer needs a type annotation",
                        &statement.span,
                    ));
                }
                inferred
            }
            (None, None) => {
                return Err(CompilerError::missing_annotation(
                    format!("variable '{}' has neither a type nor an initializer", definition.name),
                    &statement.span,
                ))
            }
        };

        let symbol = self.ctx.add_symbol(
            scope,
            Symbol::new(&definition.name, SymbolKind::Variable, definition.span.clone()),
        )?;
        self.ctx.var_types.insert(symbol, ty);

        // Declarations count as locals even before any lookup sees them.
        if let Some(function) = self.ctx.find_parent_function(scope) {
            self.ctx.fn_info_mut(function).locals.insert(symbol);
        }
        Ok(())
    }
}
