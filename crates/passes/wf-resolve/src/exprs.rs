//! Expression and statement resolution
//!
//! Statement lists fold into the expression tree: a `let` scopes the rest of
//! its block, a `return` ends the fold with its value, assignments and
//! effect expressions collect into block nodes. Branching expressions unify
//! their branch types through the ordinary coercion machinery, so an `if`
//! with an `int` arm and a `float` arm types as `float`.

use crate::error::ResolveError;
use crate::resolver::Resolver;
use crate::scope::ScopeKind;
use wf_ast as ast;
use wf_sema::{
    DeclBuilder, DeclId, DeclKind, ExprId, ExprKind, FieldDecl, Ice, MemberFlavor, SwitchCase,
    TypeId,
};
use wf_span::FileSpan;

impl Resolver<'_> {
    /// Resolve one AST expression
    pub(crate) fn resolve_expr(&mut self, expr_id: ast::ExprId) -> Result<ExprId, Ice> {
        let ast_ref = self.ast;
        let expr = &ast_ref.exprs[expr_id];
        let span = expr.span;
        match &expr.kind {
            ast::ExprKind::Term(term) => {
                let term = self.resolve_term(*term)?;
                self.term_as_expr(term, span)
            }
            ast::ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.resolve_expr(*cond)?;
                let bool_ty = self.module.types.bool();
                let cond = self.coerce_or_report(cond, bool_ty)?;
                let then_branch = self.resolve_expr(*then_branch)?;
                let else_branch = self.resolve_expr(*else_branch)?;
                let (then_branch, else_branch, ty) =
                    self.unify_branches(then_branch, else_branch, span)?;
                Ok(self.module.expr(
                    ExprKind::If {
                        cond,
                        then_branch,
                        else_branch,
                    },
                    ty,
                    span,
                ))
            }
            ast::ExprKind::Switch {
                scrutinee,
                cases,
                default,
            } => {
                let scrutinee = self.resolve_expr(*scrutinee)?;
                let scrutinee_ty = self.module.exprs[scrutinee].ty;
                let mut resolved_cases = Vec::with_capacity(cases.len());
                let mut default_expr = self.resolve_expr(*default)?;
                let mut ty = self.module.exprs[default_expr].ty;
                for case in cases {
                    let value = self.resolve_expr(case.value)?;
                    let value = self.coerce_or_report(value, scrutinee_ty)?;
                    let body = self.resolve_expr(case.body)?;
                    let (body, unified_default, unified_ty) =
                        self.unify_branches(body, default_expr, span)?;
                    default_expr = unified_default;
                    ty = unified_ty;
                    resolved_cases.push(SwitchCase { value, body });
                }
                Ok(self.module.expr(
                    ExprKind::Switch {
                        scrutinee,
                        cases: resolved_cases,
                        default: default_expr,
                    },
                    ty,
                    span,
                ))
            }
            ast::ExprKind::For { var, iter, body } => {
                let iter = self.resolve_expr(*iter)?;
                let iter_ty = self.module.exprs[iter].ty;
                let scope = self
                    .scopes
                    .create_child(self.current_scope, ScopeKind::Block);
                let var_decl = self.bind_local(scope, var.name, iter_ty, var.span)?;
                let body = self.in_scope(scope, |this| this.resolve_expr(*body))?;
                let ty = self.module.exprs[body].ty;
                Ok(self.module.expr(
                    ExprKind::For {
                        var: var_decl,
                        iter,
                        body,
                    },
                    ty,
                    span,
                ))
            }
            ast::ExprKind::Block { stmts, result } => {
                let scope = self
                    .scopes
                    .create_child(self.current_scope, ScopeKind::Block);
                self.in_scope(scope, |this| this.resolve_block(stmts, *result, span))
            }
        }
    }

    /// Fold a statement list into the expression tree
    fn resolve_block(
        &mut self,
        stmts: &[ast::StmtId],
        result: Option<ast::ExprId>,
        span: FileSpan,
    ) -> Result<ExprId, Ice> {
        let ast_ref = self.ast;
        let Some((first, rest)) = stmts.split_first() else {
            return match result {
                Some(result) => self.resolve_expr(result),
                None => Ok(self.module.error_expr(span)),
            };
        };

        match ast_ref.stmts[*first].clone() {
            ast::Stmt::Let {
                name, ty, init, ..
            } => {
                let init = self.resolve_expr(init)?;
                let init = match ty {
                    Some(ascribed) => {
                        let ascribed_ty = self.resolve_type_term(ascribed)?;
                        self.coerce_or_report(init, ascribed_ty)?
                    }
                    None => init,
                };
                let init_ty = self.module.exprs[init].ty;
                let scope = self
                    .scopes
                    .create_child(self.current_scope, ScopeKind::Block);
                let var = self.bind_local(scope, name.name, init_ty, name.span)?;
                let body = self.in_scope(scope, |this| this.resolve_block(rest, result, span))?;
                let ty = self.module.exprs[body].ty;
                Ok(self.module.expr(
                    ExprKind::Let {
                        var,
                        value: init,
                        body,
                    },
                    ty,
                    span,
                ))
            }
            ast::Stmt::Return { value, span: stmt_span } => {
                // A return ends the fold; anything after it is unreachable
                // and is not resolved.
                match value {
                    Some(value) => self.resolve_expr(value),
                    None => Ok(self.module.error_expr(stmt_span)),
                }
            }
            ast::Stmt::Assign {
                target,
                value,
                span: stmt_span,
            } => {
                let target = self.resolve_expr(target)?;
                if !self.is_assignable(target) {
                    self.report(ResolveError::NotAssignable, stmt_span);
                }
                let target_ty = self.module.exprs[target].ty;
                let value = self.resolve_expr(value)?;
                let value = self.coerce_or_report(value, target_ty)?;
                let error_ty = self.module.types.error();
                let assign =
                    self.module
                        .expr(ExprKind::Assign { target, value }, error_ty, stmt_span);
                self.prepend_stmt(assign, rest, result, span)
            }
            ast::Stmt::Expr(expr) => {
                let expr = self.resolve_expr(expr)?;
                self.prepend_stmt(expr, rest, result, span)
            }
        }
    }

    /// Attach an effect statement in front of the rest of a block
    fn prepend_stmt(
        &mut self,
        stmt: ExprId,
        rest: &[ast::StmtId],
        result: Option<ast::ExprId>,
        span: FileSpan,
    ) -> Result<ExprId, Ice> {
        let tail = self.resolve_block(rest, result, span)?;
        // Merge into an existing block node instead of nesting one per
        // statement.
        if let ExprKind::Block { stmts, result } = self.module.exprs[tail].kind.clone() {
            let mut merged = vec![stmt];
            merged.extend(stmts);
            let ty = self.module.exprs[tail].ty;
            return Ok(self
                .module
                .expr(ExprKind::Block { stmts: merged, result }, ty, span));
        }
        let ty = self.module.exprs[tail].ty;
        Ok(self.module.expr(
            ExprKind::Block {
                stmts: vec![stmt],
                result: Some(tail),
            },
            ty,
            span,
        ))
    }

    /// Declare and bind a local value
    fn bind_local(
        &mut self,
        scope: wf_sema::ScopeId,
        name: wf_intern::Symbol,
        ty: TypeId,
        span: FileSpan,
    ) -> Result<DeclId, Ice> {
        let decl = self.reserve(MemberFlavor::Field);
        let key = self.module.fresh_line_key();
        DeclBuilder::new(name, span, key)
            .kind(DeclKind::Field(FieldDecl { ty, init: None }))
            .seal(&mut self.module, decl)?;
        if !self.scopes.define_value(scope, name, decl) {
            self.report(
                ResolveError::DuplicateDefinition {
                    name: self.name_text(name),
                },
                span,
            );
        }
        Ok(decl)
    }

    /// Unify two branch types by coercing one branch into the other
    fn unify_branches(
        &mut self,
        left: ExprId,
        right: ExprId,
        span: FileSpan,
    ) -> Result<(ExprId, ExprId, TypeId), Ice> {
        let left_ty = self.module.exprs[left].ty;
        let right_ty = self.module.exprs[right].ty;
        if self.module.types.is_error(left_ty) || self.module.types.is_error(right_ty) {
            let error = self.module.types.error();
            return Ok((left, right, error));
        }
        if let Ok(coerced) = self.coerce(right, left_ty)? {
            return Ok((left, coerced, left_ty));
        }
        if let Ok(coerced) = self.coerce(left, right_ty)? {
            return Ok((coerced, right, right_ty));
        }
        self.report(
            ResolveError::NoConversion {
                from: self.render_ty(right_ty),
                to: self.render_ty(left_ty),
            },
            span,
        );
        let error = self.module.types.error();
        Ok((left, right, error))
    }

    /// Whether an expression is a place an assignment may target
    fn is_assignable(&self, expr: ExprId) -> bool {
        matches!(
            self.module.exprs[expr].kind,
            ExprKind::VarRef(_)
                | ExprKind::AttrRef(_)
                | ExprKind::AttrFetch { .. }
                | ExprKind::FieldRef { .. }
                | ExprKind::Error
        )
    }
}
