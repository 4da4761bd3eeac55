//! Frequency algebra: subtyping, coercion, and the push-down rewrite
//!
//! Frequency qualification is exact: `@f T` is a subtype of `@g U` only when
//! `f` and `g` are the identical element line, whatever `T` and `U` are.
//! Coercing an unqualified expression into a qualified target first converts
//! the data type, then pushes the frequency down the expression tree; the
//! frequency is metadata about where a value is computed, so the rewrite
//! never introduces assignments or changes runtime structure.

use crate::error::ResolveError;
use crate::resolver::{ConversionCost, Resolver};
use wf_sema::{
    DeclId, DeclKind, ExprId, ExprKind, FreqRef, Ice, SwitchCase, Type, TypeId,
};

/// Why a coercion failed
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum CoerceFailure {
    /// No conversion path exists
    NoConversion,
    /// Several equally cheap conversion paths exist
    Ambiguous,
    /// The expression already names a different frequency
    Frequency {
        /// Frequency the target requires
        expected: FreqRef,
        /// Frequency the expression carries
        found: FreqRef,
    },
}

/// Result of a coercion attempt: the rewritten expression or why not
pub(crate) type CoerceOutcome = Result<ExprId, CoerceFailure>;

/// Search depth for unqualified conversion paths
pub(crate) const PLAIN_SEARCH_LIMIT: u32 = 1;
/// Search depth for frequency-qualified conversion paths
pub(crate) const FREQ_SEARCH_LIMIT: u32 = 100;

impl Resolver<'_> {
    // ---- subtyping -------------------------------------------------------

    /// Structural type equality; the error sentinel equals everything
    pub(crate) fn types_equal(&self, left: TypeId, right: TypeId) -> bool {
        match (self.module.types.get(left), self.module.types.get(right)) {
            (Type::Error, _) | (_, Type::Error) => true,
            (Type::Bool, Type::Bool) | (Type::Int, Type::Int) | (Type::Float, Type::Float) => true,
            (Type::Struct(a), Type::Struct(b)) | (Type::Element(a), Type::Element(b)) => {
                self.same_nominal(*a, *b)
            }
            (Type::Pipeline(a), Type::Pipeline(b)) => a == b,
            (Type::GenericParam(a), Type::GenericParam(b))
            | (Type::TypeSlot(a), Type::TypeSlot(b))
            | (Type::Concept(a), Type::Concept(b)) => a == b,
            (
                Type::FreqQual { freq: f, data: d },
                Type::FreqQual { freq: g, data: e },
            ) => f == g && self.types_equal(*d, *e),
            (Type::Placeholder(a), Type::Placeholder(b)) => a == b,
            _ => false,
        }
    }

    /// Nominal identity across inheritance: inherited copies share the line
    fn same_nominal(&self, left: DeclId, right: DeclId) -> bool {
        left == right || self.decl_view(left).line_key == self.decl_view(right).line_key
    }

    /// Subtype check
    ///
    /// Placeholders for undeduced generic arguments never fail here; they
    /// accumulate bounds instead, and the deduction post-check settles them.
    pub(crate) fn is_subtype(&mut self, sub: TypeId, sup: TypeId) -> bool {
        let sub_kind = self.module.types.get(sub).clone();
        let sup_kind = self.module.types.get(sup).clone();
        match (sub_kind, sup_kind) {
            (Type::Error, _) | (_, Type::Error) => true,
            (_, Type::Placeholder(id)) => {
                self.record_lower_bound(id, sub);
                true
            }
            (Type::Placeholder(id), _) => {
                self.record_upper_bound(id, sup);
                true
            }
            (Type::Bool, Type::Bool) | (Type::Int, Type::Int) | (Type::Float, Type::Float) => true,
            (Type::Struct(a), Type::Struct(b)) | (Type::Element(a), Type::Element(b)) => {
                self.same_nominal(a, b)
            }
            (Type::Pipeline(a), Type::Pipeline(b)) => self.pipeline_is_subtype(a, b),
            (Type::FreqQual { freq: f, data: d }, Type::FreqQual { freq: g, data: e }) => {
                f == g && self.is_subtype(d, e)
            }
            (Type::TypeSlot(slot), _) => match self.slot_bound(slot) {
                Some(bound) => self.is_subtype(bound, sup),
                None => matches!(*self.module.types.get(sup), Type::TypeSlot(other) if other == slot),
            },
            (_, Type::TypeSlot(slot)) => match self.slot_bound(slot) {
                Some(bound) => self.is_subtype(sub, bound),
                None => false,
            },
            (Type::GenericParam(a), Type::GenericParam(b)) => a == b,
            (Type::GenericParam(param), _) => match self.param_upper_bound(param) {
                Some(upper) => self.is_subtype(upper, sup),
                None => false,
            },
            (Type::Concept(a), Type::Concept(b)) => a == b,
            _ => false,
        }
    }

    /// Pipeline subtyping follows the primary-base chain only
    ///
    /// Mixin bases share members but do not create a subtype relationship.
    /// Works from the side table of resolved bases so it is usable while a
    /// pipeline is still being built.
    pub(crate) fn pipeline_is_subtype(&self, sub: DeclId, sup: DeclId) -> bool {
        let mut visited: Vec<DeclId> = Vec::new();
        let mut current = sub;
        loop {
            if current == sup {
                return true;
            }
            if visited.contains(&current) {
                // Cyclic primary chain; reported as cyclic inheritance.
                return false;
            }
            visited.push(current);
            let primary = self
                .pipeline_bases
                .get(&current)
                .and_then(|bases| {
                    bases
                        .iter()
                        .find(|base| base.kind == wf_sema::BaseKind::Primary)
                })
                .map(|base| base.pipeline);
            match primary {
                Some(next) => current = next,
                None => return false,
            }
        }
    }

    fn slot_bound(&self, slot: DeclId) -> Option<TypeId> {
        match &self.decl_view(slot).kind {
            DeclKind::TypeSlot(decl) => decl.bound,
            _ => None,
        }
    }

    fn param_upper_bound(&self, param: DeclId) -> Option<TypeId> {
        match &self.decl_view(param).kind {
            DeclKind::GenericParam(decl) => match &decl.kind {
                wf_sema::GenericParamKind::Type { upper } => *upper,
                wf_sema::GenericParamKind::Value { .. } => None,
            },
            _ => None,
        }
    }

    // ---- coercion --------------------------------------------------------

    /// Coerce an expression to a target type
    ///
    /// # Errors
    ///
    /// Returns an [`Ice`] for internal failures; user-level failures come
    /// back as the inner [`CoerceFailure`].
    pub(crate) fn coerce(&mut self, expr: ExprId, target: TypeId) -> Result<CoerceOutcome, Ice> {
        let source = self.module.exprs[expr].ty;
        if self.module.types.is_error(source) || self.module.types.is_error(target) {
            return Ok(Ok(expr));
        }
        if self.is_subtype(source, target) {
            return Ok(Ok(expr));
        }

        let target_kind = self.module.types.get(target).clone();
        let source_kind = self.module.types.get(source).clone();

        match (source_kind, target_kind) {
            // Into a frequency-qualified target.
            (
                Type::FreqQual { freq: have, data: have_data },
                Type::FreqQual { freq: want, data: want_data },
            ) => {
                if have != want {
                    return Ok(Err(CoerceFailure::Frequency {
                        expected: want,
                        found: have,
                    }));
                }
                // Same frequency, differing data: convert the underlying
                // value; frequency relabeling is free in path length.
                match self.convert_by_search(expr, have_data, want_data, FREQ_SEARCH_LIMIT)? {
                    Ok(converted) => {
                        let ty = self.module.types.freq_qual(want, want_data);
                        self.module.exprs[converted].ty = ty;
                        Ok(Ok(converted))
                    }
                    Err(failure) => Ok(Err(failure)),
                }
            }
            (_, Type::FreqQual { freq: want, data: want_data }) => {
                // Unqualified into qualified: data first, then push the
                // frequency down the expression tree.
                let data_expr = if self.is_subtype(source, want_data) {
                    expr
                } else {
                    match self.convert_by_search(expr, source, want_data, PLAIN_SEARCH_LIMIT)? {
                        Ok(converted) => converted,
                        Err(failure) => return Ok(Err(failure)),
                    }
                };
                let lifted = self.push_frequency(data_expr, want)?;
                Ok(Ok(lifted))
            }
            (Type::FreqQual { freq: have, data }, _) => {
                // Qualified into plain: only within the ambient frequency.
                if self.ambient_freq == Some(have) {
                    if self.is_subtype(data, target) {
                        return Ok(Ok(expr));
                    }
                    self.convert_by_search(expr, data, target, PLAIN_SEARCH_LIMIT)
                } else {
                    Ok(Err(CoerceFailure::NoConversion))
                }
            }
            _ => self.convert_by_search(expr, source, target, PLAIN_SEARCH_LIMIT),
        }
    }

    /// Coerce and report any failure, substituting the error sentinel
    pub(crate) fn coerce_or_report(
        &mut self,
        expr: ExprId,
        target: TypeId,
    ) -> Result<ExprId, Ice> {
        let span = self.module.exprs[expr].span;
        let source = self.module.exprs[expr].ty;
        match self.coerce(expr, target)? {
            Ok(coerced) => Ok(coerced),
            Err(failure) => {
                let error = self.coerce_failure_error(failure, source, target);
                self.report(error, span);
                Ok(self.module.error_expr(span))
            }
        }
    }

    /// Render a coercion failure as a resolution error
    pub(crate) fn coerce_failure_error(
        &self,
        failure: CoerceFailure,
        source: TypeId,
        target: TypeId,
    ) -> ResolveError {
        match failure {
            CoerceFailure::NoConversion => ResolveError::NoConversion {
                from: self.render_ty(source),
                to: self.render_ty(target),
            },
            CoerceFailure::Ambiguous => ResolveError::AmbiguousConversion {
                from: self.render_ty(source),
                to: self.render_ty(target),
            },
            CoerceFailure::Frequency { expected, found } => ResolveError::FrequencyMismatch {
                expected: self.name_text(self.decl_view(expected.decl).name),
                found: self.name_text(self.decl_view(found.decl).name),
            },
        }
    }

    /// Run the conversion search and apply the unique path, scoring it
    fn convert_by_search(
        &mut self,
        expr: ExprId,
        from: TypeId,
        to: TypeId,
        limit: u32,
    ) -> Result<CoerceOutcome, Ice> {
        if self.disable_conversions {
            return Ok(Err(CoerceFailure::NoConversion));
        }
        match self.find_conversion(from, to, limit)? {
            crate::convert::ConversionOutcome::Unique(path) => {
                let converted = self.apply_conversion(expr, &path)?;
                self.score = self.score.max(ConversionCost::Implicit);
                Ok(Ok(converted))
            }
            crate::convert::ConversionOutcome::Ambiguous => Ok(Err(CoerceFailure::Ambiguous)),
            crate::convert::ConversionOutcome::None => Ok(Err(CoerceFailure::NoConversion)),
        }
    }

    // ---- frequency push-down ---------------------------------------------

    /// Push a frequency down an unqualified expression tree
    ///
    /// Compound expressions push into their value-producing children and
    /// re-wrap the frequency on the result type; leaves are simply
    /// requalified.
    pub(crate) fn push_frequency(&mut self, expr: ExprId, freq: FreqRef) -> Result<ExprId, Ice> {
        let node = self.module.exprs[expr].clone();
        if self.module.types.is_error(node.ty) {
            return Ok(expr);
        }
        let kind = match node.kind {
            ExprKind::Error => return Ok(expr),
            // Leaves: requalify in place.
            leaf @ (ExprKind::IntLit(_)
            | ExprKind::FloatLit(_)
            | ExprKind::BoolLit(_)
            | ExprKind::VarRef(_)
            | ExprKind::AttrRef(_)
            | ExprKind::ConceptWitness { .. }) => leaf,
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => ExprKind::If {
                cond,
                then_branch: self.push_frequency(then_branch, freq)?,
                else_branch: self.push_frequency(else_branch, freq)?,
            },
            ExprKind::Switch {
                scrutinee,
                cases,
                default,
            } => {
                let mut pushed = Vec::with_capacity(cases.len());
                for case in cases {
                    pushed.push(SwitchCase {
                        value: case.value,
                        body: self.push_frequency(case.body, freq)?,
                    });
                }
                ExprKind::Switch {
                    scrutinee,
                    cases: pushed,
                    default: self.push_frequency(default, freq)?,
                }
            }
            ExprKind::Let { var, value, body } => ExprKind::Let {
                var,
                value: self.push_frequency(value, freq)?,
                body: self.push_frequency(body, freq)?,
            },
            ExprKind::For { var, iter, body } => ExprKind::For {
                var,
                iter: self.push_frequency(iter, freq)?,
                body: self.push_frequency(body, freq)?,
            },
            ExprKind::Assign { target, value } => ExprKind::Assign {
                target,
                value: self.push_frequency(value, freq)?,
            },
            ExprKind::Block { stmts, result } => ExprKind::Block {
                stmts,
                result: match result {
                    Some(result) => Some(self.push_frequency(result, freq)?),
                    None => None,
                },
            },
            ExprKind::CallMethod { method, args } => {
                let mut pushed = Vec::with_capacity(args.len());
                for arg in args {
                    pushed.push(self.push_frequency(arg, freq)?);
                }
                ExprKind::CallMethod {
                    method,
                    args: pushed,
                }
            }
            ExprKind::CallBuiltin { op, args } => {
                let mut pushed = Vec::with_capacity(args.len());
                for arg in args {
                    pushed.push(self.push_frequency(arg, freq)?);
                }
                ExprKind::CallBuiltin { op, args: pushed }
            }
            ExprKind::AttrFetch { base, attr } => ExprKind::AttrFetch {
                base: self.push_frequency(base, freq)?,
                attr,
            },
            ExprKind::FieldRef { base, field } => ExprKind::FieldRef {
                base: self.push_frequency(base, freq)?,
                field,
            },
            ExprKind::ElementCtor { element, args } => {
                let mut pushed = Vec::with_capacity(args.len());
                for (attr, value) in args {
                    pushed.push((attr, self.push_frequency(value, freq)?));
                }
                ExprKind::ElementCtor {
                    element,
                    args: pushed,
                }
            }
        };
        let ty = self.module.types.freq_qual(freq, node.ty);
        Ok(self.module.expr(kind, ty, node.span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Resolver;
    use wf_ast::SourceModule;
    use wf_intern::Interner;
    use wf_sema::{DeclBuilder, DeclKind, ElementDecl};
    use wf_span::FileSpan;

    fn element(resolver: &mut Resolver<'_>, name: &str) -> FreqRef {
        let symbol = resolver.interner.intern(name);
        let key = resolver.module.fresh_line_key();
        let id = resolver.module.reserve_decl();
        DeclBuilder::new(symbol, FileSpan::synthesized(), key)
            .kind(DeclKind::Element(ElementDecl {}))
            .seal(&mut resolver.module, id)
            .unwrap();
        FreqRef { line: key, decl: id }
    }

    #[test]
    fn test_subtyping_is_reflexive() {
        let ast = SourceModule::new();
        let interner = Interner::new();
        let mut resolver = Resolver::new(&ast, &interner);
        let mut all = vec![
            resolver.module.types.bool(),
            resolver.module.types.int(),
            resolver.module.types.float(),
        ];
        let freq = element(&mut resolver, "v");
        let float = resolver.module.types.float();
        all.push(resolver.module.types.freq_qual(freq, float));
        for ty in all {
            assert!(resolver.is_subtype(ty, ty), "{ty:?} must be its own subtype");
        }
    }

    #[test]
    fn test_frequency_exactness() {
        let ast = SourceModule::new();
        let interner = Interner::new();
        let mut resolver = Resolver::new(&ast, &interner);
        let u = element(&mut resolver, "u");
        let v = element(&mut resolver, "v");
        let float = resolver.module.types.float();
        let at_u = resolver.module.types.freq_qual(u, float);
        let at_v = resolver.module.types.freq_qual(v, float);

        assert!(resolver.is_subtype(at_u, at_u));
        // Identical data type, different frequency: never subtypes.
        assert!(!resolver.is_subtype(at_u, at_v));
        assert!(!resolver.is_subtype(at_v, at_u));
    }

    #[test]
    fn test_error_is_inert_under_subtyping() {
        let ast = SourceModule::new();
        let interner = Interner::new();
        let mut resolver = Resolver::new(&ast, &interner);
        let error = resolver.module.types.error();
        let int = resolver.module.types.int();
        assert!(resolver.is_subtype(error, int));
        assert!(resolver.is_subtype(int, error));
    }

    #[test]
    fn test_mutual_subtyping_means_same_declaration() {
        let ast = SourceModule::new();
        let interner = Interner::new();
        let mut resolver = Resolver::new(&ast, &interner);
        let u = element(&mut resolver, "u");
        let v = element(&mut resolver, "v");
        let u_ty = resolver.module.types.alloc(wf_sema::Type::Element(u.decl));
        let v_ty = resolver.module.types.alloc(wf_sema::Type::Element(v.decl));

        assert!(resolver.is_subtype(u_ty, u_ty) && resolver.is_subtype(u_ty, u_ty));
        let mutual = resolver.is_subtype(u_ty, v_ty) && resolver.is_subtype(v_ty, u_ty);
        assert!(!mutual, "distinct declarations must not be mutual subtypes");
    }
}
