//! Generic-argument deduction
//!
//! Applying a generic method without explicit arguments creates one
//! placeholder per parameter. Type placeholders accumulate lower and upper
//! subtype bounds while the candidate's argument coercions run; after the
//! winning candidate is selected, a post-check collapses each placeholder to
//! a single concrete bound or fails the deduction. Implicit
//! concept-constrained value parameters are satisfied by searching the scope
//! for declarations structurally matching every required concept member.

use crate::error::ResolveError;
use crate::resolver::Resolver;
use crate::scope::Binding;
use wf_sema::{
    DeclId, DeclKind, ExprId, ExprKind, GenericParamKind, Ice, MemberFlavor, PlaceholderId,
    Substitution, Term, Type, TypeId,
};
use wf_span::FileSpan;

/// Accumulated constraints for one undeduced generic argument
#[derive(Clone, Debug)]
pub(crate) struct PlaceholderState {
    /// The generic parameter being deduced
    pub param: DeclId,
    /// Kind-specific constraints
    pub kind: PlaceholderKind,
}

/// Constraints per placeholder kind
#[derive(Clone, Debug)]
pub(crate) enum PlaceholderKind {
    /// Type parameter: subtype bounds from argument coercions
    Type {
        /// Types that must be subtypes of the deduced argument
        lowers: Vec<TypeId>,
        /// Types the deduced argument must be a subtype of
        uppers: Vec<TypeId>,
    },
    /// Value parameter: equality constraints
    Value {
        /// Expressions the deduced argument must equal
        equals: Vec<ExprId>,
    },
}

impl Resolver<'_> {
    /// Create fresh placeholders for a generic parameter list and the
    /// substitution mapping each parameter to its placeholder
    pub(crate) fn fresh_placeholders(
        &mut self,
        generics: &[DeclId],
    ) -> (Substitution, Vec<PlaceholderId>) {
        let mut subst = Substitution::new();
        let mut ids = Vec::with_capacity(generics.len());
        for &param in generics {
            let id = PlaceholderId(self.placeholders.len() as u32);
            let kind = match &self.decl_view(param).kind {
                DeclKind::GenericParam(decl) => match decl.kind {
                    GenericParamKind::Type { .. } => PlaceholderKind::Type {
                        lowers: Vec::new(),
                        uppers: Vec::new(),
                    },
                    GenericParamKind::Value { .. } => PlaceholderKind::Value {
                        equals: Vec::new(),
                    },
                },
                _ => PlaceholderKind::Type {
                    lowers: Vec::new(),
                    uppers: Vec::new(),
                },
            };
            self.placeholders.push(PlaceholderState { param, kind });
            let placeholder_ty = self.module.types.alloc(Type::Placeholder(id));
            subst.insert(param, Term::Type(placeholder_ty));
            ids.push(id);
        }
        (subst, ids)
    }

    /// Record that `bound <: placeholder`
    pub(crate) fn record_lower_bound(&mut self, id: PlaceholderId, bound: TypeId) {
        if let Some(state) = self.placeholders.get_mut(id.0 as usize) {
            if let PlaceholderKind::Type { lowers, .. } = &mut state.kind {
                lowers.push(bound);
            }
        }
    }

    /// Record that `placeholder <: bound`
    pub(crate) fn record_upper_bound(&mut self, id: PlaceholderId, bound: TypeId) {
        if let Some(state) = self.placeholders.get_mut(id.0 as usize) {
            if let PlaceholderKind::Type { uppers, .. } = &mut state.kind {
                uppers.push(bound);
            }
        }
    }

    /// Record a value equality constraint
    pub(crate) fn record_value_constraint(&mut self, id: PlaceholderId, value: ExprId) {
        if let Some(state) = self.placeholders.get_mut(id.0 as usize) {
            if let PlaceholderKind::Value { equals } = &mut state.kind {
                equals.push(value);
            }
        }
    }

    /// Post-selection deduction: collapse every placeholder to one argument
    ///
    /// Returns the substitution from generic parameters to deduced arguments,
    /// or the parameter that could not be deduced.
    pub(crate) fn resolve_placeholders(
        &mut self,
        ids: &[PlaceholderId],
        span: FileSpan,
    ) -> Result<Result<Substitution, DeclId>, Ice> {
        let mut subst = Substitution::new();
        for &id in ids {
            let state = self.placeholders[id.0 as usize].clone();
            match state.kind {
                PlaceholderKind::Type { lowers, uppers } => {
                    match self.collapse_type_bounds(&lowers, &uppers) {
                        Some(ty) => subst.insert(state.param, Term::Type(ty)),
                        None => return Ok(Err(state.param)),
                    }
                }
                PlaceholderKind::Value { equals } => match equals.as_slice() {
                    [single] => subst.insert(state.param, Term::Expr(*single)),
                    _ => {
                        // An implicit concept-constrained parameter searches
                        // the scope instead of relying on equalities.
                        match self.implicit_value_for(state.param, span)? {
                            Some(expr) => subst.insert(state.param, Term::Expr(expr)),
                            None => return Ok(Err(state.param)),
                        }
                    }
                },
            }
        }
        Ok(Ok(subst))
    }

    /// Collapse bound sets to one concrete type
    ///
    /// A chain of only-lower or only-upper bounds collapses to its extremum;
    /// mixed bounds must agree; incomparable bounds fail.
    fn collapse_type_bounds(&mut self, lowers: &[TypeId], uppers: &[TypeId]) -> Option<TypeId> {
        let candidate = if !lowers.is_empty() {
            // The least upper bound of the lower bounds: every lower bound
            // must flow into the deduced argument.
            let mut best = lowers[0];
            for &bound in &lowers[1..] {
                if self.is_subtype(best, bound) {
                    best = bound;
                } else if !self.is_subtype(bound, best) {
                    return None;
                }
            }
            best
        } else if !uppers.is_empty() {
            // Dually, the greatest lower bound of the upper bounds.
            let mut best = uppers[0];
            for &bound in &uppers[1..] {
                if self.is_subtype(bound, best) {
                    best = bound;
                } else if !self.is_subtype(best, bound) {
                    return None;
                }
            }
            best
        } else {
            return None;
        };

        for &upper in uppers {
            if !self.is_subtype(candidate, upper) {
                return None;
            }
        }
        Some(candidate)
    }

    /// Search the scope for an implicit value satisfying a parameter
    ///
    /// For a concept-typed parameter, every required concept member must be
    /// matched by an in-scope declaration with a structurally compatible
    /// signature (contravariant parameters, covariant result). For other
    /// implicit parameters, an in-scope `implicit` value of the right type
    /// is taken.
    pub(crate) fn implicit_value_for(
        &mut self,
        param: DeclId,
        span: FileSpan,
    ) -> Result<Option<ExprId>, Ice> {
        let param_ty = match &self.decl_view(param).kind {
            DeclKind::GenericParam(decl) => match &decl.kind {
                GenericParamKind::Value { ty } => *ty,
                GenericParamKind::Type { .. } => return Ok(None),
            },
            _ => return Ok(None),
        };

        match *self.module.types.get(param_ty) {
            Type::Concept(concept) => self.search_concept_witness(concept, span),
            _ => Ok(self.implicit_scope_value(param_ty, span)),
        }
    }

    /// An in-scope `implicit`-tagged value of a matching frequency and type
    pub(crate) fn implicit_scope_value(&mut self, ty: TypeId, span: FileSpan) -> Option<ExprId> {
        let mut scope = Some(self.current_scope);
        while let Some(current) = scope {
            let (found, parent) = {
                let data = self.scopes.get(current);
                let mut found: Option<DeclId> = None;
                for bindings in data.defs.values() {
                    for binding in bindings {
                        let decl = match binding {
                            Binding::Decl(decl) | Binding::Value(decl) => *decl,
                        };
                        if !matches!(
                            self.flavor(decl),
                            MemberFlavor::Field | MemberFlavor::Attribute
                        ) {
                            continue;
                        }
                        if !self.decl_view(decl).tags.implicit {
                            continue;
                        }
                        if self.types_equal(self.value_type(decl), ty) {
                            found = Some(decl);
                        }
                    }
                }
                if found.is_none() {
                    if let Some(pipeline) = data.pipeline {
                        found = self.implicit_member_value(pipeline, ty);
                    }
                }
                (found, data.parent)
            };
            if let Some(decl) = found {
                let value_ty = self.value_type(decl);
                let kind = match self.flavor(decl) {
                    MemberFlavor::Attribute => ExprKind::AttrRef(decl),
                    _ => ExprKind::VarRef(decl),
                };
                return Some(self.module.expr(kind, value_ty, span));
            }
            scope = parent;
        }
        None
    }

    /// An implicit member of a pipeline with a matching type
    fn implicit_member_value(&self, pipeline: DeclId, ty: TypeId) -> Option<DeclId> {
        for line in self.member_view(pipeline) {
            let line_data = &self.module.lines[line];
            if !line_data.tags.implicit {
                continue;
            }
            let decl = line_data
                .direct
                .or_else(|| line_data.inherited_sources.first().map(|s| s.decl))?;
            if self.types_equal(self.value_type(decl), ty) {
                return Some(decl);
            }
        }
        None
    }

    /// Find declarations satisfying every member of a concept
    pub(crate) fn search_concept_witness(
        &mut self,
        concept: DeclId,
        span: FileSpan,
    ) -> Result<Option<ExprId>, Ice> {
        let members = match &self.decl_view(concept).kind {
            DeclKind::Concept(decl) => decl.members.clone(),
            _ => return Ok(None),
        };

        let mut witness = Vec::with_capacity(members.len());
        for member in members {
            match self.satisfy_concept_member(member)? {
                Some(found) => witness.push((member, found)),
                None => {
                    let concept_name = self.name_text(self.decl_view(concept).name);
                    let member_name = self.name_text(self.decl_view(member).name);
                    self.report(
                        ResolveError::UnsatisfiedConcept {
                            concept: concept_name,
                            member: member_name,
                        },
                        span,
                    );
                    return Ok(None);
                }
            }
        }

        let ty = self.module.types.alloc(Type::Concept(concept));
        Ok(Some(self.module.expr(
            ExprKind::ConceptWitness {
                concept,
                members: witness,
            },
            ty,
            span,
        )))
    }

    /// One in-scope declaration structurally matching a concept member
    fn satisfy_concept_member(&mut self, member: DeclId) -> Result<Option<DeclId>, Ice> {
        let member_decl = self.decl_view(member).clone();
        let (member_params, member_result) = match &member_decl.kind {
            DeclKind::Method(method) => (
                method.params.iter().map(|p| p.ty).collect::<Vec<_>>(),
                method.result,
            ),
            _ => return Ok(None),
        };

        let mut scope = Some(self.current_scope);
        while let Some(current) = scope {
            let data = self.scopes.get(current);
            let parent = data.parent;
            let candidates: Vec<DeclId> = data
                .defs
                .get(&member_decl.name)
                .into_iter()
                .flatten()
                .filter_map(|binding| match binding {
                    Binding::Decl(decl) => Some(*decl),
                    Binding::Value(_) => None,
                })
                .collect();
            for candidate in candidates {
                if self.flavor(candidate) != MemberFlavor::Method {
                    continue;
                }
                let (params, result) = match &self.decl_view(candidate).kind {
                    DeclKind::Method(method) => (
                        method.params.iter().map(|p| p.ty).collect::<Vec<_>>(),
                        method.result,
                    ),
                    _ => continue,
                };
                if params.len() != member_params.len() {
                    continue;
                }
                let params_ok = member_params
                    .iter()
                    .zip(params.iter())
                    .all(|(required, offered)| self.is_subtype(*required, *offered));
                if params_ok && self.is_subtype(result, member_result) {
                    return Ok(Some(candidate));
                }
            }
            scope = parent;
        }
        Ok(None)
    }
}
