//! Term resolution
//!
//! Resolving an AST term yields a semantic [`Term`] that may still be layered
//! or overloaded; the demand functions (`term_as_type`, `term_as_expr`,
//! `term_as_frequency`) collapse it once a consumer requires a specific
//! shape. Layered lookups are only continued outward when the inner layer
//! fails the demand.

use crate::candidate::ApplyMode;
use crate::error::{rank_suggestions, ResolveError};
use crate::resolver::Resolver;
use crate::scope::Binding;
use wf_ast as ast;
use wf_intern::Symbol;
use wf_sema::{
    DeclId, DeclKind, ExprId, ExprKind, FreqRef, GenericParamKind, Ice, LayerRest, MemberFlavor,
    MemberRef, ScopeId, Term, Type, TypeId,
};
use wf_span::FileSpan;

impl Resolver<'_> {
    // ---- entry points ----------------------------------------------------

    /// Resolve a term demanded as a type
    pub(crate) fn resolve_type_term(&mut self, term_id: ast::TermId) -> Result<TypeId, Ice> {
        let span = self.ast.terms[term_id].span;
        let term = self.resolve_term(term_id)?;
        self.term_as_type(term, span)
    }

    /// Resolve one AST term
    pub(crate) fn resolve_term(&mut self, term_id: ast::TermId) -> Result<Term, Ice> {
        let ast_ref = self.ast;
        let term = &ast_ref.terms[term_id];
        let span = term.span;
        match &term.kind {
            ast::TermKind::Name(ident) => self.lookup_name(*ident),
            ast::TermKind::IntLit(value) => {
                let ty = self.module.types.int();
                let expr = self.module.expr(ExprKind::IntLit(*value), ty, span);
                Ok(Term::Expr(expr))
            }
            ast::TermKind::FloatLit(value) => {
                let ty = self.module.types.float();
                let expr = self.module.expr(ExprKind::FloatLit(*value), ty, span);
                Ok(Term::Expr(expr))
            }
            ast::TermKind::BoolLit(value) => {
                let ty = self.module.types.bool();
                let expr = self.module.expr(ExprKind::BoolLit(*value), ty, span);
                Ok(Term::Expr(expr))
            }
            ast::TermKind::Base => match self.base_attr {
                Some((decl, ty)) => {
                    let expr = self.module.expr(ExprKind::AttrRef(decl), ty, span);
                    Ok(Term::Expr(expr))
                }
                None => {
                    self.report(ResolveError::BaseOutsideOverride, span);
                    Ok(Term::Error)
                }
            },
            ast::TermKind::FreqQual { freq, data } => {
                let freq_span = ast_ref.terms[*freq].span;
                let freq_term = self.resolve_term(*freq)?;
                let data_ty = self.resolve_type_term(*data)?;
                match self.term_as_frequency(&freq_term, freq_span)? {
                    Some(freq_ref) => {
                        let ty = self.module.types.freq_qual(freq_ref, data_ty);
                        Ok(Term::Type(ty))
                    }
                    None => Ok(Term::Type(self.module.types.error())),
                }
            }
            ast::TermKind::Member { base, name } => self.resolve_member_term(*base, *name),
            ast::TermKind::Apply { callee, args } => {
                let callee_term = self.resolve_term(*callee)?;
                let call_args = self.resolve_args(args)?;
                self.resolve_application(callee_term, &call_args, span, ApplyMode::Call)
            }
            ast::TermKind::GenericApply { callee, args } => {
                let callee_term = self.resolve_term(*callee)?;
                let call_args =
                    self.without_conversions(|this| this.resolve_generic_args(args))?;
                self.resolve_application(callee_term, &call_args, span, ApplyMode::Generic)
            }
        }
    }

    // ---- name lookup -----------------------------------------------------

    /// Look a name up from the current scope, reporting if undefined
    pub(crate) fn lookup_name(&mut self, ident: ast::Ident) -> Result<Term, Ice> {
        match self.lookup_from(self.current_scope, ident.name, ident.span)? {
            Some(term) => Ok(term),
            None => {
                let target = self.name_text(ident.name);
                let visible: Vec<String> = self
                    .scopes
                    .visible_names(self.current_scope)
                    .into_iter()
                    .map(|name| self.name_text(name))
                    .collect();
                let suggestions = rank_suggestions(&target, &visible);
                self.report(
                    ResolveError::UndefinedName {
                        name: target,
                        suggestions,
                    },
                    ident.span,
                );
                Ok(Term::Error)
            }
        }
    }

    /// Walk scopes outward until one contributes a layer for `name`
    pub(crate) fn lookup_from(
        &mut self,
        mut scope: ScopeId,
        name: Symbol,
        span: FileSpan,
    ) -> Result<Option<Term>, Ice> {
        loop {
            if let Some(term) = self.layer_term_at(scope, name, span)? {
                let wrapped = match self.scopes.parent(scope) {
                    Some(parent) if self.outer_defines(parent, name) => Term::Layered {
                        first: Box::new(term),
                        rest: LayerRest { scope: parent, name },
                    },
                    _ => term,
                };
                return Ok(Some(wrapped));
            }
            match self.scopes.parent(scope) {
                Some(parent) => scope = parent,
                None => return Ok(None),
            }
        }
    }

    /// Continue a deferred layered lookup
    pub(crate) fn force_layer_rest(&mut self, rest: LayerRest) -> Result<Option<Term>, Ice> {
        self.lookup_from(rest.scope, rest.name, FileSpan::synthesized())
    }

    /// Everything one scope contributes for a name, overloads preserved
    fn layer_term_at(
        &mut self,
        scope: ScopeId,
        name: Symbol,
        span: FileSpan,
    ) -> Result<Option<Term>, Ice> {
        let mut alts = Vec::new();

        if let Some(bindings) = self.scopes.bindings_in(scope, name) {
            let bindings: Vec<Binding> = bindings.to_vec();
            for binding in bindings {
                alts.push(self.binding_term(binding, span)?);
            }
        }

        if let Some(pipeline) = self.scopes.get(scope).pipeline {
            if let Some(term) = self.member_group_term(pipeline, name, None)? {
                alts.push(term);
            }
        }

        Ok(match alts.len() {
            0 => None,
            _ => Some(Term::overloaded(alts)),
        })
    }

    /// Whether any scope from `scope` outward can contribute `name`
    fn outer_defines(&self, mut scope: ScopeId, name: Symbol) -> bool {
        loop {
            if self.scopes.bindings_in(scope, name).is_some() {
                return true;
            }
            if let Some(pipeline) = self.scopes.get(scope).pipeline {
                if !self.member_name_groups(pipeline, name).is_empty()
                    || self.pending_member_lookup(pipeline, name).is_some()
                {
                    return true;
                }
            }
            match self.scopes.parent(scope) {
                Some(parent) => scope = parent,
                None => return false,
            }
        }
    }

    /// Turn one scope binding into a term
    fn binding_term(&mut self, binding: Binding, span: FileSpan) -> Result<Term, Ice> {
        match binding {
            Binding::Decl(decl) => match self.flavor(decl) {
                MemberFlavor::Struct => Ok(Term::Type(self.module.types.alloc(Type::Struct(decl)))),
                MemberFlavor::Pipeline => {
                    Ok(Term::Type(self.module.types.alloc(Type::Pipeline(decl))))
                }
                MemberFlavor::Concept => {
                    Ok(Term::Type(self.module.types.alloc(Type::Concept(decl))))
                }
                MemberFlavor::TypeSlot => Ok(Term::Type(self.slot_type(decl))),
                MemberFlavor::GenericParam => match self.try_decl_view(decl).map(|view| &view.kind)
                {
                    Some(DeclKind::GenericParam(param)) => match &param.kind {
                        GenericParamKind::Type { .. } => {
                            Ok(Term::Type(self.module.types.alloc(Type::GenericParam(decl))))
                        }
                        GenericParamKind::Value { ty } => {
                            let ty = *ty;
                            let expr = self.module.expr(ExprKind::VarRef(decl), ty, span);
                            Ok(Term::Expr(expr))
                        }
                    },
                    // Forward reference to a sibling generic parameter whose
                    // kind is still being resolved: treat it as a type
                    // parameter, the common case.
                    None => Ok(Term::Type(self.module.types.alloc(Type::GenericParam(decl)))),
                    Some(_) => Ok(Term::Error),
                },
                MemberFlavor::Method => Ok(Term::Member(MemberRef {
                    object: None,
                    line: None,
                    decl,
                })),
                MemberFlavor::Field => {
                    let ty = self.value_type(decl);
                    let expr = self.module.expr(ExprKind::VarRef(decl), ty, span);
                    Ok(Term::Expr(expr))
                }
                MemberFlavor::Attribute | MemberFlavor::Element => Ok(Term::Member(MemberRef {
                    object: None,
                    line: None,
                    decl,
                })),
            },
            Binding::Value(decl) => {
                let ty = self.value_type(decl);
                let expr = self.module.expr(ExprKind::VarRef(decl), ty, span);
                Ok(Term::Expr(expr))
            }
        }
    }

    /// The type a type slot denotes: its bound if it has one (alias
    /// semantics), itself nominally while abstract or still forward-declared
    pub(crate) fn slot_type(&mut self, decl: DeclId) -> TypeId {
        match self.try_decl_view(decl).map(|view| &view.kind) {
            Some(DeclKind::TypeSlot(slot)) => match slot.bound {
                Some(bound) => bound,
                None => self.module.types.alloc(Type::TypeSlot(decl)),
            },
            Some(_) => self.module.types.error(),
            None => self.module.types.alloc(Type::TypeSlot(decl)),
        }
    }

    /// Declared type of a value-like declaration
    pub(crate) fn value_type(&self, decl: DeclId) -> TypeId {
        match &self.decl_view(decl).kind {
            DeclKind::Field(field) => field.ty,
            DeclKind::Attribute(attr) => attr.ty,
            DeclKind::GenericParam(param) => match &param.kind {
                GenericParamKind::Value { ty } => *ty,
                GenericParamKind::Type { .. } => self.module.types.error(),
            },
            _ => self.module.types.error(),
        }
    }

    // ---- member access ---------------------------------------------------

    /// Resolve `base.name`
    fn resolve_member_term(
        &mut self,
        base: ast::TermId,
        name: ast::Ident,
    ) -> Result<Term, Ice> {
        let base_term = self.resolve_term(base)?;
        match base_term {
            Term::Error => Ok(Term::Error),
            Term::Type(ty) => match *self.module.types.get(ty) {
                Type::Error => Ok(Term::Error),
                Type::Pipeline(pipeline) => {
                    self.ensure_pipeline_by_id(pipeline)?;
                    match self.member_group_term(pipeline, name.name, None)? {
                        Some(term) => Ok(term),
                        None => {
                            self.report_undefined_member(name);
                            Ok(Term::Error)
                        }
                    }
                }
                _ => {
                    self.report_undefined_member(name);
                    Ok(Term::Error)
                }
            },
            Term::Expr(object) => {
                let object_ty = self.module.exprs[object].ty;
                self.member_of_value(object, object_ty, name)
            }
            other => {
                // Collapse the ambiguous callee to an expression if possible,
                // then retry member access on the value.
                let span = name.span;
                let object = self.term_as_expr(other, span)?;
                let object_ty = self.module.exprs[object].ty;
                self.member_of_value(object, object_ty, name)
            }
        }
    }

    /// Member access on a value
    fn member_of_value(
        &mut self,
        object: ExprId,
        object_ty: TypeId,
        name: ast::Ident,
    ) -> Result<Term, Ice> {
        match *self.module.types.get(object_ty) {
            Type::Error => Ok(Term::Error),
            Type::Struct(decl) => {
                let fields = match &self.decl_view(decl).kind {
                    DeclKind::Struct(strukt) => strukt.fields.clone(),
                    _ => Vec::new(),
                };
                for field in fields {
                    if self.decl_view(field).name == name.name {
                        let ty = self.value_type(field);
                        let expr = self.module.expr(
                            ExprKind::FieldRef {
                                base: object,
                                field,
                            },
                            ty,
                            name.span,
                        );
                        return Ok(Term::Expr(expr));
                    }
                }
                self.report_undefined_member(name);
                Ok(Term::Error)
            }
            Type::Pipeline(pipeline) => {
                self.ensure_pipeline_by_id(pipeline)?;
                match self.member_group_term(pipeline, name.name, Some(object))? {
                    Some(term) => Ok(term),
                    None => {
                        self.report_undefined_member(name);
                        Ok(Term::Error)
                    }
                }
            }
            Type::FreqQual { freq, data } => match *self.module.types.get(data) {
                Type::Element(_) => {
                    let Some(pipeline) = self.current_pipeline else {
                        self.report_undefined_member(name);
                        return Ok(Term::Error);
                    };
                    match self.attribute_fetch_group(pipeline, freq, name.name, object)? {
                        Some(term) => Ok(term),
                        None => {
                            self.report_undefined_member(name);
                            Ok(Term::Error)
                        }
                    }
                }
                Type::Pipeline(pipeline) => {
                    self.ensure_pipeline_by_id(pipeline)?;
                    match self.member_group_term(pipeline, name.name, Some(object))? {
                        Some(term) => Ok(term),
                        None => {
                            self.report_undefined_member(name);
                            Ok(Term::Error)
                        }
                    }
                }
                _ => {
                    self.report_undefined_member(name);
                    Ok(Term::Error)
                }
            },
            _ => {
                self.report_undefined_member(name);
                Ok(Term::Error)
            }
        }
    }

    fn report_undefined_member(&mut self, name: ast::Ident) {
        let rendered = self.name_text(name.name);
        self.report(
            ResolveError::UndefinedName {
                name: rendered,
                suggestions: Vec::new(),
            },
            name.span,
        );
    }

    /// The attribute lines of a pipeline computed at one frequency
    fn attribute_fetch_group(
        &mut self,
        pipeline: DeclId,
        freq: FreqRef,
        name: Symbol,
        object: ExprId,
    ) -> Result<Option<Term>, Ice> {
        let groups = self.member_name_groups(pipeline, name);
        let mut members = Vec::new();
        for (flavor, lines) in groups {
            if flavor != MemberFlavor::Attribute {
                continue;
            }
            for line in lines {
                let decl = self.line_reference_decl(line)?;
                let attr_ty = self.value_type(decl);
                if self.module.types.frequency(attr_ty) == Some(freq) {
                    members.push(MemberRef {
                        object: Some(object),
                        line: Some(line),
                        decl,
                    });
                }
            }
        }
        Ok(if members.is_empty() {
            None
        } else {
            Some(Term::CategoryGroup {
                flavor: MemberFlavor::Attribute,
                members,
            })
        })
    }

    // ---- demands ---------------------------------------------------------

    /// Demand a type out of a term, reporting on failure
    pub(crate) fn term_as_type(
        &mut self,
        term: Term,
        span: FileSpan,
    ) -> Result<TypeId, Ice> {
        let rendered = self.render_term(&term);
        match self.term_as_type_opt(term)? {
            Some(ty) => Ok(ty),
            None => {
                self.report(ResolveError::NotAType { name: rendered }, span);
                Ok(self.module.types.error())
            }
        }
    }

    /// Demand a type without reporting
    fn term_as_type_opt(&mut self, term: Term) -> Result<Option<TypeId>, Ice> {
        match term {
            Term::Error => Ok(Some(self.module.types.error())),
            Term::Type(ty) => Ok(Some(ty)),
            Term::Member(member) => Ok(self.member_type(member)),
            Term::CategoryGroup { members, .. } => match members.as_slice() {
                [single] => Ok(self.member_type(*single)),
                _ => Ok(None),
            },
            Term::Layered { first, rest } => {
                if let Some(ty) = self.term_as_type_opt(*first)? {
                    return Ok(Some(ty));
                }
                match self.force_layer_rest(rest)? {
                    Some(outer) => self.term_as_type_opt(outer),
                    None => Ok(None),
                }
            }
            Term::Overloaded { alts } => {
                let mut found = Vec::new();
                for alt in alts {
                    if let Some(ty) = self.term_as_type_opt(alt)? {
                        found.push(ty);
                    }
                }
                match found.as_slice() {
                    [single] => Ok(Some(*single)),
                    _ => Ok(None),
                }
            }
            Term::Expr(_) => Ok(None),
        }
    }

    /// The type a member reference denotes, if its flavor names a type
    fn member_type(&mut self, member: MemberRef) -> Option<TypeId> {
        match self.flavor(member.decl) {
            MemberFlavor::Struct => Some(self.module.types.alloc(Type::Struct(member.decl))),
            MemberFlavor::Pipeline => Some(self.module.types.alloc(Type::Pipeline(member.decl))),
            MemberFlavor::Element => Some(self.module.types.alloc(Type::Element(member.decl))),
            MemberFlavor::Concept => Some(self.module.types.alloc(Type::Concept(member.decl))),
            MemberFlavor::TypeSlot => Some(self.slot_type(member.decl)),
            MemberFlavor::GenericParam => {
                Some(self.module.types.alloc(Type::GenericParam(member.decl)))
            }
            MemberFlavor::Attribute | MemberFlavor::Field | MemberFlavor::Method => None,
        }
    }

    /// Demand an expression out of a term, reporting on failure
    pub(crate) fn term_as_expr(
        &mut self,
        term: Term,
        span: FileSpan,
    ) -> Result<ExprId, Ice> {
        let rendered = self.render_term(&term);
        match self.term_as_expr_opt(term, span)? {
            Some(expr) => Ok(expr),
            None => {
                self.report(ResolveError::NotAValue { name: rendered }, span);
                Ok(self.module.error_expr(span))
            }
        }
    }

    /// Demand an expression without reporting
    fn term_as_expr_opt(
        &mut self,
        term: Term,
        span: FileSpan,
    ) -> Result<Option<ExprId>, Ice> {
        match term {
            Term::Error => Ok(Some(self.module.error_expr(span))),
            Term::Expr(expr) => Ok(Some(expr)),
            Term::Member(member) => self.member_expr(member, span),
            Term::CategoryGroup { flavor, members } => {
                if members.iter().any(|member| member.object.is_some()) {
                    // Attribute fetch out of a qualified value goes through
                    // the candidate framework, zero-argument application.
                    let term = Term::CategoryGroup { flavor, members };
                    let resolved = self.resolve_application(term, &[], span, ApplyMode::Call)?;
                    return self.term_as_expr_opt(resolved, span);
                }
                match members.as_slice() {
                    [single] => self.member_expr(*single, span),
                    _ => Ok(None),
                }
            }
            Term::Layered { first, rest } => {
                if let Some(expr) = self.term_as_expr_opt(*first, span)? {
                    return Ok(Some(expr));
                }
                match self.force_layer_rest(rest)? {
                    Some(outer) => self.term_as_expr_opt(outer, span),
                    None => Ok(None),
                }
            }
            Term::Overloaded { alts } => {
                for alt in alts {
                    if let Some(expr) = self.term_as_expr_opt(alt, span)? {
                        return Ok(Some(expr));
                    }
                }
                Ok(None)
            }
            Term::Type(_) => Ok(None),
        }
    }

    /// Realize a member reference as an expression, if its flavor allows
    fn member_expr(
        &mut self,
        member: MemberRef,
        span: FileSpan,
    ) -> Result<Option<ExprId>, Ice> {
        match self.flavor(member.decl) {
            MemberFlavor::Attribute => {
                let ty = self.value_type(member.decl);
                let expr = match member.object {
                    Some(base) => self.module.expr(
                        ExprKind::AttrFetch {
                            base,
                            attr: member.decl,
                        },
                        ty,
                        span,
                    ),
                    None => self.module.expr(ExprKind::AttrRef(member.decl), ty, span),
                };
                Ok(Some(expr))
            }
            MemberFlavor::Field => {
                let ty = self.value_type(member.decl);
                let expr = match member.object {
                    Some(base) => self.module.expr(
                        ExprKind::FieldRef {
                            base,
                            field: member.decl,
                        },
                        ty,
                        span,
                    ),
                    None => self.module.expr(ExprKind::VarRef(member.decl), ty, span),
                };
                Ok(Some(expr))
            }
            _ => Ok(None),
        }
    }

    /// Demand a frequency (element reference) out of a term
    pub(crate) fn term_as_frequency(
        &mut self,
        term: &Term,
        span: FileSpan,
    ) -> Result<Option<FreqRef>, Ice> {
        match term {
            Term::Error => Ok(None),
            Term::Member(member) if self.flavor(member.decl) == MemberFlavor::Element => {
                Ok(Some(FreqRef {
                    line: self.decl_view(member.decl).line_key,
                    decl: member.decl,
                }))
            }
            Term::CategoryGroup { members, .. } => match members.as_slice() {
                [single] if self.flavor(single.decl) == MemberFlavor::Element => Ok(Some(FreqRef {
                    line: self.decl_view(single.decl).line_key,
                    decl: single.decl,
                })),
                _ => {
                    self.report_not_a_frequency(term, span);
                    Ok(None)
                }
            },
            Term::Layered { first, rest } => {
                if let Some(freq) = self.term_as_frequency(first, span)? {
                    return Ok(Some(freq));
                }
                let rest = *rest;
                match self.force_layer_rest(rest)? {
                    Some(outer) => self.term_as_frequency(&outer, span),
                    None => {
                        self.report_not_a_frequency(&Term::Error, span);
                        Ok(None)
                    }
                }
            }
            other => {
                self.report_not_a_frequency(other, span);
                Ok(None)
            }
        }
    }

    fn report_not_a_frequency(&mut self, term: &Term, span: FileSpan) {
        let rendered = self.render_term(term);
        self.report(ResolveError::NotAFrequency { name: rendered }, span);
    }
}
