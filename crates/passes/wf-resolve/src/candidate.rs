//! The candidate framework
//!
//! Resolving an application `term(args…)` expands the callee into concrete
//! candidates mirroring its Layered/Overloaded/CategoryGroup structure, then
//! filters in two strict stages: arity/keyword binding first, argument
//! coercion second, with the conversion score accumulating per candidate.
//! Inner layers shadow outer ones: deferred layer rests are only forced when
//! no candidate of the inner layers survives. Among survivors the minimal
//! conversion cost wins; a unique winner is emitted, several winners are an
//! ambiguity except while resolving an explicit generic instantiation, where
//! all of them come back as a fresh overloaded term for the caller.
//!
//! On total failure, one error names the callee and the rendered argument
//! shape, plus one info diagnostic per rejected candidate.

use crate::error::ResolveError;
use crate::resolver::{ConversionCost, Resolver};
use wf_ast as ast;
use wf_intern::Symbol;
use wf_sema::{
    DeclId, DeclKind, ExprId, ExprKind, Ice, LayerRest, MemberFlavor, MemberRef, MethodDecl,
    Substitution, Term, Type, TypeId,
};
use wf_span::FileSpan;

/// What kind of application is being resolved
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum ApplyMode {
    /// Ordinary call
    Call,
    /// Explicit generic instantiation; ties return an overloaded term
    Generic,
}

/// An argument value: expression for calls, term for generic instantiation
#[derive(Clone, Debug)]
pub(crate) enum ArgValue {
    /// Expression argument
    Expr(ExprId),
    /// Term argument (type or value) for generic instantiation
    Term(Term),
}

/// One positional or keyword argument
#[derive(Clone, Debug)]
pub(crate) struct CallArg {
    /// Keyword, if named
    pub name: Option<Symbol>,
    /// The argument value
    pub value: ArgValue,
    /// Source location
    pub span: FileSpan,
}

/// One concrete alternative under consideration
#[derive(Clone, Debug)]
struct Candidate {
    /// Layer depth; inner layers shadow outer ones
    layer: u32,
    kind: CandidateKind,
}

#[derive(Clone, Debug)]
enum CandidateKind {
    /// A method (generic or not)
    Method { decl: DeclId },
    /// An attribute fetched out of a frequency-qualified value
    AttrFetch { member: MemberRef },
    /// An element constructor
    ElementCtor { element: DeclId },
}

/// What a successful candidate produces
#[derive(Clone, Debug)]
enum CandidateOutput {
    Expr(ExprId),
    Term(Term),
}

impl Resolver<'_> {
    /// Resolve positional/keyword AST arguments into call arguments
    pub(crate) fn resolve_args(&mut self, args: &[ast::Arg]) -> Result<Vec<CallArg>, Ice> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            let value = self.resolve_expr(arg.value)?;
            out.push(CallArg {
                name: arg.name.map(|ident| ident.name),
                value: ArgValue::Expr(value),
                span: arg.span,
            });
        }
        Ok(out)
    }

    /// Resolve generic-instantiation arguments as terms
    pub(crate) fn resolve_generic_args(&mut self, args: &[ast::Arg]) -> Result<Vec<CallArg>, Ice> {
        let ast_ref = self.ast;
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            // A generic argument that is syntactically a bare term resolves
            // as a term (it may be a type); anything else is an expression.
            let value = match &ast_ref.exprs[arg.value].kind {
                ast::ExprKind::Term(term) => ArgValue::Term(self.resolve_term(*term)?),
                _ => ArgValue::Expr(self.resolve_expr(arg.value)?),
            };
            out.push(CallArg {
                name: arg.name.map(|ident| ident.name),
                value,
                span: arg.span,
            });
        }
        Ok(out)
    }

    /// Resolve one application against a callee term
    pub(crate) fn resolve_application(
        &mut self,
        callee: Term,
        args: &[CallArg],
        span: FileSpan,
        mode: ApplyMode,
    ) -> Result<Term, Ice> {
        let callee_name = self.render_term(&callee);
        let mut saw_error = false;
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut rests: Vec<(u32, LayerRest)> = Vec::new();
        self.expand_term(&callee, 0, &mut candidates, &mut rests, &mut saw_error);

        // An application over an already-failed sub-term stays inert: the
        // original diagnostic was reported where the failure happened.
        let args_carry_error = args.iter().any(|arg| match &arg.value {
            ArgValue::Expr(expr) => self.module.types.is_error(self.module.exprs[*expr].ty),
            ArgValue::Term(term) => term.is_error(),
        });

        let mut results: Vec<(u32, ConversionCost, CandidateOutput)> = Vec::new();
        let mut rejections: Vec<(String, ResolveError)> = Vec::new();
        let mut checked = 0usize;

        loop {
            for candidate in std::mem::take(&mut candidates) {
                checked += 1;
                let layer = candidate.layer;
                let signature = self.candidate_signature(&candidate);
                let (outcome, cost) = self.with_fresh_score(|this| {
                    this.check_candidate(&candidate, args, span, mode, &callee_name)
                });
                match outcome? {
                    Ok(output) => results.push((layer, cost, output)),
                    Err(reason) => rejections.push((signature, reason)),
                }
            }
            if !results.is_empty() || rests.is_empty() {
                break;
            }
            // No survivor yet: force the next deferred layer.
            let (layer, rest) = rests.remove(0);
            if let Some(term) = self.force_layer_rest(rest)? {
                self.expand_term(&term, layer, &mut candidates, &mut rests, &mut saw_error);
            }
            if candidates.is_empty() && rests.is_empty() {
                break;
            }
        }

        if results.is_empty() {
            if (saw_error && checked == 0) || args_carry_error {
                return Ok(Term::Error);
            }
            if checked == 1 {
                if let Some((_, reason)) = rejections.pop() {
                    self.report(reason, span);
                    return Ok(Term::Error);
                }
            }
            self.report(
                ResolveError::NoOverload {
                    callee: callee_name,
                    args: self.render_args(args),
                },
                span,
            );
            for (signature, reason) in rejections {
                self.report(
                    ResolveError::CandidateRejected {
                        signature,
                        reason: reason.to_string(),
                    },
                    span,
                );
            }
            return Ok(Term::Error);
        }

        // Innermost layer with survivors wins, then minimal conversion cost.
        let best_layer = results.iter().map(|(layer, ..)| *layer).min().unwrap_or(0);
        results.retain(|(layer, ..)| *layer == best_layer);
        let best_cost = results
            .iter()
            .map(|(_, cost, _)| *cost)
            .min()
            .unwrap_or(ConversionCost::None);
        results.retain(|(_, cost, _)| *cost == best_cost);

        if results.len() == 1 {
            let (.., output) = results.remove(0);
            return Ok(match output {
                CandidateOutput::Expr(expr) => Term::Expr(expr),
                CandidateOutput::Term(term) => term,
            });
        }

        if mode == ApplyMode::Generic {
            // The caller disambiguates a generic instantiation further.
            let alts = results
                .into_iter()
                .map(|(.., output)| match output {
                    CandidateOutput::Expr(expr) => Term::Expr(expr),
                    CandidateOutput::Term(term) => term,
                })
                .collect();
            return Ok(Term::overloaded(alts));
        }

        if args_carry_error {
            return Ok(Term::Error);
        }
        self.report(
            ResolveError::AmbiguousOverload {
                callee: callee_name,
                args: self.render_args(args),
            },
            span,
        );
        Ok(Term::Error)
    }

    // ---- expansion -------------------------------------------------------

    /// Expand a callee term into candidates, collecting deferred layers
    fn expand_term(
        &mut self,
        term: &Term,
        layer: u32,
        out: &mut Vec<Candidate>,
        rests: &mut Vec<(u32, LayerRest)>,
        saw_error: &mut bool,
    ) {
        match term {
            Term::Error => *saw_error = true,
            Term::Layered { first, rest } => {
                self.expand_term(first, layer, out, rests, saw_error);
                rests.push((layer + 1, *rest));
            }
            Term::Overloaded { alts } => {
                for alt in alts {
                    self.expand_term(alt, layer, out, rests, saw_error);
                }
            }
            Term::CategoryGroup { members, .. } => {
                for member in members {
                    self.expand_member(*member, layer, out);
                }
            }
            Term::Member(member) => self.expand_member(*member, layer, out),
            Term::Type(ty) => {
                if let Type::Element(element) = self.module.types.get(*ty) {
                    out.push(Candidate {
                        layer,
                        kind: CandidateKind::ElementCtor { element: *element },
                    });
                }
            }
            Term::Expr(_) => {}
        }
    }

    fn expand_member(&mut self, member: MemberRef, layer: u32, out: &mut Vec<Candidate>) {
        match self.flavor(member.decl) {
            MemberFlavor::Method => out.push(Candidate {
                layer,
                kind: CandidateKind::Method { decl: member.decl },
            }),
            MemberFlavor::Attribute if member.object.is_some() => out.push(Candidate {
                layer,
                kind: CandidateKind::AttrFetch { member },
            }),
            MemberFlavor::Element => out.push(Candidate {
                layer,
                kind: CandidateKind::ElementCtor {
                    element: member.decl,
                },
            }),
            _ => {}
        }
    }

    fn candidate_signature(&self, candidate: &Candidate) -> String {
        match &candidate.kind {
            CandidateKind::Method { decl } => self.render_signature(*decl),
            CandidateKind::AttrFetch { member } => self.render_signature(member.decl),
            CandidateKind::ElementCtor { element } => self.render_signature(*element),
        }
    }

    fn render_args(&self, args: &[CallArg]) -> String {
        let shapes: Vec<(Option<Symbol>, TypeId)> = args
            .iter()
            .map(|arg| {
                let ty = match &arg.value {
                    ArgValue::Expr(expr) => self.module.exprs[*expr].ty,
                    ArgValue::Term(_) => self.module.types.error(),
                };
                (arg.name, ty)
            })
            .collect();
        wf_sema::Renderer::new(&self.module, self.interner).call_shape(&shapes)
    }

    // ---- checking --------------------------------------------------------

    /// Run the two filtering stages for one candidate
    fn check_candidate(
        &mut self,
        candidate: &Candidate,
        args: &[CallArg],
        span: FileSpan,
        mode: ApplyMode,
        callee_name: &str,
    ) -> Result<Result<CandidateOutput, ResolveError>, Ice> {
        match &candidate.kind {
            CandidateKind::Method { decl } => match mode {
                ApplyMode::Call => self.check_method_call(*decl, args, span, callee_name),
                ApplyMode::Generic => self.check_generic_instantiation(*decl, args, callee_name),
            },
            CandidateKind::AttrFetch { member } => {
                if !args.is_empty() {
                    return Ok(Err(ResolveError::TooManyArguments {
                        callee: callee_name.to_string(),
                        expected: 0,
                        found: args.len(),
                    }));
                }
                let ty = self.value_type(member.decl);
                let base = member.object.ok_or_else(|| Ice::MissingEntry {
                    what: "attribute fetch without an object".to_string(),
                })?;
                let expr = self.module.expr(
                    ExprKind::AttrFetch {
                        base,
                        attr: member.decl,
                    },
                    ty,
                    span,
                );
                Ok(Ok(CandidateOutput::Expr(expr)))
            }
            CandidateKind::ElementCtor { element } => {
                self.check_element_ctor(*element, args, span, callee_name)
            }
        }
    }

    /// Stage 1 + 2 for an ordinary method call
    fn check_method_call(
        &mut self,
        decl: DeclId,
        args: &[CallArg],
        span: FileSpan,
        callee_name: &str,
    ) -> Result<Result<CandidateOutput, ResolveError>, Ice> {
        let method = match &self.decl_view(decl).kind {
            DeclKind::Method(method) => method.clone(),
            _ => {
                return Ok(Err(ResolveError::NotAValue {
                    name: callee_name.to_string(),
                }))
            }
        };

        // Implicit generic application: placeholders per parameter.
        let (subst, placeholder_ids) = if method.generics.is_empty() {
            (Substitution::new(), Vec::new())
        } else {
            self.fresh_placeholders(&method.generics)
        };

        // Stage 1: arity and keyword binding.
        let bound = match self.bind_args(&method, args, callee_name)? {
            Ok(bound) => bound,
            Err(reason) => return Ok(Err(reason)),
        };

        // Stage 2: coerce each bound argument to its parameter type.
        let mut final_args = Vec::with_capacity(method.params.len());
        for (index, param) in method.params.iter().enumerate() {
            let param_ty = subst.apply_type(&mut self.module, param.ty);
            match bound[index] {
                Some(expr) => match self.coerce(expr, param_ty)? {
                    Ok(coerced) => final_args.push(coerced),
                    Err(failure) => {
                        let source = self.module.exprs[expr].ty;
                        return Ok(Err(self.coerce_failure_error(failure, source, param_ty)));
                    }
                },
                None => final_args.push(self.module.error_expr(span)),
            }
        }

        // Deduction post-check for the implicit generic application.
        let mut result_ty = subst.apply_type(&mut self.module, method.result);
        let mut final_method = decl;
        if !placeholder_ids.is_empty() {
            match self.resolve_placeholders(&placeholder_ids, span)? {
                Ok(deduced) => {
                    result_ty = deduced.apply_type(&mut self.module, result_ty);
                    if self.module.try_decl(decl).is_some() {
                        final_method = deduced.apply_decl(
                            &mut self.module,
                            decl,
                            wf_sema::DeclMode::Extended,
                        )?;
                    }
                }
                Err(param) => {
                    return Ok(Err(ResolveError::CannotDeduce {
                        param: self.name_text(self.decl_view(param).name),
                        callee: callee_name.to_string(),
                    }));
                }
            }
        }

        let kind = match &method.body {
            wf_sema::MethodBody::Builtin(op) => ExprKind::CallBuiltin {
                op: *op,
                args: final_args,
            },
            _ => ExprKind::CallMethod {
                method: final_method,
                args: final_args,
            },
        };
        Ok(Ok(CandidateOutput::Expr(
            self.module.expr(kind, result_ty, span),
        )))
    }

    /// Keyword/positional binding against a method's parameter list
    fn bind_args(
        &mut self,
        method: &MethodDecl,
        args: &[CallArg],
        callee_name: &str,
    ) -> Result<Result<Vec<Option<ExprId>>, ResolveError>, Ice> {
        let mut bound: Vec<Option<ExprId>> = vec![None; method.params.len()];

        for arg in args.iter().filter(|arg| arg.name.is_some()) {
            let name = arg.name.unwrap_or_else(|| unreachable!("filtered above"));
            let Some(index) = method.params.iter().position(|param| param.name == name) else {
                return Ok(Err(ResolveError::UnknownKeyword {
                    callee: callee_name.to_string(),
                    keyword: self.name_text(name),
                }));
            };
            if bound[index].is_some() {
                return Ok(Err(ResolveError::DuplicateArgument {
                    callee: callee_name.to_string(),
                    keyword: self.name_text(name),
                }));
            }
            bound[index] = Some(self.arg_expr(&arg.value)?);
        }

        let mut slot = 0usize;
        let positional_count = args.iter().filter(|arg| arg.name.is_none()).count();
        for arg in args.iter().filter(|arg| arg.name.is_none()) {
            while slot < bound.len() && bound[slot].is_some() {
                slot += 1;
            }
            if slot >= bound.len() {
                return Ok(Err(ResolveError::TooManyArguments {
                    callee: callee_name.to_string(),
                    expected: method.params.len(),
                    found: positional_count,
                }));
            }
            bound[slot] = Some(self.arg_expr(&arg.value)?);
            slot += 1;
        }

        for (index, param) in method.params.iter().enumerate() {
            if bound[index].is_none() && !param.optional {
                return Ok(Err(ResolveError::MissingArgument {
                    callee: callee_name.to_string(),
                    param: self.name_text(param.name),
                }));
            }
        }
        Ok(Ok(bound))
    }

    /// Collapse an argument value to an expression
    fn arg_expr(&mut self, value: &ArgValue) -> Result<ExprId, Ice> {
        match value {
            ArgValue::Expr(expr) => Ok(*expr),
            ArgValue::Term(term) => {
                let term = term.clone();
                self.term_as_expr(term, FileSpan::synthesized())
            }
        }
    }

    /// Explicit generic instantiation: bind terms to generic parameters
    fn check_generic_instantiation(
        &mut self,
        decl: DeclId,
        args: &[CallArg],
        callee_name: &str,
    ) -> Result<Result<CandidateOutput, ResolveError>, Ice> {
        let method = match &self.decl_view(decl).kind {
            DeclKind::Method(method) => method.clone(),
            _ => {
                return Ok(Err(ResolveError::NotAValue {
                    name: callee_name.to_string(),
                }))
            }
        };
        if method.generics.is_empty() {
            return Ok(Err(ResolveError::NoOverload {
                callee: callee_name.to_string(),
                args: self.render_args(args),
            }));
        }

        let generic_names: Vec<Symbol> = method
            .generics
            .iter()
            .map(|&generic| self.decl_view(generic).name)
            .collect();
        let mut bound: Vec<Option<&CallArg>> = vec![None; method.generics.len()];

        for arg in args {
            match arg.name {
                Some(name) => {
                    let Some(index) = generic_names.iter().position(|&n| n == name) else {
                        return Ok(Err(ResolveError::UnknownKeyword {
                            callee: callee_name.to_string(),
                            keyword: self.name_text(name),
                        }));
                    };
                    if bound[index].is_some() {
                        return Ok(Err(ResolveError::DuplicateArgument {
                            callee: callee_name.to_string(),
                            keyword: self.name_text(name),
                        }));
                    }
                    bound[index] = Some(arg);
                }
                None => {
                    let Some(index) = bound.iter().position(Option::is_none) else {
                        return Ok(Err(ResolveError::TooManyArguments {
                            callee: callee_name.to_string(),
                            expected: method.generics.len(),
                            found: args.len(),
                        }));
                    };
                    bound[index] = Some(arg);
                }
            }
        }

        // Kind-check each argument against its parameter; conversions stay
        // disabled while generic arguments resolve.
        let mut subst = Substitution::new();
        for (index, &generic) in method.generics.iter().enumerate() {
            let Some(arg) = bound[index] else {
                return Ok(Err(ResolveError::MissingArgument {
                    callee: callee_name.to_string(),
                    param: self.name_text(generic_names[index]),
                }));
            };
            let generic_kind = match &self.decl_view(generic).kind {
                DeclKind::GenericParam(param) => param.kind.clone(),
                _ => continue,
            };
            match generic_kind {
                wf_sema::GenericParamKind::Type { upper } => {
                    let term = match &arg.value {
                        ArgValue::Term(term) => term.clone(),
                        ArgValue::Expr(_) => {
                            return Ok(Err(ResolveError::NotAType {
                                name: self.name_text(generic_names[index]),
                            }))
                        }
                    };
                    let ty = self.term_as_type(term, arg.span)?;
                    if let Some(upper) = upper {
                        if !self.is_subtype(ty, upper) {
                            let source = ty;
                            return Ok(Err(self.coerce_failure_error(
                                crate::frequency::CoerceFailure::NoConversion,
                                source,
                                upper,
                            )));
                        }
                    }
                    subst.insert(generic, Term::Type(ty));
                }
                wf_sema::GenericParamKind::Value { ty } => {
                    let expr = match &arg.value {
                        ArgValue::Expr(expr) => *expr,
                        ArgValue::Term(term) => {
                            let term = term.clone();
                            self.term_as_expr(term, arg.span)?
                        }
                    };
                    let coerced = match self.without_conversions(|this| this.coerce(expr, ty))? {
                        Ok(coerced) => coerced,
                        Err(failure) => {
                            let source = self.module.exprs[expr].ty;
                            return Ok(Err(self.coerce_failure_error(failure, source, ty)));
                        }
                    };
                    subst.insert(generic, Term::Expr(coerced));
                }
            }
        }

        let specialized = if self.module.try_decl(decl).is_some() {
            subst.apply_decl(&mut self.module, decl, wf_sema::DeclMode::Extended)?
        } else {
            decl
        };
        Ok(Ok(CandidateOutput::Term(Term::Member(MemberRef {
            object: None,
            line: None,
            decl: specialized,
        }))))
    }

    /// Element construction: attributes at the element are the parameters
    fn check_element_ctor(
        &mut self,
        element: DeclId,
        args: &[CallArg],
        span: FileSpan,
        callee_name: &str,
    ) -> Result<Result<CandidateOutput, ResolveError>, Ice> {
        let Some(pipeline) = self.current_pipeline else {
            return Ok(Err(ResolveError::NoOverload {
                callee: callee_name.to_string(),
                args: self.render_args(args),
            }));
        };
        let freq = wf_sema::FreqRef {
            line: self.decl_view(element).line_key,
            decl: element,
        };

        // The constructor's parameters: input attributes at this element.
        let mut params: Vec<(Symbol, DeclId, TypeId, bool)> = Vec::new();
        for line in self.member_view(pipeline) {
            let line_data = self.module.lines[line].clone();
            if line_data.flavor != MemberFlavor::Attribute || !line_data.tags.input {
                continue;
            }
            let decl = self.line_reference_decl(line)?;
            let attr_ty = self.value_type(decl);
            if self.module.types.frequency(attr_ty) == Some(freq) {
                params.push((line_data.name, decl, attr_ty, line_data.tags.optional));
            }
        }

        // Stage 1: keyword binding, then positional fill.
        let mut bound: Vec<Option<ExprId>> = vec![None; params.len()];
        for arg in args.iter().filter(|arg| arg.name.is_some()) {
            let name = arg.name.unwrap_or_else(|| unreachable!("filtered above"));
            let Some(index) = params.iter().position(|(param, ..)| *param == name) else {
                return Ok(Err(ResolveError::UnknownKeyword {
                    callee: callee_name.to_string(),
                    keyword: self.name_text(name),
                }));
            };
            if bound[index].is_some() {
                return Ok(Err(ResolveError::DuplicateArgument {
                    callee: callee_name.to_string(),
                    keyword: self.name_text(name),
                }));
            }
            bound[index] = Some(self.arg_expr(&arg.value)?);
        }
        let mut slot = 0usize;
        for arg in args.iter().filter(|arg| arg.name.is_none()) {
            while slot < bound.len() && bound[slot].is_some() {
                slot += 1;
            }
            if slot >= bound.len() {
                return Ok(Err(ResolveError::TooManyArguments {
                    callee: callee_name.to_string(),
                    expected: params.len(),
                    found: args.len(),
                }));
            }
            bound[slot] = Some(self.arg_expr(&arg.value)?);
            slot += 1;
        }

        // Unfilled parameters may resolve from an in-scope implicit value of
        // matching frequency and type before being reported missing.
        for (index, (name, _, attr_ty, optional)) in params.iter().enumerate() {
            if bound[index].is_some() {
                continue;
            }
            if let Some(implicit) = self.implicit_scope_value(*attr_ty, span) {
                bound[index] = Some(implicit);
                continue;
            }
            if !optional {
                return Ok(Err(ResolveError::MissingArgument {
                    callee: callee_name.to_string(),
                    param: self.name_text(*name),
                }));
            }
        }

        // Stage 2: coerce the filled attributes.
        let mut filled = Vec::new();
        for (index, (_, decl, attr_ty, _)) in params.iter().enumerate() {
            if let Some(expr) = bound[index] {
                match self.coerce(expr, *attr_ty)? {
                    Ok(coerced) => filled.push((*decl, coerced)),
                    Err(failure) => {
                        let source = self.module.exprs[expr].ty;
                        return Ok(Err(self.coerce_failure_error(failure, source, *attr_ty)));
                    }
                }
            }
        }

        let element_ty = self.module.types.alloc(Type::Element(element));
        let ty = self.module.types.freq_qual(freq, element_ty);
        Ok(Ok(CandidateOutput::Expr(self.module.expr(
            ExprKind::ElementCtor {
                element,
                args: filled,
            },
            ty,
            span,
        ))))
    }
}
