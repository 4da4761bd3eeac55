//! Linearization and facet merge
//!
//! A pipeline's declared bases fold right-to-left into a single linear order
//! of ancestors, the same policy as Scala trait linearization: merging two
//! ordered lists keeps each element of the left list except those that also
//! occur in the right one, so the right copy and its position win. Facets
//! populate most-derived first, so the earliest write owns a member line and
//! later ancestors append their contributions to it.

use crate::error::ResolveError;
use crate::resolver::{concreteness_of, tags_of, PendingBody, Resolver};
use crate::scope::ScopeKind;
use rustc_hash::{FxHashMap, FxHashSet};
use wf_ast as ast;
use wf_memo::Probe;
use wf_sema::{
    AttributeDecl, BaseKind, BaseRef, Concreteness, DeclBuilder, DeclId, DeclKind, DeclMode,
    ElementDecl, ExprKind, Facet, FacetId, FieldDecl, Ice, InheritedSource, LineId, LineKey,
    MemberFlavor, MemberLine, MemberTags, PipelineDecl, StructDecl, Substitution, Term, Type,
    TypeId, TypeSlotDecl,
};
use wf_span::FileSpan;

impl Resolver<'_> {
    /// Make sure a pipeline is fully built, by declaration ID
    pub(crate) fn ensure_pipeline_by_id(&mut self, id: DeclId) -> Result<(), Ice> {
        if self.flavor(id) != MemberFlavor::Pipeline || self.pipeline_facets.contains_key(&id) {
            return Ok(());
        }
        let found = self
            .global_items
            .iter()
            .find(|(decl, ..)| *decl == id)
            .copied();
        if let Some((_, file_index, item_index)) = found {
            self.ensure_pipeline(id, file_index, item_index)?;
        }
        Ok(())
    }

    /// Build a pipeline at most once; re-entry is cyclic inheritance
    pub(crate) fn ensure_pipeline(
        &mut self,
        id: DeclId,
        file_index: usize,
        item_index: usize,
    ) -> Result<(), Ice> {
        match self.pipeline_memo.probe(id) {
            Err(_) => {
                // The build re-entered itself through a base clause: the
                // user wrote cyclic inheritance. Report and leave the outer
                // build to complete with this base missing.
                let item = &self.ast.files[file_index].items[item_index];
                let name = self.name_text(item.name.name);
                self.report(ResolveError::CyclicInheritance { pipeline: name }, item.span);
                Ok(())
            }
            Ok(Probe::Done) => Ok(()),
            Ok(Probe::Started) => match self.build_pipeline(id, file_index, item_index) {
                Ok(()) => {
                    self.pipeline_memo.fulfil(id, ());
                    Ok(())
                }
                Err(ice) => {
                    self.pipeline_memo.abandon(&id);
                    Err(ice)
                }
            },
        }
    }

    /// Build one pipeline: bases, linearization, facets, members
    fn build_pipeline(
        &mut self,
        id: DeclId,
        file_index: usize,
        item_index: usize,
    ) -> Result<(), Ice> {
        let ast_ref = self.ast;
        let item = &ast_ref.files[file_index].items[item_index];
        let ast::ItemKind::Pipeline(pipeline_item) = &item.kind else {
            return Ok(());
        };
        let is_abstract = item.modifiers.has(ast::Modifier::Abstract);
        let pipeline_name = self.name_text(item.name.name);

        // Resolve the declared bases; each base must already be built.
        let mut bases: Vec<BaseRef> = Vec::new();
        for base_item in &pipeline_item.bases {
            let term = self.in_scope(self.module_scope, |this| this.resolve_term(base_item.term))?;
            let ty = self.term_as_type(term, base_item.span)?;
            match *self.module.types.get(ty) {
                Type::Pipeline(base_decl) => {
                    self.ensure_pipeline_by_id(base_decl)?;
                    bases.push(BaseRef {
                        pipeline: base_decl,
                        kind: match base_item.kind {
                            ast::BaseKind::Primary => BaseKind::Primary,
                            ast::BaseKind::Mixin => BaseKind::Mixin,
                        },
                        span: base_item.span,
                    });
                }
                Type::Error => {}
                _ => self.report(
                    ResolveError::BaseNotPipeline {
                        pipeline: pipeline_name.clone(),
                    },
                    base_item.span,
                ),
            }
        }

        let primary_count = bases
            .iter()
            .filter(|base| base.kind == BaseKind::Primary)
            .count();
        if primary_count > 1 {
            self.report(
                ResolveError::MultiplePrimaries {
                    pipeline: pipeline_name.clone(),
                },
                item.span,
            );
        }
        if let Some(position) = bases.iter().position(|base| base.kind == BaseKind::Primary) {
            if position != 0 {
                self.report(
                    ResolveError::PrimaryNotFirst {
                        pipeline: pipeline_name.clone(),
                    },
                    bases[position].span,
                );
            }
        }
        self.pipeline_bases.insert(id, bases.clone());

        // Linearize and validate the primary chain.
        let ancestors = self.linearize_ancestors(&bases);
        self.pipeline_ancestors.insert(id, ancestors.clone());
        self.check_primary_chain(id, &ancestors, item.span);

        // The `this` parameter exists before any member references it.
        let this_ty = self.module.types.alloc(Type::Pipeline(id));
        let this_param = self.reserve(MemberFlavor::Field);
        let this_key = self.module.fresh_line_key();
        DeclBuilder::new(self.interner.intern("this"), item.span, this_key)
            .kind(DeclKind::Field(FieldDecl {
                ty: this_ty,
                init: None,
            }))
            .seal(&mut self.module, this_param)?;

        // One facet per distinct ancestor, linearized order, plus the
        // direct facet.
        let direct_facet = self.module.alloc_facet(Facet::new(id));
        let mut facet_map: FxHashMap<DeclId, FacetId> = FxHashMap::default();
        let mut facet_ids = Vec::with_capacity(ancestors.len());
        for &ancestor in &ancestors {
            let facet = self.module.alloc_facet(Facet::new(ancestor));
            facet_map.insert(ancestor, facet);
            facet_ids.push(facet);
        }
        for &ancestor in &ancestors {
            let ancestor_bases = self
                .pipeline_bases
                .get(&ancestor)
                .cloned()
                .unwrap_or_default();
            let base_facets: Vec<FacetId> = ancestor_bases
                .iter()
                .filter_map(|base| facet_map.get(&base.pipeline).copied())
                .collect();
            self.module.facets[facet_map[&ancestor]].bases = base_facets;
        }
        self.module.facets[direct_facet].bases = bases
            .iter()
            .filter_map(|base| facet_map.get(&base.pipeline).copied())
            .collect();
        self.pipeline_facets
            .insert(id, (direct_facet, facet_ids.clone()));

        // Collect inherited member lines, most-derived ancestor first, so
        // the first writer of a line key owns the line and later ancestors
        // append their contribution.
        let mut merged: FxHashMap<LineKey, LineId> = FxHashMap::default();
        for &ancestor in &ancestors {
            // A pipeline can reach itself as an ancestor only through
            // cyclic inheritance, which was reported when the cycle closed.
            if ancestor == id {
                continue;
            }
            let Some(&(ancestor_direct, _)) = self.pipeline_facets.get(&ancestor) else {
                continue;
            };
            let ancestor_this = match self.module.try_decl(ancestor).map(|decl| &decl.kind) {
                Some(DeclKind::Pipeline(decl)) => decl.this_param,
                _ => continue,
            };
            let mut subst = Substitution::new();
            let this_expr =
                self.module
                    .expr(ExprKind::VarRef(this_param), this_ty, FileSpan::synthesized());
            subst.insert(ancestor_this, Term::Expr(this_expr));
            subst.insert(ancestor, Term::Type(this_ty));

            let ancestor_lines: Vec<LineId> =
                self.module.facets[ancestor_direct].member_lines().collect();
            for ancestor_line in ancestor_lines {
                let line_data = self.module.lines[ancestor_line].clone();
                // Pure pass-through lines are represented by the chain, not
                // copied.
                let Some(contributor) = line_data.direct else {
                    continue;
                };
                let source = InheritedSource {
                    decl: contributor,
                    subst: subst.clone(),
                };
                match merged.get(&line_data.key) {
                    Some(&existing) => {
                        let line = &mut self.module.lines[existing];
                        line.concreteness = line.concreteness.max(line_data.concreteness);
                        line.tags.implicit |= line_data.tags.implicit;
                        line.tags.input |= line_data.tags.input;
                        line.tags.output |= line_data.tags.output;
                        line.tags.optional |= line_data.tags.optional;
                        line.inherited_sources.push(source);
                        line.inherited.push(None);
                    }
                    None => {
                        let line = self.module.alloc_line(MemberLine {
                            key: line_data.key,
                            name: line_data.name,
                            flavor: line_data.flavor,
                            concreteness: line_data.concreteness,
                            mode: DeclMode::Inherited,
                            tags: line_data.tags,
                            direct: None,
                            inherited_sources: vec![source],
                            inherited: vec![None],
                        });
                        merged.insert(line_data.key, line);
                        self.module.facets[facet_map[&ancestor]].add_line(
                            line_data.name,
                            line_data.flavor,
                            line,
                        );
                    }
                }
            }
        }

        // Pipeline scope: members resolve against the member view, `this`
        // is an ordinary value binding.
        let scope = self.scopes.create_child(self.module_scope, ScopeKind::Pipeline);
        self.scopes.attach_pipeline(scope, id);
        self.scopes
            .define_value(scope, self.interner.intern("this"), this_param);
        self.pipeline_scopes.insert(id, scope);

        // Pre-reserve every direct member for forward references.
        let mut member_ids = Vec::with_capacity(pipeline_item.members.len());
        let mut pending: FxHashMap<wf_intern::Symbol, Vec<(DeclId, MemberFlavor)>> =
            FxHashMap::default();
        for member in &pipeline_item.members {
            let flavor = match &member.kind {
                ast::ItemKind::Attribute(_) => MemberFlavor::Attribute,
                ast::ItemKind::Field(_) => MemberFlavor::Field,
                ast::ItemKind::Method(_) => MemberFlavor::Method,
                ast::ItemKind::Element(_) => MemberFlavor::Element,
                ast::ItemKind::Struct(_) => MemberFlavor::Struct,
                ast::ItemKind::TypeSlot(_) => MemberFlavor::TypeSlot,
                ast::ItemKind::Pipeline(_) | ast::ItemKind::Concept(_) => {
                    self.report(
                        ResolveError::MisplacedItem {
                            name: self.name_text(member.name.name),
                        },
                        member.span,
                    );
                    member_ids.push(None);
                    continue;
                }
            };
            let member_id = self.reserve(flavor);
            pending
                .entry(member.name.name)
                .or_default()
                .push((member_id, flavor));
            member_ids.push(Some(member_id));
        }
        self.pending_members.insert(id, pending);

        // Elements first: attribute types refer to them. Everything else
        // follows in source order; the member list keeps source order.
        for (member, member_id) in pipeline_item.members.iter().zip(&member_ids) {
            let Some(member_id) = member_id else { continue };
            if matches!(member.kind, ast::ItemKind::Element(_)) {
                self.in_pipeline(Some(id), |this| {
                    this.direct_member(id, direct_facet, scope, member, *member_id)
                })?;
            }
        }
        for (member, member_id) in pipeline_item.members.iter().zip(&member_ids) {
            let Some(member_id) = member_id else { continue };
            if !matches!(member.kind, ast::ItemKind::Element(_)) {
                self.in_pipeline(Some(id), |this| {
                    this.direct_member(id, direct_facet, scope, member, *member_id)
                })?;
            }
        }
        let members: Vec<DeclId> = member_ids.iter().copied().flatten().collect();

        // A non-abstract pipeline may not keep any abstract member line.
        if !is_abstract {
            for line in self.member_view(id) {
                let line_data = &self.module.lines[line];
                if line_data.concreteness == Concreteness::Abstract {
                    let member = self.name_text(line_data.name);
                    self.report(
                        ResolveError::AbstractMemberRemains {
                            pipeline: pipeline_name.clone(),
                            member,
                        },
                        item.span,
                    );
                }
            }
        }

        let implicit_members: Vec<LineId> = self
            .member_view(id)
            .into_iter()
            .filter(|&line| self.module.lines[line].tags.implicit)
            .collect();

        let key = self.module.fresh_line_key();
        DeclBuilder::new(item.name.name, item.span, key)
            .concreteness(concreteness_of(&item.modifiers))
            .kind(DeclKind::Pipeline(PipelineDecl {
                is_abstract,
                bases,
                ancestors,
                direct_facet,
                facets: facet_ids,
                members,
                implicit_members,
                this_param,
            }))
            .seal(&mut self.module, id)?;
        self.built_order.push(id);
        Ok(())
    }

    /// Fold the bases' linearizations right-to-left
    pub(crate) fn linearize_ancestors(&self, bases: &[BaseRef]) -> Vec<DeclId> {
        let mut acc: Vec<DeclId> = Vec::new();
        for base in bases.iter().rev() {
            let mut left = vec![base.pipeline];
            if let Some(ancestors) = self.pipeline_ancestors.get(&base.pipeline) {
                left.extend(ancestors.iter().copied());
            }
            acc = merge_linearizations(&left, &acc);
        }
        acc
    }

    /// Every transitively reachable primary ancestor must sit on one
    /// subtyping chain
    fn check_primary_chain(&mut self, id: DeclId, ancestors: &[DeclId], span: FileSpan) {
        let mut primaries: Vec<DeclId> = Vec::new();
        for pipeline in std::iter::once(id).chain(ancestors.iter().copied()) {
            if let Some(bases) = self.pipeline_bases.get(&pipeline) {
                for base in bases {
                    if base.kind == BaseKind::Primary && !primaries.contains(&base.pipeline) {
                        primaries.push(base.pipeline);
                    }
                }
            }
        }
        for (index, &left) in primaries.iter().enumerate() {
            for &right in &primaries[index + 1..] {
                if !self.pipeline_is_subtype(left, right)
                    && !self.pipeline_is_subtype(right, left)
                {
                    let left_name = self.decl_name(left);
                    let right_name = self.decl_name(right);
                    self.report(
                        ResolveError::DisjointPrimaries {
                            left: left_name,
                            right: right_name,
                        },
                        span,
                    );
                    return;
                }
            }
        }
    }

    // ---- direct members --------------------------------------------------

    /// Declare one direct member, merging it with the inherited lines
    fn direct_member(
        &mut self,
        pipeline: DeclId,
        direct_facet: FacetId,
        scope: wf_sema::ScopeId,
        member: &ast::Item,
        member_id: DeclId,
    ) -> Result<(), Ice> {
        let name = member.name.name;
        let flavor = self.flavor(member_id);
        let concreteness = concreteness_of(&member.modifiers);
        let tags = tags_of(&member.modifiers);
        let has_override = member.modifiers.has(ast::Modifier::Override);
        let has_new = member.modifiers.has(ast::Modifier::New);
        let marker_span = member
            .modifiers
            .span_of(ast::Modifier::Override)
            .or_else(|| member.modifiers.span_of(ast::Modifier::New))
            .unwrap_or(member.span);

        // Resolve the header and store the draft (or seal, if nothing is
        // deferred).
        let line_key_reserve = self.module.fresh_line_key();
        let declared_ty =
            self.member_header(pipeline, scope, member, member_id, line_key_reserve)?;

        // Match against inherited lines of the same name and flavor.
        let inherited_matches: Vec<LineId> = self
            .member_name_groups(pipeline, name)
            .into_iter()
            .filter(|(group_flavor, _)| *group_flavor == flavor)
            .flat_map(|(_, lines)| lines)
            .filter(|&line| self.module.lines[line].direct.is_none())
            .filter(|&line| self.signature_matches(line, member_id))
            .collect();

        let matched = if has_override {
            match inherited_matches.as_slice() {
                [] => {
                    self.report(
                        ResolveError::OverrideMissing {
                            name: self.name_text(name),
                        },
                        marker_span,
                    );
                    None
                }
                [single] => Some(*single),
                _ => {
                    self.report(
                        ResolveError::OverrideAmbiguous {
                            name: self.name_text(name),
                        },
                        marker_span,
                    );
                    None
                }
            }
        } else {
            if !inherited_matches.is_empty() && !has_new {
                self.report(
                    ResolveError::HiddenMember {
                        name: self.name_text(name),
                    },
                    marker_span,
                );
            }
            None
        };

        if let Some(matched_line) = matched {
            let matched_data = self.module.lines[matched_line].clone();
            if matched_data.concreteness == Concreteness::Final {
                self.report(
                    ResolveError::OverrideFinal {
                        name: self.name_text(name),
                    },
                    marker_span,
                );
            }
            // The overriding declaration joins the inherited line: same key,
            // the inherited chain kept behind the direct declaration.
            self.rekey_draft(member_id, matched_data.key);
            let line = self.module.alloc_line(MemberLine {
                key: matched_data.key,
                name,
                flavor,
                concreteness,
                mode: DeclMode::Direct,
                tags: MemberTags {
                    input: tags.input | matched_data.tags.input,
                    output: tags.output | matched_data.tags.output,
                    optional: tags.optional | matched_data.tags.optional,
                    implicit: tags.implicit | matched_data.tags.implicit,
                },
                direct: Some(member_id),
                inherited_sources: matched_data.inherited_sources,
                inherited: matched_data.inherited,
            });
            self.module.facets[direct_facet].add_line(name, flavor, line);
            self.queue_member_body(pipeline, scope, member, member_id, line)?;
        } else {
            let line = self.module.alloc_line(MemberLine {
                key: line_key_reserve,
                name,
                flavor,
                concreteness,
                mode: DeclMode::Direct,
                tags,
                direct: Some(member_id),
                inherited_sources: Vec::new(),
                inherited: Vec::new(),
            });
            self.module.facets[direct_facet].add_line(name, flavor, line);
            self.new_input_check(pipeline, member, member_id, declared_ty, tags);
            self.queue_member_body(pipeline, scope, member, member_id, line)?;
        }
        Ok(())
    }

    /// Resolve a direct member's header into a draft or sealed declaration
    ///
    /// Returns the declared type for attribute/field members, for the
    /// concrete-element input check.
    fn member_header(
        &mut self,
        pipeline: DeclId,
        scope: wf_sema::ScopeId,
        member: &ast::Item,
        member_id: DeclId,
        line_key: LineKey,
    ) -> Result<Option<TypeId>, Ice> {
        let concreteness = concreteness_of(&member.modifiers);
        let tags = tags_of(&member.modifiers);
        match &member.kind {
            ast::ItemKind::Element(_) => {
                DeclBuilder::new(member.name.name, member.span, line_key)
                    .concreteness(if member.modifiers.has(ast::Modifier::Concrete) {
                        Concreteness::Final
                    } else {
                        concreteness
                    })
                    .tags(tags)
                    .kind(DeclKind::Element(ElementDecl {}))
                    .seal(&mut self.module, member_id)?;
                Ok(None)
            }
            ast::ItemKind::Attribute(attr_item) => {
                let data_ty =
                    self.in_scope(scope, |this| this.resolve_type_term(attr_item.ty))?;
                let full_ty = match attr_item.freq {
                    Some(freq_term) => {
                        let freq_span = self.ast.terms[freq_term].span;
                        let term = self.in_scope(scope, |this| this.resolve_term(freq_term))?;
                        match self.term_as_frequency(&term, freq_span)? {
                            Some(freq) => self.module.types.freq_qual(freq, data_ty),
                            None => self.module.types.error(),
                        }
                    }
                    None => data_ty,
                };
                self.drafts.insert(
                    member_id,
                    DeclBuilder::new(member.name.name, member.span, line_key)
                        .concreteness(concreteness)
                        .tags(tags)
                        .kind(DeclKind::Attribute(AttributeDecl {
                            ty: full_ty,
                            init: None,
                        }))
                        .build_draft()?,
                );
                Ok(Some(full_ty))
            }
            ast::ItemKind::Field(field_item) => {
                let ty = self.in_scope(scope, |this| this.resolve_type_term(field_item.ty))?;
                self.drafts.insert(
                    member_id,
                    DeclBuilder::new(member.name.name, member.span, line_key)
                        .concreteness(concreteness)
                        .tags(tags)
                        .kind(DeclKind::Field(FieldDecl { ty, init: None }))
                        .build_draft()?,
                );
                Ok(Some(ty))
            }
            ast::ItemKind::Method(method_item) => {
                self.method_header(member_id, member, method_item, scope, Some(pipeline))?;
                // The method header allocates its own line key; align the
                // draft with the line created here.
                self.rekey_draft(member_id, line_key);
                Ok(None)
            }
            ast::ItemKind::TypeSlot(slot_item) => {
                let bound = match slot_item.bound {
                    Some(bound) => {
                        Some(self.in_scope(scope, |this| this.resolve_type_term(bound))?)
                    }
                    None => None,
                };
                DeclBuilder::new(member.name.name, member.span, line_key)
                    .concreteness(concreteness)
                    .tags(tags)
                    .kind(DeclKind::TypeSlot(TypeSlotDecl { bound }))
                    .seal(&mut self.module, member_id)?;
                Ok(None)
            }
            ast::ItemKind::Struct(struct_item) => {
                let mut fields = Vec::new();
                for field_item in &struct_item.fields {
                    let ast::ItemKind::Field(field) = &field_item.kind else {
                        continue;
                    };
                    let field_id = self.reserve(MemberFlavor::Field);
                    let field_key = self.module.fresh_line_key();
                    let ty = self.in_scope(scope, |this| this.resolve_type_term(field.ty))?;
                    self.drafts.insert(
                        field_id,
                        DeclBuilder::new(field_item.name.name, field_item.span, field_key)
                            .kind(DeclKind::Field(FieldDecl { ty, init: None }))
                            .build_draft()?,
                    );
                    if let Some(init) = field.init {
                        self.pending_bodies.push(PendingBody::FieldInit {
                            decl: field_id,
                            scope,
                            ast_expr: init,
                        });
                    }
                    fields.push(field_id);
                }
                DeclBuilder::new(member.name.name, member.span, line_key)
                    .concreteness(concreteness)
                    .tags(tags)
                    .kind(DeclKind::Struct(StructDecl { fields }))
                    .seal(&mut self.module, member_id)?;
                Ok(None)
            }
            ast::ItemKind::Pipeline(_) | ast::ItemKind::Concept(_) => Ok(None),
        }
    }

    /// Queue the deferred body of a member, if it has one
    fn queue_member_body(
        &mut self,
        pipeline: DeclId,
        scope: wf_sema::ScopeId,
        member: &ast::Item,
        member_id: DeclId,
        line: LineId,
    ) -> Result<(), Ice> {
        match &member.kind {
            ast::ItemKind::Attribute(attr_item) => {
                if let Some(init) = attr_item.init {
                    self.pending_bodies.push(PendingBody::AttrInit {
                        decl: member_id,
                        pipeline,
                        scope,
                        ast_expr: init,
                        line,
                    });
                }
            }
            ast::ItemKind::Field(field_item) => {
                if let Some(init) = field_item.init {
                    self.pending_bodies.push(PendingBody::FieldInit {
                        decl: member_id,
                        scope,
                        ast_expr: init,
                    });
                }
            }
            // Method bodies were queued by the shared method header.
            _ => {}
        }
        Ok(())
    }

    /// Replace a drafted declaration's line key
    fn rekey_draft(&mut self, decl: DeclId, key: LineKey) {
        if let Some(draft) = self.drafts.get_mut(&decl) {
            draft.line_key = key;
        }
    }

    /// Adding a required input attribute to a concrete inherited element
    fn new_input_check(
        &mut self,
        pipeline: DeclId,
        member: &ast::Item,
        member_id: DeclId,
        declared_ty: Option<TypeId>,
        tags: MemberTags,
    ) {
        if self.flavor(member_id) != MemberFlavor::Attribute || !tags.input || tags.optional {
            return;
        }
        let Some(ty) = declared_ty else { return };
        let Some(freq) = self.module.types.frequency(ty) else {
            return;
        };
        for line in self.member_view(pipeline) {
            let line_data = &self.module.lines[line];
            if line_data.flavor == MemberFlavor::Element
                && line_data.key == freq.line
                && line_data.mode == DeclMode::Inherited
                && line_data.concreteness == Concreteness::Final
            {
                let element = self.name_text(line_data.name);
                let attr = self.name_text(member.name.name);
                self.report(
                    ResolveError::NewInputOnConcreteElement { element, attr },
                    member.span,
                );
                return;
            }
        }
    }

    /// Whether a direct declaration can fill an inherited line
    ///
    /// Attributes need a compatible declared type; methods need an
    /// identical parameter and generic signature; everything else matches
    /// by name and flavor alone.
    fn signature_matches(&self, line: LineId, direct: DeclId) -> bool {
        let line_data = &self.module.lines[line];
        let Some(source) = line_data.inherited_sources.first() else {
            return false;
        };
        let inherited = self.decl_view(source.decl);
        let direct_decl = self.decl_view(direct);
        match (&inherited.kind, &direct_decl.kind) {
            (DeclKind::Attribute(a), DeclKind::Attribute(b)) => {
                let a_data = self.module.types.unqualified(a.ty);
                let b_data = self.module.types.unqualified(b.ty);
                self.types_equal(a_data, b_data)
            }
            (DeclKind::Method(a), DeclKind::Method(b)) => {
                a.generics.len() == b.generics.len()
                    && a.params.len() == b.params.len()
                    && a.params
                        .iter()
                        .zip(b.params.iter())
                        .all(|(left, right)| self.types_equal(left.ty, right.ty))
            }
            _ => true,
        }
    }

    // ---- member views ----------------------------------------------------

    /// All member lines of a pipeline, direct facet first, one per line key
    pub(crate) fn member_view(&self, pipeline: DeclId) -> Vec<LineId> {
        let Some((direct, facets)) = self.pipeline_facets.get(&pipeline) else {
            return Vec::new();
        };
        let mut seen: FxHashSet<LineKey> = FxHashSet::default();
        let mut out = Vec::new();
        for facet in std::iter::once(*direct).chain(facets.iter().copied()) {
            for line in self.module.facets[facet].member_lines() {
                if seen.insert(self.module.lines[line].key) {
                    out.push(line);
                }
            }
        }
        out
    }

    /// Member lines of one name, grouped by flavor, one line per key
    pub(crate) fn member_name_groups(
        &self,
        pipeline: DeclId,
        name: wf_intern::Symbol,
    ) -> Vec<(MemberFlavor, Vec<LineId>)> {
        let Some((direct, facets)) = self.pipeline_facets.get(&pipeline) else {
            return Vec::new();
        };
        let mut seen: FxHashSet<LineKey> = FxHashSet::default();
        let mut groups: Vec<(MemberFlavor, Vec<LineId>)> = Vec::new();
        for facet in std::iter::once(*direct).chain(facets.iter().copied()) {
            let Some(group) = self.module.facets[facet].group(name) else {
                continue;
            };
            for category in &group.categories {
                for &line in &category.lines {
                    if !seen.insert(self.module.lines[line].key) {
                        continue;
                    }
                    match groups
                        .iter_mut()
                        .find(|(flavor, _)| *flavor == category.flavor)
                    {
                        Some((_, lines)) => lines.push(line),
                        None => groups.push((category.flavor, vec![line])),
                    }
                }
            }
        }
        groups
    }

    /// Forward-reference fallback while a pipeline's members are declared
    pub(crate) fn pending_member_lookup(
        &self,
        pipeline: DeclId,
        name: wf_intern::Symbol,
    ) -> Option<&Vec<(DeclId, MemberFlavor)>> {
        self.pending_members.get(&pipeline)?.get(&name)
    }

    /// The member-group term for facet lookup
    pub(crate) fn member_group_term(
        &mut self,
        pipeline: DeclId,
        name: wf_intern::Symbol,
        object: Option<wf_sema::ExprId>,
    ) -> Result<Option<Term>, Ice> {
        let groups = self.member_name_groups(pipeline, name);
        let mut alts = Vec::new();
        for (flavor, lines) in groups {
            let mut members = Vec::new();
            for line in lines {
                let decl = self.line_reference_decl(line)?;
                members.push(wf_sema::MemberRef {
                    object,
                    line: Some(line),
                    decl,
                });
            }
            alts.push(Term::CategoryGroup { flavor, members });
        }
        if alts.is_empty() {
            if let Some(pending) = self.pending_member_lookup(pipeline, name) {
                for (decl, _) in pending.clone() {
                    alts.push(Term::Member(wf_sema::MemberRef {
                        object,
                        line: None,
                        decl,
                    }));
                }
            }
        }
        Ok(match alts.len() {
            0 => None,
            _ => Some(Term::overloaded(alts)),
        })
    }

    /// The declaration a reference to a line should use right now
    ///
    /// The direct declaration wins. An inherited declaration is synthesized
    /// (and memoized) only once its original is sealed; until then the
    /// original stands in, which is sound because only its signature is
    /// consulted before sealing.
    pub(crate) fn line_reference_decl(&mut self, line: LineId) -> Result<DeclId, Ice> {
        if let Some(direct) = self.module.lines[line].direct {
            return Ok(direct);
        }
        if let Some(&forced) = self.inherited_memo.get(&(line, 0)) {
            return Ok(forced);
        }
        let Some(source) = self.module.lines[line].inherited_sources.first().cloned() else {
            return Err(Ice::MissingEntry {
                what: format!("member line {line:?} has no contributions"),
            });
        };
        if self.module.try_decl(source.decl).is_some() {
            self.force_inherited(line, 0)
        } else {
            Ok(source.decl)
        }
    }
}

/// Merge two linearizations, right-hand copies winning
pub(crate) fn merge_linearizations(left: &[DeclId], right: &[DeclId]) -> Vec<DeclId> {
    let mut out: Vec<DeclId> = left
        .iter()
        .filter(|decl| !right.contains(decl))
        .copied()
        .collect();
    out.extend(right.iter().copied());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(raw: u32) -> DeclId {
        DeclId::from_raw(raw.into())
    }

    #[test]
    fn test_merge_right_position_wins() {
        let left = [decl(0), decl(1), decl(2)];
        let right = [decl(1), decl(3)];
        assert_eq!(
            merge_linearizations(&left, &right),
            vec![decl(0), decl(2), decl(1), decl(3)]
        );
    }

    #[test]
    fn test_merge_with_empty_right() {
        let left = [decl(4), decl(5)];
        assert_eq!(merge_linearizations(&left, &[]), vec![decl(4), decl(5)]);
    }
}
