//! Resolution driver
//!
//! One [`Resolver`] owns the module under construction and every piece of
//! per-resolution context: the scope tree, the diagnostic stream, the ambient
//! frequency, the conversion-score cell of the candidate being checked, and
//! the memo tables behind deferred declaration content. Resolution proceeds
//! in three passes over the parsed module: headers (declarations and their
//! signatures), bodies (initializers and method bodies), then finalization
//! (forcing every member line's effective declaration).

use crate::error::ResolveError;
use crate::scope::{ScopeKind, ScopeTree};
use rustc_hash::FxHashMap;
use wf_ast as ast;
use wf_diagnostics::Diagnostics;
use wf_intern::{Interner, Symbol};
use wf_memo::{MemoMap, Probe};
use wf_sema::{
    BuiltinOp, Decl, DeclBuilder, DeclId, DeclKind, DeclMode, ExprId, FacetId, FieldDecl, FreqRef,
    GenericParamDecl, GenericParamKind, Ice, LineId, MemberFlavor, MemberTags, MethodBody,
    MethodDecl, Module, Param, Renderer, ScopeId, Term, TypeId, TypeSlotDecl,
};
use wf_span::FileSpan;

/// Cost of getting an argument into a parameter's type
///
/// Per candidate, the maximum over all arguments is kept; candidates with the
/// globally minimal cost win selection.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConversionCost {
    /// No implicit conversion was needed
    None,
    /// At least one implicit conversion was applied
    Implicit,
}

/// A body whose resolution is deferred until every header is known
#[derive(Clone, Debug)]
pub(crate) enum PendingBody {
    /// Attribute initializer
    AttrInit {
        /// The attribute declaration
        decl: DeclId,
        /// Owning pipeline
        pipeline: DeclId,
        /// Scope the initializer resolves in
        scope: ScopeId,
        /// Unresolved initializer
        ast_expr: ast::ExprId,
        /// The attribute's member line
        line: LineId,
    },
    /// Struct field initializer
    FieldInit {
        /// The field declaration
        decl: DeclId,
        /// Scope the initializer resolves in
        scope: ScopeId,
        /// Unresolved initializer
        ast_expr: ast::ExprId,
    },
    /// Method body
    MethodBody {
        /// The method declaration
        decl: DeclId,
        /// Method scope with parameters bound
        scope: ScopeId,
        /// Owning pipeline, if a member
        pipeline: Option<DeclId>,
        /// Unresolved body
        ast_expr: ast::ExprId,
    },
}

/// The result of resolving one module
#[derive(Debug)]
pub struct Resolution {
    /// The resolved module
    pub module: Module,
    /// Everything reported along the way
    pub diagnostics: Diagnostics,
}

/// Resolve one parsed module
///
/// User errors never abort: they are accumulated in the returned diagnostics
/// while error sentinels keep the rest of the module resolving.
///
/// # Errors
///
/// Returns an [`Ice`] only for internal invariant violations; the module is
/// then unusable.
pub fn resolve_module(ast: &ast::SourceModule, interner: &Interner) -> Result<Resolution, Ice> {
    let mut resolver = Resolver::new(ast, interner);
    resolver.seed_builtins()?;
    resolver.declare_globals()?;
    resolver.build_pipelines()?;
    resolver.resolve_bodies()?;
    resolver.finalize()?;
    Ok(Resolution {
        module: resolver.module,
        diagnostics: resolver.diags,
    })
}

/// Resolution state for one module
pub struct Resolver<'a> {
    pub(crate) ast: &'a ast::SourceModule,
    pub(crate) interner: &'a Interner,
    pub(crate) module: Module,
    pub(crate) diags: Diagnostics,
    pub(crate) scopes: ScopeTree,
    /// Scope holding the user's top-level declarations
    pub(crate) module_scope: ScopeId,

    // Per-resolution context, saved and restored around nested work.
    pub(crate) current_scope: ScopeId,
    pub(crate) current_pipeline: Option<DeclId>,
    pub(crate) ambient_freq: Option<FreqRef>,
    pub(crate) disable_conversions: bool,
    pub(crate) base_attr: Option<(DeclId, TypeId)>,
    pub(crate) score: ConversionCost,

    // Header-phase bookkeeping.
    pub(crate) drafts: FxHashMap<DeclId, Decl>,
    pub(crate) flavors: FxHashMap<DeclId, MemberFlavor>,
    pub(crate) global_items: Vec<(DeclId, usize, usize)>,
    pub(crate) pipeline_memo: MemoMap<DeclId, ()>,
    pub(crate) built_order: Vec<DeclId>,
    pub(crate) pipeline_scopes: FxHashMap<DeclId, ScopeId>,
    pub(crate) pipeline_bases: FxHashMap<DeclId, Vec<wf_sema::BaseRef>>,
    pub(crate) pipeline_ancestors: FxHashMap<DeclId, Vec<DeclId>>,
    pub(crate) pipeline_facets: FxHashMap<DeclId, (FacetId, Vec<FacetId>)>,
    pub(crate) pending_members: FxHashMap<DeclId, FxHashMap<Symbol, Vec<(DeclId, MemberFlavor)>>>,
    pub(crate) pending_bodies: Vec<PendingBody>,
    pub(crate) inherited_memo: MemoMap<(LineId, usize), DeclId>,
    pub(crate) placeholders: Vec<crate::deduce::PlaceholderState>,
}

impl<'a> Resolver<'a> {
    /// Create a resolver over a parsed module
    pub fn new(ast: &'a ast::SourceModule, interner: &'a Interner) -> Self {
        let scopes = ScopeTree::new();
        let root = scopes.root;
        let mut resolver = Self {
            ast,
            interner,
            module: Module::new(),
            diags: Diagnostics::new(),
            scopes,
            module_scope: root,
            current_scope: root,
            current_pipeline: None,
            ambient_freq: None,
            disable_conversions: false,
            base_attr: None,
            score: ConversionCost::None,
            drafts: FxHashMap::default(),
            flavors: FxHashMap::default(),
            global_items: Vec::new(),
            pipeline_memo: MemoMap::new(),
            built_order: Vec::new(),
            pipeline_scopes: FxHashMap::default(),
            pipeline_bases: FxHashMap::default(),
            pipeline_ancestors: FxHashMap::default(),
            pipeline_facets: FxHashMap::default(),
            pending_members: FxHashMap::default(),
            pending_bodies: Vec::new(),
            inherited_memo: MemoMap::new(),
            placeholders: Vec::new(),
        };
        resolver.module_scope = resolver
            .scopes
            .create_child(resolver.scopes.root, ScopeKind::Module);
        resolver.current_scope = resolver.module_scope;
        resolver
    }

    // ---- context helpers -------------------------------------------------

    /// Report a user error at a location
    pub(crate) fn report(&mut self, error: ResolveError, span: FileSpan) {
        self.diags.push(error.into_diagnostic(span));
    }

    /// Read a declaration, sealed or still drafted
    ///
    /// # Panics
    ///
    /// Panics if the ID is neither sealed nor drafted; IDs only circulate
    /// after one of the two, so hitting this is a resolver bug.
    pub(crate) fn decl_view(&self, id: DeclId) -> &Decl {
        self.try_decl_view(id)
            .unwrap_or_else(|| panic!("declaration {id:?} is neither sealed nor drafted"))
    }

    /// Read a declaration if it already has content
    pub(crate) fn try_decl_view(&self, id: DeclId) -> Option<&Decl> {
        self.module.try_decl(id).or_else(|| self.drafts.get(&id))
    }

    /// The member flavor of a declaration
    ///
    /// Recorded at reservation time so headers can be classified before
    /// their payload exists; synthesized declarations (inherited copies,
    /// generic specializations) fall back to their sealed payload.
    pub(crate) fn flavor(&self, id: DeclId) -> MemberFlavor {
        self.flavors
            .get(&id)
            .copied()
            .unwrap_or_else(|| self.decl_view(id).flavor())
    }

    /// Reserve a declaration slot and record its flavor
    pub(crate) fn reserve(&mut self, flavor: MemberFlavor) -> DeclId {
        let id = self.module.reserve_decl();
        self.flavors.insert(id, flavor);
        id
    }

    /// Render a type for diagnostics
    pub(crate) fn render_ty(&self, ty: TypeId) -> String {
        Renderer::new(&self.module, self.interner).ty(ty)
    }

    /// Render a term for diagnostics
    pub(crate) fn render_term(&self, term: &Term) -> String {
        Renderer::new(&self.module, self.interner).term(term)
    }

    /// Render a declaration signature for diagnostics
    pub(crate) fn render_signature(&self, decl: DeclId) -> String {
        match self.module.try_decl(decl).or_else(|| self.drafts.get(&decl)) {
            Some(_) => Renderer::new(&self.module, self.interner).decl_signature(decl),
            // Drafted declarations render through the module arena only once
            // sealed; fall back to the bare name.
            None => "<declaration>".to_string(),
        }
    }

    /// Resolve an interned symbol to its text
    pub(crate) fn name_text(&self, name: Symbol) -> String {
        self.interner.resolve(&name)
    }

    /// The name of a declaration, usable even mid-build
    pub(crate) fn decl_name(&self, id: DeclId) -> String {
        match self.module.try_decl(id).or_else(|| self.drafts.get(&id)) {
            Some(decl) => self.name_text(decl.name),
            None => "<declaration>".to_string(),
        }
    }

    /// Run `f` with a different current scope
    pub(crate) fn in_scope<T>(&mut self, scope: ScopeId, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = std::mem::replace(&mut self.current_scope, scope);
        let out = f(self);
        self.current_scope = saved;
        out
    }

    /// Run `f` with a fresh conversion-score cell, returning its final value
    pub(crate) fn with_fresh_score<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> T,
    ) -> (T, ConversionCost) {
        let saved = std::mem::replace(&mut self.score, ConversionCost::None);
        let out = f(self);
        (out, std::mem::replace(&mut self.score, saved))
    }

    /// Run `f` with implicit conversions disabled (generic-argument mode)
    pub(crate) fn without_conversions<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = std::mem::replace(&mut self.disable_conversions, true);
        let out = f(self);
        self.disable_conversions = saved;
        out
    }

    /// Run `f` with an ambient implicit frequency installed
    pub(crate) fn with_ambient_freq<T>(
        &mut self,
        freq: Option<FreqRef>,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        let saved = std::mem::replace(&mut self.ambient_freq, freq);
        let out = f(self);
        self.ambient_freq = saved;
        out
    }

    /// Run `f` with a pipeline context installed
    pub(crate) fn in_pipeline<T>(
        &mut self,
        pipeline: Option<DeclId>,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        let saved = std::mem::replace(&mut self.current_pipeline, pipeline);
        let out = f(self);
        self.current_pipeline = saved;
        out
    }

    /// Run `f` with a `base` attribute target installed
    pub(crate) fn with_base_attr<T>(
        &mut self,
        base: Option<(DeclId, TypeId)>,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        let saved = std::mem::replace(&mut self.base_attr, base);
        let out = f(self);
        self.base_attr = saved;
        out
    }

    // ---- builtins --------------------------------------------------------

    /// Pre-populate the root scope with the builtin type table and the
    /// builtin operations
    pub(crate) fn seed_builtins(&mut self) -> Result<(), Ice> {
        let root = self.scopes.root;

        let bool_ty = self.module.types.bool();
        let int_ty = self.module.types.int();
        let float_ty = self.module.types.float();

        for (name, ty) in [("bool", bool_ty), ("int", int_ty), ("float", float_ty)] {
            let symbol = self.interner.intern(name);
            let id = self.reserve(MemberFlavor::TypeSlot);
            let key = self.module.fresh_line_key();
            DeclBuilder::new(symbol, FileSpan::synthesized(), key)
                .kind(DeclKind::TypeSlot(TypeSlotDecl { bound: Some(ty) }))
                .seal(&mut self.module, id)?;
            self.scopes.define_decl(root, symbol, id);
        }

        use BuiltinOp::*;
        let arithmetic: [(&str, BuiltinOp); 4] =
            [("+", Add), ("-", Sub), ("*", Mul), ("/", Div)];
        for (name, op) in arithmetic {
            self.builtin_method(name, op, &[int_ty, int_ty], int_ty)?;
            self.builtin_method(name, op, &[float_ty, float_ty], float_ty)?;
        }
        self.builtin_method("-", Neg, &[int_ty], int_ty)?;
        self.builtin_method("-", Neg, &[float_ty], float_ty)?;

        let comparisons: [(&str, BuiltinOp); 6] = [
            ("==", Eq),
            ("!=", Ne),
            ("<", Lt),
            ("<=", Le),
            (">", Gt),
            (">=", Ge),
        ];
        for (name, op) in comparisons {
            self.builtin_method(name, op, &[int_ty, int_ty], bool_ty)?;
            self.builtin_method(name, op, &[float_ty, float_ty], bool_ty)?;
        }
        self.builtin_method("==", Eq, &[bool_ty, bool_ty], bool_ty)?;
        self.builtin_method("!=", Ne, &[bool_ty, bool_ty], bool_ty)?;

        self.builtin_method("&&", And, &[bool_ty, bool_ty], bool_ty)?;
        self.builtin_method("||", Or, &[bool_ty, bool_ty], bool_ty)?;
        self.builtin_method("!", Not, &[bool_ty], bool_ty)?;

        // The literal-constructor method doubles as the widening conversion
        // edge `int -> float` for the implicit-conversion search.
        self.builtin_method("float", IntToFloat, &[int_ty], float_ty)?;

        Ok(())
    }

    fn builtin_method(
        &mut self,
        name: &str,
        op: BuiltinOp,
        params: &[TypeId],
        result: TypeId,
    ) -> Result<DeclId, Ice> {
        let symbol = self.interner.intern(name);
        let id = self.reserve(MemberFlavor::Method);
        let param_names = ["a", "b", "c"];
        let params = params
            .iter()
            .enumerate()
            .map(|(index, ty)| {
                let param_symbol = self.interner.intern(param_names[index]);
                let param_key = self.module.fresh_line_key();
                let param_id = self.reserve(MemberFlavor::Field);
                DeclBuilder::new(param_symbol, FileSpan::synthesized(), param_key)
                    .kind(DeclKind::Field(FieldDecl { ty: *ty, init: None }))
                    .seal(&mut self.module, param_id)?;
                Ok(Param {
                    name: param_symbol,
                    ty: *ty,
                    span: FileSpan::synthesized(),
                    optional: false,
                    decl: param_id,
                })
            })
            .collect::<Result<Vec<_>, Ice>>()?;
        let key = self.module.fresh_line_key();
        DeclBuilder::new(symbol, FileSpan::synthesized(), key)
            .kind(DeclKind::Method(MethodDecl {
                generics: Vec::new(),
                params,
                result,
                body: MethodBody::Builtin(op),
            }))
            .seal(&mut self.module, id)?;
        self.scopes.define_decl(self.scopes.root, symbol, id);
        Ok(id)
    }

    // ---- global declaration pass ----------------------------------------

    /// Reserve and bind every top-level declaration, then resolve the
    /// headers of everything except pipelines (which `build_pipelines`
    /// drives separately, in inheritance order)
    pub(crate) fn declare_globals(&mut self) -> Result<(), Ice> {
        for (file_index, file) in self.ast.files.iter().enumerate() {
            for (item_index, item) in file.items.iter().enumerate() {
                let flavor = match &item.kind {
                    ast::ItemKind::Pipeline(_) => MemberFlavor::Pipeline,
                    ast::ItemKind::Struct(_) => MemberFlavor::Struct,
                    ast::ItemKind::Concept(_) => MemberFlavor::Concept,
                    ast::ItemKind::Method(_) => MemberFlavor::Method,
                    ast::ItemKind::TypeSlot(_) => MemberFlavor::TypeSlot,
                    ast::ItemKind::Field(_) => MemberFlavor::Field,
                    ast::ItemKind::Attribute(_) | ast::ItemKind::Element(_) => {
                        self.report(
                            ResolveError::MisplacedItem {
                                name: self.name_text(item.name.name),
                            },
                            item.span,
                        );
                        continue;
                    }
                };
                let id = self.reserve(flavor);
                self.scopes.define_decl(self.module_scope, item.name.name, id);
                self.global_items.push((id, file_index, item_index));
                self.module.globals.push(id);
            }
        }

        let ast = self.ast;
        for (id, file_index, item_index) in self.global_items.clone() {
            let item = &ast.files[file_index].items[item_index];
            match &item.kind {
                ast::ItemKind::Pipeline(_) => {}
                _ => self.global_header(id, item)?,
            }
        }
        Ok(())
    }

    /// Resolve the header of one non-pipeline global declaration
    fn global_header(&mut self, id: DeclId, item: &ast::Item) -> Result<(), Ice> {
        let key = self.module.fresh_line_key();
        match &item.kind {
            ast::ItemKind::Struct(struct_item) => {
                let mut fields = Vec::new();
                for field_item in &struct_item.fields {
                    let ast::ItemKind::Field(field) = &field_item.kind else {
                        self.report(
                            ResolveError::MisplacedItem {
                                name: self.name_text(field_item.name.name),
                            },
                            field_item.span,
                        );
                        continue;
                    };
                    let field_id = self.reserve(MemberFlavor::Field);
                    let field_key = self.module.fresh_line_key();
                    let ty = self.resolve_type_term(field.ty)?;
                    self.drafts.insert(
                        field_id,
                        DeclBuilder::new(field_item.name.name, field_item.span, field_key)
                            .kind(DeclKind::Field(FieldDecl { ty, init: None }))
                            .build_draft()?,
                    );
                    if let Some(init) = field.init {
                        self.pending_bodies.push(PendingBody::FieldInit {
                            decl: field_id,
                            scope: self.module_scope,
                            ast_expr: init,
                        });
                    }
                    fields.push(field_id);
                }
                self.drafts.insert(
                    id,
                    DeclBuilder::new(item.name.name, item.span, key)
                        .kind(DeclKind::Struct(wf_sema::StructDecl { fields }))
                        .build_draft()?,
                );
            }
            ast::ItemKind::Concept(concept_item) => {
                let mut members = Vec::new();
                for member in &concept_item.members {
                    let ast::ItemKind::Method(method_item) = &member.kind else {
                        self.report(
                            ResolveError::MisplacedItem {
                                name: self.name_text(member.name.name),
                            },
                            member.span,
                        );
                        continue;
                    };
                    let member_id = self.reserve(MemberFlavor::Method);
                    self.method_header(member_id, member, method_item, self.module_scope, None)?;
                    members.push(member_id);
                }
                self.drafts.insert(
                    id,
                    DeclBuilder::new(item.name.name, item.span, key)
                        .kind(DeclKind::Concept(wf_sema::ConceptDecl { members }))
                        .build_draft()?,
                );
            }
            ast::ItemKind::TypeSlot(slot_item) => {
                let bound = match slot_item.bound {
                    Some(bound) => Some(self.resolve_type_term(bound)?),
                    None => None,
                };
                DeclBuilder::new(item.name.name, item.span, key)
                    .kind(DeclKind::TypeSlot(TypeSlotDecl { bound }))
                    .seal(&mut self.module, id)?;
            }
            ast::ItemKind::Method(method_item) => {
                self.method_header(id, item, method_item, self.module_scope, None)?;
            }
            ast::ItemKind::Field(field_item) => {
                let ty = self.resolve_type_term(field_item.ty)?;
                self.drafts.insert(
                    id,
                    DeclBuilder::new(item.name.name, item.span, key)
                        .kind(DeclKind::Field(FieldDecl { ty, init: None }))
                        .build_draft()?,
                );
                if let Some(init) = field_item.init {
                    self.pending_bodies.push(PendingBody::FieldInit {
                        decl: id,
                        scope: self.module_scope,
                        ast_expr: init,
                    });
                }
            }
            ast::ItemKind::Pipeline(_) | ast::ItemKind::Attribute(_) | ast::ItemKind::Element(_) => {}
        }
        Ok(())
    }

    /// Resolve a method's signature into a draft and queue its body
    ///
    /// Shared by global methods, pipeline member methods and concept member
    /// signatures. Generic parameter names are bound before any of their
    /// bounds resolve, so bounds may reference sibling parameters.
    pub(crate) fn method_header(
        &mut self,
        id: DeclId,
        item: &ast::Item,
        method_item: &ast::MethodItem,
        parent_scope: ScopeId,
        pipeline: Option<DeclId>,
    ) -> Result<(), Ice> {
        let key = self.module.fresh_line_key();
        let method_scope = self.scopes.create_child(parent_scope, ScopeKind::Method);

        // Bind every generic parameter name first.
        let mut generic_ids = Vec::new();
        for generic in &method_item.generics {
            let generic_id = self.reserve(MemberFlavor::GenericParam);
            self.scopes
                .define_decl(method_scope, generic.name.name, generic_id);
            generic_ids.push(generic_id);
        }
        for (generic, generic_id) in method_item.generics.iter().zip(generic_ids.iter()) {
            let generic_key = self.module.fresh_line_key();
            let kind = match &generic.kind {
                ast::GenericParamItemKind::Type { upper } => {
                    let upper = match upper {
                        Some(upper) => {
                            Some(self.in_scope(method_scope, |this| this.resolve_type_term(*upper))?)
                        }
                        None => None,
                    };
                    GenericParamKind::Type { upper }
                }
                ast::GenericParamItemKind::Value { ty } => {
                    let ty = self.in_scope(method_scope, |this| this.resolve_type_term(*ty))?;
                    GenericParamKind::Value { ty }
                }
            };
            let tags = MemberTags {
                implicit: generic.modifiers.has(ast::Modifier::Implicit),
                ..MemberTags::default()
            };
            DeclBuilder::new(generic.name.name, generic.name.span, generic_key)
                .tags(tags)
                .kind(DeclKind::GenericParam(GenericParamDecl { kind }))
                .seal(&mut self.module, *generic_id)?;
        }

        let mut params = Vec::new();
        for param_item in &method_item.params {
            let ty = self.in_scope(method_scope, |this| this.resolve_type_term(param_item.ty))?;
            let param_id = self.reserve(MemberFlavor::Field);
            let param_key = self.module.fresh_line_key();
            DeclBuilder::new(param_item.name.name, param_item.span, param_key)
                .kind(DeclKind::Field(FieldDecl { ty, init: None }))
                .seal(&mut self.module, param_id)?;
            if !self
                .scopes
                .define_value(method_scope, param_item.name.name, param_id)
            {
                self.report(
                    ResolveError::DuplicateDefinition {
                        name: self.name_text(param_item.name.name),
                    },
                    param_item.span,
                );
            }
            params.push(Param {
                name: param_item.name.name,
                ty,
                span: param_item.span,
                optional: param_item.modifiers.has(ast::Modifier::Optional),
                decl: param_id,
            });
        }

        let result = match method_item.result {
            Some(result) => self.in_scope(method_scope, |this| this.resolve_type_term(result))?,
            None => self.module.types.error(),
        };

        let concreteness = concreteness_of(&item.modifiers);
        self.drafts.insert(
            id,
            DeclBuilder::new(item.name.name, item.span, key)
                .concreteness(concreteness)
                .tags(tags_of(&item.modifiers))
                .kind(DeclKind::Method(MethodDecl {
                    generics: generic_ids,
                    params,
                    result,
                    body: MethodBody::None,
                }))
                .build_draft()?,
        );

        if let Some(body) = method_item.body {
            self.pending_bodies.push(PendingBody::MethodBody {
                decl: id,
                scope: method_scope,
                pipeline,
                ast_expr: body,
            });
        }
        Ok(())
    }

    /// Drive every pipeline to fully built, ancestors first
    pub(crate) fn build_pipelines(&mut self) -> Result<(), Ice> {
        let ast = self.ast;
        for (id, file_index, item_index) in self.global_items.clone() {
            let item = &ast.files[file_index].items[item_index];
            if matches!(item.kind, ast::ItemKind::Pipeline(_)) {
                self.ensure_pipeline(id, file_index, item_index)?;
            }
        }
        Ok(())
    }

    // ---- body pass -------------------------------------------------------

    /// Resolve every deferred body and seal the drafts
    ///
    /// Drafts with nothing to wait for seal first, so inherited-declaration
    /// synthesis (forced by `base` expressions while bodies resolve) always
    /// finds its original sealed. Bodies were queued ancestors-first, so an
    /// override's original initializer is sealed before the override needs
    /// it.
    pub(crate) fn resolve_bodies(&mut self) -> Result<(), Ice> {
        let pending = std::mem::take(&mut self.pending_bodies);
        let waiting: rustc_hash::FxHashSet<DeclId> = pending
            .iter()
            .map(|body| match body {
                PendingBody::AttrInit { decl, .. }
                | PendingBody::FieldInit { decl, .. }
                | PendingBody::MethodBody { decl, .. } => *decl,
            })
            .collect();
        let bodiless: Vec<DeclId> = self
            .drafts
            .keys()
            .filter(|id| !waiting.contains(id))
            .copied()
            .collect();
        for id in bodiless {
            self.seal_draft(id)?;
        }

        for body in pending {
            match body {
                PendingBody::AttrInit {
                    decl,
                    pipeline,
                    scope,
                    ast_expr,
                    line,
                } => self.resolve_attr_init(decl, pipeline, scope, ast_expr, line)?,
                PendingBody::FieldInit {
                    decl,
                    scope,
                    ast_expr,
                } => self.resolve_field_init(decl, scope, ast_expr)?,
                PendingBody::MethodBody {
                    decl,
                    scope,
                    pipeline,
                    ast_expr,
                } => self.resolve_method_body(decl, scope, pipeline, ast_expr)?,
            }
        }

        // Seal everything that had no body to wait for.
        let remaining: Vec<DeclId> = self.drafts.keys().copied().collect();
        for id in remaining {
            self.seal_draft(id)?;
        }
        Ok(())
    }

    fn resolve_attr_init(
        &mut self,
        decl: DeclId,
        pipeline: DeclId,
        scope: ScopeId,
        ast_expr: ast::ExprId,
        line: LineId,
    ) -> Result<(), Ice> {
        let attr_ty = match &self.decl_view(decl).kind {
            DeclKind::Attribute(attr) => attr.ty,
            _ => self.module.types.error(),
        };
        let ambient = self.module.types.frequency(attr_ty);

        // An override makes the inherited definition reachable as `base`.
        let base = if self.module.lines[line].direct == Some(decl)
            && !self.module.lines[line].inherited_sources.is_empty()
        {
            let inherited = self.force_inherited(line, 0)?;
            let ty = match &self.module.decl(inherited).kind {
                DeclKind::Attribute(attr) => attr.ty,
                _ => self.module.types.error(),
            };
            Some((inherited, ty))
        } else {
            None
        };

        let init = self.in_pipeline(Some(pipeline), |this| {
            this.in_scope(scope, |this| {
                this.with_ambient_freq(ambient, |this| {
                    this.with_base_attr(base, |this| -> Result<ExprId, Ice> {
                        let init = this.resolve_expr(ast_expr)?;
                        this.coerce_or_report(init, attr_ty)
                    })
                })
            })
        })?;

        if let Some(draft) = self.drafts.get_mut(&decl) {
            if let DeclKind::Attribute(attr) = &mut draft.kind {
                attr.init = Some(init);
            }
        }
        self.seal_draft(decl)
    }

    fn resolve_field_init(
        &mut self,
        decl: DeclId,
        scope: ScopeId,
        ast_expr: ast::ExprId,
    ) -> Result<(), Ice> {
        let field_ty = match &self.decl_view(decl).kind {
            DeclKind::Field(field) => field.ty,
            _ => self.module.types.error(),
        };
        let init = self.in_scope(scope, |this| -> Result<ExprId, Ice> {
            let init = this.resolve_expr(ast_expr)?;
            this.coerce_or_report(init, field_ty)
        })?;
        if let Some(draft) = self.drafts.get_mut(&decl) {
            if let DeclKind::Field(field) = &mut draft.kind {
                field.init = Some(init);
            }
        }
        self.seal_draft(decl)
    }

    fn resolve_method_body(
        &mut self,
        decl: DeclId,
        scope: ScopeId,
        pipeline: Option<DeclId>,
        ast_expr: ast::ExprId,
    ) -> Result<(), Ice> {
        let result_ty = match &self.decl_view(decl).kind {
            DeclKind::Method(method) => method.result,
            _ => self.module.types.error(),
        };
        let body = self.in_pipeline(pipeline, |this| {
            this.in_scope(scope, |this| -> Result<ExprId, Ice> {
                let body = this.resolve_expr(ast_expr)?;
                this.coerce_or_report(body, result_ty)
            })
        })?;
        if let Some(draft) = self.drafts.get_mut(&decl) {
            if let DeclKind::Method(method) = &mut draft.kind {
                method.body = MethodBody::Expr(body);
            }
        }
        self.seal_draft(decl)
    }

    /// Move a draft into its reserved arena slot
    pub(crate) fn seal_draft(&mut self, id: DeclId) -> Result<(), Ice> {
        match self.drafts.remove(&id) {
            Some(decl) => self.module.fill_decl(id, decl),
            None => Ok(()),
        }
    }

    // ---- finalization ----------------------------------------------------

    /// Force every member line's inherited declarations so the downstream
    /// consumer sees fully evaluated effective declarations
    pub(crate) fn finalize(&mut self) -> Result<(), Ice> {
        for pipeline in self.built_order.clone() {
            // Every facet's lines, shadowed ancestor lines included: the
            // downstream consumer walks all facets and expects each line's
            // effective declaration to be fully evaluated.
            let Some((direct, facets)) = self.pipeline_facets.get(&pipeline).cloned() else {
                continue;
            };
            for facet in std::iter::once(direct).chain(facets) {
                let lines: Vec<LineId> = self.module.facets[facet].member_lines().collect();
                for line in lines {
                    self.effective_decl(line)?;
                    let source_count = self.module.lines[line].inherited_sources.len();
                    for index in 0..source_count {
                        self.force_inherited(line, index)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Force one inherited declaration of a member line
    ///
    /// The recipe (original declaration + substitution) was stored at merge
    /// time; the synthesis runs at most once and re-entry is a cycle.
    pub(crate) fn force_inherited(&mut self, line: LineId, index: usize) -> Result<DeclId, Ice> {
        match self.inherited_memo.probe((line, index))? {
            Probe::Done => {
                let id = self
                    .inherited_memo
                    .get(&(line, index))
                    .copied()
                    .ok_or_else(|| Ice::MissingEntry {
                        what: format!("inherited declaration for {line:?}#{index}"),
                    })?;
                Ok(id)
            }
            Probe::Started => {
                let source = self.module.lines[line]
                    .inherited_sources
                    .get(index)
                    .cloned()
                    .ok_or_else(|| Ice::MissingEntry {
                        what: format!("inherited source {index} of {line:?}"),
                    })?;
                let synthesized =
                    source
                        .subst
                        .apply_decl(&mut self.module, source.decl, DeclMode::Inherited)?;
                self.inherited_memo.fulfil((line, index), synthesized);
                let slots = &mut self.module.lines[line].inherited;
                if slots.len() <= index {
                    slots.resize(index + 1, None);
                }
                slots[index] = Some(synthesized);
                Ok(synthesized)
            }
        }
    }

    /// The effective declaration of a member line, forcing it if needed
    pub(crate) fn effective_decl(&mut self, line: LineId) -> Result<DeclId, Ice> {
        if let Some(direct) = self.module.lines[line].direct {
            return Ok(direct);
        }
        if self.module.lines[line].inherited_sources.is_empty() {
            return Err(Ice::MissingEntry {
                what: format!("member line {line:?} has no contributions"),
            });
        }
        self.force_inherited(line, 0)
    }
}

/// Map declaration modifiers to a concreteness mode
pub(crate) fn concreteness_of(modifiers: &ast::Modifiers) -> wf_sema::Concreteness {
    if modifiers.has(ast::Modifier::Abstract) {
        wf_sema::Concreteness::Abstract
    } else if modifiers.has(ast::Modifier::Final) {
        wf_sema::Concreteness::Final
    } else {
        wf_sema::Concreteness::Virtual
    }
}

/// Map declaration modifiers to member tags
pub(crate) fn tags_of(modifiers: &ast::Modifiers) -> wf_sema::MemberTags {
    wf_sema::MemberTags {
        input: modifiers.has(ast::Modifier::Input),
        output: modifiers.has(ast::Modifier::Output),
        optional: modifiers.has(ast::Modifier::Optional),
        implicit: modifiers.has(ast::Modifier::Implicit),
    }
}

