//! Test support for end-to-end resolution scenarios
//!
//! There is no parser in this repository, so scenarios construct their
//! source module programmatically through [`TestModule`] and assert on the
//! resolved module and the diagnostic stream.

use wf_ast::{
    Arg, AttributeItem, BaseItem, BaseKind, ElementItem, ExprId, ExprKind, FieldItem, Ident, Item,
    ItemKind, MethodItem, Modifier, Modifiers, ParamItem, PipelineItem, SourceFile, SourceModule,
    Stmt, StmtId, TermId, TermKind,
};
use wf_diagnostics::Diagnostic;
use wf_intern::Interner;
use wf_resolve::{resolve_module, Resolution};
use wf_sema::{DeclId, DeclKind, LineId, PipelineDecl};
use wf_span::{FileId, FileSpan, Span};

/// Builder for one-file source modules
pub struct TestModule {
    /// Interner shared with resolution
    pub interner: Interner,
    /// The module under construction
    pub ast: SourceModule,
    next_offset: u32,
}

impl TestModule {
    /// Start an empty one-file module
    pub fn new() -> Self {
        let mut ast = SourceModule::new();
        ast.files.push(SourceFile::default());
        Self {
            interner: Interner::new(),
            ast,
            next_offset: 0,
        }
    }

    /// A fresh, distinct source span
    pub fn sp(&mut self) -> FileSpan {
        let start = self.next_offset;
        self.next_offset += 4;
        FileSpan::new(FileId(0), Span::new(start, start + 3))
    }

    /// An identifier at a fresh span
    pub fn ident(&mut self, name: &str) -> Ident {
        let span = self.sp();
        Ident {
            name: self.interner.intern(name),
            span,
        }
    }

    /// A name term
    pub fn name_term(&mut self, name: &str) -> TermId {
        let ident = self.ident(name);
        self.ast.term(TermKind::Name(ident), ident.span)
    }

    /// A name in expression position
    pub fn name_expr(&mut self, name: &str) -> ExprId {
        let term = self.name_term(name);
        let span = self.ast.terms[term].span;
        self.ast.expr(ExprKind::Term(term), span)
    }

    /// An integer literal expression
    pub fn int_lit(&mut self, value: i64) -> ExprId {
        let span = self.sp();
        self.ast.term_expr(TermKind::IntLit(value), span)
    }

    /// A float literal expression
    pub fn float_lit(&mut self, value: f64) -> ExprId {
        let span = self.sp();
        self.ast.term_expr(TermKind::FloatLit(value), span)
    }

    /// A positional argument
    pub fn arg(&mut self, value: ExprId) -> Arg {
        Arg {
            name: None,
            value,
            span: self.sp(),
        }
    }

    /// A keyword argument
    pub fn named_arg(&mut self, name: &str, value: ExprId) -> Arg {
        let ident = self.ident(name);
        Arg {
            name: Some(ident),
            value,
            span: ident.span,
        }
    }

    /// A call `callee(args…)` in expression position
    pub fn call(&mut self, callee: &str, args: Vec<Arg>) -> ExprId {
        let callee = self.name_term(callee);
        let span = self.sp();
        let term = self.ast.term(TermKind::Apply { callee, args }, span);
        self.ast.expr(ExprKind::Term(term), span)
    }

    /// A binary operation through the builtin operator methods
    pub fn binary(&mut self, op: &str, left: ExprId, right: ExprId) -> ExprId {
        let left = self.arg(left);
        let right = self.arg(right);
        self.call(op, vec![left, right])
    }

    /// A frequency-qualified type term `@freq data`
    pub fn freq_ty(&mut self, freq: &str, data: &str) -> TermId {
        let freq = self.name_term(freq);
        let data = self.name_term(data);
        let span = self.sp();
        self.ast.term(TermKind::FreqQual { freq, data }, span)
    }

    /// A modifier set
    pub fn mods(&mut self, modifiers: &[Modifier]) -> Modifiers {
        let mut set = Modifiers::new();
        for modifier in modifiers {
            let span = self.sp();
            set.add(*modifier, span);
        }
        set
    }

    /// A `let` statement
    pub fn let_stmt(&mut self, name: &str, init: ExprId) -> StmtId {
        let ident = self.ident(name);
        self.ast.stmt(Stmt::Let {
            name: ident,
            ty: None,
            init,
            span: ident.span,
        })
    }

    /// A block expression
    pub fn block(&mut self, stmts: Vec<StmtId>, result: Option<ExprId>) -> ExprId {
        let span = self.sp();
        self.ast.expr(ExprKind::Block { stmts, result }, span)
    }

    /// An attribute member
    pub fn attribute(
        &mut self,
        name: &str,
        freq: Option<&str>,
        ty: &str,
        init: Option<ExprId>,
        modifiers: &[Modifier],
    ) -> Item {
        let ident = self.ident(name);
        let freq = freq.map(|freq| self.name_term(freq));
        let ty = self.name_term(ty);
        let modifiers = self.mods(modifiers);
        Item {
            name: ident,
            modifiers,
            span: ident.span,
            kind: ItemKind::Attribute(AttributeItem { freq, ty, init }),
        }
    }

    /// A field member or global
    pub fn field(
        &mut self,
        name: &str,
        ty: &str,
        init: Option<ExprId>,
        modifiers: &[Modifier],
    ) -> Item {
        let ident = self.ident(name);
        let ty = self.name_term(ty);
        let modifiers = self.mods(modifiers);
        Item {
            name: ident,
            modifiers,
            span: ident.span,
            kind: ItemKind::Field(FieldItem { ty, init }),
        }
    }

    /// An element member
    pub fn element(&mut self, name: &str, modifiers: &[Modifier]) -> Item {
        let ident = self.ident(name);
        let modifiers = self.mods(modifiers);
        Item {
            name: ident,
            modifiers,
            span: ident.span,
            kind: ItemKind::Element(ElementItem {}),
        }
    }

    /// A method with named parameters, a result type term, optional body
    pub fn method(
        &mut self,
        name: &str,
        params: &[(&str, TermId)],
        result: TermId,
        body: Option<ExprId>,
        modifiers: &[Modifier],
    ) -> Item {
        let ident = self.ident(name);
        let params = params
            .iter()
            .map(|(param_name, ty)| {
                let param_ident = self.ident(param_name);
                ParamItem {
                    name: param_ident,
                    ty: *ty,
                    modifiers: Modifiers::new(),
                    span: param_ident.span,
                }
            })
            .collect();
        let modifiers = self.mods(modifiers);
        Item {
            name: ident,
            modifiers,
            span: ident.span,
            kind: ItemKind::Method(MethodItem {
                generics: Vec::new(),
                params,
                result: Some(result),
                body,
            }),
        }
    }

    /// A pipeline with bases and members
    pub fn pipeline(
        &mut self,
        name: &str,
        bases: &[(&str, BaseKind)],
        members: Vec<Item>,
        modifiers: &[Modifier],
    ) -> Item {
        let ident = self.ident(name);
        let bases = bases
            .iter()
            .map(|(base, kind)| {
                let term = self.name_term(base);
                let span = self.ast.terms[term].span;
                BaseItem {
                    term,
                    kind: *kind,
                    span,
                }
            })
            .collect();
        let modifiers = self.mods(modifiers);
        Item {
            name: ident,
            modifiers,
            span: ident.span,
            kind: ItemKind::Pipeline(PipelineItem { bases, members }),
        }
    }

    /// Add a top-level item
    pub fn push(&mut self, item: Item) {
        self.ast.files[0].items.push(item);
    }

    /// Run resolution
    ///
    /// # Panics
    ///
    /// Panics if resolution hits an internal invariant violation; scenarios
    /// only exercise user-level behavior.
    pub fn resolve(&self) -> Resolution {
        resolve_module(&self.ast, &self.interner).expect("internal error during resolution")
    }
}

impl Default for TestModule {
    fn default() -> Self {
        Self::new()
    }
}

/// Find a global declaration by name
pub fn global_named(resolution: &Resolution, interner: &Interner, name: &str) -> Option<DeclId> {
    let symbol = interner.intern(name);
    resolution
        .module
        .globals
        .iter()
        .copied()
        .find(|&decl| resolution.module.decl(decl).name == symbol)
}

/// The pipeline payload of a global declaration
pub fn pipeline_decl<'m>(resolution: &'m Resolution, decl: DeclId) -> &'m PipelineDecl {
    match &resolution.module.decl(decl).kind {
        DeclKind::Pipeline(pipeline) => pipeline,
        other => panic!("expected a pipeline, found {other:?}"),
    }
}

/// Member lines of a pipeline, direct facet first, one per line key
pub fn member_lines(resolution: &Resolution, decl: DeclId) -> Vec<LineId> {
    let pipeline = pipeline_decl(resolution, decl);
    let mut seen = Vec::new();
    let mut out = Vec::new();
    for facet in std::iter::once(pipeline.direct_facet).chain(pipeline.facets.iter().copied()) {
        for line in resolution.module.facets[facet].member_lines() {
            let key = resolution.module.lines[line].key;
            if !seen.contains(&key) {
                seen.push(key);
                out.push(line);
            }
        }
    }
    out
}

/// A pipeline's member line by name
pub fn line_named(
    resolution: &Resolution,
    interner: &Interner,
    decl: DeclId,
    name: &str,
) -> Option<LineId> {
    let symbol = interner.intern(name);
    member_lines(resolution, decl)
        .into_iter()
        .find(|&line| resolution.module.lines[line].name == symbol)
}

/// Diagnostics carrying a specific code
pub fn with_code<'d>(resolution: &'d Resolution, code: &str) -> Vec<&'d Diagnostic> {
    resolution
        .diagnostics
        .all()
        .iter()
        .filter(|diag| diag.code.as_deref() == Some(code))
        .collect()
}
