//! Abstract syntax consumed by resolution
//!
//! The parser (outside this repository) produces one `SourceModule` per
//! compilation: an ordered collection of per-file declaration lists plus
//! arena-allocated term, expression and statement trees. Terms are the
//! reference-level trees used both for types and for callees; expressions
//! embed terms and add control flow; statements form method bodies.

use wf_arena::{Arena, Idx};
use wf_intern::Symbol;
use wf_span::FileSpan;

/// AST node IDs
pub type TermId = Idx<Term>;
/// Expression node ID
pub type ExprId = Idx<Expr>;
/// Statement node ID
pub type StmtId = Idx<Stmt>;

/// An identifier with its source location
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Ident {
    /// Interned name
    pub name: Symbol,
    /// Source location
    pub span: FileSpan,
}

/// Declaration modifiers as written in source
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum Modifier {
    /// Member has no definition here; derived pipelines must provide one
    Abstract,
    /// Member may be overridden
    Virtual,
    /// Member may not be overridden further
    Final,
    /// Member replaces an inherited member line
    Override,
    /// Member opens a fresh line, hiding any inherited one
    New,
    /// Attribute is supplied by the pipeline's caller
    Input,
    /// Attribute is part of the pipeline's result
    Output,
    /// Attribute/parameter may be left unfilled
    Optional,
    /// Value participates in implicit argument search
    Implicit,
    /// Element is complete; no further required inputs may be added
    Concrete,
    /// Base is the primary (subtyping) base
    Primary,
    /// Base is mixed in
    Mixin,
}

/// The modifier set attached to one declaration
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    items: Vec<(Modifier, FileSpan)>,
}

impl Modifiers {
    /// Create an empty modifier set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one modifier occurrence
    pub fn add(&mut self, modifier: Modifier, span: FileSpan) {
        self.items.push((modifier, span));
    }

    /// Builder-style `add`
    pub fn with(mut self, modifier: Modifier, span: FileSpan) -> Self {
        self.add(modifier, span);
        self
    }

    /// Whether the modifier is present
    pub fn has(&self, modifier: Modifier) -> bool {
        self.items.iter().any(|(m, _)| *m == modifier)
    }

    /// Source location of the modifier, if present
    pub fn span_of(&self, modifier: Modifier) -> Option<FileSpan> {
        self.items
            .iter()
            .find(|(m, _)| *m == modifier)
            .map(|(_, span)| *span)
    }

    /// All modifier occurrences in source order
    pub fn iter(&self) -> impl Iterator<Item = &(Modifier, FileSpan)> {
        self.items.iter()
    }
}

/// A reference-level term
#[derive(Clone, Debug, PartialEq)]
pub struct Term {
    /// Term shape
    pub kind: TermKind,
    /// Source location
    pub span: FileSpan,
}

/// Shape of a term
#[derive(Clone, Debug, PartialEq)]
pub enum TermKind {
    /// Plain name reference
    Name(Ident),
    /// Member access `base.name`
    Member {
        /// Term the member is fetched from
        base: TermId,
        /// Member name
        name: Ident,
    },
    /// Application `callee(args…)`
    Apply {
        /// Applied term
        callee: TermId,
        /// Positional/keyword arguments
        args: Vec<Arg>,
    },
    /// Generic application `callee<args…>`
    GenericApply {
        /// Applied generic term
        callee: TermId,
        /// Generic arguments
        args: Vec<Arg>,
    },
    /// Frequency-qualified type `@freq data`
    FreqQual {
        /// Frequency (element reference)
        freq: TermId,
        /// Underlying data type
        data: TermId,
    },
    /// The inherited definition of the enclosing member (`base`)
    Base,
    /// Integer literal
    IntLit(i64),
    /// Float literal
    FloatLit(f64),
    /// Boolean literal
    BoolLit(bool),
}

/// One argument in an application
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Arg {
    /// Keyword, if the argument was named
    pub name: Option<Ident>,
    /// Argument value
    pub value: ExprId,
    /// Source location of the whole argument
    pub span: FileSpan,
}

/// An expression
#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    /// Expression shape
    pub kind: ExprKind,
    /// Source location
    pub span: FileSpan,
}

/// Shape of an expression
#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    /// A term in expression position
    Term(TermId),
    /// Two-way conditional; both branches are required (if is an expression)
    If {
        /// Condition
        cond: ExprId,
        /// Taken when the condition holds
        then_branch: ExprId,
        /// Taken otherwise
        else_branch: ExprId,
    },
    /// Multi-way conditional over literal case values
    Switch {
        /// Value being switched on
        scrutinee: ExprId,
        /// Cases in source order
        cases: Vec<SwitchCase>,
        /// Fallback when no case matches
        default: ExprId,
    },
    /// Counted iteration; the binding is visible in the body
    For {
        /// Loop variable
        var: Ident,
        /// Iterated value
        iter: ExprId,
        /// Loop body
        body: ExprId,
    },
    /// Statement block with optional trailing result
    Block {
        /// Statements in order
        stmts: Vec<StmtId>,
        /// Result expression, if the block has a value
        result: Option<ExprId>,
    },
}

/// One `case value: body` arm of a switch
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SwitchCase {
    /// Case label value
    pub value: ExprId,
    /// Arm body
    pub body: ExprId,
}

/// A statement
#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    /// Local binding
    Let {
        /// Bound name
        name: Ident,
        /// Optional type ascription
        ty: Option<TermId>,
        /// Bound value
        init: ExprId,
        /// Source location
        span: FileSpan,
    },
    /// Early return
    Return {
        /// Returned value, if any
        value: Option<ExprId>,
        /// Source location
        span: FileSpan,
    },
    /// Assignment
    Assign {
        /// Assigned place
        target: ExprId,
        /// Assigned value
        value: ExprId,
        /// Source location
        span: FileSpan,
    },
    /// Expression evaluated for effect
    Expr(ExprId),
}

/// A declaration item
#[derive(Clone, Debug, PartialEq)]
pub struct Item {
    /// Declared name
    pub name: Ident,
    /// Modifier set
    pub modifiers: Modifiers,
    /// Source location of the whole item
    pub span: FileSpan,
    /// Item payload
    pub kind: ItemKind,
}

/// Payload of a declaration item
#[derive(Clone, Debug, PartialEq)]
pub enum ItemKind {
    /// Pipeline container type
    Pipeline(PipelineItem),
    /// Plain record type
    Struct(StructItem),
    /// Concept class: required members for implicit generic parameters
    Concept(ConceptItem),
    /// Method
    Method(MethodItem),
    /// Frequency-qualified attribute
    Attribute(AttributeItem),
    /// Plain struct field
    Field(FieldItem),
    /// Element (frequency) declaration
    Element(ElementItem),
    /// Abstract or bound type slot
    TypeSlot(TypeSlotItem),
}

/// Pipeline declaration
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineItem {
    /// Declared direct bases, in source order
    pub bases: Vec<BaseItem>,
    /// Member declarations in the body
    pub members: Vec<Item>,
}

/// One declared base of a pipeline
#[derive(Clone, Debug, PartialEq)]
pub struct BaseItem {
    /// Reference to the base pipeline
    pub term: TermId,
    /// Primary or mixin
    pub kind: BaseKind,
    /// Source location
    pub span: FileSpan,
}

/// How a base participates in inheritance
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum BaseKind {
    /// The subtyping base; at most one, first in the base list
    Primary,
    /// Mixed-in base
    Mixin,
}

/// Struct declaration
#[derive(Clone, Debug, PartialEq)]
pub struct StructItem {
    /// Field items
    pub fields: Vec<Item>,
}

/// Concept declaration
#[derive(Clone, Debug, PartialEq)]
pub struct ConceptItem {
    /// Required member signatures
    pub members: Vec<Item>,
}

/// Method declaration
#[derive(Clone, Debug, PartialEq)]
pub struct MethodItem {
    /// Generic parameters
    pub generics: Vec<GenericParamItem>,
    /// Runtime parameters
    pub params: Vec<ParamItem>,
    /// Result type; defaults to the enclosing context's error type if absent
    pub result: Option<TermId>,
    /// Body block, absent for abstract methods and concept members
    pub body: Option<ExprId>,
}

/// One generic parameter
#[derive(Clone, Debug, PartialEq)]
pub struct GenericParamItem {
    /// Parameter name
    pub name: Ident,
    /// Type or value parameter
    pub kind: GenericParamItemKind,
    /// Modifier set (`implicit` for concept-constrained value parameters)
    pub modifiers: Modifiers,
}

/// Kind of generic parameter
#[derive(Clone, Debug, PartialEq)]
pub enum GenericParamItemKind {
    /// Type parameter with optional upper bound
    Type {
        /// Upper bound, if declared
        upper: Option<TermId>,
    },
    /// Value parameter
    Value {
        /// Declared type
        ty: TermId,
    },
}

/// One runtime parameter
#[derive(Clone, Debug, PartialEq)]
pub struct ParamItem {
    /// Parameter name
    pub name: Ident,
    /// Declared type
    pub ty: TermId,
    /// Modifier set (`optional`, `implicit`)
    pub modifiers: Modifiers,
    /// Source location
    pub span: FileSpan,
}

/// Attribute declaration
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeItem {
    /// Frequency the attribute is computed at, if explicitly qualified
    pub freq: Option<TermId>,
    /// Data type
    pub ty: TermId,
    /// Defining initializer, absent for abstract/input attributes
    pub init: Option<ExprId>,
}

/// Field declaration
#[derive(Clone, Debug, PartialEq)]
pub struct FieldItem {
    /// Declared type
    pub ty: TermId,
    /// Default initializer
    pub init: Option<ExprId>,
}

/// Element declaration
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ElementItem {}

/// Type slot declaration
#[derive(Clone, Debug, PartialEq)]
pub struct TypeSlotItem {
    /// Bound type, absent for abstract slots
    pub bound: Option<TermId>,
}

/// One parsed source file
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SourceFile {
    /// Top-level declarations in source order
    pub items: Vec<Item>,
}

/// The whole parsed module handed to resolution
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SourceModule {
    /// Files in compilation order
    pub files: Vec<SourceFile>,
    /// Term nodes
    pub terms: Arena<Term>,
    /// Expression nodes
    pub exprs: Arena<Expr>,
    /// Statement nodes
    pub stmts: Arena<Stmt>,
}

impl SourceModule {
    /// Create an empty module
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a term node
    pub fn term(&mut self, kind: TermKind, span: FileSpan) -> TermId {
        self.terms.alloc(Term { kind, span })
    }

    /// Allocate an expression node
    pub fn expr(&mut self, kind: ExprKind, span: FileSpan) -> ExprId {
        self.exprs.alloc(Expr { kind, span })
    }

    /// Allocate a statement node
    pub fn stmt(&mut self, stmt: Stmt) -> StmtId {
        self.stmts.alloc(stmt)
    }

    /// Wrap a term into an expression node at the same location
    pub fn term_expr(&mut self, kind: TermKind, span: FileSpan) -> ExprId {
        let term = self.term(kind, span);
        self.expr(ExprKind::Term(term), span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wf_intern::Interner;
    use wf_span::{FileId, Span};

    fn span() -> FileSpan {
        FileSpan::new(FileId(0), Span::new(0, 1))
    }

    #[test]
    fn test_modifier_lookup() {
        let mut modifiers = Modifiers::new();
        modifiers.add(Modifier::Override, span());
        assert!(modifiers.has(Modifier::Override));
        assert!(!modifiers.has(Modifier::New));
        assert_eq!(modifiers.span_of(Modifier::Override), Some(span()));
    }

    #[test]
    fn test_term_expr_allocation() {
        let interner = Interner::new();
        let mut module = SourceModule::new();
        let name = Ident {
            name: interner.intern("x"),
            span: span(),
        };
        let expr = module.term_expr(TermKind::Name(name), span());
        match &module.exprs[expr].kind {
            ExprKind::Term(term) => {
                assert!(matches!(module.terms[*term].kind, TermKind::Name(_)));
            }
            other => panic!("expected term expression, got {other:?}"),
        }
    }
}
