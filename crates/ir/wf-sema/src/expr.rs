//! Resolved expressions

use crate::module::{DeclId, ExprId};
use crate::ty::TypeId;
use wf_span::FileSpan;

/// Built-in operations applied through the overload machinery
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum BuiltinOp {
    /// Arithmetic addition
    Add,
    /// Arithmetic subtraction
    Sub,
    /// Arithmetic multiplication
    Mul,
    /// Arithmetic division
    Div,
    /// Arithmetic negation
    Neg,
    /// Equality comparison
    Eq,
    /// Inequality comparison
    Ne,
    /// Less-than comparison
    Lt,
    /// Less-or-equal comparison
    Le,
    /// Greater-than comparison
    Gt,
    /// Greater-or-equal comparison
    Ge,
    /// Boolean conjunction
    And,
    /// Boolean disjunction
    Or,
    /// Boolean negation
    Not,
    /// Widening conversion from int to float
    IntToFloat,
}

/// One `case value: body` arm of a resolved switch
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SwitchCase {
    /// Case label value
    pub value: ExprId,
    /// Arm body
    pub body: ExprId,
}

/// A resolved expression with its type
#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    /// Expression shape
    pub kind: ExprKind,
    /// Resolved type
    pub ty: TypeId,
    /// Source location
    pub span: FileSpan,
}

/// Shape of a resolved expression
#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    /// Error sentinel; inert under every subsequent operation
    Error,
    /// Integer literal
    IntLit(i64),
    /// Float literal
    FloatLit(f64),
    /// Boolean literal
    BoolLit(bool),
    /// Reference to a local binding or parameter
    VarRef(DeclId),
    /// Reference to an attribute of the enclosing pipeline
    AttrRef(DeclId),
    /// Two-way conditional
    If {
        /// Condition
        cond: ExprId,
        /// Taken when the condition holds
        then_branch: ExprId,
        /// Taken otherwise
        else_branch: ExprId,
    },
    /// Multi-way conditional
    Switch {
        /// Value being switched on
        scrutinee: ExprId,
        /// Cases in source order
        cases: Vec<SwitchCase>,
        /// Fallback when no case matches
        default: ExprId,
    },
    /// Counted iteration
    For {
        /// Loop variable binding
        var: DeclId,
        /// Iterated value
        iter: ExprId,
        /// Loop body
        body: ExprId,
    },
    /// Local binding scoped over a body
    Let {
        /// Bound variable declaration
        var: DeclId,
        /// Bound value
        value: ExprId,
        /// Expression the binding is visible in
        body: ExprId,
    },
    /// Assignment
    Assign {
        /// Assigned place
        target: ExprId,
        /// Assigned value
        value: ExprId,
    },
    /// Effect statements followed by an optional result
    Block {
        /// Statements in order
        stmts: Vec<ExprId>,
        /// Result expression, if the block has a value
        result: Option<ExprId>,
    },
    /// Application of a user-defined method
    CallMethod {
        /// The method
        method: DeclId,
        /// Arguments in parameter order
        args: Vec<ExprId>,
    },
    /// Application of a built-in operation
    CallBuiltin {
        /// The operation
        op: BuiltinOp,
        /// Arguments in parameter order
        args: Vec<ExprId>,
    },
    /// Fetching an attribute out of a frequency-qualified value
    AttrFetch {
        /// The qualified value
        base: ExprId,
        /// The fetched attribute
        attr: DeclId,
    },
    /// Reading a struct field
    FieldRef {
        /// The struct value
        base: ExprId,
        /// The field
        field: DeclId,
    },
    /// Constructing a value at an element
    ElementCtor {
        /// The element
        element: DeclId,
        /// Filled attributes, `(attribute, value)` in attribute order
        args: Vec<(DeclId, ExprId)>,
    },
    /// Implicit witness for a concept-constrained generic parameter
    ConceptWitness {
        /// The concept
        concept: DeclId,
        /// `(required member, satisfying declaration)` pairs
        members: Vec<(DeclId, DeclId)>,
    },
}
