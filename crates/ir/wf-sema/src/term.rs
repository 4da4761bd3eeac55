//! Semantic terms
//!
//! A term is the currency of name resolution: the result of looking a name
//! up, before any consumer has demanded a specific shape out of it. Layered
//! and overloaded terms deliberately preserve ambiguity; it is the consumer
//! (expression position, type position, application) that collapses them.

use crate::decl::MemberFlavor;
use crate::module::{DeclId, ExprId, LineId};
use crate::ty::TypeId;
use wf_intern::Symbol;

/// Handle to a lexical scope
///
/// The scope tree itself lives in the resolution pass; terms only carry the
/// handle so that a layered lookup can be continued outward on demand.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct ScopeId(pub u32);

/// The deferred outer part of a layered lookup
///
/// Forcing it re-runs the lookup of `name` starting at `scope`; nothing is
/// computed until a consumer rejects the inner layer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LayerRest {
    /// Scope to continue the lookup from
    pub scope: ScopeId,
    /// Name being looked up
    pub name: Symbol,
}

/// Reference to a member declaration
///
/// Pipeline members carry the member line they were reached through; global
/// declarations (top-level methods, builtin operations) have no line.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MemberRef {
    /// Object the member is fetched from, for instance members
    pub object: Option<ExprId>,
    /// The member line, for pipeline members
    pub line: Option<LineId>,
    /// The declaration chosen for this reference
    pub decl: DeclId,
}

/// A resolved (or still ambiguous) term
#[derive(Clone, Debug, PartialEq)]
pub enum Term {
    /// Error sentinel; consumers propagate it without further diagnostics
    Error,
    /// An inner-scope result shadowing possible outer-scope results
    Layered {
        /// The innermost result
        first: Box<Term>,
        /// Deferred continuation of the lookup in outer scopes
        rest: LayerRest,
    },
    /// Same-named alternatives from one scope
    Overloaded {
        /// The alternatives, in definition order
        alts: Vec<Term>,
    },
    /// A member category group from facet lookup
    CategoryGroup {
        /// Member flavor of the group
        flavor: MemberFlavor,
        /// Member lines in the group, most-derived facet first
        members: Vec<MemberRef>,
    },
    /// A resolved expression
    Expr(ExprId),
    /// A resolved type
    Type(TypeId),
    /// A single member reference
    Member(MemberRef),
}

impl Term {
    /// Whether this term is (or contains only) the error sentinel
    pub fn is_error(&self) -> bool {
        matches!(self, Term::Error)
    }

    /// Wrap alternatives into a term, flattening the trivial cases
    pub fn overloaded(mut alts: Vec<Term>) -> Term {
        match alts.len() {
            0 => Term::Error,
            1 => alts.remove(0),
            _ => Term::Overloaded { alts },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overloaded_flattens() {
        assert_eq!(Term::overloaded(vec![]), Term::Error);
        assert_eq!(Term::overloaded(vec![Term::Error]), Term::Error);
        assert!(matches!(
            Term::overloaded(vec![Term::Error, Term::Error]),
            Term::Overloaded { .. }
        ));
    }
}
