//! The resolved module and its arenas

use crate::decl::Decl;
use crate::expr::{Expr, ExprKind};
use crate::facet::{Facet, LineKey, MemberLine};
use crate::ty::{TypeId, TypeTable};
use wf_arena::{Arena, Idx};
use wf_memo::CycleError;
use wf_span::FileSpan;

/// Declaration ID
pub type DeclId = Idx<DeclSlot>;
/// Resolved expression ID
pub type ExprId = Idx<Expr>;
/// Facet ID
pub type FacetId = Idx<Facet>;
/// Member line ID
pub type LineId = Idx<MemberLine>;

/// Internal invariant violation
///
/// Distinct from user diagnostics: an `Ice` aborts resolution of the
/// enclosing module instead of being reported alongside source errors.
#[derive(thiserror::Error, Debug, Clone)]
pub enum Ice {
    /// A reserved declaration slot was filled a second time
    #[error("declaration slot filled twice (second fill at {span:?})")]
    SlotRefilled {
        /// Location of the offending declaration
        span: FileSpan,
    },

    /// A declaration builder was sealed without its payload
    #[error("declaration builder sealed without a payload at {span:?}")]
    BuilderIncomplete {
        /// Location of the draft declaration
        span: FileSpan,
    },

    /// A deferred computation re-entered itself
    #[error(transparent)]
    Cycle(#[from] CycleError),

    /// A table entry that must exist by construction was missing
    #[error("missing table entry: {what}")]
    MissingEntry {
        /// Description of the missing entry
        what: String,
    },
}

/// One arena slot for a declaration
///
/// Slots are reserved before their content exists so that self-referential
/// declarations (a pipeline's `this` parameter naming the pipeline) can hand
/// out an ID up front.
#[derive(Clone, Debug, PartialEq)]
pub enum DeclSlot {
    /// ID handed out, content pending
    Reserved,
    /// Sealed declaration
    Sealed(Decl),
}

/// A fully resolved module
#[derive(Clone, Debug)]
pub struct Module {
    decls: Arena<DeclSlot>,
    /// Type arena with pre-allocated builtins
    pub types: TypeTable,
    /// Resolved expressions
    pub exprs: Arena<Expr>,
    /// Facets of all pipelines
    pub facets: Arena<Facet>,
    /// Member lines of all pipelines
    pub lines: Arena<MemberLine>,
    /// Top-level declarations in source order
    pub globals: Vec<DeclId>,
    next_line_key: u32,
}

impl Module {
    /// Create an empty module
    pub fn new() -> Self {
        Self {
            decls: Arena::new(),
            types: TypeTable::new(),
            exprs: Arena::new(),
            facets: Arena::new(),
            lines: Arena::new(),
            globals: Vec::new(),
            next_line_key: 0,
        }
    }

    /// Allocate a fresh member-line key
    pub fn fresh_line_key(&mut self) -> LineKey {
        let key = LineKey(self.next_line_key);
        self.next_line_key += 1;
        key
    }

    /// Reserve a declaration slot, handing out its ID before the content
    pub fn reserve_decl(&mut self) -> DeclId {
        self.decls.alloc(DeclSlot::Reserved)
    }

    /// Fill a reserved slot with a sealed declaration
    ///
    /// # Errors
    ///
    /// Returns [`Ice::SlotRefilled`] if the slot is already sealed.
    pub fn fill_decl(&mut self, id: DeclId, decl: Decl) -> Result<(), Ice> {
        match &self.decls[id] {
            DeclSlot::Reserved => {
                self.decls[id] = DeclSlot::Sealed(decl);
                Ok(())
            }
            DeclSlot::Sealed(_) => Err(Ice::SlotRefilled { span: decl.span }),
        }
    }

    /// Read a sealed declaration
    ///
    /// # Panics
    ///
    /// Panics if the slot is still reserved. IDs only escape to readers
    /// after sealing, so hitting this is a resolver bug, not a user error.
    pub fn decl(&self, id: DeclId) -> &Decl {
        match &self.decls[id] {
            DeclSlot::Sealed(decl) => decl,
            DeclSlot::Reserved => {
                panic!("read of reserved declaration slot {id:?} before it was sealed")
            }
        }
    }

    /// Read a declaration, returning `None` while the slot is reserved
    pub fn try_decl(&self, id: DeclId) -> Option<&Decl> {
        match &self.decls[id] {
            DeclSlot::Sealed(decl) => Some(decl),
            DeclSlot::Reserved => None,
        }
    }

    /// Number of declaration slots (reserved or sealed)
    pub fn decl_count(&self) -> usize {
        self.decls.len()
    }

    /// Allocate a resolved expression
    pub fn expr(&mut self, kind: ExprKind, ty: TypeId, span: FileSpan) -> ExprId {
        self.exprs.alloc(Expr { kind, ty, span })
    }

    /// Allocate an error-sentinel expression
    pub fn error_expr(&mut self, span: FileSpan) -> ExprId {
        let ty = self.types.error();
        self.expr(ExprKind::Error, ty, span)
    }

    /// Allocate a facet
    pub fn alloc_facet(&mut self, facet: Facet) -> FacetId {
        self.facets.alloc(facet)
    }

    /// Allocate a member line
    pub fn alloc_line(&mut self, line: MemberLine) -> LineId {
        self.lines.alloc(line)
    }
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ExprKind;

    #[test]
    fn test_reserved_slot_is_not_readable() {
        let mut module = Module::new();
        let id = module.reserve_decl();
        assert!(module.try_decl(id).is_none());
    }

    #[test]
    fn test_error_expr_is_error_typed() {
        let mut module = Module::new();
        let expr = module.error_expr(FileSpan::synthesized());
        assert_eq!(module.exprs[expr].kind, ExprKind::Error);
        assert!(module.types.is_error(module.exprs[expr].ty));
    }

    #[test]
    fn test_line_keys_are_unique() {
        let mut module = Module::new();
        let first = module.fresh_line_key();
        let second = module.fresh_line_key();
        assert_ne!(first, second);
    }
}
