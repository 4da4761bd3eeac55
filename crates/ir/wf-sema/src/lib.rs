//! Resolved semantic model
//!
//! The types in this crate are what resolution produces: immutable, sealed
//! declarations in an arena, frequency-qualified types, resolved expressions,
//! and the facet/member-line structure that keeps multiply-inherited pipeline
//! members distinguishable by origin.
//!
//! Declarations go through a staged build: a mutable [`DeclBuilder`] draft is
//! sealed exactly once into a reserved arena slot (see [`Module::reserve_decl`]
//! / [`Module::fill_decl`]); from then on the declaration is immutable and
//! shared by ID. Inherited declarations are never in-place mutations of the
//! original: they are fresh nodes synthesized by re-running the original's
//! content under a [`Substitution`].

pub mod decl;
pub mod expr;
pub mod facet;
pub mod module;
pub mod render;
pub mod subst;
pub mod term;
pub mod ty;

pub use decl::{
    AttributeDecl, BaseKind, BaseRef, ConceptDecl, Concreteness, Decl, DeclBuilder, DeclKind,
    DeclMode, ElementDecl, FieldDecl, GenericParamDecl, GenericParamKind, MemberFlavor,
    MemberTags, MethodBody, MethodDecl, Param, PipelineDecl, StructDecl, TypeSlotDecl,
};
pub use expr::{BuiltinOp, Expr, ExprKind, SwitchCase};
pub use facet::{CategoryGroup, Facet, InheritedSource, LineKey, MemberLine, NameGroup};
pub use module::{DeclId, ExprId, FacetId, Ice, LineId, Module};
pub use render::Renderer;
pub use subst::Substitution;
pub use term::{LayerRest, MemberRef, ScopeId, Term};
pub use ty::{FreqRef, PlaceholderId, Type, TypeId, TypeTable};
