//! Declarations and the staged declaration builder

use crate::facet::LineKey;
use crate::module::{DeclId, ExprId, FacetId, Ice, LineId, Module};
use crate::ty::TypeId;
use wf_intern::Symbol;
use wf_span::FileSpan;

/// How concrete a member is
///
/// The order is meaningful: merging member lines takes the maximum of the
/// contributors, `Abstract < Virtual < Final`.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum Concreteness {
    /// No definition; derived pipelines must provide one
    Abstract,
    /// Defined, may be overridden
    Virtual,
    /// Defined, may not be overridden
    Final,
}

/// How a declaration entered its owner
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum DeclMode {
    /// Written in the owner's own body
    Direct,
    /// Synthesized from an ancestor under substitution
    Inherited,
    /// Synthesized by generic specialization
    Extended,
}

/// Orthogonal member tags accumulated from modifiers
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq)]
pub struct MemberTags {
    /// Supplied by the pipeline's caller
    pub input: bool,
    /// Part of the pipeline's result
    pub output: bool,
    /// May be left unfilled at construction
    pub optional: bool,
    /// Participates in implicit argument search
    pub implicit: bool,
}

/// The member category a declaration belongs to
///
/// Same-named members of different flavors form separate category groups
/// inside a facet name group.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum MemberFlavor {
    /// Frequency-qualified attribute
    Attribute,
    /// Plain struct field
    Field,
    /// Method
    Method,
    /// Element (frequency)
    Element,
    /// Record type
    Struct,
    /// Pipeline container type
    Pipeline,
    /// Generic parameter
    GenericParam,
    /// Concept class
    Concept,
    /// Type slot
    TypeSlot,
}

/// A sealed declaration
#[derive(Clone, Debug, PartialEq)]
pub struct Decl {
    /// Declared name
    pub name: Symbol,
    /// Source location
    pub span: FileSpan,
    /// Identity of the logical member across the inheritance chain
    pub line_key: LineKey,
    /// Concreteness mode
    pub concreteness: Concreteness,
    /// Declaration mode
    pub mode: DeclMode,
    /// Accumulated member tags
    pub tags: MemberTags,
    /// Kind-specific payload
    pub kind: DeclKind,
}

impl Decl {
    /// The member category this declaration belongs to
    pub fn flavor(&self) -> MemberFlavor {
        match &self.kind {
            DeclKind::Attribute(_) => MemberFlavor::Attribute,
            DeclKind::Field(_) => MemberFlavor::Field,
            DeclKind::Method(_) => MemberFlavor::Method,
            DeclKind::Element(_) => MemberFlavor::Element,
            DeclKind::Struct(_) => MemberFlavor::Struct,
            DeclKind::Pipeline(_) => MemberFlavor::Pipeline,
            DeclKind::GenericParam(_) => MemberFlavor::GenericParam,
            DeclKind::Concept(_) => MemberFlavor::Concept,
            DeclKind::TypeSlot(_) => MemberFlavor::TypeSlot,
        }
    }
}

/// Kind-specific declaration payload
#[derive(Clone, Debug, PartialEq)]
pub enum DeclKind {
    /// Frequency-qualified attribute
    Attribute(AttributeDecl),
    /// Plain struct field or value parameter
    Field(FieldDecl),
    /// Method
    Method(MethodDecl),
    /// Element (frequency)
    Element(ElementDecl),
    /// Record type
    Struct(StructDecl),
    /// Pipeline container type
    Pipeline(PipelineDecl),
    /// Generic parameter
    GenericParam(GenericParamDecl),
    /// Concept class
    Concept(ConceptDecl),
    /// Type slot
    TypeSlot(TypeSlotDecl),
}

/// Attribute declaration payload
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeDecl {
    /// Full (frequency-qualified) type
    pub ty: TypeId,
    /// Defining initializer, absent for abstract and pure-input attributes
    pub init: Option<ExprId>,
}

/// Field declaration payload
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDecl {
    /// Declared type
    pub ty: TypeId,
    /// Default initializer
    pub init: Option<ExprId>,
}

/// One runtime parameter of a method
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    /// Parameter name
    pub name: Symbol,
    /// Declared type
    pub ty: TypeId,
    /// Source location
    pub span: FileSpan,
    /// May be left unfilled
    pub optional: bool,
    /// The field declaration bodies refer to this parameter through
    pub decl: DeclId,
}

/// How a method is defined
#[derive(Clone, Debug, PartialEq)]
pub enum MethodBody {
    /// No definition (abstract methods, concept members)
    None,
    /// User-written body
    Expr(ExprId),
    /// Built-in operation
    Builtin(crate::expr::BuiltinOp),
}

/// Method declaration payload
#[derive(Clone, Debug, PartialEq)]
pub struct MethodDecl {
    /// Generic parameter declarations
    pub generics: Vec<DeclId>,
    /// Runtime parameters in declaration order
    pub params: Vec<Param>,
    /// Result type
    pub result: TypeId,
    /// Definition
    pub body: MethodBody,
}

/// Element declaration payload
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ElementDecl {}

/// Struct declaration payload
#[derive(Clone, Debug, PartialEq)]
pub struct StructDecl {
    /// Field declarations in order
    pub fields: Vec<DeclId>,
}

/// How a base participates in inheritance
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum BaseKind {
    /// The subtyping base
    Primary,
    /// Mixed-in base
    Mixin,
}

/// One resolved direct base of a pipeline
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BaseRef {
    /// The base pipeline declaration
    pub pipeline: DeclId,
    /// Primary or mixin
    pub kind: BaseKind,
    /// Source location of the base clause
    pub span: FileSpan,
}

/// Pipeline declaration payload
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineDecl {
    /// Whether the pipeline itself is declared abstract
    pub is_abstract: bool,
    /// Resolved direct bases in source order
    pub bases: Vec<BaseRef>,
    /// Ancestor pipelines in linearized order, most-derived first
    pub ancestors: Vec<DeclId>,
    /// The facet holding this pipeline's own members
    pub direct_facet: FacetId,
    /// One facet per distinct ancestor, in linearized order
    pub facets: Vec<FacetId>,
    /// Direct member declarations in body order
    pub members: Vec<DeclId>,
    /// Member lines participating in implicit argument search, including
    /// inherited ones
    pub implicit_members: Vec<LineId>,
    /// The synthesized `this` parameter
    pub this_param: DeclId,
}

/// Kind of generic parameter
#[derive(Clone, Debug, PartialEq)]
pub enum GenericParamKind {
    /// Type parameter
    Type {
        /// Upper bound, if declared
        upper: Option<TypeId>,
    },
    /// Value parameter
    Value {
        /// Declared type
        ty: TypeId,
    },
}

/// Generic parameter declaration payload
#[derive(Clone, Debug, PartialEq)]
pub struct GenericParamDecl {
    /// Type or value parameter
    pub kind: GenericParamKind,
}

/// Concept declaration payload
#[derive(Clone, Debug, PartialEq)]
pub struct ConceptDecl {
    /// Required member signatures (method declarations without bodies)
    pub members: Vec<DeclId>,
}

/// Type slot declaration payload
#[derive(Clone, Debug, PartialEq)]
pub struct TypeSlotDecl {
    /// Bound type, absent for abstract slots
    pub bound: Option<TypeId>,
}

/// Staged declaration builder
///
/// The draft phase is plain mutation on this value; `seal` consumes the draft
/// and fills a reserved module slot exactly once. There is no way to mutate a
/// declaration after sealing short of `unsafe`, which this workspace denies.
#[derive(Clone, Debug)]
pub struct DeclBuilder {
    name: Symbol,
    span: FileSpan,
    line_key: LineKey,
    concreteness: Concreteness,
    mode: DeclMode,
    tags: MemberTags,
    kind: Option<DeclKind>,
}

impl DeclBuilder {
    /// Start a draft declaration
    pub fn new(name: Symbol, span: FileSpan, line_key: LineKey) -> Self {
        Self {
            name,
            span,
            line_key,
            concreteness: Concreteness::Virtual,
            mode: DeclMode::Direct,
            tags: MemberTags::default(),
            kind: None,
        }
    }

    /// Set the concreteness mode
    pub fn concreteness(mut self, concreteness: Concreteness) -> Self {
        self.concreteness = concreteness;
        self
    }

    /// Set the declaration mode
    pub fn mode(mut self, mode: DeclMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the member tags
    pub fn tags(mut self, tags: MemberTags) -> Self {
        self.tags = tags;
        self
    }

    /// Set the kind-specific payload
    pub fn kind(mut self, kind: DeclKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Produce the declaration value without sealing it into the module
    ///
    /// Used for drafts whose deferred content (initializers, bodies) is
    /// filled in before the final seal.
    ///
    /// # Errors
    ///
    /// Returns an [`Ice`] if the payload was never set.
    pub fn build_draft(self) -> Result<Decl, Ice> {
        let kind = self.kind.ok_or(Ice::BuilderIncomplete { span: self.span })?;
        Ok(Decl {
            name: self.name,
            span: self.span,
            line_key: self.line_key,
            concreteness: self.concreteness,
            mode: self.mode,
            tags: self.tags,
            kind,
        })
    }

    /// Seal the draft into a previously reserved slot
    ///
    /// # Errors
    ///
    /// Returns an [`Ice`] if the payload was never set or the slot is
    /// already filled.
    pub fn seal(self, module: &mut Module, id: DeclId) -> Result<DeclId, Ice> {
        let kind = self.kind.ok_or(Ice::BuilderIncomplete { span: self.span })?;
        module.fill_decl(
            id,
            Decl {
                name: self.name,
                span: self.span,
                line_key: self.line_key,
                concreteness: self.concreteness,
                mode: self.mode,
                tags: self.tags,
                kind,
            },
        )?;
        Ok(id)
    }

    /// Reserve a fresh slot and seal into it
    ///
    /// # Errors
    ///
    /// Returns an [`Ice`] if the payload was never set.
    pub fn seal_new(self, module: &mut Module) -> Result<DeclId, Ice> {
        let id = module.reserve_decl();
        self.seal(module, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Module;
    use wf_intern::Interner;

    #[test]
    fn test_concreteness_order() {
        assert!(Concreteness::Abstract < Concreteness::Virtual);
        assert!(Concreteness::Virtual < Concreteness::Final);
        assert_eq!(
            Concreteness::Abstract.max(Concreteness::Final),
            Concreteness::Final
        );
    }

    #[test]
    fn test_seal_requires_payload() {
        let interner = Interner::new();
        let mut module = Module::new();
        let key = module.fresh_line_key();
        let builder = DeclBuilder::new(interner.intern("x"), FileSpan::synthesized(), key);
        assert!(builder.seal_new(&mut module).is_err());
    }

    #[test]
    fn test_seal_fills_reserved_slot_once() {
        let interner = Interner::new();
        let mut module = Module::new();
        let key = module.fresh_line_key();
        let id = module.reserve_decl();

        let ty = module.types.int();
        let sealed = DeclBuilder::new(interner.intern("x"), FileSpan::synthesized(), key)
            .kind(DeclKind::Field(FieldDecl { ty, init: None }))
            .seal(&mut module, id)
            .unwrap();
        assert_eq!(sealed, id);
        assert_eq!(module.decl(id).name, interner.intern("x"));

        // A second fill of the same slot is an internal error, not silent
        // mutation.
        let again = DeclBuilder::new(interner.intern("y"), FileSpan::synthesized(), key)
            .kind(DeclKind::Field(FieldDecl { ty, init: None }))
            .seal(&mut module, id);
        assert!(again.is_err());
    }
}
