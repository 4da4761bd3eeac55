//! Scope tree for resolution
//!
//! Scopes bind names to groups of same-named alternatives: value bindings
//! shadow, overloadable declarations accumulate. Pipeline scopes additionally
//! expose the pipeline's member view, which is consulted by term lookup (see
//! the `terms` module) rather than stored here.

use rustc_hash::FxHashMap;
use wf_intern::Symbol;
use wf_sema::{DeclId, ScopeId};

/// Kind of scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Root scope holding the builtin table
    Root,
    /// Module-level scope (top-level declarations)
    Module,
    /// Pipeline body scope; also exposes the pipeline's member view
    Pipeline,
    /// Method scope (parameters, generic parameters)
    Method,
    /// Block scope
    Block,
}

/// One binding of a name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// A declaration referenced by name (type, method, element, …)
    Decl(DeclId),
    /// A local value (parameter, let binding, `this`)
    Value(DeclId),
}

/// A single scope in the tree
#[derive(Debug, Clone)]
pub struct Scope {
    /// Parent scope, `None` for the root
    pub parent: Option<ScopeId>,
    /// Kind of scope
    pub kind: ScopeKind,
    /// The pipeline whose member view this scope exposes
    pub pipeline: Option<DeclId>,
    /// Bindings grouped by name, definition order preserved
    pub defs: FxHashMap<Symbol, Vec<Binding>>,
}

impl Scope {
    fn new(parent: Option<ScopeId>, kind: ScopeKind) -> Self {
        Self {
            parent,
            kind,
            pipeline: None,
            defs: FxHashMap::default(),
        }
    }
}

/// Scope tree for one module resolution
#[derive(Debug, Clone)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    /// The root scope with the builtin table
    pub root: ScopeId,
}

impl ScopeTree {
    /// Create a tree with a root scope
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new(None, ScopeKind::Root)],
            root: ScopeId(0),
        }
    }

    /// Create a child scope
    pub fn create_child(&mut self, parent: ScopeId, kind: ScopeKind) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope::new(Some(parent), kind));
        id
    }

    /// Attach a pipeline's member view to a scope
    pub fn attach_pipeline(&mut self, scope: ScopeId, pipeline: DeclId) {
        self.scopes[scope.0 as usize].pipeline = Some(pipeline);
    }

    /// Get a scope
    pub fn get(&self, scope: ScopeId) -> &Scope {
        &self.scopes[scope.0 as usize]
    }

    /// Parent of a scope
    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.0 as usize].parent
    }

    /// Bind an overloadable declaration; same-named bindings accumulate
    pub fn define_decl(&mut self, scope: ScopeId, name: Symbol, decl: DeclId) {
        self.scopes[scope.0 as usize]
            .defs
            .entry(name)
            .or_default()
            .push(Binding::Decl(decl));
    }

    /// Bind a local value
    ///
    /// Returns `false` if the scope already binds a value of this name; the
    /// caller reports the duplicate.
    pub fn define_value(&mut self, scope: ScopeId, name: Symbol, decl: DeclId) -> bool {
        let defs = self.scopes[scope.0 as usize].defs.entry(name).or_default();
        if defs
            .iter()
            .any(|binding| matches!(binding, Binding::Value(_)))
        {
            return false;
        }
        defs.push(Binding::Value(decl));
        true
    }

    /// The bindings of a name in one scope, if any
    pub fn bindings_in(&self, scope: ScopeId, name: Symbol) -> Option<&[Binding]> {
        self.scopes[scope.0 as usize]
            .defs
            .get(&name)
            .map(Vec::as_slice)
    }

    /// Whether any scope from `scope` outward binds `name` (member views
    /// included via the `pipeline` marker; the caller checks those itself)
    pub fn any_outer_definition(&self, mut scope: ScopeId, name: Symbol) -> bool {
        loop {
            let data = &self.scopes[scope.0 as usize];
            if data.defs.contains_key(&name) || data.pipeline.is_some() {
                return true;
            }
            match data.parent {
                Some(parent) => scope = parent,
                None => return false,
            }
        }
    }

    /// All names visible from a scope, for "did you mean" suggestions
    pub fn visible_names(&self, mut scope: ScopeId) -> Vec<Symbol> {
        let mut names = Vec::new();
        loop {
            let data = &self.scopes[scope.0 as usize];
            names.extend(data.defs.keys().copied());
            match data.parent {
                Some(parent) => scope = parent,
                None => break,
            }
        }
        names
    }
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wf_intern::Interner;

    fn decl(raw: u32) -> DeclId {
        DeclId::from_raw(raw.into())
    }

    #[test]
    fn test_decl_bindings_accumulate() {
        let interner = Interner::new();
        let name = interner.intern("f");
        let mut tree = ScopeTree::new();
        tree.define_decl(tree.root, name, decl(0));
        tree.define_decl(tree.root, name, decl(1));
        assert_eq!(tree.bindings_in(tree.root, name).unwrap().len(), 2);
    }

    #[test]
    fn test_value_bindings_do_not_duplicate() {
        let interner = Interner::new();
        let name = interner.intern("x");
        let mut tree = ScopeTree::new();
        assert!(tree.define_value(tree.root, name, decl(0)));
        assert!(!tree.define_value(tree.root, name, decl(1)));
    }

    #[test]
    fn test_inner_scope_shadows() {
        let interner = Interner::new();
        let name = interner.intern("x");
        let mut tree = ScopeTree::new();
        assert!(tree.define_value(tree.root, name, decl(0)));
        let inner = tree.create_child(tree.root, ScopeKind::Block);
        assert!(tree.define_value(inner, name, decl(1)));

        assert_eq!(
            tree.bindings_in(inner, name),
            Some(&[Binding::Value(decl(1))][..])
        );
        assert!(tree.any_outer_definition(tree.root, name));
    }
}
