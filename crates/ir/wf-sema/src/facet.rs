//! Facets and member lines
//!
//! A pipeline's member set is organized per origin: one facet for the
//! pipeline's own members and one per distinct ancestor, so that
//! multiply-inherited members stay distinguishable. Inside a facet, members
//! group by name, then by flavor, then into member lines.

use crate::decl::{Concreteness, DeclMode, MemberFlavor, MemberTags};
use crate::module::{DeclId, FacetId, LineId};
use crate::subst::Substitution;
use indexmap::IndexMap;
use wf_intern::Symbol;

/// Identity of a logical member across the inheritance chain
///
/// Allocated once at the original direct declaration; every inherited or
/// overriding declaration of the same member carries the same key.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct LineKey(pub u32);

/// Recipe for one inherited contribution to a member line
///
/// The synthesized declaration is produced on demand by re-running the
/// contributor under the substitution; the pair recorded here is all the
/// deferred computation needs.
#[derive(Clone, Debug, PartialEq)]
pub struct InheritedSource {
    /// The contributing declaration in the ancestor
    pub decl: DeclId,
    /// Substitution mapping the ancestor's context into the inheritor's
    pub subst: Substitution,
}

/// One logical member of a pipeline
#[derive(Clone, Debug, PartialEq)]
pub struct MemberLine {
    /// Identity across the inheritance chain
    pub key: LineKey,
    /// Member name
    pub name: Symbol,
    /// Member flavor
    pub flavor: MemberFlavor,
    /// Merged concreteness (maximum of all contributors)
    pub concreteness: Concreteness,
    /// How the line entered this pipeline
    pub mode: DeclMode,
    /// Merged member tags
    pub tags: MemberTags,
    /// The direct declaration, if the pipeline's own body contributes one
    pub direct: Option<DeclId>,
    /// Recipes for the inherited contributions, most-derived first
    pub inherited_sources: Vec<InheritedSource>,
    /// Synthesized inherited declarations, parallel to
    /// `inherited_sources`; populated as each one is forced
    pub inherited: Vec<Option<DeclId>>,
}

impl MemberLine {
    /// The declaration a consumer of this line should see, if already forced
    ///
    /// The direct declaration wins; otherwise the most-derived synthesized
    /// inherited declaration. `None` means the line has not been forced yet
    /// (or has no contributions at all, which the merge never produces).
    pub fn effective(&self) -> Option<DeclId> {
        self.direct
            .or_else(|| self.inherited.first().copied().flatten())
    }
}

/// Member lines of one flavor under one name
#[derive(Clone, Debug, PartialEq)]
pub struct CategoryGroup {
    /// The shared flavor
    pub flavor: MemberFlavor,
    /// Lines in the group, declaration order
    pub lines: Vec<LineId>,
}

/// All member lines under one name
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NameGroup {
    /// Category groups, one per flavor present
    pub categories: Vec<CategoryGroup>,
}

impl NameGroup {
    /// The category group of a flavor, if present
    pub fn category(&self, flavor: MemberFlavor) -> Option<&CategoryGroup> {
        self.categories.iter().find(|group| group.flavor == flavor)
    }
}

/// The per-origin slice of a pipeline's member set
#[derive(Clone, Debug, PartialEq)]
pub struct Facet {
    /// The pipeline this facet's members originate from
    pub origin: DeclId,
    /// Facets of the origin's own direct bases
    pub bases: Vec<FacetId>,
    /// Member name groups in insertion order
    pub groups: IndexMap<Symbol, NameGroup>,
}

impl Facet {
    /// Create an empty facet for an origin pipeline
    pub fn new(origin: DeclId) -> Self {
        Self {
            origin,
            bases: Vec::new(),
            groups: IndexMap::new(),
        }
    }

    /// Record a member line under its name and flavor
    pub fn add_line(&mut self, name: Symbol, flavor: MemberFlavor, line: LineId) {
        let group = self.groups.entry(name).or_default();
        match group
            .categories
            .iter_mut()
            .find(|category| category.flavor == flavor)
        {
            Some(category) => category.lines.push(line),
            None => group.categories.push(CategoryGroup {
                flavor,
                lines: vec![line],
            }),
        }
    }

    /// The name group for a member name, if any member has it
    pub fn group(&self, name: Symbol) -> Option<&NameGroup> {
        self.groups.get(&name)
    }

    /// All member lines in the facet, in insertion order
    pub fn member_lines(&self) -> impl Iterator<Item = LineId> + '_ {
        self.groups
            .values()
            .flat_map(|group| group.categories.iter())
            .flat_map(|category| category.lines.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wf_intern::Interner;

    #[test]
    fn test_add_line_groups_by_flavor() {
        let interner = Interner::new();
        let name = interner.intern("position");
        let origin = DeclId::from_raw(0u32.into());
        let mut facet = Facet::new(origin);

        let line_a = LineId::from_raw(0u32.into());
        let line_b = LineId::from_raw(1u32.into());
        facet.add_line(name, MemberFlavor::Attribute, line_a);
        facet.add_line(name, MemberFlavor::Method, line_b);

        let group = facet.group(name).unwrap();
        assert_eq!(group.categories.len(), 2);
        assert_eq!(
            group.category(MemberFlavor::Attribute).unwrap().lines,
            vec![line_a]
        );
        assert_eq!(facet.member_lines().count(), 2);
    }
}
