//! Implicit conversion search
//!
//! Conversions are directed edges contributed by in-scope single-parameter
//! methods; single-runtime-parameter generic methods also contribute, at a
//! generic-parameter-count penalty that makes them strictly more expensive
//! than direct edges. The search runs backward from the target type,
//! extending a frontier one edge at a time until an entry's source equals the
//! requested source type. Among matching paths, cost vectors dominated
//! component-wise by a cheaper path are discarded; a unique survivor is the
//! conversion, several survivors are an ambiguity.
//!
//! Only edges whose parameter type equals the exact source type are taken;
//! conversions from proper subtypes of the source are not considered (see
//! DESIGN.md).

use crate::resolver::Resolver;
use rustc_hash::FxHashMap;
use wf_sema::{
    DeclId, DeclKind, ExprId, ExprKind, Ice, MemberFlavor, Substitution, Term, Type, TypeId,
};

/// Search-space cap; a conversion graph this large is pathological
const MAX_EXPLORED: usize = 10_000;

/// Cost vector of a conversion path
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Cost {
    /// Number of conversion steps
    pub steps: u32,
    /// Accumulated generic-parameter penalty
    pub generic: u32,
}

impl Cost {
    /// Whether `self` is at least as cheap as `other` in every component and
    /// strictly cheaper in one
    fn dominates(&self, other: &Cost) -> bool {
        self.steps <= other.steps
            && self.generic <= other.generic
            && (self.steps < other.steps || self.generic < other.generic)
    }
}

/// One application in a conversion path
#[derive(Clone, Debug)]
pub(crate) struct ConversionStep {
    /// The converting method
    pub method: DeclId,
    /// Generic-argument bindings, empty for direct edges
    pub subst: Substitution,
    /// Result type after this step
    pub result: TypeId,
}

/// A complete conversion path, steps in application order
#[derive(Clone, Debug)]
pub(crate) struct ConversionPath {
    /// Steps from source to target
    pub steps: Vec<ConversionStep>,
    /// Total cost
    pub cost: Cost,
}

/// Outcome of a conversion search
#[derive(Clone, Debug)]
pub(crate) enum ConversionOutcome {
    /// No path within the length bound
    None,
    /// Exactly one cheapest path
    Unique(ConversionPath),
    /// Several equally cheap paths
    Ambiguous,
}

/// A frontier entry: a path ending at the target whose source is `source`
#[derive(Clone, Debug)]
struct Entry {
    source: TypeId,
    steps: Vec<ConversionStep>,
    cost: Cost,
}

impl Resolver<'_> {
    /// Find the unique cheapest conversion from `from` to `to`
    ///
    /// # Errors
    ///
    /// Returns an [`Ice`] only on internal failure; absence and ambiguity
    /// are ordinary outcomes.
    pub(crate) fn find_conversion(
        &mut self,
        from: TypeId,
        to: TypeId,
        limit: u32,
    ) -> Result<ConversionOutcome, Ice> {
        if self.types_equal(from, to) {
            return Ok(ConversionOutcome::Unique(ConversionPath {
                steps: Vec::new(),
                cost: Cost::default(),
            }));
        }

        let methods = self.conversion_methods();
        let mut matches: Vec<Entry> = Vec::new();
        let mut frontier: Vec<Entry> = Vec::new();
        let mut explored = 0usize;

        // Seed with edges that land directly on the target.
        for entry in self.edges_into(&methods, to, &[])? {
            if self.types_equal(entry.source, from) {
                matches.push(entry);
            } else {
                frontier.push(entry);
            }
        }

        let mut depth = 1;
        while depth < limit && !frontier.is_empty() && explored < MAX_EXPLORED {
            let mut next: Vec<Entry> = Vec::new();
            for entry in &frontier {
                for extended in self.edges_into(&methods, entry.source, &entry.steps)? {
                    explored += 1;
                    let mut steps = extended.steps;
                    steps.extend(entry.steps.iter().cloned());
                    let candidate = Entry {
                        source: extended.source,
                        steps,
                        cost: Cost {
                            steps: entry.cost.steps + extended.cost.steps,
                            generic: entry.cost.generic + extended.cost.generic,
                        },
                    };
                    if self.types_equal(candidate.source, from) {
                        matches.push(candidate);
                    } else if !next
                        .iter()
                        .any(|other| {
                            self.types_equal(other.source, candidate.source)
                                && other.cost.dominates(&candidate.cost)
                        })
                    {
                        next.push(candidate);
                    }
                }
            }
            frontier = next;
            depth += 1;
        }

        // Discard matches dominated by a strictly cheaper cost vector.
        let mut survivors: Vec<Entry> = Vec::new();
        for candidate in &matches {
            if !matches
                .iter()
                .any(|other| other.cost.dominates(&candidate.cost))
            {
                survivors.push(candidate.clone());
            }
        }

        Ok(match survivors.len() {
            0 => ConversionOutcome::None,
            1 => {
                let winner = survivors.remove(0);
                ConversionOutcome::Unique(ConversionPath {
                    steps: winner.steps,
                    cost: winner.cost,
                })
            }
            _ => ConversionOutcome::Ambiguous,
        })
    }

    /// Apply a conversion path to an expression
    pub(crate) fn apply_conversion(
        &mut self,
        expr: ExprId,
        path: &ConversionPath,
    ) -> Result<ExprId, Ice> {
        let span = self.module.exprs[expr].span;
        let mut current = expr;
        for step in &path.steps {
            let method = if step.subst.is_empty() {
                step.method
            } else if self.module.try_decl(step.method).is_some() {
                step.subst
                    .apply_decl(&mut self.module, step.method, wf_sema::DeclMode::Extended)?
            } else {
                // The generic original is still drafted; reference it
                // unspecialized and let the type carry the instantiation.
                step.method
            };
            let kind = match &self.decl_view(step.method).kind {
                DeclKind::Method(decl) => match &decl.body {
                    wf_sema::MethodBody::Builtin(op) => ExprKind::CallBuiltin {
                        op: *op,
                        args: vec![current],
                    },
                    _ => ExprKind::CallMethod {
                        method,
                        args: vec![current],
                    },
                },
                _ => ExprKind::Error,
            };
            current = self.module.expr(kind, step.result, span);
        }
        Ok(current)
    }

    /// All in-scope single-parameter methods, the conversion edge pool
    fn conversion_methods(&self) -> Vec<DeclId> {
        let mut methods = Vec::new();
        let mut scope = Some(self.current_scope);
        while let Some(current) = scope {
            let data = self.scopes.get(current);
            for bindings in data.defs.values() {
                for binding in bindings {
                    if let crate::scope::Binding::Decl(decl) = binding {
                        if self.flavor(*decl) == MemberFlavor::Method
                            && self.single_param_ty(*decl).is_some()
                        {
                            methods.push(*decl);
                        }
                    }
                }
            }
            if let Some(pipeline) = data.pipeline {
                for line in self.member_view(pipeline) {
                    let line_data = &self.module.lines[line];
                    if line_data.flavor != MemberFlavor::Method {
                        continue;
                    }
                    if let Some(decl) = line_data
                        .direct
                        .or_else(|| line_data.inherited_sources.first().map(|s| s.decl))
                    {
                        if self.single_param_ty(decl).is_some() {
                            methods.push(decl);
                        }
                    }
                }
            }
            scope = data.parent;
        }
        methods
    }

    fn single_param_ty(&self, decl: DeclId) -> Option<TypeId> {
        match &self.decl_view(decl).kind {
            DeclKind::Method(method) if method.params.len() == 1 => {
                Some(method.params[0].ty)
            }
            _ => None,
        }
    }

    /// One-step edges whose result matches `need`, as single-step entries
    fn edges_into(
        &mut self,
        methods: &[DeclId],
        need: TypeId,
        existing: &[ConversionStep],
    ) -> Result<Vec<Entry>, Ice> {
        let mut entries = Vec::new();
        for &method in methods {
            // A method already used on this path contributes no second edge;
            // conversion chains do not revisit the same converter.
            if existing.iter().any(|step| step.method == method) {
                continue;
            }
            let (generics, param_ty, result_ty) = match &self.decl_view(method).kind {
                DeclKind::Method(decl) if decl.params.len() == 1 => (
                    decl.generics.clone(),
                    decl.params[0].ty,
                    decl.result,
                ),
                _ => continue,
            };

            if generics.is_empty() {
                if self.types_equal(result_ty, need) {
                    entries.push(Entry {
                        source: param_ty,
                        steps: vec![ConversionStep {
                            method,
                            subst: Substitution::new(),
                            result: need,
                        }],
                        cost: Cost {
                            steps: 1,
                            generic: 0,
                        },
                    });
                }
            } else {
                let mut binding: FxHashMap<DeclId, TypeId> = FxHashMap::default();
                if self.match_type_pattern(result_ty, need, &generics, &mut binding) {
                    let subst = Substitution::from_pairs(
                        binding.iter().map(|(param, ty)| (*param, Term::Type(*ty))),
                    );
                    let source = subst.apply_type(&mut self.module, param_ty);
                    entries.push(Entry {
                        source,
                        steps: vec![ConversionStep {
                            method,
                            subst,
                            result: need,
                        }],
                        cost: Cost {
                            steps: 1,
                            generic: generics.len() as u32,
                        },
                    });
                }
            }
        }
        Ok(entries)
    }

    /// Match a type pattern containing generic parameters against a concrete
    /// type, accumulating consistent bindings
    fn match_type_pattern(
        &self,
        pattern: TypeId,
        concrete: TypeId,
        generics: &[DeclId],
        binding: &mut FxHashMap<DeclId, TypeId>,
    ) -> bool {
        match self.module.types.get(pattern).clone() {
            Type::GenericParam(param) if generics.contains(&param) => {
                match binding.get(&param) {
                    Some(bound) => self.types_equal(*bound, concrete),
                    None => {
                        binding.insert(param, concrete);
                        true
                    }
                }
            }
            Type::FreqQual { freq, data } => match self.module.types.get(concrete).clone() {
                Type::FreqQual {
                    freq: concrete_freq,
                    data: concrete_data,
                } => {
                    freq == concrete_freq
                        && self.match_type_pattern(data, concrete_data, generics, binding)
                }
                _ => false,
            },
            _ => self.types_equal(pattern, concrete),
        }
    }
}
