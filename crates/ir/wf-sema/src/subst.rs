//! Structural substitution
//!
//! A substitution maps parameter declarations (generic parameters, a
//! pipeline's `this`, self-type references) to replacement terms. Applying
//! one rebuilds types, expressions and whole declarations into fresh arena
//! nodes; the originals are never touched, and the output of an application
//! is never fed through the same substitution again.

use crate::decl::{
    AttributeDecl, ConceptDecl, Decl, DeclKind, DeclMode, FieldDecl, GenericParamDecl,
    GenericParamKind, MethodBody, MethodDecl, Param, TypeSlotDecl,
};
use crate::expr::{ExprKind, SwitchCase};
use crate::module::{DeclId, ExprId, Ice, Module};
use crate::term::Term;
use crate::ty::{Type, TypeId};
use rustc_hash::FxHashMap;

/// A finite map from parameter declarations to replacement terms
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Substitution {
    map: FxHashMap<DeclId, Term>,
}

impl Substitution {
    /// Create an empty substitution
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a substitution from `(parameter, replacement)` pairs
    pub fn from_pairs(pairs: impl IntoIterator<Item = (DeclId, Term)>) -> Self {
        Self {
            map: pairs.into_iter().collect(),
        }
    }

    /// Map one parameter to a replacement term
    pub fn insert(&mut self, param: DeclId, replacement: Term) {
        self.map.insert(param, replacement);
    }

    /// The replacement for a parameter, if mapped
    pub fn get(&self, param: DeclId) -> Option<&Term> {
        self.map.get(&param)
    }

    /// Whether the substitution maps nothing
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Demand a type out of a replacement term
    fn replacement_type(&self, module: &Module, param: DeclId) -> Option<TypeId> {
        match self.map.get(&param)? {
            Term::Type(ty) => Some(*ty),
            // A non-type replacement in type position produces the error
            // sentinel; the candidate that set the substitution up has
            // already diagnosed the mismatch.
            _ => Some(module.types.error()),
        }
    }

    /// Apply to a type, rebuilding only what the substitution touches
    pub fn apply_type(&self, module: &mut Module, ty: TypeId) -> TypeId {
        if self.map.is_empty() {
            return ty;
        }
        match module.types.get(ty).clone() {
            Type::GenericParam(decl)
            | Type::TypeSlot(decl)
            | Type::Struct(decl)
            | Type::Pipeline(decl)
            | Type::Element(decl) => self.replacement_type(module, decl).unwrap_or(ty),
            Type::FreqQual { freq, data } => {
                let new_data = self.apply_type(module, data);
                if new_data == data {
                    ty
                } else {
                    module.types.freq_qual(freq, new_data)
                }
            }
            Type::Error
            | Type::Bool
            | Type::Int
            | Type::Float
            | Type::Concept(_)
            | Type::Placeholder(_) => ty,
        }
    }

    /// Apply to an expression, producing a fresh node tree
    pub fn apply_expr(&self, module: &mut Module, expr: ExprId) -> ExprId {
        let node = module.exprs[expr].clone();
        let ty = self.apply_type(module, node.ty);
        let kind = match node.kind {
            ExprKind::VarRef(decl) | ExprKind::AttrRef(decl) if self.map.contains_key(&decl) => {
                match self.map.get(&decl) {
                    Some(Term::Expr(replacement)) => return *replacement,
                    // Non-expression replacement in expression position;
                    // already diagnosed where the substitution was built.
                    _ => ExprKind::Error,
                }
            }
            ExprKind::Error => ExprKind::Error,
            ExprKind::IntLit(value) => ExprKind::IntLit(value),
            ExprKind::FloatLit(value) => ExprKind::FloatLit(value),
            ExprKind::BoolLit(value) => ExprKind::BoolLit(value),
            ExprKind::VarRef(decl) => ExprKind::VarRef(decl),
            ExprKind::AttrRef(decl) => ExprKind::AttrRef(decl),
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => ExprKind::If {
                cond: self.apply_expr(module, cond),
                then_branch: self.apply_expr(module, then_branch),
                else_branch: self.apply_expr(module, else_branch),
            },
            ExprKind::Switch {
                scrutinee,
                cases,
                default,
            } => ExprKind::Switch {
                scrutinee: self.apply_expr(module, scrutinee),
                cases: cases
                    .into_iter()
                    .map(|case| SwitchCase {
                        value: self.apply_expr(module, case.value),
                        body: self.apply_expr(module, case.body),
                    })
                    .collect(),
                default: self.apply_expr(module, default),
            },
            ExprKind::For { var, iter, body } => ExprKind::For {
                var,
                iter: self.apply_expr(module, iter),
                body: self.apply_expr(module, body),
            },
            ExprKind::Let { var, value, body } => ExprKind::Let {
                var,
                value: self.apply_expr(module, value),
                body: self.apply_expr(module, body),
            },
            ExprKind::Assign { target, value } => ExprKind::Assign {
                target: self.apply_expr(module, target),
                value: self.apply_expr(module, value),
            },
            ExprKind::Block { stmts, result } => ExprKind::Block {
                stmts: stmts
                    .into_iter()
                    .map(|stmt| self.apply_expr(module, stmt))
                    .collect(),
                result: result.map(|result| self.apply_expr(module, result)),
            },
            ExprKind::CallMethod { method, args } => ExprKind::CallMethod {
                method,
                args: args
                    .into_iter()
                    .map(|arg| self.apply_expr(module, arg))
                    .collect(),
            },
            ExprKind::CallBuiltin { op, args } => ExprKind::CallBuiltin {
                op,
                args: args
                    .into_iter()
                    .map(|arg| self.apply_expr(module, arg))
                    .collect(),
            },
            ExprKind::AttrFetch { base, attr } => ExprKind::AttrFetch {
                base: self.apply_expr(module, base),
                attr,
            },
            ExprKind::FieldRef { base, field } => ExprKind::FieldRef {
                base: self.apply_expr(module, base),
                field,
            },
            ExprKind::ElementCtor { element, args } => ExprKind::ElementCtor {
                element,
                args: args
                    .into_iter()
                    .map(|(attr, value)| (attr, self.apply_expr(module, value)))
                    .collect(),
            },
            ExprKind::ConceptWitness { concept, members } => {
                ExprKind::ConceptWitness { concept, members }
            }
        };
        module.expr(kind, ty, node.span)
    }

    /// Synthesize a fresh declaration by re-running the original under this
    /// substitution
    ///
    /// The line key is preserved (it identifies the logical member), the
    /// mode is replaced by `mode`, and every type and expression in the
    /// payload is rebuilt.
    ///
    /// # Errors
    ///
    /// Returns an [`Ice`] if sealing the synthesized declaration fails.
    pub fn apply_decl(
        &self,
        module: &mut Module,
        original: DeclId,
        mode: DeclMode,
    ) -> Result<DeclId, Ice> {
        let decl = module.decl(original).clone();
        let kind = match decl.kind {
            DeclKind::Attribute(attr) => DeclKind::Attribute(AttributeDecl {
                ty: self.apply_type(module, attr.ty),
                init: attr.init.map(|init| self.apply_expr(module, init)),
            }),
            DeclKind::Field(field) => DeclKind::Field(FieldDecl {
                ty: self.apply_type(module, field.ty),
                init: field.init.map(|init| self.apply_expr(module, init)),
            }),
            DeclKind::Method(method) => DeclKind::Method(MethodDecl {
                generics: method.generics.clone(),
                params: method
                    .params
                    .into_iter()
                    .map(|param| Param {
                        ty: self.apply_type(module, param.ty),
                        ..param
                    })
                    .collect(),
                result: self.apply_type(module, method.result),
                body: match method.body {
                    MethodBody::Expr(body) => MethodBody::Expr(self.apply_expr(module, body)),
                    other => other,
                },
            }),
            passthrough @ (DeclKind::Element(_) | DeclKind::Struct(_) | DeclKind::Pipeline(_)) => {
                passthrough
            }
            DeclKind::GenericParam(param) => DeclKind::GenericParam(GenericParamDecl {
                kind: match param.kind {
                    GenericParamKind::Type { upper } => GenericParamKind::Type {
                        upper: upper.map(|upper| self.apply_type(module, upper)),
                    },
                    GenericParamKind::Value { ty } => GenericParamKind::Value {
                        ty: self.apply_type(module, ty),
                    },
                },
            }),
            DeclKind::Concept(concept) => DeclKind::Concept(ConceptDecl {
                members: concept.members,
            }),
            DeclKind::TypeSlot(slot) => DeclKind::TypeSlot(TypeSlotDecl {
                bound: slot.bound.map(|bound| self.apply_type(module, bound)),
            }),
        };
        let id = module.reserve_decl();
        module.fill_decl(
            id,
            Decl {
                name: decl.name,
                span: decl.span,
                line_key: decl.line_key,
                concreteness: decl.concreteness,
                mode,
                tags: decl.tags,
                kind,
            },
        )?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::{DeclBuilder, FieldDecl};
    use crate::ty::Type;
    use wf_intern::Interner;
    use wf_span::FileSpan;

    #[test]
    fn test_empty_substitution_is_identity_on_types() {
        let mut module = Module::new();
        let ty = module.types.int();
        let subst = Substitution::new();
        assert_eq!(subst.apply_type(&mut module, ty), ty);
    }

    #[test]
    fn test_generic_param_replacement() {
        let interner = Interner::new();
        let mut module = Module::new();
        let key = module.fresh_line_key();
        let param = DeclBuilder::new(interner.intern("T"), FileSpan::synthesized(), key)
            .kind(DeclKind::GenericParam(GenericParamDecl {
                kind: GenericParamKind::Type { upper: None },
            }))
            .seal_new(&mut module)
            .unwrap();
        let param_ty = module.types.alloc(Type::GenericParam(param));

        let mut subst = Substitution::new();
        subst.insert(param, Term::Type(module.types.float()));
        assert_eq!(subst.apply_type(&mut module, param_ty), module.types.float());
    }

    #[test]
    fn test_apply_decl_preserves_line_key() {
        let interner = Interner::new();
        let mut module = Module::new();
        let key = module.fresh_line_key();
        let ty = module.types.int();
        let original = DeclBuilder::new(interner.intern("x"), FileSpan::synthesized(), key)
            .kind(DeclKind::Field(FieldDecl { ty, init: None }))
            .seal_new(&mut module)
            .unwrap();

        let subst = Substitution::new();
        let inherited = subst
            .apply_decl(&mut module, original, DeclMode::Inherited)
            .unwrap();
        assert_ne!(inherited, original);
        assert_eq!(module.decl(inherited).line_key, key);
        assert_eq!(module.decl(inherited).mode, DeclMode::Inherited);
    }
}
