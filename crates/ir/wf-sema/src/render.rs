//! Rendering of types, terms and signatures for diagnostics

use crate::decl::{DeclKind, MethodDecl};
use crate::module::{DeclId, Module};
use crate::term::Term;
use crate::ty::{Type, TypeId};
use wf_intern::{Interner, Symbol};

/// Renders semantic entities against a module and an interner
pub struct Renderer<'a> {
    module: &'a Module,
    interner: &'a Interner,
}

impl<'a> Renderer<'a> {
    /// Create a renderer
    pub fn new(module: &'a Module, interner: &'a Interner) -> Self {
        Self { module, interner }
    }

    /// Render an interned name
    pub fn name(&self, name: Symbol) -> String {
        self.interner.resolve(&name)
    }

    /// The name of a declaration; declarations still under construction
    /// render as a placeholder instead of failing
    pub fn decl_name(&self, decl: DeclId) -> String {
        match self.module.try_decl(decl) {
            Some(declaration) => self.name(declaration.name),
            None => "<pending>".to_string(),
        }
    }

    /// Render a type
    pub fn ty(&self, ty: TypeId) -> String {
        match self.module.types.get(ty) {
            Type::Error => "<error>".to_string(),
            Type::Bool => "bool".to_string(),
            Type::Int => "int".to_string(),
            Type::Float => "float".to_string(),
            Type::Struct(decl)
            | Type::Pipeline(decl)
            | Type::Element(decl)
            | Type::GenericParam(decl)
            | Type::TypeSlot(decl)
            | Type::Concept(decl) => self.decl_name(*decl),
            Type::FreqQual { freq, data } => {
                let freq_name = self.decl_name(freq.decl);
                format!("@{freq_name} {}", self.ty(*data))
            }
            Type::Placeholder(id) => format!("?{}", id.0),
        }
    }

    /// Render a declaration the way a diagnostic names a candidate
    pub fn decl_signature(&self, decl: DeclId) -> String {
        let Some(declaration) = self.module.try_decl(decl) else {
            return "<pending>".to_string();
        };
        let name = self.name(declaration.name);
        match &declaration.kind {
            DeclKind::Method(method) => self.method_signature(&name, method),
            DeclKind::Attribute(attr) => format!("{} {name}", self.ty(attr.ty)),
            DeclKind::Field(field) => format!("{} {name}", self.ty(field.ty)),
            DeclKind::Element(_) => format!("element {name}"),
            DeclKind::Struct(_) => format!("struct {name}"),
            DeclKind::Pipeline(_) => format!("pipeline {name}"),
            DeclKind::Concept(_) => format!("concept {name}"),
            DeclKind::TypeSlot(_) => format!("type {name}"),
            DeclKind::GenericParam(_) => name,
        }
    }

    fn method_signature(&self, name: &str, method: &MethodDecl) -> String {
        let mut out = String::new();
        out.push_str(&self.ty(method.result));
        out.push(' ');
        out.push_str(name);
        if !method.generics.is_empty() {
            out.push('<');
            for (index, generic) in method.generics.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                out.push_str(&self.decl_name(*generic));
            }
            out.push('>');
        }
        out.push('(');
        for (index, param) in method.params.iter().enumerate() {
            if index > 0 {
                out.push_str(", ");
            }
            out.push_str(&self.ty(param.ty));
            out.push(' ');
            out.push_str(&self.name(param.name));
        }
        out.push(')');
        out
    }

    /// Render a term the way a diagnostic names a callee
    pub fn term(&self, term: &Term) -> String {
        match term {
            Term::Error => "<error>".to_string(),
            Term::Layered { first, .. } => self.term(first),
            Term::Overloaded { alts } => match alts.first() {
                Some(first) => self.term(first),
                None => "<empty overload set>".to_string(),
            },
            Term::CategoryGroup { members, .. } => match members.first() {
                Some(member) => self.decl_name(member.decl),
                None => "<empty member group>".to_string(),
            },
            Term::Expr(expr) => format!("<{}>", self.ty(self.module.exprs[*expr].ty)),
            Term::Type(ty) => self.ty(*ty),
            Term::Member(member) => self.decl_name(member.decl),
        }
    }

    /// Render an argument list the way call-resolution errors describe it
    pub fn call_shape(&self, args: &[(Option<Symbol>, TypeId)]) -> String {
        let mut out = String::from("(");
        for (index, (name, ty)) in args.iter().enumerate() {
            if index > 0 {
                out.push_str(", ");
            }
            if let Some(name) = name {
                out.push_str(&self.name(*name));
                out.push_str(": ");
            }
            out.push_str(&self.ty(*ty));
        }
        out.push(')');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::{DeclBuilder, DeclKind, MethodBody, MethodDecl, Param};
    use expect_test::expect;
    use wf_span::FileSpan;

    #[test]
    fn test_render_method_signature() {
        let interner = Interner::new();
        let mut module = Module::new();
        let key = module.fresh_line_key();
        let float = module.types.float();
        let int = module.types.int();
        let method = DeclBuilder::new(interner.intern("lerp"), FileSpan::synthesized(), key)
            .kind(DeclKind::Method(MethodDecl {
                generics: Vec::new(),
                params: vec![
                    Param {
                        name: interner.intern("a"),
                        ty: float,
                        span: FileSpan::synthesized(),
                        optional: false,
                        decl: module.reserve_decl(),
                    },
                    Param {
                        name: interner.intern("t"),
                        ty: int,
                        span: FileSpan::synthesized(),
                        optional: false,
                        decl: module.reserve_decl(),
                    },
                ],
                result: float,
                body: MethodBody::None,
            }))
            .seal_new(&mut module)
            .unwrap();

        let renderer = Renderer::new(&module, &interner);
        let rendered = renderer.decl_signature(method);
        expect!["float lerp(float a, int t)"].assert_eq(&rendered);
    }

    #[test]
    fn test_render_call_shape() {
        let interner = Interner::new();
        let module = Module::new();
        let renderer = Renderer::new(&module, &interner);
        let shape = renderer.call_shape(&[
            (None, module.types.int()),
            (Some(interner.intern("t")), module.types.float()),
        ]);
        expect!["(int, t: float)"].assert_eq(&shape);
    }
}
