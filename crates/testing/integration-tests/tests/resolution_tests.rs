//! End-to-end resolution scenarios
//!
//! Each test builds a small source module programmatically, resolves it, and
//! asserts on the resolved tree and the diagnostic stream.

use integration_tests::{global_named, line_named, pipeline_decl, with_code, TestModule};
use wf_ast::{BaseKind, Ident, Item, ItemKind, Modifier, StructItem};
use wf_diagnostics::Severity;
use wf_sema::{Concreteness, DeclKind, ExprKind, Type};

/// An empty struct declaration, used as an opaque nominal type
fn strukt(module: &mut TestModule, name: &str) -> Item {
    let ident: Ident = module.ident(name);
    Item {
        name: ident,
        modifiers: module.mods(&[]),
        span: ident.span,
        kind: ItemKind::Struct(StructItem { fields: Vec::new() }),
    }
}

#[test]
fn test_linearization_is_most_derived_first_and_deterministic() {
    let build = || {
        let mut module = TestModule::new();
        let b1 = module.pipeline("B1", &[], Vec::new(), &[Modifier::Abstract]);
        module.push(b1);
        let b2 = module.pipeline(
            "B2",
            &[("B1", BaseKind::Primary)],
            Vec::new(),
            &[Modifier::Abstract],
        );
        module.push(b2);
        let d = module.pipeline(
            "D",
            &[("B1", BaseKind::Primary), ("B2", BaseKind::Mixin)],
            Vec::new(),
            &[Modifier::Abstract],
        );
        module.push(d);
        module
    };

    let module = build();
    let resolution = module.resolve();
    assert!(!resolution.diagnostics.has_errors());

    let b1 = global_named(&resolution, &module.interner, "B1").unwrap();
    let b2 = global_named(&resolution, &module.interner, "B2").unwrap();
    let d = global_named(&resolution, &module.interner, "D").unwrap();

    // B2 derives from B1, so B2 must come first (most-derived first).
    assert_eq!(pipeline_decl(&resolution, d).ancestors, vec![b2, b1]);

    // Same inputs, same order.
    let again = build().resolve();
    let d_again = global_named(&again, &module.interner, "D").unwrap();
    assert_eq!(
        pipeline_decl(&again, d_again).ancestors.len(),
        pipeline_decl(&resolution, d).ancestors.len()
    );
}

#[test]
fn test_override_fills_abstract_member_line() {
    let mut module = TestModule::new();
    let abstract_x = module.attribute("x", None, "int", None, &[Modifier::Abstract]);
    let a = module.pipeline("A", &[], vec![abstract_x], &[Modifier::Abstract]);
    module.push(a);

    let one = module.int_lit(1);
    let override_x = module.attribute("x", None, "int", Some(one), &[Modifier::Override]);
    let b = module.pipeline("B", &[("A", BaseKind::Primary)], vec![override_x], &[]);
    module.push(b);

    let resolution = module.resolve();
    assert!(
        !resolution.diagnostics.has_errors(),
        "unexpected diagnostics: {:?}",
        resolution.diagnostics.all()
    );

    let b = global_named(&resolution, &module.interner, "B").unwrap();
    let line = line_named(&resolution, &module.interner, b, "x").unwrap();
    let line_data = &resolution.module.lines[line];
    assert_ne!(line_data.concreteness, Concreteness::Abstract);

    // The effective declaration is the override, carrying the initializer.
    let effective = line_data.effective().expect("line must be forced");
    match &resolution.module.decl(effective).kind {
        DeclKind::Attribute(attr) => {
            let init = attr.init.expect("override carries its initializer");
            assert_eq!(resolution.module.exprs[init].kind, ExprKind::IntLit(1));
        }
        other => panic!("expected an attribute, found {other:?}"),
    }

    // The inherited alternative was synthesized behind the override.
    assert_eq!(line_data.inherited_sources.len(), 1);
    assert!(line_data.inherited[0].is_some());
}

#[test]
fn test_non_abstract_pipeline_rejects_remaining_abstract_member() {
    let mut module = TestModule::new();
    let abstract_y = module.attribute("y", None, "int", None, &[Modifier::Abstract]);
    let c = module.pipeline("C", &[], vec![abstract_y], &[]);
    module.push(c);

    let resolution = module.resolve();
    assert_eq!(with_code(&resolution, "resolve::abstract_member_remains").len(), 1);
}

#[test]
fn test_abstract_pipeline_may_keep_abstract_members() {
    let mut module = TestModule::new();
    let abstract_y = module.attribute("y", None, "int", None, &[Modifier::Abstract]);
    let c = module.pipeline("C", &[], vec![abstract_y], &[Modifier::Abstract]);
    module.push(c);

    let resolution = module.resolve();
    assert!(!resolution.diagnostics.has_errors());
}

#[test]
fn test_int_literal_lifts_to_qualified_float_parameter() {
    let mut module = TestModule::new();

    let element_v = module.element("v", &[]);
    let param_ty = module.freq_ty("v", "float");
    let result_ty = module.freq_ty("v", "float");
    let body = module.name_expr("x");
    let method_f = module.method("f", &[("x", param_ty)], result_ty, Some(body), &[]);
    let call = module.int_lit(3);
    let call = {
        let arg = module.arg(call);
        module.call("f", vec![arg])
    };
    let attr_y = module.attribute("y", Some("v"), "float", Some(call), &[]);

    let p = module.pipeline("P", &[], vec![element_v, method_f, attr_y], &[]);
    module.push(p);

    let resolution = module.resolve();
    assert!(
        !resolution.diagnostics.has_errors(),
        "unexpected diagnostics: {:?}",
        resolution.diagnostics.all()
    );

    // The argument was converted int -> float, then frequency-lifted.
    let p = global_named(&resolution, &module.interner, "P").unwrap();
    let line = line_named(&resolution, &module.interner, p, "y").unwrap();
    let attr = resolution.module.lines[line].direct.unwrap();
    let init = match &resolution.module.decl(attr).kind {
        DeclKind::Attribute(attr) => attr.init.unwrap(),
        other => panic!("expected an attribute, found {other:?}"),
    };
    let args = match &resolution.module.exprs[init].kind {
        ExprKind::CallMethod { args, .. } => args.clone(),
        other => panic!("expected a method call, found {other:?}"),
    };
    let arg_ty = resolution.module.exprs[args[0]].ty;
    match resolution.module.types.get(arg_ty) {
        Type::FreqQual { data, .. } => {
            assert!(matches!(resolution.module.types.get(*data), Type::Float));
        }
        other => panic!("argument should be frequency-qualified, found {other:?}"),
    }
    assert!(matches!(
        resolution.module.exprs[args[0]].kind,
        ExprKind::CallBuiltin { .. }
    ));
}

#[test]
fn test_conversion_free_candidate_beats_converting_candidate() {
    let mut module = TestModule::new();
    let int_ty = module.name_term("int");
    let int_result = module.name_term("int");
    let h_int = module.method("h", &[("x", int_ty)], int_result, None, &[]);
    module.push(h_int);
    let float_ty = module.name_term("float");
    let float_result = module.name_term("float");
    let h_float = module.method("h", &[("x", float_ty)], float_result, None, &[]);
    module.push(h_float);

    let three = module.int_lit(3);
    let call = {
        let arg = module.arg(three);
        module.call("h", vec![arg])
    };
    let w = module.field("w", "int", Some(call), &[]);
    module.push(w);

    let resolution = module.resolve();
    assert!(with_code(&resolution, "resolve::ambiguous_overload").is_empty());
    assert!(
        !resolution.diagnostics.has_errors(),
        "unexpected diagnostics: {:?}",
        resolution.diagnostics.all()
    );

    let w = global_named(&resolution, &module.interner, "w").unwrap();
    let init = match &resolution.module.decl(w).kind {
        DeclKind::Field(field) => field.init.unwrap(),
        other => panic!("expected a field, found {other:?}"),
    };
    assert!(matches!(
        resolution.module.types.get(resolution.module.exprs[init].ty),
        Type::Int
    ));
}

#[test]
fn test_unrelated_conversions_yield_no_conversion_not_ambiguous() {
    let mut module = TestModule::new();
    let sa = strukt(&mut module, "SA");
    module.push(sa);
    let sb = strukt(&mut module, "SB");
    module.push(sb);

    let int_a = module.name_term("int");
    let sa_result = module.name_term("SA");
    let mka = module.method("mka", &[("x", int_a)], sa_result, None, &[]);
    module.push(mka);
    let int_b = module.name_term("int");
    let sb_result = module.name_term("SB");
    let mkb = module.method("mkb", &[("x", int_b)], sb_result, None, &[]);
    module.push(mkb);

    let bool_param = module.name_term("bool");
    let bool_result = module.name_term("bool");
    let want = module.method("want", &[("b", bool_param)], bool_result, None, &[]);
    module.push(want);

    let three = module.int_lit(3);
    let call = {
        let arg = module.arg(three);
        module.call("want", vec![arg])
    };
    let q = module.field("q", "bool", Some(call), &[]);
    module.push(q);

    let resolution = module.resolve();
    assert_eq!(with_code(&resolution, "resolve::no_conversion").len(), 1);
    assert!(with_code(&resolution, "resolve::ambiguous_conversion").is_empty());
    assert!(with_code(&resolution, "resolve::ambiguous_overload").is_empty());
}

#[test]
fn test_element_ctor_unknown_keyword_is_reported_by_name() {
    let mut module = TestModule::new();
    let element_v = module.element("v", &[]);
    let pos = module.attribute("pos", Some("v"), "float", None, &[Modifier::Input]);

    let one = module.int_lit(1);
    let ctor = {
        let bogus = module.named_arg("bogus", one);
        module.call("v", vec![bogus])
    };
    let let_r = module.let_stmt("r", ctor);
    let zero = module.float_lit(0.0);
    let body = module.block(vec![let_r], Some(zero));
    let float_result = module.name_term("float");
    let method_m = module.method("m", &[], float_result, Some(body), &[]);

    let p = module.pipeline("P2", &[], vec![element_v, pos, method_m], &[]);
    module.push(p);

    let resolution = module.resolve();
    let unknown = with_code(&resolution, "resolve::unknown_keyword");
    assert_eq!(unknown.len(), 1);
    assert!(unknown[0].message.contains("bogus"));
    // The arity stage fails on the keyword before any missing-attribute
    // complaint.
    assert!(with_code(&resolution, "resolve::missing_argument").is_empty());
}

#[test]
fn test_error_sentinel_does_not_cascade() {
    let mut module = TestModule::new();
    let nope = module.name_expr("does_not_exist");
    let two = module.int_lit(2);
    let sum = module.binary("+", nope, two);
    let w = module.field("w2", "int", Some(sum), &[]);
    module.push(w);

    let resolution = module.resolve();
    assert_eq!(resolution.diagnostics.error_count(), 1);
    assert_eq!(with_code(&resolution, "resolve::undefined_name").len(), 1);
    assert!(with_code(&resolution, "resolve::ambiguous_overload").is_empty());
    assert!(with_code(&resolution, "resolve::no_overload").is_empty());
}

#[test]
fn test_frequency_mismatch_between_elements() {
    let mut module = TestModule::new();
    let element_u = module.element("u", &[]);
    let element_v = module.element("v", &[]);
    let one = module.float_lit(1.0);
    let b = module.attribute("b", Some("v"), "float", Some(one), &[]);
    let b_ref = module.name_expr("b");
    let a = module.attribute("a", Some("u"), "float", Some(b_ref), &[]);
    let q = module.pipeline("Q", &[], vec![element_u, element_v, b, a], &[]);
    module.push(q);

    let resolution = module.resolve();
    assert_eq!(with_code(&resolution, "resolve::frequency_mismatch").len(), 1);
}

#[test]
fn test_cyclic_inheritance_is_reported_not_fatal() {
    let mut module = TestModule::new();
    let a = module.pipeline(
        "A2",
        &[("B2x", BaseKind::Mixin)],
        Vec::new(),
        &[Modifier::Abstract],
    );
    module.push(a);
    let b = module.pipeline(
        "B2x",
        &[("A2", BaseKind::Mixin)],
        Vec::new(),
        &[Modifier::Abstract],
    );
    module.push(b);

    let resolution = module.resolve();
    assert!(!with_code(&resolution, "resolve::cyclic_inheritance").is_empty());
}

#[test]
fn test_unmarked_member_collision_warns_and_hides() {
    let mut module = TestModule::new();
    let z_base = module.attribute("z", None, "int", None, &[]);
    let a = module.pipeline("A3", &[], vec![z_base], &[Modifier::Abstract]);
    module.push(a);
    let z_hidden = module.attribute("z", None, "int", None, &[]);
    let b = module.pipeline(
        "B3",
        &[("A3", BaseKind::Primary)],
        vec![z_hidden],
        &[Modifier::Abstract],
    );
    module.push(b);

    let resolution = module.resolve();
    let hidden = with_code(&resolution, "resolve::hidden_member");
    assert_eq!(hidden.len(), 1);
    assert_eq!(hidden[0].severity, Severity::Warning);
}

#[test]
fn test_keyword_arguments_bind_by_name_then_positionally() {
    let mut module = TestModule::new();
    let a_ty = module.name_term("int");
    let b_ty = module.name_term("int");
    let result = module.name_term("int");
    let sub2 = module.method("sub2", &[("a", a_ty), ("b", b_ty)], result, None, &[]);
    module.push(sub2);

    let one = module.int_lit(1);
    let two = module.int_lit(2);
    let call = {
        let named = module.named_arg("b", one);
        let positional = module.arg(two);
        module.call("sub2", vec![named, positional])
    };
    let k = module.field("k", "int", Some(call), &[]);
    module.push(k);

    let resolution = module.resolve();
    assert!(
        !resolution.diagnostics.has_errors(),
        "unexpected diagnostics: {:?}",
        resolution.diagnostics.all()
    );
}

#[test]
fn test_rejected_candidates_are_named_in_info_diagnostics() {
    let mut module = TestModule::new();
    let a_ty = module.name_term("int");
    let result = module.name_term("int");
    let only = module.method("only", &[("a", a_ty)], result, None, &[]);
    module.push(only);
    let b_ty = module.name_term("bool");
    let result_b = module.name_term("bool");
    let only_b = module.method("only", &[("a", b_ty), ("b", b_ty)], result_b, None, &[]);
    module.push(only_b);

    // Three arguments match neither overload.
    let x = module.int_lit(1);
    let y = module.int_lit(2);
    let z = module.int_lit(3);
    let call = {
        let x = module.arg(x);
        let y = module.arg(y);
        let z = module.arg(z);
        module.call("only", vec![x, y, z])
    };
    let t = module.field("t", "int", Some(call), &[]);
    module.push(t);

    let resolution = module.resolve();
    assert_eq!(with_code(&resolution, "resolve::no_overload").len(), 1);
    let rejected = with_code(&resolution, "resolve::candidate_rejected");
    assert_eq!(rejected.len(), 2);
    assert!(rejected.iter().all(|diag| diag.severity == Severity::Info));
}
