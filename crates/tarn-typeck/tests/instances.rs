//! Integration tests for type-class checking and dictionary elaboration.
//!
//! Class methods compile to ordinary functions taking their dictionary as
//! an extra leading argument. These tests assert on the rewritten syntax
//! trees: constrained definitions grow dictionary lambdas, method calls at
//! concrete types reference the instance's dictionary value, and method
//! calls at generic types pass the enclosing definition's dictionary
//! through. Resolution failures and ambiguities come out as diagnostics.

use rowan::TextRange;
use tarn_ast::{
    span, ClassConstraint, ClassDef, Clause, DataDef, DataVariant, Expr, FieldDef, Import,
    InstanceDef, Item, Module, Pattern, SignatureDecl, Symbol, TypeExpr, ValueDef,
};
use tarn_typeck::builtins::core_registry;
use tarn_typeck::error::TypeError;
use tarn_typeck::ty::Ty;
use tarn_typeck::TypeckResult;

// ── Helpers ────────────────────────────────────────────────────────────

/// Hands out non-overlapping spans so every node records its own entry in
/// the span-to-type table.
struct Spans(u32);

impl Spans {
    fn new() -> Spans {
        Spans(10)
    }

    fn next(&mut self) -> TextRange {
        let start = self.0;
        self.0 += 2;
        span(start, start + 1)
    }
}

fn check(module: &mut Module) -> TypeckResult {
    let registry = core_registry();
    tarn_typeck::check_module(&registry, module)
}

fn check_all(modules: &mut [Module]) -> TypeckResult {
    let registry = core_registry();
    tarn_typeck::check_modules(&registry, modules)
}

fn module(name: &str, items: Vec<Item>) -> Module {
    let mut module = Module::new(name, span(0, 1));
    module.items = items;
    module
}

fn importing(name: &str, imports: &[&str], items: Vec<Item>, s: &mut Spans) -> Module {
    let mut m = module(name, items);
    m.imports = imports
        .iter()
        .map(|i| Import {
            module: i.to_string(),
            span: s.next(),
        })
        .collect();
    m
}

fn value(name: &str, body: Expr, sp: TextRange) -> Item {
    Item::Value(ValueDef::new(name, body, sp))
}

fn bare(name: &str, sp: TextRange) -> Expr {
    Expr::var(Symbol::bare(name), sp)
}

/// `class Pretty p` with a single member `pretty : p -> String`.
fn pretty_class(s: &mut Spans) -> Item {
    Item::Class(ClassDef {
        name: "Pretty".to_string(),
        var: "p".to_string(),
        members: vec![SignatureDecl {
            name: "pretty".to_string(),
            ty: TypeExpr::fun(
                TypeExpr::var("p", s.next()),
                TypeExpr::name(Symbol::bare("String"), s.next()),
                s.next(),
            ),
            span: s.next(),
        }],
        span: s.next(),
    })
}

fn pretty_instance(s: &mut Spans, head: TypeExpr, members: Vec<ValueDef>) -> Item {
    Item::Instance(InstanceDef {
        class: Symbol::bare("Pretty"),
        params: vec![head],
        members,
        span: s.next(),
    })
}

fn pretty_member(s: &mut Spans, text: &str) -> ValueDef {
    let body = Expr::lambda(
        Pattern::var("_v", s.next()),
        Expr::string(text, s.next()),
        s.next(),
    );
    ValueDef::new("pretty", body, s.next())
}

/// Splits a rewritten method or function reference `f d` into the callee
/// symbol and the dictionary symbol.
fn as_dict_application(expr: &Expr) -> (&Symbol, &Symbol) {
    let Expr::Apply {
        function, argument, ..
    } = expr
    else {
        panic!("expected a dictionary application, got {expr:?}");
    };
    let Expr::Var { symbol: callee, .. } = &**function else {
        panic!("expected a callee reference, got {function:?}");
    };
    let Expr::Var { symbol: dict, .. } = &**argument else {
        panic!("expected a dictionary reference, got {argument:?}");
    };
    (callee, dict)
}

fn assert_clean(result: &TypeckResult) {
    assert!(
        result.errors.is_empty(),
        "expected no errors, got: {:?}",
        result.errors
    );
}

// ── Dictionary abstraction ─────────────────────────────────────────────

#[test]
fn test_constrained_definition_takes_a_leading_dictionary() {
    // add a b = a + b
    let mut s = Spans::new();
    let body = Expr::apply(
        Expr::apply(bare("+", s.next()), bare("a", s.next()), s.next()),
        bare("b", s.next()),
        s.next(),
    );
    let clauses = Expr::clauses(
        vec![Clause::new(
            vec![Pattern::var("a", s.next()), Pattern::var("b", s.next())],
            body,
            s.next(),
        )],
        s.next(),
    );
    let mut m = module("Main", vec![value("add", clauses, s.next())]);

    let result = check(&mut m);
    assert_clean(&result);

    // the scheme keeps one constrained variable across both parameters
    let ty = result.result_type.as_ref().expect("a result type");
    let Ty::Fun { arg, ret } = ty else {
        panic!("add should be a function, got {ty}");
    };
    let Ty::Fun {
        arg: arg2,
        ret: ret2,
    } = &**ret
    else {
        panic!("add should take two parameters, got {ty}");
    };
    assert_eq!(arg, arg2);
    assert_eq!(arg, ret2);
    let Ty::Var(var) = &**arg else {
        panic!("add should stay generic, got {ty}");
    };
    assert!(
        var.context.contains(&Symbol::new("Core", "Num")),
        "parameter should carry the Num constraint, got {var:?}"
    );

    // the body gained one dictionary lambda, and `+` consumes it
    let Item::Value(def) = &m.items[0] else {
        unreachable!();
    };
    let Expr::Lambda { param, body, .. } = &def.body else {
        panic!("expected a dictionary lambda, got {:?}", def.body);
    };
    assert_eq!(param, &Pattern::var("#dict#0", param.span()));
    let Expr::Clauses { clauses, .. } = &**body else {
        panic!("expected the original clauses, got {body:?}");
    };
    let Expr::Apply {
        function: outer, ..
    } = &clauses[0].body
    else {
        panic!("expected an application, got {:?}", clauses[0].body);
    };
    let Expr::Apply {
        function: plus_site,
        ..
    } = &**outer
    else {
        panic!("expected a curried application, got {outer:?}");
    };
    let (method, dict) = as_dict_application(plus_site);
    assert_eq!(method, &Symbol::new("Core", "+"));
    assert_eq!(dict, &Symbol::bare("#dict#0"));

    // the clause scope saw the dictionary come in from outside
    let clause_layout = result
        .layouts
        .iter()
        .find(|l| l.locals == ["a", "b"])
        .expect("the clause scope has a layout");
    assert_eq!(clause_layout.captures, ["#dict#0"]);
}

#[test]
fn test_constrained_signature_elaborates_like_an_inferred_one() {
    // same : Eq q => q -> q -> Bool ; same = \x -> \y -> x == y
    let mut s = Spans::new();
    let sig = Item::Signature(SignatureDecl {
        name: "same".to_string(),
        ty: TypeExpr::constrained(
            vec![ClassConstraint {
                class: Symbol::bare("Eq"),
                var: "q".to_string(),
                span: s.next(),
            }],
            TypeExpr::fun(
                TypeExpr::var("q", s.next()),
                TypeExpr::fun(
                    TypeExpr::var("q", s.next()),
                    TypeExpr::name(Symbol::bare("Bool"), s.next()),
                    s.next(),
                ),
                s.next(),
            ),
            s.next(),
        ),
        span: s.next(),
    });
    let compare = Expr::apply(
        Expr::apply(bare("==", s.next()), bare("x", s.next()), s.next()),
        bare("y", s.next()),
        s.next(),
    );
    let body = Expr::lambda(
        Pattern::var("x", s.next()),
        Expr::lambda(Pattern::var("y", s.next()), compare, s.next()),
        s.next(),
    );
    let mut m = module("Main", vec![sig, value("same", body, s.next())]);

    let result = check(&mut m);
    assert_clean(&result);

    let Item::Value(def) = &m.items[1] else {
        unreachable!();
    };
    let Expr::Lambda { param, body, .. } = &def.body else {
        panic!("expected a dictionary lambda, got {:?}", def.body);
    };
    assert_eq!(param, &Pattern::var("#dict#0", param.span()));
    let Expr::Lambda { body: x_body, .. } = &**body else {
        panic!("expected the original lambda under the dictionary");
    };
    let Expr::Lambda { body: y_body, .. } = &**x_body else {
        panic!("expected the inner lambda");
    };
    let Expr::Apply { function: outer, .. } = &**y_body else {
        panic!("expected the comparison application");
    };
    let Expr::Apply { function: eq_site, .. } = &**outer else {
        panic!("expected the curried comparison");
    };
    let (method, dict) = as_dict_application(eq_site);
    assert_eq!(method, &Symbol::new("Core", "=="));
    assert_eq!(dict, &Symbol::bare("#dict#0"));
}

#[test]
fn test_dictionaries_thread_through_helper_definitions() {
    // double x = x + x ; quad x = double (double x)
    let mut s = Spans::new();
    let double_body = Expr::apply(
        Expr::apply(bare("+", s.next()), bare("x", s.next()), s.next()),
        bare("x", s.next()),
        s.next(),
    );
    let double = value(
        "double",
        Expr::clauses(
            vec![Clause::new(
                vec![Pattern::var("x", s.next())],
                double_body,
                s.next(),
            )],
            s.next(),
        ),
        s.next(),
    );
    let quad_body = Expr::apply(
        bare("double", s.next()),
        Expr::apply(bare("double", s.next()), bare("x", s.next()), s.next()),
        s.next(),
    );
    let quad = value(
        "quad",
        Expr::clauses(
            vec![Clause::new(
                vec![Pattern::var("x", s.next())],
                quad_body,
                s.next(),
            )],
            s.next(),
        ),
        s.next(),
    );
    let mut m = module("Main", vec![double, quad]);

    let result = check(&mut m);
    assert_clean(&result);

    // quad abstracts its own dictionary and feeds it to both `double` calls
    let Item::Value(def) = &m.items[1] else {
        unreachable!();
    };
    let Expr::Lambda { param, body, .. } = &def.body else {
        panic!("expected a dictionary lambda, got {:?}", def.body);
    };
    assert_eq!(param, &Pattern::var("#dict#1", param.span()));
    let Expr::Clauses { clauses, .. } = &**body else {
        panic!("expected the original clauses");
    };
    let Expr::Apply {
        function: outer_site,
        argument: inner_call,
        ..
    } = &clauses[0].body
    else {
        panic!("expected the outer call, got {:?}", clauses[0].body);
    };
    let (outer_callee, outer_dict) = as_dict_application(outer_site);
    assert_eq!(outer_callee, &Symbol::new("Main", "double"));
    assert_eq!(outer_dict, &Symbol::bare("#dict#1"));
    let Expr::Apply {
        function: inner_site,
        ..
    } = &**inner_call
    else {
        panic!("expected the inner call, got {inner_call:?}");
    };
    let (inner_callee, inner_dict) = as_dict_application(inner_site);
    assert_eq!(inner_callee, &Symbol::new("Main", "double"));
    assert_eq!(inner_dict, &Symbol::bare("#dict#1"));
}

// ── Concrete resolution ────────────────────────────────────────────────

#[test]
fn test_method_at_concrete_type_references_the_instance_value() {
    // main = show 5
    let mut s = Spans::new();
    let body = Expr::apply(bare("show", s.next()), Expr::int(5, s.next()), s.next());
    let mut m = module("Main", vec![value("main", body, s.next())]);

    let result = check(&mut m);
    assert_clean(&result);
    assert_eq!(result.result_type.as_ref().map(Ty::to_string).as_deref(), Some("String"));

    let Item::Value(def) = &m.items[0] else {
        unreachable!();
    };
    let Expr::Apply { function: site, .. } = &def.body else {
        panic!("expected an application, got {:?}", def.body);
    };
    let (method, dict) = as_dict_application(site);
    assert_eq!(method, &Symbol::new("Core", "show"));
    assert_eq!(dict, &Symbol::new("Core", "#Show#Int"));
}

#[test]
fn test_user_class_resolves_within_its_module() {
    // class Pretty p ; instance Pretty Int ; main = pretty 7
    let mut s = Spans::new();
    let class = pretty_class(&mut s);
    let member = pretty_member(&mut s, "num");
    let head = TypeExpr::name(Symbol::bare("Int"), s.next());
    let instance = pretty_instance(&mut s, head, vec![member]);
    let body = Expr::apply(bare("pretty", s.next()), Expr::int(7, s.next()), s.next());
    let mut m = module("Main", vec![class, instance, value("main", body, s.next())]);

    let result = check(&mut m);
    assert_clean(&result);

    let Item::Value(def) = &m.items[2] else {
        unreachable!();
    };
    let Expr::Apply { function: site, .. } = &def.body else {
        panic!("expected an application, got {:?}", def.body);
    };
    let (method, dict) = as_dict_application(site);
    assert_eq!(method, &Symbol::new("Main", "pretty"));
    assert_eq!(dict, &Symbol::new("Main", "#Pretty#Int"));
}

#[test]
fn test_parameterized_instance_covers_every_head_of_that_shape() {
    // data Pair q = MkPair { fst : q, snd : q }
    // instance Show (Pair a) ; main = show (MkPair 1 2)
    let mut s = Spans::new();
    let data = Item::Data(DataDef {
        name: "Pair".to_string(),
        params: vec!["q".to_string()],
        variants: vec![DataVariant {
            name: "MkPair".to_string(),
            fields: vec![
                FieldDef {
                    name: "fst".to_string(),
                    ty: TypeExpr::var("q", s.next()),
                    span: s.next(),
                },
                FieldDef {
                    name: "snd".to_string(),
                    ty: TypeExpr::var("q", s.next()),
                    span: s.next(),
                },
            ],
            span: s.next(),
        }],
        span: s.next(),
    });
    let member_body = Expr::lambda(
        Pattern::var("_p", s.next()),
        Expr::string("pair", s.next()),
        s.next(),
    );
    let instance = Item::Instance(InstanceDef {
        class: Symbol::bare("Show"),
        params: vec![TypeExpr::apply(
            TypeExpr::name(Symbol::bare("Pair"), s.next()),
            vec![TypeExpr::var("a", s.next())],
            s.next(),
        )],
        members: vec![ValueDef::new("show", member_body, s.next())],
        span: s.next(),
    });
    let pair = Expr::apply(
        Expr::apply(bare("MkPair", s.next()), Expr::int(1, s.next()), s.next()),
        Expr::int(2, s.next()),
        s.next(),
    );
    let body = Expr::apply(bare("show", s.next()), pair, s.next());
    let mut m = module("Main", vec![data, instance, value("main", body, s.next())]);

    let result = check(&mut m);
    assert_clean(&result);
    assert_eq!(result.result_type.as_ref().map(Ty::to_string).as_deref(), Some("String"));

    let Item::Value(def) = &m.items[2] else {
        unreachable!();
    };
    let Expr::Apply { function: site, .. } = &def.body else {
        panic!("expected an application, got {:?}", def.body);
    };
    let (method, dict) = as_dict_application(site);
    assert_eq!(method, &Symbol::new("Core", "show"));
    assert_eq!(dict, &Symbol::new("Main", "#Show#Pair"));
}

// ── Resolution failures ────────────────────────────────────────────────

#[test]
fn test_ambiguous_instances_report_their_modules() {
    // P declares the class; A and B both instantiate it at Int; Main
    // imports all three and calls the method at Int.
    let mut s = Spans::new();
    let p = module("P", vec![pretty_class(&mut s)]);
    let member_a = pretty_member(&mut s, "a");
    let int_head = TypeExpr::name(Symbol::bare("Int"), s.next());
    let a = importing(
        "A",
        &["P"],
        vec![pretty_instance(&mut s, int_head, vec![member_a])],
        &mut s,
    );
    let member_b = pretty_member(&mut s, "b");
    let int_head = TypeExpr::name(Symbol::bare("Int"), s.next());
    let b = importing(
        "B",
        &["P"],
        vec![pretty_instance(&mut s, int_head, vec![member_b])],
        &mut s,
    );
    let use_span = s.next();
    let body = Expr::apply(
        Expr::var(Symbol::bare("pretty"), use_span),
        Expr::int(9, s.next()),
        s.next(),
    );
    let main = importing(
        "Main",
        &["P", "A", "B"],
        vec![value("main", body, s.next())],
        &mut s,
    );

    let mut modules = vec![p, a, b, main];
    let result = check_all(&mut modules);
    assert_eq!(result.errors.len(), 1, "errors: {:?}", result.errors);
    let TypeError::AmbiguousInstance {
        class,
        ty,
        modules: declared_in,
        span,
    } = &result.errors[0]
    else {
        panic!("expected an ambiguity, got {:?}", result.errors[0]);
    };
    assert_eq!(class, &Symbol::new("P", "Pretty"));
    assert_eq!(ty.to_string(), "Int");
    assert_eq!(declared_in, &["A", "B"]);
    assert_eq!(*span, use_span);
}

#[test]
fn test_class_without_instances_fails_at_the_use_site() {
    let mut s = Spans::new();
    let p = module("P", vec![pretty_class(&mut s)]);
    let body = Expr::apply(bare("pretty", s.next()), Expr::int(3, s.next()), s.next());
    let main = importing("Main", &["P"], vec![value("main", body, s.next())], &mut s);

    let mut modules = vec![p, main];
    let result = check_all(&mut modules);
    assert_eq!(result.errors.len(), 2, "errors: {:?}", result.errors);
    let TypeError::ContextMismatch { ty, missing, .. } = &result.errors[0] else {
        panic!("expected a context mismatch, got {:?}", result.errors[0]);
    };
    assert_eq!(ty.to_string(), "Int");
    assert!(missing.contains(&Symbol::new("P", "Pretty")));
    // recovery leaves the method unresolved, which is reported once more
    assert!(matches!(
        result.errors[1],
        TypeError::InstanceNotFound { .. }
    ));
}

#[test]
fn test_unsatisfiable_context_names_the_offending_type() {
    // main = show (\x -> x)
    let mut s = Spans::new();
    let lambda = Expr::lambda(
        Pattern::var("x", s.next()),
        bare("x", s.next()),
        s.next(),
    );
    let body = Expr::apply(bare("show", s.next()), lambda, s.next());
    let mut m = module("Main", vec![value("main", body, s.next())]);

    let result = check(&mut m);
    assert!(!result.errors.is_empty());
    let TypeError::ContextMismatch { ty, missing, .. } = &result.errors[0] else {
        panic!("expected a context mismatch, got {:?}", result.errors[0]);
    };
    assert!(matches!(ty, Ty::Fun { .. }), "functions have no Show instance");
    assert!(missing.contains(&Symbol::new("Core", "Show")));
}

// ── Instance declaration validation ────────────────────────────────────

#[test]
fn test_instance_must_provide_every_member() {
    let mut s = Spans::new();
    let class = pretty_class(&mut s);
    let head = TypeExpr::name(Symbol::bare("Int"), s.next());
    let instance = pretty_instance(&mut s, head, Vec::new());
    let mut m = module("Main", vec![class, instance]);

    let result = check(&mut m);
    assert_eq!(result.errors.len(), 1, "errors: {:?}", result.errors);
    assert!(matches!(
        &result.errors[0],
        TypeError::MissingInstanceMember { class, member, .. }
            if class.name == "Pretty" && member.name == "pretty"
    ));
}

#[test]
fn test_member_outside_the_class_is_rejected() {
    let mut s = Spans::new();
    let class = pretty_class(&mut s);
    let good = pretty_member(&mut s, "ok");
    let stray = ValueDef::new("shout", Expr::int(0, s.next()), s.next());
    let head = TypeExpr::name(Symbol::bare("Int"), s.next());
    let instance = pretty_instance(&mut s, head, vec![good, stray]);
    let mut m = module("Main", vec![class, instance]);

    let result = check(&mut m);
    assert_eq!(result.errors.len(), 1, "errors: {:?}", result.errors);
    assert!(matches!(
        &result.errors[0],
        TypeError::ExtraInstanceMember { class, member, .. }
            if class.name == "Pretty" && member.name == "shout"
    ));
}

#[test]
fn test_member_body_must_match_the_instantiated_signature() {
    // instance Pretty Int { pretty = \n -> n } returns Int, not String
    let mut s = Spans::new();
    let class = pretty_class(&mut s);
    let member_body = Expr::lambda(Pattern::var("n", s.next()), bare("n", s.next()), s.next());
    let member = ValueDef::new("pretty", member_body, s.next());
    let head = TypeExpr::name(Symbol::bare("Int"), s.next());
    let instance = pretty_instance(&mut s, head, vec![member]);
    let mut m = module("Main", vec![class, instance]);

    let result = check(&mut m);
    assert_eq!(result.errors.len(), 1, "errors: {:?}", result.errors);
    let TypeError::InstanceMemberSignatureMismatch {
        class,
        member,
        expected,
        actual,
        ..
    } = &result.errors[0]
    else {
        panic!("expected a member mismatch, got {:?}", result.errors[0]);
    };
    assert_eq!(class.name, "Pretty");
    assert_eq!(member.name, "pretty");
    assert_eq!(expected.to_string(), "Int -> String");
    assert_eq!(actual.to_string(), "Int -> Int");
}
