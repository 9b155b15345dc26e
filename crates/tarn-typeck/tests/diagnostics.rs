//! Tests for rendered type diagnostics.
//!
//! Each test triggers a specific diagnostic through the checker, renders it
//! through the ariadne pipeline, and asserts on the stable parts of the
//! output: the code, the message, and any fix suggestion. JSON mode is
//! covered by parsing the emitted lines back.

use rowan::TextRange;
use tarn_ast::{
    span, Expr, Import, InstanceDef, Item, Module, Pattern, SignatureDecl, Symbol, TypeExpr,
    ValueDef,
};
use tarn_typeck::builtins::core_registry;
use tarn_typeck::diagnostics::{render_all, DiagnosticOptions};
use tarn_typeck::TypeckResult;

// ── Helpers ────────────────────────────────────────────────────────────

/// Hands out non-overlapping spans inside a small source window.
struct Spans(u32);

impl Spans {
    fn new() -> Spans {
        Spans(2)
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

fn value(name: &str, body: Expr, sp: TextRange) -> Item {
    Item::Value(ValueDef::new(name, body, sp))
}

fn bare(name: &str, sp: TextRange) -> Expr {
    Expr::var(Symbol::bare(name), sp)
}

/// Check and render with colors off, for stable assertions.
fn render_colorless(module: &mut Module, source: &str) -> String {
    let result = check(module);
    assert!(
        !result.errors.is_empty() || !result.warnings.is_empty(),
        "expected at least one diagnostic"
    );
    render_all(&result, source, &DiagnosticOptions::colorless())
}

// ── Rendered reports ───────────────────────────────────────────────────

/// Argument type disagrees with the declared parameter type.
#[test]
fn test_diag_application_mismatch() {
    let mut s = Spans::new();
    let sig = Item::Signature(SignatureDecl {
        name: "f".to_string(),
        ty: TypeExpr::fun(
            TypeExpr::name(Symbol::bare("Int"), s.next()),
            TypeExpr::name(Symbol::bare("Int"), s.next()),
            s.next(),
        ),
        span: s.next(),
    });
    let body = Expr::apply(bare("f", s.next()), Expr::string("oops", s.next()), s.next());
    let mut m = module("Main", vec![sig, value("main", body, s.next())]);

    let source = "f : Int -> Int\nmain = f \"oops\"";
    let rendered = render_colorless(&mut m, source);
    assert!(rendered.contains("E0001"), "got: {rendered}");
    assert!(
        rendered.contains("expected `Int`, found `String`"),
        "got: {rendered}"
    );
}

/// A type without the needed instance points at the class to implement.
#[test]
fn test_diag_missing_instance_suggests_declaring_one() {
    let mut s = Spans::new();
    let lambda = Expr::lambda(Pattern::var("x", s.next()), bare("x", s.next()), s.next());
    let body = Expr::apply(bare("show", s.next()), lambda, s.next());
    let mut m = module("Main", vec![value("main", body, s.next())]);

    let source = "main = show (\\x -> x)";
    let rendered = render_colorless(&mut m, source);
    assert!(rendered.contains("E0003"), "got: {rendered}");
    assert!(rendered.contains("does not satisfy"), "got: {rendered}");
    assert!(
        rendered.contains("declare an instance of Show"),
        "got: {rendered}"
    );
}

/// Two modules instantiate the same class at the same type; the report
/// names both so the user can drop one import.
#[test]
fn test_diag_ambiguous_instance_lists_modules() {
    let mut s = Spans::new();
    let instance_module = |name: &str, s: &mut Spans| {
        let body = Expr::lambda(
            Pattern::var("_v", s.next()),
            Expr::string("~", s.next()),
            s.next(),
        );
        let instance = Item::Instance(InstanceDef {
            class: Symbol::bare("Show"),
            params: vec![TypeExpr::name(Symbol::bare("Float"), s.next())],
            members: vec![ValueDef::new("show", body, s.next())],
            span: s.next(),
        });
        module(name, vec![instance])
    };
    let a = instance_module("A", &mut s);
    let b = instance_module("B", &mut s);
    let body = Expr::apply(bare("show", s.next()), Expr::float(1.5, s.next()), s.next());
    let mut main = module("Main", vec![value("main", body, s.next())]);
    main.imports = ["A", "B"]
        .iter()
        .map(|i| Import {
            module: i.to_string(),
            span: s.next(),
        })
        .collect();

    let mut modules = vec![a, b, main];
    let result = check_all(&mut modules);
    let reports = result.render_errors("main = show 1.5", &DiagnosticOptions::colorless());
    assert_eq!(reports.len(), 1, "got: {reports:?}");
    let rendered = &reports[0];
    assert!(rendered.contains("E0011"), "got: {rendered}");
    assert!(
        rendered.contains("ambiguous instance of `Show` for `Float`"),
        "got: {rendered}"
    );
    assert!(rendered.contains("declared in A, B"), "got: {rendered}");
    assert!(rendered.contains("import only one of A, B"), "got: {rendered}");
}

/// Unknown names render with the scope hint.
#[test]
fn test_diag_undefined_symbol() {
    let mut s = Spans::new();
    let mut m = module("Main", vec![value("main", bare("ghost", s.next()), s.next())]);

    let rendered = render_colorless(&mut m, "main = ghost");
    assert!(rendered.contains("E0007"), "got: {rendered}");
    assert!(rendered.contains("`ghost` is not defined"), "got: {rendered}");
    assert!(rendered.contains("not found in this scope"), "got: {rendered}");
}

/// Unused locals come out as warnings, after any errors.
#[test]
fn test_diag_unused_local_warning() {
    let mut s = Spans::new();
    let lambda = Expr::lambda(Pattern::var("x", s.next()), Expr::int(1, s.next()), s.next());
    let mut m = module("Main", vec![value("main", lambda, s.next())]);

    let rendered = render_colorless(&mut m, "main = \\x -> 1");
    assert!(rendered.contains("W0001"), "got: {rendered}");
    assert!(rendered.contains("`x` is never used"), "got: {rendered}");
    assert!(
        rendered.contains("declared but never used"),
        "got: {rendered}"
    );
}

/// Colorless output carries no escape codes; colored output does.
#[test]
fn test_diag_color_is_opt_out() {
    let mut s = Spans::new();
    let body = bare("ghost", s.next());
    let sp = s.next();

    let mut plain = module("Main", vec![value("main", body.clone(), sp)]);
    let rendered = render_colorless(&mut plain, "main = ghost");
    assert!(!rendered.contains('\u{1b}'), "got: {rendered}");

    let mut colored = module("Main", vec![value("main", body, sp)]);
    let result = check(&mut colored);
    let rendered = render_all(&result, "main = ghost", &DiagnosticOptions::default());
    assert!(rendered.contains('\u{1b}'), "expected ANSI codes: {rendered}");
}

// ── JSON mode ──────────────────────────────────────────────────────────

/// One object per line, parseable, errors before warnings.
#[test]
fn test_diag_json_lines_parse() {
    let mut s = Spans::new();
    let ghost_span = s.next();
    let lambda = Expr::lambda(
        Pattern::var("x", s.next()),
        Expr::var(Symbol::bare("ghost"), ghost_span),
        s.next(),
    );
    let mut m = module("Main", vec![value("main", lambda, s.next())]);

    let result = check(&mut m);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.warnings.len(), 1);

    let rendered = render_all(&result, "main = \\x -> ghost", &DiagnosticOptions::json_mode());
    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!(lines.len(), 2, "got: {rendered}");

    let error: serde_json::Value = serde_json::from_str(lines[0]).expect("error line parses");
    assert_eq!(error["code"], "E0007");
    assert_eq!(error["severity"], "error");
    assert_eq!(error["spans"][0]["start"], u32::from(ghost_span.start()));
    assert_eq!(error["spans"][0]["end"], u32::from(ghost_span.end()));

    let warning: serde_json::Value =
        serde_json::from_str(lines[1]).expect("warning line parses");
    assert_eq!(warning["code"], "W0001");
    assert_eq!(warning["severity"], "warning");
}
