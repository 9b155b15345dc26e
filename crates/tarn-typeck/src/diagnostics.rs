//! Ariadne-based rendering for collected diagnostics.
//!
//! Renders `TypeError` and `TypeWarning` values into labeled reports, or
//! into one-line JSON objects for editor tooling. Rendering is separate
//! from checking: the checker accumulates typed values, and the driver
//! decides here how they reach the user.

use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use serde_json::json;

use crate::error::{TypeError, TypeWarning};
use crate::TypeckResult;

/// How diagnostics are formatted.
#[derive(Clone, Copy, Debug)]
pub struct DiagnosticOptions {
    pub color: bool,
    pub json: bool,
}

impl Default for DiagnosticOptions {
    fn default() -> DiagnosticOptions {
        DiagnosticOptions {
            color: true,
            json: false,
        }
    }
}

impl DiagnosticOptions {
    /// Plain-text reports without color codes, for snapshots and pipes.
    pub fn colorless() -> DiagnosticOptions {
        DiagnosticOptions {
            color: false,
            json: false,
        }
    }

    /// One JSON object per diagnostic, one per line.
    pub fn json_mode() -> DiagnosticOptions {
        DiagnosticOptions {
            color: false,
            json: true,
        }
    }
}

/// Assign a stable code to each error variant.
fn error_code(error: &TypeError) -> &'static str {
    match error {
        TypeError::Mismatch { .. } => "E0001",
        TypeError::CircularType { .. } => "E0002",
        TypeError::ContextMismatch { .. } => "E0003",
        TypeError::BindingConflict { .. } => "E0004",
        TypeError::MissingParameter { .. } => "E0005",
        TypeError::ExtraParameter { .. } => "E0006",
        TypeError::UndefinedSymbol { .. } => "E0007",
        TypeError::UndefinedOperator { .. } => "E0008",
        TypeError::ArityMismatch { .. } => "E0009",
        TypeError::InstanceNotFound { .. } => "E0010",
        TypeError::AmbiguousInstance { .. } => "E0011",
        TypeError::MissingInstanceMember { .. } => "E0012",
        TypeError::ExtraInstanceMember { .. } => "E0013",
        TypeError::InstanceMemberSignatureMismatch { .. } => "E0014",
        TypeError::UnsupportedConstruct { .. } => "E0015",
        TypeError::DuplicateSignature { .. } => "E0016",
    }
}

fn warning_code(warning: &TypeWarning) -> &'static str {
    match warning {
        TypeWarning::UnusedLocal { .. } => "W0001",
    }
}

fn to_range(span: rowan::TextRange) -> Range<usize> {
    let start: usize = span.start().into();
    let end: usize = span.end().into();
    start..end
}

/// Label text placed on the error's span.
fn label_text(error: &TypeError) -> String {
    match error {
        TypeError::Mismatch {
            expected,
            actual,
            origin,
        } => format!("expected `{expected}`, found `{actual}` {}", origin.describe()),
        TypeError::CircularType { .. } => "recursive type here".to_string(),
        TypeError::ContextMismatch { ty, origin, .. } => {
            format!("`{ty}` is used {}", origin.describe())
        }
        TypeError::BindingConflict { current, .. } => {
            format!("already bound to `{current}`")
        }
        TypeError::MissingParameter { .. } => "not enough type parameters".to_string(),
        TypeError::ExtraParameter { .. } => "applied to too many parameters".to_string(),
        TypeError::UndefinedSymbol { .. } => "not found in this scope".to_string(),
        TypeError::UndefinedOperator { .. } => "no definition in scope".to_string(),
        TypeError::ArityMismatch { expected, .. } => {
            format!("needs {expected} type parameter(s)")
        }
        TypeError::InstanceNotFound { class, .. } => {
            format!("no `{}` instance in scope", class.name)
        }
        TypeError::AmbiguousInstance { .. } => "more than one instance applies".to_string(),
        TypeError::MissingInstanceMember { member, .. } => {
            format!("`{}` is required here", member.name)
        }
        TypeError::ExtraInstanceMember { class, .. } => {
            format!("the class `{}` does not declare it", class.name)
        }
        TypeError::InstanceMemberSignatureMismatch { expected, .. } => {
            format!("the class declares `{expected}`")
        }
        TypeError::UnsupportedConstruct { .. } => "not supported".to_string(),
        TypeError::DuplicateSignature { .. } => "already declared earlier".to_string(),
    }
}

/// Follow-up advice, where a plausible fix exists.
fn help_text(error: &TypeError) -> Option<String> {
    match error {
        TypeError::CircularType { .. } => {
            Some("a type cannot contain itself".to_string())
        }
        TypeError::ContextMismatch { ty, missing, .. } => {
            let classes: Vec<&str> = missing.iter().map(|c| c.name.as_str()).collect();
            Some(format!(
                "declare an instance of {} for `{ty}`",
                classes.join(", ")
            ))
        }
        TypeError::AmbiguousInstance { modules, .. } => Some(format!(
            "import only one of {}",
            modules.join(", ")
        )),
        TypeError::MissingInstanceMember { member, .. } => {
            Some(format!("add `{} = ...` to the instance", member.name))
        }
        TypeError::UnsupportedConstruct { construct, .. }
            if construct.contains("positional") =>
        {
            Some("match record fields by name instead".to_string())
        }
        _ => None,
    }
}

/// Render one error as a labeled report.
pub fn render_error(error: &TypeError, source: &str, options: &DiagnosticOptions) -> String {
    if options.json {
        return json_line("error", error_code(error), &error.to_string(), error.span());
    }
    let span = clamp(to_range(error.span()), source.len());
    let mut builder = Report::build(ReportKind::Error, span.clone())
        .with_code(error_code(error))
        .with_message(error.to_string())
        .with_config(Config::default().with_color(options.color))
        .with_label(
            Label::new(span)
                .with_message(label_text(error))
                .with_color(Color::Red),
        );
    if let Some(help) = help_text(error) {
        builder.set_help(help);
    }
    write_report(builder.finish(), source)
}

/// Render one warning as a labeled report.
pub fn render_warning(
    warning: &TypeWarning,
    source: &str,
    options: &DiagnosticOptions,
) -> String {
    if options.json {
        return json_line(
            "warning",
            warning_code(warning),
            &warning.to_string(),
            warning.span(),
        );
    }
    let span = clamp(to_range(warning.span()), source.len());
    let label = match warning {
        TypeWarning::UnusedLocal { .. } => "declared but never used",
    };
    let report = Report::build(ReportKind::Warning, span.clone())
        .with_code(warning_code(warning))
        .with_message(warning.to_string())
        .with_config(Config::default().with_color(options.color))
        .with_label(
            Label::new(span)
                .with_message(label)
                .with_color(Color::Yellow),
        )
        .finish();
    write_report(report, source)
}

/// Render every diagnostic of a check, errors first.
pub fn render_all(result: &TypeckResult, source: &str, options: &DiagnosticOptions) -> String {
    let mut rendered = String::new();
    for error in &result.errors {
        rendered.push_str(&render_error(error, source, options));
        if options.json {
            rendered.push('\n');
        }
    }
    for warning in &result.warnings {
        rendered.push_str(&render_warning(warning, source, options));
        if options.json {
            rendered.push('\n');
        }
    }
    rendered
}

impl TypeckResult {
    /// Render each error separately, for callers that post-process per
    /// diagnostic rather than printing one block.
    pub fn render_errors(&self, source: &str, options: &DiagnosticOptions) -> Vec<String> {
        self.errors
            .iter()
            .map(|error| render_error(error, source, options))
            .collect()
    }
}

fn json_line(severity: &str, code: &str, message: &str, span: rowan::TextRange) -> String {
    json!({
        "code": code,
        "severity": severity,
        "message": message,
        "spans": [{
            "start": u32::from(span.start()),
            "end": u32::from(span.end()),
        }],
    })
    .to_string()
}

/// Keep the span inside the source and at least one character wide, which
/// ariadne needs to place a label.
fn clamp(range: Range<usize>, source_len: usize) -> Range<usize> {
    let start = range.start.min(source_len);
    let end = range.end.min(source_len).max(start);
    if start == end {
        start..end.saturating_add(1).min(source_len)
    } else {
        start..end
    }
}

fn write_report(report: Report<'_, Range<usize>>, source: &str) -> String {
    let mut buffer = Vec::new();
    report
        .write(Source::from(source), &mut buffer)
        .expect("report rendering to a buffer cannot fail");
    String::from_utf8_lossy(&buffer).into_owned()
}
