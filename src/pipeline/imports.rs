//! Import/dependency resolution pass

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use super::rules::{WELL_KNOWN_BINDINGS, WellKnownBinding};
use super::scanner::{line_of, scan};
use super::syntax::{
    contains_word, declared_names, has_markup, insert_import, is_import_line, parse_imports,
};
use super::{Pass, PassContext, PassOutput, Stage};
use crate::types::Issue;

const TAILWIND_CDN: &str = "https://cdn.tailwindcss.com";

static UTILITY_CLASSES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"class(?:Name)?\s*=\s*["'][^"']*\b(?:flex|grid|p[xytrbl]?-\d+|m[xytrbl]?-\d+|text-(?:xs|sm|base|lg|\d?xl|center)|bg-[a-z]+-\d{2,3}|rounded(?:-[a-z]+)?|shadow(?:-[a-z]+)?|[wh]-\d+|gap-\d+|items-center|justify-[a-z]+)\b"#,
    )
    .unwrap()
});

/// Usage patterns per well-known binding: call, member access or tag
static BINDING_USAGE: LazyLock<Vec<(&'static WellKnownBinding, Regex)>> = LazyLock::new(|| {
    WELL_KNOWN_BINDINGS
        .iter()
        .filter_map(|b| {
            let name = regex::escape(b.name);
            let pattern = format!(r"(?:^|[^\w$.]){}\s*[.(]|<{}\b", name, name);
            match Regex::new(&pattern) {
                Ok(re) => Some((b, re)),
                Err(e) => {
                    tracing::error!(binding = b.name, error = %e, "Invalid usage pattern");
                    None
                }
            }
        })
        .collect()
});

pub struct ImportsPass;

impl Pass for ImportsPass {
    fn stage(&self) -> Stage {
        Stage::Imports
    }

    fn run(&self, code: &str, ctx: &PassContext) -> PassOutput {
        let (code, mut issues) = remove_unused_imports(code, ctx);
        let (code, cdn_issue) = ensure_tailwind_cdn(&code);
        issues.extend(cdn_issue);
        issues.extend(missing_imports(&code));
        PassOutput::new(code, issues)
    }
}

// =============================================================================
// Unused Imports
// =============================================================================

fn remove_unused_imports(code: &str, ctx: &PassContext) -> (String, Vec<Issue>) {
    let result = scan(code);
    let imports = parse_imports(code, &result);
    if imports.is_empty() {
        return (code.to_string(), Vec::new());
    }

    let lines: Vec<&str> = code.split('\n').collect();
    let rest = lines
        .iter()
        .enumerate()
        .filter(|(i, l)| !(result.line_context(i + 1).is_code() && is_import_line(l)))
        .map(|(_, l)| *l)
        .collect::<Vec<_>>()
        .join("\n");
    let markup = has_markup(&result.masked) || ctx.language.has_markup();

    let mut removed = HashSet::new();
    let mut issues = Vec::new();
    for import in &imports {
        if import.bindings.is_empty() {
            continue;
        }
        let used = import
            .bindings
            .iter()
            .any(|b| contains_word(&rest, b) || (b == "React" && markup));
        if used {
            continue;
        }
        removed.insert(import.line);
        issues.push(
            Issue::warning(
                "unused-import",
                format!(
                    "'{}' imported from '{}' is never used",
                    import.bindings.join(", "),
                    import.module
                ),
            )
            .at_line(import.line)
            .fixed_with("removed the import"),
        );
    }

    if removed.is_empty() {
        return (code.to_string(), issues);
    }
    let kept = lines
        .iter()
        .enumerate()
        .filter(|(i, _)| !removed.contains(&(i + 1)))
        .map(|(_, l)| *l)
        .collect::<Vec<_>>()
        .join("\n");
    (kept, issues)
}

// =============================================================================
// Styling CDN
// =============================================================================

fn ensure_tailwind_cdn(code: &str) -> (String, Option<Issue>) {
    if code.contains(TAILWIND_CDN) || !UTILITY_CLASSES.is_match(code) {
        return (code.to_string(), None);
    }
    // ASCII lowercasing keeps byte offsets
    let Some(head) = code.to_ascii_lowercase().find("<head>") else {
        return (code.to_string(), None);
    };

    let line_start = code[..head].rfind('\n').map_or(0, |i| i + 1);
    let indent: String = code[line_start..]
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect();
    let at = head + "<head>".len();
    let fixed = format!(
        "{}\n{}  <script src=\"{}\"></script>{}",
        &code[..at],
        indent,
        TAILWIND_CDN,
        &code[at..]
    );

    let issue = Issue::warning(
        "missing-tailwind-cdn",
        "Utility classes are used but the stylesheet is never loaded",
    )
    .at_line(line_of(code, head))
    .fixed_with("added the CDN script to <head>");
    (fixed, Some(issue))
}

// =============================================================================
// Well-Known Bindings
// =============================================================================

/// Well-known bindings used but not declared, with the offset of first use
fn undeclared_bindings(code: &str) -> Vec<(&'static WellKnownBinding, usize)> {
    let result = scan(code);
    let imports = parse_imports(code, &result);
    let declared = declared_names(&result.masked, &imports);

    BINDING_USAGE
        .iter()
        .filter(|(binding, _)| !declared.contains(binding.name))
        .filter_map(|(binding, usage)| {
            usage
                .find(&result.masked)
                .map(|first| (*binding, first.start()))
        })
        .collect()
}

fn missing_imports(code: &str) -> Vec<Issue> {
    undeclared_bindings(code)
        .into_iter()
        .map(|(binding, offset)| {
            Issue::error(
                "missing-import",
                format!(
                    "'{}' is used but never imported (expected from '{}')",
                    binding.name, binding.module
                ),
            )
            .at_line(line_of(code, offset))
        })
        .collect()
}

/// Insert imports for every undeclared well-known binding. Named bindings
/// from one module share a statement. Returns the names added.
pub fn add_missing_imports(code: &str) -> (String, Vec<&'static str>) {
    let missing = undeclared_bindings(code);
    if missing.is_empty() {
        return (code.to_string(), Vec::new());
    }

    let mut statements: Vec<String> = Vec::new();
    let mut named: Vec<(&'static str, Vec<&'static str>)> = Vec::new();
    for (binding, _) in &missing {
        if binding.default_import {
            statements.push(format!("import {} from '{}';", binding.name, binding.module));
        } else if let Some((_, names)) = named.iter_mut().find(|(m, _)| *m == binding.module) {
            names.push(binding.name);
        } else {
            named.push((binding.module, vec![binding.name]));
        }
    }
    statements.extend(
        named
            .iter()
            .map(|(module, names)| format!("import {{ {} }} from '{}';", names.join(", "), module)),
    );

    // Inserted in reverse so the final order matches the statement list
    let mut fixed = code.to_string();
    for statement in statements.iter().rev() {
        fixed = insert_import(&fixed, statement);
    }
    let added = missing.iter().map(|(b, _)| b.name).collect();
    (fixed, added)
}
