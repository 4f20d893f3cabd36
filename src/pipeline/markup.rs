//! Component-markup validation pass
//!
//! Runs only when the file contains markup. Checks, in order: component
//! export, built-in hook imports, tag balance (report only), root render
//! entry point and attribute casing.

use regex::Regex;
use std::sync::LazyLock;

use super::rules::{ATTRIBUTE_RULES, FixAction, REACT_HOOKS, VOID_ELEMENTS};
use super::scanner::{ScanResult, is_ident_char, line_of, scan};
use super::syntax::{
    ComponentDecl, ImportStmt, append_statement, component_decls, contains_word, has_markup,
    insert_import, parse_imports, replace_line,
};
use super::{Pass, PassContext, PassOutput, Stage};
use crate::types::Issue;

static HOOK_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^.\w$])(use[A-Z][\w$]*)\s*\(").unwrap());

const RENDER_ENTRY_POINTS: &[&str] = &["createRoot(", "ReactDOM.render(", "hydrateRoot("];

pub struct MarkupPass;

impl Pass for MarkupPass {
    fn stage(&self) -> Stage {
        Stage::Markup
    }

    fn run(&self, code: &str, ctx: &PassContext) -> PassOutput {
        let initial = scan(code);
        if !has_markup(&initial.masked) && !ctx.language.has_markup() {
            return PassOutput::unchanged(code);
        }

        let mut code = code.to_string();
        let mut issues = Vec::new();

        if let Some((fixed, issue)) = ensure_export(&code) {
            code = fixed;
            issues.push(issue);
        }

        let (fixed, hook_issues) = import_hooks(&code);
        code = fixed;
        issues.extend(hook_issues);

        issues.extend(check_tag_balance(&scan(&code)));

        if !ctx.is_multi_file
            && let Some((fixed, issue)) = ensure_render_call(&code)
        {
            code = fixed;
            issues.push(issue);
        }

        let (fixed, attribute_issues) = fix_attributes(&code);
        code = fixed;
        issues.extend(attribute_issues);

        PassOutput::new(code, issues)
    }
}

/// `App` when declared, else the last component in the file
fn main_component(decls: &[ComponentDecl]) -> Option<&ComponentDecl> {
    decls.iter().find(|d| d.name == "App").or(decls.last())
}

// =============================================================================
// Export
// =============================================================================

fn ensure_export(code: &str) -> Option<(String, Issue)> {
    let result = scan(code);
    if contains_word(&result.masked, "export") || result.masked.contains("module.exports") {
        return None;
    }
    let decls = component_decls(&result);
    let component = main_component(&decls)?;

    let fixed = append_statement(code, &format!("export default {};", component.name));
    let issue = Issue::warning(
        "missing-export",
        format!("Component '{}' is never exported", component.name),
    )
    .at_line(component.line)
    .fixed_with(format!("appended 'export default {};'", component.name));
    Some((fixed, issue))
}

// =============================================================================
// Hook Imports
// =============================================================================

/// Built-in hooks called but neither imported nor declared, first use first
fn missing_hooks(result: &ScanResult, imports: &[ImportStmt]) -> Vec<(String, usize)> {
    let mut missing: Vec<(String, usize)> = Vec::new();
    for caps in HOOK_CALL.captures_iter(&result.masked) {
        let Some(m) = caps.get(1) else { continue };
        let name = m.as_str();
        if !REACT_HOOKS.contains(&name)
            || missing.iter().any(|(n, _)| n == name)
            || imports.iter().any(|i| i.bindings.iter().any(|b| b == name))
            || is_declared_locally(&result.masked, name)
        {
            continue;
        }
        missing.push((name.to_string(), line_of(&result.masked, m.start())));
    }
    missing
}

fn is_declared_locally(masked: &str, name: &str) -> bool {
    [
        format!("function {}", name),
        format!("const {} ", name),
        format!("const {}=", name),
    ]
    .iter()
    .any(|decl| masked.contains(decl.as_str()))
}

/// Merge `hooks` into an existing react import line, if possible
fn merge_into_import(line: &str, import: &ImportStmt, hooks: &str) -> Option<String> {
    if let (Some(open), Some(close)) = (line.find('{'), line.rfind('}'))
        && close > open
    {
        let inner = line[open + 1..close].trim();
        let merged = if inner.is_empty() {
            hooks.to_string()
        } else if inner.ends_with(',') {
            format!("{} {}", inner, hooks)
        } else {
            format!("{}, {}", inner, hooks)
        };
        return Some(format!("{}{{ {} }}{}", &line[..open], merged, &line[close + 1..]));
    }
    if import.namespace.is_none()
        && let Some(default) = &import.default_binding
    {
        let from = format!("{} from", default);
        if line.contains(&from) {
            return Some(line.replacen(&from, &format!("{}, {{ {} }} from", default, hooks), 1));
        }
    }
    None
}

fn import_hooks(code: &str) -> (String, Vec<Issue>) {
    let result = scan(code);
    let imports = parse_imports(code, &result);
    let missing = missing_hooks(&result, &imports);
    if missing.is_empty() {
        return (code.to_string(), Vec::new());
    }

    let hooks = missing
        .iter()
        .map(|(n, _)| n.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let merged = imports.iter().filter(|i| i.module == "react").find_map(|import| {
        let line = code.split('\n').nth(import.line - 1)?;
        merge_into_import(line, import, &hooks).map(|new_line| (import.line, new_line))
    });
    let (fixed, how) = match merged {
        Some((line, new_line)) => (
            replace_line(code, line, &new_line),
            "merged into the react import",
        ),
        None => (
            insert_import(code, &format!("import {{ {} }} from 'react';", hooks)),
            "added a react import",
        ),
    };

    let issues = missing
        .into_iter()
        .map(|(name, line)| {
            Issue::error(
                "missing-hook-import",
                format!("'{}' is used but never imported", name),
            )
            .at_line(line)
            .fixed_with(how)
        })
        .collect();
    (fixed, issues)
}

// =============================================================================
// Tag Balance
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Open,
    Close,
    SelfClosing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Empty for fragments
    pub name: String,
    pub start: usize,
    pub end: usize,
    pub kind: TagKind,
}

fn is_tag_name_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'_' | b'$' | b'.' | b'-' | b':')
}

/// Offset of the `>` ending the tag opened at `start`, skipping `{...}`
/// expressions and quoted attribute values
fn tag_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    for (i, &b) in bytes.iter().enumerate().skip(start + 1) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' if depth == 0 => quote = Some(b),
                b'{' => depth += 1,
                b'}' => depth = depth.saturating_sub(1),
                b'>' if depth == 0 => return Some(i),
                b'<' if depth == 0 => return None,
                _ => {}
            },
        }
    }
    None
}

/// Markup tags in masked text
pub fn scan_tags(masked: &str) -> Vec<Tag> {
    let bytes = masked.as_bytes();
    let mut tags = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }
        // `a<b`, `Array<T>`: comparisons and generics
        let preceded_by_ident = masked[..i].chars().next_back().is_some_and(is_ident_char);
        let next = bytes.get(i + 1).copied();
        let plausible = matches!(next, Some(b'/') | Some(b'>'))
            || next.is_some_and(|c| c.is_ascii_alphabetic());
        if preceded_by_ident || !plausible {
            i += 1;
            continue;
        }

        let closing = next == Some(b'/');
        let name_start = if closing { i + 2 } else { i + 1 };
        let name_end = bytes[name_start.min(bytes.len())..]
            .iter()
            .position(|c| !is_tag_name_char(*c))
            .map_or(bytes.len(), |p| name_start + p);

        let Some(end) = tag_end(bytes, i) else {
            i += 1;
            continue;
        };
        let kind = if closing {
            TagKind::Close
        } else if end > i && bytes[end - 1] == b'/' {
            TagKind::SelfClosing
        } else {
            TagKind::Open
        };
        tags.push(Tag {
            name: masked[name_start.min(name_end)..name_end].to_string(),
            start: i,
            end: end + 1,
            kind,
        });
        i = end + 1;
    }
    tags
}

fn check_tag_balance(result: &ScanResult) -> Option<Issue> {
    let tags = scan_tags(&result.masked);
    let counted = |kind: TagKind| {
        tags.iter()
            .filter(|t| t.kind == kind && !VOID_ELEMENTS.contains(&t.name.as_str()))
            .count()
    };
    let opens = counted(TagKind::Open);
    let closes = counted(TagKind::Close);
    if opens == closes {
        return None;
    }

    let line = tags.first().map(|t| line_of(&result.masked, t.start));
    Some(
        Issue::warning(
            "unbalanced-jsx-tags",
            format!("{} opening tag(s) but {} closing tag(s)", opens, closes),
        )
        .at(line),
    )
}

// =============================================================================
// Render Entry Point
// =============================================================================

fn ensure_render_call(code: &str) -> Option<(String, Issue)> {
    let result = scan(code);
    if RENDER_ENTRY_POINTS.iter().any(|p| result.masked.contains(p)) {
        return None;
    }
    let decls = component_decls(&result);
    let component = main_component(&decls)?;
    let name = component.name.clone();
    let line = component.line;

    let imports = parse_imports(code, &result);
    let has_import = imports
        .iter()
        .any(|i| i.bindings.iter().any(|b| b == "createRoot"));
    let mut fixed = if has_import {
        code.to_string()
    } else {
        insert_import(code, "import { createRoot } from 'react-dom/client';")
    };
    fixed = append_statement(
        &fixed,
        &format!(
            "createRoot(document.getElementById('root')).render(<{} />);",
            name
        ),
    );

    let issue = Issue::info(
        "missing-render-call",
        format!("Component '{}' is never rendered", name),
    )
    .at_line(line)
    .fixed_with("appended a createRoot render call");
    Some((fixed, issue))
}

// =============================================================================
// Attributes
// =============================================================================

fn fix_attributes(code: &str) -> (String, Vec<Issue>) {
    let result = scan(code);
    let mut edits: Vec<(usize, usize, &'static str)> = Vec::new();
    let mut issues = Vec::new();

    for compiled in ATTRIBUTE_RULES.iter() {
        let FixAction::Replace(replacement) = compiled.rule.fix else {
            continue;
        };
        // Offsets are shared with the masked copy, so string contents never match
        let matches = compiled.find_all(&result.masked);
        let Some(&(first, _)) = matches.first() else {
            continue;
        };
        issues.push(
            Issue::warning(
                "invalid-jsx-attribute",
                format!(
                    "'{}' should be '{}' ({} occurrence(s))",
                    compiled.rule.label.trim(),
                    replacement.trim(),
                    matches.len()
                ),
            )
            .at_line(line_of(code, first))
            .fixed_with(format!("replaced with '{}'", replacement.trim())),
        );
        edits.extend(matches.into_iter().map(|(s, e)| (s, e, replacement)));
    }

    edits.sort_by(|a, b| b.0.cmp(&a.0));
    let mut fixed = code.to_string();
    for (start, end, replacement) in edits {
        fixed.replace_range(start..end, replacement);
    }
    (fixed, issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Language;

    fn run_with(code: &str, is_multi_file: bool) -> PassOutput {
        let ctx = PassContext {
            language: Language::Jsx,
            is_multi_file,
        };
        MarkupPass.run(code, &ctx)
    }

    fn run(code: &str) -> PassOutput {
        run_with(code, true)
    }

    fn find<'a>(output: &'a PassOutput, issue_type: &str) -> Option<&'a Issue> {
        output.issues.iter().find(|i| i.issue_type == issue_type)
    }

    #[test]
    fn test_skipped_without_markup() {
        let ctx = PassContext {
            language: Language::Javascript,
            is_multi_file: false,
        };
        let output = MarkupPass.run("const a = useState(0);", &ctx);
        assert!(output.issues.is_empty());
    }

    #[test]
    fn test_missing_export_prefers_app() {
        let code = "function App() {\n  return <Header />;\n}\n\nfunction Header() {\n  return <h1>Hi</h1>;\n}\n";
        let output = run(code);
        let issue = find(&output, "missing-export").unwrap();
        assert!(issue.fixed);
        assert!(output.code.ends_with("export default App;\n"));
    }

    #[test]
    fn test_existing_export_untouched() {
        let code = "export function Card() {\n  return <div className=\"card\" />;\n}\n";
        let output = run(code);
        assert!(find(&output, "missing-export").is_none());
        assert_eq!(output.code, code);
    }

    #[test]
    fn test_hooks_merged_into_react_import() {
        let code = "import { useState } from 'react';\n\nexport default function App() {\n  const [a] = useState(0);\n  useEffect(() => {}, []);\n  const r = useRef(null);\n  return <Box ref={r}>{a}</Box>;\n}\n";
        let output = run(code);
        assert!(
            output
                .code
                .starts_with("import { useState, useEffect, useRef } from 'react';")
        );
        let hooks: Vec<_> = output
            .issues
            .iter()
            .filter(|i| i.issue_type == "missing-hook-import")
            .collect();
        assert_eq!(hooks.len(), 2);
        assert_eq!(hooks[0].line, Some(5));
    }

    #[test]
    fn test_hooks_added_to_default_import() {
        let code = "import React from 'react';\nexport const App = () => {\n  const [a] = useState(1);\n  return <Main>{a}</Main>;\n};\n";
        let output = run(code);
        assert!(
            output
                .code
                .starts_with("import React, { useState } from 'react';")
        );
    }

    #[test]
    fn test_hooks_new_import_line() {
        let code = "export default function App() {\n  const [a] = useState(1);\n  return <Main>{a}</Main>;\n}\n";
        let output = run(code);
        assert!(output.code.starts_with("import { useState } from 'react';\n\n"));
    }

    #[test]
    fn test_custom_and_member_hooks_ignored() {
        let code = "export default function App() {\n  const a = useCart();\n  const b = React.useState(0);\n  return <Main>{a}{b}</Main>;\n}\n";
        let output = run(code);
        assert!(find(&output, "missing-hook-import").is_none());
    }

    #[test]
    fn test_scan_tags_kinds() {
        let tags = scan_tags("<div className=\"x\"><Item onClick={() => a > b} /><br></div>");
        let kinds: Vec<_> = tags.iter().map(|t| (t.name.as_str(), t.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                ("div", TagKind::Open),
                ("Item", TagKind::SelfClosing),
                ("br", TagKind::Open),
                ("div", TagKind::Close),
            ]
        );
    }

    #[test]
    fn test_scan_tags_skips_comparisons_and_generics() {
        assert!(scan_tags("if (a < b && i<n) { useState<string>(x); }").is_empty());
    }

    #[test]
    fn test_fragments_counted() {
        let tags = scan_tags("<><A /></>");
        assert_eq!(tags.len(), 3);
        assert_eq!(tags[0].name, "");
    }

    #[test]
    fn test_unbalanced_tags_reported() {
        let code = "export default function App() {\n  return (\n    <Layout>\n      <div>\n    </Layout>\n  );\n}\n";
        let output = run(code);
        let issue = find(&output, "unbalanced-jsx-tags").unwrap();
        assert!(!issue.fixed);
        assert!(issue.message.starts_with("2 opening"));
        assert_eq!(output.code, code);
    }

    #[test]
    fn test_render_call_for_standalone_component() {
        let code = "export default function App() {\n  return <Main />;\n}\n";
        let output = run_with(code, false);
        let issue = find(&output, "missing-render-call").unwrap();
        assert!(issue.fixed);
        assert!(
            output
                .code
                .starts_with("import { createRoot } from 'react-dom/client';")
        );
        assert!(
            output
                .code
                .contains("createRoot(document.getElementById('root')).render(<App />);")
        );

        let again = run_with(&output.code, false);
        assert!(find(&again, "missing-render-call").is_none());
    }

    #[test]
    fn test_no_render_call_in_multi_file_project() {
        let code = "export default function App() {\n  return <Main />;\n}\n";
        assert!(find(&run_with(code, true), "missing-render-call").is_none());
    }

    #[test]
    fn test_attribute_casing_fixed() {
        let code = "export default function App() {\n  return <Button class=\"big\" onclick={go} label=\"onclick=\" />;\n}\n";
        let output = run(code);
        assert!(output.code.contains("<Button className=\"big\" onClick={go} label=\"onclick=\" />"));
        let attrs: Vec<_> = output
            .issues
            .iter()
            .filter(|i| i.issue_type == "invalid-jsx-attribute")
            .collect();
        assert_eq!(attrs.len(), 2);
        assert!(attrs.iter().all(|i| i.line == Some(2) && i.fixed));
    }
}
