//! Generated-text cleanup pass
//!
//! Strips what a model leaves around and inside code: markdown fences,
//! narrative sentences, duplicate declarations and orphaned branches. Every
//! sub-step rescans its input since the previous one may have moved text.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use super::markup::{Tag, scan_tags};
use super::rules::{FENCE_RULES, NARRATIVE_INTRO_RULES, NARRATIVE_OUTRO_RULES};
use super::scanner::{ScanResult, is_ident_char, line_of, line_start_offset, matching_close, scan};
use super::syntax::contains_word;
use super::{Pass, PassContext, PassOutput, Stage};
use crate::types::Issue;

static TOP_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:export\s+(?:default\s+)?)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)\s*(?:<[^>\n]*>)?\s*\(")
        .unwrap()
});

static TOP_ARROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=\n]+)?=\s*(?:async\s+)?(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*(?::\s*[^=\n]+?)?\s*=>",
    )
    .unwrap()
});

static TOP_CONST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:export\s+)?(const)\s+([A-Za-z_$][\w$]*)\s*[=:]").unwrap()
});

static ELSE_KEYWORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\belse\b").unwrap());

const CODE_STARTS: &[&str] = &[
    "import ", "export ", "const ", "let ", "var ", "function ", "class ", "return", "if ",
    "if(", "for ", "while ", "switch ", "try ", "//", "/*", "<", "}", ")", "]", "@", "#!",
    "'use ", "\"use ", "type ", "interface ", "async ", "await ",
];

const CODE_ENDINGS: &[char] = &[';', '{', '}', '(', ')', '[', ']', ',', '>', '='];

pub struct CleanupPass;

impl Pass for CleanupPass {
    fn stage(&self) -> Stage {
        Stage::Cleanup
    }

    fn run(&self, code: &str, _ctx: &PassContext) -> PassOutput {
        let (code, mut issues) = strip_fences(code);
        let (code, narrative) = strip_narrative(&code);
        let code = if issues.is_empty() && narrative.is_empty() {
            code
        } else {
            normalize_blank_lines(&code)
        };
        issues.extend(narrative);

        let (code, duplicates) = merge_duplicate_functions(&code);
        issues.extend(duplicates);
        let (code, redeclarations) = demote_duplicate_consts(&code);
        issues.extend(redeclarations);
        issues.extend(find_incomplete_ternaries(&code));
        let (code, orphans) = remove_orphaned_else(&code);
        issues.extend(orphans);

        PassOutput::new(code, issues)
    }
}

fn remove_lines(code: &str, removed: &HashSet<usize>) -> String {
    code.split('\n')
        .enumerate()
        .filter(|(i, _)| !removed.contains(&(i + 1)))
        .map(|(_, l)| l)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drop leading blank lines and collapse blank runs in code context
fn normalize_blank_lines(code: &str) -> String {
    let result = scan(code);
    let trailing_newline = code.ends_with('\n');
    let mut kept: Vec<&str> = Vec::new();
    let mut blank_run = 0;

    for (i, line) in code.split('\n').enumerate() {
        if line.trim().is_empty() && result.line_context(i + 1).is_code() {
            blank_run += 1;
            if kept.is_empty() || blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        kept.push(line);
    }
    while kept.last().is_some_and(|l| l.trim().is_empty()) {
        kept.pop();
    }

    let mut out = kept.join("\n");
    if trailing_newline && !out.is_empty() {
        out.push('\n');
    }
    out
}

// =============================================================================
// Fences and Narrative
// =============================================================================

fn strip_fences(code: &str) -> (String, Vec<Issue>) {
    let result = scan(code);
    let mut removed = HashSet::new();
    let mut issues = Vec::new();

    for (i, line) in code.split('\n').enumerate() {
        if result.line_context(i + 1).is_code() && FENCE_RULES.iter().any(|r| r.is_match(line)) {
            removed.insert(i + 1);
            issues.push(
                Issue::warning("markdown-artifact", "Markdown code fence in output")
                    .at_line(i + 1)
                    .fixed_with("removed the fence line"),
            );
        }
    }

    if removed.is_empty() {
        return (code.to_string(), issues);
    }
    (remove_lines(code, &removed), issues)
}

fn looks_like_code(trimmed: &str) -> bool {
    trimmed.ends_with(CODE_ENDINGS)
        || CODE_STARTS.iter().any(|s| trimmed.starts_with(s))
        || trimmed.contains("=>")
}

/// Prose-shaped top-level line
fn is_prose_line(result: &ScanResult, index: usize, trimmed: &str) -> bool {
    !trimmed.is_empty()
        && result.line_context(index + 1).is_code()
        && result.line_depth(index + 1) == 0
        && !looks_like_code(trimmed)
}

/// 0-based index of the first closing narrative line, if any
pub fn narrative_tail_start(code: &str, result: &ScanResult) -> Option<usize> {
    code.split('\n')
        .enumerate()
        .find(|(i, line)| {
            let t = line.trim();
            is_prose_line(result, *i, t) && NARRATIVE_OUTRO_RULES.iter().any(|r| r.is_match(t))
        })
        .map(|(i, _)| i)
}

fn strip_narrative(code: &str) -> (String, Vec<Issue>) {
    let result = scan(code);
    let lines: Vec<&str> = code.split('\n').collect();
    let mut removed = HashSet::new();
    let mut issues = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        let t = lines[i].trim();
        if !is_prose_line(&result, i, t) {
            i += 1;
            continue;
        }

        if let Some(rule) = NARRATIVE_INTRO_RULES.iter().find(|r| r.is_match(t)) {
            removed.insert(i + 1);
            issues.push(
                Issue::warning(
                    "narrative-text",
                    format!("Narrative text in output ({})", rule.rule.label),
                )
                .at_line(i + 1)
                .fixed_with("removed 1 line"),
            );
            i += 1;
            continue;
        }

        if let Some(rule) = NARRATIVE_OUTRO_RULES.iter().find(|r| r.is_match(t)) {
            // Prose following a closing sentence goes with it
            let mut end = i;
            let mut j = i + 1;
            while j < lines.len() {
                let next = lines[j].trim();
                if next.is_empty() {
                    j += 1;
                    continue;
                }
                if !is_prose_line(&result, j, next) {
                    break;
                }
                end = j;
                j += 1;
            }
            removed.extend(i + 1..=end + 1);
            issues.push(
                Issue::warning(
                    "narrative-text",
                    format!("Narrative text in output ({})", rule.rule.label),
                )
                .at_line(i + 1)
                .fixed_with(format!("removed {} line(s)", end - i + 1)),
            );
            i = end + 1;
            continue;
        }

        i += 1;
    }

    if removed.is_empty() {
        return (code.to_string(), issues);
    }
    (remove_lines(code, &removed), issues)
}

// =============================================================================
// Duplicate Declarations
// =============================================================================

fn skip_whitespace(masked: &str, mut pos: usize) -> usize {
    let bytes = masked.as_bytes();
    while bytes.get(pos).is_some_and(|b| b.is_ascii_whitespace()) {
        pos += 1;
    }
    pos
}

/// End of the statement whose header ends at `after_arrow`
fn arrow_extent(masked: &str, after_arrow: usize) -> usize {
    let pos = skip_whitespace(masked, after_arrow);
    if matches!(masked.as_bytes().get(pos), Some(b'{') | Some(b'('))
        && let Some(close) = matching_close(masked, pos)
    {
        return close + 1;
    }
    masked[after_arrow..]
        .find('\n')
        .map_or(masked.len(), |i| after_arrow + i)
}

const DECLARATION_STARTS: &[&str] = &["function", "export", "async", "declare"];

/// End of a function body, or `None` for a bodiless overload signature
fn function_extent(masked: &str, params_open: usize) -> Option<usize> {
    let params_close = matching_close(masked, params_open)?;
    let bytes = masked.as_bytes();
    let mut pos = params_close + 1;
    let body_open = loop {
        match bytes.get(pos)? {
            b'{' => break pos,
            b';' => return None,
            b'\n' => {
                let next = masked[pos + 1..].trim_start();
                if DECLARATION_STARTS.iter().any(|k| next.starts_with(k)) {
                    return None;
                }
            }
            _ => {}
        }
        pos += 1;
    };
    matching_close(masked, body_open).map(|c| c + 1)
}

/// Sort by start and drop ranges overlapping an earlier kept one
fn outermost<T>(mut ranges: Vec<(usize, usize, T)>) -> Vec<(usize, usize, T)> {
    ranges.sort_by_key(|r| r.0);
    let mut kept: Vec<(usize, usize, T)> = Vec::new();
    for r in ranges {
        if kept.last().is_some_and(|k| r.0 < k.1) {
            continue;
        }
        kept.push(r);
    }
    kept
}

/// Extend a declaration range over a trailing `;`, the newline and one
/// following blank line
fn swallow_trailing(masked: &str, mut end: usize) -> usize {
    let bytes = masked.as_bytes();
    if bytes.get(end) == Some(&b';') {
        end += 1;
    }
    let line_end = masked[end..].find('\n').map_or(masked.len(), |i| end + i);
    if !masked[end..line_end].trim().is_empty() {
        return end;
    }
    end = (line_end + 1).min(masked.len());
    let next_end = masked[end..].find('\n').map_or(masked.len(), |i| end + i);
    if next_end < masked.len() && masked[end..next_end].trim().is_empty() {
        end = next_end + 1;
    }
    end
}

struct Declaration {
    name: String,
    start: usize,
    end: usize,
}

fn top_level_functions(result: &ScanResult) -> Vec<Declaration> {
    let masked = &result.masked;
    let at_top = |offset: usize| result.line_depth(line_of(masked, offset)) == 0;

    let functions = TOP_FUNCTION.captures_iter(masked).filter_map(|caps| {
        let whole = caps.get(0)?;
        if !at_top(whole.start()) {
            return None;
        }
        let end = function_extent(masked, whole.end() - 1)?;
        Some(Declaration {
            name: caps[1].to_string(),
            start: whole.start(),
            end,
        })
    });
    let arrows = TOP_ARROW.captures_iter(masked).filter_map(|caps| {
        let whole = caps.get(0)?;
        if !at_top(whole.start()) {
            return None;
        }
        Some(Declaration {
            name: caps[1].to_string(),
            start: whole.start(),
            end: arrow_extent(masked, whole.end()),
        })
    });

    let mut decls: Vec<Declaration> = functions.chain(arrows).collect();
    decls.sort_by_key(|d| d.start);
    decls
}

/// Keep the last same-name top-level function, drop the earlier ones
fn merge_duplicate_functions(code: &str) -> (String, Vec<Issue>) {
    let result = scan(code);
    let decls = top_level_functions(&result);

    let mut names: Vec<&str> = Vec::new();
    for d in &decls {
        if !names.contains(&d.name.as_str()) {
            names.push(&d.name);
        }
    }

    let mut ranges = Vec::new();
    let mut issues = Vec::new();
    for name in names {
        let same: Vec<&Declaration> = decls.iter().filter(|d| d.name == name).collect();
        let Some((_, earlier)) = same.split_last() else {
            continue;
        };
        if earlier.is_empty() {
            continue;
        }
        for d in earlier {
            ranges.push((d.start, swallow_trailing(&result.masked, d.end), ()));
        }
        issues.push(
            Issue::warning(
                "duplicate-function",
                format!("'{}' is declared {} times", name, same.len()),
            )
            .at_line(line_of(code, earlier[0].start))
            .fixed_with(format!(
                "removed {} earlier declaration(s), kept the last",
                earlier.len()
            )),
        );
    }

    if ranges.is_empty() {
        return (code.to_string(), issues);
    }
    let mut out = code.to_string();
    for (start, end, ()) in outermost(ranges).into_iter().rev() {
        out.replace_range(start..end, "");
    }
    (out, issues)
}

/// Repeated top-level `const` of one name: all but the last become `let`
fn demote_duplicate_consts(code: &str) -> (String, Vec<Issue>) {
    let result = scan(code);
    let masked = &result.masked;

    let mut seen: Vec<(String, Vec<usize>)> = Vec::new();
    for caps in TOP_CONST.captures_iter(masked) {
        let (Some(keyword), Some(name)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        if result.line_depth(line_of(masked, keyword.start())) != 0 {
            continue;
        }
        match seen.iter_mut().find(|(n, _)| n == name.as_str()) {
            Some((_, offsets)) => offsets.push(keyword.start()),
            None => seen.push((name.as_str().to_string(), vec![keyword.start()])),
        }
    }

    let mut edits = Vec::new();
    let mut issues = Vec::new();
    for (name, offsets) in &seen {
        if offsets.len() < 2 {
            continue;
        }
        let earlier = &offsets[..offsets.len() - 1];
        edits.extend_from_slice(earlier);
        issues.push(
            Issue::warning(
                "duplicate-declaration",
                format!("'{}' is declared with const {} times", name, offsets.len()),
            )
            .at_line(line_of(code, earlier[0]))
            .fixed_with("changed earlier declarations to let"),
        );
    }

    edits.sort_unstable_by(|a, b| b.cmp(a));
    let mut out = code.to_string();
    for at in edits {
        out.replace_range(at..at + "const".len(), "let");
    }
    (out, issues)
}

// =============================================================================
// Ternaries and Branches
// =============================================================================

/// Offset of a `?` that opens a ternary with no `:` on the same line
fn incomplete_ternary_at(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    for (q, _) in line.match_indices('?') {
        let next = bytes.get(q + 1).copied();
        let prev = q.checked_sub(1).and_then(|p| bytes.get(p)).copied();
        if matches!(next, Some(b'.') | Some(b'?') | Some(b':')) || prev == Some(b'?') {
            continue;
        }
        let before = line[..q].trim_end();
        let Some(last) = before.chars().next_back() else {
            continue;
        };
        if !(is_ident_char(last) || last == ')' || last == ']') {
            continue;
        }
        let in_expression = before.contains('=')
            || before.contains('(')
            || before.contains('{')
            || contains_word(before, "return");
        if in_expression && !line[q + 1..].contains(':') {
            return Some(q);
        }
    }
    None
}

fn find_incomplete_ternaries(code: &str) -> Vec<Issue> {
    let result = scan(code);
    let lines = result.masked_lines();
    let mut issues = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let t = line.trim();
        if !result.line_context(i + 1).is_code()
            || t.starts_with('<')
            || t.contains("</")
            || t.contains("/>")
            || incomplete_ternary_at(line).is_none()
        {
            continue;
        }
        let continues = lines[i + 1..]
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .take(2)
            .any(|l| l.starts_with(':') || l.ends_with(':'));
        if !continues {
            issues.push(
                Issue::warning(
                    "incomplete-ternary",
                    "Conditional '?' has no matching ':' branch",
                )
                .at_line(i + 1),
            );
        }
    }
    issues
}

/// `else` followed by a block, an `if` or a statement
fn starts_branch(masked: &str, after_else: usize) -> bool {
    let rest = masked[after_else..].trim_start();
    rest.starts_with('{') || rest.chars().next().is_some_and(is_ident_char)
}

/// Offset sits in text between two markup tags
fn in_markup_text(masked: &str, tags: &[Tag], offset: usize) -> bool {
    let Some(before) = tags.iter().rev().find(|t| t.end <= offset) else {
        return false;
    };
    let Some(after) = tags.iter().find(|t| t.start > offset) else {
        return false;
    };
    !masked[before.end..after.start].contains([';', '(', ')', '{', '}'])
}

/// End offset of an `else`/`else if` branch starting after the keyword
fn else_extent(masked: &str, after_else: usize) -> usize {
    let bytes = masked.as_bytes();
    let mut pos = skip_whitespace(masked, after_else);

    if masked[pos..].starts_with("if")
        && !masked[pos + 2..].chars().next().is_some_and(is_ident_char)
    {
        pos = skip_whitespace(masked, pos + 2);
        if bytes.get(pos) == Some(&b'(')
            && let Some(close) = matching_close(masked, pos)
        {
            pos = skip_whitespace(masked, close + 1);
        }
    }
    if bytes.get(pos) == Some(&b'{')
        && let Some(close) = matching_close(masked, pos)
    {
        return close + 1;
    }
    masked[pos..].find('\n').map_or(masked.len(), |i| pos + i)
}

fn remove_orphaned_else(code: &str) -> (String, Vec<Issue>) {
    let result = scan(code);
    let masked = &result.masked;
    let lines = result.masked_lines();
    let tags = scan_tags(masked);
    let mut ranges: Vec<(usize, usize, usize)> = Vec::new();

    for m in ELSE_KEYWORD.find_iter(masked) {
        let line = line_of(masked, m.start());
        let line_start = line_start_offset(masked, line);
        let first_on_line = masked[line_start..m.start()].trim().is_empty();
        let preceding = masked[..m.start()].trim_end();
        // Only in statement position, and `} else` is attached
        if !(first_on_line || preceding.ends_with([';', '{']))
            || preceding.ends_with('}')
            || !starts_branch(masked, m.end())
            || in_markup_text(masked, &tags, m.start())
        {
            continue;
        }
        let context = lines[line.saturating_sub(3)..line - 1]
            .iter()
            .copied()
            .chain(std::iter::once(&masked[line_start..m.start()]));
        if context.into_iter().any(|l| contains_word(l, "if")) {
            continue;
        }

        let mut end = else_extent(masked, m.end());
        let start = if first_on_line {
            line_start
        } else {
            m.start()
        };
        let line_end = masked[end..].find('\n').map_or(masked.len(), |i| end + i);
        if start == line_start && masked[end..line_end].trim().is_empty() {
            end = (line_end + 1).min(masked.len());
        }
        ranges.push((start, end, line));
    }

    let kept = outermost(ranges);

    let issues = kept
        .iter()
        .map(|(_, _, line)| {
            Issue::warning("orphaned-else", "'else' branch has no preceding 'if'")
                .at_line(*line)
                .fixed_with("removed the orphaned branch")
        })
        .collect();

    let mut out = code.to_string();
    for (start, end, _) in kept.iter().rev() {
        out.replace_range(*start..*end, "");
    }
    (out, issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Language;

    fn run(code: &str) -> PassOutput {
        let ctx = PassContext {
            language: Language::Javascript,
            is_multi_file: false,
        };
        CleanupPass.run(code, &ctx)
    }

    fn count(output: &PassOutput, issue_type: &str) -> usize {
        output
            .issues
            .iter()
            .filter(|i| i.issue_type == issue_type)
            .count()
    }

    #[test]
    fn test_fences_removed() {
        let output = run("```jsx\nconst a = 1;\n```\n");
        assert_eq!(output.code, "const a = 1;\n");
        assert_eq!(count(&output, "markdown-artifact"), 2);
        assert!(output.issues.iter().all(|i| i.fixed));
    }

    #[test]
    fn test_clean_code_untouched() {
        let code = "const a = 1;\n\n\n\nconst b = 2;\n";
        let output = run(code);
        assert_eq!(output.code, code);
        assert!(output.issues.is_empty());
    }

    #[test]
    fn test_narrative_intro_and_outro() {
        let code = "Sure! Here's your component.\n\nconst a = 1;\n\nThis code creates a constant.\nIt is simple.\n";
        let output = run(code);
        assert_eq!(output.code, "const a = 1;\n");
        assert_eq!(count(&output, "narrative-text"), 2);
    }

    #[test]
    fn test_narrative_tail_start() {
        let code = "const a = 1;\n\nLet me know if you need changes.\n";
        let result = scan(code);
        assert_eq!(narrative_tail_start(code, &result), Some(2));
        assert_eq!(narrative_tail_start("const a = 1;", &scan("const a = 1;")), None);
    }

    #[test]
    fn test_nested_prose_not_removed() {
        let code = "function f() {\n  Let me explain\n}\n";
        assert_eq!(run(code).code, code);
    }

    #[test]
    fn test_duplicate_arrow_and_function() {
        let code = "const greet = () => 'a';\nfunction other() {}\nconst greet = () => 'b';\n";
        let output = run(code);
        assert_eq!(output.code, "function other() {}\nconst greet = () => 'b';\n");
        assert_eq!(count(&output, "duplicate-function"), 1);
    }

    #[test]
    fn test_nested_functions_not_merged() {
        let code = "function a() {\n  function helper() {}\n}\nfunction b() {\n  function helper() {}\n}\n";
        let output = run(code);
        assert_eq!(output.code, code);
    }

    #[test]
    fn test_duplicate_const_demoted() {
        let output = run("const a = 1;\nconst a = 2;\nconsole.log(a);");
        assert_eq!(output.code, "let a = 1;\nconst a = 2;\nconsole.log(a);");
        assert_eq!(count(&output, "duplicate-declaration"), 1);
    }

    #[test]
    fn test_incomplete_ternary_flagged() {
        let output = run("const label = isOn ? 'On';\nrender(label);");
        assert_eq!(count(&output, "incomplete-ternary"), 1);
        assert!(output.issues.iter().all(|i| !i.fixed));
    }

    #[test]
    fn test_complete_ternaries_ok() {
        for code in [
            "const a = b ? c : d;",
            "const v = obj?.x ?? 1;",
            "const t = ok\n  ? 1\n  : 2;",
            "const t = ok ?\n  1\n  : 2;",
            "function f(a?: string) {}",
        ] {
            assert_eq!(count(&run(code), "incomplete-ternary"), 0, "{}", code);
        }
    }

    #[test]
    fn test_orphaned_else_removed() {
        let output = run("doThing();\nelse {\n  other();\n}\nfinish();");
        assert_eq!(output.code, "doThing();\nfinish();");
        assert_eq!(count(&output, "orphaned-else"), 1);
    }

    #[test]
    fn test_orphaned_else_if_removed() {
        let output = run("run();\nelse if (ready) {\n  go();\n}\ndone();");
        assert_eq!(output.code, "run();\ndone();");
    }

    #[test]
    fn test_attached_else_kept() {
        for code in [
            "if (a) {\n  b();\n} else {\n  c();\n}",
            "if (a) b();\nelse c();",
            "if (a) {\n  b();\n}\nelse if (c) {\n  d();\n}",
        ] {
            let output = run(code);
            assert_eq!(output.code, code);
            assert_eq!(count(&output, "orphaned-else"), 0);
        }
    }

    #[test]
    fn test_else_in_markup_text_kept() {
        let code = "export default function App() {\n  return (\n    <div>\n      <p>Nothing else to show</p>\n      <p>\n        else we wait\n      </p>\n    </div>\n  );\n}\n";
        let output = run(code);
        assert_eq!(output.code, code);
        assert_eq!(count(&output, "orphaned-else"), 0);
    }

    #[test]
    fn test_else_mid_expression_kept() {
        let code = "const note = 'x' + something.else;\nconst label = someone else;\n";
        assert_eq!(count(&run(code), "orphaned-else"), 0);
    }

    #[test]
    fn test_overload_signatures_not_merged() {
        let code = "function parse(x: string): number;\nfunction parse(x: number): number;\nfunction parse(x: any) {\n  return Number(x);\n}\n";
        let output = run(code);
        assert_eq!(output.code, code);
        assert_eq!(count(&output, "duplicate-function"), 0);
    }

    #[test]
    fn test_overloads_without_semicolons_not_merged() {
        let code = "export function pick(a: string): string\nexport function pick(a: any) {\n  return a;\n}\n";
        let output = run(code);
        assert_eq!(output.code, code);
        assert_eq!(count(&output, "duplicate-function"), 0);
    }

    #[test]
    fn test_repeated_duplicates_keep_last() {
        let code = "function a() {}\nfunction a() {}\nfunction a() {}\n";
        let output = run(code);
        assert_eq!(output.code, "function a() {}\n");
        assert_eq!(count(&output, "duplicate-function"), 1);
    }
}
