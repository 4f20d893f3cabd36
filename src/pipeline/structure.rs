//! Structural integrity pass
//!
//! Sub-passes, in order: unterminated strings, delimiter balance, truncation
//! (judged on the pass input) and conservative statement terminators.

use std::collections::HashSet;

use super::cleanup::narrative_tail_start;
use super::rules::{CONTINUATION_PREFIXES, DANGLING_SUFFIXES};
use super::scanner::{Context, ScanResult, closer_for, is_ident_char, scan};
use super::syntax::word_positions;
use super::{Pass, PassContext, PassOutput, Stage};
use crate::types::Issue;

pub struct StructurePass;

impl Pass for StructurePass {
    fn stage(&self) -> Stage {
        Stage::Structure
    }

    fn run(&self, code: &str, _ctx: &PassContext) -> PassOutput {
        let truncation = detect_truncation(code);

        let (code, mut issues) = close_strings(code);
        let (code, delimiter_issues) = close_delimiters(&code);
        issues.extend(delimiter_issues);
        issues.extend(truncation);
        let (code, semicolon_issues) = insert_semicolons(&code);
        issues.extend(semicolon_issues);

        PassOutput::new(code, issues)
    }
}

fn delimiter_name(ch: char) -> &'static str {
    match ch {
        '{' | '}' => "brace",
        '(' | ')' => "paren",
        _ => "bracket",
    }
}

fn is_comment_line(trimmed: &str) -> bool {
    trimmed.starts_with("//") || trimmed.starts_with("/*") || trimmed.starts_with('*')
}

fn is_markup_line(trimmed: &str) -> bool {
    trimmed.starts_with('<') || trimmed.contains("</") || trimmed.contains("/>")
}

/// Split trailing whitespace off so closers land after the last token
fn split_tail(text: &str) -> (&str, &str) {
    let body = text.trim_end();
    (body, &text[body.len()..])
}

// =============================================================================
// Strings
// =============================================================================

/// Insert `quote` before any trailing run of `;`, `,` and `)`
fn close_string(line: &str, quote: char) -> String {
    let (body, tail) = split_tail(line);
    let cut = body.trim_end_matches([';', ',', ')']).len();
    format!("{}{}{}{}", &body[..cut], quote, &body[cut..], tail)
}

fn close_strings(code: &str) -> (String, Vec<Issue>) {
    let result = scan(code);
    if result.unterminated.is_empty() {
        return (code.to_string(), Vec::new());
    }

    let mut lines: Vec<String> = code.split('\n').map(String::from).collect();
    let mut seen = HashSet::new();
    let mut issues = Vec::new();

    for u in &result.unterminated {
        if !seen.insert(u.line) {
            continue;
        }
        let Some(line) = lines.get_mut(u.line - 1) else {
            continue;
        };
        let trimmed = line.trim_start();
        if !result.line_context(u.line).is_code()
            || is_comment_line(trimmed)
            || is_markup_line(trimmed)
        {
            continue;
        }
        *line = close_string(line, u.quote);
        issues.push(
            Issue::error(
                "unterminated-string",
                format!("String literal opened with {} is never closed", u.quote),
            )
            .at_line(u.line)
            .fixed_with(format!("closed with {}", u.quote)),
        );
    }

    (lines.join("\n"), issues)
}

// =============================================================================
// Delimiters
// =============================================================================

fn close_delimiters(code: &str) -> (String, Vec<Issue>) {
    let (body, tail) = split_tail(code);
    let mut out = body.to_string();
    let mut result = scan(&out);

    let mut issues: Vec<Issue> = result
        .unmatched
        .iter()
        .map(|d| {
            Issue::error(
                format!("unmatched-closing-{}", delimiter_name(d.ch)),
                format!("Closing '{}' has no matching opener", d.ch),
            )
            .at_line(d.line)
        })
        .collect();

    let open_context = match result.end_context {
        Context::BlockComment => Some(("unclosed-comment", " */", "Block comment")),
        Context::Template => Some(("unclosed-template", "`", "Template literal")),
        _ => None,
    };
    if let Some((issue_type, closer, what)) = open_context {
        let mut issue = Issue::error(issue_type, format!("{} is never closed", what))
            .fixed_with(format!("appended '{}'", closer.trim()));
        issue.line = result.end_context_line;
        issues.push(issue);
        out.push_str(closer);
        result = scan(&out);
    }

    if result.unclosed.is_empty() {
        out.push_str(tail);
        return (out, issues);
    }

    let stack = &result.unclosed;
    let mut in_line_comment = result.trailing_line_comment;
    for (i, opener) in stack.iter().enumerate().rev() {
        let closer = closer_for(opener.ch);
        let depth = stack[..i].iter().filter(|d| d.ch == '{').count();
        if opener.ch == '{' || in_line_comment {
            out.push('\n');
            out.push_str(&"  ".repeat(depth));
            in_line_comment = false;
        }
        out.push(closer);
        issues.push(
            Issue::error(
                format!("unclosed-{}", delimiter_name(opener.ch)),
                format!("'{}' is never closed", opener.ch),
            )
            .at_line(opener.line)
            .fixed_with(format!("appended '{}'", closer)),
        );
    }

    out.push_str(tail);
    (out, issues)
}

// =============================================================================
// Truncation
// =============================================================================

fn dangling_suffix(line: &str) -> Option<&'static str> {
    if line.ends_with("++") || line.ends_with("--") || line.ends_with("...") {
        return None;
    }
    DANGLING_SUFFIXES.iter().copied().find(|s| line.ends_with(s))
}

fn ends_with_word(line: &str, word: &str) -> bool {
    line.strip_suffix(word)
        .is_some_and(|rest| !rest.chars().next_back().is_some_and(is_ident_char))
}

/// Flag output that looks cut off mid-statement
pub fn detect_truncation(code: &str) -> Option<Issue> {
    let result = scan(code);
    let lines = result.masked_lines();
    let end = narrative_tail_start(code, &result).unwrap_or(lines.len());

    let (idx, last) = lines[..end]
        .iter()
        .enumerate()
        .rev()
        .filter(|(i, _)| result.line_context(i + 1).is_code())
        .map(|(i, l)| (i, l.trim()))
        .find(|(_, l)| !l.is_empty())?;
    let line = idx + 1;

    if let Some(suffix) = dangling_suffix(last) {
        return Some(
            Issue::warning(
                "truncated-code",
                format!("Output appears truncated: last line ends with '{}'", suffix),
            )
            .at_line(line),
        );
    }
    if ends_with_word(last, "return") {
        return Some(
            Issue::warning("truncated-code", "Output appears truncated: bare 'return'")
                .at_line(line),
        );
    }

    let head = lines[..=idx].join("\n");
    let function_start = [
        word_positions(&head, "function").last().copied(),
        head.rfind("=> {"),
        head.rfind("=>{"),
    ]
    .into_iter()
    .flatten()
    .max()?;
    let body = &head[function_start..];
    let opens = body.matches('{').count();
    let closes = body.matches('}').count();
    (opens > closes).then(|| {
        Issue::warning(
            "truncated-code",
            format!(
                "Output appears truncated: last function body has {} unclosed '{{'",
                opens - closes
            ),
        )
        .at_line(line)
    })
}

// =============================================================================
// Statement Terminators
// =============================================================================

fn line_balanced(line: &str) -> bool {
    [('{', '}'), ('(', ')'), ('[', ']')]
        .iter()
        .all(|(o, c)| line.matches(*o).count() == line.matches(*c).count())
}

fn needs_semicolon(result: &ScanResult, lines: &[&str], i: usize) -> bool {
    if !result.line_context(i + 1).is_code() {
        return false;
    }
    let t = lines[i].trim();
    let is_decl = ["const ", "let ", "var "].iter().any(|k| t.starts_with(k));
    if !is_decl
        || !t.contains('=')
        || t.ends_with(';')
        || t.ends_with('>')
        || dangling_suffix(t).is_some()
        || !line_balanced(t)
    {
        return false;
    }

    // The line itself must end in code
    let ends_in_code = if i + 1 < lines.len() {
        result.line_context(i + 2).is_code()
    } else {
        result.end_context.is_code()
    };
    if !ends_in_code {
        return false;
    }

    lines[i + 1..]
        .iter()
        .map(|l| l.trim())
        .find(|l| !l.is_empty())
        .is_none_or(|next| !CONTINUATION_PREFIXES.iter().any(|p| next.starts_with(p)))
}

/// Only in files that already terminate statements with `;`
fn insert_semicolons(code: &str) -> (String, Vec<Issue>) {
    let result = scan(code);
    if !result.masked.contains(';') {
        return (code.to_string(), Vec::new());
    }

    let lines = result.masked_lines();
    let mut inserts = Vec::new();
    let mut offset = 0;
    for (i, line) in lines.iter().enumerate() {
        let start = offset;
        offset += line.len() + 1;
        if needs_semicolon(&result, &lines, i) {
            inserts.push((start + line.trim_end().len(), i + 1));
        }
    }

    let mut out = code.to_string();
    for (at, _) in inserts.iter().rev() {
        out.insert(*at, ';');
    }

    let issues = inserts
        .iter()
        .map(|(_, line)| {
            Issue::info("missing-semicolon", "Declaration is missing its ';'")
                .at_line(*line)
                .fixed_with("inserted ';'")
        })
        .collect();
    (out, issues)
}
