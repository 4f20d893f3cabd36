//! Textual syntax helpers shared by the passes.
//!
//! These work on scanner output (usually the masked text) and never try to
//! build a syntax tree. Everything is a best-effort regex or word search.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use super::rules::KEYWORDS;
use super::scanner::{ScanResult, is_ident_char, line_of, line_start_offset};
use crate::types::Language;

static IMPORT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*import\s+(.+?)\s+from\s+['"]([^'"]+)['"]\s*;?\s*$"#).unwrap()
});

static SIDE_EFFECT_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*import\s+['"][^'"]+['"]\s*;?\s*$"#).unwrap());

static FUNCTION_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bfunction\s*\*?\s*([A-Za-z_$][\w$]*)\s*(?:<[^>]*>)?\s*\(([^)]*)\)").unwrap()
});

static ANON_FUNCTION_PARAMS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bfunction\s*\*?\s*\(([^)]*)\)").unwrap());

static VARIABLE_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:const|let|var)\s+([A-Za-z_$][\w$]*|\{[^}]*\}|\[[^\]]*\])").unwrap()
});

static CLASS_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:class|interface|type|enum)\s+([A-Za-z_$][\w$]*)").unwrap());

static ARROW_PARAMS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^()]*)\)\s*(?::\s*[^=]+?)?\s*=>").unwrap());

static ARROW_SINGLE_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z_$][\w$]*)\s*=>").unwrap());

static CATCH_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bcatch\s*\(\s*([A-Za-z_$][\w$]*)").unwrap());

static METHOD_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:async\s+)?([A-Za-z_$][\w$]*)\s*\(([^)]*)\)\s*\{").unwrap()
});

static IDENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z_$][\w$]*").unwrap());

static COMPONENT_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:export\s+(?:default\s+)?)?(?:async\s+)?function\s+([A-Z][\w$]*)\s*\(")
        .unwrap()
});

static COMPONENT_ARROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:export\s+)?(?:const|let|var)\s+([A-Z][\w$]*)\s*(?::\s*[\w.<>, ]+)?=\s*(?:React\.memo\(\s*)?(?:async\s+)?(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*(?::\s*[\w.<>\[\]| ]+)?=>",
    )
    .unwrap()
});

static COMPONENT_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:export\s+(?:default\s+)?)?class\s+([A-Z][\w$]*)\s+extends\s+(?:React\.)?(?:Component|PureComponent)\b")
        .unwrap()
});

static UPPERCASE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\w$.])<[A-Z][\w.]*[\s/>]").unwrap());

static CLASS_NAME_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bclassName\s*=").unwrap());

static TYPE_ANNOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        [\w)\]?]\s*:\s*(?:string|number|boolean|any|void|unknown|never|React\.\w+)\b
        | \binterface\s+[A-Z]\w*
        | \btype\s+[A-Z]\w*\s*(?:<[^>]*>)?\s*=
        | \b(?:useState|useRef|createContext|useReducer)<
        | \bas\s+(?:string|number|boolean|any|const|unknown)\b
        | \b(?:React\.)?FC<",
    )
    .unwrap()
});

// =============================================================================
// Imports
// =============================================================================

/// A single-line `import ... from '...'` statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportStmt {
    /// 1-based
    pub line: usize,
    pub module: String,
    /// Local names bound by the statement
    pub bindings: Vec<String>,
    pub default_binding: Option<String>,
    pub named: Vec<String>,
    pub namespace: Option<String>,
}

/// Local names bound by an import clause such as `React, { useState as s }`
fn parse_import_clause(clause: &str) -> (Option<String>, Vec<String>, Option<String>) {
    let clause = clause.trim().strip_prefix("type ").unwrap_or(clause.trim());
    let mut default_binding = None;
    let mut named = Vec::new();
    let mut namespace = None;

    let (outside, inside) = match (clause.find('{'), clause.rfind('}')) {
        (Some(open), Some(close)) if close > open => (
            format!("{}{}", &clause[..open], &clause[close + 1..]),
            Some(&clause[open + 1..close]),
        ),
        _ => (clause.to_string(), None),
    };

    if let Some(inside) = inside {
        for spec in inside.split(',') {
            let spec = spec.trim().strip_prefix("type ").unwrap_or(spec.trim());
            if spec.is_empty() {
                continue;
            }
            let local = spec.rsplit(" as ").next().unwrap_or(spec).trim();
            if !local.is_empty() {
                named.push(local.to_string());
            }
        }
    }

    for part in outside.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some(ns) = part.strip_prefix('*') {
            if let Some(name) = ns.trim().strip_prefix("as ") {
                namespace = Some(name.trim().to_string());
            }
        } else if part.chars().all(is_ident_char) {
            default_binding = Some(part.to_string());
        }
    }

    (default_binding, named, namespace)
}

/// Single-line imports on lines that start in code context
pub fn parse_imports(text: &str, scan: &ScanResult) -> Vec<ImportStmt> {
    text.split('\n')
        .enumerate()
        .filter(|(i, _)| scan.line_context(i + 1).is_code())
        .filter_map(|(i, line)| {
            let caps = IMPORT_LINE.captures(line)?;
            let (default_binding, named, namespace) = parse_import_clause(&caps[1]);
            let mut bindings: Vec<String> = default_binding.iter().cloned().collect();
            bindings.extend(named.iter().cloned());
            bindings.extend(namespace.iter().cloned());
            Some(ImportStmt {
                line: i + 1,
                module: caps[2].to_string(),
                bindings,
                default_binding,
                named,
                namespace,
            })
        })
        .collect()
}

pub fn is_import_line(line: &str) -> bool {
    IMPORT_LINE.is_match(line) || SIDE_EFFECT_IMPORT.is_match(line)
}

pub fn is_side_effect_import(line: &str) -> bool {
    SIDE_EFFECT_IMPORT.is_match(line)
}

/// Byte offset where a new import line should go: before the first import,
/// else after leading directives and comments
pub fn import_insert_offset(text: &str) -> usize {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim();
        if is_import_line(line.trim_end_matches('\n')) {
            return offset;
        }
        let directive = (trimmed.starts_with("'use ") || trimmed.starts_with("\"use "))
            && trimmed.trim_end_matches(';').ends_with(['\'', '"']);
        let comment = trimmed.starts_with("//")
            || trimmed.starts_with("/*")
            || trimmed.starts_with('*');
        if directive || comment || trimmed.is_empty() {
            offset += line.len();
            continue;
        }
        break;
    }
    // No imports: stay after directives/comments only when one was seen
    let head = &text[..offset];
    if head.trim().is_empty() { 0 } else { offset }
}

// =============================================================================
// Declarations
// =============================================================================

fn push_idents(target: &mut HashSet<String>, text: &str) {
    for m in IDENT.find_iter(text) {
        target.insert(m.as_str().to_string());
    }
}

/// Every name the file declares: functions, classes, variables (with
/// destructuring), parameters, catch bindings, methods and imports.
///
/// Over-approximates on purpose; callers use it to suppress reports.
pub fn declared_names(masked: &str, imports: &[ImportStmt]) -> HashSet<String> {
    let mut names = HashSet::new();

    for caps in FUNCTION_DECL.captures_iter(masked) {
        names.insert(caps[1].to_string());
        push_idents(&mut names, &caps[2]);
    }
    for caps in ANON_FUNCTION_PARAMS.captures_iter(masked) {
        push_idents(&mut names, &caps[1]);
    }
    for caps in VARIABLE_DECL.captures_iter(masked) {
        push_idents(&mut names, &caps[1]);
    }
    for caps in CLASS_DECL.captures_iter(masked) {
        names.insert(caps[1].to_string());
    }
    for caps in ARROW_PARAMS.captures_iter(masked) {
        push_idents(&mut names, &caps[1]);
    }
    for caps in ARROW_SINGLE_PARAM.captures_iter(masked) {
        names.insert(caps[1].to_string());
    }
    for caps in CATCH_PARAM.captures_iter(masked) {
        names.insert(caps[1].to_string());
    }
    for caps in METHOD_DECL.captures_iter(masked) {
        // `if (x) {` has the same shape as a method
        if KEYWORDS.contains(&&caps[1]) {
            continue;
        }
        names.insert(caps[1].to_string());
        push_idents(&mut names, &caps[2]);
    }
    for import in imports {
        names.extend(import.bindings.iter().cloned());
    }

    names
}

/// A component-shaped top-level declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDecl {
    pub name: String,
    /// 1-based
    pub line: usize,
    /// Byte offset of the declaration start
    pub offset: usize,
}

/// Top-level declarations whose name starts uppercase and which are
/// functions, arrow functions or component classes, in source order
pub fn component_decls(scan: &ScanResult) -> Vec<ComponentDecl> {
    let masked = &scan.masked;
    let mut decls: Vec<ComponentDecl> = [&*COMPONENT_FUNCTION, &*COMPONENT_ARROW, &*COMPONENT_CLASS]
        .iter()
        .flat_map(|re| re.captures_iter(masked))
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let line = line_of(masked, whole.start());
            (scan.line_depth(line) == 0).then(|| ComponentDecl {
                name: caps[1].to_string(),
                line,
                offset: whole.start(),
            })
        })
        .collect();
    decls.sort_by_key(|d| d.offset);
    decls.dedup_by(|a, b| a.name == b.name && a.offset == b.offset);
    decls
}

// =============================================================================
// Detection
// =============================================================================

/// Uppercase opening tag or a `className=` attribute
pub fn has_markup(masked: &str) -> bool {
    UPPERCASE_TAG.is_match(masked) || CLASS_NAME_ATTR.is_match(masked)
}

pub fn has_type_annotations(masked: &str) -> bool {
    TYPE_ANNOTATION.is_match(masked)
}

/// Ordered heuristic: typed markup, markup, typed, plain
pub fn detect_language(scan: &ScanResult) -> Language {
    match (has_markup(&scan.masked), has_type_annotations(&scan.masked)) {
        (true, true) => Language::Tsx,
        (true, false) => Language::Jsx,
        (false, true) => Language::Typescript,
        (false, false) => Language::Javascript,
    }
}

// =============================================================================
// Word Search
// =============================================================================

/// Byte offsets of `word` where it is not part of a longer identifier
pub fn word_positions(text: &str, word: &str) -> Vec<usize> {
    if word.is_empty() {
        return Vec::new();
    }
    text.match_indices(word)
        .filter(|(i, _)| {
            let before = text[..*i].chars().next_back();
            let after = text[i + word.len()..].chars().next();
            !before.is_some_and(is_ident_char) && !after.is_some_and(is_ident_char)
        })
        .map(|(i, _)| i)
        .collect()
}

pub fn contains_word(text: &str, word: &str) -> bool {
    !word_positions(text, word).is_empty()
}

/// Identifiers in an expression that are read as plain variables: not
/// property accesses and not object keys
pub fn free_identifiers(expr: &str) -> Vec<(usize, String)> {
    IDENT
        .find_iter(expr)
        .filter(|m| {
            let before = expr[..m.start()].trim_end();
            let after = expr[m.end()..].trim_start();
            let first = m.as_str().chars().next().unwrap_or('0');
            !first.is_ascii_digit()
                && !before.ends_with('.')
                && !(after.starts_with(':') && !after.starts_with("::"))
        })
        .map(|m| (m.start(), m.as_str().to_string()))
        .collect()
}

// =============================================================================
// Editing
// =============================================================================

/// Replace the text of 1-based `line`, keeping its newline
pub fn replace_line(text: &str, line: usize, new_line: &str) -> String {
    let start = line_start_offset(text, line);
    let end = text[start..].find('\n').map_or(text.len(), |i| start + i);
    format!("{}{}{}", &text[..start], new_line, &text[end..])
}

/// Insert an import statement at [`import_insert_offset`]
pub fn insert_import(text: &str, statement: &str) -> String {
    let at = import_insert_offset(text);
    let rest = &text[at..];
    // A file with no imports yet gets a blank line after the new one
    let sep = if rest.trim_start().starts_with("import") || rest.is_empty() {
        "\n"
    } else {
        "\n\n"
    };
    format!("{}{}{}{}", &text[..at], statement, sep, rest)
}

/// Append a top-level statement after a blank line, keeping trailing whitespace
pub fn append_statement(text: &str, statement: &str) -> String {
    let body = text.trim_end();
    let tail = &text[body.len()..];
    if body.is_empty() {
        return format!("{}{}", statement, tail);
    }
    format!("{}\n\n{}{}", body, statement, tail)
}
