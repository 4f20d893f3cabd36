//! Rule Tables
//!
//! Every convention check that is not part of the character scanner is data:
//! a static table of rules, each independently testable.
//!
//! ## Tables
//! - `ISSUE_CATALOGUE`: every issue type the pipeline can emit
//! - `ATTRIBUTE_RULES`: lowercase markup attributes and their expected casing
//! - `PLACEHOLDER_RULES`: markers of omitted or unfinished code
//! - `FENCE_RULES`, `NARRATIVE_INTRO_RULES`, `NARRATIVE_OUTRO_RULES`:
//!   generated-text artifacts around code
//! - Identifier tables: built-in hooks, void elements, well-known bindings,
//!   globals, short names and keywords

use regex::Regex;
use std::sync::LazyLock;
use tracing::error;

use super::Stage;
use crate::types::Severity;

// =============================================================================
// Issue Catalogue
// =============================================================================

/// Static description of an issue type
#[derive(Debug, Clone, Copy)]
pub struct IssueDef {
    pub issue_type: &'static str,
    pub stage: Stage,
    pub severity: Severity,
    /// Whether the owning stage corrects it
    pub auto_fix: bool,
}

const fn def(
    issue_type: &'static str,
    stage: Stage,
    severity: Severity,
    auto_fix: bool,
) -> IssueDef {
    IssueDef {
        issue_type,
        stage,
        severity,
        auto_fix,
    }
}

pub const ISSUE_CATALOGUE: &[IssueDef] = &[
    // ===== Structure =====
    def("unclosed-brace", Stage::Structure, Severity::Error, true),
    def("unclosed-paren", Stage::Structure, Severity::Error, true),
    def("unclosed-bracket", Stage::Structure, Severity::Error, true),
    def("unmatched-closing-brace", Stage::Structure, Severity::Error, false),
    def("unmatched-closing-paren", Stage::Structure, Severity::Error, false),
    def("unmatched-closing-bracket", Stage::Structure, Severity::Error, false),
    def("unclosed-comment", Stage::Structure, Severity::Error, true),
    def("unclosed-template", Stage::Structure, Severity::Error, true),
    def("unterminated-string", Stage::Structure, Severity::Error, true),
    def("truncated-code", Stage::Structure, Severity::Warning, false),
    def("missing-semicolon", Stage::Structure, Severity::Info, true),
    // ===== Markup =====
    def("missing-export", Stage::Markup, Severity::Warning, true),
    def("missing-hook-import", Stage::Markup, Severity::Error, true),
    def("unbalanced-jsx-tags", Stage::Markup, Severity::Warning, false),
    def("missing-render-call", Stage::Markup, Severity::Info, true),
    def("invalid-jsx-attribute", Stage::Markup, Severity::Warning, true),
    // ===== Imports =====
    def("unused-import", Stage::Imports, Severity::Warning, true),
    def("missing-tailwind-cdn", Stage::Imports, Severity::Warning, true),
    def("missing-import", Stage::Imports, Severity::Error, false),
    // ===== Completeness =====
    def("placeholder-code", Stage::Completeness, Severity::Warning, false),
    def("component-returns-null", Stage::Completeness, Severity::Warning, false),
    def("undefined-handler", Stage::Completeness, Severity::Error, false),
    def("undefined-variable", Stage::Completeness, Severity::Error, false),
    // ===== Cleanup =====
    def("markdown-artifact", Stage::Cleanup, Severity::Warning, true),
    def("narrative-text", Stage::Cleanup, Severity::Warning, true),
    def("duplicate-function", Stage::Cleanup, Severity::Warning, true),
    def("duplicate-declaration", Stage::Cleanup, Severity::Warning, true),
    def("incomplete-ternary", Stage::Cleanup, Severity::Warning, false),
    def("orphaned-else", Stage::Cleanup, Severity::Warning, true),
];

pub fn issue_def(issue_type: &str) -> Option<&'static IssueDef> {
    ISSUE_CATALOGUE.iter().find(|d| d.issue_type == issue_type)
}

// =============================================================================
// Rule Engine
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub enum Matcher {
    /// Exact substring
    Literal(&'static str),
    /// Regular expression
    Pattern(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub enum FixAction {
    /// Substitute the matched text
    Replace(&'static str),
    /// Drop the whole matching line
    RemoveLine,
    /// Report only
    Flag,
}

/// One `(pattern, issue type, fix action)` rule
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub issue_type: &'static str,
    pub label: &'static str,
    pub matcher: Matcher,
    pub fix: FixAction,
}

/// A rule with its pattern compiled
#[derive(Debug)]
pub struct CompiledRule {
    pub rule: &'static Rule,
    regex: Option<Regex>,
}

impl CompiledRule {
    pub fn is_match(&self, text: &str) -> bool {
        match (&self.regex, self.rule.matcher) {
            (Some(re), _) => re.is_match(text),
            (None, Matcher::Literal(lit)) => text.contains(lit),
            (None, Matcher::Pattern(_)) => false,
        }
    }

    /// Byte ranges of every match
    pub fn find_all(&self, text: &str) -> Vec<(usize, usize)> {
        match (&self.regex, self.rule.matcher) {
            (Some(re), _) => re.find_iter(text).map(|m| (m.start(), m.end())).collect(),
            (None, Matcher::Literal(lit)) => text
                .match_indices(lit)
                .map(|(i, m)| (i, i + m.len()))
                .collect(),
            (None, Matcher::Pattern(_)) => Vec::new(),
        }
    }
}

/// Compile a rule table. Invalid patterns are logged and skipped.
pub fn compile(rules: &'static [Rule]) -> Vec<CompiledRule> {
    rules
        .iter()
        .filter_map(|rule| match rule.matcher {
            Matcher::Literal(_) => Some(CompiledRule { rule, regex: None }),
            Matcher::Pattern(pattern) => match Regex::new(pattern) {
                Ok(regex) => Some(CompiledRule {
                    rule,
                    regex: Some(regex),
                }),
                Err(e) => {
                    error!(rule = rule.label, error = %e, "Invalid rule pattern, skipping");
                    None
                }
            },
        })
        .collect()
}

// =============================================================================
// Markup Attribute Rules
// =============================================================================

const fn attr(wrong: &'static str, right: &'static str) -> Rule {
    Rule {
        issue_type: "invalid-jsx-attribute",
        label: wrong,
        matcher: Matcher::Literal(wrong),
        fix: FixAction::Replace(right),
    }
}

pub const ATTRIBUTE_RULE_TABLE: &[Rule] = &[
    attr("onclick=", "onClick="),
    attr("onchange=", "onChange="),
    attr("onsubmit=", "onSubmit="),
    attr("oninput=", "onInput="),
    attr("onkeydown=", "onKeyDown="),
    attr("onkeyup=", "onKeyUp="),
    attr("onkeypress=", "onKeyPress="),
    attr("onmouseenter=", "onMouseEnter="),
    attr("onmouseleave=", "onMouseLeave="),
    attr("onfocus=", "onFocus="),
    attr("onblur=", "onBlur="),
    attr(" class=", " className="),
    attr(" for=", " htmlFor="),
    attr("tabindex=", "tabIndex="),
];

pub static ATTRIBUTE_RULES: LazyLock<Vec<CompiledRule>> =
    LazyLock::new(|| compile(ATTRIBUTE_RULE_TABLE));

// =============================================================================
// Placeholder Rules
// =============================================================================

const fn placeholder(label: &'static str, pattern: &'static str) -> Rule {
    Rule {
        issue_type: "placeholder-code",
        label,
        matcher: Matcher::Pattern(pattern),
        fix: FixAction::Flag,
    }
}

pub const PLACEHOLDER_RULE_TABLE: &[Rule] = &[
    placeholder(
        "TODO/FIXME marker",
        r"(?://|/\*|\{/\*)\s*(?:TODO|FIXME|HACK|XXX)\b",
    ),
    placeholder("ellipsis comment", r"(?://|/\*|\{/\*)\s*\.{3}"),
    placeholder(
        "omitted-code comment",
        r"(?i)(?://|/\*).*\b(?:rest of (?:the )?(?:code|component|implementation|file|logic)|remaining (?:code|implementation)|implementation goes here|(?:add|your) (?:more |your )?(?:code|logic) here)",
    ),
    placeholder("language placeholder keyword", r"^\s*pass\s*$"),
    placeholder("bare ellipsis", r"^\s*\.{3}\s*$"),
    placeholder(
        "not-implemented throw",
        r#"(?i)throw\s+new\s+Error\(\s*['"`]not\s+implemented"#,
    ),
];

pub static PLACEHOLDER_RULES: LazyLock<Vec<CompiledRule>> =
    LazyLock::new(|| compile(PLACEHOLDER_RULE_TABLE));

// =============================================================================
// Generated-Text Artifact Rules
// =============================================================================

pub const FENCE_RULE_TABLE: &[Rule] = &[Rule {
    issue_type: "markdown-artifact",
    label: "code fence",
    matcher: Matcher::Pattern(r"^\s*```[\w+#.-]*\s*$"),
    fix: FixAction::RemoveLine,
}];

pub static FENCE_RULES: LazyLock<Vec<CompiledRule>> =
    LazyLock::new(|| compile(FENCE_RULE_TABLE));

const fn narrative(label: &'static str, pattern: &'static str) -> Rule {
    Rule {
        issue_type: "narrative-text",
        label,
        matcher: Matcher::Pattern(pattern),
        fix: FixAction::RemoveLine,
    }
}

/// Sentences a model puts before the code
pub const NARRATIVE_INTRO_RULE_TABLE: &[Rule] = &[
    narrative(
        "presentation",
        r"(?i)^(?:here(?:'s| is| are)|below is|the following is)\b.*[:.!]\s*$",
    ),
    narrative(
        "acknowledgement",
        r"(?i)^(?:sure|certainly|of course|absolutely|okay|great)[,!.](?:\s.*)?$",
    ),
    narrative(
        "change announcement",
        r"(?i)^i(?:'ve| have)\s+(?:created|updated|written|implemented|fixed|added|refactored)\b.*[:.!]\s*$",
    ),
];

/// Sentences a model puts after the code
pub const NARRATIVE_OUTRO_RULE_TABLE: &[Rule] = &[
    narrative(
        "explanation offer",
        r"(?i)^(?:let me (?:know|explain)|i hope this|hope this helps|feel free)\b",
    ),
    narrative(
        "code description",
        r"(?i)^this (?:code|component|implementation|version|solution) (?:will|should|creates|uses|does|now|provides|includes)\b",
    ),
    narrative(
        "notes heading",
        r"(?i)^(?:\*\*)?(?:note|notes|explanation|key (?:changes|features|points)|how it works)(?:\*\*)?:",
    ),
];

pub static NARRATIVE_INTRO_RULES: LazyLock<Vec<CompiledRule>> =
    LazyLock::new(|| compile(NARRATIVE_INTRO_RULE_TABLE));

pub static NARRATIVE_OUTRO_RULES: LazyLock<Vec<CompiledRule>> =
    LazyLock::new(|| compile(NARRATIVE_OUTRO_RULE_TABLE));

// =============================================================================
// Identifier Tables
// =============================================================================

/// React built-in hooks; only these are auto-imported
pub const REACT_HOOKS: &[&str] = &[
    "useState",
    "useEffect",
    "useContext",
    "useReducer",
    "useCallback",
    "useMemo",
    "useRef",
    "useLayoutEffect",
    "useImperativeHandle",
    "useDebugValue",
    "useId",
    "useTransition",
    "useDeferredValue",
    "useSyncExternalStore",
    "useInsertionEffect",
    "useOptimistic",
    "useActionState",
];

/// Elements that never take a closing tag
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// A binding commonly used without its import
#[derive(Debug, Clone, Copy)]
pub struct WellKnownBinding {
    pub name: &'static str,
    pub module: &'static str,
    /// `import X from` rather than `import { X } from`
    pub default_import: bool,
}

const fn binding(
    name: &'static str,
    module: &'static str,
    default_import: bool,
) -> WellKnownBinding {
    WellKnownBinding {
        name,
        module,
        default_import,
    }
}

pub const WELL_KNOWN_BINDINGS: &[WellKnownBinding] = &[
    binding("React", "react", true),
    binding("ReactDOM", "react-dom", true),
    binding("PropTypes", "prop-types", true),
    binding("axios", "axios", true),
    binding("clsx", "clsx", true),
    binding("motion", "framer-motion", false),
    binding("AnimatePresence", "framer-motion", false),
    binding("useNavigate", "react-router-dom", false),
    binding("useRouter", "next/router", false),
    binding("Link", "react-router-dom", false),
];

pub fn well_known_binding(name: &str) -> Option<&'static WellKnownBinding> {
    WELL_KNOWN_BINDINGS.iter().find(|b| b.name == name)
}

/// Runtime globals that never need a declaration
pub const KNOWN_GLOBALS: &[&str] = &[
    "window",
    "document",
    "console",
    "Math",
    "JSON",
    "Date",
    "Array",
    "Object",
    "String",
    "Number",
    "Boolean",
    "Promise",
    "Map",
    "Set",
    "WeakMap",
    "Symbol",
    "Error",
    "RegExp",
    "BigInt",
    "Intl",
    "URL",
    "URLSearchParams",
    "FormData",
    "Event",
    "parseInt",
    "parseFloat",
    "isNaN",
    "isFinite",
    "setTimeout",
    "clearTimeout",
    "setInterval",
    "clearInterval",
    "requestAnimationFrame",
    "cancelAnimationFrame",
    "fetch",
    "localStorage",
    "sessionStorage",
    "navigator",
    "location",
    "history",
    "alert",
    "confirm",
    "prompt",
    "encodeURIComponent",
    "decodeURIComponent",
    "structuredClone",
    "crypto",
    "performance",
    "globalThis",
    "process",
    "require",
    "module",
    "exports",
    "Infinity",
    "NaN",
    "arguments",
];

/// Loop and callback names too common to report
pub const SHORT_NAMES: &[&str] = &[
    "i", "j", "k", "n", "x", "y", "e", "_", "a", "b", "el", "idx", "acc", "item", "index",
];

/// Reserved words and type names that look like identifiers
pub const KEYWORDS: &[&str] = &[
    "true",
    "false",
    "null",
    "undefined",
    "this",
    "new",
    "typeof",
    "instanceof",
    "in",
    "of",
    "return",
    "if",
    "else",
    "const",
    "let",
    "var",
    "function",
    "class",
    "extends",
    "await",
    "async",
    "yield",
    "void",
    "delete",
    "case",
    "default",
    "switch",
    "break",
    "continue",
    "do",
    "while",
    "for",
    "try",
    "catch",
    "finally",
    "throw",
    "import",
    "export",
    "from",
    "as",
    "super",
    "static",
    "get",
    "set",
    "string",
    "number",
    "boolean",
    "any",
    "unknown",
    "never",
    "object",
    "satisfies",
    "keyof",
];

pub fn is_reserved(name: &str) -> bool {
    KEYWORDS.contains(&name) || KNOWN_GLOBALS.contains(&name) || SHORT_NAMES.contains(&name)
}

/// Line endings that mean the statement continues on the next line.
/// Longest first so `&&` wins over `&`.
pub const DANGLING_SUFFIXES: &[&str] = &[
    "&&", "||", "??", "=>", ",", "(", "{", "[", "=", "+", "-", "*", "%", "?", ":", ".", "|", "&",
];

/// Line starts that continue the previous statement
pub const CONTINUATION_PREFIXES: &[&str] = &[
    ".", "?", ":", "+", "-", "*", "/", "&&", "||", "??", ",", "(", "[", "=", ")", "<", "`",
];
