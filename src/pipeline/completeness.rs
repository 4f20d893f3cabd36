//! Completeness check pass
//!
//! Report-only: nothing here is auto-fixed. Findings are signals for manual
//! or model-assisted repair.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use super::markup::{Tag, TagKind, scan_tags};
use super::rules::{PLACEHOLDER_RULES, VOID_ELEMENTS, is_reserved, well_known_binding};
use super::scanner::{ScanResult, is_ident_char, line_of, matching_close, scan};
use super::syntax::{ComponentDecl, component_decls, declared_names, free_identifiers, parse_imports};
use super::{Pass, PassContext, PassOutput, Stage};
use crate::types::Issue;

static HOOK_USE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\buse[A-Z][\w$]*\s*\(").unwrap());

static EVENT_ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bon[A-Z][\w$]*\s*=").unwrap());

static RETURN_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\breturn\b([^;\n]*)").unwrap());

static HANDLER_BINDING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bon[A-Z][\w$]*\s*=\s*\{\s*([A-Za-z_$][\w$]*)\s*\}").unwrap()
});

pub struct CompletenessPass;

impl Pass for CompletenessPass {
    fn stage(&self) -> Stage {
        Stage::Completeness
    }

    fn run(&self, code: &str, _ctx: &PassContext) -> PassOutput {
        let result = scan(code);
        let imports = parse_imports(code, &result);
        let declared = declared_names(&result.masked, &imports);

        let mut issues = find_placeholders(code, &result);
        issues.extend(find_empty_components(&result));
        issues.extend(find_undefined_handlers(&result, &declared));
        issues.extend(find_undefined_markup_names(&result, &declared));

        PassOutput::new(code.to_string(), issues)
    }
}

fn find_placeholders(code: &str, result: &ScanResult) -> Vec<Issue> {
    code.split('\n')
        .enumerate()
        .filter(|(i, _)| result.line_context(i + 1).is_code())
        .filter_map(|(i, line)| {
            let rule = PLACEHOLDER_RULES.iter().find(|r| r.is_match(line))?;
            Some(
                Issue::warning(
                    "placeholder-code",
                    format!("Placeholder left in output ({})", rule.rule.label),
                )
                .at_line(i + 1),
            )
        })
        .collect()
}

// =============================================================================
// Components Rendering Nothing
// =============================================================================

/// Byte range of the `{ ... }` body of a function-shaped component
fn component_body(masked: &str, decl: &ComponentDecl) -> Option<(usize, usize)> {
    let head_end = masked[decl.offset..]
        .find('\n')
        .map_or(masked.len(), |i| decl.offset + i);
    if masked[decl.offset..head_end].split_whitespace().any(|w| w == "class") {
        return None;
    }

    let params = decl.offset + masked[decl.offset..].find('(')?;
    let params_close = matching_close(masked, params)?;
    let open = params_close + masked[params_close..].find('{')?;
    let between = masked[params_close + 1..open].trim();
    let plain = between.is_empty() || between == "=>" || between.starts_with(':');
    if !plain {
        return None;
    }
    let close = matching_close(masked, open)?;
    Some((open + 1, close))
}

fn renders_nothing(body: &str) -> bool {
    let mut depth = 0i64;
    let mut last = 0;
    let mut values = Vec::new();
    for caps in RETURN_VALUE.captures_iter(body) {
        let Some(whole) = caps.get(0) else { continue };
        for b in body[last..whole.start()].bytes() {
            match b {
                b'{' => depth += 1,
                b'}' => depth -= 1,
                _ => {}
            }
        }
        last = whole.start();
        if depth == 0 {
            values.push(caps.get(1).map_or("", |m| m.as_str()).trim());
        }
    }
    values
        .iter()
        .all(|v| v.is_empty() || *v == "null" || *v == "undefined")
}

fn find_empty_components(result: &ScanResult) -> Vec<Issue> {
    let masked = &result.masked;
    component_decls(result)
        .iter()
        .filter_map(|decl| {
            let (start, end) = component_body(masked, decl)?;
            let body = &masked[start..end];
            let interactive = HOOK_USE.is_match(body) || EVENT_ATTRIBUTE.is_match(body);
            if !interactive || !scan_tags(body).is_empty() || !renders_nothing(body) {
                return None;
            }
            Some(
                Issue::warning(
                    "component-returns-null",
                    format!(
                        "Component '{}' uses hooks or handlers but renders nothing",
                        decl.name
                    ),
                )
                .at_line(decl.line),
            )
        })
        .collect()
}

// =============================================================================
// Undefined Names
// =============================================================================

fn find_undefined_handlers(result: &ScanResult, declared: &HashSet<String>) -> Vec<Issue> {
    let mut seen = HashSet::new();
    HANDLER_BINDING
        .captures_iter(&result.masked)
        .filter_map(|caps| {
            let m = caps.get(1)?;
            let name = m.as_str();
            if declared.contains(name) || is_reserved(name) || !seen.insert(name.to_string()) {
                return None;
            }
            Some(
                Issue::error(
                    "undefined-handler",
                    format!("Event handler '{}' is never defined", name),
                )
                .at_line(line_of(&result.masked, m.start())),
            )
        })
        .collect()
}

/// An element span and, when it has a matching closing tag, its child range
struct Element {
    start: usize,
    end: usize,
    children: Option<(usize, usize)>,
}

impl Element {
    fn childless(tag: &Tag) -> Self {
        Self {
            start: tag.start,
            end: tag.end,
            children: None,
        }
    }
}

fn pair_elements(tags: &[Tag]) -> Vec<Element> {
    let mut elements = Vec::new();
    let mut stack: Vec<&Tag> = Vec::new();

    for tag in tags {
        match tag.kind {
            TagKind::SelfClosing => elements.push(Element::childless(tag)),
            TagKind::Open if VOID_ELEMENTS.contains(&tag.name.as_str()) => {
                elements.push(Element::childless(tag))
            }
            TagKind::Open => stack.push(tag),
            TagKind::Close => {
                let Some(pos) = stack.iter().rposition(|t| t.name == tag.name) else {
                    continue;
                };
                elements.extend(stack.drain(pos + 1..).map(Element::childless));
                if let Some(open) = stack.pop() {
                    elements.push(Element {
                        start: open.start,
                        end: tag.end,
                        children: Some((open.end, tag.start)),
                    });
                }
            }
        }
    }
    elements.extend(stack.into_iter().map(Element::childless));
    elements
}

/// `{...}` expression ranges in `[from, to)`, jumping over `skip` spans
fn brace_expressions(
    masked: &str,
    from: usize,
    to: usize,
    skip: &HashMap<usize, usize>,
) -> Vec<(usize, usize)> {
    let bytes = masked.as_bytes();
    let mut found = Vec::new();
    let mut i = from;
    while i < to {
        if let Some(&end) = skip.get(&i)
            && end > i
        {
            i = end;
            continue;
        }
        if bytes[i] == b'{' {
            let Some(close) = matching_close(masked, i) else {
                break;
            };
            found.push((i + 1, close));
            i = close + 1;
            continue;
        }
        i += 1;
    }
    found
}

/// Name of the attribute a `{` at `brace` is the value of
fn attribute_name(masked: &str, brace: usize) -> &str {
    let Some(before) = masked[..brace].trim_end().strip_suffix('=') else {
        return "";
    };
    let before = before.trim_end();
    let len: usize = before
        .chars()
        .rev()
        .take_while(|c| is_ident_char(*c) || *c == '-')
        .map(char::len_utf8)
        .sum();
    &before[before.len() - len..]
}

fn is_handler_attribute(name: &str) -> bool {
    name.strip_prefix("on")
        .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_uppercase()))
}

/// Expression text with nested markup blanked out
fn expression_text(masked: &str, start: usize, end: usize, elements: &[Element]) -> String {
    let mut bytes = masked.as_bytes()[start..end].to_vec();
    for el in elements.iter().filter(|e| e.start >= start && e.end <= end) {
        for b in &mut bytes[el.start - start..el.end - start] {
            *b = b' ';
        }
    }
    String::from_utf8(bytes).unwrap_or_default()
}

fn find_undefined_markup_names(result: &ScanResult, declared: &HashSet<String>) -> Vec<Issue> {
    let masked = &result.masked;
    let tags = scan_tags(masked);
    if tags.is_empty() {
        return Vec::new();
    }
    let elements = pair_elements(&tags);

    let mut expressions = Vec::new();
    let no_skip = HashMap::new();
    for tag in tags.iter().filter(|t| t.kind != TagKind::Close) {
        for (start, end) in brace_expressions(masked, tag.start + 1, tag.end, &no_skip) {
            // Handlers are covered by the undefined-handler check
            if !is_handler_attribute(attribute_name(masked, start - 1)) {
                expressions.push((start, end));
            }
        }
    }

    let mut spans: HashMap<usize, usize> = HashMap::new();
    for el in &elements {
        let end = spans.entry(el.start).or_insert(el.end);
        *end = (*end).max(el.end);
    }
    for el in &elements {
        if let Some((from, to)) = el.children {
            expressions.extend(brace_expressions(masked, from, to, &spans));
        }
    }
    expressions.sort_unstable();
    expressions.dedup();

    let mut reported = HashSet::new();
    let mut issues = Vec::new();
    for (start, end) in expressions {
        let text = expression_text(masked, start, end, &elements);
        for (offset, name) in free_identifiers(&text) {
            if declared.contains(&name)
                || is_reserved(&name)
                || well_known_binding(&name).is_some()
                || !reported.insert(name.clone())
            {
                continue;
            }
            issues.push(
                Issue::error(
                    "undefined-variable",
                    format!("'{}' is referenced in markup but never declared", name),
                )
                .at_line(line_of(masked, start + offset)),
            );
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Language;

    fn run(code: &str) -> PassOutput {
        let ctx = PassContext {
            language: Language::Jsx,
            is_multi_file: false,
        };
        CompletenessPass.run(code, &ctx)
    }

    fn of_type<'a>(output: &'a PassOutput, issue_type: &str) -> Vec<&'a Issue> {
        output
            .issues
            .iter()
            .filter(|i| i.issue_type == issue_type)
            .collect()
    }

    #[test]
    fn test_nothing_is_fixed() {
        let code = "function f() {\n  // TODO: implement\n  ...\n}";
        let output = run(code);
        assert_eq!(output.code, code);
        assert!(output.issues.iter().all(|i| !i.fixed));
    }

    #[test]
    fn test_placeholders_flagged_per_line() {
        let code = "function f() {\n  // TODO: implement\n  ...\n  throw new Error('Not implemented');\n}";
        let lines: Vec<_> = of_type(&run(code), "placeholder-code")
            .iter()
            .map(|i| i.line)
            .collect();
        assert_eq!(lines, vec![Some(2), Some(3), Some(4)]);
    }

    #[test]
    fn test_spread_is_not_placeholder() {
        let code = "const all = [\n  ...items,\n];";
        assert!(of_type(&run(code), "placeholder-code").is_empty());
    }

    #[test]
    fn test_placeholder_inside_template_ignored() {
        let code = "const s = `\n// TODO keep this text\n`;";
        assert!(of_type(&run(code), "placeholder-code").is_empty());
    }

    #[test]
    fn test_component_returning_null() {
        let code = "function Counter() {\n  const [n, setN] = useState(0);\n  return null;\n}";
        let output = run(code);
        let issues = of_type(&output, "component-returns-null");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].line, Some(1));
    }

    #[test]
    fn test_component_without_return() {
        let code = "const Panel = () => {\n  useEffect(() => {\n    return () => cleanup();\n  });\n};";
        assert_eq!(of_type(&run(code), "component-returns-null").len(), 1);
    }

    #[test]
    fn test_component_with_markup_ok() {
        let code = "function Card() {\n  const [a] = useState(1);\n  return <div>{a}</div>;\n}";
        assert!(of_type(&run(code), "component-returns-null").is_empty());
    }

    #[test]
    fn test_plain_null_component_ok() {
        let code = "function Helper() {\n  return null;\n}";
        assert!(of_type(&run(code), "component-returns-null").is_empty());
    }

    #[test]
    fn test_undefined_handler() {
        let code = "export default function App() {\n  return <button onClick={handleClick}>Go</button>;\n}";
        let output = run(code);
        let issues = of_type(&output, "undefined-handler");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].line, Some(2));
        assert!(of_type(&output, "undefined-variable").is_empty());
    }

    #[test]
    fn test_defined_handler_ok() {
        let code = "export default function App() {\n  const handleClick = () => {};\n  return <button onClick={handleClick}>Go</button>;\n}";
        assert!(run(code).issues.is_empty());
    }

    #[test]
    fn test_undefined_markup_names() {
        let code = "export default function App() {\n  return <p className={styles.text}>Hello {userName}</p>;\n}";
        let names: Vec<_> = of_type(&run(code), "undefined-variable")
            .iter()
            .map(|i| i.message.clone())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names[0].contains("'styles'"));
        assert!(names[1].contains("'userName'"));
    }

    #[test]
    fn test_nested_markup_text_not_identifiers() {
        let code = "export default function App({ show }) {\n  return (\n    <div>\n      {show && <p>Hi there {label}</p>}\n    </div>\n  );\n}";
        let output = run(code);
        let issues = of_type(&output, "undefined-variable");
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("'label'"));
        assert_eq!(issues[0].line, Some(4));
    }

    #[test]
    fn test_map_callback_params_declared() {
        let code = "export function List({ items }) {\n  return <ul>{items.map((item, i) => <li key={item.id}>{item.name} {i}</li>)}</ul>;\n}";
        assert!(of_type(&run(code), "undefined-variable").is_empty());
    }

    #[test]
    fn test_globals_and_object_keys_allowed() {
        let code = "export function A() {\n  return <div style={{ color: 'red' }}>{Math.max(1, 2)} {window.innerWidth}</div>;\n}";
        assert!(of_type(&run(code), "undefined-variable").is_empty());
    }
}
