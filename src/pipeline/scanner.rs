//! Lexical Context Scanner
//!
//! Character-driven scanner tracking delimiter stacks while skipping
//! comments, quoted strings, template strings (with `${}` nesting) and
//! single-line regex literals. Tolerant of malformed input: it never fails,
//! it only reports what it saw.
//!
//! The scan also produces a *masked* copy of the text where string, comment
//! and regex contents are replaced by spaces byte-for-byte, so later passes
//! can run plain text searches without tripping over literals. Offsets and
//! newlines are identical to the input.

/// Lexical context at a point in the text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    Code,
    LineComment,
    BlockComment,
    SingleQuote,
    DoubleQuote,
    Template,
    Regex,
}

impl Context {
    pub fn is_code(&self) -> bool {
        matches!(self, Context::Code)
    }
}

/// An opening or closing delimiter and where it was seen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiter {
    pub ch: char,
    /// 1-based
    pub line: usize,
    /// Byte offset
    pub offset: usize,
}

/// A quoted string that hit a newline before its closing quote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unterminated {
    pub line: usize,
    pub quote: char,
}

#[derive(Debug, Clone)]
pub struct ScanResult {
    /// Openers never closed, bottom of the stack first
    pub unclosed: Vec<Delimiter>,
    /// Closers with no matching opener on top of the stack
    pub unmatched: Vec<Delimiter>,
    pub unterminated: Vec<Unterminated>,
    /// Context when the text ran out
    pub end_context: Context,
    /// Line where the still-open comment/template/string began
    pub end_context_line: Option<usize>,
    /// Context at the start of every line; index 0 is line 1
    pub line_contexts: Vec<Context>,
    /// Delimiter stack depth at the start of every line
    pub line_depths: Vec<usize>,
    /// Text ends inside a `//` comment
    pub trailing_line_comment: bool,
    pub masked: String,
}

impl ScanResult {
    pub fn line_context(&self, line: usize) -> Context {
        line.checked_sub(1)
            .and_then(|i| self.line_contexts.get(i))
            .copied()
            .unwrap_or(Context::Code)
    }

    pub fn line_depth(&self, line: usize) -> usize {
        line.checked_sub(1)
            .and_then(|i| self.line_depths.get(i))
            .copied()
            .unwrap_or(0)
    }

    pub fn masked_lines(&self) -> Vec<&str> {
        self.masked.split('\n').collect()
    }

    pub fn is_balanced(&self) -> bool {
        self.unclosed.is_empty() && self.unmatched.is_empty() && self.end_context.is_code()
    }
}

fn matching_opener(closer: char) -> char {
    match closer {
        '}' => '{',
        ')' => '(',
        _ => '[',
    }
}

pub fn closer_for(opener: char) -> char {
    match opener {
        '{' => '}',
        '(' => ')',
        _ => ']',
    }
}

pub fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Characters after which a `/` starts a regex literal rather than a division
const REGEX_PRECEDERS: &str = "(,=:[!&|?{};";

struct Scanner<'a> {
    chars: Vec<(usize, char)>,
    text: &'a str,
    masked: Vec<u8>,
    state: Context,
    state_line: usize,
    stack: Vec<Delimiter>,
    /// Stack lengths at which a template `${` was opened
    template_stack: Vec<usize>,
    unmatched: Vec<Delimiter>,
    unterminated: Vec<Unterminated>,
    line: usize,
    line_contexts: Vec<Context>,
    line_depths: Vec<usize>,
    prev_significant: Option<char>,
    last_word: String,
    in_class: bool,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.char_indices().collect(),
            text,
            masked: text.as_bytes().to_vec(),
            state: Context::Code,
            state_line: 1,
            stack: Vec::new(),
            template_stack: Vec::new(),
            unmatched: Vec::new(),
            unterminated: Vec::new(),
            line: 1,
            line_contexts: vec![Context::Code],
            line_depths: vec![0],
            prev_significant: None,
            last_word: String::new(),
            in_class: false,
        }
    }

    fn peek(&self, i: usize) -> Option<char> {
        self.chars.get(i + 1).map(|(_, c)| *c)
    }

    /// Blank the char at index `i` in the masked copy (newlines survive)
    fn blank(&mut self, i: usize) {
        let (offset, ch) = self.chars[i];
        if ch == '\n' {
            return;
        }
        for b in &mut self.masked[offset..offset + ch.len_utf8()] {
            *b = b' ';
        }
    }

    fn enter(&mut self, state: Context) {
        self.state = state;
        self.state_line = self.line;
    }

    fn regex_allowed(&self) -> bool {
        match self.prev_significant {
            None => true,
            Some(c) if REGEX_PRECEDERS.contains(c) => true,
            Some(c) if is_ident_char(c) => {
                matches!(self.last_word.as_str(), "return" | "typeof" | "case")
            }
            _ => false,
        }
    }

    /// A markdown fence (```lang) opening a line in code context
    fn at_fence(&self, i: usize) -> bool {
        let at_line_start = self.chars[..i]
            .iter()
            .rev()
            .take_while(|(_, c)| *c != '\n')
            .all(|(_, c)| c.is_whitespace());
        at_line_start && self.text[self.chars[i].0..].starts_with("```")
    }

    fn newline(&mut self) {
        self.line += 1;
        self.line_contexts.push(self.state);
        self.line_depths.push(self.stack.len());
    }

    fn run(mut self) -> ScanResult {
        let mut i = 0;
        while i < self.chars.len() {
            let (offset, c) = self.chars[i];
            let next = self.peek(i);

            match self.state {
                Context::Code => {
                    if c == '`' && self.at_fence(i) {
                        // Treated like a line comment so fenced code stays code
                        self.enter(Context::LineComment);
                        self.blank(i);
                        i += 1;
                        continue;
                    }
                    if c == '/' && next == Some('/') {
                        self.enter(Context::LineComment);
                        self.blank(i);
                        self.blank(i + 1);
                        i += 2;
                        continue;
                    }
                    if c == '/' && next == Some('*') {
                        self.enter(Context::BlockComment);
                        self.blank(i);
                        self.blank(i + 1);
                        i += 2;
                        continue;
                    }
                    if c == '/' && self.regex_allowed() {
                        self.enter(Context::Regex);
                        self.in_class = false;
                        self.prev_significant = Some('/');
                        i += 1;
                        continue;
                    }
                    match c {
                        '\'' => {
                            // Contraction in prose (Don't, it's)
                            let contraction = i > 0 && is_ident_char(self.chars[i - 1].1);
                            if !contraction {
                                self.enter(Context::SingleQuote);
                            }
                        }
                        '"' => self.enter(Context::DoubleQuote),
                        '`' => self.enter(Context::Template),
                        '{' | '(' | '[' => self.stack.push(Delimiter {
                            ch: c,
                            line: self.line,
                            offset,
                        }),
                        '}' | ')' | ']' => {
                            let expected = matching_opener(c);
                            if self.stack.last().map(|d| d.ch) == Some(expected) {
                                self.stack.pop();
                                if c == '}' && self.template_stack.last() == Some(&self.stack.len())
                                {
                                    self.template_stack.pop();
                                    self.enter(Context::Template);
                                }
                            } else {
                                self.unmatched.push(Delimiter {
                                    ch: c,
                                    line: self.line,
                                    offset,
                                });
                            }
                        }
                        '\n' => self.newline(),
                        _ => {}
                    }
                    if is_ident_char(c) {
                        if !(i > 0 && is_ident_char(self.chars[i - 1].1)) {
                            self.last_word.clear();
                        }
                        self.last_word.push(c);
                    }
                    if !c.is_whitespace() {
                        self.prev_significant = Some(c);
                    }
                }
                Context::LineComment => {
                    if c == '\n' {
                        self.state = Context::Code;
                        self.newline();
                    } else {
                        self.blank(i);
                    }
                }
                Context::BlockComment => {
                    if c == '*' && next == Some('/') {
                        self.blank(i);
                        self.blank(i + 1);
                        self.state = Context::Code;
                        i += 2;
                        continue;
                    }
                    if c == '\n' {
                        self.newline();
                    } else {
                        self.blank(i);
                    }
                }
                Context::SingleQuote | Context::DoubleQuote => {
                    let quote = if self.state == Context::SingleQuote {
                        '\''
                    } else {
                        '"'
                    };
                    if c == '\\' {
                        self.blank(i);
                        if let Some(n) = next {
                            if n == '\n' {
                                self.newline();
                            } else {
                                self.blank(i + 1);
                            }
                        }
                        i += 2;
                        continue;
                    }
                    if c == quote {
                        self.state = Context::Code;
                        self.prev_significant = Some(quote);
                    } else if c == '\n' {
                        self.unterminated.push(Unterminated {
                            line: self.line,
                            quote,
                        });
                        self.state = Context::Code;
                        self.prev_significant = Some(quote);
                        self.newline();
                    } else {
                        self.blank(i);
                    }
                }
                Context::Template => {
                    if c == '\\' {
                        self.blank(i);
                        if let Some(n) = next {
                            if n == '\n' {
                                self.newline();
                            } else {
                                self.blank(i + 1);
                            }
                        }
                        i += 2;
                        continue;
                    }
                    if c == '`' {
                        self.state = Context::Code;
                        self.prev_significant = Some('`');
                    } else if c == '$' && next == Some('{') {
                        self.template_stack.push(self.stack.len());
                        self.stack.push(Delimiter {
                            ch: '{',
                            line: self.line,
                            offset: self.chars[i + 1].0,
                        });
                        self.state = Context::Code;
                        self.prev_significant = Some('{');
                        i += 2;
                        continue;
                    } else if c == '\n' {
                        self.newline();
                    } else {
                        self.blank(i);
                    }
                }
                Context::Regex => {
                    if c == '\n' {
                        // Not a regex after all; resume as code
                        self.state = Context::Code;
                        self.newline();
                    } else if c == '\\' {
                        self.blank(i);
                        if next.is_some_and(|n| n != '\n') {
                            self.blank(i + 1);
                            i += 2;
                            continue;
                        }
                    } else if c == '[' {
                        self.in_class = true;
                        self.blank(i);
                    } else if c == ']' {
                        self.in_class = false;
                        self.blank(i);
                    } else if c == '/' && !self.in_class {
                        self.state = Context::Code;
                        self.prev_significant = Some('/');
                        self.last_word.clear();
                    } else {
                        self.blank(i);
                    }
                }
            }
            i += 1;
        }

        if matches!(self.state, Context::SingleQuote | Context::DoubleQuote) {
            let quote = if self.state == Context::SingleQuote {
                '\''
            } else {
                '"'
            };
            self.unterminated.push(Unterminated {
                line: self.line,
                quote,
            });
            self.state = Context::Code;
        }

        let end_context = self.state;
        let trailing_line_comment = end_context == Context::LineComment;
        let end_context_line = match end_context {
            Context::BlockComment | Context::Template => Some(self.state_line),
            _ => None,
        };

        let masked = String::from_utf8(self.masked)
            .unwrap_or_else(|_| self.text.to_string());

        ScanResult {
            unclosed: self.stack,
            unmatched: self.unmatched,
            unterminated: self.unterminated,
            end_context: match end_context {
                // Line comments and regexes end with the text
                Context::LineComment | Context::Regex => Context::Code,
                other => other,
            },
            end_context_line,
            line_contexts: self.line_contexts,
            line_depths: self.line_depths,
            trailing_line_comment,
            masked,
        }
    }
}

/// Scan `text` and report its delimiter and lexical structure
pub fn scan(text: &str) -> ScanResult {
    Scanner::new(text).run()
}

/// Byte offset of the delimiter closing the `{`, `(` or `[` at `open`.
///
/// Expects masked text so literals cannot interfere.
pub fn matching_close(masked: &str, open: usize) -> Option<usize> {
    let bytes = masked.as_bytes();
    let (opener, closer) = match bytes.get(open)? {
        b'{' => (b'{', b'}'),
        b'(' => (b'(', b')'),
        b'[' => (b'[', b']'),
        _ => return None,
    };
    let mut depth = 0usize;
    for (i, b) in bytes.iter().enumerate().skip(open) {
        if *b == opener {
            depth += 1;
        } else if *b == closer {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Byte offset where 1-based `line` starts
pub fn line_start_offset(text: &str, line: usize) -> usize {
    if line <= 1 {
        return 0;
    }
    text.match_indices('\n')
        .nth(line - 2)
        .map(|(i, _)| i + 1)
        .unwrap_or(text.len())
}

/// 1-based line containing byte `offset`
pub fn line_of(text: &str, offset: usize) -> usize {
    text.as_bytes()[..offset.min(text.len())]
        .iter()
        .filter(|b| **b == b'\n')
        .count()
        + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_code() {
        let result = scan("function f() { return [1, 2]; }");
        assert!(result.is_balanced());
    }

    #[test]
    fn test_unclosed_brace_reported_with_line() {
        let result = scan("function f() {\n  return 1;");
        assert_eq!(result.unclosed.len(), 1);
        assert_eq!(result.unclosed[0].ch, '{');
        assert_eq!(result.unclosed[0].line, 1);
    }

    #[test]
    fn test_unmatched_closer_not_popped() {
        let result = scan("function f() { return 1; }}");
        assert!(result.unclosed.is_empty());
        assert_eq!(result.unmatched.len(), 1);
        assert_eq!(result.unmatched[0].ch, '}');
    }

    #[test]
    fn test_delimiters_in_strings_and_comments_ignored() {
        let code = "const a = '{';\n// {\n/* ( */\nconst b = \"[\";";
        assert!(scan(code).is_balanced());
    }

    #[test]
    fn test_escaped_quote() {
        let code = r#"const s = 'it\'s {';"#;
        let result = scan(code);
        assert!(result.is_balanced());
        assert!(result.unterminated.is_empty());
    }

    #[test]
    fn test_template_interpolation_nesting() {
        let code = "const s = `a ${ fn({ x: 1 }) } b`;\nconst t = 1;";
        let result = scan(code);
        assert!(result.is_balanced());
        assert_eq!(result.line_context(2), Context::Code);
    }

    #[test]
    fn test_multiline_template_context() {
        let code = "const s = `\n{ not code\n`;";
        let result = scan(code);
        assert!(result.is_balanced());
        assert_eq!(result.line_context(2), Context::Template);
    }

    #[test]
    fn test_unterminated_template() {
        let result = scan("const s = `abc\nmore");
        assert_eq!(result.end_context, Context::Template);
        assert_eq!(result.end_context_line, Some(1));
    }

    #[test]
    fn test_unterminated_string_recorded() {
        let result = scan("const s = 'hello;\nconst t = 1;");
        assert_eq!(result.unterminated.len(), 1);
        assert_eq!(result.unterminated[0].line, 1);
        assert_eq!(result.unterminated[0].quote, '\'');
        assert_eq!(result.line_context(2), Context::Code);
    }

    #[test]
    fn test_contraction_is_not_a_string() {
        let code = "<p>Don't stop {count}</p>";
        let result = scan(code);
        assert!(result.unterminated.is_empty());
        assert!(result.is_balanced());
    }

    #[test]
    fn test_regex_literal_skipped() {
        let code = "const re = /[{(]+/g;\nconst x = a / b;";
        let result = scan(code);
        assert!(result.is_balanced());
    }

    #[test]
    fn test_masked_preserves_offsets() {
        let code = "const s = 'ab{c'; // x}\nlet y;";
        let result = scan(code);
        assert_eq!(result.masked.len(), code.len());
        assert_eq!(result.masked, "const s = '    ';      \nlet y;");
    }

    #[test]
    fn test_masked_handles_multibyte() {
        let code = "const s = '한글';";
        let result = scan(code);
        assert_eq!(result.masked.len(), code.len());
        assert!(result.masked.starts_with("const s = '"));
        assert!(result.masked.ends_with("';"));
    }

    #[test]
    fn test_line_depths() {
        let code = "function f() {\n  if (x) {\n    y();\n  }\n}";
        let result = scan(code);
        assert_eq!(result.line_depth(1), 0);
        assert_eq!(result.line_depth(2), 1);
        assert_eq!(result.line_depth(3), 2);
        assert_eq!(result.line_depth(5), 1);
    }

    #[test]
    fn test_matching_close() {
        let code = "a { b { c } d } e";
        let open = code.find('{').unwrap();
        assert_eq!(matching_close(code, open), Some(14));
        assert_eq!(matching_close("f(a, (b))", 1), Some(8));
        assert_eq!(matching_close("x", 0), None);
    }

    #[test]
    fn test_markdown_fence_is_not_a_template() {
        let code = "```jsx\nconst a = { b: 1 };\n```\n";
        let result = scan(code);
        assert!(result.is_balanced());
        assert_eq!(result.line_context(2), Context::Code);
        assert!(result.masked.starts_with("      \nconst a"));
    }

    #[test]
    fn test_trailing_line_comment() {
        assert!(scan("foo( // note").trailing_line_comment);
        assert!(!scan("foo();").trailing_line_comment);
    }

    #[test]
    fn test_line_helpers() {
        let text = "a\nbc\nd";
        assert_eq!(line_start_offset(text, 1), 0);
        assert_eq!(line_start_offset(text, 2), 2);
        assert_eq!(line_start_offset(text, 3), 5);
        assert_eq!(line_of(text, 3), 2);
    }
}
