use crate::ast::{AtRule, BodyItem, Declaration, Item, MixinCall, RuleSet, Stylesheet, VariableDef};
use crate::error::{CompileError, CompileResult, Span};

/// At-rules that take a `{ ... }` block.
const BLOCK_AT_RULES: &[&str] = &["media", "supports"];

/// At-rules that are a single `... ;` statement and pass through to the
/// output. `@import` only reaches the parser for targets the loader leaves
/// alone (plain CSS, urls).
const STATEMENT_AT_RULES: &[&str] = &["charset", "import"];

pub fn parse(input: &str) -> CompileResult<Stylesheet> {
    let mut parser = Parser::new(input);
    let items = parser.parse_top_level()?;
    tracing::debug!(items = items.len(), "parsed stylesheet");
    Ok(Stylesheet { items })
}

enum AtConstruct {
    Variable(VariableDef),
    AtRule(AtRule),
}

#[derive(Clone)]
struct Parser<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn span(&self) -> Span {
        Span::new(self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek2(&self) -> Option<char> {
        let mut chars = self.src[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn syntax_error(&self, message: impl Into<String>) -> CompileError {
        CompileError::Syntax {
            message: message.into(),
            span: self.span(),
        }
    }

    /// Skip whitespace, `// ...` line comments and `/* ... */` block comments.
    fn skip_trivia(&mut self) -> CompileResult<()> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek2() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.peek2() == Some('*') => {
                    let start = self.span();
                    self.bump();
                    self.bump();
                    let mut closed = false;
                    while let Some(c) = self.bump() {
                        if c == '*' && self.peek() == Some('/') {
                            self.bump();
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        return Err(CompileError::Syntax {
                            message: "unterminated comment".to_string(),
                            span: start,
                        });
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Accumulate source text until one of `stop` appears outside strings,
    /// parentheses, brackets and `@{...}` interpolations. Comments are
    /// dropped. The stop character itself is not consumed.
    fn scan_until(&mut self, stop: &[char]) -> CompileResult<String> {
        let mut out = String::new();
        let mut depth = 0usize;
        loop {
            let Some(ch) = self.peek() else {
                return Ok(out);
            };
            if depth == 0 && stop.contains(&ch) {
                return Ok(out);
            }
            match ch {
                '"' | '\'' => {
                    let start = self.span();
                    out.push(ch);
                    self.bump();
                    let mut closed = false;
                    while let Some(c) = self.bump() {
                        out.push(c);
                        if c == ch {
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        return Err(CompileError::Syntax {
                            message: "unterminated string".to_string(),
                            span: start,
                        });
                    }
                }
                '/' if self.peek2() == Some('*') => {
                    let start = self.span();
                    self.bump();
                    self.bump();
                    let mut closed = false;
                    while let Some(c) = self.bump() {
                        if c == '*' && self.peek() == Some('/') {
                            self.bump();
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        return Err(CompileError::Syntax {
                            message: "unterminated comment".to_string(),
                            span: start,
                        });
                    }
                }
                '/' if depth == 0 && self.peek2() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                '@' if self.peek2() == Some('{') => {
                    out.push('@');
                    self.bump();
                    out.push('{');
                    self.bump();
                    let mut closed = false;
                    while let Some(c) = self.bump() {
                        out.push(c);
                        if c == '}' {
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        return Err(self.syntax_error("malformed interpolation"));
                    }
                }
                '(' | '[' => {
                    depth += 1;
                    out.push(ch);
                    self.bump();
                }
                ')' | ']' => {
                    depth = depth.saturating_sub(1);
                    out.push(ch);
                    self.bump();
                }
                _ => {
                    out.push(ch);
                    self.bump();
                }
            }
        }
    }

    fn parse_top_level(&mut self) -> CompileResult<Vec<Item>> {
        let mut items = Vec::new();
        loop {
            self.skip_trivia()?;
            if self.at_eof() {
                return Ok(items);
            }
            match self.peek() {
                Some('}') => return Err(self.syntax_error("unmatched '}'")),
                Some(';') => {
                    self.bump();
                }
                Some('@') if self.peek2() != Some('{') => {
                    match self.parse_at_construct()? {
                        AtConstruct::Variable(var) => items.push(Item::Variable(var)),
                        AtConstruct::AtRule(at) => items.push(Item::AtRule(at)),
                    }
                }
                _ => items.push(Item::Rule(self.parse_ruleset()?)),
            }
        }
    }

    /// Dispatch after seeing `@`: a known at-rule or a variable definition.
    fn parse_at_construct(&mut self) -> CompileResult<AtConstruct> {
        let span = self.span();
        self.bump(); // '@'
        let name = self.ident();
        if name.is_empty() {
            return Err(self.syntax_error("expected identifier after '@'"));
        }
        if BLOCK_AT_RULES.contains(&name.as_str()) || STATEMENT_AT_RULES.contains(&name.as_str()) {
            return Ok(AtConstruct::AtRule(self.parse_at_rule_rest(name, span)?));
        }
        self.skip_trivia()?;
        if !self.eat(':') {
            return Err(CompileError::UnknownAtRule { name, span });
        }
        let value = self.scan_until(&[';', '}'])?;
        let value = value.trim().to_string();
        if value.is_empty() {
            return Err(CompileError::Syntax {
                message: format!("missing value for variable @{}", name),
                span,
            });
        }
        if !self.eat(';') {
            return Err(self.syntax_error(format!("expected ';' after variable @{}", name)));
        }
        Ok(AtConstruct::Variable(VariableDef { name, value, span }))
    }

    fn parse_at_rule_rest(&mut self, name: String, span: Span) -> CompileResult<AtRule> {
        let params = self.scan_until(&['{', ';', '}'])?;
        let params = params.trim().to_string();
        if self.eat('{') {
            let body = self.parse_body()?;
            Ok(AtRule {
                name,
                params,
                body,
                has_block: true,
                span,
            })
        } else if self.eat(';') {
            Ok(AtRule {
                name,
                params,
                body: Vec::new(),
                has_block: false,
                span,
            })
        } else {
            Err(self.syntax_error(format!("expected '{{' or ';' after @{}", name)))
        }
    }

    fn parse_ruleset(&mut self) -> CompileResult<RuleSet> {
        let span = self.span();
        let selector_text = self.scan_until(&['{', ';', '}'])?;
        match self.peek() {
            Some('{') => {}
            Some(_) => {
                return Err(CompileError::Syntax {
                    message: format!("expected '{{' after selector '{}'", selector_text.trim()),
                    span,
                })
            }
            None => {
                return Err(CompileError::Syntax {
                    message: "unexpected end of input: expected '{'".to_string(),
                    span,
                })
            }
        }
        self.bump(); // '{'
        let selectors = split_selector_terms(&selector_text);
        if selectors.is_empty() {
            return Err(CompileError::Syntax {
                message: "missing selector before '{'".to_string(),
                span,
            });
        }
        let body = self.parse_body()?;
        Ok(RuleSet {
            selectors,
            body,
            span,
        })
    }

    /// Parse body items up to and including the closing `}`.
    fn parse_body(&mut self) -> CompileResult<Vec<BodyItem>> {
        let mut body = Vec::new();
        loop {
            self.skip_trivia()?;
            match self.peek() {
                None => {
                    return Err(self.syntax_error("unexpected end of input: unterminated block"))
                }
                Some('}') => {
                    self.bump();
                    return Ok(body);
                }
                Some(';') => {
                    self.bump();
                }
                Some('@') if self.peek2() != Some('{') => {
                    match self.parse_at_construct()? {
                        AtConstruct::Variable(var) => body.push(BodyItem::Variable(var)),
                        AtConstruct::AtRule(at) => body.push(BodyItem::AtRule(at)),
                    }
                }
                _ => body.push(self.parse_body_member()?),
            }
        }
    }

    /// A body member is either a nested ruleset (lookahead finds `{` first)
    /// or a one-statement declaration / mixin call.
    fn parse_body_member(&mut self) -> CompileResult<BodyItem> {
        let mut probe = self.clone();
        probe.scan_until(&['{', ';', '}'])?;
        match probe.peek() {
            Some('{') => Ok(BodyItem::Nested(self.parse_ruleset()?)),
            _ => self.parse_statement(),
        }
    }

    fn parse_statement(&mut self) -> CompileResult<BodyItem> {
        let span = self.span();
        let text = self.scan_until(&[';', '}'])?;
        self.eat(';');
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(CompileError::Syntax {
                message: "empty statement".to_string(),
                span,
            });
        }
        if let Some(name) = mixin_call_name(trimmed) {
            return Ok(BodyItem::MixinCall(MixinCall { name, span }));
        }
        let Some((prop_part, value_part)) = trimmed.split_once(':') else {
            return Err(CompileError::Syntax {
                message: format!("expected ':' in declaration '{}'", trimmed),
                span,
            });
        };
        let property = prop_part.trim().to_string();
        if property.is_empty() {
            return Err(CompileError::Syntax {
                message: "missing property name".to_string(),
                span,
            });
        }
        let (value, important) = split_important(value_part.trim());
        if value.is_empty() {
            return Err(CompileError::Syntax {
                message: format!("missing value for property '{}'", property),
                span,
            });
        }
        Ok(BodyItem::Declaration(Declaration {
            property,
            value,
            important,
            span,
        }))
    }

    fn ident(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        name
    }
}

/// Split a selector list on top-level commas, trimming each term.
fn split_selector_terms(selector: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for ch in selector.chars() {
        if let Some(q) = quote {
            current.push(ch);
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => {
                quote = Some(ch);
                current.push(ch);
            }
            '(' | '[' => {
                depth += 1;
                current.push(ch);
            }
            ')' | ']' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => {
                terms.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    terms.push(current);
    terms
        .into_iter()
        .map(|t| collapse_whitespace(t.trim()))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Selectors may span lines; normalize runs of whitespace to single spaces.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Recognize `.name;` / `.name();` statements.
fn mixin_call_name(text: &str) -> Option<String> {
    if text.contains(':') {
        return None;
    }
    let candidate = text.strip_suffix("()").unwrap_or(text).trim_end();
    let rest = candidate
        .strip_prefix('.')
        .or_else(|| candidate.strip_prefix('#'))?;
    let simple = !rest.is_empty()
        && rest
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    simple.then(|| candidate.to_string())
}

/// Detach a trailing `!important` from a declaration value.
fn split_important(value: &str) -> (String, bool) {
    let trimmed = value.trim_end();
    if let Some(prefix) = strip_important_suffix(trimmed) {
        (prefix, true)
    } else {
        (trimmed.to_string(), false)
    }
}

pub(crate) fn strip_important_suffix(value: &str) -> Option<String> {
    const MARKER: &str = "!important";
    let tail_start = value.len().checked_sub(MARKER.len())?;
    let tail = value.get(tail_start..)?;
    if tail.eq_ignore_ascii_case(MARKER) {
        Some(value[..tail_start].trim_end().to_string())
    } else {
        None
    }
}
