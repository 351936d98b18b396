use crate::error::Span;

/// Parsed stylesheet: the ordered top-level items of one source file.
#[derive(Debug)]
pub struct Stylesheet {
    pub items: Vec<Item>,
}

#[derive(Debug, Clone)]
pub enum Item {
    Variable(VariableDef),
    Rule(RuleSet),
    AtRule(AtRule),
}

/// A `@name: value;` binding, file-scoped or rule-scoped.
#[derive(Debug, Clone)]
pub struct VariableDef {
    pub name: String,
    pub value: String,
    pub span: Span,
}

/// A selector list with an ordered body, possibly containing nested rules.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub selectors: Vec<String>,
    pub body: Vec<BodyItem>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum BodyItem {
    Declaration(Declaration),
    Variable(VariableDef),
    Nested(RuleSet),
    AtRule(AtRule),
    MixinCall(MixinCall),
}

#[derive(Debug, Clone)]
pub struct Declaration {
    pub property: String,
    pub value: String,
    pub important: bool,
    pub span: Span,
}

/// A `@media`-style directive. Statement at-rules (`@charset`, passthrough
/// `@import`) carry no block.
#[derive(Debug, Clone)]
pub struct AtRule {
    pub name: String,
    pub params: String,
    pub body: Vec<BodyItem>,
    pub has_block: bool,
    pub span: Span,
}

/// A `.name;` statement splicing the body of a previously defined ruleset.
#[derive(Debug, Clone)]
pub struct MixinCall {
    pub name: String,
    pub span: Span,
}

impl RuleSet {
    /// Name under which this ruleset is callable as a mixin: a lone class or
    /// id selector with no combinators or pseudo parts.
    pub fn mixin_name(&self) -> Option<&str> {
        if self.selectors.len() != 1 {
            return None;
        }
        let selector = self.selectors[0].as_str();
        let rest = selector
            .strip_prefix('.')
            .or_else(|| selector.strip_prefix('#'))?;
        let simple = !rest.is_empty()
            && rest
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        simple.then_some(selector)
    }
}
