use std::collections::HashSet;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{AtRule, BodyItem, Declaration, Item, MixinCall, RuleSet, Stylesheet};
use crate::color;
use crate::error::{CompileError, CompileResult, Span};
use crate::parser::strip_important_suffix;
use crate::theme::Theme;

/// Flattened output of the resolve pass, ready for emission.
#[derive(Debug, Clone)]
pub enum CssNode {
    Rule(CssRule),
    AtRule(CssAtRule),
}

#[derive(Debug, Clone)]
pub struct CssRule {
    pub selectors: Vec<String>,
    pub declarations: Vec<CssDeclaration>,
}

#[derive(Debug, Clone)]
pub struct CssDeclaration {
    pub property: String,
    pub value: String,
    pub important: bool,
}

#[derive(Debug, Clone)]
pub struct CssAtRule {
    pub name: String,
    pub params: String,
    pub children: Vec<CssNode>,
    pub has_block: bool,
}

pub fn resolve(stylesheet: &Stylesheet, theme: &Theme) -> CompileResult<Vec<CssNode>> {
    Resolver::new(theme).run(stylesheet)
}

/// Walks the AST substituting variables, expanding mixin calls and
/// flattening nested selectors into cascade-ordered CSS nodes.
struct Resolver {
    scopes: Vec<IndexMap<String, (String, Span)>>,
    mixins: Vec<IndexMap<String, RuleSet>>,
    resolving: HashSet<String>,
    expanding: HashSet<String>,
}

impl Resolver {
    fn new(theme: &Theme) -> Self {
        let mut bindings = IndexMap::new();
        for (name, value) in &theme.variables {
            bindings.insert(name.clone(), (value.clone(), Span::dummy()));
        }
        Self {
            scopes: vec![bindings],
            mixins: vec![IndexMap::new()],
            resolving: HashSet::new(),
            expanding: HashSet::new(),
        }
    }

    fn run(&mut self, stylesheet: &Stylesheet) -> CompileResult<Vec<CssNode>> {
        self.push_scope();
        for item in &stylesheet.items {
            if let Item::Variable(var) = item {
                self.define_variable(var);
            }
        }

        let mut nodes = Vec::new();
        for item in &stylesheet.items {
            match item {
                Item::Variable(_) => {}
                Item::Rule(rule) => {
                    self.register_mixin(rule);
                    nodes.extend(self.eval_ruleset(rule, &[])?);
                }
                Item::AtRule(at) => {
                    if let Some(node) = self.eval_at_rule(at, &[])? {
                        nodes.push(node);
                    }
                }
            }
        }
        self.pop_scope();
        tracing::debug!(nodes = nodes.len(), "resolved stylesheet");
        Ok(nodes)
    }

    fn eval_ruleset(&mut self, rule: &RuleSet, parents: &[String]) -> CompileResult<Vec<CssNode>> {
        self.push_scope();
        self.push_mixin_scope();
        self.collect_variables(&rule.body);

        let mut own = Vec::with_capacity(rule.selectors.len());
        for selector in &rule.selectors {
            own.push(self.substitute(selector, rule.span)?);
        }
        let selectors = combine_selectors(parents, &own);

        let mut declarations = Vec::new();
        let mut pending = Vec::new();
        self.eval_body(&rule.body, &selectors, &mut declarations, &mut pending)?;

        self.pop_mixin_scope();
        self.pop_scope();

        let mut out = Vec::new();
        if !declarations.is_empty() {
            out.push(CssNode::Rule(CssRule {
                selectors,
                declarations,
            }));
        }
        out.extend(pending);
        Ok(out)
    }

    fn eval_body(
        &mut self,
        body: &[BodyItem],
        selectors: &[String],
        declarations: &mut Vec<CssDeclaration>,
        pending: &mut Vec<CssNode>,
    ) -> CompileResult<()> {
        for item in body {
            match item {
                BodyItem::Variable(_) => {}
                BodyItem::Declaration(decl) => declarations.push(self.eval_declaration(decl)?),
                BodyItem::Nested(nested) => {
                    self.register_mixin(nested);
                    pending.extend(self.eval_ruleset(nested, selectors)?);
                }
                BodyItem::AtRule(at) => {
                    if let Some(node) = self.eval_at_rule(at, selectors)? {
                        pending.push(node);
                    }
                }
                BodyItem::MixinCall(call) => {
                    self.expand_mixin(call, selectors, declarations, pending)?;
                }
            }
        }
        Ok(())
    }

    fn eval_at_rule(
        &mut self,
        at: &AtRule,
        parents: &[String],
    ) -> CompileResult<Option<CssNode>> {
        let params = self.substitute(&at.params, at.span)?;
        if !at.has_block {
            return Ok(Some(CssNode::AtRule(CssAtRule {
                name: at.name.clone(),
                params,
                children: Vec::new(),
                has_block: false,
            })));
        }

        self.push_scope();
        self.push_mixin_scope();
        self.collect_variables(&at.body);

        let mut declarations = Vec::new();
        let mut pending = Vec::new();
        for item in &at.body {
            match item {
                BodyItem::Variable(_) => {}
                BodyItem::Declaration(decl) => {
                    if parents.is_empty() {
                        return Err(CompileError::Syntax {
                            message: format!("declaration outside of a rule in @{}", at.name),
                            span: decl.span,
                        });
                    }
                    declarations.push(self.eval_declaration(decl)?);
                }
                BodyItem::Nested(nested) => {
                    self.register_mixin(nested);
                    pending.extend(self.eval_ruleset(nested, parents)?);
                }
                BodyItem::AtRule(inner) => {
                    if let Some(node) = self.eval_at_rule(inner, parents)? {
                        pending.push(node);
                    }
                }
                BodyItem::MixinCall(call) => {
                    if parents.is_empty() {
                        return Err(CompileError::Syntax {
                            message: format!("mixin call outside of a rule in @{}", at.name),
                            span: call.span,
                        });
                    }
                    self.expand_mixin(call, parents, &mut declarations, &mut pending)?;
                }
            }
        }

        self.pop_mixin_scope();
        self.pop_scope();

        let mut children = Vec::new();
        if !declarations.is_empty() {
            children.push(CssNode::Rule(CssRule {
                selectors: parents.to_vec(),
                declarations,
            }));
        }
        children.extend(pending);
        if children.is_empty() {
            return Ok(None);
        }
        Ok(Some(CssNode::AtRule(CssAtRule {
            name: at.name.clone(),
            params,
            children,
            has_block: true,
        })))
    }

    fn eval_declaration(&mut self, decl: &Declaration) -> CompileResult<CssDeclaration> {
        let property = self.substitute(&decl.property, decl.span)?;
        let substituted = self.substitute(&decl.value, decl.span)?;
        let mut value = apply_color_functions(&substituted, decl.span)?;
        let mut important = decl.important;
        if let Some(stripped) = strip_important_suffix(&value) {
            value = stripped;
            important = true;
        }
        Ok(CssDeclaration {
            property,
            value,
            important,
        })
    }

    fn expand_mixin(
        &mut self,
        call: &MixinCall,
        selectors: &[String],
        declarations: &mut Vec<CssDeclaration>,
        pending: &mut Vec<CssNode>,
    ) -> CompileResult<()> {
        let definition = match self.lookup_mixin(&call.name) {
            Some(def) => def.clone(),
            None => {
                return Err(CompileError::UndefinedMixin {
                    name: call.name.clone(),
                    span: call.span,
                })
            }
        };
        if !self.expanding.insert(call.name.clone()) {
            return Err(CompileError::MixinCycle {
                name: call.name.clone(),
                span: call.span,
            });
        }

        self.push_scope();
        self.push_mixin_scope();
        self.collect_variables(&definition.body);
        let result = self.eval_body(&definition.body, selectors, declarations, pending);
        self.pop_mixin_scope();
        self.pop_scope();

        self.expanding.remove(&call.name);
        result
    }

    /// Replace `@name` references and `@{name}` interpolations. Quoted
    /// segments pass through untouched.
    fn substitute(&mut self, text: &str, span: Span) -> CompileResult<String> {
        if !text.contains('@') {
            return Ok(text.to_string());
        }
        let mut out = String::with_capacity(text.len());
        let mut chars = text.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch == '"' || ch == '\'' {
                out.push(ch);
                for c in chars.by_ref() {
                    out.push(c);
                    if c == ch {
                        break;
                    }
                }
                continue;
            }
            if ch != '@' {
                out.push(ch);
                continue;
            }
            match chars.peek() {
                Some('{') => {
                    chars.next();
                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed || name.is_empty() {
                        return Err(CompileError::Syntax {
                            message: "malformed interpolation".to_string(),
                            span,
                        });
                    }
                    let resolved = self.resolve_variable(&name, span)?;
                    out.push_str(resolved.trim());
                }
                Some(&c) if is_ident_char(c) => {
                    let mut name = String::new();
                    while let Some(&c) = chars.peek() {
                        if is_ident_char(c) {
                            name.push(c);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    let resolved = self.resolve_variable(&name, span)?;
                    out.push_str(&resolved);
                }
                _ => out.push('@'),
            }
        }
        Ok(out)
    }

    /// Look a variable up through the scope stack and resolve references
    /// inside its value. Reference order within a scope does not matter;
    /// definition cycles are an error.
    fn resolve_variable(&mut self, name: &str, span: Span) -> CompileResult<String> {
        let found = self
            .scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .cloned();
        let Some((raw, def_span)) = found else {
            return Err(CompileError::UndefinedVariable {
                name: name.to_string(),
                span,
            });
        };
        if !self.resolving.insert(name.to_string()) {
            return Err(CompileError::VariableCycle {
                name: name.to_string(),
                span,
            });
        }
        let lookup_span = if def_span.is_dummy() { span } else { def_span };
        let resolved = self.substitute(&raw, lookup_span);
        self.resolving.remove(name);
        resolved
    }

    fn collect_variables(&mut self, body: &[BodyItem]) {
        for item in body {
            if let BodyItem::Variable(var) = item {
                self.define_variable(var);
            }
        }
    }

    fn define_variable(&mut self, var: &crate::ast::VariableDef) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(var.name.clone(), (var.value.clone(), var.span));
        }
    }

    fn register_mixin(&mut self, rule: &RuleSet) {
        if let Some(name) = rule.mixin_name() {
            if let Some(scope) = self.mixins.last_mut() {
                scope.insert(name.to_string(), rule.clone());
            }
        }
    }

    fn lookup_mixin(&self, name: &str) -> Option<&RuleSet> {
        self.mixins
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
    }

    fn push_scope(&mut self) {
        self.scopes.push(IndexMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn push_mixin_scope(&mut self) {
        self.mixins.push(IndexMap::new());
    }

    fn pop_mixin_scope(&mut self) {
        self.mixins.pop();
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Merge parent and child selector terms. `&` splices the parent verbatim;
/// otherwise the child becomes a descendant of the parent.
fn combine_selectors(parents: &[String], children: &[String]) -> Vec<String> {
    if parents.is_empty() {
        return children.to_vec();
    }
    let mut out = Vec::new();
    for parent in parents {
        for child in children {
            if child.contains('&') {
                out.push(child.replace('&', parent));
            } else {
                out.push(format!("{} {}", parent, child));
            }
        }
    }
    out
}

static COLOR_FN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?xi)\b(lighten|darken|fade)\s*\(\s*((?:[^()]+|\([^()]*\))+?)\s*,\s*([^)]+)\)")
        .expect("color function pattern")
});

/// Evaluate `lighten()`, `darken()` and `fade()` calls inside a value.
fn apply_color_functions(input: &str, span: Span) -> CompileResult<String> {
    if !input.contains('(') || !COLOR_FN_RE.is_match(input) {
        return Ok(input.to_string());
    }
    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    for caps in COLOR_FN_RE.captures_iter(input) {
        let matched = caps.get(0).unwrap();
        out.push_str(&input[last..matched.start()]);

        let name = caps.get(1).unwrap().as_str().to_ascii_lowercase();
        let color_arg = caps.get(2).unwrap().as_str().trim();
        let amount_arg = caps.get(3).unwrap().as_str().trim();

        let parsed = color::parse(color_arg).ok_or_else(|| CompileError::Color {
            message: format!("cannot parse color argument '{}'", color_arg),
            span,
        })?;
        let amount = color::parse_amount(amount_arg)
            .map_err(|message| CompileError::Color { message, span })?;

        let replacement = match name.as_str() {
            "lighten" => color::format_hex(color::lighten(parsed, amount)),
            "darken" => color::format_hex(color::darken(parsed, amount)),
            "fade" => color::format_rgba(color::fade(parsed, amount)),
            _ => unreachable!(),
        };
        out.push_str(&replacement);
        last = matched.end();
    }
    out.push_str(&input[last..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    fn resolve_source(input: &str) -> CompileResult<Vec<CssNode>> {
        let sheet = parser::parse(input)?;
        resolve(&sheet, &Theme::default())
    }

    fn rules(nodes: &[CssNode]) -> Vec<&CssRule> {
        nodes
            .iter()
            .filter_map(|node| match node {
                CssNode::Rule(rule) => Some(rule),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn substitutes_variables() {
        let nodes = resolve_source("@x: 10px;\n.a { width: @x; }").expect("resolve");
        let rules = rules(&nodes);
        assert_eq!(rules[0].declarations[0].value, "10px");
    }

    #[test]
    fn reference_order_within_a_scope_does_not_matter() {
        let nodes =
            resolve_source("@a: @b;\n@b: 2px;\n.a { margin: @a; }").expect("resolve");
        assert_eq!(rules(&nodes)[0].declarations[0].value, "2px");
    }

    #[test]
    fn last_definition_wins() {
        let nodes = resolve_source("@x: 1px;\n@x: 2px;\n.a { width: @x; }").expect("resolve");
        assert_eq!(rules(&nodes)[0].declarations[0].value, "2px");
    }

    #[test]
    fn inner_scopes_shadow_outer() {
        let nodes =
            resolve_source("@x: 1px;\n.a { @x: 2px; width: @x; }\n.b { width: @x; }")
                .expect("resolve");
        let rules = rules(&nodes);
        assert_eq!(rules[0].declarations[0].value, "2px");
        assert_eq!(rules[1].declarations[0].value, "1px");
    }

    #[test]
    fn undefined_variable_fails() {
        let err = resolve_source(".b { color: @undefinedVar; }").unwrap_err();
        match err {
            CompileError::UndefinedVariable { name, span } => {
                assert_eq!(name, "undefinedVar");
                assert_eq!(span.line, 1);
            }
            other => panic!("expected undefined variable, got {:?}", other),
        }
    }

    #[test]
    fn variable_cycles_fail() {
        let err = resolve_source("@a: @b;\n@b: @a;\n.a { width: @a; }").unwrap_err();
        assert!(matches!(err, CompileError::VariableCycle { .. }), "{:?}", err);
    }

    #[test]
    fn nested_selectors_flatten() {
        let nodes = resolve_source(".modals { .small-icon { width: 15px; } }").expect("resolve");
        let rules = rules(&nodes);
        assert_eq!(rules[0].selectors, vec![".modals .small-icon"]);
    }

    #[test]
    fn parent_declarations_precede_nested_rules() {
        let nodes =
            resolve_source(".a { color: red; .b { color: blue; } }").expect("resolve");
        let rules = rules(&nodes);
        assert_eq!(rules[0].selectors, vec![".a"]);
        assert_eq!(rules[1].selectors, vec![".a .b"]);
    }

    #[test]
    fn ampersand_splices_the_parent() {
        let nodes = resolve_source(".btn { &:hover { color: red; } }").expect("resolve");
        assert_eq!(rules(&nodes)[0].selectors, vec![".btn:hover"]);
    }

    #[test]
    fn selector_lists_multiply() {
        let nodes =
            resolve_source(".a, .b { .c, .d { color: red; } }").expect("resolve");
        assert_eq!(
            rules(&nodes)[0].selectors,
            vec![".a .c", ".a .d", ".b .c", ".b .d"]
        );
    }

    #[test]
    fn selector_interpolation() {
        let nodes =
            resolve_source("@side: left;\n.icon-@{side} { float: left; }").expect("resolve");
        assert_eq!(rules(&nodes)[0].selectors, vec![".icon-left"]);
    }

    #[test]
    fn mixin_calls_splice_declarations() {
        let nodes = resolve_source(
            ".brand-button { border-radius: 4px; color: white; }\n.cta { .brand-button; width: 100%; }",
        )
        .expect("resolve");
        let rules = rules(&nodes);
        assert_eq!(rules[1].selectors, vec![".cta"]);
        let properties: Vec<_> = rules[1]
            .declarations
            .iter()
            .map(|d| d.property.as_str())
            .collect();
        assert_eq!(properties, vec!["border-radius", "color", "width"]);
    }

    #[test]
    fn undefined_mixin_fails() {
        let err = resolve_source(".a { .missing; }").unwrap_err();
        assert!(matches!(err, CompileError::UndefinedMixin { .. }), "{:?}", err);
    }

    #[test]
    fn self_referential_mixin_fails() {
        let err = resolve_source(".a { .a; }").unwrap_err();
        assert!(matches!(err, CompileError::MixinCycle { .. }), "{:?}", err);
    }

    #[test]
    fn important_in_variable_value_is_preserved() {
        let nodes =
            resolve_source("@w: 15px !important;\n.a { width: @w; }").expect("resolve");
        let decl = &rules(&nodes)[0].declarations[0];
        assert_eq!(decl.value, "15px");
        assert!(decl.important);
    }

    #[test]
    fn media_bubbles_with_the_flattened_selector() {
        let nodes = resolve_source(
            ".sidebar { width: 300px; @media (max-width: 768px) { width: 100%; } }",
        )
        .expect("resolve");
        assert_eq!(nodes.len(), 2);
        match &nodes[1] {
            CssNode::AtRule(at) => {
                assert_eq!(at.name, "media");
                assert_eq!(at.params, "(max-width: 768px)");
                match &at.children[0] {
                    CssNode::Rule(rule) => {
                        assert_eq!(rule.selectors, vec![".sidebar"]);
                        assert_eq!(rule.declarations[0].value, "100%");
                    }
                    other => panic!("expected rule, got {:?}", other),
                }
            }
            other => panic!("expected at-rule, got {:?}", other),
        }
    }

    #[test]
    fn top_level_media_keeps_inner_rules() {
        let nodes = resolve_source("@media print { .a { color: black; } }").expect("resolve");
        match &nodes[0] {
            CssNode::AtRule(at) => {
                assert_eq!(at.params, "print");
                assert_eq!(at.children.len(), 1);
            }
            other => panic!("expected at-rule, got {:?}", other),
        }
    }

    #[test]
    fn theme_bindings_form_the_outermost_scope() {
        let sheet = parser::parse(".logo { background: @brand-primary; }").expect("parse");
        let theme: Theme =
            serde_json::from_str(r##"{"brand-primary": "#0047ab"}"##).expect("theme");
        let nodes = resolve(&sheet, &theme).expect("resolve");
        assert_eq!(rules(&nodes)[0].declarations[0].value, "#0047ab");
    }

    #[test]
    fn file_variables_shadow_theme_bindings() {
        let sheet =
            parser::parse("@accent: #222;\n.a { color: @accent; }").expect("parse");
        let theme: Theme = serde_json::from_str(r##"{"accent": "#111"}"##).expect("theme");
        let nodes = resolve(&sheet, &theme).expect("resolve");
        assert_eq!(rules(&nodes)[0].declarations[0].value, "#222");
    }

    #[test]
    fn color_functions_evaluate_inline() {
        let nodes = resolve_source(
            "@brand: #ff0000;\n.a { border-color: darken(@brand, 10%); background: fade(@brand, 50%); }",
        )
        .expect("resolve");
        let decls = &rules(&nodes)[0].declarations;
        assert_eq!(decls[0].value, "#cc0000");
        assert_eq!(decls[1].value, "rgba(255,0,0,0.5)");
    }

    #[test]
    fn color_functions_nest_inside_gradients() {
        let nodes = resolve_source(
            "@brand: #2c5aa0;\n.hero { background: linear-gradient(to right, @brand, darken(@brand, 10%)); }",
        )
        .expect("resolve");
        let value = &rules(&nodes)[0].declarations[0].value;
        assert!(value.starts_with("linear-gradient(to right, #2c5aa0, #"), "{}", value);
        assert!(value.ends_with(')'), "{}", value);
    }

    #[test]
    fn malformed_color_argument_fails() {
        let err = resolve_source(".a { color: darken(notacolor, 10%); }").unwrap_err();
        assert!(matches!(err, CompileError::Color { .. }), "{:?}", err);
    }

    #[test]
    fn literal_at_inside_strings_is_untouched() {
        let nodes = resolve_source(".a { content: \"@x\"; }").expect("resolve");
        assert_eq!(rules(&nodes)[0].declarations[0].value, "\"@x\"");
    }
}
