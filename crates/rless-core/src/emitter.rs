use crate::resolver::{CssAtRule, CssDeclaration, CssNode, CssRule};

/// How compiled CSS is formatted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputStyle {
    /// One declaration per line, 4-space indent, blank line between rules.
    #[default]
    Expanded,
    /// No whitespace, no trailing semicolons.
    Compressed,
}

pub fn emit_css(nodes: &[CssNode], style: OutputStyle) -> String {
    let mut out = String::new();
    for node in nodes {
        emit_node(node, style, 0, &mut out);
        if style == OutputStyle::Expanded {
            out.push('\n');
        }
    }
    out
}

fn emit_node(node: &CssNode, style: OutputStyle, indent: usize, out: &mut String) {
    match node {
        CssNode::Rule(rule) => emit_rule(rule, style, indent, out),
        CssNode::AtRule(at) => emit_at_rule(at, style, indent, out),
    }
}

fn emit_rule(rule: &CssRule, style: OutputStyle, indent: usize, out: &mut String) {
    match style {
        OutputStyle::Expanded => {
            let pad = "    ".repeat(indent);
            out.push_str(&pad);
            out.push_str(&rule.selectors.join(", "));
            out.push_str(" {\n");
            for decl in &rule.declarations {
                out.push_str(&pad);
                out.push_str("    ");
                emit_declaration(decl, true, out);
            }
            out.push_str(&pad);
            out.push_str("}\n");
        }
        OutputStyle::Compressed => {
            out.push_str(&rule.selectors.join(","));
            out.push('{');
            for (i, decl) in rule.declarations.iter().enumerate() {
                if i > 0 {
                    out.push(';');
                }
                emit_declaration(decl, false, out);
            }
            out.push('}');
        }
    }
}

fn emit_declaration(decl: &CssDeclaration, expanded: bool, out: &mut String) {
    out.push_str(&decl.property);
    out.push(':');
    if expanded {
        out.push(' ');
    }
    out.push_str(&decl.value);
    if decl.important {
        out.push_str(" !important");
    }
    if expanded {
        out.push_str(";\n");
    }
}

fn emit_at_rule(at: &CssAtRule, style: OutputStyle, indent: usize, out: &mut String) {
    match style {
        OutputStyle::Expanded => {
            let pad = "    ".repeat(indent);
            out.push_str(&pad);
            out.push('@');
            out.push_str(&at.name);
            if !at.params.is_empty() {
                out.push(' ');
                out.push_str(&at.params);
            }
            if !at.has_block {
                out.push_str(";\n");
                return;
            }
            out.push_str(" {\n");
            for child in &at.children {
                emit_node(child, style, indent + 1, out);
            }
            out.push_str(&pad);
            out.push_str("}\n");
        }
        OutputStyle::Compressed => {
            out.push('@');
            out.push_str(&at.name);
            if !at.params.is_empty() {
                out.push(' ');
                out.push_str(&at.params);
            }
            if !at.has_block {
                out.push(';');
                return;
            }
            out.push('{');
            for child in &at.children {
                emit_node(child, style, indent, out);
            }
            out.push('}');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(selectors: &[&str], declarations: Vec<CssDeclaration>) -> CssNode {
        CssNode::Rule(CssRule {
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
            declarations,
        })
    }

    fn decl(property: &str, value: &str) -> CssDeclaration {
        CssDeclaration {
            property: property.to_string(),
            value: value.to_string(),
            important: false,
        }
    }

    #[test]
    fn expanded_format() {
        let nodes = vec![rule(&[".a"], vec![decl("width", "10px")])];
        assert_eq!(
            emit_css(&nodes, OutputStyle::Expanded),
            ".a {\n    width: 10px;\n}\n\n"
        );
    }

    #[test]
    fn compressed_format() {
        let nodes = vec![rule(
            &[".a"],
            vec![decl("width", "10px"), decl("height", "20px")],
        )];
        assert_eq!(
            emit_css(&nodes, OutputStyle::Compressed),
            ".a{width:10px;height:20px}"
        );
    }

    #[test]
    fn selector_lists_join() {
        let nodes = vec![rule(&[".a", ".b"], vec![decl("color", "red")])];
        assert_eq!(
            emit_css(&nodes, OutputStyle::Compressed),
            ".a,.b{color:red}"
        );
    }

    #[test]
    fn important_is_kept_verbatim() {
        let nodes = vec![rule(
            &[".a"],
            vec![CssDeclaration {
                property: "width".to_string(),
                value: "15px".to_string(),
                important: true,
            }],
        )];
        assert_eq!(
            emit_css(&nodes, OutputStyle::Compressed),
            ".a{width:15px !important}"
        );
        assert!(emit_css(&nodes, OutputStyle::Expanded).contains("width: 15px !important;"));
    }

    #[test]
    fn at_rules_nest_their_children() {
        let nodes = vec![CssNode::AtRule(CssAtRule {
            name: "media".to_string(),
            params: "(max-width: 768px)".to_string(),
            children: vec![rule(&[".a"], vec![decl("width", "100%")])],
            has_block: true,
        })];
        assert_eq!(
            emit_css(&nodes, OutputStyle::Compressed),
            "@media (max-width: 768px){.a{width:100%}}"
        );
        assert_eq!(
            emit_css(&nodes, OutputStyle::Expanded),
            "@media (max-width: 768px) {\n    .a {\n        width: 100%;\n    }\n}\n\n"
        );
    }

    #[test]
    fn statement_at_rules_emit_verbatim() {
        let nodes = vec![CssNode::AtRule(CssAtRule {
            name: "charset".to_string(),
            params: "\"utf-8\"".to_string(),
            children: Vec::new(),
            has_block: false,
        })];
        assert_eq!(
            emit_css(&nodes, OutputStyle::Compressed),
            "@charset \"utf-8\";"
        );
    }
}
