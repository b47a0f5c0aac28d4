//! Traversal keys for every node kind the final tree can contain.
//!
//! Standard ESTree and JSX kinds follow the usual key table; the component
//! kinds are declared here as well, so generic tooling can walk them.

use indexmap::IndexMap;
use lazy_static::lazy_static;

use crate::estree::{EsNode, Field};

pub const ASTRO_FRAGMENT: &str = "AstroFragment";
pub const ASTRO_HTML_COMMENT: &str = "AstroHTMLComment";
pub const ASTRO_DOCTYPE: &str = "AstroDoctype";
pub const ASTRO_SHORTHAND_ATTRIBUTE: &str = "AstroShorthandAttribute";
pub const ASTRO_TEMPLATE_LITERAL_ATTRIBUTE: &str = "AstroTemplateLiteralAttribute";
pub const ASTRO_RAW_TEXT: &str = "AstroRawText";

lazy_static! {
    pub static ref ASTRO_KEYS: IndexMap<&'static str, &'static [&'static str]> = {
        let mut m: IndexMap<&'static str, &'static [&'static str]> = IndexMap::new();
        m.insert("Program", &["body"]);
        m.insert(ASTRO_FRAGMENT, &["children"]);
        m.insert(ASTRO_HTML_COMMENT, &[]);
        m.insert(ASTRO_DOCTYPE, &[]);
        m.insert(ASTRO_SHORTHAND_ATTRIBUTE, &["name", "value"]);
        m.insert(ASTRO_TEMPLATE_LITERAL_ATTRIBUTE, &["name", "value"]);
        m.insert(ASTRO_RAW_TEXT, &[]);
        m
    };

    pub static ref ESTREE_KEYS: IndexMap<&'static str, &'static [&'static str]> = {
        let mut m: IndexMap<&'static str, &'static [&'static str]> = IndexMap::new();
        m.insert("ArrayExpression", &["elements"]);
        m.insert("ArrayPattern", &["elements"]);
        m.insert("ArrowFunctionExpression", &["params", "body"]);
        m.insert("AssignmentExpression", &["left", "right"]);
        m.insert("AssignmentPattern", &["left", "right"]);
        m.insert("AwaitExpression", &["argument"]);
        m.insert("BinaryExpression", &["left", "right"]);
        m.insert("BlockStatement", &["body"]);
        m.insert("BreakStatement", &["label"]);
        m.insert("CallExpression", &["callee", "arguments"]);
        m.insert("CatchClause", &["param", "body"]);
        m.insert("ChainExpression", &["expression"]);
        m.insert("ClassBody", &["body"]);
        m.insert("ClassDeclaration", &["id", "superClass", "body"]);
        m.insert("ClassExpression", &["id", "superClass", "body"]);
        m.insert("ConditionalExpression", &["test", "consequent", "alternate"]);
        m.insert("ContinueStatement", &["label"]);
        m.insert("DebuggerStatement", &[]);
        m.insert("DoWhileStatement", &["body", "test"]);
        m.insert("EmptyStatement", &[]);
        m.insert("ExportAllDeclaration", &["exported", "source"]);
        m.insert("ExportDefaultDeclaration", &["declaration"]);
        m.insert("ExportNamedDeclaration", &["declaration", "specifiers", "source"]);
        m.insert("ExportSpecifier", &["exported", "local"]);
        m.insert("ExpressionStatement", &["expression"]);
        m.insert("ForInStatement", &["left", "right", "body"]);
        m.insert("ForOfStatement", &["left", "right", "body"]);
        m.insert("ForStatement", &["init", "test", "update", "body"]);
        m.insert("FunctionDeclaration", &["id", "params", "body"]);
        m.insert("FunctionExpression", &["id", "params", "body"]);
        m.insert("Identifier", &[]);
        m.insert("IfStatement", &["test", "consequent", "alternate"]);
        m.insert("ImportDeclaration", &["specifiers", "source"]);
        m.insert("ImportDefaultSpecifier", &["local"]);
        m.insert("ImportExpression", &["source"]);
        m.insert("ImportNamespaceSpecifier", &["local"]);
        m.insert("ImportSpecifier", &["imported", "local"]);
        m.insert("JSXAttribute", &["name", "value"]);
        m.insert("JSXClosingElement", &["name"]);
        m.insert("JSXClosingFragment", &[]);
        m.insert("JSXElement", &["openingElement", "children", "closingElement"]);
        m.insert("JSXEmptyExpression", &[]);
        m.insert("JSXExpressionContainer", &["expression"]);
        m.insert("JSXFragment", &["openingFragment", "children", "closingFragment"]);
        m.insert("JSXIdentifier", &[]);
        m.insert("JSXMemberExpression", &["object", "property"]);
        m.insert("JSXNamespacedName", &["namespace", "name"]);
        m.insert("JSXOpeningElement", &["name", "attributes"]);
        m.insert("JSXOpeningFragment", &[]);
        m.insert("JSXSpreadAttribute", &["argument"]);
        m.insert("JSXSpreadChild", &["expression"]);
        m.insert("JSXText", &[]);
        m.insert("LabeledStatement", &["label", "body"]);
        m.insert("Literal", &[]);
        m.insert("LogicalExpression", &["left", "right"]);
        m.insert("MemberExpression", &["object", "property"]);
        m.insert("MetaProperty", &["meta", "property"]);
        m.insert("MethodDefinition", &["key", "value"]);
        m.insert("NewExpression", &["callee", "arguments"]);
        m.insert("ObjectExpression", &["properties"]);
        m.insert("ObjectPattern", &["properties"]);
        m.insert("PrivateIdentifier", &[]);
        m.insert("Property", &["key", "value"]);
        m.insert("PropertyDefinition", &["key", "value"]);
        m.insert("RestElement", &["argument"]);
        m.insert("ReturnStatement", &["argument"]);
        m.insert("SequenceExpression", &["expressions"]);
        m.insert("SpreadElement", &["argument"]);
        m.insert("StaticBlock", &["body"]);
        m.insert("Super", &[]);
        m.insert("SwitchCase", &["test", "consequent"]);
        m.insert("SwitchStatement", &["discriminant", "cases"]);
        m.insert("TaggedTemplateExpression", &["tag", "quasi"]);
        m.insert("TemplateElement", &[]);
        m.insert("TemplateLiteral", &["quasis", "expressions"]);
        m.insert("ThisExpression", &[]);
        m.insert("ThrowStatement", &["argument"]);
        m.insert("TryStatement", &["block", "handler", "finalizer"]);
        m.insert("UnaryExpression", &["argument"]);
        m.insert("UpdateExpression", &["argument"]);
        m.insert("VariableDeclaration", &["declarations"]);
        m.insert("VariableDeclarator", &["id", "init"]);
        m.insert("WhileStatement", &["test", "body"]);
        m.insert("WithStatement", &["object", "body"]);
        m.insert("YieldExpression", &["argument"]);
        m
    };
}

pub fn static_keys(kind: &str) -> Option<&'static [&'static str]> {
    ASTRO_KEYS
        .get(kind)
        .or_else(|| ESTREE_KEYS.get(kind))
        .copied()
}

/// Keys to walk for `node`: the declared keys first, then any other field
/// that holds nodes in source order, so kinds outside the table are never
/// skipped.
pub fn keys_for(node: &EsNode) -> Vec<String> {
    let declared = static_keys(&node.kind).unwrap_or(&[]);
    let mut keys: Vec<String> = declared
        .iter()
        .filter(|key| node.fields.contains_key(**key))
        .map(|key| key.to_string())
        .collect();
    let mut rest: Vec<(usize, &String)> = node
        .fields
        .iter()
        .filter(|(key, _)| !declared.contains(&key.as_str()))
        .filter_map(|(key, field)| match field {
            Field::Node(child) => Some((child.range[0], key)),
            Field::Nodes(children) => Some((
                children.iter().flatten().map(|c| c.range[0]).min().unwrap_or(usize::MAX),
                key,
            )),
            Field::Value(_) => None,
        })
        .collect();
    // undeclared keys follow the source position of their first child
    rest.sort_by_key(|(start, _)| *start);
    keys.extend(rest.into_iter().map(|(_, key)| key.clone()));
    keys
}

/// The delegate's key map (if any) merged with the static table; static
/// entries win for the component kinds.
pub fn merged(delegate: Option<&IndexMap<String, Vec<String>>>) -> IndexMap<String, Vec<String>> {
    let mut out: IndexMap<String, Vec<String>> = ESTREE_KEYS
        .iter()
        .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
        .collect();
    if let Some(delegate) = delegate {
        for (kind, keys) in delegate {
            out.insert(kind.clone(), keys.clone());
        }
    }
    for (kind, keys) in ASTRO_KEYS.iter() {
        out.insert(kind.to_string(), keys.iter().map(|s| s.to_string()).collect());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estree::NodeId;

    #[test]
    fn test_component_kinds_are_declared() {
        let keys = merged(None);
        assert_eq!(keys[ASTRO_FRAGMENT], vec!["children".to_string()]);
        assert!(keys[ASTRO_HTML_COMMENT].is_empty());
        assert!(keys[ASTRO_DOCTYPE].is_empty());
        assert_eq!(keys[ASTRO_SHORTHAND_ATTRIBUTE], vec!["name", "value"]);
        assert_eq!(keys[ASTRO_TEMPLATE_LITERAL_ATTRIBUTE], vec!["name", "value"]);
        assert_eq!(keys["Program"], vec!["body"]);
    }

    #[test]
    fn test_unknown_kind_falls_back_to_node_fields() {
        let child = EsNode::new(NodeId(1), "Identifier", [0, 1]);
        let node = EsNode::new(NodeId(0), "TSAsExpression", [0, 5])
            .with_field("expression", Field::Node(Box::new(child.clone())))
            .with_field("typeAnnotation", Field::Node(Box::new(child)));
        assert_eq!(keys_for(&node), vec!["expression", "typeAnnotation"]);
    }

    #[test]
    fn test_undeclared_fields_follow_source_order() {
        let late = EsNode::new(NodeId(1), "Identifier", [6, 7]);
        let early = EsNode::new(NodeId(2), "Identifier", [2, 3]);
        let node = EsNode::new(NodeId(0), "TSCustomNode", [0, 8])
            .with_field("alpha", Field::Node(Box::new(late)))
            .with_field("omega", Field::Nodes(vec![Some(early), None]))
            .with_field("empty", Field::Nodes(vec![]));
        assert_eq!(keys_for(&node), vec!["omega", "alpha", "empty"]);
    }
}
