//! Markup tree for the template region of a component file.
//!
//! Produced by a [`MarkupParser`], whose offsets are only hints, and then
//! corrected in place by [`crate::fix_locations`].

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

lazy_static! {
    static ref VOID_ELEMENTS: HashSet<&'static str> = [
        "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "meta",
        "param", "source", "track", "wbr",
    ]
    .into_iter()
    .collect();
}

/// Elements that never have children or an end tag.
pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(name.to_ascii_lowercase().as_str())
}

/// End tags of these elements do not close them; trailing content still
/// lands inside, the way browsers treat it.
pub fn is_lingering(name: &str) -> bool {
    name.eq_ignore_ascii_case("html") || name.eq_ignore_ascii_case("body")
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub start: usize,
    /// Unknown until the corrector has visited the node.
    pub end: Option<usize>,
}

impl Position {
    pub fn at(start: usize) -> Self {
        Self { start, end: None }
    }

    pub fn end_or_start(&self) -> usize {
        self.end.unwrap_or(self.start)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MarkupNode {
    Root(ParentNode),
    Frontmatter(ValueNode),
    Element(TagNode),
    Component(TagNode),
    CustomElement(TagNode),
    Fragment(TagNode),
    Text(ValueNode),
    Comment(ValueNode),
    Doctype(ValueNode),
    Expression(ParentNode),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentNode {
    pub children: Vec<MarkupNode>,
    pub position: Position,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueNode {
    pub value: String,
    pub position: Position,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagNode {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<MarkupNode>,
    pub position: Position,
    /// Written as `<x />` in source.
    pub self_closing: bool,
    /// Offset just past the `>` of the start tag.
    pub start_tag_end: Option<usize>,
    /// Offset of the `</` of the end tag, when the source has one.
    pub end_tag_start: Option<usize>,
}

impl TagNode {
    pub fn new(name: impl Into<String>, start: usize) -> Self {
        Self {
            name: name.into(),
            position: Position::at(start),
            ..Default::default()
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Children of this tag are copied through as opaque text.
    pub fn is_raw_container(&self) -> bool {
        matches!(self.name.as_str(), "script" | "style")
            || self
                .attributes
                .iter()
                .any(|a| matches!(a.name.as_str(), "is:raw" | "set:html" | "set:text"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttributeKind {
    /// `disabled`
    Empty,
    /// `class="a"`, `class='a'` or `class=a`
    Quoted,
    /// `value={expr}`
    Expression,
    /// `{name}`
    Shorthand,
    /// `{...props}`
    Spread,
    /// ``name=`text ${x}` ``
    TemplateLiteral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub kind: AttributeKind,
    /// For `shorthand` the inner expression text, for `spread` the text
    /// after `...`.
    pub name: String,
    /// Entity-decoded for `quoted`; raw source text for every other kind.
    pub value: String,
    /// `'"'`, `'\''` or `None` for unquoted values.
    pub quote: Option<char>,
    pub position: Position,
    pub name_range: Option<[usize; 2]>,
    pub value_range: Option<[usize; 2]>,
}

impl Attribute {
    pub fn new(kind: AttributeKind, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            value: value.into(),
            quote: None,
            position: Position::default(),
            name_range: None,
            value_range: None,
        }
    }
}

impl MarkupNode {
    pub fn position(&self) -> &Position {
        match self {
            MarkupNode::Root(n) | MarkupNode::Expression(n) => &n.position,
            MarkupNode::Frontmatter(n)
            | MarkupNode::Text(n)
            | MarkupNode::Comment(n)
            | MarkupNode::Doctype(n) => &n.position,
            MarkupNode::Element(n)
            | MarkupNode::Component(n)
            | MarkupNode::CustomElement(n)
            | MarkupNode::Fragment(n) => &n.position,
        }
    }

    pub fn position_mut(&mut self) -> &mut Position {
        match self {
            MarkupNode::Root(n) | MarkupNode::Expression(n) => &mut n.position,
            MarkupNode::Frontmatter(n)
            | MarkupNode::Text(n)
            | MarkupNode::Comment(n)
            | MarkupNode::Doctype(n) => &mut n.position,
            MarkupNode::Element(n)
            | MarkupNode::Component(n)
            | MarkupNode::CustomElement(n)
            | MarkupNode::Fragment(n) => &mut n.position,
        }
    }

    pub fn range(&self) -> [usize; 2] {
        let p = self.position();
        [p.start, p.end_or_start()]
    }

    pub fn as_tag(&self) -> Option<&TagNode> {
        match self {
            MarkupNode::Element(n)
            | MarkupNode::Component(n)
            | MarkupNode::CustomElement(n)
            | MarkupNode::Fragment(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_tag_mut(&mut self) -> Option<&mut TagNode> {
        match self {
            MarkupNode::Element(n)
            | MarkupNode::Component(n)
            | MarkupNode::CustomElement(n)
            | MarkupNode::Fragment(n) => Some(n),
            _ => None,
        }
    }

    pub fn children(&self) -> &[MarkupNode] {
        match self {
            MarkupNode::Root(n) | MarkupNode::Expression(n) => &n.children,
            MarkupNode::Element(n)
            | MarkupNode::Component(n)
            | MarkupNode::CustomElement(n)
            | MarkupNode::Fragment(n) => &n.children,
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<MarkupNode>> {
        match self {
            MarkupNode::Root(n) | MarkupNode::Expression(n) => Some(&mut n.children),
            MarkupNode::Element(n)
            | MarkupNode::Component(n)
            | MarkupNode::CustomElement(n)
            | MarkupNode::Fragment(n) => Some(&mut n.children),
            _ => None,
        }
    }

    pub fn is_whitespace_text(&self) -> bool {
        matches!(self, MarkupNode::Text(t) if t.value.trim().is_empty())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            MarkupNode::Root(_) => "root",
            MarkupNode::Frontmatter(_) => "frontmatter",
            MarkupNode::Element(_) => "element",
            MarkupNode::Component(_) => "component",
            MarkupNode::CustomElement(_) => "custom-element",
            MarkupNode::Fragment(_) => "fragment",
            MarkupNode::Text(_) => "text",
            MarkupNode::Comment(_) => "comment",
            MarkupNode::Doctype(_) => "doctype",
            MarkupNode::Expression(_) => "expression",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSER CONTRACT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkupDiagnostic {
    pub code: String,
    pub text: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkupParseResult {
    pub ast: MarkupNode,
    pub diagnostics: Vec<MarkupDiagnostic>,
}

impl MarkupParseResult {
    pub fn root_children(&self) -> &[MarkupNode] {
        self.ast.children()
    }
}

#[derive(Debug, Clone, Error)]
pub enum MarkupError {
    #[error("{message}")]
    Syntax { message: String, offset: usize },
    #[error("markup worker is unavailable: {0}")]
    Worker(String),
}

impl MarkupError {
    pub fn offset(&self) -> usize {
        match self {
            MarkupError::Syntax { offset, .. } => *offset,
            MarkupError::Worker(_) => 0,
        }
    }
}

/// Turns template text into a structural tree. Offsets in the result are not
/// trusted by callers.
pub trait MarkupParser {
    fn parse(&self, code: &str) -> Result<MarkupParseResult, MarkupError>;
}

impl<T: MarkupParser + ?Sized> MarkupParser for Box<T> {
    fn parse(&self, code: &str) -> Result<MarkupParseResult, MarkupError> {
        (**self).parse(code)
    }
}
