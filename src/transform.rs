//! Markup tree → virtual script.
//!
//! The corrected markup tree is written out as one JSX-flavoured program:
//! the frontmatter body verbatim, then all markup as children of a single
//! root fragment. Original text is copied wherever the script parser accepts
//! it as is; everything else is injected or substituted one-for-one, and a
//! [`RestoreCallback`] is registered for every construct that must be turned
//! back into its Astro shape once the script parser has run.

use log::debug;
use serde_json::Value;

use crate::error::{ParseError, ParseErrorKind, ParseResult};
use crate::estree::{EsNode, Field, Token, TokenKind};
use crate::markup::{Attribute, AttributeKind, MarkupNode, ParentNode, TagNode, ValueNode};
use crate::position::PositionIndex;
use crate::restore::{RestoreCallback, RestoreContext};
use crate::script::ScriptDialect;
use crate::virtual_script::{OffsetMap, VirtualScriptBuilder};
use crate::visitor_keys::{
    ASTRO_DOCTYPE, ASTRO_FRAGMENT, ASTRO_HTML_COMMENT, ASTRO_RAW_TEXT, ASTRO_SHORTHAND_ATTRIBUTE,
    ASTRO_TEMPLATE_LITERAL_ATTRIBUTE,
};

/// Declaration appended for the TypeScript dialect so `Astro` type-checks.
pub const CONTEXT_DECLARATION: &str = "\ndeclare const Astro: any;";

pub struct VirtualScript {
    pub code: String,
    pub map: OffsetMap,
    pub callbacks: Vec<RestoreCallback>,
    /// Tokens in original coordinates for text the script parser never sees.
    pub tokens: Vec<Token>,
}

pub fn build_virtual_script(
    source: &str,
    root: &MarkupNode,
    dialect: ScriptDialect,
    index: &PositionIndex,
) -> ParseResult<VirtualScript> {
    let MarkupNode::Root(root) = root else {
        return Err(ParseError::from_offset(
            ParseErrorKind::UnknownKind,
            format!("Expected a root node, found `{}`", root.type_name()),
            root.position().start,
            index,
        ));
    };
    let mut writer = ScriptWriter {
        source,
        index,
        out: VirtualScriptBuilder::new(source),
        callbacks: Vec::new(),
        tokens: Vec::new(),
        root_fragment: None,
    };
    writer.write_root(root)?;
    if dialect == ScriptDialect::TypeScript {
        writer.write_context_declaration();
    }

    let ScriptWriter {
        out,
        callbacks,
        tokens,
        ..
    } = writer;
    let (code, map) = out.finish();
    debug!(
        "[VIRTUAL] {} bytes of script, {} restore callbacks, {} synthetic tokens.",
        code.len(),
        callbacks.len(),
        tokens.len()
    );
    Ok(VirtualScript {
        code,
        map,
        callbacks,
        tokens,
    })
}

struct ScriptWriter<'s> {
    source: &'s str,
    index: &'s PositionIndex,
    out: VirtualScriptBuilder<'s>,
    callbacks: Vec<RestoreCallback>,
    tokens: Vec<Token>,
    /// Where the root fragment was opened.
    root_fragment: Option<usize>,
}

impl<'s> ScriptWriter<'s> {
    fn unknown(&self, node: &MarkupNode) -> ParseError {
        ParseError::from_offset(
            ParseErrorKind::UnknownKind,
            format!("Unexpected `{}` node", node.type_name()),
            node.position().start,
            self.index,
        )
    }

    fn synthetic_token(&mut self, kind: TokenKind, [start, end]: [usize; 2]) {
        let value = self.source.get(start..end).unwrap_or_default();
        self.tokens.push(Token::new(kind, value, [start, end]));
    }

    /// Copies `range`, replacing characters JSX text cannot hold. Returns
    /// whether anything was replaced.
    fn append_text(&mut self, [start, end]: [usize; 2]) -> bool {
        let source = self.source;
        let mut replaced = false;
        for (i, c) in source[start..end].char_indices() {
            if matches!(c, '<' | '>' | '{' | '}') {
                self.out.append_original(start + i);
                self.out.append_replacement("_");
                replaced = true;
            }
        }
        self.out.append_original(end);
        replaced
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ROOT
    // ═══════════════════════════════════════════════════════════════════════════

    fn write_root(&mut self, root: &ParentNode) -> ParseResult<()> {
        let children = &root.children;
        for (i, child) in children.iter().enumerate() {
            match child {
                MarkupNode::Frontmatter(frontmatter) => self.write_frontmatter(frontmatter),
                MarkupNode::Comment(_) | MarkupNode::Doctype(_) => self.write_statement_placeholder(child),
                MarkupNode::Text(t) if child.is_whitespace_text() => {
                    self.out.append_original(t.position.end_or_start())
                }
                _ => {
                    self.open_root_fragment(child.position().start);
                    self.write_jsx_children(&children[i..])?;
                    break;
                }
            }
        }

        let len = self.source.len();
        self.out.append_original(len);
        if let Some(at) = self.root_fragment {
            self.out.append_virtual("</>;");
            let expected = [at, len];
            self.callbacks.push(
                RestoreCallback::new("root-fragment", at, move |node, ctx| {
                    if !node.is("ExpressionStatement") || !ctx.is_top_level(node.id) {
                        return false;
                    }
                    match node.node_mut("expression") {
                        Some(fragment) if fragment.is("JSXFragment") && fragment.range == expected => {
                            fragment.kind = ASTRO_FRAGMENT.to_string();
                            fragment.remove("openingFragment");
                            fragment.remove("closingFragment");
                            true
                        }
                        _ => false,
                    }
                })
                .required(),
            );
        }
        Ok(())
    }

    fn open_root_fragment(&mut self, at: usize) {
        self.out.append_original(at);
        self.out.append_virtual("<>");
        self.root_fragment = Some(at);
    }

    fn write_frontmatter(&mut self, frontmatter: &ValueNode) {
        let start = frontmatter.position.start;
        let end = frontmatter.position.end_or_start();
        let body_end = end.saturating_sub(3).max(start + 3);
        let body_trimmed_end = start + 3 + self.source[start + 3..body_end].trim_end().len();

        self.out.append_original(start);
        self.out.skip_original(3);
        self.out.append_original(body_trimmed_end);
        self.out.append_virtual("\n;");
        self.out.skip_until(end);

        self.synthetic_token(TokenKind::Punctuator, [start, start + 3]);
        self.synthetic_token(TokenKind::Punctuator, [body_end, end]);

        let separator = [body_trimmed_end, body_trimmed_end];
        self.callbacks.push(RestoreCallback::new("frontmatter-separator", body_trimmed_end, move |node, _| {
            if !node.is("Program") {
                return false;
            }
            if let Some(body) = node.nodes_mut("body") {
                body.retain(|statement| {
                    !matches!(statement, Some(s) if s.is("EmptyStatement") && s.range == separator)
                });
            }
            true
        }));
    }

    /// Comment or doctype before any markup: a `0;` statement stands in.
    fn write_statement_placeholder(&mut self, node: &MarkupNode) {
        let [start, end] = node.range();
        self.out.append_original(start);
        self.out.append_virtual("0;");
        self.out.skip_until(end);

        let (kind, token_kind, value) = self.placeholder_shape(node);
        self.synthetic_token(token_kind, [start, end]);
        self.callbacks.push(RestoreCallback::new(kind, start, move |es, ctx| {
            if !(es.is("ExpressionStatement") && es.range == [start, start] && ctx.is_top_level(es.id)) {
                return false;
            }
            relabel_placeholder(es, kind, &value, [start, end]);
            true
        }));
    }

    fn write_context_declaration(&mut self) {
        let len = self.source.len();
        self.out.append_virtual(CONTEXT_DECLARATION);
        self.callbacks.push(
            RestoreCallback::new("context-declaration", len, move |node, ctx| {
                if !node.is("Program") {
                    return false;
                }
                let Some(body) = node.nodes_mut("body") else {
                    return false;
                };
                let found = body.iter().position(|statement| {
                    matches!(statement, Some(s) if s.is("VariableDeclaration")
                        && s.bool_field("declare")
                        && s.range == [len, len])
                });
                match found.and_then(|i| body.remove(i)) {
                    Some(declaration) => {
                        ctx.retract(declaration);
                        true
                    }
                    None => false,
                }
            })
            .required(),
        );
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // JSX CONTEXT
    // ═══════════════════════════════════════════════════════════════════════════

    fn write_jsx_children(&mut self, children: &[MarkupNode]) -> ParseResult<()> {
        let mut i = 0;
        while i < children.len() {
            if let MarkupNode::Text(_) = &children[i] {
                // adjacent text nodes read as one JSX text
                let start = children[i].position().start;
                let mut last = i;
                while matches!(children.get(last + 1), Some(MarkupNode::Text(_))) {
                    last += 1;
                }
                let end = children[last].position().end_or_start();
                self.write_jsx_text([start, end]);
                i = last + 1;
                continue;
            }
            self.write_jsx_child(&children[i])?;
            i += 1;
        }
        Ok(())
    }

    fn write_jsx_child(&mut self, node: &MarkupNode) -> ParseResult<()> {
        match node {
            MarkupNode::Element(tag)
            | MarkupNode::Component(tag)
            | MarkupNode::CustomElement(tag)
            | MarkupNode::Fragment(tag) => self.write_tag(tag),
            MarkupNode::Expression(expression) => self.write_expression(expression),
            MarkupNode::Comment(_) | MarkupNode::Doctype(_) => {
                self.write_jsx_placeholder(node);
                Ok(())
            }
            MarkupNode::Text(text) => {
                self.write_jsx_text([text.position.start, text.position.end_or_start()]);
                Ok(())
            }
            MarkupNode::Root(_) | MarkupNode::Frontmatter(_) => Err(self.unknown(node)),
        }
    }

    fn write_jsx_text(&mut self, range: [usize; 2]) {
        if range[0] >= range[1] {
            return;
        }
        self.out.append_original(range[0]);
        if self.append_text(range) {
            self.callbacks.push(RestoreCallback::new("text", range[0], move |node, ctx| {
                if !(node.is("JSXText") && node.range == range) {
                    return false;
                }
                let text = ctx.slice(range);
                node.set_value("value", text);
                node.set_value("raw", text);
                true
            }));
        }
    }

    /// Comment or doctype among JSX children: `<!-- x -->` reads as `<></>`,
    /// keeping the first and last character of the original.
    fn write_jsx_placeholder(&mut self, node: &MarkupNode) {
        let [start, end] = node.range();
        let terminated = end >= start + 2 && self.source.as_bytes()[end - 1] == b'>';
        self.out.append_original(start + 1);
        let expected = if terminated {
            self.out.append_virtual("></");
            self.out.skip_until(end - 1);
            self.out.append_original(end);
            [start, end]
        } else {
            self.out.append_virtual("></>");
            self.out.skip_until(end);
            [start, start + 1]
        };

        let (kind, token_kind, value) = self.placeholder_shape(node);
        self.synthetic_token(token_kind, [start, end]);
        self.callbacks.push(RestoreCallback::new(kind, start, move |es, ctx| {
            if !(es.is("JSXFragment") && es.range == expected) {
                return false;
            }
            relabel_placeholder(es, kind, &value, [start, end]);
            ctx.remove_token(TokenKind::Punctuator, [start, start + 1]);
            if terminated {
                ctx.remove_token(TokenKind::Punctuator, [end - 1, end]);
            }
            true
        }));
    }

    fn placeholder_shape(&self, node: &MarkupNode) -> (&'static str, TokenKind, String) {
        let [start, end] = node.range();
        match node {
            MarkupNode::Doctype(d) => (ASTRO_DOCTYPE, TokenKind::HtmlDocType, d.value.clone()),
            _ => {
                let inner_start = (start + 4).min(end);
                let inner_end = if self.source[inner_start..end].ends_with("-->") {
                    end - 3
                } else {
                    end
                };
                let value = self.source[inner_start..inner_end.max(inner_start)].to_string();
                (ASTRO_HTML_COMMENT, TokenKind::HtmlComment, value)
            }
        }
    }

    fn write_expression(&mut self, expression: &ParentNode) -> ParseResult<()> {
        let start = expression.position.start;
        let end = expression.position.end_or_start();
        self.out.append_original(start + 1);

        let children = &expression.children;
        let mut i = 0;
        while i < children.len() {
            if let MarkupNode::Text(text) = &children[i] {
                self.out.append_original(text.position.end_or_start());
                i += 1;
                continue;
            }
            // markup siblings separated only by whitespace share one fragment
            let mut last = i;
            let mut j = i + 1;
            while let Some(next) = children.get(j) {
                if is_markup(next) {
                    last = j;
                } else if !next.is_whitespace_text() {
                    break;
                }
                j += 1;
            }
            let run = &children[i..=last];
            if run.iter().filter(|c| is_markup(c)).count() >= 2 {
                self.write_wrapped_run(run)?;
            } else {
                self.write_jsx_child(&children[i])?;
                last = i;
            }
            i = last + 1;
        }

        self.out.append_original(end);
        Ok(())
    }

    fn write_wrapped_run(&mut self, run: &[MarkupNode]) -> ParseResult<()> {
        let first = run[0].position().start;
        let last = run[run.len() - 1].position().end_or_start();
        self.out.append_original(first);
        self.out.append_virtual("<>");
        self.write_jsx_children(run)?;
        self.out.append_original(last);
        self.out.append_virtual("</>");

        let expected = [first, last];
        self.callbacks.push(RestoreCallback::new("expression-fragment", first, move |node, _| {
            if !(node.is("JSXFragment") && node.range == expected) {
                return false;
            }
            node.kind = ASTRO_FRAGMENT.to_string();
            node.remove("openingFragment");
            node.remove("closingFragment");
            true
        }));
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // TAGS
    // ═══════════════════════════════════════════════════════════════════════════

    fn write_tag(&mut self, tag: &TagNode) -> ParseResult<()> {
        let start = tag.position.start;
        let end = tag.position.end_or_start();
        let start_tag_end = tag.start_tag_end.ok_or_else(|| {
            ParseError::scan(format!("Start tag `<{}>` was never closed", tag.name), start, self.index)
        })?;
        let is_fragment = tag.name.is_empty();
        let has_children = !tag.children.is_empty();

        self.out.append_original(start);
        for attr in &tag.attributes {
            self.write_attribute(attr);
        }

        // `<br>` and other childless unclosed tags read as `<br/>`
        let needs_self_close =
            tag.end_tag_start.is_none() && !tag.self_closing && !is_fragment && !has_children;
        if needs_self_close {
            self.out.append_original(start_tag_end - 1);
            self.out.append_virtual("/");
        }
        self.out.append_original(start_tag_end);

        if tag.is_raw_container() {
            for child in &tag.children {
                match child {
                    MarkupNode::Text(text) => {
                        self.write_raw_text([text.position.start, text.position.end_or_start()])
                    }
                    other => self.write_jsx_child(other)?,
                }
            }
        } else {
            self.write_jsx_children(&tag.children)?;
        }

        match tag.end_tag_start {
            Some(end_tag_start) => {
                let name_start = end_tag_start + 2;
                self.out.append_original(name_start);
                let written = self.source.get(name_start..name_start + tag.name.len());
                if written.is_some_and(|w| w != tag.name) {
                    // `</P>` closing `<p>`
                    self.out.append_replacement(&tag.name);
                }
                self.out.append_original(end);
            }
            None if needs_self_close || tag.self_closing => {}
            None => {
                self.out.append_original(end);
                self.out.append_virtual(&format!("</{}>", tag.name));
                let expected = [start, end];
                let (kind, key) = if is_fragment {
                    ("JSXFragment", "closingFragment")
                } else {
                    ("JSXElement", "closingElement")
                };
                self.callbacks.push(RestoreCallback::new("unclosed-element", start, move |node, _| {
                    if !(node.is(kind) && node.range == expected) {
                        return false;
                    }
                    node.set_value(key, Value::Null);
                    true
                }));
            }
        }
        Ok(())
    }

    fn write_raw_text(&mut self, range: [usize; 2]) {
        if range[0] >= range[1] {
            return;
        }
        self.out.append_original(range[0]);
        self.append_text(range);
        self.callbacks.push(RestoreCallback::new(ASTRO_RAW_TEXT, range[0], move |node, ctx| {
            if !(node.is("JSXText") && node.range == range) {
                return false;
            }
            let text = ctx.slice(range);
            node.kind = ASTRO_RAW_TEXT.to_string();
            node.set_value("value", text);
            node.set_value("raw", text);
            true
        }));
    }

    fn write_attribute(&mut self, attr: &Attribute) {
        let start = attr.position.start;
        let end = attr.position.end_or_start();
        let mut fix = AttributeFix {
            range: [start, end],
            ..Default::default()
        };

        match attr.kind {
            AttributeKind::Spread => return,
            AttributeKind::Shorthand => {
                self.out.append_original(start);
                self.out.append_virtual(&format!("{}=", jsx_attribute_name(&attr.name)));
                fix.kind = Some(ASTRO_SHORTHAND_ATTRIBUTE);
                fix.name = Some((attr.name.clone(), attr.value_range.unwrap_or([start, end]), false));
            }
            _ => {
                let name_range = attr.name_range.unwrap_or([start, start + attr.name.len()]);
                if attr.name.contains([':', '.', '@']) {
                    for (i, c) in attr.name.char_indices() {
                        if matches!(c, ':' | '.' | '@') {
                            self.out.append_original(name_range[0] + i);
                            self.out.append_replacement("_");
                        }
                    }
                    fix.name = Some((attr.name.clone(), name_range, true));
                }
                match (attr.kind, attr.value_range) {
                    (AttributeKind::Quoted, Some([value_start, value_end])) if attr.quote.is_none() => {
                        let quote = if attr.value.contains('"') { "'" } else { "\"" };
                        self.out.append_original(value_start);
                        self.out.append_virtual(quote);
                        self.out.append_original(value_end);
                        self.out.append_virtual(quote);
                        fix.literal_raw = Some([value_start, value_end]);
                    }
                    (AttributeKind::TemplateLiteral, Some([value_start, value_end])) => {
                        self.out.append_original(value_start.saturating_sub(1));
                        self.out.append_virtual("{");
                        self.out.append_original(value_end + 1);
                        self.out.append_virtual("}");
                        fix.kind = Some(ASTRO_TEMPLATE_LITERAL_ATTRIBUTE);
                    }
                    _ => {}
                }
            }
        }

        if fix.is_needed() {
            self.callbacks
                .push(RestoreCallback::new("attribute", start, move |node, ctx| fix.apply(node, ctx)));
        }
    }
}

fn is_markup(node: &MarkupNode) -> bool {
    node.as_tag().is_some() || matches!(node, MarkupNode::Comment(_) | MarkupNode::Doctype(_))
}

fn relabel_placeholder(node: &mut EsNode, kind: &str, value: &str, range: [usize; 2]) {
    node.kind = kind.to_string();
    node.fields.clear();
    node.set_value("value", value);
    node.range = range;
}

/// Name the script parser accepts for a shorthand attribute.
fn jsx_attribute_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '-') { c } else { '_' })
        .collect();
    if !out.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_' || c == '$') {
        out.insert(0, '_');
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// ATTRIBUTE RESTORE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct AttributeFix {
    range: [usize; 2],
    kind: Option<&'static str>,
    /// Original name, its range, and whether `ns:name` splits in two.
    name: Option<(String, [usize; 2], bool)>,
    literal_raw: Option<[usize; 2]>,
}

impl AttributeFix {
    fn is_needed(&self) -> bool {
        self.kind.is_some() || self.name.is_some() || self.literal_raw.is_some()
    }

    fn apply(&self, node: &mut EsNode, ctx: &mut RestoreContext<'_>) -> bool {
        if !(node.is("JSXAttribute") && node.range == self.range) {
            return false;
        }
        if let Some(kind) = self.kind {
            node.kind = kind.to_string();
        }
        if let Some((name, range, split)) = &self.name {
            let id = match node.node("name") {
                Some(existing) => existing.id,
                None => ctx.fresh_id(),
            };
            node.set_node("name", attribute_name_node(id, name, *range, *split, ctx));
        }
        if let Some(raw) = self.literal_raw {
            if let Some(literal) = node.node_mut("value") {
                literal.set_value("raw", ctx.slice(raw));
            }
        }
        true
    }
}

fn attribute_name_node(
    id: crate::estree::NodeId,
    name: &str,
    [start, end]: [usize; 2],
    split: bool,
    ctx: &mut RestoreContext<'_>,
) -> EsNode {
    let namespaced = split
        && name.matches(':').count() == 1
        && !name.contains(['.', '@']);
    match name.split_once(':').filter(|_| namespaced) {
        Some((namespace, local)) => {
            let colon = start + namespace.len();
            let mut ns = EsNode::new(ctx.fresh_id(), "JSXIdentifier", [start, colon]);
            ns.set_value("name", namespace);
            let mut local_node = EsNode::new(ctx.fresh_id(), "JSXIdentifier", [colon + 1, end]);
            local_node.set_value("name", local);
            EsNode::new(id, "JSXNamespacedName", [start, end])
                .with_field("namespace", Field::Node(Box::new(ns)))
                .with_field("name", Field::Node(Box::new(local_node)))
        }
        None => {
            let mut node = EsNode::new(id, "JSXIdentifier", [start, end]);
            node.set_value("name", name);
            node
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fix_locations::fix_locations;
    use crate::markup::MarkupParser;
    use crate::markup_parser::AstroMarkupParser;
    use crate::position::LineFeedNormalizer;

    fn virtual_code(source: &str, dialect: ScriptDialect) -> VirtualScript {
        let index = PositionIndex::new(source);
        let (normalized, normalizer) = LineFeedNormalizer::normalize(source);
        let mut result = AstroMarkupParser.parse(&normalized).unwrap();
        fix_locations(&mut result.ast, &normalized, &normalizer, &index).unwrap();
        build_virtual_script(source, &result.ast, dialect, &index).unwrap()
    }

    #[test]
    fn test_frontmatter_and_root_fragment() {
        let script = virtual_code("---\nlet a = 1\n---\n<p>{a}</p>", ScriptDialect::JavaScript);
        assert_eq!(script.code, "\nlet a = 1\n;\n<><p>{a}</p></>;");
        let fences: Vec<_> = script.tokens.iter().map(|t| t.range).collect();
        assert_eq!(fences, vec![[0, 3], [14, 17]]);
    }

    #[test]
    fn test_typescript_gets_context_declaration() {
        let script = virtual_code("<h1>Hi</h1>", ScriptDialect::TypeScript);
        assert_eq!(script.code, format!("<><h1>Hi</h1></>;{}", CONTEXT_DECLARATION));
    }

    #[test]
    fn test_attributes_are_rewritten_minimally() {
        let script = virtual_code(
            "<a {foo} client:load href=x title=`t${y}` {...rest}>b</a>",
            ScriptDialect::JavaScript,
        );
        assert_eq!(
            script.code,
            "<><a foo={foo} client_load href=\"x\" title={`t${y}`} {...rest}>b</a></>;"
        );
        // every original position still maps back
        assert_eq!(script.map.map_start(script.code.find("{foo}").unwrap()), 3);
    }

    #[test]
    fn test_comments_doctype_and_unclosed_tags() {
        let script = virtual_code("<!DOCTYPE html>\n<div><!-- x --><br>", ScriptDialect::JavaScript);
        assert_eq!(script.code, "0;\n<><div><></><br/></div></>;");
        let kinds: Vec<_> = script.tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TokenKind::HtmlDocType, TokenKind::HtmlComment]);
    }

    #[test]
    fn test_text_and_raw_text_are_substituted() {
        let script = virtual_code("<p>a > b</p><style>a{b:c}</style>", ScriptDialect::JavaScript);
        assert_eq!(script.code, "<><p>a _ b</p><style>a_b:c_</style></>;");
    }

    #[test]
    fn test_markup_siblings_in_expressions_are_wrapped() {
        let script = virtual_code("{ok && <a/> <b/>}", ScriptDialect::JavaScript);
        assert_eq!(script.code, "<>{ok && <><a/> <b/></>}</>;");
    }

    #[test]
    fn test_jsx_attribute_name_sanitizing() {
        assert_eq!(jsx_attribute_name("foo"), "foo");
        assert_eq!(jsx_attribute_name("a.b"), "a_b");
        assert_eq!(jsx_attribute_name("1x"), "_1x");
    }
}
