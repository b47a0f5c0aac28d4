//! Offset correction for the markup tree.
//!
//! Markup parser offsets are unreliable for several node kinds, so every
//! node and attribute gets its `start`/`end` recomputed by scanning the text
//! forward from a single cursor in document order. The scan runs over the
//! line-feed normalized text the markup parser saw; all offsets are mapped
//! back to the original text once the scan completes.
//!
//! Hoisting rule for `<html>` and `<body>`: when the scan reaches the end tag
//! while the element still has unvisited children, those children are moved
//! up to the parent (and on up to the root once the parent's own end tag is
//! passed) if any of them is more than whitespace. Whitespace-only leftovers
//! are dropped from the tree; their text stays in the source.

use crate::entities::decode_entities;
use crate::error::{ParseError, ParseResult};
use crate::markup::{
    is_lingering, is_void_element, Attribute, AttributeKind, MarkupNode, TagNode,
};
use crate::position::{LineFeedNormalizer, PositionIndex};

/// Corrects `root` in place. `text` is the text the markup parser saw;
/// `index` indexes the original source, in which errors are reported.
pub fn fix_locations(
    root: &mut MarkupNode,
    text: &str,
    normalizer: &LineFeedNormalizer,
    index: &PositionIndex,
) -> ParseResult<()> {
    let mut corrector = Corrector {
        text,
        cursor: 0,
        normalizer,
        index,
    };
    let escaped = corrector.fix_node(root)?;
    if !escaped.is_empty() {
        if let Some(children) = root.children_mut() {
            children.extend(escaped);
        }
    }
    if !normalizer.is_identity() {
        remap_node(root, normalizer);
    }
    Ok(())
}

struct Corrector<'a> {
    text: &'a str,
    cursor: usize,
    normalizer: &'a LineFeedNormalizer,
    index: &'a PositionIndex,
}

impl<'a> Corrector<'a> {
    fn error(&self, message: String, offset: usize) -> ParseError {
        ParseError::scan(message, self.normalizer.remap(offset), self.index)
    }

    /// Forward search from the cursor.
    fn find(&self, token: &str) -> ParseResult<usize> {
        self.text[self.cursor..]
            .find(token)
            .map(|i| self.cursor + i)
            .ok_or_else(|| self.error(format!("Expected `{}`", token), self.cursor))
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.text[self.cursor..];
        self.cursor += rest.len() - rest.trim_start().len();
    }

    /// Whitespace-insensitive match directly at the cursor.
    fn expect(&mut self, token: &str) -> ParseResult<usize> {
        self.skip_whitespace();
        if self.text[self.cursor..].starts_with(token) {
            let at = self.cursor;
            self.cursor += token.len();
            Ok(at)
        } else {
            Err(self.error(format!("Expected `{}`", token), self.cursor))
        }
    }

    /// Exact match at the cursor, falling back to a forward search.
    fn locate(&mut self, literal: &str) -> ParseResult<usize> {
        let at = if self.text[self.cursor..].starts_with(literal) {
            self.cursor
        } else {
            self.find(literal)?
        };
        self.cursor = at + literal.len();
        Ok(at)
    }

    /// Range of an end tag named `name` at the cursor, whitespace allowed
    /// before it. Does not move the cursor.
    fn peek_end_tag(&self, name: &str) -> Option<[usize; 2]> {
        let rest = &self.text[self.cursor..];
        let start = self.cursor + rest.len() - rest.trim_start().len();
        let after = self.text[start..].strip_prefix("</")?;
        if after.len() < name.len() || !after.as_bytes()[..name.len()].eq_ignore_ascii_case(name.as_bytes()) {
            return None;
        }
        let tail = &after[name.len()..];
        if !(tail.starts_with('>') || tail.starts_with(|c: char| c.is_whitespace())) {
            return None;
        }
        let close = tail.find('>')?;
        Some([start, start + 2 + name.len() + close + 1])
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // NODES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Returns children that escaped the node and belong to its parent.
    fn fix_node(&mut self, node: &mut MarkupNode) -> ParseResult<Vec<MarkupNode>> {
        match node {
            MarkupNode::Root(root) => {
                self.fix_children(&mut root.children)?;
                root.position.start = 0;
                root.position.end = Some(self.text.len());
            }
            MarkupNode::Frontmatter(fm) => {
                let start = self.find("---")?;
                self.cursor = start + 3;
                self.locate(&fm.value)?;
                let close = self.expect("---")?;
                fm.position.start = start;
                fm.position.end = Some(close + 3);
            }
            MarkupNode::Text(t) => {
                let start = self.locate(&t.value)?;
                t.position.start = start;
                t.position.end = Some(self.cursor);
            }
            MarkupNode::Comment(c) => {
                let start = self.find("<!--")?;
                self.cursor = start + 4;
                let end = match self.text[self.cursor..].find("-->") {
                    Some(i) => self.cursor + i + 3,
                    None => self.text.len(),
                };
                self.cursor = end;
                c.position.start = start;
                c.position.end = Some(end);
            }
            MarkupNode::Doctype(d) => {
                let start = self.find("<!")?;
                self.cursor = start + 2;
                let end = match self.text[self.cursor..].find('>') {
                    Some(i) => self.cursor + i + 1,
                    None => self.text.len(),
                };
                self.cursor = end;
                d.position.start = start;
                d.position.end = Some(end);
            }
            MarkupNode::Expression(e) => {
                let start = self.find("{")?;
                self.cursor = start + 1;
                self.fix_children(&mut e.children)?;
                let close = self.expect("}")?;
                e.position.start = start;
                e.position.end = Some(close + 1);
            }
            MarkupNode::Element(tag) => {
                let void = is_void_element(&tag.name);
                return self.fix_tag(tag, void);
            }
            MarkupNode::Component(tag)
            | MarkupNode::CustomElement(tag)
            | MarkupNode::Fragment(tag) => return self.fix_tag(tag, false),
        }
        Ok(Vec::new())
    }

    fn fix_children(&mut self, children: &mut Vec<MarkupNode>) -> ParseResult<()> {
        let mut i = 0;
        while i < children.len() {
            let escaped = self.fix_node(&mut children[i])?;
            children.splice(i + 1..i + 1, escaped);
            i += 1;
        }
        Ok(())
    }

    fn fix_tag(&mut self, tag: &mut TagNode, void: bool) -> ParseResult<Vec<MarkupNode>> {
        let start = self.find("<")?;
        self.cursor = start + 1;
        if !self.text[self.cursor..].starts_with(tag.name.as_str()) {
            return Err(self.error(format!("Expected tag name `{}`", tag.name), self.cursor));
        }
        self.cursor += tag.name.len();
        tag.position.start = start;

        for attr in tag.attributes.iter_mut() {
            self.fix_attribute(attr)?;
        }

        self.skip_whitespace();
        if self.text[self.cursor..].starts_with("/>") {
            self.cursor += 2;
        } else {
            self.cursor = self.find(">")? + 1;
        }
        let start_tag_end = self.cursor;
        tag.start_tag_end = Some(start_tag_end);

        let mut escaped = Vec::new();
        let mut end_tag: Option<[usize; 2]> = None;
        let lingering = is_lingering(&tag.name);

        let mut i = 0;
        while i < tag.children.len() {
            if lingering {
                if let Some(range) = self.peek_end_tag(&tag.name) {
                    let rest = tag.children.split_off(i);
                    self.cursor = range[1];
                    end_tag = Some(range);
                    if rest.iter().any(|child| !child.is_whitespace_text()) {
                        log::debug!(
                            "hoisting {} node(s) out of <{}> at {}",
                            rest.len(),
                            tag.name,
                            range[0]
                        );
                        escaped = rest
                            .into_iter()
                            .filter(|child| !child.is_whitespace_text())
                            .collect();
                    }
                    break;
                }
            }
            let more = self.fix_node(&mut tag.children[i])?;
            tag.children.splice(i + 1..i + 1, more);
            i += 1;
        }

        if end_tag.is_none() && !tag.self_closing && !void {
            if let Some(range) = self.peek_end_tag(&tag.name) {
                self.cursor = range[1];
                end_tag = Some(range);
            }
        }

        tag.end_tag_start = end_tag.map(|r| r[0]);
        let end = match end_tag {
            Some(range) => range[1],
            None => tag
                .children
                .last()
                .map_or(start_tag_end, |last| last.range()[1].max(start_tag_end)),
        };
        tag.position.end = Some(end);
        Ok(escaped)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ATTRIBUTES
    // ═══════════════════════════════════════════════════════════════════════════

    fn fix_attribute(&mut self, attr: &mut Attribute) -> ParseResult<()> {
        match attr.kind {
            AttributeKind::Shorthand | AttributeKind::Spread => {
                let start = self.find("{")?;
                self.cursor = start + 1;
                if attr.kind == AttributeKind::Spread {
                    self.expect("...")?;
                }
                let inner = self.locate(&attr.name)?;
                let range = [inner, inner + attr.name.len()];
                attr.name_range = Some(range);
                attr.value_range = Some(range);
                let close = self.expect("}")?;
                attr.position.start = start;
                attr.position.end = Some(close + 1);
            }
            AttributeKind::Empty => {
                self.fix_attribute_name(attr)?;
                attr.position.end = Some(self.cursor);
            }
            AttributeKind::Quoted => {
                self.fix_attribute_name(attr)?;
                self.expect("=")?;
                attr.position.end = Some(self.fix_quoted_value(attr)?);
            }
            AttributeKind::Expression => {
                self.fix_attribute_name(attr)?;
                self.expect("=")?;
                attr.position.end = Some(self.fix_delimited_value(attr, "{", "}")?);
            }
            AttributeKind::TemplateLiteral => {
                self.fix_attribute_name(attr)?;
                self.expect("=")?;
                attr.position.end = Some(self.fix_delimited_value(attr, "`", "`")?);
            }
        }
        Ok(())
    }

    fn fix_attribute_name(&mut self, attr: &mut Attribute) -> ParseResult<()> {
        let start = self.find(&attr.name)?;
        self.cursor = start + attr.name.len();
        attr.position.start = start;
        attr.name_range = Some([start, self.cursor]);
        Ok(())
    }

    fn fix_delimited_value(
        &mut self,
        attr: &mut Attribute,
        open: &str,
        close: &str,
    ) -> ParseResult<usize> {
        let opened = self.expect(open)?;
        let value_start = opened + open.len();
        if !self.text[value_start..].starts_with(attr.value.as_str()) {
            return Err(self.error(
                format!("Attribute `{}` value does not match source", attr.name),
                value_start,
            ));
        }
        self.cursor = value_start + attr.value.len();
        attr.value_range = Some([value_start, self.cursor]);
        let closed = self.expect(close)?;
        Ok(closed + close.len())
    }

    /// Quoted and unquoted values are stored decoded, so the source text is
    /// compared after entity decoding.
    fn fix_quoted_value(&mut self, attr: &mut Attribute) -> ParseResult<usize> {
        self.skip_whitespace();
        let (value_start, value_end, end) = match attr.quote {
            Some(q) => {
                let opened = self.expect(&q.to_string())?;
                let value_start = opened + 1;
                let value_end = self.text[value_start..]
                    .find(q)
                    .map(|i| value_start + i)
                    .ok_or_else(|| self.error("Unterminated attribute value".to_string(), opened))?;
                (value_start, value_end, value_end + 1)
            }
            None => {
                let value_start = self.cursor;
                let rest = &self.text[value_start..];
                let len = rest
                    .find(|c: char| c.is_whitespace() || c == '>')
                    .unwrap_or(rest.len());
                (value_start, value_start + len, value_start + len)
            }
        };
        let raw = &self.text[value_start..value_end];
        if raw != attr.value && decode_entities(raw) != attr.value {
            return Err(self.error(
                format!("Attribute `{}` value does not match source", attr.name),
                value_start,
            ));
        }
        attr.value_range = Some([value_start, value_end]);
        self.cursor = end;
        Ok(end)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LINE FEED REMAPPING
// ═══════════════════════════════════════════════════════════════════════════════

fn remap_node(node: &mut MarkupNode, map: &LineFeedNormalizer) {
    let position = node.position_mut();
    position.start = map.remap(position.start);
    position.end = position.end.map(|e| map.remap(e));

    if let Some(tag) = node.as_tag_mut() {
        tag.start_tag_end = tag.start_tag_end.map(|o| map.remap(o));
        tag.end_tag_start = tag.end_tag_start.map(|o| map.remap(o));
        for attr in tag.attributes.iter_mut() {
            attr.position.start = map.remap(attr.position.start);
            attr.position.end = attr.position.end.map(|e| map.remap(e));
            attr.name_range = attr.name_range.map(|[s, e]| [map.remap(s), map.remap(e)]);
            attr.value_range = attr.value_range.map(|[s, e]| [map.remap(s), map.remap(e)]);
        }
    }
    if let Some(children) = node.children_mut() {
        for child in children.iter_mut() {
            remap_node(child, map);
        }
    }
}
