//! Default markup parser for component templates.
//!
//! Reports structure and start hints only. Precise offsets are derived
//! afterwards by [`crate::fix_locations`].

use crate::entities::decode_entities;
use crate::markup::{
    is_lingering, is_void_element, Attribute, AttributeKind, MarkupDiagnostic, MarkupError,
    MarkupNode, MarkupParseResult, MarkupParser, ParentNode, Position, TagNode, ValueNode,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct AstroMarkupParser;

impl MarkupParser for AstroMarkupParser {
    fn parse(&self, code: &str) -> Result<MarkupParseResult, MarkupError> {
        let mut scanner = Scanner::new(code);
        let ast = scanner.parse_document()?;
        Ok(MarkupParseResult {
            ast,
            diagnostics: scanner.diagnostics,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Element,
    Component,
    CustomElement,
    Fragment,
}

fn classify(name: &str) -> TagKind {
    if name.is_empty() || name == "Fragment" {
        TagKind::Fragment
    } else if name.starts_with(|c: char| c.is_ascii_uppercase()) || name.contains('.') {
        TagKind::Component
    } else if name.contains('-') {
        TagKind::CustomElement
    } else {
        TagKind::Element
    }
}

enum Stop {
    Eof,
    /// An end tag for an open element; left unconsumed.
    Close(String),
}

struct Scanner<'s> {
    src: &'s str,
    pos: usize,
    open: Vec<String>,
    diagnostics: Vec<MarkupDiagnostic>,
}

impl<'s> Scanner<'s> {
    fn new(src: &'s str) -> Self {
        Self {
            src,
            pos: 0,
            open: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn peek_at(&self, n: usize) -> Option<u8> {
        self.src.as_bytes().get(self.pos + n).copied()
    }

    fn advance_char(&mut self) {
        self.pos += self.rest().chars().next().map_or(1, char::len_utf8);
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn syntax(&self, message: &str, offset: usize) -> MarkupError {
        MarkupError::Syntax {
            message: message.to_string(),
            offset,
        }
    }

    fn warn_unclosed(&mut self, tag: &TagNode) {
        self.diagnostics.push(MarkupDiagnostic {
            code: "unclosed-element".to_string(),
            text: format!("<{}> has no matching end tag", tag.name),
            position: tag.position,
        });
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DOCUMENT
    // ═══════════════════════════════════════════════════════════════════════════

    fn parse_document(&mut self) -> Result<MarkupNode, MarkupError> {
        let mut children = Vec::new();
        let lead = self.src.len() - self.src.trim_start().len();
        if self.src[lead..].starts_with("---") {
            let body = lead + 3;
            let close = self
                .find_frontmatter_close(body)?
                .ok_or_else(|| self.syntax("Unterminated frontmatter", lead))?;
            children.push(MarkupNode::Frontmatter(ValueNode {
                value: self.src[body..close].to_string(),
                position: Position::at(lead),
            }));
            self.pos = close + 3;
        }
        let (rest, _) = self.parse_children()?;
        children.extend(rest);
        Ok(MarkupNode::Root(ParentNode {
            children,
            position: Position::at(0),
        }))
    }

    fn parse_children(&mut self) -> Result<(Vec<MarkupNode>, Stop), MarkupError> {
        let mut children = Vec::new();
        let mut text_start: Option<usize> = None;

        macro_rules! flush_text {
            () => {
                if let Some(start) = text_start.take() {
                    if start < self.pos {
                        children.push(MarkupNode::Text(ValueNode {
                            value: self.src[start..self.pos].to_string(),
                            position: Position::at(start),
                        }));
                    }
                }
            };
        }

        loop {
            let rest = self.rest();
            if rest.is_empty() {
                flush_text!();
                return Ok((children, Stop::Eof));
            }
            if rest.starts_with('{') {
                flush_text!();
                children.push(self.parse_expression()?);
                continue;
            }
            if rest.starts_with("<!--") {
                flush_text!();
                children.push(self.parse_comment());
                continue;
            }
            if starts_with_ignore_case(rest, "<!doctype") {
                flush_text!();
                children.push(self.parse_doctype());
                continue;
            }
            if let Some(after) = rest.strip_prefix("</") {
                let name = read_tag_name(after);
                if self.open.iter().any(|open| open == name) {
                    flush_text!();
                    if is_lingering(name) {
                        self.consume_end_tag();
                        continue;
                    }
                    return Ok((children, Stop::Close(name.to_string())));
                }
                // Stray end tag: kept as text.
                text_start.get_or_insert(self.pos);
                self.pos += 2;
                continue;
            }
            if rest.starts_with('<') && is_tag_start(&rest[1..]) {
                flush_text!();
                children.push(self.parse_element()?);
                continue;
            }
            text_start.get_or_insert(self.pos);
            self.advance_char();
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // TAGS
    // ═══════════════════════════════════════════════════════════════════════════

    fn parse_element(&mut self) -> Result<MarkupNode, MarkupError> {
        let start = self.pos;
        self.pos += 1;
        let name = read_tag_name(self.rest());
        self.pos += name.len();

        let mut tag = TagNode::new(name, start);
        self.parse_attributes(&mut tag)?;
        tag.start_tag_end = Some(self.pos);

        let kind = classify(&tag.name);
        let is_void = kind == TagKind::Element && is_void_element(&tag.name);

        if !tag.self_closing && !is_void {
            if tag.is_raw_container() {
                self.parse_raw_text(&mut tag);
            } else {
                self.open.push(tag.name.clone());
                let (children, stop) = self.parse_children()?;
                self.open.pop();
                tag.children = children;
                match stop {
                    Stop::Close(name) if name == tag.name => self.consume_end_tag(),
                    Stop::Close(_) => self.warn_unclosed(&tag),
                    Stop::Eof if is_lingering(&tag.name) => {}
                    Stop::Eof => self.warn_unclosed(&tag),
                }
            }
        }

        Ok(match kind {
            TagKind::Element => MarkupNode::Element(tag),
            TagKind::Component => MarkupNode::Component(tag),
            TagKind::CustomElement => MarkupNode::CustomElement(tag),
            TagKind::Fragment => MarkupNode::Fragment(tag),
        })
    }

    fn parse_attributes(&mut self, tag: &mut TagNode) -> Result<(), MarkupError> {
        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                return Err(self.syntax("Unterminated start tag", tag.position.start));
            }
            if rest.starts_with("/>") {
                self.pos += 2;
                tag.self_closing = true;
                return Ok(());
            }
            if rest.starts_with('>') {
                self.pos += 1;
                return Ok(());
            }

            let attr_start = self.pos;
            if rest.starts_with('{') {
                let (inner_start, inner_end) = self.read_braced()?;
                let text = &self.src[inner_start..inner_end];
                let mut attr = match text.trim_start().strip_prefix("...") {
                    Some(spread) => Attribute::new(AttributeKind::Spread, spread, ""),
                    None => Attribute::new(AttributeKind::Shorthand, text, ""),
                };
                attr.position = Position::at(attr_start);
                tag.attributes.push(attr);
                continue;
            }

            let name = read_attribute_name(rest);
            if name.is_empty() {
                self.advance_char();
                continue;
            }
            self.pos += name.len();
            let after_name = self.pos;
            self.skip_whitespace();
            if self.peek() != Some(b'=') {
                self.pos = after_name;
                let mut attr = Attribute::new(AttributeKind::Empty, name, "");
                attr.position = Position::at(attr_start);
                tag.attributes.push(attr);
                continue;
            }
            self.pos += 1;
            self.skip_whitespace();

            let mut attr = match self.peek() {
                Some(q @ (b'"' | b'\'')) => {
                    let value_start = self.pos + 1;
                    let close = self.src[value_start..]
                        .find(q as char)
                        .map(|i| value_start + i)
                        .ok_or_else(|| self.syntax("Unterminated attribute value", attr_start))?;
                    self.pos = close + 1;
                    let mut attr = Attribute::new(
                        AttributeKind::Quoted,
                        name,
                        decode_entities(&self.src[value_start..close]),
                    );
                    attr.quote = Some(q as char);
                    attr
                }
                Some(b'{') => {
                    let (inner_start, inner_end) = self.read_braced()?;
                    Attribute::new(
                        AttributeKind::Expression,
                        name,
                        &self.src[inner_start..inner_end],
                    )
                }
                Some(b'`') => {
                    let value_start = self.pos + 1;
                    self.skip_template()?;
                    Attribute::new(
                        AttributeKind::TemplateLiteral,
                        name,
                        &self.src[value_start..self.pos - 1],
                    )
                }
                _ => {
                    let value_start = self.pos;
                    while matches!(self.peek(), Some(b) if !b.is_ascii_whitespace() && b != b'>')
                    {
                        self.advance_char();
                    }
                    Attribute::new(
                        AttributeKind::Quoted,
                        name,
                        decode_entities(&self.src[value_start..self.pos]),
                    )
                }
            };
            attr.position = Position::at(attr_start);
            tag.attributes.push(attr);
        }
    }

    fn parse_raw_text(&mut self, tag: &mut TagNode) {
        let needle = format!("</{}", tag.name.to_ascii_lowercase());
        let lowered = self.rest().to_ascii_lowercase();
        match lowered.find(&needle) {
            Some(i) => {
                if i > 0 {
                    tag.children.push(MarkupNode::Text(ValueNode {
                        value: self.src[self.pos..self.pos + i].to_string(),
                        position: Position::at(self.pos),
                    }));
                }
                self.pos += i;
                self.consume_end_tag();
            }
            None => {
                if !self.rest().is_empty() {
                    tag.children.push(MarkupNode::Text(ValueNode {
                        value: self.rest().to_string(),
                        position: Position::at(self.pos),
                    }));
                }
                self.pos = self.src.len();
                self.warn_unclosed(tag);
            }
        }
    }

    fn consume_end_tag(&mut self) {
        self.pos = match self.rest().find('>') {
            Some(i) => self.pos + i + 1,
            None => self.src.len(),
        };
    }

    fn parse_comment(&mut self) -> MarkupNode {
        let start = self.pos;
        let body = start + 4;
        let (value_end, next) = match self.src[body..].find("-->") {
            Some(i) => (body + i, body + i + 3),
            None => {
                self.diagnostics.push(MarkupDiagnostic {
                    code: "unterminated-comment".to_string(),
                    text: "HTML comment is never closed".to_string(),
                    position: Position::at(start),
                });
                (self.src.len(), self.src.len())
            }
        };
        self.pos = next;
        MarkupNode::Comment(ValueNode {
            value: self.src[body..value_end].to_string(),
            position: Position::at(start),
        })
    }

    fn parse_doctype(&mut self) -> MarkupNode {
        let start = self.pos;
        let body = start + "<!doctype".len();
        let close = self.src[body..]
            .find('>')
            .map_or(self.src.len(), |i| body + i);
        self.pos = (close + 1).min(self.src.len());
        MarkupNode::Doctype(ValueNode {
            value: self.src[body..close].trim().to_string(),
            position: Position::at(start),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EXPRESSIONS
    // ═══════════════════════════════════════════════════════════════════════════

    fn parse_expression(&mut self) -> Result<MarkupNode, MarkupError> {
        let start = self.pos;
        self.pos += 1;
        // Tags inside an expression can never close tags outside it.
        let saved_open = std::mem::take(&mut self.open);
        let mut children = Vec::new();
        let mut text_start = self.pos;
        let mut depth = 0usize;
        let mut allow_tag = true;

        loop {
            let Some(b) = self.peek() else {
                return Err(self.syntax("Unterminated expression", start));
            };
            match b {
                b'}' if depth == 0 => {
                    push_code(&mut children, self.src, text_start, self.pos);
                    self.pos += 1;
                    break;
                }
                b'{' => {
                    depth += 1;
                    self.pos += 1;
                    allow_tag = true;
                }
                b'}' => {
                    depth -= 1;
                    self.pos += 1;
                    allow_tag = false;
                }
                b'"' | b'\'' => {
                    self.skip_string(b);
                    allow_tag = false;
                }
                b'`' => {
                    self.skip_template()?;
                    allow_tag = false;
                }
                b'/' if self.peek_at(1) == Some(b'/') || self.peek_at(1) == Some(b'*') => {
                    self.skip_comment();
                }
                b'<' if allow_tag && is_markup_in_expression(self.rest()) => {
                    push_code(&mut children, self.src, text_start, self.pos);
                    let node = if self.rest().starts_with("<!--") {
                        self.parse_comment()
                    } else {
                        self.parse_element()?
                    };
                    children.push(node);
                    text_start = self.pos;
                    allow_tag = true;
                }
                b if b.is_ascii_whitespace() => self.pos += 1,
                b if b.is_ascii_alphabetic() || b == b'_' || b == b'$' => {
                    let word_start = self.pos;
                    while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_' || c == b'$')
                    {
                        self.pos += 1;
                    }
                    allow_tag = matches!(
                        &self.src[word_start..self.pos],
                        "return" | "yield" | "await" | "default"
                    );
                }
                _ => {
                    allow_tag = matches!(
                        b,
                        b'(' | b',' | b'=' | b':' | b'?' | b'&' | b'|' | b'!' | b'[' | b'>' | b';'
                    );
                    self.advance_char();
                }
            }
        }

        self.open = saved_open;
        Ok(MarkupNode::Expression(ParentNode {
            children,
            position: Position::at(start),
        }))
    }

    /// At `{`: returns the inner range and leaves the cursor past `}`.
    fn read_braced(&mut self) -> Result<(usize, usize), MarkupError> {
        let start = self.pos;
        self.pos += 1;
        let inner_start = self.pos;
        self.skip_balanced(start)?;
        Ok((inner_start, self.pos - 1))
    }

    /// Skips script text up to and including the `}` that closes the current
    /// brace level.
    fn skip_balanced(&mut self, opened_at: usize) -> Result<(), MarkupError> {
        let mut depth = 0usize;
        loop {
            let Some(b) = self.peek() else {
                return Err(self.syntax("Unterminated expression", opened_at));
            };
            match b {
                b'{' => {
                    depth += 1;
                    self.pos += 1;
                }
                b'}' => {
                    self.pos += 1;
                    if depth == 0 {
                        return Ok(());
                    }
                    depth -= 1;
                }
                b'"' | b'\'' => self.skip_string(b),
                b'`' => self.skip_template()?,
                b'/' if self.peek_at(1) == Some(b'/') || self.peek_at(1) == Some(b'*') => {
                    self.skip_comment()
                }
                _ => self.advance_char(),
            }
        }
    }

    /// Offset of the closing `---`: the first fence that starts a line,
    /// outside strings, template literals and comments.
    fn find_frontmatter_close(&mut self, body: usize) -> Result<Option<usize>, MarkupError> {
        self.pos = body;
        let mut line_start = true;
        while let Some(b) = self.peek() {
            match b {
                b'-' if line_start && self.rest().starts_with("---") => return Ok(Some(self.pos)),
                b'\n' => {
                    self.pos += 1;
                    line_start = true;
                    continue;
                }
                b if b.is_ascii_whitespace() => {
                    self.pos += 1;
                    continue;
                }
                b'"' | b'\'' => self.skip_string(b),
                b'`' => self.skip_template()?,
                b'/' if self.peek_at(1) == Some(b'/') || self.peek_at(1) == Some(b'*') => {
                    self.skip_comment()
                }
                _ => self.advance_char(),
            }
            line_start = false;
        }
        Ok(None)
    }

    fn skip_string(&mut self, quote: u8) {
        self.pos += 1;
        while let Some(b) = self.peek() {
            match b {
                b'\\' => {
                    self.pos += 1;
                    if self.peek().is_some() {
                        self.advance_char();
                    }
                }
                b'\n' => return,
                _ if b == quote => {
                    self.pos += 1;
                    return;
                }
                _ => self.advance_char(),
            }
        }
    }

    fn skip_template(&mut self) -> Result<(), MarkupError> {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek() {
                None => return Err(self.syntax("Unterminated template literal", start)),
                Some(b'\\') => {
                    self.pos += 1;
                    if self.peek().is_some() {
                        self.advance_char();
                    }
                }
                Some(b'`') => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(b'$') if self.peek_at(1) == Some(b'{') => {
                    let opened = self.pos;
                    self.pos += 2;
                    self.skip_balanced(opened)?;
                }
                Some(_) => self.advance_char(),
            }
        }
    }

    fn skip_comment(&mut self) {
        if self.peek_at(1) == Some(b'/') {
            self.pos = match self.rest().find('\n') {
                Some(i) => self.pos + i,
                None => self.src.len(),
            };
        } else {
            self.pos = match self.src[self.pos + 2..].find("*/") {
                Some(i) => self.pos + 2 + i + 2,
                None => self.src.len(),
            };
        }
    }
}

fn push_code(children: &mut Vec<MarkupNode>, src: &str, start: usize, end: usize) {
    if start < end {
        children.push(MarkupNode::Text(ValueNode {
            value: src[start..end].to_string(),
            position: Position::at(start),
        }));
    }
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len()
        && text.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

fn is_tag_start(after_lt: &str) -> bool {
    after_lt.starts_with('>') || after_lt.starts_with(|c: char| c.is_ascii_alphabetic())
}

fn is_markup_in_expression(rest: &str) -> bool {
    rest.starts_with("<!--") || is_tag_start(&rest[1..])
}

fn read_tag_name(text: &str) -> &str {
    let end = text
        .find(|c: char| c.is_whitespace() || c == '/' || c == '>' || c == '{')
        .unwrap_or(text.len());
    &text[..end]
}

fn read_attribute_name(text: &str) -> &str {
    let bytes = text.as_bytes();
    let mut end = 0;
    while end < bytes.len() {
        let b = bytes[end];
        if b.is_ascii_whitespace() || b == b'=' || b == b'>' || b == b'{' {
            break;
        }
        if b == b'/' && bytes.get(end + 1) == Some(&b'>') {
            break;
        }
        end += 1;
    }
    // Names are ASCII-delimited, so `end` is on a char boundary.
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(code: &str) -> MarkupParseResult {
        AstroMarkupParser.parse(code).expect("markup should parse")
    }

    #[test]
    fn test_frontmatter_and_element() {
        let result = parse("---\nlet a = 1;\n---\n<p>{a}</p>");
        let children = result.root_children();
        assert!(matches!(&children[0], MarkupNode::Frontmatter(f) if f.value == "\nlet a = 1;\n"));
        let p = children
            .iter()
            .find_map(|c| c.as_tag())
            .expect("p element");
        assert_eq!(p.name, "p");
        assert!(matches!(&p.children[0], MarkupNode::Expression(e) if e.children.len() == 1));
    }

    #[test]
    fn test_frontmatter_fence_ignores_comments_and_strings() {
        let result = parse("---\n// ---- divider\nconst s = \"---\";\n/*\n---\n*/\nlet a = `\n---`;\n---\n<p/>");
        let children = result.root_children();
        assert!(matches!(
            &children[0],
            MarkupNode::Frontmatter(f) if f.value.ends_with("let a = `\n---`;\n")
        ));
        assert_eq!(children.iter().filter_map(|c| c.as_tag()).count(), 1);
    }

    #[test]
    fn test_frontmatter_fence_must_start_a_line() {
        let result = parse("---\nlet a = b---c;\n  ---\n<p/>");
        assert!(matches!(
            &result.root_children()[0],
            MarkupNode::Frontmatter(f) if f.value == "\nlet a = b---c;\n  "
        ));
        let err = AstroMarkupParser.parse("---\nlet a = '---';\n<p/>").unwrap_err();
        assert_eq!(err.to_string(), "Unterminated frontmatter");
    }

    #[test]
    fn test_attribute_kinds() {
        let result = parse(r#"<C a b="x &amp; y" c={1} {d} {...e} f=`g${h}` i=j />"#);
        let tag = result.root_children()[0].as_tag().unwrap();
        let kinds: Vec<_> = tag.attributes.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![
                AttributeKind::Empty,
                AttributeKind::Quoted,
                AttributeKind::Expression,
                AttributeKind::Shorthand,
                AttributeKind::Spread,
                AttributeKind::TemplateLiteral,
                AttributeKind::Quoted,
            ]
        );
        assert_eq!(tag.attributes[1].value, "x & y");
        assert_eq!(tag.attributes[4].name, "e");
        assert_eq!(tag.attributes[5].value, "g${h}");
        assert!(tag.self_closing);
        assert!(matches!(result.root_children()[0], MarkupNode::Component(_)));
    }

    #[test]
    fn test_expression_with_nested_markup() {
        let result = parse("{list.map((x) => <li>{x}</li>)}");
        let MarkupNode::Expression(expr) = &result.root_children()[0] else {
            panic!("expected expression");
        };
        assert_eq!(expr.children.len(), 3);
        assert!(matches!(&expr.children[0], MarkupNode::Text(t) if t.value == "list.map((x) => "));
        assert!(matches!(&expr.children[1], MarkupNode::Element(e) if e.name == "li"));
    }

    #[test]
    fn test_comparison_is_not_markup() {
        let result = parse("{a < b ? 1 : 2}");
        let MarkupNode::Expression(expr) = &result.root_children()[0] else {
            panic!("expected expression");
        };
        assert_eq!(expr.children.len(), 1);
    }

    #[test]
    fn test_raw_text_and_void_elements() {
        let result = parse("<script>if (a < b) {}</script><img src=\"x\"><br>");
        let children = result.root_children();
        let script = children[0].as_tag().unwrap();
        assert!(matches!(&script.children[..], [MarkupNode::Text(t)] if t.value == "if (a < b) {}"));
        assert!(children[1].as_tag().unwrap().children.is_empty());
        assert!(children[2].as_tag().unwrap().children.is_empty());
    }

    #[test]
    fn test_unclosed_element_is_diagnosed() {
        let result = parse("<section><div><p>x</p></section>");
        let section = result.root_children()[0].as_tag().unwrap();
        let div = section.children[0].as_tag().unwrap();
        assert_eq!(div.children.len(), 1);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].code, "unclosed-element");
    }

    #[test]
    fn test_content_after_body_stays_inside_body() {
        let result = parse("<html><body><p>a</p></body></html><footer/>");
        let html = result.root_children()[0].as_tag().unwrap();
        let body = html.children[0].as_tag().unwrap();
        assert_eq!(body.children.len(), 2);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_comment_and_doctype() {
        let result = parse("<!DOCTYPE html><!-- x -->");
        let children = result.root_children();
        assert!(matches!(&children[0], MarkupNode::Doctype(d) if d.value == "html"));
        assert!(matches!(&children[1], MarkupNode::Comment(c) if c.value == " x "));
    }
}
