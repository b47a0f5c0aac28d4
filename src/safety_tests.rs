//! Invariants every parse result must satisfy, whatever the input:
//! - Coverage: tokens and comments account for every non-whitespace byte
//! - Containment: children lie inside their parents
//! - Line endings: `\n`, `\r\n` and `\r` give the same tokens and node kinds
//! - Cache: repeated sources share the markup tree, never the output

use crate::estree::EsNode;
use crate::parse::AstroParseResult;
use crate::position::PositionIndex;

pub(crate) const SAMPLE: &str = r#"---
import Layout from '../layouts/Layout.astro';
const { title = 'Home' } = Astro.props;
const items = ['a', 'b'];
// note
---
<!DOCTYPE html>
<Layout title={title}>
  <!-- header -->
  <h1 class="title" data-x=1>{title}</h1>
  <ul>
    {items.map((item) => <li {item}>{item}</li>)}
  </ul>
  <img src="/a.png" alt=`${title} logo`>
  <input client:load type=text disabled>
  <p>a &amp; b > c</p>
  <style>h1 { color: red; }</style>
</Layout>
"#;

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Every non-whitespace byte is claimed by exactly one token or comment.
pub(crate) fn assert_covered(source: &str, result: &AstroParseResult) {
    let mut ranges: Vec<[usize; 2]> = result
        .tokens
        .iter()
        .map(|t| t.range)
        .chain(result.comments.iter().map(|c| c.range))
        .collect();
    ranges.sort();
    for pair in ranges.windows(2) {
        assert!(
            pair[0][1] <= pair[1][0],
            "overlapping tokens {:?} and {:?}",
            pair[0],
            pair[1]
        );
    }
    let joined: String = ranges.iter().map(|[s, e]| &source[*s..*e]).collect();
    assert_eq!(strip_whitespace(&joined), strip_whitespace(source));
}

/// Children lie inside their parents and every `loc` agrees with its range.
pub(crate) fn assert_contained(source: &str, result: &AstroParseResult) {
    let index = PositionIndex::new(source);
    check_node(&result.ast, &index);
}

fn check_node(node: &EsNode, index: &PositionIndex) {
    let [start, end] = node.range;
    assert!(start <= end, "`{}` has an inverted range {:?}", node.kind, node.range);
    let loc = node
        .loc
        .unwrap_or_else(|| panic!("`{}` at {:?} has no loc", node.kind, node.range));
    assert_eq!(loc, index.location(start, end), "`{}` loc mismatch", node.kind);
    for child in node.children() {
        assert!(
            start <= child.range[0] && child.range[1] <= end,
            "`{}` {:?} escapes its parent `{}` {:?}",
            child.kind,
            child.range,
            node.kind,
            node.range
        );
        check_node(child, index);
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::parse::AstroParser;
    use crate::script::{ParserOptions, ParserSelection};
    use crate::visitor::collect_preorder;

    fn parse(source: &str) -> AstroParseResult {
        AstroParser::new()
            .parse_for_eslint(source, &ParserOptions::default())
            .unwrap()
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // COVERAGE & CONTAINMENT
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_sample_is_fully_covered() {
        let result = parse(SAMPLE);
        assert_covered(SAMPLE, &result);
        assert_eq!(result.comments.len(), 1);
        assert_eq!(result.comments[0].value, " note");
    }

    #[test]
    fn test_sample_ranges_nest() {
        let result = parse(SAMPLE);
        assert_contained(SAMPLE, &result);
    }

    #[test]
    fn test_javascript_dialect_holds_the_same_invariants() {
        let options = ParserOptions {
            parser: Some(ParserSelection::ByName("espree".to_string())),
            ..Default::default()
        };
        let result = AstroParser::new().parse_for_eslint(SAMPLE, &options).unwrap();
        assert_covered(SAMPLE, &result);
        assert_contained(SAMPLE, &result);
    }

    #[test]
    fn test_multibyte_text_keeps_byte_offsets() {
        let source = "---\nconst é = 'ü';\n---\n<p title=\"ß\">ünïcödé {é}</p>";
        let result = parse(source);
        assert_covered(source, &result);
        assert_contained(source, &result);
        let text = collect_preorder(&result.ast)
            .into_iter()
            .find(|n| n.kind == "JSXText")
            .unwrap();
        assert_eq!(&source[text.range[0]..text.range[1]], "ünïcödé ");
    }

    #[test]
    fn test_no_synthetic_kinds_survive() {
        let result = parse(SAMPLE);
        let kinds: Vec<_> = collect_preorder(&result.ast)
            .iter()
            .map(|n| n.kind.clone())
            .collect();
        assert!(!kinds.iter().any(|k| k == "JSXFragment"));
        for expected in [
            "AstroFragment",
            "AstroHTMLComment",
            "AstroDoctype",
            "AstroShorthandAttribute",
            "AstroTemplateLiteralAttribute",
            "AstroRawText",
            "JSXNamespacedName",
        ] {
            assert!(kinds.iter().any(|k| k == expected), "missing `{}`", expected);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // LINE ENDINGS
    // ═══════════════════════════════════════════════════════════════════════════════

    fn token_text(result: &AstroParseResult) -> Vec<String> {
        result.tokens.iter().map(|t| strip_whitespace(&t.value)).collect()
    }

    fn node_kinds(result: &AstroParseResult) -> Vec<String> {
        collect_preorder(&result.ast)
            .iter()
            .map(|n| n.kind.clone())
            .collect()
    }

    #[test]
    fn test_line_endings_do_not_change_the_result() {
        let lf = parse(SAMPLE);
        for ending in ["\r\n", "\r"] {
            let source = SAMPLE.replace('\n', ending);
            let result = parse(&source);
            assert_eq!(token_text(&result), token_text(&lf), "tokens differ for {:?}", ending);
            assert_eq!(node_kinds(&result), node_kinds(&lf), "kinds differ for {:?}", ending);
            assert_covered(&source, &result);
            assert_contained(&source, &result);
        }
    }

    #[test]
    fn test_crlf_positions_point_into_original_text() {
        let source = "---\r\nlet a = 1;\r\n---\r\n<p>{a}</p>";
        let result = parse(source);
        let p = collect_preorder(&result.ast)
            .into_iter()
            .find(|n| n.kind == "JSXElement")
            .unwrap();
        assert_eq!(p.range[0], source.find("<p>").unwrap());
        let loc = p.loc.unwrap();
        assert_eq!((loc.start.line, loc.start.column), (4, 0));
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // CACHE
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_markup_tree_is_shared_but_output_is_not() {
        let parser = AstroParser::new();
        let options = ParserOptions::default();
        let mut first = parser.parse_for_eslint(SAMPLE, &options).unwrap();
        let second = parser.parse_for_eslint(SAMPLE, &options).unwrap();

        assert!(Rc::ptr_eq(
            &first.services.get_raw_parse_result(),
            &second.services.get_raw_parse_result()
        ));

        first.ast.kind = "Mutated".to_string();
        first.tokens.clear();
        assert_eq!(second.ast.kind, "Program");
        assert!(!second.tokens.is_empty());

        let other = parser.parse_for_eslint("<p/>", &options).unwrap();
        assert!(!Rc::ptr_eq(
            &other.services.get_raw_parse_result(),
            &second.services.get_raw_parse_result()
        ));
    }

    #[test]
    fn test_markup_errors_are_positioned() {
        let err = AstroParser::new()
            .parse_markup("<p>\r\n{unterminated")
            .unwrap_err();
        assert_eq!(err.kind, crate::error::ParseErrorKind::Delegate);
        assert_eq!(err.line_number, 2);
    }
}
