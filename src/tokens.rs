//! Gap filling for the final token list.
//!
//! Whatever source text no token or comment claims after restore gets one
//! token per non-whitespace character, so the token stream covers the
//! whole document.

use log::debug;

use crate::estree::{sort_by_start, Comment, Token, TokenKind};
use crate::position::PositionIndex;

pub fn fill_token_gaps(tokens: Vec<Token>, comments: &[Comment], text: &str, index: &PositionIndex) -> Vec<Token> {
    let mut occupied: Vec<[usize; 2]> = tokens
        .iter()
        .map(|t| t.range)
        .chain(comments.iter().map(|c| c.range))
        .collect();
    occupied.sort();

    let before = tokens.len();
    let mut filled = tokens;
    let mut cursor = 0;
    for [start, end] in occupied {
        if start > cursor {
            scan_gap(text, cursor, start, index, &mut filled);
        }
        cursor = cursor.max(end);
    }
    if cursor < text.len() {
        scan_gap(text, cursor, text.len(), index, &mut filled);
    }

    if filled.len() > before {
        debug!("[TOKENS] Filled {} uncovered characters.", filled.len() - before);
        sort_by_start(&mut filled, |t| t.range);
    }
    filled
}

fn scan_gap(text: &str, start: usize, end: usize, index: &PositionIndex, out: &mut Vec<Token>) {
    let Some(gap) = text.get(start..end) else {
        return;
    };
    for (i, c) in gap.char_indices() {
        if c.is_whitespace() {
            continue;
        }
        let kind = if c.is_alphanumeric() || c == '_' || c == '$' {
            TokenKind::Identifier
        } else {
            TokenKind::Punctuator
        };
        let range = [start + i, start + i + c.len_utf8()];
        let mut token = Token::new(kind, c.to_string(), range);
        token.loc = Some(index.location(range[0], range[1]));
        out.push(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estree::CommentKind;

    #[test]
    fn test_uncovered_characters_become_tokens() {
        let text = "ab @x /*c*/ #";
        let index = PositionIndex::new(text);
        let tokens = vec![Token::new(TokenKind::Identifier, "ab", [0, 2])];
        let comments = vec![Comment {
            kind: CommentKind::Block,
            value: "c".to_string(),
            range: [6, 11],
            loc: None,
        }];
        let filled = fill_token_gaps(tokens, &comments, text, &index);
        let summary: Vec<_> = filled.iter().map(|t| (t.kind, t.value.as_str())).collect();
        assert_eq!(
            summary,
            vec![
                (TokenKind::Identifier, "ab"),
                (TokenKind::Punctuator, "@"),
                (TokenKind::Identifier, "x"),
                (TokenKind::Punctuator, "#"),
            ]
        );
        assert_eq!(filled[3].range, [12, 13]);
        assert!(filled[3].loc.is_some());
    }

    #[test]
    fn test_fully_covered_text_is_untouched() {
        let text = "a b";
        let index = PositionIndex::new(text);
        let tokens = vec![
            Token::new(TokenKind::Identifier, "a", [0, 1]),
            Token::new(TokenKind::Identifier, "b", [2, 3]),
        ];
        assert_eq!(fill_token_gaps(tokens.clone(), &[], text, &index), tokens);
    }
}
