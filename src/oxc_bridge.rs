//! Built-in delegate backed by `oxc_parser`.
//!
//! The program is serialized to ESTree JSON and imported into [`EsNode`]s.
//! oxc does not expose its token stream, so tokens are derived: AST leaves
//! (identifiers, literals, template chunks, JSX names and text) give the
//! tokens whose lexing depends on context, and the remaining gaps are
//! scanned for keywords, names and punctuators.

use lazy_static::lazy_static;
use log::debug;
use oxc_allocator::Allocator;
use oxc_parser::{ParseOptions, Parser};
use oxc_span::SourceType;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

use crate::error::DelegateError;
use crate::estree::{sort_by_start, Comment, CommentKind, EsNode, NodeIdGen, Token, TokenKind};
use crate::script::{BasicParse, ScriptDialect, ScriptParserOptions, ScriptProgram};

lazy_static! {
    static ref WORD: Regex = Regex::new(r"^[\p{L}\p{Nl}_$][\p{L}\p{Nl}\p{Mn}\p{Mc}\p{Nd}\p{Pc}_$\x{200C}\x{200D}]*").unwrap();
    static ref NUMBER: Regex = Regex::new(r"^(?:\.\d|\d)[\w.]*").unwrap();

    static ref KEYWORDS: HashSet<&'static str> = [
        "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default",
        "delete", "do", "else", "enum", "export", "extends", "finally", "for", "function", "if",
        "import", "in", "instanceof", "let", "new", "return", "static", "super", "switch", "this",
        "throw", "try", "typeof", "var", "void", "while", "with", "yield",
    ]
    .into_iter()
    .collect();

    /// Longest first, so a prefix scan picks the longest match.
    static ref PUNCTUATORS: Vec<&'static str> = {
        let mut p = vec![
            ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=",
            "=>", "==", "!=", "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=",
            "/=", "%=", "&=", "|=", "^=", "<<", ">>", "**",
            "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-", "*", "/", "%", "&",
            "|", "^", "!", "~", "?", ":", "=", ".", "@", "#",
        ];
        p.sort_by_key(|s| std::cmp::Reverse(s.len()));
        p
    };
}

pub struct OxcScriptParser {
    dialect: ScriptDialect,
}

impl OxcScriptParser {
    pub fn typescript() -> Self {
        Self {
            dialect: ScriptDialect::TypeScript,
        }
    }

    pub fn javascript() -> Self {
        Self {
            dialect: ScriptDialect::JavaScript,
        }
    }

    fn is_typescript(&self) -> bool {
        self.dialect == ScriptDialect::TypeScript
    }
}

impl BasicParse for OxcScriptParser {
    fn dialect(&self) -> ScriptDialect {
        self.dialect
    }

    fn parse(&self, code: &str, options: &ScriptParserOptions) -> Result<ScriptProgram, DelegateError> {
        let allocator = Allocator::default();
        let source_type = if self.is_typescript() {
            SourceType::tsx()
        } else {
            SourceType::jsx()
        };
        let ret = Parser::new(&allocator, code, source_type)
            .with_options(ParseOptions {
                allow_return_outside_function: true,
                preserve_parens: false,
                ..ParseOptions::default()
            })
            .parse();

        if let Some(diagnostic) = ret.errors.first() {
            let offset = diagnostic
                .labels
                .as_ref()
                .and_then(|labels| labels.first())
                .map(|label| label.offset());
            return Err(DelegateError::new(diagnostic.message.to_string(), offset));
        }

        let json = if self.is_typescript() {
            ret.program.to_estree_ts_json(true)
        } else {
            ret.program.to_estree_js_json(true)
        };
        let value: Value = serde_json::from_str(&json)
            .map_err(|e| DelegateError::new(format!("Invalid ESTree output: {}", e), None))?;
        let mut ids = NodeIdGen::default();
        let ast = EsNode::from_json(&value, &mut ids).map_err(|e| DelegateError::new(e, None))?;

        let comments: Vec<Comment> = ret
            .program
            .comments
            .iter()
            .map(|comment| {
                let (start, end) = (comment.span.start as usize, comment.span.end as usize);
                let (kind, inner) = if comment.is_line() {
                    (CommentKind::Line, [start + 2, end])
                } else {
                    (CommentKind::Block, [start + 2, end.saturating_sub(2).max(start + 2)])
                };
                Comment {
                    kind,
                    value: code.get(inner[0]..inner[1]).unwrap_or_default().to_string(),
                    range: [start, end],
                    loc: None,
                }
            })
            .collect();

        let tokens = tokenize(code, &ast, &comments, self.is_typescript());
        debug!(
            "[OXC] Parsed {} bytes for {:?}: {} tokens, {} comments.",
            code.len(),
            options.file_path,
            tokens.len(),
            comments.len()
        );
        Ok(ScriptProgram {
            ast,
            tokens,
            comments,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOKENS
// ═══════════════════════════════════════════════════════════════════════════════

pub(crate) fn tokenize(code: &str, ast: &EsNode, comments: &[Comment], typescript: bool) -> Vec<Token> {
    let mut leaves = Vec::new();
    collect_leaf_tokens(code, ast, typescript, &mut leaves);
    sort_by_start(&mut leaves, |t| t.range);
    leaves.dedup_by(|a, b| a.range[0] < b.range[1]);

    let mut occupied: Vec<[usize; 2]> = leaves
        .iter()
        .map(|t| t.range)
        .chain(comments.iter().map(|c| c.range))
        .collect();
    occupied.sort();

    let mut tokens = leaves;
    let mut cursor = 0;
    for [start, end] in occupied {
        if start > cursor {
            scan_gap(code, cursor, start, &mut tokens);
        }
        cursor = cursor.max(end);
    }
    if cursor < code.len() {
        scan_gap(code, cursor, code.len(), &mut tokens);
    }
    sort_by_start(&mut tokens, |t| t.range);
    tokens
}

fn collect_leaf_tokens(code: &str, node: &EsNode, typescript: bool, out: &mut Vec<Token>) {
    let slice = |[s, e]: [usize; 2]| code.get(s..e).unwrap_or_default().to_string();
    match node.kind.as_str() {
        "Identifier" => {
            let name_len = node.str_field("name").map_or(0, str::len);
            let [start, end] = node.range;
            // typed identifiers span their annotation
            let range = if end - start > name_len && node.fields.contains_key("typeAnnotation") {
                [start, start + name_len]
            } else {
                node.range
            };
            out.push(Token::new(TokenKind::Identifier, slice(range), range));
        }
        "PrivateIdentifier" => out.push(Token::new(TokenKind::PrivateIdentifier, slice(node.range), node.range)),
        "JSXIdentifier" => out.push(Token::new(TokenKind::JsxIdentifier, slice(node.range), node.range)),
        "JSXText" => out.push(Token::new(TokenKind::JsxText, slice(node.range), node.range)),
        "Literal" => {
            let kind = if node.value("regex").is_some_and(|r| !r.is_null()) {
                TokenKind::RegularExpression
            } else {
                match node.value("value") {
                    Some(Value::String(_)) => TokenKind::String,
                    Some(Value::Bool(_)) => TokenKind::Boolean,
                    Some(Value::Number(_)) => TokenKind::Numeric,
                    _ if node.value("bigint").is_some_and(|b| !b.is_null()) => TokenKind::Numeric,
                    _ => TokenKind::Null,
                }
            };
            out.push(Token::new(kind, slice(node.range), node.range));
        }
        "TemplateElement" => {
            let [start, end] = node.range;
            let range = if typescript {
                node.range
            } else {
                let tail = node.bool_field("tail");
                [start.saturating_sub(1), (end + if tail { 1 } else { 2 }).min(code.len())]
            };
            out.push(Token::new(TokenKind::Template, slice(range), range));
        }
        _ => {}
    }
    for child in node.children() {
        collect_leaf_tokens(code, child, typescript, out);
    }
}

fn scan_gap(code: &str, start: usize, end: usize, out: &mut Vec<Token>) {
    let mut pos = start;
    while pos < end {
        let rest = &code[pos..end];
        let Some(c) = rest.chars().next() else { break };
        if c.is_whitespace() {
            pos += c.len_utf8();
            continue;
        }
        let (kind, len) = if let Some(m) = WORD.find(rest) {
            let word = m.as_str();
            let kind = match word {
                "true" | "false" => TokenKind::Boolean,
                "null" => TokenKind::Null,
                w if KEYWORDS.contains(w) => TokenKind::Keyword,
                _ => TokenKind::Identifier,
            };
            (kind, m.end())
        } else if let Some(m) = NUMBER.find(rest) {
            (TokenKind::Numeric, m.end())
        } else if let Some(p) = PUNCTUATORS.iter().find(|p| rest.starts_with(**p)) {
            (TokenKind::Punctuator, p.len())
        } else {
            (TokenKind::Punctuator, c.len_utf8())
        };
        out.push(Token::new(kind, &rest[..len], [pos, pos + len]));
        pos += len;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(code: &str, typescript: bool) -> ScriptProgram {
        let parser = if typescript {
            OxcScriptParser::typescript()
        } else {
            OxcScriptParser::javascript()
        };
        let options = crate::script::ParserOptions::default().script_options();
        parser.parse(code, &options).unwrap()
    }

    fn values(program: &ScriptProgram) -> Vec<&str> {
        program.tokens.iter().map(|t| t.value.as_str()).collect()
    }

    #[test]
    fn test_program_shape_and_ranges() {
        let program = parse("let a = 1;\n<p>{a}</p>;", false);
        assert_eq!(program.ast.kind, "Program");
        let body = program.ast.nodes("body").unwrap();
        assert_eq!(body.len(), 2);
        let decl = body[0].as_ref().unwrap();
        assert_eq!(decl.kind, "VariableDeclaration");
        assert_eq!(decl.range, [0, 10]);
        let jsx = body[1].as_ref().unwrap().node("expression").unwrap();
        assert_eq!(jsx.kind, "JSXElement");
    }

    #[test]
    fn test_tokens_cover_code() {
        let program = parse("const s = `a${b}c` + /x/g; // hi\n<a b=\"c\">t</a>", false);
        assert_eq!(
            values(&program),
            vec![
                "const", "s", "=", "`a${", "b", "}c`", "+", "/x/g", ";", "<", "a", "b", "=",
                "\"c\"", ">", "t", "<", "/", "a", ">"
            ]
        );
        assert_eq!(program.comments.len(), 1);
        assert_eq!(program.comments[0].value, " hi");
        assert_eq!(program.tokens[0].kind, TokenKind::Keyword);
    }

    #[test]
    fn test_typescript_annotations_do_not_swallow_names() {
        let program = parse("declare const Astro: any;", true);
        assert_eq!(values(&program), vec!["declare", "const", "Astro", ":", "any", ";"]);
    }

    #[test]
    fn test_syntax_error_carries_offset() {
        let parser = OxcScriptParser::javascript();
        let options = crate::script::ParserOptions::default().script_options();
        let err = parser.parse("let = ;", &options).unwrap_err();
        assert!(err.offset.is_some());
    }
}
