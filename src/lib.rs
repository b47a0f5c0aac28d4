//! # astro-estree
//!
//! Parses Astro components (`.astro`) into one ESTree-compatible program for
//! lint tooling: frontmatter statements and template markup in a single
//! tree, with a complete token list, comments, visitor keys and a scope
//! graph, all positioned in the original source.
//!
//! ## Pipeline
//!
//! 1. The markup parser builds a tree of tags, attributes, text, comments and
//!    `{}` expressions; the offset corrector recomputes
//!    every offset against the source.
//! 2. The tree is written out as a virtual JSX script, with an offset map
//!    and restore callbacks for every construct JSX cannot express.
//! 3. A delegate script parser (oxc by default) parses the virtual script.
//! 4. Restore maps the result back into source coordinates and relabels the
//!    synthetic nodes (`AstroFragment`, `AstroHTMLComment`, ...).
//! 5. The scope graph drops bindings that only existed for parsing, `Astro`
//!    becomes a global, and uncovered source characters get tokens.

#[cfg(feature = "napi")]
use napi_derive::napi;

pub mod cache;
mod entities;
pub mod error;
pub mod estree;
mod fix_locations;
pub mod markup;
mod markup_parser;
pub mod markup_worker;
mod oxc_bridge;
mod parse;
pub mod position;
mod restore;
pub mod scope;
mod scope_analyze;
pub mod script;
mod tokens;
mod transform;
mod virtual_script;
pub mod visitor;
pub mod visitor_keys;

#[cfg(test)]
mod fixture_tests;
#[cfg(test)]
mod safety_tests;

pub use error::{DelegateError, ParseError, ParseErrorKind, ParseResult};
pub use estree::{Comment, CommentKind, EsNode, Field, NodeId, Token, TokenKind};
pub use markup::{MarkupError, MarkupNode, MarkupParseResult, MarkupParser};
pub use markup_parser::AstroMarkupParser;
pub use markup_worker::WorkerMarkupParser;
pub use oxc_bridge::OxcScriptParser;
pub use parse::{parse_for_eslint, AstroParseResult, AstroParser, AstroServices, CONTEXT_IDENTIFIER};
pub use position::{LineColumn, PositionIndex, SourceLocation};
pub use scope::ScopeManager;
pub use scope_analyze::analyze as analyze_scopes;
pub use script::{
    BasicParse, EnhancedParse, EnhancedParseResult, ParserOptions, ParserRegistry, ParserSelection,
    ScriptDialect, ScriptParser, ScriptParserOptions, ScriptProgram,
};

#[cfg(feature = "napi")]
pub use parse::{parse_for_eslint_native, parse_template_native};

#[cfg(feature = "napi")]
#[napi]
pub fn astro_estree_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
