//! Parse pipeline for Astro components.
//!
//! Source → corrected markup tree (cached) → virtual script → delegate
//! script parser → restore into source coordinates → scope surgery →
//! token gap filling. Everything runs synchronously inside one call; the
//! only state kept between calls is the markup cache and the parser
//! registry owned by the [`AstroParser`] instance.

use indexmap::IndexMap;
use log::debug;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;

#[cfg(feature = "napi")]
use napi_derive::napi;

use crate::cache::MarkupCache;
use crate::error::{ParseError, ParseErrorKind, ParseResult};
use crate::estree::{Comment, EsNode, Token};
use crate::fix_locations::fix_locations;
use crate::markup::{MarkupNode, MarkupParseResult, MarkupParser};
use crate::markup_parser::AstroMarkupParser;
use crate::position::{LineFeedNormalizer, PositionIndex};
use crate::restore::{restore, Restored};
use crate::scope::ScopeManager;
use crate::scope_analyze::analyze;
use crate::script::{EnhancedParseResult, ParserOptions, ParserRegistry};
use crate::tokens::fill_token_gaps;
use crate::transform::{build_virtual_script, VirtualScript};
use crate::visitor_keys;

/// Identifier every component script can use without declaring it.
pub const CONTEXT_IDENTIFIER: &str = "Astro";

// ═══════════════════════════════════════════════════════════════════════════════
// RESULT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct AstroParseResult {
    pub ast: EsNode,
    pub tokens: Vec<Token>,
    pub comments: Vec<Comment>,
    pub visitor_keys: IndexMap<String, Vec<String>>,
    pub scope_manager: ScopeManager,
    pub services: AstroServices,
}

#[derive(Debug, Clone)]
pub struct AstroServices {
    pub is_astro: bool,
    raw: Rc<MarkupParseResult>,
    /// Services handed back by an enhanced delegate, untouched.
    pub delegate: Option<Value>,
}

impl AstroServices {
    pub fn get_raw_ast(&self) -> &MarkupNode {
        &self.raw.ast
    }

    /// Shared with the markup cache; identical for repeated parses of one
    /// source while it stays cached.
    pub fn get_raw_parse_result(&self) -> Rc<MarkupParseResult> {
        Rc::clone(&self.raw)
    }
}

impl AstroParseResult {
    /// The result as ESTree-style JSON, the shape lint tooling consumes.
    pub fn to_estree_json(&self) -> Result<Value, serde_json::Error> {
        Ok(json!({
            "ast": self.ast.to_json(),
            "tokens": serde_json::to_value(&self.tokens)?,
            "comments": serde_json::to_value(&self.comments)?,
            "visitorKeys": serde_json::to_value(&self.visitor_keys)?,
            "scopeManager": serde_json::to_value(&self.scope_manager)?,
            "services": {
                "isAstro": self.services.is_astro,
                "rawAst": serde_json::to_value(&self.services.raw.ast)?,
                "diagnostics": serde_json::to_value(&self.services.raw.diagnostics)?,
                "delegate": self.services.delegate.clone().unwrap_or(Value::Null),
            },
        }))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct AstroParser {
    registry: ParserRegistry,
    markup: Box<dyn MarkupParser>,
    cache: RefCell<MarkupCache>,
}

impl Default for AstroParser {
    fn default() -> Self {
        Self::new()
    }
}

impl AstroParser {
    pub fn new() -> Self {
        Self::with_markup_parser(Box::new(AstroMarkupParser))
    }

    pub fn with_markup_parser(markup: Box<dyn MarkupParser>) -> Self {
        Self {
            registry: ParserRegistry::new(),
            markup,
            cache: RefCell::new(MarkupCache::new()),
        }
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ParserRegistry {
        &mut self.registry
    }

    /// Markup tree for `source` with every offset corrected, from the cache
    /// when the exact text was parsed recently.
    pub fn parse_markup(&self, source: &str) -> ParseResult<Rc<MarkupParseResult>> {
        let index = PositionIndex::new(source);
        self.markup_with_index(source, &index)
    }

    fn markup_with_index(&self, source: &str, index: &PositionIndex) -> ParseResult<Rc<MarkupParseResult>> {
        self.cache.borrow_mut().get_or_try_insert_with(source, || {
            let (normalized, normalizer) = LineFeedNormalizer::normalize(source);
            let mut result = self.markup.parse(&normalized).map_err(|e| {
                let offset = normalizer.remap(e.offset().min(normalized.len()));
                ParseError::from_offset(ParseErrorKind::Delegate, e.to_string(), offset, index).with_source(e)
            })?;
            fix_locations(&mut result.ast, &normalized, &normalizer, index)?;
            if !normalizer.is_identity() {
                for diagnostic in &mut result.diagnostics {
                    let position = &mut diagnostic.position;
                    position.start = normalizer.remap(position.start);
                    position.end = position.end.map(|end| normalizer.remap(end));
                }
            }
            debug!(
                "[MARKUP] Parsed {} bytes: {} top-level nodes, {} diagnostics.",
                source.len(),
                result.root_children().len(),
                result.diagnostics.len()
            );
            Ok(result)
        })
    }

    pub fn parse_for_eslint(&self, source: &str, options: &ParserOptions) -> ParseResult<AstroParseResult> {
        let index = PositionIndex::new(source);
        let raw = self.markup_with_index(source, &index)?;

        let parser = self
            .registry
            .resolve(options.parser.as_ref())
            .map_err(|message| ParseError::from_offset(ParseErrorKind::Resolution, message, 0, &index))?;

        let VirtualScript {
            code,
            map,
            callbacks,
            tokens: synthetic_tokens,
        } = build_virtual_script(source, &raw.ast, parser.dialect(), &index)?;

        let script_options = options.script_options();
        let EnhancedParseResult {
            program,
            services,
            visitor_keys,
            scope_manager,
        } = parser.parse_for_eslint(&code, &script_options).map_err(|e| {
            let offset = e.offset.map_or(0, |o| map.map_start(o.min(code.len())));
            ParseError::from_offset(ParseErrorKind::Delegate, e.message.clone(), offset, &index).with_source(e)
        })?;
        debug!(
            "[PARSE] Delegate {:?} returned {} tokens, {} comments.",
            parser,
            program.tokens.len(),
            program.comments.len()
        );

        // analysis reads node identities, which restore keeps
        let mut scope_manager = scope_manager.unwrap_or_else(|| analyze(&program.ast));

        let Restored {
            ast,
            tokens,
            comments,
            retracted,
        } = restore(program, &map, callbacks, synthetic_tokens, source, &index)?;

        scope_manager.refresh_ranges(&ast);
        for node in &retracted {
            scope_manager.remove_subtree_bindings(node);
        }
        let context = scope_manager.add_synthetic_global_binding(CONTEXT_IDENTIFIER, None);
        let from = scope_manager
            .module_scope()
            .unwrap_or_else(|| scope_manager.global_scope());
        let rebound =
            scope_manager.rebind_through_references(from, |r| r.name == CONTEXT_IDENTIFIER, context);
        debug!("[SCOPE] {} references to `{}` bound to the global.", rebound, CONTEXT_IDENTIFIER);

        let tokens = fill_token_gaps(tokens, &comments, source, &index);

        Ok(AstroParseResult {
            ast,
            tokens,
            comments,
            visitor_keys: visitor_keys::merged(visitor_keys.as_ref()),
            scope_manager,
            services: AstroServices {
                is_astro: true,
                raw,
                delegate: services,
            },
        })
    }
}

/// One-shot parse with a fresh parser instance.
pub fn parse_for_eslint(source: &str, options: &ParserOptions) -> ParseResult<AstroParseResult> {
    AstroParser::new().parse_for_eslint(source, options)
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
thread_local! {
    static NATIVE_PARSER: AstroParser = AstroParser::new();
}

#[cfg(feature = "napi")]
#[napi]
pub fn parse_for_eslint_native(code: String, options_json: Option<String>) -> napi::Result<serde_json::Value> {
    let options = ParserOptions::from_json_str(options_json.as_deref().unwrap_or_default())
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    let result = NATIVE_PARSER
        .with(|parser| parser.parse_for_eslint(&code, &options))
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    result
        .to_estree_json()
        .map_err(|e| napi::Error::from_reason(e.to_string()))
}

#[cfg(feature = "napi")]
#[napi]
pub fn parse_template_native(code: String) -> napi::Result<serde_json::Value> {
    let raw = NATIVE_PARSER
        .with(|parser| parser.parse_markup(&code))
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    serde_json::to_value(&*raw).map_err(|e| napi::Error::from_reason(e.to_string()))
}
