//! Delegate script parsers and how they are selected.
//!
//! A delegate either offers a plain `parse` (program with tokens and
//! comments) or an enhanced parse that may also hand back services, visitor
//! keys and a scope graph. Both are normalized to [`EnhancedParseResult`].

use indexmap::IndexMap;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::DelegateError;
use crate::estree::{Comment, EsNode, Token};
use crate::oxc_bridge::OxcScriptParser;
use crate::scope::ScopeManager;

/// Name of the parser used when nothing else is selected.
pub const DEFAULT_PARSER: &str = "oxc";

/// Per-language keys, most specific first.
const LANGUAGE_KEYS: [&str; 4] = ["ts", "typescript", "js", "javascript"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptDialect {
    JavaScript,
    TypeScript,
}

#[derive(Debug, Clone)]
pub struct ScriptProgram {
    pub ast: EsNode,
    pub tokens: Vec<Token>,
    pub comments: Vec<Comment>,
}

#[derive(Debug)]
pub struct EnhancedParseResult {
    pub program: ScriptProgram,
    pub services: Option<Value>,
    pub visitor_keys: Option<IndexMap<String, Vec<String>>>,
    pub scope_manager: Option<ScopeManager>,
}

pub trait BasicParse {
    fn dialect(&self) -> ScriptDialect;
    fn parse(&self, code: &str, options: &ScriptParserOptions) -> Result<ScriptProgram, DelegateError>;
}

pub trait EnhancedParse {
    fn dialect(&self) -> ScriptDialect;
    fn parse_for_eslint(
        &self,
        code: &str,
        options: &ScriptParserOptions,
    ) -> Result<EnhancedParseResult, DelegateError>;
}

/// A delegate, by capability.
#[derive(Clone)]
pub enum ScriptParser {
    Basic(Rc<dyn BasicParse>),
    Enhanced(Rc<dyn EnhancedParse>),
}

impl fmt::Debug for ScriptParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptParser::Basic(p) => write!(f, "ScriptParser::Basic({:?})", p.dialect()),
            ScriptParser::Enhanced(p) => write!(f, "ScriptParser::Enhanced({:?})", p.dialect()),
        }
    }
}

impl ScriptParser {
    pub fn dialect(&self) -> ScriptDialect {
        match self {
            ScriptParser::Basic(p) => p.dialect(),
            ScriptParser::Enhanced(p) => p.dialect(),
        }
    }

    pub fn parse_for_eslint(
        &self,
        code: &str,
        options: &ScriptParserOptions,
    ) -> Result<EnhancedParseResult, DelegateError> {
        match self {
            ScriptParser::Basic(p) => Ok(EnhancedParseResult {
                program: p.parse(code, options)?,
                services: None,
                visitor_keys: None,
                scope_manager: None,
            }),
            ScriptParser::Enhanced(p) => p.parse_for_eslint(code, options),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// `parser` option: a registered name, a parser value, or a map keyed by
/// script language.
#[derive(Debug, Clone)]
pub enum ParserSelection {
    ByName(String),
    Object(ScriptParser),
    PerLanguage(IndexMap<String, ParserSelection>),
}

impl ParserSelection {
    pub fn from_json(value: &Value) -> Result<Self, String> {
        match value {
            Value::String(name) => Ok(ParserSelection::ByName(name.clone())),
            Value::Object(map) => map
                .iter()
                .map(|(lang, v)| Ok((lang.clone(), ParserSelection::from_json(v)?)))
                .collect::<Result<IndexMap<_, _>, String>>()
                .map(ParserSelection::PerLanguage),
            other => Err(format!("Unsupported `parser` option: {}", other)),
        }
    }
}

impl<'de> Deserialize<'de> for ParserSelection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        ParserSelection::from_json(&value).map_err(de::Error::custom)
    }
}

/// Options accepted by the entry point.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParserOptions {
    #[serde(default)]
    pub parser: Option<ParserSelection>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub ecma_version: Option<Value>,
    /// Accepted for compatibility; the virtual script is always a module.
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub project: Option<Value>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl ParserOptions {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json)
    }

    pub fn script_options(&self) -> ScriptParserOptions {
        ScriptParserOptions {
            ecma_version: self
                .ecma_version
                .clone()
                .unwrap_or_else(|| Value::String("latest".to_string())),
            source_type: "module".to_string(),
            jsx: true,
            file_path: self.file_path.clone(),
            project: self.project.clone(),
            extra: self.extra.clone(),
        }
    }
}

/// Options forwarded to the delegate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptParserOptions {
    pub ecma_version: Value,
    pub source_type: String,
    pub jsx: bool,
    pub file_path: Option<String>,
    pub project: Option<Value>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

/// Named delegates, owned by one pipeline instance.
pub struct ParserRegistry {
    parsers: HashMap<String, ScriptParser>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserRegistry {
    pub fn new() -> Self {
        let typescript = ScriptParser::Basic(Rc::new(OxcScriptParser::typescript()));
        let javascript = ScriptParser::Basic(Rc::new(OxcScriptParser::javascript()));
        let mut parsers = HashMap::new();
        parsers.insert(DEFAULT_PARSER.to_string(), typescript.clone());
        parsers.insert("@typescript-eslint/parser".to_string(), typescript);
        parsers.insert("espree".to_string(), javascript.clone());
        parsers.insert("oxc-js".to_string(), javascript);
        Self { parsers }
    }

    pub fn register(&mut self, name: impl Into<String>, parser: ScriptParser) {
        self.parsers.insert(name.into(), parser);
    }

    pub fn get(&self, name: &str) -> Option<&ScriptParser> {
        self.parsers.get(name)
    }

    /// Resolves a selection for the frontmatter/template script.
    pub fn resolve(&self, selection: Option<&ParserSelection>) -> Result<ScriptParser, String> {
        match selection {
            None => self.by_name(DEFAULT_PARSER),
            Some(ParserSelection::ByName(name)) => self.by_name(name),
            Some(ParserSelection::Object(parser)) => Ok(parser.clone()),
            Some(ParserSelection::PerLanguage(map)) => {
                match LANGUAGE_KEYS.iter().find_map(|lang| map.get(*lang)) {
                    Some(ParserSelection::PerLanguage(_)) => {
                        Err("Nested per-language `parser` maps are not supported".to_string())
                    }
                    Some(inner) => self.resolve(Some(inner)),
                    None => self.by_name(DEFAULT_PARSER),
                }
            }
        }
    }

    fn by_name(&self, name: &str) -> Result<ScriptParser, String> {
        self.parsers
            .get(name)
            .cloned()
            .ok_or_else(|| format!("Unknown parser `{}`", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_options_deserialize_with_pass_through() {
        let options: ParserOptions = serde_json::from_value(json!({
            "parser": { "js": "espree", "ts": "@typescript-eslint/parser" },
            "filePath": "src/pages/index.astro",
            "sourceType": "script",
            "extraFileExtensions": [".astro"]
        }))
        .unwrap();
        assert_eq!(options.file_path.as_deref(), Some("src/pages/index.astro"));
        assert!(options.extra.contains_key("extraFileExtensions"));

        let script = options.script_options();
        assert_eq!(script.source_type, "module");
        assert!(script.jsx);
        assert_eq!(script.ecma_version, json!("latest"));
    }

    #[test]
    fn test_registry_resolution_order() {
        let registry = ParserRegistry::new();
        let default = registry.resolve(None).unwrap();
        assert_eq!(default.dialect(), ScriptDialect::TypeScript);

        let by_lang = ParserSelection::from_json(&json!({ "javascript": "espree", "js": "oxc-js" }))
            .unwrap();
        let resolved = registry.resolve(Some(&by_lang)).unwrap();
        assert_eq!(resolved.dialect(), ScriptDialect::JavaScript);

        let unknown = ParserSelection::ByName("acorn".to_string());
        assert!(registry.resolve(Some(&unknown)).is_err());
    }
}
