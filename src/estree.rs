//! ESTree-shaped program model shared by the delegate parsers, the restore
//! pass and scope analysis.
//!
//! Nodes are generic: a `type` string, a range, a location and an ordered
//! map of fields. Parent links live in a [`ParentTable`] side table, never in
//! the nodes themselves.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

use crate::position::{LineColumn, PositionIndex, SourceLocation};

// ═══════════════════════════════════════════════════════════════════════════════
// NODES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

#[derive(Debug, Default)]
pub struct NodeIdGen {
    next: u32,
}

impl NodeIdGen {
    pub fn starting_after(max: NodeId) -> Self {
        Self { next: max.0 + 1 }
    }

    pub fn fresh(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Node(Box<EsNode>),
    /// Holes are kept, e.g. `[, a]`.
    Nodes(Vec<Option<EsNode>>),
    /// Anything that is not a node, including `null` child slots.
    Value(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EsNode {
    pub id: NodeId,
    pub kind: String,
    pub range: [usize; 2],
    pub loc: Option<SourceLocation>,
    pub fields: IndexMap<String, Field>,
}

impl EsNode {
    pub fn new(id: NodeId, kind: impl Into<String>, range: [usize; 2]) -> Self {
        Self {
            id,
            kind: kind.into(),
            range,
            loc: None,
            fields: IndexMap::new(),
        }
    }

    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }

    pub fn with_field(mut self, key: &str, field: Field) -> Self {
        self.fields.insert(key.to_string(), field);
        self
    }

    pub fn set(&mut self, key: &str, field: Field) {
        self.fields.insert(key.to_string(), field);
    }

    pub fn set_value(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_string(), Field::Value(value.into()));
    }

    pub fn set_node(&mut self, key: &str, node: EsNode) {
        self.fields.insert(key.to_string(), Field::Node(Box::new(node)));
    }

    /// Removes a field, keeping the order of the remaining ones.
    pub fn remove(&mut self, key: &str) -> Option<Field> {
        self.fields.shift_remove(key)
    }

    pub fn node(&self, key: &str) -> Option<&EsNode> {
        match self.fields.get(key) {
            Some(Field::Node(node)) => Some(node),
            _ => None,
        }
    }

    pub fn node_mut(&mut self, key: &str) -> Option<&mut EsNode> {
        match self.fields.get_mut(key) {
            Some(Field::Node(node)) => Some(node),
            _ => None,
        }
    }

    pub fn take_node(&mut self, key: &str) -> Option<EsNode> {
        if !matches!(self.fields.get(key), Some(Field::Node(_))) {
            return None;
        }
        match self.fields.insert(key.to_string(), Field::Value(Value::Null)) {
            Some(Field::Node(node)) => Some(*node),
            _ => None,
        }
    }

    pub fn nodes(&self, key: &str) -> Option<&Vec<Option<EsNode>>> {
        match self.fields.get(key) {
            Some(Field::Nodes(nodes)) => Some(nodes),
            _ => None,
        }
    }

    pub fn nodes_mut(&mut self, key: &str) -> Option<&mut Vec<Option<EsNode>>> {
        match self.fields.get_mut(key) {
            Some(Field::Nodes(nodes)) => Some(nodes),
            _ => None,
        }
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        match self.fields.get(key) {
            Some(Field::Value(value)) => Some(value),
            _ => None,
        }
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.value(key).and_then(Value::as_str)
    }

    pub fn bool_field(&self, key: &str) -> bool {
        self.value(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Direct child nodes in field order.
    pub fn children(&self) -> Vec<&EsNode> {
        let mut out = Vec::new();
        for field in self.fields.values() {
            match field {
                Field::Node(node) => out.push(node.as_ref()),
                Field::Nodes(nodes) => out.extend(nodes.iter().flatten()),
                Field::Value(_) => {}
            }
        }
        out
    }

    pub fn children_mut(&mut self) -> Vec<&mut EsNode> {
        let mut out = Vec::new();
        for field in self.fields.values_mut() {
            match field {
                Field::Node(node) => out.push(node.as_mut()),
                Field::Nodes(nodes) => out.extend(nodes.iter_mut().flatten()),
                Field::Value(_) => {}
            }
        }
        out
    }

    pub fn find_by_id(&self, id: NodeId) -> Option<&EsNode> {
        if self.id == id {
            return Some(self);
        }
        self.children().into_iter().find_map(|child| child.find_by_id(id))
    }

    pub fn find_by_id_mut(&mut self, id: NodeId) -> Option<&mut EsNode> {
        if self.id == id {
            return Some(self);
        }
        self.children_mut()
            .into_iter()
            .find_map(|child| child.find_by_id_mut(id))
    }

    pub fn collect_ids(&self, into: &mut HashSet<NodeId>) {
        into.insert(self.id);
        for child in self.children() {
            child.collect_ids(into);
        }
    }

    pub fn max_id(&self) -> NodeId {
        self.children()
            .into_iter()
            .map(EsNode::max_id)
            .fold(self.id, NodeId::max)
    }

    pub fn update_loc(&mut self, index: &PositionIndex) {
        self.loc = Some(index.location(self.range[0], self.range[1]));
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // JSON
    // ═══════════════════════════════════════════════════════════════════════════

    /// Imports delegate ESTree JSON. `range` is preferred over `start`/`end`;
    /// neither survives as a field.
    pub fn from_json(value: &Value, ids: &mut NodeIdGen) -> Result<EsNode, String> {
        let obj = value
            .as_object()
            .ok_or_else(|| "ESTree node must be an object".to_string())?;
        let kind = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| "ESTree node is missing `type`".to_string())?;
        let range = read_range(obj)
            .ok_or_else(|| format!("ESTree node `{}` has no range", kind))?;

        let mut node = EsNode::new(ids.fresh(), kind, range);
        for (key, field) in obj {
            if matches!(key.as_str(), "type" | "start" | "end" | "range" | "loc") {
                continue;
            }
            node.fields.insert(key.clone(), field_from_json(field, ids)?);
        }
        Ok(node)
    }

    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("type".to_string(), Value::String(self.kind.clone()));
        for (key, field) in &self.fields {
            let value = match field {
                Field::Node(node) => node.to_json(),
                Field::Nodes(nodes) => Value::Array(
                    nodes
                        .iter()
                        .map(|n| n.as_ref().map_or(Value::Null, EsNode::to_json))
                        .collect(),
                ),
                Field::Value(value) => value.clone(),
            };
            obj.insert(key.clone(), value);
        }
        obj.insert("range".to_string(), serde_json::json!(self.range));
        if let Some(loc) = &self.loc {
            obj.insert("loc".to_string(), loc_to_json(loc));
        }
        Value::Object(obj)
    }
}

fn read_range(obj: &Map<String, Value>) -> Option<[usize; 2]> {
    if let Some(Value::Array(r)) = obj.get("range") {
        if let (Some(s), Some(e)) = (r.first().and_then(Value::as_u64), r.get(1).and_then(Value::as_u64)) {
            return Some([s as usize, e as usize]);
        }
    }
    let s = obj.get("start").and_then(Value::as_u64)?;
    let e = obj.get("end").and_then(Value::as_u64)?;
    Some([s as usize, e as usize])
}

fn is_node_json(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|o| o.get("type").is_some_and(Value::is_string) && read_range(o).is_some())
}

fn field_from_json(value: &Value, ids: &mut NodeIdGen) -> Result<Field, String> {
    match value {
        v if is_node_json(v) => Ok(Field::Node(Box::new(EsNode::from_json(v, ids)?))),
        Value::Array(items)
            if items.iter().all(|item| item.is_null() || is_node_json(item))
                && items.iter().any(|item| !item.is_null()) =>
        {
            let nodes = items
                .iter()
                .map(|item| {
                    if item.is_null() {
                        Ok(None)
                    } else {
                        EsNode::from_json(item, ids).map(Some)
                    }
                })
                .collect::<Result<Vec<_>, String>>()?;
            Ok(Field::Nodes(nodes))
        }
        Value::Array(items) if items.is_empty() => Ok(Field::Nodes(Vec::new())),
        other => Ok(Field::Value(other.clone())),
    }
}

fn loc_to_json(loc: &SourceLocation) -> Value {
    serde_json::json!({
        "start": { "line": loc.start.line, "column": loc.start.column },
        "end": { "line": loc.end.line, "column": loc.end.column },
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOKENS & COMMENTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    Boolean,
    Null,
    Identifier,
    Keyword,
    Punctuator,
    Numeric,
    String,
    RegularExpression,
    Template,
    PrivateIdentifier,
    #[serde(rename = "JSXIdentifier")]
    JsxIdentifier,
    #[serde(rename = "JSXText")]
    JsxText,
    #[serde(rename = "HTMLComment")]
    HtmlComment,
    #[serde(rename = "HTMLDocType")]
    HtmlDocType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub value: String,
    pub range: [usize; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loc: Option<SourceLocation>,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>, range: [usize; 2]) -> Self {
        Self {
            kind,
            value: value.into(),
            range,
            loc: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommentKind {
    Line,
    Block,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(rename = "type")]
    pub kind: CommentKind,
    pub value: String,
    pub range: [usize; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loc: Option<SourceLocation>,
}

pub fn sort_by_start<T>(items: &mut [T], range: impl Fn(&T) -> [usize; 2]) {
    items.sort_by_key(|item| {
        let [start, end] = range(item);
        (start, end)
    });
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARENT LOOKUP
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default, Clone)]
pub struct ParentTable {
    parents: HashMap<NodeId, NodeId>,
}

impl ParentTable {
    pub fn build(root: &EsNode) -> Self {
        let mut table = Self::default();
        table.record(root);
        table
    }

    fn record(&mut self, node: &EsNode) {
        for child in node.children() {
            self.parents.insert(child.id, node.id);
            self.record(child);
        }
    }

    pub fn insert(&mut self, child: NodeId, parent: NodeId) {
        self.parents.insert(child, parent);
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(&id).copied()
    }
}

pub fn start_loc() -> SourceLocation {
    let origin = LineColumn { line: 1, column: 0 };
    SourceLocation {
        start: origin,
        end: origin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_prefers_range_and_drops_offsets() {
        let mut ids = NodeIdGen::default();
        let node = EsNode::from_json(
            &json!({
                "type": "ExpressionStatement",
                "start": 0, "end": 9, "range": [1, 8],
                "expression": {
                    "type": "ArrayExpression", "start": 1, "end": 8,
                    "elements": [null, { "type": "Identifier", "start": 4, "end": 5, "name": "a" }]
                },
                "directive": null
            }),
            &mut ids,
        )
        .unwrap();
        assert_eq!(node.range, [1, 8]);
        assert!(node.fields.get("start").is_none());
        let array = node.node("expression").unwrap();
        let elements = array.nodes("elements").unwrap();
        assert!(elements[0].is_none());
        assert_eq!(elements[1].as_ref().unwrap().str_field("name"), Some("a"));
        assert_eq!(node.value("directive"), Some(&Value::Null));
        assert_eq!(node.max_id(), NodeId(2));
    }

    #[test]
    fn test_parent_table_and_lookup() {
        let mut ids = NodeIdGen::default();
        let root = EsNode::from_json(
            &json!({ "type": "Program", "start": 0, "end": 1, "body": [
                { "type": "EmptyStatement", "start": 0, "end": 1 }
            ]}),
            &mut ids,
        )
        .unwrap();
        let table = ParentTable::build(&root);
        let child = root.nodes("body").unwrap()[0].as_ref().unwrap();
        assert_eq!(table.parent_of(child.id), Some(root.id));
        assert_eq!(root.find_by_id(child.id).map(|n| n.kind.as_str()), Some("EmptyStatement"));
    }

    #[test]
    fn test_to_json_emits_type_range_loc() {
        let mut node = EsNode::new(NodeId(0), "Identifier", [0, 1]);
        node.set_value("name", "a");
        node.loc = Some(start_loc());
        let value = node.to_json();
        assert_eq!(value["type"], "Identifier");
        assert_eq!(value["range"], json!([0, 1]));
        assert_eq!(value["loc"]["start"]["line"], 1);
    }
}
