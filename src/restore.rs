//! Restore pass: brings the delegate's output back into source coordinates.
//!
//! Pass 1 remaps every node range through the [`OffsetMap`]. Pass 2 walks the
//! tree pre-order and offers each node to every pending [`RestoreCallback`];
//! a callback that returns `true` has handled its node and is retired.
//! Tokens and comments are remapped afterwards, synthetic tokens spliced in
//! and queued removals applied.

use log::{debug, warn};

use crate::error::{ParseError, ParseResult};
use crate::estree::{
    sort_by_start, Comment, EsNode, NodeId, NodeIdGen, ParentTable, Token, TokenKind,
};
use crate::position::{PositionIndex, SourceLocation};
use crate::script::ScriptProgram;
use crate::virtual_script::OffsetMap;
use crate::visitor::{walk_node_mut, VisitorMut};

type RestoreFn = dyn FnMut(&mut EsNode, &mut RestoreContext<'_>) -> bool;

/// Deferred relabeling of one synthetic construct.
pub struct RestoreCallback {
    pub label: &'static str,
    /// Original offset of the construct, for error reporting.
    pub anchor: usize,
    /// Failing to match a required callback is an internal error.
    pub required: bool,
    run: Box<RestoreFn>,
}

impl RestoreCallback {
    pub fn new<F>(label: &'static str, anchor: usize, run: F) -> Self
    where
        F: FnMut(&mut EsNode, &mut RestoreContext<'_>) -> bool + 'static,
    {
        Self {
            label,
            anchor,
            required: false,
            run: Box::new(run),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

impl std::fmt::Debug for RestoreCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestoreCallback")
            .field("label", &self.label)
            .field("anchor", &self.anchor)
            .field("required", &self.required)
            .finish()
    }
}

/// What a callback may read and queue while it runs.
pub struct RestoreContext<'s> {
    pub source: &'s str,
    pub index: &'s PositionIndex,
    parents: ParentTable,
    root_id: NodeId,
    ids: NodeIdGen,
    token_removals: Vec<(TokenKind, [usize; 2])>,
    added_tokens: Vec<Token>,
    retracted: Vec<EsNode>,
}

impl<'s> RestoreContext<'s> {
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.parents.parent_of(id)
    }

    /// Direct child of `Program`.
    pub fn is_top_level(&self, id: NodeId) -> bool {
        self.parent_of(id) == Some(self.root_id)
    }

    pub fn slice(&self, [start, end]: [usize; 2]) -> &'s str {
        self.source.get(start..end).unwrap_or_default()
    }

    pub fn location(&self, [start, end]: [usize; 2]) -> SourceLocation {
        self.index.location(start, end)
    }

    pub fn fresh_id(&mut self) -> NodeId {
        self.ids.fresh()
    }

    /// Queues removal of one token with exactly this kind and range.
    pub fn remove_token(&mut self, kind: TokenKind, range: [usize; 2]) {
        self.token_removals.push((kind, range));
    }

    pub fn add_token(&mut self, kind: TokenKind, range: [usize; 2]) {
        let value = self.slice(range).to_string();
        self.added_tokens.push(Token::new(kind, value, range));
    }

    /// Keeps a node that was cut out of the tree, so its scope bindings can
    /// be removed afterwards.
    pub fn retract(&mut self, node: EsNode) {
        self.retracted.push(node);
    }
}

#[derive(Debug)]
pub struct Restored {
    pub ast: EsNode,
    pub tokens: Vec<Token>,
    pub comments: Vec<Comment>,
    /// Nodes removed from the tree by callbacks.
    pub retracted: Vec<EsNode>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINT
// ═══════════════════════════════════════════════════════════════════════════════

pub fn restore(
    program: ScriptProgram,
    map: &OffsetMap,
    callbacks: Vec<RestoreCallback>,
    synthetic_tokens: Vec<Token>,
    source: &str,
    index: &PositionIndex,
) -> ParseResult<Restored> {
    let ScriptProgram {
        ast: mut root,
        tokens,
        comments,
    } = program;

    remap_ranges(&mut root, map);

    let mut ctx = RestoreContext {
        source,
        index,
        parents: ParentTable::build(&root),
        root_id: root.id,
        ids: NodeIdGen::starting_after(root.max_id()),
        token_removals: Vec::new(),
        added_tokens: Vec::new(),
        retracted: Vec::new(),
    };
    let mut visitor = RestoreVisitor {
        pending: callbacks,
        ctx: &mut ctx,
    };
    visitor.visit_node(&mut root);
    let pending = visitor.pending;

    for callback in &pending {
        if callback.required {
            return Err(ParseError::internal(
                format!("Expected node for `{}` was not produced", callback.label),
                callback.anchor,
                index,
            ));
        }
        warn!(
            "[RESTORE] Callback `{}` at {} matched no node.",
            callback.label, callback.anchor
        );
    }

    assign_locations(&mut root, index);

    let mut tokens: Vec<Token> = tokens
        .into_iter()
        .filter(|token| map.injected_anchor(token.range).is_none())
        .map(|mut token| {
            token.range = map.remap_range(token.range);
            token.value = source
                .get(token.range[0]..token.range[1])
                .unwrap_or_default()
                .to_string();
            token
        })
        .collect();
    tokens.extend(synthetic_tokens);
    tokens.append(&mut ctx.added_tokens);
    sort_by_start(&mut tokens, |t| t.range);
    for (kind, range) in ctx.token_removals.drain(..) {
        if let Some(i) = tokens.iter().position(|t| t.kind == kind && t.range == range) {
            tokens.remove(i);
        }
    }
    for token in tokens.iter_mut() {
        token.loc = Some(index.location(token.range[0], token.range[1]));
    }

    let mut comments: Vec<Comment> = comments
        .into_iter()
        .map(|mut comment| {
            comment.range = map.remap_range(comment.range);
            comment.loc = Some(index.location(comment.range[0], comment.range[1]));
            comment
        })
        .collect();
    sort_by_start(&mut comments, |c| c.range);

    adjust_program_range(&mut root, &tokens, &comments, index);

    debug!(
        "[RESTORE] {} tokens, {} comments, {} retracted nodes.",
        tokens.len(),
        comments.len(),
        ctx.retracted.len()
    );
    Ok(Restored {
        ast: root,
        tokens,
        comments,
        retracted: ctx.retracted,
    })
}

struct RestoreVisitor<'c, 's> {
    pending: Vec<RestoreCallback>,
    ctx: &'c mut RestoreContext<'s>,
}

impl VisitorMut for RestoreVisitor<'_, '_> {
    fn visit_node(&mut self, node: &mut EsNode) {
        let Self { pending, ctx } = self;
        pending.retain_mut(|callback| !(callback.run)(&mut *node, &mut **ctx));
        walk_node_mut(self, node);
    }
}

fn remap_ranges(node: &mut EsNode, map: &OffsetMap) {
    node.range = map.remap_range(node.range);
    for child in node.children_mut() {
        remap_ranges(child, map);
    }
}

fn assign_locations(node: &mut EsNode, index: &PositionIndex) {
    node.update_loc(index);
    for child in node.children_mut() {
        assign_locations(child, index);
    }
}

/// Leading trivia before the first statement still belongs to the program,
/// and so does anything a callback widened past the nominal end.
fn adjust_program_range(
    root: &mut EsNode,
    tokens: &[Token],
    comments: &[Comment],
    index: &PositionIndex,
) {
    let first_statement = root
        .nodes("body")
        .and_then(|body| body.iter().flatten().next())
        .map(|n| n.range[0]);
    let start = [
        first_statement,
        tokens.first().map(|t| t.range[0]),
        comments.first().map(|c| c.range[0]),
    ]
    .into_iter()
    .flatten()
    .min();
    let end = [
        root.nodes("body")
            .and_then(|body| body.iter().flatten().last())
            .map(|n| n.range[1]),
        tokens.iter().map(|t| t.range[1]).max(),
        comments.last().map(|c| c.range[1]),
    ]
    .into_iter()
    .flatten()
    .fold(root.range[1], usize::max);
    root.range = [start.unwrap_or(root.range[0]).min(end), end];
    root.update_loc(index);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estree::{CommentKind, Field};
    use crate::virtual_script::VirtualScriptBuilder;

    fn statement(ids: &mut NodeIdGen, range: [usize; 2]) -> EsNode {
        let literal = EsNode::new(ids.fresh(), "Literal", range);
        EsNode::new(ids.fresh(), "ExpressionStatement", range)
            .with_field("expression", Field::Node(Box::new(literal)))
    }

    #[test]
    fn test_callbacks_run_once_and_see_remapped_ranges() {
        // original "<!-- a -->" rendered as "0;"
        let source = "<!-- a -->";
        let mut builder = VirtualScriptBuilder::new(source);
        builder.append_virtual("0;");
        builder.skip_until(source.len());
        let (_, map) = builder.finish();

        let mut ids = NodeIdGen::default();
        let stmt = statement(&mut ids, [0, 2]);
        let root = EsNode::new(ids.fresh(), "Program", [0, 2])
            .with_field("body", Field::Nodes(vec![Some(stmt)]));
        let program = ScriptProgram {
            ast: root,
            tokens: vec![
                Token::new(TokenKind::Numeric, "0", [0, 1]),
                Token::new(TokenKind::Punctuator, ";", [1, 2]),
            ],
            comments: vec![],
        };

        let mut hits = 0;
        let callback = RestoreCallback::new("comment", 0, move |node, ctx| {
            if !(node.is("ExpressionStatement") && node.range == [0, 0]) {
                return false;
            }
            hits += 1;
            assert_eq!(hits, 1);
            assert!(ctx.is_top_level(node.id));
            node.kind = "AstroHTMLComment".to_string();
            node.remove("expression");
            node.range = [0, 10];
            ctx.add_token(TokenKind::HtmlComment, [0, 10]);
            true
        })
        .required();

        let index = PositionIndex::new(source);
        let restored = restore(program, &map, vec![callback], vec![], source, &index).unwrap();
        let body = restored.ast.nodes("body").unwrap();
        let comment = body[0].as_ref().unwrap();
        assert_eq!(comment.kind, "AstroHTMLComment");
        assert!(comment.node("expression").is_none());
        // placeholder tokens are dropped, the synthetic one stays
        assert_eq!(restored.tokens.len(), 1);
        assert_eq!(restored.tokens[0].value, "<!-- a -->");
        assert_eq!(restored.ast.range, [0, 10]);
    }

    #[test]
    fn test_unmatched_required_callback_is_an_internal_error() {
        let source = "a";
        let (_, map) = {
            let mut b = VirtualScriptBuilder::new(source);
            b.append_original(1);
            b.finish()
        };
        let mut ids = NodeIdGen::default();
        let root = EsNode::new(ids.fresh(), "Program", [0, 1])
            .with_field("body", Field::Nodes(vec![]));
        let program = ScriptProgram {
            ast: root,
            tokens: vec![],
            comments: vec![],
        };
        let callback = RestoreCallback::new("fragment", 0, |_, _| false).required();
        let index = PositionIndex::new(source);
        let err = restore(program, &map, vec![callback], vec![], source, &index).unwrap_err();
        assert_eq!(err.kind, crate::error::ParseErrorKind::Internal);
    }

    #[test]
    fn test_removals_consume_one_token_each_and_comments_are_remapped() {
        let source = "<a>//x\n";
        let mut b = VirtualScriptBuilder::new(source);
        b.append_virtual("<>");
        b.append_original(source.len());
        let (_, map) = b.finish();
        let mut ids = NodeIdGen::default();
        let root = EsNode::new(ids.fresh(), "Program", [0, 9])
            .with_field("body", Field::Nodes(vec![]));
        let program = ScriptProgram {
            ast: root,
            tokens: vec![
                Token::new(TokenKind::Punctuator, "<", [2, 3]),
                Token::new(TokenKind::JsxIdentifier, "a", [3, 4]),
                Token::new(TokenKind::Punctuator, ">", [4, 5]),
            ],
            comments: vec![Comment {
                kind: CommentKind::Line,
                value: "x".to_string(),
                range: [5, 8],
                loc: None,
            }],
        };
        let callback = RestoreCallback::new("drop", 0, |node, ctx| {
            if node.is("Program") {
                ctx.remove_token(TokenKind::Punctuator, [0, 1]);
                ctx.remove_token(TokenKind::Punctuator, [0, 1]);
            }
            true
        });
        let index = PositionIndex::new(source);
        let restored = restore(program, &map, vec![callback], vec![], source, &index).unwrap();
        let values: Vec<_> = restored.tokens.iter().map(|t| t.value.as_str()).collect();
        assert_eq!(values, vec!["a", ">"]);
        assert_eq!(restored.comments[0].range, [3, 6]);
        assert_eq!(restored.ast.range[0], 1);
    }
}
