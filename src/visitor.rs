use crate::estree::{EsNode, Field};
use crate::visitor_keys::keys_for;

/// Read-only traversal over an ESTree program.
///
/// Rules:
/// 1. Traversal is pre-order, children in visitor-key order.
/// 2. Implementers override `enter`/`leave` to add behavior.
/// 3. Returning `false` from `enter` prunes the subtree.
pub trait Visitor {
    fn enter(&mut self, _node: &EsNode, _parent: Option<&EsNode>) -> bool {
        true
    }

    fn leave(&mut self, _node: &EsNode, _parent: Option<&EsNode>) {}
}

/// Mutable pre-order traversal. `visit_node` may replace the node's kind and
/// fields before its children are walked; `walk_node` then descends into
/// whatever children the node has at that point.
pub trait VisitorMut {
    fn visit_node(&mut self, node: &mut EsNode) {
        walk_node_mut(self, node);
    }
}

pub fn walk<V: Visitor + ?Sized>(visitor: &mut V, root: &EsNode) {
    walk_inner(visitor, root, None);
}

fn walk_inner<V: Visitor + ?Sized>(visitor: &mut V, node: &EsNode, parent: Option<&EsNode>) {
    if !visitor.enter(node, parent) {
        return;
    }
    for key in keys_for(node) {
        match node.fields.get(&key) {
            Some(Field::Node(child)) => walk_inner(visitor, child, Some(node)),
            Some(Field::Nodes(children)) => {
                for child in children.iter().flatten() {
                    walk_inner(visitor, child, Some(node));
                }
            }
            _ => {}
        }
    }
    visitor.leave(node, parent);
}

pub fn walk_node_mut<V: VisitorMut + ?Sized>(visitor: &mut V, node: &mut EsNode) {
    for key in keys_for(node) {
        match node.fields.get_mut(&key) {
            Some(Field::Node(child)) => visitor.visit_node(child),
            Some(Field::Nodes(children)) => {
                for child in children.iter_mut().flatten() {
                    visitor.visit_node(child);
                }
            }
            _ => {}
        }
    }
}

/// Every node in pre-order, for tests and diagnostics.
pub fn collect_preorder(root: &EsNode) -> Vec<&EsNode> {
    fn go<'n>(node: &'n EsNode, out: &mut Vec<&'n EsNode>) {
        out.push(node);
        for key in keys_for(node) {
            match node.fields.get(&key) {
                Some(Field::Node(child)) => go(child, out),
                Some(Field::Nodes(children)) => {
                    for child in children.iter().flatten() {
                        go(child, out);
                    }
                }
                _ => {}
            }
        }
    }
    let mut out = Vec::new();
    go(root, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estree::NodeId;

    struct KindCollector(Vec<String>);

    impl Visitor for KindCollector {
        fn enter(&mut self, node: &EsNode, _parent: Option<&EsNode>) -> bool {
            self.0.push(node.kind.clone());
            node.kind != "Skipped"
        }
    }

    struct Renamer;

    impl VisitorMut for Renamer {
        fn visit_node(&mut self, node: &mut EsNode) {
            if node.kind == "JSXFragment" {
                node.kind = "AstroFragment".to_string();
                node.remove("openingFragment");
            }
            walk_node_mut(self, node);
        }
    }

    fn sample() -> EsNode {
        let leaf = EsNode::new(NodeId(3), "Identifier", [1, 2]);
        let skipped = EsNode::new(NodeId(2), "Skipped", [0, 1])
            .with_field("inner", Field::Node(Box::new(leaf.clone())));
        let fragment = EsNode::new(NodeId(1), "JSXFragment", [0, 3])
            .with_field("openingFragment", Field::Node(Box::new(skipped)))
            .with_field("children", Field::Nodes(vec![Some(leaf)]));
        EsNode::new(NodeId(0), "Program", [0, 3])
            .with_field("body", Field::Nodes(vec![Some(fragment)]))
    }

    #[test]
    fn test_walk_is_preorder_and_prunes() {
        let mut collector = KindCollector(vec![]);
        walk(&mut collector, &sample());
        assert_eq!(
            collector.0,
            vec!["Program", "JSXFragment", "Skipped", "Identifier"]
        );
    }

    #[test]
    fn test_mutable_walk_sees_rewritten_children() {
        let mut root = sample();
        Renamer.visit_node(&mut root);
        let kinds: Vec<_> = collect_preorder(&root).iter().map(|n| n.kind.clone()).collect();
        assert_eq!(kinds, vec!["Program", "AstroFragment", "Identifier"]);
    }
}
