use std::collections::HashMap;

use crate::tree::{NodeId, Tree};

/// Preorder numbering of a subtree, used to compare source positions of
/// nodes after the original text ranges went stale.
#[derive(Clone, Debug, Default)]
pub struct DocumentOrder {
    spans: HashMap<NodeId, (u32, u32)>,
}

impl DocumentOrder {
    pub fn new(tree: &Tree, root: NodeId) -> Self {
        let mut order = DocumentOrder::default();
        let mut counter = 0;
        order.number(tree, root, &mut counter);
        order
    }

    /// Numbers the whole tree `node` belongs to.
    pub fn for_node(tree: &Tree, node: NodeId) -> Self {
        Self::new(tree, tree.root_of(node))
    }

    fn number(&mut self, tree: &Tree, id: NodeId, counter: &mut u32) -> u32 {
        let start = *counter;
        *counter += 1;
        let mut end = start;
        for &child in tree.children(id) {
            end = self.number(tree, child, counter);
        }
        self.spans.insert(id, (start, end));
        end
    }

    pub fn position(&self, id: NodeId) -> Option<u32> {
        self.spans.get(&id).map(|&(start, _)| start)
    }

    /// Whether `a` and its subtree come entirely before `b`.
    pub fn precedes(&self, a: NodeId, b: NodeId) -> bool {
        match (self.spans.get(&a), self.spans.get(&b)) {
            (Some(&(_, a_end)), Some(&(b_start, _))) => a_end < b_start,
            _ => false,
        }
    }

    pub fn contains(&self, outer: NodeId, inner: NodeId) -> bool {
        match (self.spans.get(&outer), self.spans.get(&inner)) {
            (Some(&(start, end)), Some(&(pos, _))) => start <= pos && pos <= end,
            _ => false,
        }
    }
}
