use std::collections::{HashMap, HashSet};

use crate::ids::TagId;
use crate::tags::{Tag, TagNode};

/// Builds the tag forest from flat parent-pointer rows.
///
/// Only tags reachable from a root are emitted. Tags whose parent id is
/// missing, or that sit on a parent cycle, are never reached and are dropped.
/// The walk only ever follows parent -> child edges and uses an explicit
/// stack, so it terminates for any input and at any depth.
pub fn build_forest(tags: &[Tag]) -> Vec<TagNode> {
    let mut children: HashMap<TagId, Vec<&Tag>> = HashMap::new();
    let mut roots = Vec::new();
    for tag in tags {
        match tag.parent_id {
            Some(parent) => children.entry(parent).or_default().push(tag),
            None => roots.push(tag),
        }
    }

    sort_siblings(&mut roots);
    for siblings in children.values_mut() {
        sort_siblings(siblings);
    }

    // Pre-order walk; each entry records the slot of its parent.
    let mut order: Vec<(&Tag, Option<usize>)> = Vec::new();
    let mut visited = HashSet::new();
    let mut stack: Vec<(&Tag, Option<usize>)> =
        roots.iter().rev().map(|root| (*root, None)).collect();
    while let Some((tag, parent)) = stack.pop() {
        if !visited.insert(tag.id) {
            continue;
        }
        let slot = order.len();
        order.push((tag, parent));
        if let Some(kids) = children.get(&tag.id) {
            stack.extend(kids.iter().rev().map(|kid| (*kid, Some(slot))));
        }
    }

    // Children always occupy later slots than their parent, so folding from
    // the back finishes every subtree before its parent is moved.
    let mut nodes: Vec<Option<TagNode>> = order
        .iter()
        .map(|(tag, _)| {
            Some(TagNode {
                tag: (*tag).clone(),
                children: Vec::new(),
            })
        })
        .collect();
    let mut forest = Vec::with_capacity(roots.len());
    for (slot, &(_, parent)) in order.iter().enumerate().rev() {
        let Some(mut node) = nodes[slot].take() else {
            continue;
        };
        node.children.reverse();
        match parent.and_then(|p| nodes[p].as_mut()) {
            Some(parent_node) => parent_node.children.push(node),
            None => forest.push(node),
        }
    }
    forest.reverse();
    forest
}

fn sort_siblings(siblings: &mut [&Tag]) {
    siblings.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
}

/// Depth-first (id, parent_id) pairs of a forest, parents before children.
pub fn flatten_forest(forest: &[TagNode]) -> Vec<(TagId, Option<TagId>)> {
    let mut out = Vec::new();
    let mut stack: Vec<&TagNode> = forest.iter().rev().collect();
    while let Some(node) = stack.pop() {
        out.push((node.tag.id, node.tag.parent_id));
        stack.extend(node.children.iter().rev());
    }
    out
}
