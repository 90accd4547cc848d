pub mod tree;

use serde::Serialize;

use crate::ids::TagId;

pub use tree::{build_forest, flatten_forest};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub parent_id: Option<TagId>,
    pub created_at: String,
}

/// A tag with its children, ordered by name. Computed on read, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagNode {
    #[serde(flatten)]
    pub tag: Tag,
    pub children: Vec<TagNode>,
}

// Dismantled with an explicit stack so a deep chain cannot exhaust the
// thread stack while being dropped.
impl Drop for TagNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Child tag reported when its parent is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagRef {
    pub id: TagId,
    pub name: String,
}
