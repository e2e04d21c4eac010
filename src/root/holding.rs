use super::stack::Stacks;
use crate::backend::NodeId;
use crate::utils::Tags;

/// Holds views and tags while no output is active, so nothing is lost on unplug.
///
/// The pending stacks are empty whenever at least one output is active.
#[derive(Debug, Default)]
pub struct Fallback {
    /// Tags restored onto the next output that becomes the only active one.
    pub tags: Tags,
    pub pending: Stacks,
    pub inflight: Stacks,
}

/// Always-invisible area for unmapped views and views mid-transition.
#[derive(Debug)]
pub struct Hidden {
    pub tree: NodeId,
    pub pending: Stacks,
    pub inflight: Stacks,
}

impl Fallback {
    pub fn new(tags: Tags) -> Self {
        Self {
            tags,
            pending: Stacks::default(),
            inflight: Stacks::default(),
        }
    }
}

impl Hidden {
    pub fn new(tree: NodeId) -> Self {
        Self {
            tree,
            pending: Stacks::default(),
            inflight: Stacks::default(),
        }
    }
}
