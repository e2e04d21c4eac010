use std::collections::VecDeque;

use crate::view::ViewId;

/// Ordered sequence of views, front is top.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stack(VecDeque<ViewId>);

impl Stack {
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = ViewId> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: ViewId) -> bool {
        self.0.contains(&id)
    }

    pub fn prepend(&mut self, id: ViewId) {
        assert!(!self.contains(id), "{id} is already in this stack");
        self.0.push_front(id);
    }

    pub fn append(&mut self, id: ViewId) {
        assert!(!self.contains(id), "{id} is already in this stack");
        self.0.push_back(id);
    }

    /// Removes the view, returning whether it was in the stack.
    pub fn remove(&mut self, id: ViewId) -> bool {
        match self.0.iter().position(|v| *v == id) {
            Some(idx) => {
                self.0.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Moves every view of `other` in front of this stack, keeping their relative order.
    pub fn prepend_all(&mut self, other: &mut Stack) {
        while let Some(id) = other.0.pop_back() {
            self.prepend(id);
        }
    }

}

impl FromIterator<ViewId> for Stack {
    fn from_iter<T: IntoIterator<Item = ViewId>>(iter: T) -> Self {
        Self(VecDeque::from_iter(iter))
    }
}

/// The two stacks every view is a member of in each phase.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stacks {
    /// Most recently focused first.
    pub focus: Stack,
    /// Stacking and layout order.
    pub wm: Stack,
}

impl Stacks {
    pub fn is_empty(&self) -> bool {
        self.focus.is_empty() && self.wm.is_empty()
    }

    pub fn contains(&self, id: ViewId) -> bool {
        self.focus.contains(id) || self.wm.contains(id)
    }

    pub fn remove(&mut self, id: ViewId) {
        self.focus.remove(id);
        self.wm.remove(id);
    }

    pub fn prepend(&mut self, id: ViewId) {
        self.focus.prepend(id);
        self.wm.prepend(id);
    }

    pub fn prepend_all(&mut self, other: &mut Stacks) {
        self.focus.prepend_all(&mut other.focus);
        self.wm.prepend_all(&mut other.wm);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack(ids: &[u32]) -> Stack {
        ids.iter().map(|id| ViewId::from(*id)).collect()
    }

    fn ids(stack: &Stack) -> Vec<u32> {
        stack.iter().map(ViewId::get).collect()
    }

    #[test]
    fn prepend_all_keeps_source_on_top() {
        let mut dst = stack(&[3, 4]);
        let mut src = stack(&[1, 2]);
        dst.prepend_all(&mut src);

        assert_eq!(ids(&dst), [1, 2, 3, 4]);
        assert!(src.is_empty());
    }

    #[test]
    fn remove_reports_membership() {
        let mut s = stack(&[1, 2, 3]);
        assert!(s.remove(ViewId::from(2)));
        assert!(!s.remove(ViewId::from(2)));
        assert_eq!(ids(&s), [1, 3]);
    }

    #[test]
    #[should_panic]
    fn double_membership_panics() {
        let mut s = stack(&[1]);
        s.append(ViewId::from(1));
    }
}
