//! Views: client windows tracked by the core.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Index, IndexMut};

use crate::backend::{Backend, NodeId, NodeOwner, SceneGraph};
use crate::output::OutputId;
use crate::utils::{Rectangle, Size, Tags};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewId(u32);

impl ViewId {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for ViewId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view-{}", self.0)
    }
}

/// One snapshot of the state of a view.
///
/// Geometry is relative to the output the view is on.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ViewState {
    pub output: Option<OutputId>,
    pub tags: Tags,
    pub geometry: Rectangle,
    pub float: bool,
    pub fullscreen: bool,
    pub resizing: bool,
}

/// Size limits requested by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeConstraints {
    pub min: Size,
    pub max: Size,
}

impl Default for SizeConstraints {
    fn default() -> Self {
        Self {
            min: Size::new(1, 1),
            max: Size::new(i32::MAX, i32::MAX),
        }
    }
}

impl SizeConstraints {
    /// Clamps `size` into the constraints.
    ///
    /// The minimum wins if the client sent a maximum below its minimum.
    pub fn apply(&self, size: Size) -> Size {
        Size::new(
            size.w.min(self.max.w).max(self.min.w),
            size.h.min(self.max.h).max(self.min.h),
        )
    }
}

/// Set of stacks a view is a member of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOwner {
    /// The always-invisible area for unmapped views.
    Hidden,
    /// The holding area used while no output is active.
    Fallback,
    Output(OutputId),
}

/// Scene nodes of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewTree {
    pub window: NodeId,
    pub popups: NodeId,
}

#[derive(Debug)]
pub struct View {
    id: ViewId,
    pub tree: ViewTree,

    pub mapped: bool,
    /// The view will be destroyed once no transaction references it.
    pub destroying: bool,

    pub pending: ViewState,
    pub inflight: ViewState,
    pub current: ViewState,

    pub pending_owner: StackOwner,
    pub inflight_owner: StackOwner,

    /// Last floating geometry, restored when the view starts floating again.
    pub float_box: Rectangle,
    /// Geometry to restore when the view leaves fullscreen.
    pub post_fullscreen_box: Rectangle,

    pub constraints: SizeConstraints,

    /// A configure sent during the current transaction wasn't acknowledged yet.
    pub awaiting_configure: bool,
    pub saved_surface: bool,
}

impl View {
    pub(crate) fn new(id: ViewId, hidden_tree: NodeId, scene: &mut impl SceneGraph) -> Self {
        let tree = ViewTree {
            window: scene.create_node(Some(hidden_tree), NodeOwner::Window(id)),
            popups: scene.create_node(Some(hidden_tree), NodeOwner::Popups(id)),
        };

        Self {
            id,
            tree,
            mapped: false,
            destroying: false,
            pending: ViewState::default(),
            inflight: ViewState::default(),
            current: ViewState::default(),
            pending_owner: StackOwner::Hidden,
            inflight_owner: StackOwner::Hidden,
            float_box: Rectangle::default(),
            post_fullscreen_box: Rectangle::default(),
            constraints: SizeConstraints::default(),
            awaiting_configure: false,
            saved_surface: false,
        }
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    pub(crate) fn save_surface(&mut self, backend: &mut impl Backend) {
        if !self.saved_surface {
            backend.save_surface(self.id);
            self.saved_surface = true;
        }
    }

    /// Makes the inflight state current and moves the scene nodes accordingly.
    pub(crate) fn update_current(&mut self, backend: &mut impl Backend) {
        self.current = self.inflight;

        if self.saved_surface {
            backend.drop_saved_surface(self.id);
            self.saved_surface = false;
        }

        let loc = self.current.geometry.loc;
        backend.set_position(self.tree.window, loc);
        backend.set_position(self.tree.popups, loc);
    }
}

/// Arena of all views, keyed by ID.
///
/// Indexing with an ID that doesn't exist panics: stacks only ever hold IDs of live views.
#[derive(Debug, Default)]
pub struct Views(BTreeMap<ViewId, View>);

impl Views {
    pub fn get(&self, id: ViewId) -> Option<&View> {
        self.0.get(&id)
    }

    pub fn get_mut(&mut self, id: ViewId) -> Option<&mut View> {
        self.0.get_mut(&id)
    }

    pub fn contains(&self, id: ViewId) -> bool {
        self.0.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &View> + '_ {
        self.0.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut View> + '_ {
        self.0.values_mut()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn insert(&mut self, view: View) {
        let old = self.0.insert(view.id, view);
        assert!(old.is_none(), "view IDs must be unique");
    }

    pub(crate) fn remove(&mut self, id: ViewId) -> Option<View> {
        self.0.remove(&id)
    }
}

impl Index<ViewId> for Views {
    type Output = View;

    fn index(&self, id: ViewId) -> &View {
        match self.0.get(&id) {
            Some(view) => view,
            None => panic!("{id} does not exist"),
        }
    }
}

impl IndexMut<ViewId> for Views {
    fn index_mut(&mut self, id: ViewId) -> &mut View {
        match self.0.get_mut(&id) {
            Some(view) => view,
            None => panic!("{id} does not exist"),
        }
    }
}
