//! Outputs: display devices and their per-phase layout state.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Index, IndexMut};

use crate::backend::{NodeId, NodeOwner, SceneGraph, SceneLayer};
use crate::layout_demand::LayoutDemand;
use crate::root::stack::Stacks;
use crate::utils::{Point, Rectangle, Size, Tags};
use crate::view::ViewId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OutputId(u32);

impl OutputId {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for OutputId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "output-{}", self.0)
    }
}

/// Scene nodes of an output, one layer per kind of content, bottom to top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputTree {
    pub tree: NodeId,
    pub tiled: NodeId,
    pub floating: NodeId,
    pub fullscreen: NodeId,
    pub popups: NodeId,
}

impl OutputTree {
    fn new(id: OutputId, scene: &mut impl SceneGraph) -> Self {
        let tree = scene.create_node(None, NodeOwner::Output(id));
        scene.set_enabled(tree, false);

        let mut layer = |layer| scene.create_node(Some(tree), NodeOwner::Layer(id, layer));
        let tiled = layer(SceneLayer::Tiled);
        let floating = layer(SceneLayer::Floating);
        let fullscreen = layer(SceneLayer::Fullscreen);
        let popups = layer(SceneLayer::Popups);
        scene.set_enabled(fullscreen, false);

        Self {
            tree,
            tiled,
            floating,
            fullscreen,
            popups,
        }
    }

    pub fn nodes(&self) -> [NodeId; 5] {
        [
            self.popups,
            self.fullscreen,
            self.floating,
            self.tiled,
            self.tree,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPending {
    pub tags: Tags,
    pub stacks: Stacks,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OutputInflight {
    pub tags: Tags,
    pub fullscreen: Option<ViewId>,
    pub stacks: Stacks,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OutputCurrent {
    pub tags: Tags,
    pub fullscreen: Option<ViewId>,
}

#[derive(Debug)]
pub struct Output {
    id: OutputId,
    pub name: String,
    /// Effective resolution in logical pixels.
    pub size: Size,
    /// Area not covered by exclusive layer surfaces, relative to the output.
    pub usable_area: Rectangle,
    /// Position requested by the config or by an output configuration client.
    pub requested_position: Option<Point>,
    /// Namespace of the layout engine laying out this output, if any.
    pub layout_namespace: Option<String>,
    pub(crate) layout_demand: Option<LayoutDemand>,
    pub tree: OutputTree,

    pub pending: OutputPending,
    pub inflight: OutputInflight,
    pub current: OutputCurrent,
}

impl Output {
    pub(crate) fn new(
        id: OutputId,
        name: String,
        size: Size,
        scene: &mut impl SceneGraph,
    ) -> Self {
        Self {
            id,
            name,
            size,
            usable_area: Rectangle::from_size(size),
            requested_position: None,
            layout_namespace: None,
            layout_demand: None,
            tree: OutputTree::new(id, scene),
            pending: OutputPending {
                tags: Tags(1),
                stacks: Stacks::default(),
            },
            inflight: OutputInflight::default(),
            current: OutputCurrent::default(),
        }
    }

    pub fn id(&self) -> OutputId {
        self.id
    }

    pub fn layout_demand(&self) -> Option<&LayoutDemand> {
        self.layout_demand.as_ref()
    }

    pub fn full_area(&self) -> Rectangle {
        Rectangle::from_size(self.size)
    }

    /// Applies a new mode size.
    ///
    /// The usable area follows the size unless layer surfaces already shrank it.
    pub(crate) fn set_size(&mut self, size: Size) {
        if self.usable_area == self.full_area() {
            self.usable_area = Rectangle::from_size(size);
        }
        self.size = size;
        self.usable_area.clamp_into(self.full_area(), 0);
    }
}

/// Arena of every output ever seen and not yet removed.
#[derive(Debug, Default)]
pub struct Outputs(BTreeMap<OutputId, Output>);

impl Outputs {
    pub fn get(&self, id: OutputId) -> Option<&Output> {
        self.0.get(&id)
    }

    pub fn get_mut(&mut self, id: OutputId) -> Option<&mut Output> {
        self.0.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Output> + '_ {
        self.0.values()
    }

    pub fn by_name(&self, name: &str) -> Option<&Output> {
        self.0.values().find(|o| o.name == name)
    }

    pub(crate) fn insert(&mut self, output: Output) {
        let old = self.0.insert(output.id, output);
        assert!(old.is_none(), "output IDs must be unique");
    }

    pub(crate) fn remove(&mut self, id: OutputId) -> Option<Output> {
        self.0.remove(&id)
    }
}

impl Index<OutputId> for Outputs {
    type Output = Output;

    fn index(&self, id: OutputId) -> &Output {
        match self.0.get(&id) {
            Some(output) => output,
            None => panic!("{id} does not exist"),
        }
    }
}

impl IndexMut<OutputId> for Outputs {
    fn index_mut(&mut self, id: OutputId) -> &mut Output {
        match self.0.get_mut(&id) {
            Some(output) => output,
            None => panic!("{id} does not exist"),
        }
    }
}

/// Placement of active outputs in the global space.
#[derive(Debug, Default)]
pub struct OutputLayout {
    placed: Vec<(OutputId, Rectangle)>,
}

impl OutputLayout {
    /// Places an output and returns its location.
    ///
    /// The requested position is used unless it overlaps an already placed output, in which case
    /// the output goes to the right of everything placed so far.
    pub fn add(&mut self, id: OutputId, size: Size, requested: Option<Point>) -> Point {
        self.remove(id);

        let loc = match requested {
            Some(loc) => {
                let rect = Rectangle::new(loc, size);
                let overlap = self.placed.iter().find(|(_, other)| other.overlaps(rect));
                if let Some((other, _)) = overlap {
                    warn!(
                        "new position {loc:?} of {id} overlaps {other}, \
                         falling back to automatic placement",
                    );
                    None
                } else {
                    Some(loc)
                }
            }
            None => None,
        };

        let loc = loc.unwrap_or_else(|| {
            let x = self.placed.iter().map(|(_, r)| r.right()).max().unwrap_or(0);
            Point::new(x, 0)
        });

        debug!("placing {id} at {loc:?}");
        self.placed.push((id, Rectangle::new(loc, size)));
        loc
    }

    pub fn remove(&mut self, id: OutputId) {
        self.placed.retain(|(o, _)| *o != id);
    }

    pub fn geometry(&self, id: OutputId) -> Option<Rectangle> {
        self.placed
            .iter()
            .find(|(o, _)| *o == id)
            .map(|(_, rect)| *rect)
    }
}
