//! Headless backend for tests and scripted runs.
//!
//! Implements every collaborator in-process: a scene node tree with its own node to owner map,
//! clients that record configures until they are acknowledged, a layout engine that records
//! demands until they are answered, seats, a virtual clock for deadlines, and output devices.
//! Failures can be injected to exercise the error paths of the core.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as _;
use std::time::Duration;

use anyhow::bail;

use super::{
    ClientProtocol, ConfigureChanges, Deadline, Deadlines, GrabKind, InteractiveGrab,
    LayoutEngine, LayoutRequest, NodeId, NodeOwner, OutputDevices, SceneGraph, SceneLayer,
    SeatId, Seats,
};
use crate::layout_demand::LayoutError;
use crate::output::OutputId;
use crate::protocols::output_management::HeadState;
use crate::utils::Point;
use crate::view::{ViewId, ViewState};

#[derive(Debug)]
struct Node {
    parent: Option<NodeId>,
    /// Bottom to top.
    children: Vec<NodeId>,
    enabled: bool,
    position: Point,
}

/// Configure sent to a client and not acknowledged yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentConfigure {
    pub state: ViewState,
    pub changes: ConfigureChanges,
}

#[derive(Debug, Default)]
pub struct Headless {
    nodes: BTreeMap<NodeId, Node>,
    owners: HashMap<NodeId, NodeOwner>,
    /// Top-level nodes, bottom to top.
    roots: Vec<NodeId>,
    next_node: u32,

    configured: BTreeSet<ViewId>,
    configures: BTreeMap<ViewId, SentConfigure>,
    configure_count: usize,
    saved_surfaces: BTreeSet<ViewId>,
    closed_layer_surfaces: Vec<OutputId>,

    layout_demands: BTreeMap<OutputId, LayoutRequest>,
    layout_errors: Vec<(OutputId, LayoutError)>,
    fail_layout_demands: bool,

    focused_output: Option<OutputId>,
    grabs: Vec<InteractiveGrab>,
    focus_resyncs: usize,
    cursor_refreshes: usize,

    now: Duration,
    deadlines: BTreeMap<Deadline, Duration>,

    rejected_outputs: BTreeSet<OutputId>,
    failing_outputs: BTreeSet<OutputId>,
    committed_output_states: Vec<(OutputId, HeadState)>,
}

impl Headless {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&self, node: NodeId) -> &Node {
        match self.nodes.get(&node) {
            Some(node) => node,
            None => panic!("{node:?} does not exist"),
        }
    }

    fn node_mut(&mut self, node: NodeId) -> &mut Node {
        match self.nodes.get_mut(&node) {
            Some(node) => node,
            None => panic!("{node:?} does not exist"),
        }
    }

    fn siblings_mut(&mut self, parent: Option<NodeId>) -> &mut Vec<NodeId> {
        match parent {
            Some(parent) => &mut self.node_mut(parent).children,
            None => &mut self.roots,
        }
    }

    fn detach(&mut self, node: NodeId) {
        let parent = self.node(node).parent;
        self.siblings_mut(parent).retain(|n| *n != node);
    }

    fn find_node(&self, owner: NodeOwner) -> Option<NodeId> {
        self.owners
            .iter()
            .find(|(_, o)| **o == owner)
            .map(|(node, _)| *node)
    }

    pub fn owner(&self, node: NodeId) -> Option<NodeOwner> {
        self.owners.get(&node).copied()
    }

    /// Returns what the window node of a view is a child of.
    pub fn view_parent(&self, view: ViewId) -> Option<NodeOwner> {
        let node = self.find_node(NodeOwner::Window(view))?;
        self.node(node).parent.and_then(|p| self.owner(p))
    }

    /// Whether the window node of a view and every ancestor of it is enabled.
    pub fn is_view_visible(&self, view: ViewId) -> bool {
        let Some(mut node) = self.find_node(NodeOwner::Window(view)) else {
            return false;
        };
        loop {
            let n = self.node(node);
            if !n.enabled {
                return false;
            }
            match n.parent {
                Some(parent) => node = parent,
                None => return true,
            }
        }
    }

    pub fn is_view_enabled(&self, view: ViewId) -> bool {
        self.find_node(NodeOwner::Window(view))
            .is_some_and(|node| self.node(node).enabled)
    }

    pub fn view_position(&self, view: ViewId) -> Option<Point> {
        self.find_node(NodeOwner::Window(view))
            .map(|node| self.node(node).position)
    }

    /// Returns the views in a layer, bottom to top.
    pub fn layer_views(&self, output: OutputId, layer: SceneLayer) -> Vec<ViewId> {
        let Some(node) = self.find_node(NodeOwner::Layer(output, layer)) else {
            return Vec::new();
        };
        self.node(node)
            .children
            .iter()
            .filter_map(|child| match self.owner(*child) {
                Some(NodeOwner::Window(view)) => Some(view),
                _ => None,
            })
            .collect()
    }

    pub fn is_layer_enabled(&self, output: OutputId, layer: SceneLayer) -> bool {
        self.find_node(NodeOwner::Layer(output, layer))
            .is_some_and(|node| self.node(node).enabled)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Formats the scene tree, one node per line.
    pub fn dump(&self) -> String {
        let mut buf = String::new();
        for root in &self.roots {
            self.dump_node(&mut buf, *root, 0);
        }
        buf
    }

    fn dump_node(&self, buf: &mut String, id: NodeId, depth: usize) {
        let node = self.node(id);

        let label = match self.owner(id) {
            Some(NodeOwner::Hidden) => String::from("hidden"),
            Some(NodeOwner::Output(output)) => format!("{output}"),
            Some(NodeOwner::Layer(_, layer)) => format!("{layer:?}").to_lowercase(),
            Some(NodeOwner::Window(view)) => format!("window {view}"),
            Some(NodeOwner::Popups(view)) => format!("popups {view}"),
            None => String::from("?"),
        };

        let indent = "  ".repeat(depth);
        let _ = write!(buf, "{indent}{label}");
        if node.position != Point::default() {
            let _ = write!(buf, " at ({}, {})", node.position.x, node.position.y);
        }
        if !node.enabled {
            buf.push_str(" [disabled]");
        }
        buf.push('\n');

        for child in node.children.iter().rev() {
            self.dump_node(buf, *child, depth + 1);
        }
    }

    /// Configures sent and not acknowledged yet.
    pub fn configures(&self) -> &BTreeMap<ViewId, SentConfigure> {
        &self.configures
    }

    /// Total number of configures sent so far.
    pub fn configure_count(&self) -> usize {
        self.configure_count
    }

    /// Removes the outstanding configure of a view, returning it so it can be acknowledged.
    pub fn take_configure(&mut self, view: ViewId) -> Option<SentConfigure> {
        self.configures.remove(&view)
    }

    pub fn take_configures(&mut self) -> Vec<ViewId> {
        let configures = std::mem::take(&mut self.configures);
        configures.into_keys().collect()
    }

    pub fn has_saved_surface(&self, view: ViewId) -> bool {
        self.saved_surfaces.contains(&view)
    }

    pub fn closed_layer_surfaces(&self) -> &[OutputId] {
        &self.closed_layer_surfaces
    }

    pub fn layout_demand(&self, output: OutputId) -> Option<&LayoutRequest> {
        self.layout_demands.get(&output)
    }

    pub fn take_layout_demand(&mut self, output: OutputId) -> Option<LayoutRequest> {
        self.layout_demands.remove(&output)
    }

    pub fn layout_demands(&self) -> &BTreeMap<OutputId, LayoutRequest> {
        &self.layout_demands
    }

    pub fn layout_errors(&self) -> &[(OutputId, LayoutError)] {
        &self.layout_errors
    }

    /// Makes starting layout demands fail until turned off again.
    pub fn set_fail_layout_demands(&mut self, fail: bool) {
        self.fail_layout_demands = fail;
    }

    pub fn focused_output(&self) -> Option<OutputId> {
        self.focused_output
    }

    pub fn focus_resyncs(&self) -> usize {
        self.focus_resyncs
    }

    pub fn cursor_refreshes(&self) -> usize {
        self.cursor_refreshes
    }

    pub fn start_grab(&mut self, seat: SeatId, view: ViewId, kind: GrabKind) {
        self.grabs.retain(|grab| grab.seat != seat);
        self.grabs.push(InteractiveGrab { seat, view, kind });
    }

    pub fn grabs(&self) -> &[InteractiveGrab] {
        &self.grabs
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn is_armed(&self, deadline: Deadline) -> bool {
        self.deadlines.contains_key(&deadline)
    }

    /// Returns the earliest armed deadline and when it expires.
    pub fn next_deadline(&self) -> Option<(Duration, Deadline)> {
        self.deadlines
            .iter()
            .map(|(deadline, at)| (*at, *deadline))
            .min()
    }

    /// Moves the clock forward, returning the deadlines that expired, earliest first.
    pub fn advance(&mut self, by: Duration) -> Vec<Deadline> {
        self.advance_to(self.now + by)
    }

    pub fn advance_to(&mut self, now: Duration) -> Vec<Deadline> {
        self.now = self.now.max(now);

        let mut expired: Vec<_> = self
            .deadlines
            .iter()
            .filter(|(_, at)| **at <= self.now)
            .map(|(deadline, at)| (*at, *deadline))
            .collect();
        expired.sort();

        for (_, deadline) in &expired {
            self.deadlines.remove(deadline);
        }
        expired.into_iter().map(|(_, deadline)| deadline).collect()
    }

    pub fn reject_output_states(&mut self, output: OutputId) {
        self.rejected_outputs.insert(output);
    }

    pub fn fail_output_commits(&mut self, output: OutputId) {
        self.failing_outputs.insert(output);
    }

    pub fn committed_output_states(&self) -> &[(OutputId, HeadState)] {
        &self.committed_output_states
    }
}

impl SceneGraph for Headless {
    fn create_node(&mut self, parent: Option<NodeId>, owner: NodeOwner) -> NodeId {
        self.next_node += 1;
        let id = NodeId(self.next_node);

        self.nodes.insert(
            id,
            Node {
                parent,
                children: Vec::new(),
                enabled: true,
                position: Point::default(),
            },
        );
        self.owners.insert(id, owner);
        self.siblings_mut(parent).push(id);
        id
    }

    fn destroy_node(&mut self, node: NodeId) {
        if !self.nodes.contains_key(&node) {
            return;
        }

        let children = self.node(node).children.clone();
        for child in children {
            self.destroy_node(child);
        }

        self.detach(node);
        self.nodes.remove(&node);

        if let Some(NodeOwner::Window(view)) = self.owners.remove(&node) {
            self.configures.remove(&view);
            self.configured.remove(&view);
            self.saved_surfaces.remove(&view);
            self.grabs.retain(|grab| grab.view != view);
        }
    }

    fn reparent(&mut self, node: NodeId, parent: NodeId) {
        assert_ne!(node, parent);
        self.detach(node);
        self.node_mut(node).parent = Some(parent);
        self.node_mut(parent).children.push(node);
    }

    fn set_enabled(&mut self, node: NodeId, enabled: bool) {
        self.node_mut(node).enabled = enabled;
    }

    fn set_position(&mut self, node: NodeId, loc: Point) {
        self.node_mut(node).position = loc;
    }

    fn lower_to_bottom(&mut self, node: NodeId) {
        let parent = self.node(node).parent;
        let siblings = self.siblings_mut(parent);
        siblings.retain(|n| *n != node);
        siblings.insert(0, node);
    }
}

impl ClientProtocol for Headless {
    fn configure(&mut self, view: ViewId, state: &ViewState, changes: ConfigureChanges) -> bool {
        // The initial configure is always sent.
        let initial = self.configured.insert(view);
        if !initial && changes.is_empty() {
            return false;
        }

        self.configures.insert(
            view,
            SentConfigure {
                state: *state,
                changes,
            },
        );
        self.configure_count += 1;
        true
    }

    fn save_surface(&mut self, view: ViewId) {
        self.saved_surfaces.insert(view);
    }

    fn drop_saved_surface(&mut self, view: ViewId) {
        self.saved_surfaces.remove(&view);
    }

    fn close_layer_surfaces(&mut self, output: OutputId) {
        self.closed_layer_surfaces.push(output);
    }
}

impl LayoutEngine for Headless {
    fn start_layout_demand(
        &mut self,
        output: OutputId,
        request: &LayoutRequest,
    ) -> anyhow::Result<()> {
        if self.fail_layout_demands {
            bail!("out of memory");
        }
        self.layout_demands.insert(output, request.clone());
        Ok(())
    }

    fn cancel_layout_demand(&mut self, output: OutputId, serial: u32) {
        if self
            .layout_demands
            .get(&output)
            .is_some_and(|d| d.serial == serial)
        {
            self.layout_demands.remove(&output);
        }
    }

    fn layout_error(&mut self, output: OutputId, error: &LayoutError) {
        self.layout_errors.push((output, error.clone()));
    }
}

impl Seats for Headless {
    fn resync_focus(&mut self) {
        self.focus_resyncs += 1;
    }

    fn focus_output(&mut self, output: Option<OutputId>) {
        self.focused_output = output;
    }

    fn redirect_focus(&mut self, from: OutputId, to: Option<OutputId>) {
        if self.focused_output == Some(from) {
            self.focused_output = to;
        }
    }

    fn refresh_cursor_state(&mut self) {
        self.cursor_refreshes += 1;
    }

    fn interactive_grabs(&self) -> Vec<InteractiveGrab> {
        self.grabs.clone()
    }

    fn end_interactive_grab(&mut self, seat: SeatId) {
        self.grabs.retain(|grab| grab.seat != seat);
    }
}

impl Deadlines for Headless {
    fn arm(&mut self, deadline: Deadline, timeout: Duration) {
        self.deadlines.insert(deadline, self.now + timeout);
    }

    fn disarm(&mut self, deadline: Deadline) {
        self.deadlines.remove(&deadline);
    }
}

impl OutputDevices for Headless {
    fn test_output_state(&mut self, output: OutputId, _state: &HeadState) -> bool {
        !self.rejected_outputs.contains(&output)
    }

    fn commit_output_state(&mut self, output: OutputId, state: &HeadState) -> anyhow::Result<()> {
        if self.failing_outputs.contains(&output) {
            bail!("device is gone");
        }
        self.committed_output_states.push((output, *state));
        Ok(())
    }
}
