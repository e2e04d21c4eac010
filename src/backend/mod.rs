//! Interfaces to the parts of the compositor living outside the core.
//!
//! The core never renders, talks to clients or computes layouts itself. It drives those through
//! the traits below, bundled as [`Backend`], and receives their answers as
//! [`Event`](crate::root::Event)s.

use std::time::Duration;

use bitflags::bitflags;

use crate::layout_demand::LayoutError;
use crate::output::OutputId;
use crate::protocols::output_management::HeadState;
use crate::utils::{Point, Size, Tags};
use crate::view::{ViewId, ViewState};

pub mod headless;

pub use headless::Headless;

/// Opaque handle of a scene graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

/// Entity a scene node belongs to.
///
/// The scene graph adapter keeps the mapping from nodes to owners, nodes don't carry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeOwner {
    Hidden,
    Output(OutputId),
    Layer(OutputId, SceneLayer),
    Window(ViewId),
    Popups(ViewId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneLayer {
    Tiled,
    Floating,
    Fullscreen,
    Popups,
}

pub trait SceneGraph {
    /// Creates an enabled node on top of `parent`'s children.
    fn create_node(&mut self, parent: Option<NodeId>, owner: NodeOwner) -> NodeId;
    fn destroy_node(&mut self, node: NodeId);
    /// Moves the node on top of `parent`'s children.
    fn reparent(&mut self, node: NodeId, parent: NodeId);
    fn set_enabled(&mut self, node: NodeId, enabled: bool);
    fn set_position(&mut self, node: NodeId, loc: Point);
    fn lower_to_bottom(&mut self, node: NodeId);
}

bitflags! {
    /// What changed between the current and the inflight state of a view.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ConfigureChanges: u8 {
        const SIZE = 1;
        const FULLSCREEN = 1 << 1;
        const RESIZING = 1 << 2;
    }
}

impl ConfigureChanges {
    pub fn between(current: &ViewState, inflight: &ViewState) -> Self {
        let mut changes = Self::empty();
        changes.set(
            Self::SIZE,
            current.geometry.size != inflight.geometry.size,
        );
        changes.set(Self::FULLSCREEN, current.fullscreen != inflight.fullscreen);
        changes.set(Self::RESIZING, current.resizing != inflight.resizing);
        changes
    }
}

pub trait ClientProtocol {
    /// Asks the client to adopt `state`.
    ///
    /// Returns whether a configure was actually sent. Every sent configure is answered with an
    /// [`Event::ConfigureAcked`](crate::root::Event::ConfigureAcked), unless the client is too
    /// slow.
    fn configure(&mut self, view: ViewId, state: &ViewState, changes: ConfigureChanges) -> bool;
    /// Keeps showing the current contents of the view until [`Self::drop_saved_surface`].
    fn save_surface(&mut self, view: ViewId);
    fn drop_saved_surface(&mut self, view: ViewId);
    fn close_layer_surfaces(&mut self, output: OutputId);
}

/// Layout demand sent to a layout engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutRequest {
    pub serial: u32,
    pub namespace: String,
    pub view_count: u32,
    pub usable_size: Size,
    pub tags: Tags,
}

pub trait LayoutEngine {
    fn start_layout_demand(
        &mut self,
        output: OutputId,
        request: &LayoutRequest,
    ) -> anyhow::Result<()>;
    fn cancel_layout_demand(&mut self, output: OutputId, serial: u32);
    /// Reports a protocol mistake of the layout engine.
    fn layout_error(&mut self, output: OutputId, error: &LayoutError);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeatId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabKind {
    Move,
    Resize,
}

/// Interactive move or resize in progress on a seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteractiveGrab {
    pub seat: SeatId,
    pub view: ViewId,
    pub kind: GrabKind,
}

pub trait Seats {
    /// Recomputes keyboard focus on every seat.
    fn resync_focus(&mut self);
    fn focus_output(&mut self, output: Option<OutputId>);
    /// Moves every seat focused on `from` to `to`.
    fn redirect_focus(&mut self, from: OutputId, to: Option<OutputId>);
    fn refresh_cursor_state(&mut self);
    fn interactive_grabs(&self) -> Vec<InteractiveGrab>;
    /// Returns the seat to passthrough mode.
    fn end_interactive_grab(&mut self, seat: SeatId);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Deadline {
    /// Waiting for clients to acknowledge configures.
    Configures,
    /// Waiting for the layout engine of an output.
    LayoutDemand(OutputId),
}

/// Timers firing [`Event::DeadlineReached`](crate::root::Event::DeadlineReached).
pub trait Deadlines {
    /// Arms the deadline, replacing a previous one of the same kind.
    fn arm(&mut self, deadline: Deadline, timeout: Duration);
    fn disarm(&mut self, deadline: Deadline);
}

pub trait OutputDevices {
    /// Checks whether the device would accept the state, without changing anything.
    fn test_output_state(&mut self, output: OutputId, state: &HeadState) -> bool;
    fn commit_output_state(&mut self, output: OutputId, state: &HeadState) -> anyhow::Result<()>;
}

/// Everything the core needs from the outside.
pub trait Backend:
    SceneGraph + ClientProtocol + LayoutEngine + Seats + Deadlines + OutputDevices
{
}

impl<T> Backend for T where
    T: SceneGraph + ClientProtocol + LayoutEngine + Seats + Deadlines + OutputDevices
{
}
