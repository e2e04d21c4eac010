//! The root coordinator owning every view and output.
//!
//! All state lives in three phases. Policy code mutates the *pending* phase through the methods
//! on [`Root`] at any time, then calls [`Root::apply_pending`]. A transaction snapshots pending
//! into *inflight*, waits for layout engines and clients, and finally commits inflight into
//! *current*, which is what the scene graph shows.
//!
//! Views are stored in an arena keyed by [`ViewId`]. Each phase keeps two ordered stacks of IDs
//! per output, plus the same pair for the fallback and hidden areas. A view is a member of
//! exactly one pending and one inflight pair at any time; [`StackOwner`] records which.

use std::time::Duration;

use sluice_config::{AttachMode, Config};

use crate::backend::{Backend, Deadline, NodeOwner, SceneGraph};
use crate::output::{Output, OutputId, OutputLayout, Outputs};
use crate::utils::id::IdCounter;
use crate::utils::{Rectangle, Size, Tags};
use crate::view::{SizeConstraints, StackOwner, View, ViewId, Views};

pub mod holding;
pub mod outputs;
pub mod stack;


pub use holding::{Fallback, Hidden};
pub use stack::{Stack, Stacks};

#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub border_width: i32,
    pub attach_mode: AttachMode,
    pub default_tags: Tags,
    pub configure_timeout: Duration,
    pub layout_demand_timeout: Duration,
    pub outputs: sluice_config::Outputs,
}

impl Default for Options {
    fn default() -> Self {
        Self::from_parts(
            &sluice_config::Layout::default(),
            &sluice_config::Transactions::default(),
            sluice_config::Outputs::default(),
        )
    }
}

impl Options {
    pub fn from_config(config: &Config) -> Self {
        Self::from_parts(
            &config.layout,
            &config.transactions,
            config.outputs.clone(),
        )
    }

    fn from_parts(
        layout: &sluice_config::Layout,
        transactions: &sluice_config::Transactions,
        outputs: sluice_config::Outputs,
    ) -> Self {
        let mut default_tags = Tags(layout.default_tags);
        if default_tags.is_empty() {
            warn!("default-tags must not be empty, using tag 1");
            default_tags = Tags(1);
        }

        Self {
            border_width: i32::from(layout.border_width),
            attach_mode: layout.attach_mode,
            default_tags,
            configure_timeout: transactions.configure_timeout(),
            layout_demand_timeout: transactions.layout_demand_timeout(),
            outputs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    AwaitingLayout,
    AwaitingConfigures,
}

/// Something that happened outside the core.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// An output was plugged in.
    NewOutput { name: String, size: Size },
    /// An output was unplugged.
    OutputRemoved(OutputId),
    /// A client acknowledged the configure of a view.
    ConfigureAcked(ViewId),
    /// A layout engine proposed the geometry of the next view of a layout demand.
    LayoutDimensions {
        output: OutputId,
        serial: u32,
        proposal: Rectangle,
    },
    /// A layout engine finished proposing geometry for a layout demand.
    LayoutDemandCommit { output: OutputId, serial: u32 },
    DeadlineReached(Deadline),
}

#[derive(Debug)]
pub struct Root {
    pub(crate) options: Options,

    pub(crate) views: Views,
    /// Every output seen and not yet removed.
    pub(crate) outputs: Outputs,
    /// Outputs contributing to the layout, in activation order.
    pub(crate) active_outputs: Vec<OutputId>,
    pub(crate) output_layout: OutputLayout,

    pub(crate) fallback: Fallback,
    pub(crate) hidden: Hidden,

    pub(crate) inflight_layout_demands: u32,
    pub(crate) inflight_configures: u32,
    /// Pending state changed while a transaction was in flight.
    pub(crate) pending_state_dirty: bool,
    pub(crate) committed_transactions: u64,

    view_ids: IdCounter<ViewId>,
    output_ids: IdCounter<OutputId>,
    layout_serial: u32,
}

impl Root {
    pub fn new(options: Options, scene: &mut impl SceneGraph) -> Self {
        let hidden_tree = scene.create_node(None, NodeOwner::Hidden);
        scene.set_enabled(hidden_tree, false);

        Self {
            fallback: Fallback::new(options.default_tags),
            hidden: Hidden::new(hidden_tree),
            options,
            views: Views::default(),
            outputs: Outputs::default(),
            active_outputs: Vec::new(),
            output_layout: OutputLayout::default(),
            inflight_layout_demands: 0,
            inflight_configures: 0,
            pending_state_dirty: false,
            committed_transactions: 0,
            view_ids: IdCounter::new(),
            output_ids: IdCounter::new(),
            layout_serial: 0,
        }
    }

    /// Processes one event from the outside.
    pub fn step(&mut self, backend: &mut impl Backend, event: Event) {
        let _span = tracy_client::span!("Root::step");
        trace!("{event:?}");

        match event {
            Event::NewOutput { name, size } => {
                self.add_output(backend, name, size);
            }
            Event::OutputRemoved(output) => self.remove_output(backend, output),
            Event::ConfigureAcked(view) => self.notify_configured(backend, view),
            Event::LayoutDimensions {
                output,
                serial,
                proposal,
            } => {
                if let Err(err) = self.push_layout_dimensions(output, serial, proposal) {
                    debug!("ignoring layout dimensions for {output}: {err}");
                }
            }
            Event::LayoutDemandCommit { output, serial } => {
                self.commit_layout_demand(backend, output, serial);
            }
            Event::DeadlineReached(Deadline::Configures) => self.configure_timeout(backend),
            Event::DeadlineReached(Deadline::LayoutDemand(output)) => {
                self.layout_demand_timeout(backend, output);
            }
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn views(&self) -> &Views {
        &self.views
    }

    pub fn view(&self, id: ViewId) -> Option<&View> {
        self.views.get(id)
    }

    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    pub fn output(&self, id: OutputId) -> Option<&Output> {
        self.outputs.get(id)
    }

    pub fn output_by_name(&self, name: &str) -> Option<OutputId> {
        self.outputs.by_name(name).map(Output::id)
    }

    pub fn active_outputs(&self) -> &[OutputId] {
        &self.active_outputs
    }

    pub fn output_layout(&self) -> &OutputLayout {
        &self.output_layout
    }

    pub fn fallback(&self) -> &Fallback {
        &self.fallback
    }

    pub fn hidden(&self) -> &Hidden {
        &self.hidden
    }

    pub fn inflight_layout_demands(&self) -> u32 {
        self.inflight_layout_demands
    }

    pub fn inflight_configures(&self) -> u32 {
        self.inflight_configures
    }

    pub fn pending_state_dirty(&self) -> bool {
        self.pending_state_dirty
    }

    /// Number of transactions committed so far.
    pub fn committed_transactions(&self) -> u64 {
        self.committed_transactions
    }

    pub fn transaction_state(&self) -> TransactionState {
        if self.inflight_layout_demands > 0 {
            TransactionState::AwaitingLayout
        } else if self.inflight_configures > 0 {
            TransactionState::AwaitingConfigures
        } else {
            TransactionState::Idle
        }
    }

    pub(crate) fn next_layout_serial(&mut self) -> u32 {
        self.layout_serial = self.layout_serial.wrapping_add(1);
        self.layout_serial
    }

    pub(crate) fn pending_stacks_mut(&mut self, owner: StackOwner) -> &mut Stacks {
        match owner {
            StackOwner::Hidden => &mut self.hidden.pending,
            StackOwner::Fallback => &mut self.fallback.pending,
            StackOwner::Output(output) => &mut self.outputs[output].pending.stacks,
        }
    }

    /// Creates an unmapped view, held in the hidden area.
    pub fn new_view(&mut self, scene: &mut impl SceneGraph) -> ViewId {
        let id = self.view_ids.next();
        let view = View::new(id, self.hidden.tree, scene);
        self.views.insert(view);

        self.hidden.pending.prepend(id);
        self.hidden.inflight.prepend(id);

        debug!("new {id}");
        id
    }

    /// Maps a view onto `output`, or onto the first active output if `None`.
    ///
    /// Without active outputs the view goes to the fallback area. A view without tags gets the
    /// tags of wherever it lands.
    pub fn map_view(&mut self, id: ViewId, output: Option<OutputId>) {
        let view = &mut self.views[id];
        assert!(!view.mapped, "{id} is already mapped");
        assert!(!view.destroying, "{id} is being destroyed");
        view.mapped = true;
        view.float_box = view.pending.geometry;

        let output = match output {
            Some(output) if self.active_outputs.contains(&output) => Some(output),
            Some(output) => {
                warn!("cannot map {id} on inactive {output}");
                self.active_outputs.first().copied()
            }
            None => self.active_outputs.first().copied(),
        };

        match output {
            Some(output) => {
                if view.pending.tags.is_empty() {
                    view.pending.tags = self.outputs[output].pending.tags;
                }
                self.set_pending_output(id, output);
            }
            None => {
                debug!("no output available for {id}, adding it to the fallback stacks");
                if view.pending.tags.is_empty() {
                    view.pending.tags = self.fallback.tags;
                }
                let owner = view.pending_owner;
                view.pending_owner = StackOwner::Fallback;
                view.pending.output = None;
                self.pending_stacks_mut(owner).remove(id);

                let stacks = &mut self.fallback.pending;
                match self.options.attach_mode {
                    AttachMode::Top => stacks.wm.prepend(id),
                    AttachMode::Bottom => stacks.wm.append(id),
                }
                stacks.focus.prepend(id);
            }
        }
    }

    /// Unmaps a view, moving it to the hidden area.
    pub fn unmap_view(&mut self, id: ViewId) {
        let view = &mut self.views[id];
        if !view.mapped {
            return;
        }
        view.mapped = false;

        let owner = view.pending_owner;
        view.pending_owner = StackOwner::Hidden;
        view.pending.output = None;
        self.pending_stacks_mut(owner).remove(id);
        self.hidden.pending.prepend(id);

        debug!("unmapped {id}");
    }

    /// Destroys a view as soon as no transaction references it anymore.
    pub fn destroy_view(&mut self, scene: &mut impl SceneGraph, id: ViewId) {
        self.unmap_view(id);

        let view = &mut self.views[id];
        view.destroying = true;

        if view.inflight_owner == StackOwner::Hidden && !view.awaiting_configure {
            self.destroy_view_now(scene, id);
        } else {
            debug!("deferring destruction of {id} until the next commit");
        }
    }

    pub(crate) fn destroy_view_now(&mut self, scene: &mut impl SceneGraph, id: ViewId) {
        let Some(view) = self.views.remove(id) else {
            return;
        };
        assert!(view.destroying);
        assert_eq!(view.pending_owner, StackOwner::Hidden);
        assert_eq!(view.inflight_owner, StackOwner::Hidden);

        self.hidden.pending.remove(id);
        self.hidden.inflight.remove(id);
        scene.destroy_node(view.tree.popups);
        scene.destroy_node(view.tree.window);

        debug!("destroyed {id}");
    }

    /// Destroys every view that was waiting for a transaction to let go of it.
    pub(crate) fn destroy_doomed_views(&mut self, scene: &mut impl SceneGraph) {
        let doomed: Vec<_> = self
            .hidden
            .inflight
            .focus
            .iter()
            .filter(|id| {
                let view = &self.views[*id];
                view.destroying
                    && view.pending_owner == StackOwner::Hidden
                    && !view.awaiting_configure
            })
            .collect();

        for id in doomed {
            self.destroy_view_now(scene, id);
        }
    }

    /// Moves a view to the top of its focus stack.
    pub fn focus_view(&mut self, id: ViewId) {
        let owner = self.views[id].pending_owner;
        let focus = &mut self.pending_stacks_mut(owner).focus;
        focus.remove(id);
        focus.prepend(id);
    }

    pub fn set_view_tags(&mut self, id: ViewId, tags: Tags) {
        if tags.is_empty() {
            warn!("ignoring empty tags for {id}");
            return;
        }
        self.views[id].pending.tags = tags;
    }

    pub fn set_view_float(&mut self, id: ViewId, float: bool) {
        self.views[id].pending.float = float;
    }

    pub fn set_view_fullscreen(&mut self, id: ViewId, fullscreen: bool) {
        self.views[id].pending.fullscreen = fullscreen;
    }

    pub fn set_view_resizing(&mut self, id: ViewId, resizing: bool) {
        self.views[id].pending.resizing = resizing;
    }

    pub fn set_view_geometry(&mut self, id: ViewId, mut geometry: Rectangle) {
        let view = &mut self.views[id];
        geometry.size = view.constraints.apply(geometry.size);
        view.pending.geometry = geometry;
    }

    pub fn set_view_constraints(&mut self, id: ViewId, constraints: SizeConstraints) {
        let view = &mut self.views[id];
        view.constraints = constraints;
        view.pending.geometry.size = constraints.apply(view.pending.geometry.size);
    }

    pub fn move_view_to_output(&mut self, id: ViewId, output: OutputId) {
        if !self.active_outputs.contains(&output) {
            warn!("cannot move {id} to inactive {output}");
            return;
        }
        if !self.views[id].mapped {
            warn!("cannot move unmapped {id} to {output}");
            return;
        }
        self.set_pending_output(id, output);
    }

    pub fn set_output_tags(&mut self, output: OutputId, tags: Tags) {
        if tags.is_empty() {
            warn!("ignoring empty tags for {output}");
            return;
        }
        self.outputs[output].pending.tags = tags;
    }

    /// Attaches a layout engine to an output, or detaches it with `None`.
    pub fn set_output_layout(&mut self, output: OutputId, namespace: Option<String>) {
        self.outputs[output].layout_namespace = namespace;
    }

    /// Sets the area of an output not covered by exclusive layer surfaces.
    pub fn set_usable_area(&mut self, output: OutputId, mut area: Rectangle) {
        let output = &mut self.outputs[output];
        area.clamp_into(output.full_area(), 0);
        output.usable_area = area;
    }

    /// Moves a view into the pending stacks of an output.
    pub(crate) fn set_pending_output(&mut self, id: ViewId, output: OutputId) {
        let owner = self.views[id].pending_owner;
        self.pending_stacks_mut(owner).remove(id);

        let view = &mut self.views[id];
        view.pending.output = Some(output);
        view.pending_owner = StackOwner::Output(output);

        let output = &mut self.outputs[output];
        match self.options.attach_mode {
            AttachMode::Top => output.pending.stacks.wm.prepend(id),
            AttachMode::Bottom => output.pending.stacks.wm.append(id),
        }
        output.pending.stacks.focus.prepend(id);

        if view.pending.float {
            view.pending
                .geometry
                .clamp_into(output.usable_area, self.options.border_width);
        }
    }

    #[cfg(test)]
    pub fn verify_invariants(&self) {
        use std::collections::HashMap;

        use crate::view::ViewState;

        let mut pending = HashMap::new();
        let mut inflight = HashMap::new();

        let record = |map: &mut HashMap<ViewId, StackOwner>, owner, stacks: &Stacks| {
            assert_eq!(
                stacks.focus.len(),
                stacks.wm.len(),
                "focus and wm stacks of {owner:?} must hold the same views"
            );
            for id in stacks.focus.iter() {
                assert!(stacks.wm.contains(id));
                let old = map.insert(id, owner);
                assert!(old.is_none(), "{id} is in two stacks: {old:?} and {owner:?}");
            }
        };

        record(&mut pending, StackOwner::Hidden, &self.hidden.pending);
        record(&mut pending, StackOwner::Fallback, &self.fallback.pending);
        record(&mut inflight, StackOwner::Hidden, &self.hidden.inflight);
        record(&mut inflight, StackOwner::Fallback, &self.fallback.inflight);

        let mut demands = 0;
        for output in self.outputs.iter() {
            let id = output.id();
            let owner = StackOwner::Output(id);
            record(&mut pending, owner, &output.pending.stacks);
            record(&mut inflight, owner, &output.inflight.stacks);

            if self.active_outputs.contains(&id) {
                assert!(!output.pending.tags.is_empty());
            } else {
                assert!(output.pending.stacks.is_empty(), "inactive {id} has views");
                assert!(output.inflight.stacks.is_empty(), "inactive {id} has views");
                assert!(output.layout_demand.is_none());
            }

            if let Some(fullscreen) = output.inflight.fullscreen {
                assert!(output.inflight.stacks.focus.contains(fullscreen));
            }

            if output.layout_demand.is_some() {
                demands += 1;
            }
        }
        assert_eq!(demands, self.inflight_layout_demands);

        let check_phase = |owner: StackOwner, state: &ViewState, id: ViewId| match owner {
            StackOwner::Hidden | StackOwner::Fallback => {
                assert_eq!(state.output, None, "{id} in {owner:?} must have no output");
            }
            StackOwner::Output(output) => {
                assert_eq!(state.output, Some(output));
                assert!(
                    self.active_outputs.contains(&output),
                    "{id} is on inactive {output}"
                );
            }
        };

        let mut awaiting = 0;
        for view in self.views.iter() {
            let id = view.id();
            assert_eq!(pending.remove(&id), Some(view.pending_owner));
            assert_eq!(inflight.remove(&id), Some(view.inflight_owner));

            check_phase(view.pending_owner, &view.pending, id);
            check_phase(view.inflight_owner, &view.inflight, id);

            if let Some(output) = view.current.output {
                assert!(
                    self.active_outputs.contains(&output),
                    "{id} is shown on inactive {output}"
                );
            }

            assert_eq!(
                view.mapped,
                view.pending_owner != StackOwner::Hidden,
                "only unmapped views may be pending in the hidden area"
            );
            if view.destroying {
                assert!(!view.mapped);
            }

            if view.awaiting_configure {
                awaiting += 1;
            }
        }
        assert!(pending.is_empty(), "stacks hold dead views: {pending:?}");
        assert!(inflight.is_empty(), "stacks hold dead views: {inflight:?}");
        assert_eq!(awaiting, self.inflight_configures);

        if !self.active_outputs.is_empty() {
            assert!(self.fallback.pending.is_empty());
        }
        assert!(!self.fallback.tags.is_empty());

        for (idx, id) in self.active_outputs.iter().enumerate() {
            assert!(self.outputs.get(*id).is_some());
            assert!(!self.active_outputs[idx + 1..].contains(id));
            assert!(self.output_layout.geometry(*id).is_some());
        }

        if self.pending_state_dirty {
            assert_ne!(self.transaction_state(), TransactionState::Idle);
        }
    }
}
