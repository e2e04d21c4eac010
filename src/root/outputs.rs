//! Output hot-plug, activation and deactivation.

use std::mem;

use super::Root;
use crate::backend::Backend;
use crate::output::{Output, OutputId};
use crate::utils::Size;
use crate::view::StackOwner;

impl Root {
    /// Registers a newly plugged in output and activates it unless the config turns it off.
    pub fn add_output(
        &mut self,
        backend: &mut impl Backend,
        name: String,
        size: Size,
    ) -> Option<OutputId> {
        if self.outputs.by_name(&name).is_some() {
            warn!("ignoring duplicate output {name}");
            return None;
        }

        let id = self.output_ids.next();
        let mut output = Output::new(id, name, size, backend);

        let config = self.options.outputs.find(&output.name);
        output.requested_position = config
            .and_then(|c| c.position)
            .map(|pos| (pos.x, pos.y).into());
        let off = config.is_some_and(|c| c.off);

        debug!("new {id}: {} {size:?}", output.name);
        self.outputs.insert(output);

        if off {
            debug!("{id} is turned off in the config");
        } else {
            self.activate_output(backend, id);
        }

        Some(id)
    }

    /// Deactivates an unplugged output and releases its scene nodes.
    pub fn remove_output(&mut self, backend: &mut impl Backend, id: OutputId) {
        if self.outputs.get(id).is_none() {
            warn!("ignoring removal of unknown {id}");
            return;
        }

        self.deactivate_output(backend, id);

        if let Some(output) = self.outputs.remove(id) {
            for node in output.tree.nodes() {
                backend.destroy_node(node);
            }
            debug!("removed {id}: {}", output.name);
        }
    }

    pub fn activate_output(&mut self, backend: &mut impl Backend, id: OutputId) {
        if self.active_outputs.contains(&id) {
            return;
        }

        let first = self.active_outputs.is_empty();
        self.active_outputs.push(id);

        let output = &mut self.outputs[id];
        let loc = self
            .output_layout
            .add(id, output.size, output.requested_position);
        backend.set_position(output.tree.tree, loc);
        backend.set_enabled(output.tree.tree, true);

        debug!("activated {id} at {loc:?}");

        if first {
            output.pending.tags = self.fallback.tags;

            let pending = &mut self.fallback.pending;
            for view_id in pending.focus.iter() {
                let view = &mut self.views[view_id];
                view.pending.output = Some(id);
                view.pending_owner = StackOwner::Output(id);
                if view.pending.float {
                    view.pending
                        .geometry
                        .clamp_into(output.usable_area, self.options.border_width);
                }
            }
            output.pending.stacks.prepend_all(pending);

            backend.focus_output(Some(id));
        }

        assert!(self.fallback.pending.is_empty());
    }

    pub fn deactivate_output(&mut self, backend: &mut impl Backend, id: OutputId) {
        let Some(idx) = self.active_outputs.iter().position(|o| *o == id) else {
            return;
        };

        self.active_outputs.remove(idx);
        self.output_layout.remove(id);

        let configures_before = self.inflight_configures;
        let hidden_tree = self.hidden.tree;

        // Views still shown here while already inflight elsewhere.
        for view in self.views.iter_mut() {
            if view.current.output == Some(id) {
                view.current.output = None;
                backend.reparent(view.tree.window, hidden_tree);
                backend.reparent(view.tree.popups, hidden_tree);
            }
        }

        let output = &mut self.outputs[id];
        backend.set_enabled(output.tree.tree, false);

        // Views shown on this output go to the hidden area right away.
        for view_id in output.inflight.stacks.focus.iter() {
            let view = &mut self.views[view_id];
            view.inflight.output = None;
            view.current.output = None;
            view.inflight_owner = StackOwner::Hidden;
            backend.reparent(view.tree.window, hidden_tree);
            backend.reparent(view.tree.popups, hidden_tree);

            // Nobody waits for this configure anymore.
            if view.awaiting_configure {
                view.awaiting_configure = false;
                self.inflight_configures -= 1;
            }
        }
        self.hidden.inflight.prepend_all(&mut output.inflight.stacks);
        output.inflight.fullscreen = None;
        output.current.fullscreen = None;
        backend.set_enabled(output.tree.fullscreen, false);

        let mut pending = mem::take(&mut output.pending.stacks);
        match self.active_outputs.first().copied() {
            Some(target) => {
                debug!("moving views of {id} to {target}");
                for view_id in pending.focus.iter().rev() {
                    self.set_pending_output(view_id, target);
                }
            }
            None => {
                debug!("moving views of {id} to the fallback area");
                for view_id in pending.focus.iter() {
                    let view = &mut self.views[view_id];
                    view.pending.output = None;
                    view.pending_owner = StackOwner::Fallback;
                }
                self.fallback.pending.prepend_all(&mut pending);
                self.fallback.tags = self.outputs[id].pending.tags;
            }
        }

        backend.close_layer_surfaces(id);
        backend.redirect_focus(id, self.active_outputs.first().copied());

        self.cancel_layout_demand(backend, id);
        self.commit_if_configures_drained(backend, configures_before);

        if self.inflight_layout_demands == 0 && self.inflight_configures == 0 {
            self.destroy_doomed_views(backend);
        }
    }
}
