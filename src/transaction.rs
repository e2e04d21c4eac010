//! Transactions moving state from pending through inflight to current.
//!
//! Only one transaction is in flight at a time:
//!
//! 1. [`Root::apply_pending`] snapshots pending into inflight and starts layout demands.
//! 2. Once every layout demand finished, configures are sent to the affected clients.
//! 3. Once every configure was acknowledged, or the configure deadline passed, inflight becomes
//!    current and the scene graph is updated to match.
//!
//! Calling [`Root::apply_pending`] during a transaction marks the pending state dirty, and a
//! single new transaction starts right after the commit.

use crate::backend::{Backend, ConfigureChanges, Deadline, GrabKind};
use crate::root::{Root, TransactionState};
use crate::utils::Rectangle;
use crate::view::{StackOwner, View, ViewId};

impl Root {
    /// Starts a transaction for the current pending state.
    pub fn apply_pending(&mut self, backend: &mut impl Backend) {
        let _span = tracy_client::span!("Root::apply_pending");

        // Focus must be recomputed even if the transaction is delayed.
        backend.resync_focus();

        if self.transaction_state() != TransactionState::Idle {
            trace!("transaction in flight, marking pending state dirty");
            self.pending_state_dirty = true;
            return;
        }
        self.pending_state_dirty = false;

        debug!("starting transaction");

        for id in self.hidden.pending.focus.iter() {
            let view = &mut self.views[id];
            assert_eq!(view.pending.output, None);
            view.inflight = view.pending;
            view.inflight_owner = StackOwner::Hidden;
        }
        self.hidden.inflight = self.hidden.pending.clone();

        for id in self.fallback.pending.focus.iter() {
            let view = &mut self.views[id];
            assert_eq!(view.pending.output, None);
            view.inflight = view.pending;
            view.inflight_owner = StackOwner::Fallback;
        }
        self.fallback.inflight = self.fallback.pending.clone();

        let border_width = self.options.border_width;
        for &output_id in &self.active_outputs {
            let output = &mut self.outputs[output_id];
            let usable_area = output.usable_area;
            let full_area = output.full_area();

            let mut fullscreen = None;
            for id in output.pending.stacks.focus.iter() {
                let view = &mut self.views[id];
                assert_eq!(view.pending.output, Some(output_id));

                apply_mode_switches(view, usable_area, full_area, border_width);

                // First in focus order wins.
                if fullscreen.is_none()
                    && view.pending.fullscreen
                    && view.pending.tags.intersects(output.pending.tags)
                {
                    fullscreen = Some(id);
                }

                view.inflight = view.pending;
                view.inflight_owner = StackOwner::Output(output_id);
            }

            output.inflight.tags = output.pending.tags;
            output.inflight.fullscreen = fullscreen;
            output.inflight.stacks = output.pending.stacks.clone();
        }

        self.start_layout_demands(backend);

        // Interactive operations that no longer make sense go back to passthrough.
        for grab in backend.interactive_grabs() {
            let Some(view) = self.views.get_mut(grab.view) else {
                backend.end_interactive_grab(grab.seat);
                continue;
            };

            let valid = match view.inflight.output {
                Some(output) => {
                    let output = &self.outputs[output];
                    view.inflight.tags.intersects(output.inflight.tags)
                        && (view.inflight.float || output.layout_namespace.is_none())
                        && !view.inflight.fullscreen
                }
                None => false,
            };

            if !valid {
                debug!("ending {:?} of {} on {:?}", grab.kind, view.id(), grab.seat);
                backend.end_interactive_grab(grab.seat);
                if grab.kind == GrabKind::Resize {
                    view.pending.resizing = false;
                    view.inflight.resizing = false;
                }
            }
        }

        if self.inflight_layout_demands == 0 {
            self.send_configures(backend);
        }
    }

    pub(crate) fn send_configures(&mut self, backend: &mut impl Backend) {
        let _span = tracy_client::span!("Root::send_configures");

        assert_eq!(self.inflight_layout_demands, 0);
        assert_eq!(self.inflight_configures, 0);

        for &output_id in &self.active_outputs {
            let output = &self.outputs[output_id];
            for id in output.inflight.stacks.focus.iter() {
                let view = &mut self.views[id];
                if !view.mapped {
                    continue;
                }

                let changes = ConfigureChanges::between(&view.current, &view.inflight);
                if backend.configure(id, &view.inflight, changes) {
                    trace!("sent configure to {id}: {changes:?}");
                    self.inflight_configures += 1;
                    view.awaiting_configure = true;
                    view.save_surface(backend);
                }
            }
        }

        if self.inflight_configures > 0 {
            debug!(
                "waiting for {} configures to be acknowledged",
                self.inflight_configures
            );
            backend.arm(Deadline::Configures, self.options.configure_timeout);
        } else {
            self.commit_transaction(backend);
        }
    }

    /// Handles a client acknowledging the configure of a view.
    pub(crate) fn notify_configured(&mut self, backend: &mut impl Backend, id: ViewId) {
        let Some(view) = self.views.get_mut(id) else {
            debug!("ignoring configure ack of destroyed {id}");
            return;
        };

        if !view.awaiting_configure {
            trace!("ignoring stale configure ack of {id}");
            return;
        }
        view.awaiting_configure = false;

        assert!(self.inflight_configures > 0);
        self.inflight_configures -= 1;

        if self.inflight_configures == 0 {
            backend.disarm(Deadline::Configures);
            self.commit_transaction(backend);
        }
    }

    pub(crate) fn configure_timeout(&mut self, backend: &mut impl Backend) {
        if self.inflight_configures == 0 {
            trace!("ignoring configure deadline without a transaction");
            return;
        }

        warn!(
            "transaction timed out with {} configures outstanding",
            self.inflight_configures
        );

        for view in self.views.iter_mut() {
            view.awaiting_configure = false;
        }
        self.inflight_configures = 0;

        self.commit_transaction(backend);
    }

    fn commit_transaction(&mut self, backend: &mut impl Backend) {
        let _span = tracy_client::span!("Root::commit_transaction");

        assert_eq!(self.inflight_layout_demands, 0);
        assert_eq!(self.inflight_configures, 0);

        let hidden_tree = self.hidden.tree;
        for id in self
            .hidden
            .inflight
            .wm
            .iter()
            .chain(self.fallback.inflight.wm.iter())
        {
            let view = &mut self.views[id];
            assert_eq!(view.inflight.output, None);

            backend.reparent(view.tree.window, hidden_tree);
            backend.reparent(view.tree.popups, hidden_tree);
            view.update_current(backend);
        }

        for &output_id in &self.active_outputs {
            let output = &mut self.outputs[output_id];
            output.current.tags = output.inflight.tags;

            let tree = output.tree;
            let current_fullscreen = output.current.fullscreen;
            let inflight_fullscreen = output.inflight.fullscreen;

            for id in output.inflight.stacks.focus.iter() {
                let view = &mut self.views[id];

                let is_fullscreen = inflight_fullscreen == Some(id);
                let left_fullscreen = current_fullscreen == Some(id) && !is_fullscreen;
                if view.current.output != view.inflight.output
                    || left_fullscreen
                    || view.current.float != view.inflight.float
                {
                    let layer = if is_fullscreen {
                        tree.fullscreen
                    } else if view.inflight.float {
                        tree.floating
                    } else {
                        tree.tiled
                    };
                    backend.reparent(view.tree.window, layer);
                    backend.reparent(view.tree.popups, tree.popups);
                }

                view.update_current(backend);

                let enabled = view.current.tags.intersects(output.current.tags);
                backend.set_enabled(view.tree.window, enabled);
                backend.set_enabled(view.tree.popups, enabled);

                if !is_fullscreen {
                    backend.lower_to_bottom(view.tree.window);
                }
            }

            if current_fullscreen != inflight_fullscreen {
                if let Some(id) = inflight_fullscreen {
                    backend.reparent(self.views[id].tree.window, tree.fullscreen);
                }
                output.current.fullscreen = inflight_fullscreen;
                backend.set_enabled(tree.fullscreen, inflight_fullscreen.is_some());
            }
        }

        backend.refresh_cursor_state();

        self.destroy_doomed_views(backend);

        self.committed_transactions += 1;
        debug!("committed transaction {}", self.committed_transactions);

        if self.pending_state_dirty {
            self.apply_pending(backend);
        }
    }

    /// Commits right away if deactivating an output resolved the last outstanding configure.
    pub(crate) fn commit_if_configures_drained(&mut self, backend: &mut impl Backend, had: u32) {
        if had > 0 && self.inflight_configures == 0 {
            debug!("last outstanding configure was on a deactivated output");
            backend.disarm(Deadline::Configures);
            self.commit_transaction(backend);
        }
    }
}

/// Saves and restores the floating and pre-fullscreen geometry when a view changes modes.
///
/// Fullscreen views always cover the full area of the output they are on, so any box restored
/// while fullscreen is kept for when the view leaves fullscreen.
fn apply_mode_switches(
    view: &mut View,
    usable_area: Rectangle,
    full_area: Rectangle,
    border_width: i32,
) {
    let was_fullscreen = view.current.fullscreen;
    // Geometry outside of fullscreen.
    let resting = if was_fullscreen {
        view.post_fullscreen_box
    } else {
        view.current.geometry
    };

    let mut restored = None;
    if view.current.float && !view.pending.float {
        view.float_box = resting;
    } else if !view.current.float && view.pending.float {
        let mut geometry = view.float_box;
        geometry.clamp_into(usable_area, border_width);
        restored = Some(geometry);
    }

    if view.pending.fullscreen {
        if let Some(geometry) = restored {
            view.post_fullscreen_box = geometry;
        } else if !was_fullscreen {
            view.post_fullscreen_box = view.current.geometry;
        }
        view.pending.geometry = full_area;
    } else if was_fullscreen {
        let mut geometry = restored.unwrap_or(view.post_fullscreen_box);
        geometry.clamp_into(usable_area, border_width);
        view.pending.geometry = geometry;
    } else if let Some(geometry) = restored {
        view.pending.geometry = geometry;
    }
}
