//! Layout demands: asking a layout engine for the geometry of the tiled views of an output.

use crate::backend::{Backend, Deadline, LayoutRequest};
use crate::output::OutputId;
use crate::root::Root;
use crate::utils::Rectangle;
use crate::view::ViewId;

/// Outstanding layout demand of one output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutDemand {
    pub serial: u32,
    /// Views being laid out, in inflight wm stack order.
    pub views: Vec<ViewId>,
    proposals: Vec<Rectangle>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("proposed dimensions for {proposed} views, but {expected} views are laid out")]
    CountMismatch { proposed: usize, expected: usize },
    #[error("serial {serial} does not match the outstanding layout demand")]
    StaleSerial { serial: u32 },
}

impl LayoutDemand {
    fn new(serial: u32, views: Vec<ViewId>) -> Self {
        Self {
            serial,
            views,
            proposals: Vec::new(),
        }
    }
}

impl Root {
    pub(crate) fn start_layout_demands(&mut self, backend: &mut impl Backend) {
        for idx in 0..self.active_outputs.len() {
            let output = self.active_outputs[idx];
            self.start_layout_demand(backend, output);
        }
    }

    fn start_layout_demand(&mut self, backend: &mut impl Backend, output_id: OutputId) {
        let output = &self.outputs[output_id];
        let Some(namespace) = output.layout_namespace.clone() else {
            return;
        };
        assert!(output.layout_demand.is_none());

        let views: Vec<_> = output
            .inflight
            .stacks
            .wm
            .iter()
            .filter(|id| {
                let view = &self.views[*id];
                !view.inflight.float
                    && !view.inflight.fullscreen
                    && view.inflight.tags.intersects(output.inflight.tags)
            })
            .collect();

        if views.is_empty() {
            return;
        }

        let usable_size = output.usable_area.size;
        let tags = output.inflight.tags;
        let request = LayoutRequest {
            serial: self.next_layout_serial(),
            namespace,
            view_count: u32::try_from(views.len()).unwrap_or(u32::MAX),
            usable_size,
            tags,
        };

        if let Err(err) = backend.start_layout_demand(output_id, &request) {
            error!("error starting layout demand for {output_id}: {err:?}");
            return;
        }

        debug!(
            "started layout demand {} for {} views on {output_id}",
            request.serial, request.view_count
        );

        self.outputs[output_id].layout_demand = Some(LayoutDemand::new(request.serial, views));
        self.inflight_layout_demands += 1;
        backend.arm(
            Deadline::LayoutDemand(output_id),
            self.options.layout_demand_timeout,
        );
    }

    pub(crate) fn push_layout_dimensions(
        &mut self,
        output: OutputId,
        serial: u32,
        proposal: Rectangle,
    ) -> Result<(), LayoutError> {
        let demand = self
            .outputs
            .get_mut(output)
            .and_then(|o| o.layout_demand.as_mut())
            .filter(|d| d.serial == serial)
            .ok_or(LayoutError::StaleSerial { serial })?;

        demand.proposals.push(proposal);
        Ok(())
    }

    pub(crate) fn commit_layout_demand(
        &mut self,
        backend: &mut impl Backend,
        output_id: OutputId,
        serial: u32,
    ) {
        let Some(output) = self.outputs.get_mut(output_id) else {
            debug!("ignoring layout commit for removed {output_id}");
            return;
        };

        let Some(demand) = output.layout_demand.take_if(|d| d.serial == serial) else {
            let err = LayoutError::StaleSerial { serial };
            debug!("ignoring layout commit for {output_id}: {err}");
            return;
        };
        backend.disarm(Deadline::LayoutDemand(output_id));

        if demand.proposals.len() != demand.views.len() {
            let err = LayoutError::CountMismatch {
                proposed: demand.proposals.len(),
                expected: demand.views.len(),
            };
            error!("layout engine error on {output_id}: {err}");
            backend.layout_error(output_id, &err);
        } else {
            let offset = output.usable_area.loc;
            let border_width = self.options.border_width;

            for (&id, proposal) in demand.views.iter().zip(&demand.proposals) {
                let view = &mut self.views[id];

                let mut geometry = *proposal;
                geometry.loc.x += offset.x + border_width;
                geometry.loc.y += offset.y + border_width;
                geometry.size.w -= 2 * border_width;
                geometry.size.h -= 2 * border_width;
                geometry.size = view.constraints.apply(geometry.size);

                trace!("layout placed {id} at {geometry}");
                view.inflight.geometry = geometry;
                if !view.pending.float && !view.pending.fullscreen {
                    view.pending.geometry = geometry;
                }
            }
        }

        self.notify_layout_demand_done(backend);
    }

    pub(crate) fn layout_demand_timeout(&mut self, backend: &mut impl Backend, output_id: OutputId) {
        let Some(demand) = self
            .outputs
            .get_mut(output_id)
            .and_then(|o| o.layout_demand.take())
        else {
            trace!("ignoring layout deadline of {output_id} without a demand");
            return;
        };

        warn!("layout demand {} on {output_id} timed out", demand.serial);
        backend.cancel_layout_demand(output_id, demand.serial);
        self.notify_layout_demand_done(backend);
    }

    /// Drops the outstanding layout demand of an output, if any.
    pub(crate) fn cancel_layout_demand(&mut self, backend: &mut impl Backend, output_id: OutputId) {
        let Some(demand) = self.outputs[output_id].layout_demand.take() else {
            return;
        };

        debug!("canceling layout demand {} on {output_id}", demand.serial);
        backend.cancel_layout_demand(output_id, demand.serial);
        backend.disarm(Deadline::LayoutDemand(output_id));
        self.notify_layout_demand_done(backend);
    }

    fn notify_layout_demand_done(&mut self, backend: &mut impl Backend) {
        assert!(self.inflight_layout_demands > 0);
        self.inflight_layout_demands -= 1;

        if self.inflight_layout_demands == 0 {
            debug!("all layout demands finished");
            self.send_configures(backend);
        }
    }
}
