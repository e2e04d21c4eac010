//! Replaying scripted actions against the headless backend.

use std::collections::HashMap;

use anyhow::{bail, Context as _};
use sluice_ipc::Action;

use crate::backend::Headless;
use crate::output::OutputId;
use crate::root::{Event, Root};
use crate::utils::{Size, Tags};
use crate::view::ViewId;

/// Performs script actions, mapping script-local view numbers to views.
#[derive(Debug, Default)]
pub struct ScriptRunner {
    views: HashMap<u32, ViewId>,
}

impl ScriptRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn view(&self, root: &Root, n: u32) -> anyhow::Result<ViewId> {
        let id = *self
            .views
            .get(&n)
            .with_context(|| format!("view {n} was never created"))?;
        if root.view(id).is_none() {
            bail!("view {n} was destroyed");
        }
        Ok(id)
    }

    fn output(&self, root: &Root, name: &str) -> anyhow::Result<OutputId> {
        root.output_by_name(name)
            .with_context(|| format!("no output named {name}"))
    }

    pub fn perform(
        &mut self,
        root: &mut Root,
        backend: &mut Headless,
        action: &Action,
    ) -> anyhow::Result<()> {
        let _span = tracy_client::span!("ScriptRunner::perform");
        debug!("performing {action:?}");

        match action {
            Action::AddOutput {
                name,
                width,
                height,
            } => {
                let event = Event::NewOutput {
                    name: name.clone(),
                    size: Size::new(*width, *height),
                };
                root.step(backend, event);
            }
            Action::RemoveOutput { name } => {
                let id = self.output(root, name)?;
                root.step(backend, Event::OutputRemoved(id));
            }
            Action::NewView { view } => {
                if self.views.get(view).is_some_and(|id| root.view(*id).is_some()) {
                    bail!("view {view} already exists");
                }
                let id = root.new_view(backend);
                self.views.insert(*view, id);
            }
            Action::MapView { view, output } => {
                let id = self.view(root, *view)?;
                let output = output
                    .as_deref()
                    .map(|name| self.output(root, name))
                    .transpose()?;
                root.map_view(id, output);
            }
            Action::UnmapView { view } => {
                let id = self.view(root, *view)?;
                root.unmap_view(id);
            }
            Action::DestroyView { view } => {
                let id = self.view(root, *view)?;
                root.destroy_view(backend, id);
            }
            Action::FocusView { view } => {
                let id = self.view(root, *view)?;
                root.focus_view(id);
            }
            Action::SetViewTags { view, tags } => {
                let id = self.view(root, *view)?;
                root.set_view_tags(id, Tags(*tags));
            }
            Action::SetViewFloat { view, float } => {
                let id = self.view(root, *view)?;
                root.set_view_float(id, *float);
            }
            Action::SetViewFullscreen { view, fullscreen } => {
                let id = self.view(root, *view)?;
                root.set_view_fullscreen(id, *fullscreen);
            }
            Action::SetViewGeometry { view, rect } => {
                let id = self.view(root, *view)?;
                root.set_view_geometry(id, (*rect).into());
            }
            Action::SetOutputTags { output, tags } => {
                let id = self.output(root, output)?;
                root.set_output_tags(id, Tags(*tags));
            }
            Action::SetOutputLayout { output, namespace } => {
                let id = self.output(root, output)?;
                root.set_output_layout(id, namespace.clone());
            }
            Action::ApplyPending => root.apply_pending(backend),
            Action::AckConfigure { view } => {
                let id = self.view(root, *view)?;
                if backend.take_configure(id).is_some() {
                    root.step(backend, Event::ConfigureAcked(id));
                } else {
                    warn!("view {view} has no outstanding configure");
                }
            }
            Action::AckAllConfigures => {
                for id in backend.take_configures() {
                    root.step(backend, Event::ConfigureAcked(id));
                }
            }
            Action::LayoutAnswer { output, proposals } => {
                let id = self.output(root, output)?;
                let demand = backend
                    .take_layout_demand(id)
                    .with_context(|| format!("no layout demand outstanding on {output}"))?;

                for proposal in proposals {
                    let event = Event::LayoutDimensions {
                        output: id,
                        serial: demand.serial,
                        proposal: (*proposal).into(),
                    };
                    root.step(backend, event);
                }
                let event = Event::LayoutDemandCommit {
                    output: id,
                    serial: demand.serial,
                };
                root.step(backend, event);
            }
            Action::ConfigureOutputs(conf) => {
                let result = root.configure_outputs(backend, conf);
                for head in &result.heads {
                    match &head.result {
                        Ok(()) => info!("{:?} of {} succeeded", conf.mode, head.output),
                        Err(err) => info!("{:?} of {} failed: {err}", conf.mode, head.output),
                    }
                }
            }
        }

        Ok(())
    }
}
