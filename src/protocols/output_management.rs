//! Output configuration requests: test or apply a new state for a set of outputs.
//!
//! Every head is validated and handled on its own, a failing head never aborts the others.

use std::collections::HashSet;

use sluice_ipc::{ConfigurationMode, HeadConfiguration, OutputConfiguration};

use crate::backend::Backend;
use crate::output::OutputId;
use crate::root::Root;
use crate::utils::{Point, Size};

/// State requested for one output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadState {
    pub enabled: bool,
    pub size: Size,
    /// `None` for automatic placement.
    pub position: Option<Point>,
}

#[derive(Debug, thiserror::Error)]
pub enum HeadError {
    #[error("no output named {0}")]
    UnknownOutput(String),
    #[error("output {0} was configured twice")]
    AlreadyConfigured(String),
    #[error("position {x},{y} is negative")]
    NegativePosition { x: i32, y: i32 },
    #[error("mode {w}x{h} is invalid")]
    InvalidMode { w: i32, h: i32 },
    #[error("the device rejected the state")]
    Rejected,
    #[error("error committing the state: {0:?}")]
    Commit(anyhow::Error),
}

#[derive(Debug)]
pub struct HeadResult {
    pub output: String,
    pub result: Result<(), HeadError>,
}

#[derive(Debug)]
pub struct ConfigurationResult {
    pub heads: Vec<HeadResult>,
}

impl ConfigurationResult {
    pub fn succeeded(&self) -> bool {
        self.heads.iter().all(|head| head.result.is_ok())
    }
}

impl Root {
    /// Tests or applies an output configuration.
    ///
    /// Applying runs [`Root::apply_pending`] once afterwards, regardless of per-head failures.
    pub fn configure_outputs(
        &mut self,
        backend: &mut impl Backend,
        conf: &OutputConfiguration,
    ) -> ConfigurationResult {
        let _span = tracy_client::span!("Root::configure_outputs");

        let mut seen = HashSet::new();
        let mut heads = Vec::with_capacity(conf.heads.len());

        for head in &conf.heads {
            let result = if seen.insert(head.output.as_str()) {
                self.configure_head(backend, conf.mode, head)
            } else {
                Err(HeadError::AlreadyConfigured(head.output.clone()))
            };

            if let Err(err) = &result {
                warn!("error configuring output {}: {err}", head.output);
            }

            heads.push(HeadResult {
                output: head.output.clone(),
                result,
            });
        }

        if conf.mode == ConfigurationMode::Apply {
            self.apply_pending(backend);
        }

        ConfigurationResult { heads }
    }

    fn configure_head(
        &mut self,
        backend: &mut impl Backend,
        mode: ConfigurationMode,
        head: &HeadConfiguration,
    ) -> Result<(), HeadError> {
        let id = self
            .output_by_name(&head.output)
            .ok_or_else(|| HeadError::UnknownOutput(head.output.clone()))?;
        let output = &self.outputs[id];

        let position = head.position.map(|pos| Point::new(pos.x, pos.y));
        if head.enabled {
            if let Some(Point { x, y }) = position {
                if x < 0 || y < 0 {
                    return Err(HeadError::NegativePosition { x, y });
                }
            }
        }

        let size = match head.mode {
            Some(mode) if mode.width <= 0 || mode.height <= 0 => {
                return Err(HeadError::InvalidMode {
                    w: mode.width,
                    h: mode.height,
                })
            }
            Some(mode) => Size::new(mode.width, mode.height),
            None => output.size,
        };

        let state = HeadState {
            enabled: head.enabled,
            size,
            position,
        };

        match mode {
            ConfigurationMode::Test => {
                if backend.test_output_state(id, &state) {
                    Ok(())
                } else {
                    Err(HeadError::Rejected)
                }
            }
            ConfigurationMode::Apply => {
                backend
                    .commit_output_state(id, &state)
                    .map_err(HeadError::Commit)?;
                self.apply_head_state(backend, id, state);
                Ok(())
            }
        }
    }

    fn apply_head_state(&mut self, backend: &mut impl Backend, id: OutputId, state: HeadState) {
        if !state.enabled {
            self.deactivate_output(backend, id);
            return;
        }

        let output = &mut self.outputs[id];
        output.set_size(state.size);
        output.requested_position = state.position;

        if self.active_outputs.contains(&id) {
            let loc = self.output_layout.add(id, output.size, state.position);
            backend.set_position(output.tree.tree, loc);
        } else {
            self.activate_output(backend, id);
        }
    }
}
