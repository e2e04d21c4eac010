//! Types for scripting and configuring the sluice compositor core.
//!
//! A script is a JSON array of [`Step`]s. Each step waits for its delay, then performs its
//! [`Action`]. Views are referred to by script-local numbers assigned in [`Action::NewView`];
//! outputs are referred to by their connector name.
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};

/// One scripted step.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Step {
    /// Milliseconds to wait after the previous step before performing this one.
    #[serde(default)]
    pub delay_ms: u64,
    /// What to do.
    pub action: Action,
}

/// A full script.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct Script(pub Vec<Step>);

/// Action performed by a script step.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Action {
    /// Plug in an output.
    AddOutput {
        /// Connector name.
        name: String,
        /// Effective resolution width.
        width: i32,
        /// Effective resolution height.
        height: i32,
    },
    /// Unplug an output.
    RemoveOutput {
        /// Connector name.
        name: String,
    },
    /// Create a new, unmapped view.
    NewView {
        /// Script-local number for the view.
        view: u32,
    },
    /// Map a view, optionally onto a specific output.
    MapView {
        /// Script-local view number.
        view: u32,
        /// Connector name of the target output.
        #[serde(default)]
        output: Option<String>,
    },
    /// Unmap a view.
    UnmapView {
        /// Script-local view number.
        view: u32,
    },
    /// Destroy a view once no transaction references it anymore.
    DestroyView {
        /// Script-local view number.
        view: u32,
    },
    /// Move a view to the top of its focus stack.
    FocusView {
        /// Script-local view number.
        view: u32,
    },
    /// Change the tags of a view.
    SetViewTags {
        /// Script-local view number.
        view: u32,
        /// New tag bitmask.
        tags: u32,
    },
    /// Change the floating state of a view.
    SetViewFloat {
        /// Script-local view number.
        view: u32,
        /// Whether the view floats.
        float: bool,
    },
    /// Change the fullscreen state of a view.
    SetViewFullscreen {
        /// Script-local view number.
        view: u32,
        /// Whether the view is fullscreen.
        fullscreen: bool,
    },
    /// Change the pending geometry of a view.
    SetViewGeometry {
        /// Script-local view number.
        view: u32,
        /// New geometry.
        rect: Rect,
    },
    /// Change the focused tags of an output.
    SetOutputTags {
        /// Connector name.
        output: String,
        /// New tag bitmask.
        tags: u32,
    },
    /// Attach or detach a layout engine to an output.
    SetOutputLayout {
        /// Connector name.
        output: String,
        /// Layout namespace, `None` to detach.
        #[serde(default)]
        namespace: Option<String>,
    },
    /// Start a transaction for the pending state.
    ApplyPending,
    /// Acknowledge the outstanding configure of a view.
    AckConfigure {
        /// Script-local view number.
        view: u32,
    },
    /// Acknowledge every outstanding configure.
    AckAllConfigures,
    /// Answer the outstanding layout demand of an output.
    LayoutAnswer {
        /// Connector name.
        output: String,
        /// One proposed rectangle per laid out view, in wm stack order.
        proposals: Vec<Rect>,
    },
    /// Test or apply an output configuration.
    ConfigureOutputs(OutputConfiguration),
}

/// Rectangle in logical coordinates.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    /// X coordinate.
    pub x: i32,
    /// Y coordinate.
    pub y: i32,
    /// Width.
    pub width: i32,
    /// Height.
    pub height: i32,
}

/// Output configuration request.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OutputConfiguration {
    /// Whether to only test or to apply the configuration.
    pub mode: ConfigurationMode,
    /// Requested state, one entry per output.
    pub heads: Vec<HeadConfiguration>,
}

/// Whether an output configuration is only tested or also applied.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurationMode {
    /// Check whether the configuration would be accepted, without changing anything.
    Test,
    /// Apply the configuration.
    Apply,
}

/// Requested state of a single output.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HeadConfiguration {
    /// Connector name.
    pub output: String,
    /// Whether the output should be on.
    pub enabled: bool,
    /// Requested mode size, `None` to keep the current one.
    #[serde(default)]
    pub mode: Option<ModeSize>,
    /// Requested position in the global space, `None` for automatic placement.
    #[serde(default)]
    pub position: Option<Position>,
}

/// Size of an output mode.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ModeSize {
    /// Width in logical pixels.
    pub width: i32,
    /// Height in logical pixels.
    pub height: i32,
}

/// Position in the global space.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// X coordinate.
    pub x: i32,
    /// Y coordinate.
    pub y: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_script() {
        let script: Script = serde_json::from_str(
            r#"[
                { "action": { "AddOutput": { "name": "HEADLESS-1", "width": 1920, "height": 1080 } } },
                { "action": { "NewView": { "view": 1 } } },
                { "action": { "MapView": { "view": 1 } } },
                { "action": "ApplyPending" },
                { "delay_ms": 16, "action": "AckAllConfigures" }
            ]"#,
        )
        .unwrap();

        assert_eq!(script.0.len(), 5);
        assert_eq!(script.0[0].delay_ms, 0);
        assert_eq!(
            script.0[2].action,
            Action::MapView {
                view: 1,
                output: None
            }
        );
        assert_eq!(script.0[4].delay_ms, 16);
    }

    #[test]
    fn parse_output_configuration() {
        let action: Action = serde_json::from_str(
            r#"{ "ConfigureOutputs": {
                "mode": "Apply",
                "heads": [
                    { "output": "DP-1", "enabled": true, "position": { "x": 0, "y": 0 } },
                    { "output": "DP-2", "enabled": false }
                ]
            } }"#,
        )
        .unwrap();

        let Action::ConfigureOutputs(conf) = action else {
            panic!("wrong action parsed");
        };
        assert_eq!(conf.mode, ConfigurationMode::Apply);
        assert_eq!(conf.heads[0].position, Some(Position { x: 0, y: 0 }));
        assert!(!conf.heads[1].enabled);
        assert_eq!(conf.heads[1].mode, None);
    }
}
