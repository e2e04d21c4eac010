#[macro_use]
extern crate tracing;

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use miette::{Context as _, IntoDiagnostic as _};

pub mod layout;
pub mod output;
pub mod transactions;

pub use crate::layout::{AttachMode, Layout};
pub use crate::output::{Output, Outputs, Position};
pub use crate::transactions::Transactions;

#[derive(knuffel::Decode, Debug, PartialEq)]
pub struct Config {
    #[knuffel(child, default)]
    pub layout: Layout,
    #[knuffel(child, default)]
    pub transactions: Transactions,
    #[knuffel(children(name = "output"))]
    pub outputs: Outputs,
}

#[derive(Debug, Clone)]
pub enum ConfigPath {
    /// Explicitly set config path.
    ///
    /// Load the config only from this path, fail if it's missing.
    Explicit(PathBuf),

    /// Default config path.
    ///
    /// Prioritize the user path, fall back to the system path, fall back to the built-in defaults.
    Regular {
        /// User config path, usually `$XDG_CONFIG_HOME/sluice/config.kdl`.
        user_path: PathBuf,
        /// System config path, usually `/etc/sluice/config.kdl`.
        system_path: PathBuf,
    },
}

impl Config {
    pub fn load(path: &Path) -> miette::Result<Self> {
        let contents = fs::read_to_string(path)
            .into_diagnostic()
            .with_context(|| format!("error reading {path:?}"))?;

        let config = Self::parse(
            path.file_name()
                .and_then(OsStr::to_str)
                .unwrap_or("config.kdl"),
            &contents,
        )
        .context("error parsing")?;
        debug!("loaded config from {path:?}");
        Ok(config)
    }

    pub fn parse(filename: &str, text: &str) -> Result<Self, knuffel::Error> {
        let _span = tracy_client::span!("Config::parse");
        knuffel::parse(filename, text)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::parse(
            "default-config.kdl",
            include_str!("../../resources/default-config.kdl"),
        )
        .unwrap()
    }
}

impl ConfigPath {
    /// Returns the regular config path pair, if the user config directory can be determined.
    pub fn regular() -> Option<Self> {
        let dirs = directories::ProjectDirs::from("", "", "sluice")?;
        Some(Self::Regular {
            user_path: dirs.config_dir().join("config.kdl"),
            system_path: PathBuf::from("/etc/sluice/config.kdl"),
        })
    }

    /// Loads the config.
    ///
    /// A missing regular config is not an error: the built-in defaults are used instead.
    pub fn load(&self) -> miette::Result<Config> {
        let _span = tracy_client::span!("ConfigPath::load");

        let path = match self {
            ConfigPath::Explicit(path) => path.as_path(),
            ConfigPath::Regular {
                user_path,
                system_path,
            } => {
                if user_path.exists() {
                    user_path.as_path()
                } else if system_path.exists() {
                    system_path.as_path()
                } else {
                    debug!("no config file found, using the default config");
                    return Ok(Config::default());
                }
            }
        };

        Config::load(path).context("error loading config")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[track_caller]
    fn do_parse(text: &str) -> Config {
        Config::parse("test.kdl", text)
            .map_err(miette::Report::new)
            .unwrap()
    }

    #[test]
    fn can_create_default_config() {
        let _ = Config::default();
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = do_parse("");
        assert_eq!(config.layout, Layout::default());
        assert_eq!(config.transactions, Transactions::default());
        assert_eq!(config.transactions.configure_timeout_ms, 200);
        assert_eq!(config.transactions.layout_demand_timeout_ms, 100);
        assert!(config.outputs.0.is_empty());
    }

    #[test]
    fn parse() {
        let parsed = do_parse(
            r##"
            layout {
                border-width 4
                attach-mode "bottom"
                default-tags 6
            }

            transactions {
                configure-timeout-ms 500
                layout-demand-timeout-ms 50
            }

            output "HDMI-A-1" {
                position x=1920 y=0
            }

            output "eDP-1" {
                off
            }
            "##,
        );

        assert_eq!(
            parsed,
            Config {
                layout: Layout {
                    border_width: 4,
                    attach_mode: AttachMode::Bottom,
                    default_tags: 6,
                },
                transactions: Transactions {
                    configure_timeout_ms: 500,
                    layout_demand_timeout_ms: 50,
                },
                outputs: Outputs(vec![
                    Output {
                        off: false,
                        name: String::from("HDMI-A-1"),
                        position: Some(Position { x: 1920, y: 0 }),
                    },
                    Output {
                        off: true,
                        name: String::from("eDP-1"),
                        position: None,
                    },
                ]),
            }
        );
    }

    #[test]
    fn rejects_unknown_attach_mode() {
        let res = Config::parse(
            "test.kdl",
            r#"
            layout {
                attach-mode "sideways"
            }
            "#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn explicit_missing_path_fails() {
        let path = ConfigPath::Explicit(PathBuf::from("/nonexistent/sluice/config.kdl"));
        assert!(path.load().is_err());
    }

    #[test]
    fn regular_missing_paths_fall_back_to_default() {
        let path = ConfigPath::Regular {
            user_path: PathBuf::from("/nonexistent/user/config.kdl"),
            system_path: PathBuf::from("/nonexistent/system/config.kdl"),
        };
        assert_eq!(path.load().unwrap(), Config::default());
    }
}
