//! # Configuration
//!
//! Parameters the user can tune at runtime with the `set` command of the host, or load from a
//! JSON file when the extension starts.

use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{ExtensionError, Result};

/// Whether glibc protects its singly linked free lists with safe-linking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafeLinking {
    /// Decide by the glibc version
    #[default]
    Auto,
    On,
    Off,
}

impl FromStr for SafeLinking {
    type Err = ExtensionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(SafeLinking::Auto),
            "on" => Ok(SafeLinking::On),
            "off" => Ok(SafeLinking::Off),
            other => Err(ExtensionError::InvalidConfigurationValue {
                name: "safe-linking".to_string(),
                value: other.to_string(),
                expected: "auto, on or off",
            }),
        }
    }
}

impl Display for SafeLinking {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SafeLinking::Auto => "auto",
            SafeLinking::On => "on",
            SafeLinking::Off => "off",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Also snapshot the return address registers on every stop
    pub show_retaddr_reg: bool,
    /// glibc version to assume instead of detecting it, like `2.31`
    pub glibc: Option<String>,
    pub safe_linking: SafeLinking,
}

impl Config {
    pub const PARAMETERS: [&'static str; 3] = ["show-retaddr-reg", "glibc", "safe-linking"];

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("loading config from {}", path.display());
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    /// Set a parameter from its textual value, as given to `set <name> <value>`
    ///
    /// # Errors
    ///
    /// Fails if there is no parameter `name` or if `value` does not parse for it.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match name {
            "show-retaddr-reg" => self.show_retaddr_reg = parse_bool(name, value)?,
            "glibc" => {
                self.glibc = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
            "safe-linking" => self.safe_linking = value.parse()?,
            other => return Err(ExtensionError::UnknownParameter(other.to_string())),
        }
        debug!("set {name} to {value:?}");
        Ok(())
    }

    /// Textual value of a parameter, as `show <name>` prints it
    pub fn show(&self, name: &str) -> Result<String> {
        Ok(match name {
            "show-retaddr-reg" => (if self.show_retaddr_reg { "on" } else { "off" }).to_string(),
            "glibc" => self.glibc.clone().unwrap_or_default(),
            "safe-linking" => self.safe_linking.to_string(),
            other => return Err(ExtensionError::UnknownParameter(other.to_string())),
        })
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "on" | "1" | "yes" | "enable" | "true" => Ok(true),
        "off" | "0" | "no" | "disable" | "false" => Ok(false),
        _ => Err(ExtensionError::InvalidConfigurationValue {
            name: name.to_string(),
            value: value.to_string(),
            expected: "on or off",
        }),
    }
}
