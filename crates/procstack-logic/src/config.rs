//! Generic hierarchical key/value config tree with typed getters.
//!
//! Model definitions arrive as a tree of named nodes. Each node carries
//! an ordered list of key/value pairs (keys may repeat) and an ordered
//! list of child nodes (names may repeat too). The rest of the crate
//! treats this as an opaque typed-lookup service: ask for a field with a
//! default, get the default (and a logged configuration error) when the
//! field is absent or malformed.
//!
//! The wire form is JSON, loaded the same way the rest of the workspace
//! loads data documents — `serde_json::from_str` on a string the caller
//! hands in. The tree itself is format-agnostic; nothing downstream
//! knows or cares that JSON was involved.
//!
//! ```
//! use procstack_logic::config::ConfigNode;
//!
//! let node = ConfigNode::from_json(
//!     r#"{"name":"MODEL","values":[["diameter","2.5"]],"nodes":[]}"#,
//! ).unwrap();
//! assert_eq!(node.f32_or("diameter", 1.0), 2.5);
//! assert_eq!(node.f32_or("height", 1.0), 1.0);
//! ```

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::diag::{self, ModelError};

/// One node in the config tree: a name, repeatable key/value pairs,
/// and child nodes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigNode {
    pub name: String,
    #[serde(default)]
    pub values: Vec<(String, String)>,
    #[serde(default)]
    pub nodes: Vec<ConfigNode>,
}

impl ConfigNode {
    /// Parse a JSON document into a config tree.
    ///
    /// Malformed input is a configuration error; the caller decides
    /// whether to fall back to an empty tree.
    pub fn from_json(source: &str) -> Result<ConfigNode, ModelError> {
        serde_json::from_str(source)
            .map_err(|e| ModelError::Configuration(format!("config source did not parse: {e}")))
    }

    /// First raw value for `key`, if present.
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All raw values for `key`, in document order. Repeated keys are
    /// how the format expresses arrays.
    pub fn raw_all(&self, key: &str) -> Vec<&str> {
        self.values
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// String value for `key`, or `default` when absent.
    pub fn str_or(&self, key: &str, default: &str) -> String {
        self.raw(key).unwrap_or(default).to_string()
    }

    /// String value for `key`, `None` when absent. No diagnostic —
    /// optional fields are allowed to be missing.
    pub fn str_opt(&self, key: &str) -> Option<String> {
        self.raw(key).map(str::to_string)
    }

    /// Float value for `key`; `default` (with a logged configuration
    /// error) when malformed, `default` silently when absent.
    pub fn f32_or(&self, key: &str, default: f32) -> f32 {
        match self.raw(key) {
            None => default,
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                diag::config_fallback(
                    format!("node '{}': '{key}' = '{raw}' is not a float", self.name),
                    default,
                )
            }),
        }
    }

    /// Float value for `key`, `None` when absent or malformed.
    pub fn f32_opt(&self, key: &str) -> Option<f32> {
        let raw = self.raw(key)?;
        match raw.trim().parse() {
            Ok(v) => Some(v),
            Err(_) => diag::config_fallback(
                format!("node '{}': '{key}' = '{raw}' is not a float", self.name),
                None,
            ),
        }
    }

    /// Integer value for `key`, with the same fallback rules as
    /// [`ConfigNode::f32_or`].
    pub fn i32_or(&self, key: &str, default: i32) -> i32 {
        match self.raw(key) {
            None => default,
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                diag::config_fallback(
                    format!("node '{}': '{key}' = '{raw}' is not an integer", self.name),
                    default,
                )
            }),
        }
    }

    /// Boolean value for `key` ("true"/"false", case-insensitive).
    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        match self.raw(key) {
            None => default,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => true,
                "false" => false,
                _ => diag::config_fallback(
                    format!("node '{}': '{key}' = '{raw}' is not a bool", self.name),
                    default,
                ),
            },
        }
    }

    /// Vector value for `key`, written as "x, y, z".
    pub fn vec3_or(&self, key: &str, default: Vec3) -> Vec3 {
        match self.raw(key) {
            None => default,
            Some(raw) => {
                let parts: Vec<f32> = raw
                    .split(',')
                    .filter_map(|p| p.trim().parse().ok())
                    .collect();
                if parts.len() == 3 {
                    Vec3::new(parts[0], parts[1], parts[2])
                } else {
                    diag::config_fallback(
                        format!("node '{}': '{key}' = '{raw}' is not a vector", self.name),
                        default,
                    )
                }
            }
        }
    }

    /// All values for `key` as owned strings (repeated-key array form).
    pub fn strings(&self, key: &str) -> Vec<String> {
        self.raw_all(key).into_iter().map(str::to_string).collect()
    }

    /// First child node named `name`.
    pub fn child(&self, name: &str) -> Option<&ConfigNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// All child nodes named `name`, in document order.
    pub fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ConfigNode> {
        self.nodes.iter().filter(move |n| n.name == name)
    }
}
