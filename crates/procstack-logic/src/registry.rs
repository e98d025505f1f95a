//! Definition registry — parse-once cache with name lookup.
//!
//! The registry parses the config source exactly once (guarded by a
//! loaded flag; `load` is idempotent) into a name → definition map.
//! Lookups hand out `Arc<Definition>` clones; a full [`reload`]
//! invalidates everything previously returned — callers must re-fetch.
//!
//! This is deliberately an explicit context object, not a process-wide
//! singleton: the host constructs one, owns it, and passes it where
//! needed. Single-threaded by design, like everything else in this
//! crate.
//!
//! [`reload`]: DefinitionRegistry::reload

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ConfigNode;
use crate::definition::Definition;
use crate::diag::{self, ModelError};

/// Process-lifetime cache of parsed model definitions.
#[derive(Debug, Default)]
pub struct DefinitionRegistry {
    loaded: bool,
    by_name: HashMap<String, Arc<Definition>>,
    /// Load order, for stable iteration and diagnostics.
    order: Vec<String>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Parse the config source once. Subsequent calls are no-ops until
    /// [`DefinitionRegistry::reload`]. Each `MODEL` child of the root
    /// becomes one definition; a duplicate name is a configuration
    /// error — logged, skipped, first-loaded entry wins.
    pub fn load(&mut self, source: &str) {
        if self.loaded {
            return;
        }
        self.loaded = true;

        let root = match ConfigNode::from_json(source) {
            Ok(root) => root,
            Err(err) => {
                diag::report(&err);
                return;
            }
        };

        for node in root.children("MODEL") {
            let def = Definition::from_config(node);
            if self.by_name.contains_key(&def.name) {
                diag::report(&ModelError::Configuration(format!(
                    "duplicate model name '{}' skipped (first entry wins)",
                    def.name
                )));
                continue;
            }
            self.order.push(def.name.clone());
            self.by_name.insert(def.name.clone(), def);
        }
    }

    /// Clear the cache and re-parse. Every previously returned
    /// definition reference is conceptually stale after this.
    pub fn reload(&mut self, source: &str) {
        self.by_name.clear();
        self.order.clear();
        self.loaded = false;
        self.load(source);
    }

    /// Look up one definition. A miss is a lookup error: logged,
    /// `None` returned.
    pub fn get(&self, name: &str) -> Option<Arc<Definition>> {
        match self.by_name.get(name) {
            Some(def) => Some(def.clone()),
            None => diag::lookup_fallback(format!("no model definition named '{name}'"), None),
        }
    }

    /// Resolve a group of names: de-duplicates while preserving
    /// first-seen order, skips (and logs) missing names.
    pub fn get_many(&self, names: &[&str]) -> Vec<Arc<Definition>> {
        let mut seen: Vec<&str> = Vec::new();
        let mut out = Vec::new();
        for &name in names {
            if seen.contains(&name) {
                continue;
            }
            seen.push(name);
            if let Some(def) = self.get(name) {
                out.push(def);
            }
        }
        out
    }

    /// All definitions in load order.
    pub fn all(&self) -> Vec<Arc<Definition>> {
        self.order
            .iter()
            .filter_map(|n| self.by_name.get(n).cloned())
            .collect()
    }
}
