//! Binding contexts and the set of currently active ones.
//!
//! Contexts form a tree through their `parent` ids. Activating a context
//! implicitly activates every ancestor, so a binding in "window" stays live
//! while "dialog" (child of "window") is the focused scope.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, warn};

use crate::config::{Config, ConfigIssue};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindingContext {
    pub id: String,
    pub name: String,
    pub parent: Option<String>,
}

impl BindingContext {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }
}

/// Known contexts plus the explicitly activated subset.
#[derive(Debug, Default)]
pub struct ContextManager {
    contexts: Vec<BindingContext>,
    id_to_index: HashMap<String, usize>,
    activated: BTreeSet<String>,
}

impl ContextManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or redefine) a context.
    pub fn define(&mut self, context: BindingContext) {
        if let Some(&index) = self.id_to_index.get(&context.id) {
            self.contexts[index] = context;
        } else {
            self.id_to_index
                .insert(context.id.clone(), self.contexts.len());
            self.contexts.push(context);
        }
    }

    pub fn get(&self, id: &str) -> Option<&BindingContext> {
        self.id_to_index.get(id).and_then(|&i| self.contexts.get(i))
    }

    pub fn is_defined(&self, id: &str) -> bool {
        self.id_to_index.contains_key(id)
    }

    pub fn contexts(&self) -> &[BindingContext] {
        &self.contexts
    }

    /// Returns true if the context was not already active.
    pub fn activate(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if !self.is_defined(&id) {
            debug!(context_id = %id, "Activating undefined context");
        }
        self.activated.insert(id)
    }

    pub fn deactivate(&mut self, id: &str) -> bool {
        self.activated.remove(id)
    }

    pub fn deactivate_all(&mut self) {
        self.activated.clear();
    }

    /// `id` followed by its ancestors, nearest first. Stops on a cycle.
    pub fn ancestors(&self, id: &str) -> Vec<String> {
        let mut chain = vec![id.to_string()];
        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(id);

        let mut current = self.get(id).and_then(|c| c.parent.as_deref());
        while let Some(parent) = current {
            if !seen.insert(parent) {
                warn!(context_id = id, parent = parent, "Context parent cycle");
                break;
            }
            chain.push(parent.to_string());
            current = self.get(parent).and_then(|c| c.parent.as_deref());
        }
        chain
    }

    /// Distance from the root of the context tree; roots have depth 0.
    pub fn depth(&self, id: &str) -> usize {
        self.ancestors(id).len() - 1
    }

    /// Explicitly activated contexts plus all of their ancestors.
    pub fn active_set(&self) -> BTreeSet<String> {
        self.activated
            .iter()
            .flat_map(|id| self.ancestors(id))
            .collect()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.activated
            .iter()
            .any(|active| self.ancestors(active).iter().any(|a| a == id))
    }

    /// Define the configured contexts and activate the configured set.
    pub fn apply_config(&mut self, config: &Config) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        for (index, entry) in config.contexts.iter().enumerate() {
            if entry.id.trim().is_empty() {
                issues.push(ConfigIssue::new("contexts", index, "context id is empty"));
                continue;
            }
            let context = BindingContext {
                id: entry.id.clone(),
                name: entry.name.clone().unwrap_or_else(|| entry.id.clone()),
                parent: entry.parent.clone(),
            };
            self.define(context);
        }

        for (index, entry) in config.contexts.iter().enumerate() {
            if let Some(parent) = &entry.parent {
                if !self.is_defined(parent) {
                    issues.push(ConfigIssue::new(
                        "contexts",
                        index,
                        format!("parent context '{}' is not defined", parent),
                    ));
                }
            }
        }

        self.deactivate_all();
        for (index, id) in config.active_contexts.iter().enumerate() {
            if !self.is_defined(id) {
                issues.push(ConfigIssue::new(
                    "activeContexts",
                    index,
                    format!("context '{}' is not defined", id),
                ));
                continue;
            }
            self.activate(id.clone());
        }

        issues
    }
}
