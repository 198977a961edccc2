//! Binding tables across all contexts, schemes, and the context-priority resolver.
//!
//! Resolution order for a sequence:
//! 1. Tables of active contexts are grouped by context depth, deepest first.
//! 2. The first group with any match decides; shallower groups are never
//!    consulted, even if they would also match.
//! 3. Within a group, a partial match anywhere means the dispatcher waits.
//! 4. Competing bindings are ranked by scheme specificity, then
//!    User over System, then context id.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use thiserror::Error;
use tracing::{debug, info, instrument};

use super::binding::Binding;
use super::context::ContextManager;
use super::table::{BindingTable, TableMatch};
use crate::commands::ParameterizedCommand;
use crate::config::{Config, ConfigIssue};
use crate::keys::{Platform, TriggerSequence};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("no binding table for context '{0}'")]
    NoTable(String),
    #[error("unknown scheme '{0}'")]
    UnknownScheme(String),
}

/// Type of binding conflict.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictType {
    /// The sequence is also a strict prefix of a longer sequence in the same
    /// context, so it only fires when the continuation times out.
    PrefixShadow,
    /// Same sequence in two contexts of equal depth with the same scheme
    /// specificity and kind; decided only by context id.
    Ambiguous,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindingConflict {
    pub conflict_type: ConflictType,
    pub sequence: String,
    pub winner: Binding,
    pub loser: Binding,
}

/// Owns every binding table. Tables change only through explicit calls.
#[derive(Debug, Default)]
pub struct BindingTableManager {
    tables: BTreeMap<String, BindingTable>,
    schemes: HashMap<String, Option<String>>,
    active_scheme: Option<String>,
}

impl BindingTableManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table, replacing any existing table for the same context.
    pub fn add_table(&mut self, table: BindingTable) -> Option<BindingTable> {
        self.tables.insert(table.context_id().to_string(), table)
    }

    /// Add an empty table for `context_id` if none exists yet.
    pub fn ensure_table(&mut self, context_id: &str) -> &mut BindingTable {
        self.tables
            .entry(context_id.to_string())
            .or_insert_with(|| BindingTable::new(context_id))
    }

    pub fn remove_table(&mut self, context_id: &str) -> Option<BindingTable> {
        self.tables.remove(context_id)
    }

    pub fn table(&self, context_id: &str) -> Option<&BindingTable> {
        self.tables.get(context_id)
    }

    pub fn table_mut(&mut self, context_id: &str) -> Option<&mut BindingTable> {
        self.tables.get_mut(context_id)
    }

    pub fn tables(&self) -> impl Iterator<Item = &BindingTable> {
        self.tables.values()
    }

    /// Add a binding to its context's table, which must already exist.
    pub fn add_binding(&mut self, binding: Binding) -> Result<Option<Binding>, BindingError> {
        let table = self
            .tables
            .get_mut(&binding.context_id)
            .ok_or_else(|| BindingError::NoTable(binding.context_id.clone()))?;
        Ok(table.insert(binding))
    }

    pub fn remove_binding(&mut self, binding: &Binding) -> bool {
        self.tables
            .get_mut(&binding.context_id)
            .map(|t| t.remove(binding))
            .unwrap_or(false)
    }

    pub fn define_scheme(&mut self, id: impl Into<String>, parent: Option<String>) {
        self.schemes.insert(id.into(), parent);
    }

    pub fn set_active_scheme(&mut self, id: &str) -> Result<(), BindingError> {
        if !self.schemes.contains_key(id) {
            return Err(BindingError::UnknownScheme(id.to_string()));
        }
        self.active_scheme = Some(id.to_string());
        Ok(())
    }

    pub fn active_scheme(&self) -> Option<&str> {
        self.active_scheme.as_deref()
    }

    /// Active scheme followed by its ancestors, most specific first.
    pub fn active_scheme_chain(&self) -> Vec<&str> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.active_scheme.as_deref();
        while let Some(id) = current {
            if !seen.insert(id) {
                break;
            }
            chain.push(id);
            current = self.schemes.get(id).and_then(|p| p.as_deref());
        }
        chain
    }

    /// Rank of a binding's scheme: higher is more specific. `None` if the
    /// scheme is not in the active chain, which makes the binding inactive.
    pub fn scheme_specificity(&self, scheme_id: Option<&str>) -> Option<usize> {
        let Some(scheme_id) = scheme_id else {
            return Some(0);
        };
        let chain = self.active_scheme_chain();
        chain
            .iter()
            .position(|s| *s == scheme_id)
            .map(|pos| chain.len() - pos)
    }

    pub fn is_binding_active(&self, binding: &Binding) -> bool {
        self.scheme_specificity(binding.scheme_id.as_deref()).is_some()
    }

    /// Tables of active contexts, most specific first (ties by context id).
    pub fn active_tables(&self, contexts: &ContextManager) -> Vec<&BindingTable> {
        let active = contexts.active_set();
        let mut tables: Vec<(usize, &BindingTable)> = self
            .tables
            .values()
            .filter(|t| active.contains(t.context_id()))
            .map(|t| (contexts.depth(t.context_id()), t))
            .collect();
        tables.sort_by(|(da, a), (db, b)| {
            db.cmp(da).then_with(|| a.context_id().cmp(b.context_id()))
        });
        tables.into_iter().map(|(_, t)| t).collect()
    }

    /// Resolve a (possibly partial) sequence against the active tables.
    pub fn resolve(&self, contexts: &ContextManager, sequence: &TriggerSequence) -> TableMatch {
        let active = contexts.active_set();
        let mut by_depth: BTreeMap<usize, Vec<&BindingTable>> = BTreeMap::new();
        for table in self.tables.values() {
            if active.contains(table.context_id()) {
                by_depth
                    .entry(contexts.depth(table.context_id()))
                    .or_default()
                    .push(table);
            }
        }

        for (depth, group) in by_depth.iter().rev() {
            let mut exacts: Vec<Binding> = Vec::new();
            let mut partial = false;

            for table in group {
                match table.lookup_with(
                    sequence,
                    |b| self.is_binding_active(b),
                    |a, b| self.compare_priority(a, b),
                ) {
                    TableMatch::NoMatch => {}
                    TableMatch::Partial { exact } => {
                        partial = true;
                        exacts.extend(exact);
                    }
                    TableMatch::Full(binding) => exacts.push(binding),
                }
            }

            if !partial && exacts.is_empty() {
                continue;
            }

            let best = self.best_of(exacts);
            debug!(
                sequence = %sequence,
                depth = depth,
                partial = partial,
                command_id = ?best.as_ref().map(|b| b.command.id()),
                "Resolved key sequence"
            );
            return match (partial, best) {
                (true, exact) => TableMatch::Partial { exact },
                (false, Some(binding)) => TableMatch::Full(binding),
                (false, None) => TableMatch::NoMatch,
            };
        }

        TableMatch::NoMatch
    }

    fn best_of(&self, candidates: Vec<Binding>) -> Option<Binding> {
        candidates
            .into_iter()
            .min_by(|a, b| self.compare_priority(a, b))
    }

    /// `Less` means `a` wins.
    fn compare_priority(&self, a: &Binding, b: &Binding) -> Ordering {
        let sa = self.scheme_specificity(a.scheme_id.as_deref());
        let sb = self.scheme_specificity(b.scheme_id.as_deref());
        sb.cmp(&sa)
            .then_with(|| b.kind.cmp(&a.kind))
            .then_with(|| a.context_id.cmp(&b.context_id))
    }

    /// Every binding across all tables, ordered by context then sequence.
    pub fn bindings(&self) -> Vec<&Binding> {
        self.tables.values().flat_map(|t| t.bindings()).collect()
    }

    /// Find prefix-shadowed and ambiguous bindings among active-scheme bindings.
    pub fn find_conflicts(&self, contexts: &ContextManager) -> Vec<BindingConflict> {
        let mut conflicts = Vec::new();

        for table in self.tables.values() {
            for binding in table.bindings() {
                if !self.is_binding_active(binding) {
                    continue;
                }
                for longer in table.extensions_of(&binding.sequence) {
                    if !self.is_binding_active(longer) {
                        continue;
                    }
                    conflicts.push(BindingConflict {
                        conflict_type: ConflictType::PrefixShadow,
                        sequence: binding.sequence.format(),
                        winner: longer.clone(),
                        loser: binding.clone(),
                    });
                }
            }
        }

        let mut by_sequence: BTreeMap<String, Vec<&Binding>> = BTreeMap::new();
        for binding in self.bindings() {
            if self.is_binding_active(binding) {
                by_sequence
                    .entry(binding.sequence.format())
                    .or_default()
                    .push(binding);
            }
        }

        for (sequence, bindings) in by_sequence {
            for (i, a) in bindings.iter().enumerate() {
                for b in &bindings[i + 1..] {
                    let same_rank = contexts.depth(&a.context_id) == contexts.depth(&b.context_id)
                        && self.scheme_specificity(a.scheme_id.as_deref())
                            == self.scheme_specificity(b.scheme_id.as_deref())
                        && a.kind == b.kind;
                    if !same_rank {
                        continue;
                    }
                    let (winner, loser) = match self.compare_priority(a, b) {
                        Ordering::Greater => (*b, *a),
                        _ => (*a, *b),
                    };
                    conflicts.push(BindingConflict {
                        conflict_type: ConflictType::Ambiguous,
                        sequence: sequence.clone(),
                        winner: winner.clone(),
                        loser: loser.clone(),
                    });
                }
            }
        }

        conflicts
    }

    /// Define schemes, create tables for configured contexts and add the
    /// configured bindings. Invalid entries are skipped and reported.
    #[instrument(skip_all)]
    pub fn apply_config(&mut self, config: &Config, contexts: &ContextManager) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        for scheme in &config.schemes {
            self.define_scheme(scheme.id.clone(), scheme.parent.clone());
        }
        for (index, scheme) in config.schemes.iter().enumerate() {
            if let Some(parent) = &scheme.parent {
                if !self.schemes.contains_key(parent) {
                    issues.push(ConfigIssue::new(
                        "schemes",
                        index,
                        format!("parent scheme '{}' is not defined", parent),
                    ));
                }
            }
        }
        if self.set_active_scheme(&config.active_scheme).is_err() {
            issues.push(ConfigIssue::new(
                "activeScheme",
                0,
                format!("scheme '{}' is not defined", config.active_scheme),
            ));
            self.define_scheme(config.active_scheme.clone(), None);
            self.active_scheme = Some(config.active_scheme.clone());
        }

        for context in contexts.contexts() {
            self.ensure_table(&context.id);
        }

        let platform = Platform::current();
        let mut added = 0usize;
        for (index, entry) in config.bindings.iter().enumerate() {
            let sequence = match TriggerSequence::parse_for_platform(&entry.sequence, platform) {
                Ok(seq) => seq,
                Err(e) => {
                    issues.push(ConfigIssue::new("bindings", index, e.to_string()));
                    continue;
                }
            };
            let command = match ParameterizedCommand::deserialize(entry.command.trim()) {
                Ok(cmd) => cmd.with_parameters(entry.parameters.clone()),
                Err(e) => {
                    issues.push(ConfigIssue::new("bindings", index, e.to_string()));
                    continue;
                }
            };
            if !contexts.is_defined(&entry.context) {
                issues.push(ConfigIssue::new(
                    "bindings",
                    index,
                    format!("context '{}' is not defined", entry.context),
                ));
                continue;
            }
            if let Some(scheme) = &entry.scheme {
                if !self.schemes.contains_key(scheme) {
                    issues.push(ConfigIssue::new(
                        "bindings",
                        index,
                        format!("scheme '{}' is not defined", scheme),
                    ));
                    continue;
                }
            }

            let binding = Binding {
                sequence,
                command,
                context_id: entry.context.clone(),
                scheme_id: entry.scheme.clone(),
                kind: entry.kind,
            };
            match self.add_binding(binding) {
                Ok(Some(replaced)) => {
                    added += 1;
                    issues.push(ConfigIssue::new(
                        "bindings",
                        index,
                        format!(
                            "replaces an earlier binding of {} to '{}' in the same context and scheme",
                            replaced.sequence, replaced.command
                        ),
                    ));
                }
                Ok(None) => added += 1,
                Err(e) => issues.push(ConfigIssue::new("bindings", index, e.to_string())),
            }
        }

        info!(
            bindings = added,
            issues = issues.len(),
            active_scheme = ?self.active_scheme,
            "Applied binding config"
        );
        issues
    }
}
