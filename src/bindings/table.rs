//! Per-context trigger table.
//!
//! Alongside the bindings themselves the table keeps a prefix index mapping
//! every strict prefix of a registered sequence to the sequences extending
//! it, so a lookup never scans the whole table.
//!
//! One sequence may carry several bindings in the same context, one per
//! (scheme, kind) slot. Which of them applies is decided at lookup time.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use super::binding::Binding;
use crate::keys::TriggerSequence;

/// Result of looking a (possibly partial) sequence up in a table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TableMatch {
    NoMatch,
    /// The sequence is a strict prefix of at least one longer binding.
    /// `exact` holds a binding for the sequence itself, if there is one;
    /// it fires only if the continuation times out.
    Partial { exact: Option<Binding> },
    Full(Binding),
}

impl TableMatch {
    pub fn is_match(&self) -> bool {
        !matches!(self, Self::NoMatch)
    }
}

/// All bindings of one context, keyed by trigger sequence.
#[derive(Clone, Debug)]
pub struct BindingTable {
    context_id: String,
    bindings: HashMap<TriggerSequence, Vec<Binding>>,
    prefixes: HashMap<TriggerSequence, BTreeSet<String>>,
    // formal string -> sequence, keeps prefix index entries orderable
    formal: HashMap<String, TriggerSequence>,
}

impl BindingTable {
    pub fn new(context_id: impl Into<String>) -> Self {
        Self {
            context_id: context_id.into(),
            bindings: HashMap::new(),
            prefixes: HashMap::new(),
            formal: HashMap::new(),
        }
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    pub fn len(&self) -> usize {
        self.bindings.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Insert a binding, returning the one it replaced. Only a binding with
    /// the same sequence, scheme and kind is replaced.
    ///
    /// The binding's context id is rewritten to this table's context.
    pub fn insert(&mut self, mut binding: Binding) -> Option<Binding> {
        binding.context_id = self.context_id.clone();
        let sequence = binding.sequence.clone();
        let slot = self.bindings.entry(sequence.clone()).or_default();
        if let Some(existing) = slot
            .iter_mut()
            .find(|b| b.scheme_id == binding.scheme_id && b.kind == binding.kind)
        {
            return Some(std::mem::replace(existing, binding));
        }

        let first = slot.is_empty();
        slot.push(binding);
        if first {
            let key = sequence.format();
            for prefix in sequence.strict_prefixes() {
                self.prefixes.entry(prefix).or_default().insert(key.clone());
            }
            self.formal.insert(key, sequence);
        }
        None
    }

    /// Remove exactly this binding. Other bindings registered for the same
    /// sequence are left alone.
    pub fn remove(&mut self, binding: &Binding) -> bool {
        let Some(slot) = self.bindings.get_mut(&binding.sequence) else {
            return false;
        };
        let Some(position) = slot.iter().position(|b| b == binding) else {
            return false;
        };
        slot.remove(position);
        if slot.is_empty() {
            self.remove_sequence(&binding.sequence);
        }
        true
    }

    /// Remove every binding for `sequence`, whatever its scheme.
    pub fn remove_sequence(&mut self, sequence: &TriggerSequence) -> Vec<Binding> {
        let Some(removed) = self.bindings.remove(sequence) else {
            return Vec::new();
        };
        let key = sequence.format();
        for prefix in sequence.strict_prefixes() {
            if let Some(extensions) = self.prefixes.get_mut(&prefix) {
                extensions.remove(&key);
                if extensions.is_empty() {
                    self.prefixes.remove(&prefix);
                }
            }
        }
        self.formal.remove(&key);
        removed
    }

    /// Every binding registered for exactly `sequence`, in insertion order.
    pub fn get(&self, sequence: &TriggerSequence) -> &[Binding] {
        self.bindings.get(sequence).map(Vec::as_slice).unwrap_or_default()
    }

    /// Bindings ordered by their formal sequence string, then scheme.
    pub fn bindings(&self) -> Vec<&Binding> {
        let mut all: Vec<&Binding> = self.bindings.values().flatten().collect();
        all.sort_by(|a, b| {
            a.sequence
                .format()
                .cmp(&b.sequence.format())
                .then_with(|| a.scheme_id.cmp(&b.scheme_id))
                .then_with(|| a.kind.cmp(&b.kind))
        });
        all
    }

    /// Bindings whose sequences strictly extend `sequence`, in formal-string order.
    pub fn extensions_of(&self, sequence: &TriggerSequence) -> Vec<&Binding> {
        self.prefixes
            .get(sequence)
            .map(|keys| {
                keys.iter()
                    .filter_map(|k| self.formal.get(k))
                    .filter_map(|seq| self.bindings.get(seq))
                    .flatten()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Lookup over every binding, preferring User over System.
    pub fn lookup(&self, sequence: &TriggerSequence) -> TableMatch {
        self.lookup_with(sequence, |_| true, |a, b| b.kind.cmp(&a.kind))
    }

    /// Lookup considering only bindings accepted by `is_active`. When several
    /// active bindings share the sequence, the one `compare` orders first
    /// (`Less` wins) is the exact match.
    pub fn lookup_with<F, C>(
        &self,
        sequence: &TriggerSequence,
        is_active: F,
        compare: C,
    ) -> TableMatch
    where
        F: Fn(&Binding) -> bool,
        C: Fn(&Binding, &Binding) -> Ordering,
    {
        let exact = self
            .get(sequence)
            .iter()
            .filter(|b| is_active(b))
            .min_by(|a, b| compare(a, b))
            .cloned();
        let has_longer = self
            .extensions_of(sequence)
            .into_iter()
            .any(|b| is_active(b));

        match (exact, has_longer) {
            (exact, true) => TableMatch::Partial { exact },
            (Some(binding), false) => TableMatch::Full(binding),
            (None, false) => TableMatch::NoMatch,
        }
    }
}
