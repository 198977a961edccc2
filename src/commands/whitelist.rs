//! Set of command ids eligible for macro capture.
//!
//! The set is owned by an external registry; the dispatcher only reads it.
//! Clones share the same underlying set, so the owner can `replace` it while
//! the dispatcher keeps its handle.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;

#[derive(Clone, Debug, Default)]
pub struct CommandWhitelist {
    ids: Arc<RwLock<HashSet<String>>>,
}

impl CommandWhitelist {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: Arc::new(RwLock::new(ids.into_iter().map(Into::into).collect())),
        }
    }

    /// Swap in a refreshed set of ids.
    pub fn replace<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.ids.write() = ids.into_iter().map(Into::into).collect();
    }

    pub fn contains(&self, command_id: &str) -> bool {
        self.ids.read().contains(command_id)
    }

    pub fn len(&self) -> usize {
        self.ids.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.read().is_empty()
    }

    /// Sorted copy of the ids.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.ids.read().iter().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_refreshes() {
        let whitelist = CommandWhitelist::new(["edit.copy"]);
        let reader = whitelist.clone();
        assert!(reader.contains("edit.copy"));

        whitelist.replace(["edit.paste", "edit.cut"]);
        assert!(!reader.contains("edit.copy"));
        assert_eq!(reader.ids(), vec!["edit.cut", "edit.paste"]);
    }
}
