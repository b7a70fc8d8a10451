//! Snapshot of the loaded-code registry.
//!
//! Captured strictly before any game code executes, consumed exactly once at
//! teardown: every module identity present in the live registry but absent
//! from the snapshot was introduced by the game and must be evicted.

use std::collections::BTreeSet;

/// Immutable identity set of loaded code modules at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeRegistrySnapshot {
    modules: BTreeSet<String>,
}

impl CodeRegistrySnapshot {
    /// Capture a snapshot from the live registry's module names
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            modules: names.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Compute the modules the game introduced: everything live that the
    /// snapshot does not contain
    pub fn introduced<'a, I>(&self, live: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        live.into_iter()
            .filter(|name| !self.contains(name))
            .map(str::to_string)
            .collect()
    }

    /// Iterate the captured module names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(String::as_str)
    }
}
