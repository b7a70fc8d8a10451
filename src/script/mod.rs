//! Abstract code loading for game plugins.
//!
//! The lifecycle manager never touches the interpreter directly; it depends
//! on [`CodeLoader`] so the concrete mechanism (embedded Lua here, a dynamic
//! library or subprocess elsewhere) stays swappable without changing the
//! state machine.

pub mod lua;

use crate::lifecycle::fault::{HookFault, TeardownError};
use crate::lifecycle::registry::CodeRegistrySnapshot;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

static NEXT_MODULE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one loaded game module.
///
/// A fresh id is allocated per successful load, so playing the same game
/// twice yields two observably distinct instances and stale references can
/// never be mistaken for live ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(u64);

impl ModuleId {
    /// Allocate the next process-unique id
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_MODULE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Why a game's entry code failed to load
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read game script: {0}")]
    Io(#[from] std::io::Error),

    #[error("game script error: {0}")]
    Script(String),

    #[error("game script must return a module table")]
    NotAModule,

    #[error("game module is missing required hook '{0}'")]
    MissingHook(&'static str),
}

/// One loaded game module with its four lifecycle hooks.
///
/// Dropping the module releases the code and hook references held for it,
/// making the loaded code unreachable.
pub trait GameModule {
    fn instance_id(&self) -> ModuleId;

    /// One-time setup. A failure aborts the load.
    fn call_load(&mut self) -> Result<(), HookFault>;

    /// Per-frame logic. A failure faults the game.
    fn call_update(&mut self) -> Result<(), HookFault>;

    /// Per-frame voluntary-exit query. A failure faults the game.
    fn call_should_close(&mut self) -> Result<bool, HookFault>;

    /// One-time teardown of game-owned resources. Failures are contained by
    /// the caller, never rethrown.
    fn call_unload(&mut self) -> Result<(), HookFault>;
}

/// Capability the lifecycle manager depends on for loading, evicting and
/// reclaiming game code
pub trait CodeLoader {
    /// Identity set of all currently loaded modules
    fn snapshot(&self) -> CodeRegistrySnapshot;

    /// Load a freshly identified module from an entry script path and
    /// validate its hook surface
    fn load_from_path(&mut self, path: &Path) -> Result<Box<dyn GameModule>, LoadError>;

    /// Clear the state of, then remove, every live module absent from the
    /// snapshot. Must be exhaustive: no introduced module may survive.
    fn evict_introduced(&mut self, snapshot: &CodeRegistrySnapshot) -> Result<(), TeardownError>;

    /// Synchronous reclamation pass over unreachable memory, run after the
    /// module references have been dropped
    fn collect_garbage(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_ids_are_unique_and_increasing() {
        let a = ModuleId::next();
        let b = ModuleId::next();
        let c = ModuleId::next();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
    }

    #[test]
    fn test_load_error_messages() {
        assert_eq!(
            LoadError::MissingHook("update").to_string(),
            "game module is missing required hook 'update'"
        );
        assert!(LoadError::Script("oops".to_string())
            .to_string()
            .contains("oops"));
    }
}
