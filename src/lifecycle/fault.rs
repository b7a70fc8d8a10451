//! Fault taxonomy for the plugin lifecycle.
//!
//! Every hook call site inside the manager produces a typed outcome; no
//! plugin-originated error is ever rethrown past the manager boundary.

use std::fmt;
use thiserror::Error;

/// The four lifecycle hooks every game must expose
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Load,
    Update,
    ShouldClose,
    Unload,
}

impl Hook {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Hook::Load => "load",
            Hook::Update => "update",
            Hook::ShouldClose => "should_close",
            Hook::Unload => "unload",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fault raised by game code inside one hook invocation
#[derive(Debug, Clone, Error)]
#[error("{hook} hook raised: {message}")]
pub struct HookFault {
    pub hook: Hook,
    pub message: String,
    pub traceback: Option<String>,
}

impl HookFault {
    #[must_use]
    pub fn new(hook: Hook, message: impl Into<String>) -> Self {
        Self {
            hook,
            message: message.into(),
            traceback: None,
        }
    }

    #[must_use]
    pub fn with_traceback(mut self, traceback: impl Into<String>) -> Self {
        self.traceback = Some(traceback.into());
        self
    }
}

/// Which lifecycle window a contained fault belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Entry code failed to load, validate or initialize
    Load,
    /// `update`/`should_close` raised during normal operation
    Runtime,
    /// The game's own `unload` hook raised
    Unload,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FaultKind::Load => "load fault",
            FaultKind::Runtime => "runtime fault",
            FaultKind::Unload => "unload fault",
        };
        f.write_str(s)
    }
}

/// Operator-visible record of a contained game fault
#[derive(Debug, Clone)]
pub struct FaultReport {
    /// Display name of the game that faulted
    pub game: String,
    pub kind: FaultKind,
    pub message: String,
    pub traceback: Option<String>,
}

impl fmt::Display for FaultReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in '{}': {}", self.kind, self.game, self.message)
    }
}

impl FaultReport {
    #[must_use]
    pub fn new(game: impl Into<String>, kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            game: game.into(),
            kind,
            message: message.into(),
            traceback: None,
        }
    }

    #[must_use]
    pub fn from_hook(game: impl Into<String>, kind: FaultKind, fault: HookFault) -> Self {
        Self {
            game: game.into(),
            kind,
            message: fault.to_string(),
            traceback: fault.traceback,
        }
    }
}

/// Failure inside the manager's own teardown steps (a module resisting
/// eviction, or the registry being unreachable). Logged, never propagated.
#[derive(Debug, Error)]
pub enum TeardownError {
    #[error("failed to evict module '{module}': {message}")]
    Evict { module: String, message: String },

    #[error("module registry unavailable: {0}")]
    Registry(String),
}
