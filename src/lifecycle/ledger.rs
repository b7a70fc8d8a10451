//! Snapshot of the shared drawable-object list.
//!
//! The ledger is captured before a game loads and restores the scene to
//! exactly the captured contents at teardown: additions the game made are
//! discarded, removals are undone. Restoration replaces the whole list, it
//! never merges, and it preserves node identity (the same `Rc`s come back).

use crate::scene::{Scene, SceneNode};
use std::rc::Rc;

/// Copy of the drawable list taken immediately before a game load
#[derive(Debug)]
pub struct SceneObjectLedger {
    objects: Vec<SceneNode>,
}

impl SceneObjectLedger {
    /// Capture the current drawable list
    #[must_use]
    pub fn capture(scene: &Scene) -> Self {
        Self {
            objects: scene.objects().to_vec(),
        }
    }

    /// Reset the scene to the captured contents, consuming the ledger
    pub fn restore(self, scene: &mut Scene) {
        scene.replace_objects(self.objects);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Identity comparison against a live scene, element for element
    #[must_use]
    pub fn matches(&self, scene: &Scene) -> bool {
        self.objects.len() == scene.objects().len()
            && self
                .objects
                .iter()
                .zip(scene.objects())
                .all(|(a, b)| Rc::ptr_eq(a, b))
    }
}
