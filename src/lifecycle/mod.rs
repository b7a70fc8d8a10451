//! Plugin lifecycle management.
//!
//! The [`LifecycleManager`] drives every game through
//! `load -> run -> (close | fault) -> teardown -> ready-for-next-load`.
//! It captures a [`CodeRegistrySnapshot`] and a [`SceneObjectLedger`] before
//! any game code executes, and consumes both at teardown so no module, scene
//! object or stale reference survives from one play into the next.
//!
//! All public operations are total and no-throw: a fault anywhere in game
//! code is contained here and converted into observable state
//! (`should_close()` turning true plus a [`FaultReport`]). The host loop must
//! never crash because of a single misbehaving game.

pub mod fault;
pub mod ledger;
pub mod registry;

use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info, warn};

use crate::catalog::GameDescriptor;
use crate::scene::Scene;
use crate::script::{CodeLoader, GameModule, ModuleId};

use self::fault::{FaultKind, FaultReport};
use self::ledger::SceneObjectLedger;
use self::registry::CodeRegistrySnapshot;

/// Display name reported while no game is loaded
pub const NO_GAME: &str = "No game";

/// Externally relevant lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No game active
    Idle,
    /// A game is active and healthy
    Running,
    /// The game signaled voluntary completion; only `unload()` is useful
    Closed,
    /// A fault was contained and teardown already ran
    Faulted,
}

/// The at-most-one live game: its display name and loaded module.
/// Dropping the handle releases the module and its hook references.
struct PluginHandle {
    name: String,
    module: Box<dyn GameModule>,
}

/// State machine over the shared code registry and drawable scene
pub struct LifecycleManager {
    loader: Box<dyn CodeLoader>,
    scene: Rc<RefCell<Scene>>,
    handle: Option<PluginHandle>,
    registry_snapshot: Option<CodeRegistrySnapshot>,
    scene_ledger: Option<SceneObjectLedger>,
    state: LifecycleState,
    last_fault: Option<FaultReport>,
}

impl LifecycleManager {
    #[must_use]
    pub fn new(loader: Box<dyn CodeLoader>, scene: Rc<RefCell<Scene>>) -> Self {
        Self {
            loader,
            scene,
            handle: None,
            registry_snapshot: None,
            scene_ledger: None,
            state: LifecycleState::Idle,
            last_fault: None,
        }
    }

    /// Load a game and run its `load` hook.
    ///
    /// Never fails from the caller's perspective: a load failure triggers
    /// fault isolation and leaves the manager with `should_close()` true and
    /// the name cleared. A game still active from a previous load is
    /// gracefully unloaded first, preserving the at-most-one invariant.
    pub fn load(&mut self, game: &GameDescriptor) {
        if matches!(self.state, LifecycleState::Running | LifecycleState::Closed) {
            self.unload();
        }

        // Both snapshots are captured strictly before any game code executes
        self.registry_snapshot = Some(self.loader.snapshot());
        self.scene_ledger = Some(SceneObjectLedger::capture(&self.scene.borrow()));
        self.last_fault = None;

        debug!(
            "Loading game '{}' from {}",
            game.title,
            game.entry_path.display()
        );

        match self.loader.load_from_path(&game.entry_path) {
            Ok(module) => {
                let mut handle = PluginHandle {
                    name: game.title.clone(),
                    module,
                };
                match handle.module.call_load() {
                    Ok(()) => {
                        self.handle = Some(handle);
                        self.state = LifecycleState::Running;
                        info!("Loaded game '{}'", game.title);
                    }
                    Err(hook_fault) => {
                        // The module exists, so isolation can still attempt
                        // its unload hook before teardown
                        self.handle = Some(handle);
                        let report =
                            FaultReport::from_hook(&game.title, FaultKind::Load, hook_fault);
                        self.isolate_fault(report, true);
                    }
                }
            }
            Err(load_error) => {
                let report =
                    FaultReport::new(&game.title, FaultKind::Load, load_error.to_string());
                self.isolate_fault(report, true);
            }
        }
    }

    /// Advance the active game by one frame.
    ///
    /// `should_close` is always evaluated before `update`, so a game that has
    /// decided to end never receives one extra update. A no-op outside
    /// `Running`.
    pub fn update(&mut self) {
        if self.state != LifecycleState::Running {
            return;
        }

        let mut report = None;
        if let Some(handle) = self.handle.as_mut() {
            match handle.module.call_should_close() {
                Ok(true) => self.state = LifecycleState::Closed,
                Ok(false) => {
                    if let Err(hook_fault) = handle.module.call_update() {
                        report = Some(FaultReport::from_hook(
                            handle.name.clone(),
                            FaultKind::Runtime,
                            hook_fault,
                        ));
                    }
                }
                Err(hook_fault) => {
                    report = Some(FaultReport::from_hook(
                        handle.name.clone(),
                        FaultKind::Runtime,
                        hook_fault,
                    ));
                }
            }
        }

        if let Some(report) = report {
            self.isolate_fault(report, true);
        }
    }

    /// Run the game's `unload` hook and tear the cycle down.
    ///
    /// Permitted while `Running` (the host switching away mid-game) or
    /// `Closed`; a no-op in any other state. In particular, a fault has
    /// already torn down as part of isolation, so `unload()` after `Faulted`
    /// does nothing.
    pub fn unload(&mut self) {
        if !matches!(self.state, LifecycleState::Running | LifecycleState::Closed) {
            return;
        }

        let name = self
            .handle
            .as_ref()
            .map_or_else(|| NO_GAME.to_string(), |h| h.name.clone());

        let hook_result = match self.handle.as_mut() {
            Some(handle) => handle.module.call_unload(),
            None => Ok(()),
        };

        match hook_result {
            Ok(()) => {
                self.teardown();
                self.state = LifecycleState::Idle;
                info!("Unloaded game '{name}'");
            }
            Err(hook_fault) => {
                // The hook already ran once; isolation must not attempt it
                // again, but teardown still runs exactly once
                let report = FaultReport::from_hook(name, FaultKind::Unload, hook_fault);
                self.isolate_fault(report, false);
            }
        }
    }

    /// True once the active game has closed voluntarily or faulted
    #[must_use]
    pub fn should_close(&self) -> bool {
        matches!(
            self.state,
            LifecycleState::Closed | LifecycleState::Faulted
        )
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Display name of the active game, or the `"No game"` sentinel
    #[must_use]
    pub fn active_game_name(&self) -> &str {
        self.handle.as_ref().map_or(NO_GAME, |h| h.name.as_str())
    }

    /// Instance id of the active game's module, if one is loaded
    #[must_use]
    pub fn active_instance(&self) -> Option<ModuleId> {
        self.handle.as_ref().map(|h| h.module.instance_id())
    }

    /// The most recent contained fault, cleared by the next `load()`
    #[must_use]
    pub fn last_fault(&self) -> Option<&FaultReport> {
        self.last_fault.as_ref()
    }

    /// Fault isolation: record, log, best-effort unload, teardown, clear.
    /// Each step tolerates failure in the previous one.
    fn isolate_fault(&mut self, report: FaultReport, attempt_unload: bool) {
        self.state = LifecycleState::Faulted;

        debug!("ERROR ({}): {}", report.game, report.message);
        if let Some(traceback) = &report.traceback {
            debug!("{traceback}");
        }

        if attempt_unload {
            if let Some(handle) = self.handle.as_mut() {
                debug!("Attempting unload of '{}'", handle.name);
                match handle.module.call_unload() {
                    Ok(()) => debug!("Unload successful"),
                    Err(secondary) => warn!("Unload unsuccessful: {secondary}"),
                }
            }
        }

        self.teardown();
        self.last_fault = Some(report);
    }

    /// Clean-room teardown: evict introduced modules, reset the scene,
    /// release the handle, reclaim. Deterministic and idempotent per cycle;
    /// a failing eviction never blocks the scene reset.
    fn teardown(&mut self) {
        if let Some(snapshot) = self.registry_snapshot.take() {
            if let Err(e) = self.loader.evict_introduced(&snapshot) {
                debug!("Module eviction incomplete: {e}");
            }
        }

        if let Some(ledger) = self.scene_ledger.take() {
            ledger.restore(&mut self.scene.borrow_mut());
        }

        self.handle = None;
        self.loader.collect_garbage();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::fault::{Hook, HookFault, TeardownError};
    use crate::scene::{ObjectKind, SceneObject, Tint};
    use crate::script::LoadError;
    use proptest::prelude::*;
    use std::collections::BTreeSet;
    use std::path::{Path, PathBuf};

    /// Scripted behavior for the next module the mock loader produces
    #[derive(Debug, Clone, Default)]
    struct Behavior {
        /// Entry code itself fails to load
        fail_compile: bool,
        /// The `load` hook raises
        fail_load_hook: bool,
        /// The nth `update` call raises (1-based)
        fail_update_on: Option<u32>,
        /// The nth `should_close` call raises (1-based)
        fail_should_close_on: Option<u32>,
        /// The nth `should_close` call reports true (1-based)
        close_on: Option<u32>,
        /// The `unload` hook raises
        fail_unload_hook: bool,
        /// Helper modules the game pulls into the registry at load time
        helper_modules: Vec<&'static str>,
        /// Scene objects added by the `load` hook
        objects_on_load: usize,
        /// Add one scene object per `update`
        object_per_update: bool,
    }

    struct MockModule {
        id: ModuleId,
        behavior: Behavior,
        frame: u32,
        scene: Rc<RefCell<Scene>>,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl MockModule {
        fn add_object(&self) {
            self.scene.borrow_mut().add(SceneObject::new(
                ObjectKind::Circle { radius: 1.0 },
                0.0,
                0.0,
                Tint::default(),
            ));
        }
    }

    impl GameModule for MockModule {
        fn instance_id(&self) -> ModuleId {
            self.id
        }

        fn call_load(&mut self) -> Result<(), HookFault> {
            self.log.borrow_mut().push("hook:load".to_string());
            if self.behavior.fail_load_hook {
                return Err(HookFault::new(Hook::Load, "load exploded"));
            }
            for _ in 0..self.behavior.objects_on_load {
                self.add_object();
            }
            Ok(())
        }

        fn call_update(&mut self) -> Result<(), HookFault> {
            self.log.borrow_mut().push("hook:update".to_string());
            if self.behavior.fail_update_on == Some(self.frame) {
                return Err(HookFault::new(Hook::Update, "update exploded"));
            }
            if self.behavior.object_per_update {
                self.add_object();
            }
            Ok(())
        }

        fn call_should_close(&mut self) -> Result<bool, HookFault> {
            self.frame += 1;
            self.log.borrow_mut().push("hook:should_close".to_string());
            if self.behavior.fail_should_close_on == Some(self.frame) {
                return Err(HookFault::new(Hook::ShouldClose, "should_close exploded"));
            }
            Ok(self.behavior.close_on == Some(self.frame))
        }

        fn call_unload(&mut self) -> Result<(), HookFault> {
            self.log.borrow_mut().push("hook:unload".to_string());
            if self.behavior.fail_unload_hook {
                return Err(HookFault::new(Hook::Unload, "unload exploded"));
            }
            Ok(())
        }
    }

    struct MockLoader {
        registry: Rc<RefCell<BTreeSet<String>>>,
        scene: Rc<RefCell<Scene>>,
        log: Rc<RefCell<Vec<String>>>,
        behavior: Rc<RefCell<Behavior>>,
        gc_passes: Rc<RefCell<usize>>,
    }

    impl CodeLoader for MockLoader {
        fn snapshot(&self) -> CodeRegistrySnapshot {
            CodeRegistrySnapshot::from_names(self.registry.borrow().iter().cloned())
        }

        fn load_from_path(&mut self, _path: &Path) -> Result<Box<dyn GameModule>, LoadError> {
            let behavior = self.behavior.borrow().clone();
            if behavior.fail_compile {
                return Err(LoadError::Script("syntax error near 'end'".to_string()));
            }
            let mut registry = self.registry.borrow_mut();
            registry.insert("game".to_string());
            for helper in &behavior.helper_modules {
                registry.insert((*helper).to_string());
            }
            Ok(Box::new(MockModule {
                id: ModuleId::next(),
                behavior,
                frame: 0,
                scene: Rc::clone(&self.scene),
                log: Rc::clone(&self.log),
            }))
        }

        fn evict_introduced(
            &mut self,
            snapshot: &CodeRegistrySnapshot,
        ) -> Result<(), TeardownError> {
            let mut registry = self.registry.borrow_mut();
            let live: Vec<String> = registry.iter().cloned().collect();
            for name in snapshot.introduced(live.iter().map(String::as_str)) {
                registry.remove(&name);
                self.log.borrow_mut().push(format!("evict:{name}"));
            }
            Ok(())
        }

        fn collect_garbage(&mut self) {
            *self.gc_passes.borrow_mut() += 1;
        }
    }

    struct Fixture {
        manager: LifecycleManager,
        scene: Rc<RefCell<Scene>>,
        registry: Rc<RefCell<BTreeSet<String>>>,
        log: Rc<RefCell<Vec<String>>>,
        behavior: Rc<RefCell<Behavior>>,
        gc_passes: Rc<RefCell<usize>>,
    }

    fn fixture() -> Fixture {
        let scene = Rc::new(RefCell::new(Scene::new()));
        let registry = Rc::new(RefCell::new(BTreeSet::from([
            "string".to_string(),
            "table".to_string(),
            "math".to_string(),
        ])));
        let log = Rc::new(RefCell::new(Vec::new()));
        let behavior = Rc::new(RefCell::new(Behavior::default()));
        let gc_passes = Rc::new(RefCell::new(0));
        let loader = MockLoader {
            registry: Rc::clone(&registry),
            scene: Rc::clone(&scene),
            log: Rc::clone(&log),
            behavior: Rc::clone(&behavior),
            gc_passes: Rc::clone(&gc_passes),
        };
        let manager = LifecycleManager::new(Box::new(loader), Rc::clone(&scene));
        Fixture {
            manager,
            scene,
            registry,
            log,
            behavior,
            gc_passes,
        }
    }

    fn descriptor(name: &str) -> GameDescriptor {
        GameDescriptor {
            name: name.to_string(),
            entry_path: PathBuf::from(format!("games/{name}/{name}.lua")),
            icon_path: PathBuf::from(format!("games/{name}/icon.png")),
            title: name.to_string(),
            short_title: name.to_string(),
            description: String::new(),
        }
    }

    fn baseline_registry() -> BTreeSet<String> {
        BTreeSet::from([
            "string".to_string(),
            "table".to_string(),
            "math".to_string(),
        ])
    }

    #[test]
    fn test_healthy_game_stays_running() {
        let mut fx = fixture();
        fx.manager.load(&descriptor("pong"));
        assert_eq!(fx.manager.state(), LifecycleState::Running);
        assert_eq!(fx.manager.active_game_name(), "pong");

        for _ in 0..100 {
            fx.manager.update();
        }
        assert_eq!(fx.manager.state(), LifecycleState::Running);
        assert!(!fx.manager.should_close());
        assert_eq!(fx.manager.active_game_name(), "pong");
    }

    #[test]
    fn test_should_close_checked_before_update() {
        let mut fx = fixture();
        fx.behavior.borrow_mut().close_on = Some(3);
        fx.manager.load(&descriptor("pong"));

        fx.manager.update();
        fx.manager.update();
        fx.manager.update(); // should_close reports true here
        assert!(fx.manager.should_close());
        assert_eq!(fx.manager.state(), LifecycleState::Closed);

        // Two full frames ran, the third stopped at should_close
        let updates = fx
            .log
            .borrow()
            .iter()
            .filter(|e| *e == "hook:update")
            .count();
        assert_eq!(updates, 2);

        // The closing frame evaluated should_close, then nothing else
        let log = fx.log.borrow();
        assert_eq!(log.last().unwrap(), "hook:should_close");
    }

    #[test]
    fn test_update_fault_triggers_isolation() {
        let mut fx = fixture();
        {
            let mut b = fx.behavior.borrow_mut();
            b.fail_update_on = Some(5);
            b.helper_modules = vec!["game.helpers"];
            b.objects_on_load = 3;
            b.object_per_update = true;
        }
        let host_node = fx.scene.borrow_mut().add(SceneObject::new(
            ObjectKind::Text {
                content: "hud".to_string(),
            },
            0.0,
            0.0,
            Tint::default(),
        ));

        fx.manager.load(&descriptor("pong"));
        for _ in 0..5 {
            fx.manager.update();
        }

        assert!(fx.manager.should_close());
        assert_eq!(fx.manager.state(), LifecycleState::Faulted);
        assert_eq!(fx.manager.active_game_name(), NO_GAME);

        // Registry and scene fully restored to pre-load contents
        assert_eq!(*fx.registry.borrow(), baseline_registry());
        assert_eq!(fx.scene.borrow().len(), 1);
        assert!(Rc::ptr_eq(&fx.scene.borrow().objects()[0], &host_node));

        // Best-effort unload was attempted exactly once
        let unloads = fx
            .log
            .borrow()
            .iter()
            .filter(|e| *e == "hook:unload")
            .count();
        assert_eq!(unloads, 1);

        let report = fx.manager.last_fault().unwrap();
        assert_eq!(report.kind, FaultKind::Runtime);
        assert!(report.message.contains("update"));
    }

    #[test]
    fn test_should_close_fault_is_a_runtime_fault() {
        let mut fx = fixture();
        fx.behavior.borrow_mut().fail_should_close_on = Some(1);
        fx.manager.load(&descriptor("pong"));
        fx.manager.update();

        assert!(fx.manager.should_close());
        assert_eq!(fx.manager.last_fault().unwrap().kind, FaultKind::Runtime);
        // The faulting frame never reached the update hook
        assert!(!fx.log.borrow().iter().any(|e| e == "hook:update"));
    }

    #[test]
    fn test_load_hook_fault_aborts_load() {
        let mut fx = fixture();
        {
            let mut b = fx.behavior.borrow_mut();
            b.fail_load_hook = true;
            b.helper_modules = vec!["game.helpers"];
        }
        fx.manager.load(&descriptor("broken"));

        assert!(fx.manager.should_close());
        assert_eq!(fx.manager.active_game_name(), NO_GAME);
        assert_eq!(fx.manager.last_fault().unwrap().kind, FaultKind::Load);
        // No registry entries leak
        assert_eq!(*fx.registry.borrow(), baseline_registry());
        // The partially loaded module still got its unload attempt
        assert!(fx.log.borrow().iter().any(|e| e == "hook:unload"));
    }

    #[test]
    fn test_compile_failure_aborts_load_without_hooks() {
        let mut fx = fixture();
        fx.behavior.borrow_mut().fail_compile = true;
        fx.manager.load(&descriptor("broken"));

        assert!(fx.manager.should_close());
        assert_eq!(fx.manager.active_game_name(), NO_GAME);
        assert_eq!(fx.manager.last_fault().unwrap().kind, FaultKind::Load);
        assert!(fx.log.borrow().is_empty());
        assert_eq!(*fx.registry.borrow(), baseline_registry());
    }

    #[test]
    fn test_voluntary_unload_while_running() {
        let mut fx = fixture();
        {
            let mut b = fx.behavior.borrow_mut();
            b.helper_modules = vec!["game.helpers", "game.sprites"];
            b.objects_on_load = 2;
        }
        fx.manager.load(&descriptor("pong"));
        fx.manager.update();

        fx.manager.unload();
        assert_eq!(fx.manager.state(), LifecycleState::Idle);
        assert!(!fx.manager.should_close());
        assert_eq!(fx.manager.active_game_name(), NO_GAME);
        assert_eq!(*fx.registry.borrow(), baseline_registry());
        assert!(fx.scene.borrow().is_empty());

        let unloads = fx
            .log
            .borrow()
            .iter()
            .filter(|e| *e == "hook:unload")
            .count();
        assert_eq!(unloads, 1);
    }

    #[test]
    fn test_unload_hook_fault_still_tears_down() {
        let mut fx = fixture();
        {
            let mut b = fx.behavior.borrow_mut();
            b.fail_unload_hook = true;
            b.helper_modules = vec!["game.helpers"];
            b.objects_on_load = 1;
        }
        fx.manager.load(&descriptor("pong"));
        fx.manager.unload();

        // Fault recorded, but registry and scene are fully restored
        assert!(fx.manager.should_close());
        assert_eq!(fx.manager.last_fault().unwrap().kind, FaultKind::Unload);
        assert_eq!(*fx.registry.borrow(), baseline_registry());
        assert!(fx.scene.borrow().is_empty());

        // The hook ran exactly once; isolation did not retry it
        let unloads = fx
            .log
            .borrow()
            .iter()
            .filter(|e| *e == "hook:unload")
            .count();
        assert_eq!(unloads, 1);
    }

    #[test]
    fn test_update_in_idle_is_a_noop() {
        let mut fx = fixture();
        fx.manager.update();
        assert_eq!(fx.manager.state(), LifecycleState::Idle);
        assert!(fx.log.borrow().is_empty());
    }

    #[test]
    fn test_unload_outside_running_or_closed_is_a_noop() {
        let mut fx = fixture();
        // Never loaded
        fx.manager.unload();
        assert_eq!(fx.manager.state(), LifecycleState::Idle);

        // After a fault, teardown already happened; a second unload does nothing
        fx.behavior.borrow_mut().fail_update_on = Some(1);
        fx.manager.load(&descriptor("pong"));
        fx.manager.update();
        assert_eq!(fx.manager.state(), LifecycleState::Faulted);
        let gc_before = *fx.gc_passes.borrow();

        fx.manager.unload();
        assert_eq!(fx.manager.state(), LifecycleState::Faulted);
        assert_eq!(*fx.gc_passes.borrow(), gc_before);
    }

    #[test]
    fn test_reload_gets_fresh_module_identity() {
        let mut fx = fixture();
        fx.manager.load(&descriptor("pong"));
        let first = fx.manager.active_instance().unwrap();
        fx.manager.unload();

        fx.manager.load(&descriptor("pong"));
        let second = fx.manager.active_instance().unwrap();
        assert_ne!(first, second);
        assert_eq!(fx.manager.state(), LifecycleState::Running);
    }

    #[test]
    fn test_load_over_running_game_unloads_it_first() {
        let mut fx = fixture();
        fx.behavior.borrow_mut().helper_modules = vec!["game.helpers"];
        fx.manager.load(&descriptor("pong"));
        let first = fx.manager.active_instance().unwrap();

        fx.manager.load(&descriptor("asteroids"));
        let second = fx.manager.active_instance().unwrap();

        assert_ne!(first, second);
        assert_eq!(fx.manager.active_game_name(), "asteroids");
        // The first game's unload hook ran during the implicit switch
        assert!(fx.log.borrow().iter().any(|e| e == "hook:unload"));
        // Helpers from the first play did not leak into the second snapshot:
        // unloading now restores the original baseline
        fx.manager.unload();
        assert_eq!(*fx.registry.borrow(), baseline_registry());
    }

    #[test]
    fn test_fault_flag_cleared_by_next_load() {
        let mut fx = fixture();
        fx.behavior.borrow_mut().fail_load_hook = true;
        fx.manager.load(&descriptor("broken"));
        assert!(fx.manager.last_fault().is_some());

        fx.behavior.borrow_mut().fail_load_hook = false;
        fx.manager.load(&descriptor("pong"));
        assert!(fx.manager.last_fault().is_none());
        assert_eq!(fx.manager.state(), LifecycleState::Running);
    }

    #[test]
    fn test_gc_runs_once_per_teardown() {
        let mut fx = fixture();
        fx.manager.load(&descriptor("pong"));
        fx.manager.unload();
        assert_eq!(*fx.gc_passes.borrow(), 1);

        fx.behavior.borrow_mut().fail_update_on = Some(1);
        fx.manager.load(&descriptor("pong"));
        fx.manager.update();
        assert_eq!(*fx.gc_passes.borrow(), 2);
    }

    /// One scripted lifecycle action for the property test
    #[derive(Debug, Clone)]
    enum Op {
        Load(Behavior),
        Update,
        Unload,
    }

    fn behavior_strategy() -> impl Strategy<Value = Behavior> {
        (
            any::<bool>(),
            any::<bool>(),
            proptest::option::of(1u32..8),
            proptest::option::of(1u32..8),
            proptest::option::of(1u32..8),
            any::<bool>(),
            0usize..4,
            any::<bool>(),
        )
            .prop_map(
                |(
                    fail_compile,
                    fail_load_hook,
                    fail_update_on,
                    fail_should_close_on,
                    close_on,
                    fail_unload_hook,
                    objects_on_load,
                    object_per_update,
                )| Behavior {
                    fail_compile,
                    fail_load_hook,
                    fail_update_on,
                    fail_should_close_on,
                    close_on,
                    fail_unload_hook,
                    helper_modules: vec!["game.helpers"],
                    objects_on_load,
                    object_per_update,
                },
            )
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            2 => behavior_strategy().prop_map(Op::Load),
            5 => Just(Op::Update),
            2 => Just(Op::Unload),
        ]
    }

    proptest! {
        /// For any event sequence with arbitrary fault injection: no panic
        /// escapes the manager, at most one game is live at any instant, and
        /// a final unload restores the registry and scene exactly.
        #[test]
        fn prop_lifecycle_invariants(ops in proptest::collection::vec(op_strategy(), 1..40)) {
            let mut fx = fixture();
            let host_node = fx.scene.borrow_mut().add(SceneObject::new(
                ObjectKind::Text { content: "hud".to_string() },
                0.0,
                0.0,
                Tint::default(),
            ));

            for op in ops {
                match op {
                    Op::Load(behavior) => {
                        *fx.behavior.borrow_mut() = behavior;
                        fx.manager.load(&descriptor("fuzzed"));
                    }
                    Op::Update => fx.manager.update(),
                    Op::Unload => fx.manager.unload(),
                }
                // At most one live handle, and only while active
                if fx.manager.active_instance().is_some() {
                    prop_assert!(matches!(
                        fx.manager.state(),
                        LifecycleState::Running | LifecycleState::Closed
                    ));
                }
            }

            fx.manager.unload();
            prop_assert!(fx.manager.active_instance().is_none());
            prop_assert_eq!(fx.manager.active_game_name(), NO_GAME);
            prop_assert_eq!(&*fx.registry.borrow(), &baseline_registry());
            prop_assert_eq!(fx.scene.borrow().len(), 1);
            prop_assert!(Rc::ptr_eq(&fx.scene.borrow().objects()[0], &host_node));
        }
    }
}
