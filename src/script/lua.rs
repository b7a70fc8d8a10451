//! Embedded-Lua implementation of the code loader.
//!
//! One `mlua::Lua` state is shared by every game the cabinet plays, exactly
//! like the interpreter of the host process itself. Lua's `package.loaded`
//! table is the process-wide code registry: the loader snapshots its keys
//! before a game runs, publishes the game's entry module under
//! `package.loaded["game"]`, and at teardown clears and removes every module
//! the game (or anything it `require`d) introduced, followed by a synchronous
//! garbage-collection pass.

use anyhow::{Context, Result};
use mlua::{Function, Lua, RegistryKey, Table, Value};
use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

use crate::input::InputState;
use crate::lifecycle::fault::{Hook, HookFault, TeardownError};
use crate::lifecycle::registry::CodeRegistrySnapshot;
use crate::scene::{preview::PreviewImage, ObjectKind, Scene, SceneNode, SceneObject, Tint};
use crate::script::{CodeLoader, GameModule, LoadError, ModuleId};

/// Registry name the active game module is published under, so helper
/// modules can `require("game")`
const GAME_MODULE_NAME: &str = "game";

/// Default preview cell size for `cabinet.image` when none is given
const DEFAULT_IMAGE_CELLS: (u16, u16) = (16, 8);

/// Host-side state the Lua API reads and mutates on behalf of the game
#[derive(Clone)]
pub struct HostContext {
    pub scene: Rc<RefCell<Scene>>,
    pub input: Rc<RefCell<InputState>>,
    /// Seconds the previous frame took
    pub frame_time: Rc<Cell<f32>>,
    /// Drawable surface size in cells
    pub surface: Rc<Cell<(u16, u16)>>,
}

impl HostContext {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scene: Rc::new(RefCell::new(Scene::new())),
            input: Rc::new(RefCell::new(InputState::new())),
            frame_time: Rc::new(Cell::new(1.0 / 60.0)),
            surface: Rc::new(Cell::new((80, 24))),
        }
    }
}

impl Default for HostContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Loads game entry scripts into the shared Lua state
pub struct LuaLoader {
    lua: Rc<Lua>,
    ctx: HostContext,
    /// `package.path` as it was before any game loaded; restored at eviction
    base_package_path: String,
    /// Directory of the active game, for resolving its asset paths
    assets_root: Rc<RefCell<PathBuf>>,
    /// Set when the last snapshot could not read the registry
    snapshot_incomplete: Cell<bool>,
}

impl LuaLoader {
    /// Create the shared Lua state, restrict the environment and install the
    /// `cabinet` API
    ///
    /// # Errors
    /// Returns an error if the Lua state cannot be initialized
    pub fn new(ctx: HostContext) -> Result<Self> {
        let lua = Rc::new(Lua::new());

        // Keep games inside the cabinet: no shelling out, no process exit,
        // and no untracked code loading (require stays available and is
        // tracked through package.loaded)
        lua.load(
            r#"
            os.execute = nil
            os.exit = nil
            os.remove = nil
            os.rename = nil
            io.popen = nil
            loadfile = nil
            dofile = nil
        "#,
        )
        .exec()
        .context("Failed to restrict Lua environment")?;

        let base_package_path = package_path(&lua).context("Failed to read package.path")?;

        let loader = Self {
            lua,
            ctx,
            base_package_path,
            assets_root: Rc::new(RefCell::new(PathBuf::from("."))),
            snapshot_incomplete: Cell::new(false),
        };
        loader
            .install_api()
            .context("Failed to install the cabinet Lua API")?;
        Ok(loader)
    }

    /// Expose host drawing, input and timing functions as the global
    /// `cabinet` table
    fn install_api(&self) -> mlua::Result<()> {
        let cabinet = self.lua.create_table()?;

        let ctx = self.ctx.clone();
        cabinet.set(
            "circle",
            self.lua.create_function(
                move |_, (x, y, radius, color): (f64, f64, f64, Option<String>)| {
                    let tint = parse_tint(color.as_deref())?;
                    let node = ctx.scene.borrow_mut().add(SceneObject::new(
                        ObjectKind::Circle {
                            radius: radius as f32,
                        },
                        x as f32,
                        y as f32,
                        tint,
                    ));
                    Ok(SceneHandle {
                        scene: Rc::clone(&ctx.scene),
                        node,
                    })
                },
            )?,
        )?;

        let ctx = self.ctx.clone();
        cabinet.set(
            "rect",
            self.lua.create_function(
                move |_, (x, y, width, height, color): (f64, f64, f64, f64, Option<String>)| {
                    let tint = parse_tint(color.as_deref())?;
                    let node = ctx.scene.borrow_mut().add(SceneObject::new(
                        ObjectKind::Rect {
                            width: width as f32,
                            height: height as f32,
                        },
                        x as f32,
                        y as f32,
                        tint,
                    ));
                    Ok(SceneHandle {
                        scene: Rc::clone(&ctx.scene),
                        node,
                    })
                },
            )?,
        )?;

        let ctx = self.ctx.clone();
        cabinet.set(
            "text",
            self.lua.create_function(
                move |_, (x, y, content, color): (f64, f64, String, Option<String>)| {
                    let tint = parse_tint(color.as_deref())?;
                    let node = ctx.scene.borrow_mut().add(SceneObject::new(
                        ObjectKind::Text { content },
                        x as f32,
                        y as f32,
                        tint,
                    ));
                    Ok(SceneHandle {
                        scene: Rc::clone(&ctx.scene),
                        node,
                    })
                },
            )?,
        )?;

        let ctx = self.ctx.clone();
        let assets_root = Rc::clone(&self.assets_root);
        cabinet.set(
            "image",
            self.lua.create_function(
                move |_, (x, y, path, width, height): (f64, f64, String, Option<u16>, Option<u16>)| {
                    let full_path = assets_root.borrow().join(&path);
                    let pixels = PreviewImage::load(
                        &full_path,
                        width.unwrap_or(DEFAULT_IMAGE_CELLS.0),
                        height.unwrap_or(DEFAULT_IMAGE_CELLS.1),
                    )
                    .map_err(|e| mlua::Error::RuntimeError(format!("image '{path}': {e}")))?;
                    let node = ctx.scene.borrow_mut().add(SceneObject::new(
                        ObjectKind::Image { pixels },
                        x as f32,
                        y as f32,
                        Tint::default(),
                    ));
                    Ok(SceneHandle {
                        scene: Rc::clone(&ctx.scene),
                        node,
                    })
                },
            )?,
        )?;

        let ctx = self.ctx.clone();
        cabinet.set(
            "key_down",
            self.lua
                .create_function(move |_, key: String| Ok(ctx.input.borrow().is_key_down(&key)))?,
        )?;

        let ctx = self.ctx.clone();
        cabinet.set(
            "key_pressed",
            self.lua.create_function(move |_, key: String| {
                Ok(ctx.input.borrow().was_key_pressed(&key))
            })?,
        )?;

        let ctx = self.ctx.clone();
        cabinet.set(
            "frame_time",
            self.lua
                .create_function(move |_, ()| Ok(f64::from(ctx.frame_time.get())))?,
        )?;

        let ctx = self.ctx.clone();
        cabinet.set(
            "surface_size",
            self.lua.create_function(move |_, ()| {
                let (w, h) = ctx.surface.get();
                Ok((w, h))
            })?,
        )?;

        self.lua.globals().set("cabinet", cabinet)
    }

    fn loaded_table(&self) -> mlua::Result<Table> {
        self.lua
            .globals()
            .get::<_, Table>("package")?
            .get::<_, Table>("loaded")
    }

    /// Names of every module currently in the registry
    fn loaded_module_names(&self) -> mlua::Result<Vec<String>> {
        let mut names = Vec::new();
        for pair in self.loaded_table()?.pairs::<Value, Value>() {
            let (key, _) = pair?;
            if let Value::String(s) = key {
                names.push(s.to_str()?.to_string());
            }
        }
        Ok(names)
    }

    #[cfg(test)]
    fn exec(&self, source: &str) -> mlua::Result<()> {
        self.lua.load(source).exec()
    }

    fn set_package_path(&self, path: &str) -> mlua::Result<()> {
        self.lua
            .globals()
            .get::<_, Table>("package")?
            .set("path", path)
    }

    /// Fetch a required hook function from the module table
    fn required_hook<'lua>(
        table: &Table<'lua>,
        name: &'static str,
    ) -> Result<Function<'lua>, LoadError> {
        match table.get::<_, Value>(name) {
            Ok(Value::Function(f)) => Ok(f),
            Ok(_) => Err(LoadError::MissingHook(name)),
            Err(e) => Err(LoadError::Script(e.to_string())),
        }
    }
}

fn package_path(lua: &Lua) -> mlua::Result<String> {
    lua.globals()
        .get::<_, Table>("package")?
        .get::<_, String>("path")
}

impl CodeLoader for LuaLoader {
    fn snapshot(&self) -> CodeRegistrySnapshot {
        match self.loaded_module_names() {
            Ok(names) => {
                self.snapshot_incomplete.set(false);
                CodeRegistrySnapshot::from_names(names)
            }
            Err(e) => {
                debug!("Registry snapshot failed, capturing empty set: {e}");
                self.snapshot_incomplete.set(true);
                CodeRegistrySnapshot::from_names(Vec::<String>::new())
            }
        }
    }

    fn load_from_path(&mut self, path: &Path) -> Result<Box<dyn GameModule>, LoadError> {
        let source = fs::read_to_string(path)?;

        // Make the game's own directory requirable while it is active
        if let Some(dir) = path.parent() {
            *self.assets_root.borrow_mut() = dir.to_path_buf();
            let extended = format!("{};{}/?.lua", self.base_package_path, dir.display());
            self.set_package_path(&extended)
                .map_err(|e| LoadError::Script(e.to_string()))?;
        }

        let value: Value = self
            .lua
            .load(source.as_str())
            .set_name(format!("@{}", path.display()))
            .eval()
            .map_err(|e| LoadError::Script(e.to_string()))?;
        let Value::Table(module) = value else {
            return Err(LoadError::NotAModule);
        };

        let on_load = Self::required_hook(&module, "load")?;
        let on_update = Self::required_hook(&module, "update")?;
        let on_should_close = Self::required_hook(&module, "should_close")?;
        let on_unload = Self::required_hook(&module, "unload")?;

        self.loaded_table()
            .and_then(|loaded| loaded.set(GAME_MODULE_NAME, module.clone()))
            .map_err(|e| LoadError::Script(e.to_string()))?;

        let make_key = |v| self.lua.create_registry_value(v);
        let module = LuaGameModule {
            lua: Rc::clone(&self.lua),
            id: ModuleId::next(),
            module: make_key(Value::Table(module)).map_err(|e| LoadError::Script(e.to_string()))?,
            on_load: make_key(Value::Function(on_load))
                .map_err(|e| LoadError::Script(e.to_string()))?,
            on_update: make_key(Value::Function(on_update))
                .map_err(|e| LoadError::Script(e.to_string()))?,
            on_should_close: make_key(Value::Function(on_should_close))
                .map_err(|e| LoadError::Script(e.to_string()))?,
            on_unload: make_key(Value::Function(on_unload))
                .map_err(|e| LoadError::Script(e.to_string()))?,
        };
        Ok(Box::new(module))
    }

    fn evict_introduced(&mut self, snapshot: &CodeRegistrySnapshot) -> Result<(), TeardownError> {
        // A snapshot captured through a failed registry read is empty;
        // diffing against it would mark the base Lua modules as introduced
        // and evict the whole stdlib. Skip eviction for that cycle instead.
        if self.snapshot_incomplete.replace(false) {
            return Err(TeardownError::Registry(
                "snapshot was incomplete, skipping eviction".to_string(),
            ));
        }

        let loaded = self
            .loaded_table()
            .map_err(|e| TeardownError::Registry(e.to_string()))?;

        let mut introduced = Vec::new();
        for pair in loaded.clone().pairs::<Value, Value>() {
            let (key, value) = pair.map_err(|e| TeardownError::Registry(e.to_string()))?;
            if let Value::String(s) = key {
                let name = s
                    .to_str()
                    .map_err(|e| TeardownError::Registry(e.to_string()))?
                    .to_string();
                if !snapshot.contains(&name) {
                    introduced.push((name, value));
                }
            }
        }

        // Exhaustive best-effort pass: one resisting module must not shield
        // the rest from eviction
        let mut first_error = None;
        for (name, value) in introduced {
            if let Err(e) = evict_module(&loaded, &name, value) {
                debug!("Failed to evict module '{name}': {e}");
                first_error.get_or_insert(TeardownError::Evict {
                    module: name,
                    message: e.to_string(),
                });
            } else {
                debug!("Evicted module '{name}'");
            }
        }

        *self.assets_root.borrow_mut() = PathBuf::from(".");
        if let Err(e) = self.set_package_path(&self.base_package_path.clone()) {
            first_error.get_or_insert(TeardownError::Registry(e.to_string()));
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn collect_garbage(&mut self) {
        self.lua.expire_registry_values();
        if let Err(e) = self.lua.gc_collect() {
            debug!("Garbage collection pass failed: {e}");
        }
    }
}

/// Clear a module's state, then drop it from the registry
fn evict_module(loaded: &Table, name: &str, value: Value) -> mlua::Result<()> {
    if let Value::Table(module) = value {
        let keys: Vec<Value> = module
            .clone()
            .pairs::<Value, Value>()
            .filter_map(|pair| pair.map(|(k, _)| k).ok())
            .collect();
        for key in keys {
            module.set(key, Value::Nil)?;
        }
    }
    loaded.set(name, Value::Nil)
}

/// A loaded Lua game module: registry-pinned references to the module table
/// and its four hooks. Dropping it releases the pins.
struct LuaGameModule {
    lua: Rc<Lua>,
    id: ModuleId,
    // Held so the module table stays pinned for exactly as long as the
    // handle lives, independent of package.loaded
    #[allow(dead_code)]
    module: RegistryKey,
    on_load: RegistryKey,
    on_update: RegistryKey,
    on_should_close: RegistryKey,
    on_unload: RegistryKey,
}

impl LuaGameModule {
    fn call_unit(&self, hook: Hook, key: &RegistryKey) -> Result<(), HookFault> {
        let f: Function = self
            .lua
            .registry_value(key)
            .map_err(|e| hook_fault(hook, &e))?;
        f.call::<_, ()>(()).map_err(|e| hook_fault(hook, &e))
    }
}

impl GameModule for LuaGameModule {
    fn instance_id(&self) -> ModuleId {
        self.id
    }

    fn call_load(&mut self) -> Result<(), HookFault> {
        self.call_unit(Hook::Load, &self.on_load)
    }

    fn call_update(&mut self) -> Result<(), HookFault> {
        self.call_unit(Hook::Update, &self.on_update)
    }

    fn call_should_close(&mut self) -> Result<bool, HookFault> {
        let f: Function = self
            .lua
            .registry_value(&self.on_should_close)
            .map_err(|e| hook_fault(Hook::ShouldClose, &e))?;
        f.call::<_, bool>(())
            .map_err(|e| hook_fault(Hook::ShouldClose, &e))
    }

    fn call_unload(&mut self) -> Result<(), HookFault> {
        self.call_unit(Hook::Unload, &self.on_unload)
    }
}

/// Convert a Lua error into a hook fault, separating the traceback when one
/// is attached
fn hook_fault(hook: Hook, err: &mlua::Error) -> HookFault {
    match err {
        mlua::Error::CallbackError { traceback, cause } => {
            HookFault::new(hook, cause.to_string()).with_traceback(traceback.clone())
        }
        mlua::Error::RuntimeError(msg) => match msg.split_once("\nstack traceback:") {
            Some((message, trace)) => HookFault::new(hook, message.trim())
                .with_traceback(format!("stack traceback:{trace}")),
            None => HookFault::new(hook, msg.clone()),
        },
        other => HookFault::new(hook, other.to_string()),
    }
}

fn parse_tint(color: Option<&str>) -> mlua::Result<Tint> {
    match color {
        None => Ok(Tint::default()),
        Some(hex) => Tint::from_hex(hex).ok_or_else(|| {
            mlua::Error::RuntimeError(format!("invalid color '{hex}', expected '#RRGGBB'"))
        }),
    }
}

/// Userdata handle a game holds to one of its scene objects
struct SceneHandle {
    scene: Rc<RefCell<Scene>>,
    node: SceneNode,
}

impl mlua::UserData for SceneHandle {
    fn add_methods<'lua, M: mlua::UserDataMethods<'lua, Self>>(methods: &mut M) {
        methods.add_method("move_to", |_, this, (x, y): (f64, f64)| {
            let mut obj = this.node.borrow_mut();
            obj.x = x as f32;
            obj.y = y as f32;
            Ok(())
        });

        methods.add_method("set_visible", |_, this, visible: bool| {
            this.node.borrow_mut().visible = visible;
            Ok(())
        });

        methods.add_method("set_color", |_, this, hex: String| {
            this.node.borrow_mut().tint = parse_tint(Some(&hex))?;
            Ok(())
        });

        methods.add_method("set_text", |_, this, content: String| {
            if let ObjectKind::Text { content: c } = &mut this.node.borrow_mut().kind {
                *c = content;
            }
            Ok(())
        });

        methods.add_method("set_radius", |_, this, radius: f64| {
            if let ObjectKind::Circle { radius: r } = &mut this.node.borrow_mut().kind {
                *r = radius as f32;
            }
            Ok(())
        });

        methods.add_method("set_size", |_, this, (width, height): (f64, f64)| {
            if let ObjectKind::Rect {
                width: w,
                height: h,
            } = &mut this.node.borrow_mut().kind
            {
                *w = width as f32;
                *h = height as f32;
            }
            Ok(())
        });

        methods.add_method("remove", |_, this, ()| {
            this.scene.borrow_mut().remove(&this.node);
            Ok(())
        });
    }
}
