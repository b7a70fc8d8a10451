//! The cabinet host loop.
//!
//! One synchronous frame loop drives everything: drain input events, advance
//! the menu or the active game, draw, sleep off the frame budget. Game code
//! only ever runs inside [`LifecycleManager::update`], so a faulting game
//! drops the host back to the menu instead of taking the loop down.

use anyhow::{Context, Result};
use crossterm::{
    event::{
        self, Event, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
        PushKeyboardEnhancementFlags,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Rect},
    style::{Color, Style},
    widgets::Paragraph,
    Frame,
};
use std::io::{stdout, Stdout};
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::catalog::GameCatalog;
use crate::config::Config;
use crate::lifecycle::LifecycleManager;
use crate::scene::Tint;
use crate::script::lua::{HostContext, LuaLoader};
use crate::ui::{menu::Menu, FpsCounter};

type Terminal = ratatui::Terminal<CrosstermBackend<Stdout>>;

enum Mode {
    Menu,
    Playing,
}

/// The running cabinet: config, discovered games, lifecycle manager and the
/// front-end state
pub struct Host {
    config: Config,
    catalog: GameCatalog,
    ctx: HostContext,
    manager: LifecycleManager,
    menu: Menu,
    fps: FpsCounter,
    mode: Mode,
    /// One-line notice shown under the menu, e.g. after a contained fault
    status: Option<String>,
}

impl Host {
    /// Discover games, build the Lua loader and wire the lifecycle manager
    /// to the shared scene
    ///
    /// # Errors
    /// Returns an error if the Lua state cannot be initialized
    pub fn new(config: Config) -> Result<Self> {
        let catalog = GameCatalog::scan(&config.games.dir);
        info!(
            "Discovered {} game(s) in {}",
            catalog.len(),
            config.games.dir.display()
        );

        let ctx = HostContext::new();
        ctx.scene.borrow_mut().background = Tint::from_hex(&config.display.background);

        {
            let mut input = ctx.input.borrow_mut();
            let binds = &config.keybindings;
            input.bind("menu_left", &binds.menu_left);
            input.bind("menu_right", &binds.menu_right);
            input.bind("menu_select", &binds.menu_select);
            input.bind("quit", &binds.quit);
            input.bind("leave_game", &binds.leave_game);
        }

        let loader = LuaLoader::new(ctx.clone())?;
        let manager = LifecycleManager::new(Box::new(loader), Rc::clone(&ctx.scene));
        let menu = Menu::new(
            &catalog,
            config.display.preview_width,
            config.display.preview_height,
        );

        Ok(Self {
            config,
            catalog,
            ctx,
            manager,
            menu,
            fps: FpsCounter::new(),
            mode: Mode::Menu,
            status: None,
        })
    }

    /// Load a game immediately instead of starting at the menu
    ///
    /// # Errors
    /// Returns an error if no game with that id exists in the catalog
    pub fn queue_game(&mut self, name: &str) -> Result<()> {
        let game = self
            .catalog
            .get(name)
            .with_context(|| format!("No game named '{name}' in the catalog"))?
            .clone();
        self.manager.load(&game);
        self.mode = Mode::Playing;
        Ok(())
    }

    /// Run the host loop until the player quits
    ///
    /// # Errors
    /// Returns an error if terminal setup or drawing fails
    pub fn run(&mut self) -> Result<()> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        let mut out = stdout();
        execute!(out, EnterAlternateScreen).context("Failed to enter alternate screen")?;

        // Release events make key tracking exact; plain terminals fall back
        // to the hold-decay approximation
        let enhanced = matches!(crossterm::terminal::supports_keyboard_enhancement(), Ok(true));
        if enhanced {
            execute!(
                out,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
        }

        let backend = CrosstermBackend::new(out);
        let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;
        let size = terminal.size()?;
        self.ctx.surface.set((size.width, size.height));

        let result = self.run_loop(&mut terminal);

        // Restore the terminal even when the loop errored
        if enhanced {
            let _ = execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags);
        }
        let _ = disable_raw_mode();
        let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen);
        let _ = terminal.show_cursor();

        result
    }

    fn run_loop(&mut self, terminal: &mut Terminal) -> Result<()> {
        let frame_budget =
            Duration::from_secs_f32(1.0 / f32::from(self.config.display.target_fps.max(1)));
        let mut frame_start = Instant::now();

        loop {
            self.ctx.input.borrow_mut().begin_frame();
            while event::poll(Duration::ZERO).context("Failed to poll events")? {
                match event::read().context("Failed to read event")? {
                    Event::Key(key) => self.ctx.input.borrow_mut().handle_key_event(key),
                    Event::Resize(w, h) => self.ctx.surface.set((w, h)),
                    _ => {}
                }
            }

            let keep_running = match self.mode {
                Mode::Menu => self.frame_menu(),
                Mode::Playing => self.frame_game(),
            };
            if !keep_running {
                break;
            }

            self.draw(terminal)?;

            let elapsed = frame_start.elapsed();
            if elapsed < frame_budget {
                std::thread::sleep(frame_budget - elapsed);
            }
            let frame_time = frame_start.elapsed().as_secs_f32();
            frame_start = Instant::now();
            self.ctx.frame_time.set(frame_time);
            self.fps.record(frame_time);
        }

        // Leave nothing of the last game behind
        self.manager.unload();
        Ok(())
    }

    /// One menu frame. Returns false when the player quits the cabinet.
    fn frame_menu(&mut self) -> bool {
        let (left, right, select, quit) = {
            let input = self.ctx.input.borrow();
            (
                input.was_bind_pressed("menu_left"),
                input.was_bind_pressed("menu_right"),
                input.was_bind_pressed("menu_select"),
                input.was_bind_pressed("quit"),
            )
        };

        if quit {
            return false;
        }
        if left {
            self.menu.move_left();
        }
        if right {
            self.menu.move_right();
        }
        if select {
            if let Some(game) = self.menu.selected_game().cloned() {
                self.status = None;
                self.manager.load(&game);
                self.mode = Mode::Playing;
            }
        }

        self.menu.update(self.ctx.frame_time.get());
        true
    }

    /// One game frame: voluntary leave, then the lifecycle update, then the
    /// close check that hands control back to the menu
    fn frame_game(&mut self) -> bool {
        if self.ctx.input.borrow().was_bind_pressed("leave_game") {
            debug!("Leave requested, unloading '{}'", self.manager.active_game_name());
            self.manager.unload();
            self.mode = Mode::Menu;
            return true;
        }

        self.manager.update();

        if self.manager.should_close() {
            if let Some(fault) = self.manager.last_fault() {
                warn!("Game fault contained: {fault}");
                self.status = Some(format!("{} crashed: {}", fault.game, fault.message));
            }
            self.manager.unload();
            self.mode = Mode::Menu;
        }
        true
    }

    fn draw(&mut self, terminal: &mut Terminal) -> Result<()> {
        let fps = self.config.display.show_fps.then(|| self.fps.fps());
        terminal
            .draw(|frame| match self.mode {
                Mode::Menu => {
                    self.menu.render(frame, fps);
                    if let Some(status) = &self.status {
                        render_status_line(frame, status);
                    }
                }
                Mode::Playing => {
                    self.ctx.scene.borrow().render(frame);
                    if let Some(fps) = fps {
                        render_fps_overlay(frame, fps);
                    }
                }
            })
            .context("Failed to draw frame")?;
        Ok(())
    }
}

fn render_status_line(frame: &mut Frame<'_>, status: &str) {
    let area = frame.size();
    if area.height == 0 {
        return;
    }
    let line = Rect {
        x: area.x,
        y: area.bottom() - 1,
        width: area.width,
        height: 1,
    };
    let notice = Paragraph::new(status)
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Red));
    frame.render_widget(notice, line);
}

fn render_fps_overlay(frame: &mut Frame<'_>, fps: f32) {
    let area = frame.size();
    let width = 10.min(area.width);
    let corner = Rect {
        x: area.right().saturating_sub(width),
        y: area.y,
        width,
        height: 1.min(area.height),
    };
    let readout = Paragraph::new(format!("{fps:.1} fps"))
        .alignment(Alignment::Right)
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(readout, corner);
}
