//! Shared drawable-object scene for the cabinet surface.
//!
//! The scene is a host-owned, ordered list of drawable objects. The active
//! game appends and removes individual objects through the Lua API; the
//! lifecycle manager is the only component allowed to capture or bulk-reset
//! the list. Everything here is single-threaded, so nodes are plain
//! `Rc<RefCell<_>>` handles whose pointer identity doubles as object identity.

pub mod preview;

use ratatui::{layout::Rect, style::Color, Frame};
use std::cell::RefCell;
use std::rc::Rc;

use self::preview::PreviewImage;

/// 24-bit color for scene objects and the background
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tint {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Tint {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a `#RRGGBB` hex string
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#')?;
        if hex.len() != 6 {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self { r, g, b })
    }

    #[must_use]
    pub const fn to_color(self) -> Color {
        Color::Rgb(self.r, self.g, self.b)
    }
}

impl Default for Tint {
    fn default() -> Self {
        Self::new(0xFF, 0xFF, 0xFF)
    }
}

/// What a scene object draws
#[derive(Debug, Clone)]
pub enum ObjectKind {
    Circle { radius: f32 },
    Rect { width: f32, height: f32 },
    Text { content: String },
    Image { pixels: PreviewImage },
}

/// One drawable object: a shape, a position in cell coordinates, a color
/// and a visibility flag
#[derive(Debug, Clone)]
pub struct SceneObject {
    pub kind: ObjectKind,
    pub x: f32,
    pub y: f32,
    pub visible: bool,
    pub tint: Tint,
}

impl SceneObject {
    #[must_use]
    pub fn new(kind: ObjectKind, x: f32, y: f32, tint: Tint) -> Self {
        Self {
            kind,
            x,
            y,
            visible: true,
            tint,
        }
    }
}

/// Shared handle to a scene object. Pointer identity is object identity.
pub type SceneNode = Rc<RefCell<SceneObject>>;

/// The host-owned drawable list
#[derive(Debug, Default)]
pub struct Scene {
    objects: Vec<SceneNode>,
    pub background: Option<Tint>,
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object to the scene, returning a shared handle to it
    pub fn add(&mut self, object: SceneObject) -> SceneNode {
        let node = Rc::new(RefCell::new(object));
        self.objects.push(Rc::clone(&node));
        node
    }

    /// Remove one object by identity. Absent objects are ignored.
    pub fn remove(&mut self, node: &SceneNode) {
        self.objects.retain(|n| !Rc::ptr_eq(n, node));
    }

    #[must_use]
    pub fn objects(&self) -> &[SceneNode] {
        &self.objects
    }

    /// Replace the whole drawable list. Only the lifecycle manager's
    /// ledger restore is expected to call this.
    pub fn replace_objects(&mut self, objects: Vec<SceneNode>) {
        self.objects = objects;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Paint every visible object into the frame buffer, in insertion order
    pub fn render(&self, frame: &mut Frame<'_>) {
        let area = frame.size();
        if let Some(bg) = self.background {
            fill_background(frame, area, bg);
        }
        for node in &self.objects {
            let obj = node.borrow();
            if !obj.visible {
                continue;
            }
            match &obj.kind {
                ObjectKind::Circle { radius } => {
                    draw_circle(frame, area, obj.x, obj.y, *radius, obj.tint);
                }
                ObjectKind::Rect { width, height } => {
                    draw_rect(frame, area, obj.x, obj.y, *width, *height, obj.tint);
                }
                ObjectKind::Text { content } => {
                    draw_text(frame, area, obj.x, obj.y, content, obj.tint);
                }
                ObjectKind::Image { pixels } => {
                    pixels.render(frame, area, obj.x, obj.y);
                }
            }
        }
    }
}

fn fill_background(frame: &mut Frame<'_>, area: Rect, bg: Tint) {
    let buf = frame.buffer_mut();
    for y in area.top()..area.bottom() {
        for x in area.left()..area.right() {
            buf.get_mut(x, y).set_bg(bg.to_color());
        }
    }
}

fn put_cell(frame: &mut Frame<'_>, area: Rect, x: f32, y: f32, tint: Tint) {
    if x < 0.0 || y < 0.0 {
        return;
    }
    let (cx, cy) = (x.round() as u16, y.round() as u16);
    if cx >= area.width || cy >= area.height {
        return;
    }
    frame
        .buffer_mut()
        .get_mut(area.x + cx, area.y + cy)
        .set_char('█')
        .set_fg(tint.to_color());
}

/// Filled circle, compensating for the roughly 2:1 cell aspect ratio.
/// Game-supplied sizes are unbounded, so the radius is clamped to the
/// surface to keep the raster loop proportional to the visible area.
fn draw_circle(frame: &mut Frame<'_>, area: Rect, x: f32, y: f32, radius: f32, tint: Tint) {
    let limit = f32::from(area.width).max(f32::from(area.height) * 2.0);
    let r = radius.clamp(0.0, limit);
    let span = r.ceil() as i32;
    for dy in -span..=span {
        for dx in -span..=span {
            let (fx, fy) = (dx as f32, dy as f32 * 2.0);
            if fx * fx + fy * fy <= r * r {
                put_cell(frame, area, x + dx as f32, y + dy as f32, tint);
            }
        }
    }
}

fn draw_rect(frame: &mut Frame<'_>, area: Rect, x: f32, y: f32, w: f32, h: f32, tint: Tint) {
    // Clamped for the same reason as the circle radius
    let (w, h) = (
        w.clamp(0.0, f32::from(area.width)) as i32,
        h.clamp(0.0, f32::from(area.height)) as i32,
    );
    for dy in 0..h {
        for dx in 0..w {
            put_cell(frame, area, x + dx as f32, y + dy as f32, tint);
        }
    }
}

fn draw_text(frame: &mut Frame<'_>, area: Rect, x: f32, y: f32, text: &str, tint: Tint) {
    if y < 0.0 || x < 0.0 {
        return;
    }
    let (mut cx, cy) = (x.round() as u16, y.round() as u16);
    if cy >= area.height {
        return;
    }
    let buf = frame.buffer_mut();
    for ch in text.chars() {
        if cx >= area.width {
            break;
        }
        buf.get_mut(area.x + cx, area.y + cy)
            .set_char(ch)
            .set_fg(tint.to_color());
        cx += 1;
    }
}
