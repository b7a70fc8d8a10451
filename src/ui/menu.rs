//! Game-selection carousel.
//!
//! Previews scroll horizontally around the selected game, which sits in the
//! center. Selection moves instantly; a scroll offset is nudged in the
//! opposite direction and decays back to zero each frame, so the strip
//! appears to glide rather than jump.

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use tracing::debug;

use crate::catalog::{GameCatalog, GameDescriptor};
use crate::scene::preview::PreviewImage;

/// Cells between carousel slot centers, derived from the preview width
const SLOT_PADDING: u16 = 6;

/// How fast the scroll offset decays back to center, in slots per second
const SCROLL_SPEED: f32 = 3.0;

struct MenuEntry {
    descriptor: GameDescriptor,
    preview: Option<PreviewImage>,
}

/// The game-selection carousel and its info panel
pub struct Menu {
    entries: Vec<MenuEntry>,
    selected: usize,
    scroll_offset: f32,
    preview_width: u16,
    preview_height: u16,
}

impl Menu {
    /// Build the menu from a discovered catalog, decoding preview icons.
    /// Games whose icon fails to decode keep a placeholder slot.
    #[must_use]
    pub fn new(catalog: &GameCatalog, preview_width: u16, preview_height: u16) -> Self {
        let entries = catalog
            .games()
            .iter()
            .map(|game| {
                let preview = match PreviewImage::load(&game.icon_path, preview_width, preview_height)
                {
                    Ok(preview) => Some(preview),
                    Err(e) => {
                        debug!("No preview for '{}': {e}", game.name);
                        None
                    }
                };
                MenuEntry {
                    descriptor: game.clone(),
                    preview,
                }
            })
            .collect();

        Self {
            entries,
            selected: 0,
            scroll_offset: 0.0,
            preview_width,
            preview_height,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The game currently in the center slot
    #[must_use]
    pub fn selected_game(&self) -> Option<&GameDescriptor> {
        self.entries.get(self.selected).map(|e| &e.descriptor)
    }

    pub fn move_left(&mut self) {
        self.step(-1);
    }

    pub fn move_right(&mut self) {
        self.step(1);
    }

    fn step(&mut self, direction: i32) {
        if self.entries.is_empty() {
            return;
        }
        let n = self.entries.len() as i32;
        self.selected = ((self.selected as i32 + direction).rem_euclid(n)) as usize;
        self.scroll_offset -= direction as f32;
    }

    /// Decay the scroll offset toward zero
    pub fn update(&mut self, frame_time: f32) {
        let step = SCROLL_SPEED * frame_time;
        if self.scroll_offset > step {
            self.scroll_offset -= step;
        } else if self.scroll_offset < -step {
            self.scroll_offset += step;
        } else {
            self.scroll_offset = 0.0;
        }
    }

    pub fn render(&self, frame: &mut Frame<'_>, fps: Option<f32>) {
        let area = frame.size();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(self.preview_height + 2),
                Constraint::Length(6),
            ])
            .split(area);

        self.render_header(frame, chunks[0], fps);

        if self.entries.is_empty() {
            let empty = Paragraph::new("No games installed. Drop one into the games directory.")
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::DarkGray));
            frame.render_widget(empty, chunks[1]);
            return;
        }

        self.render_carousel(frame, chunks[1]);
        self.render_info_panel(frame, chunks[2]);
    }

    fn render_header(&self, frame: &mut Frame<'_>, area: Rect, fps: Option<f32>) {
        let title = Paragraph::new("CABINET")
            .alignment(Alignment::Center)
            .style(Style::default().add_modifier(Modifier::BOLD))
            .block(Block::default().borders(Borders::BOTTOM));
        frame.render_widget(title, area);

        if let Some(fps) = fps {
            let readout = Paragraph::new(format!("{fps:.1} fps"))
                .alignment(Alignment::Right)
                .style(Style::default().fg(Color::DarkGray));
            frame.render_widget(readout, area);
        }
    }

    fn render_carousel(&self, frame: &mut Frame<'_>, area: Rect) {
        let full = frame.size();
        let n = self.entries.len() as f32;
        let spacing = f32::from(self.preview_width + SLOT_PADDING);
        let center_x = f32::from(area.width) / 2.0 - f32::from(self.preview_width) / 2.0;
        let half = (n / 2.0).floor();
        let top = f32::from(area.y) + 1.0;

        // Draw outermost slots first so the centered, selected preview
        // paints over its neighbors where they overlap
        let mut order: Vec<usize> = (0..self.entries.len()).collect();
        order.sort_by(|&a, &b| {
            self.slot_distance(b, half)
                .total_cmp(&self.slot_distance(a, half))
        });

        for i in order {
            let rel = self.slot_position(i, half);
            let x = center_x + rel * spacing;
            if x + spacing < 0.0 || x > f32::from(area.width) {
                continue;
            }

            let entry = &self.entries[i];
            match &entry.preview {
                Some(preview) => preview.render(frame, full, x, top),
                None => self.render_placeholder(frame, area, x, top),
            }

            let is_selected = i == self.selected && rel.abs() < 0.5;
            self.render_caption(frame, area, x, top, entry, is_selected);
        }
    }

    /// Slot position relative to the center, in slot units, wrapped so the
    /// strip is endless
    fn slot_position(&self, index: usize, half: f32) -> f32 {
        let n = self.entries.len() as f32;
        let raw = index as f32 - self.selected as f32 + self.scroll_offset;
        (raw + half).rem_euclid(n) - half
    }

    fn slot_distance(&self, index: usize, half: f32) -> f32 {
        self.slot_position(index, half).abs()
    }

    fn render_placeholder(&self, frame: &mut Frame<'_>, area: Rect, x: f32, y: f32) {
        let rect = Rect {
            x: area.x + (x.max(0.0) as u16).min(area.width.saturating_sub(1)),
            y: y as u16,
            width: self.preview_width.min(area.width),
            height: self.preview_height.min(area.height),
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(block, rect.intersection(area));
    }

    fn render_caption(
        &self,
        frame: &mut Frame<'_>,
        area: Rect,
        x: f32,
        y: f32,
        entry: &MenuEntry,
        selected: bool,
    ) {
        let caption_y = y as u16 + self.preview_height;
        if caption_y >= area.bottom() || x < 0.0 {
            return;
        }
        let rect = Rect {
            x: area.x + (x as u16).min(area.width.saturating_sub(1)),
            y: caption_y,
            width: self.preview_width.min(area.right().saturating_sub(x as u16)),
            height: 1,
        };
        let style = if selected {
            Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let caption = Paragraph::new(entry.descriptor.short_title.as_str())
            .alignment(Alignment::Center)
            .style(style);
        frame.render_widget(caption, rect);
    }

    fn render_info_panel(&self, frame: &mut Frame<'_>, area: Rect) {
        let Some(game) = self.selected_game() else {
            return;
        };
        let lines = vec![
            Line::styled(
                game.title.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Line::raw(game.description.clone()),
        ];
        let panel = Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::TOP).title("Press Enter to play"));
        frame.render_widget(panel, area);
    }
}
