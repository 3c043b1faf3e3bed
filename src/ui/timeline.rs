// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timeline display widget.
//!
//! Draws the ruler, the track headers and every clip view of a document
//! onto the terminal grid. One terminal column covers
//! [`PIXELS_PER_COLUMN`] timeline pixels; each track spans
//! [`rows_per_track`] rows.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::{Block, Paragraph, Widget},
};

use crate::clip::ClipId;
use crate::coords::RulerSpacing;
use crate::document::Document;

/// Timeline pixels covered by one terminal column
pub const PIXELS_PER_COLUMN: f64 = 12.5;

/// Track pixels covered by one terminal row
pub const PIXELS_PER_ROW: f64 = 25.0;

/// Width of the track name column
pub const HEADER_WIDTH: u16 = 12;

/// Number of terminal rows a track occupies
pub fn rows_per_track(track_height: f64) -> u16 {
    (track_height / PIXELS_PER_ROW).round().max(1.0) as u16
}

/// Terminal column offset of a timeline pixel position
pub fn column_for_x(x: f64, scroll_x: f64) -> f64 {
    (x - scroll_x) / PIXELS_PER_COLUMN
}

/// Widget drawing a whole timeline
pub struct TimelineWidget<'a> {
    document: &'a Document,
    scroll_x: f64,
    focus: Option<ClipId>,
    focus_track: Option<usize>,
    block: Option<Block<'a>>,
}

impl<'a> TimelineWidget<'a> {
    /// Create a new timeline widget
    pub fn new(document: &'a Document) -> Self {
        Self {
            document,
            scroll_x: 0.0,
            focus: None,
            focus_track: None,
            block: None,
        }
    }

    /// Set horizontal scroll offset in pixels
    pub fn scroll_x(mut self, scroll_x: f64) -> Self {
        self.scroll_x = scroll_x.max(0.0);
        self
    }

    /// Set focused clip
    pub fn focus(mut self, clip: Option<ClipId>) -> Self {
        self.focus = clip;
        self
    }

    /// Set focused track
    pub fn focus_track(mut self, track: Option<usize>) -> Self {
        self.focus_track = track;
        self
    }

    /// Set the block wrapper
    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }
}

impl Widget for TimelineWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let area = if let Some(block) = self.block {
            let inner = block.inner(area);
            block.render(area, buf);
            inner
        } else {
            area
        };

        if area.width <= HEADER_WIDTH || area.height < 2 {
            return;
        }

        if self.document.tracks().is_empty() {
            Paragraph::new("No tracks (press t to add one)")
                .style(Style::default().fg(Color::DarkGray))
                .render(area, buf);
            return;
        }

        let lanes = Rect::new(
            area.x + HEADER_WIDTH,
            area.y + 1,
            area.width - HEADER_WIDTH,
            area.height - 1,
        );
        render_ruler(
            Rect::new(lanes.x, area.y, lanes.width, 1),
            buf,
            self.document,
            self.scroll_x,
        );
        render_headers(
            Rect::new(area.x, lanes.y, HEADER_WIDTH, lanes.height),
            buf,
            self.document,
            self.focus_track,
        );
        render_clips(lanes, buf, self.document, self.scroll_x, self.focus);
    }
}

/// Render the ruler row
fn render_ruler(area: Rect, buf: &mut Buffer, document: &Document, scroll_x: f64) {
    let coords = document.coords();
    let spacing = RulerSpacing::for_zoom(coords.zoom_level());
    let right_edge = scroll_x + area.width as f64 * PIXELS_PER_COLUMN;
    let minor_style = Style::default().fg(Color::DarkGray);
    let major_style = Style::default().fg(Color::Cyan);

    // Labels are written after the minor marks so they stay on top
    let ticks = spacing.ticks(coords, scroll_x, right_edge);
    for tick in ticks.iter().filter(|t| !t.major) {
        if let Some(col) = visible_column(tick.x, scroll_x, area.width) {
            buf.set_string(area.x + col, area.y, "·", minor_style);
        }
    }
    for tick in ticks.iter().filter(|t| t.major) {
        if let Some(col) = visible_column(tick.x, scroll_x, area.width) {
            let label = format!("|{}", tick.label());
            let room = (area.width - col) as usize;
            let label: String = label.chars().take(room).collect();
            buf.set_string(area.x + col, area.y, label, major_style);
        }
    }
}

fn visible_column(x: f64, scroll_x: f64, width: u16) -> Option<u16> {
    let col = column_for_x(x, scroll_x).floor();
    if col >= 0.0 && col < width as f64 {
        Some(col as u16)
    } else {
        None
    }
}

/// Render the track name column
fn render_headers(area: Rect, buf: &mut Buffer, document: &Document, focus_track: Option<usize>) {
    let rows = rows_per_track(document.tracks().track_height());
    for (i, track) in document.tracks().tracks().iter().enumerate() {
        let top = i as u32 * rows as u32;
        if top >= area.height as u32 {
            break;
        }
        let style = if focus_track == Some(i) {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else if i % 2 == 0 {
            Style::default().fg(Color::White)
        } else {
            Style::default().fg(Color::Gray)
        };
        let name: String = track.name.chars().take(HEADER_WIDTH as usize - 1).collect();
        buf.set_string(area.x, area.y + top as u16, name, style);
    }
}

/// Render every clip view inside the lane area
fn render_clips(
    area: Rect,
    buf: &mut Buffer,
    document: &Document,
    scroll_x: f64,
    focus: Option<ClipId>,
) {
    let track_height = document.tracks().track_height();
    let rows = rows_per_track(track_height);

    for view in document.views() {
        let Some(clip) = document.clip(view.clip) else {
            continue;
        };
        let top = clip.track() as u32 * rows as u32;
        if top >= area.height as u32 {
            continue;
        }

        let start = column_for_x(view.x, scroll_x).floor();
        // At least one column so tiny clips stay visible
        let end = column_for_x(view.x + view.width, scroll_x).ceil().max(start + 1.0);
        if end <= 0.0 || start >= area.width as f64 {
            continue;
        }
        let first = start.max(0.0) as u16;
        let last = end.min(area.width as f64) as u16;
        let height = (rows as u32).min(area.height as u32 - top) as u16;

        let color = clip.color();
        let mut style = Style::default()
            .bg(Color::Rgb(color.r, color.g, color.b))
            .fg(Color::Black);
        if view.selected {
            style = style.add_modifier(Modifier::REVERSED);
        }
        if focus == Some(view.clip) {
            style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
        }

        let rect = Rect::new(area.x + first, area.y + top as u16, last - first, height);
        buf.set_style(rect, style);
        let label: String = clip.name().chars().take(rect.width as usize).collect();
        buf.set_string(rect.x, rect.y, label, style);
    }
}
