//! TerminalRenderer: flushes styled lines to a real terminal.
//!
//! Frames are diffed line by line against the previous frame; only changed
//! rows are rewritten.

use std::io::{self, Write};

use anyhow::Result;

use crossterm::{
    cursor,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    terminal, QueueableCommand,
};

use crate::game_view::{Line, Style};

pub struct TerminalRenderer {
    stdout: io::Stdout,
    last: Vec<Line>,
    full: bool,
    buf: Vec<u8>,
}

impl TerminalRenderer {
    pub fn new() -> Self {
        Self {
            stdout: io::stdout(),
            last: Vec::new(),
            full: true,
            buf: Vec::with_capacity(16 * 1024),
        }
    }

    pub fn enter(&mut self) -> Result<()> {
        terminal::enable_raw_mode()?;
        self.buf.clear();
        self.buf.queue(terminal::EnterAlternateScreen)?;
        self.buf.queue(cursor::Hide)?;
        self.buf.queue(terminal::DisableLineWrap)?;
        self.flush_buf()?;
        self.invalidate();
        Ok(())
    }

    pub fn exit(&mut self) -> Result<()> {
        self.buf.clear();
        self.buf.queue(ResetColor)?;
        self.buf.queue(SetAttribute(Attribute::Reset))?;
        self.buf.queue(terminal::EnableLineWrap)?;
        self.buf.queue(cursor::Show)?;
        self.buf.queue(terminal::LeaveAlternateScreen)?;
        self.flush_buf()?;
        terminal::disable_raw_mode()?;
        Ok(())
    }

    /// Force the next draw to be a full redraw (e.g. after a resize).
    pub fn invalidate(&mut self) {
        self.full = true;
    }

    /// Draw a frame, keeping it as the base of the next diff.
    pub fn draw(&mut self, lines: Vec<Line>) -> Result<()> {
        self.buf.clear();
        if self.full {
            encode_full_into(&lines, &mut self.buf)?;
            self.full = false;
        } else {
            encode_diff_into(&self.last, &lines, &mut self.buf)?;
        }
        self.flush_buf()?;
        self.last = lines;
        Ok(())
    }

    fn flush_buf(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        self.stdout.write_all(&self.buf)?;
        self.stdout.flush()?;
        Ok(())
    }
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a full-frame redraw into `out`.
pub fn encode_full_into(lines: &[Line], out: &mut Vec<u8>) -> Result<()> {
    out.queue(terminal::Clear(terminal::ClearType::All))?;
    for (y, line) in lines.iter().enumerate() {
        encode_line_into(y, line, out)?;
    }
    out.queue(ResetColor)?;
    out.queue(SetAttribute(Attribute::Reset))?;
    Ok(())
}

/// Encode only the rows that differ from `prev`. Rows that disappeared are
/// cleared. Writes nothing when the frames are equal.
pub fn encode_diff_into(prev: &[Line], next: &[Line], out: &mut Vec<u8>) -> Result<()> {
    let start = out.len();
    for (y, line) in next.iter().enumerate() {
        if prev.get(y) != Some(line) {
            encode_line_into(y, line, out)?;
        }
    }
    for y in next.len()..prev.len() {
        out.queue(cursor::MoveTo(0, row(y)))?;
        out.queue(terminal::Clear(terminal::ClearType::CurrentLine))?;
    }
    if out.len() > start {
        out.queue(ResetColor)?;
        out.queue(SetAttribute(Attribute::Reset))?;
    }
    Ok(())
}

fn encode_line_into(y: usize, line: &Line, out: &mut Vec<u8>) -> Result<()> {
    out.queue(cursor::MoveTo(0, row(y)))?;
    out.queue(terminal::Clear(terminal::ClearType::CurrentLine))?;
    for span in &line.spans {
        apply_style_into(out, span.style)?;
        out.queue(Print(&span.text))?;
    }
    Ok(())
}

fn row(y: usize) -> u16 {
    u16::try_from(y).unwrap_or(u16::MAX)
}

fn apply_style_into(out: &mut Vec<u8>, style: Style) -> Result<()> {
    out.queue(SetAttribute(Attribute::Reset))?;
    out.queue(SetForegroundColor(style_color(style)))?;
    match style {
        Style::Bold | Style::Clearing => {
            out.queue(SetAttribute(Attribute::Bold))?;
        }
        Style::Dim | Style::Ghost(_) => {
            out.queue(SetAttribute(Attribute::Dim))?;
        }
        _ => {}
    }
    Ok(())
}

fn style_color(style: Style) -> Color {
    match style {
        Style::Mino(shape) | Style::Ghost(shape) => {
            let (r, g, b) = shape.color();
            Color::Rgb { r, g, b }
        }
        Style::Garbage => Color::Rgb {
            r: 110,
            g: 110,
            b: 110,
        },
        Style::Clearing => Color::White,
        Style::Dim => Color::DarkGrey,
        Style::Plain | Style::Bold => Color::Reset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Shape;

    #[test]
    fn test_equal_frames_encode_nothing() {
        let frame = vec![Line::plain("abc"), Line::plain("def")];
        let mut out = Vec::new();
        encode_diff_into(&frame, &frame, &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_only_changed_rows_are_written() {
        let prev = vec![Line::plain("same"), Line::plain("old-row")];
        let next = vec![Line::plain("same"), Line::plain("new-row")];
        let mut out = Vec::new();
        encode_diff_into(&prev, &next, &mut out).unwrap();
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("new-row"));
        assert!(!text.contains("same"));
    }

    #[test]
    fn test_style_change_alone_is_a_change() {
        let mut a = Line::default();
        a.push("[]", Style::Mino(Shape::T));
        let mut b = Line::default();
        b.push("[]", Style::Mino(Shape::Z));
        let mut out = Vec::new();
        encode_diff_into(&[a], &[b], &mut out).unwrap();
        assert!(!out.is_empty());
    }

    #[test]
    fn test_full_redraw_contains_every_row() {
        let frame = vec![Line::plain("top"), Line::plain("bottom")];
        let mut out = Vec::new();
        encode_full_into(&frame, &mut out).unwrap();
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("top") && text.contains("bottom"));
    }

    #[test]
    fn test_mino_color_follows_shape() {
        assert_eq!(
            style_color(Style::Mino(Shape::I)),
            Color::Rgb {
                r: 26,
                g: 172,
                b: 217
            }
        );
    }
}
