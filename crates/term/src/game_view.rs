//! BattleView: lays out both boards and the match status as styled lines.
//!
//! This module is pure (no I/O). It can be unit-tested through
//! [`Line::text`].

use crate::core::{ActiveSnapshot, GameSnapshot, PhaseView};
use crate::types::{Block, Shape, BOARD_HEIGHT, BOARD_WIDTH, SPAWN_ROW};

/// Rows drawn per board: the 20 rows below the spawn row plus one above.
pub const VISIBLE_ROWS: usize = 21;

const FIRST_ROW: usize = BOARD_HEIGHT as usize - VISIBLE_ROWS;
const PANEL_W: usize = 10;
const GAP: &str = "   ";

/// How a span is painted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Style {
    #[default]
    Plain,
    Dim,
    Bold,
    Mino(Shape),
    Ghost(Shape),
    Garbage,
    Clearing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub style: Style,
}

/// One terminal row
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Line {
    pub spans: Vec<Span>,
}

impl Line {
    pub fn plain(text: impl Into<String>) -> Self {
        let mut line = Self::default();
        line.push(text, Style::Plain);
        line
    }

    /// Append text, merging with the last span when the style matches.
    pub fn push(&mut self, text: impl Into<String>, style: Style) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        match self.spans.last_mut() {
            Some(last) if last.style == style => last.text.push_str(&text),
            _ => self.spans.push(Span { text, style }),
        }
    }

    pub fn extend(&mut self, other: Line) {
        for span in other.spans {
            self.push(span.text, span.style);
        }
    }

    pub fn width(&self) -> usize {
        self.spans.iter().map(|s| s.text.chars().count()).sum()
    }

    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    fn pad_to(&mut self, width: usize) {
        let have = self.width();
        if have < width {
            self.push(" ".repeat(width - have), Style::Plain);
        }
    }
}

/// One player's board plus labels
#[derive(Debug, Clone, Copy)]
pub struct BoardPane<'a> {
    pub name: &'a str,
    pub wins: u8,
    pub snap: &'a GameSnapshot,
}

/// Everything below the boards
#[derive(Debug, Clone, Default)]
pub struct StatusLines<'a> {
    pub banner: Option<&'a str>,
    pub lobby: Vec<String>,
    pub chat: &'a [String],
    /// Chat line being typed
    pub prompt: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Glyph {
    Empty,
    Ghost(Shape),
    Clearing,
    Garbage,
    Mino(Shape),
}

impl Glyph {
    fn paint(self) -> (&'static str, Style) {
        match self {
            Glyph::Empty => (" .", Style::Dim),
            Glyph::Ghost(shape) => ("::", Style::Ghost(shape)),
            Glyph::Clearing => ("==", Style::Clearing),
            Glyph::Garbage => ("##", Style::Garbage),
            Glyph::Mino(shape) => ("[]", Style::Mino(shape)),
        }
    }
}

/// Pure renderer for a two-board battle.
#[derive(Debug, Clone, Default)]
pub struct BattleView;

impl BattleView {
    pub fn new() -> Self {
        Self
    }

    /// Render both panes side by side followed by the status lines.
    pub fn render(&self, left: BoardPane<'_>, right: BoardPane<'_>, status: &StatusLines<'_>) -> Vec<Line> {
        let right = self.pane_lines(right);
        let mut lines: Vec<Line> = self
            .pane_lines(left)
            .into_iter()
            .zip(right)
            .map(|(mut l, r)| {
                l.push(GAP, Style::Plain);
                l.extend(r);
                l
            })
            .collect();

        lines.push(Line::default());
        if let Some(banner) = status.banner {
            let mut line = Line::plain(" ");
            line.push(banner, Style::Bold);
            lines.push(line);
        }
        lines.extend(status.lobby.iter().map(|l| Line::plain(format!(" {l}"))));
        lines.extend(status.chat.iter().map(|l| Line::plain(format!(" > {l}"))));
        if let Some(draft) = status.prompt {
            let mut line = Line::plain(" say: ");
            line.push(format!("{draft}_"), Style::Bold);
            lines.push(line);
        }
        lines
    }

    /// One board with its title, frame and side panel; all lines share a width.
    pub fn pane_lines(&self, pane: BoardPane<'_>) -> Vec<Line> {
        let grid = glyphs(pane.snap);
        let panel = panel_lines(pane.snap);
        let board_w = BOARD_WIDTH as usize * 2;
        let width = board_w + 2 + PANEL_W;
        let rule = format!("+{}+", "-".repeat(board_w));

        let mut lines = Vec::with_capacity(VISIBLE_ROWS + 3);
        let mut title = Line::plain(" ");
        title.push(pane.name, Style::Bold);
        title.push(format!(" [{}]", pane.wins), Style::Plain);
        lines.push(title);
        lines.push(Line::plain(rule.clone()));

        let overlay = match pane.snap.phase {
            PhaseView::GameOver => Some("GAME OVER"),
            PhaseView::Idle => Some("WAITING"),
            _ => None,
        };

        for (i, row) in grid.iter().enumerate() {
            let mut line = Line::plain("|");
            match overlay {
                Some(text) if i == VISIBLE_ROWS / 2 => {
                    let pad = board_w.saturating_sub(text.len()) / 2;
                    line.push(" ".repeat(pad), Style::Plain);
                    line.push(text, Style::Bold);
                    line.push(" ".repeat(board_w - pad - text.len()), Style::Plain);
                }
                _ => {
                    for glyph in row {
                        let (text, style) = glyph.paint();
                        line.push(text, style);
                    }
                }
            }
            line.push("|", Style::Plain);
            if let Some(side) = panel.get(i) {
                line.push(side.as_str(), Style::Plain);
            }
            lines.push(line);
        }
        lines.push(Line::plain(rule));

        for line in &mut lines {
            line.pad_to(width);
        }
        lines
    }
}

fn glyphs(snap: &GameSnapshot) -> Vec<[Glyph; BOARD_WIDTH as usize]> {
    let mut grid = vec![[Glyph::Empty; BOARD_WIDTH as usize]; VISIBLE_ROWS];

    for (i, row) in grid.iter_mut().enumerate() {
        let y = FIRST_ROW + i;
        let clearing = snap.clearing_rows.contains(&y);
        for (x, glyph) in row.iter_mut().enumerate() {
            *glyph = match snap.board[y][x] {
                _ if clearing => Glyph::Clearing,
                Some(Block::Garbage) => Glyph::Garbage,
                Some(Block::Mino(shape)) => Glyph::Mino(shape),
                None => Glyph::Empty,
            };
        }
    }

    let mut put = |piece: &ActiveSnapshot, glyph: Glyph| {
        for (x, y) in piece.cells() {
            let (Ok(x), Ok(y)) = (usize::try_from(x), usize::try_from(y)) else {
                continue;
            };
            if x < BOARD_WIDTH as usize && (FIRST_ROW..BOARD_HEIGHT as usize).contains(&y) {
                grid[y - FIRST_ROW][x] = glyph;
            }
        }
    };

    if let Some(active) = snap.active {
        if let Some(ghost_y) = snap.ghost_y {
            put(&ActiveSnapshot { y: ghost_y, ..active }, Glyph::Ghost(active.shape));
        }
        put(&active, Glyph::Mino(active.shape));
    }
    grid
}

fn panel_lines(snap: &GameSnapshot) -> Vec<String> {
    let mut lines = Vec::with_capacity(VISIBLE_ROWS);
    let hold = snap.hold.map(|s| s.as_char()).unwrap_or('-');
    lines.push(format!(" HOLD {hold}{}", if snap.can_hold { "" } else { "*" }));
    lines.push(String::new());
    lines.push(" NEXT".to_string());
    for shape in snap.next.iter().flatten() {
        lines.push(format!("  {}", shape.as_char()));
    }
    lines.push(String::new());
    lines.push(format!(" IN  {}", snap.incoming));
    if let Some(meter) = snap.meter {
        let filled = meter.iter().filter(|&&c| c > 0).count();
        lines.push(format!(" {}", "|".repeat(filled.min(PANEL_W - 1))));
    }
    lines.push(format!(" SENT {}", snap.lines_sent));
    if snap.combo > 1 {
        lines.push(format!(" COMBO {}", snap.combo - 1));
    }
    if snap.back_to_back {
        lines.push(" B2B".to_string());
    }
    if let Some(label) = &snap.label {
        lines.push(format!(" {label}"));
    }
    for line in &mut lines {
        if let Some((cut, _)) = line.char_indices().nth(PANEL_W) {
            line.truncate(cut);
        }
    }
    lines
}

/// Row of the spawn line inside the rendered grid.
pub fn spawn_row_index() -> usize {
    SPAWN_ROW as usize - FIRST_ROW
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bag::parse_bag;
    use crate::core::GameState;
    use crate::types::Action;

    fn playing() -> GameSnapshot {
        let mut game = GameState::authoritative(parse_bag("TIOJLSZ").unwrap(), 1);
        game.start();
        game.snapshot()
    }

    fn pane(snap: &GameSnapshot) -> Vec<Line> {
        BattleView::new().pane_lines(BoardPane {
            name: "alice",
            wins: 1,
            snap,
        })
    }

    #[test]
    fn test_pane_lines_have_equal_width() {
        let snap = playing();
        let lines = pane(&snap);
        assert_eq!(lines.len(), VISIBLE_ROWS + 3);
        let width = lines[0].width();
        assert!(lines.iter().all(|l| l.width() == width));
        assert!(lines[0].text().contains("alice [1]"));
    }

    #[test]
    fn test_active_piece_and_ghost_are_drawn() {
        let snap = playing();
        let lines = pane(&snap);
        let grid = &lines[2..2 + VISIBLE_ROWS];
        let count = |pat: &str| grid.iter().map(|l| l.text().matches(pat).count()).sum::<usize>();
        assert_eq!(count("[]"), 4);
        assert_eq!(count("::"), 4);

        let spawn = spawn_row_index();
        assert!(grid[spawn].text().contains("[]") || grid[spawn + 1].text().contains("[]"));
        assert!(grid[VISIBLE_ROWS - 1]
            .spans
            .iter()
            .any(|s| s.style == Style::Ghost(Shape::T)));
    }

    #[test]
    fn test_locked_cells_keep_their_shape_style() {
        let mut game = GameState::authoritative(parse_bag("TIOJLSZ").unwrap(), 1);
        game.start();
        game.apply(Action::HardDrop);
        let lines = pane(&game.snapshot());
        let bottom = &lines[1 + VISIBLE_ROWS];
        assert!(bottom.spans.iter().any(|s| s.style == Style::Mino(Shape::T)));
    }

    #[test]
    fn test_panel_shows_preview() {
        let snap = playing();
        let panel = panel_lines(&snap);
        assert_eq!(panel[0], " HOLD -");
        assert_eq!(panel[3], "  I");
    }

    #[test]
    fn test_game_over_overlay() {
        let mut snap = GameSnapshot::empty();
        snap.phase = PhaseView::GameOver;
        let lines = pane(&snap);
        assert!(lines.iter().any(|l| l.text().contains("GAME OVER")));
    }

    #[test]
    fn test_line_push_merges_same_style() {
        let mut line = Line::plain("a");
        line.push("b", Style::Plain);
        line.push("c", Style::Bold);
        line.push("", Style::Dim);
        assert_eq!(line.spans.len(), 2);
        assert_eq!(line.text(), "abc");
    }

    #[test]
    fn test_render_two_panes_with_status() {
        let mine = playing();
        let mut other = GameState::mirror(parse_bag("ZSLJOIT").unwrap());
        other.start();
        other.apply(Action::MoveLeft);
        let theirs = other.snapshot();

        let chat = vec!["bob: gl".to_string()];
        let lines = BattleView::new().render(
            BoardPane {
                name: "alice",
                wins: 0,
                snap: &mine,
            },
            BoardPane {
                name: "bob",
                wins: 1,
                snap: &theirs,
            },
            &StatusLines {
                banner: Some("READY"),
                lobby: vec![],
                chat: &chat,
                prompt: None,
            },
        );
        let first = lines[0].text();
        assert!(first.contains("alice") && first.contains("bob [1]"));
        assert!(lines.iter().any(|l| l.text() == " READY"));
        assert_eq!(lines.last().map(Line::text).as_deref(), Some(" > bob: gl"));
    }

    #[test]
    fn test_lobby_and_chat_prompt() {
        let idle = GameSnapshot::empty();
        let pane = BoardPane {
            name: "-",
            wins: 0,
            snap: &idle,
        };
        let lines = BattleView::new().render(
            pane,
            pane,
            &StatusLines {
                banner: None,
                lobby: vec!["* bob".into(), "  carol (busy)".into()],
                chat: &[],
                prompt: Some("hi all"),
            },
        );
        let texts: Vec<String> = lines.iter().map(Line::text).collect();
        assert!(texts.contains(&" * bob".to_string()));
        assert!(texts.contains(&"   carol (busy)".to_string()));
        assert_eq!(texts.last().map(String::as_str), Some(" say: hi all_"));
    }
}
