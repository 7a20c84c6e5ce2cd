//! Lobby keys: roster selection, challenge, and chat entry.
//!
//! Browsing mode moves a cursor over the roster; `t` (or `/`) opens a chat
//! draft that swallows every key until Enter sends it or Esc drops it.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Longest chat line accepted from the keyboard
pub const MAX_CHAT_LEN: usize = 120;

/// What the lobby asks the session to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyRequest {
    /// Challenge the roster entry at this index
    Challenge(usize),
    Chat(String),
}

#[derive(Debug, Clone, Default)]
pub struct LobbyInput {
    selected: usize,
    draft: Option<String>,
}

impl LobbyInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    /// Chat text being typed, if the prompt is open.
    pub fn draft(&self) -> Option<&str> {
        self.draft.as_deref()
    }

    pub fn is_typing(&self) -> bool {
        self.draft.is_some()
    }

    /// Keep the cursor on the roster after it shrinks.
    pub fn clamp(&mut self, roster_len: usize) {
        self.selected = self.selected.min(roster_len.saturating_sub(1));
    }

    /// Feed one key press; returns whether it was consumed and what it asks for.
    pub fn handle(&mut self, key: KeyEvent, roster_len: usize) -> (bool, Option<LobbyRequest>) {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return (false, None);
        }
        if self.draft.is_some() {
            return (true, self.edit_draft(key.code));
        }

        self.clamp(roster_len);
        match key.code {
            KeyCode::Up | KeyCode::Char('k') | KeyCode::Char('K') => {
                self.selected = self.selected.saturating_sub(1);
                (true, None)
            }
            KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('J') => {
                if self.selected + 1 < roster_len {
                    self.selected += 1;
                }
                (true, None)
            }
            KeyCode::Enter if roster_len > 0 => (true, Some(LobbyRequest::Challenge(self.selected))),
            KeyCode::Char('t') | KeyCode::Char('T') | KeyCode::Char('/') => {
                self.draft = Some(String::new());
                (true, None)
            }
            _ => (false, None),
        }
    }

    fn edit_draft(&mut self, code: KeyCode) -> Option<LobbyRequest> {
        match code {
            KeyCode::Enter => {
                let text = self.draft.take().unwrap_or_default();
                let text = text.trim();
                (!text.is_empty()).then(|| LobbyRequest::Chat(text.to_string()))
            }
            KeyCode::Esc => {
                self.draft = None;
                None
            }
            KeyCode::Backspace => {
                if let Some(draft) = self.draft.as_mut() {
                    draft.pop();
                }
                None
            }
            KeyCode::Char(c) => {
                if let Some(draft) = self.draft.as_mut().filter(|d| d.chars().count() < MAX_CHAT_LEN) {
                    draft.push(c);
                }
                None
            }
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        self.draft = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(lobby: &mut LobbyInput, code: KeyCode, roster_len: usize) -> (bool, Option<LobbyRequest>) {
        lobby.handle(KeyEvent::from(code), roster_len)
    }

    fn type_text(lobby: &mut LobbyInput, text: &str) {
        for c in text.chars() {
            press(lobby, KeyCode::Char(c), 0);
        }
    }

    #[test]
    fn test_cursor_stays_on_roster() {
        let mut lobby = LobbyInput::new();
        press(&mut lobby, KeyCode::Up, 3);
        assert_eq!(lobby.selected(), 0);
        press(&mut lobby, KeyCode::Down, 3);
        press(&mut lobby, KeyCode::Char('j'), 3);
        press(&mut lobby, KeyCode::Down, 3);
        assert_eq!(lobby.selected(), 2);

        lobby.clamp(1);
        assert_eq!(lobby.selected(), 0);
    }

    #[test]
    fn test_enter_challenges_selection() {
        let mut lobby = LobbyInput::new();
        press(&mut lobby, KeyCode::Down, 2);
        assert_eq!(
            press(&mut lobby, KeyCode::Enter, 2),
            (true, Some(LobbyRequest::Challenge(1)))
        );
        // Nothing to challenge in an empty lobby.
        assert_eq!(press(&mut lobby, KeyCode::Enter, 0), (false, None));
    }

    #[test]
    fn test_chat_draft_swallows_keys() {
        let mut lobby = LobbyInput::new();
        press(&mut lobby, KeyCode::Char('t'), 0);
        assert!(lobby.is_typing());

        // 'q' and 'j' are text while typing, not quit or cursor keys.
        type_text(&mut lobby, "gg qj!");
        press(&mut lobby, KeyCode::Backspace, 0);
        assert_eq!(lobby.draft(), Some("gg qj"));

        assert_eq!(
            press(&mut lobby, KeyCode::Enter, 0),
            (true, Some(LobbyRequest::Chat("gg qj".into())))
        );
        assert!(!lobby.is_typing());
    }

    #[test]
    fn test_empty_or_cancelled_draft_sends_nothing() {
        let mut lobby = LobbyInput::new();
        press(&mut lobby, KeyCode::Char('/'), 0);
        type_text(&mut lobby, "   ");
        assert_eq!(press(&mut lobby, KeyCode::Enter, 0), (true, None));

        press(&mut lobby, KeyCode::Char('t'), 0);
        type_text(&mut lobby, "hello");
        assert_eq!(press(&mut lobby, KeyCode::Esc, 0), (true, None));
        assert_eq!(lobby.draft(), None);
    }

    #[test]
    fn test_draft_length_is_capped() {
        let mut lobby = LobbyInput::new();
        press(&mut lobby, KeyCode::Char('t'), 0);
        type_text(&mut lobby, &"x".repeat(MAX_CHAT_LEN + 10));
        assert_eq!(lobby.draft().map(str::len), Some(MAX_CHAT_LEN));
    }

    #[test]
    fn test_unrelated_keys_pass_through() {
        let mut lobby = LobbyInput::new();
        assert_eq!(press(&mut lobby, KeyCode::Char('q'), 2), (false, None));
        assert_eq!(
            lobby.handle(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), 2),
            (false, None)
        );
    }
}
