//! Key mapping from terminal events to player commands.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::types::Action;

/// What a key asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    Play(Action),
    /// Accept a pending challenge
    Accept,
    /// Decline a pending challenge
    Decline,
}

/// Map a key to the board action it controls.
pub fn map_action(code: KeyCode) -> Option<Action> {
    match code {
        // Movement
        KeyCode::Left | KeyCode::Char('h') | KeyCode::Char('H') | KeyCode::Char('a') | KeyCode::Char('A') => {
            Some(Action::MoveLeft)
        }
        KeyCode::Right | KeyCode::Char('l') | KeyCode::Char('L') | KeyCode::Char('d') | KeyCode::Char('D') => {
            Some(Action::MoveRight)
        }
        KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('J') | KeyCode::Char('s') | KeyCode::Char('S') => {
            Some(Action::SoftDrop)
        }

        // Rotation
        KeyCode::Up
        | KeyCode::Char('k')
        | KeyCode::Char('K')
        | KeyCode::Char('w')
        | KeyCode::Char('W')
        | KeyCode::Char('x')
        | KeyCode::Char('X') => Some(Action::RotateCw),
        KeyCode::Char('z') | KeyCode::Char('Z') => Some(Action::RotateCcw),

        KeyCode::Char(' ') => Some(Action::HardDrop),
        KeyCode::Char('c') | KeyCode::Char('C') => Some(Action::Hold),

        _ => None,
    }
}

/// Map keyboard input to a player command.
pub fn handle_key_event(key: KeyEvent) -> Option<KeyCommand> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return None;
    }
    match key.code {
        KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => Some(KeyCommand::Accept),
        KeyCode::Char('n') | KeyCode::Char('N') => Some(KeyCommand::Decline),
        code => map_action(code).map(KeyCommand::Play),
    }
}

/// Check if key should quit the game.
pub fn should_quit(key: KeyEvent) -> bool {
    matches!(key.code, KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc)
        || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
}
