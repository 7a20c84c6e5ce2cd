//! Terminal battle client (default binary).
//!
//! Usage: `battle-tetris [NAME] [OPPONENT]`. Without an opponent the client
//! waits in the lobby: up/down pick a player, Enter challenges them, `t`
//! opens the chat prompt. Connection settings come from `BATTLE_TETRIS_*`
//! variables (see the adapter crate).
//!
//! The terminal loop stays synchronous; the session (relay connection,
//! board actors, match controller) runs on a tokio runtime owned here.

use std::fs::OpenOptions;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

use battle_tetris::adapter::ClientConfig;
use battle_tetris::engine::{start_session, Command, Intent, MatchPhase, MatchStatus, Session};
use battle_tetris::input::{
    handle_key_event, should_quit, InputEvent, InputHandler, KeyCommand, LobbyInput, LobbyRequest,
};
use battle_tetris::term::{BattleView, BoardPane, Line, StatusLines, TerminalRenderer};
use battle_tetris::types::TICK_MS;

fn main() -> Result<()> {
    let mut config = ClientConfig::from_env()?;
    let mut args = std::env::args().skip(1);
    if let Some(name) = args.next() {
        config.name = name;
    }
    if let Some(opponent) = args.next() {
        config.opponent = Some(opponent);
    }
    init_tracing(config.log_path.as_deref())?;

    let rt = Runtime::new().context("cannot start tokio runtime")?;
    let session = rt.block_on(start_session(config))?;

    let mut term = TerminalRenderer::new();
    term.enter()?;

    let result = run(&mut term, &session);

    // Always try to restore terminal state.
    let _ = term.exit();
    let _ = session.commands.send(Command::Quit);
    rt.shutdown_timeout(Duration::from_millis(500));
    result
}

/// Raw mode owns the terminal, so logs only go to a file.
fn init_tracing(path: Option<&str>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file {path}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

fn run(term: &mut TerminalRenderer, session: &Session) -> Result<()> {
    let view = BattleView::new();
    let mut input = InputHandler::new();
    let mut lobby = LobbyInput::new();

    let mut last_tick = Instant::now();
    let tick_duration = Duration::from_millis(u64::from(TICK_MS));
    let mut was_playing = false;

    loop {
        if session.task.is_finished() {
            return Ok(());
        }

        let status = session.status.borrow().clone();
        let playing = status.phase == Some(MatchPhase::InRound);
        if was_playing && !playing {
            input.reset();
        }
        was_playing = playing;
        if !in_lobby(&status) {
            lobby.reset();
        }
        lobby.clamp(status.roster.len());

        term.draw(frame(&view, session, &status, &lobby))?;

        let timeout = tick_duration.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) => match key.kind {
                    KeyEventKind::Press => {
                        if on_press(key, session, &status, &mut input, &mut lobby) == Flow::Quit {
                            return Ok(());
                        }
                    }
                    KeyEventKind::Repeat => {
                        // DAS handles repeats internally.
                    }
                    KeyEventKind::Release => {
                        if let Some(KeyCommand::Play(action)) = handle_key_event(key) {
                            if let Some(event) = input.release(action) {
                                send_input(session, event);
                            }
                        }
                    }
                },
                Event::Resize(_, _) => term.invalidate(),
                _ => {}
            }
        }

        let elapsed = last_tick.elapsed();
        if elapsed >= tick_duration {
            last_tick = Instant::now();
            let ms = u32::try_from(elapsed.as_millis()).unwrap_or(u32::MAX);
            for event in input.update(ms) {
                send_input(session, event);
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

fn in_lobby(status: &MatchStatus) -> bool {
    matches!(status.phase, Some(MatchPhase::Lobby) | Some(MatchPhase::MatchOver) | None)
}

/// Route a key press by match phase. The chat prompt sees keys before the
/// quit check so `q` can be typed.
fn on_press(
    key: KeyEvent,
    session: &Session,
    status: &MatchStatus,
    input: &mut InputHandler,
    lobby: &mut LobbyInput,
) -> Flow {
    if in_lobby(status) && lobby.is_typing() {
        if let (_, Some(request)) = lobby.handle(key, status.roster.len()) {
            lobby_request(session, status, request);
        }
        return Flow::Continue;
    }
    if should_quit(key) {
        return Flow::Quit;
    }

    match &status.phase {
        Some(MatchPhase::InRound) => {
            if let Some(KeyCommand::Play(action)) = handle_key_event(key) {
                for event in input.press(action) {
                    send_input(session, event);
                }
            }
        }
        Some(MatchPhase::Challenged(_)) => match handle_key_event(key) {
            Some(KeyCommand::Accept) => send(session, Command::Respond(true)),
            Some(KeyCommand::Decline) => send(session, Command::Respond(false)),
            _ => {}
        },
        _ if in_lobby(status) => {
            if let (_, Some(request)) = lobby.handle(key, status.roster.len()) {
                lobby_request(session, status, request);
            }
        }
        _ => {}
    }
    Flow::Continue
}

fn lobby_request(session: &Session, status: &MatchStatus, request: LobbyRequest) {
    match request {
        LobbyRequest::Challenge(index) => {
            if let Some((name, _)) = status.roster.get(index) {
                send(session, Command::Challenge(name.clone()));
            }
        }
        LobbyRequest::Chat(text) => send(session, Command::Chat(text)),
    }
}

fn send(session: &Session, command: Command) {
    if session.commands.send(command).is_err() {
        tracing::debug!("session closed");
    }
}

fn send_input(session: &Session, event: InputEvent) {
    let intent = match event {
        InputEvent::Action(action) => Intent::Apply(action),
        InputEvent::PauseGravity => Intent::PauseGravity,
        InputEvent::ResumeGravity => Intent::ResumeGravity,
    };
    send(session, Command::Intent(intent));
}

fn frame(view: &BattleView, session: &Session, status: &MatchStatus, lobby: &LobbyInput) -> Vec<Line> {
    let mine = session.mine.borrow().clone();
    let theirs = session.theirs.borrow().clone();

    let banner = match &status.phase {
        Some(MatchPhase::Challenged(by)) => Some(format!("{by} challenges you - accept? (y/n)")),
        _ => status.banner.clone(),
    };
    let lobby_lines = if in_lobby(status) {
        let mut lines: Vec<String> = status
            .roster
            .iter()
            .enumerate()
            .map(|(i, (name, busy))| {
                let cursor = if i == lobby.selected() { '*' } else { ' ' };
                format!("{cursor} {name}{}", if *busy { " (busy)" } else { "" })
            })
            .collect();
        if lines.is_empty() {
            lines.push("nobody else is here yet".to_string());
        }
        lines.push("up/down select  enter challenge  t chat  q quit".to_string());
        lines
    } else {
        Vec::new()
    };

    view.render(
        BoardPane {
            name: &status.me,
            wins: status.my_wins,
            snap: &mine,
        },
        BoardPane {
            name: status.opponent.as_deref().unwrap_or("-"),
            wins: status.their_wins,
            snap: &theirs,
        },
        &StatusLines {
            banner: banner.as_deref(),
            lobby: lobby_lines,
            chat: &status.chat,
            prompt: lobby.draft(),
        },
    )
}
