//! Client session - wires the controller to the relay and the board actors
//!
//! [`start_session`] registers with the relay and spawns the session task.
//! The caller (usually a synchronous terminal loop) keeps the returned
//! [`Session`]: watch receivers for both boards and the match status, and
//! a command sender for player input.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use battle_tetris_adapter::{ClientConfig, Connection, Message, MessageWriter};
use battle_tetris_core::{BoardEvent, GameSnapshot, GameState};
use battle_tetris_types::Shape;

use crate::actor::{BoardHandle, Intent, Side};
use crate::controller::{Effect, MatchController, MatchStatus, Timer};

/// Requests from the local player
#[derive(Debug, Clone)]
pub enum Command {
    Intent(Intent),
    Challenge(String),
    Respond(bool),
    /// Lobby chat line
    Chat(String),
    Quit,
}

/// Handle kept by the UI
#[derive(Debug)]
pub struct Session {
    pub mine: watch::Receiver<GameSnapshot>,
    pub theirs: watch::Receiver<GameSnapshot>,
    pub status: watch::Receiver<MatchStatus>,
    pub commands: mpsc::UnboundedSender<Command>,
    pub task: JoinHandle<anyhow::Result<()>>,
}

/// Connect, register, and spawn the session loop.
///
/// With `config.opponent` set the session challenges that player right
/// away; with `config.auto_accept` it takes the first challenge it receives.
pub async fn start_session(config: ClientConfig) -> anyhow::Result<Session> {
    let addr = config.socket_addr()?;
    let connection = Connection::connect(addr, &config.name).await?;

    let mut controller = MatchController::new(config.name.clone(), config.auto_accept);
    for message in connection.roster.clone() {
        controller.on_message(message);
    }

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (mine, _) = BoardHandle::spawn(Side::Mine, GameState::authoritative(Shape::ALL, 0), events_tx.clone());
    let (theirs, _) = BoardHandle::spawn(Side::Theirs, GameState::mirror(Shape::ALL), events_tx);

    let (status_tx, status_rx) = watch::channel(controller.status());
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();

    let session = Session {
        mine: mine.subscribe(),
        theirs: theirs.subscribe(),
        status: status_rx,
        commands: commands_tx,
        task: tokio::spawn(async move {
            let opening = match &config.opponent {
                Some(opponent) => controller.challenge(opponent),
                None => Vec::new(),
            };
            let mut runner = Runner {
                controller,
                mine,
                theirs,
                status: status_tx,
                rng: StdRng::from_os_rng(),
            };
            runner.run(connection, opening, events_rx, commands_rx).await
        }),
    };
    Ok(session)
}

struct Runner {
    controller: MatchController,
    mine: BoardHandle,
    theirs: BoardHandle,
    status: watch::Sender<MatchStatus>,
    rng: StdRng,
}

/// Whether the session should keep running.
enum Flow {
    Continue,
    Quit,
}

impl Runner {
    async fn run(
        &mut self,
        connection: Connection,
        opening: Vec<Effect>,
        mut events: mpsc::UnboundedReceiver<(Side, BoardEvent)>,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) -> anyhow::Result<()> {
        let (mut reader, mut writer) = connection.into_split();

        // read_line is not cancel-safe, so reading gets its own task.
        let (relay_tx, mut relay_rx) = mpsc::unbounded_channel::<Message>();
        let read_task = tokio::spawn(async move {
            loop {
                match reader.recv().await {
                    Ok(Some(message)) => {
                        if relay_tx.send(message).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        tracing::warn!(%err, "relay read failed");
                        break;
                    }
                }
            }
        });

        let (timer_tx, mut timer_rx) = mpsc::unbounded_channel::<Timer>();
        let mut flow = self.execute(opening, &mut writer, &timer_tx).await?;

        while let Flow::Continue = flow {
            let effects = tokio::select! {
                message = relay_rx.recv() => match message {
                    Some(message) => self.controller.on_message(message),
                    None => {
                        tracing::info!("relay closed the connection");
                        break;
                    }
                },
                Some((side, event)) = events.recv() => self.controller.on_board_event(side, event),
                Some(timer) = timer_rx.recv() => self.controller.on_timer(timer),
                command = commands.recv() => match command {
                    Some(Command::Intent(intent)) => self.controller.on_local(intent),
                    Some(Command::Challenge(name)) => self.controller.challenge(&name),
                    Some(Command::Respond(accept)) => self.controller.respond(accept),
                    Some(Command::Chat(text)) => self.controller.chat(&text),
                    Some(Command::Quit) | None => self.controller.quit(),
                },
            };
            flow = self.execute(effects, &mut writer, &timer_tx).await?;
        }

        read_task.abort();
        Ok(())
    }

    async fn execute(
        &mut self,
        effects: Vec<Effect>,
        writer: &mut MessageWriter,
        timers: &mpsc::UnboundedSender<Timer>,
    ) -> anyhow::Result<Flow> {
        let mut flow = Flow::Continue;
        for effect in effects {
            match effect {
                Effect::Send(message) => writer.send(&message).await?,
                Effect::Board(Side::Mine, intent) => {
                    self.mine.send(intent);
                }
                Effect::Board(Side::Theirs, intent) => {
                    self.theirs.send(intent);
                }
                Effect::NewRound { mine, theirs } => {
                    let seed = self.rng.random();
                    self.mine
                        .send(Intent::Reset(Box::new(GameState::authoritative(mine, seed))));
                    self.theirs.send(Intent::Reset(Box::new(GameState::mirror(theirs))));
                    // The opponent may start before our countdown ends.
                    self.theirs.send(Intent::Start);
                }
                Effect::Schedule { timer, after } => {
                    let timers = timers.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(after).await;
                        let _ = timers.send(timer);
                    });
                }
                Effect::Notice(text) => tracing::info!(%text, "notice"),
                Effect::Quit => flow = Flow::Quit,
            }
        }
        self.status.send_replace(self.controller.status());
        Ok(flow)
    }
}
