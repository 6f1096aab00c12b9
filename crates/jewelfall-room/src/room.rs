//! Room actor: one Tokio task per room owning both boards.
//!
//! This is the "actor model". The room's state (seats, boards, status) is
//! owned by a single task and nobody else can touch it. Other tasks hold a
//! [`RoomHandle`], which is just the sending end of an `mpsc` channel, and
//! ask the actor to do things by sending it a [`RoomCommand`]. No locks are
//! needed because only one task ever mutates the state.
//!
//! Every mutation (joins, leaves, input, ticks) happens inside the actor's
//! loop, one message at a time. Ticks come from a [`TickScheduler`] polled
//! in the same `select!`, so a tick never interleaves with an input and a
//! pause takes effect before the next message is read.

use std::sync::Arc;

use jewelfall_protocol::{
    ConnectionId, Direction, EndCause, GridSetup, GridUpdate, PauseReason, RoomId,
    RoomStatus, RoomSummary, ServerEvent, Slot, ROOM_CAPACITY,
};
use jewelfall_tick::TickScheduler;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{mpsc, oneshot};

use crate::game::{Match, SlotTick};
use crate::gateway::{BroadcastGateway, EventSender};
use crate::registry::ChangeNotifier;
use crate::replay::{ReplayRecorder, ReplayStore};
use crate::{RoomConfig, RoomError};

type Reply<T> = oneshot::Sender<Result<T, RoomError>>;

/// Commands accepted by a room actor.
///
/// Most variants carry a `reply`: a `oneshot::Sender` the actor uses to
/// answer exactly once. The caller keeps the receiving end and awaits it,
/// which turns a message send into something that reads like a function
/// call. If the actor stops before answering, the sender is dropped and
/// the caller sees [`RoomError::Unavailable`].
pub(crate) enum RoomCommand {
    JoinPlayer {
        conn: ConnectionId,
        display_name: String,
        slot: Option<Slot>,
        events: EventSender,
        reply: Reply<Slot>,
    },
    JoinViewer {
        conn: ConnectionId,
        events: EventSender,
        reply: Reply<()>,
    },
    Input {
        conn: ConnectionId,
        slot: Slot,
        direction: Direction,
        reply: Reply<()>,
    },
    RequestFullState {
        events: EventSender,
        reply: Reply<()>,
    },
    Leave {
        conn: ConnectionId,
        reply: Reply<()>,
    },
    GetSummary {
        reply: oneshot::Sender<RoomSummary>,
    },
    Shutdown,
}

/// Handle to a running room actor.
///
/// Cheap to clone. Every call fails with [`RoomError::Unavailable`] once
/// the actor has stopped.
#[derive(Clone, Debug)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Takes a player slot. `slot: None` picks the first free one.
    ///
    /// On success the room has already sent `joinedAsPlayer` on `events`,
    /// followed by the start sequence if this join filled the room.
    pub async fn join_player(
        &self,
        conn: ConnectionId,
        display_name: String,
        slot: Option<Slot>,
        events: EventSender,
    ) -> Result<Slot, RoomError> {
        self.request(|reply| RoomCommand::JoinPlayer {
            conn,
            display_name,
            slot,
            events,
            reply,
        })
        .await
    }

    /// Adds a viewer. A viewer joining a running match first receives a
    /// snapshot of both boards.
    pub async fn join_viewer(
        &self,
        conn: ConnectionId,
        events: EventSender,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::JoinViewer { conn, events, reply })
            .await
    }

    /// Applies a move to the slot held by `conn`.
    pub async fn input(
        &self,
        conn: ConnectionId,
        slot: Slot,
        direction: Direction,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Input {
            conn,
            slot,
            direction,
            reply,
        })
        .await
    }

    /// Sends `gridSetup` and `gridUpdate` for both slots to `events`.
    /// Does nothing before the match has started.
    pub async fn request_full_state(&self, events: EventSender) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::RequestFullState { events, reply })
            .await
    }

    /// Removes `conn` as viewer and as player.
    pub async fn leave(&self, conn: ConnectionId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Leave { conn, reply }).await
    }

    pub async fn summary(&self) -> Result<RoomSummary, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::GetSummary { reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// Stops the actor. Pending commands queued after this are dropped.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// Sends a command built around a fresh reply channel and waits for
    /// the answer. `build` receives the reply sender so each public method
    /// only has to say which variant it wants.
    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(build(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?
    }
}

#[derive(Debug)]
struct Seat {
    conn: ConnectionId,
    display_name: String,
}

struct RoomActor {
    room_id: RoomId,
    name: String,
    description: String,
    status: RoomStatus,
    /// Set once the start sequence has run. A room can be `paused` before
    /// that, when both players arrived with nobody watching.
    started: bool,
    seats: [Option<Seat>; ROOM_CAPACITY],
    /// Display names captured when the match started.
    names: [String; ROOM_CAPACITY],
    game: Match,
    gateway: BroadcastGateway,
    scheduler: TickScheduler,
    recorder: Option<ReplayRecorder>,
    replays: Arc<dyn ReplayStore>,
    changes: ChangeNotifier,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    async fn run(mut self) {
        tracing::info!(room_id = %self.room_id, name = %self.name, "room actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(RoomCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle(cmd),
                },
                _ = self.scheduler.wait_for_tick() => {
                    self.tick();
                    self.scheduler.record_tick_end();
                }
            }
        }

        self.scheduler.pause();
        self.gateway.clear();
        tracing::info!(room_id = %self.room_id, "room actor stopped");
    }

    fn handle(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::JoinPlayer {
                conn,
                display_name,
                slot,
                events,
                reply,
            } => {
                let result = self.join_player(conn, display_name, slot, events);
                self.reply(reply, result);
            }
            RoomCommand::JoinViewer { conn, events, reply } => {
                self.join_viewer(conn, events);
                self.reply(reply, Ok(()));
            }
            RoomCommand::Input {
                conn,
                slot,
                direction,
                reply,
            } => {
                let result = self.input(conn, slot, direction);
                self.reply(reply, result);
            }
            RoomCommand::RequestFullState { events, reply } => {
                if self.started {
                    self.send_snapshot(&events);
                }
                self.reply(reply, Ok(()));
            }
            RoomCommand::Leave { conn, reply } => {
                let result = self.leave(conn);
                self.reply(reply, result);
            }
            RoomCommand::GetSummary { reply } => {
                let _ = reply.send(self.summary());
            }
            RoomCommand::Shutdown => {}
        }
    }

    fn reply<T>(&self, reply: Reply<T>, result: Result<T, RoomError>) {
        if let Err(e) = &result {
            tracing::debug!(room_id = %self.room_id, error = %e, "intent rejected");
        }
        let _ = reply.send(result);
    }

    // -- membership ---------------------------------------------------------

    fn join_player(
        &mut self,
        conn: ConnectionId,
        display_name: String,
        wanted: Option<Slot>,
        events: EventSender,
    ) -> Result<Slot, RoomError> {
        if self.seat_of(conn).is_some() {
            return Err(RoomError::AlreadyInRoom(conn, self.room_id));
        }
        let free = Slot::ALL.into_iter().find(|s| self.seats[s.index()].is_none());
        if free.is_none() {
            return Err(RoomError::RoomFull(self.room_id));
        }
        if !self.status.is_joinable() {
            return Err(RoomError::InvalidState(format!(
                "cannot join a room that is {}",
                self.status
            )));
        }
        let slot = match wanted {
            Some(s) if self.seats[s.index()].is_some() => {
                return Err(RoomError::SlotTaken(self.room_id, s));
            }
            Some(s) => s,
            None => free.ok_or(RoomError::RoomFull(self.room_id))?,
        };

        tracing::info!(room_id = %self.room_id, %conn, %slot, name = %display_name, "player joined");
        let _ = events.send(ServerEvent::JoinedAsPlayer {
            room_id: self.room_id,
            slot,
        });
        self.seats[slot.index()] = Some(Seat { conn, display_name });
        self.gateway.add_player(conn, events);
        self.changes.bump();

        if self.seats.iter().all(Option::is_some) {
            if self.gateway.viewer_count() == 0 {
                self.pause(PauseReason::NoViewers);
            } else {
                self.start_match();
            }
        }
        Ok(slot)
    }

    fn join_viewer(&mut self, conn: ConnectionId, events: EventSender) {
        let _ = events.send(ServerEvent::JoinedAsViewer {
            room_id: self.room_id,
        });
        if self.gateway.is_viewer(conn) {
            return;
        }
        tracing::debug!(room_id = %self.room_id, %conn, "viewer joined");

        let waiting_to_start = self.status == RoomStatus::Paused && !self.started;
        if self.started {
            self.send_snapshot(&events);
        }
        self.gateway.add_viewer(conn, events);
        self.changes.bump();

        if waiting_to_start {
            self.start_match();
        } else if self.status == RoomStatus::Paused {
            self.resume();
        }
    }

    fn leave(&mut self, conn: ConnectionId) -> Result<(), RoomError> {
        let seat = self.seat_of(conn);
        let was_viewer = self.gateway.remove_viewer(conn);
        if seat.is_none() && !was_viewer {
            return Err(RoomError::NotInRoom(conn, self.room_id));
        }

        if let Some(slot) = seat {
            self.seats[slot.index()] = None;
            self.gateway.remove_player(conn);
            tracing::info!(room_id = %self.room_id, %conn, %slot, "player left");

            if self.started && !self.status.is_terminal() {
                self.finish(slot.opponent(), EndCause::Forfeit);
            } else if !self.started {
                if self.status == RoomStatus::Paused {
                    self.set_status(RoomStatus::Waiting);
                }
                // The other player may have been told `gamePaused`.
                self.gateway.to_all(&ServerEvent::PlayerLeft {
                    room_id: self.room_id,
                    slot,
                });
            }
        }
        if was_viewer {
            tracing::debug!(room_id = %self.room_id, %conn, "viewer left");
            if self.gateway.viewer_count() == 0 && self.status == RoomStatus::Playing {
                self.pause(PauseReason::NoViewers);
            }
        }

        self.changes.bump();
        Ok(())
    }

    fn seat_of(&self, conn: ConnectionId) -> Option<Slot> {
        Slot::ALL
            .into_iter()
            .find(|s| matches!(&self.seats[s.index()], Some(seat) if seat.conn == conn))
    }

    // -- state machine ------------------------------------------------------

    fn set_status(&mut self, next: RoomStatus) {
        debug_assert!(
            self.status.can_transition_to(next),
            "illegal transition {} -> {}",
            self.status,
            next
        );
        self.status = next;
        self.changes.bump();
    }

    fn start_match(&mut self) {
        for slot in Slot::ALL {
            self.names[slot.index()] = self.seats[slot.index()]
                .as_ref()
                .map(|s| s.display_name.clone())
                .unwrap_or_default();
        }
        self.game.reset();
        self.recorder = Some(ReplayRecorder::start());
        self.started = true;
        self.set_status(RoomStatus::Playing);

        for slot in Slot::ALL {
            self.gateway.to_all(&ServerEvent::GridSetup(self.grid_setup(slot)));
        }
        self.gateway.to_all(&ServerEvent::GameStarted {
            room_id: self.room_id,
        });
        self.scheduler.resume();
        tracing::info!(
            room_id = %self.room_id,
            player1 = %self.names[0],
            player2 = %self.names[1],
            "game started"
        );
    }

    fn pause(&mut self, reason: PauseReason) {
        self.scheduler.pause();
        self.set_status(RoomStatus::Paused);
        self.gateway.to_all(&ServerEvent::GamePaused { reason });
        tracing::info!(room_id = %self.room_id, ?reason, "game paused");
    }

    fn resume(&mut self) {
        if !self.started
            || self.gateway.viewer_count() == 0
            || self.seats.iter().any(Option::is_none)
        {
            return;
        }
        self.set_status(RoomStatus::Playing);
        self.gateway.to_all(&ServerEvent::GameResumed);
        self.scheduler.resume();
        tracing::info!(room_id = %self.room_id, "game resumed");
    }

    fn finish(&mut self, winner: Slot, cause: EndCause) {
        self.scheduler.pause();
        self.set_status(RoomStatus::Finished);

        let winner_name = self.names[winner.index()].clone();
        self.gateway.to_all(&ServerEvent::GameEnded {
            winning_slot: winner,
            winner_name: winner_name.clone(),
            cause,
        });
        tracing::info!(
            room_id = %self.room_id,
            %winner,
            winner_name = %winner_name,
            ?cause,
            "game ended"
        );

        if let Some(recorder) = self.recorder.take() {
            let replay = recorder.finish(
                self.room_id,
                self.name.clone(),
                self.names.clone(),
                winner,
            );
            self.replays.store(replay);
        }
    }

    // -- simulation ---------------------------------------------------------

    fn tick(&mut self) {
        if self.status != RoomStatus::Playing {
            return;
        }
        for slot in Slot::ALL {
            match self.game.tick_slot(slot) {
                SlotTick::ToppedOut => {
                    self.finish(slot.opponent(), EndCause::BoardFull);
                    return;
                }
                SlotTick::Locked(res) if !res.settled => {
                    tracing::warn!(
                        room_id = %self.room_id,
                        %slot,
                        passes = res.passes,
                        "board did not settle within the pass limit"
                    );
                }
                _ => {}
            }
            self.publish_view(slot);
        }
        tracing::trace!(room_id = %self.room_id, tick = self.scheduler.tick_count(), "tick");
    }

    fn input(
        &mut self,
        conn: ConnectionId,
        slot: Slot,
        direction: Direction,
    ) -> Result<(), RoomError> {
        if self.seat_of(conn) != Some(slot) {
            return Err(RoomError::NotYourSlot(conn, slot));
        }
        if self.status == RoomStatus::Playing && self.game.apply_input(slot, direction) {
            self.publish_view(slot);
        }
        Ok(())
    }

    // -- views --------------------------------------------------------------

    fn grid_update(&self, slot: Slot) -> GridUpdate {
        GridUpdate {
            slot,
            display_name: self.names[slot.index()].clone(),
            updated_nodes: self.game.view(slot),
        }
    }

    fn grid_setup(&self, slot: Slot) -> GridSetup {
        let grid = self.game.grid(slot);
        GridSetup {
            slot,
            display_name: self.names[slot.index()].clone(),
            width: grid.width(),
            height: grid.height(),
        }
    }

    /// Broadcasts the slot's view and records it.
    fn publish_view(&mut self, slot: Slot) {
        let update = self.grid_update(slot);
        if let Some(recorder) = &mut self.recorder {
            recorder.record(&update);
        }
        self.gateway.to_all(&ServerEvent::GridUpdate(update));
    }

    fn send_snapshot(&self, events: &EventSender) {
        for slot in Slot::ALL {
            let _ = events.send(ServerEvent::GridSetup(self.grid_setup(slot)));
            let _ = events.send(ServerEvent::GridUpdate(self.grid_update(slot)));
        }
    }

    fn summary(&self) -> RoomSummary {
        RoomSummary {
            room_id: self.room_id,
            name: self.name.clone(),
            description: self.description.clone(),
            player_count: self.seats.iter().flatten().count(),
            capacity: ROOM_CAPACITY,
            viewer_count: self.gateway.viewer_count(),
            status: self.status,
        }
    }
}

/// Everything a new room needs besides its id.
pub(crate) struct RoomSpawn {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) config: RoomConfig,
    pub(crate) replays: Arc<dyn ReplayStore>,
    pub(crate) changes: ChangeNotifier,
}

/// Spawns a room actor in `waiting` and returns its handle.
pub(crate) fn spawn_room(room_id: RoomId, spawn: RoomSpawn) -> RoomHandle {
    let RoomSpawn {
        name,
        description,
        config,
        replays,
        changes,
    } = spawn;
    let (tx, rx) = mpsc::channel(config.command_channel_size.max(1));

    let rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(room_id.0)),
        None => StdRng::from_os_rng(),
    };

    let actor = RoomActor {
        room_id,
        name,
        description,
        status: RoomStatus::Waiting,
        started: false,
        seats: [None, None],
        names: Default::default(),
        game: Match::new(rng),
        gateway: BroadcastGateway::new(room_id),
        scheduler: TickScheduler::new(config.tick_config()),
        recorder: None,
        replays,
        changes,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        sender: tx,
    }
}
