//! Replay capture and hand-off.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use jewelfall_protocol::{GridUpdate, Replay, ReplayFrame, RoomId, Slot};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Receives finished replays. Implementations must not block; the room
/// actor calls this from inside its loop.
pub trait ReplayStore: Send + Sync + 'static {
    fn store(&self, replay: Replay);
}

/// Forwards replays into a channel.
impl ReplayStore for mpsc::UnboundedSender<Replay> {
    fn store(&self, replay: Replay) {
        if self.send(replay).is_err() {
            tracing::debug!("replay receiver dropped");
        }
    }
}

/// Logs a one-line summary of every replay and discards it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingReplayStore;

impl ReplayStore for LoggingReplayStore {
    fn store(&self, replay: Replay) {
        let duration = replay.frames.last().map_or(0.0, |f| f.timestamp);
        tracing::info!(
            room_id = %replay.room_id,
            room = %replay.room_name,
            player1 = %replay.player1_name,
            player2 = %replay.player2_name,
            winner = %replay.winning_slot,
            frames = replay.frames.len(),
            duration_secs = duration,
            "replay completed"
        );
    }
}

/// Accumulates the `gridUpdate` frames of one match.
pub struct ReplayRecorder {
    started: Instant,
    started_at: u64,
    frames: Vec<ReplayFrame>,
}

impl ReplayRecorder {
    /// Starts a new recording now.
    pub fn start() -> Self {
        let started_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        Self {
            started: Instant::now(),
            started_at,
            frames: Vec::new(),
        }
    }

    pub fn record(&mut self, update: &GridUpdate) {
        self.frames.push(ReplayFrame {
            timestamp: self.started.elapsed().as_secs_f64(),
            slot: update.slot,
            update: update.clone(),
        });
    }

    /// Ends the recording.
    pub fn finish(
        self,
        room_id: RoomId,
        room_name: String,
        names: [String; 2],
        winning_slot: Slot,
    ) -> Replay {
        let [player1_name, player2_name] = names;
        Replay {
            room_id,
            room_name,
            started_at: self.started_at,
            player1_name,
            player2_name,
            winning_slot,
            frames: self.frames,
        }
    }
}

impl fmt::Debug for ReplayRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayRecorder")
            .field("started_at", &self.started_at)
            .field("frames", &self.frames.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn update(slot: Slot) -> GridUpdate {
        GridUpdate {
            slot,
            display_name: "amy".into(),
            updated_nodes: Vec::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_are_stamped_from_start() {
        let mut rec = ReplayRecorder::start();
        rec.record(&update(Slot::One));
        tokio::time::advance(Duration::from_millis(250)).await;
        rec.record(&update(Slot::Two));

        let replay = rec.finish(RoomId(2), "duel".into(), ["amy".into(), "bo".into()], Slot::Two);
        assert_eq!(replay.frames.len(), 2);
        assert_eq!(replay.frames[0].timestamp, 0.0);
        assert_eq!(replay.frames[1].timestamp, 0.25);
        assert_eq!(replay.frames[1].slot, Slot::Two);
        assert_eq!(replay.player2_name, "bo");
        assert!(replay.started_at > 0);
    }

    #[tokio::test]
    async fn test_channel_store_forwards() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Replay>();
        let replay = ReplayRecorder::start().finish(
            RoomId(1),
            "r".into(),
            ["a".into(), "b".into()],
            Slot::One,
        );
        tx.store(replay.clone());
        assert_eq!(rx.try_recv().unwrap(), replay);
    }
}
