// Demo producer: spawns one agent and wanders it around the grid

use crate::connection::ConnectionManager;
use crate::event::{AgentType, DeckEvent, EventKind, Position};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

/// Half-width of the square the demo agent wanders in
const GRID_HALF_EXTENT: f64 = 10.0;

/// Scripted event producer for exercising a deck end to end
pub struct DemoProducer {
    agent_id: String,
    spawned: bool,
    moves_sent: u64,
}

impl DemoProducer {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            spawned: false,
            moves_sent: 0,
        }
    }

    /// Producer with a random `demo-agent-NNNN` id
    pub fn with_random_id<R: Rng>(rng: &mut R) -> Self {
        Self::new(format!("demo-agent-{}", rng.gen_range(1000..=9999)))
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn moves_sent(&self) -> u64 {
        self.moves_sent
    }

    /// Spawn until one has gone out, then a move to a random grid point
    pub fn next_event<R: Rng>(&self, rng: &mut R) -> DeckEvent {
        if !self.spawned {
            return DeckEvent::new(EventKind::Spawn, &self.agent_id, AgentType::Scout)
                .with_target_pos([0.0, 0.0, 0.0])
                .with_message("Demo agent deployed");
        }

        let target = random_target(rng);
        DeckEvent::new(EventKind::Move, &self.agent_id, AgentType::Scout)
            .with_target_pos(target)
            .with_message(format!("Moving to ({:.1}, {:.1})", target[0], target[2]))
    }

    /// Record that `event` reached the socket
    pub fn mark_sent(&mut self, event: &DeckEvent) {
        match event.kind {
            EventKind::Spawn => self.spawned = true,
            EventKind::Move => self.moves_sent += 1,
            _ => {}
        }
    }

    /// Emit one event per tick until the task is cancelled.
    ///
    /// Ticks that land while disconnected are dropped by the manager; the
    /// spawn is retried until it goes out.
    pub async fn run(mut self, manager: Arc<ConnectionManager>, period: Duration) {
        info!(agent_id = %self.agent_id, period_ms = period.as_millis() as u64, "Starting demo producer");

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let event = self.next_event(&mut rand::thread_rng());
            if manager.send(event.clone()) {
                self.mark_sent(&event);
                if event.kind == EventKind::Move {
                    info!(agent_id = %self.agent_id, moves = self.moves_sent, "Demo move sent");
                }
            }
        }
    }
}

fn random_target<R: Rng>(rng: &mut R) -> Position {
    [
        rng.gen_range(-GRID_HALF_EXTENT..GRID_HALF_EXTENT),
        0.0,
        rng.gen_range(-GRID_HALF_EXTENT..GRID_HALF_EXTENT),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_spawn_repeats_until_sent() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut producer = DemoProducer::new("demo-agent-1234");

        assert_eq!(producer.next_event(&mut rng).kind, EventKind::Spawn);
        assert_eq!(producer.next_event(&mut rng).kind, EventKind::Spawn);

        let spawn = producer.next_event(&mut rng);
        producer.mark_sent(&spawn);

        let next = producer.next_event(&mut rng);
        assert_eq!(next.kind, EventKind::Move);
        assert_eq!(next.agent_id, "demo-agent-1234");
    }

    #[test]
    fn test_moves_stay_on_grid() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut producer = DemoProducer::new("d");
        let spawn = producer.next_event(&mut rng);
        producer.mark_sent(&spawn);

        for _ in 0..100 {
            let event = producer.next_event(&mut rng);
            let [x, y, z] = event.target_pos.unwrap();
            assert!((-GRID_HALF_EXTENT..GRID_HALF_EXTENT).contains(&x));
            assert_eq!(y, 0.0);
            assert!((-GRID_HALF_EXTENT..GRID_HALF_EXTENT).contains(&z));
            assert!(event.validate().is_ok());
            producer.mark_sent(&event);
        }

        assert_eq!(producer.moves_sent(), 100);
    }

    #[test]
    fn test_random_id_format() {
        let mut rng = StdRng::seed_from_u64(1);
        let producer = DemoProducer::with_random_id(&mut rng);

        let suffix = producer.agent_id().strip_prefix("demo-agent-").unwrap();
        let n: u32 = suffix.parse().unwrap();
        assert!((1000..=9999).contains(&n));
    }
}
