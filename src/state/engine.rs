use crate::event::{clamp_progress, AgentType, DeckEvent, EventKind, Position, ORIGIN};
use crate::state::entity::{Agent, AgentPatch, AgentRemoved, AgentStatus, AgentUpdate, MoveIndicator};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Default lifetime of a move indicator
pub const DEFAULT_INDICATOR_TTL: Duration = Duration::from_millis(3000);

/// Agent store: the single source of truth for agents and move indicators
///
/// Every agent mutation runs under that agent's map entry guard, so readers
/// see either the whole effect of an event on an agent or none of it.
/// Reads return owned clones; no guard ever escapes.
pub struct AgentStore {
    /// Lock-free concurrent map for fast reads
    pub(crate) agents: DashMap<String, Agent>,

    /// At most one indicator per agent id
    pub(crate) move_indicators: DashMap<String, MoveIndicator>,

    /// Indicators older than this are swept
    indicator_ttl_ms: i64,

    /// Broadcast channel for agent changes
    update_tx: broadcast::Sender<AgentUpdate>,

    /// Broadcast channel for agent removals
    removal_tx: broadcast::Sender<AgentRemoved>,

    /// Events reduced since startup
    events_applied: AtomicU64,
}

impl AgentStore {
    /// Create an empty store with the given indicator lifetime
    pub fn new(indicator_ttl: Duration) -> Self {
        let (update_tx, _) = broadcast::channel(1000);
        let (removal_tx, _) = broadcast::channel(100);

        Self {
            agents: DashMap::new(),
            move_indicators: DashMap::new(),
            indicator_ttl_ms: i64::try_from(indicator_ttl.as_millis()).unwrap_or(i64::MAX),
            update_tx,
            removal_tx,
            events_applied: AtomicU64::new(0),
        }
    }

    /// Apply one event to the store (the reducer).
    ///
    /// Total over all events: an update for an unknown agent creates it
    /// first, so arrival order never causes a rejection. Ordering is
    /// last-write-wins by arrival; `timestamp` is not consulted.
    pub fn apply_event(&self, event: &DeckEvent) {
        let now = Utc::now();
        self.events_applied.fetch_add(1, Ordering::Relaxed);

        debug!(
            kind = ?event.kind,
            agent_id = %event.agent_id,
            "Applying event"
        );

        match event.kind {
            EventKind::Spawn => self.spawn(event, now),
            EventKind::Move => {
                let Some(target) = event.target_pos else {
                    debug!(agent_id = %event.agent_id, "Move without target_pos, ignoring");
                    return;
                };
                self.mutate(&event.agent_id, now, |agent| {
                    agent.target_position = Some(target);
                    agent.status = AgentStatus::Moving;
                    overwrite_message(agent, event);
                    // Inserted under the agent's entry guard so a concurrent
                    // remove_agent cannot strand it. Replaces any earlier one.
                    self.move_indicators.insert(
                        event.agent_id.clone(),
                        MoveIndicator {
                            agent_id: event.agent_id.clone(),
                            position: target,
                            created_at: now,
                        },
                    );
                });
            }
            EventKind::Work => {
                self.mutate(&event.agent_id, now, |agent| {
                    agent.status = AgentStatus::Working;
                    agent.progress = Some(event.progress.map_or(0.0, clamp_progress));
                    overwrite_message(agent, event);
                });
            }
            EventKind::Progress => {
                self.mutate(&event.agent_id, now, |agent| {
                    if let Some(progress) = event.progress {
                        agent.progress = Some(clamp_progress(progress));
                    }
                    overwrite_message(agent, event);
                });
            }
            EventKind::Complete => {
                self.mutate(&event.agent_id, now, |agent| {
                    agent.status = AgentStatus::Idle;
                    agent.progress = Some(100.0);
                    agent.target_position = None;
                    overwrite_message(agent, event);
                });
            }
            EventKind::Error => {
                self.mutate(&event.agent_id, now, |agent| {
                    agent.status = AgentStatus::Error;
                    overwrite_message(agent, event);
                });
            }
            EventKind::Idle => {
                self.mutate(&event.agent_id, now, |agent| {
                    agent.status = AgentStatus::Idle;
                    agent.target_position = None;
                    overwrite_message(agent, event);
                });
            }
        }
    }

    /// Spawn: create at target_pos (or origin). An existing agent keeps its
    /// type and is reset to idle in place.
    fn spawn(&self, event: &DeckEvent, now: DateTime<Utc>) {
        let (agent, created) = match self.agents.entry(event.agent_id.clone()) {
            Entry::Occupied(mut entry) => {
                let agent = entry.get_mut();
                if agent.agent_type != event.agent_type {
                    warn!(
                        agent_id = %event.agent_id,
                        existing = ?agent.agent_type,
                        requested = ?event.agent_type,
                        "Spawn for existing agent with different type, keeping existing"
                    );
                }
                if let Some(pos) = event.target_pos {
                    agent.position = pos;
                }
                agent.target_position = None;
                agent.status = AgentStatus::Idle;
                overwrite_message(agent, event);
                agent.last_update = now;
                (agent.clone(), false)
            }
            Entry::Vacant(entry) => {
                let position = event.target_pos.unwrap_or(ORIGIN);
                let mut agent = Agent::new(&event.agent_id, event.agent_type, position, now);
                overwrite_message(&mut agent, event);
                info!(
                    agent_id = %event.agent_id,
                    agent_type = ?event.agent_type,
                    "Agent spawned"
                );
                (entry.insert(agent).value().clone(), true)
            }
        };

        self.publish(agent, created);
    }

    /// Get-or-create the agent, apply `f` under its entry guard, stamp
    /// last_update, then broadcast the result.
    fn mutate<F>(&self, agent_id: &str, now: DateTime<Utc>, f: F) -> Agent
    where
        F: FnOnce(&mut Agent),
    {
        let (agent, created) = match self.agents.entry(agent_id.to_string()) {
            Entry::Occupied(mut entry) => {
                let agent = entry.get_mut();
                f(agent);
                agent.last_update = now;
                (agent.clone(), false)
            }
            Entry::Vacant(entry) => {
                info!(agent_id = %agent_id, "Agent not found, creating");
                let mut agent = Agent::new(agent_id, AgentType::Scout, ORIGIN, now);
                f(&mut agent);
                (entry.insert(agent).value().clone(), true)
            }
        };

        self.publish(agent.clone(), created);
        agent
    }

    fn publish(&self, agent: Agent, created: bool) {
        // No subscribers is fine
        let _ = self.update_tx.send(AgentUpdate { agent, created });
    }

    /// Merge renderer-supplied fields into an agent (creating it if unknown).
    ///
    /// Settling an agent to idle without naming a target also clears
    /// `targetPosition`, so it holds where it is.
    pub fn update_agent(&self, agent_id: &str, patch: AgentPatch) -> Agent {
        let clears_target =
            patch.status == Some(AgentStatus::Idle) && patch.target_position.is_none();

        self.mutate(agent_id, Utc::now(), move |agent| {
            patch.apply_to(agent);
            if clears_target {
                agent.target_position = None;
            }
        })
    }

    /// Renderer arrival feedback: settle at `position` and drop the target.
    /// Only `moving` flips to `idle`; a working or errored agent keeps its status.
    pub fn report_arrival(&self, agent_id: &str, position: Position) -> Agent {
        self.mutate(agent_id, Utc::now(), |agent| {
            agent.position = position;
            agent.target_position = None;
            if agent.status == AgentStatus::Moving {
                agent.status = AgentStatus::Idle;
            }
        })
    }

    /// Remove an agent and its move indicator
    pub fn remove_agent(&self, agent_id: &str) -> Option<Agent> {
        let removed = self.agents.remove(agent_id).map(|(_, agent)| agent);
        self.move_indicators.remove(agent_id);

        if removed.is_some() {
            let _ = self.removal_tx.send(AgentRemoved {
                agent_id: agent_id.to_string(),
                timestamp: Utc::now(),
            });
            info!(agent_id = %agent_id, "Agent removed");
        }

        removed
    }

    /// Dismiss an agent's move indicator before it expires
    pub fn clear_move_indicator(&self, agent_id: &str) -> Option<MoveIndicator> {
        self.move_indicators
            .remove(agent_id)
            .map(|(_, indicator)| indicator)
    }

    /// Get agent by ID
    pub fn get_agent(&self, agent_id: &str) -> Option<Agent> {
        self.agents.get(agent_id).map(|a| a.clone())
    }

    /// Get all agents, ordered by id
    pub fn list_agents(&self) -> Vec<Agent> {
        let mut agents: Vec<Agent> = self.agents.iter().map(|a| a.value().clone()).collect();
        agents.sort_by(|a, b| a.id.cmp(&b.id));
        agents
    }

    /// Get all active move indicators, ordered by agent id
    pub fn list_move_indicators(&self) -> Vec<MoveIndicator> {
        let mut indicators: Vec<MoveIndicator> = self
            .move_indicators
            .iter()
            .map(|i| i.value().clone())
            .collect();
        indicators.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        indicators
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn indicator_count(&self) -> usize {
        self.move_indicators.len()
    }

    pub fn events_applied(&self) -> u64 {
        self.events_applied.load(Ordering::Relaxed)
    }

    /// Remove indicators older than the TTL as of now
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now())
    }

    /// Remove indicators whose age at `now` is strictly greater than the TTL.
    /// Returns how many were removed.
    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let ttl_ms = self.indicator_ttl_ms;
        let mut removed = 0;

        self.move_indicators.retain(|_, indicator| {
            let expired = (now - indicator.created_at).num_milliseconds() > ttl_ms;
            if expired {
                removed += 1;
            }
            !expired
        });

        if removed > 0 {
            debug!(removed = removed, "Expired move indicators swept");
        }

        removed
    }

    /// Subscribe to agent changes
    pub fn subscribe(&self) -> broadcast::Receiver<AgentUpdate> {
        self.update_tx.subscribe()
    }

    /// Subscribe to agent removals
    pub fn subscribe_removals(&self) -> broadcast::Receiver<AgentRemoved> {
        self.removal_tx.subscribe()
    }

    /// Drain events from the transport channel in arrival order.
    ///
    /// Returns when every sender has been dropped.
    pub async fn run_reducer(self: Arc<Self>, mut events: mpsc::Receiver<DeckEvent>) {
        info!("Starting agent store reducer");

        while let Some(event) = events.recv().await {
            self.apply_event(&event);
        }

        warn!("Agent store reducer channel closed");
    }
}

impl Default for AgentStore {
    fn default() -> Self {
        Self::new(DEFAULT_INDICATOR_TTL)
    }
}

fn overwrite_message(agent: &mut Agent, event: &DeckEvent) {
    if let Some(message) = &event.message {
        agent.message = Some(message.clone());
    }
}
