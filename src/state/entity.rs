use crate::event::{clamp_progress, AgentType, Position};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Agent lifecycle status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Idle,
    Moving,
    Working,
    Error,
}

/// Agent is the store's record of one tracked entity
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    /// Stable identity (e.g., "agent-001")
    pub id: String,

    /// Set at creation, never changed afterwards
    #[serde(rename = "type")]
    pub agent_type: AgentType,

    /// Last settled coordinate
    pub position: Position,

    /// Where the renderer should interpolate toward; None holds position
    pub target_position: Option<Position>,

    pub status: AgentStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Time of the most recent mutation
    pub last_update: DateTime<Utc>,
}

impl Agent {
    pub(crate) fn new(id: &str, agent_type: AgentType, position: Position, now: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            agent_type,
            position,
            target_position: None,
            status: AgentStatus::Idle,
            progress: None,
            message: None,
            last_update: now,
        }
    }
}

/// Partial update to an agent, written by the renderer.
///
/// Absent fields are left untouched. `targetPosition: null` clears the
/// target; omitting it keeps the current one.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPatch {
    #[serde(default)]
    pub position: Option<Position>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub target_position: Option<Option<Position>>,

    #[serde(default)]
    pub status: Option<AgentStatus>,

    #[serde(default)]
    pub progress: Option<f64>,

    #[serde(default)]
    pub message: Option<String>,
}

impl AgentPatch {
    pub(crate) fn apply_to(self, agent: &mut Agent) {
        if let Some(position) = self.position {
            agent.position = position;
        }
        if let Some(target) = self.target_position {
            agent.target_position = target;
        }
        if let Some(status) = self.status {
            agent.status = status;
        }
        if let Some(progress) = self.progress {
            agent.progress = Some(clamp_progress(progress));
        }
        if let Some(message) = self.message {
            agent.message = Some(message);
        }
    }
}

/// Lets `Option<Option<T>>` tell an explicit null apart from a missing field
fn deserialize_some<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Ephemeral marker for a recently issued move destination
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveIndicator {
    pub agent_id: String,
    pub position: Position,
    /// Used only for expiry
    pub created_at: DateTime<Utc>,
}

/// Agent change broadcast to subscribers (full post-mutation snapshot)
#[derive(Clone, Debug, Serialize)]
pub struct AgentUpdate {
    pub agent: Agent,
    /// True when this mutation created the agent
    pub created: bool,
}

/// Agent removal broadcast to subscribers
#[derive(Clone, Debug, Serialize)]
pub struct AgentRemoved {
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
}
