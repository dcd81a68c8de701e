use serde::{Deserialize, Serialize};

mod validation;

pub use validation::{clamp_progress, validate, validate_and_prepare, ValidationError};

/// Three-axis world coordinate `[x, y, z]`
pub type Position = [f64; 3];

/// Default spawn point for agents with no known location
pub const ORIGIN: Position = [0.0, 0.0, 0.0];

/// Lifecycle occurrence carried by an event; selects the reduction rule
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Spawn,
    Move,
    Work,
    Progress,
    Complete,
    Error,
    Idle,
}

/// Agent classification, used by renderers for styling
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    #[default]
    Scout,
    Worker,
    Coder,
    Architect,
    Debugger,
}

/// DeckEvent is one inbound or outbound message describing an agent.
///
/// Events are immutable once received. One JSON object per WebSocket frame,
/// snake_case field names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeckEvent {
    /// Reduction rule discriminator
    #[serde(rename = "type")]
    pub kind: EventKind,

    /// Stable identity of the affected agent
    pub agent_id: String,

    /// Classification; inbound frames without it are treated as scouts
    #[serde(default)]
    pub agent_type: AgentType,

    /// Free-form label for what the agent acts on (e.g. a file path)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Destination, present on spawn/move
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_pos: Option<Position>,

    /// 0-100, present on work/progress
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,

    /// Human-readable annotation, carried verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Producer wall-clock seconds. Carried, never used for ordering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl DeckEvent {
    /// Create a bare event with only the required fields set
    pub fn new(kind: EventKind, agent_id: impl Into<String>, agent_type: AgentType) -> Self {
        Self {
            kind,
            agent_id: agent_id.into(),
            agent_type,
            target: None,
            target_pos: None,
            progress: None,
            message: None,
            timestamp: None,
        }
    }

    pub fn with_target_pos(mut self, pos: Position) -> Self {
        self.target_pos = Some(pos);
        self
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Checks an inbound event before it reaches the store.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate(self)
    }

    /// Validates and prepares an event for sending.
    ///
    /// This method:
    /// - Runs the same checks as [`DeckEvent::validate`]
    /// - Fills `timestamp` with wall-clock seconds if it is missing
    pub fn validate_and_prepare(&mut self) -> Result<(), ValidationError> {
        validation::validate_and_prepare(self)
    }
}
