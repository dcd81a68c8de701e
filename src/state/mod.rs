// Agent store: event reduction, renderer feedback, move indicators

mod engine;
mod entity;
mod sweeper;

pub use engine::{AgentStore, DEFAULT_INDICATOR_TTL};
pub use entity::{Agent, AgentPatch, AgentRemoved, AgentStatus, AgentUpdate, MoveIndicator};
pub use sweeper::run_indicator_sweeper;
