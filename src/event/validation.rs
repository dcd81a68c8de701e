use super::{DeckEvent, Position};
use chrono::Utc;
use std::fmt;

/// Validation errors for DeckEvent
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    MissingAgentId,
    NonFiniteProgress,
    NonFiniteTargetPos,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingAgentId => write!(f, "agent_id is required"),
            ValidationError::NonFiniteProgress => write!(f, "progress must be a finite number"),
            ValidationError::NonFiniteTargetPos => {
                write!(f, "target_pos must contain finite coordinates")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validates an event.
///
/// Validation rules:
/// - agent_id must be non-empty
/// - progress, if present, must be finite (range is clamped on apply, see
///   [`clamp_progress`])
/// - target_pos, if present, must have three finite axes
pub fn validate(event: &DeckEvent) -> Result<(), ValidationError> {
    if event.agent_id.is_empty() {
        return Err(ValidationError::MissingAgentId);
    }

    if let Some(progress) = event.progress {
        if !progress.is_finite() {
            return Err(ValidationError::NonFiniteProgress);
        }
    }

    if let Some(pos) = event.target_pos {
        if !is_finite_position(&pos) {
            return Err(ValidationError::NonFiniteTargetPos);
        }
    }

    Ok(())
}

/// Validates an outbound event and fills in a fallback timestamp.
pub fn validate_and_prepare(event: &mut DeckEvent) -> Result<(), ValidationError> {
    validate(event)?;

    if event.timestamp.is_none() {
        event.timestamp = Some(wall_clock_seconds());
    }

    Ok(())
}

/// Pin a finite progress value into 0..=100
pub fn clamp_progress(progress: f64) -> f64 {
    progress.clamp(0.0, 100.0)
}

/// Current Unix time in fractional seconds
fn wall_clock_seconds() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

fn is_finite_position(pos: &Position) -> bool {
    pos.iter().all(|axis| axis.is_finite())
}

#[cfg(test)]
mod validation_tests {
    use super::*;

    #[test]
    fn test_finite_positions() {
        assert!(is_finite_position(&[0.0, 0.0, 0.0]));
        assert!(is_finite_position(&[-10.5, 3.0, 1e6]));
        assert!(!is_finite_position(&[f64::NAN, 0.0, 0.0]));
        assert!(!is_finite_position(&[0.0, f64::INFINITY, 0.0]));
        assert!(!is_finite_position(&[0.0, 0.0, f64::NEG_INFINITY]));
    }

    #[test]
    fn test_clamp_progress() {
        assert_eq!(clamp_progress(101.0), 100.0);
        assert_eq!(clamp_progress(-1.0), 0.0);
        assert_eq!(clamp_progress(42.5), 42.5);
        assert_eq!(clamp_progress(100.0), 100.0);
    }

    #[test]
    fn test_wall_clock_is_seconds_not_millis() {
        let now = wall_clock_seconds();
        // 2020-01-01 in seconds; millis would be three orders larger
        assert!(now > 1_577_836_800.0);
        assert!(now < 1_577_836_800_000.0);
    }
}
