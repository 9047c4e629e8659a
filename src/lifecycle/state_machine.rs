use serde::{Deserialize, Serialize};

use crate::error::RunError;
use crate::types::RunStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    Start,
    /// A round ran with at least one pending delivery.
    TickAdvanced,
    /// A round found nothing left to deliver.
    TickExhausted,
    Stop,
}

impl LifecycleEvent {
    pub fn operation(&self) -> &'static str {
        match self {
            LifecycleEvent::Start => "start",
            LifecycleEvent::TickAdvanced | LifecycleEvent::TickExhausted => "tick",
            LifecycleEvent::Stop => "stop",
        }
    }
}

pub struct RunStateMachine;

impl RunStateMachine {
    pub fn next(status: RunStatus, event: LifecycleEvent) -> Result<RunStatus, RunError> {
        let next = match (status, event) {
            (RunStatus::Configured, LifecycleEvent::Start) => RunStatus::Running,
            (RunStatus::Running, LifecycleEvent::TickAdvanced) => RunStatus::Running,
            (RunStatus::Running, LifecycleEvent::TickExhausted) => RunStatus::Complete,
            (RunStatus::Running, LifecycleEvent::Stop) => RunStatus::Stopped,
            _ => {
                return Err(RunError::InvalidTransition {
                    from: status,
                    operation: event.operation(),
                });
            }
        };
        Ok(next)
    }

    /// Checks that `event` is legal from `status` without producing a new state.
    pub fn ensure(status: RunStatus, event: LifecycleEvent) -> Result<(), RunError> {
        Self::next(status, event).map(|_| ())
    }
}
