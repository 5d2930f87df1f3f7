//! Saga domain events: the operation log.

use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::DomainEvent;
use serde::{Deserialize, Serialize};

use crate::steps::SagaStep;

/// Events recorded while a saga runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SagaEvent {
    SagaStarted(SagaStartedData),

    /// The forward steps this saga will run, in order.
    StepsPlanned(StepsPlannedData),

    StepCompleted(StepData),

    StepFailed(StepFailedData),

    /// A compensable step failed; the listed steps undo the work done so far.
    CompensationStarted(CompensationData),

    CompensationStepCompleted(StepData),

    CompensationStepFailed(StepFailedData),

    /// A step failed after earlier steps committed. Waits for a resume.
    SagaSuspended(SagaSuspendedData),

    SagaResumed(SagaResumedData),

    SagaCompleted(SagaCompletedData),

    /// Compensation finished; the saga's goal was not reached.
    SagaFailed(SagaFailedData),
}

impl DomainEvent for SagaEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SagaEvent::SagaStarted(_) => "SagaStarted",
            SagaEvent::StepsPlanned(_) => "StepsPlanned",
            SagaEvent::StepCompleted(_) => "StepCompleted",
            SagaEvent::StepFailed(_) => "StepFailed",
            SagaEvent::CompensationStarted(_) => "CompensationStarted",
            SagaEvent::CompensationStepCompleted(_) => "CompensationStepCompleted",
            SagaEvent::CompensationStepFailed(_) => "CompensationStepFailed",
            SagaEvent::SagaSuspended(_) => "SagaSuspended",
            SagaEvent::SagaResumed(_) => "SagaResumed",
            SagaEvent::SagaCompleted(_) => "SagaCompleted",
            SagaEvent::SagaFailed(_) => "SagaFailed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaStartedData {
    pub saga_id: AggregateId,
    /// The order this saga works on.
    pub order_id: AggregateId,
    /// One of the saga type constants in [`crate::steps`].
    pub saga_type: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepsPlannedData {
    pub steps: Vec<SagaStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepData {
    pub step_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepFailedData {
    pub step_name: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompensationData {
    /// The step whose failure triggered compensation.
    pub from_step: String,
    pub steps: Vec<SagaStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaSuspendedData {
    pub step_name: String,
    pub reason: String,
    pub suspended_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaResumedData {
    pub resumed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaCompletedData {
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaFailedData {
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

// Convenience constructors
impl SagaEvent {
    pub fn saga_started(
        saga_id: AggregateId,
        order_id: AggregateId,
        saga_type: impl Into<String>,
    ) -> Self {
        SagaEvent::SagaStarted(SagaStartedData {
            saga_id,
            order_id,
            saga_type: saga_type.into(),
            started_at: Utc::now(),
        })
    }

    pub fn steps_planned(steps: Vec<SagaStep>) -> Self {
        SagaEvent::StepsPlanned(StepsPlannedData { steps })
    }

    pub fn step_completed(step_name: impl Into<String>) -> Self {
        SagaEvent::StepCompleted(StepData {
            step_name: step_name.into(),
        })
    }

    pub fn step_failed(step_name: impl Into<String>, error: impl Into<String>) -> Self {
        SagaEvent::StepFailed(StepFailedData {
            step_name: step_name.into(),
            error: error.into(),
        })
    }

    pub fn compensation_started(from_step: impl Into<String>, steps: Vec<SagaStep>) -> Self {
        SagaEvent::CompensationStarted(CompensationData {
            from_step: from_step.into(),
            steps,
        })
    }

    pub fn compensation_step_completed(step_name: impl Into<String>) -> Self {
        SagaEvent::CompensationStepCompleted(StepData {
            step_name: step_name.into(),
        })
    }

    pub fn compensation_step_failed(
        step_name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        SagaEvent::CompensationStepFailed(StepFailedData {
            step_name: step_name.into(),
            error: error.into(),
        })
    }

    pub fn saga_suspended(step_name: impl Into<String>, reason: impl Into<String>) -> Self {
        SagaEvent::SagaSuspended(SagaSuspendedData {
            step_name: step_name.into(),
            reason: reason.into(),
            suspended_at: Utc::now(),
        })
    }

    pub fn saga_resumed() -> Self {
        SagaEvent::SagaResumed(SagaResumedData {
            resumed_at: Utc::now(),
        })
    }

    pub fn saga_completed() -> Self {
        SagaEvent::SagaCompleted(SagaCompletedData {
            completed_at: Utc::now(),
        })
    }

    pub fn saga_failed(reason: impl Into<String>) -> Self {
        SagaEvent::SagaFailed(SagaFailedData {
            reason: reason.into(),
            failed_at: Utc::now(),
        })
    }
}
