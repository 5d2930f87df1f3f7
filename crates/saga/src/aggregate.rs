//! Saga instance aggregate.

use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::Aggregate;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::error::SagaError;
use crate::events::SagaEvent;
use crate::state::SagaState;
use crate::steps::SagaStep;

/// An event-sourced saga instance.
///
/// Holds the planned steps, which of them have completed, and the
/// compensation plan if a reservation failed. Replaying its events is enough
/// to know what a resume has left to do.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SagaInstance {
    id: Option<AggregateId>,
    version: Version,
    saga_type: String,
    order_id: Option<AggregateId>,
    state: SagaState,
    steps: Vec<SagaStep>,
    completed_steps: Vec<String>,
    compensation: Vec<SagaStep>,
    compensated_steps: Vec<String>,
    /// Step that suspended the saga, cleared on resume.
    suspended_step: Option<String>,
    failure_reason: Option<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl Aggregate for SagaInstance {
    type Event = SagaEvent;
    type Error = SagaError;

    fn aggregate_type() -> &'static str {
        "OrderSaga"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            SagaEvent::SagaStarted(data) => {
                self.id = Some(data.saga_id);
                self.order_id = Some(data.order_id);
                self.saga_type = data.saga_type;
                self.state = SagaState::Running;
                self.started_at = Some(data.started_at);
            }
            SagaEvent::StepsPlanned(data) => {
                self.steps = data.steps;
            }
            SagaEvent::StepCompleted(data) => {
                self.completed_steps.push(data.step_name);
            }
            SagaEvent::StepFailed(data) | SagaEvent::CompensationStepFailed(data) => {
                self.failure_reason = Some(data.error);
            }
            SagaEvent::CompensationStarted(data) => {
                self.state = SagaState::Compensating;
                self.compensation = data.steps;
            }
            SagaEvent::CompensationStepCompleted(data) => {
                self.compensated_steps.push(data.step_name);
            }
            SagaEvent::SagaSuspended(data) => {
                self.state = SagaState::Suspended;
                self.suspended_step = Some(data.step_name);
                self.failure_reason = Some(data.reason);
            }
            SagaEvent::SagaResumed(_) => {
                self.state = if self.is_compensating() {
                    SagaState::Compensating
                } else {
                    SagaState::Running
                };
                self.suspended_step = None;
            }
            SagaEvent::SagaCompleted(data) => {
                self.state = SagaState::Completed;
                self.finished_at = Some(data.completed_at);
            }
            SagaEvent::SagaFailed(data) => {
                self.state = SagaState::Failed;
                self.failure_reason = Some(data.reason);
                self.finished_at = Some(data.failed_at);
            }
        }
    }
}

// Query methods
impl SagaInstance {
    pub fn state(&self) -> SagaState {
        self.state
    }

    pub fn order_id(&self) -> Option<AggregateId> {
        self.order_id
    }

    pub fn saga_type(&self) -> &str {
        &self.saga_type
    }

    pub fn steps(&self) -> &[SagaStep] {
        &self.steps
    }

    pub fn completed_steps(&self) -> &[String] {
        &self.completed_steps
    }

    pub fn compensation(&self) -> &[SagaStep] {
        &self.compensation
    }

    pub fn compensated_steps(&self) -> &[String] {
        &self.compensated_steps
    }

    pub fn suspended_step(&self) -> Option<&str> {
        self.suspended_step.as_deref()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// True once a compensation plan has been recorded.
    pub fn is_compensating(&self) -> bool {
        !self.compensation.is_empty()
    }

    /// Steps of the current phase that have not completed yet, in order.
    ///
    /// In the forward phase these are planned steps; once compensation has
    /// started, only compensation steps are pending.
    pub fn pending_steps(&self) -> Vec<SagaStep> {
        let (steps, done) = if self.is_compensating() {
            (&self.compensation, &self.compensated_steps)
        } else {
            (&self.steps, &self.completed_steps)
        };
        steps
            .iter()
            .filter(|step| !done.contains(&step.name()))
            .cloned()
            .collect()
    }

    /// Forward steps that completed and have a compensation, newest first.
    pub fn compensations_due(&self) -> Vec<SagaStep> {
        self.steps
            .iter()
            .rev()
            .filter(|step| self.completed_steps.contains(&step.name()))
            .filter_map(SagaStep::compensation)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::{self, STEP_PERSIST_ORDER};
    use common::UserId;
    use domain::ProductId;

    fn reserve(id: &str, quantity: u32) -> SagaStep {
        SagaStep::ReserveStock {
            product_id: ProductId::new(id),
            quantity,
        }
    }

    fn placement_saga() -> SagaInstance {
        let mut saga = SagaInstance::default();
        saga.apply_events(vec![
            SagaEvent::saga_started(AggregateId::new(), AggregateId::new(), steps::PLACE_ORDER),
            SagaEvent::steps_planned(vec![
                SagaStep::PersistOrder,
                reserve("p1", 2),
                reserve("p2", 1),
                SagaStep::ClearCart {
                    buyer_id: UserId::new(),
                    product_ids: vec![ProductId::new("p1"), ProductId::new("p2")],
                },
            ]),
            SagaEvent::step_completed(STEP_PERSIST_ORDER),
        ]);
        saga
    }

    #[test]
    fn default_saga_instance() {
        let saga = SagaInstance::default();
        assert!(saga.id().is_none());
        assert_eq!(saga.state(), SagaState::NotStarted);
        assert!(saga.pending_steps().is_empty());
    }

    #[test]
    fn pending_steps_skip_completed_ones() {
        let mut saga = placement_saga();
        assert_eq!(saga.state(), SagaState::Running);
        assert_eq!(saga.pending_steps().len(), 3);

        saga.apply(SagaEvent::step_completed("reserve_inventory:p1"));
        let pending: Vec<_> = saga.pending_steps().iter().map(SagaStep::name).collect();
        assert_eq!(pending, ["reserve_inventory:p2", "clear_cart"]);
    }

    #[test]
    fn compensations_due_are_newest_first() {
        let mut saga = placement_saga();
        saga.apply(SagaEvent::step_completed("reserve_inventory:p1"));
        saga.apply(SagaEvent::step_completed("reserve_inventory:p2"));

        let due: Vec<_> = saga.compensations_due().iter().map(SagaStep::name).collect();
        assert_eq!(due, ["restock:p2", "restock:p1"]);
    }

    #[test]
    fn compensation_replaces_pending_plan() {
        let mut saga = placement_saga();
        saga.apply(SagaEvent::step_completed("reserve_inventory:p1"));
        saga.apply(SagaEvent::step_failed(
            "reserve_inventory:p2",
            "insufficient stock",
        ));
        let plan = saga.compensations_due();
        saga.apply(SagaEvent::compensation_started("reserve_inventory:p2", plan));

        assert_eq!(saga.state(), SagaState::Compensating);
        let pending: Vec<_> = saga.pending_steps().iter().map(SagaStep::name).collect();
        assert_eq!(pending, ["restock:p1"]);

        saga.apply(SagaEvent::compensation_step_completed("restock:p1"));
        assert!(saga.pending_steps().is_empty());

        saga.apply(SagaEvent::saga_failed("insufficient stock"));
        assert_eq!(saga.state(), SagaState::Failed);
        assert!(saga.finished_at().is_some());
    }

    #[test]
    fn suspend_and_resume() {
        let mut saga = placement_saga();
        saga.apply(SagaEvent::step_completed("reserve_inventory:p1"));
        saga.apply(SagaEvent::step_completed("reserve_inventory:p2"));
        saga.apply(SagaEvent::step_failed("clear_cart", "cart down"));
        saga.apply(SagaEvent::saga_suspended("clear_cart", "cart down"));

        assert_eq!(saga.state(), SagaState::Suspended);
        assert_eq!(saga.suspended_step(), Some("clear_cart"));
        assert_eq!(saga.failure_reason(), Some("cart down"));

        saga.apply(SagaEvent::saga_resumed());
        assert_eq!(saga.state(), SagaState::Running);
        assert!(saga.suspended_step().is_none());
        assert_eq!(saga.pending_steps().len(), 1);
    }

    #[test]
    fn resume_during_compensation_stays_compensating() {
        let mut saga = placement_saga();
        saga.apply(SagaEvent::step_completed("reserve_inventory:p1"));
        saga.apply(SagaEvent::compensation_started(
            "reserve_inventory:p2",
            vec![SagaStep::Restock {
                product_id: ProductId::new("p1"),
                quantity: 2,
            }],
        ));
        saga.apply(SagaEvent::compensation_step_failed("restock:p1", "ledger down"));
        saga.apply(SagaEvent::saga_suspended("restock:p1", "ledger down"));
        saga.apply(SagaEvent::saga_resumed());

        assert_eq!(saga.state(), SagaState::Compensating);
        assert_eq!(saga.pending_steps().len(), 1);
    }

    #[test]
    fn aggregate_type() {
        assert_eq!(SagaInstance::aggregate_type(), "OrderSaga");
    }
}
