//! Saga status and resume endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use event_store::EventStore;
use saga::{InventoryLedger, SagaInstance, SagaStep};
use serde::Serialize;

use super::parse_id;
use crate::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct SagaResponse {
    pub saga_id: String,
    pub order_id: Option<String>,
    pub saga_type: String,
    pub state: String,
    pub steps: Vec<String>,
    pub completed_steps: Vec<String>,
    pub compensation: Vec<String>,
    pub compensated_steps: Vec<String>,
    pub suspended_step: Option<String>,
    pub failure_reason: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

fn step_names(steps: &[SagaStep]) -> Vec<String> {
    steps.iter().map(SagaStep::name).collect()
}

impl SagaResponse {
    fn new(saga_id: String, saga: &SagaInstance) -> Self {
        Self {
            saga_id,
            order_id: saga.order_id().map(|id| id.to_string()),
            saga_type: saga.saga_type().to_string(),
            state: saga.state().to_string(),
            steps: step_names(saga.steps()),
            completed_steps: saga.completed_steps().to_vec(),
            compensation: step_names(saga.compensation()),
            compensated_steps: saga.compensated_steps().to_vec(),
            suspended_step: saga.suspended_step().map(String::from),
            failure_reason: saga.failure_reason().map(String::from),
            started_at: saga.started_at(),
            finished_at: saga.finished_at(),
        }
    }
}

/// GET /sagas/{id}: the operation log of one saga.
#[tracing::instrument(skip(state))]
pub async fn get<S, I>(
    State(state): State<Arc<AppState<S, I>>>,
    Path(id): Path<String>,
) -> Result<Json<SagaResponse>, ApiError>
where
    S: EventStore + Clone + 'static,
    I: InventoryLedger + 'static,
{
    let saga_id = parse_id("saga id", &id)?;
    let saga = state
        .coordinator
        .get_saga(saga_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Saga {id} not found")))?;

    Ok(Json(SagaResponse::new(id, &saga)))
}

/// POST /sagas/{id}/resume: retry the pending steps of a suspended saga.
#[tracing::instrument(skip(state))]
pub async fn resume<S, I>(
    State(state): State<Arc<AppState<S, I>>>,
    Path(id): Path<String>,
) -> Result<Json<SagaResponse>, ApiError>
where
    S: EventStore + Clone + 'static,
    I: InventoryLedger + 'static,
{
    let saga_id = parse_id("saga id", &id)?;
    let saga = state.coordinator.resume_saga(saga_id).await?;
    Ok(Json(SagaResponse::new(id, &saga)))
}
