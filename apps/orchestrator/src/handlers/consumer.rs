// [apps/orchestrator/src/handlers/consumer.rs]
//! Consumer-facing handlers: job submission, allocation lookup,
//! cancellation, and the allocation/verification event stream.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::Json;
use futures_util::stream::Stream;
use nebula_domain_models::{Allocation, AllocationStatus, Event, InventoryEvent, JobRequirements};
use nebula_infra_db::repositories::AllocationRepository;
use nebula_shared_observability::RequestId;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use crate::errors::{ApiError, OrchestratorError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    pub consumer_id: Uuid,
    pub requirements: JobRequirements,
}

#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub allocation_id: Uuid,
    pub status: AllocationStatus,
}

/// `POST /api/v1/allocations`. Registers the request in `requested`
/// state; actual placement happens asynchronously on the scheduler's
/// next pass, not inline with this call.
pub async fn submit_job(
    State(state): State<AppState>,
    Json(body): Json<SubmitJobRequest>,
) -> Result<Json<SubmitJobResponse>, ApiError> {
    let request_id = RequestId::generate();
    let allocation = state
        .allocator
        .submit(body.consumer_id, body.requirements)
        .await
        .map_err(|e| ApiError::new(request_id, e))?;
    Ok(Json(SubmitJobResponse { allocation_id: allocation.id, status: allocation.status }))
}

/// `GET /api/v1/allocations/:id`.
pub async fn get_allocation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Allocation>, ApiError> {
    let request_id = RequestId::generate();
    let connection = state
        .db
        .get_connection()
        .map_err(|e| ApiError::new(request_id.clone(), e.into()))?;
    let allocation = AllocationRepository::new(&connection)
        .get_by_id(id)
        .await
        .map_err(|e| ApiError::new(request_id, e.into()))?;
    Ok(Json(allocation))
}

#[derive(Debug, Serialize)]
pub struct CancelAllocationResponse {
    pub allocation_id: Uuid,
    pub status: AllocationStatus,
}

/// `POST /api/v1/allocations/:id/cancel`. Releases any gpu binding and
/// moves the allocation to `cancelled`; rejected with `Precondition`
/// when the allocation is already in a terminal state (the transition
/// table has no edge out of a terminal status).
pub async fn cancel_allocation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CancelAllocationResponse>, ApiError> {
    let request_id = RequestId::generate();
    let connection = state
        .db
        .get_connection()
        .map_err(|e| ApiError::new(request_id.clone(), e.into()))?;
    let allocation = AllocationRepository::new(&connection)
        .get_by_id(id)
        .await
        .map_err(|e| ApiError::new(request_id.clone(), e.into()))?;
    drop(connection);

    if allocation.status.is_terminal() {
        return Err(ApiError::new(
            request_id,
            OrchestratorError::Precondition(format!("allocation {id} is already {:?}", allocation.status)),
        ));
    }

    let allocation = state
        .allocator
        .release(allocation, AllocationStatus::Cancelled)
        .await
        .map_err(|e| ApiError::new(request_id, e))?;

    Ok(Json(CancelAllocationResponse { allocation_id: allocation.id, status: allocation.status }))
}

#[derive(Debug, Deserialize)]
pub struct SubscribeQuery {
    pub allocation_id: Option<Uuid>,
}

/// `GET /api/v1/allocations/events`. Server-streamed allocation and
/// verification events off the shared Event Bus, optionally filtered
/// to one allocation. Lag on this subscriber's buffer surfaces as a
/// `comment` frame, never a dropped connection: delivery is at-least-once
/// with the oldest buffered event dropped first under lag.
pub async fn subscribe_events(
    State(state): State<AppState>,
    Query(query): Query<SubscribeQuery>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let request_id = RequestId::generate();
    let allocation_id = query.allocation_id;
    let receiver = state.event_bus.subscribe().ok_or_else(|| {
        ApiError::new(
            request_id,
            OrchestratorError::Unavailable("event bus subscriber cap reached, try again later".to_string()),
        )
        .with_retry_after(5)
    })?;
    let stream = BroadcastStream::new(receiver).filter_map(move |item| match item {
        Ok(event) if matches_filter(&event, allocation_id) => Some(Ok(to_sse_event(event))),
        Ok(_) => None,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            Some(Ok(SseEvent::default().comment(format!("lagged, {skipped} events dropped"))))
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

fn to_sse_event(event: Event) -> SseEvent {
    SseEvent::default()
        .json_data(&event)
        .unwrap_or_else(|_| SseEvent::default().data("event serialization failed"))
}

fn matches_filter(event: &Event, allocation_id: Option<Uuid>) -> bool {
    let Some(allocation_id) = allocation_id else {
        return true;
    };
    match &event.payload {
        InventoryEvent::AllocationAdmitted { allocation_id: id, .. } => *id == allocation_id,
        InventoryEvent::AllocationPreempted { allocation_id: id, .. } => *id == allocation_id,
        InventoryEvent::AllocationCompleted { allocation_id: id, .. } => *id == allocation_id,
        _ => false,
    }
}
