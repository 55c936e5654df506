//! HTTP handlers for the medication resource.
//!
//! Each handler decodes its input, makes exactly one store call under the
//! configured operation timeout and renders the outcome. Store failures are
//! logged here and surfaced as a 500 with a fixed message.

use crate::dtos::{MedicationPayload, MedicationResponse};
use crate::models::Medication;
use crate::startup::AppState;
use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, PathRejection},
        Path, State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use mongodb::bson::oid::ObjectId;
use service_core::error::AppError;
use std::future::Future;

pub async fn list_medications(
    State(state): State<AppState>,
) -> Result<Json<Vec<MedicationResponse>>, AppError> {
    let medications = bounded(&state, "list", state.store.list())
        .await
        .map_err(failed("Failed to fetch medications"))?;

    tracing::debug!(count = medications.len(), "Listed medications");

    Ok(Json(
        medications
            .into_iter()
            .map(MedicationResponse::from)
            .collect(),
    ))
}

pub async fn get_medication(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<MedicationResponse>, AppError> {
    let id = medication_id(id)?;

    let medication = bounded(&state, "get", state.store.get(id))
        .await
        .map_err(failed("Failed to fetch medication"))?
        .ok_or_else(not_found)?;

    Ok(Json(MedicationResponse::from(medication)))
}

pub async fn create_medication(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<MedicationResponse>), AppError> {
    let medication = Medication::from(decode(body)?);

    let created = bounded(&state, "create", state.store.create(medication))
        .await
        .map_err(failed("Failed to create medication"))?;

    tracing::info!(
        medication_id = ?created.id,
        name = %created.name,
        "Medication created"
    );

    Ok((StatusCode::CREATED, Json(MedicationResponse::from(created))))
}

/// Full replace: fields missing from the body are written as empty/zero.
pub async fn update_medication(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<MedicationResponse>, AppError> {
    let id = medication_id(id)?;
    let medication = Medication::from(decode(body)?);

    let updated = bounded(&state, "update", state.store.replace(id, medication))
        .await
        .map_err(failed("Failed to update medication"))?
        .ok_or_else(not_found)?;

    tracing::info!(medication_id = %id, "Medication updated");

    Ok(Json(MedicationResponse::from(updated)))
}

pub async fn delete_medication(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = medication_id(id)?;

    let deleted = bounded(&state, "delete", state.store.delete(id))
        .await
        .map_err(failed("Failed to delete medication"))?;

    if !deleted {
        return Err(not_found());
    }

    tracing::info!(medication_id = %id, "Medication deleted");

    Ok((
        StatusCode::NO_CONTENT,
        [(header::CONTENT_TYPE, "application/json")],
    ))
}

fn medication_id(raw: Result<Path<String>, PathRejection>) -> Result<ObjectId, AppError> {
    let invalid = || AppError::BadRequest(anyhow::anyhow!("Invalid medication ID"));
    let Path(raw) = raw.map_err(|e| {
        tracing::debug!(error = %e, "Rejected medication path");
        invalid()
    })?;
    ObjectId::parse_str(&raw).map_err(|_| invalid())
}

/// Decode the body as JSON whatever its `Content-Type`.
fn decode(body: Result<Bytes, BytesRejection>) -> Result<MedicationPayload, AppError> {
    let invalid = || AppError::BadRequest(anyhow::anyhow!("Invalid input"));
    let body = body.map_err(|e| {
        tracing::debug!(error = %e, "Failed to read medication payload");
        invalid()
    })?;
    MedicationPayload::from_slice(&body).map_err(|e| {
        tracing::debug!(error = %e, "Rejected medication payload");
        invalid()
    })
}

fn not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Medication not found"))
}

/// Log the underlying store error and replace it with `message`.
fn failed(message: &'static str) -> impl FnOnce(AppError) -> AppError {
    move |err| {
        tracing::error!(error = %err, "{}", message);
        AppError::InternalError(anyhow::anyhow!(message))
    }
}

/// Run one store call under the configured deadline. On expiry the call is
/// dropped and reported as an internal error.
async fn bounded<T, F>(state: &AppState, operation: &'static str, call: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    let deadline = state.config.timeouts.operation();
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                operation,
                timeout_ms = deadline.as_millis() as u64,
                "Medication store call timed out"
            );
            Err(AppError::InternalError(anyhow::anyhow!(
                "{} timed out after {:?}",
                operation,
                deadline
            )))
        }
    }
}
