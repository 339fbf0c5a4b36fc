//! Route handlers. Each one resolves the entity key, calls the undo
//! service and wraps the result in a [`DataResponse`].

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use crate::{
    changelog::ChangeLogEntry,
    core::store::UndoMeta,
    runtime::handle::{RestoreOutcome, UpdateOutcome},
    snapshot::Snapshot,
    types::{ChangeLogId, EntityKey, ModelId, ModelType},
};

use super::error::{AppError, AppResult};
use super::extract::{ApiPath, CurrentOperator};
use super::{AppState, DataResponse};

/// Body of `GET /undo/{model_type}/{id}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoMetaBody {
    /// `null` when nothing can be undone.
    pub undo_meta: Option<UndoMeta>,
}

/// Body of `POST /undo/{model_type}/{id}`.
#[derive(Debug, Serialize)]
pub struct RestoreBody {
    /// Whether a stored state was written back.
    pub restored: bool,
    /// Number of fields the undone save had changed.
    pub changes: usize,
}

fn parse_model_type(raw: &str) -> AppResult<ModelType> {
    raw.parse()
        .map_err(|e: crate::types::UnknownModelType| AppError::BadRequest(e.to_string()))
}

fn entity_key(model_type: &str, id: ModelId) -> AppResult<EntityKey> {
    Ok(EntityKey::new(parse_model_type(model_type)?, id))
}

/// GET /undo/{model_type}/{id}
pub async fn undo_meta(
    State(state): State<AppState>,
    CurrentOperator(operator): CurrentOperator,
    ApiPath((model_type, id)): ApiPath<(String, ModelId)>,
) -> AppResult<Json<DataResponse<UndoMetaBody>>> {
    let key = entity_key(&model_type, id)?;
    let undo_meta = state.undo.undo_meta(&operator.session, key).await?;
    Ok(Json(DataResponse {
        data: UndoMetaBody { undo_meta },
    }))
}

/// POST /undo/{model_type}/{id}
pub async fn restore(
    State(state): State<AppState>,
    CurrentOperator(operator): CurrentOperator,
    ApiPath((model_type, id)): ApiPath<(String, ModelId)>,
) -> AppResult<Json<DataResponse<RestoreBody>>> {
    let key = entity_key(&model_type, id)?;
    let body = match state.undo.restore(&operator, key).await? {
        RestoreOutcome::Restored { changes } => RestoreBody {
            restored: true,
            changes,
        },
        RestoreOutcome::NothingToRestore => RestoreBody {
            restored: false,
            changes: 0,
        },
    };
    Ok(Json(DataResponse { data: body }))
}

/// DELETE /undo/{model_type}/{id}
pub async fn dismiss(
    State(state): State<AppState>,
    CurrentOperator(operator): CurrentOperator,
    ApiPath((model_type, id)): ApiPath<(String, ModelId)>,
) -> AppResult<StatusCode> {
    let key = entity_key(&model_type, id)?;
    state.undo.dismiss(&operator, key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /entities/{model_type}/{id}
pub async fn update_entity(
    State(state): State<AppState>,
    CurrentOperator(operator): CurrentOperator,
    ApiPath((model_type, id)): ApiPath<(String, ModelId)>,
    Json(data): Json<Snapshot>,
) -> AppResult<Json<DataResponse<UpdateOutcome>>> {
    let key = entity_key(&model_type, id)?;
    let outcome = state.undo.apply_update(&operator, key, data).await?;
    Ok(Json(DataResponse { data: outcome }))
}

/// GET /change-log/{model_type}
pub async fn list_change_log(
    State(state): State<AppState>,
    CurrentOperator(_operator): CurrentOperator,
    ApiPath(model_type): ApiPath<String>,
) -> AppResult<Json<DataResponse<Vec<ChangeLogEntry>>>> {
    let model_type = parse_model_type(&model_type)?;
    let entries = state.undo.list_for_model(model_type).await?;
    Ok(Json(DataResponse { data: entries }))
}

/// POST /change-log/entries/{entry_id}/revert
pub async fn revert_entry(
    State(state): State<AppState>,
    CurrentOperator(operator): CurrentOperator,
    ApiPath(entry_id): ApiPath<ChangeLogId>,
) -> AppResult<Json<DataResponse<ChangeLogEntry>>> {
    let entry = state.undo.revert_entry(&operator, entry_id).await?;
    tracing::info!(entry_id, user_id = operator.user_id, "change log entry reverted via api");
    Ok(Json(DataResponse { data: entry }))
}
