use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use folio_db::queries::ReorderOutcome;
use folio_types::api::{Claims, CreateBlockRequest, ReorderBlocksRequest, RenderedBlock, UpdateBlockRequest};
use folio_types::blocks::BlockPayload;
use folio_types::models::Block;

use crate::error::{ApiError, ApiResult};
use crate::extract::{AppJson, AppPath};
use crate::profiles::ensure_profile;
use crate::render;
use crate::state::AppState;

/// Upper bound on blocks per profile.
const MAX_BLOCKS: usize = 100;

/// GET /api/blocks
pub async fn list_blocks(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<Block>>> {
    let blocks = state
        .db
        .list_blocks(&claims.sub.to_string())?
        .into_iter()
        .map(|row| row.into_model())
        .collect();
    Ok(Json(blocks))
}

/// POST /api/blocks: validate the payload and append it after the last block.
pub async fn create_block(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<CreateBlockRequest>,
) -> ApiResult<impl IntoResponse> {
    let data = if req.data.is_null() { serde_json::json!({}) } else { req.data };
    let payload = BlockPayload::parse(&req.block_type, data)?;

    let profile = ensure_profile(&state, &claims)?;
    let id = Uuid::new_v4().to_string();
    let row = state
        .db
        .insert_block(
            &id,
            &profile.id,
            payload.block_type().as_str(),
            &payload.data().to_string(),
            MAX_BLOCKS,
        )?
        .ok_or_else(|| ApiError::validation(format!("a profile holds at most {MAX_BLOCKS} blocks")))?;
    info!("Added {} block {} for {}", row.block_type, id, claims.sub);

    Ok((StatusCode::CREATED, Json(row.into_model())))
}

/// PUT /api/blocks/{id}: replace the payload. The block keeps its type.
pub async fn update_block(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdateBlockRequest>,
) -> ApiResult<Json<Block>> {
    let owner = claims.sub.to_string();
    let existing = state.db.get_block(&id.to_string(), &owner)?.ok_or(ApiError::NotFound)?;
    let payload = BlockPayload::parse(&existing.block_type, req.data)?;

    let row = state
        .db
        .update_block_data(&id.to_string(), &owner, &payload.data().to_string())?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(row.into_model()))
}

/// DELETE /api/blocks/{id}
pub async fn delete_block(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<StatusCode> {
    if !state.db.delete_block(&id.to_string(), &claims.sub.to_string())? {
        return Err(ApiError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/blocks/order: the ids must be exactly the caller's blocks.
pub async fn reorder_blocks(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<ReorderBlocksRequest>,
) -> ApiResult<Json<Vec<Block>>> {
    let owner = claims.sub.to_string();
    let ids: Vec<String> = req.block_ids.iter().map(Uuid::to_string).collect();

    match state.db.reorder_blocks(&owner, &ids)? {
        ReorderOutcome::Reordered => {}
        ReorderOutcome::NotPermutation => {
            return Err(ApiError::validation("block_ids must list each of your blocks exactly once"));
        }
    }

    let blocks = state
        .db
        .list_blocks(&owner)?
        .into_iter()
        .map(|row| row.into_model())
        .collect();
    Ok(Json(blocks))
}

/// GET /api/blocks/{id}/render: read-mode view and edit form of one block.
pub async fn render_block(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Json<RenderedBlock>> {
    let row = state
        .db
        .get_block(&id.to_string(), &claims.sub.to_string())?
        .ok_or(ApiError::NotFound)?;
    let block = row.into_model();
    let payload = BlockPayload::parse(&block.block_type, block.data)?;

    Ok(Json(RenderedBlock {
        id,
        view: render::render_view(&payload),
        form: render::render_form(&payload),
    }))
}
