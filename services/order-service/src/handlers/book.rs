//! Book depth endpoint

use axum::extract::{Path, Query, State};
use axum::Json;
use matching_engine::BookSnapshot;
use serde::Deserialize;
use types::ids::ContractId;

use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::state::AppState;

const DEFAULT_DEPTH: usize = 10;
const MAX_DEPTH: usize = 100;

#[derive(Debug, Deserialize)]
pub struct DepthQuery {
    #[serde(default)]
    pub depth: Option<usize>,
}

pub async fn get_book(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(contract_id): Path<ContractId>,
    Query(query): Query<DepthQuery>,
) -> Result<Json<BookSnapshot>, AppError> {
    let depth = query.depth.unwrap_or(DEFAULT_DEPTH).clamp(1, MAX_DEPTH);
    let snapshot = state.service.book_snapshot(contract_id, depth)?;
    Ok(Json(snapshot))
}
