//! Wallet endpoints

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use types::numeric::Credits;
use types::wallet::{EntryKind, LedgerEntry};

use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub total: Credits,
    pub reserved: Credits,
    pub available: Credits,
}

pub async fn get_wallet(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<BalanceResponse>, AppError> {
    let view = state.service.balance(user.user_id)?;
    Ok(Json(BalanceResponse {
        total: view.total,
        reserved: view.reserved,
        available: view.available,
    }))
}

#[derive(Debug, Deserialize)]
pub struct DepositBody {
    pub amount: Credits,
}

#[derive(Debug, Serialize)]
pub struct DepositResponse {
    pub total: Credits,
}

/// Credit top-up. The conversion from external value into credits is the
/// exchange collaborator's concern; this endpoint records its outcome.
pub async fn deposit(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<DepositBody>,
) -> Result<Json<DepositResponse>, AppError> {
    let total = state.service.deposit(user.user_id, body.amount)?;
    Ok(Json(DepositResponse { total }))
}

#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    #[serde(default)]
    pub kind: Option<EntryKind>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<LedgerEntry>,
    pub count: usize,
}

pub async fn get_transactions(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<TransactionsResponse>, AppError> {
    let limit = query.limit.unwrap_or(50).min(100);
    let offset = query.offset.unwrap_or(0);
    let transactions = state
        .service
        .transactions(user.user_id, query.kind, limit, offset)?;
    let count = transactions.len();
    Ok(Json(TransactionsResponse {
        transactions,
        count,
    }))
}
