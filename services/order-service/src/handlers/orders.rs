//! Order endpoints

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use types::ids::{ContractId, OrderId};
use types::numeric::{Price, Quantity};
use types::order::{Order, OrderKind, OrderStatus, Side};

use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::service::PlaceRequest;
use crate::state::AppState;
use types::CoreError;

#[derive(Debug, Deserialize)]
pub struct PlaceOrderBody {
    pub contract_id: ContractId,
    pub kind: OrderKind,
    pub side: Side,
    pub quantity: u64,
    /// Decimal string; parsed here so a bad price is a plain validation
    /// error, not a body-rejection.
    #[serde(default)]
    pub limit_price: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlaceOrderResponse {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub filled: Quantity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_price: Option<String>,
}

pub async fn place_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<PlaceOrderBody>,
) -> Result<Json<PlaceOrderResponse>, AppError> {
    let quantity = Quantity::try_new(body.quantity)
        .ok_or_else(|| CoreError::InvalidRequest("quantity must be positive".into()))?;
    let limit_price = body
        .limit_price
        .as_deref()
        .map(Price::parse)
        .transpose()
        .map_err(|e| CoreError::InvalidRequest(format!("limit_price: {e}")))?;

    let outcome = state
        .service
        .place(
            user.user_id,
            PlaceRequest {
                contract_id: body.contract_id,
                kind: body.kind,
                side: body.side,
                quantity,
                limit_price,
            },
        )
        .await?;

    let average_price = outcome.average_price().map(|p| {
        let mut rounded = p.round_dp(6);
        rounded.rescale(6);
        rounded.to_string()
    });
    Ok(Json(PlaceOrderResponse {
        order_id: outcome.order.id,
        status: outcome.order.status,
        filled: outcome.order.filled,
        average_price,
    }))
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub status: OrderStatus,
}

pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<OrderId>,
) -> Result<Json<CancelResponse>, AppError> {
    let order = state.service.cancel(user.user_id, order_id).await?;
    Ok(Json(CancelResponse {
        status: order.status,
    }))
}

pub async fn get_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<OrderId>,
) -> Result<Json<Order>, AppError> {
    let order = state.service.get_order(user.user_id, order_id)?;
    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub orders: Vec<Order>,
    pub count: usize,
}

pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, AppError> {
    let limit = query.limit.unwrap_or(100).min(500);
    let orders = state.service.list_orders(user.user_id, query.status, limit);
    let count = orders.len();
    Ok(Json(ListResponse { orders, count }))
}
