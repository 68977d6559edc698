//! Route table

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers::{self, book, orders, wallet, ws};
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/orders", post(orders::place_order).get(orders::list_orders))
        .route("/orders/{id}", get(orders::get_order))
        .route("/orders/{id}/cancel", post(orders::cancel_order))
        .route("/contracts/{id}/book", get(book::get_book))
        .route("/wallets/me", get(wallet::get_wallet))
        .route("/wallets/me/deposits", post(wallet::deposit))
        .route("/wallets/me/transactions", get(wallet::get_transactions))
        .route("/ws", get(ws::ws_trades))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
