//! WebSocket trade push
//!
//! Streams the authenticated user's own fills: every published trade where
//! they sit on either side, in publication order. Lagging consumers skip
//! missed events rather than stalling the relay.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use tokio::sync::broadcast;
use tracing::debug;
use types::ids::UserId;
use types::trade::TradeEvent;

use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::state::AppState;

pub async fn ws_trades(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Response, AppError> {
    let rx = state.relay.subscribe();
    Ok(ws.on_upgrade(move |socket| stream_trades(socket, rx, user.user_id)))
}

fn involves(event: &TradeEvent, user_id: UserId) -> bool {
    event.maker_user_id == user_id || event.taker_user_id == user_id
}

async fn stream_trades(
    mut socket: WebSocket,
    mut rx: broadcast::Receiver<TradeEvent>,
    user_id: UserId,
) {
    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(event) => {
                    if !involves(&event, user_id) {
                        continue;
                    }
                    let Ok(json) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if socket.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(%user_id, skipped, "trade stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                // Inbound frames are ignored; the stream is push-only.
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            },
        }
    }
    debug!(%user_id, "trade stream closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::{ContractId, OrderId, TradeId};
    use types::numeric::{Price, Quantity};

    fn event(maker: UserId, taker: UserId) -> TradeEvent {
        TradeEvent {
            trade_id: TradeId::new(),
            contract_id: ContractId::new(),
            maker_order_id: OrderId::new(),
            taker_order_id: OrderId::new(),
            maker_user_id: maker,
            taker_user_id: taker,
            quantity: Quantity::new(1),
            price: Price::new(500_000),
            executed_at: 1,
            sequence: 1,
        }
    }

    #[test]
    fn stream_filters_by_participation() {
        let me = UserId::new();
        let other = UserId::new();
        assert!(involves(&event(me, other), me));
        assert!(involves(&event(other, me), me));
        assert!(!involves(&event(other, other), me));
    }
}
