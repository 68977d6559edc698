//! Shared application state

use std::sync::Arc;

use event_bus::NotificationRelay;

use crate::auth::SharedVerifier;
use crate::service::OrderService;

/// Everything a handler needs, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<OrderService>,
    pub verifier: SharedVerifier,
    pub relay: Arc<NotificationRelay>,
}

impl AppState {
    pub fn new(
        service: Arc<OrderService>,
        verifier: SharedVerifier,
        relay: Arc<NotificationRelay>,
    ) -> Self {
        Self {
            service,
            verifier,
            relay,
        }
    }
}
