//! Service configuration from environment variables

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration; every knob has a development default.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Socket the HTTP edge binds.
    pub bind_addr: SocketAddr,
    /// Write-ahead log directory. `None` runs fully in memory.
    pub data_dir: Option<PathBuf>,
    /// Secret for bearer-token verification.
    pub jwt_secret: String,
    /// Outbox relay poll interval.
    pub outbox_poll: Duration,
    /// Settlement retries before a trade is dead-lettered.
    pub retry_budget: u32,
    /// Base delay for settlement retry backoff.
    pub retry_base: Duration,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        let bind_addr = std::env::var("BIND_ADDR")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8080)));
        let data_dir = std::env::var("DATA_DIR").ok().map(PathBuf::from);
        let jwt_secret =
            std::env::var("JWT_SECRET").unwrap_or_else(|_| "development-secret".to_string());
        let outbox_poll = std::env::var("OUTBOX_POLL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(50));
        let retry_budget = std::env::var("SETTLE_RETRY_BUDGET")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);
        let retry_base = std::env::var("SETTLE_RETRY_BASE_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(20));

        Self {
            bind_addr,
            data_dir,
            jwt_secret,
            outbox_poll,
            retry_budget,
            retry_base,
        }
    }

    /// In-memory configuration for tests.
    pub fn for_tests() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            data_dir: None,
            jwt_secret: "test-secret".to_string(),
            outbox_poll: Duration::from_millis(10),
            retry_budget: 3,
            retry_base: Duration::from_millis(1),
        }
    }
}
