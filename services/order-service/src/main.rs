use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use order_service::config::ServiceConfig;
use order_service::router::create_router;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = ServiceConfig::from_env();
    info!(bind = %config.bind_addr, data_dir = ?config.data_dir, "starting order service");

    let app = order_service::build_app(&config).await?;
    info!(
        settlements_replayed = app.recovery.settlements_replayed,
        orders_restored = app.recovery.orders_restored,
        "recovery finished"
    );

    let _outbox_relay = app.publisher.clone().spawn();

    let router = create_router(app.state);
    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router).await?;

    Ok(())
}
