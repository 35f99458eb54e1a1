use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;

use lora_app_notify::config::Settings;
use lora_app_notify::mqtt::{BrokerPublisher, MqttClient};
use lora_app_notify::notification::{
    BackendFactory, BackendRegistry, MqttBackend, NotificationDispatcher, RegistryConfig,
};
use lora_app_notify::postgres::PostgresPool;
use lora_app_notify::server::{create_app, AppState};
use lora_app_notify::storage::PostgresIntegrationStore;
use lora_app_notify::telemetry::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing
    init_tracing(&settings.logging)?;
    tracing::info!("Configuration loaded");

    // PostgreSQL
    let pool = PostgresPool::new(&settings.database).await?;
    let store = Arc::new(PostgresIntegrationStore::new(pool.pool().clone()));

    // MQTT broker
    let mqtt_client = Arc::new(MqttClient::connect(&settings.mqtt)?);
    let publisher: Arc<dyn BrokerPublisher> = mqtt_client;
    let broker = Arc::new(MqttBackend::from_config(publisher.clone(), &settings.mqtt)?);

    // Dispatcher
    let factory = BackendFactory::new(&settings.integrations)?;
    let registry = BackendRegistry::new(
        store,
        factory,
        RegistryConfig::from(&settings.integrations),
    );
    let dispatcher = Arc::new(NotificationDispatcher::new(broker, registry));
    tracing::info!("Notification dispatcher initialized");

    // Create Axum app
    let state = AppState::new(dispatcher.clone(), publisher);
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler())
        .await?;

    tracing::info!("Closing notification backends...");
    if let Err(e) = dispatcher.close().await {
        tracing::warn!(error = %e, "Some backends failed to close cleanly");
    }

    pool.close().await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
