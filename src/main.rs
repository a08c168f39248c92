use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roomrelay::{build_router, AppState, AzureSpeechGateway, Config, EventRouter, RoomRegistry};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roomrelay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    info!("Starting room relay server");

    let registry = Arc::new(RoomRegistry::new());
    let mut event_router = EventRouter::new(registry)
        .with_sender_policy(config.sender_policy)
        .with_default_language(config.default_language.clone());

    match &config.speech {
        Some(speech) => match AzureSpeechGateway::new(speech.clone()) {
            Ok(gateway) => {
                info!(region = %speech.region, "Speech synthesis enabled");
                event_router = event_router.with_speech_gateway(Arc::new(gateway));
            }
            Err(e) => {
                error!(error = %e, "Failed to initialise speech gateway");
                std::process::exit(1);
            }
        },
        None => warn!("SPEECH_KEY not set, relaying transcriptions as text"),
    }

    info!(sender_policy = ?event_router.sender_policy(), "Transcription fan-out policy");

    let address = config.bind_address();
    let app = build_router(AppState::new(event_router, Arc::new(config)));

    let listener = match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(address = %address, error = %e, "Failed to bind listener");
            std::process::exit(1);
        }
    };
    info!("Server running on http://{}", address);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "Server error");
    }
    info!("Server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
