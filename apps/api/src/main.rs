mod ai_client;
mod config;
mod db;
mod errors;
mod intake;
mod routes;
mod session;
mod state;
#[cfg(test)]
mod testing;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::ai_client::AiServiceClient;
use crate::config::Config;
use crate::db::create_pool;
use crate::intake::S3AudioStore;
use crate::routes::build_router;
use crate::session::clock::SystemClock;
use crate::session::orchestrator::SessionOrchestrator;
use crate::session::pg_store::PgSessionStore;
use crate::session::store::{InMemorySessionStore, SessionStore};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Interview API v{}", env!("CARGO_PKG_VERSION"));

    // Session store: PostgreSQL when configured, process memory otherwise
    let store: Arc<dyn SessionStore> = match &config.database_url {
        Some(url) => Arc::new(PgSessionStore::new(create_pool(url).await?)),
        None => {
            warn!("DATABASE_URL is not set; sessions are kept in memory and lost on restart");
            Arc::new(InMemorySessionStore::new())
        }
    };

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    let audio_store = Arc::new(S3AudioStore::new(s3, config.s3_bucket.clone()));
    info!("S3 audio store initialized (bucket: {})", config.s3_bucket);

    // One client serves both transcription and the interview conversation
    let ai = Arc::new(AiServiceClient::new(
        &config.ai_service_url,
        Duration::from_secs(config.ai_service_timeout_secs),
    )?);
    info!("AI service client initialized ({})", config.ai_service_url);

    let orchestrator =
        SessionOrchestrator::new(store, ai.clone(), ai, Arc::new(SystemClock))
            .with_min_duration(chrono::Duration::seconds(config.min_session_duration_secs));

    let state = AppState {
        orchestrator,
        audio_store,
        max_audio_bytes: config.max_audio_upload_bytes,
    };

    let app = build_router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "interview-api-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::from_conf(
        aws_sdk_s3::config::Builder::from(&s3_config)
            .force_path_style(true)
            .build(),
    )
}
