use std::sync::Arc;

use crate::intake::AudioStore;
use crate::session::orchestrator::SessionOrchestrator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: SessionOrchestrator,
    /// Where answer recordings land before transcription. S3 in production.
    pub audio_store: Arc<dyn AudioStore>,
    pub max_audio_bytes: usize,
}
