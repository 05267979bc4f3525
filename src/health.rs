use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

/// Liveness check for load balancers and hosting platforms.
///
/// Always answers 200 while the process is serving; it does not call the
/// collaborators.
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let config = &state.config;

    HttpResponse::Ok().json(json!({
        "status": "ok",
        "message": "Voice Assistant Server",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.get_uptime_seconds(),
        "service": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "websocket_path": "/ws"
        },
        "audio": {
            "format": config.audio.format().to_string(),
            "min_audio_bytes": config.audio.min_audio_bytes
        },
        "collaborators": {
            "transcription_model": config.collaborators.transcription_model,
            "chat_model": config.collaborators.chat_model,
            "api_key_configured": !config.collaborators.api_key.is_empty()
        }
    }))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(health_check))
        .route("/health", web::get().to(health_check));
}
