//! C3: the Axum HTTP engine — device description, SCPD documents, SOAP
//! ContentDirectory, media streaming, and the eventing stub.

pub mod handlers;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::routing::{any, get};
use axum::Router;

use crate::config::ServerConfig;
use crate::templates::TemplateBundle;

/// A best-effort subscription record for the SUBSCRIBE/UNSUBSCRIBE stub.
/// No event delivery is guaranteed beyond the single best-effort NOTIFY
/// fired right after a successful SUBSCRIBE.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub callback: String,
    pub timeout_secs: u64,
}

pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub templates: Arc<TemplateBundle>,
    pub subscriptions: Mutex<HashMap<String, Subscription>>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/device-description.xml", get(handlers::device_description).post(handlers::method_not_allowed))
        .route(
            "/connection-manager.xml",
            get(handlers::connection_manager_scpd).post(handlers::method_not_allowed),
        )
        .route(
            "/content-directory.xml",
            get(handlers::content_directory_scpd).post(handlers::content_directory_soap),
        )
        .route(
            "/media-receiver-registrar.xml",
            get(handlers::media_receiver_registrar_scpd).post(handlers::method_not_allowed),
        )
        .route("/event/content-directory", any(handlers::content_directory_event))
        .route("/media/{*rel}", get(handlers::serve_media).post(handlers::method_not_allowed))
        .fallback(handlers::not_found)
        .with_state(state)
}
