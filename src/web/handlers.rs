use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::objectpath::ObjectPath;
use crate::soap;
use crate::templates;

use super::{AppState, Subscription};

fn xml_response(status: StatusCode, body: String) -> Response {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/xml; charset=\"utf-8\"")
        .header(header::CONTENT_LENGTH, body.len().to_string())
        .body(Body::from(body))
        .expect("static header values are always valid")
}

pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

pub async fn not_found() -> AppError {
    AppError::NotFound
}

pub async fn device_description(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let udn = format!("uuid:{}", state.config.device_uuid);
    let body = state
        .templates
        .render(templates::DEVICE_DESCRIPTION, &[("friendlyName", &state.config.friendly_name), ("UDN", &udn)])?;
    Ok(xml_response(StatusCode::OK, body))
}

pub async fn connection_manager_scpd(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    Ok(xml_response(StatusCode::OK, state.templates.raw(templates::CONNECTION_MANAGER_SCPD)?))
}

pub async fn content_directory_scpd(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    Ok(xml_response(StatusCode::OK, state.templates.raw(templates::CONTENT_DIRECTORY_SCPD)?))
}

pub async fn media_receiver_registrar_scpd(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    Ok(xml_response(StatusCode::OK, state.templates.raw(templates::MEDIA_RECEIVER_REGISTRAR_SCPD)?))
}

pub async fn content_directory_soap(State(state): State<Arc<AppState>>, headers: HeaderMap, body: axum::body::Bytes) -> Response {
    let soapaction = headers.get("SOAPACTION").and_then(|v| v.to_str().ok());
    let (status, body) = soap::handle_request(&state.templates, &state.config, soapaction, &body).await;
    xml_response(status, body)
}

/// The SUBSCRIBE/UNSUBSCRIBE eventing stub (§4.3, §9): always accepts, never
/// guarantees delivery beyond one best-effort NOTIFY fired right away.
pub async fn content_directory_event(State(state): State<Arc<AppState>>, method: Method, headers: HeaderMap) -> Response {
    match method.as_str() {
        "SUBSCRIBE" => {
            let sid = headers
                .get("SID")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .unwrap_or_else(|| format!("uuid:{}", Uuid::new_v4()));
            let timeout_secs = 1800;

            if let Some(callback) = headers.get("CALLBACK").and_then(|v| v.to_str().ok()) {
                let callback = callback.trim_matches(|c| c == '<' || c == '>').to_string();
                state
                    .subscriptions
                    .lock()
                    .unwrap()
                    .insert(sid.clone(), Subscription { callback: callback.clone(), timeout_secs });
                tokio::spawn(async move {
                    let client = reqwest::Client::new();
                    let method = reqwest::Method::from_bytes(b"NOTIFY").expect("NOTIFY is a valid method token");
                    if let Err(e) = client
                        .request(method, &callback)
                        .header("CONTENT-TYPE", "text/xml")
                        .header("NT", "upnp:event")
                        .header("NTS", "upnp:propchange")
                        .body(r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0"/>"#)
                        .send()
                        .await
                    {
                        debug!("best-effort event NOTIFY to {callback} failed: {e}");
                    }
                });
            }

            Response::builder()
                .status(StatusCode::OK)
                .header("SID", sid)
                .header("TIMEOUT", format!("Second-{timeout_secs}"))
                .body(Body::empty())
                .expect("static header values are always valid")
        }
        "UNSUBSCRIBE" => {
            if let Some(sid) = headers.get("SID").and_then(|v| v.to_str().ok()) {
                state.subscriptions.lock().unwrap().remove(sid);
            }
            (StatusCode::OK, ()).into_response()
        }
        _ => AppError::MethodNotAllowed.into_response(),
    }
}

pub async fn serve_media(
    State(state): State<Arc<AppState>>,
    Path(rel): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let object_path = ObjectPath::from_uri(&format!("/{rel}"))?;
    let fs_path = object_path.as_path(&state.config.media_root)?;

    let metadata = tokio::fs::metadata(&fs_path).await.map_err(|_| AppError::NotFound)?;
    if !metadata.is_file() {
        return Err(AppError::NotFound);
    }
    let size = metadata.len();

    let range_header = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    let (start, end, status) = resolve_range(range_header, size)?;
    let length = end - start + 1;

    let mut file = tokio::fs::File::open(&fs_path).await?;
    file.seek(std::io::SeekFrom::Start(start)).await?;
    let bounded = file.take(length);

    let stream = ReaderStream::new(bounded).map(|chunk| {
        chunk.map_err(|e| {
            match e.kind() {
                std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset => {
                    debug!("media transfer interrupted by peer disconnect: {e}");
                }
                _ => warn!("media transfer io error: {e}"),
            }
            e
        })
    });

    let mime = crate::didl::mime_class(&fs_path).map(|(m, _)| m).unwrap_or("application/octet-stream");
    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, mime)
        .header(header::CONTENT_LENGTH, length.to_string())
        .header(header::ACCEPT_RANGES, "bytes");
    if status == StatusCode::PARTIAL_CONTENT {
        builder = builder.header(header::CONTENT_RANGE, format!("bytes {start}-{end}/{size}"));
    }
    Ok(builder
        .body(Body::from_stream(stream))
        .expect("static header values are always valid"))
}

/// Resolve a `Range` header against a file of `size` bytes. Multipart
/// ranges and absent/malformed headers both fall back to a full-file 200;
/// only a syntactically valid, unsatisfiable single range yields 416.
fn resolve_range(range_header: Option<&str>, size: u64) -> Result<(u64, u64, StatusCode), AppError> {
    let Some(raw) = range_header else {
        return full_file(size);
    };
    let Ok(parsed) = http_range_header::parse_range_header(raw) else {
        return full_file(size);
    };
    match parsed.validate(size) {
        Ok(ranges) if ranges.len() == 1 => {
            let r = &ranges[0];
            Ok((*r.start(), *r.end(), StatusCode::PARTIAL_CONTENT))
        }
        Ok(_) => full_file(size),
        Err(_) => Err(AppError::RangeNotSatisfiable { size }),
    }
}

fn full_file(size: u64) -> Result<(u64, u64, StatusCode), AppError> {
    if size == 0 {
        return Err(AppError::RangeNotSatisfiable { size });
    }
    Ok((0, size - 1, StatusCode::OK))
}
