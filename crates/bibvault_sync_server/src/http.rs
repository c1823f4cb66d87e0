//! HTTP surface over [`SyncServer`].
//!
//! Every route collects its query string, url-encoded form or multipart
//! body into a transport-neutral [`Request`] and runs the synchronous
//! handler on the blocking pool.

use crate::error::{ServerError, ServerResult};
use crate::server::SyncServer;
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Query, Request as HttpRequest, State};
use axum::http::{header, Method as HttpMethod, StatusCode};
use axum::response::{IntoResponse, Response as HttpResponse};
use axum::routing::{get, post};
use axum::{Form, Router};
use bibvault_sync_protocol::{field, path, Method, Request, Response};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Builds the router for all sync endpoints.
pub fn router(server: Arc<SyncServer>) -> Router {
    let limit = server.config().max_upload_bytes;
    Router::new()
        .route(path::FILE, post(forward))
        .route(path::AUTH, post(forward))
        .route(path::FILELIST, get(forward).post(forward))
        .route("/fileinfo/{uuid}", get(forward))
        .route("/notes/{uuid}", get(forward))
        .route(path::DATAMAN, post(forward))
        .layer(DefaultBodyLimit::max(limit))
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}

/// Binds the configured address and serves until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound.
pub async fn serve(server: Arc<SyncServer>) -> ServerResult<()> {
    let listener = tokio::net::TcpListener::bind(server.config().bind_addr).await?;
    info!("bibvault server listening on {}", listener.local_addr()?);
    axum::serve(listener, router(server))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

async fn forward(State(server): State<Arc<SyncServer>>, request: HttpRequest) -> HttpResponse {
    let request = match collect(request).await {
        Ok(request) => request,
        Err(err) => return to_http(Response::error(err.status_code(), err.to_string())),
    };
    let timeout = server.config().request_timeout;
    let task = tokio::task::spawn_blocking(move || server.handle(&request));
    let response = match tokio::time::timeout(timeout, task).await {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => Response::error(500, format!("handler failed: {err}")),
        Err(_) => Response::error(503, "request timed out"),
    };
    to_http(response)
}

async fn collect(request: HttpRequest) -> ServerResult<Request> {
    let path = request.uri().path().to_string();
    let mut out = if request.method() == HttpMethod::GET {
        Request::get(path)
    } else {
        Request::post(path)
    };

    let Query(query) = Query::<HashMap<String, String>>::try_from_uri(request.uri())
        .map_err(|e| ServerError::InvalidRequest(e.body_text()))?;
    out.fields.extend(query);

    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    if is_multipart {
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| ServerError::InvalidRequest(e.body_text()))?;
        while let Some(part) = multipart
            .next_field()
            .await
            .map_err(|e| ServerError::InvalidRequest(e.body_text()))?
        {
            let name = part.name().unwrap_or_default().to_string();
            if name == field::FILE {
                let bytes = part
                    .bytes()
                    .await
                    .map_err(|e| ServerError::InvalidRequest(e.body_text()))?;
                out.file = Some(bytes.to_vec());
            } else {
                let text = part
                    .text()
                    .await
                    .map_err(|e| ServerError::InvalidRequest(e.body_text()))?;
                out.fields.insert(name, text);
            }
        }
    } else if out.method == Method::Post {
        let Form(form) = Form::<HashMap<String, String>>::from_request(request, &())
            .await
            .map_err(|e| ServerError::InvalidRequest(e.body_text()))?;
        out.fields.extend(form);
    }
    Ok(out)
}

fn to_http(response: Response) -> HttpResponse {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(header::CONTENT_TYPE, response.content_type)], response.body).into_response()
}
