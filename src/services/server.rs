// src/services/server.rs

//! Read-only HTTP access to project records.
//!
//! `GET /<name>` returns `<data_dir>/<name>` when `<name>` is a `.json` file.
//! Every other request gets the same plain-text 404, whatever went wrong.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::error::{AppError, Result};
use crate::models::ServerConfig;
use crate::utils::sanitize_request_path;

const NOT_FOUND_BODY: &str = "404: NOT FOUND";

#[derive(Clone)]
struct ServerState {
    data_dir: Arc<PathBuf>,
}

/// Router serving files from `data_dir`.
pub fn router(data_dir: impl Into<PathBuf>) -> Router {
    Router::new().fallback(serve_file).with_state(ServerState {
        data_dir: Arc::new(data_dir.into()),
    })
}

/// Bind `config.host:config.port` and serve until `shutdown` flips to true.
pub async fn serve(
    config: &ServerConfig,
    data_dir: PathBuf,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let listener = TcpListener::bind(config.bind_addr()).await?;
    serve_listener(listener, data_dir, shutdown).await
}

/// Serve on an already bound listener.
pub async fn serve_listener(
    listener: TcpListener,
    data_dir: PathBuf,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    log::info!("Server running at http://{}/", listener.local_addr()?);

    axum::serve(listener, router(data_dir))
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await?;

    log::info!("Server stopped");
    Ok(())
}

/// Read a servable file. `name` must already be sanitized.
pub async fn lookup(data_dir: &Path, name: &str) -> Result<Vec<u8>> {
    if name.is_empty() {
        return Err(AppError::validation("empty file name"));
    }
    if Path::new(name).extension().and_then(OsStr::to_str) != Some("json") {
        return Err(AppError::validation(format!("{name} is not a .json file")));
    }
    Ok(tokio::fs::read(data_dir.join(name)).await?)
}

async fn serve_file(State(state): State<ServerState>, method: Method, uri: Uri) -> Response {
    let name = sanitize_request_path(uri.path());
    log::debug!("Request for {:?} received", name);

    if method != Method::GET {
        return not_found();
    }

    match lookup(&state.data_dir, &name).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "application/json")], bytes).into_response(),
        Err(e) => {
            log::debug!("Not serving {:?}: {}", name, e);
            not_found()
        }
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response()
}
