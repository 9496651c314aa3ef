// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! HTTP route handlers for the VPN manager.
//!
//! The first path segment selects the action, later segments are its
//! arguments:
//!
//! | Method | Path | Handler | Description |
//! |--------|------|---------|-------------|
//! | GET | `/new` | [`new_client`] | Issue a client for the caller |
//! | GET | `/get/<id>.ovpn` | [`get_client`] | Download a client file (hidden) |
//! | GET | `/delete/<id>` | [`delete_client`] | Revoke one of the caller's clients |
//! | GET | `/ip`, `/myip` | [`my_ip`] | Echo the caller's address |
//! | GET | `/`, `/about` | [`about`] | Project information |
//!
//! Anything else lands on [`not_found`], which lists the [`ACTIONS`] that are
//! not hidden.

use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, get};
use axum::Json;
use serde_json::json;

use crate::application::{AppState, Caller};
use crate::constants::{CLIENT_FILE_EXTENSION, LOG_PREFIX, PROJECT_URL};
use crate::errors::AppError;
use crate::models::{
    ClientId, DeleteClientResponse, IpResponse, NewClientResponse, NotFoundResponse,
};

/// A named entry of the dispatch table.
pub struct Action {
    pub name: &'static str,
    /// Hidden actions are routed but not advertised by [`not_found`].
    pub hidden: bool,
    pub route: fn() -> MethodRouter<AppState>,
}

pub const ACTIONS: &[Action] = &[
    Action {
        name: "new",
        hidden: false,
        route: || get(new_client),
    },
    Action {
        name: "get",
        hidden: true,
        route: || get(get_client),
    },
    Action {
        name: "delete",
        hidden: false,
        route: || get(delete_client),
    },
    Action {
        name: "ip",
        hidden: false,
        route: || get(my_ip),
    },
    Action {
        name: "myip",
        hidden: false,
        route: || get(my_ip),
    },
    Action {
        name: "about",
        hidden: false,
        route: || get(about),
    },
];

/// Path segment `index` (0 is the action name), ignoring empty segments.
fn segment(uri: &Uri, index: usize) -> Option<&str> {
    uri.path().split('/').filter(|s| !s.is_empty()).nth(index)
}

/// Issues a new client for the caller.
///
/// The issuing runs in its own task so a dropped connection cannot abort it
/// halfway between the driver program and the registry.
///
/// # Errors
///
/// - [`AppError::CapacityExceeded`] - The server is full
/// - [`AppError::OwnerQuotaExceeded`] - The caller owns too many clients
/// - [`AppError::IssuanceFailed`] - The driver program failed
#[tracing::instrument(skip(state))]
pub async fn new_client(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<NewClientResponse>, AppError> {
    let manager = Arc::clone(&state.manager);
    let id = tokio::spawn(async move { manager.new_client(&caller.0).await }).await??;

    Ok(Json(NewClientResponse::new(id)))
}

/// Streams a cached client file as `application/octet-stream`.
///
/// # Errors
///
/// - [`AppError::MalformedRequest`] - No `<id>.ovpn` segment
/// - [`AppError::NotFound`] - The client isn't registered
/// - [`AppError::MaterialUnavailable`] - The client is registered but its file was pruned
#[tracing::instrument(skip(state))]
pub async fn get_client(State(state): State<AppState>, uri: Uri) -> Result<Response, AppError> {
    let id = segment(&uri, 1)
        .filter(|name| name.len() > CLIENT_FILE_EXTENSION.len())
        .filter(|name| name.ends_with(CLIENT_FILE_EXTENSION))
        .map(ClientId::from_file_name)
        .ok_or_else(|| {
            AppError::MalformedRequest(
                "Please don't send GET /get requests by yourself.".to_string(),
            )
        })?;

    let material = state.manager.material(&id).await?;

    tracing::debug!(
        "{} serving {} bytes for client {}",
        LOG_PREFIX,
        material.len(),
        id
    );

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", id.file_name()),
            ),
        ],
        material.as_bytes().to_vec(),
    )
        .into_response())
}

/// Revokes one of the caller's clients. The id may carry the `.ovpn` extension.
///
/// # Errors
///
/// - [`AppError::MalformedRequest`] - No id segment
/// - [`AppError::NotFound`] - The client isn't registered
/// - [`AppError::NotOwned`] - The client belongs to someone else
/// - [`AppError::RevocationFailed`] - The driver program failed
#[tracing::instrument(skip(state))]
pub async fn delete_client(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    uri: Uri,
) -> Result<Json<DeleteClientResponse>, AppError> {
    let requested = segment(&uri, 1)
        .ok_or_else(|| {
            AppError::MalformedRequest(
                "You need to provide a client ID for the client you want to delete. \
                 The ID is the ovpn file name (which was downloaded from the /new endpoint)."
                    .to_string(),
            )
        })?
        .to_string();

    let manager = Arc::clone(&state.manager);
    let id =
        tokio::spawn(async move { manager.remove_client(&caller.0, &requested).await }).await??;

    Ok(Json(DeleteClientResponse {
        message: format!("{id} was successfully removed, thanks!"),
        client_id: id,
    }))
}

pub async fn my_ip(Extension(caller): Extension<Caller>) -> Json<IpResponse> {
    Json(IpResponse { ip: caller.0 })
}

pub async fn about() -> impl IntoResponse {
    Json(json!({
        "project": PROJECT_URL,
        "endpoints": {
            "/new": "Get an OpenVPN client",
            "/delete/<client-id>": "Delete an OpenVPN client",
            "/myip": "Know your IP address",
        }
    }))
}

/// Lists the advertised actions for any unknown path.
pub async fn not_found(uri: Uri) -> impl IntoResponse {
    let endpoints: Vec<String> = ACTIONS
        .iter()
        .filter(|action| !action.hidden)
        .map(|action| format!("/{}", action.name))
        .collect();

    (
        StatusCode::NOT_FOUND,
        Json(NotFoundResponse {
            code: StatusCode::NOT_FOUND.as_u16(),
            message: format!("{} is not a configured endpoint.", uri.path()),
            endpoints,
        }),
    )
}
