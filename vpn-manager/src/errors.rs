// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tokio::task::JoinError;

use crate::models::ClientId;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum AppError {
    #[error("Reached the maximum number of registered clients.")]
    CapacityExceeded,
    #[error("You have already allocated many clients. Please delete some.")]
    OwnerQuotaExceeded,
    #[error("Couldn't add a new client. Contact the vpn server admin.")]
    IssuanceFailed,
    #[error("Couldn't remove client {0}. Contact the vpn server admin.")]
    RevocationFailed(ClientId),
    #[error("Client {0} not found")]
    NotFound(ClientId),
    #[error("Client {0} is not owned by you")]
    NotOwned(ClientId),
    #[error("The server doesn't have the file of client {0} anymore.")]
    MaterialUnavailable(ClientId),
    #[error("{0}")]
    MalformedRequest(String),
    #[error("corrupt state: {0}")]
    CorruptState(String),
    #[error("error running command: {0:?} {1}")]
    RunError(Option<i32>, String),
    #[error("internal server error")]
    InternalServerError,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::MaterialUnavailable(_) | Self::CorruptState(_) | Self::InternalServerError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::CapacityExceeded
            | Self::OwnerQuotaExceeded
            | Self::IssuanceFailed
            | Self::RevocationFailed(_)
            | Self::NotFound(_)
            | Self::NotOwned(_)
            | Self::MalformedRequest(_)
            | Self::RunError(_, _) => StatusCode::BAD_REQUEST,
        };

        let message = match self {
            Self::MaterialUnavailable(_) => format!(
                "{self}\nIf you have lost it, please delete it from the /delete endpoint."
            ),
            Self::RunError(_, _) | Self::CorruptState(_) => "Internal Server Error".to_string(),
            _ => self.to_string(),
        };

        let body = Json(json!({"code": status.as_u16(), "message": message}));

        (status, body).into_response()
    }
}

impl From<serde_json::Error> for AppError {
    fn from(_source: serde_json::Error) -> Self {
        tracing::error!("{:?}", _source);
        AppError::InternalServerError
    }
}

impl From<anyhow::Error> for AppError {
    fn from(_source: anyhow::Error) -> Self {
        tracing::error!("{:?}", _source);
        AppError::InternalServerError
    }
}

impl From<std::io::Error> for AppError {
    fn from(_source: std::io::Error) -> Self {
        tracing::error!("{:?}", _source);
        AppError::InternalServerError
    }
}

impl From<JoinError> for AppError {
    fn from(_source: JoinError) -> Self {
        tracing::error!("{:?}", _source);
        AppError::InternalServerError
    }
}
