use super::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::warn;
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let code = if let Some(code) = err.find::<ApiErrorCode>() {
        *code
    } else if err.find::<reject::MissingHeader>().is_some() {
        ApiErrorCode::MissingToken
    } else if let Some(e) = err.find::<warp::body::BodyDeserializeError>() {
        return Ok(reply(ApiErrorCode::BadRequest, e.to_string()));
    } else if err.find::<reject::UnsupportedMediaType>().is_some() {
        ApiErrorCode::BadRequest
    } else if err.find::<reject::MethodNotAllowed>().is_some() || err.is_not_found() {
        ApiErrorCode::NotFound
    } else {
        warn!("Unhandled rejection: {:?}", err);
        ApiErrorCode::InternalError
    };

    let message = code.to_string();
    Ok(reply(code, message))
}

fn reply(code: ApiErrorCode, message: String) -> warp::reply::WithStatus<warp::reply::Json> {
    let status = code.status();
    let json = warp::reply::json(&ApiResponse::<()>::err(code, message));
    warp::reply::with_status(json, status)
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Invalid request body")]
    BadRequest,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Authorization token is missing")]
    MissingToken,
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Token has expired")]
    TokenExpired,
    #[error("User not found")]
    UserNotFound,
    #[error("Insufficient permissions")]
    Forbidden,
    #[error("Resource not found")]
    NotFound,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }

    pub fn status(self) -> StatusCode {
        match self {
            ApiErrorCode::BadRequest | ApiErrorCode::InvalidCredentials => StatusCode::BAD_REQUEST,
            ApiErrorCode::MissingToken
            | ApiErrorCode::InvalidToken
            | ApiErrorCode::TokenExpired
            | ApiErrorCode::UserNotFound => StatusCode::UNAUTHORIZED,
            ApiErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl reject::Reject for ApiErrorCode {}

impl From<AuthError> for ApiErrorCode {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredentials => ApiErrorCode::InvalidCredentials,
            AuthError::UserNotFound => ApiErrorCode::UserNotFound,
            AuthError::TokenInvalid => ApiErrorCode::InvalidToken,
            AuthError::TokenExpired => ApiErrorCode::TokenExpired,
            AuthError::InternalError(e) => ApiErrorCode::internal(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_problems_map_to_unauthorized() {
        for error in [
            AuthError::TokenInvalid,
            AuthError::TokenExpired,
            AuthError::UserNotFound,
        ] {
            assert_eq!(ApiErrorCode::from(error).status(), StatusCode::UNAUTHORIZED);
        }
        assert_eq!(
            ApiErrorCode::from(AuthError::InvalidCredentials).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
