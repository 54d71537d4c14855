use super::error::*;
use crate::application_port::AuthService;
use crate::domain_model::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::{self, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            message: None,
            data: Some(data),
            error: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        ApiResponse {
            success: false,
            message: Some(message.clone()),
            data: None,
            error: Some(ApiError { code, message }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn login(
    body: LoginRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let issued = auth_service
        .login(&body.username, &body.password)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(
        &ApiResponse::ok(issued).with_message("Login successful"),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: RefreshToken,
}

pub async fn refresh(
    body: RefreshRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let tokens = auth_service
        .refresh_token(&body.refresh_token)
        .await
        .map_err(|e| {
            tracing::info!("refresh rejected: {}", e);
            // every refresh failure means the client has to log in again
            match ApiErrorCode::from(e) {
                ApiErrorCode::InternalError => ApiErrorCode::InternalError,
                ApiErrorCode::TokenExpired => ApiErrorCode::TokenExpired,
                _ => ApiErrorCode::InvalidToken,
            }
        })
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(tokens)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: Option<RefreshToken>,
}

pub async fn logout(
    body: LogoutRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    if let Some(refresh_token) = body.refresh_token {
        // an unreadable token has nothing left to revoke
        if let Err(e) = auth_service.logout(&refresh_token).await {
            tracing::debug!("logout with unusable refresh token: {}", e);
        }
    }

    Ok(warp::reply::json(
        &ApiResponse::ok(()).with_message("Logged out"),
    ))
}

pub async fn me(user: User) -> Result<impl warp::Reply, warp::Rejection> {
    Ok(warp::reply::json(&ApiResponse::ok(user)))
}

#[derive(Debug, Serialize)]
pub struct ProtectedPayload {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub user: User,
}

pub async fn protected(user: User) -> Result<impl warp::Reply, warp::Rejection> {
    let payload = ProtectedPayload {
        message: format!("Hello {}, this is protected data", user.name),
        timestamp: Utc::now(),
        user,
    };
    Ok(warp::reply::json(&ApiResponse::ok(payload)))
}

pub async fn list_users(
    _admin: User,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let users = auth_service.list_users().await;
    Ok(warp::reply::json(&ApiResponse::ok(users)))
}
