use super::error::*;
use super::handler;
use crate::application_port::AuthService;
use crate::domain_model::*;
use crate::server::Server;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, http, reject};

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let login = warp::post()
        .and(warp::path("auth"))
        .and(warp::path("login"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and_then(handler::login);

    let refresh = warp::post()
        .and(warp::path("auth"))
        .and(warp::path("refresh"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and_then(handler::refresh);

    let logout = warp::post()
        .and(warp::path("auth"))
        .and(warp::path("logout"))
        .and(warp::path::end())
        .and(optional_json::<handler::LogoutRequest>())
        .and(with(server.auth_service.clone()))
        .and_then(handler::logout);

    let me = warp::get()
        .and(warp::path("auth"))
        .and(warp::path("me"))
        .and(warp::path::end())
        .and(with_verification(server.auth_service.clone()))
        .and_then(handler::me);

    let protected = warp::get()
        .and(warp::path("test"))
        .and(warp::path("protected"))
        .and(warp::path::end())
        .and(with_verification(server.auth_service.clone()))
        .and_then(handler::protected);

    let admin_users = warp::get()
        .and(warp::path("admin"))
        .and(warp::path("users"))
        .and(warp::path::end())
        .and(with_role(server.auth_service.clone(), &[Role::Admin]))
        .and(with(server.auth_service.clone()))
        .and_then(handler::list_users);

    login
        .or(refresh)
        .or(logout)
        .or(me)
        .or(protected)
        .or(admin_users)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

/// A JSON body that may be absent or empty.
fn optional_json<T>() -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Default + Send,
{
    warp::body::bytes().map(|body: warp::hyper::body::Bytes| {
        serde_json::from_slice::<T>(&body).unwrap_or_default()
    })
}

fn with_verification(
    auth_service: Arc<dyn AuthService>,
) -> impl Filter<Extract = (User,), Error = warp::Rejection> + Clone {
    warp::header::<String>(http::header::AUTHORIZATION.as_ref()).and_then(move |token: String| {
        let auth_service = auth_service.clone();
        async move {
            if let Some(token) = token.strip_prefix("Bearer ") {
                let user = auth_service
                    .verify_token(&AccessToken(token.to_string()))
                    .await
                    .map_err(ApiErrorCode::from)
                    .map_err(reject::custom)?;
                Ok(user)
            } else {
                Err(reject::custom(ApiErrorCode::InvalidToken))
            }
        }
    })
}

fn with_role(
    auth_service: Arc<dyn AuthService>,
    required: &'static [Role],
) -> impl Filter<Extract = (User,), Error = warp::Rejection> + Clone {
    with_verification(auth_service).and_then(move |user: User| async move {
        if user.role.has_role(required) {
            Ok(user)
        } else {
            tracing::info!(user_id = %user.id, role = %user.role, "role check failed");
            Err(reject::custom(ApiErrorCode::Forbidden))
        }
    })
}
