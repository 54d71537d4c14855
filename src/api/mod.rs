mod error;
mod handler;
mod router;

pub use error::*;
pub use handler::ApiResponse;
pub use router::routes;

use crate::server::Server;
use std::sync::Arc;
use warp::Filter;

/// The full mock auth API, mounted under `/api`.
pub fn app(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = std::convert::Infallible> + Clone {
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["authorization", "content-type"])
        .allow_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE"]);

    warp::path("api")
        .and(routes(server))
        .with(cors)
        .recover(recover_error)
        .with(warp::trace::request())
}
