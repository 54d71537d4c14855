mod auth_server_http;

pub use auth_server_http::*;
