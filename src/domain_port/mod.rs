// store

mod token_store;

pub use token_store::*;

// external services

mod auth_server;
mod user_directory;

pub use auth_server::*;
pub use user_directory::*;
