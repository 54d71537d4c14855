mod auth_server_fake;
mod token_store_memory;
mod user_directory_memory;

pub use auth_server_fake::*;
pub use token_store_memory::*;
pub use user_directory_memory::*;
