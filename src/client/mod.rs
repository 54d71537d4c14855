mod client;
mod error;
mod pipeline;
mod refresh_coordinator;
mod request;
mod session_events;

pub use client::*;
pub use error::*;
pub use pipeline::*;
pub use refresh_coordinator::*;
pub use request::*;
pub use session_events::*;
