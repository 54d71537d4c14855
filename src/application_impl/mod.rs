mod auth_service_mock;
mod session_service_impl;
mod token_codec_base64;

pub use auth_service_mock::*;
pub use session_service_impl::*;
pub use token_codec_base64::*;
