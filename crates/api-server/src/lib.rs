#![warn(clippy::unwrap_used)]

pub mod auth;
pub mod error;
pub mod extension_rest;
pub mod realtime_rest;
pub mod rest;
pub mod server;
pub mod swagger;

pub use error::ApiError;
pub use rest::AppState;
pub use server::{router, ApiServer};
pub use swagger::ApiDoc;
