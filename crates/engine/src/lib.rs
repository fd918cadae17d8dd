//! Campaign serving engine: resolves the visitor's page to a platform, loads
//! candidate campaigns, filters them through the eligibility rules, resolves
//! their content and records the outcome.

#![warn(clippy::unwrap_used)]

pub mod content;
pub mod inbox;
pub mod processor;
pub mod request;

pub use content::{resolve_content, ResolvedContent};
pub use inbox::NotificationInbox;
pub use processor::ServeProcessor;
pub use request::{FetchScope, RequestError, ServeRequest};
