#![warn(clippy::unwrap_used)]

pub mod recorder;

pub use recorder::{plan_events, EventRecorder, ServedCampaign, EXTENSION_DOMAIN};
