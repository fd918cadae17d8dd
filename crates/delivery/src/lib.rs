//! Delivery rules: domain matching, eligibility evaluation, time-of-day
//! windows, frequency capping and geo-targeting.

#![warn(clippy::unwrap_used)]

pub mod domain_match;
pub mod eligibility;
pub mod frequency_capping;
pub mod geo;
pub mod time_window;

pub use domain_match::{canonical_domain, domains_match, normalize_host, resolve_platform, root_domain};
pub use eligibility::{evaluate, is_qualifying, Disqualification, EvalTime, VisitorContext};
pub use geo::country_from_headers;
