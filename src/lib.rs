//! Webhook-driven chat-ops bots for AtomGit.
//!
//! Every bot runs the same service: a signed webhook endpoint feeding a
//! dispatcher that runs one tracked task per event. The bots differ only in
//! the handlers they register.
//!
//! - [`review`]: `/lgtm`, `/approve` and friends, plus the merge gate
//! - [`labels`]: `/kind`, `/priority`, `/sig`, `/good` and their `/remove-*`
//!   forms
//! - [`access`]: the public relay that forwards deliveries to the other bots

pub mod access;
pub mod client;
pub mod config;
pub mod errors;
pub mod framework;
pub mod labels;
pub mod review;
pub mod server;
pub mod types;
pub mod webhooks;

#[cfg(test)]
pub mod test_utils;
