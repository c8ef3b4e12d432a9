//! The access bot: the single public webhook target. It verifies relay
//! deliveries and fans them out to the downstream bots that want them.

pub mod bot;
pub mod config;
pub mod forwarder;

pub use bot::AccessBot;
pub use config::Configuration;
pub use forwarder::{ForwardError, Forwarder};
