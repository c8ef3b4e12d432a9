//! Core identifier types shared by the framework and the bots.

pub mod ids;

pub use ids::{DeliveryId, PrIssueRef, RepoId};
