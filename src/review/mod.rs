//! The review bot and the merge gate it drives.
//!
//! Reviewers label PRs through slash-commands (`/lgtm`, `/approve`, ...). Once
//! the labels, their provenance and any branch freeze allow it, the bot
//! merges the PR with the method its labels or SIG policy ask for.

pub mod bot;
pub mod branch_keeper;
pub mod commands;
pub mod config;
pub mod freeze;
pub mod merge;
pub mod merge_gate;
pub mod merge_method;
pub mod permission;
pub mod sig_info;

pub use bot::ReviewBot;
pub use config::Configuration;
pub use merge::{MergeError, MergeHelper};
pub use merge_gate::{MergeDecision, MergePolicy};
