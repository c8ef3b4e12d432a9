//! Label handling: the case-insensitive [`LabelSet`] shared by the bots, and
//! the label bot itself.

pub mod bot;
pub mod commands;
pub mod config;
pub mod label_set;

pub use bot::LabelBot;
pub use label_set::LabelSet;
