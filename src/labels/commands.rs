//! Parsing of label slash-commands in comments.
//!
//! ```text
//! /kind bug            -> add kind/bug
//! /sig Kernel          -> add sig/Kernel
//! /priority high       -> add priority/high
//! /good-first-issue    -> add good-first-issue
//! /remove-kind bug     -> remove kind/bug
//! ```
//!
//! Each command occupies its own line; one comment may carry several.

use std::sync::LazyLock;

use regex::Regex;

static ADD_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^/(kind|priority|sig|good)[ \t]*(.*?)\s*$").unwrap());
static REMOVE_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^/remove-(kind|priority|sig|good)[ \t]*(.*?)\s*$").unwrap());

/// Labels a comment asks to add and remove.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelCommands {
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

impl LabelCommands {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

pub fn parse_label_commands(comment: &str) -> LabelCommands {
    LabelCommands {
        add: parse_labels(comment, &ADD_LABEL),
        remove: parse_labels(comment, &REMOVE_LABEL),
    }
}

fn parse_labels(comment: &str, pattern: &Regex) -> Vec<String> {
    pattern
        .captures_iter(comment)
        .filter_map(|caps| {
            let kind = caps.get(1)?.as_str();
            let value = caps.get(2)?.as_str();
            if value.is_empty() {
                return None;
            }
            // `good` labels are written as one word: /good-first-issue
            Some(if kind == "good" {
                format!("{kind}{value}")
            } else {
                format!("{kind}/{value}")
            })
        })
        .collect()
}
