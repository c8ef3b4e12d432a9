//! Review slash-commands.
//!
//! Each command must sit on its own line; matching ignores case and trailing
//! whitespace. A comment may carry several commands.

use std::sync::LazyLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewCommand {
    Lgtm,
    LgtmCancel,
    Approve,
    ApproveCancel,
    CheckPr,
    ClaCancel,
    Rebase,
    Squash,
    RebaseCancel,
    SquashCancel,
    Ack,
}

impl ReviewCommand {
    /// Every command, in the order a comment's commands are handled.
    pub const ALL: [ReviewCommand; 11] = [
        ReviewCommand::Lgtm,
        ReviewCommand::LgtmCancel,
        ReviewCommand::Approve,
        ReviewCommand::ApproveCancel,
        ReviewCommand::CheckPr,
        ReviewCommand::ClaCancel,
        ReviewCommand::Rebase,
        ReviewCommand::Squash,
        ReviewCommand::RebaseCancel,
        ReviewCommand::SquashCancel,
        ReviewCommand::Ack,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewCommand::Lgtm => "/lgtm",
            ReviewCommand::LgtmCancel => "/lgtm cancel",
            ReviewCommand::Approve => "/approve",
            ReviewCommand::ApproveCancel => "/approve cancel",
            ReviewCommand::CheckPr => "/check-pr",
            ReviewCommand::ClaCancel => "/cla cancel",
            ReviewCommand::Rebase => "/rebase",
            ReviewCommand::Squash => "/squash",
            ReviewCommand::RebaseCancel => "/rebase cancel",
            ReviewCommand::SquashCancel => "/squash cancel",
            ReviewCommand::Ack => "/ack",
        }
    }

    pub fn matches(&self, comment: &str) -> bool {
        PATTERNS[*self as usize].is_match(comment)
    }
}

static PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ReviewCommand::ALL
        .iter()
        .map(|c| Regex::new(&format!(r"(?mi)^{}\s*$", regex::escape(c.as_str()))).unwrap())
        .collect()
});

/// The commands in `comment`, in handling order.
pub fn parse_commands(comment: &str) -> Vec<ReviewCommand> {
    ReviewCommand::ALL
        .into_iter()
        .filter(|c| c.matches(comment))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminants_index_patterns() {
        for (i, c) in ReviewCommand::ALL.iter().enumerate() {
            assert_eq!(*c as usize, i, "{c:?}");
        }
    }

    #[test]
    fn single_commands() {
        assert_eq!(parse_commands("/lgtm"), vec![ReviewCommand::Lgtm]);
        assert_eq!(parse_commands("/LGTM  "), vec![ReviewCommand::Lgtm]);
        assert_eq!(parse_commands("/lgtm cancel"), vec![ReviewCommand::LgtmCancel]);
        assert_eq!(parse_commands("/approve\r\n"), vec![ReviewCommand::Approve]);
        assert_eq!(parse_commands("/check-pr"), vec![ReviewCommand::CheckPr]);
        assert_eq!(parse_commands("/cla cancel"), vec![ReviewCommand::ClaCancel]);
        assert_eq!(parse_commands("/squash cancel"), vec![ReviewCommand::SquashCancel]);
        assert_eq!(parse_commands("/ack"), vec![ReviewCommand::Ack]);
    }

    #[test]
    fn commands_must_fill_their_line() {
        assert!(parse_commands("/lgtm please").is_empty());
        assert!(parse_commands("looks good /lgtm").is_empty());
        assert!(parse_commands("/lgtmx").is_empty());
    }

    #[test]
    fn several_commands_in_handling_order() {
        assert_eq!(
            parse_commands("Nice work.\n/approve\n/lgtm\n"),
            vec![ReviewCommand::Lgtm, ReviewCommand::Approve]
        );
    }

    #[test]
    fn check_pr_hyphen_is_literal() {
        assert!(parse_commands("/check_pr").is_empty());
    }
}
