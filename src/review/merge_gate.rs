//! Label rules deciding whether a pull request may be merged.
//!
//! Everything here is pure: callers fetch labels and the operation log, and
//! [`MergeHelper`](super::merge::MergeHelper) strings the checks together.

use crate::client::OperationLogEntry;
use crate::labels::LabelSet;

pub const APPROVED_LABEL: &str = "approved";
pub const LGTM_LABEL: &str = "lgtm";

/// Platform limit on label length.
const LABEL_LEN_LIMIT: usize = 20;

pub const MSG_PR_CONFLICTS: &str = "PR conflicts with the target branch.";

/// Outcome of a mergeability check.
///
/// A denial always carries at least one reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeDecision {
    reasons: Vec<String>,
}

impl MergeDecision {
    pub fn allow() -> Self {
        MergeDecision { reasons: vec![] }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        MergeDecision {
            reasons: vec![reason.into()],
        }
    }

    /// Allows when `reasons` is empty, denies with them otherwise.
    pub fn from_reasons(reasons: Vec<String>) -> Self {
        MergeDecision { reasons }
    }

    pub fn is_mergeable(&self) -> bool {
        self.reasons.is_empty()
    }

    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }
}

/// The merge rules of one repository.
#[derive(Debug, Clone, Copy)]
pub struct MergePolicy<'a> {
    pub lgtm_counts_required: u32,
    pub labels_for_merge: &'a [String],
    pub labels_not_allow_merge: &'a [String],
    pub missing_labels_for_merge: &'a [String],
    pub legal_operator: &'a str,
    pub cla_label_prefix: &'a str,
}

pub fn is_lgtm_label(label: &str) -> bool {
    label.to_lowercase().starts_with(LGTM_LABEL)
}

/// The LGTM-family labels in `labels`, original spelling.
pub fn lgtm_labels(labels: &LabelSet) -> Vec<String> {
    labels
        .originals()
        .into_iter()
        .filter(|l| is_lgtm_label(l))
        .collect()
}

/// The LGTM label a reviewer's `/lgtm` applies.
pub fn gen_lgtm_label(commenter: &str, lgtm_counts_required: u32) -> String {
    if lgtm_counts_required <= 1 {
        return LGTM_LABEL.to_string();
    }
    format!("{LGTM_LABEL}-{}", commenter.to_lowercase())
        .chars()
        .take(LABEL_LEN_LIMIT)
        .collect()
}

/// Labels that veto merging, if any are present.
pub fn check_veto(labels: &LabelSet, policy: &MergePolicy<'_>) -> Option<String> {
    let vetoes = labels.intersection(&LabelSet::new(policy.labels_not_allow_merge));
    if vetoes.is_empty() {
        return None;
    }
    Some(format!("PR has labels that block merging: {}", emphasize(&vetoes.originals())))
}

/// Checks the label state of a PR, returning reasons in a fixed order: LGTM
/// shortage, provenance, missing labels, then labels that must go.
pub fn evaluate_labels(
    labels: &LabelSet,
    ops: &[OperationLogEntry],
    policy: &MergePolicy<'_>,
) -> Vec<String> {
    let mut reasons = Vec::new();

    let mut needs = vec![APPROVED_LABEL.to_string()];
    needs.extend(policy.labels_for_merge.iter().cloned());
    if policy.lgtm_counts_required == 1 {
        needs.push(LGTM_LABEL.to_string());
    } else {
        let got = lgtm_labels(labels).len();
        if (got as u64) < u64::from(policy.lgtm_counts_required) {
            reasons.push(format!(
                "PR needs {} lgtm labels and now gets {got}",
                policy.lgtm_counts_required
            ));
        }
    }
    let needs = LabelSet::new(&needs);

    if let Some(r) = check_provenance(labels, &needs, ops, policy) {
        reasons.push(r);
    }

    let missing = needs.difference(labels);
    if !missing.is_empty() {
        reasons.push(format!(
            "PR does not have these labels: {}",
            emphasize(&missing.originals())
        ));
    }

    let invalid = LabelSet::new(policy.missing_labels_for_merge).intersection(labels);
    if !invalid.is_empty() {
        reasons.push(format!(
            "PR should remove these labels: {}",
            emphasize(&invalid.originals())
        ));
    }

    reasons
}

/// Every required or LGTM-family label must have been added last by the
/// legal operator.
fn check_provenance(
    labels: &LabelSet,
    needs: &LabelSet,
    ops: &[OperationLogEntry],
    policy: &MergePolicy<'_>,
) -> Option<String> {
    let problems: Vec<String> = labels
        .originals()
        .into_iter()
        .filter(|l| needs.contains(l) || is_lgtm_label(l))
        .filter_map(|label| {
            let problem = match latest_add(ops, &label).and_then(|e| e.actor.as_deref()) {
                None => "The corresponding operation log is missing. you should delete the \
                         label and add it again by correct way"
                    .to_string(),
                Some(who) if who == policy.legal_operator => return None,
                Some(who) if label.starts_with(policy.cla_label_prefix) => format!(
                    "{who} You can't add {label} by yourself, please remove it and use \
                     /check-cla to add it"
                ),
                Some(who) => format!(
                    "{who} You can't add {label} by yourself, please contact the maintainers"
                ),
            };
            Some(format!("{label}: {problem}"))
        })
        .collect();

    match problems.len() {
        0 => None,
        1 => Some(format!("**The following label is not ready**.\n\n{}", problems[0])),
        _ => Some(format!(
            "**The following labels are not ready**.\n\n{}",
            problems.join("\n\n")
        )),
    }
}

/// The most recent log entry adding `label`.
fn latest_add<'a>(ops: &'a [OperationLogEntry], label: &str) -> Option<&'a OperationLogEntry> {
    ops.iter()
        .filter(|e| e.is_label_add_of(label))
        .max_by_key(|e| e.created_at)
}

fn emphasize(labels: &[String]) -> String {
    labels
        .iter()
        .map(|l| format!("***{l}***"))
        .collect::<Vec<_>>()
        .join(", ")
}
