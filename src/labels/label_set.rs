//! Case-insensitive label sets.
//!
//! Labels are matched by their lowercase form, but every set remembers how
//! each label was spelled when it was added so results can be reported (or
//! sent back to the platform) in the original casing.

use std::collections::BTreeMap;

/// A case-insensitive set of label names.
///
/// Iteration order is the lowercase order, so every list this returns is
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet {
    /// Lowercase form -> original spelling.
    labels: BTreeMap<String, String>,
}

impl LabelSet {
    /// Builds a set from a flat list. When two entries differ only in case,
    /// the later spelling wins.
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let labels = labels
            .into_iter()
            .map(|l| {
                let l = l.as_ref();
                (l.to_lowercase(), l.to_string())
            })
            .collect();
        LabelSet { labels }
    }

    pub fn count(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains_key(&label.to_lowercase())
    }

    /// The lowercase form of every label.
    pub fn to_list(&self) -> Vec<String> {
        self.labels.keys().cloned().collect()
    }

    /// Every label in its original spelling.
    pub fn originals(&self) -> Vec<String> {
        self.labels.values().cloned().collect()
    }

    /// Maps labels back to the spelling this set was built with, skipping
    /// any label the set does not contain.
    pub fn origin<S: AsRef<str>>(&self, labels: &[S]) -> Vec<String> {
        labels
            .iter()
            .filter_map(|l| self.labels.get(&l.as_ref().to_lowercase()).cloned())
            .collect()
    }

    /// Labels present in both sets, spelled as in `self`.
    pub fn intersection(&self, other: &LabelSet) -> LabelSet {
        self.filtered(|key| other.labels.contains_key(key))
    }

    /// Labels in `self` that are not in `other`, spelled as in `self`.
    pub fn difference(&self, other: &LabelSet) -> LabelSet {
        self.filtered(|key| !other.labels.contains_key(key))
    }

    /// Labels in either set; on overlap the spelling from `self` is kept.
    pub fn union(&self, other: &LabelSet) -> LabelSet {
        let mut labels = other.labels.clone();
        labels.extend(self.labels.clone());
        LabelSet { labels }
    }

    fn filtered(&self, keep: impl Fn(&str) -> bool) -> LabelSet {
        LabelSet {
            labels: self
                .labels
                .iter()
                .filter(|(key, _)| keep(key))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

impl<S: AsRef<str>> FromIterator<S> for LabelSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        LabelSet::new(iter)
    }
}
