//! Aggregation of independent failures.
//!
//! Multi-step side effects (removing several labels, running several PR flows)
//! attempt every step and report all failures together.

use std::fmt;

/// A collection of errors from independent operations.
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<anyhow::Error>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: impl Into<anyhow::Error>) {
        self.errors.push(err.into());
    }

    /// Records the error of `result`, if any.
    pub fn add_result<T, E: Into<anyhow::Error>>(&mut self, result: Result<T, E>) {
        if let Err(e) = result {
            self.push(e);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[anyhow::Error] {
        &self.errors
    }

    /// `Ok(())` when nothing failed, otherwise all errors as one.
    pub fn into_result(self) -> anyhow::Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(anyhow::Error::new(self))
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str(". ")?;
            }
            write!(f, "{e:#}")?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}

impl FromIterator<anyhow::Error> for MultiError {
    fn from_iter<I: IntoIterator<Item = anyhow::Error>>(iter: I) -> Self {
        MultiError {
            errors: iter.into_iter().collect(),
        }
    }
}
