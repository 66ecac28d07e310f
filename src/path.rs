//! Attribute paths.
//!
//! A path locates a value nested inside a resource object: a diagnostic
//! points at the attribute it complains about, and a plan lists the
//! attributes whose change forces the resource to be replaced.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single step through a nested value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathStep {
    /// Look up an attribute of an object by name.
    Attribute(String),
    /// Look up an element of a map by its string key.
    Key(String),
    /// Look up an element of a list or tuple by its position.
    Index(i64),
    /// A step the provider sent in a form this client does not recognize.
    ///
    /// The step still occupies its position so the rest of the path keeps
    /// its shape.
    Unknown,
}

/// An ordered sequence of steps from the root of a value.
///
/// An empty path refers to the whole value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributePath(Vec<PathStep>);

impl AttributePath {
    /// Create an empty path referring to the whole value.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// The steps of this path, outermost first.
    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    /// Whether this path refers to the whole value.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of steps in the path.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Append a step in place.
    pub fn push(&mut self, step: PathStep) {
        self.0.push(step);
    }

    /// Extend the path with an attribute lookup.
    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.0.push(PathStep::Attribute(name.into()));
        self
    }

    /// Extend the path with a map key lookup.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.0.push(PathStep::Key(key.into()));
        self
    }

    /// Extend the path with an index lookup.
    pub fn index(mut self, index: i64) -> Self {
        self.0.push(PathStep::Index(index));
        self
    }

    /// A copy of this path extended by one step, leaving `self` untouched.
    pub(crate) fn child(&self, step: PathStep) -> Self {
        let mut steps = Vec::with_capacity(self.0.len() + 1);
        steps.extend_from_slice(&self.0);
        steps.push(step);
        Self(steps)
    }
}

impl FromIterator<PathStep> for AttributePath {
    fn from_iter<I: IntoIterator<Item = PathStep>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<PathStep>> for AttributePath {
    fn from(steps: Vec<PathStep>) -> Self {
        Self(steps)
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.0.iter().enumerate() {
            match step {
                PathStep::Attribute(name) if i == 0 => write!(f, "{}", name)?,
                PathStep::Attribute(name) => write!(f, ".{}", name)?,
                PathStep::Key(key) => write!(f, "[{:?}]", key)?,
                PathStep::Index(index) => write!(f, "[{}]", index)?,
                PathStep::Unknown => write!(f, "[?]")?,
            }
        }
        Ok(())
    }
}
