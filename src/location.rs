//! Location paths attached to validation issues.

use std::fmt;

/// An immutable path into a resource, such as `Patient.identifier[2].value`.
///
/// Appending never mutates the receiver; each call returns a child context.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocationContext {
    path: String,
    field_start: usize,
}

impl LocationContext {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            path: root.into(),
            field_start: 0,
        }
    }

    /// Child context for a named field.
    pub fn append(&self, field: &str) -> Self {
        let field_start = self.path.len() + 1;
        Self {
            path: format!("{}.{}", self.path, field),
            field_start,
        }
    }

    /// Child context for one element of a list field.
    pub fn append_index(&self, field: &str, index: usize) -> Self {
        let field_start = self.path.len() + 1;
        Self {
            path: format!("{}.{}[{}]", self.path, field, index),
            field_start,
        }
    }

    /// Last path segment with any index stripped.
    pub fn field(&self) -> &str {
        let segment = &self.path[self.field_start..];
        match segment.find('[') {
            Some(bracket) => &segment[..bracket],
            None => segment,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for LocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl From<&str> for LocationContext {
    fn from(root: &str) -> Self {
        Self::new(root)
    }
}
