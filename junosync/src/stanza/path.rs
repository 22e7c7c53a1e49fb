//! Field locators pointing into a resource model.

use std::fmt;

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// Named attribute.
    Attr(&'static str),
    /// Element of a list attribute.
    Index(usize),
}

/// Structured pointer to a field of a resource model.
///
/// Displayed the way users write it: `rule[1].then.pool`. An empty path
/// points at the resource as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    /// Path to the whole resource.
    pub fn root() -> Self {
        Self::default()
    }

    /// Path to a top-level attribute.
    pub fn of(attr: &'static str) -> Self {
        Self {
            segments: vec![Segment::Attr(attr)],
        }
    }

    /// Descend into a nested attribute.
    pub fn attr(mut self, attr: &'static str) -> Self {
        self.segments.push(Segment::Attr(attr));
        self
    }

    /// Descend into a list element.
    pub fn index(mut self, index: usize) -> Self {
        self.segments.push(Segment::Index(index));
        self
    }

    pub(crate) fn prepend_attr(mut self, attr: &'static str) -> Self {
        self.segments.insert(0, Segment::Attr(attr));
        self
    }

    pub(crate) fn prepend_index(mut self, index: usize) -> Self {
        self.segments.insert(0, Segment::Index(index));
        self
    }

    /// Whether this path points at the whole resource.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Name of the innermost attribute, if any.
    pub fn last_attr(&self) -> Option<&'static str> {
        self.segments.iter().rev().find_map(|s| match s {
            Segment::Attr(name) => Some(*name),
            Segment::Index(_) => None,
        })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "<resource>");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Attr(name) if i == 0 => write!(f, "{}", name)?,
                Segment::Attr(name) => write!(f, ".{}", name)?,
                Segment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}
