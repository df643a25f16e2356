use alloc::string::{String, ToString};
use alloc::vec::Vec;

use serde::{Serialize, Serializer};

/// A single step inside a configuration tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    /// A mapping key.
    Key(String),
    /// A sequence position.
    Index(usize),
}

/// The location of a value inside a configuration document.
///
/// Paths are rendered as `sensor[0].filters[1]`. The empty path is the
/// document root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigPath(Vec<PathSegment>);

impl ConfigPath {
    /// Creates the root [`ConfigPath`].
    #[must_use]
    #[inline]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Returns a new [`ConfigPath`] extended with a mapping key.
    #[must_use]
    pub fn field(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Key(name.to_string()));
        Self(segments)
    }

    /// Returns a new [`ConfigPath`] extended with a sequence position.
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }

    /// Checks whether this is the document root.
    #[must_use]
    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns all path segments.
    #[must_use]
    #[inline]
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Returns the last mapping key of the path, if any.
    #[must_use]
    pub fn last_key(&self) -> Option<&str> {
        self.0.iter().rev().find_map(|segment| match segment {
            PathSegment::Key(key) => Some(key.as_str()),
            PathSegment::Index(_) => None,
        })
    }
}

impl core::fmt::Display for ConfigPath {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }

        for (position, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if position == 0 => f.write_str(key)?,
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

impl Serialize for ConfigPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::ConfigPath;

    #[test]
    fn display() {
        assert_eq!(ConfigPath::root().to_string(), "<root>");

        let path = ConfigPath::root()
            .field("sensor")
            .index(0)
            .field("filters")
            .index(1);
        assert_eq!(path.to_string(), "sensor[0].filters[1]");
        assert_eq!(path.last_key(), Some("filters"));
    }
}
