//! Module paths: ordered key sequences from the root of the module tree.

use std::fmt;

use thiserror::Error;

/// Errors related to path parsing and validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// A path component is empty or contains a separator.
    #[error("invalid path component '{component}' at position {position}: {message}")]
    InvalidComponent {
        component: String,
        position: usize,
        message: String,
    },
    /// The path string is invalid.
    #[error("invalid path: {message}")]
    InvalidPath { message: String },
}

/// A path into the module tree, and equally into the state tree.
///
/// Each component is the key of a child module under its parent. The empty
/// path addresses the root module (and the root state object).
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Path {
    pub components: Vec<String>,
}

impl Path {
    /// The empty path, addressing the root.
    pub fn root() -> Self {
        Path {
            components: Vec::new(),
        }
    }

    /// Parse a `/`-separated path string.
    ///
    /// Empty segments are ignored, so `"a//b/"` and `"a/b"` are the same path.
    ///
    /// ```rust
    /// use modstore_state::Path;
    ///
    /// let path = Path::parse("cart/items").unwrap();
    /// assert_eq!(path.len(), 2);
    /// assert!(Path::parse("").unwrap().is_root());
    /// ```
    pub fn parse(s: &str) -> Result<Self, PathError> {
        let components: Vec<String> = s
            .split('/')
            .filter(|c| !c.is_empty())
            .map(|c| c.to_string())
            .collect();

        for (i, component) in components.iter().enumerate() {
            Self::validate_component(component, i)?;
        }

        Ok(Path { components })
    }

    /// Try to create a path from components, validating each.
    pub fn try_from_components(components: Vec<String>) -> Result<Self, PathError> {
        for (i, component) in components.iter().enumerate() {
            Self::validate_component(component, i)?;
        }
        Ok(Path { components })
    }

    fn validate_component(component: &str, position: usize) -> Result<(), PathError> {
        if component.is_empty() {
            return Err(PathError::InvalidComponent {
                component: component.to_string(),
                position,
                message: "empty component".to_string(),
            });
        }
        if component.contains('/') {
            return Err(PathError::InvalidComponent {
                component: component.to_string(),
                position,
                message: "component must not contain '/'".to_string(),
            });
        }
        if component.chars().any(char::is_control) {
            return Err(PathError::InvalidComponent {
                component: component.escape_debug().to_string(),
                position,
                message: "control characters are not allowed".to_string(),
            });
        }
        Ok(())
    }

    /// True for the empty path.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.components.iter()
    }

    /// The path of the parent module, or `None` for the root.
    pub fn parent(&self) -> Option<Path> {
        if self.is_root() {
            return None;
        }
        Some(self.slice(0, self.len() - 1))
    }

    /// The last key, or `None` for the root.
    pub fn last(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    /// Append one key.
    #[must_use]
    pub fn child(&self, key: &str) -> Path {
        let mut components = self.components.clone();
        components.push(key.to_string());
        Path { components }
    }

    #[must_use]
    pub fn join(&self, other: &Path) -> Path {
        let mut components = self.components.clone();
        components.extend(other.components.iter().cloned());
        Path { components }
    }

    pub fn has_prefix(&self, prefix: &Path) -> bool {
        prefix.components.len() <= self.components.len()
            && prefix.components == self.components[..prefix.components.len()]
    }

    pub fn slice(&self, start: usize, end: usize) -> Path {
        Path {
            components: self.components[start..end].to_vec(),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.components.join("/"))
    }
}

impl std::ops::Index<usize> for Path {
    type Output = String;

    fn index(&self, i: usize) -> &Self::Output {
        &self.components[i]
    }
}

impl<const N: usize> From<[&str; N]> for Path {
    fn from(keys: [&str; N]) -> Self {
        Path {
            components: keys.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Build a path from a string literal.
///
/// ```rust
/// use modstore_state::path;
///
/// let p = path!("account/profile");
/// assert_eq!(p.last(), Some("profile"));
/// ```
#[macro_export]
macro_rules! path {
    ($s:expr) => {
        $crate::Path::parse($s).expect("invalid path literal")
    };
}
