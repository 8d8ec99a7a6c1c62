//! Navigation helpers for JSON state trees.
//!
//! Objects are indexed by key and arrays by decimal index. Primitives cannot
//! be traversed.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::path::{Path, PathError};

fn index(component: &str, position: usize) -> Result<usize> {
    component.parse::<usize>().map_err(|e| {
        Error::Path(PathError::InvalidComponent {
            component: component.to_string(),
            position,
            message: format!("expected array index, got: {}", e),
        })
    })
}

/// Get a reference to the sub-tree at `path`.
pub fn get_path<'a>(tree: &'a Value, path: &Path) -> Result<Option<&'a Value>> {
    let mut cursor = tree;
    for (i, component) in path.iter().enumerate() {
        cursor = match cursor {
            Value::Object(map) => match map.get(component.as_str()) {
                Some(next) => next,
                None => return Ok(None),
            },
            Value::Array(arr) => match arr.get(index(component, i)?) {
                Some(next) => next,
                None => return Ok(None),
            },
            _ => return Ok(None),
        };
    }
    Ok(Some(cursor))
}

/// Get a mutable reference to the sub-tree at `path`.
pub fn get_path_mut<'a>(tree: &'a mut Value, path: &Path) -> Result<Option<&'a mut Value>> {
    let mut cursor = tree;
    for (i, component) in path.iter().enumerate() {
        cursor = match cursor {
            Value::Object(map) => match map.get_mut(component.as_str()) {
                Some(next) => next,
                None => return Ok(None),
            },
            Value::Array(arr) => {
                let idx = index(component, i)?;
                match arr.get_mut(idx) {
                    Some(next) => next,
                    None => return Ok(None),
                }
            }
            _ => return Ok(None),
        };
    }
    Ok(Some(cursor))
}

/// Set `key` on the object at `parent`, replacing any previous value.
///
/// Unlike a general-purpose setter this never creates intermediate objects:
/// the parent must already exist and must be an object.
pub fn set_child(tree: &mut Value, parent: &Path, key: &str, value: Value) -> Result<()> {
    match get_path_mut(tree, parent)? {
        Some(Value::Object(map)) => {
            map.insert(key.to_string(), value);
            Ok(())
        }
        Some(_) => Err(Error::NotContainer {
            path: parent.clone(),
        }),
        None => Err(Error::NotFound {
            path: parent.clone(),
        }),
    }
}

/// Remove `key` from the object at `parent`, returning the old value.
pub fn remove_child(tree: &mut Value, parent: &Path, key: &str) -> Result<Option<Value>> {
    match get_path_mut(tree, parent)? {
        Some(Value::Object(map)) => Ok(map.remove(key)),
        Some(_) => Err(Error::NotContainer {
            path: parent.clone(),
        }),
        None => Ok(None),
    }
}
