//! The tree of live modules, addressed by [`Path`].

use modstore_state::Path;

use crate::error::{Result, StoreError};
use crate::module::{Module, RawModule};

/// A child key a hot update tried to introduce under `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateConflict {
    pub path: Path,
    pub key: String,
}

/// Owns the root module.
#[derive(Debug)]
pub struct ModuleTree {
    root: Module,
}

impl ModuleTree {
    /// Build the static tree described by `raw`.
    pub fn new(raw: &RawModule) -> Self {
        Self {
            root: build(raw, false),
        }
    }

    pub fn root(&self) -> &Module {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Module {
        &mut self.root
    }

    /// Resolve `path`; every key must name an existing child.
    pub fn get(&self, path: &Path) -> Result<&Module> {
        let mut current = &self.root;
        for key in path.iter() {
            current = current
                .get_child(key)
                .ok_or_else(|| StoreError::ModuleNotFound { path: path.clone() })?;
        }
        Ok(current)
    }

    pub fn get_mut(&mut self, path: &Path) -> Result<&mut Module> {
        let mut current = &mut self.root;
        for key in path.iter() {
            current = current
                .get_child_mut(key)
                .ok_or_else(|| StoreError::ModuleNotFound { path: path.clone() })?;
        }
        Ok(current)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.get(path).is_ok()
    }

    /// Namespace of the module at `path`: `key/` for every namespaced module
    /// on the way down, root excluded.
    pub fn namespace(&self, path: &Path) -> Result<String> {
        let mut namespace = String::new();
        let mut current = &self.root;
        for key in path.iter() {
            current = current
                .get_child(key)
                .ok_or_else(|| StoreError::ModuleNotFound { path: path.clone() })?;
            if current.is_namespaced() {
                namespace.push_str(key);
                namespace.push('/');
            }
        }
        Ok(namespace)
    }

    /// Build `raw` and its descendants and attach them at `path`.
    ///
    /// The empty path replaces the root. Otherwise the parent must exist.
    pub fn register(&mut self, path: &Path, raw: &RawModule, runtime: bool) -> Result<()> {
        let (parent, key) = match (path.parent(), path.last()) {
            (Some(parent), Some(key)) => (parent, key),
            _ => {
                self.root = build(raw, runtime);
                return Ok(());
            }
        };
        let module = build(raw, runtime);
        self.get_mut(&parent)?.add_child(key, module);
        Ok(())
    }

    /// Detach the module at `path`.
    ///
    /// Returns `Ok(false)` and leaves the tree alone when the module was
    /// declared statically.
    pub fn unregister(&mut self, path: &Path) -> Result<bool> {
        if !self.get(path)?.is_runtime() {
            return Ok(false);
        }
        let (parent, key) = match (path.parent(), path.last()) {
            (Some(parent), Some(key)) => (parent, key),
            _ => return Ok(false),
        };
        Ok(self.get_mut(&parent)?.remove_child(key).is_some())
    }

    /// Swap handlers in place across the tree.
    ///
    /// A node whose description names a child the live tree lacks is left
    /// untouched along with its whole subtree; the offending keys are
    /// returned. Live children missing from the description are kept.
    pub fn update(&mut self, raw: &RawModule) -> Vec<UpdateConflict> {
        let mut conflicts = Vec::new();
        update_module(&Path::root(), &mut self.root, raw, &mut conflicts);
        conflicts
    }
}

fn build(raw: &RawModule, runtime: bool) -> Module {
    let mut module = Module::new(raw, runtime);
    for (key, child) in raw.children() {
        module.add_child(key, build(child, runtime));
    }
    module
}

fn update_module(
    path: &Path,
    target: &mut Module,
    raw: &RawModule,
    conflicts: &mut Vec<UpdateConflict>,
) {
    let before = conflicts.len();
    for (key, _) in raw.children() {
        if !target.has_child(key) {
            conflicts.push(UpdateConflict {
                path: path.clone(),
                key: key.to_string(),
            });
        }
    }
    if conflicts.len() > before {
        return;
    }

    target.update(raw);
    for (key, child_raw) in raw.children() {
        if let Some(child) = target.get_child_mut(key) {
            update_module(&path.child(key), child, child_raw, conflicts);
        }
    }
}
