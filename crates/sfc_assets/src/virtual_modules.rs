//! Synthetic module registry.
//!
//! Inline scripts do not exist on disk, so each one gets a virtual path
//! derived from its document and index. The registry is both the resolver and
//! the loader for that namespace: the host asks it first and only falls back
//! to the filesystem when it answers `None`.

use std::sync::{Arc, PoisonError, RwLock};

use cow_utils::CowUtils;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};

/// Derive the virtual path for the `index`-th inline script of a document.
///
/// The result always starts with `./`, `/` or `@` so module resolution treats
/// it as a file reference rather than a bare package name.
///
/// ```
/// use sfc_assets::virtual_path;
///
/// assert_eq!(virtual_path("src/comp.html", ".js", 0), "./src/comp_0.js");
/// assert_eq!(virtual_path("/abs/comp.html", ".ts", 2), "/abs/comp_2.ts");
/// ```
pub fn virtual_path(document_url: &str, extension: &str, index: usize) -> String {
    let url = document_url.cow_replace('\\', "/");
    let stem = strip_extension(&url);
    let path = format!("{stem}_{index}{extension}");
    if path.starts_with("./") || path.starts_with('/') || path.starts_with('@') {
        path
    } else {
        format!("./{path}")
    }
}

/// Remove the extension of the last path segment, if it has one.
fn strip_extension(url: &str) -> &str {
    let file_start = url.rfind('/').map_or(0, |i| i + 1);
    match url[file_start..].rfind('.') {
        // A leading dot names a hidden file, not an extension.
        Some(dot) if dot > 0 => &url[..file_start + dot],
        _ => url,
    }
}

/// A registered module and the document it was extracted from.
#[derive(Debug, Clone)]
struct VirtualModule {
    owner: String,
    content: Arc<str>,
}

/// Process-wide store of virtual module contents for one build session.
///
/// Each path belongs to the document that registered it. That document may
/// replace or drop its own paths when it is transformed again or deleted; any
/// other document registering different content under the same path is a
/// [`Error::VirtualModuleCollision`].
#[derive(Debug, Default)]
pub struct VirtualModules {
    modules: RwLock<FxHashMap<String, VirtualModule>>,
}

impl VirtualModules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `content` under `path` on behalf of `owner`.
    ///
    /// Registering identical content again is a no-op, and an owner may
    /// overwrite its own path.
    pub fn register(&self, owner: &str, path: &str, content: &str) -> Result<()> {
        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        check_collision(&modules, owner, path, content)?;
        insert(&mut modules, owner, path, content);
        Ok(())
    }

    /// Replace every path owned by `owner` with `entries`.
    ///
    /// Nothing changes when one of the entries collides with another owner's
    /// module.
    pub fn replace_owned(&self, owner: &str, entries: &[(String, String)]) -> Result<()> {
        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        for (path, content) in entries {
            check_collision(&modules, owner, path, content)?;
        }
        modules.retain(|_, module| module.owner != owner);
        for (path, content) in entries {
            insert(&mut modules, owner, path, content);
        }
        Ok(())
    }

    /// Drop every path owned by `owner`. Returns how many were removed.
    pub fn remove_owned(&self, owner: &str) -> usize {
        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        let before = modules.len();
        modules.retain(|_, module| module.owner != owner);
        before - modules.len()
    }

    /// Existence check: `Some(path)` when `path` belongs to this registry.
    pub fn resolve(&self, path: &str) -> Option<String> {
        let modules = self.modules.read().unwrap_or_else(PoisonError::into_inner);
        modules.contains_key(path).then(|| path.to_string())
    }

    pub fn load(&self, path: &str) -> Option<Arc<str>> {
        let modules = self.modules.read().unwrap_or_else(PoisonError::into_inner);
        modules.get(path).map(|module| Arc::clone(&module.content))
    }

    pub fn len(&self) -> usize {
        self.modules.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn check_collision(
    modules: &FxHashMap<String, VirtualModule>,
    owner: &str,
    path: &str,
    content: &str,
) -> Result<()> {
    match modules.get(path) {
        Some(existing) if existing.owner != owner && existing.content.as_ref() != content => {
            Err(Error::VirtualModuleCollision {
                path: path.to_string(),
            })
        }
        _ => Ok(()),
    }
}

fn insert(modules: &mut FxHashMap<String, VirtualModule>, owner: &str, path: &str, content: &str) {
    if modules.get(path).is_some_and(|existing| existing.content.as_ref() == content) {
        return;
    }
    tracing::trace!(path, owner, "registered virtual module");
    modules.insert(
        path.to_string(),
        VirtualModule {
            owner: owner.to_string(),
            content: Arc::from(content),
        },
    );
}
