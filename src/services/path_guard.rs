//! Confinement of candidate file paths to the repository working directory.

use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathGuardError {
    #[error("path {path:?} rejected: {reason}")]
    Traversal { path: String, reason: &'static str },

    #[error("cannot resolve working directory: {0}")]
    Io(#[from] io::Error),
}

/// Lexical checks that need no filesystem access.
pub fn check_lexical(relative: &str) -> Result<(), PathGuardError> {
    let reject = |reason| {
        Err(PathGuardError::Traversal {
            path: relative.to_string(),
            reason,
        })
    };

    if relative.trim().is_empty() {
        return reject("empty path");
    }
    if relative.contains('\0') {
        return reject("contains a NUL byte");
    }
    if relative.starts_with('/') || relative.starts_with('\\') {
        return reject("absolute path");
    }
    if relative.split(['/', '\\']).any(|segment| segment == "..") {
        return reject("parent directory segment");
    }

    for component in Path::new(relative).components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => return reject("parent directory segment"),
            Component::RootDir | Component::Prefix(_) => return reject("absolute path"),
        }
    }
    Ok(())
}

/// Resolve `relative` inside `workdir`, rejecting anything that would land
/// outside it, including through symlinked directories.
///
/// Returns the path to write to (not canonicalized, so a final symlink
/// component is not followed for the write).
pub fn resolve_within(workdir: &Path, relative: &str) -> Result<PathBuf, PathGuardError> {
    check_lexical(relative)?;

    let root = workdir.canonicalize()?;
    let target = root.join(relative);

    // Canonicalize the deepest existing ancestor; anything below it does not
    // exist yet and was already checked lexically.
    let mut ancestor = target.as_path();
    let resolved = loop {
        match ancestor.canonicalize() {
            Ok(resolved) => break resolved,
            Err(err) if err.kind() == io::ErrorKind::NotFound => match ancestor.parent() {
                Some(parent) => ancestor = parent,
                None => return Err(err.into()),
            },
            Err(err) => return Err(err.into()),
        }
    };

    if !resolved.starts_with(&root) {
        return Err(PathGuardError::Traversal {
            path: relative.to_string(),
            reason: "resolves outside the working directory",
        });
    }

    Ok(target)
}
