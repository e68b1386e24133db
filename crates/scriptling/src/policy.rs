//! Filesystem path restriction for sandboxed builtins.
//!
//! The policy is checked at the host boundary — the point where a builtin
//! asks the host to touch the filesystem. Scripts can request any path; the
//! host only fulfils requests inside the allowlist.

use std::path::{Component, Path, PathBuf};

use crate::exception::{ExcType, Exception};

/// Which filesystem paths the `os` library may touch.
///
/// Parsed from the `--allowed-paths` flag: `-` denies everything, an empty
/// spec allows everything, otherwise a comma-separated prefix allowlist.
#[derive(Debug, Clone, Default)]
pub enum PathPolicy {
    /// No restriction.
    #[default]
    Unrestricted,
    /// Every filesystem operation is denied.
    DenyAll,
    /// Only paths under one of these prefixes are allowed.
    Allow(Vec<PathBuf>),
}

impl PathPolicy {
    /// Parses the `--allowed-paths` flag value.
    #[must_use]
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();
        if spec.is_empty() {
            return Self::Unrestricted;
        }
        if spec == "-" {
            return Self::DenyAll;
        }
        let prefixes = spec
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| normalize(Path::new(s)))
            .collect();
        Self::Allow(prefixes)
    }

    /// Checks one path against the policy.
    pub fn check(&self, path: &Path) -> Result<(), Exception> {
        match self {
            Self::Unrestricted => Ok(()),
            Self::DenyAll => Err(denied(path)),
            Self::Allow(prefixes) => {
                let normalized = normalize(path);
                if prefixes.iter().any(|prefix| normalized.starts_with(prefix)) {
                    Ok(())
                } else {
                    Err(denied(path))
                }
            }
        }
    }
}

fn denied(path: &Path) -> Exception {
    Exception::new(
        ExcType::IOError,
        format!("access to path '{}' is not allowed", path.display()),
    )
}

/// Lexically normalizes a path: makes it absolute against the current
/// directory and resolves `.`/`..` components without touching the
/// filesystem (the target may not exist yet for writes).
fn normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    };
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_spec_is_unrestricted() {
        let policy = PathPolicy::parse("");
        assert!(policy.check(Path::new("/anything")).is_ok());
    }

    #[test]
    fn dash_denies_everything() {
        let policy = PathPolicy::parse("-");
        assert!(policy.check(Path::new("/tmp/x")).is_err());
    }

    #[test]
    fn allowlist_checks_prefixes() {
        let policy = PathPolicy::parse("/tmp/work,/var/data");
        assert!(policy.check(Path::new("/tmp/work/file.txt")).is_ok());
        assert!(policy.check(Path::new("/var/data/x")).is_ok());
        assert!(policy.check(Path::new("/etc/passwd")).is_err());
    }

    #[test]
    fn parent_traversal_cannot_escape() {
        let policy = PathPolicy::parse("/tmp/work");
        assert!(policy.check(Path::new("/tmp/work/../../etc/passwd")).is_err());
        assert!(policy.check(Path::new("/tmp/work/sub/../file")).is_ok());
    }
}
