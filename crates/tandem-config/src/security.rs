use globset::Glob;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Rejected workspace roots, patterns and names
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("workspace root does not exist: {0}")]
    PathDoesNotExist(PathBuf),

    #[error("workspace root is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("workspace root cannot be listed: {0}")]
    NotReadable(PathBuf),

    #[error("Invalid ignore pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid package name in pinned_override: {0}")]
    InvalidPackageName(String),
}

/// Validate and canonicalize a workspace root.
///
/// The root must exist, be a directory and be listable. Symlinks are resolved
/// so every manifest path reported later shares one canonical prefix.
pub fn validate_workspace_root(path: &Path) -> Result<PathBuf, SecurityError> {
    let canonical = path
        .canonicalize()
        .map_err(|_| SecurityError::PathDoesNotExist(path.to_path_buf()))?;

    if !canonical.is_dir() {
        return Err(SecurityError::NotADirectory(canonical));
    }

    if fs::read_dir(&canonical).is_err() {
        return Err(SecurityError::NotReadable(canonical));
    }

    Ok(canonical)
}

/// Validate one ignore pattern.
///
/// Patterns are matched relative to the workspace root, so absolute patterns
/// and `..` segments are rejected along with malformed globs.
pub fn validate_ignore_pattern(pattern: &str) -> Result<(), SecurityError> {
    let invalid = |reason: &str| SecurityError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    if pattern.trim().is_empty() {
        return Err(invalid("pattern is empty"));
    }
    let path = Path::new(pattern);
    if path.is_absolute() || pattern.starts_with('/') {
        return Err(invalid("patterns are relative to the workspace root"));
    }
    if path.components().any(|c| c == Component::ParentDir) {
        return Err(invalid("patterns may not leave the workspace"));
    }

    Glob::new(pattern).map_err(|e| invalid(&e.kind().to_string()))?;
    Ok(())
}

/// Validate a dependency name listed in `pinned_override`.
///
/// Accepts anything that is a valid npm name or a valid crate name.
pub fn validate_pinned_name(name: &str) -> Result<(), SecurityError> {
    if tandem_registry::validate_npm_name(name).is_ok()
        || tandem_registry::validate_crate_name(name).is_ok()
    {
        Ok(())
    } else {
        Err(SecurityError::InvalidPackageName(name.to_string()))
    }
}

/// Make the config file readable by its owner only (no-op off Unix)
#[cfg(unix)]
pub fn set_config_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    fs::set_permissions(path, perms)
}

/// Set config permissions (no-op off Unix)
#[cfg(not(unix))]
pub fn set_config_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_existing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let result = validate_workspace_root(temp_dir.path()).unwrap();
        assert_eq!(result, temp_dir.path().canonicalize().unwrap());
    }

    #[test]
    fn test_validate_nonexistent_path() {
        let path = PathBuf::from("/nonexistent/path/12345");
        let result = validate_workspace_root(&path);
        assert!(matches!(result, Err(SecurityError::PathDoesNotExist(_))));
    }

    #[test]
    fn test_validate_file_instead_of_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("package.json");
        fs::write(&file, "{}").unwrap();

        let result = validate_workspace_root(&file);
        assert!(matches!(result, Err(SecurityError::NotADirectory(_))));
    }

    #[test]
    fn test_ignore_patterns() {
        assert!(validate_ignore_pattern("**/fixtures/**").is_ok());
        assert!(validate_ignore_pattern("legacy/*").is_ok());

        for bad in ["", "  ", "/abs/**", "../sibling/**", "a/../../b", "foo/[z-a]"] {
            assert!(
                matches!(
                    validate_ignore_pattern(bad),
                    Err(SecurityError::InvalidPattern { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_pinned_names() {
        assert!(validate_pinned_name("lodash").is_ok());
        assert!(validate_pinned_name("@types/node").is_ok());
        assert!(validate_pinned_name("serde_json").is_ok());
        assert!(validate_pinned_name("Not A Name").is_err());
    }

    #[test]
    #[cfg(unix)]
    fn test_config_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "version = \"1.0\"").unwrap();

        set_config_permissions(&config_path).unwrap();

        let mode = fs::metadata(&config_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
