//! Workspace member declarations (npm/yarn `workspaces`, `pnpm-workspace.yaml`,
//! Cargo `[workspace] members`)

use crate::{Ecosystem, Error, Result};
use glob::{MatchOptions, Pattern};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tandem_fs::FileSystem;
use toml_edit::DocumentMut;

const PNPM_WORKSPACE: &str = "pnpm-workspace.yaml";

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Member globs declared by a workspace root, matched against member
/// directories relative to the root.
#[derive(Debug, Clone, Default)]
pub struct MemberPatterns {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl MemberPatterns {
    /// Build from raw pattern strings. Patterns starting with `!` in
    /// `include` are treated as exclusions (pnpm syntax).
    pub fn new<I, E>(include: I, exclude: E) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        let mut patterns = Self::default();
        for raw in include {
            let raw = raw.as_ref();
            match raw.strip_prefix('!') {
                Some(negated) => patterns.exclude.push(compile(negated)?),
                None => patterns.include.push(compile(raw)?),
            }
        }
        for raw in exclude {
            patterns.exclude.push(compile(raw.as_ref())?);
        }
        Ok(patterns)
    }

    /// Read the member declaration of the workspace at `root`.
    ///
    /// Returns `None` when the root declares no members, in which case every
    /// discovered manifest belongs to the workspace. A root manifest that
    /// cannot be parsed also yields `None`; its parse error is reported when
    /// the manifest itself is loaded.
    ///
    /// # Errors
    ///
    /// `Error::Parse`, naming the declaring file, for a malformed
    /// `pnpm-workspace.yaml` or a member glob that does not compile.
    pub async fn load<F: FileSystem>(
        fs: &F,
        root: &Path,
        ecosystem: Ecosystem,
    ) -> Result<Option<Self>> {
        let (path, loaded) = match ecosystem {
            Ecosystem::JavaScript => {
                let pnpm = root.join(PNPM_WORKSPACE);
                if fs.exists(&pnpm).await? {
                    let text = fs.read_to_string(&pnpm).await?;
                    let loaded = Self::from_pnpm_workspace(&text, &pnpm);
                    (pnpm, loaded)
                } else {
                    let manifest = root.join(ecosystem.manifest_file_name());
                    if !fs.exists(&manifest).await? {
                        return Ok(None);
                    }
                    let loaded = Self::from_package_json(&fs.read_to_string(&manifest).await?);
                    (manifest, loaded)
                }
            }
            Ecosystem::Rust => {
                let manifest = root.join(ecosystem.manifest_file_name());
                if !fs.exists(&manifest).await? {
                    return Ok(None);
                }
                let loaded = Self::from_cargo_toml(&fs.read_to_string(&manifest).await?);
                (manifest, loaded)
            }
        };

        loaded.map_err(|err| match err {
            Error::Workspace(message) => Error::parse(&path, message),
            other => other,
        })
    }

    fn from_pnpm_workspace(text: &str, path: &Path) -> Result<Option<Self>> {
        #[derive(Deserialize)]
        struct PnpmWorkspace {
            #[serde(default)]
            packages: Vec<String>,
        }

        // An empty file is a valid pnpm workspace with no packages.
        if text.trim().is_empty() {
            return Ok(None);
        }
        let workspace: PnpmWorkspace =
            serde_yaml::from_str(text).map_err(|e| Error::parse(path, e))?;
        if workspace.packages.is_empty() {
            return Ok(None);
        }
        Self::new(&workspace.packages, std::iter::empty::<&str>()).map(Some)
    }

    fn from_package_json(text: &str) -> Result<Option<Self>> {
        let Ok(value) = serde_json::from_str::<Value>(text.trim_start_matches('\u{feff}')) else {
            return Ok(None);
        };
        let patterns: Vec<&str> = match value.get("workspaces") {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            // Yarn classic: { "packages": [...], "nohoist": [...] }
            Some(Value::Object(object)) => object
                .get("packages")
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default(),
            _ => return Ok(None),
        };
        Self::new(patterns, std::iter::empty::<&str>()).map(Some)
    }

    fn from_cargo_toml(text: &str) -> Result<Option<Self>> {
        let Ok(doc) = text.parse::<DocumentMut>() else {
            return Ok(None);
        };
        let Some(workspace) = doc.get("workspace") else {
            return Ok(None);
        };
        let strings = |key: &str| -> Vec<String> {
            workspace
                .get(key)
                .and_then(|item| item.as_array())
                .map(|array| {
                    array
                        .iter()
                        .filter_map(|v| v.as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default()
        };

        let members = strings("members");
        if members.is_empty() {
            return Ok(None);
        }
        Self::new(&members, &strings("exclude")).map(Some)
    }

    /// Whether the manifest in `dir` is a workspace member. The root itself
    /// always is.
    pub fn contains(&self, root: &Path, dir: &Path) -> bool {
        let Ok(relative) = dir.strip_prefix(root) else {
            return false;
        };
        if relative.as_os_str().is_empty() {
            return true;
        }
        let matches = |patterns: &[Pattern]| {
            patterns
                .iter()
                .any(|p| p.matches_path_with(relative, MATCH_OPTIONS))
        };
        matches(&self.include) && !matches(&self.exclude)
    }
}

fn compile(raw: &str) -> Result<Pattern> {
    let trimmed = raw.trim().trim_start_matches("./").trim_end_matches('/');
    Pattern::new(trimmed)
        .map_err(|e| Error::Workspace(format!("invalid member pattern '{}': {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_fs::MemoryFileSystem;

    fn member(patterns: &MemberPatterns, dir: &str) -> bool {
        patterns.contains(Path::new("/w"), &Path::new("/w").join(dir))
    }

    #[test]
    fn test_single_level_glob() {
        let patterns = MemberPatterns::new(["packages/*"], std::iter::empty::<&str>()).unwrap();
        assert!(member(&patterns, ""));
        assert!(member(&patterns, "packages/web"));
        assert!(!member(&patterns, "packages/web/nested"));
        assert!(!member(&patterns, "tools/gen"));
    }

    #[test]
    fn test_recursive_glob_and_negation() {
        let patterns =
            MemberPatterns::new(["packages/**", "!packages/legacy/**"], std::iter::empty::<&str>())
                .unwrap();
        assert!(member(&patterns, "packages/a/b"));
        assert!(!member(&patterns, "packages/legacy/old"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = MemberPatterns::new(["packages/["], std::iter::empty::<&str>()).unwrap_err();
        assert!(matches!(err, Error::Workspace(_)));
    }

    #[tokio::test]
    async fn test_load_package_json_workspaces() {
        let fs = MemoryFileSystem::empty("/w").unwrap();
        fs.add_file(
            "package.json",
            r#"{"name":"root","workspaces":{"packages":["apps/*"]}}"#,
        )
        .unwrap();

        let patterns = MemberPatterns::load(&fs, Path::new("/w"), Ecosystem::JavaScript)
            .await
            .unwrap()
            .unwrap();
        assert!(member(&patterns, "apps/site"));
        assert!(!member(&patterns, "packages/lib"));
    }

    #[tokio::test]
    async fn test_pnpm_workspace_takes_precedence() {
        let fs = MemoryFileSystem::empty("/w").unwrap();
        fs.add_file("package.json", r#"{"workspaces":["apps/*"]}"#)
            .unwrap();
        fs.add_file("pnpm-workspace.yaml", "packages:\n  - 'packages/*'\n")
            .unwrap();

        let patterns = MemberPatterns::load(&fs, Path::new("/w"), Ecosystem::JavaScript)
            .await
            .unwrap()
            .unwrap();
        assert!(member(&patterns, "packages/lib"));
        assert!(!member(&patterns, "apps/site"));
    }

    #[tokio::test]
    async fn test_cargo_members_and_exclude() {
        let fs = MemoryFileSystem::empty("/w").unwrap();
        fs.add_file(
            "Cargo.toml",
            "[workspace]\nmembers = [\"crates/*\"]\nexclude = [\"crates/scratch\"]\n",
        )
        .unwrap();

        let patterns = MemberPatterns::load(&fs, Path::new("/w"), Ecosystem::Rust)
            .await
            .unwrap()
            .unwrap();
        assert!(member(&patterns, "crates/core"));
        assert!(!member(&patterns, "crates/scratch"));
    }

    #[tokio::test]
    async fn test_malformed_declarations_name_their_file() {
        let fs = MemoryFileSystem::empty("/w").unwrap();
        fs.add_file("pnpm-workspace.yaml", "packages: [unclosed\n").unwrap();
        let err = MemberPatterns::load(&fs, Path::new("/w"), Ecosystem::JavaScript)
            .await
            .unwrap_err();
        assert!(
            matches!(&err, Error::Parse { path, .. } if path == Path::new("/w/pnpm-workspace.yaml"))
        );

        let fs = MemoryFileSystem::empty("/w").unwrap();
        fs.add_file("Cargo.toml", "[workspace]\nmembers = [\"crates/[\"]\n").unwrap();
        let err = MemberPatterns::load(&fs, Path::new("/w"), Ecosystem::Rust)
            .await
            .unwrap_err();
        assert!(matches!(&err, Error::Parse { path, message }
            if path == Path::new("/w/Cargo.toml") && message.contains("crates/[")));
    }

    #[tokio::test]
    async fn test_no_declaration() {
        let fs = MemoryFileSystem::empty("/w").unwrap();
        fs.add_file("Cargo.toml", "[package]\nname = \"solo\"\n").unwrap();
        let patterns = MemberPatterns::load(&fs, Path::new("/w"), Ecosystem::Rust)
            .await
            .unwrap();
        assert!(patterns.is_none());
    }
}
