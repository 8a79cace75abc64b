//! Package name validation for newly added dependencies.
//!
//! Names already present in a manifest are queried as-is (the npm registry
//! still serves legacy mixed-case names); these checks gate names a user
//! types on the command line.

use crate::error::{Error, Result};
use crate::types::RegistryKind;

const MAX_NPM_NAME_LEN: usize = 214;
const MAX_CRATE_NAME_LEN: usize = 64;

/// Node core modules and reserved names the npm registry refuses.
const RESERVED_NPM_NAMES: &[&str] = &[
    "node_modules",
    "favicon.ico",
    "assert",
    "async_hooks",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "dns",
    "domain",
    "events",
    "fs",
    "http",
    "http2",
    "https",
    "inspector",
    "module",
    "net",
    "os",
    "path",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "repl",
    "stream",
    "string_decoder",
    "timers",
    "tls",
    "trace_events",
    "tty",
    "url",
    "util",
    "v8",
    "vm",
    "wasi",
    "worker_threads",
    "zlib",
];

fn is_npm_name_byte(byte: u8) -> bool {
    matches!(byte, b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' | b'.')
}

fn is_npm_segment(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(is_npm_name_byte)
}

/// Validate a new npm package name (`name` or `@scope/name`).
pub fn validate_npm_name(name: &str) -> Result<()> {
    let invalid = || Error::InvalidPackageName(name.to_string());

    if name.is_empty() || name.len() > MAX_NPM_NAME_LEN {
        return Err(invalid());
    }
    if name.starts_with('.') || name.starts_with('_') {
        return Err(invalid());
    }

    if let Some(scoped) = name.strip_prefix('@') {
        let (scope, package) = scoped.split_once('/').ok_or_else(invalid)?;
        if !is_npm_segment(scope) || !is_npm_segment(package) {
            return Err(invalid());
        }
        return Ok(());
    }

    if !is_npm_segment(name) || RESERVED_NPM_NAMES.contains(&name) {
        return Err(invalid());
    }

    Ok(())
}

/// Validate a new crate name: ASCII alphanumerics, `-` and `_`, starting with a letter.
pub fn validate_crate_name(name: &str) -> Result<()> {
    let valid = name.len() <= MAX_CRATE_NAME_LEN
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidPackageName(name.to_string()))
    }
}

/// Validate a new package name for the given registry.
pub fn validate_package_name(kind: RegistryKind, name: &str) -> Result<()> {
    match kind {
        RegistryKind::Npm => validate_npm_name(name),
        RegistryKind::CratesIo => validate_crate_name(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_npm_names() {
        assert!(validate_npm_name("react").is_ok());
        assert!(validate_npm_name("lodash.merge").is_ok());
        assert!(validate_npm_name("@keystone-next/mono-repo").is_ok());

        assert!(validate_npm_name("").is_err());
        assert!(validate_npm_name(".hidden").is_err());
        assert!(validate_npm_name("_private").is_err());
        assert!(validate_npm_name("React").is_err());
        assert!(validate_npm_name("fs").is_err());
        assert!(validate_npm_name("@scope").is_err());
        assert!(validate_npm_name("@scope/").is_err());
        assert!(validate_npm_name("@Scope/pkg").is_err());
        assert!(validate_npm_name(&"a".repeat(215)).is_err());
    }

    #[test]
    fn test_crate_names() {
        assert!(validate_crate_name("serde").is_ok());
        assert!(validate_crate_name("tokio-util").is_ok());
        assert!(validate_crate_name("serde_json").is_ok());

        assert!(validate_crate_name("").is_err());
        assert!(validate_crate_name("1password").is_err());
        assert!(validate_crate_name("foo bar").is_err());
        assert!(validate_crate_name("foo/bar").is_err());
    }
}
