use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CompileError, CompileResult};

/// Load a stylesheet with `@import "...";` lines recursively inlined.
///
/// Each file is inlined at most once; import cycles are an error. Imports of
/// plain CSS files or urls are left in place for the output.
pub fn load_with_imports(path: &Path) -> CompileResult<String> {
    let mut visited = HashSet::new();
    let mut stack = HashSet::new();
    load_recursive(path, &mut visited, &mut stack)
}

fn load_recursive(
    path: &Path,
    visited: &mut HashSet<PathBuf>,
    stack: &mut HashSet<PathBuf>,
) -> CompileResult<String> {
    let canonical = path.canonicalize().map_err(|e| import_error(format!(
        "failed to resolve {}: {}",
        path.display(),
        e
    )))?;

    if stack.contains(&canonical) {
        return Err(import_error(format!(
            "recursive import: {}",
            canonical.display()
        )));
    }
    if visited.contains(&canonical) {
        return Ok(String::new());
    }
    stack.insert(canonical.clone());

    let data = fs::read_to_string(&canonical).map_err(|e| import_error(format!(
        "failed to read {}: {}",
        canonical.display(),
        e
    )))?;

    let base = canonical.parent().unwrap_or_else(|| Path::new("."));
    let mut out = String::new();
    for line in data.lines() {
        match parse_import_line(line) {
            Some(target) if !is_passthrough_import(target) => {
                let imported =
                    load_recursive(&resolve_import_path(base, target), visited, stack)?;
                out.push_str(&imported);
            }
            _ => {
                out.push_str(line);
                out.push('\n');
            }
        }
    }

    stack.remove(&canonical);
    visited.insert(canonical);
    Ok(out)
}

fn import_error(message: String) -> CompileError {
    CompileError::Import { message }
}

/// Extract the quoted target of an `@import "...";` line, if any.
fn parse_import_line(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix("@import")?.trim_start();
    let literal = rest.strip_suffix(';')?.trim();
    let unquoted = literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| {
            literal
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
        })?;
    if unquoted.is_empty() {
        None
    } else {
        Some(unquoted)
    }
}

/// CSS imports and urls stay in the output instead of being inlined.
fn is_passthrough_import(target: &str) -> bool {
    target.ends_with(".css")
        || target.starts_with("http://")
        || target.starts_with("https://")
        || target.starts_with("//")
}

/// Targets without an extension default to `.less`.
fn resolve_import_path(base: &Path, target: &str) -> PathBuf {
    let mut path = base.join(target);
    if path.extension().is_none() {
        path.set_extension("less");
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fixture_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/imports")
    }

    #[test]
    fn inline_nested_imports_once() {
        let path = fixture_dir().join("b.less");
        let combined = load_with_imports(&path).expect("load imports");
        assert!(combined.contains(".a"));
        assert!(combined.contains(".b"));
        assert!(combined.contains(".c"));
        assert!(!combined.contains("@import"));
    }

    #[test]
    fn skip_duplicate_imports() {
        let path = fixture_dir().join("b-dup.less");
        let combined = load_with_imports(&path).expect("load imports");
        assert_eq!(combined.matches(".a {").count(), 1);
    }

    #[test]
    fn extension_defaults_to_less() {
        let path = fixture_dir().join("bare.less");
        let combined = load_with_imports(&path).expect("load imports");
        assert!(combined.contains(".a {"));
    }

    #[test]
    fn css_imports_pass_through() {
        let path = fixture_dir().join("passthrough.less");
        let combined = load_with_imports(&path).expect("load imports");
        assert!(combined.contains("@import \"vendor.css\";"));
    }

    #[test]
    fn detect_cycles() {
        let path = fixture_dir().join("cycle-a.less");
        let err = load_with_imports(&path).unwrap_err();
        assert!(err.to_string().contains("recursive import"));
    }

    #[test]
    fn missing_file_error() {
        let path = fixture_dir().join("missing.less");
        let err = load_with_imports(&path).unwrap_err();
        assert!(err.to_string().contains("failed to resolve"));
    }
}
