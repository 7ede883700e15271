//! Suite files on disk.
//!
//! A suite is a YAML document with `meta` and either inline `cases` or a list
//! of `includes`. Each include is a category file (`category` + `cases`)
//! resolved relative to the suite file; its cases are stamped with the
//! category before the merged suite is validated. Image paths are made absolute so the suite can be run
//! from any working directory.

use chatbench_domain::{Case, Category, DomainError, Suite};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Errors raised while loading a suite
#[derive(Debug, Error)]
pub enum SuiteLoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid suite {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid include {path}: {source}")]
    Include {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("suite rejected: {0}")]
    Invalid(#[from] DomainError),
}

pub type SuiteLoadResult<T> = std::result::Result<T, SuiteLoadError>;

#[derive(Debug, Default, Deserialize)]
struct SuiteHeader {
    #[serde(default)]
    includes: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct CategoryFile {
    #[serde(default)]
    category: CategoryHeader,
    #[serde(default)]
    cases: Vec<Case>,
}

#[derive(Debug, Deserialize)]
struct CategoryHeader {
    #[serde(default = "unknown_category_id")]
    id: String,
    #[serde(default = "unknown_category_name")]
    name: String,
    #[serde(default)]
    description: String,
}

impl Default for CategoryHeader {
    fn default() -> Self {
        Self {
            id: unknown_category_id(),
            name: unknown_category_name(),
            description: String::new(),
        }
    }
}

fn unknown_category_id() -> String {
    "unknown".to_string()
}

fn unknown_category_name() -> String {
    "Unknown".to_string()
}

/// Loads, merges, resolves and validates the suite at `path`.
#[instrument]
pub fn load_suite(path: &Path) -> SuiteLoadResult<Suite> {
    let text = read(path)?;
    let mut suite = parse_suite(&text, path)?;
    resolve_asset_paths(&mut suite, path);
    suite.validate()?;

    info!(
        cases = suite.cases.len(),
        categories = suite.categories.len(),
        "Suite loaded"
    );
    Ok(suite)
}

/// Parses a suite document and merges its includes, without validating.
///
/// When the document lists `includes`, the cases and categories of the
/// include files, in declared order, replace any inline ones. Missing include
/// files are skipped.
pub fn parse_suite(text: &str, path: &Path) -> SuiteLoadResult<Suite> {
    let parse_error = |source| SuiteLoadError::Parse {
        path: path.to_path_buf(),
        source,
    };

    let document: serde_yaml::Value = serde_yaml::from_str(text).map_err(parse_error)?;
    let header: SuiteHeader = serde_yaml::from_value(document.clone()).map_err(parse_error)?;
    let mut suite: Suite = serde_yaml::from_value(document).map_err(parse_error)?;

    let Some(includes) = header.includes else {
        return Ok(suite);
    };
    if !suite.cases.is_empty() {
        warn!(
            cases = suite.cases.len(),
            "Inline cases are ignored when includes are listed"
        );
    }
    suite.cases.clear();
    suite.categories.clear();

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    for include in &includes {
        let include_path = base.join(include);
        if !include_path.exists() {
            warn!(path = %include_path.display(), "Include file not found; skipping");
            continue;
        }

        let file = load_category_file(&include_path)?;
        debug!(
            path = %include_path.display(),
            category = %file.category.id,
            cases = file.cases.len(),
            "Merging include"
        );

        suite.categories.push(Category {
            id: file.category.id.clone(),
            name: file.category.name.clone(),
            description: file.category.description.clone(),
            source_file: Some(include.clone()),
        });
        suite.cases.extend(file.cases.into_iter().map(|mut case| {
            case.category_id = file.category.id.clone();
            case.category_name = file.category.name.clone();
            case
        }));
    }

    Ok(suite)
}

fn load_category_file(path: &Path) -> SuiteLoadResult<CategoryFile> {
    let text = read(path)?;
    serde_yaml::from_str(&text).map_err(|source| SuiteLoadError::Include {
        path: path.to_path_buf(),
        source,
    })
}

fn read(path: &Path) -> SuiteLoadResult<String> {
    std::fs::read_to_string(path).map_err(|source| SuiteLoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Makes every image path in `suite` absolute.
///
/// A relative path is tried against the suite file's directory, then against
/// that directory's parent; when neither exists the first candidate is kept so
/// the failure surfaces with a meaningful path at run time.
pub fn resolve_asset_paths(suite: &mut Suite, suite_path: &Path) {
    let suite_path = std::fs::canonicalize(suite_path).unwrap_or_else(|_| suite_path.to_path_buf());
    let suite_dir = suite_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    suite.for_each_image_path_mut(|image_path| {
        *image_path = resolve_one(&suite_dir, image_path);
    });
}

fn resolve_one(suite_dir: &Path, image_path: &Path) -> PathBuf {
    let beside_suite = suite_dir.join(image_path);
    if beside_suite.exists() {
        return beside_suite;
    }
    if let Some(parent) = suite_dir.parent() {
        let beside_parent = parent.join(image_path);
        if beside_parent.exists() {
            return beside_parent;
        }
    }
    beside_suite
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_prefers_suite_directory() {
        let root = tempfile::tempdir().unwrap();
        let suite_dir = root.path().join("bench");
        std::fs::create_dir_all(suite_dir.join("images")).unwrap();
        std::fs::create_dir_all(root.path().join("images")).unwrap();
        std::fs::write(suite_dir.join("images/a.png"), b"x").unwrap();
        std::fs::write(root.path().join("images/a.png"), b"x").unwrap();

        let resolved = resolve_one(&suite_dir, Path::new("images/a.png"));

        assert_eq!(resolved, suite_dir.join("images/a.png"));
    }

    #[test]
    fn test_resolve_falls_back_to_parent_then_first_candidate() {
        let root = tempfile::tempdir().unwrap();
        let suite_dir = root.path().join("bench");
        std::fs::create_dir_all(&suite_dir).unwrap();
        std::fs::create_dir_all(root.path().join("images")).unwrap();
        std::fs::write(root.path().join("images/b.png"), b"x").unwrap();

        assert_eq!(
            resolve_one(&suite_dir, Path::new("images/b.png")),
            root.path().join("images/b.png")
        );
        assert_eq!(
            resolve_one(&suite_dir, Path::new("images/missing.png")),
            suite_dir.join("images/missing.png")
        );
    }

    #[test]
    fn test_absolute_paths_are_kept() {
        let root = tempfile::tempdir().unwrap();
        let absolute = root.path().join("elsewhere.png");

        assert_eq!(resolve_one(Path::new("/tmp/bench"), &absolute), absolute);
    }

    #[test]
    fn test_includes_replace_inline_cases() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("extra.yaml"),
            "category: {id: extra, name: Extra}\ncases:\n  - id: included\n    request:\n      messages:\n        - {role: user, content: a}\n",
        )
        .unwrap();
        let text = "includes: [extra.yaml]\ncases:\n  - id: inline\n    request:\n      messages:\n        - {role: user, content: b}\n";

        // Act
        let suite = parse_suite(text, &dir.path().join("suite.yaml")).unwrap();

        // Assert
        let ids: Vec<&str> = suite.cases.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["included"]);
        assert_eq!(suite.categories.len(), 1);
    }

    #[test]
    fn test_inline_cases_without_includes() {
        let text = "cases:\n  - id: inline\n    request:\n      messages:\n        - {role: user, content: b}\n";

        let suite = parse_suite(text, Path::new("suite.yaml")).unwrap();

        assert_eq!(suite.cases.len(), 1);
        assert!(suite.categories.is_empty());
    }

    #[test]
    fn test_category_defaults() {
        let file: CategoryFile = serde_yaml::from_str("cases: []").unwrap();
        assert_eq!(file.category.id, "unknown");
        assert_eq!(file.category.name, "Unknown");
    }
}
